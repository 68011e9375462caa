// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # PLDM - platform management agent over MCTP
//!
//! A host-side agent speaking PLDM (DSP0240) to out-of-band devices over
//! MCTP: terminus discovery and initialization, PDR ingestion, numeric
//! sensor/effecter access, platform event polling, and Redfish Device
//! Enablement (DSP0218) with BEJ/JSON translation.
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------------+
//! |                        Session Layer                               |
//! |  TerminusManager | PlatformManager | EventManager | RdeManager     |
//! +--------------------------------------------------------------------+
//! |                       Requester Runtime                            |
//! |  instance-ID pools | correlation | retries | timeouts              |
//! +--------------------------------------------------------------------+
//! |                         Wire Formats                               |
//! |  PLDM header | Base/Platform/RDE codecs | PDR parsers | BEJ        |
//! +--------------------------------------------------------------------+
//! |                      Transport Adapter                             |
//! |  mctp-demux socket | AF_MCTP socket | EID<->TID map                |
//! +--------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Requester`] | Awaitable PLDM round trips with correlation and retry |
//! | [`InstanceIdDb`] | Per-terminus instance-ID pools with scoped handles |
//! | [`TerminusManager`] | Endpoint discovery and TID adoption |
//! | [`PlatformManager`] | PDR pagination and sensor materialization |
//! | [`EventManager`] | Critical-event queue and poll pump |
//! | [`RdeManager`] | Per-device RDE sessions and Redfish operations |
//!
//! ## Concurrency model
//!
//! Single-threaded cooperative scheduling on a current-thread runtime.
//! Every suspension point is an explicit `.await` at a PLDM round trip
//! or a timer; sessions for different termini interleave freely, while
//! work within one session is sequential.

/// Agent configuration: protocol constants and runtime tunables.
pub mod config;
/// Crate-wide error taxonomy.
pub mod error;
/// Platform monitoring and control (terminus, PDRs, sensors, events).
pub mod platform;
/// PLDM wire formats (header, command codecs, PDR parsers).
pub mod protocol;
/// Requester runtime and instance-ID allocation.
pub mod requester;
/// Redfish Device Enablement session engine and BEJ translation.
pub mod rde;
/// Outbound notification seam (publication-layer traits).
pub mod sink;
/// MCTP transport adapter (demux and AF_MCTP back-ends).
pub mod transport;

pub use config::Config;
pub use error::{Error, RdeCompletionCode, Result};
pub use platform::{EventManager, PlatformManager, TerminusManager};
pub use protocol::{Eid, Tid};
pub use rde::RdeManager;
pub use requester::{InstanceId, InstanceIdDb, Requester};
pub use sink::{DeviceSink, LogSink, TaskSink};
pub use transport::{MctpTransport, TransportBackend};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
