// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Agent configuration - single source of truth.
//!
//! This module centralizes the protocol constants and runtime tunables.
//! Protocol constants come from DSP0236/DSP0240/DSP0248/DSP0218; never
//! hardcode them elsewhere.

use std::path::PathBuf;
use std::time::Duration;

// =======================================================================
// MCTP endpoint IDs (DSP0236 Sec.8.2 special endpoint IDs)
// =======================================================================

/// First valid MCTP endpoint ID. 0 is the null EID, 1..=7 are reserved.
pub const MCTP_EID_VALID_MIN: u8 = 8;

/// One past the last valid MCTP endpoint ID (255 is broadcast).
pub const MCTP_EID_VALID_MAX: u8 = 255;

/// MCTP message type carried in the first body byte on the mux socket.
pub const MCTP_MSG_TYPE_PLDM: u8 = 0x01;

// =======================================================================
// PLDM terminus IDs (DSP0240 Sec.8.1.1 SetTID)
// =======================================================================

/// TID 0 is unassigned.
pub const TID_UNASSIGNED: u8 = 0;

/// TID 255 is reserved.
pub const TID_RESERVED: u8 = 0xff;

/// Size of the terminus-manager TID allocation pool (TIDs 1..=254).
pub const TID_POOL_SIZE: usize = 255;

// =======================================================================
// Requester runtime (DSP0240 timing defaults, PT2/PT3)
// =======================================================================

/// Number of instance IDs per terminus (5-bit field).
pub const INSTANCE_ID_COUNT: u8 = 32;

/// Sentinel marking "no instance ID allocated".
pub const INSTANCE_ID_UNALLOCATED: u8 = 0xff;

/// Per-attempt response timeout.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_millis(2000);

/// Resends after the first attempt. Total deadline is
/// `(NUM_REQUEST_RETRIES + 1) * RESPONSE_TIMEOUT`.
pub const NUM_REQUEST_RETRIES: u32 = 2;

// =======================================================================
// Platform monitoring and control (DSP0248)
// =======================================================================

/// Default event-message buffer size when the exchange fails
/// (DSP0248 Sec.16.9 EventMessageBufferSize).
pub const DEFAULT_EVENT_BUFFER_SIZE: u16 = 256;

/// Bytes requested per GetPDR part.
pub const PDR_REQUEST_COUNT: u16 = 1024;

/// Bound on the critical-event queue.
pub const EVENT_QUEUE_CAPACITY: usize = 256;

/// Critical-event poll cadence.
pub const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(500);

// =======================================================================
// Redfish Device Enablement (DSP0218)
// =======================================================================

/// Chunk size the MC advertises in NegotiateMediumParameters.
pub const MC_MAX_TRANSFER_CHUNK_BYTES: u32 = 1024;

/// Concurrency the MC advertises in NegotiateRedfishParameters.
pub const MC_CONCURRENCY_SUPPORT: u8 = 1;

/// Consecutive checksum mismatches tolerated per multipart chunk.
pub const MULTIPART_CHUNK_RETRIES: u32 = 3;

/// Persistent dictionary store root.
pub const DICT_ROOT: &str = "/var/lib/pldm/dict";

/// Annotation dictionary source file.
pub const ANNOTATION_DICT_PATH: &str = "/usr/share/pldm/rde/annotation.bin";

/// Presence of this file switches dictionary loading to the bootstrap path.
pub const DICT_BOOTSTRAP_TRIGGER: &str = "/tmp/.enable_dict_bootstrap";

/// D-Bus path prefix for operation tasks.
pub const OPERATION_TASK_PATH: &str = "/xyz/openbmc_project/RDE/OperationTask";

/// Runtime configuration.
///
/// Carries the tunables that tests and deployments override; defaults are
/// the protocol constants above.
#[derive(Debug, Clone)]
pub struct Config {
    /// Per-attempt response timeout.
    pub response_timeout: Duration,
    /// Resends after the first attempt.
    pub num_retries: u32,
    /// Local EID registered as event receiver.
    pub local_eid: u8,
    /// Bytes requested per GetPDR part.
    pub pdr_request_count: u16,
    /// MC receive buffer advertised in EventMessageBufferSize.
    pub event_buffer_size: u16,
    /// Critical-event poll cadence.
    pub event_poll_interval: Duration,
    /// Chunk size the MC advertises for RDE multipart transfers.
    pub mc_max_chunk_size: u32,
    /// Concurrency the MC advertises.
    pub mc_concurrency: u8,
    /// Consecutive checksum mismatches tolerated per multipart chunk.
    pub multipart_chunk_retries: u32,
    /// Persistent dictionary store root.
    pub dict_root: PathBuf,
    /// Annotation dictionary source file.
    pub annotation_dict_path: PathBuf,
    /// Bootstrap trigger file.
    pub dict_bootstrap_trigger: PathBuf,
    /// Resource registry persistence path.
    pub registry_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            response_timeout: RESPONSE_TIMEOUT,
            num_retries: NUM_REQUEST_RETRIES,
            local_eid: MCTP_EID_VALID_MIN,
            pdr_request_count: PDR_REQUEST_COUNT,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            event_poll_interval: EVENT_POLL_INTERVAL,
            mc_max_chunk_size: MC_MAX_TRANSFER_CHUNK_BYTES,
            mc_concurrency: MC_CONCURRENCY_SUPPORT,
            multipart_chunk_retries: MULTIPART_CHUNK_RETRIES,
            dict_root: PathBuf::from(DICT_ROOT),
            annotation_dict_path: PathBuf::from(ANNOTATION_DICT_PATH),
            dict_bootstrap_trigger: PathBuf::from(DICT_BOOTSTRAP_TRIGGER),
            registry_path: PathBuf::from("/var/lib/pldm/ResourceRegistry.txt"),
        }
    }
}

impl Config {
    /// Total per-request deadline: `(retries + 1) * response_timeout`.
    pub fn total_request_deadline(&self) -> Duration {
        self.response_timeout * (self.num_retries + 1)
    }

    /// Returns true for EIDs outside the null/reserved/broadcast ranges.
    pub fn eid_is_valid(eid: u8) -> bool {
        (MCTP_EID_VALID_MIN..MCTP_EID_VALID_MAX).contains(&eid)
    }

    /// Returns true for TIDs outside the unassigned/reserved values.
    pub fn tid_is_valid(tid: u8) -> bool {
        tid != TID_UNASSIGNED && tid != TID_RESERVED
    }
}
