// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Outbound notification seam.
//!
//! The publication layer (D-Bus in a BMC deployment) is a consumer of
//! typed updates, not a dependency of the core. These traits are the
//! entire surface the engine emits into; implementations are injected at
//! construction.

use crate::rde::{DeviceState, NegotiationStatus};
use log::info;

/// Sink for per-operation task lifecycle updates.
pub trait TaskSink: Send + Sync {
    /// Terminal or progress update for an operation task. `payload` is a
    /// JSON document (may be `{}`), `return_code` an
    /// [`crate::rde::OpState`] discriminant.
    fn task_updated(&self, task_path: &str, payload: &str, return_code: u16);
}

/// Sink for device-level state changes.
pub trait DeviceSink: Send + Sync {
    fn negotiation_status(&self, uuid: &str, status: NegotiationStatus);
    fn device_state_changed(&self, uuid: &str, state: DeviceState);
}

/// Sink that writes updates to the log. Default wiring for the daemon
/// until a publication layer is attached.
#[derive(Debug, Default)]
pub struct LogSink;

impl TaskSink for LogSink {
    fn task_updated(&self, task_path: &str, payload: &str, return_code: u16) {
        info!(
            "[rde] TaskUpdated path={} return_code={} payload={}",
            task_path, return_code, payload
        );
    }
}

impl DeviceSink for LogSink {
    fn negotiation_status(&self, uuid: &str, status: NegotiationStatus) {
        info!("[rde] device {} negotiation status {:?}", uuid, status);
    }

    fn device_state_changed(&self, uuid: &str, state: DeviceState) {
        info!("[rde] device {} state {:?}", uuid, state);
    }
}
