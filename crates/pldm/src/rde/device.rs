// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RDE device entity: identity, negotiated metadata, lifecycle state.

use super::dictionary::DictionaryManager;
use super::registry::ResourceRegistry;
use crate::protocol::rde::OperationType;
use crate::protocol::{Eid, Tid};

/// Lifecycle state of an RDE-managed device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    NotReady,
    Discovering,
    Operational,
    Busy,
    Unreachable,
    Disabled,
}

/// Progress of the discovery negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationStatus {
    NotStarted,
    InProgress,
    Success,
    Failed,
}

/// Progress of a discovery or operation workflow. Discriminants are the
/// `return_code` values carried by task updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum OpState {
    Idle = 0,
    DiscoveryStarted = 1,
    DiscoveryRunning = 2,
    DiscoveryCompleted = 3,
    WaitingForResponse = 4,
    OperationQueued = 5,
    OperationExecuting = 6,
    OperationCompleted = 7,
    OperationFailed = 8,
    Cancelled = 9,
    TimedOut = 10,
}

impl OpState {
    /// True for states after which late responses are ignored.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OpState::OperationCompleted
                | OpState::OperationFailed
                | OpState::Cancelled
                | OpState::TimedOut
        )
    }
}

// Feature bits exchanged in NegotiateRedfishParameters.
pub const FEATURE_HEAD: u16 = 1 << 0;
pub const FEATURE_READ: u16 = 1 << 1;
pub const FEATURE_CREATE: u16 = 1 << 2;
pub const FEATURE_DELETE: u16 = 1 << 3;
pub const FEATURE_UPDATE: u16 = 1 << 4;
pub const FEATURE_REPLACE: u16 = 1 << 5;
pub const FEATURE_ACTION: u16 = 1 << 6;
pub const FEATURE_EVENTS: u16 = 1 << 7;
pub const FEATURE_BEJ_1_1: u16 = 1 << 8;

/// Feature-support bitfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureSupport(pub u16);

impl FeatureSupport {
    pub fn has(self, bit: u16) -> bool {
        self.0 & bit != 0
    }

    /// Operation types implied by the feature bits, in wire order.
    pub fn operations(self) -> Vec<OperationType> {
        let mut ops = Vec::new();
        if self.has(FEATURE_HEAD) {
            ops.push(OperationType::Head);
        }
        if self.has(FEATURE_READ) {
            ops.push(OperationType::Read);
        }
        if self.has(FEATURE_CREATE) {
            ops.push(OperationType::Create);
        }
        if self.has(FEATURE_DELETE) {
            ops.push(OperationType::Delete);
        }
        if self.has(FEATURE_UPDATE) {
            ops.push(OperationType::Update);
        }
        if self.has(FEATURE_REPLACE) {
            ops.push(OperationType::Replace);
        }
        if self.has(FEATURE_ACTION) {
            ops.push(OperationType::Action);
        }
        ops
    }
}

// Capability bits reported by the device.
pub const CAP_ATOMIC_RESOURCE_READ: u8 = 1 << 0;
pub const CAP_EXPAND_SUPPORT: u8 = 1 << 1;
pub const CAP_BEJ_1_1: u8 = 1 << 2;

/// Device capability bitfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceCapabilities(pub u8);

impl DeviceCapabilities {
    pub fn has(self, bit: u8) -> bool {
        self.0 & bit != 0
    }
}

/// Negotiated and advertised device parameters. Typed fields throughout;
/// there is deliberately no string-keyed access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub mc_feature_support: FeatureSupport,
    pub dev_feature_support: FeatureSupport,
    pub mc_concurrency: u8,
    pub device_concurrency: u8,
    pub dev_capabilities: DeviceCapabilities,
    pub dev_config_signature: u32,
    pub dev_provider_name: String,
    pub mc_max_chunk_size: u32,
    pub device_max_chunk_size: u32,
    pub etag: String,
    pub protocol_version: String,
    pub encoding: String,
    pub session_id: String,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            mc_feature_support: FeatureSupport(FEATURE_HEAD | FEATURE_READ | FEATURE_UPDATE),
            dev_feature_support: FeatureSupport::default(),
            mc_concurrency: crate::config::MC_CONCURRENCY_SUPPORT,
            device_concurrency: 0,
            dev_capabilities: DeviceCapabilities::default(),
            dev_config_signature: 0,
            dev_provider_name: String::new(),
            mc_max_chunk_size: crate::config::MC_MAX_TRANSFER_CHUNK_BYTES,
            device_max_chunk_size: 0,
            etag: String::new(),
            protocol_version: "1.0".to_string(),
            encoding: "application/json".to_string(),
            session_id: String::new(),
        }
    }
}

impl Metadata {
    /// Chunk bound for multipart transfers once both sides have spoken:
    /// the smaller of the negotiated sizes.
    pub fn effective_chunk_size(&self) -> u32 {
        if self.device_max_chunk_size == 0 {
            self.mc_max_chunk_size
        } else {
            self.mc_max_chunk_size.min(self.device_max_chunk_size)
        }
    }
}

/// A Redfish-capable device under management.
pub struct Device {
    pub uuid: String,
    pub eid: Eid,
    pub tid: Tid,
    pub metadata: Metadata,
    pub registry: ResourceRegistry,
    pub dictionaries: DictionaryManager,
    state: DeviceState,
    negotiation: NegotiationStatus,
    initialized: bool,
}

impl Device {
    pub fn new(uuid: String, eid: Eid, tid: Tid, dictionaries: DictionaryManager) -> Self {
        Self {
            uuid,
            eid,
            tid,
            metadata: Metadata::default(),
            registry: ResourceRegistry::new(),
            dictionaries,
            state: DeviceState::NotReady,
            negotiation: NegotiationStatus::NotStarted,
            initialized: false,
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn set_state(&mut self, state: DeviceState) {
        self.state = state;
    }

    pub fn negotiation_status(&self) -> NegotiationStatus {
        self.negotiation
    }

    pub fn set_negotiation_status(&mut self, status: NegotiationStatus) {
        self.negotiation = status;
    }

    /// Monotonic: transitions false -> true exactly once, at the end of a
    /// successful discovery.
    pub fn initialized(&self) -> bool {
        self.initialized
    }

    pub fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    /// Operations the device reported support for during negotiation.
    pub fn supported_operations(&self) -> Vec<OperationType> {
        self.metadata.dev_feature_support.operations()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_bits_to_operations() {
        let features = FeatureSupport(FEATURE_HEAD | FEATURE_READ | FEATURE_UPDATE);
        assert_eq!(
            features.operations(),
            vec![
                OperationType::Head,
                OperationType::Read,
                OperationType::Update
            ]
        );
    }

    #[test]
    fn test_effective_chunk_size_prefers_smaller_side() {
        let mut meta = Metadata::default();
        assert_eq!(meta.effective_chunk_size(), meta.mc_max_chunk_size);
        meta.device_max_chunk_size = 256;
        assert_eq!(meta.effective_chunk_size(), 256);
        meta.device_max_chunk_size = 1 << 20;
        assert_eq!(meta.effective_chunk_size(), meta.mc_max_chunk_size);
    }

    #[test]
    fn test_op_state_terminality() {
        assert!(OpState::Cancelled.is_terminal());
        assert!(OpState::OperationFailed.is_terminal());
        assert!(!OpState::OperationExecuting.is_terminal());
    }

    #[test]
    fn test_mc_defaults_match_negotiation_posture() {
        let meta = Metadata::default();
        assert!(meta.mc_feature_support.has(FEATURE_READ));
        assert!(!meta.mc_feature_support.has(FEATURE_DELETE));
        assert_eq!(meta.mc_concurrency, 1);
        assert_eq!(meta.encoding, "application/json");
    }
}
