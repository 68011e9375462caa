// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Redfish Device Enablement session engine.
//!
//! Owns one [`Device`] per discovered RDE endpoint and drives its two
//! workflows: the discovery session (parameter negotiation and schema
//! dictionary retrieval) and operation sessions (encoded Redfish
//! operations tunneled over PLDM, with BEJ/JSON translation against the
//! retrieved dictionaries).

pub mod bej;
mod device;
mod dictionary;
mod discovery;
mod multipart;
mod operation;
mod registry;

pub use device::{
    Device, DeviceCapabilities, DeviceState, FeatureSupport, Metadata, NegotiationStatus, OpState,
    CAP_ATOMIC_RESOURCE_READ, CAP_BEJ_1_1, CAP_EXPAND_SUPPORT, FEATURE_ACTION, FEATURE_BEJ_1_1,
    FEATURE_CREATE, FEATURE_DELETE, FEATURE_EVENTS, FEATURE_HEAD, FEATURE_READ, FEATURE_REPLACE,
    FEATURE_UPDATE,
};
pub use dictionary::{Dictionary, DictionaryManager};
pub use discovery::DiscoverySession;
pub use multipart::{receive as multipart_receive, send as multipart_send, MultipartContext};
pub use operation::{
    EncodingFormat, OperationRequest, OperationSession, OperationTask, PayloadSource,
};
pub use registry::{ResourceInfo, ResourceRegistry};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::protocol::rde::{self, EnumeratedOperation, OperationType};
use crate::protocol::{Eid, Tid};
use crate::requester::{InstanceIdDb, Requester};
use crate::sink::{DeviceSink, TaskSink};
use dashmap::DashMap;
use log::{info, warn};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

/// Identity and handles for one managed device.
#[derive(Clone)]
pub struct DeviceContext {
    pub uuid: String,
    pub eid: Eid,
    pub tid: Tid,
    pub device: Arc<Mutex<Device>>,
}

/// Top-level RDE manager.
pub struct RdeManager {
    requester: Arc<Requester>,
    iid_db: Arc<InstanceIdDb>,
    cfg: Config,
    devices: DashMap<String, DeviceContext>,
    tasks: DashMap<u16, Arc<OperationTask>>,
    task_sink: Arc<dyn TaskSink>,
    device_sink: Arc<dyn DeviceSink>,
}

impl RdeManager {
    pub fn new(
        requester: Arc<Requester>,
        iid_db: Arc<InstanceIdDb>,
        cfg: &Config,
        task_sink: Arc<dyn TaskSink>,
        device_sink: Arc<dyn DeviceSink>,
    ) -> Self {
        Self {
            requester,
            iid_db,
            cfg: cfg.clone(),
            devices: DashMap::new(),
            tasks: DashMap::new(),
            task_sink,
            device_sink,
        }
    }

    /// Entry point for the `DiscoveryComplete` signal: construct the
    /// device from its Redfish resource PDR payloads and run the
    /// discovery session to completion.
    pub async fn handle_discovery_complete(
        &self,
        eid: Eid,
        tid: Tid,
        uuid: &str,
        pdr_payloads: &[Vec<u8>],
    ) -> Result<()> {
        info!(
            "[rde] device appeared: uuid={} eid={} tid={} ({} resource PDRs)",
            uuid,
            eid,
            tid,
            pdr_payloads.len()
        );
        let dictionaries = DictionaryManager::new(&self.cfg, uuid)?;
        let mut device = Device::new(uuid.to_string(), eid, tid, dictionaries);
        device.registry.load_from_resource_pdrs(pdr_payloads)?;
        if let Err(e) = device.registry.save(&self.cfg.registry_path) {
            warn!("[rde] resource registry not persisted: {}", e);
        }

        let device = Arc::new(Mutex::new(device));
        self.devices.insert(
            uuid.to_string(),
            DeviceContext {
                uuid: uuid.to_string(),
                eid,
                tid,
                device: Arc::clone(&device),
            },
        );

        DiscoverySession::new(
            device,
            Arc::clone(&self.requester),
            Arc::clone(&self.iid_db),
            self.cfg.clone(),
            Arc::clone(&self.device_sink),
        )
        .run()
        .await
    }

    /// Drop a device whose endpoint disappeared.
    pub fn remove_device(&self, uuid: &str) {
        if self.devices.remove(uuid).is_some() {
            info!("[rde] device {} removed", uuid);
        }
    }

    pub fn device(&self, uuid: &str) -> Result<DeviceContext> {
        self.devices
            .get(uuid)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::NotFound(format!("no RDE device with UUID {}", uuid)))
    }

    /// Launch a Redfish operation. Returns the task path immediately;
    /// progress and the terminal result arrive as `TaskUpdated`
    /// emissions on that path.
    pub fn start_redfish_operation(&self, request: OperationRequest) -> Result<String> {
        let ctx = self.device(&request.device_uuid)?;
        {
            let device = ctx.device.lock();
            if device.state() != DeviceState::Operational {
                return Err(Error::NotReady);
            }
        }

        // Exactly one active task per operation ID.
        if let Some(existing) = self.tasks.get(&request.operation_id) {
            if !existing.state().is_terminal() {
                return Err(Error::StateViolation("operation id already active"));
            }
        }
        let task = Arc::new(OperationTask::new(request.operation_id));
        let task_path = task.task_path.clone();
        self.tasks.insert(request.operation_id, Arc::clone(&task));

        let session = OperationSession::new(
            ctx.device,
            Arc::clone(&self.requester),
            Arc::clone(&self.iid_db),
            self.cfg.clone(),
            task,
            Arc::clone(&self.task_sink),
            request,
        );
        tokio::spawn(async move { session.run().await });
        Ok(task_path)
    }

    /// Cancel a running operation. Returns false when the task is
    /// unknown or already terminal.
    pub fn cancel_operation(&self, operation_id: u16) -> bool {
        self.tasks
            .get(&operation_id)
            .map(|task| task.cancel())
            .unwrap_or(false)
    }

    pub fn task(&self, operation_id: u16) -> Option<Arc<OperationTask>> {
        self.tasks.get(&operation_id).map(|t| Arc::clone(&t))
    }

    /// Operations the device negotiated support for.
    pub fn get_supported_operations(&self, uuid: &str) -> Result<Vec<OperationType>> {
        let ctx = self.device(uuid)?;
        let device = ctx.device.lock();
        Ok(device.supported_operations())
    }

    /// Registry snapshot keyed by resource ID, for schema introspection.
    pub fn get_device_schema_info(&self, uuid: &str) -> Result<serde_json::Value> {
        let ctx = self.device(uuid)?;
        let device = ctx.device.lock();
        let mut out = serde_json::Map::new();
        for info in device.registry.resources() {
            out.insert(
                info.resource_id.to_string(),
                json!({
                    "subUri": info.uri,
                    "schemaName": info.schema_name,
                    "schemaVersion": info.schema_version,
                    "schemaClass": info.schema_class as u8,
                    "ProposedContainingResourceName": info.proposed_containing_resource,
                    "operations": info.operations.len(),
                }),
            );
        }
        Ok(serde_json::Value::Object(out))
    }

    /// Fetch a resource's ETag and record it in the device metadata.
    pub async fn get_resource_etag(&self, uuid: &str, resource_id: u32) -> Result<String> {
        let ctx = self.device(uuid)?;
        let iid = self.iid_db.alloc(ctx.tid)?;
        let req = rde::encode_get_resource_etag_req(iid.id(), resource_id);
        let resp = self.requester.send_recv(ctx.tid, req).await?;
        let etag = rde::decode_get_resource_etag_resp(&resp)?;
        ctx.device.lock().metadata.etag = etag.clone();
        Ok(etag)
    }

    /// Query the device-side status of a long-running operation.
    pub async fn operation_status(
        &self,
        uuid: &str,
        resource_id: u32,
        operation_id: u16,
    ) -> Result<rde::OperationResp> {
        let ctx = self.device(uuid)?;
        let iid = self.iid_db.alloc(ctx.tid)?;
        let req = rde::encode_rde_operation_status_req(iid.id(), resource_id, operation_id);
        let resp = self.requester.send_recv(ctx.tid, req).await?;
        rde::decode_rde_operation_status_resp(&resp)
    }

    /// Enumerate operations the device currently tracks.
    pub async fn operation_enumerate(&self, uuid: &str) -> Result<Vec<EnumeratedOperation>> {
        let ctx = self.device(uuid)?;
        let iid = self.iid_db.alloc(ctx.tid)?;
        let req = rde::encode_rde_operation_enumerate_req(iid.id());
        let resp = self.requester.send_recv(ctx.tid, req).await?;
        rde::decode_rde_operation_enumerate_resp(&resp)
    }
}
