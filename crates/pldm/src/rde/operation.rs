// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RDE operation workflow: Init -> (multipart send/receive) -> Complete.
//!
//! Every terminal outcome - success, device rejection, timeout,
//! cancellation - emits exactly one `TaskUpdated` on the task's path.
//! Cancellation is a state transition: in-flight round trips drain
//! through their own timeouts, and the session checks the task state
//! after each await before doing further work.

use super::bej::{self, BejDictionary, Dictionaries};
use super::device::{Device, DeviceState, OpState};
use super::multipart::{self, MultipartContext};
use crate::config::{Config, OPERATION_TASK_PATH};
use crate::error::{Error, Result};
use crate::protocol::rde::{
    self, OperationInitReq, OperationType, SchemaClass, OPERATION_INIT_REQ_FIXED_BYTES,
    OP_FLAG_CONTAINS_REQUEST_PAYLOAD,
};
use crate::protocol::{Eid, Tid, HDR_SIZE};
use crate::requester::{InstanceIdDb, Requester};
use crate::sink::TaskSink;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;

/// How the caller delivered the payload string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource {
    /// The payload is embedded in the request.
    Inline,
    /// The payload string is a path to read the payload from.
    FilePath,
}

/// Payload encoding on the wire side of the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingFormat {
    /// JSON text; translated to BEJ against the schema dictionaries.
    Json,
    /// Already-encoded BEJ bytes, passed through untranslated.
    Bej,
}

/// A client request to run one Redfish operation.
#[derive(Debug, Clone)]
pub struct OperationRequest {
    pub operation_id: u16,
    pub operation_type: OperationType,
    pub target_uri: String,
    pub device_uuid: String,
    pub eid: Eid,
    pub payload: String,
    pub payload_source: PayloadSource,
    pub encoding: EncodingFormat,
    pub session_id: String,
}

/// Tracking object for one operation; exactly one active task per
/// operation ID.
#[derive(Debug)]
pub struct OperationTask {
    pub operation_id: u16,
    pub task_path: String,
    state: Mutex<OpState>,
}

impl OperationTask {
    pub fn new(operation_id: u16) -> Self {
        Self {
            operation_id,
            task_path: format!("{}/{}", OPERATION_TASK_PATH, operation_id),
            state: Mutex::new(OpState::OperationQueued),
        }
    }

    pub fn state(&self) -> OpState {
        *self.state.lock()
    }

    pub fn set_state(&self, state: OpState) {
        *self.state.lock() = state;
    }

    /// Move to `Cancelled` unless already terminal. Late responses are
    /// then ignored by the session's state checks; no abort command is
    /// defined by the negotiated protocol version, so none is sent.
    pub fn cancel(&self) -> bool {
        let mut state = self.state.lock();
        if state.is_terminal() {
            return false;
        }
        *state = OpState::Cancelled;
        true
    }
}

pub struct OperationSession {
    device: Arc<Mutex<Device>>,
    requester: Arc<Requester>,
    iid_db: Arc<InstanceIdDb>,
    cfg: Config,
    task: Arc<OperationTask>,
    sink: Arc<dyn TaskSink>,
    request: OperationRequest,
}

impl OperationSession {
    pub fn new(
        device: Arc<Mutex<Device>>,
        requester: Arc<Requester>,
        iid_db: Arc<InstanceIdDb>,
        cfg: Config,
        task: Arc<OperationTask>,
        sink: Arc<dyn TaskSink>,
        request: OperationRequest,
    ) -> Self {
        Self {
            device,
            requester,
            iid_db,
            cfg,
            task,
            sink,
            request,
        }
    }

    /// Drive the operation to a terminal state and emit the task update.
    pub async fn run(&self) {
        if self.task.state().is_terminal() {
            // Cancelled before it ever ran; nothing to emit.
            return;
        }
        self.task.set_state(OpState::OperationExecuting);
        match self.execute().await {
            Ok(payload) => {
                if self.task.state() == OpState::Cancelled {
                    debug!(
                        "[rde] operation {} finished after cancellation, suppressing result",
                        self.request.operation_id
                    );
                    return;
                }
                self.task.set_state(OpState::OperationCompleted);
                self.sink.task_updated(
                    &self.task.task_path,
                    &payload,
                    OpState::OperationCompleted as u16,
                );
            }
            Err(e) => {
                warn!(
                    "[rde] operation {} on {} failed: {}",
                    self.request.operation_id, self.request.target_uri, e
                );
                let state = match e {
                    Error::Timeout => OpState::TimedOut,
                    Error::StateViolation(_) => OpState::Cancelled,
                    _ => OpState::OperationFailed,
                };
                if self.task.state() != OpState::Cancelled {
                    self.task.set_state(state);
                }
                // Every failure surfaces the same way on the task path.
                self.sink.task_updated(
                    &self.task.task_path,
                    "{}",
                    OpState::OperationFailed as u16,
                );
            }
        }
    }

    fn ensure_active(&self) -> Result<()> {
        if self.task.state() == OpState::Cancelled {
            return Err(Error::StateViolation("operation cancelled"));
        }
        Ok(())
    }

    async fn execute(&self) -> Result<String> {
        let op_id = self.request.operation_id;
        let (tid, resource_id, chunk) = {
            let device = self.device.lock();
            if device.state() != DeviceState::Operational && device.state() != DeviceState::Busy {
                return Err(Error::NotReady);
            }
            (
                device.tid,
                device.registry.uri_to_id(&self.request.target_uri)?,
                device.metadata.effective_chunk_size(),
            )
        };

        // Stage the request payload, translating JSON to BEJ.
        let (request_payload, staged_multipart) = self.stage_payload(resource_id, chunk)?;

        // Nonzero staging handle tells the device a RDEMultipartSend
        // follows; zero means everything the operation needs is inline.
        let send_handle = if staged_multipart.is_some() {
            0x5e00_0000 | u32::from(op_id)
        } else {
            0
        };
        let mut flags = 0u8;
        if !request_payload.is_empty() {
            flags |= OP_FLAG_CONTAINS_REQUEST_PAYLOAD;
        }

        let init = OperationInitReq {
            resource_id,
            operation_id: op_id,
            operation_type: self.request.operation_type,
            operation_flags: flags,
            send_data_transfer_handle: send_handle,
            operation_locator: Vec::new(),
            request_payload,
        };

        let iid = self.iid_db.alloc(tid)?;
        let msg = rde::encode_rde_operation_init_req(iid.id(), &init);
        let resp = self.requester.send_recv(tid, msg).await?;
        drop(iid);
        self.ensure_active()?;
        let init_resp = rde::decode_rde_operation_init_resp(&resp)?;

        if !init_resp.etag.is_empty() {
            self.device.lock().metadata.etag = init_resp.etag.clone();
        }

        // Outbound payload that did not fit inline goes out now.
        if let Some(staged) = staged_multipart {
            let ctx =
                MultipartContext::new(&self.requester, &self.iid_db, tid, op_id, chunk, &self.cfg);
            multipart::send(&ctx, send_handle, &staged).await?;
            self.ensure_active()?;
        }

        // Inbound result: inline when the handle is zero, multipart
        // otherwise.
        let response_bytes = if init_resp.result_transfer_handle == 0 {
            init_resp.response_payload
        } else {
            info!(
                "[rde] operation {}: multipart result via handle {}",
                op_id, init_resp.result_transfer_handle
            );
            let ctx =
                MultipartContext::new(&self.requester, &self.iid_db, tid, op_id, chunk, &self.cfg);
            let bytes = multipart::receive(&ctx, init_resp.result_transfer_handle).await?;
            self.ensure_active()?;
            bytes
        };

        let payload = if response_bytes.is_empty() {
            "{}".to_string()
        } else {
            let value = self.decode_response(resource_id, &response_bytes)?;
            serde_json::to_string(&value).map_err(|e| Error::DecodeError(e.to_string()))?
        };

        // Release device-side operation resources regardless of payload
        // shape.
        self.operation_complete(tid, resource_id, op_id).await?;
        Ok(payload)
    }

    /// Resolve and translate the request payload. Returns the inline
    /// bytes for the Init request and, when the encoded payload exceeds
    /// the inline capacity, the full payload staged for a multipart send.
    fn stage_payload(
        &self,
        resource_id: u32,
        chunk: u32,
    ) -> Result<(Vec<u8>, Option<Vec<u8>>)> {
        if self.request.operation_type == OperationType::Read
            || self.request.operation_type == OperationType::Head
            || self.request.operation_type == OperationType::Delete
        {
            return Ok((Vec::new(), None));
        }

        let raw = match self.request.payload_source {
            PayloadSource::Inline => self.request.payload.clone(),
            PayloadSource::FilePath => std::fs::read_to_string(&self.request.payload)?,
        };
        if raw.is_empty() {
            return Ok((Vec::new(), None));
        }

        let encoded = match self.request.encoding {
            EncodingFormat::Bej => raw.into_bytes(),
            EncodingFormat::Json => {
                let value: serde_json::Value = serde_json::from_str(&raw)
                    .map_err(|e| Error::EncodeError(format!("request payload not JSON: {}", e)))?;
                let (schema, annotation) = self.dictionaries(resource_id)?;
                bej::encode(
                    &value,
                    &Dictionaries {
                        schema: &schema,
                        annotation: &annotation,
                    },
                    SchemaClass::Major,
                )?
            }
        };

        // Inline capacity: negotiated chunk minus header, fixed Init
        // fields, and the (empty) operation locator.
        let inline_max = chunk as usize - (HDR_SIZE + OPERATION_INIT_REQ_FIXED_BYTES);
        if encoded.len() <= inline_max {
            Ok((encoded, None))
        } else {
            debug!(
                "[rde] operation {}: payload of {} bytes exceeds inline capacity {}, staging",
                self.request.operation_id,
                encoded.len(),
                inline_max
            );
            Ok((Vec::new(), Some(encoded)))
        }
    }

    fn decode_response(&self, resource_id: u32, bytes: &[u8]) -> Result<serde_json::Value> {
        let (schema, annotation) = self.dictionaries(resource_id)?;
        bej::decode(
            bytes,
            &Dictionaries {
                schema: &schema,
                annotation: &annotation,
            },
        )
    }

    /// Parse the device dictionaries for this resource out of the store.
    fn dictionaries(&self, resource_id: u32) -> Result<(BejDictionary, BejDictionary)> {
        let device = self.device.lock();
        let schema_bytes = device
            .dictionaries
            .get(resource_id, SchemaClass::Major)
            .filter(|d| d.is_complete())
            .map(|d| d.bytes().to_vec())
            .ok_or_else(|| {
                Error::NotFound(format!("no schema dictionary for resource {}", resource_id))
            })?;
        let annotation_bytes = device
            .dictionaries
            .annotation()
            .map(|d| d.bytes().to_vec())
            .ok_or_else(|| Error::NotFound("annotation dictionary unavailable".into()))?;
        drop(device);
        Ok((
            BejDictionary::parse(&schema_bytes)?,
            BejDictionary::parse(&annotation_bytes)?,
        ))
    }

    async fn operation_complete(&self, tid: Tid, resource_id: u32, op_id: u16) -> Result<()> {
        let iid = self.iid_db.alloc(tid)?;
        let msg = rde::encode_rde_operation_complete_req(iid.id(), resource_id, op_id);
        let resp = self.requester.send_recv(tid, msg).await?;
        let cc = rde::decode_rde_operation_complete_resp(&resp)?;
        if cc != crate::protocol::CC_SUCCESS {
            return Err(Error::RdeCompletion(
                crate::error::RdeCompletionCode::from_raw(cc),
            ));
        }
        Ok(())
    }
}
