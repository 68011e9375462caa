// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RDE discovery session.
//!
//! One straight-line workflow per device: NegotiateRedfishParameters,
//! NegotiateMediumParameters, then one GetSchemaDictionary + multipart
//! receive per Major-schema resource, sequentially - devices cannot be
//! assumed to tolerate concurrent dictionary transfers. Success flips
//! the device to `Operational`; any failure marks the negotiation
//! `Failed` and routes the device to `Unreachable` or `Disabled`
//! depending on whether the transport or the protocol gave out.

use super::device::{Device, DeviceCapabilities, DeviceState, FeatureSupport, NegotiationStatus};
use super::multipart::{self, MultipartContext};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::protocol::rde::{self, SchemaClass};
use crate::protocol::Tid;
use crate::requester::{InstanceIdDb, Requester};
use crate::sink::DeviceSink;
use log::{info, warn};
use parking_lot::Mutex;
use std::sync::Arc;

pub struct DiscoverySession {
    device: Arc<Mutex<Device>>,
    requester: Arc<Requester>,
    iid_db: Arc<InstanceIdDb>,
    cfg: Config,
    sink: Arc<dyn DeviceSink>,
}

impl DiscoverySession {
    pub fn new(
        device: Arc<Mutex<Device>>,
        requester: Arc<Requester>,
        iid_db: Arc<InstanceIdDb>,
        cfg: Config,
        sink: Arc<dyn DeviceSink>,
    ) -> Self {
        Self {
            device,
            requester,
            iid_db,
            cfg,
            sink,
        }
    }

    pub async fn run(&self) -> Result<()> {
        let (tid, uuid) = {
            let mut device = self.device.lock();
            device.set_state(DeviceState::Discovering);
            device.set_negotiation_status(NegotiationStatus::InProgress);
            (device.tid, device.uuid.clone())
        };
        self.sink.device_state_changed(&uuid, DeviceState::Discovering);
        info!("[rde] discovery started for device {} (TID {})", uuid, tid);

        match self.run_inner(tid).await {
            Ok(()) => {
                {
                    let mut device = self.device.lock();
                    device.set_negotiation_status(NegotiationStatus::Success);
                    device.set_state(DeviceState::Operational);
                    device.mark_initialized();
                }
                self.sink.negotiation_status(&uuid, NegotiationStatus::Success);
                self.sink
                    .device_state_changed(&uuid, DeviceState::Operational);
                info!("[rde] discovery complete for device {}", uuid);
                Ok(())
            }
            Err(e) => {
                let failed_state = match e {
                    Error::Timeout | Error::TransportFailure(_) | Error::IoError(_) => {
                        DeviceState::Unreachable
                    }
                    _ => DeviceState::Disabled,
                };
                {
                    let mut device = self.device.lock();
                    device.set_negotiation_status(NegotiationStatus::Failed);
                    device.set_state(failed_state);
                }
                self.sink.negotiation_status(&uuid, NegotiationStatus::Failed);
                self.sink.device_state_changed(&uuid, failed_state);
                warn!("[rde] discovery failed for device {}: {}", uuid, e);
                Err(e)
            }
        }
    }

    async fn run_inner(&self, tid: Tid) -> Result<()> {
        self.negotiate_redfish_parameters(tid).await?;
        self.negotiate_medium_parameters(tid).await?;
        self.fetch_dictionaries(tid).await
    }

    async fn negotiate_redfish_parameters(&self, tid: Tid) -> Result<()> {
        let (mc_concurrency, mc_features) = {
            let device = self.device.lock();
            (
                device.metadata.mc_concurrency,
                device.metadata.mc_feature_support.0,
            )
        };
        let iid = self.iid_db.alloc(tid)?;
        let req =
            rde::encode_negotiate_redfish_parameters_req(iid.id(), mc_concurrency, mc_features);
        let resp = self.requester.send_recv(tid, req).await?;
        let decoded = rde::decode_negotiate_redfish_parameters_resp(&resp)?;

        info!(
            "[rde] TID {}: device '{}' concurrency={} features=0x{:04x} caps=0x{:02x} sig=0x{:08x}",
            tid,
            decoded.device_provider_name,
            decoded.device_concurrency,
            decoded.device_features,
            decoded.device_capabilities,
            decoded.device_configuration_signature
        );

        let mut device = self.device.lock();
        device.metadata.device_concurrency = decoded.device_concurrency;
        device.metadata.dev_capabilities = DeviceCapabilities(decoded.device_capabilities);
        device.metadata.dev_feature_support = FeatureSupport(decoded.device_features);
        device.metadata.dev_config_signature = decoded.device_configuration_signature;
        device.metadata.dev_provider_name = decoded.device_provider_name;
        Ok(())
    }

    async fn negotiate_medium_parameters(&self, tid: Tid) -> Result<()> {
        let mc_chunk = self.device.lock().metadata.mc_max_chunk_size;
        let iid = self.iid_db.alloc(tid)?;
        let req = rde::encode_negotiate_medium_parameters_req(iid.id(), mc_chunk);
        let resp = self.requester.send_recv(tid, req).await?;
        let device_chunk = rde::decode_negotiate_medium_parameters_resp(&resp)?;

        info!(
            "[rde] TID {}: medium negotiated, mc chunk {} device chunk {}",
            tid, mc_chunk, device_chunk
        );
        self.device.lock().metadata.device_max_chunk_size = device_chunk;
        Ok(())
    }

    async fn fetch_dictionaries(&self, tid: Tid) -> Result<()> {
        if self.cfg.dict_bootstrap_trigger.exists() {
            // Bootstrap path: the dictionary manager restored persisted
            // dictionaries at construction; skip the wire transfers.
            info!("[rde] TID {}: dictionary bootstrap active, skipping retrieval", tid);
            return Ok(());
        }

        let (resources, chunk) = {
            let device = self.device.lock();
            (
                device.registry.major_resources(),
                device.metadata.effective_chunk_size(),
            )
        };

        for resource_id in resources {
            match self.fetch_dictionary(tid, resource_id, chunk).await {
                Ok(len) => info!(
                    "[rde] TID {}: dictionary for resource {} retrieved ({} bytes)",
                    tid, resource_id, len
                ),
                Err(e) => {
                    // One broken dictionary must not kill the rest of
                    // discovery; the resource simply stays untranslatable.
                    warn!(
                        "[rde] TID {}: dictionary for resource {} failed: {}",
                        tid, resource_id, e
                    );
                }
            }
        }
        Ok(())
    }

    async fn fetch_dictionary(&self, tid: Tid, resource_id: u32, chunk: u32) -> Result<usize> {
        let iid = self.iid_db.alloc(tid)?;
        let req = rde::encode_get_schema_dictionary_req(iid.id(), resource_id, SchemaClass::Major);
        let resp = self.requester.send_recv(tid, req).await?;
        let decoded = rde::decode_get_schema_dictionary_resp(&resp)?;
        drop(iid);

        let ctx = MultipartContext::new(&self.requester, &self.iid_db, tid, 0, chunk, &self.cfg);
        let bytes = multipart::receive(&ctx, decoded.transfer_handle).await?;
        let len = bytes.len();

        self.device
            .lock()
            .dictionaries
            .add_complete(resource_id, SchemaClass::Major, &bytes)?;
        Ok(len)
    }
}
