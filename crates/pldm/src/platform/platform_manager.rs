// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-terminus platform initialization (DSP0248 init sequence).
//!
//! Runs once per terminus: negotiate the event buffer, query event
//! synchrony support, paginate the PDR repository with multi-part record
//! reassembly, parse the records, and subscribe as event receiver when
//! the terminus supports async events. A failed step leaves
//! `initialized == false`; the terminus is retried on the next discovery
//! pass.

use super::TerminiMap;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::protocol::platform::{
    self, GetPdrReq, EVENT_GLOBAL_ENABLE_ASYNC, REPOSITORY_AVAILABLE,
};
use crate::protocol::{Tid, TransferFlag, TransferOp, CC_SUCCESS, TYPE_PLATFORM};
use crate::requester::{InstanceIdDb, Requester};
use log::{info, warn};
use std::collections::HashSet;
use std::sync::Arc;

pub struct PlatformManager {
    requester: Arc<Requester>,
    iid_db: Arc<InstanceIdDb>,
    termini: TerminiMap,
    cfg: Config,
}

impl PlatformManager {
    pub fn new(
        requester: Arc<Requester>,
        iid_db: Arc<InstanceIdDb>,
        termini: TerminiMap,
        cfg: &Config,
    ) -> Self {
        Self {
            requester,
            iid_db,
            termini,
            cfg: cfg.clone(),
        }
    }

    /// Initialize every terminus that supports the platform type and has
    /// not completed initialization yet.
    pub async fn init_termini(&self) -> Result<()> {
        let pending: Vec<Tid> = self
            .termini
            .lock()
            .values()
            .filter(|t| !t.initialized && t.supports(TYPE_PLATFORM))
            .map(|t| t.tid)
            .collect();

        for tid in pending {
            match self.init_terminus(tid).await {
                Ok(()) => {
                    if let Some(t) = self.termini.lock().get_mut(&tid) {
                        t.initialized = true;
                    }
                    info!("[platform-mc] TID {} initialized", tid);
                }
                Err(e) => warn!("[platform-mc] TID {} initialization failed: {}", tid, e),
            }
        }
        Ok(())
    }

    async fn init_terminus(&self, tid: Tid) -> Result<()> {
        // Step 1: event buffer size, min(mc, device), 256 on failure.
        let device_buffer = match self.event_message_buffer_size(tid).await {
            Ok(size) => size,
            Err(e) => {
                warn!(
                    "[platform-mc] TID {}: EventMessageBufferSize failed ({}), using default",
                    tid, e
                );
                crate::config::DEFAULT_EVENT_BUFFER_SIZE
            }
        };
        let negotiated = self.cfg.event_buffer_size.min(device_buffer);

        // Step 2: synchrony support; cleared when the query fails.
        let synchrony = match self.event_message_supported(tid).await {
            Ok(resp) => resp.synchrony_supported,
            Err(e) => {
                warn!(
                    "[platform-mc] TID {}: EventMessageSupported failed ({}), clearing synchrony",
                    tid, e
                );
                0
            }
        };

        {
            let mut termini = self.termini.lock();
            let t = termini
                .get_mut(&tid)
                .ok_or_else(|| Error::NotFound(format!("TID {} vanished during init", tid)))?;
            t.max_buffer_size = negotiated;
            t.synchrony_supported = synchrony;
        }

        // Steps 3+4: repository info then pagination.
        let pdrs = self.get_pdrs(tid).await?;

        // Step 5: parse into typed entities.
        {
            let mut termini = self.termini.lock();
            let t = termini
                .get_mut(&tid)
                .ok_or_else(|| Error::NotFound(format!("TID {} vanished during init", tid)))?;
            t.pdrs = pdrs;
            t.parse_pdrs();
            info!(
                "[platform-mc] TID {}: {} PDRs, {} sensors, {} effecters",
                tid,
                t.pdrs.len(),
                t.numeric_sensors.len(),
                t.numeric_effecters.len()
            );
        }

        // Step 6: subscribe for async events when supported.
        if synchrony & (1 << EVENT_GLOBAL_ENABLE_ASYNC) != 0 {
            if let Err(e) = self.set_event_receiver(tid).await {
                warn!("[platform-mc] TID {}: SetEventReceiver failed: {}", tid, e);
            }
        }

        Ok(())
    }

    async fn event_message_buffer_size(&self, tid: Tid) -> Result<u16> {
        let iid = self.iid_db.alloc(tid)?;
        let req =
            platform::encode_event_message_buffer_size_req(iid.id(), self.cfg.event_buffer_size);
        let resp = self.requester.send_recv(tid, req).await?;
        let (cc, size) = platform::decode_event_message_buffer_size_resp(&resp)?;
        if cc != CC_SUCCESS {
            return Err(Error::CompletionCode(cc));
        }
        Ok(size)
    }

    async fn event_message_supported(
        &self,
        tid: Tid,
    ) -> Result<platform::EventMessageSupportedResp> {
        let iid = self.iid_db.alloc(tid)?;
        let req = platform::encode_event_message_supported_req(iid.id(), 1);
        let resp = self.requester.send_recv(tid, req).await?;
        let decoded = platform::decode_event_message_supported_resp(&resp)?;
        if decoded.cc != CC_SUCCESS {
            return Err(Error::CompletionCode(decoded.cc));
        }
        Ok(decoded)
    }

    async fn set_event_receiver(&self, tid: Tid) -> Result<()> {
        let iid = self.iid_db.alloc(tid)?;
        let req = platform::encode_set_event_receiver_req(
            iid.id(),
            EVENT_GLOBAL_ENABLE_ASYNC,
            0x00, // MCTP transport
            self.cfg.local_eid,
            0,
        );
        let resp = self.requester.send_recv(tid, req).await?;
        let cc = platform::decode_set_event_receiver_resp(&resp)?;
        if cc != CC_SUCCESS {
            return Err(Error::CompletionCode(cc));
        }
        Ok(())
    }

    /// Paginate the PDR repository. Multi-part records keep the change
    /// number from the first part and advance only the data-transfer
    /// handle; pagination is bounded by the reported record count and a
    /// revisited-handle cycle check.
    pub async fn get_pdrs(&self, tid: Tid) -> Result<Vec<Vec<u8>>> {
        let (repository_state, record_count, largest_record) =
            match self.get_pdr_repository_info(tid).await {
                Ok(info) => (
                    info.repository_state,
                    // The count bounds our loop; saturating +1 tolerates
                    // repositories that grow one record mid-walk.
                    info.record_count.saturating_add(1),
                    info.largest_record_size.saturating_add(1),
                ),
                Err(e) => {
                    warn!(
                        "[platform-mc] TID {}: GetPDRRepositoryInfo failed ({}), proceeding unbounded",
                        tid, e
                    );
                    (REPOSITORY_AVAILABLE, u32::MAX, u32::MAX)
                }
            };
        if repository_state != REPOSITORY_AVAILABLE {
            return Err(Error::NotReady);
        }

        let mut pdrs: Vec<Vec<u8>> = Vec::new();
        let mut visited: HashSet<u32> = HashSet::new();
        let mut record_handle: u32 = 0;
        let mut received: u32 = 0;

        loop {
            let first = self
                .get_pdr(
                    tid,
                    &GetPdrReq {
                        record_handle,
                        data_transfer_handle: 0,
                        transfer_op: TransferOp::GetFirstPart,
                        request_count: self.cfg.pdr_request_count,
                        record_change_number: 0,
                    },
                )
                .await?;

            let mut record = first.record_data;
            let next_record_handle;

            if matches!(
                first.transfer_flag,
                TransferFlag::Start | TransferFlag::StartAndEnd
            ) && first.next_data_transfer_handle == 0
            {
                // Single-part record.
                next_record_handle = first.next_record_handle;
            } else {
                // Multi-part: the change number is pinned to the first part.
                let change_num = crate::protocol::pdr::PdrHeader::decode(&record)
                    .map(|hdr| hdr.record_change_num)
                    .unwrap_or(0);
                let mut data_handle = first.next_data_transfer_handle;
                let mut assembled = record.len() as u32;
                next_record_handle = loop {
                    let part = self
                        .get_pdr(
                            tid,
                            &GetPdrReq {
                                record_handle,
                                data_transfer_handle: data_handle,
                                transfer_op: TransferOp::GetNextPart,
                                request_count: self.cfg.pdr_request_count,
                                record_change_number: change_num,
                            },
                        )
                        .await?;
                    assembled += part.record_data.len() as u32;
                    record.extend_from_slice(&part.record_data);
                    if part.transfer_flag.is_final() || part.next_data_transfer_handle == 0 {
                        break part.next_record_handle;
                    }
                    if assembled >= largest_record {
                        return Err(Error::DecodeError(format!(
                            "record {} exceeds largest record size {}",
                            record_handle, largest_record
                        )));
                    }
                    data_handle = part.next_data_transfer_handle;
                };
            }

            pdrs.push(record);
            visited.insert(record_handle);
            received += 1;

            if next_record_handle == 0 || received >= record_count {
                break;
            }
            if visited.contains(&next_record_handle) {
                return Err(Error::PdrCycle(next_record_handle));
            }
            record_handle = next_record_handle;
        }

        Ok(pdrs)
    }

    async fn get_pdr_repository_info(&self, tid: Tid) -> Result<platform::PdrRepositoryInfo> {
        let iid = self.iid_db.alloc(tid)?;
        let req = platform::encode_get_pdr_repository_info_req(iid.id());
        let resp = self.requester.send_recv(tid, req).await?;
        let decoded = platform::decode_get_pdr_repository_info_resp(&resp)?;
        if decoded.cc != CC_SUCCESS {
            return Err(Error::CompletionCode(decoded.cc));
        }
        Ok(decoded)
    }

    async fn get_pdr(&self, tid: Tid, req: &GetPdrReq) -> Result<platform::GetPdrResp> {
        let iid = self.iid_db.alloc(tid)?;
        let msg = platform::encode_get_pdr_req(iid.id(), req);
        let resp = self.requester.send_recv(tid, msg).await?;
        let decoded = platform::decode_get_pdr_resp(&resp)?;
        if decoded.cc != CC_SUCCESS {
            return Err(Error::CompletionCode(decoded.cc));
        }
        Ok(decoded)
    }
}
