// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Terminus discovery: EID -> TID adoption and capability probing.
//!
//! For each discovered endpoint the sequence is GetTID, SetTID (adopting
//! the EID==TID convention), GetPLDMTypes, then GetPLDMCommands per
//! supported type. Endpoints that refuse to publish a usable TID are
//! skipped; a SetTID answered with UnsupportedCommand is tolerated
//! because many termini hardwire their TID.

use super::{TerminiMap, Terminus};
use crate::config::{Config, TID_POOL_SIZE};
use crate::error::{Error, Result};
use crate::protocol::base::{self, Ver32};
use crate::protocol::{Eid, Tid, CC_ERROR_UNSUPPORTED_CMD, CC_SUCCESS};
use crate::requester::{InstanceIdDb, Requester};
use log::{info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

pub struct TerminusManager {
    requester: Arc<Requester>,
    iid_db: Arc<InstanceIdDb>,
    termini: TerminiMap,
    pool: Mutex<TidPool>,
}

#[derive(Debug)]
struct TidPool {
    in_use: [bool; TID_POOL_SIZE],
    eid_to_tid: HashMap<Eid, Tid>,
    tid_to_eid: HashMap<Tid, Eid>,
}

impl TerminusManager {
    pub fn new(
        requester: Arc<Requester>,
        iid_db: Arc<InstanceIdDb>,
        termini: TerminiMap,
        _cfg: &Config,
    ) -> Self {
        Self {
            requester,
            iid_db,
            termini,
            pool: Mutex::new(TidPool {
                in_use: [false; TID_POOL_SIZE],
                eid_to_tid: HashMap::new(),
                tid_to_eid: HashMap::new(),
            }),
        }
    }

    /// Probe a batch of endpoints and construct termini for the ones that
    /// respond. Returns the TIDs now present in the table.
    pub async fn discover(&self, eids: &[Eid]) -> Vec<Tid> {
        let mut discovered = Vec::new();
        for &eid in eids {
            if !Config::eid_is_valid(eid) {
                warn!("[platform-mc] skipping invalid EID {}", eid);
                continue;
            }
            match self.init_endpoint(eid).await {
                Ok(tid) => discovered.push(tid),
                Err(e) => warn!("[platform-mc] endpoint EID {} not initialized: {}", eid, e),
            }
        }
        discovered
    }

    /// Tear down a terminus whose endpoint disappeared. Its sensors and
    /// effecters go with it.
    pub fn remove(&self, tid: Tid) {
        self.termini.lock().remove(&tid);
        self.unmap_tid(tid);
        info!("[platform-mc] terminus TID {} removed", tid);
    }

    async fn init_endpoint(&self, eid: Eid) -> Result<Tid> {
        // Before a TID is adopted, the identity mapping routes by EID.
        let probe_tid: Tid = eid;

        let published = self.get_tid(probe_tid).await?;
        if published == 0 || published == 0xff {
            return Err(Error::NotFound(format!(
                "EID {} refuses to publish a valid TID (got 0x{:02x})",
                eid, published
            )));
        }

        // Adopt TID := EID so demux-broadcast responses stay routable.
        let cc = self.set_tid(probe_tid, eid).await?;
        match cc {
            CC_SUCCESS | CC_ERROR_UNSUPPORTED_CMD => {}
            other => return Err(Error::CompletionCode(other)),
        }

        let tid = self.map_tid(eid)?;

        let types = self.get_types(tid).await?;
        let mut terminus = Terminus::new(eid, tid, types);

        for pldm_type in 0..64u8 {
            if types & (1u64 << pldm_type) == 0 {
                continue;
            }
            match self.get_commands(tid, pldm_type).await {
                Ok(bitmap) => {
                    terminus.supported_commands.insert(pldm_type, bitmap);
                }
                Err(e) => warn!(
                    "[platform-mc] TID {}: GetPLDMCommands(type {}) failed: {}",
                    tid, pldm_type, e
                ),
            }
        }

        info!(
            "[platform-mc] terminus TID {} created (types bitmap 0x{:016x})",
            tid, types
        );
        self.termini.lock().insert(tid, terminus);
        Ok(tid)
    }

    async fn get_tid(&self, tid: Tid) -> Result<u8> {
        let iid = self.iid_db.alloc(tid)?;
        let req = base::encode_get_tid_req(iid.id());
        let resp = self.requester.send_recv(tid, req).await?;
        let decoded = base::decode_get_tid_resp(&resp)?;
        if decoded.cc != CC_SUCCESS {
            return Err(Error::CompletionCode(decoded.cc));
        }
        Ok(decoded.tid)
    }

    async fn set_tid(&self, addr: Tid, tid: Tid) -> Result<u8> {
        let iid = self.iid_db.alloc(addr)?;
        let req = base::encode_set_tid_req(iid.id(), tid);
        let resp = self.requester.send_recv(addr, req).await?;
        base::decode_set_tid_resp(&resp)
    }

    async fn get_types(&self, tid: Tid) -> Result<u64> {
        let iid = self.iid_db.alloc(tid)?;
        let req = base::encode_get_types_req(iid.id());
        let resp = self.requester.send_recv(tid, req).await?;
        let decoded = base::decode_get_types_resp(&resp)?;
        if decoded.cc != CC_SUCCESS {
            return Err(Error::CompletionCode(decoded.cc));
        }
        Ok(decoded.types)
    }

    async fn get_commands(
        &self,
        tid: Tid,
        pldm_type: u8,
    ) -> Result<[u8; base::PLDM_COMMANDS_BITMAP_LEN]> {
        let iid = self.iid_db.alloc(tid)?;
        let req = base::encode_get_commands_req(iid.id(), pldm_type, Ver32::ABSENT);
        let resp = self.requester.send_recv(tid, req).await?;
        let decoded = base::decode_get_commands_resp(&resp)?;
        if decoded.cc != CC_SUCCESS {
            return Err(Error::CompletionCode(decoded.cc));
        }
        Ok(decoded.commands)
    }

    /// Allocate a TID for an endpoint. The EID value is preferred so the
    /// identity convention holds; any free slot is the fallback.
    pub fn map_tid(&self, eid: Eid) -> Result<Tid> {
        let mut pool = self.pool.lock();
        if let Some(&tid) = pool.eid_to_tid.get(&eid) {
            return Ok(tid);
        }
        let preferred = usize::from(eid);
        let slot = if preferred < TID_POOL_SIZE && !pool.in_use[preferred] {
            preferred
        } else {
            (1..TID_POOL_SIZE)
                .find(|&i| !pool.in_use[i])
                .ok_or_else(|| Error::NotFound("TID pool exhausted".into()))?
        };
        let tid = slot as Tid;
        pool.in_use[slot] = true;
        pool.eid_to_tid.insert(eid, tid);
        pool.tid_to_eid.insert(tid, eid);
        Ok(tid)
    }

    pub fn unmap_tid(&self, tid: Tid) {
        let mut pool = self.pool.lock();
        if let Some(eid) = pool.tid_to_eid.remove(&tid) {
            pool.eid_to_tid.remove(&eid);
        }
        pool.in_use[usize::from(tid)] = false;
    }

    pub fn to_eid(&self, tid: Tid) -> Result<Eid> {
        if !Config::tid_is_valid(tid) {
            return Err(Error::NotFound(format!("TID {} is reserved", tid)));
        }
        self.pool
            .lock()
            .tid_to_eid
            .get(&tid)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("TID {} not mapped", tid)))
    }

    pub fn to_tid(&self, eid: Eid) -> Result<Tid> {
        if !Config::eid_is_valid(eid) {
            return Err(Error::NotFound(format!("EID {} outside valid range", eid)));
        }
        self.pool
            .lock()
            .eid_to_tid
            .get(&eid)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("EID {} not mapped", eid)))
    }

    pub fn termini(&self) -> &TerminiMap {
        &self.termini
    }
}
