// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MCTP transport adapter.
//!
//! Thin wrapper over the two kernel interfaces used to reach MCTP
//! endpoints: the mctp-demux daemon socket (AF_UNIX seqpacket) and the
//! in-kernel AF_MCTP socket. Both expose the same [`MctpTransport`] seam,
//! so the requester runtime and the tests are back-end agnostic.
//!
//! The adapter pre-populates an EID<->TID identity map across the valid
//! EID range. The demux daemon broadcasts responses to every connected
//! listener; without a coherent mapping on all listeners, responses for
//! another process would fail address resolution here instead of being
//! dropped by correlation.

mod afmctp;
mod demux;

pub use afmctp::AfMctpTransport;
pub use demux::MctpDemuxTransport;

use crate::config::{Config, MCTP_EID_VALID_MAX, MCTP_EID_VALID_MIN};
use crate::error::{Error, Result};
use crate::protocol::{Eid, Tid};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::Arc;

/// Object-safe async transport seam.
///
/// `send` transmits one complete PLDM message to the terminus; `recv`
/// resolves with the next inbound message. Both back-ends are driven by
/// the socket fd through the runtime's reactor.
#[async_trait]
pub trait MctpTransport: Send + Sync {
    async fn send(&self, tid: Tid, msg: &[u8]) -> Result<()>;
    async fn recv(&self) -> Result<(Tid, Vec<u8>)>;

    /// Pollable fd for callers integrating a foreign event loop.
    fn event_fd(&self) -> Option<RawFd> {
        None
    }
}

/// Back-end selection, decided at init time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportBackend {
    /// mctp-demux daemon socket.
    Demux,
    /// Kernel AF_MCTP socket.
    AfMctp,
}

/// Initialize the selected back-end. Failure here is fatal to the agent;
/// callers treat a missing transport the way they treat allocation failure.
pub fn init(backend: TransportBackend, cfg: &Config) -> Result<Arc<dyn MctpTransport>> {
    let _ = cfg;
    match backend {
        TransportBackend::Demux => Ok(Arc::new(MctpDemuxTransport::new()?)),
        TransportBackend::AfMctp => Ok(Arc::new(AfMctpTransport::new()?)),
    }
}

/// EID<->TID translation table.
#[derive(Debug, Default)]
pub struct TidMap {
    inner: Mutex<TidMapInner>,
}

#[derive(Debug, Default)]
struct TidMapInner {
    eid_to_tid: HashMap<Eid, Tid>,
    tid_to_eid: HashMap<Tid, Eid>,
}

impl TidMap {
    /// Identity mapping over the valid EID range 8..255, excluding the
    /// null (0), reserved (1..=7) and broadcast (255) EIDs of DSP0236.
    /// TIDs 0 and 0xff are reserved by DSP0240 and overlap those EIDs,
    /// so no extra filtering is needed.
    pub fn identity_seeded() -> Self {
        let map = TidMap::default();
        {
            let mut inner = map.inner.lock();
            for eid in MCTP_EID_VALID_MIN..MCTP_EID_VALID_MAX {
                inner.eid_to_tid.insert(eid, eid);
                inner.tid_to_eid.insert(eid, eid);
            }
        }
        map
    }

    pub fn map_tid(&self, eid: Eid, tid: Tid) -> Result<()> {
        if !Config::eid_is_valid(eid) {
            return Err(Error::NotFound(format!("EID {} outside valid range", eid)));
        }
        if !Config::tid_is_valid(tid) {
            return Err(Error::NotFound(format!("TID {} is reserved", tid)));
        }
        let mut inner = self.inner.lock();
        inner.eid_to_tid.insert(eid, tid);
        inner.tid_to_eid.insert(tid, eid);
        Ok(())
    }

    pub fn unmap_tid(&self, tid: Tid) {
        let mut inner = self.inner.lock();
        if let Some(eid) = inner.tid_to_eid.remove(&tid) {
            inner.eid_to_tid.remove(&eid);
        }
    }

    pub fn to_eid(&self, tid: Tid) -> Result<Eid> {
        if !Config::tid_is_valid(tid) {
            return Err(Error::NotFound(format!("TID {} is reserved", tid)));
        }
        self.inner
            .lock()
            .tid_to_eid
            .get(&tid)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("no EID mapped for TID {}", tid)))
    }

    pub fn to_tid(&self, eid: Eid) -> Result<Tid> {
        if !Config::eid_is_valid(eid) {
            return Err(Error::NotFound(format!("EID {} outside valid range", eid)));
        }
        self.inner
            .lock()
            .eid_to_tid
            .get(&eid)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("no TID mapped for EID {}", eid)))
    }
}

/// Raw socket fd with close-on-drop, suitable for `AsyncFd`.
#[derive(Debug)]
pub(crate) struct OwnedSocket {
    fd: RawFd,
}

impl OwnedSocket {
    /// Takes ownership of an open, nonblocking socket fd.
    pub(crate) fn new(fd: RawFd) -> Self {
        Self { fd }
    }
}

impl AsRawFd for OwnedSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for OwnedSocket {
    fn drop(&mut self) {
        // Each back-end owns exactly its socket; failure paths during init
        // therefore tear down the back-end actually being constructed.
        unsafe {
            libc::close(self.fd);
        }
    }
}

pub(crate) fn last_os_error() -> Error {
    Error::TransportFailure(std::io::Error::last_os_error().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_map_covers_valid_eids() {
        let map = TidMap::identity_seeded();
        assert_eq!(map.to_tid(8).unwrap(), 8);
        assert_eq!(map.to_eid(254).unwrap(), 254);
        assert!(map.to_tid(0).is_err());
        assert!(map.to_tid(255).is_err());
        assert!(map.to_eid(0).is_err());
    }

    #[test]
    fn test_unmap_removes_both_directions() {
        let map = TidMap::identity_seeded();
        map.unmap_tid(20);
        assert!(map.to_eid(20).is_err());
        assert!(map.to_tid(20).is_err());
    }

    #[test]
    fn test_remap_overrides_identity() {
        let map = TidMap::identity_seeded();
        map.map_tid(30, 31).unwrap();
        assert_eq!(map.to_eid(31).unwrap(), 30);
    }

    #[test]
    fn test_reserved_values_rejected() {
        let map = TidMap::identity_seeded();
        assert!(map.map_tid(5, 5).is_err());
        assert!(map.map_tid(30, 0).is_err());
        assert!(map.map_tid(30, 255).is_err());
    }
}
