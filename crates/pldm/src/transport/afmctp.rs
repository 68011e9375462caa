// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Kernel AF_MCTP back-end.
//!
//! Uses the in-kernel MCTP datagram socket (Linux 5.15+). The message
//! type rides in `sockaddr_mctp`, so payloads on this path are bare PLDM
//! messages. The socket binds to any network/EID and owns its tag.

use super::{last_os_error, MctpTransport, OwnedSocket, TidMap};
use crate::config::MCTP_MSG_TYPE_PLDM;
use crate::error::{Error, Result};
use crate::protocol::{Eid, Tid};
use async_trait::async_trait;
use std::os::fd::{AsRawFd, RawFd};
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;

const AF_MCTP: libc::c_int = 45;
const MCTP_NET_ANY: u32 = 0;
const MCTP_ADDR_ANY: u8 = 0xff;
const MCTP_TAG_OWNER: u8 = 0x08;

const RECV_BUF_SIZE: usize = 4096;

/// `struct sockaddr_mctp` (linux/mctp.h).
#[repr(C)]
#[derive(Clone, Copy)]
struct SockaddrMctp {
    smctp_family: libc::sa_family_t,
    __smctp_pad0: u16,
    smctp_network: u32,
    smctp_addr: u8,
    smctp_type: u8,
    smctp_tag: u8,
    __smctp_pad1: u8,
}

impl SockaddrMctp {
    fn for_eid(eid: Eid) -> Self {
        Self {
            smctp_family: AF_MCTP as libc::sa_family_t,
            __smctp_pad0: 0,
            smctp_network: MCTP_NET_ANY,
            smctp_addr: eid,
            smctp_type: MCTP_MSG_TYPE_PLDM,
            smctp_tag: MCTP_TAG_OWNER,
            __smctp_pad1: 0,
        }
    }
}

pub struct AfMctpTransport {
    fd: AsyncFd<OwnedSocket>,
    tid_map: TidMap,
}

impl AfMctpTransport {
    pub fn new() -> Result<Self> {
        let raw = unsafe {
            libc::socket(
                AF_MCTP,
                libc::SOCK_DGRAM | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                0,
            )
        };
        if raw < 0 {
            return Err(last_os_error());
        }
        let sock = OwnedSocket::new(raw);

        // Listen for traffic from any interface.
        let addr = SockaddrMctp {
            smctp_family: AF_MCTP as libc::sa_family_t,
            __smctp_pad0: 0,
            smctp_network: MCTP_NET_ANY,
            smctp_addr: MCTP_ADDR_ANY,
            smctp_type: MCTP_MSG_TYPE_PLDM,
            smctp_tag: 0,
            __smctp_pad1: 0,
        };
        let rc = unsafe {
            libc::bind(
                sock.as_raw_fd(),
                std::ptr::addr_of!(addr).cast::<libc::sockaddr>(),
                std::mem::size_of::<SockaddrMctp>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(last_os_error());
        }

        Ok(Self {
            fd: AsyncFd::with_interest(sock, Interest::READABLE | Interest::WRITABLE)
                .map_err(|e| Error::TransportFailure(e.to_string()))?,
            tid_map: TidMap::identity_seeded(),
        })
    }

    pub fn tid_map(&self) -> &TidMap {
        &self.tid_map
    }
}

#[async_trait]
impl MctpTransport for AfMctpTransport {
    async fn send(&self, tid: Tid, msg: &[u8]) -> Result<()> {
        let eid = self.tid_map.to_eid(tid)?;
        let addr = SockaddrMctp::for_eid(eid);
        loop {
            let mut guard = self
                .fd
                .writable()
                .await
                .map_err(|e| Error::TransportFailure(e.to_string()))?;
            let res = guard.try_io(|inner| {
                let rc = unsafe {
                    libc::sendto(
                        inner.get_ref().as_raw_fd(),
                        msg.as_ptr().cast(),
                        msg.len(),
                        0,
                        std::ptr::addr_of!(addr).cast::<libc::sockaddr>(),
                        std::mem::size_of::<SockaddrMctp>() as libc::socklen_t,
                    )
                };
                if rc < 0 {
                    Err(std::io::Error::last_os_error())
                } else {
                    Ok(rc as usize)
                }
            });
            match res {
                Ok(Ok(_)) => return Ok(()),
                Ok(Err(e)) => return Err(Error::TransportFailure(e.to_string())),
                Err(_would_block) => continue,
            }
        }
    }

    async fn recv(&self) -> Result<(Tid, Vec<u8>)> {
        let mut buf = vec![0u8; RECV_BUF_SIZE];
        loop {
            let mut guard = self
                .fd
                .readable()
                .await
                .map_err(|e| Error::TransportFailure(e.to_string()))?;
            let res = guard.try_io(|inner| {
                let mut addr: SockaddrMctp = unsafe { std::mem::zeroed() };
                let mut addr_len = std::mem::size_of::<SockaddrMctp>() as libc::socklen_t;
                let rc = unsafe {
                    libc::recvfrom(
                        inner.get_ref().as_raw_fd(),
                        buf.as_mut_ptr().cast(),
                        buf.len(),
                        0,
                        std::ptr::addr_of_mut!(addr).cast::<libc::sockaddr>(),
                        &mut addr_len,
                    )
                };
                if rc < 0 {
                    Err(std::io::Error::last_os_error())
                } else {
                    Ok((rc as usize, addr.smctp_addr))
                }
            });
            match res {
                Ok(Ok((n, src_eid))) => {
                    let tid = self.tid_map.to_tid(src_eid)?;
                    return Ok((tid, buf[..n].to_vec()));
                }
                Ok(Err(e)) => return Err(Error::TransportFailure(e.to_string())),
                Err(_would_block) => continue,
            }
        }
    }

    fn event_fd(&self) -> Option<RawFd> {
        Some(self.fd.get_ref().as_raw_fd())
    }
}
