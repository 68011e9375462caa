// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! mctp-demux daemon back-end.
//!
//! The demux daemon speaks seqpacket frames over an abstract unix socket.
//! A client registers by sending the MCTP message type it wants to
//! receive; after that, every frame is `[eid][msg_type][payload...]` in
//! both directions. The adapter prepends/strips the EID and the PLDM
//! message type byte (0x01) so the rest of the stack sees bare PLDM
//! messages.

use super::{last_os_error, MctpTransport, OwnedSocket, TidMap};
use crate::config::MCTP_MSG_TYPE_PLDM;
use crate::error::{Error, Result};
use crate::protocol::Tid;
use async_trait::async_trait;
use std::os::fd::{AsRawFd, RawFd};
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;

/// Abstract socket name of the demux daemon.
const DEMUX_SOCKET_NAME: &[u8] = b"mctp-mux";

/// Largest frame the daemon hands us: eid + type + baseline MTU payload.
const RECV_BUF_SIZE: usize = 4096;

pub struct MctpDemuxTransport {
    fd: AsyncFd<OwnedSocket>,
    tid_map: TidMap,
}

impl MctpDemuxTransport {
    /// Connect and register for PLDM traffic. Also seeds the EID identity
    /// map so broadcast responses from the daemon stay routable.
    pub fn new() -> Result<Self> {
        let raw = unsafe {
            libc::socket(
                libc::AF_UNIX,
                libc::SOCK_SEQPACKET | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                0,
            )
        };
        if raw < 0 {
            return Err(last_os_error());
        }
        let sock = OwnedSocket::new(raw);

        let mut addr: libc::sockaddr_un = unsafe { std::mem::zeroed() };
        addr.sun_family = libc::AF_UNIX as libc::sa_family_t;
        // Abstract namespace: leading NUL, then the daemon name.
        for (i, b) in DEMUX_SOCKET_NAME.iter().enumerate() {
            addr.sun_path[i + 1] = *b as libc::c_char;
        }
        let addr_len = std::mem::size_of::<libc::sa_family_t>() + 1 + DEMUX_SOCKET_NAME.len();
        let rc = unsafe {
            libc::connect(
                sock.as_raw_fd(),
                std::ptr::addr_of!(addr).cast::<libc::sockaddr>(),
                addr_len as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(last_os_error());
        }

        // Registration frame: the single message-type byte.
        let reg = [MCTP_MSG_TYPE_PLDM];
        let rc = unsafe {
            libc::send(
                sock.as_raw_fd(),
                reg.as_ptr().cast(),
                reg.len(),
                0,
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
impl MctpTransport for MctpDemuxTransport {
    async fn send(&self, tid: Tid, msg: &[u8]) -> Result<()> {
        let eid = self.tid_map.to_eid(tid)?;
        let mut frame = Vec::with_capacity(msg.len() + 2);
        frame.push(eid);
        frame.push(MCTP_MSG_TYPE_PLDM);
        frame.extend_from_slice(msg);

        loop {
            let mut guard = self
                .fd
                .writable()
                .await
                .map_err(|e| Error::TransportFailure(e.to_string()))?;
            let res = guard.try_io(|inner| {
                let rc = unsafe {
                    libc::send(
                        inner.get_ref().as_raw_fd(),
                        frame.as_ptr().cast(),
                        frame.len(),
                        0,
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
                let rc = unsafe {
                    libc::recv(
                        inner.get_ref().as_raw_fd(),
                        buf.as_mut_ptr().cast(),
                        buf.len(),
                        0,
                    )
                };
                if rc < 0 {
                    Err(std::io::Error::last_os_error())
                } else {
                    Ok(rc as usize)
                }
            });
            match res {
                Ok(Ok(n)) => {
                    if n < 2 {
                        return Err(Error::DecodeError("demux frame shorter than prefix".into()));
                    }
                    if buf[1] != MCTP_MSG_TYPE_PLDM {
                        // Other message types are not ours; wait for the next frame.
                        log::debug!("[transport] ignoring MCTP type 0x{:02x}", buf[1]);
                        continue;
                    }
                    let eid = buf[0];
                    let tid = self.tid_map.to_tid(eid)?;
                    return Ok((tid, buf[2..n].to_vec()));
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
