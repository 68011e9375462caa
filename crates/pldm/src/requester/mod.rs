// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Requester runtime: matches responses to outstanding requests.
//!
//! A response correlates to a request only if `(tid, instance_id,
//! pldm_type, command)` all match AND its request bit is clear. Anything
//! else - stale echoes from other listeners on the demux, unsolicited
//! requests, malformed frames - is dropped here and never reaches a
//! caller.
//!
//! Callers use [`Requester::send_recv`] as the awaitable round trip: it
//! transmits, waits `response_timeout`, resends up to `num_retries`
//! times, and resolves with the correlated response bytes or
//! [`Error::Timeout`]. The pending entry is removed on every exit path,
//! so a response arriving after the deadline finds nothing to complete.

mod instance_id;

pub use instance_id::{InstanceId, InstanceIdDb};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::protocol::{MsgHeader, Tid};
use crate::transport::MctpTransport;
use dashmap::DashMap;
use log::{debug, trace, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Correlation key for an outstanding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PendingKey {
    tid: Tid,
    instance_id: u8,
    pldm_type: u8,
    command: u8,
}

impl PendingKey {
    fn from_header(tid: Tid, hdr: &MsgHeader) -> Self {
        Self {
            tid,
            instance_id: hdr.instance_id,
            pldm_type: hdr.pldm_type,
            command: hdr.command,
        }
    }
}

pub struct Requester {
    transport: Arc<dyn MctpTransport>,
    pending: DashMap<PendingKey, oneshot::Sender<Vec<u8>>>,
    response_timeout: Duration,
    num_retries: u32,
}

impl Requester {
    pub fn new(transport: Arc<dyn MctpTransport>, cfg: &Config) -> Self {
        Self {
            transport,
            pending: DashMap::new(),
            response_timeout: cfg.response_timeout,
            num_retries: cfg.num_retries,
        }
    }

    /// Spawn the receive loop. The task runs until the transport fails.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match self.transport.recv().await {
                    Ok((tid, msg)) => self.dispatch(tid, msg),
                    Err(e) => {
                        warn!("[requester] receive loop terminating: {}", e);
                        break;
                    }
                }
            }
        })
    }

    /// Route one inbound message to its waiter, or drop it.
    fn dispatch(&self, tid: Tid, msg: Vec<u8>) {
        let hdr = match MsgHeader::decode(&msg) {
            Ok(hdr) => hdr,
            Err(e) => {
                debug!("[requester] dropping unparseable message from TID {}: {}", tid, e);
                return;
            }
        };
        if hdr.request {
            // The agent is a pure requester; inbound requests belong to the
            // responder process sharing the demux socket.
            trace!(
                "[requester] ignoring inbound request TID {} cmd 0x{:02x}",
                tid,
                hdr.command
            );
            return;
        }
        let key = PendingKey::from_header(tid, &hdr);
        match self.pending.remove(&key) {
            Some((_, tx)) => {
                // The waiter may have timed out between removal and send;
                // a dead receiver is the StateViolation path, dropped silently.
                let _ = tx.send(msg);
            }
            None => {
                debug!(
                    "[requester] stale response dropped: TID {} iid {} type 0x{:02x} cmd 0x{:02x}",
                    tid, hdr.instance_id, hdr.pldm_type, hdr.command
                );
            }
        }
    }

    /// Register interest in the response to `request` without sending it.
    /// Used by tests and by callers that manage transmission themselves.
    fn register(&self, tid: Tid, request: &[u8]) -> Result<(PendingKey, oneshot::Receiver<Vec<u8>>)> {
        let hdr = MsgHeader::decode(request)?;
        if !hdr.request {
            return Err(Error::EncodeError("request bit not set in header".into()));
        }
        let key = PendingKey::from_header(tid, &hdr);
        let (tx, rx) = oneshot::channel();
        if self.pending.insert(key, tx).is_some() {
            // A concurrent request with the same instance ID means the
            // allocator was bypassed; the older waiter can never complete.
            warn!(
                "[requester] duplicate outstanding request TID {} iid {}",
                tid, hdr.instance_id
            );
        }
        Ok((key, rx))
    }

    /// Register interest in the response to `request` and transmit it
    /// once. The caller owns the wait: the returned receiver resolves
    /// with the correlated response bytes, or never, if the device stays
    /// silent. No retries are scheduled on this path.
    pub async fn register_request(
        &self,
        tid: Tid,
        request: Vec<u8>,
    ) -> Result<oneshot::Receiver<Vec<u8>>> {
        let (key, rx) = self.register(tid, &request)?;
        if let Err(e) = self.transport.send(tid, &request).await {
            self.pending.remove(&key);
            return Err(e);
        }
        Ok(rx)
    }

    /// One full round trip: send, await the correlated response, retry on
    /// timeout. The instance ID inside `request`'s header is authoritative;
    /// callers hold its [`InstanceId`] guard across this await.
    pub async fn send_recv(&self, tid: Tid, request: Vec<u8>) -> Result<Vec<u8>> {
        let (key, mut rx) = self.register(tid, &request)?;

        for attempt in 0..=self.num_retries {
            if let Err(e) = self.transport.send(tid, &request).await {
                self.pending.remove(&key);
                return Err(e);
            }
            match tokio::time::timeout(self.response_timeout, &mut rx).await {
                Ok(Ok(resp)) => return Ok(resp),
                Ok(Err(_closed)) => {
                    self.pending.remove(&key);
                    return Err(Error::StateViolation("response channel closed"));
                }
                Err(_elapsed) => {
                    if attempt < self.num_retries {
                        debug!(
                            "[requester] timeout, resending TID {} cmd 0x{:02x} (attempt {}/{})",
                            tid,
                            key.command,
                            attempt + 2,
                            self.num_retries + 1
                        );
                    }
                }
            }
        }

        self.pending.remove(&key);
        Err(Error::Timeout)
    }

    /// Number of requests currently awaiting a response (tests/diagnostics).
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{base, TYPE_BASE};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// In-memory transport: sends go to a test-visible queue, receives
    /// drain a channel the test writes device responses into.
    struct ChannelTransport {
        sent: Mutex<Vec<(Tid, Vec<u8>)>>,
        rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<(Tid, Vec<u8>)>>,
    }

    fn pair() -> (Arc<ChannelTransport>, mpsc::UnboundedSender<(Tid, Vec<u8>)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(ChannelTransport {
                sent: Mutex::new(Vec::new()),
                rx: tokio::sync::Mutex::new(rx),
            }),
            tx,
        )
    }

    #[async_trait]
    impl MctpTransport for ChannelTransport {
        async fn send(&self, tid: Tid, msg: &[u8]) -> Result<()> {
            self.sent.lock().push((tid, msg.to_vec()));
            Ok(())
        }

        async fn recv(&self) -> Result<(Tid, Vec<u8>)> {
            self.rx
                .lock()
                .await
                .recv()
                .await
                .ok_or_else(|| Error::TransportFailure("closed".into()))
        }
    }

    fn fast_cfg() -> Config {
        Config {
            response_timeout: Duration::from_millis(50),
            num_retries: 2,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_correlated_response_delivered() {
        let (transport, device) = pair();
        let requester = Arc::new(Requester::new(transport.clone(), &fast_cfg()));
        requester.clone().start();

        let req = base::encode_get_tid_req(5);
        // Response mirrors instance id / type / command, request bit clear.
        let resp = vec![0x05, TYPE_BASE, base::CMD_GET_TID, 0x00, 9];
        device.send((9, resp.clone())).unwrap();

        let got = requester.send_recv(9, req).await.unwrap();
        assert_eq!(got, resp);
        assert_eq!(requester.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_mismatched_instance_id_dropped_then_timeout() {
        let (transport, device) = pair();
        let requester = Arc::new(Requester::new(transport.clone(), &fast_cfg()));
        requester.clone().start();

        let req = base::encode_get_tid_req(5);
        // Stale echo with a different instance id must not complete us.
        device
            .send((9, vec![0x04, TYPE_BASE, base::CMD_GET_TID, 0x00, 9]))
            .unwrap();

        let err = requester.send_recv(9, req).await.unwrap_err();
        assert!(matches!(err, Error::Timeout));
    }

    #[tokio::test]
    async fn test_request_bit_set_messages_ignored() {
        let (transport, device) = pair();
        let requester = Arc::new(Requester::new(transport.clone(), &fast_cfg()));
        requester.clone().start();

        let req = base::encode_get_tid_req(5);
        // Same key but request bit set: another requester's retransmission.
        device
            .send((9, vec![0x85, TYPE_BASE, base::CMD_GET_TID, 0x00, 9]))
            .unwrap();

        let err = requester.send_recv(9, req).await.unwrap_err();
        assert!(matches!(err, Error::Timeout));
    }

    #[tokio::test]
    async fn test_timeout_retries_then_releases() {
        let (transport, _device) = pair();
        let cfg = fast_cfg();
        let requester = Arc::new(Requester::new(transport.clone(), &cfg));
        requester.clone().start();

        let req = base::encode_get_tid_req(0);
        let err = requester.send_recv(9, req).await.unwrap_err();
        assert!(matches!(err, Error::Timeout));
        // Initial transmission plus num_retries resends.
        assert_eq!(transport.sent.lock().len(), cfg.num_retries as usize + 1);
        assert_eq!(requester.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_independent_tids_progress_concurrently() {
        let (transport, device) = pair();
        let requester = Arc::new(Requester::new(transport.clone(), &fast_cfg()));
        requester.clone().start();

        let r1 = requester.clone();
        let t1 = tokio::spawn(async move { r1.send_recv(9, base::encode_get_tid_req(1)).await });
        let r2 = requester.clone();
        let t2 = tokio::spawn(async move { r2.send_recv(10, base::encode_get_tid_req(1)).await });
        // Let both requests register before the device answers.
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Answer TID 10 first; TID 9's request must still complete.
        device
            .send((10, vec![0x01, TYPE_BASE, base::CMD_GET_TID, 0x00, 10]))
            .unwrap();
        device
            .send((9, vec![0x01, TYPE_BASE, base::CMD_GET_TID, 0x00, 9]))
            .unwrap();

        assert!(t1.await.unwrap().is_ok());
        assert!(t2.await.unwrap().is_ok());
    }
}
