// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Platform event pump.
//!
//! Critical events arrive out-of-band as `PldmMessagePollEvent`
//! notifications carrying only `(tid, event_id)`. The pump queues them
//! (bounded, deduplicated), and a periodic tick drains the queue by
//! running one `PollForPlatformEventMessage` conversation at a time:
//! GetFirstPart, then GetNextPart until the terminus signals the final
//! part, CRC32 validation on multi-part transfers, handler dispatch, and
//! an AcknowledgementOnly poll to release the event on the device.
//!
//! The per-request deadline of the requester runtime bounds each round
//! trip; a conversation that times out drops its event and returns the
//! pump to `Idle`.

use crate::config::{Config, EVENT_QUEUE_CAPACITY};
use crate::error::{Error, Result};
use crate::protocol::platform::{self, PollEventReq};
use crate::protocol::{crc32, Tid, TransferFlag, TransferOp};
use crate::requester::{InstanceIdDb, Requester};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Handler invoked with `(tid, event_class, event_id, event_data)`.
pub type EventHandler = Box<dyn Fn(Tid, u8, u16, &[u8]) + Send + Sync>;

/// Observable pump state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    Idle,
    Polling,
    AwaitingResponse,
    Reassembling,
}

pub struct EventManager {
    requester: Arc<Requester>,
    iid_db: Arc<InstanceIdDb>,
    cfg: Config,
    queue: Mutex<VecDeque<(Tid, u16)>>,
    handlers: Mutex<HashMap<u8, Vec<EventHandler>>>,
    state: Mutex<PumpState>,
    shutdown: watch::Sender<bool>,
}

impl EventManager {
    pub fn new(requester: Arc<Requester>, iid_db: Arc<InstanceIdDb>, cfg: &Config) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            requester,
            iid_db,
            cfg: cfg.clone(),
            queue: Mutex::new(VecDeque::new()),
            handlers: Mutex::new(HashMap::new()),
            state: Mutex::new(PumpState::Idle),
            shutdown,
        }
    }

    /// Queue a critical event. Duplicates already queued are accepted and
    /// collapsed (`Ok(false)`); a full queue is an error and existing
    /// entries are untouched.
    pub fn enqueue_critical_event(&self, tid: Tid, event_id: u16) -> Result<bool> {
        let mut queue = self.queue.lock();
        if queue.len() >= EVENT_QUEUE_CAPACITY {
            return Err(Error::QueueOverflow);
        }
        if queue.iter().any(|&(t, e)| t == tid && e == event_id) {
            return Ok(false);
        }
        debug!("[platform-mc] queuing critical event 0x{:04x} TID {}", event_id, tid);
        queue.push_back((tid, event_id));
        Ok(true)
    }

    /// Register a handler for one platform event class. Multiple handlers
    /// per class run in registration order.
    pub fn register_handler(&self, event_class: u8, handler: EventHandler) {
        self.handlers
            .lock()
            .entry(event_class)
            .or_default()
            .push(handler);
    }

    pub fn state(&self) -> PumpState {
        *self.state.lock()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Start the polling loop. One conversation at a time; ticks while a
    /// poll is in flight are absorbed by the loop structure.
    pub fn start_polling(self: &Arc<Self>) -> JoinHandle<()> {
        let mgr = Arc::clone(self);
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(mgr.cfg.event_poll_interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let head = mgr.queue.lock().pop_front();
                        if let Some((tid, event_id)) = head {
                            if let Err(e) = mgr.poll_event(tid, event_id).await {
                                warn!(
                                    "[platform-mc] poll for event 0x{:04x} TID {} dropped: {}",
                                    event_id, tid, e
                                );
                            }
                            *mgr.state.lock() = PumpState::Idle;
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Cancel the polling loop. In-flight requests drain through their
    /// own timeouts; the requester releases their instance IDs.
    pub fn stop_polling(&self) {
        let _ = self.shutdown.send(true);
    }

    /// One complete poll conversation for a queued critical event.
    pub async fn poll_event(&self, tid: Tid, event_id: u16) -> Result<()> {
        *self.state.lock() = PumpState::Polling;

        let mut req = PollEventReq {
            format_version: 1,
            transfer_op: TransferOp::GetFirstPart,
            data_transfer_handle: u32::from(event_id),
            event_id_to_ack: event_id,
        };
        let mut assembled: Vec<u8> = Vec::new();
        let mut event_class = 0u8;

        let resp_event_id = loop {
            *self.state.lock() = PumpState::AwaitingResponse;
            let resp = self.poll_round_trip(tid, &req).await?;

            if resp.event_id == 0 || resp.event_id == 0xffff {
                // Nothing pending (0) or the terminus is still preparing
                // the event (0xffff); drop and let a later notification
                // re-queue it.
                debug!(
                    "[platform-mc] TID {}: no event data for 0x{:04x} (got 0x{:04x})",
                    tid, event_id, resp.event_id
                );
                return Ok(());
            }
            if req.event_id_to_ack != 0 && resp.event_id != req.event_id_to_ack {
                warn!(
                    "[platform-mc] TID {}: response event 0x{:04x} does not match queued 0x{:04x}",
                    tid, resp.event_id, req.event_id_to_ack
                );
                return Err(Error::StateViolation("poll response for foreign event"));
            }

            *self.state.lock() = PumpState::Reassembling;
            assembled.extend_from_slice(&resp.event_data);
            event_class = resp.event_class;

            match resp.transfer_flag {
                TransferFlag::Start | TransferFlag::Middle => {
                    req.transfer_op = TransferOp::GetNextPart;
                    req.data_transfer_handle = resp.next_data_transfer_handle;
                    req.event_id_to_ack = resp.event_id;
                }
                TransferFlag::End => {
                    // Checksum only governs multi-part transfers.
                    let expected = resp.checksum.unwrap_or_default();
                    let computed = crc32(&assembled);
                    if computed != expected {
                        warn!(
                            "[platform-mc] TID {}: event 0x{:04x} checksum mismatch \
                             (expected 0x{:08x}, computed 0x{:08x}); discarding",
                            tid, resp.event_id, expected, computed
                        );
                        self.acknowledge(tid, resp.event_id).await;
                        return Err(Error::ChecksumMismatch { expected, computed });
                    }
                    break resp.event_id;
                }
                TransferFlag::StartAndEnd => break resp.event_id,
                TransferFlag::AckCompletion => {
                    return Err(Error::DecodeError(
                        "unexpected AckCompletion in event poll".into(),
                    ));
                }
            }
        };

        self.dispatch(tid, event_class, resp_event_id, &assembled);
        self.acknowledge(tid, resp_event_id).await;
        Ok(())
    }

    fn dispatch(&self, tid: Tid, event_class: u8, event_id: u16, data: &[u8]) {
        let handlers = self.handlers.lock();
        match handlers.get(&event_class) {
            Some(list) => {
                info!(
                    "[platform-mc] dispatching event 0x{:04x} class 0x{:02x} ({} bytes) to {} handler(s)",
                    event_id,
                    event_class,
                    data.len(),
                    list.len()
                );
                for handler in list {
                    handler(tid, event_class, event_id, data);
                }
            }
            None => debug!(
                "[platform-mc] no handler for event class 0x{:02x}, dropping event 0x{:04x}",
                event_class, event_id
            ),
        }
    }

    async fn acknowledge(&self, tid: Tid, event_id: u16) {
        let req = PollEventReq {
            format_version: 1,
            transfer_op: TransferOp::AcknowledgementOnly,
            data_transfer_handle: 0,
            event_id_to_ack: event_id,
        };
        if let Err(e) = self.poll_round_trip(tid, &req).await {
            warn!(
                "[platform-mc] TID {}: acknowledgement poll for 0x{:04x} failed: {}",
                tid, event_id, e
            );
        }
    }

    async fn poll_round_trip(
        &self,
        tid: Tid,
        req: &PollEventReq,
    ) -> Result<platform::PollEventResp> {
        let iid = self.iid_db.alloc(tid)?;
        let msg = platform::encode_poll_event_req(iid.id(), req);
        let resp = self.requester.send_recv(tid, msg).await?;
        platform::decode_poll_event_resp(&resp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> EventManager {
        struct DeadTransport;
        #[async_trait::async_trait]
        impl crate::transport::MctpTransport for DeadTransport {
            async fn send(&self, _tid: Tid, _msg: &[u8]) -> Result<()> {
                Ok(())
            }
            async fn recv(&self) -> Result<(Tid, Vec<u8>)> {
                std::future::pending().await
            }
        }
        let cfg = Config::default();
        let requester = Arc::new(Requester::new(Arc::new(DeadTransport), &cfg));
        EventManager::new(requester, Arc::new(InstanceIdDb::new()), &cfg)
    }

    #[test]
    fn test_enqueue_dedupes() {
        let mgr = manager();
        assert!(mgr.enqueue_critical_event(1, 0x10).unwrap());
        assert!(!mgr.enqueue_critical_event(1, 0x10).unwrap());
        assert!(mgr.enqueue_critical_event(1, 0x11).unwrap());
        assert_eq!(mgr.queue_len(), 2);
    }

    #[test]
    fn test_enqueue_overflow_preserves_entries() {
        let mgr = manager();
        for i in 0..EVENT_QUEUE_CAPACITY {
            mgr.enqueue_critical_event(1, i as u16).unwrap();
        }
        assert!(matches!(
            mgr.enqueue_critical_event(2, 0xbeef),
            Err(Error::QueueOverflow)
        ));
        assert_eq!(mgr.queue_len(), EVENT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let mgr = manager();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in [1u8, 2u8] {
            let order = Arc::clone(&order);
            mgr.register_handler(
                0x22,
                Box::new(move |_tid, _class, _id, _data| order.lock().push(tag)),
            );
        }
        mgr.dispatch(1, 0x22, 0x10, &[]);
        assert_eq!(*order.lock(), vec![1, 2]);
    }
}
