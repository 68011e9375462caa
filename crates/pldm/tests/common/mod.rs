// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared test support: in-memory transport, scripted device plumbing,
//! and binary dictionary synthesis.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use pldm::protocol::{MsgHeader, Tid};
use pldm::rde::{DeviceState, NegotiationStatus};
use pldm::transport::MctpTransport;
use pldm::{Config, DeviceSink, Result, TaskSink};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Mock transport
// ---------------------------------------------------------------------------

/// Transport whose far end is a test task: agent sends land on the
/// device channel, device responses flow back through `recv`.
pub struct MockTransport {
    to_device: mpsc::UnboundedSender<(Tid, Vec<u8>)>,
    from_device: tokio::sync::Mutex<mpsc::UnboundedReceiver<(Tid, Vec<u8>)>>,
    sent: AtomicUsize,
}

/// The device side of a [`MockTransport`].
pub struct DeviceEnd {
    pub requests: mpsc::UnboundedReceiver<(Tid, Vec<u8>)>,
    pub responses: mpsc::UnboundedSender<(Tid, Vec<u8>)>,
}

pub fn mock_pair() -> (Arc<MockTransport>, DeviceEnd) {
    let (req_tx, req_rx) = mpsc::unbounded_channel();
    let (resp_tx, resp_rx) = mpsc::unbounded_channel();
    (
        Arc::new(MockTransport {
            to_device: req_tx,
            from_device: tokio::sync::Mutex::new(resp_rx),
            sent: AtomicUsize::new(0),
        }),
        DeviceEnd {
            requests: req_rx,
            responses: resp_tx,
        },
    )
}

impl MockTransport {
    pub fn sent_count(&self) -> usize {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MctpTransport for MockTransport {
    async fn send(&self, tid: Tid, msg: &[u8]) -> Result<()> {
        self.sent.fetch_add(1, Ordering::Relaxed);
        let _ = self.to_device.send((tid, msg.to_vec()));
        Ok(())
    }

    async fn recv(&self) -> Result<(Tid, Vec<u8>)> {
        self.from_device
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| pldm::Error::TransportFailure("mock closed".into()))
    }
}

/// Build a response message mirroring the request header (request bit
/// cleared) with the given body appended.
pub fn resp_msg(request: &[u8], body: &[u8]) -> Vec<u8> {
    let hdr = MsgHeader::decode(request).expect("request header");
    let mut msg = MsgHeader::response_to(&hdr).encode().to_vec();
    msg.extend_from_slice(body);
    msg
}

/// Test configuration: fast timeouts, temp-dir persistence.
pub fn test_config(dir: &std::path::Path) -> Config {
    Config {
        response_timeout: Duration::from_millis(100),
        num_retries: 1,
        event_poll_interval: Duration::from_millis(20),
        dict_root: dir.join("dict"),
        annotation_dict_path: dir.join("annotation_src.bin"),
        dict_bootstrap_trigger: dir.join("trigger"),
        registry_path: dir.join("ResourceRegistry.txt"),
        ..Config::default()
    }
}

// ---------------------------------------------------------------------------
// Recording sinks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct TaskEvent {
    pub path: String,
    pub payload: String,
    pub return_code: u16,
}

/// Sink that forwards task updates over a channel and records device
/// state transitions.
pub struct RecordingSink {
    pub task_tx: mpsc::UnboundedSender<TaskEvent>,
    pub states: Mutex<Vec<(String, DeviceState)>>,
    pub negotiations: Mutex<Vec<(String, NegotiationStatus)>>,
}

pub fn recording_sink() -> (Arc<RecordingSink>, mpsc::UnboundedReceiver<TaskEvent>) {
    let (task_tx, task_rx) = mpsc::unbounded_channel();
    (
        Arc::new(RecordingSink {
            task_tx,
            states: Mutex::new(Vec::new()),
            negotiations: Mutex::new(Vec::new()),
        }),
        task_rx,
    )
}

impl TaskSink for RecordingSink {
    fn task_updated(&self, task_path: &str, payload: &str, return_code: u16) {
        let _ = self.task_tx.send(TaskEvent {
            path: task_path.to_string(),
            payload: payload.to_string(),
            return_code,
        });
    }
}

impl DeviceSink for RecordingSink {
    fn negotiation_status(&self, uuid: &str, status: NegotiationStatus) {
        self.negotiations.lock().push((uuid.to_string(), status));
    }

    fn device_state_changed(&self, uuid: &str, state: DeviceState) {
        self.states.lock().push((uuid.to_string(), state));
    }
}

// ---------------------------------------------------------------------------
// Binary dictionary synthesis (DSP0218 7.2.3 layout)
// ---------------------------------------------------------------------------

pub const DICT_HEADER_SIZE: usize = 12;
pub const DICT_ENTRY_SIZE: usize = 10;

pub struct DictNode {
    pub format: u8,
    pub seq: u16,
    pub name: &'static str,
    pub children: Vec<DictNode>,
}

impl DictNode {
    pub fn leaf(format: u8, seq: u16, name: &'static str) -> Self {
        Self {
            format,
            seq,
            name,
            children: Vec::new(),
        }
    }

    pub fn parent(format: u8, seq: u16, name: &'static str, children: Vec<DictNode>) -> Self {
        Self {
            format,
            seq,
            name,
            children,
        }
    }
}

/// Assemble a binary dictionary, breadth-first so children stay
/// contiguous.
pub fn build_dictionary(root: DictNode) -> Vec<u8> {
    struct Flat {
        format: u8,
        seq: u16,
        name: &'static str,
        first_child: usize,
        child_count: u16,
    }
    let mut flat: Vec<Flat> = Vec::new();
    let mut queue = std::collections::VecDeque::new();
    queue.push_back(root);
    let mut placed = 1usize;
    while let Some(node) = queue.pop_front() {
        let first_child = placed;
        placed += node.children.len();
        flat.push(Flat {
            format: node.format,
            seq: node.seq,
            name: node.name,
            first_child,
            child_count: node.children.len() as u16,
        });
        for child in node.children {
            queue.push_back(child);
        }
    }

    let names_base = DICT_HEADER_SIZE + flat.len() * DICT_ENTRY_SIZE;
    let mut names: Vec<u8> = Vec::new();
    let mut out = Vec::new();
    out.push(0x00);
    out.push(0x00);
    out.extend_from_slice(&(flat.len() as u16).to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    for entry in &flat {
        out.push(entry.format);
        out.extend_from_slice(&entry.seq.to_le_bytes());
        let child_offset = if entry.child_count == 0 {
            0u16
        } else {
            (DICT_HEADER_SIZE + entry.first_child * DICT_ENTRY_SIZE) as u16
        };
        out.extend_from_slice(&child_offset.to_le_bytes());
        out.extend_from_slice(&entry.child_count.to_le_bytes());
        if entry.name.is_empty() {
            out.push(0);
            out.extend_from_slice(&0u16.to_le_bytes());
        } else {
            out.push(entry.name.len() as u8 + 1);
            out.extend_from_slice(&((names_base + names.len()) as u16).to_le_bytes());
            names.extend_from_slice(entry.name.as_bytes());
            names.push(0);
        }
    }
    out.extend_from_slice(&names);
    out
}

// BEJ principal types, for dictionary fixtures.
pub const BEJ_SET: u8 = 0x00;
pub const BEJ_INTEGER: u8 = 0x30;
pub const BEJ_STRING: u8 = 0x50;

/// Chassis schema with Id and Name string properties.
pub fn chassis_dictionary() -> Vec<u8> {
    build_dictionary(DictNode::parent(
        BEJ_SET,
        0,
        "Chassis",
        vec![
            DictNode::leaf(BEJ_STRING, 0, "Id"),
            DictNode::leaf(BEJ_STRING, 1, "Name"),
        ],
    ))
}

/// Minimal annotation dictionary with `@odata.id`.
pub fn annotation_dictionary() -> Vec<u8> {
    build_dictionary(DictNode::parent(
        BEJ_SET,
        0,
        "Annotations",
        vec![DictNode::leaf(BEJ_STRING, 0, "@odata.id")],
    ))
}
