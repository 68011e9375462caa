// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RDE end-to-end: discovery with dictionary retrieval, READ via
//! multipart, and checksum-mismatch recovery during an operation.

mod common;

use common::{
    annotation_dictionary, chassis_dictionary, mock_pair, recording_sink, test_config, DeviceEnd,
    RecordingSink, TaskEvent,
};
use parking_lot::Mutex;
use pldm::protocol::base::Ver32;
use pldm::protocol::pdr::RedfishResourcePdr;
use pldm::protocol::rde::{
    self, MultipartReceiveResp, OperationResp, OperationType, CMD_GET_SCHEMA_DICTIONARY,
    CMD_NEGOTIATE_MEDIUM_PARAMETERS, CMD_NEGOTIATE_REDFISH_PARAMETERS, CMD_RDE_MULTIPART_RECEIVE,
    CMD_RDE_OPERATION_COMPLETE, CMD_RDE_OPERATION_INIT,
};
use pldm::protocol::{crc32, MsgHeader, RdeTransferOp, TransferFlag, TYPE_RDE};
use pldm::rde::bej::{BejDictionary, Dictionaries};
use pldm::rde::{
    DeviceState, EncodingFormat, NegotiationStatus, OpState, OperationRequest, PayloadSource,
    RdeManager,
};
use pldm::{Config, InstanceIdDb, Requester};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

const EID: u8 = 10;
const TID: u8 = 10;
const UUID: &str = "11111111-2222-3333-4444-555555555555";
const DICT_HANDLE: u32 = 0x1000;
const RESULT_HANDLE: u32 = 0x2000;

fn chassis_resource_pdr() -> Vec<u8> {
    RedfishResourcePdr {
        resource_id: 1,
        containing_resource_id: 0,
        proposed_containing_resource_name: "redfish/v1".to_string(),
        sub_uri: "Chassis/1".to_string(),
        supported_operations: 0b0001_0011, // HEAD | READ | UPDATE
        additional: Vec::new(),
        major_schema_name: "Chassis".to_string(),
        major_schema_version: Ver32 {
            major: 0xf1,
            minor: 0xf2,
            update: 0xf0,
            alpha: 0,
        },
        major_schema_dictionary_length: 4096,
    }
    .encode_record(1)
}

/// Encode a JSON value against the test dictionaries.
fn bej_bytes(value: &serde_json::Value) -> Vec<u8> {
    let schema = BejDictionary::parse(&chassis_dictionary()).unwrap();
    let annotation = BejDictionary::parse(&annotation_dictionary()).unwrap();
    pldm::rde::bej::encode(
        value,
        &Dictionaries {
            schema: &schema,
            annotation: &annotation,
        },
        rde::SchemaClass::Major,
    )
    .unwrap()
}

/// Serves one payload as a multipart-receive transfer.
struct ChunkServer {
    base: u32,
    chunks: Vec<Vec<u8>>,
    total_crc: u32,
    corrupt_final_once: bool,
    corrupted_served: bool,
}

impl ChunkServer {
    fn new(payload: &[u8], chunk_size: usize, base: u32, corrupt_final_once: bool) -> Self {
        Self {
            base,
            chunks: payload.chunks(chunk_size).map(<[u8]>::to_vec).collect(),
            total_crc: crc32(payload),
            corrupt_final_once,
            corrupted_served: false,
        }
    }

    fn respond(&mut self, handle: u32, op: RdeTransferOp) -> MultipartReceiveResp {
        if op == RdeTransferOp::Complete {
            return MultipartReceiveResp {
                cc: 0,
                transfer_flag: TransferFlag::AckCompletion,
                next_data_transfer_handle: 0,
                data: Vec::new(),
            };
        }
        let index = (handle - self.base) as usize;
        let last = index == self.chunks.len() - 1;
        let flag = match (index == 0, last) {
            (true, true) => TransferFlag::StartAndEnd,
            (true, false) => TransferFlag::Start,
            (false, true) => TransferFlag::End,
            (false, false) => TransferFlag::Middle,
        };
        let mut data = self.chunks[index].clone();
        if last {
            let crc = if self.corrupt_final_once && !self.corrupted_served {
                self.corrupted_served = true;
                self.total_crc ^ 0xffff_ffff
            } else {
                self.total_crc
            };
            data.extend_from_slice(&crc.to_le_bytes());
        }
        MultipartReceiveResp {
            cc: 0,
            transfer_flag: flag,
            next_data_transfer_handle: if last { 0 } else { self.base + index as u32 + 1 },
            data,
        }
    }
}

#[derive(Default)]
struct DeviceLog {
    commands: Vec<u8>,
    receive_requests: usize,
    init_payloads: Vec<Vec<u8>>,
}

struct DeviceSim {
    /// Multipart sources keyed by base transfer handle.
    transfers: HashMap<u32, ChunkServer>,
    /// Init response per operation type.
    read_result_handle: u32,
    log: Arc<Mutex<DeviceLog>>,
}

async fn run_device(mut end: DeviceEnd, mut sim: DeviceSim) {
    // Active transfer bookkeeping: a Complete/CurrentPart request does
    // not repeat the base handle, so remember who is serving.
    let mut active: Option<u32> = None;
    let mut last_handle: u32 = 0;
    while let Some((tid, req)) = end.requests.recv().await {
        let hdr = MsgHeader::decode(&req).unwrap();
        assert_eq!(hdr.pldm_type, TYPE_RDE, "unexpected PLDM type");
        sim.log.lock().commands.push(hdr.command);
        let resp = match hdr.command {
            CMD_NEGOTIATE_REDFISH_PARAMETERS => {
                let (mc_concurrency, mc_features) =
                    rde::decode_negotiate_redfish_parameters_req(&req).unwrap();
                assert_eq!(mc_concurrency, 1);
                assert_ne!(mc_features, 0);
                rde::encode_negotiate_redfish_parameters_resp(
                    hdr.instance_id,
                    &rde::NegotiateRedfishParametersResp {
                        cc: 0,
                        device_concurrency: 2,
                        device_capabilities: 0b0000_0101,
                        device_features: 0b0001_0011,
                        device_configuration_signature: 0xfeed_f00d,
                        device_provider_name: "Contoso".to_string(),
                    },
                )
            }
            CMD_NEGOTIATE_MEDIUM_PARAMETERS => {
                let mc_chunk = rde::decode_negotiate_medium_parameters_req(&req).unwrap();
                assert_eq!(mc_chunk, 1024);
                rde::encode_negotiate_medium_parameters_resp(hdr.instance_id, 0, 1024)
            }
            CMD_GET_SCHEMA_DICTIONARY => {
                let (resource_id, class) = rde::decode_get_schema_dictionary_req(&req).unwrap();
                assert_eq!(resource_id, 1);
                assert_eq!(class, rde::SchemaClass::Major);
                rde::encode_get_schema_dictionary_resp(hdr.instance_id, 0, 0, DICT_HANDLE)
            }
            CMD_RDE_MULTIPART_RECEIVE => {
                sim.log.lock().receive_requests += 1;
                let (handle, _op_id, op) = rde::decode_rde_multipart_receive_req(&req).unwrap();
                let base = match op {
                    RdeTransferOp::FirstPart => {
                        active = Some(handle);
                        last_handle = handle;
                        handle
                    }
                    RdeTransferOp::NextPart => {
                        last_handle = handle;
                        active.expect("NextPart without active transfer")
                    }
                    RdeTransferOp::CurrentPart | RdeTransferOp::Complete => {
                        active.expect("continuation without active transfer")
                    }
                    RdeTransferOp::Abort => panic!("unexpected abort"),
                };
                let server = sim.transfers.get_mut(&base).expect("unknown transfer");
                let effective_handle = if op == RdeTransferOp::CurrentPart {
                    last_handle
                } else if op == RdeTransferOp::Complete {
                    0
                } else {
                    handle
                };
                let resp = server.respond(effective_handle, op);
                if resp.transfer_flag == TransferFlag::AckCompletion {
                    active = None;
                }
                rde::encode_rde_multipart_receive_resp(hdr.instance_id, &resp)
            }
            CMD_RDE_OPERATION_INIT => {
                let init = rde::decode_rde_operation_init_req(&req).unwrap();
                assert_eq!(init.resource_id, 1);
                sim.log.lock().init_payloads.push(init.request_payload.clone());
                rde::encode_rde_operation_init_resp(
                    hdr.instance_id,
                    &OperationResp {
                        cc: 0,
                        operation_status: 0,
                        completion_percentage: 100,
                        completion_time_seconds: 0,
                        operation_execution_flags: 0,
                        result_transfer_handle: sim.read_result_handle,
                        permission_flags: 0,
                        etag: String::new(),
                        response_payload: Vec::new(),
                    },
                )
            }
            CMD_RDE_OPERATION_COMPLETE => {
                let (resource_id, _op_id) = rde::decode_rde_operation_complete_req(&req).unwrap();
                assert_eq!(resource_id, 1);
                let mut msg = MsgHeader::response_to(&hdr).encode().to_vec();
                msg.push(0x00);
                msg
            }
            other => panic!("unexpected RDE command 0x{:02x}", other),
        };
        end.responses.send((tid, resp)).unwrap();
    }
}

struct Harness {
    manager: Arc<RdeManager>,
    sink: Arc<RecordingSink>,
    task_rx: mpsc::UnboundedReceiver<TaskEvent>,
    log: Arc<Mutex<DeviceLog>>,
    cfg: Config,
    _dir: tempfile::TempDir,
}

/// Build the full stack against a scripted device and run discovery.
async fn discover(read_result: &serde_json::Value, corrupt_final_once: bool) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    std::fs::write(&cfg.annotation_dict_path, annotation_dictionary()).unwrap();

    // Dictionary padded past one chunk so retrieval is a real
    // multipart conversation.
    let mut dict = chassis_dictionary();
    dict.resize(dict.len() + 2048, 0);

    let log = Arc::new(Mutex::new(DeviceLog::default()));
    let mut transfers = HashMap::new();
    transfers.insert(DICT_HANDLE, ChunkServer::new(&dict, 1024, DICT_HANDLE, false));
    transfers.insert(
        RESULT_HANDLE,
        ChunkServer::new(&bej_bytes(read_result), 4, RESULT_HANDLE, corrupt_final_once),
    );

    let (transport, device_end) = mock_pair();
    tokio::spawn(run_device(
        device_end,
        DeviceSim {
            transfers,
            read_result_handle: RESULT_HANDLE,
            log: log.clone(),
        },
    ));

    let requester = Arc::new(Requester::new(transport, &cfg));
    requester.clone().start();
    let iid_db = Arc::new(InstanceIdDb::new());
    let (sink, task_rx) = recording_sink();
    let manager = Arc::new(RdeManager::new(
        requester,
        iid_db,
        &cfg,
        sink.clone(),
        sink.clone(),
    ));

    manager
        .handle_discovery_complete(EID, TID, UUID, &[chassis_resource_pdr()])
        .await
        .unwrap();

    Harness {
        manager,
        sink,
        task_rx,
        log,
        cfg,
        _dir: dir,
    }
}

#[tokio::test]
async fn test_discovery_reaches_operational_with_persisted_dictionary() {
    let h = discover(&json!({"Id": "1", "Name": "Chassis 1"}), false).await;

    let ctx = h.manager.device(UUID).unwrap();
    {
        let device = ctx.device.lock();
        assert_eq!(device.state(), DeviceState::Operational);
        assert_eq!(device.negotiation_status(), NegotiationStatus::Success);
        assert!(device.initialized());
        assert_eq!(device.metadata.dev_provider_name, "Contoso");
        assert_eq!(device.metadata.device_max_chunk_size, 1024);
        assert_eq!(device.metadata.dev_config_signature, 0xfeed_f00d);
        assert!(!device.registry.is_empty());
    }

    // Dictionary file exists on disk, under the device UUID.
    let dict_file = h.cfg.dict_root.join(UUID).join("dictionary_1.bin");
    assert!(dict_file.exists(), "missing {}", dict_file.display());

    // The schema snapshot names the discovered URI.
    let info = h.manager.get_device_schema_info(UUID).unwrap();
    assert_eq!(info["1"]["subUri"], "/redfish/v1/Chassis/1");
    assert_eq!(info["1"]["schemaName"], "Chassis");

    // Negotiated feature bits map to supported operations.
    assert_eq!(
        h.manager.get_supported_operations(UUID).unwrap(),
        vec![
            OperationType::Head,
            OperationType::Read,
            OperationType::Update
        ]
    );

    // Sink saw the state walk end at Operational.
    let states = h.sink.states.lock();
    assert_eq!(states.last().unwrap().1, DeviceState::Operational);
}

#[tokio::test]
async fn test_read_operation_via_multipart() {
    let expected = json!({"Id": "1", "Name": "Chassis 1"});
    let mut h = discover(&expected, false).await;

    let path = h
        .manager
        .start_redfish_operation(OperationRequest {
            operation_id: 42,
            operation_type: OperationType::Read,
            target_uri: "/redfish/v1/Chassis/1".to_string(),
            device_uuid: UUID.to_string(),
            eid: EID,
            payload: String::new(),
            payload_source: PayloadSource::Inline,
            encoding: EncodingFormat::Json,
            session_id: "s1".to_string(),
        })
        .unwrap();
    assert!(path.ends_with("/42"));

    let event = h.task_rx.recv().await.unwrap();
    assert_eq!(event.path, path);
    assert_eq!(event.return_code, OpState::OperationCompleted as u16);
    assert_eq!(event.payload, "{\"Id\":\"1\",\"Name\":\"Chassis 1\"}");

    // READ sends no payload in Init, and OperationComplete went on the
    // wire after the transfer.
    let log = h.log.lock();
    assert!(log.init_payloads.iter().all(Vec::is_empty));
    let init_at = log
        .commands
        .iter()
        .position(|&c| c == CMD_RDE_OPERATION_INIT)
        .unwrap();
    let complete_at = log
        .commands
        .iter()
        .rposition(|&c| c == CMD_RDE_OPERATION_COMPLETE)
        .unwrap();
    assert!(complete_at > init_at);
}

#[tokio::test]
async fn test_checksum_mismatch_re_requests_current_chunk_once() {
    let expected = json!({"Id": "1", "Name": "Chassis 1"});

    // Baseline: how many receive requests does a clean run take?
    let mut clean = discover(&expected, false).await;
    clean
        .manager
        .start_redfish_operation(read_request(42))
        .unwrap();
    let event = clean.task_rx.recv().await.unwrap();
    assert_eq!(event.return_code, OpState::OperationCompleted as u16);
    let clean_requests = clean.log.lock().receive_requests;

    // Same run with the final chunk checksum corrupted once.
    let mut faulty = discover(&expected, true).await;
    faulty
        .manager
        .start_redfish_operation(read_request(43))
        .unwrap();
    let event = faulty.task_rx.recv().await.unwrap();
    assert_eq!(
        event.return_code,
        OpState::OperationCompleted as u16,
        "one corrupt chunk must be recovered"
    );
    assert_eq!(event.payload, "{\"Id\":\"1\",\"Name\":\"Chassis 1\"}");
    let faulty_requests = faulty.log.lock().receive_requests;

    // Exactly one extra request: the CurrentPart re-fetch.
    assert_eq!(faulty_requests, clean_requests + 1);
}

fn read_request(operation_id: u16) -> OperationRequest {
    OperationRequest {
        operation_id,
        operation_type: OperationType::Read,
        target_uri: "/redfish/v1/Chassis/1".to_string(),
        device_uuid: UUID.to_string(),
        eid: EID,
        payload: String::new(),
        payload_source: PayloadSource::Inline,
        encoding: EncodingFormat::Json,
        session_id: String::new(),
    }
}
