// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Terminus discovery and platform initialization against a scripted
//! device.

mod common;

use common::{mock_pair, resp_msg, test_config, DeviceEnd};
use pldm::platform::{termini_map, PlatformManager, TerminusManager};
use pldm::protocol::pdr::{
    AuxiliaryNames, EntityInfo, NumericSensorPdr, PdrHeader, RangeFieldFormat, SensorDataSize,
    PDR_NUMERIC_SENSOR, PDR_SENSOR_AUXILIARY_NAMES,
};
use pldm::protocol::platform::{
    self, CMD_EVENT_MESSAGE_BUFFER_SIZE, CMD_EVENT_MESSAGE_SUPPORTED, CMD_GET_PDR,
    CMD_GET_PDR_REPOSITORY_INFO, CMD_SET_EVENT_RECEIVER,
};
use pldm::protocol::{base, MsgHeader, TransferFlag, TYPE_BASE, TYPE_PLATFORM};
use pldm::{Error, InstanceIdDb, Requester};
use std::collections::HashMap;
use std::sync::Arc;

const EID: u8 = 9;

fn sensor_record(record_handle: u32) -> Vec<u8> {
    let body = NumericSensorPdr {
        terminus_handle: 1,
        sensor_id: 0x10,
        entity: EntityInfo {
            entity_type: 120,
            entity_instance: 1,
            container_id: 0,
        },
        sensor_init: 0,
        has_aux_names: true,
        base_unit: 2,
        unit_modifier: -1,
        rate_unit: 0,
        is_linear: true,
        data_size: SensorDataSize::Sint16,
        resolution: 0.5,
        offset: 0.0,
        accuracy: 0,
        plus_tolerance: 0,
        minus_tolerance: 0,
        hysteresis: 0.0,
        supported_thresholds: 0,
        max_readable: 1000.0,
        min_readable: -1000.0,
        range_format: RangeFieldFormat::Real32,
        range_support: 0,
        nominal_value: 0.0,
        normal_max: 0.0,
        normal_min: 0.0,
        warning_high: 0.0,
        warning_low: 0.0,
        critical_high: 0.0,
        critical_low: 0.0,
        fatal_high: 0.0,
        fatal_low: 0.0,
    }
    .encode();
    let mut record = Vec::new();
    PdrHeader {
        record_handle,
        version: 1,
        pdr_type: PDR_NUMERIC_SENSOR,
        record_change_num: 0,
        data_length: body.len() as u16,
    }
    .encode_into(&mut record);
    record.extend_from_slice(&body);
    record
}

fn aux_record(record_handle: u32) -> Vec<u8> {
    let body = AuxiliaryNames {
        terminus_handle: 1,
        id: 0x10,
        composite_count: 1,
        names: vec![("en".to_string(), "Inlet Temp".to_string())],
    }
    .encode();
    let mut record = Vec::new();
    PdrHeader {
        record_handle,
        version: 1,
        pdr_type: PDR_SENSOR_AUXILIARY_NAMES,
        record_change_num: 0,
        data_length: body.len() as u16,
    }
    .encode_into(&mut record);
    record.extend_from_slice(&body);
    record
}

/// Scripted platform device: base discovery plus a two-record PDR
/// repository. `next_map` drives GetPDR's record-handle chain so tests
/// can describe normal walks or cycles.
async fn run_device(mut end: DeviceEnd, records: HashMap<u32, Vec<u8>>, next_map: HashMap<u32, u32>) {
    while let Some((tid, req)) = end.requests.recv().await {
        let hdr = MsgHeader::decode(&req).unwrap();
        let resp = match (hdr.pldm_type, hdr.command) {
            (TYPE_BASE, base::CMD_GET_TID) => resp_msg(&req, &[0x00, EID]),
            (TYPE_BASE, base::CMD_SET_TID) => resp_msg(&req, &[0x00]),
            (TYPE_BASE, base::CMD_GET_PLDM_TYPES) => {
                // Base, Platform, BIOS, FRU supported.
                resp_msg(&req, &[0x00, 0x1d, 0, 0, 0, 0, 0, 0, 0])
            }
            (TYPE_BASE, base::CMD_GET_PLDM_COMMANDS) => {
                let mut body = vec![0x00];
                body.extend_from_slice(&[0xff; base::PLDM_COMMANDS_BITMAP_LEN]);
                resp_msg(&req, &body)
            }
            (TYPE_PLATFORM, CMD_EVENT_MESSAGE_BUFFER_SIZE) => {
                let mut body = vec![0x00];
                body.extend_from_slice(&512u16.to_le_bytes());
                resp_msg(&req, &body)
            }
            (TYPE_PLATFORM, CMD_EVENT_MESSAGE_SUPPORTED) => {
                // synchrony config 1, async supported, one event class.
                resp_msg(&req, &[0x00, 0x01, 0x02, 0x01, 0x22])
            }
            (TYPE_PLATFORM, CMD_SET_EVENT_RECEIVER) => resp_msg(&req, &[0x00]),
            (TYPE_PLATFORM, CMD_GET_PDR_REPOSITORY_INFO) => {
                let mut body = vec![0x00, platform::REPOSITORY_AVAILABLE];
                body.extend_from_slice(&[0u8; 26]); // timestamps
                body.extend_from_slice(&(records.len() as u32).to_le_bytes());
                body.extend_from_slice(&4096u32.to_le_bytes());
                body.extend_from_slice(&1024u32.to_le_bytes());
                body.push(0);
                resp_msg(&req, &body)
            }
            (TYPE_PLATFORM, CMD_GET_PDR) => {
                let get = platform::decode_get_pdr_req(&req).unwrap();
                let record = records
                    .get(&get.record_handle)
                    .unwrap_or_else(|| panic!("no record {}", get.record_handle));
                let next = *next_map.get(&get.record_handle).unwrap_or(&0);
                let body = platform::GetPdrResp {
                    cc: 0,
                    next_record_handle: next,
                    next_data_transfer_handle: 0,
                    transfer_flag: TransferFlag::StartAndEnd,
                    record_data: record.clone(),
                    transfer_crc: None,
                };
                platform::encode_get_pdr_resp(hdr.instance_id, &body)
            }
            other => panic!("unexpected command {:?}", other),
        };
        end.responses.send((tid, resp)).unwrap();
    }
}

#[tokio::test]
async fn test_discovery_and_platform_init_happy_path() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let (transport, device_end) = mock_pair();

    let mut records = HashMap::new();
    records.insert(0u32, sensor_record(0));
    records.insert(5u32, aux_record(5));
    let mut next_map = HashMap::new();
    next_map.insert(0u32, 5u32);
    next_map.insert(5u32, 0u32);
    tokio::spawn(run_device(device_end, records, next_map));

    let requester = Arc::new(Requester::new(transport, &cfg));
    requester.clone().start();
    let iid_db = Arc::new(InstanceIdDb::new());
    let termini = termini_map();
    let tm = TerminusManager::new(
        requester.clone(),
        iid_db.clone(),
        termini.clone(),
        &cfg,
    );
    let pm = PlatformManager::new(requester, iid_db.clone(), termini.clone(), &cfg);

    let discovered = tm.discover(&[EID]).await;
    assert_eq!(discovered, vec![EID]);
    {
        let map = termini.lock();
        let t = map.get(&EID).unwrap();
        assert!(t.supports(TYPE_BASE));
        assert!(t.supports(TYPE_PLATFORM));
        assert!(t.supports(pldm::protocol::TYPE_BIOS));
        assert!(t.supports(pldm::protocol::TYPE_FRU));
        assert!(!t.initialized);
    }

    pm.init_termini().await.unwrap();
    let map = termini.lock();
    let t = map.get(&EID).unwrap();
    assert!(t.initialized);
    // Negotiated buffer is min(mc 256, device 512).
    assert_eq!(t.max_buffer_size, 256);
    assert_eq!(t.pdrs.len(), 2);
    assert_eq!(t.numeric_sensors.len(), 1);
    let sensor = &t.numeric_sensors[0];
    assert_eq!(sensor.name.as_deref(), Some("Inlet Temp"));
    // raw 100 -> 100 * 0.5 * 10^-1 = 5 units.
    assert_eq!(sensor.conversion.raw_to_unit(100.0), 5.0);
    // All instance IDs returned.
    assert_eq!(iid_db.in_use(EID), 0);
}

#[tokio::test]
async fn test_pdr_pagination_cycle_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let (transport, device_end) = mock_pair();

    let mut records = HashMap::new();
    records.insert(0u32, sensor_record(0));
    records.insert(5u32, aux_record(5));
    // 5 points back at itself: a walk with no progress.
    let mut next_map = HashMap::new();
    next_map.insert(0u32, 5u32);
    next_map.insert(5u32, 5u32);
    tokio::spawn(run_device(device_end, records, next_map));

    let requester = Arc::new(Requester::new(transport, &cfg));
    requester.clone().start();
    let iid_db = Arc::new(InstanceIdDb::new());
    let termini = termini_map();
    let tm = TerminusManager::new(requester.clone(), iid_db.clone(), termini.clone(), &cfg);
    let pm = PlatformManager::new(requester, iid_db, termini.clone(), &cfg);

    tm.discover(&[EID]).await;
    let err = pm.get_pdrs(EID).await.unwrap_err();
    assert!(matches!(err, Error::PdrCycle(5)));
}
