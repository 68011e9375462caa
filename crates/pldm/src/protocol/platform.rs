// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Platform monitoring & control (type 2) command codecs (DSP0248).

use super::pdr::SensorDataSize;
use super::{ByteReader, TransferFlag, TransferOp, TYPE_PLATFORM};
use crate::error::{Error, Result};

// Command codes.
pub const CMD_SET_EVENT_RECEIVER: u8 = 0x04;
pub const CMD_PLATFORM_EVENT_MESSAGE: u8 = 0x0a;
pub const CMD_POLL_FOR_PLATFORM_EVENT_MESSAGE: u8 = 0x0b;
pub const CMD_EVENT_MESSAGE_SUPPORTED: u8 = 0x0c;
pub const CMD_EVENT_MESSAGE_BUFFER_SIZE: u8 = 0x0d;
pub const CMD_GET_SENSOR_READING: u8 = 0x11;
pub const CMD_GET_STATE_SENSOR_READINGS: u8 = 0x21;
pub const CMD_SET_NUMERIC_EFFECTER_VALUE: u8 = 0x31;
pub const CMD_GET_NUMERIC_EFFECTER_VALUE: u8 = 0x32;
pub const CMD_SET_STATE_EFFECTER_STATES: u8 = 0x39;
pub const CMD_GET_PDR_REPOSITORY_INFO: u8 = 0x50;
pub const CMD_GET_PDR: u8 = 0x51;

/// eventMessageGlobalEnable values for SetEventReceiver.
pub const EVENT_GLOBAL_DISABLE: u8 = 0;
pub const EVENT_GLOBAL_ENABLE_ASYNC: u8 = 1;
pub const EVENT_GLOBAL_ENABLE_POLLING: u8 = 2;
pub const EVENT_GLOBAL_ENABLE_ASYNC_KEEP_ALIVE: u8 = 3;

/// PDR repository states reported by GetPDRRepositoryInfo.
pub const REPOSITORY_AVAILABLE: u8 = 0;
pub const REPOSITORY_UPDATE_IN_PROGRESS: u8 = 1;
pub const REPOSITORY_FAILED: u8 = 2;

// ---------------------------------------------------------------------------
// GetPDRRepositoryInfo
// ---------------------------------------------------------------------------

pub fn encode_get_pdr_repository_info_req(instance_id: u8) -> Vec<u8> {
    super::request_msg(instance_id, TYPE_PLATFORM, CMD_GET_PDR_REPOSITORY_INFO)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdrRepositoryInfo {
    pub cc: u8,
    pub repository_state: u8,
    pub record_count: u32,
    pub repository_size: u32,
    pub largest_record_size: u32,
    pub data_transfer_handle_timeout: u8,
}

pub fn decode_get_pdr_repository_info_resp(msg: &[u8]) -> Result<PdrRepositoryInfo> {
    let mut r = ByteReader::body(msg)?;
    let cc = r.completion_code()?;
    if cc != super::CC_SUCCESS {
        return Ok(PdrRepositoryInfo {
            cc,
            repository_state: REPOSITORY_FAILED,
            record_count: 0,
            repository_size: 0,
            largest_record_size: 0,
            data_transfer_handle_timeout: 0,
        });
    }
    let repository_state = r.u8()?;
    // Two timestamp104 fields (update time, OEM update time) we do not keep.
    r.bytes(13)?;
    r.bytes(13)?;
    Ok(PdrRepositoryInfo {
        cc,
        repository_state,
        record_count: r.u32_le()?,
        repository_size: r.u32_le()?,
        largest_record_size: r.u32_le()?,
        data_transfer_handle_timeout: r.u8()?,
    })
}

// ---------------------------------------------------------------------------
// GetPDR
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetPdrReq {
    pub record_handle: u32,
    pub data_transfer_handle: u32,
    pub transfer_op: TransferOp,
    pub request_count: u16,
    pub record_change_number: u16,
}

pub fn encode_get_pdr_req(instance_id: u8, req: &GetPdrReq) -> Vec<u8> {
    let mut msg = super::request_msg(instance_id, TYPE_PLATFORM, CMD_GET_PDR);
    msg.extend_from_slice(&req.record_handle.to_le_bytes());
    msg.extend_from_slice(&req.data_transfer_handle.to_le_bytes());
    msg.push(req.transfer_op as u8);
    msg.extend_from_slice(&req.request_count.to_le_bytes());
    msg.extend_from_slice(&req.record_change_number.to_le_bytes());
    msg
}

pub fn decode_get_pdr_req(msg: &[u8]) -> Result<GetPdrReq> {
    let mut r = ByteReader::body(msg)?;
    Ok(GetPdrReq {
        record_handle: r.u32_le()?,
        data_transfer_handle: r.u32_le()?,
        transfer_op: TransferOp::from_raw(r.u8()?)?,
        request_count: r.u16_le()?,
        record_change_number: r.u16_le()?,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetPdrResp {
    pub cc: u8,
    pub next_record_handle: u32,
    pub next_data_transfer_handle: u32,
    pub transfer_flag: TransferFlag,
    pub record_data: Vec<u8>,
    /// Present on the final part of a multi-part record.
    pub transfer_crc: Option<u8>,
}

pub fn encode_get_pdr_resp(instance_id: u8, resp: &GetPdrResp) -> Vec<u8> {
    let hdr = super::MsgHeader {
        request: false,
        datagram: false,
        instance_id,
        pldm_type: TYPE_PLATFORM,
        command: CMD_GET_PDR,
    };
    let mut msg = hdr.encode().to_vec();
    msg.push(resp.cc);
    msg.extend_from_slice(&resp.next_record_handle.to_le_bytes());
    msg.extend_from_slice(&resp.next_data_transfer_handle.to_le_bytes());
    msg.push(resp.transfer_flag as u8);
    msg.extend_from_slice(&(resp.record_data.len() as u16).to_le_bytes());
    msg.extend_from_slice(&resp.record_data);
    if let Some(crc) = resp.transfer_crc {
        msg.push(crc);
    }
    msg
}

pub fn decode_get_pdr_resp(msg: &[u8]) -> Result<GetPdrResp> {
    let mut r = ByteReader::body(msg)?;
    let cc = r.completion_code()?;
    if cc != super::CC_SUCCESS {
        return Ok(GetPdrResp {
            cc,
            next_record_handle: 0,
            next_data_transfer_handle: 0,
            transfer_flag: TransferFlag::StartAndEnd,
            record_data: Vec::new(),
            transfer_crc: None,
        });
    }
    let next_record_handle = r.u32_le()?;
    let next_data_transfer_handle = r.u32_le()?;
    let transfer_flag = TransferFlag::from_raw(r.u8()?)?;
    let count = usize::from(r.u16_le()?);
    let record_data = r.vec(count)?;
    let transfer_crc = if transfer_flag.is_final() && r.remaining() >= 1 {
        Some(r.u8()?)
    } else {
        None
    };
    Ok(GetPdrResp {
        cc,
        next_record_handle,
        next_data_transfer_handle,
        transfer_flag,
        record_data,
        transfer_crc,
    })
}

// ---------------------------------------------------------------------------
// EventMessageBufferSize
// ---------------------------------------------------------------------------

pub fn encode_event_message_buffer_size_req(instance_id: u8, receiver_max: u16) -> Vec<u8> {
    let mut msg = super::request_msg(instance_id, TYPE_PLATFORM, CMD_EVENT_MESSAGE_BUFFER_SIZE);
    msg.extend_from_slice(&receiver_max.to_le_bytes());
    msg
}

pub fn decode_event_message_buffer_size_resp(msg: &[u8]) -> Result<(u8, u16)> {
    let mut r = ByteReader::body(msg)?;
    let cc = r.completion_code()?;
    if cc != super::CC_SUCCESS {
        return Ok((cc, 0));
    }
    Ok((cc, r.u16_le()?))
}

// ---------------------------------------------------------------------------
// EventMessageSupported
// ---------------------------------------------------------------------------

pub fn encode_event_message_supported_req(instance_id: u8, format_version: u8) -> Vec<u8> {
    let mut msg = super::request_msg(instance_id, TYPE_PLATFORM, CMD_EVENT_MESSAGE_SUPPORTED);
    msg.push(format_version);
    msg
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMessageSupportedResp {
    pub cc: u8,
    pub synchrony_configuration: u8,
    /// Bitmap of supported synchrony configurations.
    pub synchrony_supported: u8,
    pub event_classes: Vec<u8>,
}

pub fn decode_event_message_supported_resp(msg: &[u8]) -> Result<EventMessageSupportedResp> {
    let mut r = ByteReader::body(msg)?;
    let cc = r.completion_code()?;
    if cc != super::CC_SUCCESS {
        return Ok(EventMessageSupportedResp {
            cc,
            synchrony_configuration: 0,
            synchrony_supported: 0,
            event_classes: Vec::new(),
        });
    }
    let synchrony_configuration = r.u8()?;
    let synchrony_supported = r.u8()?;
    let count = usize::from(r.u8()?);
    Ok(EventMessageSupportedResp {
        cc,
        synchrony_configuration,
        synchrony_supported,
        event_classes: r.vec(count)?,
    })
}

// ---------------------------------------------------------------------------
// SetEventReceiver
// ---------------------------------------------------------------------------

pub fn encode_set_event_receiver_req(
    instance_id: u8,
    global_enable: u8,
    transport_protocol: u8,
    receiver_address: u8,
    heartbeat_timer: u16,
) -> Vec<u8> {
    let mut msg = super::request_msg(instance_id, TYPE_PLATFORM, CMD_SET_EVENT_RECEIVER);
    msg.push(global_enable);
    msg.push(transport_protocol);
    msg.push(receiver_address);
    msg.extend_from_slice(&heartbeat_timer.to_le_bytes());
    msg
}

pub fn decode_set_event_receiver_resp(msg: &[u8]) -> Result<u8> {
    let mut r = ByteReader::body(msg)?;
    r.completion_code()
}

// ---------------------------------------------------------------------------
// PollForPlatformEventMessage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollEventReq {
    pub format_version: u8,
    pub transfer_op: TransferOp,
    pub data_transfer_handle: u32,
    pub event_id_to_ack: u16,
}

pub fn encode_poll_event_req(instance_id: u8, req: &PollEventReq) -> Vec<u8> {
    let mut msg = super::request_msg(
        instance_id,
        TYPE_PLATFORM,
        CMD_POLL_FOR_PLATFORM_EVENT_MESSAGE,
    );
    msg.push(req.format_version);
    msg.push(req.transfer_op as u8);
    msg.extend_from_slice(&req.data_transfer_handle.to_le_bytes());
    msg.extend_from_slice(&req.event_id_to_ack.to_le_bytes());
    msg
}

pub fn decode_poll_event_req(msg: &[u8]) -> Result<PollEventReq> {
    let mut r = ByteReader::body(msg)?;
    Ok(PollEventReq {
        format_version: r.u8()?,
        transfer_op: TransferOp::from_raw(r.u8()?)?,
        data_transfer_handle: r.u32_le()?,
        event_id_to_ack: r.u16_le()?,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollEventResp {
    pub cc: u8,
    pub tid: u8,
    pub event_id: u16,
    pub next_data_transfer_handle: u32,
    pub transfer_flag: TransferFlag,
    pub event_class: u8,
    pub event_data: Vec<u8>,
    /// CRC32 over the complete reassembled event data; carried on `End`.
    pub checksum: Option<u32>,
}

pub fn encode_poll_event_resp(instance_id: u8, resp: &PollEventResp) -> Vec<u8> {
    let hdr = super::MsgHeader {
        request: false,
        datagram: false,
        instance_id,
        pldm_type: TYPE_PLATFORM,
        command: CMD_POLL_FOR_PLATFORM_EVENT_MESSAGE,
    };
    let mut msg = hdr.encode().to_vec();
    msg.push(resp.cc);
    msg.push(resp.tid);
    msg.extend_from_slice(&resp.event_id.to_le_bytes());
    if resp.event_id == 0 || resp.event_id == 0xffff {
        return msg;
    }
    msg.extend_from_slice(&resp.next_data_transfer_handle.to_le_bytes());
    msg.push(resp.transfer_flag as u8);
    msg.push(resp.event_class);
    msg.extend_from_slice(&(resp.event_data.len() as u32).to_le_bytes());
    msg.extend_from_slice(&resp.event_data);
    if let Some(crc) = resp.checksum {
        msg.extend_from_slice(&crc.to_le_bytes());
    }
    msg
}

pub fn decode_poll_event_resp(msg: &[u8]) -> Result<PollEventResp> {
    let mut r = ByteReader::body(msg)?;
    let cc = r.completion_code()?;
    if cc != super::CC_SUCCESS {
        return Err(Error::CompletionCode(cc));
    }
    let tid = r.u8()?;
    let event_id = r.u16_le()?;
    if event_id == 0 || event_id == 0xffff {
        // No event pending / event processing in progress: short response.
        return Ok(PollEventResp {
            cc,
            tid,
            event_id,
            next_data_transfer_handle: 0,
            transfer_flag: TransferFlag::StartAndEnd,
            event_class: 0,
            event_data: Vec::new(),
            checksum: None,
        });
    }
    let next_data_transfer_handle = r.u32_le()?;
    let transfer_flag = TransferFlag::from_raw(r.u8()?)?;
    let event_class = r.u8()?;
    let size = r.u32_le()? as usize;
    let event_data = r.vec(size)?;
    let checksum = if transfer_flag == TransferFlag::End && r.remaining() >= 4 {
        Some(r.u32_le()?)
    } else {
        None
    };
    Ok(PollEventResp {
        cc,
        tid,
        event_id,
        next_data_transfer_handle,
        transfer_flag,
        event_class,
        event_data,
        checksum,
    })
}

// ---------------------------------------------------------------------------
// GetSensorReading
// ---------------------------------------------------------------------------

pub fn encode_get_sensor_reading_req(instance_id: u8, sensor_id: u16, rearm: bool) -> Vec<u8> {
    let mut msg = super::request_msg(instance_id, TYPE_PLATFORM, CMD_GET_SENSOR_READING);
    msg.extend_from_slice(&sensor_id.to_le_bytes());
    msg.push(u8::from(rearm));
    msg
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub cc: u8,
    pub data_size: SensorDataSize,
    pub operational_state: u8,
    pub present_state: u8,
    pub previous_state: u8,
    pub event_state: u8,
    pub reading: f64,
}

pub fn decode_get_sensor_reading_resp(msg: &[u8]) -> Result<SensorReading> {
    let mut r = ByteReader::body(msg)?;
    let cc = r.completion_code()?;
    if cc != super::CC_SUCCESS {
        return Err(Error::CompletionCode(cc));
    }
    let data_size = SensorDataSize::from_raw(r.u8()?)?;
    let operational_state = r.u8()?;
    let _event_message_enable = r.u8()?;
    let present_state = r.u8()?;
    let previous_state = r.u8()?;
    let event_state = r.u8()?;
    let reading = data_size.read(&mut r)?;
    Ok(SensorReading {
        cc,
        data_size,
        operational_state,
        present_state,
        previous_state,
        event_state,
        reading,
    })
}

// ---------------------------------------------------------------------------
// Get/SetNumericEffecterValue
// ---------------------------------------------------------------------------

pub fn encode_get_numeric_effecter_value_req(instance_id: u8, effecter_id: u16) -> Vec<u8> {
    let mut msg = super::request_msg(instance_id, TYPE_PLATFORM, CMD_GET_NUMERIC_EFFECTER_VALUE);
    msg.extend_from_slice(&effecter_id.to_le_bytes());
    msg
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericEffecterValue {
    pub cc: u8,
    pub data_size: SensorDataSize,
    pub operational_state: u8,
    pub pending_value: f64,
    pub present_value: f64,
}

pub fn decode_get_numeric_effecter_value_resp(msg: &[u8]) -> Result<NumericEffecterValue> {
    let mut r = ByteReader::body(msg)?;
    let cc = r.completion_code()?;
    if cc != super::CC_SUCCESS {
        return Err(Error::CompletionCode(cc));
    }
    let data_size = SensorDataSize::from_raw(r.u8()?)?;
    let operational_state = r.u8()?;
    let pending_value = data_size.read(&mut r)?;
    let present_value = data_size.read(&mut r)?;
    Ok(NumericEffecterValue {
        cc,
        data_size,
        operational_state,
        pending_value,
        present_value,
    })
}

pub fn encode_set_numeric_effecter_value_req(
    instance_id: u8,
    effecter_id: u16,
    data_size: SensorDataSize,
    raw_value: f64,
) -> Result<Vec<u8>> {
    let mut msg = super::request_msg(instance_id, TYPE_PLATFORM, CMD_SET_NUMERIC_EFFECTER_VALUE);
    msg.extend_from_slice(&effecter_id.to_le_bytes());
    msg.push(data_size as u8);
    data_size.write(raw_value, &mut msg)?;
    Ok(msg)
}

pub fn decode_set_numeric_effecter_value_resp(msg: &[u8]) -> Result<u8> {
    let mut r = ByteReader::body(msg)?;
    r.completion_code()
}

// ---------------------------------------------------------------------------
// GetStateSensorReadings / SetStateEffecterStates
// ---------------------------------------------------------------------------

pub fn encode_get_state_sensor_readings_req(
    instance_id: u8,
    sensor_id: u16,
    rearm_bitmap: u8,
) -> Vec<u8> {
    let mut msg = super::request_msg(instance_id, TYPE_PLATFORM, CMD_GET_STATE_SENSOR_READINGS);
    msg.extend_from_slice(&sensor_id.to_le_bytes());
    msg.push(rearm_bitmap);
    msg.push(0); // reserved
    msg
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateField {
    pub operational_state: u8,
    pub present_state: u8,
    pub previous_state: u8,
    pub event_state: u8,
}

pub fn decode_get_state_sensor_readings_resp(msg: &[u8]) -> Result<Vec<StateField>> {
    let mut r = ByteReader::body(msg)?;
    let cc = r.completion_code()?;
    if cc != super::CC_SUCCESS {
        return Err(Error::CompletionCode(cc));
    }
    let count = usize::from(r.u8()?);
    let mut fields = Vec::with_capacity(count);
    for _ in 0..count {
        fields.push(StateField {
            operational_state: r.u8()?,
            present_state: r.u8()?,
            previous_state: r.u8()?,
            event_state: r.u8()?,
        });
    }
    Ok(fields)
}

/// One composite-effecter entry for SetStateEffecterStates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateEffecterRequest {
    /// 0 = no change, 1 = request the given state.
    pub set_request: u8,
    pub effecter_state: u8,
}

pub fn encode_set_state_effecter_states_req(
    instance_id: u8,
    effecter_id: u16,
    states: &[StateEffecterRequest],
) -> Vec<u8> {
    let mut msg = super::request_msg(instance_id, TYPE_PLATFORM, CMD_SET_STATE_EFFECTER_STATES);
    msg.extend_from_slice(&effecter_id.to_le_bytes());
    msg.push(states.len() as u8);
    for s in states {
        msg.push(s.set_request);
        msg.push(s.effecter_state);
    }
    msg
}

pub fn decode_set_state_effecter_states_resp(msg: &[u8]) -> Result<u8> {
    let mut r = ByteReader::body(msg)?;
    r.completion_code()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{crc32, CC_SUCCESS};

    #[test]
    fn test_get_pdr_request_roundtrip() {
        let req = GetPdrReq {
            record_handle: 0x11223344,
            data_transfer_handle: 0xaabbccdd,
            transfer_op: TransferOp::GetFirstPart,
            request_count: 1024,
            record_change_number: 7,
        };
        let msg = encode_get_pdr_req(5, &req);
        assert_eq!(decode_get_pdr_req(&msg).unwrap(), req);
    }

    #[test]
    fn test_get_pdr_response_roundtrip_with_crc() {
        let resp = GetPdrResp {
            cc: CC_SUCCESS,
            next_record_handle: 2,
            next_data_transfer_handle: 0,
            transfer_flag: TransferFlag::End,
            record_data: vec![1, 2, 3, 4],
            transfer_crc: Some(0x5a),
        };
        let msg = encode_get_pdr_resp(0, &resp);
        assert_eq!(decode_get_pdr_resp(&msg).unwrap(), resp);
    }

    #[test]
    fn test_poll_event_roundtrip_multipart_end() {
        let data = vec![9u8; 6];
        let resp = PollEventResp {
            cc: CC_SUCCESS,
            tid: 1,
            event_id: 0x0001,
            next_data_transfer_handle: 0,
            transfer_flag: TransferFlag::End,
            event_class: 0x22,
            event_data: data.clone(),
            checksum: Some(crc32(&data)),
        };
        let msg = encode_poll_event_resp(0, &resp);
        assert_eq!(decode_poll_event_resp(&msg).unwrap(), resp);
    }

    #[test]
    fn test_poll_event_no_pending_event() {
        let resp = PollEventResp {
            cc: CC_SUCCESS,
            tid: 1,
            event_id: 0,
            next_data_transfer_handle: 0,
            transfer_flag: TransferFlag::StartAndEnd,
            event_class: 0,
            event_data: Vec::new(),
            checksum: None,
        };
        let msg = encode_poll_event_resp(0, &resp);
        let decoded = decode_poll_event_resp(&msg).unwrap();
        assert_eq!(decoded.event_id, 0);
        assert!(decoded.event_data.is_empty());
    }

    #[test]
    fn test_set_numeric_effecter_value_sizes() {
        let msg = encode_set_numeric_effecter_value_req(0, 9, SensorDataSize::Uint16, 513.0)
            .unwrap();
        // header(3) + effecter_id(2) + size tag(1) + value(2)
        assert_eq!(msg.len(), 8);
        assert_eq!(&msg[6..8], &513u16.to_le_bytes());
    }
}
