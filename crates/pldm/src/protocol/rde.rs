// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Redfish Device Enablement (type 6) command codecs (DSP0218).

use super::{ByteReader, MsgHeader, RdeTransferOp, TransferFlag, TYPE_RDE};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

// Command codes.
pub const CMD_NEGOTIATE_REDFISH_PARAMETERS: u8 = 0x01;
pub const CMD_NEGOTIATE_MEDIUM_PARAMETERS: u8 = 0x02;
pub const CMD_GET_SCHEMA_DICTIONARY: u8 = 0x03;
pub const CMD_GET_SCHEMA_URI: u8 = 0x04;
pub const CMD_GET_RESOURCE_ETAG: u8 = 0x05;
pub const CMD_RDE_OPERATION_INIT: u8 = 0x10;
pub const CMD_RDE_OPERATION_COMPLETE: u8 = 0x13;
pub const CMD_RDE_OPERATION_STATUS: u8 = 0x14;
pub const CMD_RDE_OPERATION_ENUMERATE: u8 = 0x16;
pub const CMD_RDE_MULTIPART_SEND: u8 = 0x30;
pub const CMD_RDE_MULTIPART_RECEIVE: u8 = 0x31;

/// Fixed bytes of an RDEOperationInit request before locator and payload:
/// resource id (4) + operation id (2) + type (1) + flags (1) +
/// send handle (4) + locator length (1) + payload length (4).
pub const OPERATION_INIT_REQ_FIXED_BYTES: usize = 17;

/// Operation flag bit: the Init request carries the payload inline.
pub const OP_FLAG_CONTAINS_REQUEST_PAYLOAD: u8 = 1 << 1;

/// Redfish operation types (DSP0218 Table 9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OperationType {
    Head = 0,
    Read = 1,
    Create = 2,
    Delete = 3,
    Update = 4,
    Replace = 5,
    Action = 6,
}

impl OperationType {
    pub fn from_raw(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(OperationType::Head),
            1 => Ok(OperationType::Read),
            2 => Ok(OperationType::Create),
            3 => Ok(OperationType::Delete),
            4 => Ok(OperationType::Update),
            5 => Ok(OperationType::Replace),
            6 => Ok(OperationType::Action),
            other => Err(Error::DecodeError(format!(
                "unknown operation type 0x{:02x}",
                other
            ))),
        }
    }

    /// Expand a supported-operations bitmap into types, bit N = type N.
    pub fn from_bitmap(bitmap: u16) -> Vec<OperationType> {
        (0u8..7)
            .filter(|bit| bitmap & (1 << bit) != 0)
            .filter_map(|bit| OperationType::from_raw(bit).ok())
            .collect()
    }
}

/// Schema classes (DSP0218 Table 8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SchemaClass {
    Major = 0,
    Event = 1,
    Annotation = 2,
    CollectionMemberType = 3,
    Error = 4,
    Registry = 5,
}

impl SchemaClass {
    pub fn from_raw(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(SchemaClass::Major),
            1 => Ok(SchemaClass::Event),
            2 => Ok(SchemaClass::Annotation),
            3 => Ok(SchemaClass::CollectionMemberType),
            4 => Ok(SchemaClass::Error),
            5 => Ok(SchemaClass::Registry),
            other => Err(Error::DecodeError(format!(
                "unknown schema class 0x{:02x}",
                other
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// varstring
// ---------------------------------------------------------------------------

/// String format tag for RDE variable strings.
pub const VARSTRING_UTF8: u8 = 2;

/// Encode an RDE varstring: format(1) + length(2, includes NUL) + bytes + NUL.
pub fn write_varstring(s: &str, out: &mut Vec<u8>) {
    out.push(VARSTRING_UTF8);
    out.extend_from_slice(&(s.len() as u16 + 1).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

/// Decode an RDE varstring into an owned string (NUL stripped).
pub fn read_varstring(r: &mut ByteReader<'_>) -> Result<String> {
    let _format = r.u8()?;
    let len = usize::from(r.u16_le()?);
    let mut bytes = r.vec(len)?;
    if bytes.last() == Some(&0) {
        bytes.pop();
    }
    String::from_utf8(bytes).map_err(|_| Error::DecodeError("varstring not UTF-8".into()))
}

// ---------------------------------------------------------------------------
// NegotiateRedfishParameters
// ---------------------------------------------------------------------------

pub fn encode_negotiate_redfish_parameters_req(
    instance_id: u8,
    mc_concurrency: u8,
    mc_features: u16,
) -> Vec<u8> {
    let mut msg = super::request_msg(instance_id, TYPE_RDE, CMD_NEGOTIATE_REDFISH_PARAMETERS);
    msg.push(mc_concurrency);
    msg.extend_from_slice(&mc_features.to_le_bytes());
    msg
}

pub fn decode_negotiate_redfish_parameters_req(msg: &[u8]) -> Result<(u8, u16)> {
    let mut r = ByteReader::body(msg)?;
    Ok((r.u8()?, r.u16_le()?))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiateRedfishParametersResp {
    pub cc: u8,
    pub device_concurrency: u8,
    pub device_capabilities: u8,
    pub device_features: u16,
    pub device_configuration_signature: u32,
    pub device_provider_name: String,
}

pub fn encode_negotiate_redfish_parameters_resp(
    instance_id: u8,
    resp: &NegotiateRedfishParametersResp,
) -> Vec<u8> {
    let mut msg = response_msg(instance_id, CMD_NEGOTIATE_REDFISH_PARAMETERS);
    msg.push(resp.cc);
    msg.push(resp.device_concurrency);
    msg.push(resp.device_capabilities);
    msg.extend_from_slice(&resp.device_features.to_le_bytes());
    msg.extend_from_slice(&resp.device_configuration_signature.to_le_bytes());
    write_varstring(&resp.device_provider_name, &mut msg);
    msg
}

pub fn decode_negotiate_redfish_parameters_resp(
    msg: &[u8],
) -> Result<NegotiateRedfishParametersResp> {
    let mut r = ByteReader::body(msg)?;
    let cc = r.completion_code()?;
    if cc != super::CC_SUCCESS {
        return Err(Error::RdeCompletion(
            crate::error::RdeCompletionCode::from_raw(cc),
        ));
    }
    Ok(NegotiateRedfishParametersResp {
        cc,
        device_concurrency: r.u8()?,
        device_capabilities: r.u8()?,
        device_features: r.u16_le()?,
        device_configuration_signature: r.u32_le()?,
        device_provider_name: read_varstring(&mut r)?,
    })
}

// ---------------------------------------------------------------------------
// NegotiateMediumParameters
// ---------------------------------------------------------------------------

pub fn encode_negotiate_medium_parameters_req(instance_id: u8, mc_max_chunk: u32) -> Vec<u8> {
    let mut msg = super::request_msg(instance_id, TYPE_RDE, CMD_NEGOTIATE_MEDIUM_PARAMETERS);
    msg.extend_from_slice(&mc_max_chunk.to_le_bytes());
    msg
}

pub fn decode_negotiate_medium_parameters_req(msg: &[u8]) -> Result<u32> {
    let mut r = ByteReader::body(msg)?;
    r.u32_le()
}

pub fn encode_negotiate_medium_parameters_resp(
    instance_id: u8,
    cc: u8,
    device_max_chunk: u32,
) -> Vec<u8> {
    let mut msg = response_msg(instance_id, CMD_NEGOTIATE_MEDIUM_PARAMETERS);
    msg.push(cc);
    msg.extend_from_slice(&device_max_chunk.to_le_bytes());
    msg
}

pub fn decode_negotiate_medium_parameters_resp(msg: &[u8]) -> Result<u32> {
    let mut r = ByteReader::body(msg)?;
    let cc = r.completion_code()?;
    if cc != super::CC_SUCCESS {
        return Err(Error::RdeCompletion(
            crate::error::RdeCompletionCode::from_raw(cc),
        ));
    }
    r.u32_le()
}

// ---------------------------------------------------------------------------
// GetSchemaDictionary
// ---------------------------------------------------------------------------

pub fn encode_get_schema_dictionary_req(
    instance_id: u8,
    resource_id: u32,
    schema_class: SchemaClass,
) -> Vec<u8> {
    let mut msg = super::request_msg(instance_id, TYPE_RDE, CMD_GET_SCHEMA_DICTIONARY);
    msg.extend_from_slice(&resource_id.to_le_bytes());
    msg.push(schema_class as u8);
    msg
}

pub fn decode_get_schema_dictionary_req(msg: &[u8]) -> Result<(u32, SchemaClass)> {
    let mut r = ByteReader::body(msg)?;
    Ok((r.u32_le()?, SchemaClass::from_raw(r.u8()?)?))
}

pub fn encode_get_schema_dictionary_resp(
    instance_id: u8,
    cc: u8,
    dictionary_format: u8,
    transfer_handle: u32,
) -> Vec<u8> {
    let mut msg = response_msg(instance_id, CMD_GET_SCHEMA_DICTIONARY);
    msg.push(cc);
    msg.push(dictionary_format);
    msg.extend_from_slice(&transfer_handle.to_le_bytes());
    msg
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetSchemaDictionaryResp {
    pub cc: u8,
    pub dictionary_format: u8,
    pub transfer_handle: u32,
}

pub fn decode_get_schema_dictionary_resp(msg: &[u8]) -> Result<GetSchemaDictionaryResp> {
    let mut r = ByteReader::body(msg)?;
    let cc = r.completion_code()?;
    if cc != super::CC_SUCCESS {
        return Err(Error::RdeCompletion(
            crate::error::RdeCompletionCode::from_raw(cc),
        ));
    }
    Ok(GetSchemaDictionaryResp {
        cc,
        dictionary_format: r.u8()?,
        transfer_handle: r.u32_le()?,
    })
}

// ---------------------------------------------------------------------------
// GetSchemaURI / GetResourceETag
// ---------------------------------------------------------------------------

pub fn encode_get_schema_uri_req(
    instance_id: u8,
    resource_id: u32,
    schema_class: SchemaClass,
    oem_extension: u8,
) -> Vec<u8> {
    let mut msg = super::request_msg(instance_id, TYPE_RDE, CMD_GET_SCHEMA_URI);
    msg.extend_from_slice(&resource_id.to_le_bytes());
    msg.push(schema_class as u8);
    msg.push(oem_extension);
    msg
}

pub fn decode_get_schema_uri_resp(msg: &[u8]) -> Result<Vec<String>> {
    let mut r = ByteReader::body(msg)?;
    let cc = r.completion_code()?;
    if cc != super::CC_SUCCESS {
        return Err(Error::RdeCompletion(
            crate::error::RdeCompletionCode::from_raw(cc),
        ));
    }
    let count = usize::from(r.u8()?);
    let mut fragments = Vec::with_capacity(count);
    for _ in 0..count {
        fragments.push(read_varstring(&mut r)?);
    }
    Ok(fragments)
}

pub fn encode_get_resource_etag_req(instance_id: u8, resource_id: u32) -> Vec<u8> {
    let mut msg = super::request_msg(instance_id, TYPE_RDE, CMD_GET_RESOURCE_ETAG);
    msg.extend_from_slice(&resource_id.to_le_bytes());
    msg
}

pub fn encode_get_resource_etag_resp(instance_id: u8, cc: u8, etag: &str) -> Vec<u8> {
    let mut msg = response_msg(instance_id, CMD_GET_RESOURCE_ETAG);
    msg.push(cc);
    write_varstring(etag, &mut msg);
    msg
}

pub fn decode_get_resource_etag_resp(msg: &[u8]) -> Result<String> {
    let mut r = ByteReader::body(msg)?;
    let cc = r.completion_code()?;
    if cc != super::CC_SUCCESS {
        return Err(Error::RdeCompletion(
            crate::error::RdeCompletionCode::from_raw(cc),
        ));
    }
    read_varstring(&mut r)
}

// ---------------------------------------------------------------------------
// RDEOperationInit
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationInitReq {
    pub resource_id: u32,
    pub operation_id: u16,
    pub operation_type: OperationType,
    pub operation_flags: u8,
    pub send_data_transfer_handle: u32,
    pub operation_locator: Vec<u8>,
    pub request_payload: Vec<u8>,
}

pub fn encode_rde_operation_init_req(instance_id: u8, req: &OperationInitReq) -> Vec<u8> {
    let mut msg = super::request_msg(instance_id, TYPE_RDE, CMD_RDE_OPERATION_INIT);
    msg.extend_from_slice(&req.resource_id.to_le_bytes());
    msg.extend_from_slice(&req.operation_id.to_le_bytes());
    msg.push(req.operation_type as u8);
    msg.push(req.operation_flags);
    msg.extend_from_slice(&req.send_data_transfer_handle.to_le_bytes());
    msg.push(req.operation_locator.len() as u8);
    msg.extend_from_slice(&(req.request_payload.len() as u32).to_le_bytes());
    msg.extend_from_slice(&req.operation_locator);
    msg.extend_from_slice(&req.request_payload);
    msg
}

pub fn decode_rde_operation_init_req(msg: &[u8]) -> Result<OperationInitReq> {
    let mut r = ByteReader::body(msg)?;
    let resource_id = r.u32_le()?;
    let operation_id = r.u16_le()?;
    let operation_type = OperationType::from_raw(r.u8()?)?;
    let operation_flags = r.u8()?;
    let send_data_transfer_handle = r.u32_le()?;
    let locator_len = usize::from(r.u8()?);
    let payload_len = r.u32_le()? as usize;
    let operation_locator = r.vec(locator_len)?;
    let request_payload = r.vec(payload_len)?;
    Ok(OperationInitReq {
        resource_id,
        operation_id,
        operation_type,
        operation_flags,
        send_data_transfer_handle,
        operation_locator,
        request_payload,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResp {
    pub cc: u8,
    pub operation_status: u8,
    pub completion_percentage: u8,
    pub completion_time_seconds: u32,
    pub operation_execution_flags: u8,
    pub result_transfer_handle: u32,
    pub permission_flags: u8,
    pub etag: String,
    pub response_payload: Vec<u8>,
}

fn encode_operation_resp(instance_id: u8, command: u8, resp: &OperationResp) -> Vec<u8> {
    let mut msg = response_msg(instance_id, command);
    msg.push(resp.cc);
    msg.push(resp.operation_status);
    msg.push(resp.completion_percentage);
    msg.extend_from_slice(&resp.completion_time_seconds.to_le_bytes());
    msg.push(resp.operation_execution_flags);
    msg.extend_from_slice(&resp.result_transfer_handle.to_le_bytes());
    msg.push(resp.permission_flags);
    msg.extend_from_slice(&(resp.response_payload.len() as u32).to_le_bytes());
    write_varstring(&resp.etag, &mut msg);
    msg.extend_from_slice(&resp.response_payload);
    msg
}

fn decode_operation_resp(msg: &[u8]) -> Result<OperationResp> {
    let mut r = ByteReader::body(msg)?;
    let cc = r.completion_code()?;
    if cc != super::CC_SUCCESS {
        return Err(Error::RdeCompletion(
            crate::error::RdeCompletionCode::from_raw(cc),
        ));
    }
    let operation_status = r.u8()?;
    let completion_percentage = r.u8()?;
    let completion_time_seconds = r.u32_le()?;
    let operation_execution_flags = r.u8()?;
    let result_transfer_handle = r.u32_le()?;
    let permission_flags = r.u8()?;
    let payload_len = r.u32_le()? as usize;
    let etag = read_varstring(&mut r)?;
    let response_payload = r.vec(payload_len)?;
    Ok(OperationResp {
        cc,
        operation_status,
        completion_percentage,
        completion_time_seconds,
        operation_execution_flags,
        result_transfer_handle,
        permission_flags,
        etag,
        response_payload,
    })
}

pub fn encode_rde_operation_init_resp(instance_id: u8, resp: &OperationResp) -> Vec<u8> {
    encode_operation_resp(instance_id, CMD_RDE_OPERATION_INIT, resp)
}

pub fn decode_rde_operation_init_resp(msg: &[u8]) -> Result<OperationResp> {
    decode_operation_resp(msg)
}

// ---------------------------------------------------------------------------
// RDEOperationComplete / RDEOperationStatus / RDEOperationEnumerate
// ---------------------------------------------------------------------------

pub fn encode_rde_operation_complete_req(
    instance_id: u8,
    resource_id: u32,
    operation_id: u16,
) -> Vec<u8> {
    let mut msg = super::request_msg(instance_id, TYPE_RDE, CMD_RDE_OPERATION_COMPLETE);
    msg.extend_from_slice(&resource_id.to_le_bytes());
    msg.extend_from_slice(&operation_id.to_le_bytes());
    msg
}

pub fn decode_rde_operation_complete_req(msg: &[u8]) -> Result<(u32, u16)> {
    let mut r = ByteReader::body(msg)?;
    Ok((r.u32_le()?, r.u16_le()?))
}

pub fn decode_rde_operation_complete_resp(msg: &[u8]) -> Result<u8> {
    let mut r = ByteReader::body(msg)?;
    r.completion_code()
}

pub fn encode_rde_operation_status_req(
    instance_id: u8,
    resource_id: u32,
    operation_id: u16,
) -> Vec<u8> {
    let mut msg = super::request_msg(instance_id, TYPE_RDE, CMD_RDE_OPERATION_STATUS);
    msg.extend_from_slice(&resource_id.to_le_bytes());
    msg.extend_from_slice(&operation_id.to_le_bytes());
    msg
}

pub fn decode_rde_operation_status_resp(msg: &[u8]) -> Result<OperationResp> {
    decode_operation_resp(msg)
}

/// One entry in an RDEOperationEnumerate response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumeratedOperation {
    pub resource_id: u32,
    pub operation_id: u16,
    pub operation_type: OperationType,
}

pub fn encode_rde_operation_enumerate_req(instance_id: u8) -> Vec<u8> {
    super::request_msg(instance_id, TYPE_RDE, CMD_RDE_OPERATION_ENUMERATE)
}

pub fn decode_rde_operation_enumerate_resp(msg: &[u8]) -> Result<Vec<EnumeratedOperation>> {
    let mut r = ByteReader::body(msg)?;
    let cc = r.completion_code()?;
    if cc != super::CC_SUCCESS {
        return Err(Error::RdeCompletion(
            crate::error::RdeCompletionCode::from_raw(cc),
        ));
    }
    let count = usize::from(r.u16_le()?);
    let mut ops = Vec::with_capacity(count);
    for _ in 0..count {
        ops.push(EnumeratedOperation {
            resource_id: r.u32_le()?,
            operation_id: r.u16_le()?,
            operation_type: OperationType::from_raw(r.u8()?)?,
        });
    }
    Ok(ops)
}

// ---------------------------------------------------------------------------
// RDEMultipartReceive
// ---------------------------------------------------------------------------

pub fn encode_rde_multipart_receive_req(
    instance_id: u8,
    data_transfer_handle: u32,
    operation_id: u16,
    transfer_op: RdeTransferOp,
) -> Vec<u8> {
    let mut msg = super::request_msg(instance_id, TYPE_RDE, CMD_RDE_MULTIPART_RECEIVE);
    msg.extend_from_slice(&data_transfer_handle.to_le_bytes());
    msg.extend_from_slice(&operation_id.to_le_bytes());
    msg.push(transfer_op as u8);
    msg
}

pub fn decode_rde_multipart_receive_req(msg: &[u8]) -> Result<(u32, u16, RdeTransferOp)> {
    let mut r = ByteReader::body(msg)?;
    Ok((r.u32_le()?, r.u16_le()?, RdeTransferOp::from_raw(r.u8()?)?))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartReceiveResp {
    pub cc: u8,
    pub transfer_flag: TransferFlag,
    pub next_data_transfer_handle: u32,
    /// Chunk bytes. On `End`/`StartAndEnd` the final 4 bytes are the CRC32
    /// over the complete transfer body.
    pub data: Vec<u8>,
}

pub fn encode_rde_multipart_receive_resp(
    instance_id: u8,
    resp: &MultipartReceiveResp,
) -> Vec<u8> {
    let mut msg = response_msg(instance_id, CMD_RDE_MULTIPART_RECEIVE);
    msg.push(resp.cc);
    msg.push(resp.transfer_flag as u8);
    msg.extend_from_slice(&resp.next_data_transfer_handle.to_le_bytes());
    msg.extend_from_slice(&(resp.data.len() as u32).to_le_bytes());
    msg.extend_from_slice(&resp.data);
    msg
}

pub fn decode_rde_multipart_receive_resp(msg: &[u8]) -> Result<MultipartReceiveResp> {
    let mut r = ByteReader::body(msg)?;
    let cc = r.completion_code()?;
    if cc != super::CC_SUCCESS {
        return Err(Error::RdeCompletion(
            crate::error::RdeCompletionCode::from_raw(cc),
        ));
    }
    let transfer_flag = TransferFlag::from_raw(r.u8()?)?;
    let next_data_transfer_handle = r.u32_le()?;
    let len = r.u32_le()? as usize;
    let data = r.vec(len)?;
    Ok(MultipartReceiveResp {
        cc,
        transfer_flag,
        next_data_transfer_handle,
        data,
    })
}

// ---------------------------------------------------------------------------
// RDEMultipartSend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartSendReq {
    pub data_transfer_handle: u32,
    pub operation_id: u16,
    pub transfer_flag: TransferFlag,
    pub next_data_transfer_handle: u32,
    pub data: Vec<u8>,
    /// CRC32 over the complete staged payload; carried on the final chunk.
    pub checksum: Option<u32>,
}

pub fn encode_rde_multipart_send_req(instance_id: u8, req: &MultipartSendReq) -> Vec<u8> {
    let mut msg = super::request_msg(instance_id, TYPE_RDE, CMD_RDE_MULTIPART_SEND);
    msg.extend_from_slice(&req.data_transfer_handle.to_le_bytes());
    msg.extend_from_slice(&req.operation_id.to_le_bytes());
    msg.push(req.transfer_flag as u8);
    msg.extend_from_slice(&req.next_data_transfer_handle.to_le_bytes());
    msg.extend_from_slice(&(req.data.len() as u32).to_le_bytes());
    msg.extend_from_slice(&req.data);
    if let Some(crc) = req.checksum {
        msg.extend_from_slice(&crc.to_le_bytes());
    }
    msg
}

pub fn decode_rde_multipart_send_req(msg: &[u8]) -> Result<MultipartSendReq> {
    let mut r = ByteReader::body(msg)?;
    let data_transfer_handle = r.u32_le()?;
    let operation_id = r.u16_le()?;
    let transfer_flag = TransferFlag::from_raw(r.u8()?)?;
    let next_data_transfer_handle = r.u32_le()?;
    let len = r.u32_le()? as usize;
    let data = r.vec(len)?;
    let checksum = if transfer_flag.is_final() && r.remaining() >= 4 {
        Some(r.u32_le()?)
    } else {
        None
    };
    Ok(MultipartSendReq {
        data_transfer_handle,
        operation_id,
        transfer_flag,
        next_data_transfer_handle,
        data,
        checksum,
    })
}

pub fn encode_rde_multipart_send_resp(
    instance_id: u8,
    cc: u8,
    transfer_op: RdeTransferOp,
) -> Vec<u8> {
    let mut msg = response_msg(instance_id, CMD_RDE_MULTIPART_SEND);
    msg.push(cc);
    msg.push(transfer_op as u8);
    msg
}

/// Returns the transfer operation the device expects next.
pub fn decode_rde_multipart_send_resp(msg: &[u8]) -> Result<RdeTransferOp> {
    let mut r = ByteReader::body(msg)?;
    let cc = r.completion_code()?;
    if cc != super::CC_SUCCESS {
        return Err(Error::RdeCompletion(
            crate::error::RdeCompletionCode::from_raw(cc),
        ));
    }
    RdeTransferOp::from_raw(r.u8()?)
}

fn response_msg(instance_id: u8, command: u8) -> Vec<u8> {
    MsgHeader {
        request: false,
        datagram: false,
        instance_id,
        pldm_type: TYPE_RDE,
        command,
    }
    .encode()
    .to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::CC_SUCCESS;

    #[test]
    fn test_negotiate_redfish_parameters_roundtrip() {
        let resp = NegotiateRedfishParametersResp {
            cc: CC_SUCCESS,
            device_concurrency: 2,
            device_capabilities: 0b101,
            device_features: 0x0113,
            device_configuration_signature: 0xcafe_babe,
            device_provider_name: "Contoso".to_string(),
        };
        let msg = encode_negotiate_redfish_parameters_resp(0, &resp);
        assert_eq!(decode_negotiate_redfish_parameters_resp(&msg).unwrap(), resp);
    }

    #[test]
    fn test_negotiate_redfish_parameters_error_cc_classified() {
        let mut msg = response_msg(0, CMD_NEGOTIATE_REDFISH_PARAMETERS);
        msg.push(0x89); // Unsupported
        match decode_negotiate_redfish_parameters_resp(&msg) {
            Err(Error::RdeCompletion(cc)) => {
                assert_eq!(cc, crate::error::RdeCompletionCode::Unsupported);
            }
            other => panic!("expected RdeCompletion error, got {:?}", other),
        }
    }

    #[test]
    fn test_operation_init_request_roundtrip() {
        let req = OperationInitReq {
            resource_id: 1,
            operation_id: 42,
            operation_type: OperationType::Update,
            operation_flags: OP_FLAG_CONTAINS_REQUEST_PAYLOAD,
            send_data_transfer_handle: 0,
            operation_locator: vec![],
            request_payload: vec![0xde, 0xad],
        };
        let msg = encode_rde_operation_init_req(9, &req);
        assert_eq!(decode_rde_operation_init_req(&msg).unwrap(), req);
    }

    #[test]
    fn test_operation_init_resp_roundtrip() {
        let resp = OperationResp {
            cc: CC_SUCCESS,
            operation_status: 0,
            completion_percentage: 100,
            completion_time_seconds: 0,
            operation_execution_flags: 0,
            result_transfer_handle: 7,
            permission_flags: 0,
            etag: "W/\"123\"".to_string(),
            response_payload: vec![1, 2, 3],
        };
        let msg = encode_rde_operation_init_resp(0, &resp);
        assert_eq!(decode_rde_operation_init_resp(&msg).unwrap(), resp);
    }

    #[test]
    fn test_multipart_receive_roundtrip() {
        let resp = MultipartReceiveResp {
            cc: CC_SUCCESS,
            transfer_flag: TransferFlag::Middle,
            next_data_transfer_handle: 0x44,
            data: vec![7u8; 64],
        };
        let msg = encode_rde_multipart_receive_resp(0, &resp);
        assert_eq!(decode_rde_multipart_receive_resp(&msg).unwrap(), resp);
    }

    #[test]
    fn test_multipart_send_final_chunk_carries_checksum() {
        let req = MultipartSendReq {
            data_transfer_handle: 3,
            operation_id: 42,
            transfer_flag: TransferFlag::End,
            next_data_transfer_handle: 0,
            data: vec![1, 2, 3, 4],
            checksum: Some(0x1234_5678),
        };
        let msg = encode_rde_multipart_send_req(0, &req);
        assert_eq!(decode_rde_multipart_send_req(&msg).unwrap(), req);
    }

    #[test]
    fn test_operation_bitmap_expansion() {
        let ops = OperationType::from_bitmap(0b0001_0011);
        assert_eq!(
            ops,
            vec![
                OperationType::Head,
                OperationType::Read,
                OperationType::Update
            ]
        );
    }

    #[test]
    fn test_varstring_roundtrip() {
        let mut buf = Vec::new();
        write_varstring("Chassis", &mut buf);
        let mut r = ByteReader::new(&buf);
        assert_eq!(read_varstring(&mut r).unwrap(), "Chassis");
        assert_eq!(r.remaining(), 0);
    }
}
