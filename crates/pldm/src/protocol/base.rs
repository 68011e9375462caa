// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Base (type 0) command codecs: terminus identity and capability probing.

use super::{ByteReader, MsgHeader, TransferOp, HDR_SIZE, TYPE_BASE};
use crate::error::{Error, Result};

// Command codes (DSP0240).
pub const CMD_SET_TID: u8 = 0x01;
pub const CMD_GET_TID: u8 = 0x02;
pub const CMD_GET_PLDM_VERSION: u8 = 0x03;
pub const CMD_GET_PLDM_TYPES: u8 = 0x04;
pub const CMD_GET_PLDM_COMMANDS: u8 = 0x05;
pub const CMD_NEGOTIATE_TRANSFER_PARAMETERS: u8 = 0x06;
pub const CMD_MULTIPART_RECEIVE: u8 = 0x08;

/// Width of the supported-types bitmap.
pub const PLDM_TYPES_BITMAP_LEN: usize = 8;
/// Width of the supported-commands bitmap.
pub const PLDM_COMMANDS_BITMAP_LEN: usize = 32;

// ---------------------------------------------------------------------------
// GetTID
// ---------------------------------------------------------------------------

pub fn encode_get_tid_req(instance_id: u8) -> Vec<u8> {
    super::request_msg(instance_id, TYPE_BASE, CMD_GET_TID)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetTidResp {
    pub cc: u8,
    pub tid: u8,
}

pub fn decode_get_tid_resp(msg: &[u8]) -> Result<GetTidResp> {
    let mut r = ByteReader::body(msg)?;
    let cc = r.completion_code()?;
    if cc != super::CC_SUCCESS {
        return Ok(GetTidResp { cc, tid: 0 });
    }
    Ok(GetTidResp { cc, tid: r.u8()? })
}

// ---------------------------------------------------------------------------
// SetTID
// ---------------------------------------------------------------------------

pub fn encode_set_tid_req(instance_id: u8, tid: u8) -> Vec<u8> {
    let mut msg = super::request_msg(instance_id, TYPE_BASE, CMD_SET_TID);
    msg.push(tid);
    msg
}

pub fn decode_set_tid_req(msg: &[u8]) -> Result<u8> {
    let mut r = ByteReader::body(msg)?;
    r.u8()
}

pub fn decode_set_tid_resp(msg: &[u8]) -> Result<u8> {
    let mut r = ByteReader::body(msg)?;
    r.completion_code()
}

// ---------------------------------------------------------------------------
// GetPLDMTypes
// ---------------------------------------------------------------------------

pub fn encode_get_types_req(instance_id: u8) -> Vec<u8> {
    super::request_msg(instance_id, TYPE_BASE, CMD_GET_PLDM_TYPES)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetTypesResp {
    pub cc: u8,
    /// 64-bit bitmap; bit N set means PLDM type N is supported.
    pub types: u64,
}

impl GetTypesResp {
    pub fn supports(&self, pldm_type: u8) -> bool {
        pldm_type < 64 && self.types & (1u64 << pldm_type) != 0
    }
}

pub fn decode_get_types_resp(msg: &[u8]) -> Result<GetTypesResp> {
    let mut r = ByteReader::body(msg)?;
    let cc = r.completion_code()?;
    if cc != super::CC_SUCCESS {
        return Ok(GetTypesResp { cc, types: 0 });
    }
    let mut bitmap = [0u8; PLDM_TYPES_BITMAP_LEN];
    bitmap.copy_from_slice(r.bytes(PLDM_TYPES_BITMAP_LEN)?);
    Ok(GetTypesResp {
        cc,
        types: u64::from_le_bytes(bitmap),
    })
}

// ---------------------------------------------------------------------------
// GetPLDMCommands
// ---------------------------------------------------------------------------

pub fn encode_get_commands_req(instance_id: u8, pldm_type: u8, version: Ver32) -> Vec<u8> {
    let mut msg = super::request_msg(instance_id, TYPE_BASE, CMD_GET_PLDM_COMMANDS);
    msg.push(pldm_type);
    msg.extend_from_slice(&version.to_bytes());
    msg
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetCommandsResp {
    pub cc: u8,
    /// 256-bit bitmap; bit N set means command N is supported.
    pub commands: [u8; PLDM_COMMANDS_BITMAP_LEN],
}

impl GetCommandsResp {
    pub fn supports(&self, command: u8) -> bool {
        self.commands[usize::from(command) / 8] & (1 << (command % 8)) != 0
    }
}

pub fn decode_get_commands_resp(msg: &[u8]) -> Result<GetCommandsResp> {
    let mut r = ByteReader::body(msg)?;
    let cc = r.completion_code()?;
    let mut commands = [0u8; PLDM_COMMANDS_BITMAP_LEN];
    if cc == super::CC_SUCCESS {
        commands.copy_from_slice(r.bytes(PLDM_COMMANDS_BITMAP_LEN)?);
    }
    Ok(GetCommandsResp { cc, commands })
}

// ---------------------------------------------------------------------------
// GetPLDMVersion
// ---------------------------------------------------------------------------

pub fn encode_get_version_req(
    instance_id: u8,
    transfer_handle: u32,
    op: TransferOp,
    pldm_type: u8,
) -> Vec<u8> {
    let mut msg = super::request_msg(instance_id, TYPE_BASE, CMD_GET_PLDM_VERSION);
    msg.extend_from_slice(&transfer_handle.to_le_bytes());
    msg.push(op as u8);
    msg.push(pldm_type);
    msg
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetVersionResp {
    pub cc: u8,
    pub next_transfer_handle: u32,
    pub transfer_flag: u8,
    pub version: Ver32,
}

pub fn decode_get_version_resp(msg: &[u8]) -> Result<GetVersionResp> {
    let mut r = ByteReader::body(msg)?;
    let cc = r.completion_code()?;
    if cc != super::CC_SUCCESS {
        return Ok(GetVersionResp {
            cc,
            next_transfer_handle: 0,
            transfer_flag: 0,
            version: Ver32::ABSENT,
        });
    }
    Ok(GetVersionResp {
        cc,
        next_transfer_handle: r.u32_le()?,
        transfer_flag: r.u8()?,
        version: Ver32::from_bytes([r.u8()?, r.u8()?, r.u8()?, r.u8()?]),
    })
}

// ---------------------------------------------------------------------------
// ver32
// ---------------------------------------------------------------------------

/// PLDM ver32 version field (DSP0240 Sec.12): BCD-encoded
/// `major.minor.update` plus an optional alpha byte. 0xFF in a field means
/// "not present"; an all-0xFF version renders as `?.?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ver32 {
    pub alpha: u8,
    pub update: u8,
    pub minor: u8,
    pub major: u8,
}

impl Ver32 {
    pub const ABSENT: Ver32 = Ver32 {
        alpha: 0xff,
        update: 0xff,
        minor: 0xff,
        major: 0xff,
    };

    /// Wire order: alpha, update, minor, major.
    pub fn from_bytes(b: [u8; 4]) -> Self {
        Self {
            alpha: b[0],
            update: b[1],
            minor: b[2],
            major: b[3],
        }
    }

    pub fn to_bytes(self) -> [u8; 4] {
        [self.alpha, self.update, self.minor, self.major]
    }

    fn bcd_field(v: u8) -> Option<u8> {
        if v == 0xff {
            return None;
        }
        // Single-digit values carry an 0xF marker nibble.
        if v & 0xf0 == 0xf0 {
            Some(v & 0x0f)
        } else {
            Some((v >> 4) * 10 + (v & 0x0f))
        }
    }

    /// Render as a dotted version string; `?.?` when absent.
    pub fn display(self) -> String {
        if self == Ver32::ABSENT {
            return "?.?".to_string();
        }
        let major = Self::bcd_field(self.major).unwrap_or(0);
        let minor = Self::bcd_field(self.minor).unwrap_or(0);
        let mut s = format!("{}.{}", major, minor);
        if let Some(update) = Self::bcd_field(self.update) {
            s.push_str(&format!(".{}", update));
        }
        if self.alpha != 0xff && self.alpha != 0 {
            s.push(self.alpha as char);
        }
        s
    }
}

// ---------------------------------------------------------------------------
// Request decoders used by tests and responder shims
// ---------------------------------------------------------------------------

/// Decode the header of any request and verify the request bit is set.
pub fn decode_request_header(msg: &[u8]) -> Result<MsgHeader> {
    let hdr = MsgHeader::decode(msg)?;
    if !hdr.request {
        return Err(Error::DecodeError("request bit not set".into()));
    }
    Ok(hdr)
}

pub fn decode_get_commands_req(msg: &[u8]) -> Result<(u8, Ver32)> {
    let mut r = ByteReader::body(msg)?;
    let pldm_type = r.u8()?;
    let version = Ver32::from_bytes([r.u8()?, r.u8()?, r.u8()?, r.u8()?]);
    Ok((pldm_type, version))
}

pub fn body_len(msg: &[u8]) -> usize {
    msg.len().saturating_sub(HDR_SIZE)
}
