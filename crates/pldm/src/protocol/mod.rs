// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! PLDM wire formats (DSP0240 framing, command codecs, transfer flags).
//!
//! Message layout:
//!
//! ```text
//! +--------------------------------------------------------------+
//! | byte 0: Rq(1) | D(1) | rsvd(1) | InstanceID(5)               |
//! | byte 1: HdrVer(2) | PldmType(6)                              |
//! | byte 2: Command                                              |
//! | byte 3..: command payload (responses lead with a completion  |
//! |           code byte)                                         |
//! +--------------------------------------------------------------+
//! ```
//!
//! Every `encode_*_req` returns a complete message (header included);
//! every `decode_*_resp` takes a complete message and produces owned,
//! typed values. Parsers never retain views into transport buffers.

pub mod base;
pub mod pdr;
pub mod platform;
pub mod rde;

use crate::error::{Error, Result};

/// MCTP endpoint ID.
pub type Eid = u8;
/// PLDM terminus ID.
pub type Tid = u8;

/// Fixed PLDM header length.
pub const HDR_SIZE: usize = 3;

// PLDM type codes (DSP0245).
pub const TYPE_BASE: u8 = 0x00;
pub const TYPE_PLATFORM: u8 = 0x02;
pub const TYPE_BIOS: u8 = 0x03;
pub const TYPE_FRU: u8 = 0x04;
pub const TYPE_FIRMWARE_UPDATE: u8 = 0x05;
pub const TYPE_RDE: u8 = 0x06;

// Generic completion codes (DSP0240).
pub const CC_SUCCESS: u8 = 0x00;
pub const CC_ERROR: u8 = 0x01;
pub const CC_ERROR_INVALID_DATA: u8 = 0x02;
pub const CC_ERROR_INVALID_LENGTH: u8 = 0x03;
pub const CC_ERROR_NOT_READY: u8 = 0x04;
pub const CC_ERROR_UNSUPPORTED_CMD: u8 = 0x05;

/// CRC32 over a reassembled multipart payload.
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// PLDM message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgHeader {
    /// Request bit (bit 7 of byte 0). Clear in responses.
    pub request: bool,
    /// Datagram bit (bit 6 of byte 0).
    pub datagram: bool,
    /// 5-bit instance ID.
    pub instance_id: u8,
    /// 6-bit PLDM type.
    pub pldm_type: u8,
    /// Command code.
    pub command: u8,
}

impl MsgHeader {
    /// Build a request header.
    pub fn request(instance_id: u8, pldm_type: u8, command: u8) -> Self {
        Self {
            request: true,
            datagram: false,
            instance_id,
            pldm_type,
            command,
        }
    }

    /// Build a response header mirroring a request.
    pub fn response_to(req: &MsgHeader) -> Self {
        Self {
            request: false,
            datagram: false,
            instance_id: req.instance_id,
            pldm_type: req.pldm_type,
            command: req.command,
        }
    }

    /// Encode into the 3 header bytes.
    pub fn encode(&self) -> [u8; HDR_SIZE] {
        let mut b0 = self.instance_id & 0x1f;
        if self.request {
            b0 |= 0x80;
        }
        if self.datagram {
            b0 |= 0x40;
        }
        [b0, self.pldm_type & 0x3f, self.command]
    }

    /// Decode the header bytes of a complete message.
    pub fn decode(msg: &[u8]) -> Result<Self> {
        if msg.len() < HDR_SIZE {
            return Err(Error::DecodeError(format!(
                "message too short for header: {} bytes",
                msg.len()
            )));
        }
        Ok(Self {
            request: msg[0] & 0x80 != 0,
            datagram: msg[0] & 0x40 != 0,
            instance_id: msg[0] & 0x1f,
            pldm_type: msg[1] & 0x3f,
            command: msg[2],
        })
    }
}

/// Start a request message: header bytes followed by nothing.
pub(crate) fn request_msg(instance_id: u8, pldm_type: u8, command: u8) -> Vec<u8> {
    MsgHeader::request(instance_id, pldm_type, command)
        .encode()
        .to_vec()
}

/// Transfer flags shared by the multipart mechanisms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransferFlag {
    Start = 0,
    Middle = 1,
    End = 4,
    StartAndEnd = 5,
    AckCompletion = 8,
}

impl TransferFlag {
    pub fn from_raw(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(TransferFlag::Start),
            1 => Ok(TransferFlag::Middle),
            4 => Ok(TransferFlag::End),
            5 => Ok(TransferFlag::StartAndEnd),
            8 => Ok(TransferFlag::AckCompletion),
            other => Err(Error::DecodeError(format!(
                "unknown transfer flag 0x{:02x}",
                other
            ))),
        }
    }

    /// True for `End` and `StartAndEnd`.
    pub fn is_final(self) -> bool {
        matches!(self, TransferFlag::End | TransferFlag::StartAndEnd)
    }
}

/// Transfer operation flag for GetPDR and PollForPlatformEventMessage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransferOp {
    GetNextPart = 0,
    GetFirstPart = 1,
    AcknowledgementOnly = 2,
}

impl TransferOp {
    pub fn from_raw(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(TransferOp::GetNextPart),
            1 => Ok(TransferOp::GetFirstPart),
            2 => Ok(TransferOp::AcknowledgementOnly),
            other => Err(Error::DecodeError(format!(
                "unknown transfer operation 0x{:02x}",
                other
            ))),
        }
    }
}

/// Transfer operation for the RDE multipart commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RdeTransferOp {
    FirstPart = 0,
    NextPart = 1,
    Abort = 2,
    Complete = 3,
    /// Re-request the chunk just received (integrity recovery).
    CurrentPart = 4,
}

impl RdeTransferOp {
    pub fn from_raw(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(RdeTransferOp::FirstPart),
            1 => Ok(RdeTransferOp::NextPart),
            2 => Ok(RdeTransferOp::Abort),
            3 => Ok(RdeTransferOp::Complete),
            4 => Ok(RdeTransferOp::CurrentPart),
            other => Err(Error::DecodeError(format!(
                "unknown RDE transfer operation 0x{:02x}",
                other
            ))),
        }
    }
}

/// Bounds-checked cursor over a received message body.
pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Cursor positioned after the PLDM header of a complete message.
    pub fn body(msg: &'a [u8]) -> Result<Self> {
        if msg.len() < HDR_SIZE {
            return Err(Error::DecodeError("message shorter than header".into()));
        }
        Ok(Self {
            buf: msg,
            pos: HDR_SIZE,
        })
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn need(&self, n: usize) -> Result<()> {
        if self.remaining() < n {
            Err(Error::DecodeError(format!(
                "short buffer: need {} bytes at offset {}, have {}",
                n,
                self.pos,
                self.remaining()
            )))
        } else {
            Ok(())
        }
    }

    pub fn u8(&mut self) -> Result<u8> {
        self.need(1)?;
        let v = self.buf[self.pos];
        self.pos += 1;
        Ok(v)
    }

    pub fn i8(&mut self) -> Result<i8> {
        Ok(self.u8()? as i8)
    }

    pub fn u16_le(&mut self) -> Result<u16> {
        self.need(2)?;
        let v = u16::from_le_bytes([self.buf[self.pos], self.buf[self.pos + 1]]);
        self.pos += 2;
        Ok(v)
    }

    pub fn i16_le(&mut self) -> Result<i16> {
        Ok(self.u16_le()? as i16)
    }

    pub fn u32_le(&mut self) -> Result<u32> {
        self.need(4)?;
        let mut b = [0u8; 4];
        b.copy_from_slice(&self.buf[self.pos..self.pos + 4]);
        self.pos += 4;
        Ok(u32::from_le_bytes(b))
    }

    pub fn i32_le(&mut self) -> Result<i32> {
        Ok(self.u32_le()? as i32)
    }

    pub fn f32_le(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.u32_le()?))
    }

    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.need(n)?;
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    /// Copy out `n` bytes as an owned vector.
    pub fn vec(&mut self, n: usize) -> Result<Vec<u8>> {
        Ok(self.bytes(n)?.to_vec())
    }

    /// Completion-code byte leading every response body.
    pub fn completion_code(&mut self) -> Result<u8> {
        self.u8()
    }
}
