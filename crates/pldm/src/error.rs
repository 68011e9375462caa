// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-wide error taxonomy.
//!
//! Every fallible operation in the agent returns [`Result`]. The variants
//! mirror the failure domains of the stack: transport I/O, wire codecs,
//! device completion codes, allocator exhaustion, request deadlines and
//! multipart integrity.

use std::fmt;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the PLDM agent.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Transport
    // ========================================================================
    /// MCTP send/receive failed. Terminal for the current request.
    TransportFailure(String),
    /// I/O error with underlying cause.
    IoError(std::io::Error),

    // ========================================================================
    // Wire codecs
    // ========================================================================
    /// Outbound message failed to serialize. Not retried.
    EncodeError(String),
    /// Inbound message failed to parse. The message is dropped and the
    /// request is left to time out.
    DecodeError(String),

    // ========================================================================
    // Device responses
    // ========================================================================
    /// Device returned a non-zero PLDM completion code.
    CompletionCode(u8),
    /// Device returned a non-zero RDE completion code, pre-classified.
    RdeCompletion(RdeCompletionCode),

    // ========================================================================
    // Resources and deadlines
    // ========================================================================
    /// All 32 instance IDs for this TID are outstanding.
    NoFreeInstanceIds(u8),
    /// No correlated response after all retries. The request is released.
    Timeout,
    /// Multipart data-integrity check failed after bounded re-requests.
    ChecksumMismatch { expected: u32, computed: u32 },
    /// Critical-event queue is at capacity.
    QueueOverflow,

    // ========================================================================
    // State machines
    // ========================================================================
    /// A late callback arrived after `Cancelled`/`TimedOut`; dropped.
    StateViolation(&'static str),
    /// PDR repository (or terminus) not in a usable state.
    NotReady,
    /// Lookup miss: reserved identifier or unknown EID/TID/URI/resource.
    NotFound(String),
    /// PDR pagination revisited a record handle without progress.
    PdrCycle(u32),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TransportFailure(msg) => write!(f, "MCTP transport failure: {}", msg),
            Error::IoError(e) => write!(f, "I/O error: {}", e),
            Error::EncodeError(msg) => write!(f, "encode failed: {}", msg),
            Error::DecodeError(msg) => write!(f, "decode failed: {}", msg),
            Error::CompletionCode(cc) => write!(f, "PLDM completion code 0x{:02x}", cc),
            Error::RdeCompletion(cc) => write!(f, "RDE completion: {}", cc),
            Error::NoFreeInstanceIds(tid) => {
                write!(f, "no free instance ids for TID {}", tid)
            }
            Error::Timeout => write!(f, "request timed out after all retries"),
            Error::ChecksumMismatch { expected, computed } => write!(
                f,
                "multipart checksum mismatch: expected 0x{:08x}, computed 0x{:08x}",
                expected, computed
            ),
            Error::QueueOverflow => write!(f, "critical event queue overflow"),
            Error::StateViolation(what) => write!(f, "state violation: {}", what),
            Error::NotReady => write!(f, "terminus not ready"),
            Error::NotFound(what) => write!(f, "not found: {}", what),
            Error::PdrCycle(handle) => {
                write!(f, "PDR pagination cycle at record handle {}", handle)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(e)
    }
}

/// RDE completion codes (DSP0218 Table 7), classified for logging.
///
/// Any code outside the table decodes as [`RdeCompletionCode::Unexpected`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdeCompletionCode {
    BadChecksum,
    CannotCreateOperation,
    NotAllowed,
    WrongLocationType,
    OperationAbandoned,
    Unkillable,
    OperationExists,
    OperationFailed,
    Unexpected,
    Unsupported,
    UnrecognizedCustomHeader,
    EtagMismatch,
    NoSuchResource,
    EtagCalculationOngoing,
}

impl RdeCompletionCode {
    /// Classify a raw device completion code.
    pub fn from_raw(cc: u8) -> Self {
        match cc {
            0x80 => RdeCompletionCode::BadChecksum,
            0x81 => RdeCompletionCode::CannotCreateOperation,
            0x82 => RdeCompletionCode::NotAllowed,
            0x83 => RdeCompletionCode::WrongLocationType,
            0x84 => RdeCompletionCode::OperationAbandoned,
            0x85 => RdeCompletionCode::Unkillable,
            0x86 => RdeCompletionCode::OperationExists,
            0x87 => RdeCompletionCode::OperationFailed,
            0x89 => RdeCompletionCode::Unsupported,
            0x8a => RdeCompletionCode::UnrecognizedCustomHeader,
            0x8b => RdeCompletionCode::EtagMismatch,
            0x8c => RdeCompletionCode::NoSuchResource,
            0x8d => RdeCompletionCode::EtagCalculationOngoing,
            _ => RdeCompletionCode::Unexpected,
        }
    }
}

impl fmt::Display for RdeCompletionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            RdeCompletionCode::BadChecksum => "payload checksum rejected by device",
            RdeCompletionCode::CannotCreateOperation => "device cannot create a new operation",
            RdeCompletionCode::NotAllowed => "operation not allowed on this resource",
            RdeCompletionCode::WrongLocationType => "operation locator type mismatch",
            RdeCompletionCode::OperationAbandoned => "device abandoned the operation",
            RdeCompletionCode::Unkillable => "operation cannot be killed",
            RdeCompletionCode::OperationExists => "an operation with this id already exists",
            RdeCompletionCode::OperationFailed => "operation failed on the device",
            RdeCompletionCode::Unexpected => "unexpected RDE completion code",
            RdeCompletionCode::Unsupported => "command unsupported by device",
            RdeCompletionCode::UnrecognizedCustomHeader => "custom request header not recognized",
            RdeCompletionCode::EtagMismatch => "resource ETag mismatch",
            RdeCompletionCode::NoSuchResource => "no such resource",
            RdeCompletionCode::EtagCalculationOngoing => "ETag calculation still in progress",
        };
        f.write_str(msg)
    }
}
