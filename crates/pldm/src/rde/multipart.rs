// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RDE multipart transfer drivers.
//!
//! Both directions are straight loops over PLDM round trips. Receive
//! accumulates chunk payloads and validates the CRC32 carried in the
//! trailing 4 bytes of the final chunk; a mismatch re-requests the
//! current chunk (bounded), keeping the buffer at its pre-chunk length.
//! Send slices the staged payload to the negotiated chunk size and
//! follows the device's per-chunk transfer-operation directives.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::protocol::rde::{self, MultipartSendReq};
use crate::protocol::{crc32, RdeTransferOp, Tid, TransferFlag};
use crate::requester::{InstanceIdDb, Requester};
use log::{debug, warn};
use std::sync::Arc;

/// Shared parameters for one transfer.
pub struct MultipartContext<'a> {
    pub requester: &'a Requester,
    pub iid_db: &'a Arc<InstanceIdDb>,
    pub tid: Tid,
    pub operation_id: u16,
    /// Negotiated bound on a single chunk, both directions.
    pub max_chunk: u32,
    pub chunk_retries: u32,
}

impl<'a> MultipartContext<'a> {
    pub fn new(
        requester: &'a Requester,
        iid_db: &'a Arc<InstanceIdDb>,
        tid: Tid,
        operation_id: u16,
        max_chunk: u32,
        cfg: &Config,
    ) -> Self {
        Self {
            requester,
            iid_db,
            tid,
            operation_id,
            max_chunk,
            chunk_retries: cfg.multipart_chunk_retries,
        }
    }
}

/// Receive a complete transfer. Returns the reassembled payload with the
/// trailing 4-byte checksum already stripped; on `End` chunks the
/// checksum is validated over the full accumulation first.
pub async fn receive(ctx: &MultipartContext<'_>, transfer_handle: u32) -> Result<Vec<u8>> {
    let mut op = RdeTransferOp::FirstPart;
    let mut handle = transfer_handle;
    let mut assembled: Vec<u8> = Vec::new();
    let mut mismatches = 0u32;

    loop {
        let resp = receive_round_trip(ctx, handle, op).await?;
        if resp.data.len() > ctx.max_chunk as usize {
            return Err(Error::DecodeError(format!(
                "chunk of {} bytes exceeds negotiated maximum {}",
                resp.data.len(),
                ctx.max_chunk
            )));
        }

        match resp.transfer_flag {
            TransferFlag::Start | TransferFlag::Middle => {
                assembled.extend_from_slice(&resp.data);
                op = RdeTransferOp::NextPart;
                handle = resp.next_data_transfer_handle;
            }
            TransferFlag::End | TransferFlag::StartAndEnd => {
                if resp.data.len() < 4 {
                    return Err(Error::DecodeError(
                        "final chunk shorter than its checksum".into(),
                    ));
                }
                let (payload, crc_bytes) = resp.data.split_at(resp.data.len() - 4);
                let expected = u32::from_le_bytes([
                    crc_bytes[0],
                    crc_bytes[1],
                    crc_bytes[2],
                    crc_bytes[3],
                ]);

                // Integrity only governs multi-part transfers; a
                // StartAndEnd chunk is accepted as-is.
                if resp.transfer_flag == TransferFlag::End {
                    let mut hasher = crc32fast::Hasher::new();
                    hasher.update(&assembled);
                    hasher.update(payload);
                    let computed = hasher.finalize();
                    if computed != expected {
                        mismatches += 1;
                        warn!(
                            "[rde] TID {}: chunk checksum mismatch {}/{} \
                             (expected 0x{:08x}, computed 0x{:08x})",
                            ctx.tid, mismatches, ctx.chunk_retries, expected, computed
                        );
                        if mismatches >= ctx.chunk_retries {
                            return Err(Error::ChecksumMismatch { expected, computed });
                        }
                        // Buffer stays at its pre-chunk length; fetch the
                        // same chunk again.
                        op = RdeTransferOp::CurrentPart;
                        continue;
                    }
                }

                assembled.extend_from_slice(payload);
                op = RdeTransferOp::Complete;
                handle = resp.next_data_transfer_handle;
            }
            TransferFlag::AckCompletion => {
                debug!(
                    "[rde] TID {}: multipart receive complete, {} bytes",
                    ctx.tid,
                    assembled.len()
                );
                return Ok(assembled);
            }
        }
    }
}

async fn receive_round_trip(
    ctx: &MultipartContext<'_>,
    handle: u32,
    op: RdeTransferOp,
) -> Result<rde::MultipartReceiveResp> {
    let iid = ctx.iid_db.alloc(ctx.tid)?;
    let req = rde::encode_rde_multipart_receive_req(iid.id(), handle, ctx.operation_id, op);
    let resp = ctx.requester.send_recv(ctx.tid, req).await?;
    rde::decode_rde_multipart_receive_resp(&resp)
}

/// Send a staged payload in negotiated-size chunks. The final chunk
/// carries the CRC32 of the whole payload.
pub async fn send(ctx: &MultipartContext<'_>, transfer_handle: u32, payload: &[u8]) -> Result<()> {
    if payload.is_empty() {
        return Err(Error::EncodeError("empty multipart send payload".into()));
    }
    let chunk_size = ctx.max_chunk as usize;
    let chunks: Vec<&[u8]> = payload.chunks(chunk_size).collect();
    let total_crc = crc32(payload);

    let mut handle = transfer_handle;
    let mut index = 0usize;
    let mut resends = 0u32;

    while index < chunks.len() {
        let first = index == 0;
        let last = index == chunks.len() - 1;
        let flag = match (first, last) {
            (true, true) => TransferFlag::StartAndEnd,
            (true, false) => TransferFlag::Start,
            (false, true) => TransferFlag::End,
            (false, false) => TransferFlag::Middle,
        };
        let req = MultipartSendReq {
            data_transfer_handle: handle,
            operation_id: ctx.operation_id,
            transfer_flag: flag,
            next_data_transfer_handle: handle.wrapping_add(1),
            data: chunks[index].to_vec(),
            checksum: last.then_some(total_crc),
        };
        let directive = send_round_trip(ctx, &req).await?;
        match directive {
            RdeTransferOp::NextPart => {
                if last {
                    return Err(Error::DecodeError(
                        "device requested another chunk after the final part".into(),
                    ));
                }
                handle = handle.wrapping_add(1);
                index += 1;
                resends = 0;
            }
            RdeTransferOp::Complete => {
                if !last {
                    return Err(Error::DecodeError(format!(
                        "device completed transfer early at chunk {}/{}",
                        index + 1,
                        chunks.len()
                    )));
                }
                debug!(
                    "[rde] TID {}: multipart send complete, {} bytes in {} chunk(s)",
                    ctx.tid,
                    payload.len(),
                    chunks.len()
                );
                return Ok(());
            }
            RdeTransferOp::CurrentPart | RdeTransferOp::FirstPart => {
                resends += 1;
                if resends >= ctx.chunk_retries {
                    return Err(Error::DecodeError(format!(
                        "device re-requested chunk {} too many times",
                        index + 1
                    )));
                }
            }
            RdeTransferOp::Abort => {
                return Err(Error::StateViolation("device aborted multipart send"));
            }
        }
    }
    unreachable!("loop exits via Complete or error");
}

async fn send_round_trip(
    ctx: &MultipartContext<'_>,
    req: &MultipartSendReq,
) -> Result<RdeTransferOp> {
    let iid = ctx.iid_db.alloc(ctx.tid)?;
    let msg = rde::encode_rde_multipart_send_req(iid.id(), req);
    let resp = ctx.requester.send_recv(ctx.tid, msg).await?;
    rde::decode_rde_multipart_send_resp(&resp)
}
