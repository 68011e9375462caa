// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! BEJ -> JSON decoding.

use super::{
    principal_type, read_bej_integer, read_nnint, BejDictionary, Dictionaries, BEJ_ARRAY,
    BEJ_BOOLEAN, BEJ_ENUM, BEJ_HEADER_SIZE, BEJ_INTEGER, BEJ_NULL, BEJ_REAL, BEJ_SET, BEJ_STRING,
};
use crate::error::{Error, Result};
use serde_json::{Map, Value};

/// Decode context: which dictionary the current node lives in, and the
/// node's entry index there.
#[derive(Clone, Copy)]
struct Ctx {
    annotation: bool,
    entry: usize,
}

/// Decode a complete BEJ payload into a JSON value.
pub fn decode(bytes: &[u8], dicts: &Dictionaries<'_>) -> Result<Value> {
    if bytes.len() < BEJ_HEADER_SIZE {
        return Err(Error::DecodeError(format!(
            "BEJ payload shorter than header: {} bytes",
            bytes.len()
        )));
    }
    // Header: version, flags, schema class. 1.0 and 1.1 payloads parse
    // identically, so the version is not enforced.
    let _version = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let mut pos = BEJ_HEADER_SIZE;

    // Root tuple: a set resolved against the schema root.
    let (_seq, format, value_len) = read_tuple_header(bytes, &mut pos)?;
    if principal_type(format) != BEJ_SET {
        return Err(Error::DecodeError(format!(
            "BEJ root is not a set (format 0x{:02x})",
            format
        )));
    }
    let end = checked_end(bytes, pos, value_len)?;
    let value = decode_set(
        bytes,
        &mut pos,
        end,
        Ctx {
            annotation: false,
            entry: 0,
        },
        dicts,
    )?;
    Ok(value)
}

fn dict_of<'a>(ctx: Ctx, dicts: &Dictionaries<'a>) -> &'a BejDictionary {
    if ctx.annotation {
        dicts.annotation
    } else {
        dicts.schema
    }
}

fn read_tuple_header(buf: &[u8], pos: &mut usize) -> Result<(u64, u8, usize)> {
    let seq = read_nnint(buf, pos)?;
    let format = *buf
        .get(*pos)
        .ok_or_else(|| Error::DecodeError("tuple format byte missing".into()))?;
    *pos += 1;
    let len = read_nnint(buf, pos)? as usize;
    Ok((seq, format, len))
}

fn checked_end(buf: &[u8], pos: usize, len: usize) -> Result<usize> {
    let end = pos + len;
    if end > buf.len() {
        return Err(Error::DecodeError(format!(
            "tuple value of {} bytes overruns payload",
            len
        )));
    }
    Ok(end)
}

fn decode_set(
    buf: &[u8],
    pos: &mut usize,
    end: usize,
    ctx: Ctx,
    dicts: &Dictionaries<'_>,
) -> Result<Value> {
    let count = read_nnint(buf, pos)?;
    let mut object = Map::new();
    for _ in 0..count {
        let (seq, format, value_len) = read_tuple_header(buf, pos)?;
        let annotation = seq & 1 == 1;
        let seqnum = (seq >> 1) as u16;

        // Annotation-selected members resolve against the annotation
        // root; schema-selected members against the current context node.
        let (child_ctx, name) = if annotation {
            let root = dicts.annotation.root()?;
            let (idx, entry) = dicts.annotation.child_by_seq(root, seqnum)?;
            (
                Ctx {
                    annotation: true,
                    entry: idx,
                },
                entry.name.clone(),
            )
        } else {
            let dict = dict_of(ctx, dicts);
            let parent = dict
                .entry(ctx.entry)
                .ok_or_else(|| Error::DecodeError("dangling context entry".into()))?;
            let (idx, entry) = dict.child_by_seq(parent, seqnum)?;
            (
                Ctx {
                    annotation: ctx.annotation,
                    entry: idx,
                },
                entry.name.clone(),
            )
        };

        let value = decode_value(buf, pos, format, value_len, child_ctx, dicts)?;
        object.insert(name, value);
    }
    if *pos != end {
        return Err(Error::DecodeError(format!(
            "set value length mismatch: ended at {}, expected {}",
            pos, end
        )));
    }
    Ok(Value::Object(object))
}

fn decode_value(
    buf: &[u8],
    pos: &mut usize,
    format: u8,
    value_len: usize,
    ctx: Ctx,
    dicts: &Dictionaries<'_>,
) -> Result<Value> {
    let end = checked_end(buf, *pos, value_len)?;
    let value = match principal_type(format) {
        BEJ_SET => decode_set(buf, pos, end, ctx, dicts)?,
        BEJ_ARRAY => {
            let count = read_nnint(buf, pos)?;
            // Array elements share the array entry's single child as
            // their schema node; element sequence numbers are indices.
            let dict = dict_of(ctx, dicts);
            let parent = dict
                .entry(ctx.entry)
                .ok_or_else(|| Error::DecodeError("dangling context entry".into()))?;
            let (elem_idx, _) = dict.first_child(parent)?;
            let elem_ctx = Ctx {
                annotation: ctx.annotation,
                entry: elem_idx,
            };
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let (_idx, elem_format, elem_len) = read_tuple_header(buf, pos)?;
                items.push(decode_value(buf, pos, elem_format, elem_len, elem_ctx, dicts)?);
            }
            if *pos != end {
                return Err(Error::DecodeError("array value length mismatch".into()));
            }
            Value::Array(items)
        }
        BEJ_NULL => {
            *pos = end;
            Value::Null
        }
        BEJ_INTEGER => {
            let v = read_bej_integer(&buf[*pos..end])?;
            *pos = end;
            Value::from(v)
        }
        BEJ_ENUM => {
            let option_seq = read_nnint(buf, pos)? as u16;
            if *pos != end {
                return Err(Error::DecodeError("enum value length mismatch".into()));
            }
            let dict = dict_of(ctx, dicts);
            let parent = dict
                .entry(ctx.entry)
                .ok_or_else(|| Error::DecodeError("dangling context entry".into()))?;
            let (_, option) = dict.child_by_seq(parent, option_seq)?;
            Value::String(option.name.clone())
        }
        BEJ_STRING => {
            let mut raw = &buf[*pos..end];
            if raw.last() == Some(&0) {
                raw = &raw[..raw.len() - 1];
            }
            let s = std::str::from_utf8(raw)
                .map_err(|_| Error::DecodeError("BEJ string not UTF-8".into()))?;
            *pos = end;
            Value::String(s.to_string())
        }
        BEJ_REAL => {
            let v = decode_real(buf, pos, end)?;
            Value::from(v)
        }
        BEJ_BOOLEAN => {
            if value_len != 1 {
                return Err(Error::DecodeError(format!(
                    "boolean of {} bytes",
                    value_len
                )));
            }
            let v = buf[*pos] != 0;
            *pos = end;
            Value::Bool(v)
        }
        other => {
            return Err(Error::DecodeError(format!(
                "unsupported BEJ format 0x{:02x}",
                other
            )));
        }
    };
    Ok(value)
}

/// bejReal: nnint whole-length, whole (bejInteger), nnint leading-zero
/// count, nnint fraction digits, nnint exponent-length, exponent.
fn decode_real(buf: &[u8], pos: &mut usize, end: usize) -> Result<f64> {
    let whole_len = read_nnint(buf, pos)? as usize;
    let whole_end = checked_end(buf, *pos, whole_len)?;
    let whole = read_bej_integer(&buf[*pos..whole_end])?;
    *pos = whole_end;
    let leading_zeros = read_nnint(buf, pos)?;
    let fract = read_nnint(buf, pos)?;
    let exp_len = read_nnint(buf, pos)? as usize;
    let exp_end = checked_end(buf, *pos, exp_len)?;
    let exp = if exp_len == 0 {
        0
    } else {
        read_bej_integer(&buf[*pos..exp_end])?
    };
    *pos = exp_end;
    if *pos != end {
        return Err(Error::DecodeError("real value length mismatch".into()));
    }

    let digits = if fract == 0 {
        0
    } else {
        fract.ilog10() as u64 + 1
    };
    let fraction = fract as f64 / 10f64.powi((leading_zeros + digits) as i32);
    let magnitude = whole.unsigned_abs() as f64 + fraction;
    let signed = if whole < 0 { -magnitude } else { magnitude };
    Ok(signed * 10f64.powi(exp as i32))
}
