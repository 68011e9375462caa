// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! JSON -> BEJ encoding.
//!
//! Properties are resolved to dictionary sequence numbers by name:
//! `@`-prefixed names against the annotation dictionary, everything else
//! against the current schema node. Members of a set are emitted in
//! ascending encoded-sequence order, which keeps the output canonical
//! for a given dictionary pair.

use super::{
    principal_type, write_bej_integer, write_nnint, BejDictionary, Dictionaries, BEJ_ARRAY,
    BEJ_BOOLEAN, BEJ_ENUM, BEJ_HEADER_SIZE, BEJ_INTEGER, BEJ_NULL, BEJ_REAL, BEJ_SET, BEJ_STRING,
    BEJ_VERSION_1_0,
};
use crate::error::{Error, Result};
use crate::protocol::rde::SchemaClass;
use serde_json::Value;

#[derive(Clone, Copy)]
struct Ctx {
    annotation: bool,
    entry: usize,
}

/// Encode a JSON object as a complete BEJ payload.
pub fn encode(value: &Value, dicts: &Dictionaries<'_>, schema_class: SchemaClass) -> Result<Vec<u8>> {
    let Value::Object(_) = value else {
        return Err(Error::EncodeError("BEJ root must be a JSON object".into()));
    };

    let mut out = Vec::with_capacity(BEJ_HEADER_SIZE + 64);
    out.extend_from_slice(&BEJ_VERSION_1_0.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.push(schema_class as u8);

    let root_ctx = Ctx {
        annotation: false,
        entry: 0,
    };
    let body = encode_value(
        value,
        dicts.schema.root()?.format,
        root_ctx,
        dicts,
    )?;
    // Root tuple: sequence 0, schema dictionary selected.
    write_nnint(0, &mut out);
    out.push(BEJ_SET);
    write_nnint(body.len() as u64, &mut out);
    out.extend_from_slice(&body);
    Ok(out)
}

fn dict_of<'a>(ctx: Ctx, dicts: &Dictionaries<'a>) -> &'a BejDictionary {
    if ctx.annotation {
        dicts.annotation
    } else {
        dicts.schema
    }
}

/// Encode a set body (member count + member tuples).
fn encode_set(value: &Value, ctx: Ctx, dicts: &Dictionaries<'_>) -> Result<Vec<u8>> {
    let Value::Object(map) = value else {
        return Err(Error::EncodeError(format!(
            "schema expects a set, JSON has {}",
            json_kind(value)
        )));
    };

    // Resolve every member first so the output can be ordered by
    // (selector, sequence).
    struct Member<'v> {
        seq: u64,
        format: u8,
        ctx: Ctx,
        value: &'v Value,
    }
    let mut members: Vec<Member<'_>> = Vec::with_capacity(map.len());
    for (name, member_value) in map {
        let (seq, format, member_ctx) = if let Some(_annotation_name) = name.strip_prefix('@') {
            let root = dicts.annotation.root()?;
            let (idx, entry) = dicts.annotation.child_by_name(root, name)?;
            (
                (u64::from(entry.sequence) << 1) | 1,
                entry.format,
                Ctx {
                    annotation: true,
                    entry: idx,
                },
            )
        } else {
            let dict = dict_of(ctx, dicts);
            let parent = dict
                .entry(ctx.entry)
                .ok_or_else(|| Error::EncodeError("dangling context entry".into()))?;
            let (idx, entry) = dict.child_by_name(parent, name)?;
            (
                u64::from(entry.sequence) << 1,
                entry.format,
                Ctx {
                    annotation: ctx.annotation,
                    entry: idx,
                },
            )
        };
        members.push(Member {
            seq,
            format,
            ctx: member_ctx,
            value: member_value,
        });
    }
    members.sort_by_key(|m| m.seq);

    let mut body = Vec::new();
    write_nnint(map.len() as u64, &mut body);
    for member in members {
        let value_bytes = encode_value(member.value, member.format, member.ctx, dicts)?;
        write_nnint(member.seq, &mut body);
        body.push(effective_format(member.value, member.format));
        write_nnint(value_bytes.len() as u64, &mut body);
        body.extend_from_slice(&value_bytes);
    }
    Ok(body)
}

/// JSON null encodes as bejNull whatever the schema says.
fn effective_format(value: &Value, dict_format: u8) -> u8 {
    if value.is_null() {
        BEJ_NULL
    } else {
        principal_type(dict_format)
    }
}

fn encode_value(
    value: &Value,
    dict_format: u8,
    ctx: Ctx,
    dicts: &Dictionaries<'_>,
) -> Result<Vec<u8>> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    match principal_type(dict_format) {
        BEJ_SET => encode_set(value, ctx, dicts),
        BEJ_ARRAY => {
            let Value::Array(items) = value else {
                return Err(Error::EncodeError(format!(
                    "schema expects an array, JSON has {}",
                    json_kind(value)
                )));
            };
            let dict = dict_of(ctx, dicts);
            let parent = dict
                .entry(ctx.entry)
                .ok_or_else(|| Error::EncodeError("dangling context entry".into()))?;
            let (elem_idx, elem_entry) = dict.first_child(parent)?;
            let elem_ctx = Ctx {
                annotation: ctx.annotation,
                entry: elem_idx,
            };
            let mut body = Vec::new();
            write_nnint(items.len() as u64, &mut body);
            for (index, item) in items.iter().enumerate() {
                let value_bytes = encode_value(item, elem_entry.format, elem_ctx, dicts)?;
                // Element sequence numbers are array indices.
                write_nnint((index as u64) << 1, &mut body);
                body.push(effective_format(item, elem_entry.format));
                write_nnint(value_bytes.len() as u64, &mut body);
                body.extend_from_slice(&value_bytes);
            }
            Ok(body)
        }
        BEJ_INTEGER => {
            let v = value.as_i64().ok_or_else(|| {
                Error::EncodeError(format!(
                    "schema expects an integer, JSON has {}",
                    json_kind(value)
                ))
            })?;
            let mut body = Vec::new();
            write_bej_integer(v, &mut body);
            Ok(body)
        }
        BEJ_ENUM => {
            let Value::String(s) = value else {
                return Err(Error::EncodeError(format!(
                    "schema expects an enum, JSON has {}",
                    json_kind(value)
                )));
            };
            let dict = dict_of(ctx, dicts);
            let parent = dict
                .entry(ctx.entry)
                .ok_or_else(|| Error::EncodeError("dangling context entry".into()))?;
            let (_, option) = dict.child_by_name(parent, s)?;
            let mut body = Vec::new();
            write_nnint(u64::from(option.sequence), &mut body);
            Ok(body)
        }
        BEJ_STRING => {
            let Value::String(s) = value else {
                return Err(Error::EncodeError(format!(
                    "schema expects a string, JSON has {}",
                    json_kind(value)
                )));
            };
            let mut body = Vec::with_capacity(s.len() + 1);
            body.extend_from_slice(s.as_bytes());
            body.push(0);
            Ok(body)
        }
        BEJ_REAL => {
            let v = value.as_f64().ok_or_else(|| {
                Error::EncodeError(format!(
                    "schema expects a real, JSON has {}",
                    json_kind(value)
                ))
            })?;
            encode_real(v)
        }
        BEJ_BOOLEAN => {
            let Value::Bool(b) = value else {
                return Err(Error::EncodeError(format!(
                    "schema expects a boolean, JSON has {}",
                    json_kind(value)
                )));
            };
            Ok(vec![u8::from(*b)])
        }
        other => Err(Error::EncodeError(format!(
            "unsupported dictionary format 0x{:02x}",
            other
        ))),
    }
}

/// Encode a finite f64 as bejReal with a zero exponent and up to nine
/// fraction digits.
fn encode_real(v: f64) -> Result<Vec<u8>> {
    if !v.is_finite() {
        return Err(Error::EncodeError(format!("non-finite real {}", v)));
    }
    let whole = v.trunc() as i64;
    let mut fract_str = format!("{:.9}", v.fract().abs());
    // "0.123456789" -> digits after the point, trailing zeros trimmed.
    fract_str.drain(..2);
    while fract_str.ends_with('0') {
        fract_str.pop();
    }
    let leading_zeros = fract_str.len() - fract_str.trim_start_matches('0').len();
    let fract: u64 = fract_str
        .trim_start_matches('0')
        .parse()
        .unwrap_or_default();

    let mut whole_bytes = Vec::new();
    write_bej_integer(whole, &mut whole_bytes);

    let mut body = Vec::new();
    write_nnint(whole_bytes.len() as u64, &mut body);
    body.extend_from_slice(&whole_bytes);
    write_nnint(leading_zeros as u64, &mut body);
    write_nnint(fract, &mut body);
    write_nnint(0, &mut body); // exponent length: none
    Ok(body)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
