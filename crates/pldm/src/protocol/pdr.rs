// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Platform Descriptor Record parsers (DSP0248 Sec.28, DSP0218 Sec.8).
//!
//! Records arrive as raw byte vectors from GetPDR pagination. The parsers
//! here consume `&[u8]` and produce owned typed values; variable-width
//! fields are driven by the record's `sensor_data_size` and
//! `range_field_format` tags.
//!
//! Common record header:
//!
//! ```text
//! +-----------------------------------------------------------+
//! | record_handle (4) | hdr_version (1) | pdr_type (1)        |
//! | record_change_num (2) | data_length (2) | body ...        |
//! +-----------------------------------------------------------+
//! ```

use super::base::Ver32;
use super::ByteReader;
use crate::error::{Error, Result};

// PDR type codes.
pub const PDR_TERMINUS_LOCATOR: u8 = 1;
pub const PDR_NUMERIC_SENSOR: u8 = 2;
pub const PDR_STATE_SENSOR: u8 = 4;
pub const PDR_SENSOR_AUXILIARY_NAMES: u8 = 6;
pub const PDR_NUMERIC_EFFECTER: u8 = 9;
pub const PDR_STATE_EFFECTER: u8 = 11;
pub const PDR_EFFECTER_AUXILIARY_NAMES: u8 = 13;
pub const PDR_REDFISH_RESOURCE: u8 = 22;

/// Fixed size of the common PDR header.
pub const PDR_HEADER_SIZE: usize = 10;

/// Common PDR record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdrHeader {
    pub record_handle: u32,
    pub version: u8,
    pub pdr_type: u8,
    pub record_change_num: u16,
    pub data_length: u16,
}

impl PdrHeader {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(data);
        Ok(Self {
            record_handle: r.u32_le()?,
            version: r.u8()?,
            pdr_type: r.u8()?,
            record_change_num: r.u16_le()?,
            data_length: r.u16_le()?,
        })
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.record_handle.to_le_bytes());
        out.push(self.version);
        out.push(self.pdr_type);
        out.extend_from_slice(&self.record_change_num.to_le_bytes());
        out.extend_from_slice(&self.data_length.to_le_bytes());
    }
}

// ---------------------------------------------------------------------------
// Variable-width field tags
// ---------------------------------------------------------------------------

/// sensorDataSize / effecterDataSize tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SensorDataSize {
    Uint8 = 0,
    Sint8 = 1,
    Uint16 = 2,
    Sint16 = 3,
    Uint32 = 4,
    Sint32 = 5,
}

impl SensorDataSize {
    pub fn from_raw(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(SensorDataSize::Uint8),
            1 => Ok(SensorDataSize::Sint8),
            2 => Ok(SensorDataSize::Uint16),
            3 => Ok(SensorDataSize::Sint16),
            4 => Ok(SensorDataSize::Uint32),
            5 => Ok(SensorDataSize::Sint32),
            other => Err(Error::DecodeError(format!(
                "unknown sensor data size tag 0x{:02x}",
                other
            ))),
        }
    }

    /// Read one value of this width, widened to f64.
    pub(crate) fn read(self, r: &mut ByteReader<'_>) -> Result<f64> {
        Ok(match self {
            SensorDataSize::Uint8 => f64::from(r.u8()?),
            SensorDataSize::Sint8 => f64::from(r.i8()?),
            SensorDataSize::Uint16 => f64::from(r.u16_le()?),
            SensorDataSize::Sint16 => f64::from(r.i16_le()?),
            SensorDataSize::Uint32 => f64::from(r.u32_le()?),
            SensorDataSize::Sint32 => f64::from(r.i32_le()?),
        })
    }

    /// Write one value of this width. Rejects non-finite input.
    pub(crate) fn write(self, value: f64, out: &mut Vec<u8>) -> Result<()> {
        if !value.is_finite() {
            return Err(Error::EncodeError(format!(
                "non-finite effecter value {}",
                value
            )));
        }
        match self {
            SensorDataSize::Uint8 => out.push(value as u8),
            SensorDataSize::Sint8 => out.push(value as i8 as u8),
            SensorDataSize::Uint16 => out.extend_from_slice(&(value as u16).to_le_bytes()),
            SensorDataSize::Sint16 => out.extend_from_slice(&(value as i16).to_le_bytes()),
            SensorDataSize::Uint32 => out.extend_from_slice(&(value as u32).to_le_bytes()),
            SensorDataSize::Sint32 => out.extend_from_slice(&(value as i32).to_le_bytes()),
        }
        Ok(())
    }
}

/// rangeFieldFormat tag. Extends the data-size tags with real32.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RangeFieldFormat {
    Uint8 = 0,
    Sint8 = 1,
    Uint16 = 2,
    Sint16 = 3,
    Uint32 = 4,
    Sint32 = 5,
    Real32 = 6,
}

impl RangeFieldFormat {
    pub fn from_raw(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(RangeFieldFormat::Uint8),
            1 => Ok(RangeFieldFormat::Sint8),
            2 => Ok(RangeFieldFormat::Uint16),
            3 => Ok(RangeFieldFormat::Sint16),
            4 => Ok(RangeFieldFormat::Uint32),
            5 => Ok(RangeFieldFormat::Sint32),
            6 => Ok(RangeFieldFormat::Real32),
            other => Err(Error::DecodeError(format!(
                "unknown range field format 0x{:02x}",
                other
            ))),
        }
    }

    fn read(self, r: &mut ByteReader<'_>) -> Result<f64> {
        Ok(match self {
            RangeFieldFormat::Uint8 => f64::from(r.u8()?),
            RangeFieldFormat::Sint8 => f64::from(r.i8()?),
            RangeFieldFormat::Uint16 => f64::from(r.u16_le()?),
            RangeFieldFormat::Sint16 => f64::from(r.i16_le()?),
            RangeFieldFormat::Uint32 => f64::from(r.u32_le()?),
            RangeFieldFormat::Sint32 => f64::from(r.i32_le()?),
            RangeFieldFormat::Real32 => f64::from(r.f32_le()?),
        })
    }

    fn write(self, value: f64, out: &mut Vec<u8>) {
        match self {
            RangeFieldFormat::Uint8 => out.push(value as u8),
            RangeFieldFormat::Sint8 => out.push(value as i8 as u8),
            RangeFieldFormat::Uint16 => out.extend_from_slice(&(value as u16).to_le_bytes()),
            RangeFieldFormat::Sint16 => out.extend_from_slice(&(value as i16).to_le_bytes()),
            RangeFieldFormat::Uint32 => out.extend_from_slice(&(value as u32).to_le_bytes()),
            RangeFieldFormat::Sint32 => out.extend_from_slice(&(value as i32).to_le_bytes()),
            RangeFieldFormat::Real32 => {
                out.extend_from_slice(&(value as f32).to_bits().to_le_bytes());
            }
        }
    }
}

/// Entity identification carried by sensor/effecter PDRs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntityInfo {
    pub entity_type: u16,
    pub entity_instance: u16,
    pub container_id: u16,
}

// ---------------------------------------------------------------------------
// Numeric sensor PDR
// ---------------------------------------------------------------------------

/// Parsed numeric sensor PDR (DSP0248 Table 78).
#[derive(Debug, Clone, PartialEq)]
pub struct NumericSensorPdr {
    pub terminus_handle: u16,
    pub sensor_id: u16,
    pub entity: EntityInfo,
    pub sensor_init: u8,
    pub has_aux_names: bool,
    pub base_unit: u8,
    pub unit_modifier: i8,
    pub rate_unit: u8,
    pub is_linear: bool,
    pub data_size: SensorDataSize,
    pub resolution: f32,
    pub offset: f32,
    pub accuracy: u16,
    pub plus_tolerance: u8,
    pub minus_tolerance: u8,
    pub hysteresis: f64,
    pub supported_thresholds: u8,
    pub max_readable: f64,
    pub min_readable: f64,
    pub range_format: RangeFieldFormat,
    pub range_support: u8,
    pub nominal_value: f64,
    pub normal_max: f64,
    pub normal_min: f64,
    pub warning_high: f64,
    pub warning_low: f64,
    pub critical_high: f64,
    pub critical_low: f64,
    pub fatal_high: f64,
    pub fatal_low: f64,
}

impl NumericSensorPdr {
    /// Parse the record body (bytes after the common PDR header).
    pub fn decode(body: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(body);
        let terminus_handle = r.u16_le()?;
        let sensor_id = r.u16_le()?;
        let entity = EntityInfo {
            entity_type: r.u16_le()?,
            entity_instance: r.u16_le()?,
            container_id: r.u16_le()?,
        };
        let sensor_init = r.u8()?;
        let has_aux_names = r.u8()? != 0;
        let base_unit = r.u8()?;
        let unit_modifier = r.i8()?;
        let rate_unit = r.u8()?;
        let _base_oem_unit_handle = r.u8()?;
        let _aux_unit = r.u8()?;
        let _aux_unit_modifier = r.i8()?;
        let _aux_rate_unit = r.u8()?;
        let _rel = r.u8()?;
        let _aux_oem_unit_handle = r.u8()?;
        let is_linear = r.u8()? != 0;
        let data_size = SensorDataSize::from_raw(r.u8()?)?;
        let resolution = r.f32_le()?;
        let offset = r.f32_le()?;
        let accuracy = r.u16_le()?;
        let plus_tolerance = r.u8()?;
        let minus_tolerance = r.u8()?;
        let hysteresis = data_size.read(&mut r)?;
        let supported_thresholds = r.u8()?;
        let _volatility = r.u8()?;
        let _state_transition_interval = r.f32_le()?;
        let _update_interval = r.f32_le()?;
        let max_readable = data_size.read(&mut r)?;
        let min_readable = data_size.read(&mut r)?;
        let range_format = RangeFieldFormat::from_raw(r.u8()?)?;
        let range_support = r.u8()?;
        Ok(Self {
            terminus_handle,
            sensor_id,
            entity,
            sensor_init,
            has_aux_names,
            base_unit,
            unit_modifier,
            rate_unit,
            is_linear,
            data_size,
            resolution,
            offset,
            accuracy,
            plus_tolerance,
            minus_tolerance,
            hysteresis,
            supported_thresholds,
            max_readable,
            min_readable,
            range_format,
            range_support,
            nominal_value: range_format.read(&mut r)?,
            normal_max: range_format.read(&mut r)?,
            normal_min: range_format.read(&mut r)?,
            warning_high: range_format.read(&mut r)?,
            warning_low: range_format.read(&mut r)?,
            critical_high: range_format.read(&mut r)?,
            critical_low: range_format.read(&mut r)?,
            fatal_high: range_format.read(&mut r)?,
            fatal_low: range_format.read(&mut r)?,
        })
    }

    /// Encode the record body (used by test fixtures and responder shims).
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(&self.terminus_handle.to_le_bytes());
        out.extend_from_slice(&self.sensor_id.to_le_bytes());
        out.extend_from_slice(&self.entity.entity_type.to_le_bytes());
        out.extend_from_slice(&self.entity.entity_instance.to_le_bytes());
        out.extend_from_slice(&self.entity.container_id.to_le_bytes());
        out.push(self.sensor_init);
        out.push(u8::from(self.has_aux_names));
        out.push(self.base_unit);
        out.push(self.unit_modifier as u8);
        out.push(self.rate_unit);
        out.extend_from_slice(&[0, 0, 0, 0, 0, 0]); // oem/aux unit block
        out.push(u8::from(self.is_linear));
        out.push(self.data_size as u8);
        out.extend_from_slice(&self.resolution.to_bits().to_le_bytes());
        out.extend_from_slice(&self.offset.to_bits().to_le_bytes());
        out.extend_from_slice(&self.accuracy.to_le_bytes());
        out.push(self.plus_tolerance);
        out.push(self.minus_tolerance);
        // Encoding fixture values are always representable in the tag width.
        self.data_size.write(self.hysteresis, &mut out).unwrap_or(());
        out.push(self.supported_thresholds);
        out.push(0); // volatility
        out.extend_from_slice(&0f32.to_bits().to_le_bytes());
        out.extend_from_slice(&0f32.to_bits().to_le_bytes());
        self.data_size.write(self.max_readable, &mut out).unwrap_or(());
        self.data_size.write(self.min_readable, &mut out).unwrap_or(());
        out.push(self.range_format as u8);
        out.push(self.range_support);
        for v in [
            self.nominal_value,
            self.normal_max,
            self.normal_min,
            self.warning_high,
            self.warning_low,
            self.critical_high,
            self.critical_low,
            self.fatal_high,
            self.fatal_low,
        ] {
            self.range_format.write(v, &mut out);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Numeric effecter PDR
// ---------------------------------------------------------------------------

/// Parsed numeric effecter PDR (DSP0248 Table 93).
#[derive(Debug, Clone, PartialEq)]
pub struct NumericEffecterPdr {
    pub terminus_handle: u16,
    pub effecter_id: u16,
    pub entity: EntityInfo,
    pub semantic_id: u16,
    pub effecter_init: u8,
    pub has_aux_names: bool,
    pub base_unit: u8,
    pub unit_modifier: i8,
    pub rate_unit: u8,
    pub is_linear: bool,
    pub data_size: SensorDataSize,
    pub resolution: f32,
    pub offset: f32,
    pub accuracy: u16,
    pub plus_tolerance: u8,
    pub minus_tolerance: u8,
    pub max_settable: f64,
    pub min_settable: f64,
    pub range_format: RangeFieldFormat,
    pub range_support: u8,
    pub nominal_value: f64,
    pub normal_max: f64,
    pub normal_min: f64,
    pub rated_max: f64,
    pub rated_min: f64,
}

impl NumericEffecterPdr {
    pub fn decode(body: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(body);
        let terminus_handle = r.u16_le()?;
        let effecter_id = r.u16_le()?;
        let entity = EntityInfo {
            entity_type: r.u16_le()?,
            entity_instance: r.u16_le()?,
            container_id: r.u16_le()?,
        };
        let semantic_id = r.u16_le()?;
        let effecter_init = r.u8()?;
        let has_aux_names = r.u8()? != 0;
        let base_unit = r.u8()?;
        let unit_modifier = r.i8()?;
        let rate_unit = r.u8()?;
        let _base_oem_unit_handle = r.u8()?;
        let _aux_unit = r.u8()?;
        let _aux_unit_modifier = r.i8()?;
        let _aux_rate_unit = r.u8()?;
        let _aux_oem_unit_handle = r.u8()?;
        let is_linear = r.u8()? != 0;
        let data_size = SensorDataSize::from_raw(r.u8()?)?;
        let resolution = r.f32_le()?;
        let offset = r.f32_le()?;
        let accuracy = r.u16_le()?;
        let plus_tolerance = r.u8()?;
        let minus_tolerance = r.u8()?;
        let _state_transition_interval = r.f32_le()?;
        let _transition_interval = r.f32_le()?;
        let max_settable = data_size.read(&mut r)?;
        let min_settable = data_size.read(&mut r)?;
        let range_format = RangeFieldFormat::from_raw(r.u8()?)?;
        let range_support = r.u8()?;
        Ok(Self {
            terminus_handle,
            effecter_id,
            entity,
            semantic_id,
            effecter_init,
            has_aux_names,
            base_unit,
            unit_modifier,
            rate_unit,
            is_linear,
            data_size,
            resolution,
            offset,
            accuracy,
            plus_tolerance,
            minus_tolerance,
            max_settable,
            min_settable,
            range_format,
            range_support,
            nominal_value: range_format.read(&mut r)?,
            normal_max: range_format.read(&mut r)?,
            normal_min: range_format.read(&mut r)?,
            rated_max: range_format.read(&mut r)?,
            rated_min: range_format.read(&mut r)?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(56);
        out.extend_from_slice(&self.terminus_handle.to_le_bytes());
        out.extend_from_slice(&self.effecter_id.to_le_bytes());
        out.extend_from_slice(&self.entity.entity_type.to_le_bytes());
        out.extend_from_slice(&self.entity.entity_instance.to_le_bytes());
        out.extend_from_slice(&self.entity.container_id.to_le_bytes());
        out.extend_from_slice(&self.semantic_id.to_le_bytes());
        out.push(self.effecter_init);
        out.push(u8::from(self.has_aux_names));
        out.push(self.base_unit);
        out.push(self.unit_modifier as u8);
        out.push(self.rate_unit);
        out.extend_from_slice(&[0, 0, 0, 0, 0]); // oem/aux unit block
        out.push(u8::from(self.is_linear));
        out.push(self.data_size as u8);
        out.extend_from_slice(&self.resolution.to_bits().to_le_bytes());
        out.extend_from_slice(&self.offset.to_bits().to_le_bytes());
        out.extend_from_slice(&self.accuracy.to_le_bytes());
        out.push(self.plus_tolerance);
        out.push(self.minus_tolerance);
        out.extend_from_slice(&0f32.to_bits().to_le_bytes());
        out.extend_from_slice(&0f32.to_bits().to_le_bytes());
        self.data_size.write(self.max_settable, &mut out).unwrap_or(());
        self.data_size.write(self.min_settable, &mut out).unwrap_or(());
        out.push(self.range_format as u8);
        out.push(self.range_support);
        for v in [
            self.nominal_value,
            self.normal_max,
            self.normal_min,
            self.rated_max,
            self.rated_min,
        ] {
            self.range_format.write(v, &mut out);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Auxiliary name PDRs
// ---------------------------------------------------------------------------

/// Sensor/effecter auxiliary names: (language tag, display name) pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxiliaryNames {
    pub terminus_handle: u16,
    /// Sensor or effecter ID depending on the PDR type.
    pub id: u16,
    pub composite_count: u8,
    pub names: Vec<(String, String)>,
}

impl AuxiliaryNames {
    /// Parse the record body. Language tags are null-terminated ASCII,
    /// names are null-terminated UTF-16BE.
    pub fn decode(body: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(body);
        let terminus_handle = r.u16_le()?;
        let id = r.u16_le()?;
        let composite_count = r.u8()?;
        let name_count = usize::from(r.u8()?);
        let mut names = Vec::with_capacity(name_count);
        for _ in 0..name_count {
            let mut tag = Vec::new();
            loop {
                let b = r.u8()?;
                if b == 0 {
                    break;
                }
                tag.push(b);
            }
            let tag = String::from_utf8(tag)
                .map_err(|_| Error::DecodeError("language tag not ASCII".into()))?;

            let mut units = Vec::new();
            loop {
                let unit = u16::from(r.u8()?) << 8 | u16::from(r.u8()?);
                if unit == 0 {
                    break;
                }
                units.push(unit);
            }
            let name = String::from_utf16(&units)
                .map_err(|_| Error::DecodeError("auxiliary name not valid UTF-16".into()))?;
            names.push((tag, name));
        }
        Ok(Self {
            terminus_handle,
            id,
            composite_count,
            names,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.terminus_handle.to_le_bytes());
        out.extend_from_slice(&self.id.to_le_bytes());
        out.push(self.composite_count);
        out.push(self.names.len() as u8);
        for (tag, name) in &self.names {
            out.extend_from_slice(tag.as_bytes());
            out.push(0);
            for unit in name.encode_utf16() {
                out.extend_from_slice(&unit.to_be_bytes());
            }
            out.extend_from_slice(&[0, 0]);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Redfish resource PDR
// ---------------------------------------------------------------------------

/// Additional resource slot advertised inside a Redfish resource PDR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdditionalResource {
    pub resource_id: u32,
    pub name: String,
}

/// Parsed Redfish resource PDR (DSP0218 Sec.8.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedfishResourcePdr {
    pub resource_id: u32,
    /// 0 marks a root resource.
    pub containing_resource_id: u32,
    pub proposed_containing_resource_name: String,
    pub sub_uri: String,
    /// Bitmap over [`crate::protocol::rde::OperationType`] discriminants.
    pub supported_operations: u16,
    pub additional: Vec<AdditionalResource>,
    pub major_schema_name: String,
    pub major_schema_version: Ver32,
    pub major_schema_dictionary_length: u32,
}

fn read_rde_string(r: &mut ByteReader<'_>) -> Result<String> {
    let len = usize::from(r.u16_le()?);
    let mut bytes = r.vec(len)?;
    // Trailing null is permitted on the wire; names are stored without it.
    if bytes.last() == Some(&0) {
        bytes.pop();
    }
    String::from_utf8(bytes).map_err(|_| Error::DecodeError("resource name not UTF-8".into()))
}

fn write_rde_string(s: &str, out: &mut Vec<u8>) {
    let len = s.len() as u16 + 1;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

impl RedfishResourcePdr {
    /// Parse the record body (bytes after the common PDR header).
    pub fn decode(body: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(body);
        let resource_id = r.u32_le()?;
        let containing_resource_id = r.u32_le()?;
        let proposed_containing_resource_name = read_rde_string(&mut r)?;
        let sub_uri = read_rde_string(&mut r)?;
        let supported_operations = r.u16_le()?;
        let additional_count = usize::from(r.u16_le()?);
        let mut additional = Vec::with_capacity(additional_count);
        for _ in 0..additional_count {
            additional.push(AdditionalResource {
                resource_id: r.u32_le()?,
                name: read_rde_string(&mut r)?,
            });
        }
        let major_schema_name = read_rde_string(&mut r)?;
        let major_schema_version =
            Ver32::from_bytes([r.u8()?, r.u8()?, r.u8()?, r.u8()?]);
        let major_schema_dictionary_length = r.u32_le()?;
        Ok(Self {
            resource_id,
            containing_resource_id,
            proposed_containing_resource_name,
            sub_uri,
            supported_operations,
            additional,
            major_schema_name,
            major_schema_version,
            major_schema_dictionary_length,
        })
    }

    /// Encode as a complete record (header + body).
    pub fn encode_record(&self, record_handle: u32) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&self.resource_id.to_le_bytes());
        body.extend_from_slice(&self.containing_resource_id.to_le_bytes());
        write_rde_string(&self.proposed_containing_resource_name, &mut body);
        write_rde_string(&self.sub_uri, &mut body);
        body.extend_from_slice(&self.supported_operations.to_le_bytes());
        body.extend_from_slice(&(self.additional.len() as u16).to_le_bytes());
        for add in &self.additional {
            body.extend_from_slice(&add.resource_id.to_le_bytes());
            write_rde_string(&add.name, &mut body);
        }
        write_rde_string(&self.major_schema_name, &mut body);
        body.extend_from_slice(&self.major_schema_version.to_bytes());
        body.extend_from_slice(&self.major_schema_dictionary_length.to_le_bytes());

        let hdr = PdrHeader {
            record_handle,
            version: 1,
            pdr_type: PDR_REDFISH_RESOURCE,
            record_change_num: 0,
            data_length: body.len() as u16,
        };
        let mut out = Vec::with_capacity(PDR_HEADER_SIZE + body.len());
        hdr.encode_into(&mut out);
        out.extend_from_slice(&body);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_sensor() -> NumericSensorPdr {
        NumericSensorPdr {
            terminus_handle: 1,
            sensor_id: 0x10,
            entity: EntityInfo {
                entity_type: 120,
                entity_instance: 1,
                container_id: 0,
            },
            sensor_init: 0,
            has_aux_names: true,
            base_unit: 2, // degrees C
            unit_modifier: -1,
            rate_unit: 0,
            is_linear: true,
            data_size: SensorDataSize::Sint16,
            resolution: 0.5,
            offset: -10.0,
            accuracy: 100,
            plus_tolerance: 1,
            minus_tolerance: 1,
            hysteresis: 2.0,
            supported_thresholds: 0x3f,
            max_readable: 2000.0,
            min_readable: -200.0,
            range_format: RangeFieldFormat::Real32,
            range_support: 0x1f,
            nominal_value: 45.0,
            normal_max: 80.0,
            normal_min: 10.0,
            warning_high: 85.0,
            warning_low: 5.0,
            critical_high: 95.0,
            critical_low: 0.0,
            fatal_high: 105.0,
            fatal_low: -5.0,
        }
    }

    #[test]
    fn test_numeric_sensor_pdr_roundtrip() {
        let pdr = sample_sensor();
        let body = pdr.encode();
        let back = NumericSensorPdr::decode(&body).unwrap();
        assert_eq!(back, pdr);
    }

    #[test]
    fn test_numeric_effecter_pdr_roundtrip() {
        let pdr = NumericEffecterPdr {
            terminus_handle: 1,
            effecter_id: 0x21,
            entity: EntityInfo {
                entity_type: 29,
                entity_instance: 2,
                container_id: 0,
            },
            semantic_id: 0,
            effecter_init: 0,
            has_aux_names: false,
            base_unit: 19, // RPM
            unit_modifier: 2,
            rate_unit: 0,
            is_linear: true,
            data_size: SensorDataSize::Uint16,
            resolution: 1.0,
            offset: 0.0,
            accuracy: 0,
            plus_tolerance: 0,
            minus_tolerance: 0,
            max_settable: 255.0,
            min_settable: 0.0,
            range_format: RangeFieldFormat::Uint16,
            range_support: 0x07,
            nominal_value: 100.0,
            normal_max: 250.0,
            normal_min: 10.0,
            rated_max: 255.0,
            rated_min: 0.0,
        };
        let back = NumericEffecterPdr::decode(&pdr.encode()).unwrap();
        assert_eq!(back, pdr);
    }

    #[test]
    fn test_auxiliary_names_utf16be_roundtrip() {
        let names = AuxiliaryNames {
            terminus_handle: 1,
            id: 0x10,
            composite_count: 1,
            names: vec![("en".to_string(), "Inlet Temp".to_string())],
        };
        let back = AuxiliaryNames::decode(&names.encode()).unwrap();
        assert_eq!(back, names);
    }

    #[test]
    fn test_aux_names_big_endian_on_wire() {
        let names = AuxiliaryNames {
            terminus_handle: 0,
            id: 1,
            composite_count: 1,
            names: vec![("en".to_string(), "A".to_string())],
        };
        let bytes = names.encode();
        // body: th(2) id(2) count(1) name_count(1) 'e''n' 0 then UTF-16BE 'A'
        assert_eq!(&bytes[9..11], &[0x00, 0x41]);
    }

    #[test]
    fn test_redfish_resource_pdr_roundtrip() {
        let pdr = RedfishResourcePdr {
            resource_id: 1,
            containing_resource_id: 0,
            proposed_containing_resource_name: "redfish/v1".to_string(),
            sub_uri: "Chassis/1".to_string(),
            supported_operations: 0b0001_0011, // HEAD | READ | UPDATE
            additional: vec![AdditionalResource {
                resource_id: 2,
                name: "Sensors".to_string(),
            }],
            major_schema_name: "Chassis".to_string(),
            major_schema_version: Ver32 {
                major: 0xf1,
                minor: 0xf2,
                update: 0xf0,
                alpha: 0,
            },
            major_schema_dictionary_length: 4096,
        };
        let record = pdr.encode_record(42);
        let hdr = PdrHeader::decode(&record).unwrap();
        assert_eq!(hdr.pdr_type, PDR_REDFISH_RESOURCE);
        assert_eq!(hdr.record_handle, 42);
        let back = RedfishResourcePdr::decode(&record[PDR_HEADER_SIZE..]).unwrap();
        assert_eq!(back, pdr);
        assert_eq!(back.major_schema_version.display(), "1.2.0");
    }

    #[test]
    fn test_truncated_sensor_pdr_rejected() {
        let body = sample_sensor().encode();
        assert!(NumericSensorPdr::decode(&body[..body.len() - 3]).is_err());
    }
}
