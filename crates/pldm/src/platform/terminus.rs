// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Terminus entity: one PLDM endpoint and everything learned about it.

use super::sensor::{NumericEffecter, NumericSensor};
use crate::protocol::base::PLDM_COMMANDS_BITMAP_LEN;
use crate::protocol::pdr::{
    self, AuxiliaryNames, NumericEffecterPdr, NumericSensorPdr, PdrHeader, RedfishResourcePdr,
    PDR_HEADER_SIZE,
};
use crate::protocol::{Eid, Tid};
use log::{debug, warn};
use std::collections::HashMap;

/// One discovered PLDM terminus.
///
/// Created when an endpoint publishes a valid TID; destroyed when the
/// endpoint disappears. `initialized` only ever transitions false->true,
/// after the full platform initialization sequence has run.
#[derive(Debug, Default)]
pub struct Terminus {
    pub tid: Tid,
    pub eid: Eid,
    /// Bit N set means PLDM type N is supported.
    pub supported_types: u64,
    /// Supported-command bitmaps, keyed by PLDM type.
    pub supported_commands: HashMap<u8, [u8; PLDM_COMMANDS_BITMAP_LEN]>,
    /// Negotiated event buffer size: min(receiver, terminus).
    pub max_buffer_size: u16,
    /// Synchrony configurations the terminus supports (bitmap).
    pub synchrony_supported: u8,
    /// Raw PDRs from pagination, in repository order.
    pub pdrs: Vec<Vec<u8>>,
    pub initialized: bool,

    pub numeric_sensors: Vec<NumericSensor>,
    pub numeric_effecters: Vec<NumericEffecter>,
    sensor_names: Vec<AuxiliaryNames>,
    effecter_names: Vec<AuxiliaryNames>,
}

impl Terminus {
    pub fn new(eid: Eid, tid: Tid, supported_types: u64) -> Self {
        Self {
            tid,
            eid,
            supported_types,
            max_buffer_size: crate::config::DEFAULT_EVENT_BUFFER_SIZE,
            ..Self::default()
        }
    }

    pub fn supports(&self, pldm_type: u8) -> bool {
        pldm_type < 64 && self.supported_types & (1u64 << pldm_type) != 0
    }

    pub fn supports_command(&self, pldm_type: u8, command: u8) -> bool {
        self.supported_commands
            .get(&pldm_type)
            .is_some_and(|bitmap| bitmap[usize::from(command) / 8] & (1 << (command % 8)) != 0)
    }

    /// Parse the paginated PDR list and materialize typed entities.
    ///
    /// Two passes: auxiliary-name records may appear anywhere relative to
    /// the sensor records they name, so names are collected first.
    /// Unknown PDR types stay raw in `pdrs` for later consumers.
    pub fn parse_pdrs(&mut self) {
        self.numeric_sensors.clear();
        self.numeric_effecters.clear();
        self.sensor_names.clear();
        self.effecter_names.clear();

        let mut sensor_pdrs: Vec<NumericSensorPdr> = Vec::new();
        let mut effecter_pdrs: Vec<NumericEffecterPdr> = Vec::new();

        for record in &self.pdrs {
            let hdr = match PdrHeader::decode(record) {
                Ok(hdr) => hdr,
                Err(e) => {
                    warn!("[platform-mc] TID {}: skipping malformed PDR: {}", self.tid, e);
                    continue;
                }
            };
            if record.len() < PDR_HEADER_SIZE {
                continue;
            }
            let body = &record[PDR_HEADER_SIZE..];
            match hdr.pdr_type {
                pdr::PDR_SENSOR_AUXILIARY_NAMES => match AuxiliaryNames::decode(body) {
                    Ok(names) => self.sensor_names.push(names),
                    Err(e) => warn!(
                        "[platform-mc] TID {}: bad sensor aux names PDR {}: {}",
                        self.tid, hdr.record_handle, e
                    ),
                },
                pdr::PDR_EFFECTER_AUXILIARY_NAMES => match AuxiliaryNames::decode(body) {
                    Ok(names) => self.effecter_names.push(names),
                    Err(e) => warn!(
                        "[platform-mc] TID {}: bad effecter aux names PDR {}: {}",
                        self.tid, hdr.record_handle, e
                    ),
                },
                pdr::PDR_NUMERIC_SENSOR => match NumericSensorPdr::decode(body) {
                    Ok(parsed) => sensor_pdrs.push(parsed),
                    Err(e) => warn!(
                        "[platform-mc] TID {}: bad numeric sensor PDR {}: {}",
                        self.tid, hdr.record_handle, e
                    ),
                },
                pdr::PDR_NUMERIC_EFFECTER => match NumericEffecterPdr::decode(body) {
                    Ok(parsed) => effecter_pdrs.push(parsed),
                    Err(e) => warn!(
                        "[platform-mc] TID {}: bad numeric effecter PDR {}: {}",
                        self.tid, hdr.record_handle, e
                    ),
                },
                other => {
                    debug!(
                        "[platform-mc] TID {}: keeping PDR type {} record {} raw",
                        self.tid, other, hdr.record_handle
                    );
                }
            }
        }

        for parsed in sensor_pdrs {
            let name = self.sensor_name(parsed.sensor_id);
            self.numeric_sensors
                .push(NumericSensor::from_pdr(self.tid, &parsed, name));
        }
        for parsed in effecter_pdrs {
            let name = self.effecter_name(parsed.effecter_id);
            self.numeric_effecters
                .push(NumericEffecter::from_pdr(self.tid, &parsed, name));
        }
    }

    /// English display name for a sensor, when the PDR set provides one.
    pub fn sensor_name(&self, sensor_id: u16) -> Option<String> {
        Self::lookup_name(&self.sensor_names, sensor_id)
    }

    pub fn effecter_name(&self, effecter_id: u16) -> Option<String> {
        Self::lookup_name(&self.effecter_names, effecter_id)
    }

    fn lookup_name(table: &[AuxiliaryNames], id: u16) -> Option<String> {
        table
            .iter()
            .find(|aux| aux.id == id)
            .and_then(|aux| {
                aux.names
                    .iter()
                    .find(|(tag, _)| tag.starts_with("en"))
                    .or_else(|| aux.names.first())
            })
            .map(|(_, name)| name.clone())
    }

    /// Redfish resource PDR payloads for the RDE discovery handoff.
    pub fn redfish_resource_pdrs(&self) -> Vec<Vec<u8>> {
        self.pdrs
            .iter()
            .filter(|record| {
                PdrHeader::decode(record)
                    .map(|hdr| hdr.pdr_type == pdr::PDR_REDFISH_RESOURCE)
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    /// Parsed Redfish resource PDRs (convenience for diagnostics).
    pub fn parsed_redfish_resources(&self) -> Vec<RedfishResourcePdr> {
        self.redfish_resource_pdrs()
            .iter()
            .filter_map(|record| RedfishResourcePdr::decode(&record[PDR_HEADER_SIZE..]).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::pdr::{EntityInfo, RangeFieldFormat, SensorDataSize};

    fn sensor_record(sensor_id: u16) -> Vec<u8> {
        let body = NumericSensorPdr {
            terminus_handle: 1,
            sensor_id,
            entity: EntityInfo::default(),
            sensor_init: 0,
            has_aux_names: true,
            base_unit: 2,
            unit_modifier: 0,
            rate_unit: 0,
            is_linear: true,
            data_size: SensorDataSize::Uint8,
            resolution: 1.0,
            offset: 0.0,
            accuracy: 0,
            plus_tolerance: 0,
            minus_tolerance: 0,
            hysteresis: 0.0,
            supported_thresholds: 0,
            max_readable: 255.0,
            min_readable: 0.0,
            range_format: RangeFieldFormat::Uint8,
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
            record_handle: 1,
            version: 1,
            pdr_type: pdr::PDR_NUMERIC_SENSOR,
            record_change_num: 0,
            data_length: body.len() as u16,
        }
        .encode_into(&mut record);
        record.extend_from_slice(&body);
        record
    }

    fn aux_record(sensor_id: u16, name: &str) -> Vec<u8> {
        let body = AuxiliaryNames {
            terminus_handle: 1,
            id: sensor_id,
            composite_count: 1,
            names: vec![("en".to_string(), name.to_string())],
        }
        .encode();
        let mut record = Vec::new();
        PdrHeader {
            record_handle: 2,
            version: 1,
            pdr_type: pdr::PDR_SENSOR_AUXILIARY_NAMES,
            record_change_num: 0,
            data_length: body.len() as u16,
        }
        .encode_into(&mut record);
        record.extend_from_slice(&body);
        record
    }

    #[test]
    fn test_parse_materializes_named_sensor() {
        let mut t = Terminus::new(9, 9, 1 << crate::protocol::TYPE_PLATFORM);
        // Names record after the sensor record: order must not matter.
        t.pdrs = vec![sensor_record(0x10), aux_record(0x10, "Inlet Temp")];
        t.parse_pdrs();
        assert_eq!(t.numeric_sensors.len(), 1);
        assert_eq!(t.numeric_sensors[0].name.as_deref(), Some("Inlet Temp"));
        assert_eq!(t.numeric_sensors[0].sensor_id, 0x10);
    }

    #[test]
    fn test_supports_type_bitset() {
        let t = Terminus::new(9, 9, 0b0000_0101);
        assert!(t.supports(0));
        assert!(!t.supports(1));
        assert!(t.supports(2));
    }

    #[test]
    fn test_malformed_pdr_does_not_abort_parse() {
        let mut t = Terminus::new(9, 9, 0);
        t.pdrs = vec![vec![1, 2, 3], sensor_record(0x11)];
        t.parse_pdrs();
        assert_eq!(t.numeric_sensors.len(), 1);
    }

    #[test]
    fn test_supports_command_bitmap() {
        let mut t = Terminus::new(9, 9, 0);
        let mut bitmap = [0u8; PLDM_COMMANDS_BITMAP_LEN];
        bitmap[0x51 / 8] |= 1 << (0x51 % 8);
        t.supported_commands
            .insert(crate::protocol::TYPE_PLATFORM, bitmap);
        assert!(t.supports_command(crate::protocol::TYPE_PLATFORM, 0x51));
        assert!(!t.supports_command(crate::protocol::TYPE_PLATFORM, 0x50));
        assert!(!t.supports_command(crate::protocol::TYPE_BASE, 0x51));
    }
}
