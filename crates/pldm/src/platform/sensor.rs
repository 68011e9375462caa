// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Numeric sensors and effecters materialized from PDRs.
//!
//! Readings cross three domains:
//!
//! ```text
//! raw (wire integer) --resolution/offset--> base --10^unit_modifier--> unit
//! ```
//!
//! Both arrows are invertible: the raw conversion whenever resolution is
//! non-zero, the modifier scaling for any finite value.

use crate::error::{Error, Result};
use crate::protocol::pdr::{EntityInfo, NumericEffecterPdr, NumericSensorPdr, SensorDataSize};
use crate::protocol::{platform, Tid};
use crate::requester::{InstanceIdDb, Requester};
use std::sync::Arc;

/// The linear raw<->unit mapping shared by sensors and effecters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericConversion {
    pub resolution: f64,
    pub offset: f64,
    pub unit_modifier: i8,
}

impl NumericConversion {
    pub fn raw_to_base(&self, raw: f64) -> f64 {
        raw * self.resolution + self.offset
    }

    pub fn base_to_raw(&self, base: f64) -> Result<f64> {
        if self.resolution == 0.0 {
            return Err(Error::EncodeError(
                "sensor resolution is zero, conversion not invertible".into(),
            ));
        }
        Ok((base - self.offset) / self.resolution)
    }

    pub fn base_to_unit(&self, base: f64) -> f64 {
        base * 10f64.powi(i32::from(self.unit_modifier))
    }

    pub fn unit_to_base(&self, unit: f64) -> f64 {
        unit / 10f64.powi(i32::from(self.unit_modifier))
    }

    pub fn raw_to_unit(&self, raw: f64) -> f64 {
        self.base_to_unit(self.raw_to_base(raw))
    }

    pub fn unit_to_raw(&self, unit: f64) -> Result<f64> {
        self.base_to_raw(self.unit_to_base(unit))
    }
}

/// A readable measurement point on a terminus.
#[derive(Debug, Clone)]
pub struct NumericSensor {
    pub tid: Tid,
    pub sensor_id: u16,
    /// Display name from the auxiliary-names PDR, when one exists.
    pub name: Option<String>,
    pub entity: EntityInfo,
    pub base_unit: u8,
    pub data_size: SensorDataSize,
    pub conversion: NumericConversion,
    pub max_readable: f64,
    pub min_readable: f64,
    pub warning_high: f64,
    pub warning_low: f64,
    pub critical_high: f64,
    pub critical_low: f64,
}

impl NumericSensor {
    pub fn from_pdr(tid: Tid, pdr: &NumericSensorPdr, name: Option<String>) -> Self {
        Self {
            tid,
            sensor_id: pdr.sensor_id,
            name,
            entity: pdr.entity,
            base_unit: pdr.base_unit,
            data_size: pdr.data_size,
            conversion: NumericConversion {
                resolution: f64::from(pdr.resolution),
                offset: f64::from(pdr.offset),
                unit_modifier: pdr.unit_modifier,
            },
            max_readable: pdr.max_readable,
            min_readable: pdr.min_readable,
            warning_high: pdr.warning_high,
            warning_low: pdr.warning_low,
            critical_high: pdr.critical_high,
            critical_low: pdr.critical_low,
        }
    }

    /// Fetch the present reading, converted to display units.
    pub async fn read(
        &self,
        requester: &Requester,
        iid_db: &Arc<InstanceIdDb>,
    ) -> Result<f64> {
        let iid = iid_db.alloc(self.tid)?;
        let req = platform::encode_get_sensor_reading_req(iid.id(), self.sensor_id, false);
        let resp = requester.send_recv(self.tid, req).await?;
        let reading = platform::decode_get_sensor_reading_resp(&resp)?;
        Ok(self.conversion.raw_to_unit(reading.reading))
    }
}

/// A writable control point on a terminus.
#[derive(Debug, Clone)]
pub struct NumericEffecter {
    pub tid: Tid,
    pub effecter_id: u16,
    pub name: Option<String>,
    pub entity: EntityInfo,
    pub base_unit: u8,
    pub data_size: SensorDataSize,
    pub conversion: NumericConversion,
    pub max_settable: f64,
    pub min_settable: f64,
}

impl NumericEffecter {
    pub fn from_pdr(tid: Tid, pdr: &NumericEffecterPdr, name: Option<String>) -> Self {
        Self {
            tid,
            effecter_id: pdr.effecter_id,
            name,
            entity: pdr.entity,
            base_unit: pdr.base_unit,
            data_size: pdr.data_size,
            conversion: NumericConversion {
                resolution: f64::from(pdr.resolution),
                offset: f64::from(pdr.offset),
                unit_modifier: pdr.unit_modifier,
            },
            max_settable: pdr.max_settable,
            min_settable: pdr.min_settable,
        }
    }

    /// Fetch the present value, converted to display units.
    pub async fn value(
        &self,
        requester: &Requester,
        iid_db: &Arc<InstanceIdDb>,
    ) -> Result<f64> {
        let iid = iid_db.alloc(self.tid)?;
        let req = platform::encode_get_numeric_effecter_value_req(iid.id(), self.effecter_id);
        let resp = requester.send_recv(self.tid, req).await?;
        let value = platform::decode_get_numeric_effecter_value_resp(&resp)?;
        Ok(self.conversion.raw_to_unit(value.present_value))
    }

    /// Write a new value given in display units. Non-finite input and
    /// values outside the settable range are rejected before encoding.
    pub async fn set_value(
        &self,
        requester: &Requester,
        iid_db: &Arc<InstanceIdDb>,
        unit_value: f64,
    ) -> Result<()> {
        if !unit_value.is_finite() {
            return Err(Error::EncodeError(format!(
                "non-finite effecter value {}",
                unit_value
            )));
        }
        let raw = self.conversion.unit_to_raw(unit_value)?.round();
        if raw < self.min_settable || raw > self.max_settable {
            return Err(Error::EncodeError(format!(
                "value {} outside settable range [{}, {}]",
                unit_value,
                self.conversion.raw_to_unit(self.min_settable),
                self.conversion.raw_to_unit(self.max_settable)
            )));
        }
        let iid = iid_db.alloc(self.tid)?;
        let req = platform::encode_set_numeric_effecter_value_req(
            iid.id(),
            self.effecter_id,
            self.data_size,
            raw,
        )?;
        let resp = requester.send_recv(self.tid, req).await?;
        let cc = platform::decode_set_numeric_effecter_value_resp(&resp)?;
        if cc != crate::protocol::CC_SUCCESS {
            return Err(Error::CompletionCode(cc));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_raw_unit_roundtrip() {
        let conv = NumericConversion {
            resolution: 0.5,
            offset: -10.0,
            unit_modifier: -1,
        };
        for x in [-40.0, 0.0, 25.5, 99.0] {
            let raw = conv.unit_to_raw(x).unwrap();
            assert!(
                (conv.raw_to_unit(raw) - x).abs() < EPS,
                "roundtrip drifted for {}",
                x
            );
        }
    }

    #[test]
    fn test_base_unit_roundtrip_exact() {
        let conv = NumericConversion {
            resolution: 1.0,
            offset: 0.0,
            unit_modifier: 3,
        };
        for x in [2.0, -7.0, 1024.0] {
            assert_eq!(conv.base_to_unit(conv.unit_to_base(x)), x);
        }
    }

    #[test]
    fn test_zero_resolution_not_invertible() {
        let conv = NumericConversion {
            resolution: 0.0,
            offset: 0.0,
            unit_modifier: 0,
        };
        assert!(conv.unit_to_raw(1.0).is_err());
        // Forward direction still works.
        assert_eq!(conv.raw_to_unit(123.0), 0.0);
    }

    #[test]
    fn test_unit_modifier_scaling_direction() {
        // RPM effecter with modifier 2: raw 10 means 1000 RPM.
        let conv = NumericConversion {
            resolution: 1.0,
            offset: 0.0,
            unit_modifier: 2,
        };
        assert_eq!(conv.raw_to_unit(10.0), 1000.0);
        assert_eq!(conv.unit_to_raw(1000.0).unwrap(), 10.0);
    }
}
