// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Platform monitoring and control: terminus discovery and
//! initialization, PDR ingestion, numeric sensors/effecters, and the
//! platform event pump.

mod event;
mod platform_manager;
mod sensor;
mod terminus;
mod terminus_manager;

pub use event::{EventHandler, EventManager, PumpState};
pub use platform_manager::PlatformManager;
pub use sensor::{NumericConversion, NumericEffecter, NumericSensor};
pub use terminus::Terminus;
pub use terminus_manager::TerminusManager;

use crate::protocol::Tid;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared terminus table, owned jointly by the managers.
pub type TerminiMap = Arc<Mutex<HashMap<Tid, Terminus>>>;

/// Fresh, empty terminus table.
pub fn termini_map() -> TerminiMap {
    Arc::new(Mutex::new(HashMap::new()))
}
