//! Per-channel authoritative measurement snapshot.

use serde::{Deserialize, Serialize};

/// Sentinel for `last_wall_clock_ms` when the wall clock has never been
/// synchronized.
pub const WALL_CLOCK_INVALID: u64 = u64::MAX;

/// One logical channel's instantaneous readings and cumulative energy.
///
/// Energy fields are monotonically non-decreasing for the life of a boot
/// session; they are reset to zero only by an explicit
/// [`crate::engine::Engine::reset_energy_values`] call, which also wipes
/// persistent storage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeterValues {
    pub voltage: f64,
    pub current: f64,
    pub active_power: f64,
    pub reactive_power: f64,
    pub apparent_power: f64,
    pub power_factor: f64,

    pub active_energy_imported: f64,
    pub active_energy_exported: f64,
    pub reactive_energy_imported: f64,
    pub reactive_energy_exported: f64,
    pub apparent_energy: f64,

    pub last_monotonic_ms: u64,
    pub last_wall_clock_ms: u64,
}

impl Default for MeterValues {
    fn default() -> Self {
        Self {
            voltage: 0.0,
            current: 0.0,
            active_power: 0.0,
            reactive_power: 0.0,
            apparent_power: 0.0,
            power_factor: 0.0,
            active_energy_imported: 0.0,
            active_energy_exported: 0.0,
            reactive_energy_imported: 0.0,
            reactive_energy_exported: 0.0,
            apparent_energy: 0.0,
            last_monotonic_ms: 0,
            last_wall_clock_ms: WALL_CLOCK_INVALID,
        }
    }
}

impl MeterValues {
    /// Zero every field (used by a per-channel energy reset).
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Zero only the instantaneous fields, as the no-load detector does —
    /// energy counters are untouched.
    pub fn zero_instantaneous(&mut self) {
        self.current = 0.0;
        self.active_power = 0.0;
        self.reactive_power = 0.0;
        self.apparent_power = 0.0;
        self.power_factor = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_invalid_wall_clock_sentinel() {
        let mv = MeterValues::default();
        assert_eq!(mv.last_wall_clock_ms, WALL_CLOCK_INVALID);
        assert_eq!(mv.active_energy_imported, 0.0);
    }

    #[test]
    fn zero_instantaneous_preserves_energy() {
        let mut mv = MeterValues {
            active_energy_imported: 42.0,
            current: 5.0,
            ..Default::default()
        };
        mv.zero_instantaneous();
        assert_eq!(mv.current, 0.0);
        assert_eq!(mv.active_energy_imported, 42.0);
    }
}
