//! Range validation, low-power-factor cutoff, and near-unity clamp for a
//! freshly-computed sample.

use crate::error::ValidationError;
use crate::registers::{
    MAXIMUM_POWER_FACTOR_CLAMP, MINIMUM_POWER_FACTOR, VALIDATE_APPARENT_POWER_MAX,
    VALIDATE_APPARENT_POWER_MIN, VALIDATE_CURRENT_MAX, VALIDATE_CURRENT_MIN,
    VALIDATE_GRID_FREQUENCY_MAX, VALIDATE_GRID_FREQUENCY_MIN, VALIDATE_POWER_FACTOR_MAX,
    VALIDATE_POWER_FACTOR_MIN, VALIDATE_POWER_MAX, VALIDATE_POWER_MIN, VALIDATE_VOLTAGE_MAX,
    VALIDATE_VOLTAGE_MIN,
};

/// A sample awaiting validation, mirroring the subset of `MeterValues`
/// fields that carry range constraints.
#[derive(Debug, Clone, Copy, Default)]
pub struct CandidateSample {
    pub voltage: f64,
    pub current: f64,
    pub active_power: f64,
    pub reactive_power: f64,
    pub apparent_power: f64,
    pub power_factor: f64,
}

/// Validate every range-constrained field. Any single out-of-range value
/// discards the entire sample.
pub fn validate_sample(sample: &CandidateSample) -> Result<(), ValidationError> {
    if !(VALIDATE_VOLTAGE_MIN..=VALIDATE_VOLTAGE_MAX).contains(&sample.voltage) {
        return Err(ValidationError::VoltageOutOfRange);
    }
    if !(VALIDATE_CURRENT_MIN..=VALIDATE_CURRENT_MAX).contains(&sample.current) {
        return Err(ValidationError::CurrentOutOfRange);
    }
    if !(VALIDATE_POWER_MIN..=VALIDATE_POWER_MAX).contains(&sample.active_power)
        || !(VALIDATE_POWER_MIN..=VALIDATE_POWER_MAX).contains(&sample.reactive_power)
    {
        return Err(ValidationError::PowerOutOfRange);
    }
    if !(VALIDATE_APPARENT_POWER_MIN..=VALIDATE_APPARENT_POWER_MAX)
        .contains(&sample.apparent_power)
    {
        return Err(ValidationError::PowerOutOfRange);
    }
    if !(VALIDATE_POWER_FACTOR_MIN..=VALIDATE_POWER_FACTOR_MAX).contains(&sample.power_factor) {
        return Err(ValidationError::PowerFactorOutOfRange);
    }
    Ok(())
}

pub fn validate_grid_frequency(hz: f64) -> Result<(), ValidationError> {
    if !(VALIDATE_GRID_FREQUENCY_MIN..=VALIDATE_GRID_FREQUENCY_MAX).contains(&hz) {
        return Err(ValidationError::FrequencyOutOfRange);
    }
    Ok(())
}

/// Apply the low-power-factor cutoff and the near-unity clamp in place.
/// Returns `true` if the cutoff fired (caller must then zero the sample).
pub fn apply_power_factor_shaping(sample: &mut CandidateSample) -> bool {
    let abs_pf = sample.power_factor.abs();

    if abs_pf < MINIMUM_POWER_FACTOR {
        sample.current = 0.0;
        sample.active_power = 0.0;
        sample.reactive_power = 0.0;
        sample.apparent_power = 0.0;
        sample.power_factor = 0.0;
        return true;
    }

    if abs_pf > 1.0 && abs_pf <= MAXIMUM_POWER_FACTOR_CLAMP {
        sample.power_factor = sample.power_factor.signum();
        sample.active_power = sample.power_factor * sample.apparent_power;
        sample.reactive_power = 0.0;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nominal() -> CandidateSample {
        CandidateSample {
            voltage: 230.0,
            current: 1.0,
            active_power: 230.0,
            reactive_power: 0.0,
            apparent_power: 230.0,
            power_factor: 1.0,
        }
    }

    #[test]
    fn nominal_sample_passes() {
        assert!(validate_sample(&nominal()).is_ok());
    }

    #[test]
    fn voltage_out_of_range_is_rejected() {
        let mut s = nominal();
        s.voltage = 400.0;
        assert_eq!(validate_sample(&s), Err(ValidationError::VoltageOutOfRange));
    }

    #[test]
    fn low_power_factor_zeroes_sample() {
        let mut s = CandidateSample {
            voltage: 230.0,
            current: 0.5,
            active_power: 2.0,
            reactive_power: 99.9,
            apparent_power: 100.0,
            power_factor: 0.02,
        };
        let cutoff = apply_power_factor_shaping(&mut s);
        assert!(cutoff);
        assert_eq!(s.active_power, 0.0);
        assert_eq!(s.current, 0.0);
        assert_eq!(s.power_factor, 0.0);
    }

    #[test]
    fn near_unity_overshoot_clamps() {
        let mut s = CandidateSample {
            voltage: 230.0,
            current: 1.0,
            active_power: 228.0,
            reactive_power: 5.0,
            apparent_power: 230.0,
            power_factor: 1.01,
        };
        apply_power_factor_shaping(&mut s);
        assert_eq!(s.power_factor, 1.0);
        assert_eq!(s.reactive_power, 0.0);
        assert_eq!(s.active_power, 230.0);
    }

    #[test]
    fn grid_frequency_bounds() {
        assert!(validate_grid_frequency(50.0).is_ok());
        assert!(validate_grid_frequency(70.0).is_err());
        assert!(validate_grid_frequency(30.0).is_err());
    }
}
