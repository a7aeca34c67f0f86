//! Configuration: ADE7953 calibration registers, channel metadata, and the
//! sample-time → linecycle-count derivation.
//!
//! Mirrors the shape of the original firmware's two configuration surfaces:
//! a single `Ade7953Configuration` (the 19 calibration/front-end registers)
//! and a per-channel `ChannelData` table (active flag, label, phase, CT
//! specification). Both round-trip through JSON for the provisioning
//! surface and through `postcard` for the NVS checkpoint.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::registers::*;

/// Three-phase identifier. Channel 0 is hardwired to the reference phase;
/// every other logical channel is tagged with the phase of the circuit its
/// CT clamps, used by the cross-phase power-factor correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    One,
    Two,
    Three,
}

impl Phase {
    /// Next phase going lagging: 1→2→3→1.
    #[must_use]
    pub const fn lagging(self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::Three,
            Self::Three => Self::One,
        }
    }

    /// Next phase going leading: 1→3→2→1.
    #[must_use]
    pub const fn leading(self) -> Self {
        match self {
            Self::One => Self::Three,
            Self::Three => Self::Two,
            Self::Two => Self::One,
        }
    }
}

/// Current-transformer electrical specification for a channel, from which
/// the per-LSB scaling factors are derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CtSpecification {
    /// CT rated current, amps RMS.
    pub current_rating: f64,
    /// CT burden-resistor output voltage at rated current, volts RMS.
    pub voltage_output: f64,
    /// Manufacturer accuracy fraction applied on top of the derived LSB
    /// (e.g. 0.01 for a CT with documented ±1% linearity error).
    pub scaling_fraction: f64,

    /// Derived: amps per LSB of the IRMS register.
    pub a_lsb: f64,
    /// Derived: watt-hours per LSB of the read-with-reset energy registers
    /// (shared across active/reactive/apparent — all three accumulate in
    /// the same physical units per linecycle).
    pub wh_lsb: f64,
    pub varh_lsb: f64,
    pub vah_lsb: f64,
}

impl CtSpecification {
    /// Build a specification and immediately derive its LSB weights, for a
    /// device configured at `sample_time_ms`.
    #[must_use]
    pub fn new(current_rating: f64, voltage_output: f64, scaling_fraction: f64, sample_time_ms: u32) -> Self {
        let mut s = Self {
            current_rating,
            voltage_output,
            scaling_fraction,
            a_lsb: 0.0,
            wh_lsb: 0.0,
            varh_lsb: 0.0,
            vah_lsb: 0.0,
        };
        s.recalculate_lsb(sample_time_ms);
        s
    }

    /// Recompute `a_lsb`/`wh_lsb`/`varh_lsb`/`vah_lsb` from the CT's
    /// electrical spec, the ADE7953's full-scale ADC behaviour, and the
    /// currently configured sample period.
    ///
    /// The energy registers accumulate over exactly one configured sample
    /// period between reads (the engine reads them with read-with-reset
    /// every CYCEND), so the Wh-per-LSB weight is tied to `sample_time_ms`
    /// rather than a fixed nominal accumulation rate — recompute whenever
    /// either the CT parameters or the sample time change.
    pub fn recalculate_lsb(&mut self, sample_time_ms: u32) {
        let maximum_adc_channel_input_rms = MAXIMUM_ADC_CHANNEL_INPUT / std::f64::consts::SQRT_2;
        let usable_adc_channel_input_rms = self.voltage_output / maximum_adc_channel_input_rms;
        let usable_lsb_rms = FULL_SCALE_LSB_FOR_RMS_VALUES / usable_adc_channel_input_rms;
        self.a_lsb = self.current_rating / usable_lsb_rms * (1.0 + self.scaling_fraction);

        let full_scale_current_rms = self.current_rating;
        let voltage_divide_ratio = 1.0 / (VOLTAGE_DIVIDER_R2 / (VOLTAGE_DIVIDER_R1 + VOLTAGE_DIVIDER_R2));
        let full_scale_voltage_rms = maximum_adc_channel_input_rms * voltage_divide_ratio;
        let full_scale_power = full_scale_current_rms * full_scale_voltage_rms;

        let delta_hours_per_sample = (f64::from(sample_time_ms) / 1000.0) / 3600.0;
        let watt_hour_per_lsb = full_scale_power * delta_hours_per_sample * (1.0 + self.scaling_fraction);

        self.wh_lsb = watt_hour_per_lsb;
        self.varh_lsb = watt_hour_per_lsb;
        self.vah_lsb = watt_hour_per_lsb;
    }
}

impl Default for CtSpecification {
    /// A generic 30A/1V split-core CT with no manufacturer correction, at
    /// the default 1000 ms sample period.
    fn default() -> Self {
        Self::new(30.0, 1.0, 0.0, 1000)
    }
}

/// Per-channel metadata: whether it's wired up, its label, its phase, and
/// its CT specification. Index 0 is the reference channel — always active,
/// always `Phase::One`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelData {
    pub active: bool,
    pub label: heapless::String<32>,
    pub phase: Phase,
    pub reverse: bool,
    pub ct: CtSpecification,
}

impl ChannelData {
    #[must_use]
    pub fn reference() -> Self {
        Self {
            active: true,
            label: heapless::String::try_from("General").unwrap_or_default(),
            phase: Phase::One,
            reverse: false,
            ct: CtSpecification::default(),
        }
    }

    #[must_use]
    pub fn inactive() -> Self {
        Self {
            active: false,
            label: heapless::String::new(),
            phase: Phase::One,
            reverse: false,
            ct: CtSpecification::default(),
        }
    }
}

/// Table of all `CHANNEL_COUNT` logical channels, index 0 = reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelTable {
    pub channels: heapless::Vec<ChannelData, { crate::registers::CHANNEL_COUNT }>,
}

impl ChannelTable {
    /// Mux index for a logical channel (channel 0 bypasses the mux).
    #[must_use]
    pub fn mux_index(logical_channel: usize) -> u8 {
        logical_channel.saturating_sub(1) as u8
    }

    #[must_use]
    pub fn is_active(&self, logical_channel: usize) -> bool {
        self.channels
            .get(logical_channel)
            .is_some_and(|c| c.active)
    }

    /// Find the next active channel strictly after `current`, wrapping
    /// around but never landing back on channel 0 unless it's the only
    /// active channel at all.
    #[must_use]
    pub fn next_active_after(&self, current: usize) -> Option<usize> {
        let n = self.channels.len();
        if n == 0 {
            return None;
        }
        for offset in 1..n {
            let idx = (current + offset) % n;
            if idx != 0 && self.is_active(idx) {
                return Some(idx);
            }
        }
        None
    }

    /// Recompute every channel's CT LSB weights for a new sample period.
    /// Called whenever `setSampleTime` changes `sample_time_ms`.
    pub fn recalculate_all_lsb(&mut self, sample_time_ms: u32) {
        for channel in &mut self.channels {
            channel.ct.recalculate_lsb(sample_time_ms);
        }
    }
}

impl Default for ChannelTable {
    fn default() -> Self {
        let mut channels = heapless::Vec::new();
        let _ = channels.push(ChannelData::reference());
        for _ in 1..CHANNEL_COUNT {
            let _ = channels.push(ChannelData::inactive());
        }
        Self { channels }
    }
}

/// The ADE7953 front-end configuration: the registers that are not
/// per-channel calibration gains, plus the configured sample time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ade7953Configuration {
    pub expected_ap_noload_register: u32,
    pub x_noload_register: u32,
    pub disnoload_register: u8,
    pub lcycmode_register: u8,
    pub linecyc_register: u16,
    pub pga_register: u16,
    pub config_register: u16,

    pub awgain: u32,
    pub awattos: u32,
    pub avargain: u32,
    pub avaros: u32,
    pub avagain: u32,
    pub avaos: u32,
    pub aigain: u32,
    pub airmsos: u32,
    pub bigain: u32,
    pub birmsos: u32,
    pub phcala: u16,
    pub phcalb: u16,

    /// Sample time in milliseconds — the period the linecycle accumulator
    /// integrates over, and therefore the denominator used to convert an
    /// accumulated energy reading into an instantaneous power.
    pub sample_time_ms: u32,
}

impl Default for Ade7953Configuration {
    fn default() -> Self {
        Self {
            expected_ap_noload_register: DEFAULT_EXPECTED_AP_NOLOAD_REGISTER,
            x_noload_register: DEFAULT_X_NOLOAD_REGISTER,
            disnoload_register: DEFAULT_DISNOLOAD_REGISTER,
            lcycmode_register: DEFAULT_LCYCMODE_REGISTER,
            linecyc_register: DEFAULT_LINECYC_REGISTER,
            pga_register: DEFAULT_PGA_REGISTER,
            config_register: DEFAULT_CONFIG_REGISTER,
            awgain: DEFAULT_AWGAIN,
            awattos: DEFAULT_AWATTOS,
            avargain: DEFAULT_AVARGAIN,
            avaros: DEFAULT_AVAROS,
            avagain: DEFAULT_AVAGAIN,
            avaos: DEFAULT_AVAOS,
            aigain: DEFAULT_AIGAIN,
            airmsos: DEFAULT_AIRMSOS,
            bigain: DEFAULT_BIGAIN,
            birmsos: DEFAULT_BIRMSOS,
            phcala: DEFAULT_PHCALA,
            phcalb: DEFAULT_PHCALB,
            sample_time_ms: 1000,
        }
    }
}

impl Ade7953Configuration {
    /// Derive the LINECYC register value for a given sample period, assuming
    /// `ASSUMED_GRID_FREQUENCY_HZ` mains frequency. Re-derived by
    /// `set_sample_time` on every mutation, and once more at startup once the
    /// first real grid-frequency reading is available.
    #[must_use]
    pub fn linecyc_for_sample_time(sample_time_ms: u32) -> u16 {
        let half_cycles = f64::from(sample_time_ms) * ASSUMED_GRID_FREQUENCY_HZ / 1000.0;
        half_cycles.round().max(1.0) as u16
    }

    /// Validate before persisting. Rejects ranges that would silently break
    /// metering (e.g. a zero sample time divides by zero downstream).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(50..=60_000).contains(&self.sample_time_ms) {
            return Err(ConfigError::ValidationFailed(
                "sample_time_ms must be 50–60000",
            ));
        }
        if self.linecyc_register == 0 {
            return Err(ConfigError::ValidationFailed(
                "linecyc_register must be nonzero",
            ));
        }
        Ok(())
    }
}

/// Top-level configuration bundle persisted as a single unit.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SystemConfig {
    pub ade7953: Ade7953Configuration,
    pub channels: ChannelTable,
}

impl SystemConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ade7953.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(SystemConfig::default().validate().is_ok());
    }

    #[test]
    fn channel_zero_is_active_reference() {
        let table = ChannelTable::default();
        assert!(table.is_active(0));
        assert_eq!(table.channels[0].phase, Phase::One);
    }

    #[test]
    fn mux_index_shifts_by_one() {
        assert_eq!(ChannelTable::mux_index(1), 0);
        assert_eq!(ChannelTable::mux_index(16), 15);
        assert_eq!(ChannelTable::mux_index(0), 0);
    }

    #[test]
    fn next_active_wraps_and_skips_zero() {
        let mut table = ChannelTable::default();
        table.channels[3].active = true;
        table.channels[5].active = true;
        assert_eq!(table.next_active_after(0), Some(3));
        assert_eq!(table.next_active_after(3), Some(5));
        assert_eq!(table.next_active_after(5), Some(3));
    }

    #[test]
    fn ct_lsb_derivation_is_positive() {
        let ct = CtSpecification::new(30.0, 1.0, 0.0, 1000);
        assert!(ct.a_lsb > 0.0);
        assert!(ct.wh_lsb > 0.0);
        assert_eq!(ct.wh_lsb, ct.varh_lsb);
        assert_eq!(ct.wh_lsb, ct.vah_lsb);
    }

    #[test]
    fn wh_lsb_scales_with_sample_time() {
        let mut table = ChannelTable::default();
        let short = {
            let mut ct = CtSpecification::default();
            ct.recalculate_lsb(200);
            ct.wh_lsb
        };
        table.recalculate_all_lsb(200);
        assert_eq!(table.channels[0].ct.wh_lsb, short);
        assert!(short < CtSpecification::default().wh_lsb);
    }

    #[test]
    fn linecyc_derivation_matches_default_at_nominal_sample_time() {
        assert_eq!(Ade7953Configuration::linecyc_for_sample_time(1000), DEFAULT_LINECYC_REGISTER);
    }

    #[test]
    fn rejects_zero_sample_time() {
        let cfg = Ade7953Configuration {
            sample_time_ms: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn phase_cycles_lagging_and_leading() {
        assert_eq!(Phase::One.lagging(), Phase::Two);
        assert_eq!(Phase::Two.lagging(), Phase::Three);
        assert_eq!(Phase::Three.lagging(), Phase::One);
        assert_eq!(Phase::One.leading(), Phase::Three);
        assert_eq!(Phase::Three.leading(), Phase::Two);
        assert_eq!(Phase::Two.leading(), Phase::One);
    }
}
