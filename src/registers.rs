//! ADE7953 register map, physical constants, and validation bounds.
//!
//! Register addresses and the physical/calibration constants below are an
//! internally-consistent register map reconstructed for this crate — the
//! retrieved reference sources used these symbols without ever defining
//! them in a header that was part of the retrieval. Validation bounds come
//! directly from the documented operating ranges; the rest are reasonable
//! engineering defaults. See DESIGN.md for the full accounting.

#![allow(dead_code)]

// ---------------------------------------------------------------------------
// Register addresses (16-bit address space)
// ---------------------------------------------------------------------------

pub const REG_CONFIG_16: u16 = 0x0102;
pub const REG_LCYCMODE_8: u16 = 0x0004;
pub const REG_PGA_V_16: u16 = 0x0007;
pub const REG_PGA_IA_16: u16 = 0x0008;
pub const REG_PGA_IB_16: u16 = 0x0009;

pub const REG_DISNOLOAD_8: u16 = 0x0018;
pub const REG_AP_NOLOAD_32: u16 = 0x0303;
pub const REG_VAR_NOLOAD_32: u16 = 0x0304;
pub const REG_VA_NOLOAD_32: u16 = 0x0305;

pub const REG_LINECYC_16: u16 = 0x0101;
pub const REG_CYCMODE_8: u16 = 0x0004;

pub const REG_PHCALA_16: u16 = 0x0010;
pub const REG_PHCALB_16: u16 = 0x0011;

pub const REG_AWGAIN_32: u16 = 0x0280;
pub const REG_AWATTOS_32: u16 = 0x0281;
pub const REG_AVARGAIN_32: u16 = 0x0282;
pub const REG_AVAROS_32: u16 = 0x0283;
pub const REG_AVAGAIN_32: u16 = 0x0284;
pub const REG_AVAOS_32: u16 = 0x0285;
pub const REG_AIGAIN_32: u16 = 0x0286;
pub const REG_AIRMSOS_32: u16 = 0x0288;
pub const REG_BIGAIN_32: u16 = 0x0289;
pub const REG_BIRMSOS_32: u16 = 0x028B;

pub const REG_AENERGYA_32: u16 = 0x0312;
pub const REG_RENERGYA_32: u16 = 0x0313;
pub const REG_APENERGYA_32: u16 = 0x0314;
pub const REG_AENERGYB_32: u16 = 0x0315;
pub const REG_RENERGYB_32: u16 = 0x0316;
pub const REG_APENERGYB_32: u16 = 0x0317;

pub const REG_IRMSA_32: u16 = 0x031A;
pub const REG_IRMSB_32: u16 = 0x031B;
pub const REG_VRMS_32: u16 = 0x031C;
pub const REG_PERIOD_16: u16 = 0x010E;
pub const REG_PFA_16: u16 = 0x010A;
pub const REG_PFB_16: u16 = 0x010B;

pub const REG_IAWV_24: u16 = 0x0306;
pub const REG_IBWV_24: u16 = 0x0307;
pub const REG_VWV_24: u16 = 0x0308;

pub const REG_RSTIRQSTATA_32: u16 = 0x032D;
pub const REG_RSTIRQSTATB_32: u16 = 0x032E;
pub const REG_IRQENA_32: u16 = 0x032C;

/// Bit position of CYCEND within IRQSTATA/RSTIRQSTATA.
pub const IRQSTATA_CYCEND_BIT: u32 = 18;
/// Bit position of RESET within IRQSTATA/RSTIRQSTATA.
pub const IRQSTATA_RESET_BIT: u32 = 15;
/// Bit position of the CRC-change interrupt within IRQSTATA/RSTIRQSTATA.
pub const IRQSTATA_CRC_BIT: u32 = 17;

pub const REG_LAST_ADD_16: u16 = 0x021C;
pub const REG_LAST_OP_8: u16 = 0x0000;
pub const REG_LAST_RWDATA_8: u16 = 0x0001;
pub const REG_LAST_RWDATA_16: u16 = 0x0002;
pub const REG_LAST_RWDATA_24: u16 = 0x0003;
pub const REG_LAST_RWDATA_32: u16 = 0x021D;

pub const LAST_OP_READ_VALUE: u8 = 0x35;
pub const LAST_OP_WRITE_VALUE: u8 = 0xCA;

// ---------------------------------------------------------------------------
// Default register values (reset / factory state)
// ---------------------------------------------------------------------------

pub const DEFAULT_EXPECTED_AP_NOLOAD_REGISTER: u32 = 0x00_E419;
pub const DEFAULT_X_NOLOAD_REGISTER: u32 = 0x00_C832;
pub const DEFAULT_DISNOLOAD_REGISTER: u8 = 0x00;
pub const DEFAULT_LCYCMODE_REGISTER: u8 = 0xFF;
pub const DEFAULT_LINECYC_REGISTER: u16 = 50;
pub const DEFAULT_PGA_REGISTER: u16 = 0x000;
pub const DEFAULT_CONFIG_REGISTER: u16 = 0b1000_0000_0000_0100;

/// "Unlock" register gating write access to the datasheet-reserved optimum
/// settings register, and the value that unlocks it.
pub const REG_UNLOCK_OPTIMUM_8: u16 = 0x00FE;
pub const UNLOCK_OPTIMUM_REGISTER_VALUE: u8 = 0xAD;
/// Reserved register the datasheet's "optimum settings" procedure writes
/// immediately after unlocking.
pub const REG_OPTIMUM_SETTINGS_16: u16 = 0x0120;
pub const DEFAULT_OPTIMUM_SETTINGS_REGISTER: u16 = 0x0030;

/// Attempts budget for `_verifyCommunication`-style reset-and-poll before
/// giving up on the device.
pub const MAX_VERIFY_COMMUNICATION_ATTEMPTS: u32 = 5;
/// Reset-pin assert/deassert pulse width.
pub const RESET_PULSE_MS: u64 = 1;
/// Delay between failed verification attempts.
pub const VERIFY_RETRY_DELAY_MS: u64 = 50;

/// Mains frequency assumed when deriving the initial LINECYC register from a
/// configured sample period, before the first grid-frequency measurement is
/// available.
pub const ASSUMED_GRID_FREQUENCY_HZ: f64 = 50.0;

pub const DEFAULT_AWGAIN: u32 = 0x40_0000;
pub const DEFAULT_AWATTOS: u32 = 0x00;
pub const DEFAULT_AVARGAIN: u32 = 0x40_0000;
pub const DEFAULT_AVAROS: u32 = 0x00;
pub const DEFAULT_AVAGAIN: u32 = 0x40_0000;
pub const DEFAULT_AVAOS: u32 = 0x00;
pub const DEFAULT_AIGAIN: u32 = 0x40_0000;
pub const DEFAULT_AIRMSOS: u32 = 0x00FD_12;
pub const DEFAULT_BIGAIN: u32 = 0x41_BCA1;
pub const DEFAULT_BIRMSOS: u32 = 0x00FD_12;
pub const DEFAULT_PHCALA: u16 = 0x00;
pub const DEFAULT_PHCALB: u16 = 0x00;

// ---------------------------------------------------------------------------
// Physical / conversion constants
// ---------------------------------------------------------------------------

/// `1.0 / 32768.0` — converts the raw PFA/PFB register (signed Q0.15-ish
/// fixed point) into a `[-1.0, 1.0]` power factor.
pub const POWER_FACTOR_CONVERSION_FACTOR: f64 = 1.0 / 32768.0;

/// Converts the PERIOD register reading into a grid frequency in Hz.
/// `frequency = GRID_FREQUENCY_CONVERSION_FACTOR / period`.
pub const GRID_FREQUENCY_CONVERSION_FACTOR: f64 = 223_750.0;

/// Full-scale peak ADC input, RMS.
pub const MAXIMUM_ADC_CHANNEL_INPUT: f64 = 0.5;

/// LSB weight of the RMS current/voltage registers at full scale.
pub const FULL_SCALE_LSB_FOR_RMS_VALUES: f64 = 9_032_007.0;

/// Voltage divider network feeding the ADE7953 voltage channel.
pub const VOLTAGE_DIVIDER_R1: f64 = 1_000_000.0;
pub const VOLTAGE_DIVIDER_R2: f64 = 1_000.0;

/// Number of half-linecycle energy accumulation events per second at 50 Hz
/// mains (`LCYCMODE` accumulates over `LINECYC` half-cycles; the default of
/// 50 half-cycles at 50 Hz gives one CYCEND per second).
pub const ENERGY_ACCUMULATION_FREQUENCY: f64 = 1.0;

/// Volts per LSB of the VRMS register at full scale, after the divider.
pub const VOLT_PER_LSB: f64 = 1.0 / 26_000.0;

// ---------------------------------------------------------------------------
// Channel / sentinel constants
// ---------------------------------------------------------------------------

/// Logical channel count: channel 0 (hardwired reference) + 16 multiplexed.
pub const CHANNEL_COUNT: usize = 17;

/// Sentinel for "no channel selected yet".
pub const INVALID_CHANNEL: u8 = 0xFF;

// ---------------------------------------------------------------------------
// Validation bounds (directly from the documented operating ranges)
// ---------------------------------------------------------------------------

pub const VALIDATE_VOLTAGE_MIN: f64 = 5.0;
pub const VALIDATE_VOLTAGE_MAX: f64 = 300.0;

pub const VALIDATE_CURRENT_MIN: f64 = 0.0;
pub const VALIDATE_CURRENT_MAX: f64 = 100.0;

pub const VALIDATE_POWER_MIN: f64 = -30_000.0;
pub const VALIDATE_POWER_MAX: f64 = 30_000.0;
pub const VALIDATE_APPARENT_POWER_MIN: f64 = 0.0;
pub const VALIDATE_APPARENT_POWER_MAX: f64 = 30_000.0;

pub const VALIDATE_POWER_FACTOR_MIN: f64 = -1.0;
pub const VALIDATE_POWER_FACTOR_MAX: f64 = 1.0;

pub const VALIDATE_GRID_FREQUENCY_MIN: f64 = 45.0;
pub const VALIDATE_GRID_FREQUENCY_MAX: f64 = 65.0;

/// Below this absolute power factor, a reading is considered noise and the
/// whole sample (power, current, energy deltas) is zeroed rather than
/// accumulated. Derived so that the documented pf = 0.02 test scenario
/// trips the cutoff while a genuine pf = 0.1 load does not.
pub const MINIMUM_POWER_FACTOR: f64 = 0.05;

/// Above this absolute power factor a reading is clamped to unity rather
/// than rejected outright — the ADE7953's PF computation is noisiest right
/// at resistive loads, so small overshoot past 1.0 is expected, not invalid.
pub const MAXIMUM_POWER_FACTOR_CLAMP: f64 = 1.02;

/// Minimum current, on a non-reference (cross-phase) channel, below which
/// the "accumulating" sentinel override is NOT applied — i.e. below this
/// the channel is treated as genuinely no-load.
pub const MINIMUM_CURRENT_THREE_PHASE_APPROXIMATION_NO_LOAD: f64 = 0.02;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_bounds_match_documented_ranges() {
        assert_eq!(VALIDATE_VOLTAGE_MIN, 5.0);
        assert_eq!(VALIDATE_VOLTAGE_MAX, 300.0);
        assert_eq!(VALIDATE_CURRENT_MAX, 100.0);
        assert_eq!(VALIDATE_POWER_MIN, -30_000.0);
        assert_eq!(VALIDATE_GRID_FREQUENCY_MIN, 45.0);
        assert_eq!(VALIDATE_GRID_FREQUENCY_MAX, 65.0);
    }

    #[test]
    fn low_pf_cutoff_trips_on_documented_test_value() {
        assert!(0.02 < MINIMUM_POWER_FACTOR);
        assert!(0.1 > MINIMUM_POWER_FACTOR);
    }
}
