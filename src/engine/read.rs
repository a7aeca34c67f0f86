//! Per-channel read: Case A (same phase as reference) and Case B
//! (cross-phase three-phase approximation).

use embedded_hal::spi::SpiDevice;

use crate::config::{CtSpecification, Phase};
use crate::engine::validation::{apply_power_factor_shaping, validate_sample, CandidateSample};
use crate::error::Result;
use crate::registers::{
    GRID_FREQUENCY_CONVERSION_FACTOR, POWER_FACTOR_CONVERSION_FACTOR, REG_AENERGYA_32,
    REG_AENERGYB_32, REG_APENERGYA_32, REG_APENERGYB_32, REG_IRMSA_32, REG_IRMSB_32, REG_PERIOD_16,
    REG_PFA_16, REG_PFB_16, REG_RENERGYA_32, REG_RENERGYB_32, REG_VRMS_32,
};
use crate::transport::{RegisterWidth, SpiTransport};

/// Which of the ADE7953's two physical measurement channels a logical
/// channel is wired to. Channel 0 (the reference) always reads channel A;
/// every multiplexed channel reads channel B.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceChannel {
    A,
    B,
}

/// Energy deltas (Wh) to fold into a `MeterValues`' cumulative counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnergyDeltas {
    pub active_imported: f64,
    pub active_exported: f64,
    pub reactive_imported: f64,
    pub reactive_exported: f64,
    pub apparent: f64,
}

/// Everything a single-channel read produces.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOutcome {
    pub sample: CandidateSample,
    pub deltas: EnergyDeltas,
    /// Present only for the reference channel's read (V_RMS/PERIOD source).
    pub grid_frequency_hz: Option<f64>,
    pub no_load: bool,
}

fn sign_extend(raw: u32, width: RegisterWidth) -> i64 {
    let bits = match width {
        RegisterWidth::Bits8 => 8,
        RegisterWidth::Bits16 => 16,
        RegisterWidth::Bits24 => 24,
        RegisterWidth::Bits32 => 32,
    };
    let shift = 64 - bits;
    ((raw as i64) << shift) >> shift
}

async fn read_signed<SPI: SpiDevice<u8>>(
    transport: &SpiTransport<SPI>,
    address: u16,
    width: RegisterWidth,
) -> Result<i64> {
    let raw = transport.read_register(address, width).await?;
    Ok(sign_extend(raw, width))
}

/// Case A: read active/reactive/apparent energy registers (read-with-reset)
/// for `device_channel`, scale by the channel's LSB weights, apply the
/// `reverse` sign flip, and derive instantaneous powers by dividing by the
/// elapsed time since the previous read.
pub async fn read_same_phase_channel<SPI: SpiDevice<u8>>(
    transport: &SpiTransport<SPI>,
    device_channel: DeviceChannel,
    reverse: bool,
    ct: &CtSpecification,
    reference_voltage: f64,
    delta_hours: f64,
) -> Result<ReadOutcome> {
    let (active_reg, reactive_reg, apparent_reg) = match device_channel {
        DeviceChannel::A => (REG_AENERGYA_32, REG_RENERGYA_32, REG_APENERGYA_32),
        DeviceChannel::B => (REG_AENERGYB_32, REG_RENERGYB_32, REG_APENERGYB_32),
    };

    let active_raw = read_signed(transport, active_reg, RegisterWidth::Bits32).await?;
    let reactive_raw = read_signed(transport, reactive_reg, RegisterWidth::Bits32).await?;
    let apparent_raw = read_signed(transport, apparent_reg, RegisterWidth::Bits32).await?;

    let sign = if reverse { -1.0 } else { 1.0 };
    let active_wh = active_raw as f64 * ct.wh_lsb * sign;
    let reactive_wh = reactive_raw as f64 * ct.varh_lsb * sign;
    let apparent_wh = (apparent_raw as f64).abs() * ct.vah_lsb;

    let active_no_load = active_raw == 0;
    let reactive_no_load = reactive_raw == 0;
    let apparent_no_load = apparent_raw == 0;

    let mut sample = CandidateSample {
        voltage: reference_voltage,
        apparent_power: if delta_hours > 0.0 { apparent_wh / delta_hours } else { 0.0 },
        active_power: if delta_hours > 0.0 { active_wh / delta_hours } else { 0.0 },
        reactive_power: if delta_hours > 0.0 { reactive_wh / delta_hours } else { 0.0 },
        ..Default::default()
    };
    sample.power_factor = if sample.apparent_power.abs() > f64::EPSILON {
        (sample.active_power / sample.apparent_power) * sample.reactive_power.signum().max(-1.0)
    } else {
        0.0
    };
    sample.current = if reference_voltage > f64::EPSILON {
        sample.apparent_power / reference_voltage
    } else {
        0.0
    };

    let mut grid_frequency_hz = None;
    if device_channel == DeviceChannel::A {
        let vrms_raw = transport.read_register(REG_VRMS_32, RegisterWidth::Bits32).await?;
        sample.voltage = vrms_raw as f64 * crate::registers::VOLT_PER_LSB;
        let period_raw = transport.read_register(REG_PERIOD_16, RegisterWidth::Bits16).await?;
        if period_raw > 0 {
            grid_frequency_hz = Some(GRID_FREQUENCY_CONVERSION_FACTOR / period_raw as f64);
        }
    }

    let cutoff = apply_power_factor_shaping(&mut sample);
    validate_sample(&sample)?;

    let deltas = if cutoff {
        EnergyDeltas::default()
    } else {
        EnergyDeltas {
            active_imported: if active_no_load { 0.0 } else { active_wh.max(0.0) },
            active_exported: if active_no_load { 0.0 } else { (-active_wh).max(0.0) },
            reactive_imported: if reactive_no_load { 0.0 } else { reactive_wh.max(0.0) },
            reactive_exported: if reactive_no_load { 0.0 } else { (-reactive_wh).max(0.0) },
            apparent: if apparent_no_load { 0.0 } else { apparent_wh },
        }
    };

    Ok(ReadOutcome {
        sample,
        deltas,
        grid_frequency_hz,
        no_load: active_no_load && reactive_no_load && apparent_no_load,
    })
}

/// Phase relationship of a channel to the reference channel, used to pick
/// the ±120° correction in Case B.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseRelation {
    Lagging,
    Leading,
}

pub fn phase_relation(reference: Phase, channel: Phase) -> PhaseRelation {
    if reference.lagging() == channel {
        PhaseRelation::Lagging
    } else {
        PhaseRelation::Leading
    }
}

const TWO_PI_OVER_THREE: f64 = 2.0 * core::f64::consts::PI / 3.0;
const MINIMUM_CURRENT_ACCUMULATING: f64 =
    crate::registers::MINIMUM_CURRENT_THREE_PHASE_APPROXIMATION_NO_LOAD;

/// Case B: cross-phase three-phase approximation. Reads the on-device
/// power-factor register and the RMS current register for `device_channel`,
/// reconstructs active/reactive power via the ±120° phase correction, and
/// derives energy deltas from the computed power over `delta_hours` (this
/// channel's energy registers are not usable cross-phase).
pub async fn read_cross_phase_channel<SPI: SpiDevice<u8>>(
    transport: &SpiTransport<SPI>,
    device_channel: DeviceChannel,
    relation: PhaseRelation,
    reverse: bool,
    ct: &CtSpecification,
    reference_voltage: f64,
    delta_hours: f64,
) -> Result<ReadOutcome> {
    let (pf_reg, irms_reg) = match device_channel {
        DeviceChannel::A => (REG_PFA_16, REG_IRMSA_32),
        DeviceChannel::B => (REG_PFB_16, REG_IRMSB_32),
    };

    let pf_raw = read_signed(transport, pf_reg, RegisterWidth::Bits16).await?;
    let pf_reading = (pf_raw as f64 * POWER_FACTOR_CONVERSION_FACTOR).clamp(-1.0, 1.0);
    let irms_raw = transport.read_register(irms_reg, RegisterWidth::Bits32).await?;
    let current = irms_raw as f64 * ct.a_lsb;

    let theta = pf_reading.acos();
    let corrected_pf = match relation {
        PhaseRelation::Lagging => (theta - TWO_PI_OVER_THREE).cos(),
        PhaseRelation::Leading => -(theta + TWO_PI_OVER_THREE).cos(),
    };

    let sign = if reverse { -1.0 } else { 1.0 };
    let apparent_power = reference_voltage * current;
    let active_power = sign * (apparent_power * corrected_pf).abs();
    let reactive_power = (apparent_power * apparent_power - active_power * active_power)
        .max(0.0)
        .sqrt();

    let mut sample = CandidateSample {
        voltage: reference_voltage,
        current,
        active_power,
        reactive_power,
        apparent_power,
        power_factor: corrected_pf,
    };

    let cutoff = apply_power_factor_shaping(&mut sample);
    validate_sample(&sample)?;

    let accumulating = current > MINIMUM_CURRENT_ACCUMULATING;
    let deltas = if cutoff || !accumulating {
        EnergyDeltas::default()
    } else {
        let active_wh = sample.active_power * delta_hours;
        let reactive_wh = sample.reactive_power * delta_hours;
        EnergyDeltas {
            active_imported: active_wh.max(0.0),
            active_exported: (-active_wh).max(0.0),
            reactive_imported: reactive_wh.max(0.0),
            reactive_exported: (-reactive_wh).max(0.0),
            apparent: sample.apparent_power * delta_hours,
        }
    };

    Ok(ReadOutcome {
        sample,
        deltas,
        grid_frequency_hz: None,
        no_load: !accumulating,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_extend_negative_16_bit() {
        assert_eq!(sign_extend(0xFFFF, RegisterWidth::Bits16), -1);
        assert_eq!(sign_extend(0x8000, RegisterWidth::Bits16), -32768);
        assert_eq!(sign_extend(0x7FFF, RegisterWidth::Bits16), 32767);
    }

    #[test]
    fn sign_extend_negative_32_bit() {
        assert_eq!(sign_extend(0xFFFF_FFFF, RegisterWidth::Bits32), -1);
    }

    #[test]
    fn phase_relation_cycles() {
        assert_eq!(phase_relation(Phase::One, Phase::Two), PhaseRelation::Lagging);
        assert_eq!(phase_relation(Phase::One, Phase::Three), PhaseRelation::Leading);
    }
}
