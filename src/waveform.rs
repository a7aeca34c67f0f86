//! On-demand instantaneous waveform capture for a single channel.
//!
//! A capture is requested for a logical channel, then armed until the
//! CYCEND state machine reaches that channel's slot in the multiplexer
//! rotation — at that point it transitions to capturing and tight-polls the
//! instantaneous voltage/current registers for the capture window, with no
//! write-verification (verification would blow the timing budget).

use heapless::Vec;

use crate::config::CtSpecification;
use crate::registers::{REG_IAWV_24, REG_IBWV_24, REG_VWV_24};
use crate::transport::{RegisterWidth, SpiTransport};
use embedded_hal::spi::SpiDevice;

/// Maximum samples retained per capture — one mains half-cycle at 50 Hz
/// sampled at the engine's tight-poll rate comfortably fits.
pub const CAPTURE_CAPACITY: usize = 256;

/// The ADE7953's instantaneous registers are signed, bipolar (peak-to-peak),
/// unlike the unsigned RMS registers the metering engine reads for power.
/// Their LSB weight is twice the RMS current LSB: the RMS register reports
/// the root-mean-square of a waveform whose peak is `sqrt(2)` times larger,
/// but the ADE7953 datasheet's instantaneous-register full scale is defined
/// at `2x` the RMS full scale rather than `sqrt(2)x` — so converting a raw
/// instantaneous sample into amps takes `a_lsb * 2.0`, not `a_lsb * sqrt(2)`.
fn instantaneous_current_lsb_to_amps(ct: &CtSpecification) -> f64 {
    ct.a_lsb * 2.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceChannel {
    A,
    B,
}

#[derive(Debug, Clone, Copy)]
pub struct WaveformSample {
    pub voltage: f32,
    pub current: f32,
}

/// Capture state machine. `Armed` holds the logical channel waiting for its
/// CYCEND slot; `Capturing` accumulates samples; `Complete` holds the
/// finished buffer until the caller reads it out, at which point it reverts
/// to `Idle`.
#[derive(Debug, Clone)]
pub enum CaptureState {
    Idle,
    Armed { logical_channel: usize },
    Capturing { logical_channel: usize },
    Complete { logical_channel: usize, samples: Vec<WaveformSample, CAPTURE_CAPACITY> },
    Error(&'static str),
}

impl Default for CaptureState {
    fn default() -> Self {
        Self::Idle
    }
}

impl CaptureState {
    #[must_use]
    pub fn armed_channel(&self) -> Option<usize> {
        match self {
            Self::Armed { logical_channel } => Some(*logical_channel),
            _ => None,
        }
    }
}

/// Tight-poll `CAPTURE_CAPACITY` instantaneous voltage/current samples for
/// `device_channel`, with no write-verification on any of the reads.
pub async fn capture_burst<SPI: SpiDevice<u8>>(
    transport: &SpiTransport<SPI>,
    device_channel: DeviceChannel,
    ct: &CtSpecification,
) -> Vec<WaveformSample, CAPTURE_CAPACITY> {
    let current_reg = match device_channel {
        DeviceChannel::A => REG_IAWV_24,
        DeviceChannel::B => REG_IBWV_24,
    };
    let amps_per_lsb = instantaneous_current_lsb_to_amps(ct);

    let mut samples = Vec::new();
    for _ in 0..CAPTURE_CAPACITY {
        let Ok(raw_v) = transport.read_register(REG_VWV_24, RegisterWidth::Bits24).await else {
            break;
        };
        let Ok(raw_i) = transport.read_register(current_reg, RegisterWidth::Bits24).await else {
            break;
        };
        let voltage = sign_extend_24(raw_v) as f32 * crate::registers::VOLT_PER_LSB as f32;
        let current = sign_extend_24(raw_i) as f32 * amps_per_lsb as f32;
        if samples.push(WaveformSample { voltage, current }).is_err() {
            break;
        }
    }
    samples
}

fn sign_extend_24(raw: u32) -> i32 {
    ((raw << 8) as i32) >> 8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_extend_24_handles_negative() {
        assert_eq!(sign_extend_24(0xFF_FFFF), -1);
        assert_eq!(sign_extend_24(0x00_0001), 1);
    }

    #[test]
    fn armed_channel_reports_only_when_armed() {
        assert_eq!(CaptureState::Idle.armed_channel(), None);
        assert_eq!(CaptureState::Armed { logical_channel: 5 }.armed_channel(), Some(5));
        assert_eq!(CaptureState::Capturing { logical_channel: 5 }.armed_channel(), None);
    }

    #[test]
    fn instantaneous_lsb_is_double_rms_lsb() {
        let ct = CtSpecification::default();
        assert_eq!(instantaneous_current_lsb_to_amps(&ct), ct.a_lsb * 2.0);
    }
}
