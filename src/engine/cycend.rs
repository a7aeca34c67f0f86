//! The CYCEND interrupt handler's state machine.
//!
//! Every ADE7953 CYCEND event (half-linecycle accumulation complete) drives
//! exactly one call to [`handle_cycend`]. The ordering below is load-bearing:
//! the multiplexer must be commanded to the *next* channel only after the
//! *current* one has been read, and the reference channel (device channel A,
//! logical channel 0) is read unconditionally on every call regardless of
//! what happened to the multiplexed channel.

use embedded_hal::spi::SpiDevice;

use crate::app::ports::MultiplexerPort;
use crate::config::ChannelTable;
use crate::engine::read::{
    phase_relation, read_cross_phase_channel, read_same_phase_channel, DeviceChannel, ReadOutcome,
};
use crate::error::Result;
use crate::meter::MeterValues;
use crate::registers::{REG_AENERGYB_32, REG_APENERGYB_32, REG_RENERGYB_32};
use crate::transport::{RegisterWidth, SpiTransport};
use crate::waveform::{self, CaptureState};

fn elapsed_hours(last_monotonic_ms: u64, now_ms: u64) -> f64 {
    if now_ms <= last_monotonic_ms {
        return 0.0;
    }
    (now_ms - last_monotonic_ms) as f64 / 3_600_000.0
}

fn fold_outcome(meter: &mut MeterValues, outcome: &ReadOutcome, now_ms: u64) {
    meter.voltage = outcome.sample.voltage;
    meter.current = outcome.sample.current;
    meter.active_power = outcome.sample.active_power;
    meter.reactive_power = outcome.sample.reactive_power;
    meter.apparent_power = outcome.sample.apparent_power;
    meter.power_factor = outcome.sample.power_factor;

    meter.active_energy_imported += outcome.deltas.active_imported;
    meter.active_energy_exported += outcome.deltas.active_exported;
    meter.reactive_energy_imported += outcome.deltas.reactive_imported;
    meter.reactive_energy_exported += outcome.deltas.reactive_exported;
    meter.apparent_energy += outcome.deltas.apparent;

    meter.last_monotonic_ms = now_ms;
}

/// Discard the current physical channel's device-B energy registers without
/// folding them into any `MeterValues` — the accumulation window spans the
/// multiplexer switch that just happened, so it can't be attributed to
/// either the old or the new channel.
async fn purge_channel_b_energy<SPI: SpiDevice<u8>>(transport: &SpiTransport<SPI>) -> Result<()> {
    transport.read_register(REG_AENERGYB_32, RegisterWidth::Bits32).await?;
    transport.read_register(REG_RENERGYB_32, RegisterWidth::Bits32).await?;
    transport.read_register(REG_APENERGYB_32, RegisterWidth::Bits32).await?;
    Ok(())
}

async fn read_physical_channel<SPI: SpiDevice<u8>>(
    transport: &SpiTransport<SPI>,
    channels: &ChannelTable,
    logical_channel: usize,
    reference_voltage: f64,
    now_ms: u64,
    meter: &MeterValues,
) -> Result<ReadOutcome> {
    let data = &channels.channels[logical_channel];
    let reference_phase = channels.channels[0].phase;
    let delta_hours = elapsed_hours(meter.last_monotonic_ms, now_ms);

    if data.phase == reference_phase {
        read_same_phase_channel(
            transport,
            DeviceChannel::B,
            data.reverse,
            &data.ct,
            reference_voltage,
            delta_hours,
        )
        .await
    } else {
        let relation = phase_relation(reference_phase, data.phase);
        read_cross_phase_channel(
            transport,
            DeviceChannel::B,
            relation,
            data.reverse,
            &data.ct,
            reference_voltage,
            delta_hours,
        )
        .await
    }
}

async fn read_reference_channel<SPI: SpiDevice<u8>>(
    transport: &SpiTransport<SPI>,
    channels: &ChannelTable,
    now_ms: u64,
    meter: &MeterValues,
) -> Result<ReadOutcome> {
    let data = &channels.channels[0];
    let delta_hours = elapsed_hours(meter.last_monotonic_ms, now_ms);
    read_same_phase_channel(
        transport,
        DeviceChannel::A,
        data.reverse,
        &data.ct,
        meter.voltage,
        delta_hours,
    )
    .await
}

/// Run one CYCEND cycle. `current_physical_channel` is the logical channel
/// (1..=16) currently selected on the multiplexer; `skip_next` is the
/// stale-accumulation latch armed immediately after a multiplexer switch.
pub struct CycEndState {
    pub skip_next: bool,
    pub current_physical_channel: usize,
}

impl Default for CycEndState {
    fn default() -> Self {
        Self {
            skip_next: true,
            current_physical_channel: 0,
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn handle_cycend<SPI, MUX>(
    transport: &SpiTransport<SPI>,
    mux: &mut MUX,
    channels: &ChannelTable,
    meter_values: &mut [MeterValues],
    state: &mut CycEndState,
    capture: &mut CaptureState,
    now_ms: u64,
) -> Result<()>
where
    SPI: SpiDevice<u8>,
    MUX: MultiplexerPort,
{
    if state.skip_next {
        purge_channel_b_energy(transport).await?;
        state.skip_next = false;
    } else {
        state.skip_next = true;

        if state.current_physical_channel != 0
            && capture.armed_channel() == Some(state.current_physical_channel)
        {
            *capture = CaptureState::Capturing {
                logical_channel: state.current_physical_channel,
            };
            let ct = channels.channels[state.current_physical_channel].ct;
            let samples = waveform::capture_burst(transport, waveform::DeviceChannel::B, &ct).await;
            *capture = CaptureState::Complete {
                logical_channel: state.current_physical_channel,
                samples,
            };
        }

        if state.current_physical_channel != 0 {
            let reference_voltage = meter_values[0].voltage;
            let outcome = read_physical_channel(
                transport,
                channels,
                state.current_physical_channel,
                reference_voltage,
                now_ms,
                &meter_values[state.current_physical_channel],
            )
            .await?;
            fold_outcome(&mut meter_values[state.current_physical_channel], &outcome, now_ms);
        }

        if let Some(next) = channels.next_active_after(state.current_physical_channel) {
            state.current_physical_channel = next;
            mux.set_channel(ChannelTable::mux_index(next));
        }
    }

    if capture.armed_channel() == Some(0) {
        *capture = CaptureState::Capturing { logical_channel: 0 };
        let ct = channels.channels[0].ct;
        let samples = waveform::capture_burst(transport, waveform::DeviceChannel::A, &ct).await;
        *capture = CaptureState::Complete {
            logical_channel: 0,
            samples,
        };
    }

    let reference_outcome = read_reference_channel(transport, channels, now_ms, &meter_values[0]).await?;
    fold_outcome(&mut meter_values[0], &reference_outcome, now_ms);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_hours_is_zero_on_first_sample() {
        assert_eq!(elapsed_hours(0, 0), 0.0);
    }

    #[test]
    fn elapsed_hours_handles_clock_not_advancing() {
        assert_eq!(elapsed_hours(1_000, 500), 0.0);
    }

    #[test]
    fn default_state_starts_skipped_on_reference() {
        let state = CycEndState::default();
        assert!(state.skip_next);
        assert_eq!(state.current_physical_channel, 0);
    }
}
