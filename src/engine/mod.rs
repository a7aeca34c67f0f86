//! The metering engine: ties the SPI transport, multiplexer, persistence
//! adapters, and supervisor together behind four long-lived async tasks.
//!
//! Follows the RPC bridge's threading shape: a dedicated, core-pinned OS
//! thread runs a single-threaded `edge-executor` `LocalExecutor` driven by
//! `futures_lite::future::block_on`, with the shared engine state behind an
//! `Rc` created inside that thread (never moved across threads itself — only
//! the `Send` adapter values crossing into `spawn` are).

pub mod cycend;
pub mod read;
pub mod validation;

extern crate alloc;
use alloc::format;
use alloc::rc::Rc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::{Mutex as AsyncMutex, MutexGuard};
use embedded_hal::spi::SpiDevice;

use crate::app::ports::{FilesystemPort, KvStorePort, MultiplexerPort, RestarterPort, WallClockPort};
use crate::config::{Ade7953Configuration, ChannelTable, SystemConfig};
use crate::diagnostics::{self, TaskId};
use crate::error::{Error, PersistenceError, Result};
use crate::meter::MeterValues;
use crate::persistence;
use crate::registers::{
    CHANNEL_COUNT, DEFAULT_EXPECTED_AP_NOLOAD_REGISTER, IRQSTATA_CRC_BIT,
    IRQSTATA_CYCEND_BIT, IRQSTATA_RESET_BIT, MAX_VERIFY_COMMUNICATION_ATTEMPTS,
    REG_AIGAIN_32, REG_AIRMSOS_32, REG_AP_NOLOAD_32, REG_AVAGAIN_32, REG_AVAOS_32, REG_AVARGAIN_32,
    REG_AVAROS_32, REG_AWATTOS_32, REG_AWGAIN_32, REG_BIGAIN_32, REG_BIRMSOS_32, REG_CONFIG_16,
    REG_DISNOLOAD_8, REG_LCYCMODE_8, REG_LINECYC_16, REG_OPTIMUM_SETTINGS_16, REG_PGA_IA_16,
    REG_PGA_IB_16, REG_PGA_V_16, REG_PHCALA_16, REG_PHCALB_16, REG_RSTIRQSTATA_32,
    REG_UNLOCK_OPTIMUM_8, REG_VA_NOLOAD_32, REG_VAR_NOLOAD_32, RESET_PULSE_MS,
    UNLOCK_OPTIMUM_REGISTER_VALUE, VERIFY_RETRY_DELAY_MS,
};
use crate::supervision::Supervisor;
use crate::transport::{RegisterWidth, SpiTransport};
use crate::waveform::CaptureState;
use cycend::CycEndState;

/// Which of the ADE7953's four interrupt sources fired, determined by
/// reading RSTIRQSTATA after the shared IRQ line wakes the meter-reader
/// task — the line alone can't tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqSource {
    CycEnd,
    Reset,
    CrcChange,
    Other,
}

/// Bound on how long any of the engine's non-SPI locks (config, channel
/// metadata, meter values) may be held pending before the caller treats the
/// attempt as a soft failure rather than blocking indefinitely.
const ENGINE_LOCK_TIMEOUT: embassy_time::Duration = embassy_time::Duration::from_millis(200);

/// How long the meter-reader task waits for a CYCEND signal before treating
/// the cycle as missed — a critical failure. Generous relative to any
/// configured sample time so a slow-but-healthy device doesn't trip it.
const CYCEND_WAIT_TIMEOUT: embassy_time::Duration = embassy_time::Duration::from_secs(5);

async fn lock_timeout<'a, T>(mutex: &'a AsyncMutex<CriticalSectionRawMutex, T>) -> Result<MutexGuard<'a, CriticalSectionRawMutex, T>> {
    embassy_time::with_timeout(ENGINE_LOCK_TIMEOUT, mutex.lock())
        .await
        .map_err(|_| PersistenceError::MutexTimeout.into())
}

/// Real settle delay on target hardware; a no-op in host tests, which run
/// against an in-memory fake with no reset-pulse timing to honor.
#[cfg(target_os = "espidf")]
async fn settle_delay(ms: u64) {
    embassy_time::Timer::after(embassy_time::Duration::from_millis(ms)).await;
}

#[cfg(not(target_os = "espidf"))]
async fn settle_delay(_ms: u64) {}

/// Priority-ordered classification of an IRQSTATA/RSTIRQSTATA bitfield:
/// CYCEND first since it's the expected, high-frequency case.
fn classify_irq_status(status: u32) -> IrqSource {
    if status & (1 << IRQSTATA_CYCEND_BIT) != 0 {
        IrqSource::CycEnd
    } else if status & (1 << IRQSTATA_RESET_BIT) != 0 {
        IrqSource::Reset
    } else if status & (1 << IRQSTATA_CRC_BIT) != 0 {
        IrqSource::CrcChange
    } else {
        IrqSource::Other
    }
}

fn default_meter_values() -> heapless::Vec<MeterValues, CHANNEL_COUNT> {
    let mut values = heapless::Vec::new();
    for _ in 0..CHANNEL_COUNT {
        let _ = values.push(MeterValues::default());
    }
    values
}

/// Owns every piece of mutable state the four engine tasks share, each
/// behind its own bounded-timeout lock — `ade7953_config` and `channels`
/// mirror the `configLock`/`channelDataLock` split, `meter_values` is the
/// `meterValuesLock`. The SPI transport carries its own two-level locking
/// internally (see `transport.rs`) and is not re-wrapped here.
pub struct Engine<SPI, MUX, KV, FS, CLOCK, REST> {
    transport: SpiTransport<SPI>,
    mux: AsyncMutex<CriticalSectionRawMutex, MUX>,
    ade7953_config: AsyncMutex<CriticalSectionRawMutex, Ade7953Configuration>,
    channels: AsyncMutex<CriticalSectionRawMutex, ChannelTable>,
    meter_values: AsyncMutex<CriticalSectionRawMutex, heapless::Vec<MeterValues, CHANNEL_COUNT>>,
    capture: AsyncMutex<CriticalSectionRawMutex, CaptureState>,
    cycend_state: AsyncMutex<CriticalSectionRawMutex, CycEndState>,
    supervisor: AsyncMutex<CriticalSectionRawMutex, Supervisor>,
    kv: AsyncMutex<CriticalSectionRawMutex, KV>,
    fs: AsyncMutex<CriticalSectionRawMutex, FS>,
    clock: CLOCK,
    restarter: REST,
}

impl<SPI, MUX, KV, FS, CLOCK, REST> Engine<SPI, MUX, KV, FS, CLOCK, REST>
where
    SPI: SpiDevice<u8>,
    MUX: MultiplexerPort,
    KV: KvStorePort,
    FS: FilesystemPort,
    CLOCK: WallClockPort,
    REST: RestarterPort,
{
    pub fn new(spi: SPI, mux: MUX, kv: KV, fs: FS, clock: CLOCK, restarter: REST, config: SystemConfig) -> Self {
        Self {
            transport: SpiTransport::new(spi),
            mux: AsyncMutex::new(mux),
            ade7953_config: AsyncMutex::new(config.ade7953),
            channels: AsyncMutex::new(config.channels),
            meter_values: AsyncMutex::new(default_meter_values()),
            capture: AsyncMutex::new(CaptureState::default()),
            cycend_state: AsyncMutex::new(CycEndState::default()),
            supervisor: AsyncMutex::new(Supervisor::default()),
            kv: AsyncMutex::new(kv),
            fs: AsyncMutex::new(fs),
            clock,
            restarter,
        }
    }

    /// Bring the ADE7953 up from reset: toggle the reset pin and poll
    /// AP_NOLOAD until communication is verified, unlock and write the
    /// optimum-settings register, apply the configured front-end and
    /// calibration registers, enable all-channel LCYCMODE accumulation, and
    /// write the initial LINECYC derived from the configured sample period.
    /// Call once at startup before any task is spawned.
    pub async fn init_hardware(&self) -> Result<()> {
        self.verify_communication().await?;

        self.transport
            .write_register(REG_UNLOCK_OPTIMUM_8, RegisterWidth::Bits8, u32::from(UNLOCK_OPTIMUM_REGISTER_VALUE))
            .await?;
        self.transport
            .write_register(REG_OPTIMUM_SETTINGS_16, RegisterWidth::Bits16, u32::from(crate::registers::DEFAULT_OPTIMUM_SETTINGS_REGISTER))
            .await?;

        let config = lock_timeout(&self.ade7953_config).await?.clone();

        self.transport.write_register(REG_PGA_V_16, RegisterWidth::Bits16, u32::from(config.pga_register)).await?;
        self.transport.write_register(REG_PGA_IA_16, RegisterWidth::Bits16, u32::from(config.pga_register)).await?;
        self.transport.write_register(REG_PGA_IB_16, RegisterWidth::Bits16, u32::from(config.pga_register)).await?;

        self.transport.write_register(REG_DISNOLOAD_8, RegisterWidth::Bits8, u32::from(config.disnoload_register)).await?;
        self.transport.write_register(REG_AP_NOLOAD_32, RegisterWidth::Bits32, config.x_noload_register).await?;
        self.transport.write_register(REG_VAR_NOLOAD_32, RegisterWidth::Bits32, config.x_noload_register).await?;
        self.transport.write_register(REG_VA_NOLOAD_32, RegisterWidth::Bits32, config.x_noload_register).await?;

        self.transport.write_register(REG_LCYCMODE_8, RegisterWidth::Bits8, u32::from(config.lcycmode_register)).await?;
        self.transport.write_register(REG_CONFIG_16, RegisterWidth::Bits16, u32::from(config.config_register)).await?;

        self.apply_calibration(&config).await?;

        let linecyc_register = Ade7953Configuration::linecyc_for_sample_time(config.sample_time_ms);
        self.transport.write_register(REG_LINECYC_16, RegisterWidth::Bits16, u32::from(linecyc_register)).await?;
        drop(config);

        let mut guard = lock_timeout(&self.ade7953_config).await?;
        guard.linecyc_register = linecyc_register;
        drop(guard);

        log::info!("ADE7953 hardware initialization complete (linecyc={linecyc_register})");
        Ok(())
    }

    /// Toggle the reset pin and poll AP_NOLOAD until it reads its documented
    /// post-reset default, up to a bounded attempt budget.
    async fn verify_communication(&self) -> Result<()> {
        for attempt in 1..=MAX_VERIFY_COMMUNICATION_ATTEMPTS {
            crate::drivers::hw_init::gpio_write(crate::pins::ADE7953_RESET_GPIO, false);
            settle_delay(RESET_PULSE_MS).await;
            crate::drivers::hw_init::gpio_write(crate::pins::ADE7953_RESET_GPIO, true);
            settle_delay(RESET_PULSE_MS).await;

            match self.transport.read_register(REG_AP_NOLOAD_32, RegisterWidth::Bits32).await {
                Ok(value) if value == DEFAULT_EXPECTED_AP_NOLOAD_REGISTER => return Ok(()),
                Ok(_) => log::debug!("ADE7953 verify attempt {attempt}/{MAX_VERIFY_COMMUNICATION_ATTEMPTS}: unexpected AP_NOLOAD value"),
                Err(e) => log::debug!("ADE7953 verify attempt {attempt}/{MAX_VERIFY_COMMUNICATION_ATTEMPTS} failed: {e}"),
            }
            settle_delay(VERIFY_RETRY_DELAY_MS).await;
        }
        Err(Error::Init("failed to verify ADE7953 communication after reset"))
    }

    /// Write the per-channel calibration gain/offset/phase registers from the
    /// current `Ade7953Configuration`.
    async fn apply_calibration(&self, config: &Ade7953Configuration) -> Result<()> {
        self.transport.write_register(REG_AWGAIN_32, RegisterWidth::Bits32, config.awgain).await?;
        self.transport.write_register(REG_AWATTOS_32, RegisterWidth::Bits32, config.awattos).await?;
        self.transport.write_register(REG_AVARGAIN_32, RegisterWidth::Bits32, config.avargain).await?;
        self.transport.write_register(REG_AVAROS_32, RegisterWidth::Bits32, config.avaros).await?;
        self.transport.write_register(REG_AVAGAIN_32, RegisterWidth::Bits32, config.avagain).await?;
        self.transport.write_register(REG_AVAOS_32, RegisterWidth::Bits32, config.avaos).await?;
        self.transport.write_register(REG_AIGAIN_32, RegisterWidth::Bits32, config.aigain).await?;
        self.transport.write_register(REG_AIRMSOS_32, RegisterWidth::Bits32, config.airmsos).await?;
        self.transport.write_register(REG_BIGAIN_32, RegisterWidth::Bits32, config.bigain).await?;
        self.transport.write_register(REG_BIRMSOS_32, RegisterWidth::Bits32, config.birmsos).await?;
        self.transport.write_register(REG_PHCALA_16, RegisterWidth::Bits16, u32::from(config.phcala)).await?;
        self.transport.write_register(REG_PHCALB_16, RegisterWidth::Bits16, u32::from(config.phcalb)).await?;
        Ok(())
    }

    /// Seed the in-RAM table from the last NVS checkpoint, if present. Call
    /// once at startup before any task is spawned.
    pub async fn restore_from_checkpoint(&self) -> Result<bool> {
        let kv = lock_timeout(&self.kv).await?;
        match persistence::restore_from_nvs(&*kv, CHANNEL_COUNT)? {
            Some(restored) => {
                let mut values = lock_timeout(&self.meter_values).await?;
                for (slot, value) in values.iter_mut().zip(restored.into_iter()) {
                    *slot = value;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Run one CYCEND cycle and fold its outcome into the supervisor's
    /// windowed counters.
    pub async fn run_cycend_cycle(&self, now_ms: u64) -> Result<()> {
        let channels = lock_timeout(&self.channels).await?;
        let mut mux = lock_timeout(&self.mux).await?;
        let mut capture = lock_timeout(&self.capture).await?;
        let mut state = lock_timeout(&self.cycend_state).await?;
        let mut meter_values = lock_timeout(&self.meter_values).await?;

        let outcome = cycend::handle_cycend(
            &self.transport,
            &mut *mux,
            &channels,
            &mut meter_values,
            &mut state,
            &mut capture,
            now_ms,
        )
        .await;

        drop(meter_values);
        drop(state);
        drop(capture);
        drop(mux);
        drop(channels);

        let mut supervisor = lock_timeout(&self.supervisor).await?;
        supervisor.tick();
        if outcome.is_err() {
            supervisor.record_soft(&self.restarter)?;
        }
        outcome
    }

    /// Called when the meter-reader task's wait for the CYCEND signal times
    /// out — the metering loop itself has stalled.
    pub async fn record_missed_cycend(&self) -> Result<()> {
        let mut supervisor = lock_timeout(&self.supervisor).await?;
        supervisor.record_critical(&self.restarter)
    }

    /// Read RSTIRQSTATA (read-with-reset) to determine which interrupt
    /// source woke the meter-reader task.
    pub async fn classify_irq(&self) -> Result<IrqSource> {
        let status = self.transport.read_register(REG_RSTIRQSTATA_32, RegisterWidth::Bits32).await?;
        Ok(classify_irq_status(status))
    }

    /// The ADE7953 reported a RESET interrupt — its internal state (and any
    /// in-flight accumulation) is unknown, so this is always fatal.
    pub async fn record_device_reset(&self) -> Result<()> {
        let mut supervisor = lock_timeout(&self.supervisor).await?;
        supervisor.record_device_reset(&self.restarter)
    }

    /// Snapshot per-task liveness plus the supervisor's windowed failure
    /// counts, for the diagnostics RPC surface.
    pub async fn diagnostics_snapshot(&self) -> Result<diagnostics::DiagnosticsSnapshot> {
        let supervisor = lock_timeout(&self.supervisor).await?;
        Ok(diagnostics::snapshot(supervisor.soft_count(), supervisor.critical_count()))
    }

    pub async fn checkpoint_energy(&self) -> Result<()> {
        let values = lock_timeout(&self.meter_values).await?;
        let mut kv = lock_timeout(&self.kv).await?;
        persistence::checkpoint_to_nvs(&mut *kv, &values)
    }

    pub async fn save_hourly_csv(&self, date_iso: &str, timestamp_iso: &str) -> Result<()> {
        let values = lock_timeout(&self.meter_values).await?;
        let mut fs = lock_timeout(&self.fs).await?;
        persistence::append_hourly_csv(&mut *fs, date_iso, timestamp_iso, &values)
    }

    pub async fn compact_previous_day(&self, date_iso: &str) -> Result<()> {
        let mut fs = lock_timeout(&self.fs).await?;
        persistence::compact_day(&mut *fs, date_iso)
    }

    /// Reset a single channel's energy counters — does not touch any other
    /// channel, and does not touch persisted CSV history.
    pub async fn reset_channel_energy(&self, logical_channel: usize) -> Result<()> {
        let mut values = lock_timeout(&self.meter_values).await?;
        let slot = values.get_mut(logical_channel).ok_or(Error::Init("channel index out of range"))?;
        slot.reset();
        Ok(())
    }

    /// Wipe every channel's energy counters and every persistence tier.
    pub async fn reset_all_energy(&self) -> Result<()> {
        let mut values = lock_timeout(&self.meter_values).await?;
        for value in values.iter_mut() {
            value.reset();
        }
        let mut kv = lock_timeout(&self.kv).await?;
        let mut fs = lock_timeout(&self.fs).await?;
        persistence::reset_all(&mut *kv, &mut *fs, &values)
    }

    pub async fn set_sample_time(&self, sample_time_ms: u32) -> Result<()> {
        let linecyc_register = Ade7953Configuration::linecyc_for_sample_time(sample_time_ms);
        let mut config = lock_timeout(&self.ade7953_config).await?;
        let candidate = Ade7953Configuration {
            sample_time_ms,
            linecyc_register,
            ..config.clone()
        };
        candidate.validate()?;

        self.transport
            .write_register(REG_LINECYC_16, RegisterWidth::Bits16, u32::from(linecyc_register))
            .await?;
        *config = candidate;
        drop(config);

        let mut channels = lock_timeout(&self.channels).await?;
        channels.recalculate_all_lsb(sample_time_ms);
        Ok(())
    }

    pub async fn get_sample_time(&self) -> Result<u32> {
        let config = lock_timeout(&self.ade7953_config).await?;
        Ok(config.sample_time_ms)
    }
}

// ---------------------------------------------------------------------------
// Long-lived async tasks
// ---------------------------------------------------------------------------

async fn meter_reader_task<SPI, MUX, KV, FS, CLOCK, REST>(engine: Rc<Engine<SPI, MUX, KV, FS, CLOCK, REST>>)
where
    SPI: SpiDevice<u8>,
    MUX: MultiplexerPort,
    KV: KvStorePort,
    FS: FilesystemPort,
    CLOCK: WallClockPort,
    REST: RestarterPort,
{
    loop {
        match embassy_time::with_timeout(CYCEND_WAIT_TIMEOUT, crate::isr::wait_for_irq()).await {
            Ok(()) => {
                let now_ms = embassy_time::Instant::now().as_millis();
                match engine.classify_irq().await {
                    Ok(IrqSource::CycEnd) => {
                        if let Err(e) = engine.run_cycend_cycle(now_ms).await {
                            log::warn!("cycend cycle failed: {e}");
                        }
                    }
                    Ok(IrqSource::Reset) => {
                        log::error!("ADE7953 RESET interrupt — restarting");
                        if let Err(e) = engine.record_device_reset().await {
                            log::error!("supervision escalation failed: {e}");
                        }
                    }
                    Ok(IrqSource::CrcChange) => {
                        log::warn!("ADE7953 CRC-change interrupt (unhandled by the metering core)");
                    }
                    Ok(IrqSource::Other) => {
                        log::warn!("unhandled ADE7953 interrupt status");
                    }
                    Err(e) => {
                        log::warn!("failed to read interrupt status: {e}");
                    }
                }
                diagnostics::record_iteration(TaskId::MeterReader, now_ms);
            }
            Err(_) => {
                log::warn!("missed CYCEND signal within {CYCEND_WAIT_TIMEOUT:?}");
                if let Err(e) = engine.record_missed_cycend().await {
                    log::error!("supervision escalation failed: {e}");
                }
            }
        }
    }
}

async fn energy_checkpoint_task<SPI, MUX, KV, FS, CLOCK, REST>(engine: Rc<Engine<SPI, MUX, KV, FS, CLOCK, REST>>)
where
    SPI: SpiDevice<u8>,
    MUX: MultiplexerPort,
    KV: KvStorePort,
    FS: FilesystemPort,
    CLOCK: WallClockPort,
    REST: RestarterPort,
{
    loop {
        embassy_time::Timer::after(embassy_time::Duration::from_secs(
            persistence::NVS_CHECKPOINT_INTERVAL_SECS,
        ))
        .await;
        if let Err(e) = engine.checkpoint_energy().await {
            log::warn!("NVS checkpoint failed: {e}");
        }
        diagnostics::record_iteration(TaskId::EnergyCheckpoint, embassy_time::Instant::now().as_millis());
    }
}

async fn hourly_csv_task<SPI, MUX, KV, FS, CLOCK, REST>(engine: Rc<Engine<SPI, MUX, KV, FS, CLOCK, REST>>)
where
    SPI: SpiDevice<u8>,
    MUX: MultiplexerPort,
    KV: KvStorePort,
    FS: FilesystemPort,
    CLOCK: WallClockPort,
    REST: RestarterPort,
{
    loop {
        let wait_ms = engine.clock.millis_until_next_hour().max(1);
        embassy_time::Timer::after(embassy_time::Duration::from_millis(wait_ms)).await;

        if !engine.clock.is_synced() {
            diagnostics::record_iteration(TaskId::HourlyCsv, embassy_time::Instant::now().as_millis());
            continue;
        }

        let today = engine.clock.date_iso(0);
        let hour = engine.clock.hour();
        let timestamp = format!("{today}T{hour:02}:00:00Z");

        if let Err(e) = engine.save_hourly_csv(&today, &timestamp).await {
            log::warn!("hourly CSV save failed: {e}");
            diagnostics::record_iteration(TaskId::HourlyCsv, embassy_time::Instant::now().as_millis());
            continue;
        }

        if hour == 0 {
            let yesterday = engine.clock.date_iso(-1);
            if let Err(e) = engine.compact_previous_day(&yesterday).await {
                log::warn!("daily gzip compaction failed: {e}");
            }
        }
        diagnostics::record_iteration(TaskId::HourlyCsv, embassy_time::Instant::now().as_millis());
    }
}

fn run_engine_loop<SPI, MUX, KV, FS, CLOCK, REST>(engine: Engine<SPI, MUX, KV, FS, CLOCK, REST>)
where
    SPI: SpiDevice<u8> + 'static,
    MUX: MultiplexerPort + 'static,
    KV: KvStorePort + 'static,
    FS: FilesystemPort + 'static,
    CLOCK: WallClockPort + 'static,
    REST: RestarterPort + 'static,
{
    let executor: edge_executor::LocalExecutor<'_, 4> = edge_executor::LocalExecutor::new();

    if let Err(e) = futures_lite::future::block_on(engine.init_hardware()) {
        log::error!("ADE7953 hardware init failed: {e} — continuing, soft-failure supervision will restart if the device stays unreachable");
    }
    match futures_lite::future::block_on(engine.restore_from_checkpoint()) {
        Ok(true) => log::info!("restored energy counters from NVS checkpoint"),
        Ok(false) => log::info!("no NVS checkpoint found, starting energy counters from zero"),
        Err(e) => log::warn!("checkpoint restore failed: {e}"),
    }

    let engine = Rc::new(engine);

    executor.spawn(meter_reader_task(engine.clone())).detach();
    executor.spawn(energy_checkpoint_task(engine.clone())).detach();
    executor.spawn(hourly_csv_task(engine.clone())).detach();

    log::info!("metering engine started");
    futures_lite::future::block_on(executor.run(core::future::pending::<()>()));
}

/// Spawn the metering engine on a dedicated, core-pinned thread. Takes
/// ownership of every adapter; the `Engine` (and its `Rc`) is constructed
/// inside the new thread, never moved across threads itself.
pub fn spawn<SPI, MUX, KV, FS, CLOCK, REST>(
    spi: SPI,
    mux: MUX,
    kv: KV,
    fs: FS,
    clock: CLOCK,
    restarter: REST,
    config: SystemConfig,
) -> std::thread::JoinHandle<()>
where
    SPI: SpiDevice<u8> + Send + 'static,
    MUX: MultiplexerPort + Send + 'static,
    KV: KvStorePort + Send + 'static,
    FS: FilesystemPort + Send + 'static,
    CLOCK: WallClockPort + Send + 'static,
    REST: RestarterPort + Send + 'static,
{
    let engine = Engine::new(spi, mux, kv, fs, clock, restarter, config);
    crate::drivers::task_pin::spawn_on_core(
        crate::drivers::task_pin::Core::App,
        18,
        12,
        "meter\0",
        move || run_engine_loop(engine),
    )
}
