//! EnergyMe Core — Main Entry Point
//!
//! Hexagonal architecture: adapters at the outer ring implement the port
//! traits in `app::ports`; the metering engine (pure async domain logic)
//! never touches hardware directly.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SpiTransport(esp-idf-hal SPI)   GpioMultiplexer                │
//! │  NvsAdapter (KvStorePort)        StdFilesystem (FilesystemPort) │
//! │  Esp32TimeAdapter (WallClockPort) SystemRestarter (RestarterPort)│
//! │  StatusLed (LedControllerPort)                                  │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │         Engine (meter_reader / checkpoint / csv)        │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Watchdog (TWDT) fed from the main thread every tick           │
//! └────────────────────────────────────────────────────────────────┘
//! ```

#![deny(unused_must_use)]

pub mod config;
mod error;
mod pins;

pub mod app;
mod adapters;
mod drivers;
pub mod meter;
pub mod engine;
pub mod waveform;
pub mod persistence;
pub mod supervision;
pub mod diagnostics;
mod isr;
mod registers;
mod transport;

use anyhow::Result;
use log::{info, warn};

use adapters::filesystem::StdFilesystem;
use adapters::multiplexer::GpioMultiplexer;
use adapters::nvs::NvsAdapter;
use adapters::restarter::SystemRestarter;
use adapters::time::Esp32TimeAdapter;
use app::ports::KvStorePort;
use config::SystemConfig;
use drivers::status_led::StatusLed;

const CONFIG_NAMESPACE: &str = "energyme";
const CONFIG_KEY: &str = "config";

/// Load `SystemConfig` from NVS, falling back to defaults on first boot or
/// a decode failure (e.g. after a firmware downgrade changes the layout).
fn load_config(kv: &impl KvStorePort) -> SystemConfig {
    if !kv.exists(CONFIG_NAMESPACE, CONFIG_KEY) {
        return SystemConfig::default();
    }
    let mut buf = [0u8; 4096];
    match kv.read(CONFIG_NAMESPACE, CONFIG_KEY, &mut buf) {
        Ok(len) => postcard::from_bytes(&buf[..len]).unwrap_or_else(|e| {
            warn!("config decode failed ({e}), falling back to defaults");
            SystemConfig::default()
        }),
        Err(e) => {
            warn!("config read failed ({e}), falling back to defaults");
            SystemConfig::default()
        }
    }
}

fn save_config(kv: &mut impl KvStorePort, config: &SystemConfig) {
    match postcard::to_allocvec(config) {
        Ok(bytes) => {
            if let Err(e) = kv.write(CONFIG_NAMESPACE, CONFIG_KEY, &bytes) {
                warn!("config save failed: {e}");
            }
        }
        Err(e) => warn!("config encode failed: {e}"),
    }
}

fn make_spi_device() -> Result<impl embedded_hal::spi::SpiDevice<u8>> {
    use esp_idf_hal::delay::Ets;
    use esp_idf_hal::gpio::PinDriver;
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_hal::spi::config::Config as SpiConfig;
    use esp_idf_hal::spi::{SpiDeviceDriver, SpiDriver, SpiDriverConfig};
    use esp_idf_hal::units::FromValueType;

    let peripherals = Peripherals::take()?;
    let driver = SpiDriver::new(
        peripherals.spi2,
        peripherals.pins.gpio14, // SCK
        peripherals.pins.gpio12, // MOSI
        Some(peripherals.pins.gpio13), // MISO
        &SpiDriverConfig::new(),
    )?;
    let cfg = SpiConfig::new().baudrate(pins::ADE7953_SPI_FREQ_HZ.Hz());
    let cs = PinDriver::output(peripherals.pins.gpio11)?;
    let device = SpiDeviceDriver::new(driver, Some(cs), &cfg)?;
    let _ = Ets; // delay handle kept alive by the HAL internally
    Ok(device)
}

fn main() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  EnergyMe Core v{}                   ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    if let Err(e) = drivers::hw_init::init_peripherals() {
        log::error!("peripheral init failed: {e} — halting");
        #[allow(clippy::empty_loop)]
        loop {}
    }
    if let Err(e) = drivers::hw_init::init_isr_service() {
        log::error!("IRQ service init failed: {e} — continuing without ISR wakeups");
    }

    let mut nvs = NvsAdapter::new()?;
    let config = {
        let cfg = load_config(&nvs);
        if let Err(e) = cfg.validate() {
            warn!("stored config failed validation ({e}), falling back to defaults");
            SystemConfig::default()
        } else {
            cfg
        }
    };
    save_config(&mut nvs, &config);

    let mux = GpioMultiplexer::new();
    let fs = StdFilesystem::new();
    let clock = Esp32TimeAdapter::new();
    let restarter = SystemRestarter::new();
    let mut status_led = StatusLed::new();
    status_led.set_colour(0, 8, 0);

    let spi = make_spi_device()?;

    info!("spawning metering engine");
    let handle = engine::spawn(spi, mux, nvs, fs, clock, restarter, config);

    let watchdog = drivers::watchdog::Watchdog::new();
    loop {
        watchdog.feed();
        std::thread::sleep(std::time::Duration::from_secs(1));
        if handle.is_finished() {
            log::error!("metering engine thread exited — halting");
            break;
        }
    }

    Ok(())
}
