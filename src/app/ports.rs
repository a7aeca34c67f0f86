//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Metering engine / persistence (domain)
//! ```
//!
//! Driven adapters (SPI bus, multiplexer GPIOs, NVS, filesystem, wall clock,
//! restart controller, status LED) implement these traits. The metering
//! engine and persistence tiers consume them via generics or trait objects,
//! so the domain core never touches hardware directly.

// ---------------------------------------------------------------------------
// Multiplexer port
// ---------------------------------------------------------------------------

/// Commands the 16:1 analog multiplexer's four binary-select GPIOs.
pub trait MultiplexerPort {
    /// Select mux position `0..=15` (S0 = LSB). Channel 0 (the reference
    /// channel) never calls this — it bypasses the mux entirely.
    fn set_channel(&mut self, mux_index: u8);
}

// ---------------------------------------------------------------------------
// Key-value store port (NVS-backed checkpoint storage)
// ---------------------------------------------------------------------------

/// Persistent key-value storage for the energy checkpoint and calibration
/// blobs.
///
/// Write operations MUST be atomic — no partial writes on power loss. The
/// ESP-IDF NVS API guarantees this natively; in-memory simulation achieves
/// it trivially.
pub trait KvStorePort {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, crate::error::StorageError>;
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), crate::error::StorageError>;
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), crate::error::StorageError>;
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ---------------------------------------------------------------------------
// Filesystem port (LittleFS-backed CSV + gzip archive storage)
// ---------------------------------------------------------------------------

/// Append-oriented file access for the hourly CSV tier and its daily gzip
/// compaction. Modelled on LittleFS semantics (flat directories, byte-range
/// append), which is what both the ESP-IDF VFS mount and the host-side
/// simulation backend provide.
pub trait FilesystemPort {
    fn exists(&self, path: &str) -> bool;
    fn create_dir_all(&mut self, path: &str) -> Result<(), crate::error::StorageError>;
    fn append(&mut self, path: &str, data: &[u8]) -> Result<(), crate::error::StorageError>;
    fn read_to_vec(&self, path: &str) -> Result<Vec<u8>, crate::error::StorageError>;
    fn write_all(&mut self, path: &str, data: &[u8]) -> Result<(), crate::error::StorageError>;
    fn remove(&mut self, path: &str) -> Result<(), crate::error::StorageError>;
    /// List file names directly under `dir` (no recursion) whose name
    /// starts with `prefix`.
    fn list_with_prefix(&self, dir: &str, prefix: &str) -> Vec<String>;
}

// ---------------------------------------------------------------------------
// Wall clock port
// ---------------------------------------------------------------------------

/// Wall-clock queries used to decide hour/day boundaries for the CSV and
/// gzip persistence tiers. Distinct from the monotonic uptime clock used
/// for delta timing, which the metering engine reads directly off
/// `embassy_time::Instant`.
pub trait WallClockPort {
    /// Whether the wall clock has been synchronised (e.g. via NTP). Until
    /// then, hour/day-boundary logic must not fire.
    fn is_synced(&self) -> bool;
    /// Seconds since the Unix epoch, UTC.
    fn unix_time_secs(&self) -> u64;
    /// Hour of day, 0-23, UTC.
    fn hour(&self) -> u8;
    /// ISO-8601 date (`YYYY-MM-DD`) for `unix_time_secs() + offset_days*86400`.
    fn date_iso(&self, offset_days: i64) -> heapless::String<16>;
    /// Milliseconds remaining until the next hour boundary.
    fn millis_until_next_hour(&self) -> u64;
}

// ---------------------------------------------------------------------------
// Restarter port
// ---------------------------------------------------------------------------

/// Requests a full system restart. Used by the supervision module when a
/// failure budget is exhausted or the device reports a RESET interrupt.
pub trait RestarterPort {
    fn request_restart(&self, reason: &'static str);
}

// ---------------------------------------------------------------------------
// Status LED port
// ---------------------------------------------------------------------------

pub trait LedControllerPort {
    fn set_rgb(&mut self, r: u8, g: u8, b: u8);
}
