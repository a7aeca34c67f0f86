//! Unified error types for the energy monitor firmware core.
//!
//! A single `Error` enum aggregates every subsystem's error type via `From`
//! impls, so the metering engine and its callers share one propagation path.
//! All variants are `Copy` so they can cross the failure-supervision counters
//! without allocation.

use core::fmt;

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Transport(TransportError),
    Validation(ValidationError),
    Persistence(PersistenceError),
    Config(ConfigError),
    Supervision(SupervisionError),
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Validation(e) => write!(f, "validation: {e}"),
            Self::Persistence(e) => write!(f, "persistence: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Supervision(e) => write!(f, "supervision: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// SPI transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The line lock (single raw transfer) could not be acquired in time.
    LineLockTimeout,
    /// The operation lock (verified read/write) could not be acquired in time.
    OperationLockTimeout,
    /// The underlying SPI peripheral returned an error.
    BusFault,
    /// Post-write readback of LAST_ADD/LAST_OP/LAST_RWDATA did not match.
    VerificationMismatch,
    /// An unsupported register width was requested (must be 8/16/24/32).
    InvalidWidth,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LineLockTimeout => write!(f, "line lock timeout"),
            Self::OperationLockTimeout => write!(f, "operation lock timeout"),
            Self::BusFault => write!(f, "SPI bus fault"),
            Self::VerificationMismatch => write!(f, "verification mismatch"),
            Self::InvalidWidth => write!(f, "invalid register width"),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Sample validation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    VoltageOutOfRange,
    CurrentOutOfRange,
    PowerOutOfRange,
    PowerFactorOutOfRange,
    FrequencyOutOfRange,
    InvalidPhase,
    StaleDelta,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VoltageOutOfRange => write!(f, "voltage out of range"),
            Self::CurrentOutOfRange => write!(f, "current out of range"),
            Self::PowerOutOfRange => write!(f, "power out of range"),
            Self::PowerFactorOutOfRange => write!(f, "power factor out of range"),
            Self::FrequencyOutOfRange => write!(f, "grid frequency out of range"),
            Self::InvalidPhase => write!(f, "invalid phase for cross-phase correction"),
            Self::StaleDelta => write!(f, "zero time delta since last sample"),
        }
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

// ---------------------------------------------------------------------------
// Persistence errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceError {
    KvStoreFull,
    KvStoreIoError,
    FilesystemIoError,
    MalformedCsvRow,
    CompressionFailed,
    MutexTimeout,
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KvStoreFull => write!(f, "key-value store full"),
            Self::KvStoreIoError => write!(f, "key-value store I/O error"),
            Self::FilesystemIoError => write!(f, "filesystem I/O error"),
            Self::MalformedCsvRow => write!(f, "malformed CSV row"),
            Self::CompressionFailed => write!(f, "gzip compaction failed"),
            Self::MutexTimeout => write!(f, "mutex acquisition timed out"),
        }
    }
}

impl From<PersistenceError> for Error {
    fn from(e: PersistenceError) -> Self {
        Self::Persistence(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    NotFound,
    Corrupted,
    ValidationFailed(&'static str),
    StorageFull,
    IoError,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Supervision errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisionError {
    /// The soft-failure budget was exhausted within its window.
    SoftBudgetExhausted,
    /// The critical-failure budget was exhausted within its window.
    CriticalBudgetExhausted,
    /// The ADE7953 reported a RESET interrupt — treated as fatal.
    DeviceReset,
}

impl fmt::Display for SupervisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SoftBudgetExhausted => write!(f, "soft failure budget exhausted"),
            Self::CriticalBudgetExhausted => write!(f, "critical failure budget exhausted"),
            Self::DeviceReset => write!(f, "device RESET interrupt"),
        }
    }
}

impl From<SupervisionError> for Error {
    fn from(e: SupervisionError) -> Self {
        Self::Supervision(e)
    }
}

// ---------------------------------------------------------------------------
// Storage port errors (the vocabulary KvStorePort/FilesystemPort implementations
// speak, before folding into PersistenceError at the engine boundary)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    NotFound,
    Full,
    IoError,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<StorageError> for PersistenceError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound => Self::KvStoreIoError,
            StorageError::Full => Self::KvStoreFull,
            StorageError::IoError => Self::KvStoreIoError,
        }
    }
}
