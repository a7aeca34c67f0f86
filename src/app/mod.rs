//! Application core — port traits only.
//!
//! The metering engine, waveform capture, and persistence modules depend on
//! these traits rather than on concrete hardware, keeping them testable
//! against in-memory simulation adapters.

pub mod ports;
