//! Tiered energy persistence: RAM → NVS checkpoint → hourly CSV → daily
//! gzip compaction.
//!
//! - **RAM** — the live `MeterValues` table the metering engine updates
//!   every CYCEND. Always authoritative; everything below is a progressively
//!   coarser-grained backup against power loss.
//! - **NVS checkpoint** — the whole table, `postcard`-encoded, written every
//!   [`NVS_CHECKPOINT_INTERVAL_SECS`] so a reboot loses at most that much
//!   accumulated energy.
//! - **Hourly CSV** — one row per channel appended at each wall-clock hour
//!   boundary, schema
//!   `timestamp_iso,channel_index,active_energy_imported,active_energy_exported`.
//! - **Daily gzip compaction** — the first hourly save of a new day
//!   compresses yesterday's CSV via [`gzip::compress`] and removes the
//!   plaintext file.

pub mod gzip;

extern crate alloc;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::app::ports::{FilesystemPort, KvStorePort};
use crate::error::{PersistenceError, Result};
use crate::meter::MeterValues;

/// How often the RAM table is checkpointed to NVS.
pub const NVS_CHECKPOINT_INTERVAL_SECS: u64 = 600;

const NVS_NAMESPACE: &str = "energy";
const NVS_CHECKPOINT_KEY: &str = "checkpoint";
const CSV_DIR: &str = "/energy";
const CSV_HEADER: &str = "timestamp_iso,channel_index,active_energy_imported,active_energy_exported";

fn csv_path(date_iso: &str) -> String {
    format!("{CSV_DIR}/{date_iso}.csv")
}

fn gz_path(date_iso: &str) -> String {
    format!("{CSV_DIR}/{date_iso}.csv.gz")
}

/// Serialize the full channel table and write it as a single NVS blob.
pub fn checkpoint_to_nvs(kv: &mut impl KvStorePort, values: &[MeterValues]) -> Result<()> {
    let bytes: Vec<u8> = postcard::to_allocvec(values).map_err(|_| PersistenceError::KvStoreIoError)?;
    kv.write(NVS_NAMESPACE, NVS_CHECKPOINT_KEY, &bytes)
        .map_err(PersistenceError::from)?;
    Ok(())
}

/// Restore the channel table from the last NVS checkpoint, if one exists.
pub fn restore_from_nvs(kv: &impl KvStorePort, channel_count: usize) -> Result<Option<Vec<MeterValues>>> {
    if !kv.exists(NVS_NAMESPACE, NVS_CHECKPOINT_KEY) {
        return Ok(None);
    }
    let mut buf = alloc::vec![0u8; channel_count * core::mem::size_of::<MeterValues>() * 2];
    let len = kv
        .read(NVS_NAMESPACE, NVS_CHECKPOINT_KEY, &mut buf)
        .map_err(PersistenceError::from)?;
    let values: Vec<MeterValues> =
        postcard::from_bytes(&buf[..len]).map_err(|_| PersistenceError::KvStoreIoError)?;
    Ok(Some(values))
}

/// Append one CSV row per channel for the just-completed hour. Writes the
/// header first if the file doesn't exist yet.
pub fn append_hourly_csv(
    fs: &mut impl FilesystemPort,
    date_iso: &str,
    timestamp_iso: &str,
    values: &[MeterValues],
) -> Result<()> {
    fs.create_dir_all(CSV_DIR).map_err(PersistenceError::from)?;
    let path = csv_path(date_iso);
    if !fs.exists(&path) {
        fs.append(&path, format!("{CSV_HEADER}\n").as_bytes())
            .map_err(PersistenceError::from)?;
    }
    let mut block = String::new();
    for (channel_index, mv) in values.iter().enumerate() {
        block.push_str(&format!(
            "{timestamp_iso},{channel_index},{},{}\n",
            mv.active_energy_imported, mv.active_energy_exported
        ));
    }
    fs.append(&path, block.as_bytes()).map_err(PersistenceError::from)?;
    Ok(())
}

/// Compress `date_iso`'s CSV into a `.csv.gz` and remove the plaintext file.
/// A no-op if the plaintext file is already gone (e.g. a prior crash left
/// compaction half-done and a later boot retries it).
pub fn compact_day(fs: &mut impl FilesystemPort, date_iso: &str) -> Result<()> {
    let plain = csv_path(date_iso);
    if !fs.exists(&plain) {
        return Ok(());
    }
    let data = fs.read_to_vec(&plain).map_err(PersistenceError::from)?;
    let compressed = gzip::compress(&data);
    fs.write_all(&gz_path(date_iso), &compressed)
        .map_err(PersistenceError::from)?;
    fs.remove(&plain).map_err(PersistenceError::from)?;
    Ok(())
}

/// Startup migration: compress every plaintext CSV under `CSV_DIR` except
/// `today_iso`'s (which is still being appended to).
pub fn migrate_old_csvs(fs: &mut impl FilesystemPort, today_iso: &str) -> Result<()> {
    let names = fs.list_with_prefix(CSV_DIR, "");
    for name in names {
        if !name.ends_with(".csv") {
            continue;
        }
        let date_iso = name.trim_end_matches(".csv");
        if date_iso == today_iso {
            continue;
        }
        compact_day(fs, date_iso)?;
    }
    Ok(())
}

/// Wipe every tier: delete the NVS checkpoint and every CSV/gzip file, then
/// re-save an all-zero checkpoint. Resets energy for every channel, not a
/// single one — use the channel-scoped reset in the engine for that.
pub fn reset_all(
    kv: &mut impl KvStorePort,
    fs: &mut impl FilesystemPort,
    zeroed: &[MeterValues],
) -> Result<()> {
    let _ = kv.delete(NVS_NAMESPACE, NVS_CHECKPOINT_KEY);
    for name in fs.list_with_prefix(CSV_DIR, "") {
        let path = format!("{CSV_DIR}/{name}");
        fs.remove(&path).map_err(PersistenceError::from)?;
    }
    checkpoint_to_nvs(kv, zeroed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::filesystem::StdFilesystem;
    use crate::adapters::nvs::NvsAdapter;

    fn scratch(name: &str) -> (NvsAdapter, StdFilesystem) {
        let fs = crate::adapters::filesystem::scratch_fs(name);
        (NvsAdapter::new().unwrap(), fs)
    }

    #[test]
    fn checkpoint_round_trips() {
        let (mut kv, _fs) = scratch("persist_checkpoint");
        let values = alloc::vec![MeterValues::default(); 17];
        checkpoint_to_nvs(&mut kv, &values).unwrap();
        let restored = restore_from_nvs(&kv, 17).unwrap().unwrap();
        assert_eq!(restored.len(), 17);
    }

    #[test]
    fn hourly_csv_writes_header_once() {
        let (_kv, mut fs) = scratch("persist_csv");
        let values = alloc::vec![MeterValues::default(); 2];
        append_hourly_csv(&mut fs, "2026-07-28", "2026-07-28T00:00:00Z", &values).unwrap();
        append_hourly_csv(&mut fs, "2026-07-28", "2026-07-28T01:00:00Z", &values).unwrap();
        let data = fs.read_to_vec("/energy/2026-07-28.csv").unwrap();
        let text = String::from_utf8(data).unwrap();
        assert_eq!(text.matches(CSV_HEADER).count(), 1);
        assert_eq!(text.matches("2026-07-28T01:00:00Z").count(), 2);
    }

    #[test]
    fn compact_day_replaces_csv_with_gzip() {
        let (_kv, mut fs) = scratch("persist_compact");
        let values = alloc::vec![MeterValues::default(); 1];
        append_hourly_csv(&mut fs, "2026-07-27", "2026-07-27T23:00:00Z", &values).unwrap();
        compact_day(&mut fs, "2026-07-27").unwrap();
        assert!(!fs.exists("/energy/2026-07-27.csv"));
        assert!(fs.exists("/energy/2026-07-27.csv.gz"));
    }

    #[test]
    fn reset_all_clears_csv_directory() {
        let (mut kv, mut fs) = scratch("persist_reset");
        let values = alloc::vec![MeterValues::default(); 1];
        append_hourly_csv(&mut fs, "2026-07-27", "2026-07-27T23:00:00Z", &values).unwrap();
        reset_all(&mut kv, &mut fs, &values).unwrap();
        assert!(fs.list_with_prefix(CSV_DIR, "").is_empty());
    }
}
