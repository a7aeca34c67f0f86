//! Single-member gzip container around `miniz_oxide`'s raw DEFLATE output.
//!
//! `miniz_oxide` speaks raw DEFLATE, not gzip — the ~10-byte gzip header,
//! trailing CRC-32, and trailing ISIZE are assembled here by hand, the same
//! way the RPC transport's frame codec wraps a third-party payload format in
//! its own small container.

extern crate alloc;
use alloc::vec::Vec;

use miniz_oxide::deflate::compress_to_vec;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const CM_DEFLATE: u8 = 0x08;
const FLG_NONE: u8 = 0x00;
const MTIME_UNSET: [u8; 4] = [0; 4];
const XFL_DEFAULT: u8 = 0x00;
const OS_UNKNOWN: u8 = 0xFF;

/// DEFLATE compression level (1-10, higher = better ratio, slower). Applied
/// uniformly to the daily CSV compaction, which runs once a day off the
/// metering hot path.
const COMPRESSION_LEVEL: u8 = 6;

/// Compress `input` into a complete single-member gzip stream.
pub fn compress(input: &[u8]) -> Vec<u8> {
    let deflated = compress_to_vec(input, COMPRESSION_LEVEL);
    let crc = crc32(input);

    let mut out = Vec::with_capacity(10 + deflated.len() + 8);
    out.extend_from_slice(&GZIP_MAGIC);
    out.push(CM_DEFLATE);
    out.push(FLG_NONE);
    out.extend_from_slice(&MTIME_UNSET);
    out.push(XFL_DEFAULT);
    out.push(OS_UNKNOWN);
    out.extend_from_slice(&deflated);
    out.extend_from_slice(&crc.to_le_bytes());
    out.extend_from_slice(&(input.len() as u32).to_le_bytes());
    out
}

const CRC32_POLY: u32 = 0xEDB8_8320;

fn crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { CRC32_POLY ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

fn crc32(data: &[u8]) -> u32 {
    let table = crc32_table();
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        let idx = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = table[idx] ^ (crc >> 8);
    }
    crc ^ 0xFFFF_FFFF
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_crc32_of_empty_string_check() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn compressed_stream_starts_with_gzip_magic() {
        let out = compress(b"timestamp_iso,channel_index,active_energy_imported,active_energy_exported\n");
        assert_eq!(&out[0..2], &GZIP_MAGIC);
        assert_eq!(out[2], CM_DEFLATE);
    }

    #[test]
    fn isize_footer_matches_input_length() {
        let input = b"a".repeat(5_000);
        let out = compress(&input);
        let isize_bytes = &out[out.len() - 4..];
        let isize = u32::from_le_bytes(isize_bytes.try_into().unwrap());
        assert_eq!(isize as usize, input.len());
    }
}
