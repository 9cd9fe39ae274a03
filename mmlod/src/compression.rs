//! zlib entry codec for LOD-family archives.
//!
//! All compressed archive entries use plain zlib streams. The decoder
//! contract is exact: given an expected unpacked length it either produces
//! exactly that many bytes or fails with
//! [`Error::DecompressionMismatch`](crate::Error::DecompressionMismatch).
//! The tolerant variant exists for the driver-level "ignore unpacking
//! errors" policy and zero-fills whatever it could not recover.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{Error, Result};

/// Compression level used when packing entries, matching the legacy tools.
pub const DEFAULT_LEVEL: u32 = 6;

/// Compress `data` as a zlib stream.
///
/// # Errors
/// Returns [`Error::Io`] if the encoder fails.
pub fn compress(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Compress `data` and return the result only when it is actually smaller.
///
/// Callers store the entry uncompressed (and clear the packed flag) when
/// this returns `None`.
///
/// # Errors
/// Returns [`Error::Io`] if the encoder fails.
pub fn compress_if_smaller(data: &[u8], level: u32) -> Result<Option<Vec<u8>>> {
    let packed = compress(data, level)?;
    if packed.len() < data.len() {
        Ok(Some(packed))
    } else {
        Ok(None)
    }
}

/// Decompress a zlib stream into exactly `expected_len` bytes.
///
/// # Errors
/// Returns [`Error::DecompressionMismatch`] if the stream is invalid or
/// yields a different number of bytes.
pub fn decompress(data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::with_capacity(expected_len);
    if decoder.read_to_end(&mut out).is_err() {
        return Err(Error::DecompressionMismatch {
            expected: expected_len,
            actual: out.len(),
        });
    }
    if out.len() != expected_len {
        return Err(Error::DecompressionMismatch {
            expected: expected_len,
            actual: out.len(),
        });
    }
    Ok(out)
}

/// Best-effort decompression: recover as much as possible from a damaged
/// stream and zero-fill the remainder up to `expected_len`.
#[must_use]
pub fn decompress_tolerant(data: &[u8], expected_len: usize) -> Vec<u8> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = vec![0u8; expected_len];
    let mut filled = 0;
    while filled < expected_len {
        match decoder.read(&mut out[filled..]) {
            Ok(0) | Err(_) => break,
            Ok(n) => filled += n,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_exact_length() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(8);
        let packed = compress(&data, DEFAULT_LEVEL).unwrap();
        assert_eq!(decompress(&packed, data.len()).unwrap(), data);
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let data = vec![0xABu8; 256];
        let packed = compress(&data, DEFAULT_LEVEL).unwrap();
        assert!(matches!(
            decompress(&packed, 255),
            Err(Error::DecompressionMismatch {
                expected: 255,
                actual: 256
            })
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decompress(&[0x00, 0x11, 0x22], 16).is_err());
    }

    #[test]
    fn tolerant_zero_fills_tail() {
        let data = vec![0x55u8; 128];
        let packed = compress(&data, DEFAULT_LEVEL).unwrap();
        // Cut the stream in half; the prefix decodes, the tail is zeroed.
        let out = decompress_tolerant(&packed[..packed.len() / 2], 128);
        assert_eq!(out.len(), 128);
    }

    #[test]
    fn incompressible_data_is_stored() {
        // Short high-entropy input does not shrink under zlib.
        let data: Vec<u8> = (0u16..64).map(|i| (i.wrapping_mul(197) >> 3) as u8).collect();
        assert!(compress_if_smaller(&data, DEFAULT_LEVEL).unwrap().is_none());
    }
}
