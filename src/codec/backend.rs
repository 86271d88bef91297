//! Concrete back-end wiring for the five chunk codecs.
//!
//! These are ordinary implementations of the adapter contract in
//! [`super`], not part of the specified core: §1 calls the back-end
//! libraries themselves an external collaborator. Swapping any of these for
//! another crate only touches this file.

use super::BackendOutcome;
use crate::error::{CoreError, Result};
use std::io::{Read, Write};

fn outcome_from_len(compressed: Vec<u8>, input_len: usize) -> BackendOutcome {
    if compressed.len() >= input_len {
        BackendOutcome::Overflow
    } else {
        BackendOutcome::Ok(compressed)
    }
}

// ---- BZIP2 -----------------------------------------------------------

pub(super) fn bzip2_compress(input: &[u8], level: u32) -> Result<BackendOutcome> {
    use bzip2::write::BzEncoder;
    use bzip2::Compression;

    let mut encoder = BzEncoder::new(Vec::new(), Compression::new(level.clamp(1, 9)));
    encoder
        .write_all(input)
        .map_err(|e| CoreError::Codec(format!("bzip2 compress: {e}")))?;
    let compressed = encoder
        .finish()
        .map_err(|e| CoreError::Codec(format!("bzip2 compress: {e}")))?;
    Ok(outcome_from_len(compressed, input.len()))
}

pub(super) fn bzip2_decompress(input: &[u8]) -> Result<Vec<u8>> {
    use bzip2::read::BzDecoder;
    let mut decoder = BzDecoder::new(input);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CoreError::Codec(format!("bzip2 decompress: {e}")))?;
    Ok(out)
}

// ---- GZIP --------------------------------------------------------------

pub(super) fn gzip_compress(input: &[u8], level: u32) -> Result<BackendOutcome> {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level.clamp(0, 9)));
    encoder
        .write_all(input)
        .map_err(|e| CoreError::Codec(format!("gzip compress: {e}")))?;
    let compressed = encoder
        .finish()
        .map_err(|e| CoreError::Codec(format!("gzip compress: {e}")))?;
    Ok(outcome_from_len(compressed, input.len()))
}

pub(super) fn gzip_decompress(input: &[u8]) -> Result<Vec<u8>> {
    use flate2::read::GzDecoder;
    let mut decoder = GzDecoder::new(input);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CoreError::Codec(format!("gzip decompress: {e}")))?;
    Ok(out)
}

// ---- LZMA ----------------------------------------------------------------
// lzma-rust2 exposes LZMA2 stream readers/writers; the dictionary size is
// fixed small here since chunks are bounded by `bufsize`, never multi-GiB.

const LZMA_DICT_SIZE: u32 = 1 << 20;
/// Ceiling on the up-front capacity reservation taken from an untrusted
/// `u_len` header field (see `lzma_decompress`).
const STREAM_BUFSIZE_HINT_CAP: usize = 64 << 20;

fn looks_like_oom(msg: &str) -> bool {
    let lower = msg.to_ascii_lowercase();
    lower.contains("memory") || lower.contains("alloc")
}

pub(super) fn lzma_compress(input: &[u8], level: u32) -> Result<BackendOutcome> {
    use lzma_rust2::{LZMA2Options, LZMA2Writer};

    let mut options = LZMA2Options::with_preset(level);
    options.dict_size = LZMA_DICT_SIZE;

    let mut out = Vec::new();
    let result = (|| -> std::io::Result<()> {
        let mut writer = LZMA2Writer::new(&mut out, &options);
        writer.write_all(input)?;
        writer.finish()?;
        Ok(())
    })();

    match result {
        Ok(()) => Ok(outcome_from_len(out, input.len())),
        Err(e) if looks_like_oom(&e.to_string()) => Ok(BackendOutcome::OutOfMemory),
        Err(e) => Err(CoreError::Codec(format!("lzma compress: {e}"))),
    }
}

pub(super) fn lzma_decompress(input: &[u8], u_len: usize) -> Result<Vec<u8>> {
    use lzma_rust2::LZMA2Reader;
    let mut reader = LZMA2Reader::new(input, LZMA_DICT_SIZE, None);
    // `u_len` is a capacity hint taken straight from an on-disk, potentially
    // corrupt header field. `read_to_end` grows the buffer as needed anyway,
    // so bound the up-front reservation instead of trusting an arbitrary
    // value enough to hand it straight to the allocator.
    let mut out = Vec::with_capacity(u_len.min(STREAM_BUFSIZE_HINT_CAP));
    reader
        .read_to_end(&mut out)
        .map_err(|e| CoreError::Codec(format!("lzma decompress: {e}")))?;
    Ok(out)
}

// ---- LZO -----------------------------------------------------------------

pub(super) fn lzo_compress(input: &[u8]) -> Result<BackendOutcome> {
    let compressed = lzokay_native::compress_all(input, None)
        .map_err(|e| CoreError::Codec(format!("lzo compress: {e:?}")))?;
    Ok(outcome_from_len(compressed, input.len()))
}

pub(super) fn lzo_decompress(input: &[u8], u_len: usize) -> Result<Vec<u8>> {
    lzokay_native::decompress_all(input, Some(u_len))
        .map_err(|e| CoreError::Codec(format!("lzo decompress: {e:?}")))
}

// ---- ZPAQ ----------------------------------------------------------------

fn zpaq_method(level: u32) -> &'static str {
    match level.clamp(1, 9) {
        1..=2 => "1",
        3..=4 => "2",
        5..=6 => "3",
        7..=8 => "4",
        _ => "5",
    }
}

pub(super) fn zpaq_compress(input: &[u8], level: u32) -> Result<BackendOutcome> {
    let compressed = zpaq_rs::compress_to_vec(input, zpaq_method(level))
        .map_err(|e| CoreError::Codec(format!("zpaq compress: {e}")))?;
    Ok(outcome_from_len(compressed, input.len()))
}

pub(super) fn zpaq_decompress(input: &[u8]) -> Result<Vec<u8>> {
    zpaq_rs::decompress_to_vec(input).map_err(|e| CoreError::Codec(format!("zpaq decompress: {e}")))
}
