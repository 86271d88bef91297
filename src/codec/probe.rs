//! LZO incompressibility probe (§4.2.1).
//!
//! A cheap pre-test run before any non-LZO, non-GZIP back-end: compress
//! growing prefixes of the input with LZO until either the compressed
//! fraction drops below `threshold` (compressible, don't skip) or the whole
//! input has been tested (not compressible, skip the real back-end and
//! store the chunk as-is).

use crate::error::{CoreError, Result};

/// Baseline/minimum chunk size (§ glossary `STREAM_BUFSIZE`): the probe
/// never tests a prefix larger than this.
pub const STREAM_BUFSIZE: usize = 100 * 1024;

/// Returns `true` if the back-end should be skipped (data judged
/// incompressible), `false` if it's worth attempting real compression.
pub fn probe_incompressible(data: &[u8], threshold: f32) -> Result<bool> {
    if threshold > 1.0 {
        // Caller asked to always attempt compression.
        return Ok(false);
    }
    if data.is_empty() {
        return Ok(true);
    }

    let cap = STREAM_BUFSIZE.min(data.len());
    let mut prefix_len = 256usize.min(cap);

    loop {
        let prefix = &data[..prefix_len];
        let compressed = lzokay_native::compress_all(prefix, None)
            .map_err(|e| CoreError::Codec(format!("lzo probe failed: {e:?}")))?;

        let fraction = compressed.len() as f32 / prefix.len() as f32;
        if fraction < threshold {
            return Ok(false);
        }

        if prefix_len >= cap {
            return Ok(true);
        }
        prefix_len = (prefix_len * 2).min(cap);
    }
}
