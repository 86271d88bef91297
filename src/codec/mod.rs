//! Codec adapter (C2, §4.2).
//!
//! A uniform compress/decompress front for five back-ends plus an identity
//! ("store") mode. The back-end codec libraries themselves are explicitly a
//! non-goal of this specification (§1); what's specified is the adapter
//! contract: probe-before-compress, the LZMA->BZIP2 out-of-memory fallback,
//! level rescaling, and the discard-if-not-smaller policy. The `Backend`
//! trait below is that contract; the five implementations in [`backend`]
//! are one reasonable set of back-ends wired to it.

mod backend;
mod probe;

pub use probe::{probe_incompressible, STREAM_BUFSIZE};

use crate::error::{CoreError, Result};
use tracing::debug;

/// Chunk codec tag (§6): the on-disk byte identifying which back-end
/// produced a chunk's payload, or `None` for an uncompressed ("stored")
/// chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CodecKind {
    None = 0,
    Bzip2 = 1,
    Gzip = 2,
    Lzma = 3,
    Lzo = 4,
    Zpaq = 5,
}

impl CodecKind {
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(CodecKind::None),
            1 => Ok(CodecKind::Bzip2),
            2 => Ok(CodecKind::Gzip),
            3 => Ok(CodecKind::Lzma),
            4 => Ok(CodecKind::Lzo),
            5 => Ok(CodecKind::Zpaq),
            other => Err(CoreError::Format(format!("unknown codec tag {other}"))),
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    /// GZIP is the one back-end the LZO probe historically skips (§4.2).
    fn skips_probe(self) -> bool {
        matches!(self, CodecKind::Gzip | CodecKind::Lzo | CodecKind::None)
    }
}

/// Result of `CodecAdapter::compress`: the chosen codec and its payload.
/// When the payload didn't compress, `codec` is `CodecKind::None` and `data`
/// is a copy of the original input.
pub struct Compressed {
    pub codec: CodecKind,
    pub data: Vec<u8>,
}

/// Signal returned by a back-end's `compress`, distinguishing the two
/// recoverable failure modes §4.2 calls out from a hard error.
enum BackendOutcome {
    Ok(Vec<u8>),
    /// Back-end ran out of memory (LZMA only triggers the BZIP2 fallback on
    /// this).
    OutOfMemory,
    /// Back-end's output would not fit / overflowed its buffer; §4.2 treats
    /// this the same as "incompressible", not as a hard `CodecError`.
    Overflow,
}

/// Rescale a 1-9 level onto LZMA's narrower 1-7 axis (§4.2).
fn lzma_level(level: u32) -> u32 {
    ((level * 7) / 9).max(1)
}

/// Compresses `input` with `codec` at `level`, applying the probe, fallback,
/// and discard-if-not-smaller policy from §4.2.
pub fn compress(input: &[u8], codec: CodecKind, level: u32, lzo_threshold: f32) -> Result<Compressed> {
    if matches!(codec, CodecKind::None) {
        return Ok(Compressed {
            codec: CodecKind::None,
            data: input.to_vec(),
        });
    }

    if !codec.skips_probe() && probe_incompressible(input, lzo_threshold)? {
        debug!(?codec, "lzo probe reports incompressible, skipping back-end");
        return Ok(Compressed {
            codec: CodecKind::None,
            data: input.to_vec(),
        });
    }

    let outcome = match codec {
        CodecKind::Bzip2 => backend::bzip2_compress(input, level),
        CodecKind::Gzip => backend::gzip_compress(input, level),
        CodecKind::Lzma => backend::lzma_compress(input, lzma_level(level)),
        CodecKind::Lzo => backend::lzo_compress(input),
        CodecKind::Zpaq => backend::zpaq_compress(input, level),
        CodecKind::None => unreachable!(),
    }?;

    let (final_codec, compressed) = match outcome {
        BackendOutcome::Ok(data) => (codec, data),
        BackendOutcome::Overflow => (CodecKind::None, input.to_vec()),
        BackendOutcome::OutOfMemory if matches!(codec, CodecKind::Lzma) => {
            debug!("lzma signaled out-of-memory, retrying as bzip2");
            match backend::bzip2_compress(input, level)? {
                BackendOutcome::Ok(data) => (CodecKind::Bzip2, data),
                BackendOutcome::Overflow => (CodecKind::None, input.to_vec()),
                BackendOutcome::OutOfMemory => (CodecKind::None, input.to_vec()),
            }
        }
        BackendOutcome::OutOfMemory => {
            return Err(CoreError::Resource(format!("{codec:?} backend ran out of memory")))
        }
    };

    if final_codec != CodecKind::None && compressed.len() >= input.len() {
        return Ok(Compressed {
            codec: CodecKind::None,
            data: input.to_vec(),
        });
    }

    Ok(Compressed {
        codec: final_codec,
        data: compressed,
    })
}

/// Decompresses `input`, which was produced by `codec`, expecting exactly
/// `u_len` bytes of plaintext back.
pub fn decompress(input: &[u8], codec: CodecKind, u_len: usize) -> Result<Vec<u8>> {
    let data = match codec {
        CodecKind::None => input.to_vec(),
        CodecKind::Bzip2 => backend::bzip2_decompress(input)?,
        CodecKind::Gzip => backend::gzip_decompress(input)?,
        CodecKind::Lzma => backend::lzma_decompress(input, u_len)?,
        CodecKind::Lzo => backend::lzo_decompress(input, u_len)?,
        CodecKind::Zpaq => backend::zpaq_decompress(input)?,
    };
    if data.len() != u_len {
        return Err(CoreError::Format(format!(
            "decompressed length {} does not match advertised u_len {u_len}",
            data.len()
        )));
    }
    Ok(data)
}
