//! Immutable container configuration (§9, "Global mutable `control`").
//!
//! The original source reads thread count, codec, level, and passphrase
//! hashes from a module-scope global. Here they are collected once into a
//! [`Config`], built before any worker is spawned, and shared read-only
//! across the ring via `Arc`.

use crate::codec::CodecKind;
use crate::crypto::MasterKey;

/// Wire format revision, for the §6 backward-compatibility mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatVersion {
    pub major: u32,
    pub minor: u32,
}

impl FormatVersion {
    pub const CURRENT: FormatVersion = FormatVersion { major: 0, minor: 8 };

    /// `true` when chunk headers must be read/written in the pre-0.4,
    /// 13-byte (4-byte fields) layout.
    pub fn legacy_header(&self) -> bool {
        self.major == 0 && self.minor < 4
    }
}

impl Default for FormatVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

/// Encryption parameters, only present when the caller wants chunks
/// encrypted. Constructed once via [`Config::with_encryption`], which runs
/// the key schedule (§4.3 `lrz_keygen`) immediately so per-chunk work never
/// touches the passphrase again.
#[derive(Clone)]
pub struct EncryptionConfig {
    pub(crate) master: MasterKey,
}

/// Read-only knobs shared by every worker thread in a container.
///
/// Construct with [`Config::new`], then optionally attach encryption with
/// [`Config::with_encryption`]. Once built, a `Config` never changes; it is
/// wrapped in an `Arc` by [`crate::container::ContainerWriter::open_out`] and
/// [`crate::container::ContainerReader::open_in`].
#[derive(Clone)]
pub struct Config {
    /// Number of logical streams multiplexed into the container (`N`).
    pub num_streams: usize,
    /// Ring width: number of concurrent compression/decompression workers (`T`).
    pub threads: usize,
    /// Upper bound passed to the §4.7 `bufsize` sizing probe.
    pub bufsize_limit: u64,
    /// Back-end codec selected for new chunks.
    pub codec: CodecKind,
    /// Compression level on codec's native 1-9 scale (rescaled internally
    /// for codecs with a narrower axis, e.g. LZMA).
    pub level: u32,
    /// LZO probe threshold (§4.2.1). Values `> 1.0` short-circuit the probe
    /// to "always compressible".
    pub lzo_threshold: f32,
    pub format_version: FormatVersion,
    pub(crate) encryption: Option<EncryptionConfig>,
}

impl Config {
    pub fn new(num_streams: usize, threads: usize, bufsize_limit: u64, codec: CodecKind) -> Self {
        Config {
            num_streams,
            threads: threads.max(1),
            bufsize_limit,
            codec,
            level: 6,
            lzo_threshold: 0.97,
            format_version: FormatVersion::CURRENT,
            encryption: None,
        }
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level.clamp(1, 9);
        self
    }

    pub fn with_format_version(mut self, version: FormatVersion) -> Self {
        self.format_version = version;
        self
    }

    /// Runs the key schedule (`lrz_keygen`) once and attaches the resulting
    /// rolling hash, enabling per-chunk AES-128-CBC+CTS encryption.
    pub fn with_encryption(mut self, passphrase: &[u8], encloops: u32) -> Self {
        let master = MasterKey::derive(passphrase, encloops);
        self.encryption = Some(EncryptionConfig { master });
        self
    }

    pub fn encryption_enabled(&self) -> bool {
        self.encryption.is_some()
    }

    pub(crate) fn master_key(&self) -> Option<&MasterKey> {
        self.encryption.as_ref().map(|e| &e.master)
    }
}
