//! Threaded multi-stream compression container.
//!
//! A container multiplexes `N` independent byte streams into one file. Each
//! stream is an append-only chain of chunks; writes are sharded across a
//! `T`-wide ring of OS threads so compression (and, if configured, AES-128
//! encryption) for every chunk happens in parallel, while the on-disk chunk
//! order always matches submission order. Reads mirror this with a
//! prefetching ring of decompression workers.
//!
//! ```no_run
//! use braidstream::{CodecKind, Config, ContainerWriter};
//! use std::fs::File;
//!
//! # fn main() -> braidstream::Result<()> {
//! let file = File::create("out.bst")?;
//! let config = Config::new(4, 4, 1 << 20, CodecKind::Bzip2);
//! let mut writer = ContainerWriter::open_out(file, config)?;
//! writer.write(0, b"hello")?;
//! writer.close_out()?;
//! # Ok(())
//! # }
//! ```

mod codec;
mod config;
mod container;
mod crypto;
mod error;
mod format;
mod io_util;
mod poison;
mod read_ring;
mod stream;
mod sync;
mod write_ring;

pub use codec::CodecKind;
pub use config::{Config, EncryptionConfig, FormatVersion};
pub use container::{ContainerReader, ContainerWriter};
pub use error::{CoreError, Result};
