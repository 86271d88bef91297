//! Sized I/O (C1, §4.1).
//!
//! `write_exact`/`read_exact` move a requested byte count in slices of at
//! most [`MAX_TRANSFER`] to work around platform transfer-size limits, and
//! retry the remainder until satisfied or a short/zero result proves the
//! transfer can't complete.
//!
//! Integer helpers are isolated in this one module per §9: the on-disk
//! representation is host byte order today (a known portability limitation
//! of the format, preserved for compatibility), so a future little-endian
//! revision only has to change `write_u32`/`read_u32`/`write_i64`/`read_i64`,
//! not every call site.

use crate::error::{CoreError, Result};
use std::io::{Read, Seek, SeekFrom, Write};

/// Platform `read`/`write` calls are not guaranteed to transfer more than
/// this many bytes in one call; §4.1 mandates chunking at 1 GiB.
pub const MAX_TRANSFER: u64 = 1 << 30;

pub fn write_exact<W: Write>(w: &mut W, mut buf: &[u8]) -> Result<()> {
    let total = buf.len() as u64;
    let mut moved: u64 = 0;
    while !buf.is_empty() {
        let slice_len = buf.len().min(MAX_TRANSFER as usize);
        match w.write(&buf[..slice_len]) {
            Ok(0) => {
                return Err(CoreError::ShortTransfer {
                    expected: total,
                    moved,
                })
            }
            Ok(n) => {
                moved += n as u64;
                buf = &buf[n..];
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CoreError::Io(e)),
        }
    }
    Ok(())
}

pub fn read_exact<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<()> {
    let total = buf.len() as u64;
    let mut moved: u64 = 0;
    let mut rest = buf;
    while !rest.is_empty() {
        let slice_len = rest.len().min(MAX_TRANSFER as usize);
        match r.read(&mut rest[..slice_len]) {
            Ok(0) => {
                return Err(CoreError::ShortTransfer {
                    expected: total,
                    moved,
                })
            }
            Ok(n) => {
                moved += n as u64;
                let tmp = rest;
                rest = &mut tmp[n..];
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CoreError::Io(e)),
        }
    }
    Ok(())
}

/// Seeks to an absolute offset and writes the buffer, used for header
/// back-patching where the write site is not the current cursor.
pub fn write_at<W: Write + Seek>(w: &mut W, offset: u64, buf: &[u8]) -> Result<()> {
    w.seek(SeekFrom::Start(offset))?;
    write_exact(w, buf)
}

pub fn read_at<R: Read + Seek>(r: &mut R, offset: u64, buf: &mut [u8]) -> Result<()> {
    r.seek(SeekFrom::Start(offset))?;
    read_exact(r, buf)
}

// Deliberately `to_ne_bytes`/`from_ne_bytes`, not `le`: this is the known
// host-endian defect the format carries forward for compatibility. A future
// little-endian-by-default revision only needs to change this module.
pub fn write_u32(buf: &mut [u8], v: u32) {
    buf.copy_from_slice(&v.to_ne_bytes());
}
pub fn read_u32(buf: &[u8]) -> u32 {
    u32::from_ne_bytes(buf.try_into().unwrap())
}
pub fn write_i64(buf: &mut [u8], v: i64) {
    buf.copy_from_slice(&v.to_ne_bytes());
}
pub fn read_i64(buf: &[u8]) -> i64 {
    i64::from_ne_bytes(buf.try_into().unwrap())
}

pub fn write_u8(buf: &mut [u8], v: u8) {
    buf[0] = v;
}

pub fn read_u8(buf: &[u8]) -> u8 {
    buf[0]
}
