//! Stream container format (C4, §4.4).
//!
//! Each logical stream is an append-only singly-linked list of chunks; a
//! chunk is a fixed-width header followed by its (possibly compressed,
//! possibly encrypted) payload. The header's `next_off` field is 0 until a
//! successor chunk is written, at which point the writer seeks back and
//! patches it; this back-patch is what lets `T` workers compress chunks out
//! of order while the on-disk chain stays in submission order.

use crate::codec::CodecKind;
use crate::error::{CoreError, Result};
use crate::io_util::{self, read_at, write_at};
use std::io::{Read, Seek, Write};

/// Modern on-disk header width: `c_type(1) + c_len(8) + u_len(8) + next_off(8)`.
pub const HEADER_LEN: u64 = 25;
/// Pre-0.4 on-disk header width, with the three 8-byte fields narrowed to 4.
pub const LEGACY_HEADER_LEN: u64 = 13;

/// Offset of `next_off` within a modern header (1 + 8 + 8).
const NEXT_OFF_OFFSET: u64 = 17;
/// Offset of `next_off` within a legacy header (1 + 4 + 4).
const LEGACY_NEXT_OFF_OFFSET: u64 = 9;

/// A single chunk's header: codec tag, lengths, and the link to the next
/// chunk in this stream's chain (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub c_type: u8,
    pub c_len: u64,
    pub u_len: u64,
    pub next_off: u64,
}

impl ChunkHeader {
    /// The all-zero initial header every stream starts with (§4.4, §6).
    pub fn initial() -> Self {
        ChunkHeader {
            c_type: CodecKind::None.tag(),
            c_len: 0,
            u_len: 0,
            next_off: 0,
        }
    }

    pub fn is_all_zero(&self) -> bool {
        self.c_type == 0 && self.c_len == 0 && self.u_len == 0 && self.next_off == 0
    }

    /// Header width on disk for this format version.
    pub fn encoded_len(legacy: bool) -> u64 {
        if legacy {
            LEGACY_HEADER_LEN
        } else {
            HEADER_LEN
        }
    }

    /// Offset of the `next_off` field relative to the header's own start
    /// (§ glossary: `last_head`). `cur_pos + this` is where a successor
    /// chunk's writer back-patches.
    pub fn next_off_field_offset(legacy: bool) -> u64 {
        if legacy {
            LEGACY_NEXT_OFF_OFFSET
        } else {
            NEXT_OFF_OFFSET
        }
    }

    fn encode(&self, legacy: bool) -> Vec<u8> {
        let mut buf = vec![0u8; Self::encoded_len(legacy) as usize];
        io_util::write_u8(&mut buf[0..1], self.c_type);
        if legacy {
            io_util::write_u32(&mut buf[1..5], self.c_len as u32);
            io_util::write_u32(&mut buf[5..9], self.u_len as u32);
            io_util::write_u32(&mut buf[9..13], self.next_off as u32);
        } else {
            io_util::write_i64(&mut buf[1..9], self.c_len as i64);
            io_util::write_i64(&mut buf[9..17], self.u_len as i64);
            io_util::write_i64(&mut buf[17..25], self.next_off as i64);
        }
        buf
    }

    fn decode(buf: &[u8], legacy: bool) -> Self {
        let c_type = io_util::read_u8(&buf[0..1]);
        if legacy {
            ChunkHeader {
                c_type,
                c_len: io_util::read_u32(&buf[1..5]) as u64,
                u_len: io_util::read_u32(&buf[5..9]) as u64,
                next_off: io_util::read_u32(&buf[9..13]) as u64,
            }
        } else {
            ChunkHeader {
                c_type,
                c_len: io_util::read_i64(&buf[1..9]) as u64,
                u_len: io_util::read_i64(&buf[9..17]) as u64,
                next_off: io_util::read_i64(&buf[17..25]) as u64,
            }
        }
    }
}

/// Writes `header` at the current cursor position, returning the absolute
/// offset its own `next_off` field now occupies, the value a later call to
/// [`patch_next_off`] needs to rewrite it (§4.4 step 4-5).
pub fn write_header<W: Write + Seek>(w: &mut W, header: &ChunkHeader, legacy: bool) -> Result<u64> {
    let cur_pos = w.stream_position()?;
    let buf = header.encode(legacy);
    io_util::write_exact(w, &buf)?;
    Ok(cur_pos + ChunkHeader::next_off_field_offset(legacy))
}

/// Reads a header from the current cursor position, advancing past it.
pub fn read_header<R: Read + Seek>(r: &mut R, legacy: bool) -> Result<ChunkHeader> {
    let mut buf = vec![0u8; ChunkHeader::encoded_len(legacy) as usize];
    io_util::read_exact(r, &mut buf)?;
    let header = ChunkHeader::decode(&buf, legacy);
    header.c_type_checked()?;
    Ok(header)
}

impl ChunkHeader {
    fn c_type_checked(&self) -> Result<()> {
        CodecKind::from_tag(self.c_type).map(|_| ())
    }
}

/// Reads a header at an arbitrary absolute offset without disturbing the
/// caller's notion of "current position" for anything else sharing the
/// handle.
pub fn read_header_at<H: Read + Seek>(h: &mut H, offset: u64, legacy: bool) -> Result<ChunkHeader> {
    let len = ChunkHeader::encoded_len(legacy) as usize;
    let mut buf = vec![0u8; len];
    read_at(h, offset, &mut buf)?;
    let header = ChunkHeader::decode(&buf, legacy);
    header.c_type_checked()?;
    Ok(header)
}

/// Back-patches a predecessor chunk's `next_off` field to point at
/// `next_off` (§4.4: "seeking backward to the predecessor, writing 8 bytes,
/// then seeking forward to append"). `field_offset` is the absolute file
/// offset returned by [`write_header`] for that predecessor.
pub fn patch_next_off<H: Write + Seek>(h: &mut H, field_offset: u64, next_off: u64, legacy: bool) -> Result<()> {
    let mut buf = vec![0u8; if legacy { 4 } else { 8 }];
    if legacy {
        io_util::write_u32(&mut buf, next_off as u32);
    } else {
        io_util::write_i64(&mut buf, next_off as i64);
    }
    write_at(h, field_offset, &buf)
}

/// Validates a chunk's decompressed length against its header's `u_len`
/// (§4.4 `FormatError` condition: "a chunk's advertised length mismatched
/// the decompressed length").
pub fn check_u_len(expected: u64, actual: usize) -> Result<()> {
    if actual as u64 != expected {
        return Err(CoreError::Format(format!(
            "chunk advertised u_len {expected} but decompressed to {actual} bytes"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn modern_header_round_trips() {
        let header = ChunkHeader {
            c_type: CodecKind::Bzip2.tag(),
            c_len: 12345,
            u_len: 65536,
            next_off: 999_888_777,
        };
        let mut buf = Cursor::new(Vec::new());
        let field_offset = write_header(&mut buf, &header, false).unwrap();
        assert_eq!(field_offset, NEXT_OFF_OFFSET);

        buf.set_position(0);
        let decoded = read_header(&mut buf, false).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn legacy_header_round_trips() {
        let header = ChunkHeader {
            c_type: CodecKind::Lzo.tag(),
            c_len: 4096,
            u_len: 8192,
            next_off: 0,
        };
        let mut buf = Cursor::new(Vec::new());
        let field_offset = write_header(&mut buf, &header, true).unwrap();
        assert_eq!(field_offset, LEGACY_NEXT_OFF_OFFSET);

        buf.set_position(0);
        let decoded = read_header(&mut buf, true).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn initial_header_is_all_zero_with_none_tag() {
        let header = ChunkHeader::initial();
        assert!(header.is_all_zero());
        assert_eq!(header.c_type, CodecKind::None.tag());
    }

    #[test]
    fn patch_next_off_rewrites_only_that_field() {
        let mut buf = Cursor::new(vec![0u8; 64]);
        let header = ChunkHeader::initial();
        let field_offset = write_header(&mut buf, &header, false).unwrap();
        assert_eq!(field_offset, NEXT_OFF_OFFSET);

        patch_next_off(&mut buf, field_offset, 4096, false).unwrap();

        buf.set_position(0);
        let patched = read_header(&mut buf, false).unwrap();
        assert_eq!(patched.next_off, 4096);
        assert_eq!(patched.c_type, header.c_type);
        assert_eq!(patched.c_len, header.c_len);
        assert_eq!(patched.u_len, header.u_len);
    }

    #[test]
    fn rejects_unknown_codec_tag() {
        let mut buf = Cursor::new(vec![0u8; HEADER_LEN as usize]);
        buf.get_mut()[0] = 200;
        buf.set_position(0);
        assert!(read_header(&mut buf, false).is_err());
    }
}
