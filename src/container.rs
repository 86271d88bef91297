//! Public stream API (C7, §4.7): `open_out`/`open_in`/`write`/`read`/
//! `close_out`/`close_in`, layered over the two worker rings.

use crate::codec::{CodecKind, STREAM_BUFSIZE};
use crate::config::Config;
use crate::error::{CoreError, Result};
use crate::format::{self, ChunkHeader};
use crate::poison::Poison;
use crate::read_ring::ReadRing;
use crate::stream::Stream;
use crate::write_ring::WriteRing;

use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::sync::Arc;
use tracing::{info, warn};

/// A container open for writing (`open_out`).
pub struct ContainerWriter {
    poison: Arc<Poison>,
    ring: WriteRing,
    streams: Vec<Stream>,
}

impl ContainerWriter {
    /// `open_out(fd, N, limit)`: probes a chunk size, writes `N` zeroed
    /// initial headers, and returns a handle ready for `write`.
    pub fn open_out(mut file: File, config: Config) -> Result<Self> {
        let config = Arc::new(config);
        let poison = Arc::new(Poison::new());
        let legacy = config.format_version.legacy_header();
        let bufsize = probe_bufsize(&config)?;

        let initial_pos = file.stream_position()?;
        let mut cur_pos = initial_pos;
        let mut last_head = Vec::with_capacity(config.num_streams);
        for _ in 0..config.num_streams {
            file.seek(SeekFrom::Start(cur_pos))?;
            let header = ChunkHeader::initial();
            let field_offset = format::write_header(&mut file, &header, legacy)?;
            last_head.push(field_offset);
            cur_pos += ChunkHeader::encoded_len(legacy);
        }

        let streams = last_head
            .iter()
            .map(|&field_offset| Stream::new_write(bufsize, field_offset))
            .collect();

        let ring = WriteRing::new(file, cur_pos, last_head, Arc::clone(&config), Arc::clone(&poison));

        info!(streams = config.num_streams, bufsize, "container opened for writing");
        Ok(ContainerWriter { poison, ring, streams })
    }

    /// `write(handle, stream, bytes, len)`: copy-append into the per-stream
    /// buffer, flushing full buffers to the ring as capacity is reached.
    pub fn write(&mut self, stream: usize, mut bytes: &[u8]) -> Result<()> {
        self.poison.check()?;
        let s = self
            .streams
            .get_mut(stream)
            .ok_or_else(|| CoreError::Format(format!("no such stream {stream}")))?;

        while !bytes.is_empty() {
            let capacity = s.buf.capacity();
            let room = capacity - s.buflen;
            let take = room.min(bytes.len());
            s.buf.resize(s.buflen + take, 0);
            s.buf[s.buflen..s.buflen + take].copy_from_slice(&bytes[..take]);
            s.buflen += take;
            bytes = &bytes[take..];

            if s.buflen == capacity {
                self.ring.flush_buffer(stream, s)?;
            }
        }
        Ok(())
    }

    /// `close_out(handle)`: flush all streams, join every worker, free.
    pub fn close_out(mut self) -> Result<()> {
        for i in 0..self.streams.len() {
            let s = &mut self.streams[i];
            if s.buflen > 0 {
                self.ring.flush_buffer(i, s)?;
            }
        }
        self.ring.close()?;
        self.poison.check()
    }
}

/// A container open for reading (`open_in`).
pub struct ContainerReader {
    poison: Arc<Poison>,
    ring: ReadRing,
    streams: Vec<Stream>,
    file: File,
    initial_pos: u64,
    total_read: u64,
}

impl ContainerReader {
    /// `open_in(fd, N)`: reads and validates the `N` initial headers,
    /// applying the §4.4 zeroed-header recovery nuance if needed.
    pub fn open_in(mut file: File, config: Config) -> Result<Self> {
        let config = Arc::new(config);
        let poison = Arc::new(Poison::new());
        let legacy = config.format_version.legacy_header();
        let n = config.num_streams;

        let raw_start = file.stream_position()?;
        let mut start = raw_start;
        let mut headers = read_initial_headers(&mut file, start, n, legacy)?;

        if n > 0 && headers[0].is_all_zero() {
            warn!("first initial header is entirely zero, retrying once past it");
            start += ChunkHeader::encoded_len(legacy);
            headers = read_initial_headers(&mut file, start, n, legacy)?;
        }

        for header in &headers {
            if header.c_type != CodecKind::None.tag() || header.c_len != 0 || header.u_len != 0 {
                return Err(CoreError::Format(
                    "initial header's c_type/c_len/u_len were not zeroed".into(),
                ));
            }
        }

        let streams = headers
            .iter()
            .enumerate()
            .map(|(i, h)| Stream::new_read(i, config.threads, h.next_off))
            .collect();

        let ring = ReadRing::new(n, Arc::clone(&config), Arc::clone(&poison));

        info!(streams = n, "container opened for reading");
        Ok(ContainerReader {
            config,
            poison,
            ring,
            streams,
            file,
            initial_pos: start,
            total_read: 0,
        })
    }

    /// `read(handle, stream, out, len) -> n_read`: drains the decompressed
    /// buffer, prefetching and awaiting workers as needed. Returns a short
    /// (possibly zero) count at end-of-stream.
    pub fn read(&mut self, stream: usize, out: &mut [u8]) -> Result<usize> {
        self.poison.check()?;
        if out.is_empty() {
            return Ok(0);
        }

        {
            let s = self
                .streams
                .get(stream)
                .ok_or_else(|| CoreError::Format(format!("no such stream {stream}")))?;
            if s.remaining() == 0 {
                let more = self.ring.fill_buffer(&mut self.file, stream, &mut self.streams[stream])?;
                let pos = self.file.stream_position()?.saturating_sub(self.initial_pos);
                self.total_read = self.total_read.max(pos);
                if !more {
                    return Ok(0);
                }
            }
        }

        let s = &mut self.streams[stream];
        let n = out.len().min(s.remaining());
        out[..n].copy_from_slice(&s.buf[s.bufp..s.bufp + n]);
        s.bufp += n;
        Ok(n)
    }

    /// `close_in(handle)`: seeks the file past all consumed container
    /// bytes so the caller may keep reading anything that follows, joins
    /// workers, frees.
    pub fn close_in(mut self) -> Result<File> {
        self.ring.close()?;
        self.poison.check()?;
        self.file.seek(SeekFrom::Start(self.initial_pos + self.total_read))?;
        Ok(self.file)
    }
}

fn read_initial_headers(file: &mut File, start: u64, n: usize, legacy: bool) -> Result<Vec<ChunkHeader>> {
    let mut headers = Vec::with_capacity(n);
    for i in 0..n {
        let offset = start + i as u64 * ChunkHeader::encoded_len(legacy);
        headers.push(format::read_header_at(file, offset, legacy)?);
    }
    Ok(headers)
}

/// `bufsize` sizing probe (§4.7): tries to reserve `limit * (N+1)` bytes
/// (`limit * N * 3` on 32-bit hosts), backing off by ~10% each time it
/// can't, down to a floor of `STREAM_BUFSIZE`. `Vec::try_reserve_exact`
/// gives us a safe malloc-probe in place of the original's catch-and-shrink
/// loop.
fn probe_bufsize(config: &Config) -> Result<usize> {
    let n = config.num_streams as u64;
    let floor = STREAM_BUFSIZE as u64;
    let mut limit = config.bufsize_limit.max(floor);

    loop {
        let target = total_probe_target(limit, n);
        let fits = target <= usize::MAX as u64 && {
            let mut probe: Vec<u8> = Vec::new();
            probe.try_reserve_exact(target as usize).is_ok()
        };

        if fits {
            let mut bufsize = limit;
            if let Some(ceiling) = lzma_32bit_ceiling(config.codec) {
                bufsize = bufsize.min(ceiling);
            }
            return Ok(bufsize.max(floor) as usize);
        }

        if limit <= floor {
            return Err(CoreError::Resource(format!(
                "open-time sizing probe could not satisfy even the {floor}-byte floor"
            )));
        }
        limit = ((limit as f64) * 0.9) as u64;
        limit = limit.max(floor);
    }
}

#[cfg(target_pointer_width = "32")]
fn total_probe_target(limit: u64, n: u64) -> u64 {
    limit.saturating_mul(n * 3)
}

#[cfg(not(target_pointer_width = "32"))]
fn total_probe_target(limit: u64, n: u64) -> u64 {
    limit.saturating_mul(n + 1)
}

#[cfg(target_pointer_width = "32")]
fn lzma_32bit_ceiling(codec: CodecKind) -> Option<u64> {
    matches!(codec, CodecKind::Lzma).then(|| STREAM_BUFSIZE as u64 * 3 * 10)
}

#[cfg(not(target_pointer_width = "32"))]
fn lzma_32bit_ceiling(_codec: CodecKind) -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn tmp_file() -> File {
        tempfile::tempfile().unwrap()
    }

    #[test]
    fn open_out_writes_n_zeroed_initial_headers() {
        let file = tmp_file();
        let config = Config::new(3, 2, 1 << 16, CodecKind::Gzip);
        let writer = ContainerWriter::open_out(file, config).unwrap();
        assert_eq!(writer.streams.len(), 3);
        writer.close_out().unwrap();
    }

    #[test]
    fn single_chunk_round_trip() {
        let mut file = tmp_file();
        let config = Config::new(1, 2, 1 << 16, CodecKind::Gzip);
        let mut writer = ContainerWriter::open_out(file.try_clone().unwrap(), config.clone()).unwrap();

        let payload = b"hello, braided world".repeat(100);
        writer.write(0, &payload).unwrap();
        writer.close_out().unwrap();

        file.seek(SeekFrom::Start(0)).unwrap();
        let mut reader = ContainerReader::open_in(file, config).unwrap();
        let mut out = vec![0u8; payload.len()];
        let mut read_total = 0;
        loop {
            let n = reader.read(0, &mut out[read_total..]).unwrap();
            if n == 0 {
                break;
            }
            read_total += n;
        }
        assert_eq!(read_total, payload.len());
        assert_eq!(out, payload);
    }

    #[test]
    fn empty_stream_reads_zero_immediately() {
        let mut file = tmp_file();
        let config = Config::new(1, 1, 1 << 16, CodecKind::None);
        let writer = ContainerWriter::open_out(file.try_clone().unwrap(), config.clone()).unwrap();
        writer.close_out().unwrap();

        file.seek(SeekFrom::Start(0)).unwrap();
        let mut reader = ContainerReader::open_in(file, config).unwrap();
        let mut out = [0u8; 16];
        assert_eq!(reader.read(0, &mut out).unwrap(), 0);
    }

    #[test]
    fn unknown_stream_index_is_an_error() {
        let file = tmp_file();
        let config = Config::new(1, 1, 1 << 16, CodecKind::None);
        let mut writer = ContainerWriter::open_out(file, config).unwrap();
        assert!(writer.write(5, b"oops").is_err());
    }
}
