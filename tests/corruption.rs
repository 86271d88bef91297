//! Malformed containers and early termination must not panic, abort, or
//! hang: §7's `FormatError` path and §4.7's "no obligation to drain"
//! contract, respectively.

use braidstream::{CodecKind, Config, ContainerReader, ContainerWriter};
use std::io::{Seek, SeekFrom, Write};

#[test]
fn chunk_claiming_more_bytes_than_the_file_has_is_a_format_error() {
    let mut file = tempfile::tempfile().unwrap();
    let config = Config::new(1, 1, 1 << 16, CodecKind::None);
    let writer = ContainerWriter::open_out(file.try_clone().unwrap(), config.clone()).unwrap();
    writer.close_out().unwrap();

    // Append a hand-crafted chunk header claiming a payload far larger than
    // anything actually written after it, and back-patch the initial
    // header's `next_off` to point at it.
    let header_pos = file.stream_position().unwrap();
    let mut header = vec![0u8; 25];
    header[0] = CodecKind::None.tag() as u8;
    header[1..9].copy_from_slice(&(1u64 << 40).to_ne_bytes()); // c_len: absurd
    header[9..17].copy_from_slice(&4u64.to_ne_bytes()); // u_len
    header[17..25].copy_from_slice(&0u64.to_ne_bytes()); // next_off
    file.write_all(&header).unwrap();
    file.write_all(b"abcd").unwrap();

    file.seek(SeekFrom::Start(17)).unwrap();
    file.write_all(&header_pos.to_ne_bytes()).unwrap();

    file.seek(SeekFrom::Start(0)).unwrap();
    let mut reader = ContainerReader::open_in(file, config).unwrap();
    let mut buf = [0u8; 16];
    let err = reader.read(0, &mut buf).unwrap_err();
    assert!(err.to_string().contains("c_len"));
}

#[test]
fn stopping_before_end_of_stream_then_closing_does_not_hang() {
    let mut file = tempfile::tempfile().unwrap();
    let config = Config::new(1, 4, 1 << 12, CodecKind::Gzip);
    let mut writer = ContainerWriter::open_out(file.try_clone().unwrap(), config.clone()).unwrap();

    for i in 0..50u8 {
        writer.write(0, &vec![i; 4096]).unwrap();
    }
    writer.close_out().unwrap();

    file.seek(SeekFrom::Start(0)).unwrap();
    let mut reader = ContainerReader::open_in(file, config).unwrap();

    // Read only the first chunk's worth, leaving several prefetched workers
    // outstanding in the ring, then close without draining the rest.
    let mut buf = [0u8; 4096];
    reader.read(0, &mut buf).unwrap();
    reader.close_in().unwrap();
}
