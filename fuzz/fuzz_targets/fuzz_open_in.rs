#![no_main]

use braidstream::{CodecKind, Config, ContainerReader};
use libfuzzer_sys::fuzz_target;
use std::io::Write;

// Arbitrary bytes as a container's on-disk bytes: opening, validating the
// initial headers, and draining whatever streams result must never panic,
// regardless of how malformed the input is.
fuzz_target!(|data: &[u8]| {
    if data.is_empty() || data.len() > 1_000_000 {
        return;
    }

    let mut file = match tempfile::tempfile() {
        Ok(f) => f,
        Err(_) => return,
    };
    if file.write_all(data).is_err() {
        return;
    }
    if std::io::Seek::seek(&mut file, std::io::SeekFrom::Start(0)).is_err() {
        return;
    }

    let config = Config::new(2, 2, 1 << 16, CodecKind::Gzip);
    let mut reader = match ContainerReader::open_in(file, config) {
        Ok(r) => r,
        Err(_) => return,
    };

    let mut buf = [0u8; 4096];
    for stream in 0..2 {
        loop {
            match reader.read(stream, &mut buf) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(_) => break,
            }
        }
    }
    let _ = reader.close_in();
});
