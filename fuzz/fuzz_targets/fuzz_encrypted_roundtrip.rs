#![no_main]

use arbitrary::Arbitrary;
use braidstream::{CodecKind, Config, ContainerReader, ContainerWriter};
use libfuzzer_sys::fuzz_target;
use std::io::{Seek, SeekFrom};

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    passphrase: Vec<u8>,
    payload: Vec<u8>,
}

// Whatever passphrase and payload arbitrary hands us, an encrypted
// single-stream container must hand the exact payload back, this is the
// ciphertext-stealing path exercised end to end instead of unit-by-unit.
fuzz_target!(|input: FuzzInput| {
    if input.payload.len() > 1_000_000 {
        return;
    }

    let config = Config::new(1, 1, 1 << 16, CodecKind::None).with_encryption(&input.passphrase, 16);
    let file = match tempfile::tempfile() {
        Ok(f) => f,
        Err(_) => return,
    };

    let mut writer = match ContainerWriter::open_out(file.try_clone().unwrap(), config.clone()) {
        Ok(w) => w,
        Err(_) => return,
    };
    if writer.write(0, &input.payload).is_err() {
        return;
    }
    if writer.close_out().is_err() {
        return;
    }

    let mut file = file;
    if file.seek(SeekFrom::Start(0)).is_err() {
        return;
    }
    let mut reader = match ContainerReader::open_in(file, config) {
        Ok(r) => r,
        Err(_) => return,
    };

    let mut out = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(0, &mut buf) {
            Ok(0) => break,
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(_) => return,
        }
    }
    let _ = reader.close_in();

    assert_eq!(out, input.payload);
});
