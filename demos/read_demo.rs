//! Reads back a container written by `write_demo` and prints both streams.
//!
//! ```text
//! cargo run --example read_demo -- /tmp/demo.bst
//! ```

use braidstream::{CodecKind, Config, ContainerReader};
use std::env;
use std::fs::File;
use std::io::Write;

fn drain(reader: &mut ContainerReader, stream: usize) -> braidstream::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(stream, &mut buf)?;
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    Ok(out)
}

fn main() -> braidstream::Result<()> {
    tracing_subscriber::fmt::init();

    let path = env::args().nth(1).unwrap_or_else(|| "demo.bst".to_string());
    let file = File::open(&path)?;

    let config = Config::new(2, 4, 1 << 20, CodecKind::Bzip2);
    let mut reader = ContainerReader::open_in(file, config)?;

    let first = drain(&mut reader, 0)?;
    let second = drain(&mut reader, 1)?;
    reader.close_in()?;

    std::io::stdout().write_all(&first)?;
    std::io::stdout().write_all(&second)?;
    Ok(())
}
