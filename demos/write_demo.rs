//! Writes a small two-stream container to a file given on the command line.
//!
//! ```text
//! cargo run --example write_demo -- /tmp/demo.bst
//! ```

use braidstream::{CodecKind, Config, ContainerWriter};
use std::env;
use std::fs::File;

fn main() -> braidstream::Result<()> {
    tracing_subscriber::fmt::init();

    let path = env::args().nth(1).unwrap_or_else(|| "demo.bst".to_string());
    let file = File::create(&path)?;

    let config = Config::new(2, 4, 1 << 20, CodecKind::Bzip2);
    let mut writer = ContainerWriter::open_out(file, config)?;

    writer.write(0, b"first stream: ")?;
    writer.write(0, "the quick brown fox jumps over the lazy dog\n".repeat(200).as_bytes())?;

    writer.write(1, b"second stream: ")?;
    writer.write(1, "a braided container multiplexes independent streams\n".repeat(200).as_bytes())?;

    writer.close_out()?;
    println!("wrote container to {path}");
    Ok(())
}
