//! Legacy (pre-0.4) header layout stays readable end to end.

use braidstream::{CodecKind, Config, ContainerReader, ContainerWriter, FormatVersion};
use std::io::{Seek, SeekFrom};

#[test]
fn legacy_header_container_round_trips() {
    let legacy = FormatVersion { major: 0, minor: 2 };
    assert!(legacy.legacy_header());

    let config = Config::new(1, 2, 1 << 14, CodecKind::Gzip).with_format_version(legacy);
    let file = tempfile::tempfile().unwrap();
    let mut writer = ContainerWriter::open_out(file.try_clone().unwrap(), config.clone()).unwrap();

    let payload = b"legacy thirteen-byte headers still chain correctly".repeat(30);
    writer.write(0, &payload).unwrap();
    writer.close_out().unwrap();

    let mut file = file;
    file.seek(SeekFrom::Start(0)).unwrap();
    let mut reader = ContainerReader::open_in(file, config).unwrap();

    let mut out = Vec::new();
    let mut buf = [0u8; 2048];
    loop {
        let n = reader.read(0, &mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    reader.close_in().unwrap();

    assert_eq!(out, payload);
}

#[test]
fn current_format_version_is_not_legacy() {
    assert!(!FormatVersion::CURRENT.legacy_header());
}

/// §8.8: a fixture recorded with the pre-0.4 (13-byte header) layout must
/// fail as `FormatError` when read with the modern (25-byte) header width;
/// the byte layouts don't line up, so the modern reader's initial-header
/// zero check trips on the misread fields.
#[test]
fn legacy_fixture_is_rejected_under_the_modern_header_width() {
    let legacy = FormatVersion { major: 0, minor: 2 };
    let write_config = Config::new(1, 1, 1 << 14, CodecKind::Gzip).with_format_version(legacy);
    let file = tempfile::tempfile().unwrap();
    let mut writer = ContainerWriter::open_out(file.try_clone().unwrap(), write_config).unwrap();

    let payload = b"legacy thirteen-byte headers still chain correctly".repeat(30);
    writer.write(0, &payload).unwrap();
    writer.close_out().unwrap();

    let mut file = file;
    file.seek(SeekFrom::Start(0)).unwrap();
    let modern_config = Config::new(1, 1, 1 << 14, CodecKind::Gzip).with_format_version(FormatVersion::CURRENT);
    let err = ContainerReader::open_in(file, modern_config).unwrap_err();
    assert!(err.to_string().to_lowercase().contains("zero"));
}
