use braidstream::{CodecKind, Config, ContainerReader, ContainerWriter};
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::io::{Seek, SeekFrom};

fn make_payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn bench_write_ring_width(c: &mut Criterion) {
    let payload = make_payload(4 << 20);
    let mut group = c.benchmark_group("write_ring_threads");
    group.throughput(Throughput::Bytes(payload.len() as u64));

    for threads in [1, 2, 4, 8] {
        group.bench_function(format!("t{threads}"), |b| {
            b.iter(|| {
                let file = tempfile::tempfile().unwrap();
                let config = Config::new(1, threads, 1 << 20, CodecKind::Gzip);
                let mut writer = ContainerWriter::open_out(file, config).unwrap();
                writer.write(0, &payload).unwrap();
                writer.close_out().unwrap();
            })
        });
    }
    group.finish();
}

fn bench_read_ring_width(c: &mut Criterion) {
    let payload = make_payload(4 << 20);
    let mut group = c.benchmark_group("read_ring_threads");
    group.throughput(Throughput::Bytes(payload.len() as u64));

    for threads in [1, 2, 4, 8] {
        let mut file = tempfile::tempfile().unwrap();
        let config = Config::new(1, threads, 1 << 20, CodecKind::Gzip);
        let mut writer = ContainerWriter::open_out(file.try_clone().unwrap(), config.clone()).unwrap();
        writer.write(0, &payload).unwrap();
        writer.close_out().unwrap();

        group.bench_function(format!("t{threads}"), |b| {
            b.iter(|| {
                file.seek(SeekFrom::Start(0)).unwrap();
                let mut reader = ContainerReader::open_in(file.try_clone().unwrap(), config.clone()).unwrap();
                let mut buf = [0u8; 1 << 16];
                loop {
                    let n = reader.read(0, &mut buf).unwrap();
                    if n == 0 {
                        break;
                    }
                }
                reader.close_in().unwrap();
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_write_ring_width, bench_read_ring_width);
criterion_main!(benches);
