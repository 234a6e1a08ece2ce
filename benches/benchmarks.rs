//! Criterion benchmarks for tsfile core operations.
//!
//! Benchmarks cover:
//! - Checksum append/verify (CRC-32C)
//! - `PagedFD` write/read throughput across multi-page payloads
//! - Compression round-trip (zlib, LZ4, none)
//! - A full file-set commit + block read (`FileSetWriter` / `FileSetReader`)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::tempdir;

use tsfile::checksum;
use tsfile::compress::CompressionAlgorithm;
use tsfile::paged::{OpenFlags, PagedFD};
use tsfile::types::SFileSet;
use tsfile::writer::{BlockWrite, ColumnInput, FileSetWriter, WriterConfig};

const PAGE_SIZE: u32 = 4096;

fn int_column(cid: u32, values: &[i64]) -> ColumnInput {
    ColumnInput {
        cid,
        sma_on: true,
        var_length: false,
        all_null: false,
        bitmap: vec![0u8; values.len().div_ceil(8)],
        offsets: Vec::new(),
        values: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
    }
}

// ---------------------------------------------------------------------------
// Benchmark: checksum append/verify
// ---------------------------------------------------------------------------

fn bench_checksum(c: &mut Criterion) {
    let mut group = c.benchmark_group("checksum");

    let mut page = vec![0u8; PAGE_SIZE as usize];
    for (i, b) in page.iter_mut().enumerate() {
        *b = (i * 31) as u8;
    }
    group.throughput(Throughput::Bytes(PAGE_SIZE as u64));

    group.bench_function("append_page", |b| {
        b.iter(|| {
            let mut buf = page.clone();
            checksum::append(black_box(&mut buf), PAGE_SIZE as usize);
        });
    });

    checksum::append(&mut page, PAGE_SIZE as usize);
    group.bench_function("verify_page", |b| {
        b.iter(|| {
            black_box(checksum::verify(black_box(&page), PAGE_SIZE as usize));
        });
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: PagedFD write/read across a multi-page payload
// ---------------------------------------------------------------------------

fn bench_paged_write_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("paged_fd");

    for n_pages in [4u64, 64, 256] {
        let content_cap = (PAGE_SIZE as usize) - checksum::CHECKSUM_SIZE;
        let payload = vec![0xABu8; content_cap * n_pages as usize];
        group.throughput(Throughput::Bytes(payload.len() as u64));

        group.bench_with_input(
            BenchmarkId::new("write", format!("{n_pages}_pages")),
            &payload,
            |b, payload| {
                b.iter(|| {
                    let dir = tempdir().unwrap();
                    let path = dir.path().join("bench.paged");
                    let mut fd = PagedFD::open(
                        &path,
                        OpenFlags::READ | OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNC,
                        PAGE_SIZE,
                    )
                    .unwrap();
                    fd.write(black_box(payload)).unwrap();
                    fd.pad_and_flush().unwrap();
                    fd.fsync().unwrap();
                });
            },
        );

        let dir = tempdir().unwrap();
        let path = dir.path().join("bench.paged");
        {
            let mut fd = PagedFD::open(
                &path,
                OpenFlags::READ | OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNC,
                PAGE_SIZE,
            )
            .unwrap();
            fd.write(&payload).unwrap();
            fd.pad_and_flush().unwrap();
            fd.fsync().unwrap();
        }
        group.bench_with_input(
            BenchmarkId::new("read", format!("{n_pages}_pages")),
            &path,
            |b, path| {
                b.iter(|| {
                    let mut fd = PagedFD::open(path, OpenFlags::READ, PAGE_SIZE).unwrap();
                    let mut dst = vec![0u8; payload.len()];
                    black_box(fd.read(0, &mut dst).unwrap());
                });
            },
        );
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: compression round-trip
// ---------------------------------------------------------------------------

fn bench_compression(c: &mut Criterion) {
    let mut group = c.benchmark_group("compression");

    let data: Vec<u8> = (0..65536u32).flat_map(|v| (v % 251).to_le_bytes()).collect();
    group.throughput(Throughput::Bytes(data.len() as u64));

    for alg in [CompressionAlgorithm::None, CompressionAlgorithm::Zlib, CompressionAlgorithm::Lz4] {
        let label = format!("{alg:?}");
        group.bench_function(BenchmarkId::new("compress", &label), |b| {
            b.iter(|| {
                black_box(tsfile::compress::compress(alg, black_box(&data)).unwrap());
            });
        });

        let compressed = tsfile::compress::compress(alg, &data).unwrap();
        group.bench_function(BenchmarkId::new("decompress", &label), |b| {
            b.iter(|| {
                black_box(
                    tsfile::compress::decompress(alg, black_box(&compressed), data.len()).unwrap(),
                );
            });
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: full file-set commit (write_block_data + write_block_idx + update_header)
// ---------------------------------------------------------------------------

fn bench_file_set_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_set_commit");

    for n_row in [100u32, 1_000, 10_000] {
        let tskey: Vec<i64> = (0..n_row as i64).collect();
        let version = vec![1i64; n_row as usize];
        let ints: Vec<i64> = tskey.iter().map(|k| k * 7).collect();
        group.throughput(Throughput::Elements(n_row as u64));

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{n_row}_rows")),
            &n_row,
            |b, &n_row| {
                b.iter(|| {
                    let dir = tempdir().unwrap();
                    let set = SFileSet::new(1, 0, dir.path());
                    let mut writer = FileSetWriter::open(set, WriterConfig::default()).unwrap();
                    let block = BlockWrite {
                        suid: 1,
                        uid: 1,
                        n_row,
                        cmpr_alg: CompressionAlgorithm::Lz4,
                        uid_stream: None,
                        version: version.clone(),
                        tskey: tskey.clone(),
                        columns: vec![int_column(1, &ints)],
                        aux: Vec::new(),
                    };
                    let (info, _) = writer.write_block_data(black_box(&block), true, false).unwrap();
                    writer
                        .write_block_idx(&[tsfile::types::BlockIdx {
                            suid: 1,
                            uid: 1,
                            offset: info.offset,
                            size: info.sz_block as u64,
                        }])
                        .unwrap();
                    writer.update_header().unwrap();
                    black_box(writer.close(true).unwrap());
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_checksum,
    bench_paged_write_read,
    bench_compression,
    bench_file_set_commit,
);
criterion_main!(benches);
