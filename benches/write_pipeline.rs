use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sealstore::cipher::Aes256GcmCipher;
use sealstore::{
    CompressionConfig, Container, DocumentSet, EncryptionConfig, Engine, EngineOptions, JsonCodec,
};
use serde_json::json;
use tempfile::TempDir;

fn document_set(documents: usize) -> DocumentSet {
    let mut docs = DocumentSet::new();
    for i in 0..documents {
        docs.insert(
            i.to_string(),
            json!({
                "name": format!("user-{}", i),
                "email": format!("user-{}@example.com", i),
                "tags": ["alpha", "beta", "gamma"],
                "score": i as f64 * 0.5,
            }),
        );
    }
    docs
}

/// Benchmark the record build/parse pipeline per configuration
fn bench_container_pipeline(c: &mut Criterion) {
    let sizes = vec![("100docs", 100), ("1Kdocs", 1_000), ("10Kdocs", 10_000)];
    let key = EncryptionConfig::generate_key();

    let configs: Vec<(&str, CompressionConfig, Option<[u8; 32]>)> = vec![
        ("plain", CompressionConfig::none(), None),
        ("lz4", CompressionConfig::lz4(), None),
        ("zstd3", CompressionConfig::zstd(3), None),
        ("lz4+aes", CompressionConfig::lz4(), Some(key)),
    ];

    let mut group = c.benchmark_group("container_pipeline");

    for (size_name, count) in &sizes {
        let docs = document_set(*count);

        for (config_name, compression, key) in &configs {
            let container = Container::new(
                Box::new(JsonCodec),
                compression.clone(),
                key.map(Aes256GcmCipher::new),
            )
            .unwrap();
            let record = container.build_record(&docs).unwrap();
            group.throughput(Throughput::Bytes(record.len() as u64));

            group.bench_with_input(
                BenchmarkId::new(format!("build/{}", config_name), size_name),
                &docs,
                |b, docs| {
                    b.iter(|| black_box(container.build_record(docs).unwrap()));
                },
            );

            group.bench_with_input(
                BenchmarkId::new(format!("parse/{}", config_name), size_name),
                &record,
                |b, record| {
                    b.iter(|| black_box(container.parse_record(record).unwrap()));
                },
            );
        }
    }

    group.finish();
}

/// Benchmark engine read latency while the writer is busy
fn bench_engine_read(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let engine = Engine::open(
        dir.path().join("bench.seal"),
        EngineOptions::new(EncryptionConfig::disabled()).compression(CompressionConfig::zstd(9)),
    )
    .unwrap();

    for _ in 0..10 {
        engine.write(document_set(5_000)).unwrap();
    }

    c.bench_function("engine_read_under_write_load", |b| {
        b.iter(|| black_box(engine.read()));
    });
}

criterion_group!(benches, bench_container_pipeline, bench_engine_read);
criterion_main!(benches);
