//! Benchmarks for the telemetry storage engine
//!
//! Run with: cargo bench

use chrono::{DateTime, Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::collections::BTreeMap;
use telemetry_hub::ingest::SignalBatch;
use telemetry_hub::storage::*;
use tempfile::tempdir;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn create_batch_points(signals: usize, at: DateTime<Utc>) -> Vec<TelemetryPoint> {
    (0..signals)
        .map(|i| TelemetryPoint::new(format!("signal_{}", i), i as f64 * 0.5, at, at))
        .collect()
}

fn bench_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("validation");

    for size in [1, 10, 100] {
        let signals: BTreeMap<String, f64> =
            (0..size).map(|i| (format!("signal_{}", i), i as f64)).collect();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(format!("batch_{}", size), |b| {
            b.iter(|| SignalBatch::new(black_box(base_time()), black_box(signals.clone())).unwrap())
        });
    }

    group.finish();
}

fn bench_engine(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("engine");

    for signals in [1, 10] {
        group.throughput(Throughput::Elements(signals as u64));
        group.bench_function(format!("append_batch_{}", signals), |b| {
            b.iter_custom(|iters| {
                rt.block_on(async {
                    let dir = tempdir().unwrap();
                    let mut config = StorageConfig::new(dir.path());
                    config.sync_mode = SyncMode::Normal;
                    let engine = StorageEngine::new(config).await.unwrap();

                    let start = std::time::Instant::now();

                    for i in 0..iters {
                        let at = base_time() + Duration::milliseconds(i as i64);
                        engine
                            .append(black_box(create_batch_points(signals, at)))
                            .await
                            .unwrap();
                    }

                    start.elapsed()
                })
            });
        });
    }

    group.bench_function("query_last_hour", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let dir = tempdir().unwrap();
                let mut config = StorageConfig::new(dir.path());
                config.sync_mode = SyncMode::Normal;
                let engine = StorageEngine::new(config).await.unwrap();

                // Setup: a day of 1 Hz samples for 4 signals, in one transaction
                let points: Vec<TelemetryPoint> = (0..86_400i64)
                    .flat_map(|i| create_batch_points(4, base_time() + Duration::seconds(i)))
                    .collect();
                engine.append(points).await.unwrap();

                let until = base_time() + Duration::days(1);
                let range = TimeRange::lookback(until, Duration::hours(1));

                let start = std::time::Instant::now();

                for _ in 0..iters {
                    let _ = engine.query_range(None, black_box(range)).await.unwrap();
                }

                start.elapsed()
            })
        });
    });

    group.finish();
}

criterion_group!(benches, bench_validation, bench_engine);
criterion_main!(benches);
