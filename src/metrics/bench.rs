use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// Reference the main crate
extern crate docbench;

use docbench::metrics::MetricsWindow;

// Test configuration
const RECORD_THREADS: usize = 8;
const OPERATIONS_PER_THREAD: usize = 10_000;

fn bench_record_single_thread(c: &mut Criterion) {
    c.bench_function("metrics_record_single", |b| {
        let window = MetricsWindow::new();
        let sample = Duration::from_micros(120);
        b.iter(|| {
            window.record(sample);
        });
    });
}

fn bench_record_contended(c: &mut Criterion) {
    c.bench_function("metrics_record_contended", |b| {
        b.iter(|| {
            let window = Arc::new(MetricsWindow::new());
            let handles: Vec<_> = (0..RECORD_THREADS)
                .map(|_| {
                    let window = Arc::clone(&window);
                    thread::spawn(move || {
                        let sample = Duration::from_micros(120);
                        for _ in 0..OPERATIONS_PER_THREAD {
                            window.record(sample);
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
        });
    });
}

fn bench_snapshot_under_load(c: &mut Criterion) {
    c.bench_function("metrics_cumulative_snapshot", |b| {
        let window = MetricsWindow::new();
        for i in 0..100_000u64 {
            window.record(Duration::from_nanos(1_000 + i % 10_000));
        }
        b.iter(|| window.cumulative_snapshot());
    });
}

criterion_group!(
    benches,
    bench_record_single_thread,
    bench_record_contended,
    bench_snapshot_under_load
);
criterion_main!(benches);
