use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use sliding_window::Window;
use sliding_window::measure::LagMeasurer;
use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const SAMPLE_RATE: u64 = 1000;

/// Times every `SAMPLE_RATE`-th call so the measurement stays off the hot path.
fn sampled<R>(measurer: &mut LagMeasurer, step: &mut u64, f: impl FnOnce() -> R) -> R {
    *step += 1;
    if !step.is_multiple_of(SAMPLE_RATE) {
        return f();
    }
    let start = Instant::now();
    let result = f();
    measurer.record(start.elapsed());
    result
}

fn bench_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("add");
    let window = Window::new(Duration::from_secs(60), Duration::from_secs(1)).unwrap();

    group.throughput(Throughput::Elements(1));
    let mut measurer = LagMeasurer::new();
    let mut step = 0;
    group.bench_function("add_uncontended", |b| {
        b.iter(|| sampled(&mut measurer, &mut step, || window.add(black_box(1))));
    });
    println!("add_uncontended latency:{}", measurer.format_stats());

    // Background writers hammering the same window.
    let window = Arc::new(Window::new(Duration::from_secs(60), Duration::from_secs(1)).unwrap());
    let running = Arc::new(AtomicBool::new(true));
    let writers: Vec<_> = (0..3)
        .map(|_| {
            let window = window.clone();
            let running = running.clone();
            thread::spawn(move || {
                while running.load(Ordering::Relaxed) {
                    window.add(1);
                }
            })
        })
        .collect();

    let mut measurer = LagMeasurer::new();
    let mut step = 0;
    group.bench_function("add_contended_4_threads", |b| {
        b.iter(|| sampled(&mut measurer, &mut step, || window.add(black_box(1))));
    });
    println!("add_contended_4_threads latency:{}", measurer.format_stats());

    running.store(false, Ordering::Relaxed);
    for writer in writers {
        writer.join().unwrap();
    }

    group.finish();
}

fn bench_last(c: &mut Criterion) {
    let mut group = c.benchmark_group("last");
    let samples: Vec<i64> = (1..=3600).collect();
    let window =
        Window::from_samples(Duration::from_secs(3600), Duration::from_secs(1), &samples).unwrap();

    group.throughput(Throughput::Elements(1));
    for n in [1, 60, 3600] {
        let mut measurer = LagMeasurer::new();
        let mut step = 0;
        group.bench_function(format!("last_{}", n), |b| {
            b.iter(|| sampled(&mut measurer, &mut step, || black_box(window.last(black_box(n)))));
        });
        println!("last_{} latency:{}", n, measurer.format_stats());
    }

    group.finish();
}

criterion_group!(benches, bench_add, bench_last);
criterion_main!(benches);
