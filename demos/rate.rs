use clap::Parser;
use sliding_window::{Window, WindowOptions};
use spdlog::{LevelFilter, info};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Feeds a sliding window from several threads and logs the rolling rate.
#[derive(Parser)]
struct Args {
    /// Window span in seconds.
    #[arg(long, default_value_t = 10)]
    window_secs: u64,
    /// Bucket span in milliseconds.
    #[arg(long, default_value_t = 500)]
    granularity_ms: u64,
    /// Number of producer threads.
    #[arg(long, default_value_t = 4)]
    threads: usize,
    /// How long to run, in seconds.
    #[arg(long, default_value_t = 15)]
    duration_secs: u64,
    /// Log rotation steps and tick lag.
    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    if args.verbose {
        spdlog::default_logger().set_level_filter(LevelFilter::All);
    }

    let options = WindowOptions {
        name: "rate",
        window: Duration::from_secs(args.window_secs),
        granularity: Duration::from_millis(args.granularity_ms),
        enable_latency_stats: args.verbose,
    };
    let window = Arc::new(Window::with_options(options, &[])?);
    let buckets = window.len() as i64;

    info!(
        "[System] {} buckets of {:?}, {} producers",
        buckets,
        window.granularity(),
        args.threads
    );

    let running = Arc::new(AtomicBool::new(true));
    let producers: Vec<_> = (0..args.threads)
        .map(|id| {
            let window = window.clone();
            let running = running.clone();
            thread::spawn(move || {
                // Each producer fires at its own pace.
                let pause = Duration::from_millis(5 + 5 * id as u64);
                while running.load(Ordering::Relaxed) {
                    window.add(1);
                    thread::sleep(pause);
                }
            })
        })
        .collect();

    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(args.duration_secs) {
        thread::sleep(Duration::from_secs(1));
        let recent = window.last(1)?;
        let all = window.last(buckets)?;
        info!(
            "[Rate] current bucket={}, window total={}, active buckets={}/{}, avg/bucket={:.1}",
            recent.total,
            all.total,
            all.samples,
            window.filled(),
            all.average().unwrap_or(0.0)
        );
    }

    running.store(false, Ordering::Relaxed);
    for producer in producers {
        producer.join().map_err(|_| "producer panicked")?;
    }
    window.stop();

    info!("[System] Done!");
    Ok(())
}
