use hdrhistogram::Histogram;
use std::time::Duration;

const MIN_NANOS: u64 = 1;
// 1,000s
const MAX_NANOS: u64 = 1_000_000_000_000;

/// Summary of recorded lag, in nanoseconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LagStats {
    pub count: u64,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub p999: u64,
}

/// Records how far behind schedule something ran, using HdrHistogram.
///
/// The rotation worker feeds it the gap between a tick's deadline and the
/// moment the bucket actually rotated. The benches reuse it for per-call
/// latency.
pub struct LagMeasurer {
    histogram: Histogram<u64>,
}

impl LagMeasurer {
    pub fn new() -> Self {
        // 3 significant figures
        let histogram = Histogram::<u64>::new_with_bounds(MIN_NANOS, MAX_NANOS, 3)
            .expect("constant histogram bounds are valid");
        Self { histogram }
    }

    pub fn record(&mut self, lag: Duration) {
        let nanos = u64::try_from(lag.as_nanos()).unwrap_or(MAX_NANOS);
        let nanos = nanos.clamp(MIN_NANOS, MAX_NANOS);
        // Cannot fail: the value is clamped into the histogram's range.
        let _ = self.histogram.record(nanos);
    }

    pub fn reset(&mut self) {
        self.histogram.reset();
    }

    pub fn stats(&self) -> LagStats {
        let count = self.histogram.len();
        if count == 0 {
            return LagStats::default();
        }

        LagStats {
            count,
            min: self.histogram.min(),
            max: self.histogram.max(),
            mean: self.histogram.mean(),
            p50: self.histogram.value_at_quantile(0.5),
            p90: self.histogram.value_at_quantile(0.9),
            p99: self.histogram.value_at_quantile(0.99),
            p999: self.histogram.value_at_quantile(0.999),
        }
    }

    pub fn format_stats(&self) -> String {
        let stats = self.stats();
        if stats.count == 0 {
            return "No stats collected yet".into();
        }

        format!(
            "\tcount={},\tmin={},\tmax={},\tmean={},\tp50={},\tp90={},\tp99={},\tp999={}",
            stats.count,
            format_duration(stats.min as f64),
            format_duration(stats.max as f64),
            format_duration(stats.mean),
            format_duration(stats.p50 as f64),
            format_duration(stats.p90 as f64),
            format_duration(stats.p99 as f64),
            format_duration(stats.p999 as f64),
        )
    }
}

impl Default for LagMeasurer {
    fn default() -> Self {
        Self::new()
    }
}

fn format_duration(nanos: f64) -> String {
    if nanos < 1000.0 {
        format!("{:.1}ns", nanos)
    } else if nanos < 1_000_000.0 {
        format!("{:.1}us", nanos / 1000.0)
    } else if nanos < 1_000_000_000.0 {
        format!("{:.1}ms", nanos / 1_000_000.0)
    } else {
        format!("{:.2}s", nanos / 1_000_000_000.0)
    }
}
