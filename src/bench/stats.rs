//! Benchmark statistics: latency percentiles and throughput rates.

use std::time::{Duration, Instant};

/// Running packet/byte counters for one role.
#[derive(Debug, Clone, Copy, Default)]
pub struct Counters {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// Latency digest over the full observation vector.
///
/// Percentiles use the nearest-rank method on the sorted observations:
/// `p_q = sorted[n * q / 100]`, no interpolation. All values are
/// microseconds derived from nanosecond-resolution durations.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencySummary {
    pub sent: u64,
    pub received: u64,
    pub loss_percent: f64,
    pub min_us: f64,
    pub avg_us: f64,
    pub max_us: f64,
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
    pub stddev_us: f64,
}

impl LatencySummary {
    /// Digest a run. `observations` need not arrive sorted.
    pub fn compute(sent: u64, mut observations: Vec<Duration>) -> LatencySummary {
        let received = observations.len() as u64;
        let loss_percent = if sent > 0 {
            100.0 * (sent.saturating_sub(received)) as f64 / sent as f64
        } else {
            0.0
        };

        if observations.is_empty() {
            return LatencySummary { sent, received, loss_percent, ..Default::default() };
        }

        observations.sort_unstable();
        let us = |d: Duration| d.as_nanos() as f64 / 1000.0;

        let n = observations.len();
        let total: f64 = observations.iter().map(|&d| us(d)).sum();
        let avg_us = total / n as f64;
        let variance =
            observations.iter().map(|&d| (us(d) - avg_us).powi(2)).sum::<f64>() / n as f64;

        let rank = |q: usize| observations[(n * q / 100).min(n - 1)];

        LatencySummary {
            sent,
            received,
            loss_percent,
            min_us: us(observations[0]),
            avg_us,
            max_us: us(observations[n - 1]),
            p50_us: us(rank(50)),
            p95_us: us(rank(95)),
            p99_us: us(rank(99)),
            stddev_us: variance.sqrt(),
        }
    }
}

/// Throughput digest for one flood/sink run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThroughputSummary {
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub duration_ms: f64,
    pub packets_per_sec: f64,
    pub mbps: f64,
    pub gbps: f64,
}

impl ThroughputSummary {
    pub fn compute(packets: u64, bytes: u64, elapsed: Duration) -> ThroughputSummary {
        let duration_ms = elapsed.as_secs_f64() * 1000.0;
        if duration_ms <= 0.0 {
            return ThroughputSummary { packets_sent: packets, bytes_sent: bytes, ..Default::default() };
        }
        let packets_per_sec = packets as f64 * 1000.0 / duration_ms;
        let mbps = bytes as f64 * 8.0 / duration_ms / 1000.0;
        ThroughputSummary {
            packets_sent: packets,
            bytes_sent: bytes,
            duration_ms,
            packets_per_sec,
            mbps,
            gbps: mbps / 1000.0,
        }
    }
}

/// Interval-delta rate reports, at most one per second.
#[derive(Debug)]
pub struct RateReporter {
    last_report: Instant,
    last_packets: u64,
    last_bytes: u64,
}

impl RateReporter {
    pub fn new() -> RateReporter {
        RateReporter { last_report: Instant::now(), last_packets: 0, last_bytes: 0 }
    }

    /// When at least one second has passed and packets moved, return the
    /// interval rate `(pps, mbps)` and reset the window.
    pub fn tick(&mut self, packets: u64, bytes: u64) -> Option<(u64, u64)> {
        let interval = self.last_report.elapsed();
        if interval < Duration::from_secs(1) || packets <= self.last_packets {
            return None;
        }
        let ms = interval.as_millis() as u64;
        let pps = (packets - self.last_packets) * 1000 / ms;
        let mbps = (bytes - self.last_bytes) * 8 / ms / 1000;

        self.last_report = Instant::now();
        self.last_packets = packets;
        self.last_bytes = bytes;
        Some((pps, mbps))
    }
}

impl Default for RateReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn us(n: u64) -> Duration {
        Duration::from_micros(n)
    }

    #[test]
    fn test_latency_percentiles_nearest_rank() {
        let obs: Vec<Duration> = [10u64, 20, 30, 40, 50, 60, 70, 80, 90, 100]
            .into_iter()
            .map(us)
            .collect();
        let summary = LatencySummary::compute(10, obs);

        assert_eq!(summary.min_us, 10.0);
        assert_eq!(summary.max_us, 100.0);
        assert_eq!(summary.avg_us, 55.0);
        // nearest rank: sorted[10 * 50 / 100] = sorted[5]
        assert_eq!(summary.p50_us, 60.0);
        assert_eq!(summary.p99_us, 100.0);
        assert_eq!(summary.loss_percent, 0.0);
    }

    #[test]
    fn test_latency_unsorted_input() {
        let obs: Vec<Duration> = [50u64, 10, 30, 20, 40].into_iter().map(us).collect();
        let summary = LatencySummary::compute(5, obs);
        assert_eq!(summary.min_us, 10.0);
        assert_eq!(summary.max_us, 50.0);
        assert_eq!(summary.avg_us, 30.0);
    }

    #[test]
    fn test_latency_loss() {
        let obs: Vec<Duration> = vec![us(100); 90];
        let summary = LatencySummary::compute(100, obs);
        assert_eq!(summary.received, 90);
        assert!((summary.loss_percent - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_latency_empty_observations() {
        let summary = LatencySummary::compute(100, Vec::new());
        assert_eq!(summary.received, 0);
        assert_eq!(summary.loss_percent, 100.0);
        assert_eq!(summary.min_us, 0.0);
        assert_eq!(summary.p99_us, 0.0);
    }

    #[test]
    fn test_latency_p95_is_a_real_percentile() {
        // 100 distinct observations: p95 and p99 must differ
        let obs: Vec<Duration> = (1..=100u64).map(us).collect();
        let summary = LatencySummary::compute(100, obs);
        assert_eq!(summary.p95_us, 96.0);
        assert_eq!(summary.p99_us, 100.0);
    }

    #[test]
    fn test_latency_stddev_uniform_is_zero() {
        let obs: Vec<Duration> = vec![us(42); 10];
        let summary = LatencySummary::compute(10, obs);
        assert!(summary.stddev_us.abs() < 1e-9);
    }

    #[test]
    fn test_throughput_rates() {
        let summary = ThroughputSummary::compute(10_000, 10_000 * 1500, Duration::from_secs(2));
        assert_eq!(summary.duration_ms, 2000.0);
        assert_eq!(summary.packets_per_sec, 5000.0);
        // 15 MB * 8 bits / 2000 ms / 1000 = 60 Mb/s
        assert!((summary.mbps - 60.0).abs() < 1e-9);
        assert!((summary.gbps - 0.06).abs() < 1e-9);
    }

    #[test]
    fn test_throughput_zero_duration() {
        let summary = ThroughputSummary::compute(5, 100, Duration::ZERO);
        assert_eq!(summary.packets_per_sec, 0.0);
        assert_eq!(summary.mbps, 0.0);
    }

    #[test]
    fn test_rate_reporter_quiet_inside_first_second() {
        let mut reporter = RateReporter::new();
        assert!(reporter.tick(1000, 64_000).is_none());
    }
}
