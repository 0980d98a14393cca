//! Benchmark result model and writers.
//!
//! One JSON object per run plus two CSV files with fixed column orders;
//! downstream tooling depends on the columns staying put. Writers return
//! `std::io::Result` since they touch only the local filesystem.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

/// Latency digest for one payload size.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatencyResult {
    pub payload_size: u64,
    pub packets_sent: u64,
    pub packets_received: u64,
    pub loss_percent: f64,
    pub min_us: f64,
    pub avg_us: f64,
    pub max_us: f64,
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
    pub stddev_us: f64,
}

/// Throughput digest for one payload size.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ThroughputResult {
    pub payload_size: u64,
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub duration_ms: f64,
    pub packets_per_sec: f64,
    pub mbps: f64,
    pub gbps: f64,
}

/// Full benchmark run report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BenchReport {
    pub timestamp: String,
    pub local_host: String,
    pub remote_host: String,
    pub local_interface: String,
    pub remote_interface: String,
    pub local_mac: String,
    pub remote_mac: String,
    pub latency_results: Vec<LatencyResult>,
    pub throughput_results: Vec<ThroughputResult>,
}

impl BenchReport {
    /// Write the whole report as a single JSON object.
    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self).map_err(std::io::Error::from)
    }

    /// Write `<stem>.latency.csv`.
    pub fn write_latency_csv(&self, path: &Path) -> std::io::Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(
            out,
            "payload_size,packets_sent,packets_received,loss_percent,min_us,avg_us,max_us,p50_us,p95_us,p99_us,stddev_us"
        )?;
        for r in &self.latency_results {
            writeln!(
                out,
                "{},{},{},{:.2},{:.1},{:.1},{:.1},{:.1},{:.1},{:.1},{:.1}",
                r.payload_size,
                r.packets_sent,
                r.packets_received,
                r.loss_percent,
                r.min_us,
                r.avg_us,
                r.max_us,
                r.p50_us,
                r.p95_us,
                r.p99_us,
                r.stddev_us
            )?;
        }
        Ok(())
    }

    /// Write `<stem>.throughput.csv`.
    pub fn write_throughput_csv(&self, path: &Path) -> std::io::Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "payload_size,packets_sent,bytes_sent,duration_ms,packets_per_sec,mbps,gbps")?;
        for r in &self.throughput_results {
            writeln!(
                out,
                "{},{},{},{:.1},{:.0},{:.2},{:.3}",
                r.payload_size,
                r.packets_sent,
                r.bytes_sent,
                r.duration_ms,
                r.packets_per_sec,
                r.mbps,
                r.gbps
            )?;
        }
        Ok(())
    }

    /// Print the human-readable summary table.
    pub fn print_table(&self) {
        println!("\n=== Benchmark Results ===");
        println!("Timestamp: {}", self.timestamp);
        println!("Local:     {} ({}) - {}", self.local_host, self.local_interface, self.local_mac);
        println!(
            "Remote:    {} ({}) - {}\n",
            self.remote_host, self.remote_interface, self.remote_mac
        );

        if !self.latency_results.is_empty() {
            println!("Latency:");
            println!(
                "  {:>7}  {:>9}  {:>9}  {:>9}  {:>9}  {:>9}  {:>7}",
                "payload", "min_us", "avg_us", "max_us", "p95_us", "p99_us", "loss%"
            );
            for r in &self.latency_results {
                println!(
                    "  {:>7}  {:>9.1}  {:>9.1}  {:>9.1}  {:>9.1}  {:>9.1}  {:>7.2}",
                    r.payload_size, r.min_us, r.avg_us, r.max_us, r.p95_us, r.p99_us, r.loss_percent
                );
            }
            println!();
        }

        if !self.throughput_results.is_empty() {
            println!("Throughput:");
            println!("  {:>7}  {:>12}  {:>10}  {:>8}", "payload", "pps", "Mbps", "Gbps");
            for r in &self.throughput_results {
                println!(
                    "  {:>7}  {:>12.0}  {:>10.2}  {:>8.3}",
                    r.payload_size, r.packets_per_sec, r.mbps, r.gbps
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> BenchReport {
        BenchReport {
            timestamp: "2025-11-02 12:00:00".to_string(),
            local_host: "alpha".to_string(),
            remote_host: "beta".to_string(),
            local_interface: "eth0".to_string(),
            remote_interface: "eth1".to_string(),
            local_mac: "aa:bb:cc:dd:ee:ff".to_string(),
            remote_mac: "11:22:33:44:55:66".to_string(),
            latency_results: vec![LatencyResult {
                payload_size: 64,
                packets_sent: 10000,
                packets_received: 9990,
                loss_percent: 0.1,
                min_us: 21.0,
                avg_us: 30.5,
                max_us: 410.0,
                p50_us: 28.0,
                p95_us: 55.0,
                p99_us: 80.0,
                stddev_us: 9.7,
            }],
            throughput_results: vec![ThroughputResult {
                payload_size: 1400,
                packets_sent: 10000,
                bytes_sent: 14_180_000,
                duration_ms: 120.0,
                packets_per_sec: 83_333.0,
                mbps: 945.33,
                gbps: 0.945,
            }],
        }
    }

    #[test]
    fn test_json_has_both_arrays() {
        let json = serde_json::to_value(sample_report()).unwrap();
        assert!(json["latency_results"].is_array());
        assert!(json["throughput_results"].is_array());
        assert_eq!(json["latency_results"][0]["payload_size"], 64);
    }

    #[test]
    fn test_csv_column_order() {
        let dir = std::env::temp_dir().join("l2link-report-test");
        std::fs::create_dir_all(&dir).unwrap();
        let report = sample_report();

        let latency_path = dir.join("out.latency.csv");
        report.write_latency_csv(&latency_path).unwrap();
        let contents = std::fs::read_to_string(&latency_path).unwrap();
        assert_eq!(
            contents.lines().next().unwrap(),
            "payload_size,packets_sent,packets_received,loss_percent,min_us,avg_us,max_us,p50_us,p95_us,p99_us,stddev_us"
        );
        assert!(contents.lines().nth(1).unwrap().starts_with("64,10000,9990,"));

        let throughput_path = dir.join("out.throughput.csv");
        report.write_throughput_csv(&throughput_path).unwrap();
        let contents = std::fs::read_to_string(&throughput_path).unwrap();
        assert_eq!(
            contents.lines().next().unwrap(),
            "payload_size,packets_sent,bytes_sent,duration_ms,packets_per_sec,mbps,gbps"
        );

        std::fs::remove_dir_all(&dir).ok();
    }
}
