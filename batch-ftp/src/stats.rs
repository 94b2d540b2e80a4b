//! Transfer timing and throughput reporting.
//!
//! A [`TransferReport`] describes one completed send; [`Summary`] folds the
//! reports of repeated runs into mean and sample standard deviation, the
//! way a benchmark harness would.

use std::fmt;
use std::time::Duration;

/// Outcome of one successful transfer, measured at the sender.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferReport {
    /// Payload bytes delivered, sentinel included.
    pub bytes: usize,
    /// From just before the first data unit to just after the final ACK.
    pub elapsed: Duration,
}

impl TransferReport {
    pub fn new(bytes: usize, elapsed: Duration) -> Self {
        Self { bytes, elapsed }
    }

    /// Transfer time in whole milliseconds.
    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed.as_millis()
    }

    /// Bytes per millisecond (≈ Kbytes/s); `None` for an unmeasurably fast run.
    pub fn rate_kbps(&self) -> Option<f64> {
        let ms = self.elapsed.as_secs_f64() * 1000.0;
        (ms > 0.0).then(|| self.bytes as f64 / ms)
    }
}

impl fmt::Display for TransferReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Time(ms) : {}, Data sent(byte): {}",
            self.elapsed_ms(),
            self.bytes
        )?;
        match self.rate_kbps() {
            Some(rate) => write!(f, "Data rate: {rate:.6} (Kbytes/s)"),
            None => write!(f, "Data rate: n/a"),
        }
    }
}

/// Aggregate over several runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub runs: usize,
    pub mean_ms: f64,
    pub stddev_ms: f64,
    pub mean_rate: f64,
    pub stddev_rate: f64,
}

impl Summary {
    /// `None` when `reports` is empty.  Runs too fast to time are left out of
    /// the rate figures.
    pub fn from_reports(reports: &[TransferReport]) -> Option<Self> {
        if reports.is_empty() {
            return None;
        }
        let times: Vec<f64> = reports
            .iter()
            .map(|r| r.elapsed.as_secs_f64() * 1000.0)
            .collect();
        let rates: Vec<f64> = reports.iter().filter_map(TransferReport::rate_kbps).collect();

        let (mean_ms, stddev_ms) = mean_stddev(&times);
        let (mean_rate, stddev_rate) = mean_stddev(&rates);
        Some(Self {
            runs: reports.len(),
            mean_ms,
            stddev_ms,
            mean_rate,
            stddev_rate,
        })
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Runs: {}", self.runs)?;
        writeln!(
            f,
            "Time(ms) : mean {:.3}, stddev {:.3}",
            self.mean_ms, self.stddev_ms
        )?;
        write!(
            f,
            "Data rate (Kbytes/s) : mean {:.3}, stddev {:.3}",
            self.mean_rate, self.stddev_rate
        )
    }
}

/// Mean and sample standard deviation; the deviation is 0 below two samples.
fn mean_stddev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}
