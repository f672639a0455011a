use std::io::Write;

use log::info;
use serde::Serialize;

use crate::errors::Result;
use crate::sweep::SweepSeries;
use crate::TransactionIsolation;

/// Parallel arrays describing one sweep, ready for a plotting tool.
///
/// Index `i` of every array belongs to `k_values[i]`. Unavailable metrics
/// are `None` (JSON `null`), so gaps stay visible.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesReport {
    pub label: String,
    pub isolation: TransactionIsolation,
    pub retry_enabled: bool,
    pub k_values: Vec<usize>,
    pub elapsed_secs: Vec<Option<f64>>,
    pub throughputs: Vec<Option<f64>>,
    pub correctness: Vec<Option<f64>>,
}

impl From<&SweepSeries> for SeriesReport {
    fn from(series: &SweepSeries) -> Self {
        let results = series.results();
        Self {
            label: series.label(),
            isolation: series.isolation(),
            retry_enabled: series.policy().enabled,
            k_values: results.iter().map(|r| r.k).collect(),
            elapsed_secs: results
                .iter()
                .map(|r| r.elapsed.map(|e| e.as_secs_f64()))
                .collect(),
            throughputs: results.iter().map(|r| r.throughput).collect(),
            correctness: results.iter().map(|r| r.correctness).collect(),
        }
    }
}

/// Consumer of finished sweeps. Presentation is entirely up to the implementation.
pub trait ResultReporter {
    fn report(&mut self, series: &SweepSeries) -> Result<()>;
}

/// Logs one block per k at `info` level.
#[derive(Debug, Default)]
pub struct LogReporter;

fn fmt_metric(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{:.4}", v))
}

impl ResultReporter for LogReporter {
    fn report(&mut self, series: &SweepSeries) -> Result<()> {
        info!("=== {} ===", series.label());
        for result in series.results() {
            info!(
                "k={} isolation={} retry={} time(s)={} tps={} c-value={} committed={}/{} attempts={}",
                result.k,
                series.isolation(),
                series.policy().enabled,
                fmt_metric(result.elapsed.map(|e| e.as_secs_f64())),
                fmt_metric(result.throughput),
                fmt_metric(result.correctness),
                result.tally.committed,
                result.chunks,
                result.tally.attempts
            );
        }
        Ok(())
    }
}

/// Writes one [`SeriesReport`] JSON object per line.
pub struct JsonLinesReporter<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesReporter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ResultReporter for JsonLinesReporter<W> {
    fn report(&mut self, series: &SweepSeries) -> Result<()> {
        serde_json::to_writer(&mut self.writer, &SeriesReport::from(series))?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}
