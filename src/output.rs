//! Console output: a live event sink for interactive runs and the final
//! report formatters.

use crate::cli::OutputFormat;
use crate::event::{EventSink, LogLevel};
use crate::scanner::ScanSummary;
use crate::types::ScanRecord;
use async_trait::async_trait;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io::{self, Write};
use tokio::sync::Mutex;

/// Event sink for the CLI: keeps a progress bar current, echoes records as
/// they complete, and retains them for the final report.
pub struct ConsoleSink {
    progress: ProgressBar,
    records: Mutex<Vec<ScanRecord>>,
    live: bool,
}

impl ConsoleSink {
    /// `total` drives the progress bar; `live` enables per-record echo and
    /// the bar itself (quiet runs only get the final report).
    pub fn new(total: u64, live: bool) -> Self {
        let progress = if live {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap()
                    .progress_chars("=>-"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };
        Self {
            progress,
            records: Mutex::new(Vec::new()),
            live,
        }
    }

    /// Stop the progress bar; call once the run is over.
    pub fn finish(&self) {
        if self.live {
            self.progress.finish_and_clear();
        }
    }

    /// Records collected so far, in delivery order.
    pub async fn records(&self) -> Vec<ScanRecord> {
        self.records.lock().await.clone()
    }

    fn echo_record(&self, record: &ScanRecord) {
        let mut line = format!(
            "{}  {}",
            style(&record.url).green(),
            style(&record.scheme).bold()
        );
        if let Some(code) = record.status_code {
            line.push_str(&format!("  [{}]", code));
        }
        if !record.fingerprints.is_empty() {
            line.push_str(&format!("  {}", record.fingerprints.join(",")));
        }
        self.progress.println(line);
    }
}

#[async_trait]
impl EventSink for ConsoleSink {
    async fn record(&self, record: ScanRecord) {
        if self.live {
            self.echo_record(&record);
        }
        self.records.lock().await.push(record);
    }

    async fn progress(&self, completed: u32) {
        self.progress.set_position(completed as u64);
    }

    async fn log(&self, level: LogLevel, message: String) {
        let line = match level {
            LogLevel::Info => style(message).dim().to_string(),
            LogLevel::Warning => style(message).yellow().to_string(),
            LogLevel::Error => style(message).red().to_string(),
        };
        if self.live {
            self.progress.println(line);
        } else {
            eprintln!("{}", line);
        }
    }
}

/// Serializable shape of the JSON report.
#[derive(Serialize)]
struct ScanReport<'a> {
    summary: &'a ScanSummary,
    records: &'a [ScanRecord],
}

/// Print the final report in the chosen format.
pub fn print_report(
    format: OutputFormat,
    summary: &ScanSummary,
    records: &[ScanRecord],
) -> io::Result<()> {
    match format {
        OutputFormat::Plain => print_plain(summary, records),
        OutputFormat::Json => print_json(summary, records),
    }
}

fn print_plain(summary: &ScanSummary, records: &[ScanRecord]) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    writeln!(out)?;
    writeln!(
        out,
        "  {} task {} · {} probed, {} reported{}",
        style("spyglass").cyan().bold(),
        summary.task_id.short(),
        summary.completed,
        summary.forwarded,
        if summary.cancelled {
            style(" (cancelled)").yellow().to_string()
        } else {
            String::new()
        }
    )?;
    writeln!(
        out,
        "  started {}, finished in {:.2}s",
        summary.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        summary.elapsed_ms as f64 / 1000.0
    )?;
    writeln!(out)?;

    if records.is_empty() {
        writeln!(out, "  {}", style("No open services to report.").dim())?;
        return Ok(());
    }

    writeln!(
        out,
        "  {:<40} {:<10} {:>6}  {}",
        style("URL").bold(),
        style("SCHEME").bold(),
        style("HTTP").bold(),
        style("FINGERPRINTS").bold()
    )?;
    for record in records {
        let code = record
            .status_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            out,
            "  {:<40} {:<10} {:>6}  {}",
            record.url,
            record.scheme,
            code,
            record.fingerprints.join(",")
        )?;
    }
    Ok(())
}

fn print_json(summary: &ScanSummary, records: &[ScanRecord]) -> io::Result<()> {
    let report = ScanReport { summary, records };
    let json = serde_json::to_string_pretty(&report)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    println!("{}", json);
    Ok(())
}
