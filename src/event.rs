//! Event sink: where scan output goes.
//!
//! The engine reports through an explicit per-run sink instead of an ambient
//! global emitter. Records are always delivered by the single collector
//! task, so sink implementations never see interleaved record calls;
//! progress and log events may arrive from any worker.

use crate::types::ScanRecord;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Severity of an informational scan event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// Per-run event consumer.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// A completed scan record, in completion order.
    async fn record(&self, record: ScanRecord);

    /// Monotonic count of completed attempts, one call per attempt.
    async fn progress(&self, completed: u32);

    /// Informational events such as the CDN-suspect warning.
    async fn log(&self, level: LogLevel, message: String);
}

/// Sink that forwards everything onto channels; the library consumer's way
/// of receiving the result stream.
pub struct ChannelSink {
    records: mpsc::Sender<ScanRecord>,
    progress: mpsc::Sender<u32>,
    logs: mpsc::Sender<(LogLevel, String)>,
}

/// Receiving halves paired with a [`ChannelSink`].
pub struct ChannelSinkReceivers {
    pub records: mpsc::Receiver<ScanRecord>,
    pub progress: mpsc::Receiver<u32>,
    pub logs: mpsc::Receiver<(LogLevel, String)>,
}

impl ChannelSink {
    pub fn channel(capacity: usize) -> (Self, ChannelSinkReceivers) {
        let (records_tx, records_rx) = mpsc::channel(capacity);
        let (progress_tx, progress_rx) = mpsc::channel(capacity);
        let (logs_tx, logs_rx) = mpsc::channel(capacity);
        (
            Self {
                records: records_tx,
                progress: progress_tx,
                logs: logs_tx,
            },
            ChannelSinkReceivers {
                records: records_rx,
                progress: progress_rx,
                logs: logs_rx,
            },
        )
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn record(&self, record: ScanRecord) {
        let _ = self.records.send(record).await;
    }

    async fn progress(&self, completed: u32) {
        let _ = self.progress.send(completed).await;
    }

    async fn log(&self, level: LogLevel, message: String) {
        let _ = self.logs.send((level, message)).await;
    }
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait]
impl EventSink for NullSink {
    async fn record(&self, _record: ScanRecord) {}

    async fn progress(&self, _completed: u32) {}

    async fn log(&self, _level: LogLevel, _message: String) {}
}
