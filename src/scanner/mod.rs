//! Scanning engine core: a bounded worker pool pulling addresses from a
//! stream, probing each one, filtering noise, and delivering records to a
//! single-consumer collector in completion order.
//!
//! The coordinator owns shutdown: it returns only once every submitted
//! address has been accounted for in progress and the collector has drained
//! and forwarded every record.

pub mod alive;
pub mod cdn;
pub mod connect;

use crate::dialer::Proxy;
use crate::error::{ScanError, ScanResult};
use crate::event::EventSink;
use crate::probe::{BannerProber, ProtocolProber};
use crate::types::{Address, ScanRecord, TaskId};
use crate::webscan::{self, FingerprintDb};
use cdn::CdnFilter;
use chrono::{DateTime, Utc};
use connect::ConnectStage;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Tunables for one scan run.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Maximum concurrently executing probes.
    pub workers: usize,
    /// Per-connection dial/read timeout.
    pub timeout: Duration,
    /// Timeout for the best-effort HTTP status probe.
    pub http_timeout: Duration,
    /// Optional outbound proxy for both the raw dialer and the HTTP client.
    pub proxy: Option<Proxy>,
    /// Pacing of the CDN-suspect warning, in seconds.
    pub cdn_warn_interval_secs: u64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            workers: 500,
            timeout: Duration::from_secs(3),
            http_timeout: Duration::from_secs(5),
            proxy: None,
            cdn_warn_interval_secs: 2,
        }
    }
}

/// Run-level accounting returned once a scan finishes.
///
/// Cancellation is a status here, not a failure.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub task_id: TaskId,
    /// Addresses handed to workers before the stream ended or was cancelled.
    pub submitted: u32,
    /// Completed attempts; always equals `submitted` on return.
    pub completed: u32,
    /// Records that survived filtering and reached the sink.
    pub forwarded: u64,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// One configured scan run.
pub struct TcpScan {
    task_id: TaskId,
    options: ScanOptions,
    prober: Arc<dyn ProtocolProber>,
    fingerprints: Arc<FingerprintDb>,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
}

impl TcpScan {
    pub fn new(task_id: TaskId, options: ScanOptions, sink: Arc<dyn EventSink>) -> Self {
        Self {
            task_id,
            options,
            prober: Arc::new(BannerProber::new()),
            fingerprints: Arc::new(FingerprintDb::builtin()),
            sink,
            cancel: CancellationToken::new(),
        }
    }

    /// Swap in a different prober implementation.
    pub fn with_prober(mut self, prober: Arc<dyn ProtocolProber>) -> Self {
        self.prober = prober;
        self
    }

    /// Swap in a different fingerprint ruleset.
    pub fn with_fingerprints(mut self, fingerprints: Arc<FingerprintDb>) -> Self {
        self.fingerprints = fingerprints;
        self
    }

    /// Observe an externally owned cancellation signal.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels this run when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drive the scan to completion.
    ///
    /// Consumes `addresses` until the stream closes or cancellation is
    /// observed; cancellation stops submission but already-running probes
    /// finish, bounding shutdown latency by one timeout period.
    pub async fn run(self, mut addresses: mpsc::Receiver<Address>) -> ScanResult<ScanSummary> {
        if self.options.workers == 0 {
            return Err(ScanError::InvalidWorkerCount);
        }

        let started_at = Utc::now();
        let started = Instant::now();
        info!(task = %self.task_id.short(), workers = self.options.workers, "scan started");

        let http = webscan::build_http_client(self.options.http_timeout, self.options.proxy.as_ref())
            .map_err(|e| ScanError::HttpClient(e.to_string()))?;
        let stage = Arc::new(ConnectStage {
            task_id: self.task_id,
            timeout: self.options.timeout,
            proxy: self.options.proxy.clone(),
            prober: Arc::clone(&self.prober),
            fingerprints: Arc::clone(&self.fingerprints),
            http,
        });
        let filter = Arc::new(CdnFilter::new(self.options.cdn_warn_interval_secs));
        let progress = Arc::new(AtomicU32::new(0));

        // Single-consumer collector: serialized delivery in completion
        // order, so the sink never needs its own record locking.
        let (record_tx, mut record_rx) = mpsc::channel::<ScanRecord>(1);
        let collector_sink = Arc::clone(&self.sink);
        let collector = tokio::spawn(async move {
            let mut forwarded = 0u64;
            while let Some(record) = record_rx.recv().await {
                collector_sink.record(record).await;
                forwarded += 1;
            }
            forwarded
        });

        let semaphore = Arc::new(Semaphore::new(self.options.workers));
        let mut workers: JoinSet<()> = JoinSet::new();
        let mut submitted: u32 = 0;

        loop {
            let address = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                next = addresses.recv() => match next {
                    Some(address) => address,
                    None => break,
                },
            };

            // Backpressure: wait for a free worker slot before submitting.
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .expect("semaphore closed mid-run");
            submitted += 1;

            let stage = Arc::clone(&stage);
            let filter = Arc::clone(&filter);
            let sink = Arc::clone(&self.sink);
            let progress = Arc::clone(&progress);
            let record_tx = record_tx.clone();
            let cancel = self.cancel.clone();

            workers.spawn(async move {
                let _permit = permit;
                if !cancel.is_cancelled() {
                    if let Some(record) = stage.probe(&address.host, address.port).await {
                        if filter.admit(&record, sink.as_ref()).await {
                            let _ = record_tx.send(record).await;
                        }
                    }
                }
                // One increment per completed attempt, open or not.
                let done = progress.fetch_add(1, Ordering::SeqCst) + 1;
                sink.progress(done).await;
            });
        }
        drop(addresses);

        // Shutdown barrier: all workers, then the collector's drain.
        while workers.join_next().await.is_some() {}
        drop(record_tx);
        let forwarded = collector.await.unwrap_or(0);

        let completed = progress.load(Ordering::SeqCst);
        let cancelled = self.cancel.is_cancelled();
        debug!(
            task = %self.task_id.short(),
            submitted, completed, forwarded, cancelled,
            "scan finished"
        );

        Ok(ScanSummary {
            task_id: self.task_id,
            submitted,
            completed,
            forwarded,
            cancelled,
            started_at,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }
}
