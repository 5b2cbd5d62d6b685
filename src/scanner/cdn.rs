//! Per-host CDN-suspect heuristic.
//!
//! Hosts behind a CDN edge or load balancer tend to accept connections on
//! low-numbered ports that carry no real service. Once a host shows an open
//! port in the [1, 20] band, only records with an identified scheme are
//! considered signal for that host; unidentified hits are dropped as noise.

use crate::event::{EventSink, LogLevel};
use crate::types::ScanRecord;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::warn;

/// Inclusive port band that marks a host as CDN-suspect.
const SUSPECT_BAND: std::ops::RangeInclusive<u16> = 1..=20;

/// Shared per-run filter state. Read and written by every worker in the
/// run, so the map sits behind a mutex; flags are never cleared.
pub struct CdnFilter {
    suspects: Mutex<HashMap<String, bool>>,
    warn_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl CdnFilter {
    /// `warn_interval_secs` paces the informational warning; flags
    /// themselves are unaffected.
    pub fn new(warn_interval_secs: u64) -> Self {
        let per_interval = Quota::with_period(std::time::Duration::from_secs(
            warn_interval_secs.max(1),
        ))
        .unwrap_or_else(|| Quota::per_second(nonzero!(1u32)));
        Self {
            suspects: Mutex::new(HashMap::new()),
            warn_limiter: RateLimiter::direct(per_interval),
        }
    }

    /// Decide whether `record` should be forwarded to the collector.
    ///
    /// Low-band records always pass (and flag their host); unidentified
    /// records on a flagged host are dropped.
    pub async fn admit(&self, record: &ScanRecord, sink: &dyn EventSink) -> bool {
        if SUSPECT_BAND.contains(&record.port) {
            let newly_flagged = {
                let mut suspects = self.suspects.lock().await;
                suspects.insert(record.host.clone(), true).is_none()
            };
            if newly_flagged || self.warn_limiter.check().is_ok() {
                let message = format!(
                    "[portscan] {} looks like a CDN edge; unidentified services on this host will be filtered",
                    record.host
                );
                warn!(host = %record.host, "cdn suspect");
                sink.log(LogLevel::Warning, message).await;
            }
            return true;
        }

        if !record.is_identified() {
            let suspects = self.suspects.lock().await;
            if suspects.get(&record.host).copied().unwrap_or(false) {
                return false;
            }
        }
        true
    }

    /// Whether a host has been flagged so far in this run.
    pub async fn is_suspect(&self, host: &str) -> bool {
        self.suspects.lock().await.get(host).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NullSink;
    use crate::types::{TaskId, UNKNOWN_SCHEME};

    fn record(host: &str, port: u16, scheme: &str) -> ScanRecord {
        ScanRecord::new(TaskId::new(), host, port, scheme)
    }

    #[tokio::test]
    async fn test_low_band_record_flags_and_passes() {
        let filter = CdnFilter::new(2);
        let sink = NullSink;

        assert!(filter.admit(&record("10.0.0.1", 7, UNKNOWN_SCHEME), &sink).await);
        assert!(filter.is_suspect("10.0.0.1").await);
    }

    #[tokio::test]
    async fn test_suppression_scenario() {
        let filter = CdnFilter::new(2);
        let sink = NullSink;

        // Port 7 opens with no classified service: flag set, still forwarded.
        assert!(filter.admit(&record("10.0.0.1", 7, UNKNOWN_SCHEME), &sink).await);
        // Identified service on the same host: forwarded.
        assert!(filter.admit(&record("10.0.0.1", 8080, "http"), &sink).await);
        // Unidentified service on the same host: suppressed.
        assert!(!filter.admit(&record("10.0.0.1", 9, UNKNOWN_SCHEME), &sink).await);
    }

    #[tokio::test]
    async fn test_unflagged_host_passes_unidentified() {
        let filter = CdnFilter::new(2);
        let sink = NullSink;

        assert!(filter.admit(&record("10.0.0.2", 9999, UNKNOWN_SCHEME), &sink).await);
    }

    #[tokio::test]
    async fn test_hosts_are_independent() {
        let filter = CdnFilter::new(2);
        let sink = NullSink;

        assert!(filter.admit(&record("10.0.0.1", 7, UNKNOWN_SCHEME), &sink).await);
        // Flagging host A never affects host B.
        assert!(filter.admit(&record("10.0.0.2", 9999, UNKNOWN_SCHEME), &sink).await);
        assert!(!filter.is_suspect("10.0.0.2").await);
    }

    #[tokio::test]
    async fn test_flag_survives_for_run_duration() {
        let filter = CdnFilter::new(2);
        let sink = NullSink;

        filter.admit(&record("10.0.0.1", 3, UNKNOWN_SCHEME), &sink).await;
        for port in [100u16, 5000, 65000] {
            assert!(!filter.admit(&record("10.0.0.1", port, UNKNOWN_SCHEME), &sink).await);
        }
        assert!(filter.is_suspect("10.0.0.1").await);
    }

    #[tokio::test]
    async fn test_warning_is_rate_limited() {
        let filter = CdnFilter::new(60);
        let (sink, mut rx) = crate::event::ChannelSink::channel(16);

        // Same host repeatedly: one warning for the initial flag, the rest
        // paced out by the limiter.
        for _ in 0..5 {
            filter.admit(&record("10.0.0.1", 7, UNKNOWN_SCHEME), &sink).await;
        }
        drop(filter);
        drop(sink);

        let mut warnings = 0;
        while rx.logs.recv().await.is_some() {
            warnings += 1;
        }
        assert!(warnings >= 1);
        assert!(warnings <= 2);
    }
}
