//! Connect stage: one probe, one classification, at most one record.

use crate::dialer::Proxy;
use crate::probe::{ProtocolProber, ScanStatus};
use crate::types::{ScanRecord, TaskId, UNKNOWN_SCHEME};
use crate::webscan::{self, FingerprintDb, WebInfo};
use std::sync::Arc;
use std::time::Duration;

/// Everything a worker needs to turn an address into a record.
pub struct ConnectStage {
    pub task_id: TaskId,
    pub timeout: Duration,
    pub proxy: Option<Proxy>,
    pub prober: Arc<dyn ProtocolProber>,
    pub fingerprints: Arc<FingerprintDb>,
    pub http: reqwest::Client,
}

impl ConnectStage {
    /// Probe one address. `None` means "nothing to report": the port was
    /// closed, unreachable, or the prober itself failed. All absorbed.
    pub async fn probe(&self, host: &str, port: u16) -> Option<ScanRecord> {
        let outcome = self
            .prober
            .probe(host, port, self.timeout, self.proxy.as_ref())
            .await;

        let response = match outcome.status {
            ScanStatus::Closed | ScanStatus::Unknown => return None,
            ScanStatus::Open => outcome.response.unwrap_or_default(),
        };

        let scheme = if response.service.is_empty() {
            UNKNOWN_SCHEME.to_string()
        } else {
            response.service
        };
        let banner = response.raw.to_lowercase();

        let mut record = ScanRecord::new(self.task_id, host, port, scheme);

        if record.scheme == "http" || record.scheme == "https" {
            let info = WebInfo {
                protocol: record.scheme.clone(),
                banner,
            };
            let fingerprints = self.fingerprints.match_banner(&info);
            let status_code = webscan::http_status(&self.http, &record.url).await;
            record = record
                .with_fingerprints(fingerprints)
                .with_status_code(status_code);
        }

        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeOutcome;
    use async_trait::async_trait;

    /// Prober that replays a fixed outcome.
    struct FixedProber(ProbeOutcome);

    #[async_trait]
    impl ProtocolProber for FixedProber {
        async fn probe(
            &self,
            _host: &str,
            _port: u16,
            _timeout: Duration,
            _proxy: Option<&Proxy>,
        ) -> ProbeOutcome {
            self.0.clone()
        }
    }

    fn stage(outcome: ProbeOutcome) -> ConnectStage {
        ConnectStage {
            task_id: TaskId::new(),
            timeout: Duration::from_millis(100),
            proxy: None,
            prober: Arc::new(FixedProber(outcome)),
            fingerprints: Arc::new(FingerprintDb::builtin()),
            http: webscan::build_http_client(Duration::from_millis(100), None).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_closed_and_unknown_produce_nothing() {
        assert!(stage(ProbeOutcome::closed()).probe("10.0.0.1", 80).await.is_none());
        assert!(stage(ProbeOutcome::unknown()).probe("10.0.0.1", 80).await.is_none());
    }

    #[tokio::test]
    async fn test_unclassified_open_gets_sentinel_scheme() {
        let record = stage(ProbeOutcome::open("", ""))
            .probe("10.0.0.1", 9)
            .await
            .unwrap();
        assert_eq!(record.scheme, UNKNOWN_SCHEME);
        assert_eq!(record.url, "unknow://10.0.0.1:9");
        assert!(record.fingerprints.is_empty());
        assert_eq!(record.status_code, None);
    }

    #[tokio::test]
    async fn test_classified_service_used_verbatim() {
        let record = stage(ProbeOutcome::open("ssh", "SSH-2.0-OpenSSH_9.6"))
            .probe("10.0.0.1", 22)
            .await
            .unwrap();
        assert_eq!(record.scheme, "ssh");
        assert_eq!(record.url, "ssh://10.0.0.1:22");
        // Non-HTTP services never run the web follow-ups.
        assert!(record.fingerprints.is_empty());
        assert_eq!(record.status_code, None);
    }

    #[tokio::test]
    async fn test_http_gets_fingerprints_and_swallows_probe_failure() {
        // TEST-NET host: the status probe can't succeed, which must leave
        // the code unset rather than fail the record.
        let record = stage(ProbeOutcome::open(
            "http",
            "HTTP/1.1 200 OK Server: nginx/1.25.3",
        ))
        .probe("192.0.2.1", 8080)
        .await
        .unwrap();
        assert_eq!(record.scheme, "http");
        assert_eq!(record.fingerprints, vec!["nginx"]);
        assert_eq!(record.status_code, None);
    }

    #[tokio::test]
    async fn test_detection_tag() {
        let record = stage(ProbeOutcome::open("redis", "-ERR"))
            .probe("10.0.0.1", 6379)
            .await
            .unwrap();
        assert_eq!(record.detect, "Default");
    }
}
