//! Reportable scan results.

use crate::types::TaskId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel scheme for open ports whose service could not be classified.
pub const UNKNOWN_SCHEME: &str = "unknow";

/// Detection method tag for the passive TCP connect path.
pub const DETECT_DEFAULT: &str = "Default";

/// A completed, reportable scan result.
///
/// Built by the connect stage for open ports only; immutable afterwards.
/// Carries the task identifier so consumers can demultiplex concurrent runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub task_id: TaskId,
    pub host: String,
    pub port: u16,
    /// Detected service scheme, or [`UNKNOWN_SCHEME`] when undetected.
    pub scheme: String,
    /// Canonical URL, always `scheme://host:port`.
    pub url: String,
    /// Fingerprint tags from the web matcher; empty outside the HTTP family.
    pub fingerprints: Vec<String>,
    /// HTTP status code from the follow-up probe, when it succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Which scan path produced this record.
    pub detect: String,
}

impl ScanRecord {
    /// Create a record for an open port. The URL is derived from the
    /// scheme/host/port so the two can never disagree.
    pub fn new(task_id: TaskId, host: impl Into<String>, port: u16, scheme: impl Into<String>) -> Self {
        let host = host.into();
        let scheme = scheme.into();
        let url = format!("{}://{}:{}", scheme, host, port);
        Self {
            task_id,
            host,
            port,
            scheme,
            url,
            fingerprints: Vec::new(),
            status_code: None,
            detect: DETECT_DEFAULT.to_string(),
        }
    }

    pub fn with_fingerprints(mut self, fingerprints: Vec<String>) -> Self {
        self.fingerprints = fingerprints;
        self
    }

    pub fn with_status_code(mut self, status_code: Option<u16>) -> Self {
        self.status_code = status_code;
        self
    }

    /// Whether the prober managed to name a concrete service.
    pub fn is_identified(&self) -> bool {
        self.scheme != UNKNOWN_SCHEME
    }
}

impl fmt::Display for ScanRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}
