//! Error types for spyglass.
//!
//! Uses `thiserror` for ergonomic error definitions. Per-address probe
//! failures are deliberately not modeled here: a dial that fails is a
//! non-result, not an error, and never aborts a run.

use std::path::PathBuf;
use thiserror::Error;

/// Run-level failures of the scanning engine.
///
/// Under normal operation none of these occur mid-scan; they abort a run
/// before any work is submitted.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("worker count must be at least 1")]
    InvalidWorkerCount,

    #[error("failed to build HTTP probe client: {0}")]
    HttpClient(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for scan operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// Failures while turning user input into scan targets.
#[derive(Error, Debug)]
pub enum TargetError {
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("invalid CIDR notation: {0}")]
    InvalidCidr(String),

    #[error("CIDR range too large: {0} addresses (max: {1})")]
    CidrTooLarge(u128, u128),

    #[error("failed to resolve hostname '{host}': {reason}")]
    DnsResolutionFailed { host: String, reason: String },

    #[error("no IP addresses found for hostname '{0}'")]
    NoAddressesFound(String),

    #[error("invalid port number: {0}")]
    InvalidPort(String),

    #[error("invalid port range: {0} > {1}")]
    InvalidPortRange(u16, u16),

    #[error("empty port specification")]
    EmptyPorts,

    #[error("invalid proxy URL: {0}")]
    InvalidProxy(String),
}

/// Configuration loading and saving failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine configuration directory")]
    DirectoryNotFound,

    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("failed to write {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidFormat(String),

    #[error(transparent)]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
