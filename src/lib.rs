//! # Spyglass - Concurrent TCP Scanning Engine
//!
//! Spyglass is the port-scanning core of a security-reconnaissance suite:
//! given a stream of host/port pairs it determines which ports are
//! reachable, classifies the service answering, and opportunistically
//! fingerprints web applications.
//!
//! ## Features
//!
//! - **Bounded concurrency**: a semaphore-gated worker pool with natural
//!   backpressure on the address stream
//! - **Service detection**: pluggable [`probe::ProtocolProber`] seam with a
//!   built-in banner-grabbing implementation
//! - **Web follow-ups**: fingerprint matching and best-effort HTTP status
//!   probes for HTTP-family services
//! - **CDN noise suppression**: per-host heuristic that filters
//!   unidentified hits on hosts that look like CDN edges
//! - **Cooperative cancellation**: bounded-latency shutdown without leaking
//!   tasks or records
//! - **Ordered delivery**: a single collector forwards records to the event
//!   sink in completion order
//!
//! ## Example
//!
//! ```rust,ignore
//! use spyglass::event::NullSink;
//! use spyglass::producer::spawn_address_stream;
//! use spyglass::scanner::{ScanOptions, TcpScan};
//! use spyglass::types::TaskId;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let addresses = spawn_address_stream(
//!         vec!["192.168.1.1".to_string()],
//!         vec![22, 80, 443],
//!         Vec::new(),
//!     );
//!     let scan = TcpScan::new(TaskId::new(), ScanOptions::default(), Arc::new(NullSink));
//!     let summary = scan.run(addresses).await.unwrap();
//!     println!("{} attempts, {} reported", summary.completed, summary.forwarded);
//! }
//! ```

pub mod cli;
pub mod config;
pub mod dialer;
pub mod error;
pub mod event;
pub mod output;
pub mod probe;
pub mod producer;
pub mod scanner;
pub mod services;
pub mod types;
pub mod webscan;

// Re-export commonly used types
pub use error::{ConfigError, ScanError, TargetError};
pub use event::{ChannelSink, EventSink, NullSink};
pub use probe::{BannerProber, ProtocolProber, ScanStatus};
pub use scanner::{ScanOptions, ScanSummary, TcpScan};
pub use types::{Address, ScanRecord, TaskId};
