//! Protocol probing: connect to a port and classify what answers.
//!
//! The scanning engine only depends on the [`ProtocolProber`] trait; the
//! deeper nmap-style fingerprint database lives behind this seam in other
//! tooling. [`BannerProber`] is the built-in, coarse implementation: a
//! passive banner read, a short active nudge for silent web services, and
//! signature matching over whatever came back.

use crate::dialer::{self, Proxy};
use crate::services;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use socket2::Socket;
use std::fmt;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Coarse outcome of a single connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// Connection established.
    Open,
    /// Connection actively refused.
    Closed,
    /// Timeout, unreachable, or any other dial failure.
    Unknown,
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// What an open port said about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResponse {
    /// Best-effort service classification; empty when unidentified.
    pub service: String,
    /// Sanitized banner text, original casing.
    pub raw: String,
}

/// Result of one probe: a status, plus a response for open ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub status: ScanStatus,
    pub response: Option<ProbeResponse>,
}

impl ProbeOutcome {
    pub fn open(service: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            status: ScanStatus::Open,
            response: Some(ProbeResponse {
                service: service.into(),
                raw: raw.into(),
            }),
        }
    }

    pub fn closed() -> Self {
        Self {
            status: ScanStatus::Closed,
            response: None,
        }
    }

    pub fn unknown() -> Self {
        Self {
            status: ScanStatus::Unknown,
            response: None,
        }
    }
}

/// Seam for connection attempt + service classification.
#[async_trait]
pub trait ProtocolProber: Send + Sync {
    async fn probe(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
        proxy: Option<&Proxy>,
    ) -> ProbeOutcome;
}

/// Maximum bytes kept from a banner.
const MAX_BANNER_SIZE: usize = 1024;

/// Probe sent to elicit a response from silent web services.
const HTTP_PROBE: &[u8] = b"GET / HTTP/1.0\r\n\r\n";

/// Default prober: TCP connect, passive banner grab, signature matching.
#[derive(Debug, Clone, Default)]
pub struct BannerProber;

impl BannerProber {
    pub fn new() -> Self {
        Self
    }

    /// Read whatever the service volunteers; nudge silent services with an
    /// HTTP request before giving up.
    async fn grab_banner(&self, stream: &mut TcpStream, read_timeout: Duration) -> String {
        let mut buffer = vec![0u8; MAX_BANNER_SIZE];

        if let Ok(Ok(n)) = timeout(read_timeout, stream.read(&mut buffer)).await {
            if n > 0 {
                return sanitize_banner(&buffer[..n]);
            }
        }

        if stream.write_all(HTTP_PROBE).await.is_ok() {
            if let Ok(Ok(n)) = timeout(read_timeout, stream.read(&mut buffer)).await {
                if n > 0 {
                    return sanitize_banner(&buffer[..n]);
                }
            }
        }

        String::new()
    }
}

#[async_trait]
impl ProtocolProber for BannerProber {
    async fn probe(
        &self,
        host: &str,
        port: u16,
        connect_timeout: Duration,
        proxy: Option<&Proxy>,
    ) -> ProbeOutcome {
        let mut stream = match dialer::connect(host, port, connect_timeout, proxy).await {
            Ok(stream) => stream,
            Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                return ProbeOutcome::closed();
            }
            Err(_) => return ProbeOutcome::unknown(),
        };

        let read_timeout = connect_timeout.min(Duration::from_secs(2));
        let raw = self.grab_banner(&mut stream, read_timeout).await;
        let service = classify(&raw, port);
        discard(stream);

        ProbeOutcome::open(service, raw)
    }
}

/// Close without lingering in TIME_WAIT; scans churn through sockets fast.
fn discard(stream: TcpStream) {
    if let Ok(std_stream) = stream.into_std() {
        let socket = Socket::from(std_stream);
        let _ = socket.set_linger(Some(Duration::from_secs(0)));
    }
}

/// Banner prefixes/markers and the service they identify. Checked in order
/// against the lower-cased banner.
static SIGNATURES: &[(&str, &str)] = &[
    ("ssh-", "ssh"),
    ("http/1.", "http"),
    ("http/2", "http"),
    ("<!doctype html", "http"),
    ("<html", "http"),
    ("220 ", "smtp-or-ftp"),
    ("+ok", "pop3"),
    ("* ok", "imap"),
    ("-err", "redis"),
    ("+pong", "redis"),
    ("rfb ", "vnc"),
    ("amqp", "amqp"),
    ("mysql", "mysql"),
    ("mongodb", "mongodb"),
];

/// Best-effort classification from a banner, with a narrow port hint for
/// TLS-wrapped web services that won't speak until a handshake.
///
/// Returns an empty string when nothing matched; the connect stage maps
/// that to the unknown-scheme sentinel.
pub fn classify(banner: &str, port: u16) -> String {
    let lower = banner.to_lowercase();
    if !lower.is_empty() {
        for &(marker, service) in SIGNATURES {
            if !lower.contains(marker) {
                continue;
            }
            if service == "smtp-or-ftp" {
                // "220" greets both; disambiguate on the banner body.
                if lower.contains("smtp") || lower.contains("esmtp") {
                    return "smtp".to_string();
                }
                if lower.contains("ftp") {
                    return "ftp".to_string();
                }
                return services::well_known_service(port).unwrap_or("").to_string();
            }
            return service.to_string();
        }
        return String::new();
    }

    if services::is_tls_web_port(port) {
        return "https".to_string();
    }
    String::new()
}

/// Keep banners printable and bounded.
fn sanitize_banner(data: &[u8]) -> String {
    let mut out = String::new();
    let mut prev_space = false;
    for &b in data.iter().take(MAX_BANNER_SIZE) {
        let c = if b.is_ascii_graphic() {
            b as char
        } else if b == b' ' || b == b'\r' || b == b'\n' || b == b'\t' {
            ' '
        } else {
            '.'
        };
        if c == ' ' {
            if !prev_space {
                out.push(c);
            }
            prev_space = true;
        } else {
            out.push(c);
            prev_space = false;
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_classify_banners() {
        assert_eq!(classify("SSH-2.0-OpenSSH_8.9", 22), "ssh");
        assert_eq!(classify("HTTP/1.1 200 OK Server: nginx", 8080), "http");
        assert_eq!(classify("220 mail.example.com ESMTP Postfix", 25), "smtp");
        assert_eq!(classify("220 ProFTPD Server ready", 21), "ftp");
        assert_eq!(classify("-ERR unknown command", 6379), "redis");
        assert_eq!(classify("RFB 003.008", 5900), "vnc");
    }

    #[test]
    fn test_classify_unidentified_is_empty() {
        assert_eq!(classify("", 9), "");
        assert_eq!(classify("", 7), "");
        assert_eq!(classify("garbage greeting", 12345), "");
    }

    #[test]
    fn test_classify_tls_port_hint() {
        assert_eq!(classify("", 443), "https");
        assert_eq!(classify("", 8443), "https");
        assert_eq!(classify("", 80), "");
    }

    #[test]
    fn test_sanitize_banner() {
        assert_eq!(
            sanitize_banner(b"SSH-2.0-OpenSSH_8.9\r\n"),
            "SSH-2.0-OpenSSH_8.9"
        );
        assert_eq!(sanitize_banner(b"\x00\x01Hello\x02World"), "..Hello.World");
        assert_eq!(sanitize_banner(b"a  \r\n  b"), "a b");
    }

    #[tokio::test]
    async fn test_probe_open_with_banner() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"SSH-2.0-OpenSSH_9.6\r\n").await.unwrap();
        });

        let prober = BannerProber::new();
        let outcome = prober
            .probe(&addr.ip().to_string(), addr.port(), Duration::from_secs(2), None)
            .await;
        assert_eq!(outcome.status, ScanStatus::Open);
        let response = outcome.response.unwrap();
        assert_eq!(response.service, "ssh");
        assert!(response.raw.starts_with("SSH-2.0"));
    }

    #[tokio::test]
    async fn test_probe_refused_is_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let prober = BannerProber::new();
        let outcome = prober
            .probe("127.0.0.1", port, Duration::from_secs(1), None)
            .await;
        assert_eq!(outcome.status, ScanStatus::Closed);
        assert!(outcome.response.is_none());
    }

    #[tokio::test]
    async fn test_probe_timeout_is_unknown() {
        // 192.0.2.0/24 is TEST-NET-1; nothing should answer.
        let prober = BannerProber::new();
        let outcome = prober
            .probe("192.0.2.1", 81, Duration::from_millis(200), None)
            .await;
        assert_eq!(outcome.status, ScanStatus::Unknown);
    }
}
