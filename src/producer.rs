//! Address stream production.
//!
//! Turns a scan request (hosts × ports, plus explicit `host:port` extras)
//! into the bounded stream of [`Address`] values the engine consumes. The
//! channel is small on purpose: the worker pool's semaphore is the real
//! backpressure, and the producer task exits as soon as the engine drops
//! the receiving half.

use crate::types::Address;
use tokio::sync::mpsc;
use tracing::debug;

/// Channel depth between the producer and the feeder.
const STREAM_DEPTH: usize = 1;

/// Parse an explicit `host:port` target. Missing or non-numeric ports make
/// the target silently skippable, per the engine's input contract.
pub fn parse_special_target(target: &str) -> Option<Address> {
    let (host, port) = target.rsplit_once(':')?;
    if host.is_empty() {
        return None;
    }
    let port: u16 = port.parse().ok()?;
    Some(Address::new(host, port))
}

/// Spawn the producer task and hand back the consuming end.
///
/// The cross product of `hosts` × `ports` is emitted first, then the valid
/// extras. Malformed extras are dropped without affecting the rest.
pub fn spawn_address_stream(
    hosts: Vec<String>,
    ports: Vec<u16>,
    special_targets: Vec<String>,
) -> mpsc::Receiver<Address> {
    let (tx, rx) = mpsc::channel(STREAM_DEPTH);

    tokio::spawn(async move {
        for host in &hosts {
            for &port in &ports {
                if tx.send(Address::new(host.clone(), port)).await.is_err() {
                    return;
                }
            }
        }
        for target in &special_targets {
            let Some(address) = parse_special_target(target) else {
                debug!("skipping malformed target {target}");
                continue;
            };
            if tx.send(address).await.is_err() {
                return;
            }
        }
    });

    rx
}

/// How many addresses the stream will carry; used for progress totals.
pub fn expected_count(hosts: usize, ports: usize, special_targets: &[String]) -> usize {
    let extras = special_targets
        .iter()
        .filter(|t| parse_special_target(t).is_some())
        .count();
    hosts * ports + extras
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn drain(mut rx: mpsc::Receiver<Address>) -> Vec<Address> {
        let mut out = Vec::new();
        while let Some(addr) = rx.recv().await {
            out.push(addr);
        }
        out
    }

    #[test]
    fn test_parse_special_target() {
        assert_eq!(
            parse_special_target("10.0.0.1:8080"),
            Some(Address::new("10.0.0.1", 8080))
        );
        assert_eq!(parse_special_target("abc"), None);
        assert_eq!(parse_special_target("host:notaport"), None);
        assert_eq!(parse_special_target(":80"), None);
        assert_eq!(parse_special_target("host:70000"), None);
    }

    #[tokio::test]
    async fn test_cross_product_then_extras() {
        let rx = spawn_address_stream(
            vec!["a".to_string(), "b".to_string()],
            vec![80, 443],
            vec!["c:8080".to_string()],
        );
        let addresses = drain(rx).await;
        assert_eq!(
            addresses,
            vec![
                Address::new("a", 80),
                Address::new("a", 443),
                Address::new("b", 80),
                Address::new("b", 443),
                Address::new("c", 8080),
            ]
        );
    }

    #[tokio::test]
    async fn test_malformed_extras_are_skipped() {
        let rx = spawn_address_stream(
            Vec::new(),
            Vec::new(),
            vec![
                "abc".to_string(),
                "good:81".to_string(),
                "host:notaport".to_string(),
                "also-good:82".to_string(),
            ],
        );
        let addresses = drain(rx).await;
        assert_eq!(
            addresses,
            vec![Address::new("good", 81), Address::new("also-good", 82)]
        );
    }

    #[tokio::test]
    async fn test_producer_exits_when_receiver_dropped() {
        let rx = spawn_address_stream(
            vec!["a".to_string()],
            (1..=1000).collect(),
            Vec::new(),
        );
        drop(rx);
        // Nothing to assert directly; the spawned task must not wedge the
        // runtime, which would hang this test's shutdown.
        tokio::task::yield_now().await;
    }

    #[test]
    fn test_expected_count_ignores_malformed() {
        let extras = vec!["x:1".to_string(), "junk".to_string()];
        assert_eq!(expected_count(2, 3, &extras), 7);
    }
}
