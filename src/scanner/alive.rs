//! TCP-based host liveness pre-filter.
//!
//! Before a large scan it is often worth dropping hosts that answer on
//! none of a handful of common ports. Purely best-effort: a host that
//! filters all knock ports will be missed, which is why the check is
//! opt-in.

use crate::dialer;
use futures::stream::{self, StreamExt};
use std::time::Duration;
use tracing::debug;

/// Concurrent host checks in flight at once.
const CHECK_CONCURRENCY: usize = 64;

/// Return the subset of `hosts` that accepted a TCP connection on any of
/// `knock_ports`, in their original order.
pub async fn check_live(
    hosts: &[String],
    knock_ports: &[u16],
    timeout: Duration,
) -> Vec<String> {
    let alive: Vec<Option<String>> = stream::iter(hosts.to_vec())
        .map(|host| {
            let ports = knock_ports.to_vec();
            async move {
                for port in ports {
                    if dialer::tcp_connect_timeout(&host, port, timeout).await.is_ok() {
                        return Some(host);
                    }
                }
                debug!(host = %host, "host gave no sign of life");
                None
            }
        })
        .buffered(CHECK_CONCURRENCY)
        .collect()
        .await;

    alive.into_iter().flatten().collect()
}
