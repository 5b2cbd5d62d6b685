//! Command-line interface for spyglass.
//!
//! Uses `clap` derive macros for declarative argument parsing, and turns
//! user-level target/port specifications into the host and port lists the
//! engine's address stream is built from.

use crate::error::TargetError;
use clap::{Parser, ValueEnum};
use ipnetwork::IpNetwork;
use std::net::IpAddr;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// Concurrent TCP scanning engine with service detection.
#[derive(Parser, Debug)]
#[command(name = "spyglass")]
#[command(author = "HueCodes <huecodes@proton.me>")]
#[command(version = "0.2.0")]
#[command(about = "Scan hosts for reachable ports and identify what runs on them", long_about = None)]
pub struct Args {
    /// Targets: IP addresses, CIDR ranges, or hostnames
    #[arg(value_name = "TARGET", required = true, num_args = 1..)]
    pub targets: Vec<String>,

    /// Ports to scan (e.g., "80", "80,443", "1-1000", "22,80,8000-9000")
    #[arg(short, long, default_value = "1-1000")]
    pub ports: String,

    /// Extra "host:port" targets appended to the address stream
    #[arg(short = 'x', long = "extra", value_name = "HOST:PORT")]
    pub extras: Vec<String>,

    /// Maximum number of concurrent probes
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Connection timeout in milliseconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Proxy URL (socks5://[user:pass@]host:port or http://host:port)
    #[arg(long)]
    pub proxy: Option<String>,

    /// Task identifier attached to every record (random if omitted)
    #[arg(long)]
    pub task_id: Option<String>,

    /// Additional fingerprint rules file (JSON)
    #[arg(long, value_name = "FILE")]
    pub fingerprints: Option<std::path::PathBuf>,

    /// Drop hosts that answer on none of the common ports before scanning
    #[arg(long)]
    pub check_live: bool,

    /// Output format for the final report
    #[arg(short, long, value_enum, default_value = "plain")]
    pub output: OutputFormat,

    /// Verbose output (progress bar and per-record lines)
    #[arg(short, long)]
    pub verbose: bool,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable plain text
    Plain,
    /// JSON structured output
    Json,
}

/// Largest CIDR range we will expand.
const MAX_CIDR_HOSTS: u128 = 65536;

/// Parse a port specification into a sorted, deduplicated port list.
///
/// Accepts single ports, comma-separated lists, inclusive ranges, and any
/// mix of the three.
pub fn parse_ports(spec: &str) -> Result<Vec<u16>, TargetError> {
    let mut ports: Vec<u16> = Vec::new();

    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                let start: u16 = start
                    .trim()
                    .parse()
                    .map_err(|_| TargetError::InvalidPort(start.to_string()))?;
                let end: u16 = end
                    .trim()
                    .parse()
                    .map_err(|_| TargetError::InvalidPort(end.to_string()))?;
                if start > end {
                    return Err(TargetError::InvalidPortRange(start, end));
                }
                ports.extend(start..=end);
            }
            None => {
                let port: u16 = part
                    .parse()
                    .map_err(|_| TargetError::InvalidPort(part.to_string()))?;
                ports.push(port);
            }
        }
    }

    ports.sort_unstable();
    ports.dedup();
    if ports.is_empty() {
        return Err(TargetError::EmptyPorts);
    }
    Ok(ports)
}

/// Expand target specifications into the host list fed to the producer.
///
/// IPs pass through, CIDR ranges expand to their host addresses, anything
/// else resolves as a hostname.
pub async fn expand_targets(targets: &[String]) -> Result<Vec<String>, TargetError> {
    let mut hosts = Vec::new();
    for target in targets {
        let target = target.trim();
        if target.is_empty() {
            continue;
        }

        if let Ok(ip) = target.parse::<IpAddr>() {
            hosts.push(ip.to_string());
            continue;
        }

        if target.contains('/') {
            let network: IpNetwork = target
                .parse()
                .map_err(|_| TargetError::InvalidCidr(target.to_string()))?;
            expand_cidr(&network, &mut hosts)?;
            continue;
        }

        hosts.push(resolve_hostname(target).await?);
    }
    Ok(hosts)
}

fn expand_cidr(network: &IpNetwork, hosts: &mut Vec<String>) -> Result<(), TargetError> {
    let size = match network {
        IpNetwork::V4(net) => net.size() as u128,
        IpNetwork::V6(net) => {
            let prefix = u32::from(net.prefix());
            if prefix >= 128 {
                1
            } else {
                1u128 << (128 - prefix)
            }
        }
    };
    if size > MAX_CIDR_HOSTS {
        return Err(TargetError::CidrTooLarge(size, MAX_CIDR_HOSTS));
    }

    for ip in network.iter() {
        // Skip network and broadcast addresses for ordinary IPv4 subnets.
        if let (IpNetwork::V4(net), IpAddr::V4(v4)) = (network, ip) {
            if net.prefix() < 31 && (v4 == net.network() || v4 == net.broadcast()) {
                continue;
            }
        }
        hosts.push(ip.to_string());
    }
    Ok(())
}

async fn resolve_hostname(hostname: &str) -> Result<String, TargetError> {
    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
    let response =
        resolver
            .lookup_ip(hostname)
            .await
            .map_err(|e| TargetError::DnsResolutionFailed {
                host: hostname.to_string(),
                reason: e.to_string(),
            })?;

    response
        .iter()
        .next()
        .map(|ip| ip.to_string())
        .ok_or_else(|| TargetError::NoAddressesFound(hostname.to_string()))
}
