//! Spyglass CLI: the facade that turns a user-level scan request into the
//! address stream the engine consumes.

use anyhow::Context;
use clap::Parser;
use spyglass::cli::{expand_targets, parse_ports, Args};
use spyglass::config::Settings;
use spyglass::dialer::Proxy;
use spyglass::output::{print_report, ConsoleSink};
use spyglass::producer;
use spyglass::scanner::{alive, ScanOptions, TcpScan};
use spyglass::types::TaskId;
use spyglass::webscan::FingerprintDb;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            warn!("could not load settings, using defaults: {e}");
            Settings::default()
        }
    };

    let ports = parse_ports(&args.ports).context("invalid port specification")?;
    let mut hosts = expand_targets(&args.targets)
        .await
        .context("invalid targets")?;

    let proxy = args
        .proxy
        .as_deref()
        .map(Proxy::from_url)
        .transpose()
        .context("invalid proxy")?;

    if let Some(p) = &proxy {
        if p.dials_raw()
            && !spyglass::dialer::socks5_check(p, Duration::from_millis(settings.timeout_ms)).await
        {
            warn!(
                "SOCKS5 proxy {}:{} did not accept our handshake; probes may all fail",
                p.host, p.port
            );
        }
    }

    let task_id: TaskId = match &args.task_id {
        Some(raw) => raw.parse().context("invalid task id")?,
        None => TaskId::new(),
    };

    let options = ScanOptions {
        workers: args.workers.unwrap_or(settings.workers),
        timeout: Duration::from_millis(args.timeout.unwrap_or(settings.timeout_ms)),
        proxy,
        ..settings.scan_options()
    };

    if args.check_live {
        let before = hosts.len();
        hosts = alive::check_live(&hosts, &settings.liveness_ports, options.timeout).await;
        info!("liveness check kept {}/{} hosts", hosts.len(), before);
    }

    let mut fingerprints = FingerprintDb::builtin();
    if let Some(path) = &args.fingerprints {
        let added = fingerprints
            .load_rules(path)
            .with_context(|| format!("failed to load fingerprints from {}", path.display()))?;
        info!("loaded {added} extra fingerprint rules");
    }

    let total = producer::expected_count(hosts.len(), ports.len(), &args.extras);
    let sink = Arc::new(ConsoleSink::new(total as u64, args.verbose));

    let sink_events: Arc<dyn spyglass::EventSink> = sink.clone();
    let scan =
        TcpScan::new(task_id, options, sink_events).with_fingerprints(Arc::new(fingerprints));

    // Ctrl-C stops submission; in-flight probes run to their timeout.
    let cancel = scan.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("cancellation requested, letting in-flight probes finish");
            cancel.cancel();
        }
    });

    let addresses = producer::spawn_address_stream(hosts, ports, args.extras.clone());
    let summary = scan.run(addresses).await?;

    sink.finish();
    let records = sink.records().await;
    print_report(args.output, &summary, &records)?;
    Ok(())
}
