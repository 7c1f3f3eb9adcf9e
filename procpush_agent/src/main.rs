//! Entry point for procpush_agent. Parses args, resolves the host identity
//! and drives the collect-and-push loop.

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use procpush_agent::config::{AgentConfig, Args};
use procpush_agent::host::resolve_host_identity;
use procpush_agent::publisher::HttpRemoteWriter;
use procpush_agent::sampler;

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        LevelFilter::ERROR
    } else {
        match verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let config = AgentConfig::from_args(&args).context("invalid configuration")?;

    info!("starting procpush_agent");
    info!("remote endpoint: {}", config.remote.url);
    info!("interval: {:?}", config.interval);
    info!("top processes: {}", config.top_n);
    info!("retries: {}", config.retry.retries);
    info!("retry delay: {:?}", config.retry.delay);

    let host = resolve_host_identity();
    info!(hostname = %host.hostname, ip = %host.ip, mac = %host.mac, "host identity");
    if !config.labels.is_empty() {
        info!("static labels: {}", config.labels_display());
    }

    let writer = HttpRemoteWriter::new(config.remote.clone()).context("building http client")?;

    if config.once {
        let report = sampler::collect_and_push(&config, &host, &writer).await?;
        info!(attempts = report.attempts, series = report.series, "single cycle done");
        return Ok(());
    }

    sampler::run(&config, &host, &writer).await;
    Ok(())
}
