use anyhow::Context;
use greenlight_loadgen::config::Config;
use greenlight_loadgen::telemetry::{install_prometheus, metrics_router, serve_metrics};
use greenlight_loadgen::{HttpQueueClient, RunOrchestrator};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    // Recorder goes in before any session can record a metric
    let prometheus = match config.metrics_addr {
        Some(_) => Some(install_prometheus().context("failed to install Prometheus recorder")?),
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "greenlight_loadgen=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Loaded configuration: target={}, clients={}, action_id={}",
        config.target.base_url, config.run.num_clients, config.session.action_id
    );

    // Bad URLs or a transport that can't be built stop the run before any session starts
    let client = HttpQueueClient::new(&config.target, &config.http)
        .context("failed to set up the queue client")?;

    let orchestrator =
        RunOrchestrator::new(Arc::new(client), config.session.clone(), config.run.clone());

    let shutdown = CancellationToken::new();
    let interrupt = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight sessions");
            interrupt.cancel();
        }
    });

    let metrics_stop = CancellationToken::new();
    let metrics_server = match (config.metrics_addr, prometheus) {
        (Some(addr), Some(handle)) => {
            let router = metrics_router(handle, orchestrator.aggregator());
            let stop = metrics_stop.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = serve_metrics(addr, router, stop).await {
                    error!("Metrics server failed: {}", e);
                }
            }))
        }
        _ => None,
    };

    let report = orchestrator.run(shutdown).await;

    metrics_stop.cancel();
    if let Some(server) = metrics_server {
        let _ = server.await;
    }

    report.print_summary();
    if config.report_json {
        println!("{}", report.to_json().context("failed to encode report")?);
    }

    if !report.is_complete() {
        anyhow::bail!(
            "{} of {} sessions were recorded",
            report.aggregate.total(),
            report.configured_clients
        );
    }

    Ok(())
}
