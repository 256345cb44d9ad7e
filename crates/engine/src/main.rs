// crates/engine/src/main.rs
use adapters::{CoinGeckoClient, SignalSource};
use anyhow::Context;
use common::config::{AggregatorConfig, LoggingConfig};
use engine::*;
use signals::{FetcherSet, ScoreCombiner};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// One pass over the asset universe, then exit.
/// Exit code is non-zero only when the run cannot start or the universe cannot be read.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = AggregatorConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.logging);

    let prometheus = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install metrics recorder")?;

    tracing::info!("Signal aggregator starting");

    let store = Arc::new(
        PgStore::connect(&config.database)
            .await
            .context("Failed to connect to database")?,
    );

    let result = run(&config, store.clone()).await;
    store.close().await;
    let summary = result?;

    if let Some(path) = &config.metrics.textfile_path {
        if let Err(e) = std::fs::write(path, prometheus.render()) {
            tracing::warn!("Failed to write metrics to {}: {}", path, e);
        }
    }

    tracing::info!(
        "Worker pass complete: {} scored, {} skipped, {} failed",
        summary.scored,
        summary.skipped,
        summary.failed
    );
    Ok(())
}

async fn run(config: &AggregatorConfig, store: Arc<PgStore>) -> anyhow::Result<RunSummary> {
    if config.database.run_migrations {
        store.migrate().await.context("Failed to create signal tables")?;
    }

    let source: Arc<dyn SignalSource> =
        Arc::new(CoinGeckoClient::new(&config.source).context("Failed to build data source client")?);

    let aggregator = Aggregator::new(
        FetcherSet::standard(source, config.source.history_days),
        ScoreCombiner::default(),
        store.clone(),
    );

    aggregator
        .run_once(store.as_ref())
        .await
        .context("Failed to read asset universe")
}

fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if config.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
