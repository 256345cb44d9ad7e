// crates/engine/src/aggregator.rs
use crate::store::{AssetUniverse, SnapshotStore};
use chrono::{DateTime, Utc};
use common::*;
use signals::{fetch_signal, CategorySignals, FetcherSet, ScoreCombiner};
use std::sync::Arc;

/// What happened to one asset in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetOutcome {
    /// Record persisted
    Scored(Scores),
    /// No usable market data; nothing written
    Skipped,
}

/// Totals for one pass over the universe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub run_ts: DateTime<Utc>,
    pub attempted: usize,
    pub scored: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Single sequential pass: fetch, combine, persist, per asset
pub struct Aggregator {
    fetchers: FetcherSet,
    combiner: ScoreCombiner,
    store: Arc<dyn SnapshotStore>,
}

impl Aggregator {
    pub fn new(fetchers: FetcherSet, combiner: ScoreCombiner, store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            fetchers,
            combiner,
            store,
        }
    }

    /// Score every asset once, stamped with the current time
    pub async fn run_once(&self, universe: &dyn AssetUniverse) -> Result<RunSummary> {
        self.run_at(universe, Utc::now()).await
    }

    /// Score every asset once, stamped with `run_ts`.
    ///
    /// Only a failure to list the universe is returned as an error. Per-asset failures are
    /// logged and counted; they never stop the run or undo earlier writes.
    pub async fn run_at(&self, universe: &dyn AssetUniverse, run_ts: DateTime<Utc>) -> Result<RunSummary> {
        let start = std::time::Instant::now();
        let assets = universe.list_assets().await?;

        tracing::info!("Aggregation run {} starting for {} assets", run_ts.to_rfc3339(), assets.len());

        let mut summary = RunSummary {
            run_ts,
            attempted: 0,
            scored: 0,
            skipped: 0,
            failed: 0,
        };

        for asset in &assets {
            summary.attempted += 1;
            match self.process_asset(asset, run_ts).await {
                Ok(AssetOutcome::Scored(scores)) => {
                    summary.scored += 1;
                    metrics::counter!("aggregator_assets_scored_total").increment(1);
                    tracing::debug!(
                        "Persisted {} ({}): combined={} composite={} rocket={}",
                        asset.symbol,
                        asset.external_id,
                        scores.combined,
                        scores.composite,
                        scores.rocket
                    );
                }
                Ok(AssetOutcome::Skipped) => {
                    summary.skipped += 1;
                    metrics::counter!("aggregator_assets_skipped_total").increment(1);
                    tracing::warn!("Skipped {} (id {}): no usable market data", asset.external_id, asset.id);
                }
                Err(e) => {
                    summary.failed += 1;
                    metrics::counter!("aggregator_assets_failed_total").increment(1);
                    tracing::error!("Asset pipeline failed for {} (id {}): {}", asset.external_id, asset.id, e);
                }
            }
        }

        let elapsed = start.elapsed();
        metrics::histogram!("aggregator_run_duration_seconds").record(elapsed.as_secs_f64());
        tracing::info!(
            "Aggregation run complete in {:?}: {} scored, {} skipped, {} failed of {}",
            elapsed,
            summary.scored,
            summary.skipped,
            summary.failed,
            summary.attempted
        );

        Ok(summary)
    }

    /// Gather one result per category. `None` when market data is unusable,
    /// since the market score has no neutral default.
    pub async fn collect_signals(&self, asset: &Asset) -> Option<CategorySignals> {
        let market = fetch_signal(self.fetchers.market.as_ref(), asset).await?;
        let onchain = fetch_signal(self.fetchers.onchain.as_ref(), asset).await;
        let social = fetch_signal(self.fetchers.social.as_ref(), asset).await;
        let dev = fetch_signal(self.fetchers.dev.as_ref(), asset).await;
        let tokenomics = fetch_signal(self.fetchers.tokenomics.as_ref(), asset).await;

        Some(CategorySignals {
            market,
            onchain,
            dev,
            social,
            tokenomics,
        })
    }

    async fn process_asset(&self, asset: &Asset, run_ts: DateTime<Utc>) -> Result<AssetOutcome> {
        let Some(signals) = self.collect_signals(asset).await else {
            return Ok(AssetOutcome::Skipped);
        };

        // Built fully in memory; the append is the only write
        let record = ScoreRecord {
            asset_id: asset.id,
            snapshot_ts: run_ts,
            scores: self.combiner.combine(&signals),
            raw: signals.raw_detail(),
        };

        self.store.append(&record).await?;
        Ok(AssetOutcome::Scored(record.scores))
    }
}
