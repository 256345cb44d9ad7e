// crates/engine/tests/run_loop.rs
use adapters::SignalSource;
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use common::*;
use engine::*;
use signals::{FetcherSet, ScoreCombiner};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
struct Script {
    chart: Option<MarketChart>,
    counters: Option<CommunityCounters>,
}

/// Per-asset canned responses; unknown assets fail with a 500
#[derive(Default)]
struct ScriptedSource {
    scripts: HashMap<String, Script>,
}

impl ScriptedSource {
    fn with(mut self, external_id: &str, script: Script) -> Self {
        self.scripts.insert(external_id.to_string(), script);
        self
    }

    fn failure() -> Error {
        Error::DataSource {
            status: 500,
            message: "scripted failure".to_string(),
        }
    }
}

#[async_trait]
impl SignalSource for ScriptedSource {
    async fn market_chart(&self, external_id: &str, _days: u32) -> Result<MarketChart> {
        self.scripts
            .get(external_id)
            .and_then(|s| s.chart.clone())
            .ok_or_else(Self::failure)
    }

    async fn community_counters(&self, external_id: &str) -> Result<CommunityCounters> {
        self.scripts
            .get(external_id)
            .and_then(|s| s.counters)
            .ok_or_else(Self::failure)
    }
}

/// Store that refuses writes for one asset
struct FlakyStore {
    inner: MemoryStore,
    failing_asset: i32,
}

#[async_trait]
impl SnapshotStore for FlakyStore {
    async fn append(&self, record: &ScoreRecord) -> Result<()> {
        if record.asset_id == self.failing_asset {
            return Err(Error::Internal("connection reset".to_string()));
        }
        self.inner.append(record).await
    }

    async fn latest(&self, asset_id: i32) -> Result<Option<ScoreRecord>> {
        self.inner.latest(asset_id).await
    }

    async fn history(&self, asset_id: i32, limit: usize) -> Result<Vec<ScoreRecord>> {
        self.inner.history(asset_id, limit).await
    }

    async fn latest_ranked(&self, limit: usize) -> Result<Vec<ScoreRecord>> {
        self.inner.latest_ranked(limit).await
    }
}

struct BrokenUniverse;

#[async_trait]
impl AssetUniverse for BrokenUniverse {
    async fn list_assets(&self) -> Result<Vec<Asset>> {
        Err(Error::Internal("relation \"coins\" does not exist".to_string()))
    }
}

fn asset(id: i32, external_id: &str) -> Asset {
    Asset {
        id,
        external_id: external_id.to_string(),
        symbol: external_id[..3].to_string(),
        name: external_id.to_string(),
    }
}

fn points(values: &[f64]) -> Vec<PricePoint> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| PricePoint::new(1_700_000_000_000 + i as i64 * 86_400_000, *v))
        .collect()
}

/// Ten daily points: price 100 seven periods back, 110 now; volume 150 against a 100 average
fn healthy_chart() -> MarketChart {
    MarketChart {
        prices: points(&[90.0, 92.0, 95.0, 100.0, 102.0, 104.0, 105.0, 107.0, 108.0, 110.0]),
        volumes: points(&[80.0, 90.0, 95.0, 100.0, 100.0, 100.0, 100.0, 75.0, 75.0, 150.0]),
    }
}

fn healthy_script() -> Script {
    Script {
        chart: Some(healthy_chart()),
        counters: Some(CommunityCounters {
            twitter_followers: 9_000,
            reddit_subscribers: 1_000,
        }),
    }
}

fn aggregator(source: ScriptedSource, store: Arc<dyn SnapshotStore>) -> Aggregator {
    Aggregator::new(
        FetcherSet::standard(Arc::new(source), 30),
        ScoreCombiner::default(),
        store,
    )
}

#[tokio::test]
async fn test_full_run_scores_every_asset() {
    let store = Arc::new(MemoryStore::with_assets(vec![
        asset(1, "bitcoin"),
        asset(2, "ethereum"),
    ]));
    let source = ScriptedSource::default()
        .with("bitcoin", healthy_script())
        .with("ethereum", healthy_script());

    let summary = aggregator(source, store.clone()).run_once(store.as_ref()).await.unwrap();

    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.scored, 2);
    assert_eq!(summary.failed, 0);

    let records = store.records();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.snapshot_ts == summary.run_ts));
    assert!(records.iter().all(|r| r.scores.is_bounded()));

    let scores = records[0].scores;
    assert_eq!(scores.market, 60);
    assert_eq!(scores.activity_proxy, 75);
    assert_eq!(scores.fee_proxy, 67);
    assert_eq!(scores.liquidity, 45);
    // log10(10_000) * 20
    assert_eq!(scores.social, 80);
    assert_eq!(scores.dev, 50);
    assert_eq!(scores.burn_rate, 50);
    assert_eq!(scores.vesting_risk, 25);
    assert_eq!(scores.composite, 62);
    assert_eq!(scores.rocket, 63);
    assert_eq!(scores.combined, 63);

    assert_eq!(records[0].raw["pct7"], serde_json::Value::from(10.0));
    assert_eq!(records[0].raw["social"]["twitter_followers"], serde_json::Value::from(9_000.0));
}

#[tokio::test]
async fn test_short_market_series_skips_asset() {
    let store = Arc::new(MemoryStore::with_assets(vec![
        asset(1, "newcoin"),
        asset(2, "bitcoin"),
    ]));
    let short = Script {
        chart: Some(MarketChart {
            prices: points(&[1.0, 1.1, 1.2, 1.3, 1.4, 1.5, 1.6]),
            volumes: points(&[5.0; 7]),
        }),
        counters: Some(CommunityCounters::default()),
    };
    let source = ScriptedSource::default()
        .with("newcoin", short)
        .with("bitcoin", healthy_script());

    let summary = aggregator(source, store.clone()).run_once(store.as_ref()).await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.scored, 1);
    assert_eq!(summary.failed, 0);
    assert!(store.latest(1).await.unwrap().is_none());
    assert!(store.latest(2).await.unwrap().is_some());
}

#[tokio::test]
async fn test_market_transport_error_skips_asset() {
    let store = Arc::new(MemoryStore::with_assets(vec![asset(1, "delisted"), asset(2, "bitcoin")]));
    let source = ScriptedSource::default().with("bitcoin", healthy_script());

    let summary = aggregator(source, store.clone()).run_once(store.as_ref()).await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_onchain_unavailable_defaults_to_neutral() {
    let store = Arc::new(MemoryStore::with_assets(vec![asset(1, "bitcoin")]));
    let mut script = healthy_script();
    if let Some(chart) = script.chart.as_mut() {
        chart.volumes.truncate(4);
    }
    let source = ScriptedSource::default().with("bitcoin", script);

    let summary = aggregator(source, store.clone()).run_once(store.as_ref()).await.unwrap();
    assert_eq!(summary.scored, 1);

    let record = store.latest(1).await.unwrap().unwrap();
    assert_eq!(record.scores.market, 60);
    assert_eq!(record.scores.onchain, 50);
    assert_eq!(record.scores.activity_proxy, 50);
    assert_eq!(record.scores.fee_proxy, 50);
    assert_eq!(record.scores.liquidity, 50);
    assert_eq!(record.raw["onchain"], serde_json::Value::Null);
}

#[tokio::test]
async fn test_social_failure_scores_neutral() {
    let store = Arc::new(MemoryStore::with_assets(vec![asset(1, "bitcoin")]));
    let script = Script {
        counters: None,
        ..healthy_script()
    };
    let source = ScriptedSource::default().with("bitcoin", script);

    aggregator(source, store.clone()).run_once(store.as_ref()).await.unwrap();

    let record = store.latest(1).await.unwrap().unwrap();
    assert_eq!(record.scores.social, 50);
    // Reported as a neutral result, not as unavailable
    assert_eq!(record.raw["social"]["overall"], serde_json::Value::from(50.0));
}

#[tokio::test]
async fn test_persist_failure_does_not_stop_run() {
    let universe = MemoryStore::with_assets(vec![
        asset(1, "bitcoin"),
        asset(2, "ethereum"),
        asset(3, "solana"),
    ]);
    let store = Arc::new(FlakyStore {
        inner: MemoryStore::default(),
        failing_asset: 2,
    });
    let source = ScriptedSource::default()
        .with("bitcoin", healthy_script())
        .with("ethereum", healthy_script())
        .with("solana", healthy_script());

    let summary = aggregator(source, store.clone()).run_once(&universe).await.unwrap();

    assert_eq!(summary.attempted, 3);
    assert_eq!(summary.scored, 2);
    assert_eq!(summary.failed, 1);
    assert!(store.latest(1).await.unwrap().is_some());
    assert!(store.latest(2).await.unwrap().is_none());
    assert!(store.latest(3).await.unwrap().is_some());
}

#[tokio::test]
async fn test_universe_failure_aborts_run() {
    let store = Arc::new(MemoryStore::default());
    let result = aggregator(ScriptedSource::default(), store.clone())
        .run_once(&BrokenUniverse)
        .await;

    assert!(result.is_err());
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_repeated_runs_append_distinct_snapshots() {
    let store = Arc::new(MemoryStore::with_assets(vec![asset(1, "bitcoin")]));
    let first = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
    let second = first + Duration::hours(24);

    let run = |ts: chrono::DateTime<Utc>| {
        let store = store.clone();
        async move {
            let source = ScriptedSource::default().with("bitcoin", healthy_script());
            aggregator(source, store.clone()).run_at(store.as_ref(), ts).await.unwrap()
        }
    };

    // Later run written first: "latest" must follow the timestamp, not insertion order
    run(second).await;
    run(first).await;

    let history = store.history(1, 200).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].snapshot_ts, second);
    assert_eq!(history[1].snapshot_ts, first);
    assert_eq!(store.latest(1).await.unwrap().unwrap().snapshot_ts, second);
}

#[tokio::test]
async fn test_rerun_with_same_timestamp_is_rejected_per_asset() {
    let store = Arc::new(MemoryStore::with_assets(vec![asset(1, "bitcoin")]));
    let ts = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();

    let source = ScriptedSource::default().with("bitcoin", healthy_script());
    let aggregator = aggregator(source, store.clone());

    let first = aggregator.run_at(store.as_ref(), ts).await.unwrap();
    let second = aggregator.run_at(store.as_ref(), ts).await.unwrap();

    assert_eq!(first.scored, 1);
    assert_eq!(second.failed, 1);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_latest_ranked_after_run() {
    let store = Arc::new(MemoryStore::with_assets(vec![asset(1, "flatcoin"), asset(2, "bitcoin")]));
    let flat = Script {
        chart: Some(MarketChart {
            prices: points(&[100.0; 10]),
            volumes: points(&[100.0; 10]),
        }),
        counters: Some(CommunityCounters::default()),
    };
    let source = ScriptedSource::default()
        .with("flatcoin", flat)
        .with("bitcoin", healthy_script());

    aggregator(source, store.clone()).run_once(store.as_ref()).await.unwrap();

    let ranked = store.latest_ranked(50).await.unwrap();
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].asset_id, 2);
    assert!(ranked[0].scores.combined >= ranked[1].scores.combined);
}
