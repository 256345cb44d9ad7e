// crates/engine/src/store.rs
use async_trait::async_trait;
use common::config::DatabaseConfig;
use common::*;
use parking_lot::RwLock;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use std::collections::HashMap;

/// Source of the asset universe. Seeding happens elsewhere.
#[async_trait]
pub trait AssetUniverse: Send + Sync {
    async fn list_assets(&self) -> Result<Vec<Asset>>;
}

/// Append-only store of score snapshots
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Append one record. Fails with `DuplicateSnapshot` if `(asset_id, snapshot_ts)` exists.
    async fn append(&self, record: &ScoreRecord) -> Result<()>;

    /// Record with the greatest `snapshot_ts` for the asset
    async fn latest(&self, asset_id: i32) -> Result<Option<ScoreRecord>>;

    /// Up to `limit` records for the asset, newest first
    async fn history(&self, asset_id: i32, limit: usize) -> Result<Vec<ScoreRecord>>;

    /// Latest record of every asset, highest combined score first
    async fn latest_ranked(&self, limit: usize) -> Result<Vec<ScoreRecord>>;
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS coins (
        id SERIAL PRIMARY KEY,
        coingecko_id TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        symbol TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS signals (
        id BIGSERIAL PRIMARY KEY,
        coin_id INTEGER NOT NULL REFERENCES coins(id),
        snapshot_ts TIMESTAMPTZ NOT NULL,
        market_score INTEGER NOT NULL,
        onchain_score INTEGER NOT NULL,
        dev_score INTEGER NOT NULL,
        social_score INTEGER NOT NULL,
        tokenomics_score INTEGER NOT NULL,
        daa_score INTEGER NOT NULL,
        fees_in_token_score INTEGER NOT NULL,
        burn_rate_score INTEGER NOT NULL,
        liquidity_score INTEGER NOT NULL,
        vesting_risk_score INTEGER NOT NULL,
        composite_score INTEGER NOT NULL,
        rocket_score INTEGER NOT NULL,
        combined_score INTEGER NOT NULL,
        raw JSONB NOT NULL,
        UNIQUE (coin_id, snapshot_ts)
    )",
    "CREATE INDEX IF NOT EXISTS idx_signals_coin_ts ON signals (coin_id, snapshot_ts DESC)",
];

const RECORD_COLUMNS: &str = "coin_id, snapshot_ts, \
    market_score, onchain_score, dev_score, social_score, tokenomics_score, \
    daa_score, fees_in_token_score, burn_rate_score, liquidity_score, vesting_risk_score, \
    composite_score, rocket_score, combined_score, raw";

/// Bind value for a `LIMIT`. Limits past `i64::MAX` saturate so "everything" stays expressible.
fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Postgres-backed universe and snapshot store
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;
        Ok(Self { pool })
    }

    /// Create tables if missing
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!("Signal tables verified");
        Ok(())
    }

    /// Release all pooled connections
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn record_from_row(row: &PgRow) -> Result<ScoreRecord> {
    Ok(ScoreRecord {
        asset_id: row.try_get("coin_id")?,
        snapshot_ts: row.try_get("snapshot_ts")?,
        scores: Scores {
            market: row.try_get("market_score")?,
            onchain: row.try_get("onchain_score")?,
            dev: row.try_get("dev_score")?,
            social: row.try_get("social_score")?,
            tokenomics: row.try_get("tokenomics_score")?,
            activity_proxy: row.try_get("daa_score")?,
            fee_proxy: row.try_get("fees_in_token_score")?,
            burn_rate: row.try_get("burn_rate_score")?,
            liquidity: row.try_get("liquidity_score")?,
            vesting_risk: row.try_get("vesting_risk_score")?,
            composite: row.try_get("composite_score")?,
            rocket: row.try_get("rocket_score")?,
            combined: row.try_get("combined_score")?,
        },
        raw: row.try_get::<Json<serde_json::Value>, _>("raw")?.0,
    })
}

#[async_trait]
impl AssetUniverse for PgStore {
    async fn list_assets(&self) -> Result<Vec<Asset>> {
        let rows = sqlx::query("SELECT id, coingecko_id, symbol, name FROM coins ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<Asset> {
                Ok(Asset {
                    id: row.try_get("id")?,
                    external_id: row.try_get("coingecko_id")?,
                    symbol: row.try_get("symbol")?,
                    name: row.try_get("name")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl SnapshotStore for PgStore {
    async fn append(&self, record: &ScoreRecord) -> Result<()> {
        let s = &record.scores;
        let result = sqlx::query(&format!(
            "INSERT INTO signals ({}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
            RECORD_COLUMNS
        ))
        .bind(record.asset_id)
        .bind(record.snapshot_ts)
        .bind(s.market)
        .bind(s.onchain)
        .bind(s.dev)
        .bind(s.social)
        .bind(s.tokenomics)
        .bind(s.activity_proxy)
        .bind(s.fee_proxy)
        .bind(s.burn_rate)
        .bind(s.liquidity)
        .bind(s.vesting_risk)
        .bind(s.composite)
        .bind(s.rocket)
        .bind(s.combined)
        .bind(Json(&record.raw))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(Error::DuplicateSnapshot(
                format!("asset {} at {}", record.asset_id, record.snapshot_ts),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn latest(&self, asset_id: i32) -> Result<Option<ScoreRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM signals WHERE coin_id = $1 ORDER BY snapshot_ts DESC LIMIT 1",
            RECORD_COLUMNS
        ))
        .bind(asset_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn history(&self, asset_id: i32, limit: usize) -> Result<Vec<ScoreRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM signals WHERE coin_id = $1 ORDER BY snapshot_ts DESC LIMIT $2",
            RECORD_COLUMNS
        ))
        .bind(asset_id)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn latest_ranked(&self, limit: usize) -> Result<Vec<ScoreRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {cols} FROM ( \
                SELECT DISTINCT ON (coin_id) {cols} FROM signals \
                ORDER BY coin_id, snapshot_ts DESC \
             ) latest \
             ORDER BY combined_score DESC, coin_id \
             LIMIT $1",
            cols = RECORD_COLUMNS
        ))
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }
}

/// In-process store with the same semantics as `PgStore`
#[derive(Default)]
pub struct MemoryStore {
    assets: Vec<Asset>,
    records: RwLock<Vec<ScoreRecord>>,
}

impl MemoryStore {
    pub fn with_assets(assets: Vec<Asset>) -> Self {
        Self {
            assets,
            records: RwLock::new(Vec::new()),
        }
    }

    pub fn records(&self) -> Vec<ScoreRecord> {
        self.records.read().clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl AssetUniverse for MemoryStore {
    async fn list_assets(&self) -> Result<Vec<Asset>> {
        Ok(self.assets.clone())
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn append(&self, record: &ScoreRecord) -> Result<()> {
        let mut records = self.records.write();
        if records
            .iter()
            .any(|r| r.asset_id == record.asset_id && r.snapshot_ts == record.snapshot_ts)
        {
            return Err(Error::DuplicateSnapshot(format!(
                "asset {} at {}",
                record.asset_id, record.snapshot_ts
            )));
        }
        records.push(record.clone());
        Ok(())
    }

    async fn latest(&self, asset_id: i32) -> Result<Option<ScoreRecord>> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|r| r.asset_id == asset_id)
            .max_by_key(|r| r.snapshot_ts)
            .cloned())
    }

    async fn history(&self, asset_id: i32, limit: usize) -> Result<Vec<ScoreRecord>> {
        let mut history: Vec<ScoreRecord> = self
            .records
            .read()
            .iter()
            .filter(|r| r.asset_id == asset_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.snapshot_ts.cmp(&a.snapshot_ts));
        history.truncate(limit);
        Ok(history)
    }

    async fn latest_ranked(&self, limit: usize) -> Result<Vec<ScoreRecord>> {
        let mut latest: HashMap<i32, ScoreRecord> = HashMap::new();
        for record in self.records.read().iter() {
            match latest.get(&record.asset_id) {
                Some(current) if current.snapshot_ts >= record.snapshot_ts => {}
                _ => {
                    latest.insert(record.asset_id, record.clone());
                }
            }
        }

        let mut ranked: Vec<ScoreRecord> = latest.into_values().collect();
        ranked.sort_by(|a, b| {
            b.scores
                .combined
                .cmp(&a.scores.combined)
                .then(a.asset_id.cmp(&b.asset_id))
        });
        ranked.truncate(limit);
        Ok(ranked)
    }
}
