// crates/common/src/lib.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub mod config;
pub mod error;

pub use error::{Error, Result};

/// Lower bound of every score and sub-metric
pub const SCORE_MIN: f64 = 0.0;
/// Upper bound of every score and sub-metric
pub const SCORE_MAX: f64 = 100.0;
/// Score substituted when a category has nothing to say
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Bound a derived value to [0, 100]. NaN maps to the lower bound.
pub fn clamp(v: f64) -> f64 {
    clamp_to(v, SCORE_MIN, SCORE_MAX)
}

pub fn clamp_to(v: f64, lo: f64, hi: f64) -> f64 {
    v.max(lo).min(hi)
}

/// Tradable asset from the externally seeded universe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: i32,
    /// Identifier at the data source (e.g. a CoinGecko coin id)
    pub external_id: String,
    pub symbol: String,
    pub name: String,
}

/// One `(timestamp, value)` sample of a daily series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp_ms: i64,
    pub value: f64,
}

impl PricePoint {
    pub fn new(timestamp_ms: i64, value: f64) -> Self {
        Self { timestamp_ms, value }
    }
}

/// Trailing window of prices and volumes for one asset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketChart {
    pub prices: Vec<PricePoint>,
    pub volumes: Vec<PricePoint>,
}

/// Community counters reported by the data source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityCounters {
    pub twitter_followers: u64,
    pub reddit_subscribers: u64,
}

impl CommunityCounters {
    pub fn total(&self) -> u64 {
        self.twitter_followers.saturating_add(self.reddit_subscribers)
    }
}

/// Signal categories feeding the combiner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalCategory {
    Market,
    OnChain,
    Dev,
    Social,
    Tokenomics,
}

impl SignalCategory {
    pub const ALL: [SignalCategory; 5] = [
        SignalCategory::Market,
        SignalCategory::OnChain,
        SignalCategory::Dev,
        SignalCategory::Social,
        SignalCategory::Tokenomics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalCategory::Market => "market",
            SignalCategory::OnChain => "onchain",
            SignalCategory::Dev => "dev",
            SignalCategory::Social => "social",
            SignalCategory::Tokenomics => "tokenomics",
        }
    }
}

impl fmt::Display for SignalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one category fetch for one asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalResult {
    pub category: SignalCategory,
    /// Bounded category score in [0, 100]
    pub overall: f64,
    /// Named raw and derived values, kept for sub-scores and audit
    pub values: BTreeMap<String, f64>,
}

impl SignalResult {
    pub fn new(category: SignalCategory, overall: f64) -> Self {
        Self {
            category,
            overall: clamp(overall),
            values: BTreeMap::new(),
        }
    }

    /// Neutral result carrying no values
    pub fn neutral(category: SignalCategory) -> Self {
        Self::new(category, NEUTRAL_SCORE)
    }

    pub fn with_value(mut self, key: &str, value: f64) -> Self {
        self.values.insert(key.to_string(), value);
        self
    }

    pub fn value(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }
}

/// Scores as stored: every field rounded to an integer in [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    pub market: i32,
    pub onchain: i32,
    pub dev: i32,
    pub social: i32,
    pub tokenomics: i32,

    pub activity_proxy: i32,
    pub fee_proxy: i32,
    pub burn_rate: i32,
    pub liquidity: i32,
    pub vesting_risk: i32,

    pub composite: i32,
    pub rocket: i32,
    pub combined: i32,
}

impl Scores {
    pub fn as_array(&self) -> [i32; 13] {
        [
            self.market,
            self.onchain,
            self.dev,
            self.social,
            self.tokenomics,
            self.activity_proxy,
            self.fee_proxy,
            self.burn_rate,
            self.liquidity,
            self.vesting_risk,
            self.composite,
            self.rocket,
            self.combined,
        ]
    }

    pub fn is_bounded(&self) -> bool {
        self.as_array().iter().all(|v| (0..=100).contains(v))
    }
}

/// Round a score for storage, clamping first
pub fn stored_score(v: f64) -> i32 {
    clamp(v).round() as i32
}

/// Immutable snapshot of one asset at one run timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub asset_id: i32,
    pub snapshot_ts: DateTime<Utc>,
    pub scores: Scores,
    /// Inputs that produced the scores, for audit and replay
    pub raw: serde_json::Value,
}
