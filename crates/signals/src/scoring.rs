// crates/signals/src/scoring.rs
use crate::fetchers::keys;
use common::*;
use serde_json::{Map, Value};

const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Risk-weighted sub-metrics feeding the rocket score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubMetric {
    ActivityProxy,
    FeeProxy,
    BurnRate,
    Liquidity,
    VestingRisk,
}

impl SubMetric {
    /// Where the sub-metric is read from: `(category, value key, neutral default)`.
    ///
    /// This is the single table of fallbacks applied when a category is unavailable or
    /// did not report the key. Defaults are priors, not zeros, so missing data pulls the
    /// rocket score toward neutral.
    pub fn source(&self) -> (SignalCategory, &'static str, f64) {
        match self {
            SubMetric::ActivityProxy => (SignalCategory::OnChain, keys::DAA_SCORE, 50.0),
            SubMetric::FeeProxy => (SignalCategory::OnChain, keys::FEES_IN_TOKEN, 50.0),
            SubMetric::BurnRate => (SignalCategory::Tokenomics, keys::BURN_RATE, 50.0),
            SubMetric::Liquidity => (SignalCategory::OnChain, keys::LIQUIDITY, 50.0),
            SubMetric::VestingRisk => (SignalCategory::Tokenomics, keys::VESTING_RISK, 25.0),
        }
    }
}

/// Overall score assumed for an unavailable category
pub fn default_overall(_category: SignalCategory) -> f64 {
    NEUTRAL_SCORE
}

/// One result per category; market is required, the rest may be unavailable
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySignals {
    pub market: SignalResult,
    pub onchain: Option<SignalResult>,
    pub dev: Option<SignalResult>,
    pub social: Option<SignalResult>,
    pub tokenomics: Option<SignalResult>,
}

impl CategorySignals {
    pub fn get(&self, category: SignalCategory) -> Option<&SignalResult> {
        match category {
            SignalCategory::Market => Some(&self.market),
            SignalCategory::OnChain => self.onchain.as_ref(),
            SignalCategory::Dev => self.dev.as_ref(),
            SignalCategory::Social => self.social.as_ref(),
            SignalCategory::Tokenomics => self.tokenomics.as_ref(),
        }
    }

    /// Category score with the neutral default applied
    pub fn overall(&self, category: SignalCategory) -> f64 {
        self.get(category)
            .map(|r| clamp(r.overall))
            .unwrap_or_else(|| default_overall(category))
    }

    /// Sub-metric with the neutral default applied
    pub fn sub_metric(&self, metric: SubMetric) -> f64 {
        let (category, key, default) = metric.source();
        self.get(category)
            .and_then(|r| r.value(key))
            .map(clamp)
            .unwrap_or(default)
    }

    /// Audit payload describing the inputs; unavailable categories are `null`
    pub fn raw_detail(&self) -> Value {
        let mut detail = Map::new();
        for category in SignalCategory::ALL {
            detail.insert(category.as_str().to_string(), result_detail(self.get(category)));
        }
        detail.insert(
            keys::PCT7.to_string(),
            self.market.value(keys::PCT7).map(Value::from).unwrap_or(Value::Null),
        );
        Value::Object(detail)
    }
}

fn result_detail(result: Option<&SignalResult>) -> Value {
    let Some(result) = result else {
        return Value::Null;
    };

    let mut detail = Map::new();
    detail.insert("overall".to_string(), Value::from(result.overall));
    for (key, value) in &result.values {
        detail.insert(key.clone(), Value::from(*value));
    }
    Value::Object(detail)
}

/// Broad quality score weights
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeWeights {
    pub market: f64,
    pub onchain: f64,
    pub dev: f64,
    pub social: f64,
    pub tokenomics: f64,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            market: 0.40,
            onchain: 0.20,
            dev: 0.15,
            social: 0.15,
            tokenomics: 0.10,
        }
    }
}

/// Momentum and activity weights. `vesting_safety` applies to `100 - vesting_risk`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RocketWeights {
    pub activity_proxy: f64,
    pub fee_proxy: f64,
    pub burn_rate: f64,
    pub liquidity: f64,
    pub vesting_safety: f64,
}

impl Default for RocketWeights {
    fn default() -> Self {
        Self {
            activity_proxy: 0.30,
            fee_proxy: 0.25,
            burn_rate: 0.20,
            liquidity: 0.15,
            vesting_safety: 0.10,
        }
    }
}

/// Blend of composite and rocket into the final score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendWeights {
    pub composite: f64,
    pub rocket: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            composite: 0.55,
            rocket: 0.45,
        }
    }
}

trait WeightTable {
    const NAME: &'static str;

    fn weights(&self) -> Vec<f64>;

    fn sum(&self) -> f64 {
        self.weights().iter().sum()
    }

    fn validate(&self) -> Result<()> {
        if self.weights().iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::Config(format!("{} weights must be non-negative", Self::NAME)));
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(Error::Config(format!("{} weights sum to {}, expected 1.0", Self::NAME, sum)));
        }
        Ok(())
    }
}

impl WeightTable for CompositeWeights {
    const NAME: &'static str = "composite";

    fn weights(&self) -> Vec<f64> {
        vec![self.market, self.onchain, self.dev, self.social, self.tokenomics]
    }
}

impl WeightTable for RocketWeights {
    const NAME: &'static str = "rocket";

    fn weights(&self) -> Vec<f64> {
        vec![
            self.activity_proxy,
            self.fee_proxy,
            self.burn_rate,
            self.liquidity,
            self.vesting_safety,
        ]
    }
}

impl WeightTable for BlendWeights {
    const NAME: &'static str = "blend";

    fn weights(&self) -> Vec<f64> {
        vec![self.composite, self.rocket]
    }
}

/// Unrounded scores; converted to `Scores` only at the storage boundary
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreCard {
    pub market: f64,
    pub onchain: f64,
    pub dev: f64,
    pub social: f64,
    pub tokenomics: f64,

    pub activity_proxy: f64,
    pub fee_proxy: f64,
    pub burn_rate: f64,
    pub liquidity: f64,
    pub vesting_risk: f64,

    pub composite: f64,
    pub rocket: f64,
    pub combined: f64,
}

impl ScoreCard {
    pub fn to_scores(&self) -> Scores {
        Scores {
            market: stored_score(self.market),
            onchain: stored_score(self.onchain),
            dev: stored_score(self.dev),
            social: stored_score(self.social),
            tokenomics: stored_score(self.tokenomics),
            activity_proxy: stored_score(self.activity_proxy),
            fee_proxy: stored_score(self.fee_proxy),
            burn_rate: stored_score(self.burn_rate),
            liquidity: stored_score(self.liquidity),
            vesting_risk: stored_score(self.vesting_risk),
            composite: stored_score(self.composite),
            rocket: stored_score(self.rocket),
            combined: stored_score(self.combined),
        }
    }
}

/// Fixed weighted formula turning category signals into scores. No I/O.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreCombiner {
    composite: CompositeWeights,
    rocket: RocketWeights,
    blend: BlendWeights,
}

impl ScoreCombiner {
    pub fn new(composite: CompositeWeights, rocket: RocketWeights, blend: BlendWeights) -> Result<Self> {
        composite.validate()?;
        rocket.validate()?;
        blend.validate()?;
        Ok(Self { composite, rocket, blend })
    }

    pub fn composite_weights(&self) -> &CompositeWeights {
        &self.composite
    }

    pub fn rocket_weights(&self) -> &RocketWeights {
        &self.rocket
    }

    pub fn blend_weights(&self) -> &BlendWeights {
        &self.blend
    }

    pub fn score_card(&self, signals: &CategorySignals) -> ScoreCard {
        let market = signals.overall(SignalCategory::Market);
        let onchain = signals.overall(SignalCategory::OnChain);
        let dev = signals.overall(SignalCategory::Dev);
        let social = signals.overall(SignalCategory::Social);
        let tokenomics = signals.overall(SignalCategory::Tokenomics);

        let activity_proxy = signals.sub_metric(SubMetric::ActivityProxy);
        let fee_proxy = signals.sub_metric(SubMetric::FeeProxy);
        let burn_rate = signals.sub_metric(SubMetric::BurnRate);
        let liquidity = signals.sub_metric(SubMetric::Liquidity);
        let vesting_risk = signals.sub_metric(SubMetric::VestingRisk);

        let w = &self.composite;
        let composite = clamp(
            w.market * market
                + w.onchain * onchain
                + w.dev * dev
                + w.social * social
                + w.tokenomics * tokenomics,
        );

        let r = &self.rocket;
        let rocket = clamp(
            r.activity_proxy * activity_proxy
                + r.fee_proxy * fee_proxy
                + r.burn_rate * burn_rate
                + r.liquidity * liquidity
                + r.vesting_safety * (SCORE_MAX - vesting_risk),
        );

        let combined = clamp(self.blend.composite * composite + self.blend.rocket * rocket);

        ScoreCard {
            market,
            onchain,
            dev,
            social,
            tokenomics,
            activity_proxy,
            fee_proxy,
            burn_rate,
            liquidity,
            vesting_risk,
            composite,
            rocket,
            combined,
        }
    }

    /// Stored scores for one asset
    pub fn combine(&self, signals: &CategorySignals) -> Scores {
        self.score_card(signals).to_scores()
    }
}
