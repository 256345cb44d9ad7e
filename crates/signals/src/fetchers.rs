// crates/signals/src/fetchers.rs
use adapters::SignalSource;
use async_trait::async_trait;
use common::*;
use std::sync::Arc;
use tracing::Level;

/// Fewest points a daily series needs before it is trusted
pub const MIN_SERIES_POINTS: usize = 8;
/// Look-back used by momentum and volume deviation
pub const MOMENTUM_PERIODS: usize = 7;

/// Value keys carried in `SignalResult::values`
pub mod keys {
    pub const PCT7: &str = "pct7";
    pub const PRICE_NOW: &str = "price_now";
    pub const PRICE_THEN: &str = "price_then";
    pub const VOL_PCT: &str = "vol_pct";
    pub const DAA_SCORE: &str = "daa_score";
    pub const FEES_IN_TOKEN: &str = "fees_in_token";
    pub const LIQUIDITY: &str = "liquidity";
    pub const BURN_RATE: &str = "burn_rate";
    pub const VESTING_RISK: &str = "vesting_risk";
    pub const TWITTER_FOLLOWERS: &str = "twitter_followers";
    pub const REDDIT_SUBSCRIBERS: &str = "reddit_subscribers";
}

/// What a fetcher yields when its source fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Report the category as unavailable; the combiner applies its defaults
    Unavailable,
    /// Report a neutral result (overall 50, no values) as if the fetch succeeded.
    /// Only the social category uses this; its scores depend on it.
    Neutral,
}

/// One signal category for one asset
#[async_trait]
pub trait SignalFetcher: Send + Sync {
    fn category(&self) -> SignalCategory;

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Unavailable
    }

    async fn try_fetch(&self, asset: &Asset) -> Result<SignalResult>;
}

/// Log level for a failed fetch: missing or unusable data is expected, transport faults are not
pub fn failure_level(e: &Error) -> Level {
    if e.is_data_unavailable() {
        Level::WARN
    } else {
        Level::ERROR
    }
}

/// Run a fetcher, converting any error according to its failure policy.
/// Never returns an error; `None` means the category is unavailable.
pub async fn fetch_signal(fetcher: &dyn SignalFetcher, asset: &Asset) -> Option<SignalResult> {
    let category = fetcher.category();
    let e = match fetcher.try_fetch(asset).await {
        Ok(result) => return Some(result),
        Err(e) => e,
    };

    metrics::counter!("aggregator_signal_unavailable_total", "category" => category.as_str()).increment(1);

    let (outcome, fallback) = match fetcher.failure_policy() {
        FailurePolicy::Unavailable => ("unavailable", None),
        FailurePolicy::Neutral => ("failed, using neutral result", Some(SignalResult::neutral(category))),
    };
    if failure_level(&e) == Level::WARN {
        tracing::warn!("{} signal {} for {}: {}", category, outcome, asset.external_id, e);
    } else {
        tracing::error!("{} signal {} for {}: {}", category, outcome, asset.external_id, e);
    }

    fallback
}

fn require_points(series: &[PricePoint], what: &str) -> Result<()> {
    if series.len() < MIN_SERIES_POINTS {
        return Err(Error::InsufficientData(format!(
            "{} {} points, need {}",
            series.len(),
            what,
            MIN_SERIES_POINTS
        )));
    }
    Ok(())
}

/// Percent change from the point `periods` back (index `max(0, len - periods)`) to the last
/// point. Tolerates series shorter than `periods`.
pub fn pct_change(series: &[PricePoint], periods: usize) -> Result<f64> {
    let (Some(now), Some(then)) = (series.last(), series.get(series.len().saturating_sub(periods)))
    else {
        return Err(Error::InsufficientData("empty price series".to_string()));
    };

    let pct = (now.value - then.value) / then.value * 100.0;
    if !pct.is_finite() {
        return Err(Error::InvalidData(format!(
            "price change from {} to {} is not finite",
            then.value, now.value
        )));
    }
    Ok(pct)
}

/// Deviation of the last volume from the mean of the trailing `periods` volumes, in percent.
/// The mean is floored at 1 so near-zero volume cannot blow up the ratio.
pub fn volume_deviation(series: &[PricePoint], periods: usize) -> Result<f64> {
    let window = &series[series.len().saturating_sub(periods)..];
    let Some(now) = window.last() else {
        return Err(Error::InsufficientData("empty volume series".to_string()));
    };

    let avg = window.iter().map(|p| p.value).sum::<f64>() / window.len() as f64;
    let pct = (now.value - avg) / avg.max(1.0) * 100.0;
    if !pct.is_finite() {
        return Err(Error::InvalidData("volume deviation is not finite".to_string()));
    }
    Ok(pct)
}

/// Price momentum: 50 when flat, +/-1 per percent of 7-period change
pub struct MarketFetcher {
    source: Arc<dyn SignalSource>,
    history_days: u32,
}

impl MarketFetcher {
    pub fn new(source: Arc<dyn SignalSource>, history_days: u32) -> Self {
        Self { source, history_days }
    }
}

#[async_trait]
impl SignalFetcher for MarketFetcher {
    fn category(&self) -> SignalCategory {
        SignalCategory::Market
    }

    async fn try_fetch(&self, asset: &Asset) -> Result<SignalResult> {
        let chart = self.source.market_chart(&asset.external_id, self.history_days).await?;
        require_points(&chart.prices, "price")?;

        let pct7 = pct_change(&chart.prices, MOMENTUM_PERIODS)?;
        let len = chart.prices.len();

        Ok(SignalResult::new(SignalCategory::Market, clamp(NEUTRAL_SCORE + pct7))
            .with_value(keys::PCT7, pct7)
            .with_value(keys::PRICE_NOW, chart.prices[len - 1].value)
            .with_value(keys::PRICE_THEN, chart.prices[len.saturating_sub(MOMENTUM_PERIODS)].value))
    }
}

/// On-chain activity proxy derived from traded volume and price stability
pub struct OnChainFetcher {
    source: Arc<dyn SignalSource>,
    history_days: u32,
}

impl OnChainFetcher {
    pub fn new(source: Arc<dyn SignalSource>, history_days: u32) -> Self {
        Self { source, history_days }
    }
}

#[async_trait]
impl SignalFetcher for OnChainFetcher {
    fn category(&self) -> SignalCategory {
        SignalCategory::OnChain
    }

    async fn try_fetch(&self, asset: &Asset) -> Result<SignalResult> {
        let chart = self.source.market_chart(&asset.external_id, self.history_days).await?;
        require_points(&chart.prices, "price")?;
        require_points(&chart.volumes, "volume")?;

        let pct7 = pct_change(&chart.prices, MOMENTUM_PERIODS)?;
        let vol_pct = volume_deviation(&chart.volumes, MOMENTUM_PERIODS)?;

        let daa_score = clamp(NEUTRAL_SCORE + vol_pct / 2.0);
        let fees_in_token = clamp(NEUTRAL_SCORE + vol_pct / 3.0);
        // Large moves either way read as thinner liquidity
        let liquidity = clamp(NEUTRAL_SCORE - pct7.abs() / 2.0);

        let overall = (0.5 * daa_score + 0.3 * fees_in_token + 0.2 * liquidity).round();

        Ok(SignalResult::new(SignalCategory::OnChain, overall)
            .with_value(keys::DAA_SCORE, daa_score)
            .with_value(keys::FEES_IN_TOKEN, fees_in_token)
            .with_value(keys::LIQUIDITY, liquidity)
            .with_value(keys::PCT7, pct7)
            .with_value(keys::VOL_PCT, vol_pct))
    }
}

/// Community size on a log scale: 20 points per decade of followers
pub struct SocialFetcher {
    source: Arc<dyn SignalSource>,
}

impl SocialFetcher {
    pub fn new(source: Arc<dyn SignalSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl SignalFetcher for SocialFetcher {
    fn category(&self) -> SignalCategory {
        SignalCategory::Social
    }

    // Unlike market and on-chain, a failed social fetch scores neutral instead of unavailable.
    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Neutral
    }

    async fn try_fetch(&self, asset: &Asset) -> Result<SignalResult> {
        let counters = self.source.community_counters(&asset.external_id).await?;
        let total = counters.total().max(1) as f64;

        Ok(SignalResult::new(SignalCategory::Social, clamp(total.log10() * 20.0))
            .with_value(keys::TWITTER_FOLLOWERS, counters.twitter_followers as f64)
            .with_value(keys::REDDIT_SUBSCRIBERS, counters.reddit_subscribers as f64))
    }
}

/// Fixed result for categories without a data source yet
pub struct StaticFetcher {
    result: SignalResult,
}

impl StaticFetcher {
    pub fn new(result: SignalResult) -> Self {
        Self { result }
    }

    pub fn dev() -> Self {
        Self::new(SignalResult::neutral(SignalCategory::Dev))
    }

    pub fn tokenomics() -> Self {
        Self::new(
            SignalResult::neutral(SignalCategory::Tokenomics)
                .with_value(keys::BURN_RATE, 50.0)
                .with_value(keys::VESTING_RISK, 25.0),
        )
    }
}

#[async_trait]
impl SignalFetcher for StaticFetcher {
    fn category(&self) -> SignalCategory {
        self.result.category
    }

    async fn try_fetch(&self, _asset: &Asset) -> Result<SignalResult> {
        Ok(self.result.clone())
    }
}

/// One fetcher per category
pub struct FetcherSet {
    pub market: Box<dyn SignalFetcher>,
    pub onchain: Box<dyn SignalFetcher>,
    pub dev: Box<dyn SignalFetcher>,
    pub social: Box<dyn SignalFetcher>,
    pub tokenomics: Box<dyn SignalFetcher>,
}

impl FetcherSet {
    /// Market, on-chain and social backed by `source`; dev and tokenomics static
    pub fn standard(source: Arc<dyn SignalSource>, history_days: u32) -> Self {
        Self {
            market: Box::new(MarketFetcher::new(source.clone(), history_days)),
            onchain: Box::new(OnChainFetcher::new(source.clone(), history_days)),
            dev: Box::new(StaticFetcher::dev()),
            social: Box::new(SocialFetcher::new(source)),
            tokenomics: Box::new(StaticFetcher::tokenomics()),
        }
    }
}
