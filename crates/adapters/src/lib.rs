// crates/adapters/src/lib.rs
use async_trait::async_trait;
use common::*;

pub mod coingecko;
mod rate_limiter;

pub use coingecko::CoinGeckoClient;
pub use rate_limiter::RateLimiter;

/// Time-series and community data for assets.
///
/// Fetchers depend only on this shape, so any provider that can answer
/// "last N days of price+volume" and "community counters" is substitutable.
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// Daily prices and volumes for the trailing `days` window
    async fn market_chart(&self, external_id: &str, days: u32) -> Result<MarketChart>;

    /// Follower-style counters for the asset's communities
    async fn community_counters(&self, external_id: &str) -> Result<CommunityCounters>;
}
