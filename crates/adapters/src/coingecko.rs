// crates/adapters/src/coingecko.rs
use crate::*;
use common::config::SourceConfig;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

const API_KEY_HEADER: &str = "x-cg-demo-api-key";

/// CoinGecko REST client
pub struct CoinGeckoClient {
    base_url: String,
    api_key: Option<String>,
    vs_currency: String,
    rate_limiter: RateLimiter,
    client: reqwest::Client,
}

impl CoinGeckoClient {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            vs_currency: config.vs_currency.clone(),
            rate_limiter: RateLimiter::per_minute(config.requests_per_minute),
            client,
        })
    }

    async fn get_json<R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<R> {
        self.rate_limiter.acquire().await;

        let mut request = self
            .client
            .get(format!("{}/{}", self.base_url, path))
            .query(query);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimit(format!("CoinGecko throttled {}", path)));
        }
        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(path.to_string()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::DataSource {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl SignalSource for CoinGeckoClient {
    async fn market_chart(&self, external_id: &str, days: u32) -> Result<MarketChart> {
        let response: MarketChartResponse = self
            .get_json(
                &format!("coins/{}/market_chart", external_id),
                &[
                    ("vs_currency", self.vs_currency.clone()),
                    ("days", days.to_string()),
                    ("interval", "daily".to_string()),
                ],
            )
            .await?;

        tracing::debug!(
            "CoinGecko market_chart {}: {} prices, {} volumes",
            external_id,
            response.prices.len(),
            response.total_volumes.len()
        );

        Ok(response.into_chart())
    }

    async fn community_counters(&self, external_id: &str) -> Result<CommunityCounters> {
        let response: CoinResponse = self
            .get_json(
                &format!("coins/{}", external_id),
                &[
                    ("localization", "false".to_string()),
                    ("tickers", "false".to_string()),
                    ("market_data", "false".to_string()),
                    ("community_data", "true".to_string()),
                    ("developer_data", "false".to_string()),
                ],
            )
            .await?;

        Ok(response.into_counters())
    }
}

/// `GET /coins/{id}/market_chart`
#[derive(Debug, Deserialize)]
pub struct MarketChartResponse {
    #[serde(default)]
    pub prices: Vec<(f64, f64)>,
    #[serde(default)]
    pub total_volumes: Vec<(f64, f64)>,
}

impl MarketChartResponse {
    pub fn into_chart(self) -> MarketChart {
        let to_points = |series: Vec<(f64, f64)>| {
            series
                .into_iter()
                .map(|(ts, value)| PricePoint::new(ts as i64, value))
                .collect()
        };

        MarketChart {
            prices: to_points(self.prices),
            volumes: to_points(self.total_volumes),
        }
    }
}

/// `GET /coins/{id}`, community section only
#[derive(Debug, Deserialize)]
pub struct CoinResponse {
    #[serde(default)]
    pub community_data: Option<CommunityData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommunityData {
    pub twitter_followers: Option<f64>,
    pub reddit_subscribers: Option<f64>,
}

impl CoinResponse {
    pub fn into_counters(self) -> CommunityCounters {
        let data = self.community_data.unwrap_or_default();
        let count = |v: Option<f64>| v.filter(|n| n.is_finite()).unwrap_or(0.0).max(0.0) as u64;

        CommunityCounters {
            twitter_followers: count(data.twitter_followers),
            reddit_subscribers: count(data.reddit_subscribers),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_market_chart() {
        let body = r#"{
            "prices": [[1711929600000, 70744.1], [1712016000000, 69705.3]],
            "market_caps": [[1711929600000, 1.39e12], [1712016000000, 1.37e12]],
            "total_volumes": [[1711929600000, 2.1e10], [1712016000000, 3.4e10]]
        }"#;

        let chart = serde_json::from_str::<MarketChartResponse>(body).unwrap().into_chart();

        assert_eq!(chart.prices.len(), 2);
        assert_eq!(chart.prices[0], PricePoint::new(1711929600000, 70744.1));
        assert_eq!(chart.volumes[1].value, 3.4e10);
    }

    #[test]
    fn test_parse_market_chart_missing_series() {
        let chart = serde_json::from_str::<MarketChartResponse>("{}").unwrap().into_chart();
        assert!(chart.prices.is_empty());
        assert!(chart.volumes.is_empty());
    }

    #[test]
    fn test_parse_community_counters() {
        let body = r#"{
            "id": "bitcoin",
            "community_data": {
                "facebook_likes": null,
                "twitter_followers": 6500000,
                "reddit_subscribers": 5400000
            }
        }"#;

        let counters = serde_json::from_str::<CoinResponse>(body).unwrap().into_counters();
        assert_eq!(counters.twitter_followers, 6_500_000);
        assert_eq!(counters.reddit_subscribers, 5_400_000);
    }

    #[test]
    fn test_parse_community_nulls_become_zero() {
        let body = r#"{ "community_data": { "twitter_followers": null } }"#;
        let counters = serde_json::from_str::<CoinResponse>(body).unwrap().into_counters();
        assert_eq!(counters, CommunityCounters::default());

        let counters = serde_json::from_str::<CoinResponse>("{}").unwrap().into_counters();
        assert_eq!(counters.total(), 0);
    }

    #[test]
    fn test_client_trims_base_url_and_blank_key() {
        let config = SourceConfig {
            base_url: "https://api.coingecko.com/api/v3/".to_string(),
            api_key: Some(String::new()),
            ..Default::default()
        };
        let client = CoinGeckoClient::new(&config).unwrap();
        assert_eq!(client.base_url, "https://api.coingecko.com/api/v3");
        assert!(client.api_key.is_none());
    }
}
