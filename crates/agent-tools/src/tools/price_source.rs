//! Market data sources behind the price and portfolio tools.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ToolError;

/// Spot price for one asset in one fiat currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub symbol: String,
    pub currency: String,
    pub price: f64,
    pub change_24h: Option<f64>,
    pub market_cap: Option<f64>,
}

/// A generic market data collaborator.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Stable name, used as the dependency identity for breakers and limiters.
    fn name(&self) -> &str;

    /// Current price of `symbol` (e.g. `BTC`) in `currency` (e.g. `USD`).
    async fn spot_price(&self, symbol: &str, currency: &str) -> Result<PriceQuote, ToolError>;
}

/// Map a ticker to a CoinGecko coin id.
fn coingecko_id(symbol: &str) -> String {
    match symbol.to_uppercase().as_str() {
        "BTC" => "bitcoin",
        "ETH" => "ethereum",
        "SOL" => "solana",
        "ADA" => "cardano",
        "DOGE" => "dogecoin",
        "DOT" => "polkadot",
        "XRP" => "ripple",
        "LTC" => "litecoin",
        "LINK" => "chainlink",
        "UNI" => "uniswap",
        "AVAX" => "avalanche-2",
        "MATIC" => "matic-network",
        "USDC" => "usd-coin",
        "USDT" => "tether",
        other => return other.to_lowercase(),
    }
    .to_string()
}

/// CoinGecko-backed price source.
///
/// Free tier, no API key required.
pub struct CoinGecko {
    client: reqwest::Client,
    base_url: String,
}

impl CoinGecko {
    /// Create a source against the public CoinGecko API.
    pub fn new() -> Self {
        Self::with_base_url("https://api.coingecko.com/api/v3")
    }

    /// Create a source against a different API root (proxies, test servers).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("orchestrator/0.1")
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Default for CoinGecko {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceSource for CoinGecko {
    fn name(&self) -> &str {
        "coingecko"
    }

    async fn spot_price(&self, symbol: &str, currency: &str) -> Result<PriceQuote, ToolError> {
        let coin = coingecko_id(symbol);
        let vs = currency.to_lowercase();
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies={}&include_24hr_change=true&include_market_cap=true",
            self.base_url, coin, vs
        );

        debug!("Fetching crypto price from: {}", url);

        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ToolError::RateLimited {
                retry_after: Duration::from_secs(60),
            });
        }
        if status.is_server_error() {
            return Err(ToolError::DependencyUnavailable(format!(
                "CoinGecko API returned status {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(ToolError::ExecutionFailed(format!(
                "CoinGecko API returned status {}",
                status
            )));
        }

        let data: HashMap<String, HashMap<String, Option<f64>>> = response.json().await?;
        let fields = data.get(&coin).ok_or_else(|| ToolError::InvalidParameter {
            name: "symbol".to_string(),
            reason: format!("unknown asset '{}'", symbol),
        })?;

        let price = fields.get(&vs).copied().flatten().ok_or_else(|| ToolError::InvalidParameter {
            name: "currency".to_string(),
            reason: format!("no {} price for '{}'", currency, symbol),
        })?;

        Ok(PriceQuote {
            symbol: symbol.to_uppercase(),
            currency: currency.to_uppercase(),
            price,
            change_24h: fields.get(&format!("{}_24h_change", vs)).copied().flatten(),
            market_cap: fields.get(&format!("{}_market_cap", vs)).copied().flatten(),
        })
    }
}

/// Fixed in-process prices, for tests and offline demos.
///
/// Counts every lookup so callers can assert how often the source was hit.
#[derive(Default)]
pub struct StaticPrices {
    prices: HashMap<String, (f64, Option<f64>)>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticPrices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the USD price of `symbol`.
    pub fn with_price(mut self, symbol: &str, price: f64) -> Self {
        self.prices.insert(symbol.to_uppercase(), (price, None));
        self
    }

    /// Set the USD price and 24h change (percent) of `symbol`.
    pub fn with_quote(mut self, symbol: &str, price: f64, change_24h: f64) -> Self {
        self.prices
            .insert(symbol.to_uppercase(), (price, Some(change_24h)));
        self
    }

    /// Sleep this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of lookups served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSource for StaticPrices {
    fn name(&self) -> &str {
        "static"
    }

    async fn spot_price(&self, symbol: &str, currency: &str) -> Result<PriceQuote, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if !currency.eq_ignore_ascii_case("USD") {
            return Err(ToolError::InvalidParameter {
                name: "currency".to_string(),
                reason: format!("only USD prices are available, got '{}'", currency),
            });
        }

        let symbol = symbol.to_uppercase();
        let (price, change_24h) = self
            .prices
            .get(&symbol)
            .copied()
            .ok_or_else(|| ToolError::InvalidParameter {
                name: "symbol".to_string(),
                reason: format!("unknown asset '{}'", symbol),
            })?;

        Ok(PriceQuote {
            symbol,
            currency: "USD".to_string(),
            price,
            change_24h,
            market_cap: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coingecko_ids() {
        assert_eq!(coingecko_id("btc"), "bitcoin");
        assert_eq!(coingecko_id("AVAX"), "avalanche-2");
        assert_eq!(coingecko_id("PEPE"), "pepe");
    }

    #[tokio::test]
    async fn test_static_prices() {
        let source = StaticPrices::new()
            .with_price("BTC", 67_000.0)
            .with_quote("eth", 3_500.0, -2.5);

        let quote = source.spot_price("btc", "usd").await.unwrap();
        assert_eq!(quote.symbol, "BTC");
        assert_eq!(quote.price, 67_000.0);

        let quote = source.spot_price("ETH", "USD").await.unwrap();
        assert_eq!(quote.change_24h, Some(-2.5));

        assert!(source.spot_price("DOGE", "USD").await.is_err());
        assert!(source.spot_price("BTC", "EUR").await.is_err());
        assert_eq!(source.calls(), 4);
    }

    #[tokio::test]
    #[ignore] // Requires network
    async fn test_fetch_ethereum_price() {
        let source = CoinGecko::new();
        let quote = source.spot_price("ETH", "USD").await.unwrap();
        assert_eq!(quote.symbol, "ETH");
        assert!(quote.price > 0.0);
    }
}
