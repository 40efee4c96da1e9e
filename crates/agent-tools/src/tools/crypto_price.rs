//! Cryptocurrency spot price tool.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::ToolError;
use crate::tool::{Tool, ToolArgs, ToolOutput};
use crate::tools::price_source::PriceSource;

/// Cryptocurrency price tool over any [`PriceSource`].
///
/// # Entities
///
/// - `symbol` (required): ticker such as `BTC`, `ETH`, `SOL`
/// - `currency` (optional, default: `USD`)
///
/// Results are cached under `price:<SYMBOL>` (plus `:<CURRENCY>` when not
/// USD) and tagged `price` and `symbol:<SYMBOL>`.
pub struct CryptoPrice {
    source: Arc<dyn PriceSource>,
    ttl: Duration,
}

impl CryptoPrice {
    /// Create a new crypto price tool.
    pub fn new(source: Arc<dyn PriceSource>) -> Self {
        Self {
            source,
            ttl: Duration::from_secs(30),
        }
    }

    /// Override how long prices stay cached.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn symbol(args: &ToolArgs) -> Option<String> {
        args.get_string_opt("symbol").map(|s| s.to_uppercase())
    }

    fn currency(args: &ToolArgs) -> String {
        args.get_string_opt("currency")
            .unwrap_or_else(|| "USD".to_string())
            .to_uppercase()
    }

    /// Format a large number with K/M/B suffixes.
    pub(crate) fn format_market_cap(value: f64) -> String {
        if value >= 1_000_000_000_000.0 {
            format!("${:.2}T", value / 1_000_000_000_000.0)
        } else if value >= 1_000_000_000.0 {
            format!("${:.2}B", value / 1_000_000_000.0)
        } else if value >= 1_000_000.0 {
            format!("${:.2}M", value / 1_000_000.0)
        } else {
            format!("${:.0}", value)
        }
    }

    /// Format price change with arrow indicator.
    pub(crate) fn format_change(change: f64) -> String {
        let arrow = if change >= 0.0 { "↑" } else { "↓" };
        format!("{}{:.2}%", arrow, change.abs())
    }
}

#[async_trait]
impl Tool for CryptoPrice {
    fn name(&self) -> &str {
        "crypto_price"
    }

    fn description(&self) -> &str {
        "Current cryptocurrency prices: BTC, ETH, SOL and more."
    }

    fn breaker_key(&self) -> String {
        format!("price_source:{}", self.source.name())
    }

    fn cache_key(&self, args: &ToolArgs) -> Option<String> {
        let symbol = Self::symbol(args)?;
        let currency = Self::currency(args);
        if currency == "USD" {
            Some(format!("price:{}", symbol))
        } else {
            Some(format!("price:{}:{}", symbol, currency))
        }
    }

    fn cache_ttl(&self) -> Duration {
        self.ttl
    }

    fn cache_tags(&self, args: &ToolArgs) -> Vec<String> {
        let mut tags = vec!["price".to_string()];
        if let Some(symbol) = Self::symbol(args) {
            tags.push(format!("symbol:{}", symbol));
        }
        tags
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let symbol = Self::symbol(&args).ok_or_else(|| ToolError::MissingParameter("symbol".into()))?;
        let currency = Self::currency(&args);

        debug!("Getting {} price in {}", symbol, currency);

        let quote = self.source.spot_price(&symbol, &currency).await?;

        let mut summary = format!("{}: {:.2} {}", quote.symbol, quote.price, quote.currency);
        if let Some(change) = quote.change_24h {
            summary.push_str(&format!(" ({})", Self::format_change(change)));
        }
        if let Some(mcap) = quote.market_cap {
            summary.push_str(&format!(" | Market Cap: {}", Self::format_market_cap(mcap)));
        }

        let mut output = ToolOutput::new(summary)
            .with_field("symbol", quote.symbol.clone())
            .with_field("price", quote.price)
            .with_field("currency", quote.currency.clone());
        if let Some(change) = quote.change_24h {
            output = output.with_field("change_24h", change);
        }
        if let Some(mcap) = quote.market_cap {
            output = output.with_field("market_cap", mcap);
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::StaticPrices;

    fn tool() -> CryptoPrice {
        CryptoPrice::new(Arc::new(StaticPrices::new().with_quote("BTC", 67_000.0, 1.5)))
    }

    #[test]
    fn test_format_market_cap() {
        assert_eq!(CryptoPrice::format_market_cap(1_500_000_000_000.0), "$1.50T");
        assert_eq!(CryptoPrice::format_market_cap(500_000_000_000.0), "$500.00B");
        assert_eq!(CryptoPrice::format_market_cap(1_500_000_000.0), "$1.50B");
        assert_eq!(CryptoPrice::format_market_cap(500_000_000.0), "$500.00M");
        assert_eq!(CryptoPrice::format_market_cap(1_500_000.0), "$1.50M");
        assert_eq!(CryptoPrice::format_market_cap(500_000.0), "$500000");
    }

    #[test]
    fn test_format_change() {
        assert_eq!(CryptoPrice::format_change(5.25), "↑5.25%");
        assert_eq!(CryptoPrice::format_change(-3.14), "↓3.14%");
        assert_eq!(CryptoPrice::format_change(0.0), "↑0.00%");
    }

    #[test]
    fn test_cache_identity() {
        let tool = tool();
        let usd = ToolArgs::default().with_entity("symbol", "btc");
        let eur = usd.clone().with_entity("currency", "eur");

        assert_eq!(tool.cache_key(&usd).as_deref(), Some("price:BTC"));
        assert_eq!(tool.cache_key(&eur).as_deref(), Some("price:BTC:EUR"));
        assert_eq!(tool.cache_key(&ToolArgs::default()), None);
        assert_eq!(tool.cache_tags(&usd), vec!["price", "symbol:BTC"]);
        assert_eq!(tool.breaker_key(), "price_source:static");
    }

    #[tokio::test]
    async fn test_execute() {
        let output = tool()
            .execute(ToolArgs::default().with_entity("symbol", "BTC"))
            .await
            .unwrap();
        assert_eq!(output.data["price"], 67_000.0);
        assert_eq!(output.data["symbol"], "BTC");
        assert_eq!(output.summary, "BTC: 67000.00 USD (↑1.50%)");
    }

    #[tokio::test]
    async fn test_missing_symbol() {
        let result = tool().execute(ToolArgs::default()).await;
        assert!(matches!(result, Err(ToolError::MissingParameter(_))));
    }
}
