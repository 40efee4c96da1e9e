//! Tools and guarded tool execution for the orchestrator.
//!
//! This crate provides a [`ToolRegistry`] of tools and the intents they
//! serve, and a [`ToolExecutor`] that runs every tool bound to an intent
//! concurrently. Each call is individually protected by a circuit breaker,
//! a rate limiter, a timeout and (when the tool allows it) the shared cache.
//! The per-tool results are merged deterministically into a
//! [`CombinedResult`].
//!
//! # Built-in Tools
//!
//! - [`CryptoPrice`] - Spot prices from any [`PriceSource`] (CoinGecko by default).
//! - [`PortfolioMetrics`] - Total value and allocation of a set of holdings.
//! - [`PortfolioRisk`] - Concentration risk of a set of holdings.
//! - [`PriceAlerts`] - Per-user price alert book.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use agent_tools::{default_registry, StaticPrices, ToolArgs, ToolExecutor};
//! use resilience::{BreakerRegistry, Cache, RateLimiter};
//!
//! #[tokio::main]
//! async fn main() {
//!     let prices = Arc::new(StaticPrices::new().with_price("BTC", 67_000.0));
//!     let executor = ToolExecutor::new(
//!         Arc::new(default_registry(prices)),
//!         Cache::in_memory(1000),
//!         Arc::new(BreakerRegistry::default()),
//!         Arc::new(RateLimiter::default()),
//!     );
//!
//!     let args = ToolArgs::default().with_entity("symbol", "BTC");
//!     let combined = executor.execute_intent("crypto_price", &args).await.unwrap();
//!     println!("{:?}", combined.data); // {"symbol": "BTC", "price": 67000.0, ...}
//! }
//! ```

mod error;
mod executor;
mod registry;
mod result;
mod tool;
pub mod tools;

use std::sync::Arc;

pub use error::ToolError;
pub use executor::ToolExecutor;
pub use registry::{ToolBinding, ToolRegistry};
pub use result::{CombinedResult, ToolFailure, ToolResult};
pub use tool::{Tool, ToolArgs, ToolOutput};
pub use tools::{
    AlertDirection, CoinGecko, CryptoPrice, PortfolioMetrics, PortfolioRisk, PriceAlert,
    PriceAlerts, PriceQuote, PriceSource, StaticPrices,
};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

/// Create a registry with every built-in tool and its intent bindings.
///
/// - `crypto_price`: `crypto_price`
/// - `portfolio_analysis`: `portfolio_metrics` and `portfolio_risk`, both required
/// - `price_alert`: `price_alerts`, enriched by an optional `crypto_price` lookup
pub fn default_registry(source: Arc<dyn PriceSource>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(CryptoPrice::new(source.clone()));
    registry.register(PortfolioMetrics::new(source.clone()));
    registry.register(PortfolioRisk::new(source));
    registry.register(PriceAlerts::new());

    registry.bind("crypto_price", ToolBinding::required("crypto_price", 1));

    registry.bind("portfolio_analysis", ToolBinding::required("portfolio_metrics", 1));
    registry.bind("portfolio_analysis", ToolBinding::required("portfolio_risk", 2));

    // The alert's own fields win over the price lookup on collisions.
    registry.bind("price_alert", ToolBinding::optional("crypto_price", 1));
    registry.bind("price_alert", ToolBinding::required("price_alerts", 2));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry() {
        let registry = default_registry(Arc::new(StaticPrices::new()));
        assert_eq!(
            registry.list_tools(),
            vec!["crypto_price", "portfolio_metrics", "portfolio_risk", "price_alerts"]
        );
        assert_eq!(
            registry.intents(),
            vec!["crypto_price", "portfolio_analysis", "price_alert"]
        );
        let alert = registry.bindings("price_alert").unwrap();
        assert!(alert.iter().any(|b| b.tool == "crypto_price" && !b.required));
    }
}
