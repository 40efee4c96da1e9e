//! Built-in tool implementations.

mod crypto_price;
mod portfolio;
mod price_alerts;
mod price_source;

pub use crypto_price::CryptoPrice;
pub use portfolio::{PortfolioMetrics, PortfolioRisk};
pub use price_alerts::{AlertDirection, PriceAlert, PriceAlerts};
pub use price_source::{CoinGecko, PriceQuote, PriceSource, StaticPrices};
