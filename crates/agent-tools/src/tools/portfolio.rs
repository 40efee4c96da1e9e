//! Portfolio analysis tools: valuation metrics and concentration risk.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::json;

use crate::error::ToolError;
use crate::tool::{Tool, ToolArgs, ToolOutput};
use crate::tools::price_source::{PriceQuote, PriceSource};

/// One valued position.
#[derive(Debug, Clone, PartialEq)]
struct Position {
    symbol: String,
    quantity: f64,
    price: f64,
    value: f64,
    change_24h: Option<f64>,
}

/// Parse the `holdings` entity: `BTC:0.5,ETH:2`.
fn parse_holdings(raw: &str) -> Result<Vec<(String, f64)>, ToolError> {
    let mut holdings: Vec<(String, f64)> = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (symbol, quantity) = part.split_once(':').ok_or_else(|| ToolError::InvalidParameter {
            name: "holdings".to_string(),
            reason: format!("expected SYMBOL:QUANTITY, got '{}'", part),
        })?;
        let quantity: f64 = quantity
            .trim()
            .parse()
            .map_err(|_| ToolError::InvalidParameter {
                name: "holdings".to_string(),
                reason: format!("bad quantity in '{}'", part),
            })?;
        let symbol = symbol.trim().to_uppercase();
        match holdings.iter_mut().find(|(s, _)| *s == symbol) {
            Some((_, existing)) => *existing += quantity,
            None => holdings.push((symbol, quantity)),
        }
    }
    if holdings.is_empty() {
        return Err(ToolError::MissingParameter("holdings".to_string()));
    }
    Ok(holdings)
}

/// Price every holding concurrently.
async fn value_positions(
    source: &dyn PriceSource,
    args: &ToolArgs,
) -> Result<Vec<Position>, ToolError> {
    let holdings = parse_holdings(&args.get_string("holdings")?)?;
    let quotes: Vec<Result<PriceQuote, ToolError>> = join_all(
        holdings
            .iter()
            .map(|(symbol, _)| source.spot_price(symbol, "USD")),
    )
    .await;

    holdings
        .into_iter()
        .zip(quotes)
        .map(|((symbol, quantity), quote)| -> Result<Position, ToolError> {
            let quote = quote?;
            Ok(Position {
                symbol,
                quantity,
                price: quote.price,
                value: quote.price * quantity,
                change_24h: quote.change_24h,
            })
        })
        .collect()
}

fn total_value(positions: &[Position]) -> f64 {
    positions.iter().map(|p| p.value).sum()
}

fn allocation(position: &Position, total: f64) -> f64 {
    if total > 0.0 {
        position.value / total
    } else {
        0.0
    }
}

/// Portfolio valuation: total value, per-asset allocation, weighted 24h change.
///
/// # Entities
///
/// - `holdings` (required): `SYMBOL:QUANTITY` pairs separated by commas
pub struct PortfolioMetrics {
    source: Arc<dyn PriceSource>,
}

impl PortfolioMetrics {
    pub fn new(source: Arc<dyn PriceSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Tool for PortfolioMetrics {
    fn name(&self) -> &str {
        "portfolio_metrics"
    }

    fn description(&self) -> &str {
        "Values a portfolio and reports allocation per asset."
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let positions = value_positions(self.source.as_ref(), &args).await?;
        let total = total_value(&positions);

        let weighted_change: Option<f64> = if positions.iter().all(|p| p.change_24h.is_some()) && total > 0.0 {
            Some(
                positions
                    .iter()
                    .map(|p| p.change_24h.unwrap_or_default() * allocation(p, total))
                    .sum(),
            )
        } else {
            None
        };

        let rows: Vec<_> = positions
            .iter()
            .map(|p| {
                json!({
                    "symbol": p.symbol,
                    "quantity": p.quantity,
                    "price": p.price,
                    "value": p.value,
                    "allocation_pct": allocation(p, total) * 100.0,
                })
            })
            .collect();

        let mut summary = format!(
            "Portfolio value: ${:.2} across {} asset(s)",
            total,
            positions.len()
        );
        if let Some(change) = weighted_change {
            summary.push_str(&format!(", 24h {:+.2}%", change));
        }

        let mut output = ToolOutput::new(summary)
            .with_field("total_value", total)
            .with_field("positions", rows);
        if let Some(change) = weighted_change {
            output = output.with_field("change_24h_pct", change);
        }
        Ok(output)
    }
}

/// Concentration risk of a portfolio.
///
/// Risk level follows the Herfindahl index of allocations: above 0.5 is
/// high, above 0.25 moderate, otherwise low.
pub struct PortfolioRisk {
    source: Arc<dyn PriceSource>,
}

impl PortfolioRisk {
    pub fn new(source: Arc<dyn PriceSource>) -> Self {
        Self { source }
    }

    fn level(hhi: f64) -> &'static str {
        if hhi > 0.5 {
            "high"
        } else if hhi > 0.25 {
            "moderate"
        } else {
            "low"
        }
    }
}

#[async_trait]
impl Tool for PortfolioRisk {
    fn name(&self) -> &str {
        "portfolio_risk"
    }

    fn description(&self) -> &str {
        "Rates how concentrated a portfolio is."
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let positions = value_positions(self.source.as_ref(), &args).await?;
        let total = total_value(&positions);

        let hhi: f64 = positions.iter().map(|p| allocation(p, total).powi(2)).sum();
        let largest = positions
            .iter()
            .max_by(|a, b| a.value.total_cmp(&b.value))
            .ok_or_else(|| ToolError::MissingParameter("holdings".to_string()))?;
        let largest_pct = allocation(largest, total) * 100.0;
        let level = Self::level(hhi);

        let summary = format!(
            "Risk: {} (largest position {} at {:.1}%)",
            level, largest.symbol, largest_pct
        );

        Ok(ToolOutput::new(summary).with_field(
            "risk",
            json!({
                "level": level,
                "concentration_hhi": hhi,
                "largest_position": largest.symbol,
                "largest_allocation_pct": largest_pct,
                "assets": positions.len(),
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::StaticPrices;

    fn source() -> Arc<dyn PriceSource> {
        Arc::new(
            StaticPrices::new()
                .with_quote("BTC", 60_000.0, 2.0)
                .with_quote("ETH", 3_000.0, -4.0),
        )
    }

    #[test]
    fn test_parse_holdings() {
        let holdings = parse_holdings("btc:0.5, ETH:2,BTC:0.5").unwrap();
        assert_eq!(
            holdings,
            vec![("BTC".to_string(), 1.0), ("ETH".to_string(), 2.0)]
        );
        assert!(parse_holdings("BTC").is_err());
        assert!(parse_holdings("BTC:lots").is_err());
        assert!(matches!(parse_holdings(" , "), Err(ToolError::MissingParameter(_))));
    }

    #[tokio::test]
    async fn test_metrics() {
        let tool = PortfolioMetrics::new(source());
        let args = ToolArgs::default().with_entity("holdings", "BTC:1,ETH:20");
        let output = tool.execute(args).await.unwrap();

        assert_eq!(output.data["total_value"], 120_000.0);
        assert_eq!(output.data["positions"].as_array().unwrap().len(), 2);
        // 50% at +2% and 50% at -4%
        assert_eq!(output.data["change_24h_pct"], -1.0);
    }

    #[tokio::test]
    async fn test_risk_levels() {
        let tool = PortfolioRisk::new(source());

        let concentrated = tool
            .execute(ToolArgs::default().with_entity("holdings", "BTC:1,ETH:1"))
            .await
            .unwrap();
        assert_eq!(concentrated.data["risk"]["level"], "high");
        assert_eq!(concentrated.data["risk"]["largest_position"], "BTC");

        let balanced = tool
            .execute(ToolArgs::default().with_entity("holdings", "BTC:1,ETH:20"))
            .await
            .unwrap();
        assert_eq!(balanced.data["risk"]["level"], "moderate");
    }

    #[tokio::test]
    async fn test_unknown_asset_fails() {
        let tool = PortfolioMetrics::new(source());
        let args = ToolArgs::default().with_entity("holdings", "BTC:1,NOPE:3");
        assert!(tool.execute(args).await.is_err());
    }
}
