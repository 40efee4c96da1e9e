//! Per-user price alert book.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ToolError;
use crate::tool::{Tool, ToolArgs, ToolOutput};

/// Maximum active alerts per user.
const DEFAULT_MAX_ALERTS_PER_USER: usize = 20;

/// Which side of the target triggers the alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertDirection {
    Above,
    Below,
}

impl AlertDirection {
    fn parse(raw: &str) -> Result<Self, ToolError> {
        match raw.to_lowercase().as_str() {
            "above" | "over" | "exceeds" | "rises" | "up" => Ok(Self::Above),
            "below" | "under" | "drops" | "falls" | "down" => Ok(Self::Below),
            other => Err(ToolError::InvalidParameter {
                name: "direction".to_string(),
                reason: format!("expected above or below, got '{}'", other),
            }),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Above => "above",
            Self::Below => "below",
        }
    }
}

/// A registered alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAlert {
    pub symbol: String,
    pub target: f64,
    pub direction: AlertDirection,
}

impl PriceAlert {
    /// Whether `price` crosses this alert's target.
    pub fn is_triggered(&self, price: f64) -> bool {
        match self.direction {
            AlertDirection::Above => price >= self.target,
            AlertDirection::Below => price <= self.target,
        }
    }
}

/// Records price alerts per sender.
///
/// # Entities
///
/// - `symbol` (required)
/// - `amount` (required): target price
/// - `direction` (optional, default `above`)
///
/// The sender comes from [`ToolArgs::sender`].
pub struct PriceAlerts {
    alerts: DashMap<String, Vec<PriceAlert>>,
    max_per_user: usize,
}

impl PriceAlerts {
    pub fn new() -> Self {
        Self {
            alerts: DashMap::new(),
            max_per_user: DEFAULT_MAX_ALERTS_PER_USER,
        }
    }

    /// Limit active alerts per user.
    pub fn with_max_per_user(mut self, max: usize) -> Self {
        self.max_per_user = max;
        self
    }

    /// Active alerts for a sender.
    pub fn alerts_for(&self, sender: &str) -> Vec<PriceAlert> {
        self.alerts
            .get(sender)
            .map(|a| a.value().clone())
            .unwrap_or_default()
    }

    /// Remove and return every alert on `symbol` triggered by `price`.
    pub fn take_triggered(&self, symbol: &str, price: f64) -> Vec<(String, PriceAlert)> {
        let symbol = symbol.to_uppercase();
        let mut triggered = Vec::new();
        for mut entry in self.alerts.iter_mut() {
            let sender = entry.key().clone();
            entry.value_mut().retain(|alert| {
                if alert.symbol == symbol && alert.is_triggered(price) {
                    triggered.push((sender.clone(), alert.clone()));
                    false
                } else {
                    true
                }
            });
        }
        self.alerts.retain(|_, alerts| !alerts.is_empty());
        triggered
    }
}

impl Default for PriceAlerts {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for PriceAlerts {
    fn name(&self) -> &str {
        "price_alerts"
    }

    fn description(&self) -> &str {
        "Sets a notification for when an asset crosses a target price."
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let sender = args
            .sender
            .clone()
            .ok_or_else(|| ToolError::MissingParameter("sender".to_string()))?;
        let symbol = args.get_string("symbol")?.to_uppercase();
        let target = args.get_f64("amount")?;
        if target <= 0.0 {
            return Err(ToolError::InvalidParameter {
                name: "amount".to_string(),
                reason: "target price must be positive".to_string(),
            });
        }
        let direction = match args.get_string_opt("direction") {
            Some(raw) => AlertDirection::parse(&raw)?,
            None => AlertDirection::Above,
        };

        let alert = PriceAlert {
            symbol: symbol.clone(),
            target,
            direction,
        };

        let active = {
            let mut entry = self.alerts.entry(sender.clone()).or_default();
            entry.retain(|a| a != &alert);
            if entry.len() >= self.max_per_user {
                return Err(ToolError::InvalidParameter {
                    name: "alerts".to_string(),
                    reason: format!("at most {} active alerts", self.max_per_user),
                });
            }
            entry.push(alert.clone());
            entry.len()
        };

        info!("Price alert set for {}: {} {} {}", sender, symbol, direction.as_str(), target);

        Ok(ToolOutput::new(format!(
            "Alert set: {} {} {:.2}",
            symbol,
            direction.as_str(),
            target
        ))
        .with_field("alert", serde_json::to_value(&alert)?)
        .with_field("active_alerts", active))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(symbol: &str, amount: &str) -> ToolArgs {
        ToolArgs::default()
            .with_entity("symbol", symbol)
            .with_entity("amount", amount)
            .with_sender("+15550001")
    }

    #[tokio::test]
    async fn test_set_alert() {
        let tool = PriceAlerts::new();
        let output = tool
            .execute(args("btc", "70000").with_entity("direction", "below"))
            .await
            .unwrap();

        assert_eq!(output.data["alert"]["symbol"], "BTC");
        assert_eq!(output.data["alert"]["direction"], "below");
        assert_eq!(output.data["active_alerts"], 1);
        assert_eq!(tool.alerts_for("+15550001").len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_alert_replaced() {
        let tool = PriceAlerts::new();
        tool.execute(args("BTC", "70000")).await.unwrap();
        tool.execute(args("BTC", "70000")).await.unwrap();
        tool.execute(args("ETH", "4000")).await.unwrap();
        assert_eq!(tool.alerts_for("+15550001").len(), 2);
    }

    #[tokio::test]
    async fn test_limit_and_validation() {
        let tool = PriceAlerts::new().with_max_per_user(1);
        tool.execute(args("BTC", "70000")).await.unwrap();
        assert!(tool.execute(args("ETH", "4000")).await.is_err());
        assert!(tool.execute(args("BTC", "-5")).await.is_err());

        let anonymous = ToolArgs::default()
            .with_entity("symbol", "BTC")
            .with_entity("amount", "1");
        assert!(matches!(
            tool.execute(anonymous).await,
            Err(ToolError::MissingParameter(_))
        ));
    }

    #[tokio::test]
    async fn test_take_triggered() {
        let tool = PriceAlerts::new();
        tool.execute(args("BTC", "70000")).await.unwrap();
        tool.execute(args("BTC", "50000").with_entity("direction", "below"))
            .await
            .unwrap();

        let fired = tool.take_triggered("btc", 71_000.0);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].1.direction, AlertDirection::Above);
        assert_eq!(tool.alerts_for("+15550001").len(), 1);
    }
}
