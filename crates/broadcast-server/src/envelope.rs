use chrono::Utc;
use monitor_core::{SignalEvent, SignalKind};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const SOURCE_NAME: &str = "TradingSystem";
pub const SERVER_VERSION: &str = "v1.0";

/// The JSON envelope every subscriber receives. Field names are a
/// compatibility contract with existing dashboard/bot consumers and must not
/// change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub level: String,
    pub message: String,
    /// ISO-8601
    pub timestamp: String,
    pub data: Value,
    pub source: String,
}

impl Envelope {
    fn new(kind: &str, level: &str, message: String, data: Value) -> Self {
        Self {
            kind: kind.to_string(),
            level: level.to_string(),
            message,
            timestamp: Utc::now().to_rfc3339(),
            data,
            source: SOURCE_NAME.to_string(),
        }
    }

    /// Buy/sell signal notification.
    pub fn signal(event: &SignalEvent) -> Self {
        let icon = match event.kind {
            SignalKind::Buy => "🟢",
            SignalKind::Sell => "🔴",
        };
        let message = format!(
            "{} {} SIGNAL - {} {} ({}) @ {:.4}",
            icon,
            event.kind.as_str(),
            event.exchange.to_uppercase(),
            event.symbol,
            event.timeframe,
            event.price
        );

        let mut data = json!({
            "exchange": event.exchange,
            "symbol": event.symbol,
            "timeframe": event.timeframe,
            "price": event.price,
            "timestamp": event.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            "target_key": event.target_key,
            "signal_type": event.kind.as_str(),
        });
        // Additive field: S/R context when the strategy produced it.
        if let Some(sr) = &event.enrichment {
            if let Ok(value) = serde_json::to_value(sr) {
                data["sr_analysis"] = value;
            }
        }

        Self::new("notification", "WARNING", message, data)
    }

    /// Greeting sent to a freshly connected subscriber.
    pub fn welcome(connected_clients: usize) -> Self {
        Self::new(
            "welcome",
            "INFO",
            "Connected, signal stream active".to_string(),
            json!({
                "server_version": SERVER_VERSION,
                "connected_clients": connected_clients,
            }),
        )
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new("notification", "INFO", message.into(), json!({}))
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new("notification", "WARNING", format!("⚠️ {}", message.into()), json!({}))
    }

    /// Operational error, optionally tagged with the failing target.
    pub fn error(message: impl Into<String>, target_info: Option<&str>) -> Self {
        let message = match target_info {
            Some(target) => format!("❌ {} failed: {}", target, message.into()),
            None => format!("❌ system error: {}", message.into()),
        };
        Self::new("notification", "ERROR", message, json!({}))
    }
}
