use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV candle data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// One monitored (exchange, symbol, timeframe) tuple.
/// Immutable after configuration load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub exchange: String,
    pub symbol: String,
    pub timeframe: String,
    pub enabled: bool,
    /// Persisted raw candle series for this target
    pub raw_csv: PathBuf,
    /// Persisted derived (trailing-stop) series for this target
    pub signals_csv: PathBuf,
}

impl Target {
    /// Unique key: `exchange_symbol_timeframe`
    pub fn key(&self) -> String {
        format!("{}_{}_{}", self.exchange, self.symbol, self.timeframe)
    }

    /// Human-readable label used in logs and error notifications
    pub fn label(&self) -> String {
        format!(
            "{} {} ({})",
            self.exchange.to_uppercase(),
            self.symbol,
            self.timeframe
        )
    }
}

/// Parse a timeframe string ("1m", "15m", "1h", "4h", "1d") into minutes.
pub fn timeframe_minutes(timeframe: &str) -> Option<i64> {
    let timeframe = timeframe.trim();
    if timeframe.len() < 2 {
        return None;
    }
    let (value, unit) = timeframe.split_at(timeframe.len() - 1);
    let value: i64 = value.parse().ok()?;
    if value <= 0 {
        return None;
    }
    match unit {
        "m" => Some(value),
        "h" => Some(value * 60),
        "d" => Some(value * 1440),
        "w" => Some(value * 10080),
        _ => None,
    }
}

/// One row of the trailing-stop series, aligned with the candle series.
/// Warmup positions hold NaN and never signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrailingStopRow {
    pub timestamp: DateTime<Utc>,
    pub src: f64,
    pub ma_value: f64,
    pub stop: f64,
    pub buy: bool,
    pub sell: bool,
}

/// Latest-bar output of a strategy's indicator computation.
#[derive(Debug, Clone)]
pub struct IndicatorOutput {
    pub rows: Vec<TrailingStopRow>,
    /// Buy edge on the latest bar
    pub buy: bool,
    /// Sell edge on the latest bar
    pub sell: bool,
    /// Close of the latest bar
    pub price: f64,
}

/// Support/resistance zone classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneType {
    Support,
    Resistance,
    Mixed,
    Pivot,
}

impl ZoneType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneType::Support => "Support",
            ZoneType::Resistance => "Resistance",
            ZoneType::Mixed => "Mixed",
            ZoneType::Pivot => "Pivot",
        }
    }
}

/// A clustered support/resistance zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SrZone {
    /// Running mean of the merged candidate levels
    pub level: f64,
    pub top: f64,
    pub bottom: f64,
    pub methods: Vec<String>,
    pub timeframes_seen: Vec<String>,
    pub zone_type: ZoneType,
    /// Number of candidate levels merged into this zone
    pub confluence: u32,
    /// Recent closes falling inside [bottom, top]
    pub reactions: u32,
}

/// S/R analysis attached to a signal event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SrSummary {
    pub zones: Vec<SrZone>,
    pub current_price: f64,
    pub computed_at: DateTime<Utc>,
}

/// Per-target signal state, persisted for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalState {
    Flat,
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalKind {
    Buy,
    Sell,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Buy => "BUY",
            SignalKind::Sell => "SELL",
        }
    }
}

/// An emitted buy/sell notification. Immutable once created; handed off by
/// value through the notification bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalEvent {
    pub target_key: String,
    pub exchange: String,
    pub symbol: String,
    pub timeframe: String,
    pub kind: SignalKind,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub enrichment: Option<SrSummary>,
}

/// One target's failure inside a batch.
#[derive(Debug, Clone)]
pub struct TargetError {
    pub target_key: String,
    pub message: String,
}

/// Outcome of one scheduler cycle over all enabled targets.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub success_count: usize,
    pub error_count: usize,
    pub per_target_errors: Vec<TargetError>,
    pub elapsed: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_minutes() {
        assert_eq!(timeframe_minutes("1m"), Some(1));
        assert_eq!(timeframe_minutes("15m"), Some(15));
        assert_eq!(timeframe_minutes("1h"), Some(60));
        assert_eq!(timeframe_minutes("4h"), Some(240));
        assert_eq!(timeframe_minutes("1d"), Some(1440));
    }

    #[test]
    fn test_timeframe_minutes_invalid() {
        assert_eq!(timeframe_minutes(""), None);
        assert_eq!(timeframe_minutes("abc"), None);
        assert_eq!(timeframe_minutes("0m"), None);
        assert_eq!(timeframe_minutes("-5m"), None);
        assert_eq!(timeframe_minutes("5x"), None);
    }

    #[test]
    fn test_target_key() {
        let target = Target {
            exchange: "binance".to_string(),
            symbol: "BTC/USDT".to_string(),
            timeframe: "15m".to_string(),
            enabled: true,
            raw_csv: PathBuf::from("data/raw/binance_btc_15m.csv"),
            signals_csv: PathBuf::from("data/signals/binance_btc_15m.csv"),
        };
        assert_eq!(target.key(), "binance_BTC/USDT_15m");
        assert_eq!(target.label(), "BINANCE BTC/USDT (15m)");
    }
}
