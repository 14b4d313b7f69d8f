use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use monitor_core::{Candle, CandleSource, ExchangeConfig, MonitorError};
use reqwest::Client;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;

const BINANCE_BASE_URL: &str = "https://api.binance.com";
const OKX_BASE_URL: &str = "https://www.okx.com";

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests,
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            let wait_until = ts.front().unwrap().checked_add(self.window).unwrap();
            let sleep_dur = wait_until.duration_since(now) + Duration::from_millis(50);
            drop(ts);
            tracing::debug!(
                "rate limiter: waiting {:.1}s for a request slot",
                sleep_dur.as_secs_f64()
            );
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

struct ExchangeHandle {
    config: ExchangeConfig,
    limiter: Option<RateLimiter>,
}

/// OHLCV source over the public REST endpoints of supported exchanges
/// (Binance-style klines and OKX candles).
#[derive(Clone)]
pub struct RestCandleSource {
    client: Client,
    exchanges: Arc<HashMap<String, ExchangeHandle>>,
}

impl RestCandleSource {
    pub fn new(configs: &[ExchangeConfig]) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        let mut exchanges = HashMap::new();
        for config in configs {
            if !config.enabled {
                tracing::info!("skipping disabled exchange: {}", config.name);
                continue;
            }
            let limiter = if config.rate_limit_per_minute > 0 {
                Some(RateLimiter::new(
                    config.rate_limit_per_minute,
                    Duration::from_secs(60),
                ))
            } else {
                None
            };
            tracing::info!(
                "exchange {} connected (rate limit: {}/min)",
                config.name,
                config.rate_limit_per_minute
            );
            exchanges.insert(
                config.name.clone(),
                ExchangeHandle {
                    config: config.clone(),
                    limiter,
                },
            );
        }

        Self {
            client,
            exchanges: Arc::new(exchanges),
        }
    }

    async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, MonitorError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| MonitorError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MonitorError::Fetch(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| MonitorError::Fetch(e.to_string()))
    }

    async fn fetch_binance(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, MonitorError> {
        let url = format!("{BINANCE_BASE_URL}/api/v3/klines");
        let symbol = binance_symbol(symbol);
        let limit = limit.to_string();
        let body = self
            .get_json(
                &url,
                &[
                    ("symbol", symbol.as_str()),
                    ("interval", timeframe),
                    ("limit", limit.as_str()),
                ],
            )
            .await?;
        parse_binance_klines(&body)
    }

    async fn fetch_okx(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, MonitorError> {
        let url = format!("{OKX_BASE_URL}/api/v5/market/candles");
        let inst_id = okx_symbol(symbol);
        let bar = okx_bar(timeframe);
        let limit = limit.to_string();
        let body = self
            .get_json(
                &url,
                &[
                    ("instId", inst_id.as_str()),
                    ("bar", bar.as_str()),
                    ("limit", limit.as_str()),
                ],
            )
            .await?;
        parse_okx_candles(&body)
    }
}

#[async_trait]
impl CandleSource for RestCandleSource {
    async fn fetch_ohlcv(
        &self,
        exchange: &str,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, MonitorError> {
        let handle = self.exchanges.get(exchange).ok_or_else(|| {
            MonitorError::ExchangeUnavailable(format!("exchange {exchange} is not connected"))
        })?;

        if let Some(limiter) = &handle.limiter {
            limiter.acquire().await;
        }

        match handle.config.name.as_str() {
            "binance" => self.fetch_binance(symbol, timeframe, limit).await,
            "okx" => self.fetch_okx(symbol, timeframe, limit).await,
            other => Err(MonitorError::ExchangeUnavailable(format!(
                "no client implementation for exchange {other}"
            ))),
        }
    }
}

/// "BTC/USDT" -> "BTCUSDT"
fn binance_symbol(symbol: &str) -> String {
    symbol.replace('/', "")
}

/// "BTC/USDT" -> "BTC-USDT"
fn okx_symbol(symbol: &str) -> String {
    symbol.replace('/', "-")
}

/// OKX bar strings use uppercase hour/day units: "15m", "1H", "4H", "1D".
fn okx_bar(timeframe: &str) -> String {
    match timeframe.chars().last() {
        Some('h') | Some('d') | Some('w') => timeframe.to_uppercase(),
        _ => timeframe.to_string(),
    }
}

/// Binance klines: array of arrays
/// `[openTimeMs, "open", "high", "low", "close", "volume", ...]`,
/// oldest first.
fn parse_binance_klines(body: &Value) -> Result<Vec<Candle>, MonitorError> {
    let rows = body
        .as_array()
        .ok_or_else(|| MonitorError::InvalidData("klines response is not an array".to_string()))?;

    rows.iter().map(parse_binance_row).collect()
}

fn parse_binance_row(row: &Value) -> Result<Candle, MonitorError> {
    let fields = row
        .as_array()
        .filter(|f| f.len() >= 6)
        .ok_or_else(|| MonitorError::InvalidData("malformed kline row".to_string()))?;

    let timestamp_ms = fields[0]
        .as_i64()
        .ok_or_else(|| MonitorError::InvalidData("kline open time is not an integer".to_string()))?;

    Ok(Candle {
        timestamp: millis_to_datetime(timestamp_ms)?,
        open: string_price(&fields[1])?,
        high: string_price(&fields[2])?,
        low: string_price(&fields[3])?,
        close: string_price(&fields[4])?,
        volume: string_price(&fields[5])?,
    })
}

/// OKX candles: `{"code":"0","data":[["ts","o","h","l","c","vol",...],...]}`,
/// newest first.
fn parse_okx_candles(body: &Value) -> Result<Vec<Candle>, MonitorError> {
    let code = body.get("code").and_then(|c| c.as_str()).unwrap_or("");
    if code != "0" {
        let msg = body.get("msg").and_then(|m| m.as_str()).unwrap_or("unknown");
        return Err(MonitorError::Fetch(format!("OKX error {code}: {msg}")));
    }

    let rows = body
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| MonitorError::InvalidData("candles response has no data".to_string()))?;

    let mut candles: Vec<Candle> = rows
        .iter()
        .map(|row| {
            let fields = row
                .as_array()
                .filter(|f| f.len() >= 6)
                .ok_or_else(|| MonitorError::InvalidData("malformed candle row".to_string()))?;
            let timestamp_ms: i64 = fields[0]
                .as_str()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| {
                    MonitorError::InvalidData("candle timestamp is not numeric".to_string())
                })?;
            Ok(Candle {
                timestamp: millis_to_datetime(timestamp_ms)?,
                open: string_price(&fields[1])?,
                high: string_price(&fields[2])?,
                low: string_price(&fields[3])?,
                close: string_price(&fields[4])?,
                volume: string_price(&fields[5])?,
            })
        })
        .collect::<Result<_, MonitorError>>()?;

    candles.reverse();
    Ok(candles)
}

fn string_price(value: &Value) -> Result<f64, MonitorError> {
    match value {
        Value::String(s) => s
            .parse()
            .map_err(|_| MonitorError::InvalidData(format!("bad price field: {s}"))),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| MonitorError::InvalidData(format!("bad price field: {n}"))),
        other => Err(MonitorError::InvalidData(format!(
            "bad price field: {other}"
        ))),
    }
}

fn millis_to_datetime(ms: i64) -> Result<DateTime<Utc>, MonitorError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| MonitorError::InvalidData(format!("timestamp {ms} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_symbol_conversion() {
        assert_eq!(binance_symbol("BTC/USDT"), "BTCUSDT");
        assert_eq!(okx_symbol("BTC/USDT"), "BTC-USDT");
    }

    #[test]
    fn test_okx_bar_mapping() {
        assert_eq!(okx_bar("15m"), "15m");
        assert_eq!(okx_bar("1h"), "1H");
        assert_eq!(okx_bar("4h"), "4H");
        assert_eq!(okx_bar("1d"), "1D");
    }

    #[test]
    fn test_parse_binance_klines() {
        let body = json!([
            [1704067200000i64, "42000.1", "42100.5", "41900.0", "42050.2", "12.5", 0, "x", 1, "y", "z", "0"],
            [1704067260000i64, "42050.2", "42200.0", "42000.0", "42150.0", "8.1", 0, "x", 1, "y", "z", "0"]
        ]);
        let candles = parse_binance_klines(&body).unwrap();

        assert_eq!(candles.len(), 2);
        assert!((candles[0].open - 42000.1).abs() < 1e-9);
        assert!((candles[0].volume - 12.5).abs() < 1e-9);
        assert!(candles[0].timestamp < candles[1].timestamp);
    }

    #[test]
    fn test_parse_binance_malformed_row() {
        let body = json!([[1704067200000i64, "42000.1"]]);
        assert!(parse_binance_klines(&body).is_err());
    }

    #[test]
    fn test_parse_okx_candles_reverses_to_ascending() {
        let body = json!({
            "code": "0",
            "msg": "",
            "data": [
                ["1704067260000", "42050.2", "42200.0", "42000.0", "42150.0", "8.1", "0"],
                ["1704067200000", "42000.1", "42100.5", "41900.0", "42050.2", "12.5", "0"]
            ]
        });
        let candles = parse_okx_candles(&body).unwrap();

        assert_eq!(candles.len(), 2);
        assert!(candles[0].timestamp < candles[1].timestamp);
        assert!((candles[0].close - 42050.2).abs() < 1e-9);
    }

    #[test]
    fn test_parse_okx_error_code() {
        let body = json!({"code": "51001", "msg": "Instrument ID does not exist", "data": []});
        assert!(matches!(
            parse_okx_candles(&body),
            Err(MonitorError::Fetch(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_exchange_is_unavailable() {
        let source = RestCandleSource::new(&[]);
        let result = source.fetch_ohlcv("kraken", "BTC/USD", "1h", 10).await;
        assert!(matches!(result, Err(MonitorError::ExchangeUnavailable(_))));
    }

    #[tokio::test]
    async fn test_disabled_exchange_not_connected() {
        let source = RestCandleSource::new(&[ExchangeConfig {
            name: "binance".to_string(),
            enabled: false,
            rate_limit_per_minute: 600,
        }]);
        let result = source.fetch_ohlcv("binance", "BTC/USDT", "1h", 10).await;
        assert!(matches!(result, Err(MonitorError::ExchangeUnavailable(_))));
    }

    #[tokio::test]
    async fn test_rate_limiter_allows_burst_within_window() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
