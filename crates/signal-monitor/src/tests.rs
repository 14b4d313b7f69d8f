use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use broadcast_server::notification_channel;
use chrono::{TimeZone, Utc};
use monitor_core::{
    Candle, CandleSource, IndicatorOutput, MaType, MonitorError, MonitoringConfig, PriceSource,
    SignalStrategy, Target, TrailingStopConfig,
};
use series_store::SeriesStore;
use tokio::sync::broadcast;

use crate::strategy::TrailingStopStrategy;
use crate::Monitor;

/// Closes that put a buy edge on the final bar (see the trailing-stop fixture).
const FIXTURE_CLOSES: [f64; 7] = [100.0, 99.0, 98.0, 97.0, 99.0, 101.0, 102.0];

fn point_candles(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Candle {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, i as u32, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 100.0,
        })
        .collect()
}

struct MockSource {
    closes: Vec<f64>,
    fail_symbol: Option<String>,
    fail_first_attempts: u32,
    attempts: AtomicU32,
    delay_ms: u64,
}

impl MockSource {
    fn ok(closes: &[f64]) -> Self {
        Self {
            closes: closes.to_vec(),
            fail_symbol: None,
            fail_first_attempts: 0,
            attempts: AtomicU32::new(0),
            delay_ms: 0,
        }
    }
}

#[async_trait]
impl CandleSource for MockSource {
    async fn fetch_ohlcv(
        &self,
        _exchange: &str,
        symbol: &str,
        _timeframe: &str,
        _limit: usize,
    ) -> Result<Vec<Candle>, MonitorError> {
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        if let Some(fail) = &self.fail_symbol {
            if symbol == fail {
                return Err(MonitorError::Fetch("simulated outage".to_string()));
            }
        }
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.fail_first_attempts {
            return Err(MonitorError::Fetch(format!("flaky attempt {attempt}")));
        }
        Ok(point_candles(&self.closes))
    }
}

/// Strategy stub that never signals; keeps pool tests independent of
/// indicator math.
struct NoopStrategy;

impl SignalStrategy for NoopStrategy {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn compute_signals(
        &self,
        _target: &Target,
        candles: &[Candle],
    ) -> Result<IndicatorOutput, MonitorError> {
        Ok(IndicatorOutput {
            rows: Vec::new(),
            buy: false,
            sell: false,
            price: candles.last().map(|c| c.close).unwrap_or(0.0),
        })
    }
}

fn make_target(dir: &Path, symbol: &str) -> Target {
    Target {
        exchange: "binance".to_string(),
        symbol: symbol.to_string(),
        timeframe: "1m".to_string(),
        enabled: true,
        raw_csv: dir.join(format!("{}_raw.csv", symbol.replace('/', "_"))),
        signals_csv: dir.join(format!("{}_signals.csv", symbol.replace('/', "_"))),
    }
}

fn fast_config() -> MonitoringConfig {
    MonitoringConfig {
        max_retries: 2,
        retry_delay_secs: 0,
        max_workers: 3,
        ..MonitoringConfig::default()
    }
}

fn fixture_strategy() -> Arc<dyn SignalStrategy> {
    Arc::new(TrailingStopStrategy::new(
        TrailingStopConfig {
            use_heikin_ashi: false,
            price_source: PriceSource::Close,
            ma_type: MaType::Sma,
            ma_period: 2,
            atr_period: 2,
            multiplier: 0.5,
            ..TrailingStopConfig::default()
        },
        None,
    ))
}

#[tokio::test]
async fn test_one_failing_target_does_not_poison_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let (notifier, _queue) = notification_channel();

    let targets: Vec<Target> = (0..10)
        .map(|i| {
            let symbol = if i == 3 { "FAIL".to_string() } else { format!("SYM{i}") };
            make_target(dir.path(), &symbol)
        })
        .collect();

    let source = Arc::new(MockSource {
        fail_symbol: Some("FAIL".to_string()),
        ..MockSource::ok(&FIXTURE_CLOSES)
    });

    let monitor = Monitor::new(
        fast_config(),
        targets.clone(),
        source,
        Arc::new(SeriesStore::new()),
        vec![Arc::new(NoopStrategy)],
        notifier,
    );

    let result = monitor.process_batch(&targets).await;

    assert_eq!(result.success_count, 9);
    assert_eq!(result.error_count, 1);
    assert_eq!(result.per_target_errors.len(), 1);
    assert!(result.per_target_errors[0].target_key.contains("FAIL"));
}

#[tokio::test]
async fn test_bounded_pool_still_completes_every_target() {
    let dir = tempfile::tempdir().unwrap();
    let (notifier, _queue) = notification_channel();

    let targets: Vec<Target> = (0..10)
        .map(|i| make_target(dir.path(), &format!("SYM{i}")))
        .collect();

    let source = Arc::new(MockSource {
        delay_ms: 20,
        ..MockSource::ok(&FIXTURE_CLOSES)
    });

    let monitor = Monitor::new(
        fast_config(),
        targets.clone(),
        source,
        Arc::new(SeriesStore::new()),
        vec![Arc::new(NoopStrategy)],
        notifier,
    );

    let result = monitor.process_batch(&targets).await;

    assert_eq!(result.success_count, 10);
    // 10 tasks through 3 workers at ~20ms each: at least four waves
    assert!(result.elapsed.as_millis() >= 60);
}

#[tokio::test]
async fn test_fetch_retry_recovers_from_transient_failures() {
    let dir = tempfile::tempdir().unwrap();
    let (notifier, _queue) = notification_channel();

    let target = make_target(dir.path(), "BTC/USDT");
    let source = Arc::new(MockSource {
        fail_first_attempts: 2,
        ..MockSource::ok(&FIXTURE_CLOSES)
    });

    let monitor = Monitor::new(
        MonitoringConfig {
            max_retries: 3,
            retry_delay_secs: 0,
            ..MonitoringConfig::default()
        },
        vec![target.clone()],
        source,
        Arc::new(SeriesStore::new()),
        vec![Arc::new(NoopStrategy)],
        notifier,
    );

    let result = monitor.process_batch(&[target]).await;
    assert_eq!(result.success_count, 1);
    assert_eq!(result.error_count, 0);
}

#[tokio::test]
async fn test_fetch_retry_budget_exhausts_into_target_error() {
    let dir = tempfile::tempdir().unwrap();
    let (notifier, _queue) = notification_channel();

    let target = make_target(dir.path(), "BTC/USDT");
    let source = Arc::new(MockSource {
        fail_first_attempts: u32::MAX,
        ..MockSource::ok(&FIXTURE_CLOSES)
    });

    let monitor = Monitor::new(
        fast_config(),
        vec![target.clone()],
        source,
        Arc::new(SeriesStore::new()),
        vec![Arc::new(NoopStrategy)],
        notifier,
    );

    let result = monitor.process_batch(&[target]).await;
    assert_eq!(result.error_count, 1);
    assert!(result.per_target_errors[0].message.contains("after 2 attempts"));
}

#[tokio::test]
async fn test_end_to_end_signal_reaches_subscribers() {
    let dir = tempfile::tempdir().unwrap();
    let (notifier, queue) = notification_channel();
    let (broadcast_tx, mut broadcast_rx) = broadcast::channel(64);
    let consumer = tokio::spawn(queue.run(broadcast_tx));

    let target = make_target(dir.path(), "BTC/USDT");
    let source = Arc::new(MockSource::ok(&FIXTURE_CLOSES));

    let monitor = Monitor::new(
        fast_config(),
        vec![target.clone()],
        source,
        Arc::new(SeriesStore::new()),
        vec![fixture_strategy()],
        notifier.clone(),
    );

    // First batch: the fixture's final bar carries a buy edge
    let result = monitor.process_batch(&[target.clone()]).await;
    assert_eq!(result.success_count, 1);

    let json = broadcast_rx.recv().await.unwrap();
    let envelope: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(envelope["type"], "notification");
    assert_eq!(envelope["level"], "WARNING");
    assert_eq!(envelope["data"]["signal_type"], "BUY");
    assert_eq!(envelope["data"]["target_key"], "binance_BTC/USDT_1m");
    assert_eq!(envelope["data"]["price"], 102.0);

    // Second batch over the same data: state is already long, the repeated
    // edge must not emit a second event.
    monitor.process_batch(&[target]).await;
    notifier.notify_info("marker");

    let json = broadcast_rx.recv().await.unwrap();
    let envelope: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(envelope["message"], "marker");

    drop(monitor);
    drop(notifier);
    consumer.await.unwrap();
}

#[tokio::test]
async fn test_derived_series_written_per_target() {
    let dir = tempfile::tempdir().unwrap();
    let (notifier, _queue) = notification_channel();

    let target = make_target(dir.path(), "ETH/USDT");
    let source = Arc::new(MockSource::ok(&FIXTURE_CLOSES));

    let monitor = Monitor::new(
        fast_config(),
        vec![target.clone()],
        source,
        Arc::new(SeriesStore::new()),
        vec![fixture_strategy()],
        notifier,
    );

    monitor.process_batch(&[target.clone()]).await;

    assert!(target.raw_csv.exists());
    assert!(target.signals_csv.exists());
    let contents = std::fs::read_to_string(&target.signals_csv).unwrap();
    // header + one row per fixture candle
    assert_eq!(contents.lines().count(), FIXTURE_CLOSES.len() + 1);
}

#[tokio::test]
async fn test_enabled_targets_filtering() {
    let dir = tempfile::tempdir().unwrap();
    let (notifier, _queue) = notification_channel();

    let mut disabled = make_target(dir.path(), "DOGE/USDT");
    disabled.enabled = false;
    let targets = vec![make_target(dir.path(), "BTC/USDT"), disabled];

    let monitor = Monitor::new(
        fast_config(),
        targets,
        Arc::new(MockSource::ok(&FIXTURE_CLOSES)),
        Arc::new(SeriesStore::new()),
        vec![Arc::new(NoopStrategy)],
        notifier,
    );

    let enabled = monitor.enabled_targets();
    assert_eq!(enabled.len(), 1);
    assert_eq!(enabled[0].symbol, "BTC/USDT");
}
