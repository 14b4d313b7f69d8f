use std::collections::BTreeSet;
use std::path::Path;

use monitor_core::{ExchangeConfig, SystemConfig, Target};

/// Assemble the system configuration: a JSON config file when present,
/// env-var targets otherwise, everything run through the defaulting
/// validators. Configuration problems downgrade to warnings.
pub fn load_config() -> SystemConfig {
    let path =
        std::env::var("MONITOR_CONFIG").unwrap_or_else(|_| "config/monitor.json".to_string());

    let mut config = match std::fs::read_to_string(&path) {
        Ok(raw) => match serde_json::from_str::<SystemConfig>(&raw) {
            Ok(config) => {
                tracing::info!("configuration loaded from {path}");
                config
            }
            Err(e) => {
                tracing::warn!("could not parse {path}: {e}; using defaults");
                SystemConfig::default()
            }
        },
        Err(_) => {
            tracing::info!("no config file at {path}, using defaults and environment");
            SystemConfig::default()
        }
    };

    config.monitoring = config.monitoring.validated();
    config.trailing_stop = config.trailing_stop.validated();
    config.sr = config.sr.validated();

    if config.targets.is_empty() {
        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string());
        config.targets = targets_from_env(Path::new(&data_dir));
    }

    if config.exchanges.is_empty() {
        config.exchanges = exchanges_from_targets(&config.targets);
    }

    config
}

/// `MONITOR_TARGETS=binance:BTC/USDT:15m,okx:ETH/USDT:1h`
fn targets_from_env(data_dir: &Path) -> Vec<Target> {
    let Ok(raw) = std::env::var("MONITOR_TARGETS") else {
        return Vec::new();
    };

    raw.split(',')
        .filter_map(|spec| {
            let parts: Vec<&str> = spec.trim().split(':').collect();
            if parts.len() != 3 {
                tracing::warn!("ignoring malformed target spec '{spec}'");
                return None;
            }
            Some(make_target(data_dir, parts[0], parts[1], parts[2]))
        })
        .collect()
}

fn make_target(data_dir: &Path, exchange: &str, symbol: &str, timeframe: &str) -> Target {
    let stem = format!("{}_{}_{}", exchange, symbol.replace('/', "-"), timeframe);
    Target {
        exchange: exchange.to_string(),
        symbol: symbol.to_string(),
        timeframe: timeframe.to_string(),
        enabled: true,
        raw_csv: data_dir.join("raw").join(format!("{stem}.csv")),
        signals_csv: data_dir.join("signals").join(format!("{stem}.csv")),
    }
}

/// Every exchange referenced by a target, enabled with default rate limits.
fn exchanges_from_targets(targets: &[Target]) -> Vec<ExchangeConfig> {
    let names: BTreeSet<&str> = targets.iter().map(|t| t.exchange.as_str()).collect();
    names
        .into_iter()
        .map(|name| ExchangeConfig {
            name: name.to_string(),
            enabled: true,
            rate_limit_per_minute: 600,
        })
        .collect()
}
