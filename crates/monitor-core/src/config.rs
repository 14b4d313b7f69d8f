use serde::{Deserialize, Serialize};

use crate::Target;

/// Scheduler + worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Second-of-minute at which a cycle triggers
    pub trigger_second: u32,
    /// Minutes between cycles
    pub trigger_minutes: u32,
    /// Candles requested per fetch
    pub fetch_limit: usize,
    /// Tail window handed to the indicator engine
    pub tail_calc: usize,
    pub max_retries: u32,
    /// Seconds between fetch attempts
    pub retry_delay_secs: u64,
    pub max_workers: usize,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            trigger_second: 30,
            trigger_minutes: 1,
            fetch_limit: 100,
            tail_calc: 50,
            max_retries: 3,
            retry_delay_secs: 10,
            max_workers: 8,
        }
    }
}

impl MonitoringConfig {
    /// Correct invalid values to documented defaults with a warning.
    /// Configuration problems are never fatal.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        if self.trigger_second > 59 {
            tracing::warn!(
                "trigger_second {} out of range, using default {}",
                self.trigger_second,
                defaults.trigger_second
            );
            self.trigger_second = defaults.trigger_second;
        }
        self.trigger_minutes =
            positive_u32(self.trigger_minutes, "trigger_minutes", defaults.trigger_minutes);
        self.fetch_limit = positive_usize(self.fetch_limit, "fetch_limit", defaults.fetch_limit);
        self.tail_calc = positive_usize(self.tail_calc, "tail_calc", defaults.tail_calc);
        self.max_retries = positive_u32(self.max_retries, "max_retries", defaults.max_retries);
        self.retry_delay_secs = if self.retry_delay_secs == 0 {
            tracing::warn!(
                "retry_delay_secs 0 is invalid, using default {}",
                defaults.retry_delay_secs
            );
            defaults.retry_delay_secs
        } else {
            self.retry_delay_secs
        };
        self.max_workers = positive_usize(self.max_workers, "max_workers", defaults.max_workers);
        self
    }
}

fn positive_u32(value: u32, name: &str, default: u32) -> u32 {
    if value == 0 {
        tracing::warn!("{} 0 is invalid, using default {}", name, default);
        default
    } else {
        value
    }
}

fn positive_usize(value: usize, name: &str, default: usize) -> usize {
    if value == 0 {
        tracing::warn!("{} 0 is invalid, using default {}", name, default);
        default
    } else {
        value
    }
}

/// Per-exchange connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    pub name: String,
    pub enabled: bool,
    /// Requests per minute; 0 disables client-side rate limiting
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: usize,
}

fn default_rate_limit() -> usize {
    600
}

/// Moving-average flavor for the trailing-stop engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaType {
    Sma,
    Ema,
    Wma,
    Hma,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceSource {
    Open,
    Close,
}

/// Trailing-stop ("UT Bot") indicator parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailingStopConfig {
    pub allow_buy: bool,
    pub allow_sell: bool,
    pub use_heikin_ashi: bool,
    pub price_source: PriceSource,
    pub ma_type: MaType,
    pub ma_period: usize,
    pub atr_period: usize,
    /// ATR multiplier (`a`)
    pub multiplier: f64,
}

impl Default for TrailingStopConfig {
    fn default() -> Self {
        Self {
            allow_buy: true,
            allow_sell: true,
            use_heikin_ashi: true,
            price_source: PriceSource::Open,
            ma_type: MaType::Hma,
            ma_period: 2,
            atr_period: 11,
            multiplier: 1.0,
        }
    }
}

impl TrailingStopConfig {
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        self.ma_period = positive_usize(self.ma_period, "ma_period", defaults.ma_period);
        self.atr_period = positive_usize(self.atr_period, "atr_period", defaults.atr_period);
        if !self.multiplier.is_finite() || self.multiplier <= 0.0 {
            tracing::warn!(
                "multiplier {} is invalid, using default {}",
                self.multiplier,
                defaults.multiplier
            );
            self.multiplier = defaults.multiplier;
        }
        self
    }
}

/// Zone ordering for the S/R report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortZonesBy {
    Confluence,
    Reactions,
    Distance,
}

/// Multi-timeframe S/R clustering parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SrConfig {
    pub enabled: bool,
    /// Higher timeframes to resample into, e.g. ["15m", "1h", "4h"]
    pub timeframes: Vec<String>,
    pub show_swings: bool,
    pub show_pivots: bool,
    pub show_fibonacci: bool,
    pub show_order_blocks: bool,
    pub show_volume_profile: bool,
    pub show_psychological_levels: bool,
    /// Only report zones within this percent of current price
    pub show_within_percent: f64,
    /// Swing points kept per side per timeframe
    pub lookback_swings: usize,
    /// Candidates closer than this percent merge into one zone
    pub cluster_percent: f64,
    pub top_n: usize,
    /// Closes inspected when counting zone reactions
    pub reaction_lookback: usize,
    pub sort_by: SortZonesBy,
    pub min_confluence: u32,
}

impl Default for SrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeframes: vec!["15m".to_string(), "1h".to_string(), "4h".to_string()],
            show_swings: true,
            show_pivots: false,
            show_fibonacci: false,
            show_order_blocks: false,
            show_volume_profile: false,
            show_psychological_levels: true,
            show_within_percent: 2.5,
            lookback_swings: 3,
            cluster_percent: 0.25,
            top_n: 8,
            reaction_lookback: 100,
            sort_by: SortZonesBy::Confluence,
            min_confluence: 2,
        }
    }
}

impl SrConfig {
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        if !self.cluster_percent.is_finite() || self.cluster_percent <= 0.0 {
            tracing::warn!(
                "cluster_percent {} is invalid, using default {}",
                self.cluster_percent,
                defaults.cluster_percent
            );
            self.cluster_percent = defaults.cluster_percent;
        }
        if !self.show_within_percent.is_finite() || self.show_within_percent <= 0.0 {
            tracing::warn!(
                "show_within_percent {} is invalid, using default {}",
                self.show_within_percent,
                defaults.show_within_percent
            );
            self.show_within_percent = defaults.show_within_percent;
        }
        self.top_n = positive_usize(self.top_n, "top_n", defaults.top_n);
        self.lookback_swings =
            positive_usize(self.lookback_swings, "lookback_swings", defaults.lookback_swings);
        self.reaction_lookback = positive_usize(
            self.reaction_lookback,
            "reaction_lookback",
            defaults.reaction_lookback,
        );
        self
    }
}

/// Full system configuration consumed by the daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub monitoring: MonitoringConfig,
    pub exchanges: Vec<ExchangeConfig>,
    pub targets: Vec<Target>,
    pub trailing_stop: TrailingStopConfig,
    pub sr: SrConfig,
}
