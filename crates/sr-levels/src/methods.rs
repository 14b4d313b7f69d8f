use monitor_core::{Candle, ZoneType};

/// A raw candidate level, before clustering.
#[derive(Debug, Clone)]
pub struct CandidateLevel {
    pub level: f64,
    pub method: String,
    pub timeframe: String,
    pub zone_type: ZoneType,
}

impl CandidateLevel {
    fn new(level: f64, method: impl Into<String>, timeframe: &str, zone_type: ZoneType) -> Self {
        Self {
            level,
            method: method.into(),
            timeframe: timeframe.to_string(),
            zone_type,
        }
    }
}

/// Windowed local extrema: a swing high is strictly greater than every high
/// within `window` bars on both sides (symmetric for lows). Returns the most
/// recent `keep` of each.
pub fn swing_points(candles: &[Candle], window: usize, keep: usize) -> (Vec<f64>, Vec<f64>) {
    let len = candles.len();
    if len < 2 * window + 1 {
        return (Vec::new(), Vec::new());
    }

    let mut highs = Vec::new();
    let mut lows = Vec::new();

    for i in window..len - window {
        let is_high = (1..=window).all(|d| {
            candles[i].high > candles[i - d].high && candles[i].high > candles[i + d].high
        });
        if is_high {
            highs.push(candles[i].high);
        }
        let is_low = (1..=window).all(|d| {
            candles[i].low < candles[i - d].low && candles[i].low < candles[i + d].low
        });
        if is_low {
            lows.push(candles[i].low);
        }
    }

    let highs = highs.split_off(highs.len().saturating_sub(keep));
    let lows = lows.split_off(lows.len().saturating_sub(keep));
    (highs, lows)
}

pub fn swing_candidates(
    candles: &[Candle],
    timeframe: &str,
    window: usize,
    keep: usize,
) -> Vec<CandidateLevel> {
    let (highs, lows) = swing_points(candles, window, keep);
    let mut out = Vec::with_capacity(highs.len() + lows.len());
    for high in highs {
        out.push(CandidateLevel::new(high, "Swing High", timeframe, ZoneType::Resistance));
    }
    for low in lows {
        out.push(CandidateLevel::new(low, "Swing Low", timeframe, ZoneType::Support));
    }
    out
}

/// Classic pivot-point formula over the latest bar: P, S1, R1.
pub fn pivot_candidates(candles: &[Candle], timeframe: &str) -> Vec<CandidateLevel> {
    let Some(last) = candles.last() else {
        return Vec::new();
    };

    let pivot = (last.high + last.low + last.close) / 3.0;
    let s1 = pivot * 2.0 - last.high;
    let r1 = pivot * 2.0 - last.low;

    vec![
        CandidateLevel::new(pivot, "Pivot", timeframe, ZoneType::Pivot),
        CandidateLevel::new(s1, "S1", timeframe, ZoneType::Support),
        CandidateLevel::new(r1, "R1", timeframe, ZoneType::Resistance),
    ]
}

const FIB_RATIOS: [(f64, &str); 5] = [
    (0.236, "0.236"),
    (0.382, "0.382"),
    (0.5, "0.5"),
    (0.618, "0.618"),
    (0.786, "0.786"),
];

/// Fibonacci retracement of the high/low range over the last `period` bars.
pub fn fibonacci_candidates(
    candles: &[Candle],
    timeframe: &str,
    period: usize,
) -> Vec<CandidateLevel> {
    if candles.len() < period {
        return Vec::new();
    }

    let recent = &candles[candles.len() - period..];
    let high = recent.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let low = recent.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    if high == low {
        return Vec::new();
    }

    FIB_RATIOS
        .iter()
        .map(|(ratio, label)| {
            CandidateLevel::new(
                low + (high - low) * ratio,
                format!("Fibonacci {label}"),
                timeframe,
                ZoneType::Pivot,
            )
        })
        .collect()
}

/// Engulfing-bar order blocks. A bullish block is the low of a down bar that
/// the next bar engulfs upward (close above the down bar's high); bearish is
/// the mirror. The most recent of each wins.
pub fn order_block_candidates(candles: &[Candle], timeframe: &str) -> Vec<CandidateLevel> {
    if candles.len() < 3 {
        return Vec::new();
    }

    let mut bullish: Option<f64> = None;
    let mut bearish: Option<f64> = None;

    for i in 2..candles.len() {
        let current = &candles[i];
        let prev = &candles[i - 1];

        if current.close > current.open && prev.close < prev.open && current.close > prev.high {
            bullish = Some(prev.low);
        }
        if current.close < current.open && prev.close > prev.open && current.close < prev.low {
            bearish = Some(prev.high);
        }
    }

    let mut out = Vec::new();
    if let Some(level) = bullish {
        out.push(CandidateLevel::new(level, "Bullish OB", timeframe, ZoneType::Support));
    }
    if let Some(level) = bearish {
        out.push(CandidateLevel::new(level, "Bearish OB", timeframe, ZoneType::Resistance));
    }
    out
}

const VOLUME_LOOKBACK: usize = 50;

/// VWAP and point-of-control over the last 50 bars.
pub fn volume_profile_candidates(candles: &[Candle], timeframe: &str) -> Vec<CandidateLevel> {
    if candles.len() < VOLUME_LOOKBACK {
        return Vec::new();
    }

    let recent = &candles[candles.len() - VOLUME_LOOKBACK..];
    let total_volume: f64 = recent.iter().map(|c| c.volume).sum();
    if total_volume <= 0.0 {
        return Vec::new();
    }

    let vwap = recent
        .iter()
        .map(|c| c.volume * (c.high + c.low + c.close) / 3.0)
        .sum::<f64>()
        / total_volume;

    let poc_bar = recent
        .iter()
        .max_by(|a, b| a.volume.total_cmp(&b.volume))
        .unwrap();
    let poc = (poc_bar.high + poc_bar.low) / 2.0;

    vec![
        CandidateLevel::new(vwap, "VWAP", timeframe, ZoneType::Pivot),
        CandidateLevel::new(poc, "POC", timeframe, ZoneType::Pivot),
    ]
}

/// Round-number levels scaled to price magnitude, within `within_percent`
/// of the current price.
pub fn psychological_candidates(current_price: f64, within_percent: f64) -> Vec<CandidateLevel> {
    if !current_price.is_finite() || current_price <= 0.0 {
        return Vec::new();
    }

    let interval = if current_price >= 10_000.0 {
        1000.0
    } else if current_price >= 1000.0 {
        100.0
    } else if current_price >= 100.0 {
        10.0
    } else if current_price >= 10.0 {
        1.0
    } else {
        0.1
    };

    let range = within_percent / 100.0 * current_price;
    let min_price = current_price - range;
    let max_price = current_price + range;

    let start = (min_price / interval).floor() * interval;
    let mut out = Vec::new();
    let mut level = start;
    while level <= max_price + interval {
        if level > 0.0 && level != current_price {
            let zone_type = if level > current_price {
                ZoneType::Resistance
            } else {
                ZoneType::Support
            };
            out.push(CandidateLevel::new(level, "Psychological", "All", zone_type));
        }
        level += interval;
    }
    out
}
