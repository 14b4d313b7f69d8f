use monitor_core::{Candle, MaType, MonitorError, PriceSource, TrailingStopConfig, TrailingStopRow};

use crate::ma::{atr, ema, hull_ma, sma, wma};

/// Smoothed open/close series derived from raw candles.
pub struct HeikinAshi {
    pub open: Vec<f64>,
    pub close: Vec<f64>,
}

/// Heikin-Ashi transform: close = mean(o,h,l,c); open is the running average
/// of the previous transformed open and close.
pub fn heikin_ashi(candles: &[Candle]) -> HeikinAshi {
    let mut open = Vec::with_capacity(candles.len());
    let mut close = Vec::with_capacity(candles.len());

    for (i, candle) in candles.iter().enumerate() {
        close.push((candle.open + candle.high + candle.low + candle.close) / 4.0);
        if i == 0 {
            open.push(candle.open);
        } else {
            open.push((open[i - 1] + close[i - 1]) / 2.0);
        }
    }

    HeikinAshi { open, close }
}

fn select_src(candles: &[Candle], config: &TrailingStopConfig) -> Vec<f64> {
    if config.use_heikin_ashi {
        let ha = heikin_ashi(candles);
        match config.price_source {
            PriceSource::Open => ha.open,
            PriceSource::Close => ha.close,
        }
    } else {
        match config.price_source {
            PriceSource::Open => candles.iter().map(|c| c.open).collect(),
            PriceSource::Close => candles.iter().map(|c| c.close).collect(),
        }
    }
}

fn moving_average(src: &[f64], config: &TrailingStopConfig) -> Vec<f64> {
    match config.ma_type {
        MaType::Sma => sma(src, config.ma_period),
        MaType::Ema => ema(src, config.ma_period),
        MaType::Wma => wma(src, config.ma_period),
        MaType::Hma => hull_ma(src, config.ma_period),
    }
}

/// Compute the ATR trailing-stop series with edge-triggered buy/sell flags.
///
/// The stop recursion keeps the branch order of the reference indicator:
/// the third condition re-tests `src > prev` after the first has already
/// produced a candidate, and wins when both held. The two tests are not
/// interchangeable once the candidate is assigned.
pub fn compute_trailing_stop(
    candles: &[Candle],
    config: &TrailingStopConfig,
) -> Result<Vec<TrailingStopRow>, MonitorError> {
    if candles.len() <= config.atr_period {
        return Err(MonitorError::InsufficientData(format!(
            "trailing stop needs more than {} candles, got {}",
            config.atr_period,
            candles.len()
        )));
    }

    let src = select_src(candles, config);
    let thema = moving_average(&src, config);

    // ATR always runs over the raw series, never the transformed one.
    let n_loss: Vec<f64> = atr(candles, config.atr_period)
        .into_iter()
        .map(|v| v * config.multiplier)
        .collect();

    let len = candles.len();
    let mut stop = vec![f64::NAN; len];
    for i in 0..len {
        let prev = if i == 0 || stop[i - 1].is_nan() {
            0.0
        } else {
            stop[i - 1]
        };

        let cond1 = src[i] > prev;
        let cond2 = i > 0 && src[i] < prev && src[i - 1] < prev;
        let cond3 = i > 0 && src[i] > prev && src[i - 1] > prev;

        let iff1 = if cond1 {
            src[i] - n_loss[i]
        } else {
            src[i] + n_loss[i]
        };
        let iff2 = if cond2 {
            prev.min(src[i] + n_loss[i])
        } else {
            iff1
        };
        stop[i] = if cond3 {
            prev.max(src[i] - n_loss[i])
        } else {
            iff2
        };
    }

    let mut rows = Vec::with_capacity(len);
    for i in 0..len {
        let (mut buy, mut sell) = (false, false);
        if i > 0 {
            // NaN comparisons are false, so warmup bars never signal.
            let above = thema[i - 1] < stop[i - 1] && thema[i] > stop[i];
            let below = stop[i - 1] < thema[i - 1] && stop[i] > thema[i];
            buy = above && src[i] > stop[i];
            sell = below && src[i] < stop[i];
        }
        rows.push(TrailingStopRow {
            timestamp: candles[i].timestamp,
            src: src[i],
            ma_value: thema[i],
            stop: stop[i],
            buy: buy && config.allow_buy,
            sell: sell && config.allow_sell,
        });
    }

    Ok(rows)
}
