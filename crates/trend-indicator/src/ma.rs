use monitor_core::Candle;

/// Simple Moving Average. Full-length output aligned with the input; positions
/// before `period - 1` hold NaN so downstream series stay index-aligned.
pub fn sma(data: &[f64], period: usize) -> Vec<f64> {
    let mut result = vec![f64::NAN; data.len()];
    if period == 0 || data.len() < period {
        return result;
    }

    for i in period - 1..data.len() {
        let sum: f64 = data[i + 1 - period..=i].iter().sum();
        result[i] = sum / period as f64;
    }
    result
}

/// Exponential Moving Average, seeded with the SMA of the first `period`
/// values. NaN until the seed index.
pub fn ema(data: &[f64], period: usize) -> Vec<f64> {
    let mut result = vec![f64::NAN; data.len()];
    if period == 0 || data.len() < period {
        return result;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let seed: f64 = data[..period].iter().sum::<f64>() / period as f64;
    result[period - 1] = seed;

    for i in period..data.len() {
        result[i] = (data[i] - result[i - 1]) * multiplier + result[i - 1];
    }
    result
}

/// Weighted Moving Average with weights 1..=period (newest weighted heaviest).
pub fn wma(data: &[f64], period: usize) -> Vec<f64> {
    let mut result = vec![f64::NAN; data.len()];
    if period == 0 || data.len() < period {
        return result;
    }

    let weight_sum = (period * (period + 1)) as f64 / 2.0;
    for i in period - 1..data.len() {
        let window = &data[i + 1 - period..=i];
        let dot: f64 = window
            .iter()
            .enumerate()
            .map(|(j, v)| v * (j + 1) as f64)
            .sum();
        result[i] = dot / weight_sum;
    }
    result
}

/// Hull Moving Average: `WMA(2·WMA(src, n/2) − WMA(src, n), ⌊√n⌋)`.
pub fn hull_ma(data: &[f64], period: usize) -> Vec<f64> {
    if period <= 1 {
        return data.to_vec();
    }

    let half_len = period / 2;
    let sqrt_len = (period as f64).sqrt() as usize;

    let wma_half = wma(data, half_len);
    let wma_full = wma(data, period);

    let diff: Vec<f64> = wma_half
        .iter()
        .zip(wma_full.iter())
        .map(|(h, f)| 2.0 * h - f)
        .collect();

    wma(&diff, sqrt_len)
}

/// Average True Range with Wilder smoothing over raw high/low/close.
/// Values before index `period` are NaN.
pub fn atr(candles: &[Candle], period: usize) -> Vec<f64> {
    let mut result = vec![f64::NAN; candles.len()];
    if period == 0 || candles.len() <= period {
        return result;
    }

    let mut true_ranges = Vec::with_capacity(candles.len() - 1);
    for i in 1..candles.len() {
        let high_low = candles[i].high - candles[i].low;
        let high_close = (candles[i].high - candles[i - 1].close).abs();
        let low_close = (candles[i].low - candles[i - 1].close).abs();
        true_ranges.push(high_low.max(high_close).max(low_close));
    }

    let mut value = true_ranges[..period].iter().sum::<f64>() / period as f64;
    result[period] = value;

    for i in period + 1..candles.len() {
        value = (value * (period - 1) as f64 + true_ranges[i - 1]) / period as f64;
        result[i] = value;
    }
    result
}
