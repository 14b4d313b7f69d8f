use chrono::{DateTime, Utc};
use monitor_core::Candle;

/// Aggregate a base series up to `minutes`-sized buckets:
/// open = first, high = max, low = min, close = last, volume = sum.
/// Input must be ordered by ascending timestamp.
pub fn resample(candles: &[Candle], minutes: i64) -> Vec<Candle> {
    if candles.is_empty() || minutes <= 0 {
        return Vec::new();
    }

    let bucket_secs = minutes * 60;
    let mut result: Vec<Candle> = Vec::new();
    let mut current_bucket: Option<(i64, Candle)> = None;

    for candle in candles {
        let bucket = candle.timestamp.timestamp().div_euclid(bucket_secs);
        match &mut current_bucket {
            Some((key, agg)) if *key == bucket => {
                agg.high = agg.high.max(candle.high);
                agg.low = agg.low.min(candle.low);
                agg.close = candle.close;
                agg.volume += candle.volume;
            }
            _ => {
                if let Some((_, agg)) = current_bucket.take() {
                    result.push(agg);
                }
                current_bucket = Some((
                    bucket,
                    Candle {
                        timestamp: bucket_start(bucket, bucket_secs),
                        ..candle.clone()
                    },
                ));
            }
        }
    }

    if let Some((_, agg)) = current_bucket {
        result.push(agg);
    }
    result
}

fn bucket_start(bucket: i64, bucket_secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(bucket * bucket_secs, 0).unwrap_or_default()
}
