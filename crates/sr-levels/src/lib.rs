pub mod cluster;
pub mod methods;
pub mod resample;

use chrono::Utc;
use monitor_core::{timeframe_minutes, Candle, MonitorError, SrConfig, SrSummary};

use crate::methods::CandidateLevel;
use crate::resample::resample;

const FIB_LOOKBACK: usize = 50;

/// Swing detection window (bars on each side of a local extreme).
const SWING_WINDOW: usize = 3;

/// Compute the multi-timeframe S/R zone report for the latest bar.
///
/// The whole candidate set is rebuilt per call — clustering depends on every
/// candidate, so there is no incremental state to carry.
pub fn compute_sr_levels(
    base_candles: &[Candle],
    base_timeframe: &str,
    config: &SrConfig,
) -> Result<SrSummary, MonitorError> {
    let last = base_candles.last().ok_or_else(|| {
        MonitorError::InsufficientData("S/R analysis needs a non-empty series".to_string())
    })?;
    let current_price = last.close;
    if !current_price.is_finite() || current_price <= 0.0 {
        return Err(MonitorError::InvalidData(format!(
            "S/R analysis needs a positive close, got {current_price}"
        )));
    }

    let mut candidates: Vec<CandidateLevel> = Vec::new();

    for timeframe in &config.timeframes {
        let minutes = timeframe_minutes(timeframe).ok_or_else(|| {
            MonitorError::Config(format!("unknown S/R timeframe '{timeframe}'"))
        })?;

        let resampled;
        let series: &[Candle] = if timeframe.as_str() == base_timeframe {
            base_candles
        } else {
            resampled = resample(base_candles, minutes);
            &resampled
        };

        if series.is_empty() {
            tracing::debug!("no bars after resampling to {}", timeframe);
            continue;
        }

        if config.show_swings {
            candidates.extend(methods::swing_candidates(
                series,
                timeframe,
                SWING_WINDOW,
                config.lookback_swings,
            ));
        }
        if config.show_pivots {
            candidates.extend(methods::pivot_candidates(series, timeframe));
        }
        if config.show_fibonacci {
            candidates.extend(methods::fibonacci_candidates(series, timeframe, FIB_LOOKBACK));
        }
        if config.show_order_blocks {
            candidates.extend(methods::order_block_candidates(series, timeframe));
        }
        if config.show_volume_profile {
            candidates.extend(methods::volume_profile_candidates(series, timeframe));
        }
    }

    // Price-magnitude levels are timeframe-independent; collected once.
    if config.show_psychological_levels {
        candidates.extend(methods::psychological_candidates(
            current_price,
            config.show_within_percent,
        ));
    }

    let zones = cluster::build_zones(&candidates, base_candles, current_price, config);

    Ok(SrSummary {
        zones,
        current_price,
        computed_at: Utc::now(),
    })
}
