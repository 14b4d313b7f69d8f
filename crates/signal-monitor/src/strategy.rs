use std::sync::Arc;

use monitor_core::{
    Candle, IndicatorOutput, MonitorError, SignalStrategy, SrConfig, SrSummary, SystemConfig,
    Target, TrailingStopConfig,
};
use sr_levels::compute_sr_levels;
use trend_indicator::compute_trailing_stop;

/// ATR trailing-stop strategy with optional S/R enrichment.
pub struct TrailingStopStrategy {
    config: TrailingStopConfig,
    sr_config: Option<SrConfig>,
}

impl TrailingStopStrategy {
    pub fn new(config: TrailingStopConfig, sr_config: Option<SrConfig>) -> Self {
        Self { config, sr_config }
    }
}

impl SignalStrategy for TrailingStopStrategy {
    fn name(&self) -> &'static str {
        "trailing-stop"
    }

    fn compute_signals(
        &self,
        _target: &Target,
        candles: &[Candle],
    ) -> Result<IndicatorOutput, MonitorError> {
        let rows = compute_trailing_stop(candles, &self.config)?;
        let last_row = rows.last().ok_or_else(|| {
            MonitorError::InsufficientData("trailing stop produced no rows".to_string())
        })?;
        let last_candle = candles.last().ok_or_else(|| {
            MonitorError::InsufficientData("empty candle series".to_string())
        })?;

        Ok(IndicatorOutput {
            buy: last_row.buy,
            sell: last_row.sell,
            price: last_candle.close,
            rows,
        })
    }

    /// S/R context is only worth computing when a transition actually fired;
    /// a failure here degrades the signal, it never suppresses it.
    fn enrich(&self, target: &Target, candles: &[Candle]) -> Option<SrSummary> {
        let config = self.sr_config.as_ref()?;
        match compute_sr_levels(candles, &target.timeframe, config) {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::warn!("S/R enrichment failed for {}: {}", target.label(), e);
                None
            }
        }
    }
}

/// Build the configured strategy set. The set is closed: variants are chosen
/// here, not discovered at runtime.
pub fn build_strategies(config: &SystemConfig) -> Vec<Arc<dyn SignalStrategy>> {
    let sr_config = config.sr.enabled.then(|| config.sr.clone().validated());
    vec![Arc::new(TrailingStopStrategy::new(
        config.trailing_stop.clone().validated(),
        sr_config,
    ))]
}
