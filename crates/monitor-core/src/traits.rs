use async_trait::async_trait;

use crate::{Candle, IndicatorOutput, MonitorError, SrSummary, Target};

/// Source of OHLCV candle data (exchange REST client, replay file, mock).
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Fetch up to `limit` most recent candles, ordered by ascending timestamp.
    async fn fetch_ohlcv(
        &self,
        exchange: &str,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, MonitorError>;
}

/// A signal-generating strategy over a candle series. Implementations form a
/// closed set selected at configuration time.
pub trait SignalStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Compute the indicator series and the latest-bar signal edges.
    fn compute_signals(
        &self,
        target: &Target,
        candles: &[Candle],
    ) -> Result<IndicatorOutput, MonitorError>;

    /// Optional enrichment computed only when a state transition actually
    /// fires (S/R context, etc.). Default: none.
    fn enrich(&self, _target: &Target, _candles: &[Candle]) -> Option<SrSummary> {
        None
    }
}
