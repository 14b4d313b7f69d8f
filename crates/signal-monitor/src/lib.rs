pub mod scheduler;
pub mod state;
pub mod strategy;

pub use scheduler::next_trigger_delay;
pub use state::SignalStateMap;
pub use strategy::{build_strategies, TrailingStopStrategy};

use std::sync::Arc;
use std::time::Duration;

use broadcast_server::NotificationSender;
use chrono::Utc;
use monitor_core::{
    BatchResult, Candle, CandleSource, MonitorError, MonitoringConfig, SignalEvent,
    SignalStrategy, Target, TargetError,
};
use series_store::SeriesStore;
use tokio::sync::{watch, Semaphore};
use tokio::time::Instant;

/// Upper bound on concurrent worker tasks, regardless of configuration.
const WORKER_HARD_CAP: usize = 20;

/// Cooldown after a cycle in which every target failed.
const CYCLE_ERROR_COOLDOWN: Duration = Duration::from_secs(5);

/// The monitoring pipeline: owns the candle source, the series store, the
/// strategy set, and the per-target signal states; driven by the scheduler
/// loop in [`Monitor::run`].
pub struct Monitor {
    config: MonitoringConfig,
    targets: Vec<Target>,
    source: Arc<dyn CandleSource>,
    store: Arc<SeriesStore>,
    strategies: Vec<Arc<dyn SignalStrategy>>,
    states: SignalStateMap,
    notifier: NotificationSender,
}

impl Monitor {
    pub fn new(
        config: MonitoringConfig,
        targets: Vec<Target>,
        source: Arc<dyn CandleSource>,
        store: Arc<SeriesStore>,
        strategies: Vec<Arc<dyn SignalStrategy>>,
        notifier: NotificationSender,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            targets,
            source,
            store,
            strategies,
            states: SignalStateMap::new(),
            notifier,
        })
    }

    pub fn enabled_targets(&self) -> Vec<Target> {
        self.targets.iter().filter(|t| t.enabled).cloned().collect()
    }

    fn pool_size(&self, target_count: usize) -> usize {
        target_count
            .min(self.config.max_workers)
            .min(WORKER_HARD_CAP)
            .max(1)
    }

    /// One-off full pass over the enabled targets (startup data sync).
    pub async fn sync_once(self: &Arc<Self>) -> BatchResult {
        let targets = self.enabled_targets();
        tracing::info!("initial data sync over {} targets", targets.len());
        let result = self.process_batch(&targets).await;
        tracing::info!(
            "initial sync complete: {} ok, {} failed, {:.2}s",
            result.success_count,
            result.error_count,
            result.elapsed.as_secs_f64()
        );
        result
    }

    /// Scheduler loop: sleep to the next trigger instant, run a batch,
    /// repeat until shutdown is signalled. The loop never exits on batch
    /// errors; a fully failed cycle just cools down before rescheduling.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let targets = self.enabled_targets();
        if targets.is_empty() {
            self.notifier
                .notify_warning("no enabled monitoring targets, check the configuration");
            return;
        }

        self.notifier.notify_info(format!(
            "monitoring started: every {} min at :{:02}s",
            self.config.trigger_minutes, self.config.trigger_second
        ));
        self.notifier.notify_info(format!(
            "{} targets, worker pool of {}",
            targets.len(),
            self.pool_size(targets.len())
        ));

        loop {
            let delay = next_trigger_delay(
                Utc::now(),
                self.config.trigger_minutes,
                self.config.trigger_second,
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }

            let result = self.process_batch(&targets).await;
            if result.error_count > 0 {
                tracing::warn!("{} targets failed this cycle", result.error_count);
            }
            tracing::debug!(
                "cycle complete: {} ok, {} failed, {:.2}s",
                result.success_count,
                result.error_count,
                result.elapsed.as_secs_f64()
            );

            if *shutdown.borrow() {
                break;
            }
            if result.error_count == targets.len() {
                tokio::time::sleep(CYCLE_ERROR_COOLDOWN).await;
            }
        }

        tracing::info!("monitor loop stopped");
    }

    /// Run one batch over `targets` on a bounded pool and wait for every task
    /// (join barrier): no task of this batch is still running when the method
    /// returns, so a target can never race against itself across batches.
    pub async fn process_batch(self: &Arc<Self>, targets: &[Target]) -> BatchResult {
        let started = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.pool_size(targets.len())));

        let mut handles = Vec::with_capacity(targets.len());
        for target in targets {
            let monitor = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            let target = target.clone();
            let key = target.key();
            let label = target.label();
            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| MonitorError::Fetch("worker pool closed".to_string()))?;
                monitor.process_target(&target).await
            });
            handles.push((key, label, handle));
        }

        let mut result = BatchResult::default();
        for (key, label, handle) in handles {
            match handle.await {
                Ok(Ok(())) => result.success_count += 1,
                Ok(Err(e)) => {
                    tracing::error!("target {} failed: {}", key, e);
                    self.notifier.notify_error(e.to_string(), Some(&label));
                    result.error_count += 1;
                    result.per_target_errors.push(TargetError {
                        target_key: key,
                        message: e.to_string(),
                    });
                }
                Err(join_error) => {
                    // Task panicked; the failure stays isolated to this target.
                    tracing::error!("target {} task aborted: {}", key, join_error);
                    result.error_count += 1;
                    result.per_target_errors.push(TargetError {
                        target_key: key,
                        message: join_error.to_string(),
                    });
                }
            }
        }

        result.elapsed = started.elapsed();
        result
    }

    /// The per-target pipeline: fetch → merge → tail → indicators → state
    /// machine → notification.
    async fn process_target(&self, target: &Target) -> Result<(), MonitorError> {
        let fetched = self.fetch_with_retry(target).await?;
        let merged = self.store.merge_candles(&target.raw_csv, &fetched).await?;
        let window = series_store::tail(&merged, self.config.tail_calc);

        for strategy in &self.strategies {
            let output = strategy.compute_signals(target, window)?;
            self.store
                .write_derived(&target.signals_csv, &output.rows)
                .await?;

            let key = target.key();
            if let Some(kind) = self.states.transition(&key, output.buy, output.sell) {
                let enrichment = strategy.enrich(target, window);
                let event = SignalEvent {
                    target_key: key,
                    exchange: target.exchange.clone(),
                    symbol: target.symbol.clone(),
                    timeframe: target.timeframe.clone(),
                    kind,
                    price: output.price,
                    timestamp: Utc::now(),
                    enrichment,
                };
                tracing::info!(
                    "{} signal for {} at {}",
                    kind.as_str(),
                    target.label(),
                    output.price
                );
                self.notifier.notify_signal(&event);
            }
        }

        Ok(())
    }

    async fn fetch_with_retry(&self, target: &Target) -> Result<Vec<Candle>, MonitorError> {
        let mut last_error = String::new();
        for attempt in 1..=self.config.max_retries {
            match self
                .source
                .fetch_ohlcv(
                    &target.exchange,
                    &target.symbol,
                    &target.timeframe,
                    self.config.fetch_limit,
                )
                .await
            {
                Ok(candles) => return Ok(candles),
                Err(e) => {
                    tracing::warn!(
                        "{} fetch failed (attempt {}/{}): {}",
                        target.label(),
                        attempt,
                        self.config.max_retries,
                        e
                    );
                    last_error = e.to_string();
                    if attempt < self.config.max_retries {
                        tokio::time::sleep(Duration::from_secs(self.config.retry_delay_secs))
                            .await;
                    }
                }
            }
        }

        Err(MonitorError::Fetch(format!(
            "{} failed after {} attempts: {}",
            target.label(),
            self.config.max_retries,
            last_error
        )))
    }
}

#[cfg(test)]
mod tests;
