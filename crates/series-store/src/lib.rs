use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use monitor_core::{Candle, MonitorError, TrailingStopRow};
use tokio::sync::{Mutex, OwnedMutexGuard};

const LOCK_ATTEMPTS: u32 = 3;
const LOCK_TIMEOUT_MS: u64 = 100;

/// CSV-backed candle series store with one exclusive section per output path.
///
/// Writers to different paths never block each other; writers to the same path
/// serialize through an in-process per-path mutex with a bounded acquisition
/// budget. A single daemon owns the data directory.
#[derive(Default)]
pub struct SeriesStore {
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl SeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the per-path section. Each attempt waits a little longer; the
    /// exhausted budget surfaces as `StoreContention`.
    async fn lock_path(&self, path: &Path) -> Result<OwnedMutexGuard<()>, MonitorError> {
        let mutex = self
            .locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        for attempt in 1..=LOCK_ATTEMPTS {
            let timeout = Duration::from_millis(LOCK_TIMEOUT_MS * attempt as u64);
            match tokio::time::timeout(timeout, mutex.clone().lock_owned()).await {
                Ok(guard) => return Ok(guard),
                Err(_) => {
                    tracing::warn!(
                        "series lock busy for {} (attempt {}/{})",
                        path.display(),
                        attempt,
                        LOCK_ATTEMPTS
                    );
                }
            }
        }

        Err(MonitorError::StoreContention(format!(
            "could not lock {} after {} attempts",
            path.display(),
            LOCK_ATTEMPTS
        )))
    }

    /// Merge freshly fetched candles into the persisted series at `path` and
    /// return the full merged series. Duplicate timestamps keep the newest
    /// write, output stays sorted ascending, and re-merging the same batch is
    /// a no-op.
    pub async fn merge_candles(
        &self,
        path: &Path,
        new: &[Candle],
    ) -> Result<Vec<Candle>, MonitorError> {
        let _guard = self.lock_path(path).await?;

        let existing = if path.exists() {
            read_candles(path)?
        } else {
            Vec::new()
        };

        let merged = merge_series(existing, new);
        write_candles(path, &merged)?;
        Ok(merged)
    }

    /// Overwrite the derived trailing-stop series for a target.
    pub async fn write_derived(
        &self,
        path: &Path,
        rows: &[TrailingStopRow],
    ) -> Result<(), MonitorError> {
        let _guard = self.lock_path(path).await?;

        ensure_parent_dir(path)?;
        let mut writer = csv::Writer::from_path(path)
            .map_err(|e| MonitorError::Store(format!("{}: {e}", path.display())))?;
        for row in rows {
            writer
                .serialize(row)
                .map_err(|e| MonitorError::Store(format!("{}: {e}", path.display())))?;
        }
        writer
            .flush()
            .map_err(|e| MonitorError::Store(format!("{}: {e}", path.display())))?;
        Ok(())
    }
}

/// Last `n` candles of a series.
pub fn tail(candles: &[Candle], n: usize) -> &[Candle] {
    &candles[candles.len().saturating_sub(n)..]
}

/// Merge new candles over an existing sorted series: dedup by timestamp with
/// the newest write winning, sorted ascending.
fn merge_series(existing: Vec<Candle>, new: &[Candle]) -> Vec<Candle> {
    let mut by_timestamp: std::collections::BTreeMap<i64, Candle> = existing
        .into_iter()
        .map(|c| (c.timestamp.timestamp_millis(), c))
        .collect();
    for candle in new {
        by_timestamp.insert(candle.timestamp.timestamp_millis(), candle.clone());
    }
    by_timestamp.into_values().collect()
}

fn read_candles(path: &Path) -> Result<Vec<Candle>, MonitorError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| MonitorError::Store(format!("{}: {e}", path.display())))?;
    let mut candles = Vec::new();
    for record in reader.deserialize() {
        let candle: Candle =
            record.map_err(|e| MonitorError::Store(format!("{}: {e}", path.display())))?;
        candles.push(candle);
    }
    Ok(candles)
}

fn write_candles(path: &Path, candles: &[Candle]) -> Result<(), MonitorError> {
    ensure_parent_dir(path)?;
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| MonitorError::Store(format!("{}: {e}", path.display())))?;
    for candle in candles {
        writer
            .serialize(candle)
            .map_err(|e| MonitorError::Store(format!("{}: {e}", path.display())))?;
    }
    writer
        .flush()
        .map_err(|e| MonitorError::Store(format!("{}: {e}", path.display())))
}

fn ensure_parent_dir(path: &Path) -> Result<(), MonitorError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| MonitorError::Store(format!("{}: {e}", parent.display())))?;
        }
    }
    Ok(())
}
