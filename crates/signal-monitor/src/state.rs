use dashmap::DashMap;
use monitor_core::{SignalKind, SignalState};

/// Concurrent per-target signal state. The map is only touched through the
/// narrow get/transition contract below; entries are created lazily on first
/// evaluation and live for the process lifetime.
#[derive(Default)]
pub struct SignalStateMap {
    states: DashMap<String, SignalState>,
}

impl SignalStateMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> SignalState {
        self.states
            .get(key)
            .map(|entry| *entry)
            .unwrap_or(SignalState::Flat)
    }

    /// Apply the latest bar's edge flags under the entry lock and return the
    /// fired signal, if the state actually changed. A buy edge while already
    /// long (or sell while short) is a no-op.
    pub fn transition(&self, key: &str, buy: bool, sell: bool) -> Option<SignalKind> {
        let mut entry = self
            .states
            .entry(key.to_string())
            .or_insert(SignalState::Flat);

        if buy && *entry != SignalState::Long {
            *entry = SignalState::Long;
            Some(SignalKind::Buy)
        } else if sell && *entry != SignalState::Short {
            *entry = SignalState::Short;
            Some(SignalKind::Sell)
        } else {
            None
        }
    }
}
