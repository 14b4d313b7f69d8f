use monitor_core::{Candle, SortZonesBy, SrConfig, SrZone, ZoneType};

use crate::methods::CandidateLevel;

/// A zone being accumulated during clustering.
#[derive(Debug)]
struct ZoneBuilder {
    level: f64,
    top: f64,
    bottom: f64,
    methods: Vec<String>,
    timeframes: Vec<String>,
    zone_type: ZoneType,
    confluence: u32,
}

impl ZoneBuilder {
    fn new(candidate: &CandidateLevel) -> Self {
        Self {
            level: candidate.level,
            top: candidate.level,
            bottom: candidate.level,
            methods: vec![candidate.method.clone()],
            timeframes: vec![candidate.timeframe.clone()],
            zone_type: candidate.zone_type,
            confluence: 1,
        }
    }

    fn merge(&mut self, candidate: &CandidateLevel) {
        self.top = self.top.max(candidate.level);
        self.bottom = self.bottom.min(candidate.level);
        // Running mean, matching the greedy one-pass clustering rule
        self.level = (self.level + candidate.level) / 2.0;
        self.confluence += 1;
        self.methods.push(candidate.method.clone());
        self.timeframes.push(candidate.timeframe.clone());
        if candidate.zone_type != self.zone_type {
            self.zone_type = ZoneType::Mixed;
        }
    }

    fn build(self, reactions: u32) -> SrZone {
        SrZone {
            level: self.level,
            top: self.top,
            bottom: self.bottom,
            methods: self.methods,
            timeframes_seen: self.timeframes,
            zone_type: self.zone_type,
            confluence: self.confluence,
            reactions,
        }
    }
}

/// Greedy clustering: each candidate merges into the first zone whose running
/// level is within `cluster_percent` of it, else starts a new zone.
fn cluster_candidates(
    candidates: &[CandidateLevel],
    current_price: f64,
    cluster_percent: f64,
) -> Vec<ZoneBuilder> {
    let mut zones: Vec<ZoneBuilder> = Vec::new();

    for candidate in candidates {
        if !candidate.level.is_finite() {
            continue;
        }

        let mut merged = false;
        for zone in zones.iter_mut() {
            if (zone.level - candidate.level).abs() / current_price * 100.0 < cluster_percent {
                zone.merge(candidate);
                merged = true;
                break;
            }
        }
        if !merged {
            zones.push(ZoneBuilder::new(candidate));
        }
    }

    zones
}

/// Closes of the last `lookback` base bars falling inside [bottom, top].
fn count_reactions(candles: &[Candle], bottom: f64, top: f64, lookback: usize) -> u32 {
    let start = candles.len().saturating_sub(lookback);
    candles[start..]
        .iter()
        .filter(|c| c.close >= bottom && c.close <= top)
        .count() as u32
}

/// Cluster, score, filter, sort, and truncate the candidate set into the
/// final zone report.
pub fn build_zones(
    candidates: &[CandidateLevel],
    base_candles: &[Candle],
    current_price: f64,
    config: &SrConfig,
) -> Vec<SrZone> {
    let builders = cluster_candidates(candidates, current_price, config.cluster_percent);

    let mut zones: Vec<SrZone> = builders
        .into_iter()
        .map(|b| {
            let reactions =
                count_reactions(base_candles, b.bottom, b.top, config.reaction_lookback);
            b.build(reactions)
        })
        .filter(|zone| {
            let distance_percent = (zone.level - current_price).abs() / current_price * 100.0;
            distance_percent <= config.show_within_percent
                && zone.confluence >= config.min_confluence
        })
        .collect();

    match config.sort_by {
        SortZonesBy::Confluence => zones.sort_by(|a, b| b.confluence.cmp(&a.confluence)),
        SortZonesBy::Reactions => zones.sort_by(|a, b| b.reactions.cmp(&a.reactions)),
        SortZonesBy::Distance => zones.sort_by(|a, b| {
            (a.level - current_price)
                .abs()
                .total_cmp(&(b.level - current_price).abs())
        }),
    }

    zones.truncate(config.top_n);
    zones
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn candidate(level: f64, method: &str, zone_type: ZoneType) -> CandidateLevel {
        CandidateLevel {
            level,
            method: method.to_string(),
            timeframe: "15m".to_string(),
            zone_type,
        }
    }

    fn flat_candles(close: f64, count: usize) -> Vec<Candle> {
        (0..count)
            .map(|i| Candle {
                timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, i as u32, 0).unwrap(),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 100.0,
            })
            .collect()
    }

    fn test_config() -> SrConfig {
        SrConfig {
            cluster_percent: 0.25,
            show_within_percent: 100.0,
            min_confluence: 1,
            top_n: 10,
            reaction_lookback: 100,
            ..SrConfig::default()
        }
    }

    #[test]
    fn test_nearby_candidates_merge() {
        // 100.0 and 100.1 are 0.1% apart at price 100 -> same zone
        let candidates = vec![
            candidate(100.0, "Swing Low", ZoneType::Support),
            candidate(100.1, "Pivot", ZoneType::Support),
        ];
        let zones = build_zones(&candidates, &flat_candles(100.0, 10), 100.0, &test_config());

        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].confluence, 2);
        assert!((zones[0].level - 100.05).abs() < 1e-9);
        assert!((zones[0].bottom - 100.0).abs() < 1e-9);
        assert!((zones[0].top - 100.1).abs() < 1e-9);
    }

    #[test]
    fn test_distant_candidates_stay_separate() {
        // 1% apart at price 100 with a 0.25% band -> two zones
        let candidates = vec![
            candidate(100.0, "Swing Low", ZoneType::Support),
            candidate(101.0, "Swing High", ZoneType::Resistance),
        ];
        let zones = build_zones(&candidates, &flat_candles(100.0, 10), 100.0, &test_config());

        assert_eq!(zones.len(), 2);
        assert!(zones.iter().all(|z| z.confluence == 1));
    }

    #[test]
    fn test_confluence_counts_merged_candidates() {
        let candidates = vec![
            candidate(100.00, "Swing Low", ZoneType::Support),
            candidate(100.05, "Pivot", ZoneType::Support),
            candidate(100.10, "Psychological", ZoneType::Support),
            candidate(105.00, "Swing High", ZoneType::Resistance),
        ];
        let zones = build_zones(&candidates, &flat_candles(100.0, 10), 100.0, &test_config());

        assert_eq!(zones.len(), 2);
        assert_eq!(zones[0].confluence, 3);
        assert_eq!(zones[1].confluence, 1);
    }

    #[test]
    fn test_mixed_type_on_conflict() {
        let candidates = vec![
            candidate(100.0, "Swing Low", ZoneType::Support),
            candidate(100.1, "Swing High", ZoneType::Resistance),
        ];
        let zones = build_zones(&candidates, &flat_candles(100.0, 10), 100.0, &test_config());

        assert_eq!(zones[0].zone_type, ZoneType::Mixed);
    }

    #[test]
    fn test_reaction_counting() {
        // All 20 closes sit at 100.0, inside [99.9, 100.2]
        let candidates = vec![
            candidate(99.9, "Swing Low", ZoneType::Support),
            candidate(100.2, "Pivot", ZoneType::Support),
        ];
        let zones = build_zones(&candidates, &flat_candles(100.0, 20), 100.0, &test_config());

        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].reactions, 20);
    }

    #[test]
    fn test_min_confluence_filter() {
        let candidates = vec![
            candidate(100.0, "Swing Low", ZoneType::Support),
            candidate(100.1, "Pivot", ZoneType::Support),
            candidate(105.0, "Swing High", ZoneType::Resistance),
        ];
        let config = SrConfig {
            min_confluence: 2,
            ..test_config()
        };
        let zones = build_zones(&candidates, &flat_candles(100.0, 10), 100.0, &config);

        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].confluence, 2);
    }

    #[test]
    fn test_distance_filter() {
        let candidates = vec![
            candidate(100.0, "Swing Low", ZoneType::Support),
            candidate(150.0, "Swing High", ZoneType::Resistance),
        ];
        let config = SrConfig {
            show_within_percent: 2.5,
            ..test_config()
        };
        let zones = build_zones(&candidates, &flat_candles(100.0, 10), 100.0, &config);

        assert_eq!(zones.len(), 1);
        assert!((zones[0].level - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_sort_by_distance_and_truncate() {
        let candidates = vec![
            candidate(103.0, "Swing High", ZoneType::Resistance),
            candidate(100.5, "Swing Low", ZoneType::Support),
            candidate(98.0, "Swing Low", ZoneType::Support),
        ];
        let config = SrConfig {
            sort_by: SortZonesBy::Distance,
            top_n: 2,
            ..test_config()
        };
        let zones = build_zones(&candidates, &flat_candles(100.0, 10), 100.0, &config);

        assert_eq!(zones.len(), 2);
        assert!((zones[0].level - 100.5).abs() < 1e-9);
        assert!((zones[1].level - 98.0).abs() < 1e-9);
    }
}
