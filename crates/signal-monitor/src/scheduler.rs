use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};

/// Delay until the next wall-clock instant whose second-of-minute equals
/// `trigger_second`. If that instant is not strictly in the future, it is
/// advanced by `period_minutes`.
pub fn next_trigger_delay(
    now: DateTime<Utc>,
    period_minutes: u32,
    trigger_second: u32,
) -> Duration {
    let target = now
        .with_second(trigger_second)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);

    let target = if target <= now {
        target + chrono::Duration::minutes(period_minutes as i64)
    } else {
        target
    };

    (target - now).to_std().unwrap_or_default()
}
