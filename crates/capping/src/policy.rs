//! Cap definitions and the rules applied when a counter is written.

use anyhow::{Result, bail, ensure};
use serde::{Deserialize, Serialize};

use crate::score::{Expiry, after, days_to_secs, hours_to_secs};
use crate::store::KeyTtl;

/// Campaign-wide cap over a window of days. No window means the counter
/// never resets and an exclusion, once triggered, is permanent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalShowCap {
    pub window_days: Option<u32>,
    pub max_allowed: i64,
}

/// Per-user show-count cap over a window of hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowCap {
    pub window_hours: u32,
    pub max_allowed: i64,
}

/// Per-user accumulated watch-time cap, in seconds, over a window of hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchTimeCap {
    pub window_hours: u32,
    pub max_allowed_secs: u64,
}

impl GlobalShowCap {
    /// Counter TTL, `None` for a counter that never resets.
    pub fn window_secs(&self) -> Result<Option<u64>> {
        match self.window_days {
            Some(0) => bail!("global cap window must be at least one day"),
            days => Ok(days.map(days_to_secs)),
        }
    }
}

impl ShowCap {
    pub fn window_secs(&self) -> Result<u64> {
        window_hours_to_secs(self.window_hours)
    }
}

impl WatchTimeCap {
    pub fn window_secs(&self) -> Result<u64> {
        window_hours_to_secs(self.window_hours)
    }
}

/// A zero-hour window would expire its key on creation in memory and never
/// in Redis, so it is refused before anything is written.
pub fn window_hours_to_secs(hours: u32) -> Result<u64> {
    ensure!(hours > 0, "cap window must be at least one hour");
    Ok(hours_to_secs(hours))
}

/// What a counting rule did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CapOutcome {
    /// Nothing written: no user identity, or the category is already blocked.
    Skipped,
    Counted { count: i64, capped: bool },
}

impl CapOutcome {
    pub fn is_capped(&self) -> bool {
        matches!(self, CapOutcome::Counted { capped: true, .. })
    }

    pub fn count(&self) -> Option<i64> {
        match self {
            CapOutcome::Counted { count, .. } => Some(*count),
            CapOutcome::Skipped => None,
        }
    }
}

/// Caps are inclusive: reaching the limit already triggers.
pub fn threshold_reached(count: i64, max_allowed: i64) -> bool {
    count >= max_allowed
}

/// Exclusion end that coincides with the counter window's end, so the
/// exclusion and the counter lapse together.
pub fn window_end(now: i64, counter_ttl: KeyTtl) -> Expiry {
    match counter_ttl {
        KeyTtl::Expires(secs) => after(now, secs),
        KeyTtl::Persistent => Expiry::Never,
        // Window closed between the increment and the TTL read.
        KeyTtl::Missing => Expiry::At(now),
    }
}
