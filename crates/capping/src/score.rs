//! Absolute expiry scores for sorted-set members and TTL conversions.

pub const SECONDS_PER_HOUR: u64 = 3600;
pub const SECONDS_PER_DAY: u64 = 24 * SECONDS_PER_HOUR;

/// Expiry timestamp used as a sorted-set score.
///
/// `Never` orders above every `At`, so it always satisfies an upper bound of
/// `Never` and never falls below a finite lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Expiry {
    /// Epoch seconds.
    At(i64),
    Never,
}

impl Expiry {
    pub fn timestamp(self) -> Option<i64> {
        match self {
            Expiry::At(ts) => Some(ts),
            Expiry::Never => None,
        }
    }

    /// True when the expiry lies strictly before `now`.
    pub fn is_past(self, now: i64) -> bool {
        matches!(self, Expiry::At(ts) if ts < now)
    }
}

pub fn days_to_secs(days: u32) -> u64 {
    u64::from(days) * SECONDS_PER_DAY
}

pub fn hours_to_secs(hours: u32) -> u64 {
    u64::from(hours) * SECONDS_PER_HOUR
}

/// `now + days`, or `Never` when no window is given.
pub fn days_to_score(now: i64, days: Option<u32>) -> Expiry {
    match days {
        Some(days) => after(now, days_to_secs(days)),
        None => Expiry::Never,
    }
}

/// `now + hours`, or `Never` when no window is given.
pub fn hours_to_score(now: i64, hours: Option<u32>) -> Expiry {
    match hours {
        Some(hours) => after(now, hours_to_secs(hours)),
        None => Expiry::Never,
    }
}

/// `now + secs`, saturating to `Never` instead of overflowing.
pub fn after(now: i64, secs: u64) -> Expiry {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| now.checked_add(secs))
        .map_or(Expiry::Never, Expiry::At)
}
