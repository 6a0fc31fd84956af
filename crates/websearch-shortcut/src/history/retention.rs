use chrono::{DateTime, Duration, Utc};

use super::HistoryEntry;

/// How much history is kept per shortcut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetentionPolicy {
    #[default]
    Unlimited,
    /// Keep the newest `n` entries.
    MaxCount(usize),
    /// Drop entries older than `now - lifetime`.
    MaxAge(Duration),
}

impl RetentionPolicy {
    /// Builds a policy from optional bounds. The age bound wins when both
    /// are given; zero or negative bounds count as unset.
    pub fn from_bounds(max_count: Option<usize>, max_age: Option<Duration>) -> Self {
        match (max_count.filter(|n| *n > 0), max_age.filter(|age| *age > Duration::zero())) {
            (_, Some(age)) => Self::MaxAge(age),
            (Some(count), None) => Self::MaxCount(count),
            (None, None) => Self::Unlimited,
        }
    }

    fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::MaxAge(age) => now.checked_sub_signed(*age),
            _ => None,
        }
    }

    pub fn is_violated_by(&self, entries: &[HistoryEntry], now: DateTime<Utc>) -> bool {
        match self {
            Self::Unlimited => false,
            Self::MaxCount(max) => entries.len() > *max,
            Self::MaxAge(_) => self
                .cutoff(now)
                .is_some_and(|cutoff| entries.iter().any(|e| e.timestamp < cutoff)),
        }
    }

    /// Trims `entries` (newest first) in place and returns how many were dropped.
    pub fn apply(&self, entries: &mut Vec<HistoryEntry>, now: DateTime<Utc>) -> usize {
        let before = entries.len();
        match self {
            Self::Unlimited => {}
            Self::MaxCount(max) => entries.truncate(*max),
            Self::MaxAge(_) => {
                if let Some(cutoff) = self.cutoff(now) {
                    entries.retain(|e| e.timestamp >= cutoff);
                }
            }
        }
        before - entries.len()
    }
}
