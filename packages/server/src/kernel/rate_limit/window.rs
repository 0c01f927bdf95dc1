//! Sliding-window log for a single (provider, model) bucket.
//!
//! One entry per attempted (or reserved) call, ordered by time. Minute
//! statistics (RPM, TPM) look at the tail younger than 60s; the day statistic
//! (RPD) looks at everything left after purging entries older than 24h.

use std::collections::VecDeque;

use super::config::{ModelLimits, DAY_MS, MINUTE_MS};
use super::limiter::RateReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowEntry {
    pub id: u64,
    pub at_ms: i64,
    pub tokens: u32,
}

/// Snapshot of a bucket's current usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowUsage {
    pub requests_last_minute: usize,
    pub tokens_last_minute: u64,
    pub requests_last_day: usize,
}

#[derive(Debug, Default)]
pub struct RateWindow {
    entries: VecDeque<WindowEntry>,
}

impl RateWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop entries that have left the 24h horizon.
    pub fn purge(&mut self, now: i64) {
        while let Some(front) = self.entries.front() {
            if front.at_ms + DAY_MS <= now {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn push(&mut self, entry: WindowEntry) {
        self.entries.push_back(entry);
    }

    /// Replace the token count of a reserved entry. Returns false if it has expired.
    pub fn settle(&mut self, id: u64, tokens: u32) -> bool {
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.tokens = tokens;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: u64) -> bool {
        match self.entries.iter().position(|e| e.id == id) {
            Some(pos) => self.entries.remove(pos).is_some(),
            None => false,
        }
    }

    pub fn usage(&self, now: i64) -> WindowUsage {
        let minute = self.minute_entries(now);
        WindowUsage {
            requests_last_minute: minute.len(),
            tokens_last_minute: minute.iter().map(|e| e.tokens as u64).sum(),
            requests_last_day: self.day_entries(now).len(),
        }
    }

    /// Check whether `estimates.len()` more calls carrying `estimates` tokens fit.
    ///
    /// On the first violated ceiling (RPM, then TPM, then RPD) returns the
    /// reason and the milliseconds until enough blocking entries expire, or
    /// `None` when the calls outnumber the ceiling and can never fit together.
    pub fn check(
        &self,
        limits: &ModelLimits,
        now: i64,
        estimates: &[u32],
    ) -> Result<(), (RateReason, Option<u64>)> {
        let calls = estimates.len();
        if calls == 0 {
            return Ok(());
        }

        let minute = self.minute_entries(now);
        count_wait(&minute, calls, limits.rpm as usize, now, MINUTE_MS)
            .map_err(|wait| (RateReason::Rpm, wait))?;

        let used: u64 = minute.iter().map(|e| e.tokens as u64).sum();
        let wanted: u64 = estimates.iter().map(|&t| t as u64).sum();
        if let Some(wait) = token_wait(&minute, used, wanted, limits.tpm as u64, now) {
            return Err((RateReason::Tpm, Some(wait)));
        }

        let day = self.day_entries(now);
        count_wait(&day, calls, limits.rpd as usize, now, DAY_MS)
            .map_err(|wait| (RateReason::Rpd, wait))
    }

    fn minute_entries(&self, now: i64) -> Vec<WindowEntry> {
        self.entries
            .iter()
            .filter(|e| e.at_ms + MINUTE_MS > now)
            .copied()
            .collect()
    }

    fn day_entries(&self, now: i64) -> Vec<WindowEntry> {
        self.entries
            .iter()
            .filter(|e| e.at_ms + DAY_MS > now)
            .copied()
            .collect()
    }
}

fn expiry_wait(entry: &WindowEntry, now: i64, horizon: i64) -> u64 {
    (entry.at_ms + horizon - now).max(1) as u64
}

/// `Err(Some(wait))` until `calls` more requests fit under `limit`,
/// `Err(None)` if they never can.
fn count_wait(
    live: &[WindowEntry],
    calls: usize,
    limit: usize,
    now: i64,
    horizon: i64,
) -> Result<(), Option<u64>> {
    if live.len() + calls <= limit {
        return Ok(());
    }
    if calls > limit {
        return Err(None);
    }
    let must_expire = live.len() + calls - limit;
    Err(live
        .get(must_expire - 1)
        .map(|e| expiry_wait(e, now, horizon)))
}

fn token_wait(live: &[WindowEntry], used: u64, wanted: u64, tpm: u64, now: i64) -> Option<u64> {
    if used + wanted <= tpm {
        return None;
    }
    if wanted > tpm {
        // Oversized request: admitted once nothing else is counted this minute.
        if used == 0 {
            return None;
        }
        return live
            .iter()
            .rev()
            .find(|e| e.tokens > 0)
            .map(|e| expiry_wait(e, now, MINUTE_MS));
    }
    let mut remaining = used;
    for entry in live {
        remaining -= entry.tokens as u64;
        if remaining + wanted <= tpm {
            return Some(expiry_wait(entry, now, MINUTE_MS));
        }
    }
    None
}
