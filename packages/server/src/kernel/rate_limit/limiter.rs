//! Process-wide sliding-window rate limiter.
//!
//! All windows sit behind one mutex so a check and the record that follows it
//! can never interleave with another job's check. Callers that drive real
//! provider calls use [`RateLimiter::acquire`], which checks every call an item
//! still needs and, only if all pass, reserves them in one step.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::config::{RateKey, RateLimitConfig};
use super::window::{RateWindow, WindowEntry, WindowUsage};
use crate::kernel::clock::Clock;

/// Which ceiling blocked a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateReason {
    Rpm,
    Tpm,
    Rpd,
}

impl RateReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rpm => "RPM",
            Self::Tpm => "TPM",
            Self::Rpd => "RPD",
        }
    }
}

impl fmt::Display for RateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Blocked { reason: RateReason, wait_ms: u64 },
    /// The ceiling is smaller than the calls asked for; waiting never helps.
    Exceeds { reason: RateReason },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// One call an item wants to make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallEstimate {
    pub key: RateKey,
    pub estimated_tokens: u32,
}

/// Calls admitted by [`RateLimiter::acquire`], one slot per call in order.
#[derive(Debug)]
#[must_use = "settle or release every reserved call"]
pub struct Reservation {
    slots: Vec<(RateKey, u64)>,
}

impl Reservation {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[derive(Debug)]
pub enum Acquisition {
    Granted(Reservation),
    Blocked {
        key: RateKey,
        reason: RateReason,
        wait_ms: u64,
    },
    /// More calls on `key` than its ceiling admits in one window.
    Exceeds {
        key: RateKey,
        reason: RateReason,
        calls: usize,
    },
}

pub struct RateLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    windows: Mutex<HashMap<RateKey, RateWindow>>,
    next_id: AtomicU64,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            windows: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Would one more call with `estimated_tokens` fit right now?
    pub fn can_proceed(&self, provider: &str, model: &str, estimated_tokens: u32) -> RateDecision {
        let key = RateKey::new(provider, model);
        let Some(limits) = self.config.limits_for(&key) else {
            return RateDecision::Allowed;
        };
        let now = self.clock.now_millis();
        let mut windows = self.lock();
        let window = windows.entry(key).or_default();
        window.purge(now);
        match window.check(&limits, now, &[estimated_tokens]) {
            Ok(()) => RateDecision::Allowed,
            Err((reason, Some(wait_ms))) => RateDecision::Blocked { reason, wait_ms },
            Err((reason, None)) => RateDecision::Exceeds { reason },
        }
    }

    /// Log one executed call.
    pub fn record(&self, provider: &str, model: &str, tokens: u32) {
        let key = RateKey::new(provider, model);
        let now = self.clock.now_millis();
        let id = self.next_id();
        let mut windows = self.lock();
        let window = windows.entry(key).or_default();
        window.purge(now);
        window.push(WindowEntry {
            id,
            at_ms: now,
            tokens,
        });
    }

    /// Check all `calls` together and reserve them only if every one fits.
    pub fn acquire(&self, calls: &[CallEstimate]) -> Acquisition {
        let now = self.clock.now_millis();
        let mut windows = self.lock();

        // Group per bucket so two calls on the same model are checked as a pair.
        let mut grouped: Vec<(&RateKey, Vec<u32>)> = Vec::new();
        for call in calls {
            match grouped.iter_mut().find(|(k, _)| *k == &call.key) {
                Some((_, tokens)) => tokens.push(call.estimated_tokens),
                None => grouped.push((&call.key, vec![call.estimated_tokens])),
            }
        }

        for (key, estimates) in &grouped {
            let Some(limits) = self.config.limits_for(key) else {
                continue;
            };
            let window = windows.entry((*key).clone()).or_default();
            window.purge(now);
            match window.check(&limits, now, estimates) {
                Ok(()) => {}
                Err((reason, Some(wait_ms))) => {
                    debug!(bucket = %key, %reason, wait_ms, "Rate limit blocks call");
                    return Acquisition::Blocked {
                        key: (*key).clone(),
                        reason,
                        wait_ms,
                    };
                }
                Err((reason, None)) => {
                    debug!(bucket = %key, %reason, calls = estimates.len(), "Calls exceed rate ceiling");
                    return Acquisition::Exceeds {
                        key: (*key).clone(),
                        reason,
                        calls: estimates.len(),
                    };
                }
            }
        }

        let mut slots = Vec::with_capacity(calls.len());
        for call in calls {
            let id = self.next_id();
            windows.entry(call.key.clone()).or_default().push(WindowEntry {
                id,
                at_ms: now,
                tokens: call.estimated_tokens,
            });
            slots.push((call.key.clone(), id));
        }
        Acquisition::Granted(Reservation { slots })
    }

    /// Replace the estimate of reserved call `index` with the real token count.
    pub fn settle(&self, reservation: &Reservation, index: usize, actual_tokens: u32) {
        let Some((key, id)) = reservation.slots.get(index) else {
            return;
        };
        if let Some(window) = self.lock().get_mut(key) {
            window.settle(*id, actual_tokens);
        }
    }

    /// Give back reserved calls from `from_index` on; they were never attempted.
    pub fn release(&self, reservation: Reservation, from_index: usize) {
        let mut windows = self.lock();
        for (key, id) in reservation.slots.into_iter().skip(from_index) {
            if let Some(window) = windows.get_mut(&key) {
                window.remove(id);
            }
        }
    }

    pub fn usage(&self, provider: &str, model: &str) -> WindowUsage {
        let now = self.clock.now_millis();
        self.lock()
            .get(&RateKey::new(provider, model))
            .map(|w| w.usage(now))
            .unwrap_or_default()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RateKey, RateWindow>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
