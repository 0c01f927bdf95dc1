use std::collections::HashMap;
use std::fmt;

/// Provider name used for OpenAI-hosted models.
pub const OPENAI: &str = "openai";

/// Provider name used for Groq-hosted models.
pub const GROQ: &str = "groq";

pub const MINUTE_MS: i64 = 60_000;
pub const DAY_MS: i64 = 24 * 60 * MINUTE_MS;

/// A (provider, model) bucket. Every bucket has its own independent window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateKey {
    pub provider: String,
    pub model: String,
}

impl RateKey {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }
}

impl fmt::Display for RateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

/// Ceilings for one bucket: requests/minute, tokens/minute, requests/day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelLimits {
    pub rpm: u32,
    pub tpm: u32,
    pub rpd: u32,
}

impl ModelLimits {
    pub const fn new(rpm: u32, tpm: u32, rpd: u32) -> Self {
        Self { rpm, tpm, rpd }
    }
}

/// Per-bucket ceilings. Buckets without an entry are not limited.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    limits: HashMap<RateKey, ModelLimits>,
}

impl RateLimitConfig {
    /// No ceilings at all.
    pub fn empty() -> Self {
        Self {
            limits: HashMap::new(),
        }
    }

    /// Add or replace the ceilings for one bucket.
    pub fn with_limits(
        mut self,
        provider: impl Into<String>,
        model: impl Into<String>,
        limits: ModelLimits,
    ) -> Self {
        self.limits.insert(RateKey::new(provider, model), limits);
        self
    }

    pub fn limits_for(&self, key: &RateKey) -> Option<ModelLimits> {
        self.limits.get(key).copied()
    }

    /// Lowest RPM among the given buckets that have ceilings.
    pub fn tightest_rpm<'a>(&self, keys: impl IntoIterator<Item = &'a RateKey>) -> Option<u32> {
        keys.into_iter()
            .filter_map(|k| self.limits_for(k))
            .map(|l| l.rpm)
            .min()
    }
}

impl Default for RateLimitConfig {
    /// Free-tier ceilings, kept a little under the published numbers.
    fn default() -> Self {
        Self::empty()
            .with_limits(OPENAI, "gpt-4o-mini", ModelLimits::new(3, 40_000, 200))
            .with_limits(OPENAI, "gpt-4o", ModelLimits::new(3, 30_000, 200))
            .with_limits(GROQ, "llama-3.1-8b-instant", ModelLimits::new(30, 6_000, 14_400))
            .with_limits(GROQ, "llama-3.3-70b-versatile", ModelLimits::new(30, 12_000, 1_000))
    }
}
