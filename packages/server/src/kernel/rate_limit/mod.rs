//! In-memory sliding-window limits per (provider, model).

pub mod config;
pub mod limiter;
pub mod window;

pub use config::{ModelLimits, RateKey, RateLimitConfig, DAY_MS, GROQ, MINUTE_MS, OPENAI};
pub use limiter::{Acquisition, CallEstimate, RateDecision, RateLimiter, RateReason, Reservation};
pub use window::{RateWindow, WindowUsage};
