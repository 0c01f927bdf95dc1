//! Kernel module - server infrastructure and dependencies.

pub mod apify_adapter;
pub mod clock;
pub mod deps;
pub mod openai_adapter;
pub mod rate_limit;
pub mod test_dependencies;
pub mod traits;

/// Media analysis model (image and video creatives).
pub const GPT_4O_MINI: &str = "gpt-4o-mini";

/// Cheap synthesis model on Groq.
pub const LLAMA_3_1_8B: &str = "llama-3.1-8b-instant";

/// The seesaw engine every job event runs through.
pub type AppEngine = seesaw_core::Engine<crate::common::AppState, ServerDeps>;

pub use apify_adapter::{ApifyScrapeAdapter, DEFAULT_ADS_ACTOR};
pub use clock::{Clock, ClockSleeper, ManualClock, Sleeper, SystemClock, TokioSleeper};
pub use deps::ServerDeps;
pub use openai_adapter::OpenAiAnalysisAdapter;
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use test_dependencies::TestDependencies;
pub use traits::*;
