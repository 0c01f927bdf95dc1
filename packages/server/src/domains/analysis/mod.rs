pub mod fallback;
pub mod models;
pub mod processor;
pub mod providers;
pub mod store;

pub use fallback::{CopySignals, FallbackAnalyzer};
pub use models::{AdAnalysis, AnalysisOutcome, AnalysisResult, AttemptError, ItemOutcome};
pub use processor::{
    backoff_delay, default_item_spacing, AnalysisProcessor, OutcomeSink, ProcessSummary,
    ProcessorSettings,
};
pub use providers::{estimate_tokens, plan_calls, PlannedCall, ProviderRole};
pub use store::{AnalysisStore, InMemoryAnalysisStore, PgAnalysisStore};
