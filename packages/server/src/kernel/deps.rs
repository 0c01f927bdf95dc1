//! Server dependencies for job stages (using traits for testability)
//!
//! This module provides the central dependency container used by admission,
//! the job state machine and the HTTP edge. All external services use trait
//! abstractions to enable testing.

use sqlx::PgPool;
use std::sync::Arc;
use typed_builder::TypedBuilder;

use crate::domains::analysis::{AnalysisProcessor, AnalysisStore, ProcessorSettings};
use crate::domains::jobs::store::JobStore;
use crate::domains::organization::{OrganizationStore, QuotaLedger};
use crate::kernel::rate_limit::RateLimiter;
use crate::kernel::{BaseAnalysisProvider, BaseScrapeProvider, Sleeper};

pub const DEFAULT_REGION: &str = "US";

// =============================================================================
// ServerDeps
// =============================================================================

/// Server dependencies accessible to job stages (using traits for testability)
#[derive(Clone, TypedBuilder)]
pub struct ServerDeps {
    pub organizations: Arc<dyn OrganizationStore>,
    pub jobs: Arc<dyn JobStore>,
    pub analyses: Arc<dyn AnalysisStore>,
    pub scraper: Arc<dyn BaseScrapeProvider>,
    /// Image and video creative analysis
    pub media_analyzer: Arc<dyn BaseAnalysisProvider>,
    /// Text analysis and strategic synthesis, on the cheaper model
    pub synthesizer: Arc<dyn BaseAnalysisProvider>,
    /// Shared by every job's processor; the only process-wide mutable state
    pub rate_limiter: Arc<RateLimiter>,
    pub sleeper: Arc<dyn Sleeper>,
    pub processor_settings: ProcessorSettings,
    #[builder(default = DEFAULT_REGION.to_string(), setter(into))]
    pub default_region: String,
    /// Present when backed by Postgres; used by the health probe
    #[builder(default, setter(strip_option))]
    pub db_pool: Option<PgPool>,
}

impl ServerDeps {
    pub fn quota_ledger(&self) -> QuotaLedger {
        QuotaLedger::new(self.organizations.clone())
    }

    /// A processor for one job's analysis loop.
    pub fn analysis_processor(&self) -> AnalysisProcessor {
        AnalysisProcessor::new(
            self.rate_limiter.clone(),
            self.media_analyzer.clone(),
            self.synthesizer.clone(),
            self.sleeper.clone(),
            self.processor_settings.clone(),
        )
    }
}
