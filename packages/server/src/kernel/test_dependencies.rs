// TestDependencies - mock implementations for testing
//
// Provides mock providers that can be injected into ServerDeps for tests.
// Stores are in-memory and time runs on a ManualClock, so nothing here
// touches the network or really sleeps.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::clock::{ClockSleeper, ManualClock};
use super::rate_limit::{RateLimitConfig, RateLimiter};
use super::{
    AnalysisRequest, BaseAnalysisProvider, BaseScrapeProvider, ProviderError, ProviderResponse,
    ScrapeError, ScrapeRequest, ScrapeResponse, ServerDeps,
};
use crate::domains::ads::AdItem;
use crate::domains::analysis::{InMemoryAnalysisStore, ProcessorSettings};
use crate::domains::jobs::InMemoryJobStore;
use crate::domains::organization::InMemoryOrganizationStore;

/// Start of every test clock: 2023-11-14T22:13:20Z.
pub const TEST_EPOCH_MS: i64 = 1_700_000_000_000;

// =============================================================================
// Mock Scrape Provider
// =============================================================================

pub struct MockScrapeProvider {
    responses: Arc<Mutex<Vec<Result<ScrapeResponse, ScrapeError>>>>,
    calls: Arc<Mutex<Vec<ScrapeRequest>>>,
}

impl MockScrapeProvider {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a successful scrape returning `items`
    pub fn with_items(self, items: Vec<AdItem>) -> Self {
        let run_id = format!("run-{}", self.responses.lock().unwrap().len() + 1);
        self.responses
            .lock()
            .unwrap()
            .push(Ok(ScrapeResponse { run_id, items }));
        self
    }

    /// Queue a failed scrape
    pub fn with_error(self, error: ScrapeError) -> Self {
        self.responses.lock().unwrap().push(Err(error));
        self
    }

    /// Get all scrape requests that were made
    pub fn calls(&self) -> Vec<ScrapeRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for MockScrapeProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseScrapeProvider for MockScrapeProvider {
    async fn scrape(&self, request: &ScrapeRequest) -> Result<ScrapeResponse, ScrapeError> {
        self.calls.lock().unwrap().push(request.clone());

        let mut responses = self.responses.lock().unwrap();
        if !responses.is_empty() {
            responses.remove(0)
        } else {
            Ok(ScrapeResponse {
                run_id: "run-default".to_string(),
                items: Vec::new(),
            })
        }
    }
}

// =============================================================================
// Mock Analysis Provider
// =============================================================================

/// Arguments captured from an analyze call
#[derive(Debug, Clone)]
pub struct AnalyzeCall {
    pub model: String,
    pub request: AnalysisRequest,
}

pub struct MockAnalysisProvider {
    name: String,
    responses: Arc<Mutex<Vec<Result<ProviderResponse, ProviderError>>>>,
    calls: Arc<Mutex<Vec<AnalyzeCall>>>,
}

impl MockAnalysisProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responses: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a successful response
    pub fn with_response(self, analysis: serde_json::Value, tokens_used: Option<u32>) -> Self {
        self.responses.lock().unwrap().push(Ok(ProviderResponse {
            analysis,
            tokens_used,
        }));
        self
    }

    /// Queue an HTTP failure
    pub fn with_http_error(self, status: u16, message: &str) -> Self {
        self.responses.lock().unwrap().push(Err(ProviderError::Http {
            status,
            message: message.to_string(),
        }));
        self
    }

    /// Queue any failure
    pub fn with_error(self, error: ProviderError) -> Self {
        self.responses.lock().unwrap().push(Err(error));
        self
    }

    pub fn calls(&self) -> Vec<AnalyzeCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl BaseAnalysisProvider for MockAnalysisProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn analyze(
        &self,
        model: &str,
        request: &AnalysisRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        self.calls.lock().unwrap().push(AnalyzeCall {
            model: model.to_string(),
            request: request.clone(),
        });

        let mut responses = self.responses.lock().unwrap();
        if !responses.is_empty() {
            responses.remove(0)
        } else {
            // Default: a minimal well-formed analysis
            Ok(ProviderResponse {
                analysis: serde_json::json!({
                    "summary": format!("Mock {} analysis", request.route.as_str()),
                    "key_insights": ["mock insight"],
                    "strategic_notes": ["mock note"],
                }),
                tokens_used: None,
            })
        }
    }
}

// =============================================================================
// TestDependencies - Builder for test dependencies
// =============================================================================

#[derive(Clone)]
pub struct TestDependencies {
    pub organizations: Arc<InMemoryOrganizationStore>,
    pub jobs: Arc<InMemoryJobStore>,
    pub analyses: Arc<InMemoryAnalysisStore>,
    pub scraper: Arc<MockScrapeProvider>,
    pub media_analyzer: Arc<MockAnalysisProvider>,
    pub synthesizer: Arc<MockAnalysisProvider>,
    pub clock: Arc<ManualClock>,
    pub sleeper: Arc<ClockSleeper>,
    pub rate_limits: RateLimitConfig,
    pub settings: ProcessorSettings,
}

impl TestDependencies {
    /// Unlimited rate buckets, no pacing, no fallback, 10ms backoff base.
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(TEST_EPOCH_MS));
        Self {
            organizations: Arc::new(InMemoryOrganizationStore::new()),
            jobs: Arc::new(InMemoryJobStore::new()),
            analyses: Arc::new(InMemoryAnalysisStore::new()),
            scraper: Arc::new(MockScrapeProvider::new()),
            media_analyzer: Arc::new(MockAnalysisProvider::new("media")),
            synthesizer: Arc::new(MockAnalysisProvider::new("synth")),
            sleeper: Arc::new(ClockSleeper::new(clock.clone())),
            clock,
            rate_limits: RateLimitConfig::empty(),
            settings: ProcessorSettings::builder()
                .media_model("media-model")
                .synthesis_model("synth-model")
                .allow_fallback(false)
                .backoff_base(Duration::from_millis(10))
                .build(),
        }
    }

    /// Set a mock scrape provider
    pub fn mock_scraper(mut self, scraper: MockScrapeProvider) -> Self {
        self.scraper = Arc::new(scraper);
        self
    }

    /// Set the mock media analyzer
    pub fn mock_media(mut self, provider: MockAnalysisProvider) -> Self {
        self.media_analyzer = Arc::new(provider);
        self
    }

    /// Set the mock synthesizer
    pub fn mock_synthesizer(mut self, provider: MockAnalysisProvider) -> Self {
        self.synthesizer = Arc::new(provider);
        self
    }

    pub fn rate_limits(mut self, config: RateLimitConfig) -> Self {
        self.rate_limits = config;
        self
    }

    pub fn settings(mut self, settings: ProcessorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn rate_limiter(&self) -> Arc<RateLimiter> {
        Arc::new(RateLimiter::new(self.rate_limits.clone(), self.clock.clone()))
    }

    /// Convert into ServerDeps for testing
    pub fn into_deps(self) -> ServerDeps {
        let rate_limiter = self.rate_limiter();
        ServerDeps::builder()
            .organizations(self.organizations)
            .jobs(self.jobs)
            .analyses(self.analyses)
            .scraper(self.scraper)
            .media_analyzer(self.media_analyzer)
            .synthesizer(self.synthesizer)
            .rate_limiter(rate_limiter)
            .sleeper(self.sleeper)
            .processor_settings(self.settings)
            .build()
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
