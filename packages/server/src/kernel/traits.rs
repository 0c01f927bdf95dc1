// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Routing, retry and pacing live in domains/analysis; these traits just make one call.
//
// Naming convention: Base* for trait names (e.g., BaseScrapeProvider, BaseAnalysisProvider)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domains::ads::AdItem;

// =============================================================================
// Scrape Provider Trait (Infrastructure - ad library scraping)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeRequest {
    pub keyword: String,
    pub max_items: u32,
    pub region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeResponse {
    pub run_id: String,
    pub items: Vec<AdItem>,
}

/// Scrape failures carry a human-readable message that ends up on the job.
#[derive(Debug, Clone, Error)]
pub enum ScrapeError {
    #[error("scrape provider error: {0}")]
    Provider(String),

    #[error("scrape provider unreachable: {0}")]
    Network(String),

    #[error("invalid scrape request: {0}")]
    InvalidRequest(String),
}

#[async_trait]
pub trait BaseScrapeProvider: Send + Sync {
    /// Collect up to `max_items` ads for a keyword. May take minutes.
    async fn scrape(&self, request: &ScrapeRequest) -> Result<ScrapeResponse, ScrapeError>;
}

// =============================================================================
// Analysis Provider Trait (Infrastructure - LLM calls)
// =============================================================================

/// What a single provider call is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisRoute {
    /// Text-only ad, analyzed by the synthesizer in one call
    Text,
    /// Creative analysis of an image ad
    Image,
    /// Creative analysis of a video ad
    Video,
    /// Strategic synthesis over the media findings
    Synthesis,
}

impl AnalysisRoute {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Synthesis => "synthesis",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub route: AnalysisRoute,
    pub content: String,
    pub media_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    pub analysis: serde_json::Value,
    /// Actual tokens billed, when the provider reports it.
    pub tokens_used: Option<u32>,
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("provider returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("provider unreachable: {0}")]
    Network(String),

    #[error("unparseable provider response: {0}")]
    Parse(String),

    #[error("provider misconfigured: {0}")]
    Config(String),
}

impl ProviderError {
    /// 408, 409, 429 and 5xx are transient; other 4xx are not worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => matches!(*status, 408 | 409 | 429 | 500..=599),
            Self::Network(_) | Self::Parse(_) => true,
            Self::Config(_) => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[async_trait]
pub trait BaseAnalysisProvider: Send + Sync {
    /// Provider name, used as the rate-limit bucket prefix ("openai", "groq").
    fn name(&self) -> &str;

    async fn analyze(
        &self,
        model: &str,
        request: &AnalysisRequest,
    ) -> Result<ProviderResponse, ProviderError>;
}
