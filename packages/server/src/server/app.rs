//! Application setup and server configuration.

use std::sync::Arc;

use apify_client::ApifyClient;
use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};
use openai_client::OpenAIClient;
use seesaw_core::Engine;
use sqlx::PgPool;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::domains::analysis::{default_item_spacing, PgAnalysisStore, ProcessorSettings};
use crate::domains::jobs::{job_effect, PgJobStore};
use crate::domains::organization::PgOrganizationStore;
use crate::kernel::rate_limit::{RateKey, GROQ, OPENAI};
use crate::kernel::{
    ApifyScrapeAdapter, AppEngine, BaseAnalysisProvider, OpenAiAnalysisAdapter, RateLimitConfig, RateLimiter, ServerDeps, SystemClock, TokioSleeper,
};
use crate::server::routes::{get_job_handler, health_handler, quota_status_handler, submit_job_handler};

/// Shared application state
#[derive(Clone)]
pub struct AxumAppState {
    pub deps: ServerDeps,
    pub engine: Arc<AppEngine>,
}

/// Wire Postgres stores, provider adapters and the shared rate limiter.
pub fn build_server_deps(config: &Config, pool: PgPool) -> ServerDeps {
    let apify = Arc::new(ApifyClient::new(config.apify_api_token.clone()));
    let scraper = ApifyScrapeAdapter::new(apify, config.apify_ads_actor.clone());

    let media_analyzer: Arc<dyn BaseAnalysisProvider> = Arc::new(OpenAiAnalysisAdapter::new(
        OpenAIClient::new(config.openai_api_key.clone()),
        OPENAI,
    ));
    let synthesizer: Arc<dyn BaseAnalysisProvider> = match &config.groq_api_key {
        Some(key) => Arc::new(OpenAiAnalysisAdapter::new(OpenAIClient::groq(key.clone()), GROQ)),
        None => media_analyzer.clone(),
    };
    info!(
        media = %format!("{}/{}", media_analyzer.name(), config.media_model),
        synthesis = %format!("{}/{}", synthesizer.name(), config.synthesis_model),
        "Analysis providers configured"
    );

    let rate_limits = RateLimitConfig::default();
    let buckets = [
        RateKey::new(media_analyzer.name(), config.media_model.as_str()),
        RateKey::new(synthesizer.name(), config.synthesis_model.as_str()),
    ];
    let item_spacing = config
        .item_spacing
        .unwrap_or_else(|| default_item_spacing(&rate_limits, &buckets));

    let settings = ProcessorSettings::builder()
        .media_model(config.media_model.clone())
        .synthesis_model(config.synthesis_model.clone())
        .allow_fallback(config.allow_fallback)
        .backoff_base(config.backoff_base)
        .item_spacing(item_spacing)
        .build();

    ServerDeps::builder()
        .organizations(Arc::new(PgOrganizationStore::new(pool.clone())))
        .jobs(Arc::new(PgJobStore::new(pool.clone())))
        .analyses(Arc::new(PgAnalysisStore::new(pool.clone())))
        .scraper(Arc::new(scraper))
        .media_analyzer(media_analyzer)
        .synthesizer(synthesizer)
        .rate_limiter(Arc::new(RateLimiter::new(rate_limits, Arc::new(SystemClock))))
        .sleeper(Arc::new(TokioSleeper))
        .processor_settings(settings)
        .default_region(config.scrape_region.clone())
        .db_pool(pool)
        .build()
}

/// Build the seesaw engine with the job lifecycle effect
pub fn build_engine(server_deps: ServerDeps) -> AppEngine {
    Engine::with_deps(server_deps)
        // Global error handler - logs all effect errors
        .on_error(|error, _type_id, _ctx| async move {
            tracing::error!(error = %error, "Effect failed");
        })
        .with_effect(job_effect())
}

/// Build the Axum application router
pub fn build_app(state: AxumAppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/jobs", post(submit_job_handler))
        .route("/jobs/:id", get(get_job_handler))
        .route("/organizations/:id/quota", get(quota_status_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}
