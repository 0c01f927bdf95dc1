//! Delay/Retry Processor.
//!
//! # Guarantees
//!
//! - **Sequential**: items are analyzed one at a time, in scrape order
//! - **Forward progress**: every item ends as analyzed, fallback or error
//! - **Bounded retries**: at most `max_attempts` provider attempts per item
//! - **Within ceilings**: every provider call is reserved with the rate
//!   limiter before it is made
//!
//! All waiting goes through [`Sleeper`], so tests drive it with a manual clock.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

use super::fallback::FallbackAnalyzer;
use super::models::{AnalysisResult, AttemptError, ItemOutcome};
use super::providers::{build_request, plan_calls, PlannedCall, ProviderRole};
use crate::domains::ads::{classify, AdItem, ContentCategory};
use crate::domains::jobs::models::JobId;
use crate::kernel::rate_limit::{Acquisition, CallEstimate, RateKey, RateLimitConfig, RateLimiter};
use crate::kernel::{BaseAnalysisProvider, ProviderError, ProviderResponse, Sleeper};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(2_000);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct ProcessorSettings {
    pub media_model: String,
    pub synthesis_model: String,
    /// Substitute the fallback analyzer instead of waiting out a rate limit.
    #[builder(default = true)]
    pub allow_fallback: bool,
    #[builder(default = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,
    #[builder(default = DEFAULT_BACKOFF_BASE)]
    pub backoff_base: Duration,
    /// Pause between items.
    #[builder(default)]
    pub item_spacing: Duration,
}

/// `base * 2^(attempt - 1)`, capped at one minute.
pub fn backoff_delay(attempt: u32, base: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

/// `ceil(60s / tightest RPM) * 1.1` over the buckets a job uses.
pub fn default_item_spacing<'a>(
    config: &RateLimitConfig,
    keys: impl IntoIterator<Item = &'a RateKey>,
) -> Duration {
    match config.tightest_rpm(keys) {
        Some(rpm) if rpm > 0 => {
            let per_call = 60_000u64.div_ceil(rpm as u64);
            Duration::from_millis(per_call * 11 / 10)
        }
        _ => Duration::ZERO,
    }
}

/// Receives each item's outcome as soon as it is final.
#[async_trait]
pub trait OutcomeSink: Send + Sync {
    async fn item_finished(
        &self,
        index: usize,
        item: &AdItem,
        category: ContentCategory,
        outcome: &ItemOutcome,
    ) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSummary {
    pub analyzed: usize,
    pub fallback: usize,
    pub errored: usize,
    /// `(item index, summary)` for every errored item.
    pub errors: Vec<(usize, String)>,
}

impl ProcessSummary {
    /// Items that produced a usable analysis.
    pub fn usable(&self) -> usize {
        self.analyzed + self.fallback
    }

    pub fn aggregate_error(&self) -> String {
        let details: Vec<String> = self
            .errors
            .iter()
            .map(|(index, summary)| format!("item {}: {}", index, summary))
            .collect();
        format!(
            "all {} item(s) failed analysis: {}",
            self.errored,
            details.join("; ")
        )
    }
}

pub struct AnalysisProcessor {
    limiter: Arc<RateLimiter>,
    media: Arc<dyn BaseAnalysisProvider>,
    synthesizer: Arc<dyn BaseAnalysisProvider>,
    sleeper: Arc<dyn Sleeper>,
    settings: ProcessorSettings,
    fallback: FallbackAnalyzer,
}

impl AnalysisProcessor {
    pub fn new(
        limiter: Arc<RateLimiter>,
        media: Arc<dyn BaseAnalysisProvider>,
        synthesizer: Arc<dyn BaseAnalysisProvider>,
        sleeper: Arc<dyn Sleeper>,
        settings: ProcessorSettings,
    ) -> Self {
        Self {
            limiter,
            media,
            synthesizer,
            sleeper,
            settings,
            fallback: FallbackAnalyzer::new(),
        }
    }

    pub fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }

    /// Analyze `items` in order, handing every outcome to `sink`.
    pub async fn process(
        &self,
        job_id: &JobId,
        items: &[AdItem],
        sink: &dyn OutcomeSink,
    ) -> Result<ProcessSummary> {
        let mut summary = ProcessSummary::default();

        for (index, item) in items.iter().enumerate() {
            let category = classify(item);
            let outcome = self.process_item(job_id, index, item, category).await;

            match &outcome {
                ItemOutcome::Analyzed { .. } => summary.analyzed += 1,
                ItemOutcome::Fallback { .. } => summary.fallback += 1,
                ItemOutcome::Error { .. } => {
                    summary.errored += 1;
                    if let Some(message) = outcome.error_summary() {
                        summary.errors.push((index, message));
                    }
                }
            }
            sink.item_finished(index, item, category, &outcome).await?;

            let is_last = index + 1 == items.len();
            if !is_last && !self.settings.item_spacing.is_zero() {
                debug!(job_id = %job_id, spacing_ms = self.settings.item_spacing.as_millis() as u64, "Pacing before next item");
                self.sleeper.sleep(self.settings.item_spacing).await;
            }
        }

        info!(
            job_id = %job_id,
            analyzed = summary.analyzed,
            fallback = summary.fallback,
            errored = summary.errored,
            "Analysis finished"
        );
        Ok(summary)
    }

    async fn process_item(
        &self,
        job_id: &JobId,
        index: usize,
        item: &AdItem,
        category: ContentCategory,
    ) -> ItemOutcome {
        let plan = plan_calls(
            item,
            category,
            &self.settings.media_model,
            &self.settings.synthesis_model,
        );
        let mut responses: Vec<ProviderResponse> = Vec::with_capacity(plan.len());
        let mut trail: Vec<AttemptError> = Vec::new();
        let mut attempt = 0u32;

        debug!(job_id = %job_id, item = index, category = %category, calls = plan.len(), "Analyzing item");

        loop {
            // Calls that already succeeded are not repeated.
            let remaining = &plan[responses.len()..];
            let estimates: Vec<CallEstimate> = remaining
                .iter()
                .map(|call| CallEstimate {
                    key: RateKey::new(self.provider(call.role).name(), call.model.as_str()),
                    estimated_tokens: call.estimated_tokens,
                })
                .collect();

            let reservation = match self.limiter.acquire(&estimates) {
                Acquisition::Granted(reservation) => reservation,
                Acquisition::Blocked {
                    key,
                    reason,
                    wait_ms,
                } => {
                    if self.settings.allow_fallback {
                        info!(job_id = %job_id, item = index, bucket = %key, %reason, wait_ms, "Rate limited, using fallback analyzer");
                        return ItemOutcome::Fallback {
                            result: self.fallback.analyze(
                                item,
                                category,
                                media_analysis(&plan, &responses),
                            ),
                            reason: format!("{} limit reached for {}", reason, key),
                            attempts: attempt,
                            errors: trail,
                        };
                    }
                    info!(job_id = %job_id, item = index, bucket = %key, %reason, wait_ms, "Rate limited, waiting");
                    self.sleeper.sleep(Duration::from_millis(wait_ms)).await;
                    continue;
                }
                Acquisition::Exceeds { key, reason, calls } => {
                    let message = format!(
                        "{} limit of {} cannot admit {} call(s)",
                        reason, key, calls
                    );
                    if self.settings.allow_fallback {
                        info!(job_id = %job_id, item = index, bucket = %key, %reason, calls, "Calls exceed rate ceiling, using fallback analyzer");
                        return ItemOutcome::Fallback {
                            result: self.fallback.analyze(
                                item,
                                category,
                                media_analysis(&plan, &responses),
                            ),
                            reason: message,
                            attempts: attempt,
                            errors: trail,
                        };
                    }
                    warn!(job_id = %job_id, item = index, bucket = %key, %reason, calls, "Calls exceed rate ceiling, giving up");
                    if let Some((call, _)) =
                        remaining.iter().zip(&estimates).find(|(_, e)| e.key == key)
                    {
                        trail.push(AttemptError {
                            attempt: attempt + 1,
                            route: call.route,
                            provider: self.provider(call.role).name().to_string(),
                            model: call.model.clone(),
                            message,
                            status: None,
                            retryable: false,
                        });
                    }
                    return ItemOutcome::Error { attempts: trail };
                }
            };

            attempt += 1;
            let mut failure: Option<(usize, &PlannedCall, String, ProviderError)> = None;

            for (slot, call) in remaining.iter().enumerate() {
                let provider = self.provider(call.role);
                let request = build_request(item, call, &responses);
                match provider.analyze(&call.model, &request).await {
                    Ok(response) => {
                        let tokens = response.tokens_used.unwrap_or(call.estimated_tokens);
                        self.limiter.settle(&reservation, slot, tokens);
                        responses.push(response);
                    }
                    Err(err) => {
                        failure = Some((slot, call, provider.name().to_string(), err));
                        break;
                    }
                }
            }

            let Some((slot, call, provider_name, err)) = failure else {
                let synthesis = responses
                    .last()
                    .map(|r| r.analysis.clone())
                    .unwrap_or(JsonValue::Null);
                let result =
                    AnalysisResult::from_provider(&synthesis, media_analysis(&plan, &responses));
                info!(job_id = %job_id, item = index, attempts = attempt, "Item analyzed");
                return ItemOutcome::Analyzed {
                    result,
                    attempts: attempt,
                };
            };

            // The failed call was attempted and stays recorded; later ones were not.
            self.limiter.release(reservation, slot + 1);

            let retryable = err.is_retryable();
            warn!(
                job_id = %job_id,
                item = index,
                attempt,
                provider = %provider_name,
                model = %call.model,
                route = call.route.as_str(),
                retryable,
                error = %err,
                "Analysis attempt failed"
            );
            trail.push(AttemptError {
                attempt,
                route: call.route,
                provider: provider_name,
                model: call.model.clone(),
                message: err.to_string(),
                status: err.status(),
                retryable,
            });

            if !retryable || attempt >= self.settings.max_attempts {
                warn!(job_id = %job_id, item = index, attempts = attempt, "Item analysis gave up");
                return ItemOutcome::Error { attempts: trail };
            }

            let delay = backoff_delay(attempt, self.settings.backoff_base);
            debug!(job_id = %job_id, item = index, attempt, backoff_ms = delay.as_millis() as u64, "Backing off");
            self.sleeper.sleep(delay).await;
        }
    }

    fn provider(&self, role: ProviderRole) -> &Arc<dyn BaseAnalysisProvider> {
        match role {
            ProviderRole::MediaAnalyzer => &self.media,
            ProviderRole::Synthesizer => &self.synthesizer,
        }
    }
}

/// The media call's output, when the plan has one and it has run.
fn media_analysis(plan: &[PlannedCall], responses: &[ProviderResponse]) -> Option<JsonValue> {
    match plan.first() {
        Some(first) if first.role == ProviderRole::MediaAnalyzer => {
            responses.first().map(|r| r.analysis.clone())
        }
        _ => None,
    }
}
