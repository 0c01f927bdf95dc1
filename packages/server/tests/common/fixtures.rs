//! Test fixtures: ad items, seeded organizations and a running job pipeline
//! on in-memory stores and mock providers.

use anyhow::Result;
use async_trait::async_trait;
use seesaw_core::{effect, EffectContext};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

use adpulse_core::domains::ads::{AdItem, ContentCategory};
use adpulse_core::domains::analysis::{ItemOutcome, OutcomeSink};
use adpulse_core::common::AppState;
use adpulse_core::domains::jobs::{
    submit_job, JobAdmission, JobError, JobEvent, JobId, SubmitJob,
};
use adpulse_core::domains::organization::{Organization, OrganizationStore, Plan};
use adpulse_core::kernel::{AppEngine, ServerDeps, TestDependencies};
use adpulse_core::server::build_engine;

pub fn text_ad(id: &str, text: &str) -> AdItem {
    AdItem {
        ad_archive_id: Some(id.to_string()),
        text: text.to_string(),
        page_name: Some("Acme Outdoors".to_string()),
        cta_text: Some("Shop Now".to_string()),
        ..Default::default()
    }
}

pub fn image_ad(id: &str, text: &str) -> AdItem {
    AdItem {
        image_urls: vec![format!("https://scontent.xx.fbcdn.net/v/{}.jpg", id)],
        ..text_ad(id, text)
    }
}

pub fn video_ad(id: &str, text: &str) -> AdItem {
    AdItem {
        video_urls: vec![format!("https://video.xx.fbcdn.net/v/{}.mp4", id)],
        ..text_ad(id, text)
    }
}

/// `count` distinct text-only ads.
pub fn text_ads(count: usize) -> Vec<AdItem> {
    (0..count)
        .map(|i| text_ad(&format!("ad-{}", i), &format!("Spring sale on tents, item {}.", i)))
        .collect()
}

/// Insert an organization into the in-memory store with `used` units consumed.
pub async fn seed_org(deps: &TestDependencies, plan: Plan, used: i32) -> Organization {
    let mut org = Organization::new("Acme Outdoors", plan);
    org.quota_used = used;
    deps.organizations
        .insert(&org)
        .await
        .expect("Failed to seed organization")
}

pub fn submit_request(org: &Organization, keyword: &str, count: i32) -> SubmitJob {
    SubmitJob {
        organization_id: org.id.to_string(),
        keyword: keyword.to_string(),
        requested_count: count,
        region: None,
        job_id: None,
    }
}

/// Forwards every job event the engine handles to a broadcast channel.
fn event_tap(tx: broadcast::Sender<JobEvent>) -> seesaw_core::effect::Effect<AppState, ServerDeps> {
    effect::on::<JobEvent>().id("test_event_tap").then(
        move |event: Arc<JobEvent>, _ctx: EffectContext<AppState, ServerDeps>| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(event.as_ref().clone());
                Ok(())
            }
        },
    )
}

/// The production engine plus a subscription opened before any event ran.
pub struct Pipeline {
    pub deps: ServerDeps,
    pub engine: Arc<AppEngine>,
    pub events: broadcast::Receiver<JobEvent>,
}

impl Pipeline {
    pub fn start(test_deps: &TestDependencies) -> Self {
        let deps = test_deps.clone().into_deps();
        let (tx, events) = broadcast::channel(1024);
        let engine = build_engine(deps.clone()).with_effect(event_tap(tx));
        Self {
            deps,
            engine: Arc::new(engine),
            events,
        }
    }

    pub async fn submit(&self, request: SubmitJob) -> Result<JobAdmission, JobError> {
        submit_job(request, &self.deps, &self.engine).await
    }

    /// Wait for the job's `Completed` or `Failed` event.
    pub async fn wait_for_terminal(&mut self, job_id: &JobId) -> JobEvent {
        let events = &mut self.events;
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match events.recv().await {
                    Ok(event) if event.job_id() == job_id && event.is_terminal() => {
                        return event
                    }
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(err) => panic!("event stream closed: {}", err),
                }
            }
        })
        .await
        .expect("timed out waiting for the job to finish")
    }
}

/// Captures every item outcome in order.
#[derive(Default)]
pub struct RecordingSink {
    outcomes: Mutex<Vec<(usize, ContentCategory, ItemOutcome)>>,
}

impl RecordingSink {
    pub fn outcomes(&self) -> Vec<(usize, ContentCategory, ItemOutcome)> {
        self.outcomes.lock().unwrap().clone()
    }
}

#[async_trait]
impl OutcomeSink for RecordingSink {
    async fn item_finished(
        &self,
        index: usize,
        _item: &AdItem,
        category: ContentCategory,
        outcome: &ItemOutcome,
    ) -> Result<()> {
        self.outcomes
            .lock()
            .unwrap()
            .push((index, category, outcome.clone()));
        Ok(())
    }
}
