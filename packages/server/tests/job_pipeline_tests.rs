//! End-to-end job pipeline tests on in-memory stores and mock providers.
//!
//! Covers admission, the scrape stage, per-item analysis with retries and
//! the terminal transitions, driven through the seesaw engine.

mod common;

use std::sync::Arc;
use std::time::Duration;

use crate::common::{seed_org, submit_request, text_ad, text_ads, Pipeline};
use adpulse_core::common::OrganizationId;
use adpulse_core::domains::analysis::{AnalysisOutcome, AnalysisStore};
use adpulse_core::domains::jobs::{
    submit_job, JobError, JobEvent, JobStateMachine, JobStatus, JobStore, SubmitJob,
};
use adpulse_core::domains::organization::{OrganizationStore, Plan, QuotaError};
use adpulse_core::kernel::test_dependencies::{MockAnalysisProvider, MockScrapeProvider};
use adpulse_core::kernel::{AppEngine, ScrapeError, ServerDeps, TestDependencies};
use seesaw_core::Engine;
use serde_json::json;

fn synthesis(summary: &str) -> serde_json::Value {
    json!({
        "summary": summary,
        "key_insights": ["urgency-driven offer"],
        "rewritten_copy": "Tents 30% off this weekend. Shop Now",
        "strategic_notes": ["test a countdown variant"],
    })
}

// =============================================================================
// Admission
// =============================================================================

#[tokio::test]
async fn over_quota_request_is_rejected_without_a_job() {
    let test_deps = TestDependencies::new();
    let org = seed_org(&test_deps, Plan::Free, 8).await;
    let pipeline = Pipeline::start(&test_deps);

    let err = pipeline
        .submit(submit_request(&org, "camping tents", 5))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        JobError::Quota(QuotaError::QuotaExceeded { used: 8, limit: 10 })
    ));
    assert!(test_deps.jobs.is_empty());
    assert_eq!(test_deps.scraper.call_count(), 0);

    let org = test_deps.organizations.find(org.id).await.unwrap().unwrap();
    assert_eq!(org.quota_used, 8);
}

#[tokio::test]
async fn admitted_job_reserves_quota_and_completes() {
    let test_deps = TestDependencies::new()
        .mock_scraper(MockScrapeProvider::new().with_items(text_ads(3)));
    let org = seed_org(&test_deps, Plan::Free, 2).await;
    let mut pipeline = Pipeline::start(&test_deps);

    let admission = pipeline
        .submit(submit_request(&org, "camping tents", 3))
        .await
        .unwrap();
    assert_eq!(admission.status, JobStatus::Running);
    assert_eq!(admission.quota_remaining, 5);

    let stored = test_deps.organizations.find(org.id).await.unwrap().unwrap();
    assert_eq!(stored.quota_used, 5);

    let event = pipeline.wait_for_terminal(&admission.job_id).await;
    assert!(matches!(
        event,
        JobEvent::Completed {
            analyzed: 3,
            fallback: 0,
            errored: 0,
            ..
        }
    ));

    let job = test_deps.jobs.find(&admission.job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.completed_at.is_some());
    assert!(job.error.is_none());
    let raw = job.scrape_result().unwrap().unwrap();
    assert_eq!(raw.run_id, "run-1");
    assert_eq!(raw.items.len(), 3);

    let scrapes = test_deps.scraper.calls();
    assert_eq!(scrapes.len(), 1);
    assert_eq!(scrapes[0].keyword, "camping tents");
    assert_eq!(scrapes[0].max_items, 3);
    assert_eq!(scrapes[0].region, "US");

    let records = test_deps.analyses.list_for_job(&admission.job_id).await.unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.outcome == AnalysisOutcome::Success));
    assert_eq!(
        records.iter().map(|r| r.item_index).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
}

#[tokio::test]
async fn placeholder_and_unknown_organizations_are_rejected() {
    let test_deps = TestDependencies::new();
    let pipeline = Pipeline::start(&test_deps);

    for raw in ["default", "", "not-a-uuid", "00000000-0000-0000-0000-000000000000"] {
        let err = pipeline
            .submit(SubmitJob {
                organization_id: raw.to_string(),
                keyword: "tents".to_string(),
                requested_count: 1,
                region: None,
                job_id: None,
            })
            .await
            .unwrap_err();
        assert!(
            matches!(err, JobError::Quota(QuotaError::InvalidOrganization(_))),
            "{:?} should be rejected, got {:?}",
            raw,
            err
        );
    }

    let unknown = OrganizationId::new();
    let err = pipeline
        .submit(SubmitJob {
            organization_id: unknown.to_string(),
            keyword: "tents".to_string(),
            requested_count: 1,
            region: None,
            job_id: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, JobError::Quota(QuotaError::InvalidOrganization(_))));
    assert!(test_deps.jobs.is_empty());
}

#[tokio::test]
async fn invalid_counts_and_keywords_are_rejected() {
    let test_deps = TestDependencies::new();
    let org = seed_org(&test_deps, Plan::Free, 0).await;
    let pipeline = Pipeline::start(&test_deps);

    let zero = pipeline.submit(submit_request(&org, "tents", 0)).await;
    assert!(matches!(zero, Err(JobError::Quota(QuotaError::InvalidRequest(_)))));

    let above_plan = pipeline.submit(submit_request(&org, "tents", 11)).await;
    assert!(matches!(
        above_plan,
        Err(JobError::Quota(QuotaError::InvalidRequest(_)))
    ));

    let blank = pipeline.submit(submit_request(&org, "   ", 1)).await;
    assert!(matches!(blank, Err(JobError::InvalidRequest(_))));

    let org = test_deps.organizations.find(org.id).await.unwrap().unwrap();
    assert_eq!(org.quota_used, 0);
    assert!(test_deps.jobs.is_empty());
}

#[tokio::test]
async fn caller_supplied_job_id_cannot_be_reused() {
    let test_deps = TestDependencies::new()
        .mock_scraper(MockScrapeProvider::new().with_items(text_ads(1)));
    let org = seed_org(&test_deps, Plan::Pro, 0).await;
    let mut pipeline = Pipeline::start(&test_deps);

    let mut request = submit_request(&org, "tents", 1);
    request.job_id = Some("campaign-2026-10:tents".to_string());
    request.region = Some("gb".to_string());

    let admission = pipeline.submit(request.clone()).await.unwrap();
    assert_eq!(admission.job_id.as_str(), "campaign-2026-10:tents");
    pipeline.wait_for_terminal(&admission.job_id).await;

    let err = pipeline.submit(request).await.unwrap_err();
    assert!(matches!(err, JobError::InvalidRequest(_)));

    let org = test_deps.organizations.find(org.id).await.unwrap().unwrap();
    assert_eq!(org.quota_used, 1);
    assert_eq!(test_deps.scraper.calls()[0].region, "GB");
}

// =============================================================================
// Scrape stage
// =============================================================================

#[tokio::test]
async fn scrape_failure_fails_job_without_refund() {
    let test_deps = TestDependencies::new().mock_scraper(
        MockScrapeProvider::new()
            .with_error(ScrapeError::Provider("actor run FAILED".to_string())),
    );
    let org = seed_org(&test_deps, Plan::Free, 0).await;
    let mut pipeline = Pipeline::start(&test_deps);

    let admission = pipeline
        .submit(submit_request(&org, "camping tents", 3))
        .await
        .unwrap();

    let event = pipeline.wait_for_terminal(&admission.job_id).await;
    match event {
        JobEvent::Failed { error, .. } => {
            assert_eq!(error, "scrape failed: scrape provider error: actor run FAILED")
        }
        other => panic!("expected Failed, got {:?}", other),
    }

    let job = test_deps.jobs.find(&admission.job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.raw_result.is_none());
    assert_eq!(test_deps.synthesizer.call_count(), 0);

    let org = test_deps.organizations.find(org.id).await.unwrap().unwrap();
    assert_eq!(org.quota_used, 3);
}

#[tokio::test]
async fn empty_scrape_fails_job() {
    let test_deps = TestDependencies::new()
        .mock_scraper(MockScrapeProvider::new().with_items(Vec::new()));
    let org = seed_org(&test_deps, Plan::Free, 0).await;
    let mut pipeline = Pipeline::start(&test_deps);

    let admission = pipeline
        .submit(submit_request(&org, "nothing matches this", 2))
        .await
        .unwrap();

    let event = pipeline.wait_for_terminal(&admission.job_id).await;
    assert!(matches!(event, JobEvent::Failed { ref error, .. } if error == "no ads returned"));

    let job = test_deps.jobs.find(&admission.job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    // The empty result is still recorded on the job.
    assert_eq!(job.scrape_result().unwrap().unwrap().items.len(), 0);
    assert_eq!(test_deps.synthesizer.call_count(), 0);
    assert!(test_deps
        .analyses
        .list_for_job(&admission.job_id)
        .await
        .unwrap()
        .is_empty());
}

// =============================================================================
// Analysis stage
// =============================================================================

#[tokio::test]
async fn transient_failures_are_retried_until_success() {
    let test_deps = TestDependencies::new()
        .mock_scraper(MockScrapeProvider::new().with_items(text_ads(1)))
        .mock_synthesizer(
            MockAnalysisProvider::new("synth")
                .with_http_error(503, "upstream overloaded")
                .with_http_error(429, "slow down")
                .with_response(synthesis("Seasonal discount push"), Some(420)),
        );
    let org = seed_org(&test_deps, Plan::Free, 0).await;
    let mut pipeline = Pipeline::start(&test_deps);

    let admission = pipeline
        .submit(submit_request(&org, "tents", 1))
        .await
        .unwrap();
    let event = pipeline.wait_for_terminal(&admission.job_id).await;
    assert!(matches!(event, JobEvent::Completed { analyzed: 1, .. }));

    let records = test_deps.analyses.list_for_job(&admission.job_id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, AnalysisOutcome::Success);
    assert_eq!(records[0].attempts, 3);
    assert!(records[0].errors.0.is_empty());
    let result = records[0].result.as_ref().unwrap();
    assert_eq!(result.summary, "Seasonal discount push");
    assert!(!result.fallback);

    assert_eq!(test_deps.synthesizer.call_count(), 3);
    // Exponential backoff from the 10ms base.
    assert_eq!(
        test_deps.sleeper.sleeps(),
        vec![Duration::from_millis(10), Duration::from_millis(20)]
    );
}

#[tokio::test]
async fn one_failing_item_does_not_fail_the_job() {
    let test_deps = TestDependencies::new()
        .mock_scraper(MockScrapeProvider::new().with_items(text_ads(5)))
        .mock_synthesizer(
            MockAnalysisProvider::new("synth")
                .with_response(synthesis("first"), None)
                .with_response(synthesis("second"), None)
                .with_http_error(503, "upstream overloaded")
                .with_http_error(503, "upstream overloaded")
                .with_http_error(500, "internal error"),
        );
    let org = seed_org(&test_deps, Plan::Free, 0).await;
    let mut pipeline = Pipeline::start(&test_deps);

    let admission = pipeline
        .submit(submit_request(&org, "tents", 5))
        .await
        .unwrap();
    let event = pipeline.wait_for_terminal(&admission.job_id).await;
    assert!(matches!(
        event,
        JobEvent::Completed {
            analyzed: 4,
            fallback: 0,
            errored: 1,
            ..
        }
    ));

    let records = test_deps.analyses.list_for_job(&admission.job_id).await.unwrap();
    assert_eq!(records.len(), 5);

    let errored: Vec<_> = records
        .iter()
        .filter(|r| r.outcome == AnalysisOutcome::Error)
        .collect();
    assert_eq!(errored.len(), 1);
    assert_eq!(errored[0].item_index, 2);
    assert_eq!(errored[0].ad_archive_id.as_deref(), Some("ad-2"));
    assert!(errored[0].result.is_none());

    let trail = &errored[0].errors.0;
    assert_eq!(trail.len(), 3);
    assert_eq!(
        trail.iter().map(|e| e.attempt).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(trail[2].status, Some(500));
    assert!(trail.iter().all(|e| e.retryable && e.provider == "synth"));

    let job = test_deps.jobs.find(&admission.job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
}

#[tokio::test]
async fn job_fails_when_every_item_fails() {
    let test_deps = TestDependencies::new()
        .mock_scraper(MockScrapeProvider::new().with_items(text_ads(2)))
        .mock_synthesizer(
            MockAnalysisProvider::new("synth")
                .with_http_error(401, "invalid api key")
                .with_http_error(401, "invalid api key"),
        );
    let org = seed_org(&test_deps, Plan::Free, 0).await;
    let mut pipeline = Pipeline::start(&test_deps);

    let admission = pipeline
        .submit(submit_request(&org, "tents", 2))
        .await
        .unwrap();
    let event = pipeline.wait_for_terminal(&admission.job_id).await;

    let JobEvent::Failed { error, .. } = event else {
        panic!("expected Failed, got {:?}", event);
    };
    assert!(error.starts_with("all 2 item(s) failed analysis"), "{}", error);
    assert!(error.contains("item 0"));
    assert!(error.contains("item 1"));

    // 401 is not retryable: one call per item.
    assert_eq!(test_deps.synthesizer.call_count(), 2);
    assert!(test_deps.sleeper.sleeps().is_empty());

    let records = test_deps.analyses.list_for_job(&admission.job_id).await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.outcome == AnalysisOutcome::Error));
}

// =============================================================================
// Duplicate and late events
// =============================================================================

#[tokio::test]
async fn events_for_a_finished_job_change_nothing() {
    let items = vec![text_ad("ad-1", "Tents 30% off this weekend only!")];
    let test_deps = TestDependencies::new()
        .mock_scraper(MockScrapeProvider::new().with_items(items.clone()));
    let org = seed_org(&test_deps, Plan::Free, 0).await;
    let mut pipeline = Pipeline::start(&test_deps);

    let admission = pipeline
        .submit(submit_request(&org, "tents", 1))
        .await
        .unwrap();
    pipeline.wait_for_terminal(&admission.job_id).await;

    let job_id = admission.job_id.clone();
    let before = test_deps.jobs.find(&job_id).await.unwrap().unwrap();
    let machine = JobStateMachine::new(pipeline.deps.clone());

    let replays = vec![
        JobEvent::ScrapeRequested {
            job_id: job_id.clone(),
            organization_id: org.id,
            keyword: "tents".to_string(),
            max_items: 1,
            region: "US".to_string(),
        },
        JobEvent::ScrapeCompleted {
            job_id: job_id.clone(),
            run_id: "run-late".to_string(),
            items: items.clone(),
        },
        JobEvent::AnalysisRequested {
            job_id: job_id.clone(),
        },
        JobEvent::ScrapeFailed {
            job_id: job_id.clone(),
            message: "late failure".to_string(),
        },
    ];
    for event in replays {
        let follow_ups = machine.handle(event.clone()).await.unwrap();
        assert!(follow_ups.is_empty(), "{} produced {:?}", event.name(), follow_ups);
    }

    let after = test_deps.jobs.find(&job_id).await.unwrap().unwrap();
    assert_eq!(after.status, JobStatus::Completed);
    assert!(after.error.is_none());
    assert_eq!(after.completed_at, before.completed_at);
    assert_eq!(after.scrape_result().unwrap().unwrap().run_id, "run-1");

    assert_eq!(test_deps.scraper.call_count(), 1);
    assert_eq!(test_deps.synthesizer.call_count(), 1);
    assert_eq!(test_deps.analyses.list_for_job(&job_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn duplicate_analysis_request_runs_analysis_once() {
    let test_deps = TestDependencies::new();
    let org = seed_org(&test_deps, Plan::Free, 0).await;
    let deps = test_deps.clone().into_deps();
    let machine = JobStateMachine::new(deps.clone());

    let admission = submit_job(submit_request(&org, "tents", 2), &deps, &idle_engine(&deps))
        .await
        .unwrap();
    let job_id = admission.job_id;

    let next = machine
        .handle(JobEvent::ScrapeCompleted {
            job_id: job_id.clone(),
            run_id: "run-7".to_string(),
            items: text_ads(2),
        })
        .await
        .unwrap();
    assert!(matches!(next.as_slice(), [JobEvent::AnalysisRequested { .. }]));

    let request = JobEvent::AnalysisRequested {
        job_id: job_id.clone(),
    };
    let first = machine.handle(request.clone()).await.unwrap();
    let second = machine.handle(request).await.unwrap();

    assert!(matches!(first.as_slice(), [JobEvent::Completed { analyzed: 2, .. }]));
    assert!(second.is_empty());
    assert_eq!(test_deps.synthesizer.call_count(), 2);
}

/// An engine with no effects, so stages run only when a test drives them.
fn idle_engine(deps: &ServerDeps) -> Arc<AppEngine> {
    Arc::new(Engine::with_deps(deps.clone()))
}

#[tokio::test]
async fn scrape_failure_after_stored_result_is_ignored() {
    let test_deps = TestDependencies::new();
    let org = seed_org(&test_deps, Plan::Free, 0).await;
    let deps = test_deps.clone().into_deps();
    let machine = JobStateMachine::new(deps.clone());

    let admission = submit_job(submit_request(&org, "tents", 2), &deps, &idle_engine(&deps))
        .await
        .unwrap();
    let job_id = admission.job_id;

    let next = machine
        .handle(JobEvent::ScrapeCompleted {
            job_id: job_id.clone(),
            run_id: "run-3".to_string(),
            items: text_ads(2),
        })
        .await
        .unwrap();
    assert!(matches!(next.as_slice(), [JobEvent::AnalysisRequested { .. }]));

    // A late failure report for the same scrape must not fail the job.
    let late = machine
        .handle(JobEvent::ScrapeFailed {
            job_id: job_id.clone(),
            message: "actor run timed out".to_string(),
        })
        .await
        .unwrap();
    assert!(late.is_empty(), "late failure produced {:?}", late);

    let job = test_deps.jobs.find(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Running);
    assert!(job.error.is_none());
    assert_eq!(job.scrape_result().unwrap().unwrap().run_id, "run-3");

    // The stored result still drives analysis to completion.
    let done = machine.handle(next[0].clone()).await.unwrap();
    assert!(matches!(done.as_slice(), [JobEvent::Completed { analyzed: 2, .. }]));
}
