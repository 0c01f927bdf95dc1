//! HTTP edge tests: the Axum router over in-memory dependencies.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::common::{seed_org, text_ads, Pipeline};
use adpulse_core::domains::jobs::JobId;
use adpulse_core::domains::organization::Plan;
use adpulse_core::kernel::test_dependencies::{MockAnalysisProvider, MockScrapeProvider};
use adpulse_core::kernel::TestDependencies;
use adpulse_core::server::{build_app, AxumAppState};

fn app(pipeline: &Pipeline) -> Router {
    build_app(AxumAppState {
        deps: pipeline.deps.clone(),
        engine: pipeline.engine.clone(),
    })
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_job(body: Value) -> Request<Body> {
    Request::post("/jobs")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn submitted_job_is_accepted_and_reported() {
    let test_deps = TestDependencies::new()
        .mock_scraper(MockScrapeProvider::new().with_items(text_ads(2)))
        .mock_synthesizer(
            MockAnalysisProvider::new("synth")
                .with_response(json!({"summary": "first"}), None)
                .with_http_error(401, "invalid api key"),
        );
    let org = seed_org(&test_deps, Plan::Free, 0).await;
    let mut pipeline = Pipeline::start(&test_deps);

    let (status, body) = send(
        app(&pipeline),
        post_job(json!({
            "organization_id": org.id.to_string(),
            "keyword": "camping tents",
            "requested_count": 2,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "running");
    assert_eq!(body["quota_remaining"], 8);

    let job_id = JobId::parse(body["job_id"].as_str().unwrap()).unwrap();
    pipeline.wait_for_terminal(&job_id).await;

    let (status, view) = send(app(&pipeline), get(&format!("/jobs/{}", job_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], "completed");
    assert_eq!(view["scraped_items"], 2);
    assert_eq!(view["analyses"].as_array().unwrap().len(), 1);
    assert_eq!(view["analyses"][0]["result"]["summary"], "first");

    let errors = view["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["item_index"], 1);
    assert_eq!(errors[0]["ad_archive_id"], "ad-1");
    assert_eq!(errors[0]["attempts"][0]["status"], 401);
}

#[tokio::test]
async fn over_quota_submission_returns_429() {
    let test_deps = TestDependencies::new();
    let org = seed_org(&test_deps, Plan::Free, 8).await;
    let pipeline = Pipeline::start(&test_deps);

    let (status, body) = send(
        app(&pipeline),
        post_job(json!({
            "organization_id": org.id.to_string(),
            "keyword": "camping tents",
            "requested_count": 5,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "quota_exceeded");
    assert_eq!(body["used"], 8);
    assert_eq!(body["limit"], 10);
}

#[tokio::test]
async fn placeholder_organization_returns_400() {
    let test_deps = TestDependencies::new();
    let pipeline = Pipeline::start(&test_deps);

    let (status, body) = send(
        app(&pipeline),
        post_job(json!({
            "organization_id": "default-org",
            "keyword": "camping tents",
            "requested_count": 1,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_organization");
}

#[tokio::test]
async fn unknown_job_returns_404() {
    let test_deps = TestDependencies::new();
    let pipeline = Pipeline::start(&test_deps);

    let (status, body) = send(app(&pipeline), get("/jobs/does-not-exist")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn quota_status_reports_usage() {
    let test_deps = TestDependencies::new();
    let org = seed_org(&test_deps, Plan::Free, 7).await;
    let pipeline = Pipeline::start(&test_deps);

    let (status, body) = send(
        app(&pipeline),
        get(&format!("/organizations/{}/quota", org.id)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["used"], 7);
    assert_eq!(body["limit"], 10);
    assert_eq!(body["remaining"], 3);
    assert_eq!(body["percentage"], 70);
    assert_eq!(body["plan"], "free");
}

#[tokio::test]
async fn health_without_database_is_healthy() {
    let test_deps = TestDependencies::new();
    let pipeline = Pipeline::start(&test_deps);

    let (status, body) = send(app(&pipeline), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"]["status"], "not_configured");
}
