//! In-process routing tests.
//!
//! Drives the full router with `tower::ServiceExt::oneshot` against mock
//! collaborators from `fleet-test-utils`.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use fleet_api::{create_router, AppState, Collaborators, SCOPE_HEADER};
use fleet_core::FleetConfig;
use fleet_test_utils::{
    CheckBehavior, MockChecker, MockCheckerRegistry, MockFetcher, MockProbe, MockReviewClient,
    MockReviewConnector, ObjectRef, ProbeBehavior, ResourceView, ScopeKey, StaticResolver,
};
use serde_json::{json, Value};
use tower::ServiceExt;

struct Harness {
    app: Router,
    state: AppState,
    checker: Arc<MockChecker>,
    fetcher: Arc<MockFetcher>,
    probe: Arc<MockProbe>,
    reviews: Arc<MockReviewConnector>,
}

fn harness() -> Harness {
    harness_with(FleetConfig::default())
}

fn harness_with(config: FleetConfig) -> Harness {
    let checker = Arc::new(MockChecker::allowing());
    let fetcher = Arc::new(MockFetcher::new());
    let probe = Arc::new(MockProbe::new());
    let reviews = Arc::new(MockReviewConnector::new(
        MockReviewClient::new().deny_resource("secrets", "rbac: secrets are restricted"),
    ));

    let pod = ObjectRef::new("Pod", Some("default"), "web");
    fetcher.insert("prod", &pod, ResourceView::Detail, json!({"kind": "Pod", "name": "web"}));
    fetcher.insert("prod", &pod, ResourceView::Yaml, json!("kind: Pod\nname: web\n"));
    fetcher.insert(
        "prod",
        &ObjectRef::new("Node", None, "worker-1"),
        ResourceView::Detail,
        json!({"kind": "Node", "name": "worker-1"}),
    );

    let collaborators = Collaborators {
        checkers: Arc::new(MockCheckerRegistry::new().with_checker("prod", checker.clone())),
        resolver: Arc::new(StaticResolver::new()),
        reviews: reviews.clone(),
        fetcher: fetcher.clone(),
        probe: probe.clone(),
    };
    let state = AppState::new(config, collaborators);

    Harness {
        app: create_router(state.clone()),
        state,
        checker,
        fetcher,
        probe,
        reviews,
    }
}

fn get(uri: &str, scope: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(scope) = scope {
        builder = builder.header(SCOPE_HEADER, scope);
    }
    builder.body(Body::empty()).unwrap()
}

fn post(uri: &str, scope: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(scope) = scope {
        builder = builder.header(SCOPE_HEADER, scope);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| json!(String::from_utf8_lossy(&bytes)))
    };
    (status, body)
}

async fn send_owned(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    send(&app, request).await
}

const POD_URI: &str = "/api/v1/resources/Pod/default/web";

// ============================================================================
// SCOPE SELECTION AT THE BOUNDARY
// ============================================================================

#[tokio::test]
async fn test_missing_scope_is_rejected_before_handler() {
    let h = harness();
    let (status, body) = send(&h.app, get(POD_URI, None)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FIELD");
    assert_eq!(h.fetcher.calls(), 0);
}

#[tokio::test]
async fn test_two_scopes_are_rejected_before_handler() {
    let h = harness();
    let uri = format!("{}?scope=dev", POD_URI);
    let (status, body) = send(&h.app, get(&uri, Some("prod"))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");
    assert_eq!(h.fetcher.calls(), 0);
}

#[tokio::test]
async fn test_same_scope_in_header_and_query_is_accepted() {
    let h = harness();
    let uri = format!("{}?scope=prod", POD_URI);
    let (status, body) = send(&h.app, get(&uri, Some("prod"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "web");
}

// ============================================================================
// RESOURCE READS
// ============================================================================

#[tokio::test]
async fn test_second_read_is_served_from_cache_after_guard_check() {
    let h = harness();

    let (first_status, first) = send(&h.app, get(POD_URI, Some("prod"))).await;
    let (second_status, second) = send(&h.app, get(POD_URI, Some("prod"))).await;

    assert_eq!(first_status, StatusCode::OK);
    assert_eq!(second_status, StatusCode::OK);
    assert_eq!(first, second);
    assert_eq!(h.fetcher.calls(), 1);
    assert_eq!(h.checker.calls(), 1);
    assert_eq!(h.state.cache.len(), 1);
}

#[tokio::test]
async fn test_views_are_cached_separately() {
    let h = harness();

    let (_, detail) = send(&h.app, get(POD_URI, Some("prod"))).await;
    let (_, yaml) = send(&h.app, get(&format!("{}?view=yaml", POD_URI), Some("prod"))).await;

    assert_eq!(detail["data"]["kind"], "Pod");
    assert_eq!(yaml["data"], "kind: Pod\nname: web\n");
    assert_eq!(h.state.cache.len(), 2);
}

#[tokio::test]
async fn test_matching_version_returns_not_modified() {
    let h = harness();

    let (_, first) = send(&h.app, get(POD_URI, Some("prod"))).await;
    let version = first["version"].as_str().unwrap().to_string();
    assert_eq!(first["notModified"], false);

    let uri = format!("{}?version={}", POD_URI, version);
    let (status, second) = send(&h.app, get(&uri, Some("prod"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(second, json!({"version": version, "notModified": true}));
}

#[tokio::test]
async fn test_denied_cache_hit_is_evicted_and_refetched() {
    let h = harness();

    send(&h.app, get(POD_URI, Some("prod"))).await;
    send(&h.app, get(&format!("{}?view=yaml", POD_URI), Some("prod"))).await;
    assert_eq!(h.fetcher.calls(), 2);

    h.checker
        .set_behavior(CheckBehavior::Deny("access revoked".to_string()));
    let (status, _) = send(&h.app, get(POD_URI, Some("prod"))).await;

    // The deny evicted both views; only the requested one was refetched.
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.fetcher.calls(), 3);
    assert_eq!(h.state.cache.len(), 1);
}

#[tokio::test]
async fn test_checker_failure_serves_cached_response() {
    let h = harness();

    send(&h.app, get(POD_URI, Some("prod"))).await;
    h.checker
        .set_behavior(CheckBehavior::Fail("apiserver unreachable".to_string()));
    let (status, body) = send(&h.app, get(POD_URI, Some("prod"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "web");
    assert_eq!(h.fetcher.calls(), 1);
}

#[tokio::test]
async fn test_cluster_scoped_path() {
    let h = harness();
    let (status, body) = send(&h.app, get("/api/v1/resources/Node/_/worker-1", Some("prod"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "worker-1");
}

#[tokio::test]
async fn test_fetch_failure_is_bad_gateway_and_not_cached() {
    let h = harness();
    h.fetcher.set_failure(Some("connection refused"));

    let (status, body) = send(&h.app, get(POD_URI, Some("prod"))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "UPSTREAM_ERROR");
    assert!(h.state.cache.is_empty());
    assert!(h.state.versions.is_empty());
}

#[tokio::test]
async fn test_unknown_view_is_rejected() {
    let h = harness();
    let (status, body) = send(&h.app, get(&format!("{}?view=json", POD_URI), Some("prod"))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");
    assert_eq!(h.fetcher.calls(), 0);
}

#[tokio::test]
async fn test_scopes_do_not_share_cache_entries() {
    let h = harness();
    send(&h.app, get(POD_URI, Some("prod"))).await;

    let (status, _) = send(&h.app, get(POD_URI, Some("staging"))).await;

    // staging has no such object; the prod entry must not answer for it.
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(h.fetcher.calls(), 2);
}

// ============================================================================
// CAPABILITIES
// ============================================================================

#[tokio::test]
async fn test_capability_batch_is_parallel_and_coalesced() {
    let h = harness();
    let checks = json!({
        "checks": [
            {"id": "a", "verb": "GET", "resourceKind": "Pod", "namespace": "default"},
            {"id": "b", "verb": "get", "resourceKind": "pod", "namespace": " default "},
            {"id": "c", "verb": "get", "resourceKind": "Secret", "namespace": "default"},
            {"id": "d", "verb": "", "resourceKind": "Pod"},
            {"id": "e", "verb": "list", "resourceKind": "Gizmo"}
        ]
    });

    let (status, body) = send(&h.app, post("/api/v1/capabilities", Some("prod"), checks)).await;
    assert_eq!(status, StatusCode::OK);

    let results = body["results"].as_array().unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);

    assert_eq!(results[0]["allowed"], true);
    assert_eq!(results[1]["allowed"], true);
    assert_eq!(results[2]["allowed"], false);
    assert_eq!(results[2]["deniedReason"], "rbac: secrets are restricted");
    assert!(results[3]["error"].is_string());
    assert!(results[4]["error"].is_string());

    assert_eq!(body["summary"]["requested"], 5);
    assert_eq!(body["summary"]["uniqueChecks"], 2);
    assert_eq!(body["summary"]["failed"], 2);
    assert_eq!(h.reviews.connects(), 1);
    assert_eq!(h.reviews.client().calls(), 1);
}

#[tokio::test]
async fn test_empty_capability_batch() {
    let h = harness();
    let (status, body) = send(
        &h.app,
        post("/api/v1/capabilities", Some("prod"), json!({"checks": []})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], json!([]));
    assert_eq!(h.reviews.client().calls(), 0);
}

#[tokio::test]
async fn test_capability_batch_requires_scope() {
    let h = harness();
    let (status, _) = send(
        &h.app,
        post("/api/v1/capabilities", None, json!({"checks": []})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(h.reviews.connects(), 0);
}

// ============================================================================
// SELECTION
// ============================================================================

#[tokio::test]
async fn test_selection_switch_invalidates_previous_scope() {
    let h = harness();

    let (status, first) = send(&h.app, post("/api/v1/selection", None, json!({"scope": "prod"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["generation"], 1);
    assert!(first.get("previous").is_none());

    send(&h.app, get(POD_URI, Some("prod"))).await;
    assert_eq!(h.state.cache.len(), 1);

    let (status, second) =
        send(&h.app, post("/api/v1/selection", None, json!({"scope": "staging"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["generation"], 2);
    assert_eq!(second["previous"], "prod");
    assert_eq!(second["invalidated"], 1);
    assert!(h.state.cache.is_empty());

    let (_, current) = send(&h.app, get("/api/v1/selection", None)).await;
    assert_eq!(current, json!({"scope": "staging", "generation": 2}));
}

#[tokio::test]
async fn test_version_records_stay_bounded_and_leave_with_their_scope() {
    let mut config = FleetConfig::default();
    config.cache.max_entries = 2;
    let h = harness_with(config);

    send(&h.app, post("/api/v1/selection", None, json!({"scope": "prod"}))).await;
    for i in 0..50 {
        let name = format!("web-{}", i);
        let pod = ObjectRef::new("Pod", Some("default"), name.as_str());
        h.fetcher
            .insert("prod", &pod, ResourceView::Detail, json!({"kind": "Pod", "name": name}));
        let (status, _) = send(
            &h.app,
            get(&format!("/api/v1/resources/Pod/default/{}", name), Some("prod")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    assert_eq!(h.state.cache.len(), 2);
    assert_eq!(h.state.versions.len(), 2);

    let (status, _) =
        send(&h.app, post("/api/v1/selection", None, json!({"scope": "staging"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(h.state.cache.is_empty());
    assert!(h.state.versions.is_empty());
}

#[tokio::test]
async fn test_denied_hit_forgets_both_versions() {
    let h = harness();
    send(&h.app, get(POD_URI, Some("prod"))).await;
    send(&h.app, get(&format!("{}?view=yaml", POD_URI), Some("prod"))).await;
    assert_eq!(h.state.versions.len(), 2);

    h.checker
        .set_behavior(CheckBehavior::Deny("access revoked".to_string()));
    let (status, _) = send(&h.app, get(POD_URI, Some("prod"))).await;
    assert_eq!(status, StatusCode::OK);

    // Only the representation that was just refetched is versioned again.
    assert_eq!(h.state.versions.len(), 1);
    assert!(h
        .state
        .versions
        .version_for("prod|yaml:pod:default/web")
        .is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_switch_cancels_in_flight_read_of_previous_scope() {
    let h = harness();
    send(&h.app, post("/api/v1/selection", None, json!({"scope": "prod"}))).await;

    h.fetcher.hold();
    let read = tokio::spawn(send_owned(h.app.clone(), get(POD_URI, Some("prod"))));
    h.fetcher.wait_started().await;

    let (status, body) =
        send(&h.app, post("/api/v1/selection", None, json!({"scope": "staging"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["previous"], "prod");

    h.fetcher.release();
    let (status, body) = read.await.unwrap();
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "CANCELLED");
    assert!(h.state.cache.is_empty());
    assert!(h.state.versions.is_empty());

    // A fresh read of the old scope is not affected by the revocation.
    let (status, _) = send(&h.app, get(POD_URI, Some("prod"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.state.cache.len(), 1);
}

#[tokio::test]
async fn test_superseded_selection_does_not_publish() {
    let h = harness();
    h.probe.set_behavior("slow", ProbeBehavior::Hang);

    let first = tokio::spawn(
        h.app
            .clone()
            .oneshot(post("/api/v1/selection", None, json!({"scope": "slow"}))),
    );
    h.probe.wait_started().await;

    let (status, second) = send(&h.app, post("/api/v1/selection", None, json!({"scope": "prod"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["generation"], 2);

    let first = first.await.unwrap().unwrap();
    assert_eq!(first.status(), StatusCode::ACCEPTED);

    assert_eq!(
        h.state.selection.snapshot().scope,
        Some(ScopeKey::new("prod"))
    );
}

#[tokio::test]
async fn test_unusable_scope_is_not_selected() {
    let h = harness();
    h.probe
        .set_behavior("broken", ProbeBehavior::Unhealthy("certificate expired".to_string()));

    let (status, body) = send(&h.app, post("/api/v1/selection", None, json!({"scope": "broken"}))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["message"].as_str().unwrap().contains("certificate expired"));
    assert_eq!(h.state.selection.snapshot().scope, None);
}

#[tokio::test]
async fn test_blank_selection_is_rejected() {
    let h = harness();
    let (status, body) = send(&h.app, post("/api/v1/selection", None, json!({"scope": "  "}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FIELD");
    assert_eq!(h.probe.calls(), 0);
}

// ============================================================================
// HEALTH
// ============================================================================

#[tokio::test]
async fn test_newer_probe_supersedes_older_one() {
    let h = harness();
    h.probe.set_behavior("prod", ProbeBehavior::Hang);

    let first = tokio::spawn(
        h.app
            .clone()
            .oneshot(post("/api/v1/health", Some("prod"), json!({}))),
    );
    h.probe.wait_started().await;
    h.probe.set_behavior("prod", ProbeBehavior::Healthy);

    let (status, body) = send(&h.app, post("/api/v1/health", Some("prod"), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let first = first.await.unwrap().unwrap();
    assert_eq!(first.status(), StatusCode::ACCEPTED);
    let bytes = axum::body::to_bytes(first.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({"superseded": true}));

    assert!(!h.state.coordinator.is_active(&ScopeKey::new("prod")));
}

#[tokio::test]
async fn test_unhealthy_probe_is_service_unavailable() {
    let h = harness();
    h.probe
        .set_behavior("prod", ProbeBehavior::Unhealthy("connection refused".to_string()));

    let (status, body) = send(&h.app, post("/api/v1/health", Some("prod"), json!({}))).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
}

#[tokio::test]
async fn test_probe_after_shutdown_is_cancelled() {
    let h = harness();
    h.state.shutdown();

    let (status, body) = send(&h.app, post("/api/v1/health", Some("prod"), json!({}))).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "CANCELLED");
}

#[tokio::test]
async fn test_liveness_and_metrics() {
    let h = harness();

    let (status, body) = send(&h.app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let response = h.app.clone().oneshot(get("/metrics", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("fleet_http_requests_total"));
    assert!(text.contains("fleet_response_cache"));
}
