//! API client tests against a mock backend.

use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use esq_api::{ApiClient, ApiConfig, ApiError, EscalationActions, SnapshotSource};
use esq_core::{EscalationStatus, Priority, Revision};

fn snapshot_body() -> serde_json::Value {
    serde_json::json!([
        {
            "id": "esc-1",
            "created_at": "2026-08-20T09:00:00Z",
            "sla_due_at": "2026-08-20T17:00:00Z",
            "priority": "critical",
            "status": "open",
            "subject": "bounced invoice run",
            "sender": "billing@customer.example",
            "reason": "auto-classifier low confidence",
            "team": { "id": "t-2", "name": "billing" },
            "revision": 31
        },
        {
            "id": "esc-2",
            "created_at": "2026-08-20T10:30:00Z",
            "sla_due_at": "2026-08-21T10:30:00Z",
            "priority": "low",
            "status": "in_progress",
            "revision": 12
        }
    ])
}

async fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::new(
        &ApiConfig::new(server.uri()).with_request_timeout(Duration::from_millis(500)),
    )
    .unwrap()
}

#[tokio::test]
async fn fetch_active_parses_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/escalations/active"))
        .respond_with(ResponseTemplate::new(200).set_body_json(snapshot_body()))
        .mount(&server)
        .await;

    let snapshot = client_for(&server).await.fetch_active().await.unwrap();
    assert_eq!(snapshot.records.len(), 2);

    let first = &snapshot.records[0];
    assert_eq!(first.id.as_str(), "esc-1");
    assert_eq!(first.priority, Priority::Critical);
    assert_eq!(first.status, EscalationStatus::Open);
    assert_eq!(first.revision, Revision(31));
    assert_eq!(first.team.as_ref().unwrap().name, "billing");

    // Optional text fields default to empty.
    assert_eq!(snapshot.records[1].subject, "");
    assert!(snapshot.records[1].team.is_none());
}

#[tokio::test]
async fn server_error_is_transient_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/escalations/active"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = client_for(&server).await.fetch_active().await.unwrap_err();
    assert!(matches!(err, ApiError::Http { status: 503, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn hung_fetch_times_out_as_transient_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/escalations/active"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(snapshot_body())
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let err = client_for(&server).await.fetch_active().await.unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/escalations/active"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server).await.fetch_active().await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn approve_posts_to_the_action_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/escalations/esc-1/approve"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server)
        .await
        .approve(&"esc-1".into())
        .await
        .unwrap();
}

#[tokio::test]
async fn reject_surfaces_backend_refusal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/escalations/esc-9/reject"))
        .respond_with(ResponseTemplate::new(409).set_body_string("already resolved"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .reject(&"esc-9".into())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Http { status: 409, .. }));
    assert!(!err.is_transient());
}
