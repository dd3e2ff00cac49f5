//! Gateway read flow over the in-memory store
//!
//! Exercises the HTTP surface end to end: route matching, the redaction
//! pipeline, error mapping, and the retry path, with failure injection
//! provided by the memory store.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{body_bytes, build_app, build_app_with_detectors, build_app_with_policy};
use tower::ServiceExt;
use veilgate_ingress::RedactionPolicy;
use veilgate_store::MemoryObjectStore;

#[tokio::test]
async fn redacts_email_in_streamed_object() {
    let store = Arc::new(MemoryObjectStore::new());
    store.insert_with_content_type(
        "docs/letter.txt",
        "Contact Alice at alice.wonderland@company.net today.",
        "text/plain",
    );
    let app = build_app(store);

    let request = Request::builder()
        .uri("/objects/docs/letter.txt")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/plain"
    );
    assert_eq!(
        body_bytes(response).await,
        b"Contact Alice at [REDACTED_EMAIL] today."
    );
}

#[tokio::test]
async fn multiple_detectors_redact_in_one_pass() {
    let store = Arc::new(MemoryObjectStore::new());
    store.insert(
        "contacts.txt",
        "mail bob.builder@example.org or call 555-123-4567 now",
    );
    let app = build_app_with_detectors(store, &["email", "phone"]);

    let request = Request::builder()
        .uri("/objects/contacts.txt")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_bytes(response).await,
        b"mail [REDACTED_EMAIL] or call [REDACTED_PHONE] now"
    );
}

#[tokio::test]
async fn missing_object_returns_structured_error() {
    let app = build_app(Arc::new(MemoryObjectStore::new()));

    let request = Request::builder()
        .uri("/objects/docs/absent.txt")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["error"]["code"], "FETCH_NOT_FOUND");
    assert!(
        json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("docs/absent.txt")
    );
    assert!(json["error"]["request_id"].is_string());
}

#[tokio::test]
async fn denied_object_is_forbidden() {
    let store = Arc::new(MemoryObjectStore::new());
    store.insert("vault.txt", "top secret");
    store.deny("vault.txt");
    let app = build_app(store);

    let request = Request::builder()
        .uri("/objects/vault.txt")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["error"]["code"], "FETCH_ACCESS_DENIED");
}

#[tokio::test]
async fn transient_failure_recovers_on_retry() {
    let store = Arc::new(MemoryObjectStore::new());
    store.insert("w.txt", "write to alice.wonderland@company.net");
    store.fail_transient("w.txt", 1);
    let app = build_app(store.clone());

    let request = Request::builder()
        .uri("/objects/w.txt")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"write to [REDACTED_EMAIL]");
    assert_eq!(store.fetch_count(), 2);
}

#[tokio::test]
async fn persistent_transient_failure_maps_to_502() {
    let store = Arc::new(MemoryObjectStore::new());
    store.insert("w.txt", "irrelevant");
    store.fail_transient("w.txt", 5);
    let app = build_app(store.clone());

    let request = Request::builder()
        .uri("/objects/w.txt")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["error"]["code"], "FETCH_TRANSIENT");
    // One retry and no more.
    assert_eq!(store.fetch_count(), 2);
}

#[tokio::test]
async fn range_read_redacts_the_window() {
    let store = Arc::new(MemoryObjectStore::new());
    store.insert(
        "docs/letter.txt",
        "Contact Alice at alice.wonderland@company.net today.",
    );
    let app = build_app(store);

    let request = Request::builder()
        .uri("/objects/docs/letter.txt")
        .header("range", "bytes=17-51")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"[REDACTED_EMAIL] today.");
}

#[tokio::test]
async fn empty_object_streams_empty_body() {
    let store = Arc::new(MemoryObjectStore::new());
    store.insert("empty.txt", "");
    let app = build_app(store);

    let request = Request::builder()
        .uri("/objects/empty.txt")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn policy_passthrough_streams_raw_bytes() {
    let store = Arc::new(MemoryObjectStore::new());
    store.insert("dump.bin", "raw alice.wonderland@company.net raw");
    let app = build_app_with_policy(
        store,
        RedactionPolicy::scan_extensions(vec!["txt".to_string()]),
    );

    let request = Request::builder()
        .uri("/objects/dump.bin")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_bytes(response).await,
        b"raw alice.wonderland@company.net raw"
    );
}

#[tokio::test]
async fn policy_scoped_extension_still_redacted() {
    let store = Arc::new(MemoryObjectStore::new());
    store.insert("notes.txt", "raw alice.wonderland@company.net raw");
    let app = build_app_with_policy(
        store,
        RedactionPolicy::scan_extensions(vec!["txt".to_string()]),
    );

    let request = Request::builder()
        .uri("/objects/notes.txt")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"raw [REDACTED_EMAIL] raw");
}
