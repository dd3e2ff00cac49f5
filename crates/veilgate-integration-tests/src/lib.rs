//! End-to-end integration tests for VeilGate
//!
//! These tests wire the HTTP ingress, redaction pipeline, and object
//! store layers together to verify the full read flow through the
//! gateway.

#[cfg(test)]
mod e2e_tests {
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::ServiceExt;
    use veilgate_ingress::TransformAdapter;
    use veilgate_pii::{DetectorRegistry, builtin};
    use veilgate_pipeline::{PipelineConfig, RedactionPipeline};
    use veilgate_store::{HttpObjectStore, HttpStoreConfig};
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path},
    };

    /// Gateway with an email detector, proxying to the mock upstream.
    fn gateway_for(server: &MockServer) -> Router {
        let store = HttpObjectStore::new(HttpStoreConfig {
            base_url: server.uri(),
            ..Default::default()
        })
        .unwrap();

        let mut registry = DetectorRegistry::new();
        registry
            .register(Arc::new(builtin::email().unwrap()))
            .unwrap();
        registry.seal();

        let pipeline = RedactionPipeline::new(
            Arc::new(store),
            Arc::new(registry),
            PipelineConfig::default(),
        )
        .unwrap();

        veilgate_ingress::router(Arc::new(TransformAdapter::new(Arc::new(pipeline))))
    }

    #[tokio::test]
    async fn test_e2e_redacted_read_through_gateway() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/docs/memo.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "Contact Alice at alice.wonderland@company.net today.",
                "text/plain",
            ))
            .mount(&mock_server)
            .await;

        let app = gateway_for(&mock_server);
        let request = Request::builder()
            .uri("/objects/docs/memo.txt")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "text/plain"
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"Contact Alice at [REDACTED_EMAIL] today.");
    }

    #[tokio::test]
    async fn test_e2e_missing_upstream_object() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/docs/gone.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let app = gateway_for(&mock_server);
        let request = Request::builder()
            .uri("/objects/docs/gone.txt")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "FETCH_NOT_FOUND");
        assert!(json["error"]["request_id"].is_string());
    }

    #[tokio::test]
    async fn test_e2e_denied_upstream_object() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/vault/secrets.txt"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&mock_server)
            .await;

        let app = gateway_for(&mock_server);
        let request = Request::builder()
            .uri("/objects/vault/secrets.txt")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "FETCH_ACCESS_DENIED");
    }

    #[tokio::test]
    async fn test_e2e_upstream_error_retries_then_502() {
        let mock_server = MockServer::start().await;

        // Both the initial fetch and the single retry must reach the
        // upstream before the gateway gives up.
        Mock::given(method("GET"))
            .and(path("/docs/flaky.txt"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&mock_server)
            .await;

        let app = gateway_for(&mock_server);
        let request = Request::builder()
            .uri("/objects/docs/flaky.txt")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "FETCH_TRANSIENT");
    }

    #[tokio::test]
    async fn test_e2e_range_request_reaches_upstream() {
        let mock_server = MockServer::start().await;

        // The upstream serves the requested window; the gateway scans the
        // window as an independent stream.
        Mock::given(method("GET"))
            .and(path("/docs/memo.txt"))
            .and(header("range", "bytes=17-51"))
            .respond_with(
                ResponseTemplate::new(206)
                    .set_body_raw("alice.wonderland@company.net today.", "text/plain"),
            )
            .mount(&mock_server)
            .await;

        let app = gateway_for(&mock_server);
        let request = Request::builder()
            .uri("/objects/docs/memo.txt")
            .header("range", "bytes=17-51")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"[REDACTED_EMAIL] today.");
    }
}
