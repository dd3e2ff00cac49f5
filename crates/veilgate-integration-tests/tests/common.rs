//! Common test utilities for integration tests

use std::sync::Arc;

use axum::Router;
use axum::response::Response;
use veilgate_core::ObjectStore;
use veilgate_ingress::{RedactionPolicy, TransformAdapter};
use veilgate_observability::Metrics;
use veilgate_pii::{DetectorRegistry, builtin};
use veilgate_pipeline::{PipelineConfig, RedactionPipeline};

/// Sealed registry holding the named built-in detectors.
#[allow(dead_code)]
pub fn registry_with(names: &[&str]) -> Arc<DetectorRegistry> {
    let mut registry = DetectorRegistry::new();
    for name in names {
        let detector = builtin::by_name(name)
            .unwrap_or_else(|| panic!("unknown detector {name}"))
            .unwrap();
        registry.register(Arc::new(detector)).unwrap();
    }
    registry.seal();
    Arc::new(registry)
}

#[allow(dead_code)]
pub fn pipeline_over(
    store: Arc<dyn ObjectStore>,
    detectors: &[&str],
) -> Arc<RedactionPipeline> {
    let pipeline =
        RedactionPipeline::new(store, registry_with(detectors), PipelineConfig::default())
            .unwrap();
    Arc::new(pipeline)
}

/// Gateway over the given store with the email detector enabled.
#[allow(dead_code)]
pub fn build_app(store: Arc<dyn ObjectStore>) -> Router {
    veilgate_ingress::router(Arc::new(TransformAdapter::new(pipeline_over(
        store,
        &["email"],
    ))))
}

#[allow(dead_code)]
pub fn build_app_with_detectors(store: Arc<dyn ObjectStore>, detectors: &[&str]) -> Router {
    veilgate_ingress::router(Arc::new(TransformAdapter::new(pipeline_over(
        store, detectors,
    ))))
}

#[allow(dead_code)]
pub fn build_app_with_policy(store: Arc<dyn ObjectStore>, policy: RedactionPolicy) -> Router {
    let adapter = TransformAdapter::new(pipeline_over(store, &["email"])).with_policy(policy);
    veilgate_ingress::router(Arc::new(adapter))
}

#[allow(dead_code)]
pub fn build_app_with_metrics(store: Arc<dyn ObjectStore>, metrics: Arc<Metrics>) -> Router {
    let adapter = TransformAdapter::new(pipeline_over(store, &["email"])).with_metrics(metrics);
    veilgate_ingress::router(Arc::new(adapter))
}

/// Drains a response body into a byte vector.
#[allow(dead_code)]
pub async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}
