//! Transform invocation adapter
//!
//! Bridges transport events to pipeline runs. The adapter owns the
//! terminal-call discipline: exactly one `complete` or `fail` per
//! invocation, a single retry for transient fetch failures that happen
//! before any output, and the scan-or-passthrough decision.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info, warn};

use veilgate_core::{RedactionReport, RequestContext, ResponseMetadata, ResponseSink, SinkError};
use veilgate_observability::Metrics;
use veilgate_pipeline::{PipelineError, RedactionPipeline};

use crate::event::ReadEvent;

/// Which objects get scanned.
///
/// The default scans everything. A configured extension list narrows the
/// scan to matching keys; everything else streams through unredacted.
#[derive(Debug, Clone, Default)]
pub struct RedactionPolicy {
    extensions: Option<Vec<String>>,
}

impl RedactionPolicy {
    /// Scan every object regardless of key.
    pub fn scan_all() -> Self {
        Self { extensions: None }
    }

    /// Scan only objects whose key ends in one of `extensions`
    /// (case-insensitive, with or without a leading dot).
    pub fn scan_extensions(extensions: Vec<String>) -> Self {
        Self {
            extensions: Some(
                extensions
                    .iter()
                    .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                    .collect(),
            ),
        }
    }

    /// Whether an object key is subject to redaction.
    pub fn should_redact(&self, object_key: &str) -> bool {
        match &self.extensions {
            None => true,
            Some(list) => match extension_of(object_key) {
                Some(ext) => list.iter().any(|e| *e == ext),
                None => false,
            },
        }
    }
}

fn extension_of(key: &str) -> Option<String> {
    let name = key.rsplit('/').next()?;
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Marshals read events into pipeline invocations.
///
/// One adapter serves many transports concurrently; all state is per-call.
pub struct TransformAdapter {
    pipeline: Arc<RedactionPipeline>,
    policy: RedactionPolicy,
    metrics: Option<Arc<Metrics>>,
}

impl TransformAdapter {
    pub fn new(pipeline: Arc<RedactionPipeline>) -> Self {
        Self {
            pipeline,
            policy: RedactionPolicy::default(),
            metrics: None,
        }
    }

    pub fn with_policy(mut self, policy: RedactionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Handle one read event against the sink.
    ///
    /// Exactly one terminal call lands on the sink: `complete` on success,
    /// `fail(code, message)` on error. A transient fetch failure is retried
    /// once, but only while nothing has been written. The failure message
    /// never contains object content.
    pub async fn handle(
        &self,
        event: &ReadEvent,
        sink: &mut dyn ResponseSink,
    ) -> Result<RedactionReport, PipelineError> {
        let started = Instant::now();
        let redact = self.policy.should_redact(&event.object_key);
        let mode = if redact { "scanned" } else { "passthrough" };
        let ctx = event.context();
        debug!(
            "Handling request {} for {} ({})",
            ctx.request_id, ctx.object_id, mode
        );

        let mut guard = SinkGuard::new(sink);
        let mut outcome = self.run_once(&ctx, &mut guard, redact).await;

        let should_retry = matches!(&outcome, Err(err) if err.is_transient_fetch())
            && !guard.wrote_output();
        if should_retry {
            debug!("Retrying transient fetch for request {}", ctx.request_id);
            if let Some(metrics) = &self.metrics {
                metrics.record_fetch_retry();
            }
            outcome = self.run_once(&ctx, &mut guard, redact).await;
        }

        let duration = started.elapsed().as_secs_f64();
        match outcome {
            Ok(report) => {
                if let Err(sink_err) = guard.complete().await {
                    // Terminal already attempted; no fail() on top of it.
                    let err = PipelineError::SinkWriteFailed(sink_err);
                    if let Some(metrics) = &self.metrics {
                        metrics.record_request_failure(mode, err.code(), duration);
                    }
                    warn!(
                        "Request {}: sink rejected completion: {}",
                        ctx.request_id, err
                    );
                    return Err(err);
                }
                if let Some(metrics) = &self.metrics {
                    metrics.record_request_success(mode, &report, duration);
                }
                info!(
                    "Request {} done: {} bytes in, {} bytes out, {} redactions ({})",
                    ctx.request_id,
                    report.bytes_in,
                    report.bytes_out,
                    report.total_redactions(),
                    mode
                );
                Ok(report)
            }
            Err(err) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_request_failure(mode, err.code(), duration);
                }
                warn!(
                    "Request {} failed: {} ({})",
                    ctx.request_id,
                    err,
                    err.code()
                );
                if let Err(sink_err) = guard.fail(err.code(), &err.to_string()).await {
                    warn!(
                        "Request {}: sink rejected terminal failure: {}",
                        ctx.request_id, sink_err
                    );
                }
                Err(err)
            }
        }
    }

    async fn run_once(
        &self,
        ctx: &RequestContext,
        sink: &mut SinkGuard<'_>,
        redact: bool,
    ) -> Result<RedactionReport, PipelineError> {
        if redact {
            self.pipeline.run(ctx, sink).await
        } else {
            self.pipeline.run_passthrough(ctx, sink).await
        }
    }
}

/// Wraps the caller's sink for the retry window.
///
/// Tracks whether output has escaped (which forbids retry) and swallows
/// the second `begin` a retried run would otherwise issue, keeping the
/// sink's at-most-once `begin` contract intact across attempts.
struct SinkGuard<'a> {
    inner: &'a mut dyn ResponseSink,
    begun: bool,
    writes: usize,
}

impl<'a> SinkGuard<'a> {
    fn new(inner: &'a mut dyn ResponseSink) -> Self {
        Self {
            inner,
            begun: false,
            writes: 0,
        }
    }

    fn wrote_output(&self) -> bool {
        self.writes > 0
    }
}

#[async_trait]
impl ResponseSink for SinkGuard<'_> {
    async fn begin(&mut self, metadata: &ResponseMetadata) -> Result<(), SinkError> {
        if self.begun {
            return Ok(());
        }
        self.begun = true;
        self.inner.begin(metadata).await
    }

    async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        // Counted before the attempt: a failed write still forbids retry.
        self.writes += 1;
        self.inner.write_chunk(chunk).await
    }

    async fn complete(&mut self) -> Result<(), SinkError> {
        self.inner.complete().await
    }

    async fn fail(&mut self, code: &str, message: &str) -> Result<(), SinkError> {
        self.inner.fail(code, message).await
    }
}
