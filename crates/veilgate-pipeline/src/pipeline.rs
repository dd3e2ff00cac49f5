//! Fetch, scan, emit
//!
//! One `RedactionPipeline` serves many invocations; each `run` call is
//! independent. A run either emits the complete redacted stream or returns
//! an error with nothing left half-done: mid-stream failures abort the run
//! and are never papered over with partially scanned output.

use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use thiserror::Error;
use tracing::debug;

use veilgate_core::{
    FetchError, FetchedObject, ObjectStore, RedactionReport, RequestContext, ResponseSink,
    SinkError,
};
use veilgate_pii::registry::DetectorRegistry;
use veilgate_pii::scanner::{ScanError, StreamScanner};

/// Why an invocation failed. `code` gives the stable machine-readable form
/// that ends up in error responses and metrics labels.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The store could not produce the object or its bytes.
    #[error("fetch failed: {0}")]
    FetchFailed(#[from] FetchError),

    /// A detector misbehaved mid-scan.
    #[error(transparent)]
    DetectorFault(#[from] ScanError),

    /// The sink rejected a write.
    #[error("emit failed: {0}")]
    SinkWriteFailed(#[from] SinkError),

    /// The invocation exceeded its deadline.
    #[error("invocation timed out after {0:?}")]
    Timeout(Duration),

    /// The pipeline was built with an invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::FetchFailed(FetchError::NotFound(_)) => "FETCH_NOT_FOUND",
            PipelineError::FetchFailed(FetchError::AccessDenied(_)) => "FETCH_ACCESS_DENIED",
            PipelineError::FetchFailed(FetchError::Transient(_)) => "FETCH_TRANSIENT",
            PipelineError::DetectorFault(_) => "DETECTOR_FAULT",
            PipelineError::SinkWriteFailed(_) => "SINK_WRITE_FAILED",
            PipelineError::Timeout(_) => "TIMEOUT",
            PipelineError::Config(_) => "CONFIG",
        }
    }

    /// True only for fetch failures a fresh attempt could fix.
    pub fn is_transient_fetch(&self) -> bool {
        matches!(self, PipelineError::FetchFailed(e) if e.is_transient())
    }
}

/// Tunables for a pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Bytes accumulated from the store before each scan call
    pub chunk_size: usize,
    /// End-to-end deadline for one invocation
    pub timeout: Duration,
    /// Optional wall-clock budget per scan call
    pub scan_budget: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 64 * 1024,
            timeout: Duration::from_secs(30),
            scan_budget: None,
        }
    }
}

impl PipelineConfig {
    /// Scan chunks must be able to hold at least one full pattern, so every
    /// scan call can make forward progress past the carried suffix.
    pub fn validate(&self, max_pattern_len: usize) -> Result<(), PipelineError> {
        if self.chunk_size == 0 {
            return Err(PipelineError::Config(
                "chunk_size must be positive".to_string(),
            ));
        }
        if self.chunk_size <= max_pattern_len {
            return Err(PipelineError::Config(format!(
                "chunk_size {} must exceed the longest declared pattern bound {}",
                self.chunk_size, max_pattern_len
            )));
        }
        if self.timeout.is_zero() {
            return Err(PipelineError::Config(
                "timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// The redaction pipeline: fetch, scan, emit.
pub struct RedactionPipeline {
    store: Arc<dyn ObjectStore>,
    registry: Arc<DetectorRegistry>,
    config: PipelineConfig,
}

impl RedactionPipeline {
    /// The registry must already be sealed; a serving pipeline never
    /// observes detector-set changes.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        registry: Arc<DetectorRegistry>,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        if !registry.is_sealed() {
            return Err(PipelineError::Config(
                "detector registry must be sealed before serving".to_string(),
            ));
        }
        config.validate(registry.max_pattern_len())?;
        Ok(Self {
            store,
            registry,
            config,
        })
    }

    /// Run one redacting invocation against the sink.
    ///
    /// On success every redacted byte has been written through
    /// `write_chunk` and the returned report describes the run. On error
    /// the sink may have received a prefix of the output; the caller is
    /// responsible for the terminal `fail` call.
    pub async fn run(
        &self,
        ctx: &RequestContext,
        sink: &mut dyn ResponseSink,
    ) -> Result<RedactionReport, PipelineError> {
        self.run_inner(ctx, sink, true).await
    }

    /// Stream the object through unmodified. Used for reads the redaction
    /// policy exempts; the deadline and error taxonomy still apply.
    pub async fn run_passthrough(
        &self,
        ctx: &RequestContext,
        sink: &mut dyn ResponseSink,
    ) -> Result<RedactionReport, PipelineError> {
        self.run_inner(ctx, sink, false).await
    }

    async fn run_inner(
        &self,
        ctx: &RequestContext,
        sink: &mut dyn ResponseSink,
        redact: bool,
    ) -> Result<RedactionReport, PipelineError> {
        match tokio::time::timeout(self.config.timeout, self.execute(ctx, sink, redact)).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout(self.config.timeout)),
        }
    }

    async fn execute(
        &self,
        ctx: &RequestContext,
        sink: &mut dyn ResponseSink,
        redact: bool,
    ) -> Result<RedactionReport, PipelineError> {
        debug!(
            "Fetching {} for request {} (redact: {})",
            ctx.object_id, ctx.request_id, redact
        );
        let FetchedObject {
            metadata,
            mut stream,
        } = self.store.fetch(&ctx.object_id, ctx.range.as_ref()).await?;

        sink.begin(&metadata).await?;

        let mut report = RedactionReport::default();
        let mut scanner = if redact {
            let mut scanner = StreamScanner::new(self.registry.clone());
            if let Some(budget) = self.config.scan_budget {
                scanner = scanner.with_scan_budget(budget);
            }
            Some(scanner)
        } else {
            None
        };
        let mut pending = BytesMut::new();

        while let Some(item) = stream.next().await {
            let bytes = item?;
            report.bytes_in += bytes.len() as u64;

            match scanner.as_mut() {
                Some(scanner) => {
                    pending.extend_from_slice(&bytes);
                    while pending.len() >= self.config.chunk_size {
                        let piece = pending.split_to(self.config.chunk_size);
                        let out = scanner.scan_chunk(&piece)?;
                        write_out(sink, out, &mut report).await?;
                    }
                }
                None => write_out(sink, bytes, &mut report).await?,
            }
        }

        if let Some(scanner) = scanner.as_mut() {
            if !pending.is_empty() {
                let out = scanner.scan_chunk(&pending)?;
                write_out(sink, out, &mut report).await?;
            }
            let tail = scanner.finish()?;
            write_out(sink, tail, &mut report).await?;
            report.redactions = scanner.counts();
        }

        debug!(
            "Request {} emitted {} bytes in {} chunk(s), {} redaction(s)",
            ctx.request_id,
            report.bytes_out,
            report.chunks_emitted,
            report.total_redactions()
        );
        Ok(report)
    }
}

async fn write_out(
    sink: &mut dyn ResponseSink,
    chunk: Bytes,
    report: &mut RedactionReport,
) -> Result<(), PipelineError> {
    if chunk.is_empty() {
        return Ok(());
    }
    report.bytes_out += chunk.len() as u64;
    report.chunks_emitted += 1;
    sink.write_chunk(chunk).await?;
    Ok(())
}
