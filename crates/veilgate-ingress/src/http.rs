//! HTTP read surface
//!
//! `GET /objects/{*key}` streams the redacted object. The response head is
//! held back until the first redacted chunk, so failures before any output
//! map to real statuses; failures after that poison the body stream and the
//! transfer aborts instead of passing a truncated read off as success.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use futures::SinkExt;
use futures::channel::{mpsc, oneshot};
use serde_json::json;
use tracing::debug;

use veilgate_core::{RequestId, ResponseMetadata, ResponseSink, SinkError};

use crate::adapter::TransformAdapter;
use crate::event::ReadEvent;

/// Chunks buffered between the pipeline and the HTTP transfer. Writes past
/// this block until the client drains, which backpressures the whole run.
const BODY_CHANNEL_CAPACITY: usize = 16;

/// Shared state for the read route.
#[derive(Clone)]
pub struct HttpState {
    pub adapter: Arc<TransformAdapter>,
}

/// Build the object read router.
pub fn router(adapter: Arc<TransformAdapter>) -> Router {
    Router::new()
        .route("/objects/{*key}", get(read_object))
        .with_state(HttpState { adapter })
}

async fn read_object(
    State(state): State<HttpState>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Response {
    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    let event = ReadEvent::from_http(&key, range);
    let request_id = event.request_id.clone();
    debug!(
        "GET /objects/{} (request {})",
        event.object_key, request_id
    );

    let (mut sink, head_rx) = HttpSink::new();
    let adapter = state.adapter.clone();
    tokio::spawn(async move {
        // The outcome lands on the sink; logging and metrics happen inside.
        let _ = adapter.handle(&event, &mut sink).await;
    });

    match head_rx.await {
        Ok(ResponseHead::Success { metadata, body }) => {
            let mut response = Response::builder().status(StatusCode::OK);
            if let Some(content_type) = &metadata.content_type {
                response = response.header(header::CONTENT_TYPE, content_type);
            }
            response
                .body(Body::from_stream(body))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Ok(ResponseHead::Failure { code, message }) => {
            error_response(&code, &message, &request_id)
        }
        Err(_) => error_response(
            "INTERNAL",
            "response channel closed before a terminal call",
            &request_id,
        ),
    }
}

fn status_for_code(code: &str) -> StatusCode {
    match code {
        "FETCH_NOT_FOUND" => StatusCode::NOT_FOUND,
        "FETCH_ACCESS_DENIED" => StatusCode::FORBIDDEN,
        "FETCH_TRANSIENT" => StatusCode::BAD_GATEWAY,
        "TIMEOUT" => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(code: &str, message: &str, request_id: &RequestId) -> Response {
    let status = status_for_code(code);
    let body = json!({
        "error": {
            "message": message,
            "code": code,
            "request_id": request_id.to_string(),
        }
    });
    (status, Json(body)).into_response()
}

/// What the handler learns about the response before streaming starts.
enum ResponseHead {
    Success {
        metadata: ResponseMetadata,
        body: mpsc::Receiver<Result<Bytes, io::Error>>,
    },
    Failure {
        code: String,
        message: String,
    },
}

/// Sink that turns pipeline output into an HTTP response.
///
/// The head channel is resolved exactly once: on the first written chunk,
/// on a zero-chunk `complete`, or on a pre-stream `fail`. After the head
/// is committed a `fail` can only poison the body stream.
struct HttpSink {
    head: Option<oneshot::Sender<ResponseHead>>,
    metadata: Option<ResponseMetadata>,
    body: Option<mpsc::Sender<Result<Bytes, io::Error>>>,
}

impl HttpSink {
    fn new() -> (Self, oneshot::Receiver<ResponseHead>) {
        let (head_tx, head_rx) = oneshot::channel();
        (
            Self {
                head: Some(head_tx),
                metadata: None,
                body: None,
            },
            head_rx,
        )
    }

    /// Commit a success head, returning the body sender.
    fn release_head(&mut self, head: oneshot::Sender<ResponseHead>) -> Result<(), SinkError> {
        let (tx, rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
        let metadata = self.metadata.take().unwrap_or_default();
        head.send(ResponseHead::Success { metadata, body: rx })
            .map_err(|_| SinkError::Closed)?;
        self.body = Some(tx);
        Ok(())
    }
}

#[async_trait]
impl ResponseSink for HttpSink {
    async fn begin(&mut self, metadata: &ResponseMetadata) -> Result<(), SinkError> {
        self.metadata = Some(metadata.clone());
        Ok(())
    }

    async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        if let Some(head) = self.head.take() {
            self.release_head(head)?;
        }
        match self.body.as_mut() {
            Some(tx) => tx.send(Ok(chunk)).await.map_err(|_| SinkError::Closed),
            None => Err(SinkError::Closed),
        }
    }

    async fn complete(&mut self) -> Result<(), SinkError> {
        if let Some(head) = self.head.take() {
            // Zero chunks were written; commit the head with an empty body.
            self.release_head(head)?;
        }
        // Dropping the sender ends the body stream cleanly.
        self.body = None;
        Ok(())
    }

    async fn fail(&mut self, code: &str, message: &str) -> Result<(), SinkError> {
        if let Some(head) = self.head.take() {
            let _ = head.send(ResponseHead::Failure {
                code: code.to_string(),
                message: message.to_string(),
            });
            return Ok(());
        }
        // Head already committed: abort the in-flight transfer.
        if let Some(tx) = self.body.as_mut() {
            let _ = tx
                .send(Err(io::Error::other(format!("{code}: {message}"))))
                .await;
        }
        self.body = None;
        Ok(())
    }
}
