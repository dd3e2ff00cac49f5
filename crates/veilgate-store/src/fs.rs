//! Filesystem object store
//!
//! Serves objects from a root directory, with the object id interpreted as a
//! relative path under it. Ids containing parent or absolute components are
//! rejected as access-denied before any filesystem call.

use std::io::SeekFrom;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use veilgate_core::{
    ByteRange, FetchError, FetchedObject, ObjectId, ObjectStore, ResponseMetadata,
};

const DEFAULT_READ_SIZE: usize = 64 * 1024;

/// Store rooted at a directory on the local filesystem.
pub struct FsObjectStore {
    root: PathBuf,
    read_size: usize,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            read_size: DEFAULT_READ_SIZE,
        }
    }

    /// Sets the read buffer size, which bounds the stream's chunk size.
    pub fn with_read_size(mut self, read_size: usize) -> Self {
        self.read_size = read_size.max(1);
        self
    }

    fn resolve(&self, id: &ObjectId) -> Result<PathBuf, FetchError> {
        let key = id.as_str();
        if key.is_empty() {
            return Err(FetchError::NotFound(id.clone()));
        }
        let relative = Path::new(key);
        let clean = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if !clean {
            return Err(FetchError::AccessDenied(id.clone()));
        }
        Ok(self.root.join(relative))
    }
}

struct ReadState {
    file: File,
    remaining: u64,
    read_size: usize,
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn fetch(
        &self,
        id: &ObjectId,
        range: Option<&ByteRange>,
    ) -> Result<FetchedObject, FetchError> {
        let path = self.resolve(id)?;

        let mut file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FetchError::NotFound(id.clone()));
            }
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(FetchError::AccessDenied(id.clone()));
            }
            Err(e) => {
                return Err(FetchError::Transient(format!(
                    "failed to open {}: {}",
                    id, e
                )));
            }
        };

        let meta = file
            .metadata()
            .await
            .map_err(|e| FetchError::Transient(format!("failed to stat {}: {}", id, e)))?;
        if meta.is_dir() {
            return Err(FetchError::NotFound(id.clone()));
        }
        let len = meta.len();

        let (start, remaining) = match range {
            Some(range) => {
                let start = range.start.min(len);
                let end = match range.end {
                    Some(end) => end.saturating_add(1).min(len),
                    None => len,
                };
                (start, end.saturating_sub(start))
            }
            None => (0, len),
        };
        if start > 0 {
            file.seek(SeekFrom::Start(start))
                .await
                .map_err(|e| FetchError::Transient(format!("failed to seek {}: {}", id, e)))?;
        }
        debug!("Serving {} from {} ({} bytes)", id, path.display(), remaining);

        let state = ReadState {
            file,
            remaining,
            read_size: self.read_size,
        };
        let stream = stream::unfold(state, |mut state| async move {
            if state.remaining == 0 {
                return None;
            }
            let cap = u64::min(state.read_size as u64, state.remaining) as usize;
            let mut buf = vec![0u8; cap];
            match state.file.read(&mut buf).await {
                Ok(0) => None,
                Ok(n) => {
                    buf.truncate(n);
                    state.remaining -= n as u64;
                    Some((Ok(Bytes::from(buf)), state))
                }
                Err(e) => {
                    state.remaining = 0;
                    Some((
                        Err(FetchError::Transient(format!("read failed: {}", e))),
                        state,
                    ))
                }
            }
        });

        Ok(FetchedObject {
            metadata: ResponseMetadata {
                content_type: Some(content_type_for(&path).to_string()),
            },
            stream: Box::new(Box::pin(stream)),
        })
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("txt") | Some("log") | Some("md") => "text/plain",
        Some("json") => "application/json",
        Some("csv") => "text/csv",
        Some("html") | Some("htm") => "text/html",
        Some("xml") => "application/xml",
        _ => "application/octet-stream",
    }
}
