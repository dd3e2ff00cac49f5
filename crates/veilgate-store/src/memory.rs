//! In-memory object store
//!
//! Backs tests and demos. Objects live in a map as `Bytes` and are streamed
//! back in a configurable yield size so consumers can exercise arbitrary
//! store-side chunking. Failure injection hooks cover the denied and
//! transient fetch paths.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;

use veilgate_core::{
    ByteRange, FetchError, FetchedObject, ObjectId, ObjectStore, ResponseMetadata,
};

const DEFAULT_YIELD_SIZE: usize = 8 * 1024;

struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
}

#[derive(Default)]
struct Inner {
    objects: HashMap<String, StoredObject>,
    denied: HashSet<String>,
    transient_failures: HashMap<String, u32>,
}

/// Map-backed store with controllable streaming granularity.
pub struct MemoryObjectStore {
    inner: Mutex<Inner>,
    yield_size: usize,
    fetches: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            yield_size: DEFAULT_YIELD_SIZE,
            fetches: AtomicUsize::new(0),
        }
    }

    /// Sets how many bytes each stream item carries (minimum 1).
    pub fn with_yield_size(mut self, yield_size: usize) -> Self {
        self.yield_size = yield_size.max(1);
        self
    }

    pub fn insert(&self, id: impl Into<String>, data: impl Into<Bytes>) {
        self.insert_object(id.into(), data.into(), None);
    }

    pub fn insert_with_content_type(
        &self,
        id: impl Into<String>,
        data: impl Into<Bytes>,
        content_type: impl Into<String>,
    ) {
        self.insert_object(id.into(), data.into(), Some(content_type.into()));
    }

    fn insert_object(&self, id: String, data: Bytes, content_type: Option<String>) {
        let mut inner = self.inner.lock().unwrap();
        inner.objects.insert(id, StoredObject { data, content_type });
    }

    /// Marks an object as access-denied regardless of whether it exists.
    pub fn deny(&self, id: impl Into<String>) {
        let mut inner = self.inner.lock().unwrap();
        inner.denied.insert(id.into());
    }

    /// Makes the next `times` fetches of `id` fail with a transient error.
    pub fn fail_transient(&self, id: impl Into<String>, times: u32) {
        let mut inner = self.inner.lock().unwrap();
        inner.transient_failures.insert(id.into(), times);
    }

    /// Total fetch attempts, including failed ones.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn fetch(
        &self,
        id: &ObjectId,
        range: Option<&ByteRange>,
    ) -> Result<FetchedObject, FetchError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);

        let (data, metadata) = {
            let mut inner = self.inner.lock().unwrap();

            if let Some(times) = inner.transient_failures.get_mut(id.as_str())
                && *times > 0
            {
                *times -= 1;
                return Err(FetchError::Transient(format!(
                    "injected transient failure for {}",
                    id
                )));
            }

            if inner.denied.contains(id.as_str()) {
                return Err(FetchError::AccessDenied(id.clone()));
            }

            let object = inner
                .objects
                .get(id.as_str())
                .ok_or_else(|| FetchError::NotFound(id.clone()))?;

            let data = match range {
                Some(range) => slice_range(&object.data, range),
                None => object.data.clone(),
            };
            let metadata = ResponseMetadata {
                content_type: object.content_type.clone(),
            };
            (data, metadata)
        };

        let mut pieces = Vec::new();
        let mut offset = 0;
        while offset < data.len() {
            let end = (offset + self.yield_size).min(data.len());
            pieces.push(Ok(data.slice(offset..end)));
            offset = end;
        }

        Ok(FetchedObject {
            metadata,
            stream: Box::new(stream::iter(pieces)),
        })
    }
}

/// Inclusive-end range slice, clamped to the object length.
fn slice_range(data: &Bytes, range: &ByteRange) -> Bytes {
    let len = data.len() as u64;
    let start = range.start.min(len);
    let end = match range.end {
        Some(end) => end.saturating_add(1).min(len),
        None => len,
    };
    data.slice(start as usize..end.max(start) as usize)
}
