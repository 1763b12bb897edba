use crate::error::AppError;
use crate::models::file_types::DisplayHandle;
use crate::services::thumbnail_service;
use base64::Engine;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

struct DisplaySource {
    mime_type: String,
    bytes: Arc<[u8]>,
}

#[derive(Default)]
struct DisplayInner {
    next: u64,
    live: HashMap<u64, DisplaySource>,
    created: u64,
    released: u64,
}

/// Issues and revokes display handles for held file content.
///
/// Every handle handed out by [`DisplayStore::create`] must be released exactly
/// once. Releasing an unknown or already-released handle is a no-op, so the
/// created/released counters stay paired.
#[derive(Clone, Default)]
pub struct DisplayStore {
    inner: Arc<Mutex<DisplayInner>>,
}

impl DisplayStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, DisplayInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create(&self, mime_type: &str, bytes: Arc<[u8]>) -> DisplayHandle {
        let mut inner = self.lock();
        inner.next += 1;
        let id = inner.next;
        inner.live.insert(
            id,
            DisplaySource {
                mime_type: mime_type.to_string(),
                bytes,
            },
        );
        inner.created += 1;
        DisplayHandle(id)
    }

    /// Returns `true` if the handle was live and is now revoked.
    pub fn release(&self, handle: DisplayHandle) -> bool {
        let mut inner = self.lock();
        if inner.live.remove(&handle.0).is_some() {
            inner.released += 1;
            true
        } else {
            false
        }
    }

    pub fn is_live(&self, handle: DisplayHandle) -> bool {
        self.lock().live.contains_key(&handle.0)
    }

    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    pub fn created_count(&self) -> u64 {
        self.lock().created
    }

    pub fn released_count(&self) -> u64 {
        self.lock().released
    }

    /// Inline `data:` URI for the full content behind a live handle.
    pub fn data_uri(&self, handle: DisplayHandle) -> Option<String> {
        let inner = self.lock();
        let source = inner.live.get(&handle.0)?;
        let b64 = base64::engine::general_purpose::STANDARD.encode(&source.bytes);
        Some(format!("data:{};base64,{}", source.mime_type, b64))
    }

    /// JPEG preview bytes for a live handle.
    pub fn thumbnail(&self, handle: DisplayHandle) -> Result<Vec<u8>, AppError> {
        // Clone the bytes out so decoding happens without holding the lock.
        let bytes = {
            let inner = self.lock();
            let source = inner
                .live
                .get(&handle.0)
                .ok_or_else(|| AppError::Other(format!("display handle {} was released", handle.0)))?;
            Arc::clone(&source.bytes)
        };
        thumbnail_service::generate_thumbnail_bytes(&bytes)
    }
}
