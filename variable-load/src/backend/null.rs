use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::Bytes;

use super::Backend;
use crate::error::{BackendError, BackendResult};

/// A backend that completes every write immediately without doing any I/O.
///
/// Used for dry runs, where only the pacing is of interest.
#[derive(Debug, Default)]
pub struct NullBackend {
    writes: AtomicU64,
    closed: AtomicBool,
}

impl NullBackend {
    /// Creates a new null backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of writes accepted so far.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl Backend for NullBackend {
    fn name(&self) -> &'static str {
        "null"
    }

    async fn open_pool(&self, _pool: &str) -> BackendResult<()> {
        Ok(())
    }

    async fn write_object(&self, _pool: &str, _object: &str, _payload: Bytes) -> BackendResult<()> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(BackendError::Closed(self.name()));
        }
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn close(&self) -> BackendResult<()> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}
