//! In-memory backend.
//!
//! Keeps the latest payload of every object in a `HashMap`. An optional artificial latency
//! delays every write, which makes it possible to exercise the scheduler's concurrency and
//! backlog limits without real storage. The backend is [`Clone`] so tests can hold a handle
//! for inspection while the workloads share another.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use super::Backend;
use crate::error::{BackendError, BackendResult};

type Store = HashMap<(String, String), Bytes>;

/// A backend keeping all objects in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    latency: Duration,
    store: Arc<Mutex<Store>>,
    writes: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
}

impl InMemoryBackend {
    /// Creates a backend that completes writes immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend that takes `latency` to complete every write.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Default::default()
        }
    }

    /// Returns the stored payload of an object, if present.
    pub fn get(&self, pool: &str, object: &str) -> Option<Bytes> {
        let key = (pool.to_owned(), object.to_owned());
        self.store.lock().unwrap().get(&key).cloned()
    }

    /// The number of distinct objects written.
    pub fn len(&self) -> usize {
        self.store.lock().unwrap().len()
    }

    /// Returns `true` if nothing was written yet.
    pub fn is_empty(&self) -> bool {
        self.store.lock().unwrap().is_empty()
    }

    /// The total number of completed writes.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Returns `true` after the backend was closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl Backend for InMemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn open_pool(&self, _pool: &str) -> BackendResult<()> {
        Ok(())
    }

    async fn write_object(&self, pool: &str, object: &str, payload: Bytes) -> BackendResult<()> {
        if self.is_closed() {
            return Err(BackendError::Closed(self.name()));
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.store
            .lock()
            .unwrap()
            .insert((pool.to_owned(), object.to_owned()), payload);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn close(&self) -> BackendResult<()> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}
