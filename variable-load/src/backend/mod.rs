//! Storage backends that operations are issued against.
//!
//! The scheduler treats a backend as an opaque sink for asynchronous writes. A backend is
//! [`connect`]ed once per process, a pool is opened on it with [`IoContext::open`], and the
//! resulting context is shared by all workloads until they have stopped.

use std::fmt::Debug;
use std::sync::Arc;

use bytes::Bytes;

use crate::config::Storage;
use crate::error::BackendResult;

mod in_memory;
mod local_fs;
mod null;

pub use in_memory::InMemoryBackend;
pub use local_fs::LocalFs;
pub use null::NullBackend;

/// Shared handle to a [`Backend`].
pub type SharedBackend = Arc<dyn Backend>;

/// A storage system that accepts asynchronous object writes.
#[async_trait::async_trait]
pub trait Backend: Debug + Send + Sync + 'static {
    /// The backend name, used in logs.
    fn name(&self) -> &'static str;

    /// Prepares the namespace `pool` for writes.
    async fn open_pool(&self, pool: &str) -> BackendResult<()>;

    /// Writes `payload` to `object` within `pool`, replacing previous contents.
    async fn write_object(&self, pool: &str, object: &str, payload: Bytes) -> BackendResult<()>;

    /// Releases all resources. Writes after closing fail.
    async fn close(&self) -> BackendResult<()>;
}

/// Creates the backend described by `storage`.
pub async fn connect(storage: &Storage) -> BackendResult<SharedBackend> {
    let backend: SharedBackend = match storage {
        Storage::FileSystem { path } => Arc::new(LocalFs::connect(path).await?),
        Storage::Memory { latency } => Arc::new(InMemoryBackend::with_latency(*latency)),
    };

    tracing::debug!(backend = backend.name(), "connected to storage");
    Ok(backend)
}

/// A pool opened on a backend, shared by all workloads.
#[derive(Clone, Debug)]
pub struct IoContext {
    backend: SharedBackend,
    pool: Arc<str>,
}

impl IoContext {
    /// Opens `pool` on the given backend.
    pub async fn open(backend: SharedBackend, pool: &str) -> BackendResult<Self> {
        backend.open_pool(pool).await?;
        Ok(Self {
            backend,
            pool: pool.into(),
        })
    }

    /// Writes `payload` to `object` within this pool.
    pub async fn write(&self, object: &str, payload: Bytes) -> BackendResult<()> {
        self.backend.write_object(&self.pool, object, payload).await
    }

    /// The name of the opened pool.
    pub fn pool(&self) -> &str {
        &self.pool
    }

    /// The backend this context writes to.
    pub fn backend(&self) -> &SharedBackend {
        &self.backend
    }
}
