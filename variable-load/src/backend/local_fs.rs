use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};

use super::Backend;
use crate::error::BackendResult;

/// Writes objects as files below a root directory, one subdirectory per pool.
#[derive(Debug)]
pub struct LocalFs {
    path: PathBuf,
}

impl LocalFs {
    /// Creates the root directory if needed and returns the backend.
    pub async fn connect(path: &Path) -> BackendResult<Self> {
        tokio::fs::create_dir_all(path).await?;
        Ok(Self { path: path.into() })
    }
}

#[async_trait::async_trait]
impl Backend for LocalFs {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    async fn open_pool(&self, pool: &str) -> BackendResult<()> {
        tokio::fs::create_dir_all(self.path.join(pool)).await?;
        Ok(())
    }

    async fn write_object(&self, pool: &str, object: &str, payload: Bytes) -> BackendResult<()> {
        let path = self.path.join(pool).join(object);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .await?;

        let mut writer = BufWriter::new(file);
        writer.write_all(&payload).await?;
        writer.flush().await?;
        let file = writer.into_inner();
        file.sync_data().await?;

        Ok(())
    }

    async fn close(&self) -> BackendResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn overwrites_objects() {
        let tempdir = tempfile::tempdir().unwrap();
        let backend = LocalFs::connect(&tempdir.path().join("data")).await.unwrap();
        backend.open_pool("test").await.unwrap();

        backend
            .write_object("test", "test_object_1", Bytes::from_static(b"first write"))
            .await
            .unwrap();
        backend
            .write_object("test", "test_object_1", Bytes::from_static(b"second"))
            .await
            .unwrap();

        let path = tempdir.path().join("data/test/test_object_1");
        assert_eq!(std::fs::read(path).unwrap(), b"second");
    }

    #[tokio::test]
    async fn fails_without_pool() {
        let tempdir = tempfile::tempdir().unwrap();
        let backend = LocalFs::connect(tempdir.path()).await.unwrap();

        let result = backend
            .write_object("missing", "object", Bytes::from_static(b"data"))
            .await;
        assert!(result.is_err());
    }
}
