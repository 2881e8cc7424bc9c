//! Directory sink used by the replay binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{decode_data_uri, AssetSink};
use crate::error::Result;

pub struct FsSink {
    root: PathBuf,
}

impl FsSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Target path for `filename`; `:` from archive timestamps is not
    /// portable and becomes `-`.
    fn path(&self, filename: &str) -> PathBuf {
        self.root.join(filename.replace(':', "-"))
    }

    async fn write(&self, filename: &str, bytes: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.path(filename);
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(path = %path.display(), len = bytes.len(), "wrote asset");
        Ok(())
    }
}

impl AssetSink for FsSink {
    async fn write_text(&self, filename: &str, content: &str) -> Result<()> {
        self.write(filename, content.as_bytes()).await
    }

    async fn write_image(&self, filename: &str, url: &str) -> Result<()> {
        let bytes = decode_data_uri(url)?;
        self.write(filename, &bytes).await
    }

    async fn write_blob(&self, filename: &str, bytes: Vec<u8>) -> Result<()> {
        self.write(filename, &bytes).await
    }

    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
