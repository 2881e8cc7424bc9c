//! In-memory sink for tests and the headless harness.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use super::{decode_data_uri, AssetSink};
use crate::error::{Result, RipperError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Records every write in order. Pauses are counted, not slept.
#[derive(Debug, Default)]
pub struct MemorySink {
    files: Mutex<Vec<WrittenFile>>,
    pauses: Mutex<usize>,
    failing: HashSet<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes to `filename`.
    pub fn failing_on(mut self, filename: &str) -> Self {
        self.failing.insert(filename.to_string());
        self
    }

    pub fn files(&self) -> Vec<WrittenFile> {
        self.files.lock().map(|f| f.clone()).unwrap_or_default()
    }

    pub fn filenames(&self) -> Vec<String> {
        self.files().into_iter().map(|f| f.filename).collect()
    }

    pub fn bytes(&self, filename: &str) -> Option<Vec<u8>> {
        self.files()
            .into_iter()
            .find(|f| f.filename == filename)
            .map(|f| f.bytes)
    }

    pub fn text(&self, filename: &str) -> Option<String> {
        self.bytes(filename).and_then(|b| String::from_utf8(b).ok())
    }

    pub fn pause_count(&self) -> usize {
        self.pauses.lock().map(|p| *p).unwrap_or_default()
    }

    fn record(&self, filename: &str, bytes: Vec<u8>) -> Result<()> {
        if self.failing.contains(filename) {
            return Err(RipperError::Sink(format!("write rejected: {filename}")));
        }
        self.files
            .lock()
            .map_err(|_| RipperError::Sink("memory sink poisoned".into()))?
            .push(WrittenFile {
                filename: filename.to_string(),
                bytes,
            });
        Ok(())
    }
}

impl AssetSink for MemorySink {
    async fn write_text(&self, filename: &str, content: &str) -> Result<()> {
        self.record(filename, content.as_bytes().to_vec())
    }

    async fn write_image(&self, filename: &str, url: &str) -> Result<()> {
        let bytes = decode_data_uri(url)?;
        self.record(filename, bytes)
    }

    async fn write_blob(&self, filename: &str, bytes: Vec<u8>) -> Result<()> {
        self.record(filename, bytes)
    }

    async fn pause(&self, _duration: Duration) {
        if let Ok(mut pauses) = self.pauses.lock() {
            *pauses += 1;
        }
    }
}
