//! Buffer bindings and the bytes last uploaded to each buffer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::gl::BufferId;

/// Data argument of a buffer upload call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferPayload {
    /// Raw bytes (ArrayBuffer, SharedArrayBuffer or any typed view)
    Bytes(Vec<u8>),
    Floats(Vec<f32>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    /// Capacity-only allocation
    Size(usize),
    /// Anything else the host passed
    Unsupported,
}

impl BufferPayload {
    /// Bytes carried by the payload; `Size` and `Unsupported` carry none.
    pub fn data_bytes(&self) -> Option<Vec<u8>> {
        match self {
            BufferPayload::Bytes(bytes) => Some(bytes.clone()),
            BufferPayload::Floats(v) => Some(v.iter().flat_map(|f| f.to_le_bytes()).collect()),
            BufferPayload::U16(v) => Some(v.iter().flat_map(|i| i.to_le_bytes()).collect()),
            BufferPayload::U32(v) => Some(v.iter().flat_map(|i| i.to_le_bytes()).collect()),
            BufferPayload::Size(_) | BufferPayload::Unsupported => None,
        }
    }

    /// Contents of a full upload: the data, or zeroes for a capacity-only call.
    pub fn allocation_bytes(&self) -> Option<Vec<u8>> {
        match self {
            BufferPayload::Size(size) => Some(vec![0; *size]),
            other => other.data_bytes(),
        }
    }
}

/// Materialized content of one buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferRecord {
    bytes: Vec<u8>,
}

impl BufferRecord {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Copy `data` to `offset`, growing the record first if it is too short.
    /// Existing bytes are kept; the record never shrinks.
    pub fn write_at(&mut self, offset: usize, data: &[u8]) {
        let end = offset + data.len();
        if self.bytes.len() < end {
            self.bytes.resize(end, 0);
        }
        self.bytes[offset..end].copy_from_slice(data);
    }
}

/// Why an upload left the store untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadSkip {
    NoBoundBuffer,
    NoData,
}

/// Target bindings plus per-buffer content.
#[derive(Debug, Default)]
pub struct BufferStore {
    bindings: HashMap<u32, BufferId>,
    records: HashMap<BufferId, BufferRecord>,
}

impl BufferStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A freshly created buffer has no content yet.
    pub fn create(&mut self, buffer: BufferId) {
        self.records.remove(&buffer);
    }

    pub fn bind(&mut self, target: u32, buffer: Option<BufferId>) {
        match buffer {
            Some(buffer) => {
                self.bindings.insert(target, buffer);
            }
            None => {
                self.bindings.remove(&target);
            }
        }
    }

    pub fn bound(&self, target: u32) -> Option<BufferId> {
        self.bindings.get(&target).copied()
    }

    pub fn record(&self, buffer: BufferId) -> Option<&BufferRecord> {
        self.records.get(&buffer)
    }

    /// Record bound to `target`, if any.
    pub fn bound_record(&self, target: u32) -> Option<&BufferRecord> {
        self.bound(target).and_then(|b| self.records.get(&b))
    }

    /// Full (re)allocation: replaces the bound buffer's record wholesale.
    pub fn upload(&mut self, target: u32, payload: &BufferPayload) -> Result<usize, UploadSkip> {
        let buffer = self.bound(target).ok_or(UploadSkip::NoBoundBuffer)?;
        let bytes = payload.allocation_bytes().ok_or(UploadSkip::NoData)?;
        let len = bytes.len();
        self.records.insert(buffer, BufferRecord::new(bytes));
        Ok(len)
    }

    /// Partial update at `offset`; allocates or grows the record as needed.
    pub fn upload_sub(
        &mut self,
        target: u32,
        offset: usize,
        payload: &BufferPayload,
    ) -> Result<usize, UploadSkip> {
        let bytes = payload.data_bytes().ok_or(UploadSkip::NoData)?;
        let buffer = self.bound(target).ok_or(UploadSkip::NoBoundBuffer)?;
        let record = self.records.entry(buffer).or_default();
        record.write_at(offset, &bytes);
        Ok(record.len())
    }
}
