//! Pending import batch
//!
//! Accumulates import requests up to a maximum item count and a maximum
//! cumulative body size. The bound guards additional accumulation: a single
//! request larger than the size limit still forms a batch of one.

use crate::config::{DEFAULT_BATCH_MAX_ITEMS, DEFAULT_BATCH_MAX_SIZE};
use crate::remote::ImportRequest;

/// Import requests waiting to be flushed, in insertion order
#[derive(Debug)]
pub struct PendingBatch {
    items: Vec<(String, ImportRequest)>,
    size: usize,
    max_items: usize,
    max_size: usize,
}

impl Default for PendingBatch {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_MAX_ITEMS, DEFAULT_BATCH_MAX_SIZE)
    }
}

impl PendingBatch {
    pub fn new(max_items: usize, max_size: usize) -> Self {
        Self {
            items: Vec::with_capacity(max_items),
            size: 0,
            max_items,
            max_size,
        }
    }

    /// Whether `request` must go into a fresh batch
    pub fn needs_flush_before(&self, request: &ImportRequest) -> bool {
        if self.items.is_empty() {
            return false;
        }
        self.size + request.size() > self.max_size || self.items.len() >= self.max_items
    }

    pub fn push(&mut self, source_id: String, request: ImportRequest) {
        self.size += request.size();
        self.items.push((source_id, request));
    }

    /// Take the accumulated requests, leaving the batch empty
    pub fn take(&mut self) -> Vec<(String, ImportRequest)> {
        self.size = 0;
        std::mem::take(&mut self.items)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Accumulated body size in bytes
    pub fn size(&self) -> usize {
        self.size
    }
}
