use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    pub alloc_bytes: u64,
    pub alloc_blocks: u64,
    pub free_bytes: u64,
    pub free_blocks: u64,
    pub used_bytes: u64,
    pub used_blocks: u64,
    pub failed_allocations: u64,
}

/// Counts the decoded frame memory of one interface instance. Allocations beyond `budget` fail.
#[derive(Debug, Default)]
pub struct MemoryTracker {
    budget: Option<u64>,
    alloc_bytes: AtomicU64,
    alloc_blocks: AtomicU64,
    free_bytes: AtomicU64,
    free_blocks: AtomicU64,
    failed: AtomicU64,
}

impl MemoryTracker {
    pub fn new(budget: Option<u64>) -> Self {
        Self {
            budget,
            ..Default::default()
        }
    }

    pub fn stats(&self) -> MemoryStats {
        let alloc_bytes = self.alloc_bytes.load(Ordering::Acquire);
        let alloc_blocks = self.alloc_blocks.load(Ordering::Acquire);
        let free_bytes = self.free_bytes.load(Ordering::Acquire);
        let free_blocks = self.free_blocks.load(Ordering::Acquire);
        MemoryStats {
            alloc_bytes,
            alloc_blocks,
            free_bytes,
            free_blocks,
            used_bytes: alloc_bytes.saturating_sub(free_bytes),
            used_blocks: alloc_blocks.saturating_sub(free_blocks),
            failed_allocations: self.failed.load(Ordering::Acquire),
        }
    }

    fn used_bytes(&self) -> u64 {
        self.alloc_bytes
            .load(Ordering::Acquire)
            .saturating_sub(self.free_bytes.load(Ordering::Acquire))
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::AcqRel);
    }
}

/// A byte buffer whose allocation is accounted in a `MemoryTracker` until it is dropped.
#[derive(Debug)]
pub struct TrackedBuffer {
    data: Vec<u8>,
    tracker: Arc<MemoryTracker>,
}

impl TrackedBuffer {
    /// Reserves `capacity` bytes and lets `fill` write into them. Fails instead of aborting when memory runs out.
    pub fn try_fill<E, F>(tracker: &Arc<MemoryTracker>, capacity: usize, fill: F) -> Result<Option<TrackedBuffer>, E>
    where
        F: FnOnce(&mut Vec<u8>) -> Result<(), E>,
    {
        if let Some(budget) = tracker.budget {
            if tracker.used_bytes() + capacity as u64 > budget {
                tracker.record_failure();
                return Ok(None);
            }
        }

        let mut data = Vec::new();
        if data.try_reserve_exact(capacity).is_err() {
            tracker.record_failure();
            return Ok(None);
        }

        fill(&mut data)?;
        tracker.alloc_bytes.fetch_add(data.len() as u64, Ordering::AcqRel);
        tracker.alloc_blocks.fetch_add(1, Ordering::AcqRel);

        Ok(Some(TrackedBuffer {
            data,
            tracker: tracker.clone(),
        }))
    }
}

impl Deref for TrackedBuffer {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl Drop for TrackedBuffer {
    fn drop(&mut self) {
        self.tracker.free_bytes.fetch_add(self.data.len() as u64, Ordering::AcqRel);
        self.tracker.free_blocks.fetch_add(1, Ordering::AcqRel);
    }
}
