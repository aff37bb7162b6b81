//! Progress of the running fetch, readable from any number of pollers.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchProgress {
    pub processed_count: u64,
    pub total_count: u64,
    pub is_processing: bool,
    /// Sticky for the run: set on any failed attempt.
    pub has_error: bool,
    pub current_block_number: Option<u64>,
}

/// Holds the last written [`FetchProgress`]. Every read and write takes the same
/// lock, so a snapshot never mixes two updates.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    inner: Mutex<FetchProgress>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> FetchProgress {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut FetchProgress) -> R) -> R {
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    /// Start a new run over `total` blocks, dropping whatever the last run left.
    pub fn reset(&self, total: u64) {
        self.update(|p| {
            *p = FetchProgress {
                total_count: total,
                is_processing: true,
                ..Default::default()
            }
        });
    }
}
