//! Verification progress and accumulated results, shared with pollers.

use crate::verify::result::VerificationResult;
use crate::verify::VerifyError;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationProgress {
    pub current_block_number: Option<u64>,
    pub verified_count: usize,
    pub total_count: usize,
    pub is_verifying: bool,
    pub results: Vec<VerificationResult>,
}

/// Live state. Results are held once; [`ResultStore::progress`] copies them
/// into a snapshot only when someone asks.
#[derive(Debug, Default)]
struct StoreState {
    current_block_number: Option<u64>,
    total_count: usize,
    is_verifying: bool,
    results: Vec<VerificationResult>,
}

/// One lock guards both the progress and the result list.
#[derive(Debug, Default)]
pub struct ResultStore {
    state: Mutex<StoreState>,
}

impl ResultStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn progress(&self) -> VerificationProgress {
        let state = self.lock();
        VerificationProgress {
            current_block_number: state.current_block_number,
            verified_count: state.results.len(),
            total_count: state.total_count,
            is_verifying: state.is_verifying,
            results: state.results.clone(),
        }
    }

    pub fn results(&self) -> Vec<VerificationResult> {
        self.lock().results.clone()
    }

    pub fn is_verifying(&self) -> bool {
        self.lock().is_verifying
    }

    /// Claim the store for a new run: rejects while another run is active,
    /// otherwise drops the previous run's results.
    pub fn begin(self: &Arc<Self>) -> Result<ActiveRun, VerifyError> {
        let mut state = self.lock();
        if state.is_verifying {
            return Err(VerifyError::AlreadyRunning);
        }
        *state = StoreState {
            is_verifying: true,
            ..Default::default()
        };
        Ok(ActiveRun {
            store: Arc::clone(self),
            finished: false,
        })
    }
}

/// Write handle for the run that holds the store. Dropping it without
/// [`ActiveRun::complete`] resets the store to empty.
#[derive(Debug)]
pub struct ActiveRun {
    store: Arc<ResultStore>,
    finished: bool,
}

impl ActiveRun {
    pub(crate) fn set_total(&self, total: usize) {
        self.store.lock().total_count = total;
    }

    pub(crate) fn push(&self, result: VerificationResult) {
        let mut state = self.store.lock();
        state.current_block_number = Some(result.block_number);
        state.results.push(result);
    }

    pub(crate) fn complete(mut self) -> Vec<VerificationResult> {
        self.finished = true;
        let mut state = self.store.lock();
        state.current_block_number = None;
        state.total_count = state.results.len();
        state.is_verifying = false;
        state.results.clone()
    }

    pub(crate) fn fail(self) {
        // Drop performs the reset.
    }
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!("verification run ended without completing; clearing results");
        let mut state = self.store.lock();
        *state = StoreState::default();
    }
}
