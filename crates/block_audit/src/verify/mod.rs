//! Saved-batch verification: continuity checks, field and hash comparison, results.

mod batch;
mod compare;
mod engine;
mod result;
mod store;

use thiserror::Error;

pub use batch::parse_batch;
pub use compare::{
    chain_continuity, compare_fields, local_continuity, verification_message, CompareField,
};
pub use engine::VerificationEngine;
pub use result::{FieldDiff, VerificationResult, VerificationSummary, FETCH_FAILED};
pub use store::{ActiveRun, ResultStore, VerificationProgress};

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("a verification run is already in progress")]
    AlreadyRunning,
    #[error("invalid batch format: {0}")]
    InvalidBatchFormat(String),
    #[error("batch contains no blocks")]
    EmptyBatch,
    #[error("verification interrupted: {0}")]
    Interrupted(String),
}

impl From<tokio::task::JoinError> for VerifyError {
    fn from(e: tokio::task::JoinError) -> Self {
        VerifyError::Interrupted(e.to_string())
    }
}
