//! block_audit — fetch ledger blocks over RPC and re-verify saved batches.
//!
//! Two pipelines: a range fetcher that retries every block until it arrives and
//! saves the batch, and a verifier that checks a saved batch for local and
//! on-chain continuity and compares each block with its live copy.
//! Structural checks only; no signature or consensus validation.

pub mod chain;
pub mod fetch;
pub mod report;
pub mod verify;

pub use chain::{
    BlockRecord, BlockSelector, BlockSource, ClientConfig, ClientError, RemoteLedgerClient,
};
pub use fetch::{FetchConfig, FetchError, FetchProgress, Fetcher, ProgressTracker};
pub use report::ReportData;
pub use verify::{
    ResultStore, VerificationEngine, VerificationProgress, VerificationResult,
    VerificationSummary, VerifyError,
};
