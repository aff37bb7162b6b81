//! Range fetcher: walks block numbers in order and never skips one.

use crate::chain::{validate_endpoint, BlockRecord, BlockSelector, BlockSource, ClientError};
use crate::fetch::artifact::{self, ArtifactError, ArtifactInfo};
use crate::fetch::backoff::{backoff_delay, CancellationFlag};
use crate::fetch::progress::ProgressTracker;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

const DEFAULT_OUTPUT_DIR: &str = "block_data";
const RETRY_DELAY_MS: u64 = 500;
const MAX_RETRY_DELAY_MS: u64 = 2000;
const PROBE_BLOCK: u64 = 1_000_000;

#[derive(Clone, Debug)]
pub struct FetchConfig {
    pub output_dir: PathBuf,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Block requested by the pre-flight check; must exist on the target chain.
    pub probe_block: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            base_delay_ms: RETRY_DELAY_MS,
            max_delay_ms: MAX_RETRY_DELAY_MS,
            probe_block: PROBE_BLOCK,
        }
    }
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid range {start}..={end}: both must be positive and start <= end")]
    InvalidRange { start: u64, end: u64 },
    #[error("endpoint validation failed: {0}")]
    Validation(ClientError),
    #[error("interrupted while fetching block {block}")]
    Interrupted { block: u64 },
    #[error("artifact: {0}")]
    Artifact(#[from] ArtifactError),
}

/// What a finished run produced.
#[derive(Clone, Debug)]
pub struct FetchOutcome {
    pub processed: u64,
    pub total: u64,
    /// At least one attempt failed and was retried.
    pub retried: bool,
    pub artifact: Option<ArtifactInfo>,
}

/// Clears the in-flight markers and lowers the cancellation flag however the
/// run ends, so the next run starts fresh.
struct RunCleanup<'a> {
    tracker: &'a ProgressTracker,
    cancel: &'a CancellationFlag,
}

impl Drop for RunCleanup<'_> {
    fn drop(&mut self) {
        self.cancel.reset();
        let snapshot = self.tracker.update(|p| {
            p.current_block_number = None;
            p.is_processing = false;
            p.clone()
        });
        info!(
            total = snapshot.total_count,
            processed = snapshot.processed_count,
            has_error = snapshot.has_error,
            "fetch run finished"
        );
    }
}

/// Drives `[start, end]` through a [`BlockSource`], retrying each block until it
/// arrives, and writes the batch once at the end.
///
/// One run at a time per fetcher; callers serialize `run`.
pub struct Fetcher {
    config: FetchConfig,
    tracker: Arc<ProgressTracker>,
    cancel: CancellationFlag,
}

impl Fetcher {
    pub fn new(config: FetchConfig, tracker: Arc<ProgressTracker>) -> Self {
        Self {
            config,
            tracker,
            cancel: CancellationFlag::new(),
        }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn tracker(&self) -> &Arc<ProgressTracker> {
        &self.tracker
    }

    /// Flag that stops the current (or next) run at its next attempt. It is
    /// lowered again when that run ends.
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    pub async fn run<S>(&self, source: &S, start: u64, end: u64) -> Result<FetchOutcome, FetchError>
    where
        S: BlockSource + ?Sized,
    {
        if start == 0 || start > end {
            return Err(FetchError::InvalidRange { start, end });
        }
        let total = end - start + 1;
        self.tracker.reset(total);
        let _cleanup = RunCleanup {
            tracker: &self.tracker,
            cancel: &self.cancel,
        };

        if let Err(e) = validate_endpoint(source, self.config.probe_block).await {
            error!(error = %e, probe = self.config.probe_block, "endpoint validation failed");
            self.tracker.update(|p| p.has_error = true);
            return Err(FetchError::Validation(e));
        }

        let mut records: Vec<BlockRecord> = Vec::with_capacity(total.min(1 << 16) as usize);
        let mut retried = false;
        for block in start..=end {
            self.tracker.update(|p| p.current_block_number = Some(block));
            let record = match self.fetch_until_success(source, block).await {
                Ok((record, attempts)) => {
                    retried |= attempts > 0;
                    record
                }
                Err(e) => {
                    self.tracker.update(|p| p.has_error = true);
                    return Err(e);
                }
            };
            records.push(record);
            let processed = self.tracker.update(|p| {
                p.processed_count += 1;
                p.processed_count
            });
            info!(block, processed, total, "fetched block");
        }

        let artifact = if records.is_empty() {
            None
        } else {
            let info = artifact::write_batch(&self.config.output_dir, start, end, &records)
                .await
                .inspect_err(|e| {
                    error!(error = %e, "saving batch failed");
                    self.tracker.update(|p| p.has_error = true);
                })?;
            info!(path = %info.path.display(), sha256 = %info.sha256, "batch saved");
            Some(info)
        };

        let processed = self.tracker.update(|p| {
            if p.processed_count == p.total_count {
                p.has_error = false;
            }
            p.processed_count
        });
        if processed == total {
            info!(total, "all blocks fetched");
        } else {
            error!(total, processed, "some blocks were not fetched");
        }
        Ok(FetchOutcome {
            processed,
            total,
            retried,
            artifact,
        })
    }

    /// Retry one block with capped linear backoff. Returns the record and the
    /// number of failed attempts before it.
    async fn fetch_until_success<S>(
        &self,
        source: &S,
        block: u64,
    ) -> Result<(BlockRecord, u32), FetchError>
    where
        S: BlockSource + ?Sized,
    {
        let mut failures: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                warn!(block, "fetch cancelled");
                return Err(FetchError::Interrupted { block });
            }
            match source.fetch(BlockSelector::Number(block)).await {
                Ok(record) => return Ok((record, failures)),
                Err(e) => {
                    failures = failures.saturating_add(1);
                    self.tracker.update(|p| p.has_error = true);
                    let delay = backoff_delay(
                        failures,
                        self.config.base_delay_ms,
                        self.config.max_delay_ms,
                    );
                    warn!(
                        block,
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
