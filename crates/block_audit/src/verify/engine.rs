//! Re-verification of a saved batch against the live chain.

use crate::chain::{BlockRecord, BlockSelector, BlockSource};
use crate::verify::batch::parse_batch;
use crate::verify::compare::{
    chain_continuity, compare_fields, local_continuity, verification_message,
};
use crate::verify::result::{VerificationResult, FETCH_FAILED};
use crate::verify::store::{ActiveRun, ResultStore};
use crate::verify::VerifyError;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Runs one verification at a time against a shared [`ResultStore`].
#[derive(Clone, Debug)]
pub struct VerificationEngine {
    store: Arc<ResultStore>,
}

impl VerificationEngine {
    pub fn new(store: Arc<ResultStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<ResultStore> {
        &self.store
    }

    /// Verify `content` inline.
    pub async fn run<S>(
        &self,
        content: &str,
        source: &S,
    ) -> Result<Vec<VerificationResult>, VerifyError>
    where
        S: BlockSource + ?Sized,
    {
        let run = self.store.begin()?;
        verify_batch(run, content, source).await
    }

    /// Claim the store now and verify on a background task. A second call
    /// while that task is running fails with [`VerifyError::AlreadyRunning`].
    pub fn start<S>(
        &self,
        content: String,
        source: Arc<S>,
    ) -> Result<JoinHandle<Result<Vec<VerificationResult>, VerifyError>>, VerifyError>
    where
        S: BlockSource + ?Sized + 'static,
    {
        let run = self.store.begin()?;
        Ok(tokio::spawn(async move {
            let out = verify_batch(run, &content, source.as_ref()).await;
            if let Err(e) = &out {
                error!(error = %e, "verification failed");
            }
            out
        }))
    }
}

async fn verify_batch<S>(
    run: ActiveRun,
    content: &str,
    source: &S,
) -> Result<Vec<VerificationResult>, VerifyError>
where
    S: BlockSource + ?Sized,
{
    let blocks = match parse_batch(content) {
        Ok(blocks) => blocks,
        Err(e) => {
            run.fail();
            return Err(e);
        }
    };
    run.set_total(blocks.len());
    info!(blocks = blocks.len(), "verification started");

    for index in 0..blocks.len() {
        let result = verify_block(&blocks, index, source).await;
        info!(
            block = result.block_number,
            data_match = result.data_match,
            hash_match = result.hash_match,
            local_continuous = result.is_local_continuous,
            chain_continuous = result.is_chain_continuous,
            "verified block"
        );
        run.push(result);
    }

    let results = run.complete();
    info!(blocks = results.len(), "verification finished");
    Ok(results)
}

/// Produce the result for `blocks[index]`. A failed live fetch yields a failure
/// result instead of an error.
async fn verify_block<S>(blocks: &[BlockRecord], index: usize, source: &S) -> VerificationResult
where
    S: BlockSource + ?Sized,
{
    let local = &blocks[index];
    let is_local_continuous = local_continuity(blocks, index);

    let live = match source.fetch(BlockSelector::Number(local.number)).await {
        Ok(live) => live,
        Err(e) => {
            error!(block = local.number, error = %e, "live fetch failed");
            return VerificationResult {
                block_number: local.number,
                data_match: false,
                hash_match: false,
                chain_hash: FETCH_FAILED.to_string(),
                local_hash: local.id.clone(),
                is_local_continuous,
                is_chain_continuous: false,
                mismatch_fields: Vec::new(),
                field_details: Vec::new(),
                message: format!("verification failed: {}", e),
            };
        }
    };

    let predecessor = match local.number.checked_sub(1) {
        Some(prior) => match source.fetch(BlockSelector::Number(prior)).await {
            Ok(p) => Some(p),
            Err(e) => {
                if !local.is_genesis() {
                    error!(block = local.number, error = %e, "live predecessor fetch failed");
                }
                None
            }
        },
        None => None,
    };
    let is_chain_continuous = chain_continuity(&live, predecessor.as_ref());

    let field_details = compare_fields(local, &live);
    let mismatch_fields: Vec<String> = field_details.iter().map(|d| d.field.clone()).collect();
    let data_match = mismatch_fields.is_empty();
    let hash_match = local.id == live.id;
    if !hash_match {
        error!(block = local.number, local = %local.id, chain = %live.id, "hash mismatch");
    }

    VerificationResult {
        block_number: local.number,
        data_match,
        hash_match,
        message: verification_message(data_match, hash_match, &mismatch_fields),
        chain_hash: live.id,
        local_hash: local.id.clone(),
        is_local_continuous,
        is_chain_continuous,
        mismatch_fields,
        field_details,
    }
}
