//! Persisted fetch batches: `blocks_<start>_<end>.json` plus a `.sha256` sidecar.

use crate::chain::BlockRecord;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactInfo {
    pub path: PathBuf,
    pub sha256: String,
    pub block_count: usize,
}

pub fn artifact_file_name(start: u64, end: u64) -> String {
    format!("blocks_{}_{}.json", start, end)
}

fn sidecar_path(path: &Path) -> PathBuf {
    path.with_extension("sha256")
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Encode records as `{ "blocks": [ <raw>, ... ] }`, in the order given.
pub fn encode_batch(records: &[BlockRecord]) -> Result<Vec<u8>, ArtifactError> {
    let blocks: Vec<&serde_json::Value> = records.iter().map(|r| &r.raw).collect();
    let doc = serde_json::json!({ "blocks": blocks });
    Ok(serde_json::to_vec_pretty(&doc)?)
}

/// Write the batch for `[start, end]` into `dir` in one go, then its checksum.
pub async fn write_batch(
    dir: &Path,
    start: u64,
    end: u64,
    records: &[BlockRecord],
) -> Result<ArtifactInfo, ArtifactError> {
    tokio::fs::create_dir_all(dir).await?;
    let bytes = encode_batch(records)?;
    let sha256 = sha256_hex(&bytes);
    let path = dir.join(artifact_file_name(start, end));
    tokio::fs::write(&path, &bytes).await?;
    tokio::fs::write(sidecar_path(&path), format!("{}\n", sha256)).await?;
    Ok(ArtifactInfo {
        path,
        sha256,
        block_count: records.len(),
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChecksumStatus {
    Match,
    Mismatch { expected: String, actual: String },
    NoSidecar,
}

/// Compare a batch file with its `.sha256` sidecar, if there is one.
pub fn verify_artifact_checksum(path: &Path) -> Result<ChecksumStatus, ArtifactError> {
    let bytes = std::fs::read(path)?;
    let expected = match std::fs::read_to_string(sidecar_path(path)) {
        Ok(s) => s.trim().to_lowercase(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ChecksumStatus::NoSidecar),
        Err(e) => return Err(e.into()),
    };
    let actual = sha256_hex(&bytes);
    if actual == expected {
        Ok(ChecksumStatus::Match)
    } else {
        Ok(ChecksumStatus::Mismatch { expected, actual })
    }
}
