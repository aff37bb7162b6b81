//! Per-block verification outcome and run summary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Recorded as `chain_hash` when the live block could not be fetched.
pub const FETCH_FAILED: &str = "fetch failed";

/// Local and live value of one mismatched field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDiff {
    pub field: String,
    pub local: Value,
    pub chain: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub block_number: u64,
    pub data_match: bool,
    pub hash_match: bool,
    pub chain_hash: String,
    pub local_hash: String,
    pub is_local_continuous: bool,
    pub is_chain_continuous: bool,
    pub mismatch_fields: Vec<String>,
    pub field_details: Vec<FieldDiff>,
    pub message: String,
}

impl VerificationResult {
    pub fn is_clean(&self) -> bool {
        self.data_match && self.hash_match && self.is_local_continuous && self.is_chain_continuous
    }

    pub fn fetch_failed(&self) -> bool {
        self.chain_hash == FETCH_FAILED
    }
}

/// Counts over a finished (or in-flight) result list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub total: usize,
    pub verified: usize,
    pub data_mismatches: usize,
    pub hash_mismatches: usize,
    pub local_breaks: usize,
    pub chain_breaks: usize,
    pub fetch_failures: usize,
}

impl VerificationSummary {
    pub fn from_results(results: &[VerificationResult]) -> Self {
        let mut s = Self {
            total: results.len(),
            ..Default::default()
        };
        for r in results {
            if r.data_match && r.hash_match {
                s.verified += 1;
            }
            if r.fetch_failed() {
                s.fetch_failures += 1;
            } else {
                s.data_mismatches += usize::from(!r.data_match);
                s.hash_mismatches += usize::from(!r.hash_match);
            }
            s.local_breaks += usize::from(!r.is_local_continuous);
            s.chain_breaks += usize::from(!r.is_chain_continuous);
        }
        s
    }

    pub fn all_clean(&self) -> bool {
        self.total > 0
            && self.verified == self.total
            && self.local_breaks == 0
            && self.chain_breaks == 0
    }
}
