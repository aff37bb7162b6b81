//! Report data structure (HTML is generated in block_audit_report crate).

use crate::verify::{VerificationProgress, VerificationSummary};
use serde::{Deserialize, Serialize};

/// Data passed to the HTML report generator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportData {
    pub endpoint: String,
    /// Name of the verified batch file.
    pub batch: String,
    pub generated_utc_rfc3339: String,
    pub summary: VerificationSummary,
    pub progress: VerificationProgress,
}

impl ReportData {
    pub fn new(endpoint: String, batch: String, progress: VerificationProgress) -> Self {
        let generated_utc_rfc3339 = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        let summary = VerificationSummary::from_results(&progress.results);
        Self {
            endpoint,
            batch,
            generated_utc_rfc3339,
            summary,
            progress,
        }
    }
}
