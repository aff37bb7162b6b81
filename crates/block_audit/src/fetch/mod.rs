//! Range fetch with unbounded per-block retry, progress tracking and batch persistence.

pub mod artifact;
mod backoff;
mod pipeline;
mod progress;

pub use artifact::{verify_artifact_checksum, ArtifactError, ArtifactInfo, ChecksumStatus};
pub use backoff::{backoff_delay, CancellationFlag};
pub use pipeline::{FetchConfig, FetchError, FetchOutcome, Fetcher};
pub use progress::{FetchProgress, ProgressTracker};
