use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced to consumers of the statistics pipeline. An empty
/// result set is not one of them; it yields a valid zero-valued
/// `GradeStatistics` instead.
#[derive(Debug, Error)]
pub enum StatsError {
    /// The record store could not be queried. No partial statistics are
    /// emitted; the caller decides whether to retry.
    #[error("record store unavailable: {0}")]
    StoreUnavailable(String),

    /// A rendered report could not be written to disk. Aggregation itself
    /// is unaffected and not retried.
    #[error("failed to write report to {}", .path.display())]
    ExportFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
