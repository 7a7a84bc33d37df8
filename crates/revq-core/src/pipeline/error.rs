//! Pipeline error types.

use thiserror::Error;

use crate::generate::GenerateError;

/// Failures that propagate to the caller.
///
/// Everything else the pipeline touches (cache, counters, persistence,
/// analytics, scraping, the review provider) degrades silently.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No usable product signal and no review evidence.
    #[error("no product could be identified for this question")]
    NotAnswerable,

    /// The generation call failed; the inner error carries the class.
    #[error(transparent)]
    Generation(#[from] GenerateError),
}
