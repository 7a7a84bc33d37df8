//! Cache error types.

use thiserror::Error;

/// Errors raised by cache and counter backends.
///
/// These never escape [`super::CacheGateway`]: reads degrade to a miss and
/// writes to a no-op, with the failure logged.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backing store rejected or failed the operation.
    #[error("cache backend unavailable: {message}")]
    Unavailable { message: String },
}
