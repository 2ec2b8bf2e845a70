//! Stress run error taxonomy
//!
//! Only run-fatal conditions live here. Per-entity failures (a start that
//! 500s, a delete that fails, a poll that times out) are folded into result
//! collections by their owning stage and never become errors.

use hubstress_http::HttpError;
use thiserror::Error;

/// Stress run result type
pub type StressResult<T> = Result<T, StressError>;

/// Run-fatal errors
#[derive(Debug, Error)]
pub enum StressError {
    /// The hub returned 403 for the list-users call; the token is bad and
    /// nothing else is worth attempting.
    #[error("Invalid token")]
    InvalidToken,

    /// A batch-creation request failed. The failed batch has already been
    /// cleaned up best-effort; no further batches are attempted.
    #[error("Failed to create users {batch:?}: {reason}")]
    CreationFailed { batch: Vec<String>, reason: String },

    /// The teardown pass completed but could not delete every user
    #[error("Failed to delete all users")]
    TeardownIncomplete,

    /// Transport failure that outlasted the client's retry policy
    #[error(transparent)]
    Http(#[from] HttpError),
}
