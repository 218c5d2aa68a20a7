//! Engine-wide error taxonomy.
//!
//! ERROR HANDLING
//! ==============
//! Nothing here is fatal. Every failing operation leaves its component in a
//! well-defined prior state (single-flight guard released, polling stopped)
//! so the user can simply try again. No variant is retried automatically.

use crate::api::ApiError;
use crate::card::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Local input problem caught before any network call.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Transport failure or non-success response; the message is the
    /// server's `error` string when it sent one.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The server reported success without a usable payload.
    #[error("{0}")]
    Anomaly(String),

    /// The user declined a confirmation. Callers return quietly.
    #[error("cancelled by user")]
    UserAbort,

    /// The operation is not allowed from the current state.
    #[error("{0}")]
    InvalidState(&'static str),

    /// A local file was rejected before upload.
    #[error("{0}")]
    Upload(String),
}

impl EngineError {
    /// Whether the error should be dropped without telling the user.
    #[must_use]
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::UserAbort)
    }
}
