//! Weaving errors
//!
//! Only foundational failures abort a pass. Everything that concerns a
//! single stub is a diagnostic, not an error: the stub is skipped and the
//! pass continues.

use thiserror::Error;

pub type WeaveResult<T> = Result<T, WeaveError>;

#[derive(Debug, Error)]
pub enum WeaveError {
    #[error("Required marker type {0} was not found in the module or its references")]
    MissingMarkerType(String),

    #[error("Marker type {0} has no parameterless constructor")]
    MissingMarkerConstructor(String),
}
