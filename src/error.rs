use crate::backend::BackendError;
use serde::Serialize;

/// Errors reported synchronously to callers of the trackers.
///
/// Collaborator failures are normally absorbed into terminal domain states
/// (failed uploads, errored turns); `Backend` only surfaces from direct calls
/// such as building an HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum DeskError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

pub type Result<T> = std::result::Result<T, DeskError>;

impl Serialize for DeskError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
