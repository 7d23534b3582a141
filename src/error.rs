//! Error taxonomy for the content engine

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by parsing, storage, and store operations.
///
/// `Validation` and `Parse` are recorded per document during bulk load and
/// never abort the load of other documents. `Consistency` marks a save whose
/// post-write re-parse failed: the document is already on disk, but the cache
/// was left untouched.
#[derive(Debug, Error)]
pub enum Error {
    /// A required field is missing or a supplied value is unusable.
    #[error("validation error: {0}")]
    Validation(String),

    /// Malformed front matter or document structure.
    #[error("parse error: {0}")]
    Parse(String),

    /// Unknown slug or path.
    #[error("not found: {0}")]
    NotFound(String),

    /// Storage backend failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A written document no longer re-parses to the value that was saved.
    #[error("consistency error: {0}")]
    Consistency(String),
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Parse(e.to_string())
    }
}
