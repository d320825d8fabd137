use thiserror::Error;

/// Result alias used across the COIL crates.
pub type Result<T> = core::result::Result<T, Error>;

/// Library-wide error taxonomy.
///
/// Low-level parse failures surface as [`Error::InvalidFormat`] or
/// [`Error::Io`] with a contextual message; programmatic misuse surfaces as
/// [`Error::InvalidArg`]. Validation never returns these; it accumulates
/// diagnostics instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum Error {
    /// An argument was outside the domain of the operation.
    #[error("invalid argument: {0}")]
    InvalidArg(String),
    /// An allocation or reservation could not be satisfied.
    #[error("out of memory: {0}")]
    OutOfMemory(String),
    /// An underlying read or write failed, usually a short buffer.
    #[error("i/o error: {0}")]
    Io(String),
    /// The bytes do not form a well-formed COIL structure.
    #[error("invalid format: {0}")]
    InvalidFormat(String),
    /// The named entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The operation is not supported by this build or format revision.
    #[error("not supported: {0}")]
    NotSupported(String),
    /// The operation is not valid in the current state.
    #[error("bad state: {0}")]
    BadState(String),
    /// The entity already exists and may not be redefined.
    #[error("already exists: {0}")]
    AlreadyExists(String),
}

impl Error {
    /// Short-buffer error used by the byte-level readers.
    pub fn eof() -> Self {
        Error::Io("unexpected end of buffer".to_string())
    }
}
