//! Common error types for Trove.

use thiserror::Error;

/// Top-level error type for Trove operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The path string was empty.
    #[error("path cannot be empty")]
    EmptyPath,

    /// The path started with a separator.
    #[error("path cannot be an absolute path: {0}")]
    AbsolutePath(String),

    /// The path contained a `.` or `..` segment.
    #[error("{0} is not allowed in paths")]
    IllegalSegment(String),

    /// The path contained an empty segment.
    #[error("path cannot contain empty segments: {0}")]
    EmptySegment(String),

    /// Nothing exists at the path.
    #[error("file does not exist: {0}")]
    NotExist(String),

    /// A node already exists at the path.
    #[error("file already exists: {0}")]
    AlreadyExists(String),

    /// A directory was required but a file was found.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// A file was required but a directory was found.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// The glob pattern is malformed or uses unsupported syntax.
    #[error("illegal glob pattern: {0}")]
    IllegalPattern(String),

    /// Writing the archive failed.
    #[error("archive encode error: {0}")]
    Encode(#[source] std::io::Error),

    /// Reading the archive failed.
    #[error("archive decode error: {0}")]
    Decode(#[source] std::io::Error),

    /// A read was attempted on a closed file handle.
    #[error("file already closed: {0}")]
    FileClosed(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No selector candidate produced a vault.
    #[error("no vault could be selected")]
    NoVaultSelected,
}

impl Error {
    /// Build a decode error from a message.
    pub fn decode(msg: impl Into<String>) -> Self {
        Error::Decode(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            msg.into(),
        ))
    }

    /// Check whether this error means the path does not exist.
    pub fn is_not_exist(&self) -> bool {
        matches!(self, Error::NotExist(_))
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
