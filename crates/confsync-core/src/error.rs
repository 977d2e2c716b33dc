//! Error types for confsync-core

/// Result type for confsync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort an operation.
///
/// Conditions the engine can recover from (unparseable module files,
/// duplicate identities, failed expansions) are reported as warnings in the
/// operation's report instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A caller-supplied argument was rejected
    #[error("{0}")]
    InvalidArgument(String),

    /// A selected item or file does not exist
    #[error("{0}")]
    NotFound(String),

    /// A selector matched more than one item
    #[error("{0}")]
    Ambiguous(String),

    /// The file or item type is not handled by the operation
    #[error("{0}")]
    Unsupported(String),

    /// Filesystem error from confsync-fs
    #[error(transparent)]
    Fs(#[from] confsync_fs::Error),

    /// Codec or expansion error from confsync-content
    #[error(transparent)]
    Content(#[from] confsync_content::Error),
}

impl Error {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }
}
