//! Error types for confsync-content

/// Result type for confsync-content operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in confsync-content operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to parse YAML in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Failed to render YAML: {message}")]
    Render { message: String },

    #[error(transparent)]
    Fs(#[from] confsync_fs::Error),
}

impl Error {
    pub fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}
