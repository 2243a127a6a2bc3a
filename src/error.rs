use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the repo-chunker library.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// Token limit is not a positive integer.
    #[error("Invalid token limit: max_tokens must be at least 1 (got {limit})")]
    InvalidLimit {
        /// The rejected limit
        limit: usize,
    },

    /// A source file could not be read as text.
    #[error("Failed to read '{path}': {message}")]
    ReadFailure {
        /// Path of the unreadable file
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// An output file could not be written.
    #[error("Failed to write '{path}': {message} ({} chunk file(s) written before the failure)", .written.len())]
    WriteFailure {
        /// Path that failed
        path: PathBuf,
        /// Error message
        message: String,
        /// Files successfully written before the failure
        written: Vec<PathBuf>,
    },

    /// Input is neither an openable local repository nor a clonable URL.
    #[error("Invalid repository '{input}': {message}")]
    InvalidRepository {
        /// Path or URL supplied by the caller
        input: String,
        /// Error message
        message: String,
    },

    /// libgit2 failure outside of repository resolution.
    #[error("Git error: {message}")]
    Git {
        /// Error message
        message: String,
    },

    /// IO error with context about the file path.
    #[error("IO error accessing '{path}': {message}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Template rendering error.
    #[error("Failed to render template '{template}': {message}")]
    Template {
        /// Template name
        template: String,
        /// Error message
        message: String,
    },

    /// Configuration validation error.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Detailed error message
        message: String,
    },

    /// JSON serialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message
        message: String,
    },

    /// Invalid output pattern or glob.
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The invalid pattern
        pattern: String,
        /// Reason why it's invalid
        reason: String,
    },
}

impl Error {
    /// Creates an IO error with path context.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Creates a read failure for a source file.
    #[must_use]
    pub fn read_failure(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ReadFailure {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a write failure carrying the files already written.
    #[must_use]
    pub fn write_failure(
        path: impl Into<PathBuf>,
        source: &std::io::Error,
        written: Vec<PathBuf>,
    ) -> Self {
        Self::WriteFailure {
            path: path.into(),
            message: source.to_string(),
            written,
        }
    }

    /// Creates an invalid repository error.
    #[must_use]
    pub fn invalid_repository(input: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRepository {
            input: input.into(),
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a template error.
    #[must_use]
    pub fn template(template: impl Into<String>, source: &tera::Error) -> Self {
        // Tera keeps the useful part of parse errors in the source chain.
        let mut message = source.to_string();
        let mut cause = std::error::Error::source(source);
        while let Some(inner) = cause {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            cause = std::error::Error::source(inner);
        }

        Self::Template {
            template: template.into(),
            message,
        }
    }

    /// Creates an invalid pattern error.
    #[must_use]
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this is an invalid token limit error.
    #[must_use]
    pub const fn is_invalid_limit(&self) -> bool {
        matches!(self, Self::InvalidLimit { .. })
    }

    /// Returns true if this is a read failure.
    #[must_use]
    pub const fn is_read_failure(&self) -> bool {
        matches!(self, Self::ReadFailure { .. })
    }

    /// Returns true if this is a write failure.
    #[must_use]
    pub const fn is_write_failure(&self) -> bool {
        matches!(self, Self::WriteFailure { .. })
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

impl From<git2::Error> for Error {
    fn from(e: git2::Error) -> Self {
        Self::Git {
            message: e.message().to_string(),
        }
    }
}
