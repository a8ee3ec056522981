//! Error types for directory operations.

use ps_session::ConsoleError;
use thiserror::Error;

/// Result type for directory operations.
pub type Result<T> = std::result::Result<T, DirectoryError>;

/// Errors of directory operations.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// A command template still had placeholders after substitution.
    #[error("command template has unfilled placeholders: {}", missing.join(", "))]
    Template {
        /// Names of the unfilled placeholders, in template order.
        missing: Vec<String>,
    },

    /// The console session failed or the remote command reported failure.
    #[error(transparent)]
    Console(#[from] ConsoleError),
}

impl DirectoryError {
    /// Create a template error.
    pub fn template(missing: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Template {
            missing: missing.into_iter().map(Into::into).collect(),
        }
    }

    /// The console error, if this is one.
    #[must_use]
    pub const fn console(&self) -> Option<&ConsoleError> {
        match self {
            Self::Console(e) => Some(e),
            Self::Template { .. } => None,
        }
    }
}
