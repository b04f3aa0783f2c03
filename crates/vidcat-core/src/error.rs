//! Unified error type for vidcat.
//!
//! All crates funnel their failures into [`Error`]. Callers of the rollover
//! cycle use [`Error::is_retryable`] to decide whether the next check should
//! simply try again.

use std::fmt;

/// Unified error type covering all failure modes in vidcat.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller-supplied data was rejected at an API boundary.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "record").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The record store rejected or failed a write.
    #[error("Record store error: {source}")]
    Store {
        /// The underlying store error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration could not be read or is unusable.
    #[error("Config error: {0}")]
    Config(String),

    /// A lifecycle plugin reported a failure.
    #[error("Plugin error [{plugin}]: {message}")]
    Plugin {
        /// Which hook failed.
        plugin: String,
        /// Human-readable error description.
        message: String,
    },

    /// A rollover step failed.
    #[error("Rollover error [{step}]: {message}")]
    Rollover {
        /// The rollover step that failed.
        step: String,
        /// Human-readable error description.
        message: String,
    },
}

impl Error {
    /// Whether repeating the failed operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Io { .. } | Error::Store { .. } | Error::Rollover { .. }
        )
    }

    /// Convenience constructor for [`Error::InvalidArgument`].
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Store`].
    pub fn store(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Store {
            source: source.into(),
        }
    }

    /// Convenience constructor for [`Error::Plugin`].
    pub fn plugin(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Plugin {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Rollover`].
    pub fn rollover(step: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Rollover {
            step: step.into(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
