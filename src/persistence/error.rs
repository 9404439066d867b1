//! Error types for the persistence layer.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by snapshot stores and subscriber directories.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Reading or parsing the subscriber file failed.
    #[error("failed to load subscriber file {path}")]
    SubscriberFile {
        /// The file that could not be loaded.
        path: PathBuf,
        /// The underlying loader failure.
        #[source]
        source: config::ConfigError,
    },

    /// A storage backend failed.
    #[error("storage operation failed: {0}")]
    Storage(String),
}
