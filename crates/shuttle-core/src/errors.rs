//! Error taxonomy for batch synchronisation.
//!
//! Every error carries a category so the scheduler that re-invokes a failed
//! batch can tell transient failures from permanent ones:
//! - Retryable: transient failures that may succeed on a later run (network, timeouts)
//! - Fatal: permanent failures that will not succeed without operator action

use std::io;

use crate::stats::TransferStats;

/// Category of an error for retry decision-making.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Transient error - a later run may succeed (network timeout, reset connection, etc.)
    Retryable,
    /// Permanent error - a later run will fail the same way (bad config, permission denied, etc.)
    Fatal,
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Invalid batch count, chunk size or missing descriptor fields.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("unsupported adapter type: {0}")]
    UnsupportedAdapter(String),

    /// A directory could not be enumerated.
    #[error("failed to list {path}: {source}")]
    Listing {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("path not found: {0}")]
    NotFound(String),

    /// Read, write or rename failure while moving one file.
    #[error("transfer failed for {path}: {source}")]
    Transfer {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("checkpoint store error: {0}")]
    Checkpoint(String),

    #[error("connection '{id}' failed: {message}")]
    Connection { id: String, message: String },

    /// A file-level failure that aborted the rest of the batch.
    #[error("file sync failed at '{file_name}': {source}")]
    BatchFailed {
        file_name: String,
        #[source]
        source: Box<SyncError>,
        stats: TransferStats,
    },
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn transfer(path: impl Into<String>, source: io::Error) -> Self {
        Self::Transfer {
            path: path.into(),
            source,
        }
    }

    pub fn listing(path: impl Into<String>, source: io::Error) -> Self {
        Self::Listing {
            path: path.into(),
            source,
        }
    }

    /// Map an I/O failure on `path`, keeping "not found" distinguishable.
    pub fn from_io(path: impl Into<String>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound(path)
        } else {
            Self::transfer(path, source)
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Transfer { source, .. } | Self::Listing { source, .. } => {
                source.kind() == io::ErrorKind::NotFound
            }
            _ => false,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) | Self::UnsupportedAdapter(_) | Self::NotFound(_) => {
                ErrorCategory::Fatal
            }
            Self::Listing { source, .. } | Self::Transfer { source, .. } => {
                categorize_io_error(source)
            }
            Self::Checkpoint(_) | Self::Connection { .. } => ErrorCategory::Retryable,
            Self::BatchFailed { source, .. } => source.category(),
        }
    }

    /// Stats accumulated before a batch aborted, if this is a batch failure.
    pub fn stats(&self) -> Option<&TransferStats> {
        match self {
            Self::BatchFailed { stats, .. } => Some(stats),
            _ => None,
        }
    }
}

/// Categorize an IO error for retry decisions.
pub fn categorize_io_error(err: &io::Error) -> ErrorCategory {
    match err.kind() {
        io::ErrorKind::TimedOut
        | io::ErrorKind::Interrupted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::WouldBlock
        | io::ErrorKind::UnexpectedEof
        | io::ErrorKind::NotConnected => ErrorCategory::Retryable,

        io::ErrorKind::PermissionDenied
        | io::ErrorKind::NotFound
        | io::ErrorKind::InvalidData
        | io::ErrorKind::InvalidInput
        | io::ErrorKind::AlreadyExists => ErrorCategory::Fatal,

        // Unknown errors - default to fatal to avoid retry loops
        _ => ErrorCategory::Fatal,
    }
}
