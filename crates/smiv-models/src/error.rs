// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for network description operations

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for network description operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors that can occur while building, parsing or loading a network
#[derive(Debug, Error)]
pub enum ModelError {
    /// Network description file not found
    #[error("Network file not found: {path}")]
    FileNotFound {
        /// Path that was attempted
        path: PathBuf,
    },

    /// Description text could not be parsed
    #[error("Parse error on line {line}: {reason}")]
    ParseError {
        /// 1-based line number
        line: usize,
        /// Reason for failure
        reason: String,
    },

    /// Invalid layer configuration
    #[error("Invalid layer: {reason}")]
    InvalidLayer {
        /// Reason for failure
        reason: String,
    },

    /// Weight or input blob has the wrong size or encoding
    #[error("Invalid data blob: {reason}")]
    InvalidBlob {
        /// Reason for failure
        reason: String,
    },

    /// Unknown zoo network name
    #[error("Unknown zoo network: {name}")]
    UnknownNetwork {
        /// Name that was requested
        name: String,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

impl ModelError {
    /// Create a parse error
    pub fn parse_error(line: usize, reason: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            reason: reason.into(),
        }
    }

    /// Create an invalid layer error
    pub fn invalid_layer(reason: impl Into<String>) -> Self {
        Self::InvalidLayer {
            reason: reason.into(),
        }
    }

    /// Create an invalid blob error
    pub fn invalid_blob(reason: impl Into<String>) -> Self {
        Self::InvalidBlob {
            reason: reason.into(),
        }
    }
}
