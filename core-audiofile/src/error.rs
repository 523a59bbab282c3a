//! # Audio File Error Types
//!
//! Error types for opening, reading, seeking and reducing audio files.

use thiserror::Error;

/// Errors that can occur while working with an audio file handle.
#[derive(Error, Debug)]
pub enum AudioFileError {
    // ========================================================================
    // Open Errors
    // ========================================================================
    /// The file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// The file exists but cannot be accessed with the requested permission.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The container or the codec inside it cannot be decoded.
    #[error("Unsupported container or codec: {0}")]
    UnsupportedFormat(String),

    // ========================================================================
    // Format Errors
    // ========================================================================
    /// The requested client format is not a readable linear PCM format.
    #[error("Invalid client format: {0}")]
    InvalidClientFormat(String),

    // ========================================================================
    // Decoding Errors
    // ========================================================================
    /// The decode session failed and could not deliver any frames.
    #[error("Decode I/O failure: {0}")]
    DecodeIo(String),

    /// The handle was dropped while work on it was still pending.
    #[error("Audio file handle closed")]
    HandleClosed,

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Configuration values are out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AudioFileError {
    /// Maps an I/O error raised while opening `path` to the open-error taxonomy.
    pub fn from_open_io(path: &std::path::Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => {
                AudioFileError::FileNotFound(path.display().to_string())
            }
            std::io::ErrorKind::PermissionDenied => {
                AudioFileError::PermissionDenied(path.display().to_string())
            }
            _ => AudioFileError::Io(err),
        }
    }

    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, AudioFileError::DecodeIo(_) | AudioFileError::Io(_))
    }

    /// Returns `true` if this error is related to audio format/codec issues.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            AudioFileError::UnsupportedFormat(_) | AudioFileError::InvalidClientFormat(_)
        )
    }
}

/// Result type for audio file operations.
pub type Result<T> = std::result::Result<T, AudioFileError>;
