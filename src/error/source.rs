// Sample source error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Sample source error code constants
///
/// Error code range: 2001-2004
pub struct SourceErrorCodes {}

impl SourceErrorCodes {
    /// Source file does not exist or cannot be opened
    pub const NOT_FOUND: i32 = 2001;

    /// Source content could not be parsed
    pub const MALFORMED: i32 = 2002;

    /// Source decoded to zero samples
    pub const EMPTY: i32 = 2003;

    /// Source uses an encoding this crate does not decode
    pub const UNSUPPORTED: i32 = 2004;
}

/// Log a source error with structured context
pub fn log_source_error(err: &SourceError, context: &str) {
    error!(
        "Source error in {}: code={}, component=SampleSource, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised while loading or persisting samples
///
/// Error code ranges: 2001-2004
#[derive(Debug, Clone, PartialEq)]
pub enum SourceError {
    /// Source file is missing or unreadable
    NotFound { path: String, reason: String },

    /// Source content is not valid for its format
    Malformed { path: String, reason: String },

    /// Source yielded no samples
    Empty { path: String },

    /// Format variant that is not decoded
    Unsupported { path: String, reason: String },
}

impl ErrorCode for SourceError {
    fn code(&self) -> i32 {
        match self {
            SourceError::NotFound { .. } => SourceErrorCodes::NOT_FOUND,
            SourceError::Malformed { .. } => SourceErrorCodes::MALFORMED,
            SourceError::Empty { .. } => SourceErrorCodes::EMPTY,
            SourceError::Unsupported { .. } => SourceErrorCodes::UNSUPPORTED,
        }
    }

    fn message(&self) -> String {
        match self {
            SourceError::NotFound { path, reason } => {
                format!("Cannot open {}: {}", path, reason)
            }
            SourceError::Malformed { path, reason } => {
                format!("Malformed samples in {}: {}", path, reason)
            }
            SourceError::Empty { path } => format!("{} contains no samples", path),
            SourceError::Unsupported { path, reason } => {
                format!("Unsupported format in {}: {}", path, reason)
            }
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SourceError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SourceError {}
