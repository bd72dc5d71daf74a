// Error types for the extrema analysis crate
//
// This module defines custom error types for the reduction core and the
// sample sources feeding it, with numeric codes so CLI and JSON consumers can
// match on failures without parsing messages.

mod analysis;
mod source;

pub use analysis::{log_analysis_error, AnalysisError, AnalysisErrorCodes, DeviceStage};
pub use source::{log_source_error, SourceError, SourceErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
