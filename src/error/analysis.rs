// Analysis error types and constants

use crate::error::ErrorCode;
use log::error;
use serde::Serialize;
use std::fmt;

/// Analysis error code constants
///
/// Error code range: 1001-1005
pub struct AnalysisErrorCodes {}

impl AnalysisErrorCodes {
    /// Sample buffer holds zero samples
    pub const EMPTY_INPUT: i32 = 1001;

    /// Interval is shorter than one sample period
    pub const DEGENERATE_INTERVAL: i32 = 1002;

    /// Parallel device could not be created or used
    pub const DEVICE_FAILURE: i32 = 1003;

    /// Group size is zero, not a power of two, or above the device limit
    pub const INVALID_GROUP_SIZE: i32 = 1004;

    /// Interval length is not a positive finite number of seconds
    pub const INVALID_INTERVAL: i32 = 1005;
}

/// Step of the device pipeline that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStage {
    Adapter,
    Device,
    Allocation,
    ShaderBuild,
    Dispatch,
    Readback,
    Timeout,
}

impl fmt::Display for DeviceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceStage::Adapter => "adapter request",
            DeviceStage::Device => "device request",
            DeviceStage::Allocation => "buffer allocation",
            DeviceStage::ShaderBuild => "shader build",
            DeviceStage::Dispatch => "kernel dispatch",
            DeviceStage::Readback => "result readback",
            DeviceStage::Timeout => "completion wait",
        };
        f.write_str(name)
    }
}

/// Log an analysis error with structured context
///
/// Logs the numeric code, the failing component and the message.
pub fn log_analysis_error(err: &AnalysisError, context: &str) {
    error!(
        "Analysis error in {}: code={}, component=Reducer, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by the reduction core
///
/// `EmptyInput` and `DegenerateInterval` are non-fatal: reducers report them
/// through `ReportStatus` instead of returning them. `DeviceFailure` is the
/// hard failure of the parallel path.
///
/// Error code ranges: 1001-1005
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Sample buffer holds zero samples
    EmptyInput,

    /// `floor(sample_rate * interval_seconds)` is zero
    DegenerateInterval {
        sample_rate: u32,
        interval_seconds: f64,
    },

    /// Device context, allocation, build, dispatch or readback failed
    DeviceFailure { stage: DeviceStage, reason: String },

    /// Group size rejected by the parallel reducer
    InvalidGroupSize { group_size: u32, max: u32 },

    /// Interval length is not a positive finite number of seconds
    InvalidInterval { interval_seconds: f64 },
}

impl AnalysisError {
    pub(crate) fn device(stage: DeviceStage, reason: impl fmt::Display) -> Self {
        AnalysisError::DeviceFailure {
            stage,
            reason: reason.to_string(),
        }
    }

    /// True for the class of errors that makes the parallel path unusable
    pub fn is_device_failure(&self) -> bool {
        matches!(self, AnalysisError::DeviceFailure { .. })
    }
}

impl ErrorCode for AnalysisError {
    fn code(&self) -> i32 {
        match self {
            AnalysisError::EmptyInput => AnalysisErrorCodes::EMPTY_INPUT,
            AnalysisError::DegenerateInterval { .. } => AnalysisErrorCodes::DEGENERATE_INTERVAL,
            AnalysisError::DeviceFailure { .. } => AnalysisErrorCodes::DEVICE_FAILURE,
            AnalysisError::InvalidGroupSize { .. } => AnalysisErrorCodes::INVALID_GROUP_SIZE,
            AnalysisError::InvalidInterval { .. } => AnalysisErrorCodes::INVALID_INTERVAL,
        }
    }

    fn message(&self) -> String {
        match self {
            AnalysisError::EmptyInput => "Sample buffer is empty".to_string(),
            AnalysisError::DegenerateInterval {
                sample_rate,
                interval_seconds,
            } => format!(
                "Interval of {}s at {} Hz is shorter than one sample",
                interval_seconds, sample_rate
            ),
            AnalysisError::DeviceFailure { stage, reason } => {
                format!("Device failure during {}: {}", stage, reason)
            }
            AnalysisError::InvalidGroupSize { group_size, max } => format!(
                "Group size must be a power of two between 1 and {} (got {})",
                max, group_size
            ),
            AnalysisError::InvalidInterval { interval_seconds } => format!(
                "Interval length must be a positive number of seconds (got {})",
                interval_seconds
            ),
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AnalysisError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AnalysisError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(AnalysisError::EmptyInput.code(), 1001);
        assert_eq!(
            AnalysisError::DegenerateInterval {
                sample_rate: 10,
                interval_seconds: 0.01
            }
            .code(),
            1002
        );
        assert_eq!(
            AnalysisError::device(DeviceStage::Adapter, "no adapter").code(),
            1003
        );
    }

    #[test]
    fn test_device_failure_message_names_stage() {
        let err = AnalysisError::device(DeviceStage::ShaderBuild, "bad wgsl");
        assert!(err.is_device_failure());
        assert_eq!(
            err.message(),
            "Device failure during shader build: bad wgsl"
        );
        assert!(err.to_string().contains("code 1003"));
    }

    #[test]
    fn test_group_size_error_is_not_device_failure() {
        let err = AnalysisError::InvalidGroupSize {
            group_size: 3,
            max: 256,
        };
        assert!(!err.is_device_failure());
        assert!(err.message().contains("got 3"));
    }
}
