//! Device-parallel kernel dispatch
//!
//! A [`ComputeDevice`] runs the two reduction kernels used by the parallel
//! reducer:
//! - group extrema: each group of `group_size` threads loads at most one
//!   sample per thread, tree-reduces its scratch after a barrier and writes one
//!   (min, max) slot per group
//! - interval extrema: one thread per interval scans its clamped range and
//!   writes its own slot
//!
//! Submitting copies the host samples into a device-resident buffer and
//! returns a [`Submission`]. Output slots are only reachable through
//! [`Submission::wait`], which blocks until the device signals completion.

use std::fmt;
use std::time::Duration;

use crate::error::AnalysisError;

pub mod cpu;
pub mod gpu;

pub use cpu::CpuDevice;
pub use gpu::WgpuDevice;

/// Per-group or per-interval raw extrema written by a kernel
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtremaSlots {
    pub mins: Vec<f32>,
    pub maxs: Vec<f32>,
}

impl ExtremaSlots {
    pub fn len(&self) -> usize {
        self.mins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mins.is_empty()
    }
}

/// Kernel results plus device-only execution time
#[derive(Debug, Clone)]
pub struct KernelOutput {
    pub slots: ExtremaSlots,
    pub kernel_time: Duration,
}

type Waiter = Box<dyn FnOnce(Option<Duration>) -> Result<KernelOutput, AnalysisError> + Send>;

/// Completion handle of one dispatched kernel
///
/// The host may only read kernel outputs through [`Submission::wait`].
pub struct Submission {
    label: String,
    waiter: Waiter,
}

impl Submission {
    pub fn new<F>(label: impl Into<String>, waiter: F) -> Self
    where
        F: FnOnce(Option<Duration>) -> Result<KernelOutput, AnalysisError> + Send + 'static,
    {
        Self {
            label: label.into(),
            waiter: Box::new(waiter),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Block until the kernel completes, or fail with a `Timeout` device
    /// failure once `timeout` has elapsed
    pub fn wait(self, timeout: Option<Duration>) -> Result<KernelOutput, AnalysisError> {
        tracing::trace!("[Submission] Waiting on {}", self.label);
        (self.waiter)(timeout)
    }
}

impl fmt::Debug for Submission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Submission")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Launch geometry of the two-stage global reduction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupDispatch {
    pub sample_count: usize,
    pub group_size: usize,
    pub group_count: usize,
}

impl GroupDispatch {
    /// Smallest whole number of groups covering `sample_count` threads
    pub fn for_samples(sample_count: usize, group_size: usize) -> Self {
        let group_count = sample_count.div_ceil(group_size).max(1);
        Self {
            sample_count,
            group_size,
            group_count,
        }
    }

    /// Total dispatched threads, the smallest multiple of the group size ≥ N
    pub fn global_size(&self) -> usize {
        self.group_count * self.group_size
    }
}

/// Launch geometry of the one-thread-per-interval kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalDispatch {
    pub sample_count: usize,
    pub samples_per_interval: usize,
    pub interval_count: usize,
    /// Threads per group, only meaningful for hardware devices
    pub group_size: usize,
}

/// A device able to run the extrema kernels
pub trait ComputeDevice: Send + Sync {
    /// Human-readable device description
    fn label(&self) -> String;

    /// Largest group size this device accepts
    fn max_group_size(&self) -> u32;

    fn submit_group_extrema(
        &self,
        samples: &[f32],
        dispatch: GroupDispatch,
    ) -> Result<Submission, AnalysisError>;

    fn submit_interval_extrema(
        &self,
        samples: &[f32],
        dispatch: IntervalDispatch,
    ) -> Result<Submission, AnalysisError>;
}

impl<D: ComputeDevice + ?Sized> ComputeDevice for Box<D> {
    fn label(&self) -> String {
        (**self).label()
    }

    fn max_group_size(&self) -> u32 {
        (**self).max_group_size()
    }

    fn submit_group_extrema(
        &self,
        samples: &[f32],
        dispatch: GroupDispatch,
    ) -> Result<Submission, AnalysisError> {
        (**self).submit_group_extrema(samples, dispatch)
    }

    fn submit_interval_extrema(
        &self,
        samples: &[f32],
        dispatch: IntervalDispatch,
    ) -> Result<Submission, AnalysisError> {
        (**self).submit_interval_extrema(samples, dispatch)
    }
}

/// Group sizes must be powers of two within the device limit so the tree
/// reduction halves cleanly
pub fn validate_group_size(group_size: u32, max: u32) -> Result<(), AnalysisError> {
    if group_size == 0 || !group_size.is_power_of_two() || group_size > max {
        return Err(AnalysisError::InvalidGroupSize { group_size, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_size_rounds_up_to_group_multiple() {
        let dispatch = GroupDispatch::for_samples(1_000, 256);
        assert_eq!(dispatch.group_count, 4);
        assert_eq!(dispatch.global_size(), 1_024);

        let exact = GroupDispatch::for_samples(512, 256);
        assert_eq!(exact.group_count, 2);
        assert_eq!(exact.global_size(), 512);
    }

    #[test]
    fn test_single_sample_still_dispatches_one_group() {
        let dispatch = GroupDispatch::for_samples(1, 256);
        assert_eq!(dispatch.group_count, 1);
        assert_eq!(dispatch.global_size(), 256);
    }

    #[test]
    fn test_validate_group_size() {
        assert!(validate_group_size(1, 256).is_ok());
        assert!(validate_group_size(256, 256).is_ok());
        assert!(validate_group_size(0, 256).is_err());
        assert!(validate_group_size(96, 256).is_err());
        assert_eq!(
            validate_group_size(512, 256),
            Err(AnalysisError::InvalidGroupSize {
                group_size: 512,
                max: 256
            })
        );
    }

    #[test]
    fn test_submission_wait_runs_waiter() {
        let submission = Submission::new("fixed", |_| {
            Ok(KernelOutput {
                slots: ExtremaSlots {
                    mins: vec![-0.5],
                    maxs: vec![0.5],
                },
                kernel_time: Duration::from_micros(3),
            })
        });
        assert_eq!(submission.label(), "fixed");
        let output = submission.wait(None).unwrap();
        assert_eq!(output.slots.len(), 1);
        assert_eq!(output.kernel_time, Duration::from_micros(3));
    }
}
