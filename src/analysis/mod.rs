//! Extremal amplitude analysis
//!
//! The core reduces a [`SampleBuffer`] to quantized (min, max) pairs, over the
//! whole buffer and over fixed-length intervals, then filters each interval
//! column to the entries within one standard deviation of its mean.
//!
//! Two interchangeable [`Reducer`] implementations exist:
//! - [`SequentialReducer`]: single-threaded baseline, truncating interval count
//! - [`ParallelReducer`]: two-stage group reduction and one-thread-per-interval
//!   kernel on a [`ComputeDevice`](crate::device::ComputeDevice), ceiling
//!   interval count

use std::time::{Duration, Instant};

use crate::error::AnalysisError;

pub mod outlier;
pub mod parallel;
pub mod partition;
pub mod quantizer;
pub mod sequential;
pub mod types;

pub use outlier::{filter_columns, filter_within_one_std_dev, StatBand};
pub use parallel::ParallelReducer;
pub use partition::{samples_per_interval, CountPolicy, IntervalPlan};
pub use quantizer::{quantize, QUANT_SCALE};
pub use sequential::SequentialReducer;
pub use types::{
    ExtremalPair, FilteredEntry, GlobalReport, IntervalReport, IntervalSeries, ReportStatus,
    SampleBuffer, Timing,
};

/// Capability shared by the sequential and parallel engines
///
/// `EmptyInput` and `DegenerateInterval` come back as reports carrying a
/// [`ReportStatus`] sentinel; only hard failures are `Err`.
pub trait Reducer {
    /// Backend label used in reports and logs
    fn name(&self) -> &str;

    /// Interval count policy this reducer applies
    fn policy(&self) -> CountPolicy;

    fn compute_global(&self, buffer: &SampleBuffer) -> Result<GlobalReport, AnalysisError>;

    fn compute_intervals(
        &self,
        buffer: &SampleBuffer,
        interval_seconds: f64,
    ) -> Result<IntervalReport, AnalysisError>;
}

impl<R: Reducer + ?Sized> Reducer for Box<R> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn policy(&self) -> CountPolicy {
        (**self).policy()
    }

    fn compute_global(&self, buffer: &SampleBuffer) -> Result<GlobalReport, AnalysisError> {
        (**self).compute_global(buffer)
    }

    fn compute_intervals(
        &self,
        buffer: &SampleBuffer,
        interval_seconds: f64,
    ) -> Result<IntervalReport, AnalysisError> {
        (**self).compute_intervals(buffer, interval_seconds)
    }
}

/// Result of validating an interval request before any work runs
pub(crate) enum IntervalSetup {
    Ready(IntervalPlan),
    Skipped(IntervalReport),
}

/// Resolve the interval plan, or the sentinel report for empty input and
/// intervals shorter than one sample
pub(crate) fn setup_intervals(
    backend: &str,
    buffer: &SampleBuffer,
    interval_seconds: f64,
    policy: CountPolicy,
) -> IntervalSetup {
    if buffer.is_empty() {
        tracing::debug!(
            "[{}] {}, skipping interval reduction",
            backend,
            AnalysisError::EmptyInput
        );
        return IntervalSetup::Skipped(IntervalReport::sentinel(
            backend,
            policy,
            samples_per_interval(buffer.sample_rate(), interval_seconds),
            ReportStatus::EmptyInput,
        ));
    }

    match IntervalPlan::new(buffer.len(), buffer.sample_rate(), interval_seconds, policy) {
        Ok(plan) => IntervalSetup::Ready(plan),
        Err(err) => {
            tracing::warn!("[{}] {}", backend, err);
            IntervalSetup::Skipped(IntervalReport::sentinel(
                backend,
                policy,
                0,
                ReportStatus::DegenerateInterval,
            ))
        }
    }
}

/// Apply the outlier filter to both columns and stamp the timing
pub(crate) fn finish_intervals(
    backend: &str,
    plan: &IntervalPlan,
    series: IntervalSeries,
    started: Instant,
    kernel_time: Option<Duration>,
) -> IntervalReport {
    let (filtered_mins, filtered_maxs) = filter_columns(&series);
    let total = started.elapsed();
    let timing = match kernel_time {
        Some(kernel) => Timing::with_kernel(total, kernel),
        None => Timing::host_only(total),
    };

    tracing::debug!(
        "[{}] {} intervals of {} samples ({:?}), kept {} mins / {} maxs",
        backend,
        series.len(),
        plan.samples_per_interval(),
        plan.policy(),
        filtered_mins.len(),
        filtered_maxs.len()
    );

    IntervalReport {
        backend: backend.to_string(),
        policy: plan.policy(),
        samples_per_interval: plan.samples_per_interval(),
        series,
        filtered_mins,
        filtered_maxs,
        status: ReportStatus::Complete,
        timing,
    }
}

#[cfg(test)]
mod tests;
