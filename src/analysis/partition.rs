// Interval partitioning
//
// Interval size is `floor(rate * seconds)`. Two count policies coexist:
// the sequential baseline truncates (a trailing partial interval is dropped)
// and the parallel engine uses the ceiling (the trailing partial interval is
// kept and clamped to the buffer end). Callers always see which one produced a
// plan.

use std::ops::Range;

use serde::Serialize;

use crate::error::AnalysisError;

/// How a trailing partial interval is counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CountPolicy {
    /// `floor(N / spi)`: drop a trailing partial interval
    Truncating,
    /// `ceil(N / spi)`: keep a trailing partial interval
    Ceiling,
}

impl CountPolicy {
    pub fn interval_count(self, sample_count: usize, samples_per_interval: usize) -> usize {
        if samples_per_interval == 0 {
            return 0;
        }
        match self {
            CountPolicy::Truncating => sample_count / samples_per_interval,
            CountPolicy::Ceiling => sample_count.div_ceil(samples_per_interval),
        }
    }
}

/// Samples per interval for a rate and an interval length
///
/// Zero, negative or NaN products yield 0.
pub fn samples_per_interval(sample_rate: u32, interval_seconds: f64) -> usize {
    (sample_rate as f64 * interval_seconds).floor() as usize
}

/// Interval boundaries of one buffer under one policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalPlan {
    sample_count: usize,
    samples_per_interval: usize,
    interval_count: usize,
    policy: CountPolicy,
}

impl IntervalPlan {
    /// Partition `sample_count` samples into intervals of `interval_seconds`
    ///
    /// # Errors
    /// `DegenerateInterval` when the interval is shorter than one sample.
    pub fn new(
        sample_count: usize,
        sample_rate: u32,
        interval_seconds: f64,
        policy: CountPolicy,
    ) -> Result<Self, AnalysisError> {
        let spi = samples_per_interval(sample_rate, interval_seconds);
        if spi == 0 {
            return Err(AnalysisError::DegenerateInterval {
                sample_rate,
                interval_seconds,
            });
        }
        Ok(Self::with_interval_size(sample_count, spi, policy))
    }

    /// Partition with an explicit interval size (must be non-zero)
    pub fn with_interval_size(
        sample_count: usize,
        samples_per_interval: usize,
        policy: CountPolicy,
    ) -> Self {
        debug_assert!(samples_per_interval > 0);
        Self {
            sample_count,
            samples_per_interval,
            interval_count: policy.interval_count(sample_count, samples_per_interval),
            policy,
        }
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn samples_per_interval(&self) -> usize {
        self.samples_per_interval
    }

    pub fn interval_count(&self) -> usize {
        self.interval_count
    }

    pub fn policy(&self) -> CountPolicy {
        self.policy
    }

    /// Sample range of interval `index`, clamped to the buffer end
    pub fn range(&self, index: usize) -> Range<usize> {
        let start = (index * self.samples_per_interval).min(self.sample_count);
        let end = (start + self.samples_per_interval).min(self.sample_count);
        start..end
    }

    pub fn ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.interval_count).map(move |index| self.range(index))
    }
}
