// Sequential reducer - single-threaded baseline
//
// One pass over the buffer for the global pair; one pass per interval under
// the truncating count for the windowed variant. This is the reference the
// parallel engine is checked against.

use std::time::Instant;

use super::partition::CountPolicy;
use super::quantizer::quantize;
use super::types::{
    ExtremalPair, GlobalReport, IntervalReport, IntervalSeries, ReportStatus, SampleBuffer,
    Timing,
};
use super::{finish_intervals, setup_intervals, IntervalSetup, Reducer};
use crate::error::AnalysisError;

const BACKEND: &str = "sequential";

/// Raw (min, max) of a slice, `None` when empty
pub(crate) fn raw_extrema(samples: &[f32]) -> Option<(f32, f32)> {
    let (&first, rest) = samples.split_first()?;
    Some(rest.iter().fold((first, first), |(lo, hi), &sample| {
        (lo.min(sample), hi.max(sample))
    }))
}

/// Quantized pair of a slice; an empty slice yields `(0, 0)`
fn quantized_extrema(samples: &[f32]) -> ExtremalPair {
    match raw_extrema(samples) {
        Some((lo, hi)) => ExtremalPair::new(quantize(lo), quantize(hi)),
        // Unreachable under the truncating count: every interval is full.
        None => ExtremalPair::new(0, 0),
    }
}

/// Single-threaded reducer
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialReducer;

impl SequentialReducer {
    pub fn new() -> Self {
        Self
    }
}

impl Reducer for SequentialReducer {
    fn name(&self) -> &str {
        BACKEND
    }

    fn policy(&self) -> CountPolicy {
        CountPolicy::Truncating
    }

    fn compute_global(&self, buffer: &SampleBuffer) -> Result<GlobalReport, AnalysisError> {
        let started = Instant::now();
        let Some((lo, hi)) = raw_extrema(buffer.samples()) else {
            tracing::debug!(
                "[SequentialReducer] {}, no global extrema",
                AnalysisError::EmptyInput
            );
            return Ok(GlobalReport::empty(BACKEND));
        };

        let extrema = ExtremalPair::new(quantize(lo), quantize(hi));
        let timing = Timing::host_only(started.elapsed());
        tracing::debug!(
            "[SequentialReducer] Global min={} max={} over {} samples",
            extrema.min,
            extrema.max,
            buffer.len()
        );

        Ok(GlobalReport {
            backend: BACKEND.to_string(),
            sample_count: buffer.len(),
            extrema: Some(extrema),
            status: ReportStatus::Complete,
            timing,
        })
    }

    fn compute_intervals(
        &self,
        buffer: &SampleBuffer,
        interval_seconds: f64,
    ) -> Result<IntervalReport, AnalysisError> {
        let started = Instant::now();
        let plan = match setup_intervals(BACKEND, buffer, interval_seconds, self.policy()) {
            IntervalSetup::Ready(plan) => plan,
            IntervalSetup::Skipped(report) => return Ok(report),
        };

        let samples = buffer.samples();
        let series: IntervalSeries = plan
            .ranges()
            .map(|range| quantized_extrema(&samples[range]))
            .collect();

        Ok(finish_intervals(BACKEND, &plan, series, started, None))
    }
}
