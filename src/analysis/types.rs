// Shared data model for the reducers
//
// Buffers flow in, quantized extremal pairs and filtered interval columns
// flow out. Reports are serializable so the CLI can emit them as JSON.

use std::time::Duration;

use serde::Serialize;

use super::partition::CountPolicy;

/// Mono PCM samples normalized to [-1.0, 1.0] plus their sample rate
///
/// Reducers only borrow the buffer; nothing in the core mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Signal length in seconds (0 when the rate is 0)
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Quantized (min, max) of a buffer or of one interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExtremalPair {
    pub min: i32,
    pub max: i32,
}

impl ExtremalPair {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }
}

/// Per-interval extremal pairs, index 0 is the first interval in time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct IntervalSeries {
    pairs: Vec<ExtremalPair>,
}

impl IntervalSeries {
    pub fn new(pairs: Vec<ExtremalPair>) -> Self {
        Self { pairs }
    }

    pub fn pairs(&self) -> &[ExtremalPair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn mins(&self) -> Vec<i32> {
        self.pairs.iter().map(|pair| pair.min).collect()
    }

    pub fn maxs(&self) -> Vec<i32> {
        self.pairs.iter().map(|pair| pair.max).collect()
    }
}

impl FromIterator<ExtremalPair> for IntervalSeries {
    fn from_iter<I: IntoIterator<Item = ExtremalPair>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().collect(),
        }
    }
}

/// One value kept by the outlier filter, tagged with its interval index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FilteredEntry {
    pub index: usize,
    pub value: i32,
}

/// Outcome of an analysis call that produced no error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Complete,
    /// Sentinel for a zero-length buffer
    EmptyInput,
    /// Sentinel for an interval shorter than one sample
    DegenerateInterval,
}

/// Wall-clock cost of one analysis call
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Timing {
    /// Host plus device time
    pub total_seconds: f64,
    /// Device-only execution time, 0 for the sequential path
    pub kernel_seconds: f64,
}

impl Timing {
    pub fn host_only(total: Duration) -> Self {
        Self {
            total_seconds: total.as_secs_f64(),
            kernel_seconds: 0.0,
        }
    }

    pub fn with_kernel(total: Duration, kernel: Duration) -> Self {
        Self {
            total_seconds: total.as_secs_f64(),
            kernel_seconds: kernel.as_secs_f64(),
        }
    }
}

/// Whole-buffer extrema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalReport {
    pub backend: String,
    pub sample_count: usize,
    /// `None` exactly when `status` is `EmptyInput`
    pub extrema: Option<ExtremalPair>,
    pub status: ReportStatus,
    pub timing: Timing,
}

impl GlobalReport {
    pub(crate) fn empty(backend: &str) -> Self {
        Self {
            backend: backend.to_string(),
            sample_count: 0,
            extrema: None,
            status: ReportStatus::EmptyInput,
            timing: Timing::default(),
        }
    }
}

/// Per-interval extrema plus their filtered columns
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalReport {
    pub backend: String,
    pub policy: CountPolicy,
    pub samples_per_interval: usize,
    pub series: IntervalSeries,
    pub filtered_mins: Vec<FilteredEntry>,
    pub filtered_maxs: Vec<FilteredEntry>,
    pub status: ReportStatus,
    pub timing: Timing,
}

impl IntervalReport {
    pub(crate) fn sentinel(
        backend: &str,
        policy: CountPolicy,
        samples_per_interval: usize,
        status: ReportStatus,
    ) -> Self {
        Self {
            backend: backend.to_string(),
            policy,
            samples_per_interval,
            series: IntervalSeries::default(),
            filtered_mins: Vec::new(),
            filtered_maxs: Vec::new(),
            status,
            timing: Timing::default(),
        }
    }

    pub fn interval_count(&self) -> usize {
        self.series.len()
    }

    pub fn mins(&self) -> Vec<i32> {
        self.series.mins()
    }

    pub fn maxs(&self) -> Vec<i32> {
        self.series.maxs()
    }
}
