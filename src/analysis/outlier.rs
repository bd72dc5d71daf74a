//! One-standard-deviation outlier filter
//!
//! Keeps the entries of an interval column that lie inside
//! [mean - σ, mean + σ] (population σ), preserving their interval index.

use serde::Serialize;

use super::types::{FilteredEntry, IntervalSeries};

/// Accept band computed from one column
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatBand {
    pub mean: f64,
    pub std_dev: f64,
    pub lower: f64,
    pub upper: f64,
}

impl StatBand {
    /// Population mean ± population standard deviation
    ///
    /// Returns `None` for an empty column.
    pub fn from_values(values: &[i32]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let count = values.len() as f64;
        let mean = values.iter().map(|&v| v as f64).sum::<f64>() / count;
        let variance = values
            .iter()
            .map(|&v| {
                let delta = v as f64 - mean;
                delta * delta
            })
            .sum::<f64>()
            / count;
        let std_dev = variance.sqrt();

        Some(Self {
            mean,
            std_dev,
            lower: mean - std_dev,
            upper: mean + std_dev,
        })
    }

    /// Inclusive band membership
    pub fn contains(&self, value: i32) -> bool {
        let value = value as f64;
        self.lower <= value && value <= self.upper
    }
}

/// Retain the values inside the one-σ band, in index order
///
/// A single value is trivially in band and is returned as `(0, value)`.
pub fn filter_within_one_std_dev(values: &[i32]) -> Vec<FilteredEntry> {
    match values {
        [] => Vec::new(),
        [only] => vec![FilteredEntry {
            index: 0,
            value: *only,
        }],
        _ => {
            let Some(band) = StatBand::from_values(values) else {
                return Vec::new();
            };
            values
                .iter()
                .enumerate()
                .filter(|&(_, &value)| band.contains(value))
                .map(|(index, &value)| FilteredEntry { index, value })
                .collect()
        }
    }
}

/// Filter the mins and maxs columns independently
pub fn filter_columns(series: &IntervalSeries) -> (Vec<FilteredEntry>, Vec<FilteredEntry>) {
    (
        filter_within_one_std_dev(&series.mins()),
        filter_within_one_std_dev(&series.maxs()),
    )
}
