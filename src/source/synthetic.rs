// Synthetic source - generated test signals
//
// Uniform noise over [-1, 1] is the benchmark workload; sine and ramp give
// signals with known extrema.

use std::f32::consts::PI;

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::SampleSource;
use crate::analysis::SampleBuffer;
use crate::config::SyntheticConfig;
use crate::error::SourceError;

/// Supported synthetic waveforms
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyntheticPattern {
    /// Independent uniform samples in [-1.0, 1.0]
    Uniform,
    Sine { frequency_hz: f32, amplitude: f32 },
    /// Linear sweep from -1.0 to 1.0 inclusive
    Ramp,
}

/// Generator for a fixed-length synthetic signal
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    pattern: SyntheticPattern,
    sample_rate: u32,
    duration_seconds: f64,
    seed: Option<u64>,
}

impl SyntheticSource {
    pub fn new(pattern: SyntheticPattern, sample_rate: u32, duration_seconds: f64) -> Self {
        Self {
            pattern,
            sample_rate,
            duration_seconds,
            seed: None,
        }
    }

    pub fn from_config(
        pattern: SyntheticPattern,
        sample_rate: u32,
        config: &SyntheticConfig,
    ) -> Self {
        Self::new(pattern, sample_rate, config.duration_seconds).with_seed(config.seed)
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Number of samples the signal will hold
    pub fn sample_count(&self) -> usize {
        let count = self.sample_rate as f64 * self.duration_seconds;
        if count.is_finite() && count > 0.0 {
            count as usize
        } else {
            0
        }
    }

    pub fn generate(&self) -> Vec<f32> {
        let count = self.sample_count();
        match self.pattern {
            SyntheticPattern::Uniform => {
                let mut rng = match self.seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_entropy(),
                };
                (0..count).map(|_| rng.gen_range(-1.0f32..=1.0)).collect()
            }
            SyntheticPattern::Sine {
                frequency_hz,
                amplitude,
            } => {
                let rate = self.sample_rate.max(1) as f32;
                (0..count)
                    .map(|i| amplitude * (2.0 * PI * frequency_hz * i as f32 / rate).sin())
                    .collect()
            }
            SyntheticPattern::Ramp => match count {
                0 => Vec::new(),
                1 => vec![-1.0],
                _ => {
                    let last = (count - 1) as f32;
                    (0..count).map(|i| -1.0 + 2.0 * i as f32 / last).collect()
                }
            },
        }
    }
}

impl SampleSource for SyntheticSource {
    fn describe(&self) -> String {
        format!(
            "synthetic {:?} {}s @ {} Hz",
            self.pattern, self.duration_seconds, self.sample_rate
        )
    }

    fn load(&self) -> Result<SampleBuffer, SourceError> {
        let samples = self.generate();
        if samples.is_empty() {
            return Err(SourceError::Empty {
                path: self.describe(),
            });
        }
        tracing::info!(
            "[SyntheticSource] Generated {} samples ({:?})",
            samples.len(),
            self.pattern
        );
        Ok(SampleBuffer::new(samples, self.sample_rate))
    }
}
