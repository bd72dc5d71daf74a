//! Configuration management for analysis runs
//!
//! This module provides runtime configuration loading from JSON files so that
//! interval length, device group sizes and synthetic signal parameters can be
//! tuned without recompilation. Every section has defaults and partial files
//! are accepted.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Sample rate assumed for sources that do not carry one (text files)
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Work-group size used by the two-stage global reduction
pub const DEFAULT_GROUP_SIZE: u32 = 256;

/// Work-group size used by the one-thread-per-interval kernel
pub const DEFAULT_INTERVAL_GROUP_SIZE: u32 = 64;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub analysis: AnalysisConfig,
    pub device: DeviceConfig,
    pub synthetic: SyntheticConfig,
}

/// Interval analysis parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Sample rate used for sources without one
    pub sample_rate: u32,
    /// Interval length in seconds
    pub interval_seconds: f64,
    /// Number of leading intervals printed in console reports
    pub preview_intervals: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            interval_seconds: 1.0,
            preview_intervals: 10,
        }
    }
}

/// Preferred GPU adapter class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerPreference {
    HighPerformance,
    LowPower,
}

/// Parallel device configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Threads per group for the global reduction (power of two)
    pub group_size: u32,
    /// Threads per group for the interval kernel (power of two)
    pub interval_group_size: u32,
    /// Worker threads for the CPU device, 0 lets rayon decide
    pub cpu_threads: usize,
    /// Upper bound on waiting for a dispatched kernel, `None` waits forever
    pub completion_timeout_ms: Option<u64>,
    pub power_preference: PowerPreference,
    /// Re-run on the sequential reducer when the device fails
    pub fallback_to_sequential: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            group_size: DEFAULT_GROUP_SIZE,
            interval_group_size: DEFAULT_INTERVAL_GROUP_SIZE,
            cpu_threads: 0,
            completion_timeout_ms: Some(30_000),
            power_preference: PowerPreference::HighPerformance,
            fallback_to_sequential: true,
        }
    }
}

impl DeviceConfig {
    pub fn completion_timeout(&self) -> Option<Duration> {
        self.completion_timeout_ms.map(Duration::from_millis)
    }
}

/// Synthetic signal generator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Length of generated signals in seconds
    pub duration_seconds: f64,
    /// Seed for reproducible noise, random when absent
    pub seed: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 10.0,
            seed: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or the defaults when the file is missing or
    /// its JSON is invalid (the failure is logged).
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }
}
