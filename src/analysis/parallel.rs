// Parallel reducer - device-backed two-stage reduction
//
// Global: the device writes one raw (min, max) per group, the host folds the
// group slots and quantizes once. Intervals: the device writes one raw pair
// per interval under the ceiling count, the host quantizes each slot and
// applies the outlier filter. Group size is validated before anything is
// dispatched, and an empty buffer never reaches the device.

use std::time::{Duration, Instant};

use super::partition::CountPolicy;
use super::quantizer::quantize;
use super::types::{
    ExtremalPair, GlobalReport, IntervalReport, IntervalSeries, ReportStatus, SampleBuffer,
    Timing,
};
use super::{finish_intervals, setup_intervals, IntervalSetup, Reducer};
use crate::config::{DeviceConfig, DEFAULT_GROUP_SIZE, DEFAULT_INTERVAL_GROUP_SIZE};
use crate::device::{validate_group_size, ComputeDevice, GroupDispatch, IntervalDispatch};
use crate::error::{AnalysisError, DeviceStage};

/// Reducer running its kernels on a [`ComputeDevice`]
pub struct ParallelReducer<D: ComputeDevice> {
    device: D,
    name: String,
    group_size: u32,
    interval_group_size: u32,
    timeout: Option<Duration>,
}

impl<D: ComputeDevice> ParallelReducer<D> {
    /// Reducer with the default group sizes and no completion timeout
    pub fn new(device: D) -> Self {
        let name = format!("parallel {}", device.label());
        Self {
            device,
            name,
            group_size: DEFAULT_GROUP_SIZE,
            interval_group_size: DEFAULT_INTERVAL_GROUP_SIZE,
            timeout: None,
        }
    }

    /// Reducer taking group sizes and the completion timeout from `config`
    pub fn from_config(device: D, config: &DeviceConfig) -> Self {
        Self::new(device)
            .with_group_size(config.group_size)
            .with_interval_group_size(config.interval_group_size)
            .with_timeout(config.completion_timeout())
    }

    pub fn with_group_size(mut self, group_size: u32) -> Self {
        self.group_size = group_size;
        self
    }

    pub fn with_interval_group_size(mut self, group_size: u32) -> Self {
        self.interval_group_size = group_size;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn checked_group_size(&self, group_size: u32) -> Result<usize, AnalysisError> {
        validate_group_size(group_size, self.device.max_group_size())?;
        Ok(group_size as usize)
    }
}

/// Fold group slots into the buffer's raw extrema
fn fold_slots(mins: &[f32], maxs: &[f32]) -> Option<(f32, f32)> {
    if mins.is_empty() || maxs.is_empty() {
        return None;
    }
    let lo = mins.iter().copied().fold(f32::INFINITY, f32::min);
    let hi = maxs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    Some((lo, hi))
}

impl<D: ComputeDevice> Reducer for ParallelReducer<D> {
    fn name(&self) -> &str {
        &self.name
    }

    fn policy(&self) -> CountPolicy {
        CountPolicy::Ceiling
    }

    fn compute_global(&self, buffer: &SampleBuffer) -> Result<GlobalReport, AnalysisError> {
        if buffer.is_empty() {
            tracing::debug!(
                "[ParallelReducer] {}, nothing dispatched",
                AnalysisError::EmptyInput
            );
            return Ok(GlobalReport::empty(&self.name));
        }
        let group_size = self.checked_group_size(self.group_size)?;

        let started = Instant::now();
        let dispatch = GroupDispatch::for_samples(buffer.len(), group_size);
        tracing::debug!(
            "[ParallelReducer] Global reduction: {} samples, {} groups of {} ({} threads)",
            dispatch.sample_count,
            dispatch.group_count,
            dispatch.group_size,
            dispatch.global_size()
        );

        let output = self
            .device
            .submit_group_extrema(buffer.samples(), dispatch)?
            .wait(self.timeout)?;
        if output.slots.len() != dispatch.group_count {
            return Err(AnalysisError::device(
                DeviceStage::Readback,
                format!(
                    "expected {} group slots, read {}",
                    dispatch.group_count,
                    output.slots.len()
                ),
            ));
        }

        let (lo, hi) = fold_slots(&output.slots.mins, &output.slots.maxs).ok_or_else(|| {
            AnalysisError::device(DeviceStage::Readback, "device returned no group slots")
        })?;
        let extrema = ExtremalPair::new(quantize(lo), quantize(hi));
        let timing = Timing::with_kernel(started.elapsed(), output.kernel_time);

        tracing::debug!(
            "[ParallelReducer] Global min={} max={} (kernel {:?})",
            extrema.min,
            extrema.max,
            output.kernel_time
        );

        Ok(GlobalReport {
            backend: self.name.clone(),
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
        let plan = match setup_intervals(&self.name, buffer, interval_seconds, self.policy()) {
            IntervalSetup::Ready(plan) => plan,
            IntervalSetup::Skipped(report) => return Ok(report),
        };
        let group_size = self.checked_group_size(self.interval_group_size)?;

        let dispatch = IntervalDispatch {
            sample_count: plan.sample_count(),
            samples_per_interval: plan.samples_per_interval(),
            interval_count: plan.interval_count(),
            group_size,
        };
        let output = self
            .device
            .submit_interval_extrema(buffer.samples(), dispatch)?
            .wait(self.timeout)?;
        if output.slots.len() != plan.interval_count() {
            return Err(AnalysisError::device(
                DeviceStage::Readback,
                format!(
                    "expected {} interval slots, read {}",
                    plan.interval_count(),
                    output.slots.len()
                ),
            ));
        }

        let series: IntervalSeries = output
            .slots
            .mins
            .iter()
            .zip(&output.slots.maxs)
            .map(|(&lo, &hi)| ExtremalPair::new(quantize(lo), quantize(hi)))
            .collect();

        Ok(finish_intervals(
            &self.name,
            &plan,
            series,
            started,
            Some(output.kernel_time),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{CpuDevice, ExtremaSlots, KernelOutput, Submission};

    fn reducer(group_size: u32) -> ParallelReducer<CpuDevice> {
        ParallelReducer::new(CpuDevice::new(2).unwrap())
            .with_group_size(group_size)
    }

    /// Device that always fails at dispatch
    struct BrokenDevice;

    impl ComputeDevice for BrokenDevice {
        fn label(&self) -> String {
            "broken".to_string()
        }

        fn max_group_size(&self) -> u32 {
            256
        }

        fn submit_group_extrema(
            &self,
            _samples: &[f32],
            _dispatch: GroupDispatch,
        ) -> Result<Submission, AnalysisError> {
            Err(AnalysisError::device(DeviceStage::Dispatch, "queue lost"))
        }

        fn submit_interval_extrema(
            &self,
            _samples: &[f32],
            _dispatch: IntervalDispatch,
        ) -> Result<Submission, AnalysisError> {
            Ok(Submission::new("short", |_| {
                Ok(KernelOutput {
                    slots: ExtremaSlots::default(),
                    kernel_time: Duration::ZERO,
                })
            }))
        }
    }

    #[test]
    fn test_global_matches_known_extrema() {
        let buffer = SampleBuffer::new(vec![0.5, -0.25, 0.75, -1.0, 0.0], 5);
        let report = reducer(2).compute_global(&buffer).unwrap();
        assert_eq!(report.extrema, Some(ExtremalPair::new(-32_768, 24_576)));
        assert_eq!(report.sample_count, 5);
        assert!(report.backend.starts_with("parallel cpu"));
    }

    #[test]
    fn test_group_size_checked_before_dispatch() {
        let buffer = SampleBuffer::new(vec![0.1; 8], 8);
        let err = reducer(96).compute_global(&buffer).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::InvalidGroupSize {
                group_size: 96,
                max: 1_024
            }
        );
    }

    #[test]
    fn test_empty_buffer_skips_device() {
        let reducer = ParallelReducer::new(BrokenDevice);
        let report = reducer
            .compute_global(&SampleBuffer::new(Vec::new(), 44_100))
            .unwrap();
        assert_eq!(report.status, ReportStatus::EmptyInput);
        assert_eq!(report.extrema, None);
    }

    #[test]
    fn test_empty_buffer_wins_over_bad_group_size() {
        let reducer = reducer(100).with_interval_group_size(100);
        let empty = SampleBuffer::new(Vec::new(), 44_100);

        let global = reducer.compute_global(&empty).unwrap();
        assert_eq!(global.status, ReportStatus::EmptyInput);

        let intervals = reducer.compute_intervals(&empty, 1.0).unwrap();
        assert_eq!(intervals.status, ReportStatus::EmptyInput);
    }

    #[test]
    fn test_expired_wait_is_timeout_failure() {
        let reducer = ParallelReducer::new(CpuDevice::new(1).unwrap())
            .with_timeout(Some(Duration::ZERO));
        let buffer = SampleBuffer::new(vec![0.25; 5_000_000], 44_100);

        let err = reducer.compute_global(&buffer).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::DeviceFailure {
                stage: DeviceStage::Timeout,
                ..
            }
        ));
    }

    #[test]
    fn test_device_failure_propagates() {
        let reducer = ParallelReducer::new(BrokenDevice);
        let err = reducer
            .compute_global(&SampleBuffer::new(vec![0.2; 4], 4))
            .unwrap_err();
        assert!(err.is_device_failure());
    }

    #[test]
    fn test_short_readback_is_device_failure() {
        let reducer = ParallelReducer::new(BrokenDevice);
        let err = reducer
            .compute_intervals(&SampleBuffer::new(vec![0.2; 40], 10), 1.0)
            .unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::DeviceFailure {
                stage: DeviceStage::Readback,
                ..
            }
        ));
    }

    #[test]
    fn test_intervals_keep_trailing_partial() {
        let samples: Vec<f32> = (0..95).map(|i| i as f32 / 100.0).collect();
        let report = reducer(256)
            .compute_intervals(&SampleBuffer::new(samples, 10), 1.0)
            .unwrap();
        assert_eq!(report.policy, CountPolicy::Ceiling);
        assert_eq!(report.interval_count(), 10);
        assert_eq!(
            report.series.pairs()[9],
            ExtremalPair::new(quantize(0.90), quantize(0.94))
        );
        assert!(report.timing.total_seconds >= report.timing.kernel_seconds);
    }

    #[test]
    fn test_defaults_match_device_config() {
        let config = DeviceConfig::default();
        let built = ParallelReducer::new(BrokenDevice);
        let configured = ParallelReducer::from_config(BrokenDevice, &config);
        assert_eq!(built.group_size, configured.group_size);
        assert_eq!(built.interval_group_size, configured.interval_group_size);
        assert_eq!(built.interval_group_size, DEFAULT_INTERVAL_GROUP_SIZE);
    }

    #[test]
    fn test_fold_slots() {
        assert_eq!(fold_slots(&[], &[]), None);
        assert_eq!(
            fold_slots(&[0.1, -0.3, 0.0], &[0.4, 0.2, 0.9]),
            Some((-0.3, 0.9))
        );
    }
}
