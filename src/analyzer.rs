//! Analysis entry point
//!
//! [`Analyzer`] owns an explicit [`AppConfig`], builds the requested reducer
//! and runs the global and interval reductions on one buffer. When the
//! parallel device fails and `fallback_to_sequential` is set, the run is
//! repeated on the sequential reducer and the report records the fallback.

use serde::Serialize;

use crate::analysis::{
    GlobalReport, IntervalReport, ParallelReducer, Reducer, SampleBuffer, SequentialReducer,
};
use crate::config::AppConfig;
use crate::device::{CpuDevice, WgpuDevice};
use crate::error::{log_analysis_error, AnalysisError};
use crate::report::ComparisonReport;

/// Reducer selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Sequential,
    /// Parallel reducer on the rayon work-group emulation
    CpuParallel,
    /// Parallel reducer on a wgpu adapter
    Gpu,
}

impl Backend {
    pub fn is_parallel(self) -> bool {
        !matches!(self, Backend::Sequential)
    }
}

/// Global and interval results of one backend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub requested: Backend,
    /// Device failure that forced a sequential re-run
    pub fallback_reason: Option<String>,
    pub global: GlobalReport,
    pub intervals: IntervalReport,
}

impl AnalysisReport {
    pub fn fell_back(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

pub struct Analyzer {
    config: AppConfig,
}

impl Analyzer {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Build the reducer for `backend`
    ///
    /// # Errors
    /// `DeviceFailure` when the CPU pool or the GPU adapter cannot be created.
    pub fn reducer(&self, backend: Backend) -> Result<Box<dyn Reducer>, AnalysisError> {
        let device = &self.config.device;
        let reducer: Box<dyn Reducer> = match backend {
            Backend::Sequential => Box::new(SequentialReducer::new()),
            Backend::CpuParallel => Box::new(ParallelReducer::from_config(
                CpuDevice::new(device.cpu_threads)?,
                device,
            )),
            Backend::Gpu => Box::new(ParallelReducer::from_config(
                WgpuDevice::new(device.power_preference)?,
                device,
            )),
        };
        Ok(reducer)
    }

    /// Run both reductions on `backend`
    ///
    /// # Errors
    /// `InvalidInterval` for a non-positive or non-finite interval length,
    /// `InvalidGroupSize` for a rejected group size, and `DeviceFailure` when
    /// the device fails and fallback is disabled.
    pub fn analyze(
        &self,
        buffer: &SampleBuffer,
        backend: Backend,
    ) -> Result<AnalysisReport, AnalysisError> {
        match self.reducer(backend) {
            Ok(reducer) => self.analyze_with(reducer.as_ref(), backend, buffer),
            Err(err) => self.recover(err, backend, buffer),
        }
    }

    /// Run both reductions on an already built `reducer`
    ///
    /// `requested` labels the report. Device failures fall back to the
    /// sequential reducer under the same rules as [`Analyzer::analyze`].
    pub fn analyze_with(
        &self,
        reducer: &dyn Reducer,
        requested: Backend,
        buffer: &SampleBuffer,
    ) -> Result<AnalysisReport, AnalysisError> {
        let interval_seconds = self.interval_seconds()?;
        match run(reducer, buffer, interval_seconds) {
            Ok((global, intervals)) => Ok(AnalysisReport {
                requested,
                fallback_reason: None,
                global,
                intervals,
            }),
            Err(err) => self.recover(err, requested, buffer),
        }
    }

    fn recover(
        &self,
        err: AnalysisError,
        requested: Backend,
        buffer: &SampleBuffer,
    ) -> Result<AnalysisReport, AnalysisError> {
        log_analysis_error(&err, "Analyzer::analyze");
        if !err.is_device_failure() || !self.config.device.fallback_to_sequential {
            return Err(err);
        }

        tracing::warn!(
            "[Analyzer] {:?} backend failed, re-running sequentially",
            requested
        );
        let interval_seconds = self.interval_seconds()?;
        let (global, intervals) = run(&SequentialReducer::new(), buffer, interval_seconds)?;
        Ok(AnalysisReport {
            requested,
            fallback_reason: Some(err.to_string()),
            global,
            intervals,
        })
    }

    /// Run the sequential baseline and `parallel` on the same buffer
    ///
    /// The parallel run never falls back here; a device failure is returned.
    pub fn compare(
        &self,
        buffer: &SampleBuffer,
        parallel: Backend,
    ) -> Result<ComparisonReport, AnalysisError> {
        self.interval_seconds()?;
        let reducer = self.reducer(parallel).map_err(|err| {
            log_analysis_error(&err, "Analyzer::compare");
            err
        })?;
        self.compare_with(reducer.as_ref(), parallel, buffer)
    }

    /// Run the sequential baseline and an already built `parallel` reducer
    pub fn compare_with(
        &self,
        parallel: &dyn Reducer,
        requested: Backend,
        buffer: &SampleBuffer,
    ) -> Result<ComparisonReport, AnalysisError> {
        let interval_seconds = self.interval_seconds()?;
        let sequential =
            self.analyze_with(&SequentialReducer::new(), Backend::Sequential, buffer)?;

        let (global, intervals) = run(parallel, buffer, interval_seconds).map_err(|err| {
            log_analysis_error(&err, "Analyzer::compare");
            err
        })?;
        let parallel = AnalysisReport {
            requested,
            fallback_reason: None,
            global,
            intervals,
        };

        let report = ComparisonReport::new(buffer, interval_seconds, sequential, parallel);
        if !report.globals_match {
            tracing::warn!(
                "[Analyzer] Global extrema differ: sequential {:?} vs parallel {:?}",
                report.sequential.global.extrema,
                report.parallel.global.extrema
            );
        }
        Ok(report)
    }

    fn interval_seconds(&self) -> Result<f64, AnalysisError> {
        let interval_seconds = self.config.analysis.interval_seconds;
        if !interval_seconds.is_finite() || interval_seconds <= 0.0 {
            let err = AnalysisError::InvalidInterval { interval_seconds };
            log_analysis_error(&err, "Analyzer");
            return Err(err);
        }
        Ok(interval_seconds)
    }
}

fn run(
    reducer: &dyn Reducer,
    buffer: &SampleBuffer,
    interval_seconds: f64,
) -> Result<(GlobalReport, IntervalReport), AnalysisError> {
    tracing::info!(
        "[Analyzer] Running {} on {} samples at {} Hz",
        reducer.name(),
        buffer.len(),
        buffer.sample_rate()
    );
    let global = reducer.compute_global(buffer)?;
    let intervals = reducer.compute_intervals(buffer, interval_seconds)?;
    Ok((global, intervals))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::analysis::{CountPolicy, ExtremalPair};
    use crate::device::{
        ComputeDevice, ExtremaSlots, GroupDispatch, IntervalDispatch, KernelOutput, Submission,
    };
    use crate::error::DeviceStage;

    /// Device whose queue is gone
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
            Err(AnalysisError::device(DeviceStage::Dispatch, "queue lost"))
        }
    }

    /// Device that reports [-0.25, 0.25] for every slot regardless of input
    struct FixedDevice;

    fn fixed_output(slot_count: usize) -> Submission {
        Submission::new("fixed", move |_| {
            Ok(KernelOutput {
                slots: ExtremaSlots {
                    mins: vec![-0.25; slot_count],
                    maxs: vec![0.25; slot_count],
                },
                kernel_time: Duration::ZERO,
            })
        })
    }

    impl ComputeDevice for FixedDevice {
        fn label(&self) -> String {
            "fixed".to_string()
        }

        fn max_group_size(&self) -> u32 {
            256
        }

        fn submit_group_extrema(
            &self,
            _samples: &[f32],
            dispatch: GroupDispatch,
        ) -> Result<Submission, AnalysisError> {
            Ok(fixed_output(dispatch.group_count))
        }

        fn submit_interval_extrema(
            &self,
            _samples: &[f32],
            dispatch: IntervalDispatch,
        ) -> Result<Submission, AnalysisError> {
            Ok(fixed_output(dispatch.interval_count))
        }
    }

    fn analyzer(interval_seconds: f64, group_size: u32) -> Analyzer {
        let mut config = AppConfig::default();
        config.analysis.interval_seconds = interval_seconds;
        config.device.group_size = group_size;
        config.device.cpu_threads = 2;
        Analyzer::new(config)
    }

    fn buffer() -> SampleBuffer {
        let samples = (0..95).map(|i| ((i % 11) as f32 - 5.0) / 10.0).collect();
        SampleBuffer::new(samples, 10)
    }

    #[test]
    fn test_sequential_analysis() {
        let report = analyzer(1.0, 256)
            .analyze(&buffer(), Backend::Sequential)
            .unwrap();
        assert!(!report.fell_back());
        assert_eq!(
            report.global.extrema,
            Some(ExtremalPair::new(-16_384, 16_384))
        );
        assert_eq!(report.intervals.policy, CountPolicy::Truncating);
        assert_eq!(report.intervals.interval_count(), 9);
    }

    #[test]
    fn test_cpu_parallel_analysis() {
        let report = analyzer(1.0, 32)
            .analyze(&buffer(), Backend::CpuParallel)
            .unwrap();
        assert_eq!(report.intervals.policy, CountPolicy::Ceiling);
        assert_eq!(report.intervals.interval_count(), 10);
        assert_eq!(
            report.global.extrema,
            Some(ExtremalPair::new(-16_384, 16_384))
        );
    }

    #[test]
    fn test_invalid_interval_rejected() {
        for seconds in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = analyzer(seconds, 256)
                .analyze(&buffer(), Backend::Sequential)
                .unwrap_err();
            assert!(matches!(err, AnalysisError::InvalidInterval { .. }));
        }
    }

    #[test]
    fn test_invalid_group_size_is_not_retried() {
        let err = analyzer(1.0, 100)
            .analyze(&buffer(), Backend::CpuParallel)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidGroupSize { .. }));
    }

    #[test]
    fn test_compare_flags_matching_globals() {
        let report = analyzer(1.0, 64)
            .compare(&buffer(), Backend::CpuParallel)
            .unwrap();
        assert!(report.globals_match);
        assert!(report.shared_intervals_match);
        assert_eq!(report.sequential.intervals.interval_count(), 9);
        assert_eq!(report.parallel.intervals.interval_count(), 10);
    }

    #[test]
    fn test_device_failure_falls_back_to_sequential() {
        let analyzer = analyzer(1.0, 256);
        let broken = ParallelReducer::new(BrokenDevice);
        let report = analyzer
            .analyze_with(&broken, Backend::Gpu, &buffer())
            .unwrap();

        assert!(report.fell_back());
        assert_eq!(report.requested, Backend::Gpu);
        let reason = report.fallback_reason.as_deref().unwrap_or_default();
        assert!(reason.contains("queue lost"));

        let sequential = analyzer.analyze(&buffer(), Backend::Sequential).unwrap();
        assert_eq!(report.global.extrema, sequential.global.extrema);
        assert_eq!(report.intervals.series, sequential.intervals.series);
        assert_eq!(report.intervals.policy, CountPolicy::Truncating);
    }

    #[test]
    fn test_device_failure_without_fallback_is_returned() {
        let mut analyzer = analyzer(1.0, 256);
        analyzer.config.device.fallback_to_sequential = false;
        let broken = ParallelReducer::new(BrokenDevice);

        let err = analyzer
            .analyze_with(&broken, Backend::Gpu, &buffer())
            .unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::DeviceFailure {
                stage: DeviceStage::Dispatch,
                ..
            }
        ));
    }

    #[test]
    fn test_compare_never_falls_back() {
        let broken = ParallelReducer::new(BrokenDevice);
        let err = analyzer(1.0, 256)
            .compare_with(&broken, Backend::Gpu, &buffer())
            .unwrap_err();
        assert!(err.is_device_failure());
    }

    #[test]
    fn test_compare_flags_differing_globals() {
        let fixed = ParallelReducer::new(FixedDevice);
        let report = analyzer(1.0, 256)
            .compare_with(&fixed, Backend::Gpu, &buffer())
            .unwrap();

        assert_eq!(
            report.parallel.global.extrema,
            Some(ExtremalPair::new(-8_192, 8_192))
        );
        assert!(!report.globals_match);
        assert!(!report.shared_intervals_match);
        assert_eq!(report.exit_code(), 2);
    }
}
