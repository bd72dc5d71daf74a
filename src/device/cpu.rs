// CPU device - work-group emulation on a rayon pool
//
// Each group owns a scratch pair sized to the group. Lanes first load at most
// one sample each (lanes past the buffer end keep +inf / -inf), then the
// scratch is tree-reduced. The load loop finishing is the barrier: no lane
// reads a neighbour slot before every lane has written its own.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use super::{
    ComputeDevice, ExtremaSlots, GroupDispatch, IntervalDispatch, KernelOutput, Submission,
};
use crate::error::{AnalysisError, DeviceStage};

/// Largest emulated group, matching the usual hardware invocation limit
pub const CPU_MAX_GROUP_SIZE: u32 = 1_024;

/// Thread-pool backed compute device
pub struct CpuDevice {
    pool: rayon::ThreadPool,
}

impl CpuDevice {
    /// Build a pool with `threads` workers, 0 lets rayon pick
    pub fn new(threads: usize) -> Result<Self, AnalysisError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("extrema-worker-{index}"))
            .build()
            .map_err(|err| AnalysisError::device(DeviceStage::Device, err))?;
        tracing::debug!(
            "[CpuDevice] Pool ready with {} workers",
            pool.current_num_threads()
        );
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn launch<K>(&self, label: &str, samples: &[f32], kernel: K) -> Submission
    where
        K: FnOnce(&[f32]) -> ExtremaSlots + Send + 'static,
    {
        // Device-resident copy; the host buffer is never touched by workers.
        let resident: Arc<[f32]> = Arc::from(samples);
        let (tx, rx) = mpsc::channel();
        self.pool.spawn(move || {
            let started = Instant::now();
            let slots = kernel(&resident);
            let _ = tx.send(KernelOutput {
                slots,
                kernel_time: started.elapsed(),
            });
        });

        let label = label.to_string();
        let waiter_label = label.clone();
        Submission::new(label, move |timeout| receive(rx, timeout, &waiter_label))
    }
}

impl ComputeDevice for CpuDevice {
    fn label(&self) -> String {
        format!("cpu ({} threads)", self.threads())
    }

    fn max_group_size(&self) -> u32 {
        CPU_MAX_GROUP_SIZE
    }

    fn submit_group_extrema(
        &self,
        samples: &[f32],
        dispatch: GroupDispatch,
    ) -> Result<Submission, AnalysisError> {
        Ok(self.launch("cpu group extrema", samples, move |resident| {
            group_extrema(resident, dispatch)
        }))
    }

    fn submit_interval_extrema(
        &self,
        samples: &[f32],
        dispatch: IntervalDispatch,
    ) -> Result<Submission, AnalysisError> {
        Ok(self.launch("cpu interval extrema", samples, move |resident| {
            interval_extrema(resident, dispatch)
        }))
    }
}

fn receive(
    rx: Receiver<KernelOutput>,
    timeout: Option<Duration>,
    label: &str,
) -> Result<KernelOutput, AnalysisError> {
    match timeout {
        Some(limit) => rx.recv_timeout(limit).map_err(|err| match err {
            RecvTimeoutError::Timeout => AnalysisError::device(
                DeviceStage::Timeout,
                format!("{label} did not complete within {limit:?}"),
            ),
            RecvTimeoutError::Disconnected => AnalysisError::device(
                DeviceStage::Dispatch,
                format!("{label} worker exited without results"),
            ),
        }),
        None => rx.recv().map_err(|_| {
            AnalysisError::device(
                DeviceStage::Dispatch,
                format!("{label} worker exited without results"),
            )
        }),
    }
}

fn group_extrema(samples: &[f32], dispatch: GroupDispatch) -> ExtremaSlots {
    let group_size = dispatch.group_size;
    let (mins, maxs): (Vec<f32>, Vec<f32>) = (0..dispatch.group_count)
        .into_par_iter()
        .map_init(
            || GroupScratch::new(group_size),
            |scratch, group| scratch.reduce(samples, group),
        )
        .unzip();
    ExtremaSlots { mins, maxs }
}

/// Group-local memory of one emulated work group
struct GroupScratch {
    mins: Vec<f32>,
    maxs: Vec<f32>,
}

impl GroupScratch {
    fn new(group_size: usize) -> Self {
        Self {
            mins: vec![f32::INFINITY; group_size],
            maxs: vec![f32::NEG_INFINITY; group_size],
        }
    }

    fn reduce(&mut self, samples: &[f32], group: usize) -> (f32, f32) {
        let group_size = self.mins.len();
        let base = group * group_size;

        for lane in 0..group_size {
            match samples.get(base + lane) {
                Some(&sample) => {
                    self.mins[lane] = sample;
                    self.maxs[lane] = sample;
                }
                None => {
                    self.mins[lane] = f32::INFINITY;
                    self.maxs[lane] = f32::NEG_INFINITY;
                }
            }
        }

        let mut stride = group_size / 2;
        while stride > 0 {
            for lane in 0..stride {
                self.mins[lane] = self.mins[lane].min(self.mins[lane + stride]);
                self.maxs[lane] = self.maxs[lane].max(self.maxs[lane + stride]);
            }
            stride /= 2;
        }

        (self.mins[0], self.maxs[0])
    }
}

fn interval_extrema(samples: &[f32], dispatch: IntervalDispatch) -> ExtremaSlots {
    let spi = dispatch.samples_per_interval;
    let (mins, maxs): (Vec<f32>, Vec<f32>) = (0..dispatch.interval_count)
        .into_par_iter()
        .map(|interval| {
            let start = (interval * spi).min(samples.len());
            let end = (start + spi).min(samples.len());
            samples[start..end]
                .iter()
                .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &sample| {
                    (lo.min(sample), hi.max(sample))
                })
        })
        .unzip();
    ExtremaSlots { mins, maxs }
}
