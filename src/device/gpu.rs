// GPU device - wgpu compute backend
//
// Kernels are WGSL compute shaders compiled per dispatch with the requested
// work-group size substituted in. Results are copied into mappable staging
// buffers in the same submission; the completion handle polls the device
// until every staging buffer is mapped, which is the host's only way to see
// device output.

use std::borrow::Cow;
use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::{
    ComputeDevice, ExtremaSlots, GroupDispatch, IntervalDispatch, KernelOutput, Submission,
};
use crate::config::PowerPreference;
use crate::error::{AnalysisError, DeviceStage};

const GROUP_EXTREMA_WGSL: &str = include_str!("shaders/group_extrema.wgsl");
const INTERVAL_EXTREMA_WGSL: &str = include_str!("shaders/interval_extrema.wgsl");
const WORKGROUP_SIZE_TOKEN: &str = "{{WORKGROUP_SIZE}}";

const F32_BYTES: u64 = std::mem::size_of::<f32>() as u64;
const TIMESTAMP_BYTES: u64 = 2 * std::mem::size_of::<u64>() as u64;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct GroupParams {
    sample_count: u32,
    group_count: u32,
    groups_per_row: u32,
    _padding: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct IntervalParams {
    sample_count: u32,
    samples_per_interval: u32,
    interval_count: u32,
    _padding: u32,
}

/// Compute device backed by a wgpu adapter
pub struct WgpuDevice {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    info: wgpu::AdapterInfo,
    limits: wgpu::Limits,
    timestamps: bool,
}

impl WgpuDevice {
    /// Request an adapter and a device
    ///
    /// # Errors
    /// `DeviceFailure` at the `Adapter` or `Device` stage when no usable GPU
    /// is present.
    pub fn new(power_preference: PowerPreference) -> Result<Self, AnalysisError> {
        futures::executor::block_on(Self::request(power_preference))
    }

    async fn request(power_preference: PowerPreference) -> Result<Self, AnalysisError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: match power_preference {
                    PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
                    PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
                },
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .map_err(|err| AnalysisError::device(DeviceStage::Adapter, err))?;

        let info = adapter.get_info();
        let timestamps = adapter.features().contains(wgpu::Features::TIMESTAMP_QUERY);
        let required_features = if timestamps {
            wgpu::Features::TIMESTAMP_QUERY
        } else {
            wgpu::Features::empty()
        };
        let limits = adapter.limits();

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("pcm_extrema"),
                required_features,
                required_limits: limits.clone(),
                ..Default::default()
            })
            .await
            .map_err(|err| AnalysisError::device(DeviceStage::Device, err))?;

        tracing::info!(
            "[WgpuDevice] Using {} ({:?}), timestamp queries {}",
            info.name,
            info.backend,
            if timestamps { "enabled" } else { "unavailable" }
        );

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            info,
            limits,
            timestamps,
        })
    }

    fn build_pipeline(
        &self,
        source: &str,
        entry_point: &str,
        group_size: usize,
    ) -> Result<wgpu::ComputePipeline, AnalysisError> {
        let wgsl = source.replace(WORKGROUP_SIZE_TOKEN, &group_size.to_string());

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(entry_point),
                source: wgpu::ShaderSource::Wgsl(Cow::Owned(wgsl)),
            });
        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry_point),
                layout: None,
                module: &module,
                entry_point: Some(entry_point),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });
        if let Some(err) = futures::executor::block_on(self.device.pop_error_scope()) {
            return Err(AnalysisError::device(DeviceStage::ShaderBuild, err));
        }
        Ok(pipeline)
    }

    /// Storage buffer for the samples, checked against the binding limit
    fn upload_samples(&self, samples: &[f32]) -> Result<wgpu::Buffer, AnalysisError> {
        let bytes = samples.len() as u64 * F32_BYTES;
        let limit = u64::from(self.limits.max_storage_buffer_binding_size);
        if bytes > limit {
            return Err(AnalysisError::device(
                DeviceStage::Allocation,
                format!("{bytes} sample bytes exceed the {limit} byte storage binding limit"),
            ));
        }
        Ok(self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("samples"),
                contents: bytemuck::cast_slice(samples),
                usage: wgpu::BufferUsages::STORAGE,
            }))
    }

    fn uniform<P: Pod>(&self, params: &P) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("params"),
                contents: bytemuck::bytes_of(params),
                usage: wgpu::BufferUsages::UNIFORM,
            })
    }

    /// Split `groups` over x and y so neither exceeds the per-dimension limit
    fn grid(&self, groups: u32) -> Result<(u32, u32), AnalysisError> {
        let per_row = self.limits.max_compute_workgroups_per_dimension.max(1);
        let x = groups.clamp(1, per_row);
        let y = groups.div_ceil(x).max(1);
        if y > per_row {
            return Err(AnalysisError::device(
                DeviceStage::Dispatch,
                format!("{groups} work groups exceed the dispatch grid"),
            ));
        }
        Ok((x, y))
    }

    fn launch(
        &self,
        label: &'static str,
        pipeline: &wgpu::ComputePipeline,
        inputs: [&wgpu::Buffer; 2],
        slot_count: usize,
        grid: (u32, u32),
    ) -> Result<Submission, AnalysisError> {
        let [samples, params] = inputs;
        let slots = SlotBuffers::new(&self.device, slot_count);
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &pipeline.get_bind_group_layout(0),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: samples.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: slots.mins.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: slots.maxs.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: params.as_entire_binding(),
                },
            ],
        });
        let timer = self
            .timestamps
            .then(|| KernelTimer::new(&self.device, self.queue.get_timestamp_period()));

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(label),
                timestamp_writes: timer.as_ref().map(KernelTimer::pass_writes),
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(grid.0, grid.1, 1);
        }
        slots.encode_copies(&mut encoder);
        if let Some(timer) = &timer {
            timer.encode_resolve(&mut encoder);
        }

        let submitted_at = Instant::now();
        self.queue.submit(Some(encoder.finish()));
        if let Some(err) = futures::executor::block_on(self.device.pop_error_scope()) {
            return Err(AnalysisError::device(DeviceStage::Dispatch, err));
        }
        tracing::debug!(
            "[WgpuDevice] Submitted {} with grid {}x{}",
            label,
            grid.0,
            grid.1
        );

        let device = Arc::clone(&self.device);
        Ok(Submission::new(label, move |timeout| {
            let deadline = timeout.map(|limit| submitted_at + limit);
            let mut staging = vec![&slots.mins_staging, &slots.maxs_staging];
            if let Some(timer) = &timer {
                staging.push(&timer.staging);
            }
            map_all(&device, &staging, deadline)?;
            let completed = submitted_at.elapsed();

            let kernel_time = match &timer {
                Some(timer) => timer.read(),
                None => completed,
            };
            Ok(KernelOutput {
                slots: slots.read(),
                kernel_time,
            })
        }))
    }
}

impl ComputeDevice for WgpuDevice {
    fn label(&self) -> String {
        format!("gpu ({}, {:?})", self.info.name, self.info.backend)
    }

    fn max_group_size(&self) -> u32 {
        self.limits
            .max_compute_workgroup_size_x
            .min(self.limits.max_compute_invocations_per_workgroup)
    }

    fn submit_group_extrema(
        &self,
        samples: &[f32],
        dispatch: GroupDispatch,
    ) -> Result<Submission, AnalysisError> {
        let group_count = to_u32(dispatch.group_count, "group count")?;
        let grid = self.grid(group_count)?;
        let pipeline =
            self.build_pipeline(GROUP_EXTREMA_WGSL, "min_max_global", dispatch.group_size)?;
        let input = self.upload_samples(samples)?;
        let params = self.uniform(&GroupParams {
            sample_count: to_u32(dispatch.sample_count, "sample count")?,
            group_count,
            groups_per_row: grid.0,
            _padding: 0,
        });
        self.launch(
            "gpu group extrema",
            &pipeline,
            [&input, &params],
            dispatch.group_count,
            grid,
        )
    }

    fn submit_interval_extrema(
        &self,
        samples: &[f32],
        dispatch: IntervalDispatch,
    ) -> Result<Submission, AnalysisError> {
        let groups = to_u32(
            dispatch.interval_count.div_ceil(dispatch.group_size),
            "interval group count",
        )?;
        let grid = self.grid(groups)?;
        let pipeline = self.build_pipeline(
            INTERVAL_EXTREMA_WGSL,
            "min_max_interval",
            dispatch.group_size,
        )?;
        let input = self.upload_samples(samples)?;
        let params = self.uniform(&IntervalParams {
            sample_count: to_u32(dispatch.sample_count, "sample count")?,
            samples_per_interval: to_u32(dispatch.samples_per_interval, "interval size")?,
            interval_count: to_u32(dispatch.interval_count, "interval count")?,
            _padding: 0,
        });
        self.launch(
            "gpu interval extrema",
            &pipeline,
            [&input, &params],
            dispatch.interval_count,
            grid,
        )
    }
}

fn to_u32(value: usize, what: &str) -> Result<u32, AnalysisError> {
    u32::try_from(value).map_err(|_| {
        AnalysisError::device(
            DeviceStage::Allocation,
            format!("{what} {value} does not fit the 32-bit kernel index space"),
        )
    })
}

/// Device output slots plus their host-mappable copies
struct SlotBuffers {
    mins: wgpu::Buffer,
    maxs: wgpu::Buffer,
    mins_staging: wgpu::Buffer,
    maxs_staging: wgpu::Buffer,
    size: u64,
}

impl SlotBuffers {
    fn new(device: &wgpu::Device, count: usize) -> Self {
        let size = count as u64 * F32_BYTES;
        let storage = |label| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        };
        let staging = |label| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        Self {
            mins: storage("slot mins"),
            maxs: storage("slot maxs"),
            mins_staging: staging("slot mins staging"),
            maxs_staging: staging("slot maxs staging"),
            size,
        }
    }

    fn encode_copies(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.copy_buffer_to_buffer(&self.mins, 0, &self.mins_staging, 0, self.size);
        encoder.copy_buffer_to_buffer(&self.maxs, 0, &self.maxs_staging, 0, self.size);
    }

    /// Copy the mapped staging buffers out (both must already be mapped)
    fn read(&self) -> ExtremaSlots {
        ExtremaSlots {
            mins: read_f32(&self.mins_staging),
            maxs: read_f32(&self.maxs_staging),
        }
    }
}

fn read_f32(buffer: &wgpu::Buffer) -> Vec<f32> {
    let values = {
        let view = buffer.slice(..).get_mapped_range();
        bytemuck::cast_slice::<u8, f32>(&view).to_vec()
    };
    buffer.unmap();
    values
}

/// Begin/end timestamps written around the compute pass
struct KernelTimer {
    query_set: wgpu::QuerySet,
    resolve: wgpu::Buffer,
    staging: wgpu::Buffer,
    period_ns: f32,
}

impl KernelTimer {
    fn new(device: &wgpu::Device, period_ns: f32) -> Self {
        Self {
            query_set: device.create_query_set(&wgpu::QuerySetDescriptor {
                label: Some("kernel timestamps"),
                ty: wgpu::QueryType::Timestamp,
                count: 2,
            }),
            resolve: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("timestamp resolve"),
                size: TIMESTAMP_BYTES,
                usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            }),
            staging: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("timestamp staging"),
                size: TIMESTAMP_BYTES,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
            period_ns,
        }
    }

    fn pass_writes(&self) -> wgpu::ComputePassTimestampWrites<'_> {
        wgpu::ComputePassTimestampWrites {
            query_set: &self.query_set,
            beginning_of_pass_write_index: Some(0),
            end_of_pass_write_index: Some(1),
        }
    }

    fn encode_resolve(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.resolve_query_set(&self.query_set, 0..2, &self.resolve, 0);
        encoder.copy_buffer_to_buffer(&self.resolve, 0, &self.staging, 0, TIMESTAMP_BYTES);
    }

    /// Device execution time (the staging buffer must already be mapped)
    fn read(&self) -> Duration {
        let ticks: Vec<u64> = {
            let view = self.staging.slice(..).get_mapped_range();
            view.chunks_exact(8)
                .map(bytemuck::pod_read_unaligned::<u64>)
                .collect()
        };
        self.staging.unmap();

        let elapsed_ticks = match ticks.as_slice() {
            [begin, end, ..] => end.saturating_sub(*begin),
            _ => 0,
        };
        Duration::from_nanos((elapsed_ticks as f64 * self.period_ns as f64) as u64)
    }
}

/// Map every staging buffer for reading and poll until all are mapped
fn map_all(
    device: &wgpu::Device,
    buffers: &[&wgpu::Buffer],
    deadline: Option<Instant>,
) -> Result<(), AnalysisError> {
    let (tx, rx) = mpsc::channel();
    for buffer in buffers {
        let tx = tx.clone();
        buffer
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                let _ = tx.send(result);
            });
    }
    drop(tx);

    let mut pending = buffers.len();
    while pending > 0 {
        device
            .poll(wgpu::PollType::Poll)
            .map_err(|err| AnalysisError::device(DeviceStage::Readback, err))?;

        loop {
            match rx.try_recv() {
                Ok(Ok(())) => pending -= 1,
                Ok(Err(err)) => return Err(AnalysisError::device(DeviceStage::Readback, err)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if pending > 0 {
                        return Err(AnalysisError::device(
                            DeviceStage::Readback,
                            "staging buffer dropped before it was mapped",
                        ));
                    }
                    break;
                }
            }
        }

        if pending > 0 {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(AnalysisError::device(
                        DeviceStage::Timeout,
                        "kernel did not complete before the deadline",
                    ));
                }
            }
            std::thread::yield_now();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shaders_carry_size_token() {
        assert!(GROUP_EXTREMA_WGSL.contains(WORKGROUP_SIZE_TOKEN));
        assert!(INTERVAL_EXTREMA_WGSL.contains(WORKGROUP_SIZE_TOKEN));
        let substituted = GROUP_EXTREMA_WGSL.replace(WORKGROUP_SIZE_TOKEN, "128");
        assert!(substituted.contains("const WORKGROUP_SIZE: u32 = 128u;"));
    }

    #[test]
    fn test_params_match_uniform_layout() {
        assert_eq!(std::mem::size_of::<GroupParams>(), 16);
        assert_eq!(std::mem::size_of::<IntervalParams>(), 16);
    }

    #[test]
    fn test_to_u32_rejects_overflow() {
        assert_eq!(to_u32(7, "x").unwrap(), 7);
        if usize::BITS > 32 {
            let err = to_u32(u32::MAX as usize + 1, "sample count").unwrap_err();
            assert!(err.is_device_failure());
        }
    }
}
