//! Runs only where a wgpu adapter is available; otherwise each test logs and
//! returns.

use pcm_extrema::config::PowerPreference;
use pcm_extrema::device::{ComputeDevice, WgpuDevice};
use pcm_extrema::{ParallelReducer, Reducer, SampleBuffer, SequentialReducer};

fn gpu() -> Option<WgpuDevice> {
    match WgpuDevice::new(PowerPreference::HighPerformance) {
        Ok(device) => Some(device),
        Err(err) => {
            eprintln!("skipping GPU test: {err}");
            None
        }
    }
}

fn noise(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| (((i * 7_919) % 20_011) as f32 / 10_005.5) - 1.0)
        .collect()
}

#[test]
fn gpu_global_matches_sequential() {
    let Some(device) = gpu() else { return };
    let max = device.max_group_size();
    let reducer = ParallelReducer::new(device).with_group_size(256.min(max));

    for len in [1, 255, 256, 257, 100_003] {
        let buffer = SampleBuffer::new(noise(len), 44_100);
        let expected = SequentialReducer::new().compute_global(&buffer).unwrap();
        let actual = reducer.compute_global(&buffer).unwrap();
        assert_eq!(expected.extrema, actual.extrema, "length {len}");
        assert!(actual.timing.kernel_seconds >= 0.0);
    }
}

#[test]
fn gpu_intervals_match_sequential_prefix() {
    let Some(device) = gpu() else { return };
    let reducer = ParallelReducer::new(device).with_interval_group_size(64);
    let buffer = SampleBuffer::new(noise(44_100 * 3 + 500), 44_100);

    let expected = SequentialReducer::new()
        .compute_intervals(&buffer, 0.25)
        .unwrap();
    let actual = reducer.compute_intervals(&buffer, 0.25).unwrap();
    assert_eq!(expected.interval_count(), 12);
    assert_eq!(actual.interval_count(), 13);
    assert_eq!(expected.series.pairs(), &actual.series.pairs()[..12]);
}
