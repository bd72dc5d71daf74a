use super::*;
use crate::device::CpuDevice;

fn ramp(len: usize) -> Vec<f32> {
    let last = (len - 1) as f32;
    (0..len).map(|i| -1.0 + 2.0 * i as f32 / last).collect()
}

fn parallel(group_size: u32) -> ParallelReducer<CpuDevice> {
    ParallelReducer::new(CpuDevice::new(2).unwrap())
        .with_group_size(group_size)
}

#[test]
fn test_ramp_one_second_global_and_intervals() {
    let buffer = SampleBuffer::new(ramp(44_100), 44_100);

    let sequential = SequentialReducer::new();
    let global = sequential.compute_global(&buffer).unwrap();
    let extrema = global.extrema.unwrap();
    assert_eq!(extrema.min, -32_768);
    assert!(extrema.max >= 32_767);

    let seq_intervals = sequential.compute_intervals(&buffer, 1.0).unwrap();
    let par_intervals = parallel(256).compute_intervals(&buffer, 1.0).unwrap();
    assert_eq!(seq_intervals.interval_count(), 1);
    assert_eq!(par_intervals.interval_count(), 1);
    assert_eq!(seq_intervals.series, par_intervals.series);

    // A single interval always survives the filter.
    assert_eq!(
        seq_intervals.filtered_mins,
        vec![FilteredEntry {
            index: 0,
            value: -32_768
        }]
    );
}

#[test]
fn test_exact_multiple_counts_agree() {
    let samples: Vec<f32> = (0..100).map(|i| (i as f32 / 50.0) - 1.0).collect();
    let buffer = SampleBuffer::new(samples, 10);

    let seq = SequentialReducer::new()
        .compute_intervals(&buffer, 1.0)
        .unwrap();
    let par = parallel(64).compute_intervals(&buffer, 1.0).unwrap();

    assert_eq!(seq.samples_per_interval, 10);
    assert_eq!(seq.interval_count(), 10);
    assert_eq!(par.interval_count(), 10);
    assert_eq!(seq.series, par.series);
}

#[test]
fn test_trailing_partial_interval_diverges_by_policy() {
    let samples: Vec<f32> = (0..95).map(|i| ((i % 7) as f32 - 3.0) / 4.0).collect();
    let buffer = SampleBuffer::new(samples, 10);

    let seq = SequentialReducer::new()
        .compute_intervals(&buffer, 1.0)
        .unwrap();
    let par = parallel(64).compute_intervals(&buffer, 1.0).unwrap();

    assert_eq!(seq.policy, CountPolicy::Truncating);
    assert_eq!(par.policy, CountPolicy::Ceiling);
    assert_eq!(seq.interval_count(), 9);
    assert_eq!(par.interval_count(), 10);
    assert_eq!(seq.series.pairs(), &par.series.pairs()[..9]);

    let plan = IntervalPlan::new(95, 10, 1.0, CountPolicy::Ceiling).unwrap();
    assert_eq!(plan.range(9).len(), 5);
}

#[test]
fn test_interval_pairs_are_ordered() {
    let samples: Vec<f32> = (0..1_000)
        .map(|i| ((i as f32) * 0.37).sin() * 0.8)
        .collect();
    let buffer = SampleBuffer::new(samples, 100);
    let reducers: Vec<Box<dyn Reducer>> =
        vec![Box::new(SequentialReducer::new()), Box::new(parallel(128))];

    for reducer in &reducers {
        let report = reducer.compute_intervals(&buffer, 0.5).unwrap();
        assert_eq!(report.status, ReportStatus::Complete);
        for pair in report.series.pairs() {
            assert!(pair.min <= pair.max, "{}: {:?}", reducer.name(), pair);
        }
    }
}

#[test]
fn test_repeated_runs_are_identical() {
    let samples: Vec<f32> = (0..5_000).map(|i| ((i * 31 % 97) as f32 / 48.5) - 1.0).collect();
    let buffer = SampleBuffer::new(samples, 1_000);
    let reducer = parallel(256);

    let first_global = reducer.compute_global(&buffer).unwrap();
    let first_intervals = reducer.compute_intervals(&buffer, 0.25).unwrap();
    for _ in 0..3 {
        assert_eq!(
            reducer.compute_global(&buffer).unwrap().extrema,
            first_global.extrema
        );
        let intervals = reducer.compute_intervals(&buffer, 0.25).unwrap();
        assert_eq!(intervals.series, first_intervals.series);
        assert_eq!(intervals.filtered_mins, first_intervals.filtered_mins);
        assert_eq!(intervals.filtered_maxs, first_intervals.filtered_maxs);
    }
}

#[test]
fn test_sentinels_match_across_reducers() {
    let empty = SampleBuffer::new(Vec::new(), 44_100);
    let short = SampleBuffer::new(vec![0.5; 20], 10);
    let reducers: Vec<Box<dyn Reducer>> =
        vec![Box::new(SequentialReducer::new()), Box::new(parallel(256))];

    for reducer in &reducers {
        let global = reducer.compute_global(&empty).unwrap();
        assert_eq!(global.status, ReportStatus::EmptyInput);

        let intervals = reducer.compute_intervals(&empty, 1.0).unwrap();
        assert_eq!(intervals.status, ReportStatus::EmptyInput);

        let degenerate = reducer.compute_intervals(&short, 0.01).unwrap();
        assert_eq!(degenerate.status, ReportStatus::DegenerateInterval);
        assert_eq!(degenerate.samples_per_interval, 0);
        assert!(degenerate.series.is_empty());
    }
}
