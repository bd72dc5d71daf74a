use pcm_extrema::analysis::{CountPolicy, IntervalPlan};
use pcm_extrema::device::CpuDevice;
use pcm_extrema::{ParallelReducer, Reducer, SampleBuffer, SequentialReducer};
use proptest::prelude::*;

const GROUP_SIZES: [u32; 6] = [1, 2, 8, 64, 256, 1_024];

fn parallel(group_size: u32) -> ParallelReducer<CpuDevice> {
    ParallelReducer::new(CpuDevice::new(2).expect("cpu pool"))
        .with_group_size(group_size)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn global_matches_sequential_for_any_group_size(
        samples in proptest::collection::vec(-1.0f32..=1.0, 1..3_000),
        group_index in 0usize..GROUP_SIZES.len(),
    ) {
        let buffer = SampleBuffer::new(samples, 44_100);
        let expected = SequentialReducer::new().compute_global(&buffer).unwrap();
        let actual = parallel(GROUP_SIZES[group_index]).compute_global(&buffer).unwrap();
        prop_assert_eq!(expected.extrema, actual.extrema);
    }

    #[test]
    fn shared_intervals_match_and_counts_follow_policy(
        samples in proptest::collection::vec(-1.0f32..=1.0, 1..2_000),
        sample_rate in 10u32..500,
        interval_seconds in 0.05f64..2.0,
    ) {
        let buffer = SampleBuffer::new(samples, sample_rate);
        let sequential = SequentialReducer::new()
            .compute_intervals(&buffer, interval_seconds)
            .unwrap();
        let parallel = parallel(64)
            .compute_intervals(&buffer, interval_seconds)
            .unwrap();

        let Ok(plan) = IntervalPlan::new(
            buffer.len(),
            sample_rate,
            interval_seconds,
            CountPolicy::Ceiling,
        ) else {
            prop_assert!(sequential.series.is_empty());
            prop_assert!(parallel.series.is_empty());
            return Ok(());
        };
        let spi = plan.samples_per_interval();
        prop_assert_eq!(sequential.interval_count(), buffer.len() / spi);
        prop_assert_eq!(parallel.interval_count(), buffer.len().div_ceil(spi));

        let last = plan.range(plan.interval_count() - 1);
        prop_assert!(!last.is_empty() && last.len() <= spi);

        let shared = sequential.interval_count();
        prop_assert_eq!(
            sequential.series.pairs(),
            &parallel.series.pairs()[..shared]
        );
        for pair in parallel.series.pairs() {
            prop_assert!(pair.min <= pair.max);
        }
    }
}

#[test]
fn uneven_group_split_keeps_extrema_in_padded_group() {
    // Extrema sit in the final, mostly padded group.
    let mut samples = vec![0.0f32; 1_000];
    samples[998] = -0.75;
    samples[999] = 0.875;
    let buffer = SampleBuffer::new(samples, 1_000);

    let expected = SequentialReducer::new().compute_global(&buffer).unwrap();
    for group_size in GROUP_SIZES {
        let actual = parallel(group_size).compute_global(&buffer).unwrap();
        assert_eq!(expected.extrema, actual.extrema, "group size {group_size}");
    }
}
