//! Console and JSON reporting
//!
//! Console output follows the benchmark runner layout: a global section, the
//! first few intervals as `Interval i: Min = ..., Max = ...`, the filtered
//! entries with their original indices, then timings and speedups. JSON output
//! is the serde form of the same reports.

use std::fmt::Write as _;

use serde::Serialize;

use crate::analysis::{FilteredEntry, GlobalReport, IntervalReport, ReportStatus, SampleBuffer};
use crate::analyzer::AnalysisReport;

/// Sequential baseline against one parallel backend on the same buffer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub sample_count: usize,
    pub sample_rate: u32,
    pub interval_seconds: f64,
    pub sequential: AnalysisReport,
    pub parallel: AnalysisReport,
    /// Sequential total time over parallel total time
    pub global_speedup: Option<f64>,
    pub interval_speedup: Option<f64>,
    pub globals_match: bool,
    /// Intervals present under both count policies hold the same pairs
    pub shared_intervals_match: bool,
}

impl ComparisonReport {
    pub fn new(
        buffer: &SampleBuffer,
        interval_seconds: f64,
        sequential: AnalysisReport,
        parallel: AnalysisReport,
    ) -> Self {
        let globals_match = sequential.global.extrema == parallel.global.extrema;
        let shared_intervals_match = sequential
            .intervals
            .series
            .pairs()
            .iter()
            .zip(parallel.intervals.series.pairs())
            .all(|(seq, par)| seq == par);

        Self {
            sample_count: buffer.len(),
            sample_rate: buffer.sample_rate(),
            interval_seconds,
            global_speedup: speedup(
                sequential.global.timing.total_seconds,
                parallel.global.timing.total_seconds,
            ),
            interval_speedup: speedup(
                sequential.intervals.timing.total_seconds,
                parallel.intervals.timing.total_seconds,
            ),
            sequential,
            parallel,
            globals_match,
            shared_intervals_match,
        }
    }

    /// Process exit status for a comparison: 0 when the globals agree, 2 otherwise
    pub fn exit_code(&self) -> u8 {
        if self.globals_match {
            0
        } else {
            2
        }
    }
}

fn speedup(baseline: f64, candidate: f64) -> Option<f64> {
    (baseline > 0.0 && candidate > 0.0).then(|| baseline / candidate)
}

/// Render one backend's global and interval results
pub fn render_analysis(report: &AnalysisReport, preview_intervals: usize) -> String {
    let mut out = String::new();
    if let Some(reason) = &report.fallback_reason {
        let _ = writeln!(
            out,
            "{:?} backend failed ({reason}); results are from the sequential reducer",
            report.requested
        );
    }
    render_global(&mut out, &report.global);
    out.push('\n');
    render_intervals(&mut out, &report.intervals, preview_intervals);
    out
}

/// Render both backends followed by speedups and the equivalence check
pub fn render_comparison(report: &ComparisonReport, preview_intervals: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Processing {} samples at {} Hz, interval length {}s",
        report.sample_count, report.sample_rate, report.interval_seconds
    );

    section(&mut out, "Global Min Max Amplitude");
    render_global(&mut out, &report.sequential.global);
    render_global(&mut out, &report.parallel.global);
    if let Some(speedup) = report.global_speedup {
        let _ = writeln!(out, "Speedup (Total Time vs Sequential): {speedup:.2}x");
    }

    section(&mut out, "Interval Based Min Max Amplitude");
    render_intervals(&mut out, &report.sequential.intervals, preview_intervals);
    out.push('\n');
    render_intervals(&mut out, &report.parallel.intervals, preview_intervals);
    if let Some(speedup) = report.interval_speedup {
        let _ = writeln!(out, "Speedup (Total Time vs Sequential): {speedup:.2}x");
    }

    out.push('\n');
    let _ = writeln!(
        out,
        "Global results {}",
        if report.globals_match { "match" } else { "DIFFER" }
    );
    let _ = writeln!(
        out,
        "Shared intervals {} ({} sequential / {} parallel)",
        if report.shared_intervals_match { "match" } else { "DIFFER" },
        report.sequential.intervals.interval_count(),
        report.parallel.intervals.interval_count()
    );
    out
}

fn section(out: &mut String, title: &str) {
    let rule = "=".repeat(30);
    let _ = writeln!(out, "\n{rule}\n{title}\n{rule}");
}

fn render_global(out: &mut String, global: &GlobalReport) {
    let _ = writeln!(out, "--- {} Global Min/Max ---", global.backend);
    match global.extrema {
        Some(pair) => {
            let _ = writeln!(out, "Min: {:>6}, Max: {:>6}", pair.min, pair.max);
        }
        None => {
            let _ = writeln!(out, "No samples, no global extrema");
        }
    }
    render_timing(
        out,
        global.timing.total_seconds,
        global.timing.kernel_seconds,
    );
}

fn render_intervals(out: &mut String, intervals: &IntervalReport, preview: usize) {
    let _ = writeln!(
        out,
        "--- {} Interval Min/Max & Filtering ---",
        intervals.backend
    );
    match intervals.status {
        ReportStatus::EmptyInput => {
            let _ = writeln!(out, "No samples, no intervals");
            return;
        }
        ReportStatus::DegenerateInterval => {
            let _ = writeln!(
                out,
                "Interval length is too short for the given sample rate, resulting in 0 samples per interval."
            );
            return;
        }
        ReportStatus::Complete => {}
    }

    let _ = writeln!(
        out,
        "Num Intervals: {} ({} samples each, {:?} count)",
        intervals.interval_count(),
        intervals.samples_per_interval,
        intervals.policy
    );
    for (index, pair) in intervals.series.pairs().iter().take(preview).enumerate() {
        let _ = writeln!(
            out,
            "Interval {index}: Min = {:>6}, Max = {:>6}",
            pair.min, pair.max
        );
    }

    out.push_str("\n--- Filtered Results ---\n");
    render_filtered(out, "Min", &intervals.filtered_mins);
    render_filtered(out, "Max", &intervals.filtered_maxs);
    render_timing(
        out,
        intervals.timing.total_seconds,
        intervals.timing.kernel_seconds,
    );
}

fn render_filtered(out: &mut String, column: &str, entries: &[FilteredEntry]) {
    for entry in entries {
        let _ = writeln!(
            out,
            "Filtered {column}[{}] = {:>6}",
            entry.index, entry.value
        );
    }
}

fn render_timing(out: &mut String, total_seconds: f64, kernel_seconds: f64) {
    let _ = writeln!(
        out,
        "Total Time (Host + Device): {total_seconds:.6} seconds"
    );
    if kernel_seconds > 0.0 {
        let _ = writeln!(
            out,
            "Kernel-Only Execution Time: {kernel_seconds:.6} seconds"
        );
    }
}
