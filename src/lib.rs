// PCM Extrema - extremal amplitude analysis
// Sequential baseline and device-parallel reduction of min/max statistics

// Module declarations
pub mod analysis;
pub mod analyzer;
pub mod config;
pub mod device;
pub mod error;
pub mod report;
pub mod source;

// Re-exports for convenience
pub use analysis::{
    quantize, CountPolicy, ExtremalPair, FilteredEntry, GlobalReport, IntervalReport,
    IntervalSeries, ParallelReducer, Reducer, ReportStatus, SampleBuffer, SequentialReducer,
};
pub use analyzer::{AnalysisReport, Analyzer, Backend};
pub use config::AppConfig;
pub use error::{AnalysisError, ErrorCode, SourceError};

use tracing::Level;

/// Install the stderr fmt subscriber used by the binaries
///
/// Safe to call more than once; later calls are ignored. `log` records are
/// forwarded through the subscriber's log bridge.
pub fn init_logging(level: Level) {
    let installed = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    if installed.is_ok() {
        tracing::debug!("Logging initialized at {}", level);
    }
}
