//! Sample sources feeding the reduction core
//!
//! Every source yields a mono [`SampleBuffer`] normalized to [-1.0, 1.0].
//! Multi-channel input is downmixed before the core sees it; nothing is
//! resampled.

use std::path::Path;

use crate::analysis::SampleBuffer;
use crate::error::SourceError;

pub mod synthetic;
pub mod text;
pub mod wav;

pub use synthetic::{SyntheticPattern, SyntheticSource};
pub use text::{write_text_samples, TextSource};
pub use wav::{write_wav_i16, WavSource};

/// Anything that can produce a sample buffer
pub trait SampleSource {
    /// Short description used in logs and reports
    fn describe(&self) -> String;

    /// Load the whole signal
    ///
    /// # Errors
    /// `SourceError` when the source is missing, malformed or yields no
    /// samples.
    fn load(&self) -> Result<SampleBuffer, SourceError>;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn load(&self) -> Result<SampleBuffer, SourceError> {
        (**self).load()
    }
}

pub(crate) fn display_path(path: &Path) -> String {
    path.display().to_string()
}
