// Text source - one float sample per line
//
// The format carries no sample rate; the caller supplies it. Blank lines are
// skipped.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use super::{display_path, SampleSource};
use crate::analysis::SampleBuffer;
use crate::error::SourceError;

/// Plain-text sample file
#[derive(Debug, Clone)]
pub struct TextSource {
    path: PathBuf,
    sample_rate: u32,
}

impl TextSource {
    pub fn new(path: impl Into<PathBuf>, sample_rate: u32) -> Self {
        Self {
            path: path.into(),
            sample_rate,
        }
    }
}

impl SampleSource for TextSource {
    fn describe(&self) -> String {
        format!("text {} @ {} Hz", self.path.display(), self.sample_rate)
    }

    fn load(&self) -> Result<SampleBuffer, SourceError> {
        let contents = fs::read_to_string(&self.path).map_err(|err| SourceError::NotFound {
            path: display_path(&self.path),
            reason: err.to_string(),
        })?;
        let samples = parse_samples(&contents).map_err(|reason| SourceError::Malformed {
            path: display_path(&self.path),
            reason,
        })?;
        if samples.is_empty() {
            return Err(SourceError::Empty {
                path: display_path(&self.path),
            });
        }

        tracing::info!(
            "[TextSource] Loaded {} samples from {}",
            samples.len(),
            self.path.display()
        );
        Ok(SampleBuffer::new(samples, self.sample_rate))
    }
}

fn parse_samples(contents: &str) -> Result<Vec<f32>, String> {
    contents
        .lines()
        .enumerate()
        .map(|(number, line)| (number + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
        .map(|(number, line)| {
            line.parse::<f32>()
                .map_err(|err| format!("line {number}: {line:?}: {err}"))
        })
        .collect()
}

/// Persist samples one per line
pub fn write_text_samples(path: &Path, samples: &[f32]) -> Result<(), SourceError> {
    let mut contents = String::with_capacity(samples.len() * 12);
    for sample in samples {
        let _ = writeln!(contents, "{sample}");
    }
    fs::write(path, contents).map_err(|err| SourceError::NotFound {
        path: display_path(path),
        reason: err.to_string(),
    })?;
    tracing::debug!(
        "[TextSource] Wrote {} samples to {}",
        samples.len(),
        path.display()
    );
    Ok(())
}
