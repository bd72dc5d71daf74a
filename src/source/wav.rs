// WAV source - hound decoding with channel downmix
//
// Integer PCM is normalized by 2^(bits-1); float data whose peak exceeds 1.0
// is rescaled by the peak. Stereo is averaged, wider layouts keep channel 0.

use std::path::{Path, PathBuf};

use super::{display_path, SampleSource};
use crate::analysis::SampleBuffer;
use crate::error::SourceError;

/// Mono or multi-channel WAV file
#[derive(Debug, Clone)]
pub struct WavSource {
    path: PathBuf,
}

impl WavSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SampleSource for WavSource {
    fn describe(&self) -> String {
        format!("wav {}", self.path.display())
    }

    fn load(&self) -> Result<SampleBuffer, SourceError> {
        let (samples, sample_rate) = read_wav(&self.path)?;
        tracing::info!(
            "[WavSource] Loaded {} mono samples at {} Hz from {}",
            samples.len(),
            sample_rate,
            self.path.display()
        );
        Ok(SampleBuffer::new(samples, sample_rate))
    }
}

fn read_wav(path: &Path) -> Result<(Vec<f32>, u32), SourceError> {
    let mut reader = hound::WavReader::open(path).map_err(|err| match err {
        hound::Error::IoError(io) => SourceError::NotFound {
            path: display_path(path),
            reason: io.to_string(),
        },
        other => SourceError::Malformed {
            path: display_path(path),
            reason: other.to_string(),
        },
    })?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(SourceError::Malformed {
            path: display_path(path),
            reason: "zero channels".to_string(),
        });
    }

    let malformed = |err: hound::Error| SourceError::Malformed {
        path: display_path(path),
        reason: err.to_string(),
    };

    let interleaved = match spec.sample_format {
        hound::SampleFormat::Float => {
            let samples = reader
                .samples::<f32>()
                .collect::<Result<Vec<f32>, _>>()
                .map_err(malformed)?;
            rescale_to_unit_peak(samples)
        }
        hound::SampleFormat::Int => match spec.bits_per_sample {
            bits @ 1..=32 => {
                let scale = (1u64 << (bits - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|value| value as f32 / scale))
                    .collect::<Result<Vec<f32>, _>>()
                    .map_err(malformed)?
            }
            bits => {
                return Err(SourceError::Unsupported {
                    path: display_path(path),
                    reason: format!("bits_per_sample={bits}"),
                })
            }
        },
    };

    if interleaved.is_empty() {
        return Err(SourceError::Empty {
            path: display_path(path),
        });
    }

    Ok((downmix(interleaved, spec.channels), spec.sample_rate))
}

/// Collapse interleaved frames to one channel
fn downmix(interleaved: Vec<f32>, channels: u16) -> Vec<f32> {
    match channels {
        1 => interleaved,
        2 => {
            tracing::debug!("[WavSource] Averaging stereo channels");
            interleaved
                .chunks_exact(2)
                .map(|frame| (frame[0] + frame[1]) / 2.0)
                .collect()
        }
        n => {
            tracing::debug!("[WavSource] {} channels, keeping the first", n);
            interleaved.iter().step_by(n as usize).copied().collect()
        }
    }
}

fn rescale_to_unit_peak(mut samples: Vec<f32>) -> Vec<f32> {
    let peak = samples
        .iter()
        .fold(0.0f32, |peak, sample| peak.max(sample.abs()));
    if peak > 1.0 {
        tracing::warn!("[WavSource] Float peak {} outside [-1, 1], rescaling", peak);
        for sample in &mut samples {
            *sample /= peak;
        }
    }
    samples
}

/// Write mono samples as 16-bit PCM, scaled by 32768 to mirror the reader
pub fn write_wav_i16(path: &Path, buffer: &SampleBuffer) -> Result<(), SourceError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let write_error = |err: hound::Error| SourceError::NotFound {
        path: display_path(path),
        reason: err.to_string(),
    };

    let mut writer = hound::WavWriter::create(path, spec).map_err(write_error)?;
    for &sample in buffer.samples() {
        let value = (sample * 32_768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        writer.write_sample(value).map_err(write_error)?;
    }
    writer.finalize().map_err(write_error)?;
    tracing::debug!(
        "[WavSource] Wrote {} samples to {}",
        buffer.len(),
        path.display()
    );
    Ok(())
}
