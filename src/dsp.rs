//! Audio DSP engine: WAV concatenation and sox transform chains.
//!
//! Concatenation is done in-process with hound. Library samples and
//! synthesizer output share channel count and sample rate; bit depth and
//! sample format are converted to the first input's.
//! Effects are rendered as a sox effect chain and applied in one pass.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hound::{SampleFormat, WavReader, WavWriter};
use tokio::process::Command;
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Fixed three-voice chorus (gain-in, gain-out, then delay/decay/speed/depth per voice).
const CHORUS_ARGS: [&str; 17] = [
    "0.5", "0.9", "50", "0.4", "0.25", "2", "-t", "60", "0.32", "0.4", "2.3", "-t", "40", "0.3",
    "0.3", "1.3", "-s",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    Reverb {
        reverberance: f32,
        room_scale: f32,
        wet_gain: f32,
    },
    Pitch {
        semitones: f32,
    },
    Highpass {
        frequency: f32,
    },
    Lowpass {
        frequency: f32,
    },
    Gain {
        db: f32,
    },
    Pad {
        start: f32,
        end: f32,
    },
    Reverse,
    Chorus,
    Tempo {
        factor: f32,
    },
}

impl Transform {
    pub fn reverb(reverberance: f32) -> Self {
        Self::Reverb {
            reverberance,
            room_scale: 100.0,
            wet_gain: 0.0,
        }
    }

    fn push_sox_args(&self, args: &mut Vec<String>) {
        match self {
            Self::Reverb {
                reverberance,
                room_scale,
                wet_gain,
            } => {
                // reverberance, HF damping, room scale, stereo depth, pre-delay, wet gain
                args.push("reverb".into());
                for value in [*reverberance, 50.0, *room_scale, 100.0, 0.0, *wet_gain] {
                    args.push(value.to_string());
                }
            }
            // sox pitch is in cents
            Self::Pitch { semitones } => {
                args.extend(["pitch".into(), (semitones * 100.0).to_string()]);
            }
            Self::Highpass { frequency } => {
                args.extend(["highpass".into(), "-2".into(), frequency.to_string(), "0.707q".into()]);
            }
            Self::Lowpass { frequency } => {
                args.extend(["lowpass".into(), "-2".into(), frequency.to_string(), "0.707q".into()]);
            }
            Self::Gain { db } => args.extend(["gain".into(), db.to_string()]),
            Self::Pad { start, end } => {
                args.extend(["pad".into(), start.to_string(), end.to_string()]);
            }
            Self::Reverse => args.push("reverse".into()),
            Self::Chorus => {
                args.push("chorus".into());
                args.extend(CHORUS_ARGS.iter().map(|a| a.to_string()));
            }
            Self::Tempo { factor } => args.extend(["tempo".into(), factor.to_string()]),
        }
    }
}

/// Ordered list of transforms applied in a single pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformChain {
    transforms: Vec<Transform>,
}

impl TransformChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, transform: Transform) -> &mut Self {
        self.transforms.push(transform);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    #[cfg(test)]
    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    /// Effect arguments for a `sox in.wav out.wav ...` invocation.
    pub fn sox_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for transform in &self.transforms {
            transform.push_sox_args(&mut args);
        }
        args
    }
}

#[async_trait]
pub trait AudioEngine: Send + Sync {
    /// Join `inputs` end to end into `output`.
    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<()>;

    /// Run `chain` over `input`, writing `output`.
    async fn apply(&self, chain: &TransformChain, input: &Path, output: &Path) -> Result<()>;
}

pub struct SoxEngine {
    binary: PathBuf,
}

impl SoxEngine {
    pub fn new() -> Self {
        Self::with_binary("sox")
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for SoxEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioEngine for SoxEngine {
    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
        let inputs = inputs.to_vec();
        let output = output.to_path_buf();
        tokio::task::spawn_blocking(move || concat_wavs(&inputs, &output)).await?
    }

    async fn apply(&self, chain: &TransformChain, input: &Path, output: &Path) -> Result<()> {
        if chain.is_empty() {
            tokio::fs::copy(input, output).await?;
            return Ok(());
        }

        let args = chain.sox_args();
        debug!("sox {} {} {}", input.display(), output.display(), args.join(" "));

        let result = Command::new(&self.binary)
            .arg("-q")
            .arg(input)
            .arg(output)
            .args(&args)
            .output()
            .await
            .map_err(|e| PipelineError::Engine(format!("Failed to run {}: {e}", self.binary.display())))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(PipelineError::Engine(format!(
                "sox exited with {}: {}",
                result.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Concatenate WAV files into `output`, written in the first input's format.
///
/// Inputs must agree on channel count and sample rate. Bit depth and sample
/// format may differ and are converted. A single input is copied as-is.
pub fn concat_wavs(inputs: &[PathBuf], output: &Path) -> Result<()> {
    let (first, rest) = inputs
        .split_first()
        .ok_or_else(|| PipelineError::Engine("Nothing to concatenate".into()))?;

    if rest.is_empty() {
        std::fs::copy(first, output)?;
        return Ok(());
    }

    let spec = WavReader::open(first)?.spec();
    let mut writer = WavWriter::create(output, spec)?;

    for input in inputs {
        let mut reader = WavReader::open(input)?;
        let from = reader.spec();
        if from.channels != spec.channels || from.sample_rate != spec.sample_rate {
            return Err(PipelineError::Engine(format!(
                "{} is {} channel(s) at {} Hz, expected {} at {} Hz",
                input.display(),
                from.channels,
                from.sample_rate,
                spec.channels,
                spec.sample_rate
            )));
        }
        if from != spec {
            debug!(
                "Converting {} from {}-bit {:?} to {}-bit {:?}",
                input.display(),
                from.bits_per_sample,
                from.sample_format,
                spec.bits_per_sample,
                spec.sample_format
            );
        }

        match (from.sample_format, spec.sample_format) {
            (SampleFormat::Int, SampleFormat::Int) => {
                for sample in reader.samples::<i32>() {
                    writer.write_sample(rescale_int(sample?, from.bits_per_sample, spec.bits_per_sample))?;
                }
            }
            (SampleFormat::Int, SampleFormat::Float) => {
                let scale = int_full_scale(from.bits_per_sample);
                for sample in reader.samples::<i32>() {
                    writer.write_sample(sample? as f32 / scale)?;
                }
            }
            (SampleFormat::Float, SampleFormat::Int) => {
                let scale = int_full_scale(spec.bits_per_sample);
                for sample in reader.samples::<f32>() {
                    let value = (sample?.clamp(-1.0, 1.0) * scale).round();
                    writer.write_sample((value as i32).min(scale as i32 - 1))?;
                }
            }
            (SampleFormat::Float, SampleFormat::Float) => {
                for sample in reader.samples::<f32>() {
                    writer.write_sample(sample?)?;
                }
            }
        }
    }

    writer.finalize()?;
    Ok(())
}

/// Magnitude of the most negative value at `bits`, i.e. 2^(bits - 1).
fn int_full_scale(bits: u16) -> f32 {
    (1u64 << (bits.clamp(1, 32) - 1)) as f32
}

/// Move an integer sample between bit depths, keeping its relative level.
fn rescale_int(sample: i32, from_bits: u16, to_bits: u16) -> i32 {
    if to_bits >= from_bits {
        sample << (to_bits - from_bits)
    } else {
        sample >> (from_bits - to_bits)
    }
}
