//! Offline rendering through the channel strip
//!
//! Plays the role of a plugin host for a file: prepares the strip at the
//! file's sample rate and channel count, then feeds it host-sized blocks.

use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, instrument};
use warmth_core::domain::{AudioError, ChannelStrip};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, RenderError>;

/// Planar audio held in memory
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Frames in the shortest channel
    pub fn frames(&self) -> usize {
        self.channels.iter().map(Vec::len).min().unwrap_or(0)
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flatten()
            .fold(0.0f32, |peak, s| peak.max(s.abs()))
    }

    /// Read a WAV file (integer or float) into planar `f32` channels
    pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        let channel_count = spec.channels as usize;
        if channel_count == 0 {
            return Err(RenderError::UnsupportedFormat("file has no channels".to_string()));
        }

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<_, _>>()?,
            hound::SampleFormat::Int => {
                if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                    return Err(RenderError::UnsupportedFormat(format!(
                        "{}-bit integer samples",
                        spec.bits_per_sample
                    )));
                }
                let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<std::result::Result<_, _>>()?
            }
        };

        let frames = interleaved.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in interleaved.chunks_exact(channel_count) {
            for (channel, sample) in channels.iter_mut().zip(frame) {
                channel.push(*sample);
            }
        }

        Ok(Self::new(spec.sample_rate, channels))
    }

    /// Write the buffer as a 32-bit float WAV file
    pub fn write_wav<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let spec = hound::WavSpec {
            channels: self.channel_count() as u16,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for frame in 0..self.frames() {
            for channel in &self.channels {
                writer.write_sample(channel[frame])?;
            }
        }
        writer.finalize()?;
        Ok(())
    }
}

/// What a render did
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSummary {
    pub frames: usize,
    pub blocks: usize,
    pub sample_rate: u32,
    pub channels: usize,
    pub peak: f32,
}

/// Process a buffer in place, `block_size` frames at a time
///
/// The strip is prepared for the buffer's rate and channel count first, so
/// parameters start at their stored values without ramping in.
pub fn render_buffer(
    strip: &mut ChannelStrip,
    buffer: &mut AudioBuffer,
    block_size: usize,
) -> Result<RenderSummary> {
    strip.prepare(buffer.sample_rate as f32, block_size, buffer.channel_count())?;

    let frames = buffer.frames();
    let mut blocks = 0;
    let mut start = 0;
    while start < frames {
        let end = (start + block_size).min(frames);
        let mut views: Vec<&mut [f32]> = buffer
            .channels
            .iter_mut()
            .map(|channel| &mut channel[start..end])
            .collect();
        strip.process(&mut views);
        blocks += 1;
        start = end;
    }

    debug!(frames, blocks, block_size, "Buffer rendered");
    Ok(RenderSummary {
        frames,
        blocks,
        sample_rate: buffer.sample_rate,
        channels: buffer.channel_count(),
        peak: buffer.peak(),
    })
}

/// Render a WAV file through the strip into a 32-bit float WAV file
#[instrument(skip(strip, input, output), fields(input = %input.as_ref().display()))]
pub fn render_file<P: AsRef<Path>, Q: AsRef<Path>>(
    strip: &mut ChannelStrip,
    input: P,
    output: Q,
    block_size: usize,
) -> Result<RenderSummary> {
    let mut buffer = AudioBuffer::read_wav(&input)?;
    info!(
        sample_rate = buffer.sample_rate,
        channels = buffer.channel_count(),
        frames = buffer.frames(),
        "Rendering"
    );

    let summary = render_buffer(strip, &mut buffer, block_size)?;
    buffer.write_wav(&output)?;

    info!(
        output = %output.as_ref().display(),
        blocks = summary.blocks,
        peak = summary.peak,
        "Render complete"
    );
    Ok(summary)
}
