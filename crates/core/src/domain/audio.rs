//! Audio stream abstractions and domain models
//!
//! This module defines the host-agnostic description of a processing context:
//! sample rate, channel layout and block size. Concrete hosts (plugin ABIs,
//! offline renderers) translate their own configuration into these types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in the audio subsystem
#[derive(Debug, Error)]
pub enum AudioError {
    /// Invalid configuration passed to `prepare`
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Host requested a bus layout the strip cannot process
    #[error("Unsupported layout: {0}")]
    UnsupportedLayout(String),

    /// Serialized state could not be decoded or belongs to another processor
    #[error("State error: {0}")]
    State(String),
}

pub type Result<T> = std::result::Result<T, AudioError>;

/// Number of audio channels on a bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelCount {
    Disabled,
    Mono,
    Stereo,
    Surround(u16),
}

impl ChannelCount {
    /// Channel set for a raw count, `None` when the count cannot describe a bus
    pub fn from_count(count: usize) -> Option<Self> {
        let count = u16::try_from(count).ok()?;
        Some(match count {
            0 => ChannelCount::Disabled,
            1 => ChannelCount::Mono,
            2 => ChannelCount::Stereo,
            n => ChannelCount::Surround(n),
        })
    }
}

/// Main input/output bus layout proposed by a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusLayout {
    pub input: ChannelCount,
    pub output: ChannelCount,
}

impl BusLayout {
    pub fn new(input: ChannelCount, output: ChannelCount) -> Self {
        Self { input, output }
    }

    /// Symmetric layout with the same channel set on both sides
    pub fn symmetric(channels: ChannelCount) -> Self {
        Self::new(channels, channels)
    }

    /// Mono or stereo output, with the input matching the output
    pub fn is_supported(&self) -> bool {
        matches!(self.output, ChannelCount::Mono | ChannelCount::Stereo)
            && self.input == self.output
    }
}

/// Everything a stage needs to know before it processes audio
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessSpec {
    pub sample_rate: f32,
    pub max_block_size: usize,
    pub channels: usize,
}

impl ProcessSpec {
    pub fn new(sample_rate: f32, max_block_size: usize, channels: usize) -> Self {
        Self {
            sample_rate,
            max_block_size,
            channels,
        }
    }

    /// Check that this describes a usable processing context
    pub fn validate(&self) -> Result<()> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(AudioError::InvalidConfiguration(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if self.max_block_size == 0 {
            return Err(AudioError::InvalidConfiguration(
                "block size must be at least one sample".to_string(),
            ));
        }
        let supported = ChannelCount::from_count(self.channels)
            .map(BusLayout::symmetric)
            .is_some_and(|layout| layout.is_supported());
        if !supported {
            return Err(AudioError::UnsupportedLayout(format!(
                "{} channels (mono or stereo only)",
                self.channels
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_count() {
        assert_eq!(ChannelCount::from_count(0), Some(ChannelCount::Disabled));
        assert_eq!(ChannelCount::from_count(2), Some(ChannelCount::Stereo));
        assert_eq!(ChannelCount::from_count(6), Some(ChannelCount::Surround(6)));
        assert_eq!(ChannelCount::from_count(65538), None);
    }

    #[test]
    fn test_layout_support() {
        assert!(BusLayout::symmetric(ChannelCount::Mono).is_supported());
        assert!(BusLayout::symmetric(ChannelCount::Stereo).is_supported());
        assert!(!BusLayout::symmetric(ChannelCount::Surround(6)).is_supported());
        assert!(!BusLayout::symmetric(ChannelCount::Disabled).is_supported());
        assert!(!BusLayout::new(ChannelCount::Mono, ChannelCount::Stereo).is_supported());
    }

    #[test]
    fn test_process_spec_validation() {
        assert!(ProcessSpec::new(48000.0, 512, 2).validate().is_ok());
        assert!(ProcessSpec::new(0.0, 512, 2).validate().is_err());
        assert!(ProcessSpec::new(48000.0, 0, 2).validate().is_err());
        assert!(matches!(
            ProcessSpec::new(48000.0, 512, 4).validate(),
            Err(AudioError::UnsupportedLayout(_))
        ));
    }

    #[test]
    fn test_oversized_channel_count_is_not_stereo() {
        // 65538 wraps to 2 in a u16
        for channels in [65538, usize::MAX] {
            assert!(matches!(
                ProcessSpec::new(48000.0, 512, channels).validate(),
                Err(AudioError::UnsupportedLayout(_))
            ));
        }
    }
}
