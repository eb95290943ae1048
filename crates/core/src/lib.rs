//! Warmth core: the channel strip's DSP, parameters and configuration

pub mod domain;

pub use domain::{AudioError, ChannelStrip, EngineConfig, ParamId, ParameterStore, WarmthConfig};
