//! Domain entities and business rules

pub mod audio;
pub mod config;
pub mod dsp;
pub mod params;
pub mod processor;

// Re-export specific items to avoid ambiguous glob imports
pub use audio::{AudioError, BusLayout, ChannelCount, ProcessSpec};
pub use config::{ConfigError, ConfigManager, EngineConfig, WarmthConfig};
pub use dsp::*;
pub use params::{
    Band, ParamError, ParamId, ParamKind, ParamSpec, ParameterState, ParameterStore, ShelfMode,
};
pub use processor::{ChannelStrip, STATE_TAG, STATE_VERSION};
