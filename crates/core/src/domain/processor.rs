//! Host-facing channel strip
//!
//! [`ChannelStrip`] owns the signal graph and its update driver and exposes
//! the surface a plugin host expects: layout negotiation, prepare/process,
//! state save and restore, and read access to the filter coefficients for
//! display.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::audio::{AudioError, BusLayout, ProcessSpec, Result};
use crate::domain::config::EngineConfig;
use crate::domain::dsp::{
    BiquadCoeffs, CoefficientSnapshots, FilterSlot, GraphUpdateDriver, Processor, SignalGraph,
    WorkingValues,
};
use crate::domain::params::{ParameterState, ParameterStore};

/// Tag identifying a serialized strip state
pub const STATE_TAG: &str = "Parameters";

/// Current version of the serialized state layout
pub const STATE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StateDocument {
    tag: String,
    version: u32,
    parameters: ParameterState,
}

/// Complete channel strip: parameters, smoothing and the signal graph
pub struct ChannelStrip {
    config: EngineConfig,
    store: Arc<ParameterStore>,
    graph: SignalGraph,
    driver: GraphUpdateDriver,
    spec: Option<ProcessSpec>,
}

impl ChannelStrip {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            store: Arc::new(ParameterStore::new()),
            graph: SignalGraph::new(),
            driver: GraphUpdateDriver::new(),
            spec: None,
        }
    }

    pub fn name(&self) -> &str {
        "Warmth"
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shared handle to the parameter store
    pub fn parameters(&self) -> Arc<ParameterStore> {
        Arc::clone(&self.store)
    }

    /// Mono or stereo, with matching input and output
    pub fn is_layout_supported(&self, layout: &BusLayout) -> bool {
        layout.is_supported()
    }

    pub fn accepts_midi(&self) -> bool {
        false
    }

    pub fn is_prepared(&self) -> bool {
        self.spec.is_some()
    }

    /// Get ready to process audio at the given rate and layout
    ///
    /// Smoothers start at the current parameter values, so the first block
    /// is processed with the stored settings.
    pub fn prepare(&mut self, sample_rate: f32, max_block_size: usize, channels: usize) -> Result<()> {
        let spec = ProcessSpec::new(sample_rate, max_block_size, channels);
        spec.validate()?;

        self.graph.prepare(&spec);
        self.driver.prepare(
            sample_rate,
            self.config.smoothing_seconds,
            &self.store,
            &mut self.graph,
        );
        self.spec = Some(spec);

        info!(
            sample_rate,
            max_block_size,
            channels,
            smoothing_seconds = self.config.smoothing_seconds,
            "Channel strip prepared"
        );
        Ok(())
    }

    /// Prepare with the rate, block size and channel count of the engine config
    pub fn prepare_from_config(&mut self) -> Result<()> {
        let spec = self.config.process_spec();
        self.prepare(spec.sample_rate, spec.max_block_size, spec.channels)
    }

    /// Process one block of planar audio in place
    ///
    /// Parameters are read and smoothed once per block. Must follow
    /// `prepare`; in release builds an unprepared strip leaves the audio
    /// untouched.
    pub fn process(&mut self, channels: &mut [&mut [f32]]) {
        debug_assert!(self.spec.is_some(), "process called before prepare");
        let Some(spec) = self.spec else {
            return;
        };

        let block_len = channels.first().map_or(0, |channel| channel.len());
        if block_len == 0 {
            return;
        }

        let active = channels.len().min(spec.channels);
        self.driver.update(&self.store, &mut self.graph, block_len);
        self.graph.process(&mut channels[..active]);
    }

    /// Clear filter history (transport stop or seek)
    pub fn reset(&mut self) {
        self.graph.reset();
    }

    /// Return to the unprepared state
    pub fn release_resources(&mut self) {
        self.graph.reset();
        self.spec = None;
        info!("Channel strip resources released");
    }

    /// Serialize every parameter value
    pub fn get_state(&self) -> Result<Vec<u8>> {
        let document = StateDocument {
            tag: STATE_TAG.to_string(),
            version: STATE_VERSION,
            parameters: self.store.snapshot(),
        };
        serde_json::to_vec(&document).map_err(|e| AudioError::State(e.to_string()))
    }

    /// Restore parameter values from a blob written by `get_state`
    ///
    /// Unknown parameters are skipped; parameters missing from the blob keep
    /// their current value. Values take effect through the smoothers.
    pub fn set_state(&mut self, data: &[u8]) -> Result<()> {
        let document: StateDocument =
            serde_json::from_slice(data).map_err(|e| AudioError::State(e.to_string()))?;

        if document.tag != STATE_TAG {
            return Err(AudioError::State(format!(
                "expected a '{}' document, found '{}'",
                STATE_TAG, document.tag
            )));
        }
        if document.version > STATE_VERSION {
            return Err(AudioError::State(format!(
                "state version {} is newer than supported version {}",
                document.version, STATE_VERSION
            )));
        }

        let applied = self.store.restore(&document.parameters);
        info!(applied, version = document.version, "Channel strip state restored");
        Ok(())
    }

    /// Current coefficients of one filter
    pub fn coefficients(&self, slot: FilterSlot) -> BiquadCoeffs {
        self.graph.filter(slot).coefficients()
    }

    /// Handles for reading coefficients from another thread
    pub fn coefficient_snapshots(&self) -> CoefficientSnapshots {
        debug!("Coefficient snapshots handed out");
        self.graph.coefficient_snapshots()
    }

    /// Values the driver last pushed into the graph
    pub fn working_values(&self) -> &WorkingValues {
        self.driver.working_values()
    }
}

impl Default for ChannelStrip {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
