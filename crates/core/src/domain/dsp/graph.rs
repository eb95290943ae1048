//! Fixed signal graph of the strip
//!
//! Stages are stored in one arena per stage type and addressed by typed
//! slots; the processing order is a static table. The driver reaches a
//! concrete stage through its slot without any downcasting.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::coefficients::{cascade_magnitude_db, BiquadCoeffs, CoefficientCell, FilterKind};
use super::stages::{FilterStage, GainStage, SaturationCurve, SaturationStage};
use super::Processor;
use crate::domain::audio::ProcessSpec;

/// Gain stages of the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GainSlot {
    Input,
    Drive,
    Output,
    DriveCompensation,
}

impl GainSlot {
    pub const ALL: [GainSlot; 4] = [
        GainSlot::Input,
        GainSlot::Drive,
        GainSlot::Output,
        GainSlot::DriveCompensation,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            GainSlot::Input => "InputGain",
            GainSlot::Drive => "DriveGain",
            GainSlot::Output => "OutputGain",
            GainSlot::DriveCompensation => "DriveCompensation",
        }
    }
}

/// Saturation stages of the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SaturationSlot {
    Input,
    Output,
}

impl SaturationSlot {
    pub const ALL: [SaturationSlot; 2] = [SaturationSlot::Input, SaturationSlot::Output];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            SaturationSlot::Input => "InputSaturation",
            SaturationSlot::Output => "OutputSaturation",
        }
    }
}

/// Filter stages of the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterSlot {
    LowShelf,
    LowMidPeak,
    HighMidPeak,
    HighShelf,
    HighPass,
}

impl FilterSlot {
    pub const ALL: [FilterSlot; 5] = [
        FilterSlot::LowShelf,
        FilterSlot::LowMidPeak,
        FilterSlot::HighMidPeak,
        FilterSlot::HighShelf,
        FilterSlot::HighPass,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn kind(self) -> FilterKind {
        match self {
            FilterSlot::LowShelf => FilterKind::LowShelf,
            FilterSlot::LowMidPeak | FilterSlot::HighMidPeak => FilterKind::Peaking,
            FilterSlot::HighShelf => FilterKind::HighShelf,
            FilterSlot::HighPass => FilterKind::HighPass,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FilterSlot::LowShelf => "LowShelf",
            FilterSlot::LowMidPeak => "LowMidPeak",
            FilterSlot::HighMidPeak => "HighMidPeak",
            FilterSlot::HighShelf => "HighShelf",
            FilterSlot::HighPass => "HighPass",
        }
    }
}

/// Reference to one stage in its arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageRef {
    Gain(GainSlot),
    Saturation(SaturationSlot),
    Filter(FilterSlot),
}

/// Processing order, input to output
pub const TOPOLOGY: [StageRef; 11] = [
    StageRef::Gain(GainSlot::Input),
    StageRef::Saturation(SaturationSlot::Input),
    StageRef::Filter(FilterSlot::LowShelf),
    StageRef::Filter(FilterSlot::LowMidPeak),
    StageRef::Gain(GainSlot::Drive),
    StageRef::Filter(FilterSlot::HighMidPeak),
    StageRef::Filter(FilterSlot::HighShelf),
    StageRef::Saturation(SaturationSlot::Output),
    StageRef::Gain(GainSlot::Output),
    StageRef::Gain(GainSlot::DriveCompensation),
    StageRef::Filter(FilterSlot::HighPass),
];

/// Read-side handles to the coefficients of every filter in the graph
///
/// Cloned out to display threads; each read returns a complete coefficient
/// set from the most recent block.
#[derive(Debug, Clone)]
pub struct CoefficientSnapshots {
    cells: [CoefficientCell; 5],
}

impl CoefficientSnapshots {
    pub fn get(&self, slot: FilterSlot) -> BiquadCoeffs {
        self.cells[slot.index()].load()
    }

    /// Coefficients of all filters, in `FilterSlot::ALL` order
    pub fn all(&self) -> [BiquadCoeffs; 5] {
        FilterSlot::ALL.map(|slot| self.get(slot))
    }

    /// Composite magnitude response of the filters in decibels
    pub fn magnitude_db(&self, frequency: f32, sample_rate: f32) -> f64 {
        cascade_magnitude_db(&self.all(), frequency, sample_rate)
    }
}

/// The strip's stages and their fixed order
#[derive(Debug, Clone)]
pub struct SignalGraph {
    gains: [GainStage; 4],
    saturators: [SaturationStage; 2],
    filters: [FilterStage; 5],
    spec: Option<ProcessSpec>,
}

impl Default for SignalGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalGraph {
    /// Build the graph with unity gains and identity filters
    ///
    /// Saturators start on the default curves of the strip: bright on the
    /// input, thick on the output.
    pub fn new() -> Self {
        Self {
            gains: GainSlot::ALL.map(|slot| GainStage::new(slot.name())),
            saturators: [
                SaturationStage::new(SaturationSlot::Input.name(), SaturationCurve::Bright),
                SaturationStage::new(SaturationSlot::Output.name(), SaturationCurve::Thick),
            ],
            filters: FilterSlot::ALL.map(|slot| FilterStage::new(slot.name(), slot.kind())),
            spec: None,
        }
    }

    pub fn spec(&self) -> Option<&ProcessSpec> {
        self.spec.as_ref()
    }

    pub fn gain(&self, slot: GainSlot) -> &GainStage {
        &self.gains[slot.index()]
    }

    pub fn gain_mut(&mut self, slot: GainSlot) -> &mut GainStage {
        &mut self.gains[slot.index()]
    }

    pub fn saturation(&self, slot: SaturationSlot) -> &SaturationStage {
        &self.saturators[slot.index()]
    }

    pub fn saturation_mut(&mut self, slot: SaturationSlot) -> &mut SaturationStage {
        &mut self.saturators[slot.index()]
    }

    pub fn filter(&self, slot: FilterSlot) -> &FilterStage {
        &self.filters[slot.index()]
    }

    pub fn filter_mut(&mut self, slot: FilterSlot) -> &mut FilterStage {
        &mut self.filters[slot.index()]
    }

    pub fn coefficient_snapshots(&self) -> CoefficientSnapshots {
        CoefficientSnapshots {
            cells: FilterSlot::ALL.map(|slot| self.filter(slot).snapshot()),
        }
    }

    fn stage_mut(&mut self, stage: StageRef) -> &mut dyn Processor {
        match stage {
            StageRef::Gain(slot) => self.gain_mut(slot),
            StageRef::Saturation(slot) => self.saturation_mut(slot),
            StageRef::Filter(slot) => self.filter_mut(slot),
        }
    }
}

impl Processor for SignalGraph {
    fn prepare(&mut self, spec: &ProcessSpec) {
        for stage in TOPOLOGY {
            self.stage_mut(stage).prepare(spec);
        }
        self.spec = Some(*spec);

        debug!(
            stages = TOPOLOGY.len(),
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            max_block_size = spec.max_block_size,
            "Signal graph prepared"
        );
    }

    fn process(&mut self, channels: &mut [&mut [f32]]) {
        for stage in TOPOLOGY {
            self.stage_mut(stage).process(channels);
        }
    }

    fn reset(&mut self) {
        for stage in TOPOLOGY {
            self.stage_mut(stage).reset();
        }
    }

    fn name(&self) -> &str {
        "SignalGraph"
    }
}
