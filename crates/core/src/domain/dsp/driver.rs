//! Per-block graph update driver
//!
//! Once per audio block the driver reads every parameter from the store,
//! ramps a smoother per control towards it, and pushes the resulting working
//! values into the graph: gains, filter coefficients and saturation curves.
//!
//! Each control is a [`Binding`] of a target source, a smoother and a sink.
//! A block runs in two phases. First every smoother receives its target,
//! then every smoother advances by the block length. Targets that depend on
//! another control (the low shelf bump Q reads the low gain) therefore see
//! that control's value from before this block's step.

use tracing::trace;

use super::coefficients::{FilterSettings, BUTTERWORTH_Q, MIN_LINEAR_GAIN, MIN_Q};
use super::graph::{FilterSlot, GainSlot, SaturationSlot, SignalGraph};
use super::smoothing::{SmoothedValue, SmoothingStyle};
use super::stages::SaturationCurve;
use super::db_to_gain;
use crate::domain::params::{Band, ParamId, ParameterStore, ShelfMode};

/// Resonance of a plain shelf
pub const SHELF_Q: f32 = 0.7;
/// Resonance of a wide shelf
pub const WIDE_SHELF_Q: f32 = 0.4;
/// Resonance of a bump shelf
pub const BUMP_SHELF_Q: f32 = 1.4;
/// Resonance of a boosting low bump shelf
pub const LOW_BUMP_BOOST_Q: f32 = 1.1;

/// Shelf resonance for a band's mode
///
/// `low_gain` is the low shelf's current linear gain; a boosting low bump is
/// less resonant than a cutting one.
pub fn shelf_q(band: Band, mode: ShelfMode, low_gain: f32) -> f32 {
    match (band, mode) {
        (Band::Low, ShelfMode::Bump) if low_gain > 1.0 => LOW_BUMP_BOOST_Q,
        (_, ShelfMode::Bump) => BUMP_SHELF_Q,
        (_, ShelfMode::Wide) => WIDE_SHELF_Q,
        (_, ShelfMode::Shelf) => SHELF_Q,
    }
}

/// Where a binding's target comes from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetSource {
    /// Parameter value in decibels, used as is
    Decibels(ParamId),
    /// Parameter in decibels converted to a linear factor, floored at
    /// [`MIN_LINEAR_GAIN`]
    LinearGain(ParamId),
    /// Parameter value in Hz
    Frequency(ParamId),
    /// Parameter value floored at [`MIN_Q`]
    Resonance(ParamId),
    /// Shelf resonance derived from a band's mode flags
    ShelfResonance(Band),
}

/// Field of a filter's settings fed by a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Frequency,
    Q,
    Gain,
}

/// Where a binding's working value goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sink {
    /// Gain stage, value in decibels
    Gain(GainSlot),
    /// Drive gain; also sets the compensation stage to `-drive_db`
    ///
    /// The two gains cancel exactly, so drive only changes how hard the
    /// stages between them are hit.
    Drive,
    Filter(FilterSlot, FilterField),
}

/// One smoothed control
#[derive(Debug, Clone)]
pub struct Binding {
    pub target: TargetSource,
    pub smoother: SmoothedValue,
    pub sink: Sink,
}

impl Binding {
    fn new(target: TargetSource, sink: Sink) -> Self {
        let style = match target {
            TargetSource::Frequency(_) => SmoothingStyle::Exponential,
            _ => SmoothingStyle::Linear,
        };
        Self {
            target,
            smoother: SmoothedValue::new(0.0, style),
            sink,
        }
    }
}

/// Values most recently pushed into the graph
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkingValues {
    gains_db: [f32; 4],
    filters: [FilterSettings; 5],
    curves: [SaturationCurve; 2],
}

impl Default for WorkingValues {
    fn default() -> Self {
        let mut filters = [FilterSettings::default(); 5];
        filters[FilterSlot::HighPass.index()].q = BUTTERWORTH_Q;
        Self {
            gains_db: [0.0; 4],
            filters,
            curves: [SaturationCurve::Bright, SaturationCurve::Thick],
        }
    }
}

impl WorkingValues {
    pub fn gain_db(&self, slot: GainSlot) -> f32 {
        self.gains_db[slot.index()]
    }

    pub fn filter(&self, slot: FilterSlot) -> FilterSettings {
        self.filters[slot.index()]
    }

    pub fn curve(&self, slot: SaturationSlot) -> SaturationCurve {
        self.curves[slot.index()]
    }

    fn write(&mut self, sink: Sink, value: f32) {
        match sink {
            Sink::Gain(slot) => self.gains_db[slot.index()] = value,
            Sink::Drive => {
                self.gains_db[GainSlot::Drive.index()] = value;
                self.gains_db[GainSlot::DriveCompensation.index()] = -value;
            }
            Sink::Filter(slot, field) => {
                let settings = &mut self.filters[slot.index()];
                match field {
                    FilterField::Frequency => settings.frequency = value,
                    FilterField::Q => settings.q = value,
                    FilterField::Gain => settings.gain = value,
                }
            }
        }
    }
}

fn bindings() -> Vec<Binding> {
    use FilterField::{Frequency, Gain, Q};
    use TargetSource as T;

    vec![
        Binding::new(T::Decibels(ParamId::InGain), Sink::Gain(GainSlot::Input)),
        Binding::new(T::Decibels(ParamId::Drive), Sink::Drive),
        Binding::new(T::Decibels(ParamId::OutGain), Sink::Gain(GainSlot::Output)),
        // Gain ahead of Q so `prepare` snaps the gain before the bump Q reads it
        Binding::new(T::Frequency(ParamId::LowFreq), Sink::Filter(FilterSlot::LowShelf, Frequency)),
        Binding::new(T::LinearGain(ParamId::LowGain), Sink::Filter(FilterSlot::LowShelf, Gain)),
        Binding::new(T::ShelfResonance(Band::Low), Sink::Filter(FilterSlot::LowShelf, Q)),
        Binding::new(T::Frequency(ParamId::LowMidFreq), Sink::Filter(FilterSlot::LowMidPeak, Frequency)),
        Binding::new(T::LinearGain(ParamId::LowMidGain), Sink::Filter(FilterSlot::LowMidPeak, Gain)),
        Binding::new(T::Resonance(ParamId::LowMidQ), Sink::Filter(FilterSlot::LowMidPeak, Q)),
        Binding::new(T::Frequency(ParamId::HighMidFreq), Sink::Filter(FilterSlot::HighMidPeak, Frequency)),
        Binding::new(T::LinearGain(ParamId::HighMidGain), Sink::Filter(FilterSlot::HighMidPeak, Gain)),
        Binding::new(T::Resonance(ParamId::HighMidQ), Sink::Filter(FilterSlot::HighMidPeak, Q)),
        Binding::new(T::Frequency(ParamId::HighFreq), Sink::Filter(FilterSlot::HighShelf, Frequency)),
        Binding::new(T::LinearGain(ParamId::HighGain), Sink::Filter(FilterSlot::HighShelf, Gain)),
        Binding::new(T::ShelfResonance(Band::High), Sink::Filter(FilterSlot::HighShelf, Q)),
        Binding::new(T::Frequency(ParamId::HighPass), Sink::Filter(FilterSlot::HighPass, Frequency)),
    ]
}

/// Translates parameter values into graph state once per block
#[derive(Debug, Clone)]
pub struct GraphUpdateDriver {
    bindings: Vec<Binding>,
    working: WorkingValues,
    sample_rate: f32,
}

impl Default for GraphUpdateDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphUpdateDriver {
    pub fn new() -> Self {
        Self {
            bindings: bindings(),
            working: WorkingValues::default(),
            sample_rate: 0.0,
        }
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn working_values(&self) -> &WorkingValues {
        &self.working
    }

    /// Configure ramps and jump every control to the store's current values
    ///
    /// The graph receives the resulting state immediately, so the first
    /// block after `prepare` is processed with the stored settings rather
    /// than ramping in from arbitrary values.
    pub fn prepare(
        &mut self,
        sample_rate: f32,
        ramp_seconds: f32,
        store: &ParameterStore,
        graph: &mut SignalGraph,
    ) {
        self.sample_rate = sample_rate;
        for i in 0..self.bindings.len() {
            let value = self.resolve(self.bindings[i].target, store);
            let binding = &mut self.bindings[i];
            binding.smoother.reset(sample_rate, ramp_seconds);
            binding.smoother.set_current_and_target(value);
            self.working.write(binding.sink, value);
        }
        self.apply(store, graph);
    }

    /// Advance every control by one block and update the graph
    ///
    /// Empty blocks leave everything untouched.
    pub fn update(&mut self, store: &ParameterStore, graph: &mut SignalGraph, block_len: usize) {
        if block_len == 0 {
            return;
        }
        let skip = u32::try_from(block_len - 1).unwrap_or(u32::MAX);

        for i in 0..self.bindings.len() {
            let target = self.resolve(self.bindings[i].target, store);
            self.bindings[i].smoother.set_target(target);
        }

        for binding in self.bindings.iter_mut() {
            let value = binding.smoother.next();
            binding.smoother.skip(skip);
            self.working.write(binding.sink, value);
        }

        self.apply(store, graph);

        trace!(
            block_len,
            drive_db = self.working.gain_db(GainSlot::Drive),
            "graph updated"
        );
    }

    fn resolve(&self, target: TargetSource, store: &ParameterStore) -> f32 {
        match target {
            TargetSource::Decibels(id) | TargetSource::Frequency(id) => store.get(id),
            TargetSource::LinearGain(id) => db_to_gain(store.get(id)).max(MIN_LINEAR_GAIN),
            TargetSource::Resonance(id) => store.get(id).max(MIN_Q),
            TargetSource::ShelfResonance(band) => {
                let low_gain = self.current(Sink::Filter(FilterSlot::LowShelf, FilterField::Gain));
                shelf_q(band, store.shelf_mode(band), low_gain.unwrap_or(1.0))
            }
        }
    }

    /// Current (not target) value of the binding feeding `sink`
    fn current(&self, sink: Sink) -> Option<f32> {
        self.bindings
            .iter()
            .find(|binding| binding.sink == sink)
            .map(|binding| binding.smoother.current())
    }

    fn apply(&mut self, store: &ParameterStore, graph: &mut SignalGraph) {
        for slot in GainSlot::ALL {
            graph.gain_mut(slot).update_gain_db(self.working.gain_db(slot));
        }
        for slot in FilterSlot::ALL {
            graph
                .filter_mut(slot)
                .update_coefficients(self.sample_rate, self.working.filter(slot));
        }
        for slot in SaturationSlot::ALL {
            let curve = store.saturation_curve(slot);
            self.working.curves[slot.index()] = curve;
            graph.saturation_mut(slot).set_curve(curve);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audio::ProcessSpec;
    use crate::domain::dsp::{BiquadCoeffs, Processor};

    const SAMPLE_RATE: f32 = 48000.0;
    const BLOCK: usize = 512;
    const RAMP: f32 = 0.25;

    fn prepared(store: &ParameterStore) -> (GraphUpdateDriver, SignalGraph) {
        let mut graph = SignalGraph::new();
        graph.prepare(&ProcessSpec::new(SAMPLE_RATE, BLOCK, 2));
        let mut driver = GraphUpdateDriver::new();
        driver.prepare(SAMPLE_RATE, RAMP, store, &mut graph);
        (driver, graph)
    }

    #[test]
    fn test_shelf_q_table() {
        assert_eq!(shelf_q(Band::Low, ShelfMode::Bump, 2.0), 1.1);
        assert_eq!(shelf_q(Band::Low, ShelfMode::Bump, 1.0), 1.4);
        assert_eq!(shelf_q(Band::Low, ShelfMode::Bump, 0.5), 1.4);
        assert_eq!(shelf_q(Band::High, ShelfMode::Bump, 2.0), 1.4);
        assert_eq!(shelf_q(Band::Low, ShelfMode::Wide, 2.0), 0.4);
        assert_eq!(shelf_q(Band::High, ShelfMode::Shelf, 2.0), 0.7);
    }

    #[test]
    fn test_prepare_snaps_to_store() {
        let store = ParameterStore::new();
        store.set(ParamId::LowMidFreq, 1000.0);
        store.set(ParamId::OutGain, -3.0);
        let (driver, graph) = prepared(&store);

        let working = driver.working_values();
        assert_eq!(working.filter(FilterSlot::LowMidPeak).frequency, 1000.0);
        assert_eq!(working.gain_db(GainSlot::Output), -3.0);
        assert_eq!(working.filter(FilterSlot::HighPass).q, BUTTERWORTH_Q);
        assert!(driver.bindings().iter().all(|b| !b.smoother.is_smoothing()));

        // Unity gains make every EQ filter an identity
        assert_eq!(
            graph.filter(FilterSlot::LowShelf).coefficients().b0,
            BiquadCoeffs::low_shelf(SAMPLE_RATE, 100.0, SHELF_Q, 1.0).b0
        );
        let peak = graph.filter(FilterSlot::HighMidPeak).coefficients();
        assert_eq!(peak.b1, peak.a1);
        assert_eq!(peak.b2, peak.a2);
    }

    #[test]
    fn test_gain_step_reaches_target_within_ramp() {
        let store = ParameterStore::new();
        let (mut driver, mut graph) = prepared(&store);
        store.set(ParamId::InGain, 6.0);

        // 0.25 s at 48 kHz is 12000 samples; the working value of block n is
        // taken one sample into that block, so block 25 is the first at target
        let mut previous = 0.0;
        for _ in 0..24 {
            driver.update(&store, &mut graph, BLOCK);
            let gain = driver.working_values().gain_db(GainSlot::Input);
            assert!(gain > previous && gain < 6.0);
            previous = gain;
        }
        driver.update(&store, &mut graph, BLOCK);
        assert_eq!(driver.working_values().gain_db(GainSlot::Input), 6.0);
        assert!((graph.gain(GainSlot::Input).gain() - db_to_gain(6.0)).abs() < 1e-6);
    }

    #[test]
    fn test_drive_compensation_mirrors_drive() {
        let store = ParameterStore::new();
        let (mut driver, mut graph) = prepared(&store);
        store.set(ParamId::Drive, 9.0);

        for _ in 0..10 {
            driver.update(&store, &mut graph, BLOCK);
            let working = driver.working_values();
            assert_eq!(
                working.gain_db(GainSlot::DriveCompensation),
                -working.gain_db(GainSlot::Drive)
            );
        }
        let product = graph.gain(GainSlot::Drive).gain()
            * graph.gain(GainSlot::DriveCompensation).gain();
        assert!((product - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_low_bump_q_follows_gain_sign() {
        let store = ParameterStore::new();
        store.select_shelf_mode(Band::Low, ShelfMode::Bump);
        store.set(ParamId::LowGain, 6.0);
        let (driver, _) = prepared(&store);
        assert_eq!(driver.working_values().filter(FilterSlot::LowShelf).q, 1.1);

        store.set(ParamId::LowGain, -6.0);
        let (driver, _) = prepared(&store);
        assert_eq!(driver.working_values().filter(FilterSlot::LowShelf).q, 1.4);
    }

    #[test]
    fn test_low_bump_q_reads_gain_before_step() {
        let store = ParameterStore::new();
        let (mut driver, mut graph) = prepared(&store);
        store.select_shelf_mode(Band::Low, ShelfMode::Bump);
        store.set(ParamId::LowGain, 6.0);

        // Gain is still at unity when the first block resolves the Q target
        driver.update(&store, &mut graph, BLOCK);
        let q_binding = driver
            .bindings()
            .iter()
            .find(|b| b.target == TargetSource::ShelfResonance(Band::Low))
            .map(|b| b.smoother.target());
        assert_eq!(q_binding, Some(1.4));

        for _ in 0..60 {
            driver.update(&store, &mut graph, BLOCK);
        }
        assert_eq!(driver.working_values().filter(FilterSlot::LowShelf).q, 1.1);
    }

    #[test]
    fn test_gain_floor_applies_to_filter_gain() {
        let store = ParameterStore::new();
        store.set(ParamId::HighGain, -20.0);
        let (driver, _) = prepared(&store);
        let gain = driver.working_values().filter(FilterSlot::HighShelf).gain;
        assert!((gain - MIN_LINEAR_GAIN).abs() < 1e-6);
    }

    #[test]
    fn test_empty_block_is_ignored() {
        let store = ParameterStore::new();
        let (mut driver, mut graph) = prepared(&store);
        store.set(ParamId::OutGain, 12.0);
        let before = *driver.working_values();
        driver.update(&store, &mut graph, 0);
        assert_eq!(*driver.working_values(), before);
    }

    #[test]
    fn test_saturation_follows_flags_every_block() {
        let store = ParameterStore::new();
        let (mut driver, mut graph) = prepared(&store);
        assert_eq!(graph.saturation(SaturationSlot::Input).curve(), SaturationCurve::Bright);
        assert_eq!(graph.saturation(SaturationSlot::Output).curve(), SaturationCurve::Thick);

        store.set_bool(ParamId::OutClean, true);
        store.set_bool(ParamId::InWarm, true);
        driver.update(&store, &mut graph, 1);
        assert_eq!(graph.saturation(SaturationSlot::Input).curve(), SaturationCurve::Warm);
        assert_eq!(graph.saturation(SaturationSlot::Output).curve(), SaturationCurve::Clean);
        assert_eq!(
            driver.working_values().curve(SaturationSlot::Output),
            SaturationCurve::Clean
        );
    }

    #[test]
    fn test_frequency_ramp_is_exponential() {
        let store = ParameterStore::new();
        store.set(ParamId::HighPass, 25.0);
        let (mut driver, mut graph) = prepared(&store);
        store.set(ParamId::HighPass, 250.0);

        // Half the ramp lands near the geometric mean
        let half = (RAMP * SAMPLE_RATE / 2.0) as usize;
        driver.update(&store, &mut graph, half);
        driver.update(&store, &mut graph, 1);
        let frequency = driver.working_values().filter(FilterSlot::HighPass).frequency;
        assert!((frequency - 79.06).abs() < 1.0, "frequency = {frequency}");
    }
}
