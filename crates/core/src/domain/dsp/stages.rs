//! Processing stages of the strip
//!
//! Three stage types make up the whole graph: biquad filters, plain gains and
//! memoryless saturators. Each implements [`Processor`] and processes planar
//! audio in place.

use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;
use tracing::trace;

use super::coefficients::{BiquadCoeffs, CoefficientCell, FilterKind, FilterSettings};
use super::{db_to_gain, Processor};
use crate::domain::audio::ProcessSpec;

// ============================================================================
// Filter Stage
// ============================================================================

/// History of one channel of a Direct Form I biquad
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BiquadState {
    // Previous input samples (x[n-1], x[n-2])
    x1: f32,
    x2: f32,
    // Previous output samples (y[n-1], y[n-2])
    y1: f32,
    y2: f32,
}

impl BiquadState {
    /// Process a single sample
    #[inline]
    pub fn process_sample(&mut self, coeffs: &BiquadCoeffs, x: f32) -> f32 {
        // Direct Form I: y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2]
        //                        - a1*y[n-1] - a2*y[n-2]
        let y = coeffs.b0 * x + coeffs.b1 * self.x1 + coeffs.b2 * self.x2
            - coeffs.a1 * self.y1
            - coeffs.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;

        y
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Biquad filter with per-channel history
///
/// Coefficients are shared by all channels and can be swapped between blocks
/// without touching the history, so parameter sweeps stay click-free.
#[derive(Debug, Clone)]
pub struct FilterStage {
    label: &'static str,
    kind: FilterKind,
    settings: FilterSettings,
    coeffs: BiquadCoeffs,
    states: Vec<BiquadState>,
    snapshot: CoefficientCell,
    prepared: bool,
}

impl FilterStage {
    /// Create an identity filter of the given archetype
    pub fn new(label: &'static str, kind: FilterKind) -> Self {
        Self {
            label,
            kind,
            settings: FilterSettings::default(),
            coeffs: BiquadCoeffs::default(),
            states: Vec::new(),
            snapshot: CoefficientCell::default(),
            prepared: false,
        }
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    /// Settings after sanitising, as last used for design
    pub fn settings(&self) -> FilterSettings {
        self.settings
    }

    pub fn coefficients(&self) -> BiquadCoeffs {
        self.coeffs
    }

    /// Handle to the coefficients published for display code
    pub fn snapshot(&self) -> CoefficientCell {
        self.snapshot.clone()
    }

    /// Redesign the filter for new settings
    ///
    /// Out-of-range settings are clamped into the stable domain. The new
    /// coefficients apply from the next processed sample.
    pub fn update_coefficients(&mut self, sample_rate: f32, settings: FilterSettings) {
        let settings = settings.sanitized(sample_rate);
        self.settings = settings;
        self.coeffs = BiquadCoeffs::design(self.kind, sample_rate, &settings);
        self.snapshot.publish(self.coeffs);

        trace!(
            stage = self.label,
            frequency = settings.frequency,
            q = settings.q,
            gain = settings.gain,
            "filter coefficients updated"
        );
    }
}

impl Processor for FilterStage {
    fn prepare(&mut self, spec: &ProcessSpec) {
        self.states = vec![BiquadState::default(); spec.channels];
        self.prepared = true;
    }

    fn process(&mut self, channels: &mut [&mut [f32]]) {
        debug_assert!(self.prepared, "{} processed before prepare", self.label);
        debug_assert!(channels.len() <= self.states.len());

        let coeffs = self.coeffs;
        for (channel, state) in channels.iter_mut().zip(self.states.iter_mut()) {
            for sample in channel.iter_mut() {
                *sample = state.process_sample(&coeffs, *sample);
            }
        }
    }

    fn reset(&mut self) {
        self.states.iter_mut().for_each(BiquadState::reset);
    }

    fn name(&self) -> &str {
        self.label
    }
}

// ============================================================================
// Gain Stage
// ============================================================================

/// Multiplies every sample by a linear factor
#[derive(Debug, Clone)]
pub struct GainStage {
    label: &'static str,
    gain: f32,
}

impl GainStage {
    pub fn new(label: &'static str) -> Self {
        Self { label, gain: 1.0 }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn update_gain(&mut self, linear: f32) {
        self.gain = linear;
    }

    pub fn update_gain_db(&mut self, db: f32) {
        self.gain = db_to_gain(db);
    }
}

impl Processor for GainStage {
    fn prepare(&mut self, _spec: &ProcessSpec) {}

    fn process(&mut self, channels: &mut [&mut [f32]]) {
        let gain = self.gain;
        for channel in channels.iter_mut() {
            for sample in channel.iter_mut() {
                *sample *= gain;
            }
        }
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        self.label
    }
}

// ============================================================================
// Saturation Stage
// ============================================================================

/// Waveshaping transfer curves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SaturationCurve {
    /// Identity
    #[default]
    Clean,
    /// Even blend of tanh and sine
    Warm,
    /// Asymmetric tanh with a linear term
    Bright,
    /// Plain tanh
    Thick,
}

impl SaturationCurve {
    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            SaturationCurve::Clean => x,
            SaturationCurve::Warm => 0.5 * (x.tanh() + x.clamp(-FRAC_PI_2, FRAC_PI_2).sin()),
            SaturationCurve::Bright => {
                if x >= 0.0 {
                    x.tanh() + 0.25 * x
                } else {
                    0.8 * x.tanh() + 0.25 * x
                }
            }
            SaturationCurve::Thick => x.tanh(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SaturationCurve::Clean => "Clean",
            SaturationCurve::Warm => "Warm",
            SaturationCurve::Bright => "Bright",
            SaturationCurve::Thick => "Thick",
        }
    }
}

/// Memoryless saturator; switching curves takes effect on the next sample
#[derive(Debug, Clone)]
pub struct SaturationStage {
    label: &'static str,
    curve: SaturationCurve,
}

impl SaturationStage {
    pub fn new(label: &'static str, curve: SaturationCurve) -> Self {
        Self { label, curve }
    }

    pub fn curve(&self) -> SaturationCurve {
        self.curve
    }

    pub fn set_curve(&mut self, curve: SaturationCurve) {
        self.curve = curve;
    }
}

impl Processor for SaturationStage {
    fn prepare(&mut self, _spec: &ProcessSpec) {}

    fn process(&mut self, channels: &mut [&mut [f32]]) {
        let curve = self.curve;
        if curve == SaturationCurve::Clean {
            return;
        }
        for channel in channels.iter_mut() {
            for sample in channel.iter_mut() {
                *sample = curve.apply(*sample);
            }
        }
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        self.label
    }
}
