//! Biquad coefficient design
//!
//! Pure functions mapping (sample rate, frequency, Q, linear gain) to a
//! normalised second-order section. Inputs are sanitised before design so
//! every coefficient set produced here describes a stable filter.

use crossbeam::utils::CachePadded;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::atomic::{fence, AtomicU32, Ordering};
use std::sync::Arc;

/// Lowest resonance accepted by the designers
pub const MIN_Q: f32 = 0.1;

/// Lowest linear gain accepted by the shelf and peak designers (-20 dB)
pub const MIN_LINEAR_GAIN: f32 = 0.1;

/// Lowest corner/centre frequency in Hz
pub const MIN_FREQUENCY_HZ: f32 = 2.0;

/// Highest corner/centre frequency as a fraction of the sample rate
pub const MAX_FREQUENCY_RATIO: f32 = 0.49;

/// Maximally flat second-order resonance, sqrt(2)/2
pub const BUTTERWORTH_Q: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Filter archetypes used by the strip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterKind {
    HighPass,
    LowShelf,
    HighShelf,
    Peaking,
}

impl FilterKind {
    pub fn name(&self) -> &'static str {
        match self {
            FilterKind::HighPass => "HighPass",
            FilterKind::LowShelf => "LowShelf",
            FilterKind::HighShelf => "HighShelf",
            FilterKind::Peaking => "Peaking",
        }
    }
}

/// User-facing filter controls: frequency in Hz, resonance, linear gain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterSettings {
    pub frequency: f32,
    pub q: f32,
    pub gain: f32,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            frequency: 1000.0,
            q: BUTTERWORTH_Q,
            gain: 1.0,
        }
    }
}

impl FilterSettings {
    pub fn new(frequency: f32, q: f32, gain: f32) -> Self {
        Self { frequency, q, gain }
    }

    /// Clamp every control into the domain where the designers are stable
    ///
    /// Non-finite values fall back to the lower bound.
    #[must_use]
    pub fn sanitized(&self, sample_rate: f32) -> Self {
        let max_frequency = (sample_rate * MAX_FREQUENCY_RATIO).max(MIN_FREQUENCY_HZ);
        Self {
            frequency: floor_finite(self.frequency, MIN_FREQUENCY_HZ).min(max_frequency),
            q: floor_finite(self.q, MIN_Q),
            gain: floor_finite(self.gain, MIN_LINEAR_GAIN),
        }
    }
}

#[inline]
fn floor_finite(value: f32, floor: f32) -> f32 {
    if value.is_finite() {
        value.max(floor)
    } else {
        floor
    }
}

/// Biquad filter coefficients
///
/// Direct Form I taps with a0 normalised to 1.0:
/// `y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiquadCoeffs {
    /// Numerator coefficients
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    /// Denominator coefficients (a0 is normalized to 1.0)
    pub a1: f32,
    pub a2: f32,
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        // Unity gain (no filtering)
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }
}

impl BiquadCoeffs {
    /// Design coefficients for any archetype from its settings
    ///
    /// The high-pass ignores `settings.gain`.
    #[must_use]
    pub fn design(kind: FilterKind, sample_rate: f32, settings: &FilterSettings) -> Self {
        match kind {
            FilterKind::HighPass => Self::high_pass(sample_rate, settings.frequency, settings.q),
            FilterKind::LowShelf => {
                Self::low_shelf(sample_rate, settings.frequency, settings.q, settings.gain)
            }
            FilterKind::HighShelf => {
                Self::high_shelf(sample_rate, settings.frequency, settings.q, settings.gain)
            }
            FilterKind::Peaking => {
                Self::peaking(sample_rate, settings.frequency, settings.q, settings.gain)
            }
        }
    }

    /// Calculate coefficients for a second-order high-pass filter
    ///
    /// Pass [`BUTTERWORTH_Q`] for a maximally flat passband.
    #[must_use]
    pub fn high_pass(sample_rate: f32, freq: f32, q: f32) -> Self {
        let s = FilterSettings::new(freq, q, 1.0).sanitized(sample_rate);
        let (cos_w0, alpha) = angular(sample_rate, s.frequency, s.q);

        let b0 = (1.0 + cos_w0) / 2.0;
        let b1 = -(1.0 + cos_w0);
        let b2 = (1.0 + cos_w0) / 2.0;

        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        Self::normalized(b0, b1, b2, a0, a1, a2)
    }

    /// Calculate coefficients for a low shelf filter
    ///
    /// Boosts or cuts frequencies below the corner frequency by `gain`
    /// (linear, floored at [`MIN_LINEAR_GAIN`]).
    #[must_use]
    pub fn low_shelf(sample_rate: f32, freq: f32, q: f32, gain: f32) -> Self {
        let s = FilterSettings::new(freq, q, gain).sanitized(sample_rate);
        let a = (s.gain as f64).sqrt();
        let (cos_w0, alpha) = angular(sample_rate, s.frequency, s.q);
        let beta = 2.0 * a.sqrt() * alpha;

        let b0 = a * ((a + 1.0) - (a - 1.0) * cos_w0 + beta);
        let b1 = 2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0);
        let b2 = a * ((a + 1.0) - (a - 1.0) * cos_w0 - beta);

        let a0 = (a + 1.0) + (a - 1.0) * cos_w0 + beta;
        let a1 = -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0);
        let a2 = (a + 1.0) + (a - 1.0) * cos_w0 - beta;

        Self::normalized(b0, b1, b2, a0, a1, a2)
    }

    /// Calculate coefficients for a high shelf filter
    ///
    /// Boosts or cuts frequencies above the corner frequency.
    #[must_use]
    pub fn high_shelf(sample_rate: f32, freq: f32, q: f32, gain: f32) -> Self {
        let s = FilterSettings::new(freq, q, gain).sanitized(sample_rate);
        let a = (s.gain as f64).sqrt();
        let (cos_w0, alpha) = angular(sample_rate, s.frequency, s.q);
        let beta = 2.0 * a.sqrt() * alpha;

        let b0 = a * ((a + 1.0) + (a - 1.0) * cos_w0 + beta);
        let b1 = -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0);
        let b2 = a * ((a + 1.0) + (a - 1.0) * cos_w0 - beta);

        let a0 = (a + 1.0) - (a - 1.0) * cos_w0 + beta;
        let a1 = 2.0 * ((a - 1.0) - (a + 1.0) * cos_w0);
        let a2 = (a + 1.0) - (a - 1.0) * cos_w0 - beta;

        Self::normalized(b0, b1, b2, a0, a1, a2)
    }

    /// Calculate coefficients for a peaking EQ filter
    ///
    /// Boosts or cuts frequencies around a center frequency; the response at
    /// the center equals `gain`.
    #[must_use]
    pub fn peaking(sample_rate: f32, freq: f32, q: f32, gain: f32) -> Self {
        let s = FilterSettings::new(freq, q, gain).sanitized(sample_rate);
        let a = (s.gain as f64).sqrt();
        let (cos_w0, alpha) = angular(sample_rate, s.frequency, s.q);

        let b0 = 1.0 + alpha * a;
        let b1 = -2.0 * cos_w0;
        let b2 = 1.0 - alpha * a;

        let a0 = 1.0 + alpha / a;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha / a;

        Self::normalized(b0, b1, b2, a0, a1, a2)
    }

    fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0: (b0 / a0) as f32,
            b1: (b1 / a0) as f32,
            b2: (b2 / a0) as f32,
            a1: (a1 / a0) as f32,
            a2: (a2 / a0) as f32,
        }
    }

    /// Complex frequency response at `frequency` Hz
    pub fn response(&self, frequency: f32, sample_rate: f32) -> Complex64 {
        let w = 2.0 * PI * frequency as f64 / sample_rate as f64;
        let z1 = Complex64::from_polar(1.0, -w);
        let z2 = z1 * z1;

        let numerator = self.b0 as f64 + z1 * self.b1 as f64 + z2 * self.b2 as f64;
        let denominator = 1.0 + z1 * self.a1 as f64 + z2 * self.a2 as f64;
        numerator / denominator
    }

    /// Linear magnitude response at `frequency` Hz
    pub fn magnitude(&self, frequency: f32, sample_rate: f32) -> f64 {
        self.response(frequency, sample_rate).norm()
    }

    /// Magnitude response in decibels at `frequency` Hz
    pub fn magnitude_db(&self, frequency: f32, sample_rate: f32) -> f64 {
        20.0 * self.magnitude(frequency, sample_rate).max(1e-12).log10()
    }

    /// Roots of `z^2 + a1*z + a2`
    pub fn poles(&self) -> [Complex64; 2] {
        let a1 = self.a1 as f64;
        let a2 = self.a2 as f64;
        let root = Complex64::new(a1 * a1 - 4.0 * a2, 0.0).sqrt();
        [(-a1 + root) / 2.0, (-a1 - root) / 2.0]
    }

    /// Both poles strictly inside the unit circle
    pub fn is_stable(&self) -> bool {
        self.is_finite() && self.poles().iter().all(|p| p.norm() < 1.0)
    }

    pub fn is_finite(&self) -> bool {
        [self.b0, self.b1, self.b2, self.a1, self.a2]
            .iter()
            .all(|c| c.is_finite())
    }
}

/// `(cos(w0), sin(w0) / 2Q)` for the RBJ designs
#[inline]
fn angular(sample_rate: f32, freq: f32, q: f32) -> (f64, f64) {
    debug_assert!(sample_rate > 0.0, "sample rate must be positive");
    let w0 = 2.0 * PI * freq as f64 / sample_rate as f64;
    (w0.cos(), w0.sin() / (2.0 * q as f64))
}

/// Combined response of several sections in series, in decibels
pub fn cascade_magnitude_db(sections: &[BiquadCoeffs], frequency: f32, sample_rate: f32) -> f64 {
    sections
        .iter()
        .map(|c| c.magnitude_db(frequency, sample_rate))
        .sum()
}

/// Logarithmically spaced frequencies from `min_hz` to `max_hz` inclusive
pub fn log_frequency_grid(min_hz: f32, max_hz: f32, points: usize) -> Vec<f32> {
    match points {
        0 => Vec::new(),
        1 => vec![min_hz],
        _ => {
            let ratio = (max_hz / min_hz).ln();
            (0..points)
                .map(|i| min_hz * (ratio * i as f32 / (points - 1) as f32).exp())
                .collect()
        }
    }
}

/// Latest coefficients of one filter stage, shared with display code
///
/// Single writer: only the owning stage publishes, once per block. Publishing
/// is wait-free. Readers retry while a publish is in flight, so they always
/// see one whole coefficient set, never a mix of two blocks.
#[derive(Debug, Clone)]
pub struct CoefficientCell(Arc<SeqCoefficients>);

#[derive(Debug)]
struct SeqCoefficients {
    // Odd while a publish is in progress
    sequence: CachePadded<AtomicU32>,
    taps: [AtomicU32; 5],
}

impl Default for CoefficientCell {
    fn default() -> Self {
        Self::new(BiquadCoeffs::default())
    }
}

impl CoefficientCell {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        let taps = coeffs_to_bits(&coeffs).map(AtomicU32::new);
        Self(Arc::new(SeqCoefficients {
            sequence: CachePadded::new(AtomicU32::new(0)),
            taps,
        }))
    }

    pub fn publish(&self, coeffs: BiquadCoeffs) {
        let cell = &self.0;
        let sequence = cell.sequence.load(Ordering::Relaxed);
        cell.sequence.store(sequence.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);
        for (tap, bits) in cell.taps.iter().zip(coeffs_to_bits(&coeffs)) {
            tap.store(bits, Ordering::Relaxed);
        }
        cell.sequence.store(sequence.wrapping_add(2), Ordering::Release);
    }

    pub fn load(&self) -> BiquadCoeffs {
        let cell = &self.0;
        loop {
            let before = cell.sequence.load(Ordering::Acquire);
            if before % 2 == 1 {
                std::hint::spin_loop();
                continue;
            }
            let bits: [u32; 5] = std::array::from_fn(|i| cell.taps[i].load(Ordering::Relaxed));
            fence(Ordering::Acquire);
            if cell.sequence.load(Ordering::Relaxed) == before {
                return coeffs_from_bits(bits);
            }
        }
    }
}

fn coeffs_to_bits(c: &BiquadCoeffs) -> [u32; 5] {
    [c.b0, c.b1, c.b2, c.a1, c.a2].map(f32::to_bits)
}

fn coeffs_from_bits(bits: [u32; 5]) -> BiquadCoeffs {
    let [b0, b1, b2, a1, a2] = bits.map(f32::from_bits);
    BiquadCoeffs { b0, b1, b2, a1, a2 }
}
