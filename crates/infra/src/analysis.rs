//! Spectrum measurements
//!
//! Averaged, Hann-windowed power spectra (Welch's method) and band gain
//! between two signals. Used to check what the strip does to real audio
//! rather than what its coefficients promise.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    #[error("FFT size must be a power of two of at least 16, got {0}")]
    InvalidFftSize(usize),

    #[error("Signal of {len} samples is shorter than one {fft_size}-point frame")]
    SignalTooShort { len: usize, fft_size: usize },

    #[error("Band {low_hz}..{high_hz} Hz contains no FFT bins")]
    EmptyBand { low_hz: f32, high_hz: f32 },
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Averaged power spectrum analyser
pub struct SpectrumAnalyzer {
    fft_size: usize,
    fft: Arc<dyn Fft<f64>>,
    window: Vec<f64>,
}

impl SpectrumAnalyzer {
    pub fn new(fft_size: usize) -> Result<Self> {
        if fft_size < 16 || !fft_size.is_power_of_two() {
            return Err(AnalysisError::InvalidFftSize(fft_size));
        }

        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(fft_size);

        // Hann window
        let window = (0..fft_size)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / fft_size as f64).cos()))
            .collect();

        Ok(Self {
            fft_size,
            fft,
            window,
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Mean power per bin over half-overlapping frames, bins `0..=N/2`
    pub fn power_spectrum(&self, samples: &[f32]) -> Result<Vec<f64>> {
        if samples.len() < self.fft_size {
            return Err(AnalysisError::SignalTooShort {
                len: samples.len(),
                fft_size: self.fft_size,
            });
        }

        let hop = self.fft_size / 2;
        let frames = (samples.len() - self.fft_size) / hop + 1;
        let bins = self.fft_size / 2 + 1;
        let mut power = vec![0.0; bins];
        let mut buffer = vec![Complex::new(0.0, 0.0); self.fft_size];

        for frame in 0..frames {
            let start = frame * hop;
            for (i, slot) in buffer.iter_mut().enumerate() {
                *slot = Complex::new(samples[start + i] as f64 * self.window[i], 0.0);
            }
            self.fft.process(&mut buffer);
            for (acc, bin) in power.iter_mut().zip(&buffer) {
                *acc += bin.norm_sqr();
            }
        }

        let scale = 1.0 / frames as f64;
        power.iter_mut().for_each(|p| *p *= scale);
        Ok(power)
    }

    /// Centre frequency of a bin
    pub fn bin_frequency(&self, bin: usize, sample_rate: f32) -> f64 {
        bin as f64 * sample_rate as f64 / self.fft_size as f64
    }

    /// Total power of the bins whose centre lies in `[low_hz, high_hz]`
    pub fn band_power(
        &self,
        spectrum: &[f64],
        sample_rate: f32,
        low_hz: f32,
        high_hz: f32,
    ) -> Result<f64> {
        let mut total = 0.0;
        let mut count = 0;
        for (bin, power) in spectrum.iter().enumerate() {
            let frequency = self.bin_frequency(bin, sample_rate);
            if frequency >= low_hz as f64 && frequency <= high_hz as f64 {
                total += power;
                count += 1;
            }
        }
        if count == 0 {
            return Err(AnalysisError::EmptyBand { low_hz, high_hz });
        }
        Ok(total)
    }
}

/// Gain from `input` to `output` within a band, in decibels
///
/// Both signals are analysed with the same `fft_size`; the band should
/// cover several bins for a stable estimate.
pub fn band_gain_db(
    input: &[f32],
    output: &[f32],
    sample_rate: f32,
    low_hz: f32,
    high_hz: f32,
    fft_size: usize,
) -> Result<f64> {
    let analyzer = SpectrumAnalyzer::new(fft_size)?;
    let input_power = analyzer.band_power(
        &analyzer.power_spectrum(input)?,
        sample_rate,
        low_hz,
        high_hz,
    )?;
    let output_power = analyzer.band_power(
        &analyzer.power_spectrum(output)?,
        sample_rate,
        low_hz,
        high_hz,
    )?;
    Ok(10.0 * (output_power.max(1e-30) / input_power.max(1e-30)).log10())
}
