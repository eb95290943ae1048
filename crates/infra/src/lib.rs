//! Host-side infrastructure for the Warmth channel strip
//!
//! - [`render`]: offline WAV rendering that drives the strip like a plugin host
//! - [`analysis`]: FFT spectrum measurements used to verify rendered audio

pub mod analysis;
pub mod render;

pub use analysis::{band_gain_db, AnalysisError, SpectrumAnalyzer};
pub use render::{render_buffer, render_file, AudioBuffer, RenderError, RenderSummary};
