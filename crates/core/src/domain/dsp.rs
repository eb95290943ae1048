//! Digital Signal Processing for the channel strip
//!
//! This module provides the building blocks of the strip and the engine that
//! drives them:
//! - Biquad coefficient design (high-pass, shelves, peaking)
//! - Parameter smoothing (linear and exponential ramps)
//! - Processing stages (filter, gain, saturation)
//! - The fixed signal graph and its per-block update driver
//!
//! All processing is designed for:
//! - Zero allocations in the hot path (after `prepare`)
//! - No locks or blocking calls on the audio thread
//! - Planar, in-place processing of `&mut [&mut [f32]]` channel slices

pub mod coefficients;
pub mod driver;
pub mod graph;
pub mod smoothing;
pub mod stages;

pub use coefficients::*;
pub use driver::*;
pub use graph::*;
pub use smoothing::*;
pub use stages::*;

use crate::domain::audio::ProcessSpec;

/// Common capability set of every stage in the graph
///
/// Stages process planar audio in place: one slice per channel, all slices
/// the same length.
pub trait Processor: Send {
    /// (Re)allocate internal state for the given processing context
    ///
    /// Must be called before the first `process`. Never called on the audio
    /// thread.
    fn prepare(&mut self, spec: &ProcessSpec);

    /// Process one block of audio in place
    ///
    /// # Requirements
    /// - No allocations
    /// - Handles blocks of any length up to the prepared maximum
    fn process(&mut self, channels: &mut [&mut [f32]]);

    /// Reset internal state to initial conditions
    ///
    /// Called on transport stop/seek to avoid stale-state artifacts.
    fn reset(&mut self);

    /// Stage name for debugging/display
    fn name(&self) -> &str;
}

/// Convert decibels to a linear amplitude factor
#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}
