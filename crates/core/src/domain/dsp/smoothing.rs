//! Parameter smoothing
//!
//! A [`SmoothedValue`] turns discrete control-rate targets into a ramp that
//! lasts a fixed number of samples, so parameter changes never reach the
//! audio as a step. Ramps are monotonic, never overshoot, and land exactly on
//! the target.

use serde::{Deserialize, Serialize};

/// Shape of the ramp between the current value and the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SmoothingStyle {
    /// Constant increment per sample
    #[default]
    Linear,
    /// Constant ratio per sample (even steps on a log scale)
    ///
    /// Falls back to linear when the start and the target do not share a
    /// sign or either is zero.
    Exponential,
}

/// Control value ramping towards a target over a fixed number of samples
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothedValue {
    style: SmoothingStyle,
    current: f32,
    target: f32,
    steps_to_target: u32,
    countdown: u32,
    // Increment (linear) or ratio (multiplicative) applied per sample
    step: f32,
    multiplicative: bool,
}

impl SmoothedValue {
    /// Create a value resting at `initial` with no ramp configured
    pub fn new(initial: f32, style: SmoothingStyle) -> Self {
        Self {
            style,
            current: initial,
            target: initial,
            steps_to_target: 0,
            countdown: 0,
            step: 0.0,
            multiplicative: false,
        }
    }

    /// Configure the ramp length and stop any ramp in progress
    ///
    /// The ramp lasts `floor(ramp_seconds * sample_rate)` samples; a zero
    /// length makes every `set_target` take effect immediately.
    pub fn reset(&mut self, sample_rate: f32, ramp_seconds: f32) {
        let steps = ramp_seconds * sample_rate;
        self.steps_to_target = if steps.is_finite() && steps > 0.0 {
            steps.floor() as u32
        } else {
            0
        };
        self.set_current_and_target(self.target);
    }

    /// Jump to `value` with no ramp
    pub fn set_current_and_target(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.countdown = 0;
    }

    /// Start ramping towards `value` from wherever the current value is
    ///
    /// Setting the target already being approached does not restart the
    /// ramp. Non-finite targets are ignored.
    pub fn set_target(&mut self, value: f32) {
        if !value.is_finite() || value == self.target {
            return;
        }

        if self.steps_to_target == 0 {
            self.set_current_and_target(value);
            return;
        }

        self.target = value;
        self.countdown = self.steps_to_target;
        self.update_step();
    }

    /// Advance one sample and return the new current value
    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.countdown == 0 {
            return self.target;
        }

        self.countdown -= 1;
        if self.countdown == 0 {
            self.current = self.target;
        } else {
            let before = self.current;
            if self.multiplicative {
                self.current *= self.step;
            } else {
                self.current += self.step;
            }
            self.hold_short_of_target(before);
        }

        self.current
    }

    /// Advance `samples` samples at once and return the new current value
    pub fn skip(&mut self, samples: u32) -> f32 {
        if samples == 0 {
            return self.current;
        }

        if samples >= self.countdown {
            self.set_current_and_target(self.target);
            return self.current;
        }

        let before = self.current;
        if self.multiplicative {
            self.current *= self.step.powf(samples as f32);
        } else {
            self.current += self.step * samples as f32;
        }
        self.countdown -= samples;
        self.hold_short_of_target(before);

        self.current
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn style(&self) -> SmoothingStyle {
        self.style
    }

    /// Ramp length in samples
    pub fn ramp_samples(&self) -> u32 {
        self.steps_to_target
    }

    /// Samples left before the target is reached
    pub fn remaining(&self) -> u32 {
        self.countdown
    }

    pub fn is_smoothing(&self) -> bool {
        self.countdown > 0
    }

    fn update_step(&mut self) {
        let steps = self.countdown as f32;
        let same_sign = self.current * self.target > 0.0;

        if self.style == SmoothingStyle::Exponential && same_sign {
            self.multiplicative = true;
            self.step = ((self.target / self.current).ln() / steps).exp();
        } else {
            self.multiplicative = false;
            self.step = (self.target - self.current) / steps;
        }
    }

    // Rounding must never carry the value past the target before the final step
    #[inline]
    fn hold_short_of_target(&mut self, before: f32) {
        if (self.target - self.current) * (self.target - before) < 0.0 {
            self.current = self.target;
        }
    }
}
