//! Shared signal generators and drivers for the integration tests

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;
use warmth_core::domain::ChannelStrip;

pub fn generate_sine_wave(frequency: f32, sample_rate: f32, len: usize, amplitude: f32) -> Vec<f32> {
    (0..len)
        .map(|i| amplitude * (2.0 * PI * frequency * i as f32 / sample_rate).sin())
        .collect()
}

/// Exponential sine sweep from `start_hz` to `end_hz`
pub fn generate_sweep(
    start_hz: f32,
    end_hz: f32,
    sample_rate: f32,
    len: usize,
    amplitude: f32,
) -> Vec<f32> {
    let duration = len as f64 / sample_rate as f64;
    let ratio = (end_hz as f64 / start_hz as f64).ln();
    let k = duration / ratio;
    (0..len)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            let phase = 2.0 * std::f64::consts::PI * start_hz as f64 * k * ((t / k).exp() - 1.0);
            amplitude * phase.sin() as f32
        })
        .collect()
}

/// Uniform white noise, reproducible from `seed`
pub fn generate_noise(seed: u64, len: usize, amplitude: f32) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(-amplitude..amplitude)).collect()
}

/// Feed planar channels through an already prepared strip, `block_size` frames at a time
pub fn process_in_blocks(strip: &mut ChannelStrip, channels: &mut [Vec<f32>], block_size: usize) {
    let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
    let mut start = 0;
    while start < frames {
        let end = (start + block_size).min(frames);
        let mut views: Vec<&mut [f32]> = channels
            .iter_mut()
            .map(|channel| &mut channel[start..end])
            .collect();
        strip.process(&mut views);
        start = end;
    }
}
