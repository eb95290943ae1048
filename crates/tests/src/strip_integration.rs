//! Integration tests for the channel strip
//!
//! These tests drive the complete strip the way a host would: prepare,
//! feed blocks, change parameters between blocks and measure what comes
//! out with the spectrum analyser.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tempfile::TempDir;
use warmth_core::domain::{
    Band, ChannelStrip, EngineConfig, FilterSlot, GainSlot, ParamId, SaturationCurve,
    SaturationSlot, ShelfMode, WarmthConfig, BUMP_SHELF_Q, LOW_BUMP_BOOST_Q,
};
use warmth_infra::{band_gain_db, SpectrumAnalyzer};
use warmth_tests::{generate_noise, generate_sine_wave, generate_sweep, process_in_blocks};

const SAMPLE_RATE: f32 = 48000.0;
const BLOCK_SIZE: usize = 512;

fn clean_strip() -> ChannelStrip {
    let strip = ChannelStrip::default();
    let params = strip.parameters();
    params.select_saturation(SaturationSlot::Input, SaturationCurve::Clean).unwrap();
    params.select_saturation(SaturationSlot::Output, SaturationCurve::Clean).unwrap();
    strip
}

fn max_abs(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()))
}

// ============================================================================
// FREQUENCY RESPONSE
// ============================================================================

#[test]
fn test_default_eq_is_flat_above_high_pass() {
    let mut strip = clean_strip();
    strip.prepare(SAMPLE_RATE, BLOCK_SIZE, 1).unwrap();

    let input = generate_sweep(20.0, 20000.0, SAMPLE_RATE, 4 * SAMPLE_RATE as usize, 1.0);
    let mut channels = vec![input.clone()];
    process_in_blocks(&mut strip, &mut channels, BLOCK_SIZE);

    for (low, high) in [
        (100.0, 200.0),
        (200.0, 500.0),
        (500.0, 1000.0),
        (1000.0, 5000.0),
        (5000.0, 15000.0),
    ] {
        let gain = band_gain_db(&input, &channels[0], SAMPLE_RATE, low, high, 4096).unwrap();
        assert!(gain.abs() < 0.5, "{low}-{high} Hz moved by {gain:.3} dB");
    }
}

#[test]
fn test_low_shelf_boost_matches_its_coefficients() {
    let mut strip = clean_strip();
    let params = strip.parameters();
    params.set(ParamId::LowGain, 6.0);
    params.set(ParamId::LowFreq, 100.0);
    params.select_shelf_mode(Band::Low, ShelfMode::Shelf);
    strip.prepare(SAMPLE_RATE, BLOCK_SIZE, 1).unwrap();

    let input = generate_noise(42, 5 * SAMPLE_RATE as usize, 0.25);
    let mut channels = vec![input.clone()];
    process_in_blocks(&mut strip, &mut channels, BLOCK_SIZE);

    // Skip the first second so the filters have settled
    let settled = SAMPLE_RATE as usize;
    let fft_size = 16384;
    let low = band_gain_db(&input[settled..], &channels[0][settled..], SAMPLE_RATE, 40.0, 60.0, fft_size)
        .unwrap();
    assert!((4.5..6.5).contains(&low), "40-60 Hz gain {low:.3} dB");

    // Power-average the composite response over the same bins
    let analyzer = SpectrumAnalyzer::new(fft_size).unwrap();
    let snapshots = strip.coefficient_snapshots();
    let (sum, count) = (0..=fft_size / 2)
        .map(|bin| analyzer.bin_frequency(bin, SAMPLE_RATE))
        .filter(|f| (40.0..=60.0).contains(f))
        .fold((0.0, 0), |(sum, count), f| {
            let db = snapshots.magnitude_db(f as f32, SAMPLE_RATE);
            (sum + 10f64.powf(db / 10.0), count + 1)
        });
    let predicted = 10.0 * (sum / count as f64).log10();
    assert!((low - predicted).abs() < 0.75, "measured {low:.3} dB, predicted {predicted:.3} dB");

    let mid = band_gain_db(&input[settled..], &channels[0][settled..], SAMPLE_RATE, 1000.0, 5000.0, fft_size)
        .unwrap();
    assert!(mid.abs() < 0.5, "1-5 kHz gain {mid:.3} dB");
}

#[test]
fn test_output_gain_scales_a_sine() {
    let mut strip = clean_strip();
    strip.parameters().set(ParamId::OutGain, -6.0);
    strip.prepare(SAMPLE_RATE, BLOCK_SIZE, 2).unwrap();

    let tone = generate_sine_wave(1000.0, SAMPLE_RATE, 48000, 0.5);
    let mut channels = vec![tone.clone(), tone.clone()];
    process_in_blocks(&mut strip, &mut channels, BLOCK_SIZE);

    let expected = 0.5 * 10f32.powf(-6.0 / 20.0);
    for channel in &channels {
        let peak = max_abs(&channel[4800..]);
        assert!((peak - expected).abs() < 0.01, "peak {peak}, expected {expected}");
    }
}

// ============================================================================
// SHELF CHARACTER
// ============================================================================

#[test]
fn test_low_bump_resonance_follows_gain_sign() {
    let mut strip = clean_strip();
    let params = strip.parameters();
    params.select_shelf_mode(Band::Low, ShelfMode::Bump);
    params.set(ParamId::LowGain, 6.0);
    strip.prepare(SAMPLE_RATE, BLOCK_SIZE, 1).unwrap();
    assert_eq!(strip.working_values().filter(FilterSlot::LowShelf).q, LOW_BUMP_BOOST_Q);

    params.set(ParamId::LowGain, -6.0);
    let mut channels = vec![vec![0.0; SAMPLE_RATE as usize]];
    process_in_blocks(&mut strip, &mut channels, BLOCK_SIZE);
    let q = strip.working_values().filter(FilterSlot::LowShelf).q;
    assert!((q - BUMP_SHELF_Q).abs() < 1e-4, "cutting bump Q {q}");

    // The high bump does not depend on gain sign
    params.select_shelf_mode(Band::High, ShelfMode::Bump);
    params.set(ParamId::HighGain, 6.0);
    process_in_blocks(&mut strip, &mut channels, BLOCK_SIZE);
    let q = strip.working_values().filter(FilterSlot::HighShelf).q;
    assert!((q - BUMP_SHELF_Q).abs() < 1e-4, "high bump Q {q}");
}

#[test]
fn test_switching_to_bump_while_boosting() {
    let mut strip = clean_strip();
    let params = strip.parameters();
    params.set(ParamId::LowGain, 6.0);
    strip.prepare(SAMPLE_RATE, BLOCK_SIZE, 1).unwrap();
    assert_eq!(strip.working_values().filter(FilterSlot::LowShelf).q, 0.7);

    params.select_shelf_mode(Band::Low, ShelfMode::Bump);
    let mut channels = vec![generate_noise(3, SAMPLE_RATE as usize, 0.1)];
    process_in_blocks(&mut strip, &mut channels, BLOCK_SIZE);

    let q = strip.working_values().filter(FilterSlot::LowShelf).q;
    assert!((q - LOW_BUMP_BOOST_Q).abs() < 1e-4, "boosting bump Q {q}");
    assert!(strip.coefficients(FilterSlot::LowShelf).is_stable());
    assert!(channels[0].iter().all(|s| s.is_finite()));
}

// ============================================================================
// SATURATION SWITCHING
// ============================================================================

#[test]
fn test_toggling_output_curve_every_block_stays_bounded() {
    let mut strip = ChannelStrip::default();
    let params = strip.parameters();
    params.select_saturation(SaturationSlot::Output, SaturationCurve::Clean).unwrap();
    strip.prepare(SAMPLE_RATE, BLOCK_SIZE, 1).unwrap();

    let input = generate_sine_wave(100.0, SAMPLE_RATE, 64 * BLOCK_SIZE, 1.0);
    let mut output = Vec::with_capacity(input.len());
    for (index, chunk) in input.chunks(BLOCK_SIZE).enumerate() {
        let curve = if index % 2 == 0 { SaturationCurve::Thick } else { SaturationCurve::Clean };
        params.select_saturation(SaturationSlot::Output, curve).unwrap();

        let mut block = chunk.to_vec();
        strip.process(&mut [&mut block]);
        output.extend_from_slice(&block);
    }

    assert!(output.iter().all(|s| s.is_finite()));
    assert!(max_abs(&output) < 1.5);
    let largest_step = output
        .windows(2)
        .fold(0.0f32, |step, pair| step.max((pair[1] - pair[0]).abs()));
    assert!(largest_step < 0.5, "discontinuity of {largest_step}");
}

#[test]
fn test_extreme_settings_stay_finite() {
    let mut strip = ChannelStrip::default();
    let params = strip.parameters();
    for id in [ParamId::InGain, ParamId::Drive, ParamId::OutGain, ParamId::LowGain, ParamId::HighGain] {
        params.set(id, f32::MAX);
    }
    params.select_shelf_mode(Band::Low, ShelfMode::Bump);
    strip.prepare(SAMPLE_RATE, BLOCK_SIZE, 2).unwrap();

    let noise = generate_noise(9, 16 * BLOCK_SIZE, 1.0);
    let mut channels = vec![noise.clone(), noise];
    for (index, chunk_start) in (0..16 * BLOCK_SIZE).step_by(BLOCK_SIZE).enumerate() {
        let curve = if index % 2 == 0 { SaturationCurve::Warm } else { SaturationCurve::Thick };
        params.select_saturation(SaturationSlot::Output, curve).unwrap();
        params.set(ParamId::HighFreq, if index % 3 == 0 { 4000.0 } else { 20000.0 });

        let (left, right) = channels.split_at_mut(1);
        let end = chunk_start + BLOCK_SIZE;
        strip.process(&mut [&mut left[0][chunk_start..end], &mut right[0][chunk_start..end]]);
    }

    assert!(channels.iter().flatten().all(|s| s.is_finite()));
    for slot in FilterSlot::ALL {
        assert!(strip.coefficients(slot).is_stable(), "{} unstable", slot.name());
    }
}

// ============================================================================
// THREADING
// ============================================================================

#[test]
fn test_parameter_and_display_threads_run_alongside_processing() {
    let mut strip = ChannelStrip::default();
    strip.prepare(SAMPLE_RATE, 256, 2).unwrap();
    let params = strip.parameters();
    let snapshots = strip.coefficient_snapshots();
    let done = AtomicBool::new(false);

    thread::scope(|scope| {
        scope.spawn(|| {
            let mut step = 0u32;
            while !done.load(Ordering::Relaxed) {
                let value = (step % 25) as f32 - 12.0;
                params.set(ParamId::LowMidGain, value);
                params.set(ParamId::HighMidFreq, 600.0 + 100.0 * (step % 50) as f32);
                step = step.wrapping_add(1);
                thread::yield_now();
            }
        });

        let display = scope.spawn(|| {
            let mut reads = 0usize;
            loop {
                for coeffs in snapshots.all() {
                    assert!(coeffs.is_finite() && coeffs.is_stable());
                }
                reads += 1;
                if done.load(Ordering::Relaxed) {
                    break reads;
                }
                thread::yield_now();
            }
        });

        let mut left = generate_noise(1, 256, 0.5);
        let mut right = generate_noise(2, 256, 0.5);
        for _ in 0..400 {
            strip.process(&mut [&mut left, &mut right]);
            assert!(left.iter().chain(&right).all(|s| s.is_finite()));
        }
        done.store(true, Ordering::Relaxed);
        assert!(display.join().unwrap() > 0);
    });
}

// ============================================================================
// STATE AND CONFIGURATION
// ============================================================================

#[test]
fn test_restored_state_renders_identically() {
    let source = ChannelStrip::default();
    let params = source.parameters();
    params.set(ParamId::Drive, 4.0);
    params.set(ParamId::HighMidGain, -5.0);
    params.select_shelf_mode(Band::High, ShelfMode::Wide);
    params.select_saturation(SaturationSlot::Input, SaturationCurve::Warm).unwrap();
    let blob = source.get_state().unwrap();

    let mut restored = ChannelStrip::default();
    restored.set_state(&blob).unwrap();

    let mut saved = source;
    saved.prepare(SAMPLE_RATE, BLOCK_SIZE, 1).unwrap();
    restored.prepare(SAMPLE_RATE, BLOCK_SIZE, 1).unwrap();

    let noise = generate_noise(11, 8 * BLOCK_SIZE, 0.5);
    let mut a = vec![noise.clone()];
    let mut b = vec![noise];
    process_in_blocks(&mut saved, &mut a, BLOCK_SIZE);
    process_in_blocks(&mut restored, &mut b, BLOCK_SIZE);

    assert_eq!(a, b);
    assert_eq!(restored.working_values().gain_db(GainSlot::DriveCompensation), -4.0);
}

#[tokio::test]
async fn test_config_file_round_trip_drives_the_strip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("warmth.toml");

    let engine = EngineConfig {
        sample_rate: 44100,
        block_size: 128,
        channels: 1,
        smoothing_seconds: 0.05,
    };
    let source = ChannelStrip::new(engine);
    source.parameters().set(ParamId::LowFreq, 60.0);
    source.parameters().set(ParamId::LowGain, -3.0);
    WarmthConfig::from_store(engine, &source.parameters())
        .save_to_file(&path)
        .await
        .unwrap();

    let loaded = WarmthConfig::load_from_file(&path).await.unwrap();
    assert_eq!(loaded.engine, engine);

    let mut strip = ChannelStrip::new(loaded.engine);
    assert_eq!(loaded.apply_to(&strip.parameters()), ParamId::COUNT);
    strip.prepare_from_config().unwrap();

    let low = strip.working_values().filter(FilterSlot::LowShelf);
    assert_eq!(low.frequency, 60.0);
    assert!((low.gain - 10f32.powf(-3.0 / 20.0)).abs() < 1e-6);
}
