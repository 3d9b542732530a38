// Unit tests for HpssEngine

use super::*;
use std::f32::consts::PI;

fn small_config() -> HpssConfig {
    HpssConfig {
        window_size: 512,
        hop_size: 128,
        kernel_size: 9,
        iterations: 4,
        power: 2.0,
    }
}

fn sine(len: usize, freq: f32, sample_rate: f32, amp: f32) -> Vec<f32> {
    (0..len)
        .map(|i| amp * (2.0 * PI * freq * i as f32 / sample_rate).sin())
        .collect()
}

fn clicks(len: usize, period: usize, amp: f32) -> Vec<f32> {
    (0..len)
        .map(|i| if i % period == period / 2 { amp } else { 0.0 })
        .collect()
}

#[test]
fn test_rejects_invalid_geometry() {
    let mut config = small_config();
    config.kernel_size = 8;
    assert!(matches!(
        HpssEngine::new(config),
        Err(ConfigError::InvalidHpssGeometry { .. })
    ));
}

#[test]
fn test_output_length_is_deterministic() {
    let engine = HpssEngine::new(HpssConfig::default()).unwrap();
    let input = sine(5000, 440.0, 22050.0, 0.5);
    let result = engine.separate(&input);
    // frames = 1 + ceil((5000 - 2048) / 512) = 7
    assert_eq!(result.harmonic.len(), 6 * 512 + 2048);
    assert_eq!(result.percussive.len(), result.harmonic.len());
    assert_eq!(result.residual.len(), result.harmonic.len());
    assert_eq!(engine.output_len(5000), result.len());
}

#[test]
fn test_energy_accounting() {
    let engine = HpssEngine::new(small_config()).unwrap();
    let len = 8000;
    let input: Vec<f32> = sine(len, 330.0, 16000.0, 0.4)
        .iter()
        .zip(clicks(len, 1000, 0.9))
        .map(|(a, b)| a + b)
        .collect();

    let result = engine.separate(&input);
    assert!(!result.is_fallback);
    assert!(
        result.harmonic_ratio + result.percussive_ratio <= 1.0 + 1e-4,
        "ratios {} + {} exceed 1",
        result.harmonic_ratio,
        result.percussive_ratio
    );
    assert!((0.0..=1.0).contains(&result.separation_quality));
    assert!(result.harmonic_ratio > 0.0);
    assert!(result.percussive_ratio > 0.0);
}

#[test]
fn test_components_reconstruct_input() {
    let engine = HpssEngine::new(small_config()).unwrap();
    let len = 6000;
    let input: Vec<f32> = sine(len, 500.0, 16000.0, 0.3)
        .iter()
        .zip(clicks(len, 800, 0.8))
        .map(|(a, b)| a + b)
        .collect();

    let result = engine.separate(&input);
    for i in 0..len {
        let sum = result.harmonic[i] + result.percussive[i] + result.residual[i];
        assert!((sum - input[i]).abs() < 1e-5, "sample {}: {} vs {}", i, sum, input[i]);
    }
    // Masks are complementary, so H + P alone rebuilds the input away from the edge
    for i in 128..len {
        let sum = result.harmonic[i] + result.percussive[i];
        assert!(
            (sum - input[i]).abs() < 1e-3,
            "sample {}: {} vs {}",
            i,
            sum,
            input[i]
        );
    }
}

#[test]
fn test_sine_is_mostly_harmonic() {
    let engine = HpssEngine::new(small_config()).unwrap();
    let result = engine.separate(&sine(8000, 440.0, 16000.0, 0.7));
    assert!(
        result.harmonic_ratio > result.percussive_ratio,
        "H={} P={}",
        result.harmonic_ratio,
        result.percussive_ratio
    );
}

#[test]
fn test_clicks_are_mostly_percussive() {
    let engine = HpssEngine::new(small_config()).unwrap();
    let result = engine.separate(&clicks(8000, 4000, 1.0));
    assert!(
        result.percussive_ratio > result.harmonic_ratio,
        "H={} P={}",
        result.harmonic_ratio,
        result.percussive_ratio
    );
}

#[test]
fn test_silent_input() {
    let engine = HpssEngine::new(small_config()).unwrap();
    let result = engine.separate(&[0.0; 1000]);
    assert!(!result.is_fallback);
    assert_eq!(result.harmonic_ratio, 0.0);
    assert_eq!(result.percussive_ratio, 0.0);
    assert_eq!(result.separation_quality, 0.0);
    assert!(result.harmonic.iter().all(|&s| s == 0.0));
    assert_eq!(result.len(), engine.output_len(1000));
}

#[test]
fn test_empty_input_falls_back() {
    let engine = HpssEngine::new(small_config()).unwrap();
    let never = AtomicBool::new(false);
    assert_eq!(
        engine.separate_cancellable(&[], &never),
        Err(HpssError::EmptyInput)
    );

    let result = engine.separate(&[]);
    assert!(result.is_fallback);
    assert_eq!(result.harmonic_ratio, FALLBACK_HARMONIC_RATIO);
    assert_eq!(result.percussive_ratio, FALLBACK_PERCUSSIVE_RATIO);
    assert_eq!(result.separation_quality, FALLBACK_QUALITY);
}

#[test]
fn test_non_finite_input_falls_back() {
    let engine = HpssEngine::new(small_config()).unwrap();
    let mut input = sine(2000, 440.0, 16000.0, 0.5);
    input[123] = f32::NAN;

    let never = AtomicBool::new(false);
    assert_eq!(
        engine.separate_cancellable(&input, &never),
        Err(HpssError::NonFiniteInput { index: 123 })
    );

    let result = engine.separate(&input);
    assert!(result.is_fallback);
    assert_eq!(result.harmonic.len(), input.len());
    assert!(result.percussive.iter().all(|&s| s == 0.0));
}

#[test]
fn test_cancel_before_first_iteration() {
    let engine = HpssEngine::new(small_config()).unwrap();
    let cancel = AtomicBool::new(true);
    let outcome = engine.separate_cancellable(&sine(4000, 440.0, 16000.0, 0.5), &cancel);
    assert_eq!(
        outcome,
        Err(HpssError::Cancelled {
            completed_iterations: 0
        })
    );
}

#[test]
fn test_summary_matches_result() {
    let engine = HpssEngine::new(small_config()).unwrap();
    let result = engine.separate(&clicks(3000, 500, 0.5));
    let summary = result.summary();
    assert_eq!(summary.harmonic_ratio, result.harmonic_ratio);
    assert_eq!(summary.percussive_ratio, result.percussive_ratio);
    assert_eq!(summary.separation_quality, result.separation_quality);
    assert!(!summary.is_fallback);
}

#[test]
fn test_engine_is_shareable_across_threads() {
    use std::sync::Arc;
    use std::thread;

    let engine = Arc::new(HpssEngine::new(small_config()).unwrap());
    let handles: Vec<_> = (0..2)
        .map(|n| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.separate(&sine(3000, 200.0 + n as f32 * 100.0, 16000.0, 0.5)))
        })
        .collect();
    for handle in handles {
        let result = handle.join().unwrap();
        assert!(!result.is_fallback);
    }
}
