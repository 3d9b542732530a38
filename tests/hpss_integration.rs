//! HPSS engine and worker behavior through the public API.

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use style_engine::config::HpssConfig;
use style_engine::error::HpssError;
use style_engine::fixtures::{sine_with_clicks, white_noise};
use style_engine::hpss::HpssEngine;
use style_engine::engine::HpssWorker;

fn fast_config() -> HpssConfig {
    HpssConfig {
        window_size: 1024,
        hop_size: 256,
        kernel_size: 11,
        iterations: 4,
        power: 2.0,
    }
}

#[test]
fn sine_plus_clicks_round_trip() {
    let engine = HpssEngine::new(fast_config()).unwrap();
    let input = sine_with_clicks(22_050, 1000, 440.0, 250);
    let result = engine.separate(&input);

    assert!(!result.is_fallback);
    assert_eq!(result.len(), engine.output_len(input.len()));
    for (i, &x) in input.iter().enumerate() {
        let rebuilt = result.harmonic[i] + result.percussive[i] + result.residual[i];
        assert!((rebuilt - x).abs() < 1e-4, "sample {}: {} vs {}", i, rebuilt, x);
    }
    assert!(result.harmonic_ratio > result.percussive_ratio);
    assert!(result.percussive_ratio > 0.0);

    // Soft masks sum to one, so the two components alone rebuild the input
    // wherever the overlap-add is fully covered
    let window = fast_config().window_size;
    for i in window..input.len() - window {
        let rebuilt = result.harmonic[i] + result.percussive[i];
        assert!(
            (rebuilt - input[i]).abs() < 1e-3,
            "sample {}: h+p {} vs {}",
            i,
            rebuilt,
            input[i]
        );
    }
}

#[test]
fn energy_ratios_never_exceed_one() {
    let engine = HpssEngine::new(fast_config()).unwrap();
    let inputs = [
        sine_with_clicks(16_000, 700, 220.0, 100),
        white_noise(12_000, 0.8, 42),
        sine_with_clicks(16_000, 300, 3000.0, 50),
        vec![0.5; 5000],
    ];
    for input in inputs.iter() {
        let result = engine.separate(input);
        assert!(
            result.harmonic_ratio + result.percussive_ratio <= 1.0 + 1e-4,
            "H={} P={}",
            result.harmonic_ratio,
            result.percussive_ratio
        );
        assert!((0.0..=1.0).contains(&result.separation_quality));
    }
}

#[test]
fn default_geometry_handles_short_buffers() {
    let engine = HpssEngine::new(HpssConfig::default()).unwrap();
    let result = engine.separate(&[0.3, -0.2, 0.1]);
    assert!(!result.is_fallback);
    assert_eq!(result.len(), 2048);
}

#[test]
fn cancelled_separation_reports_progress() {
    let engine = HpssEngine::new(fast_config()).unwrap();
    let cancel = AtomicBool::new(true);
    match engine.separate_cancellable(&white_noise(8000, 0.5, 1), &cancel) {
        Err(HpssError::Cancelled {
            completed_iterations,
        }) => assert_eq!(completed_iterations, 0),
        other => panic!("expected cancellation, got {:?}", other.map(|r| r.summary())),
    }
}

#[test]
fn worker_serves_one_job_at_a_time() {
    let mut worker = HpssWorker::spawn(fast_config()).unwrap();
    let first = worker.submit(sine_with_clicks(16_000, 2000, 330.0, 125)).unwrap();
    let mut expected = vec![first];
    // Only rejected while the first job is still running
    match worker.submit(vec![0.1; 100]) {
        Err(err) => assert_eq!(err, HpssError::WorkerBusy),
        Ok(id) => expected.push(id),
    }

    let mut seen = Vec::new();
    while seen.len() < expected.len() {
        let result = worker
            .recv_timeout(Duration::from_secs(10))
            .expect("no result from worker");
        assert!(result.outcome.is_ok());
        seen.push(result.id);
    }
    assert_eq!(seen, expected);

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while worker.is_busy() && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
    let next = worker.submit(vec![0.1; 4000]).unwrap();
    assert!(next > first);
}
