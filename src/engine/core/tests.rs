use super::*;
use crate::fixtures::SyntheticProfile;

fn engine() -> DecisionEngine {
    DecisionEngine::new(EngineConfig::default()).unwrap()
}

fn feed(engine: &mut DecisionEngine, profile: SyntheticProfile, duration_ms: f64) -> Vec<DecisionEvent> {
    profile
        .records(duration_ms)
        .into_iter()
        .flat_map(|record| engine.push_frame(record))
        .collect()
}

fn decisions(events: &[DecisionEvent]) -> Vec<&StyleDecision> {
    events
        .iter()
        .filter_map(|event| match event {
            DecisionEvent::StyleDecided(decision) => Some(decision),
            _ => None,
        })
        .collect()
}

fn hpss_result(harmonic_ratio: f32, percussive_ratio: f32, is_fallback: bool) -> HpssResult {
    HpssResult {
        harmonic: vec![0.0; 4],
        percussive: vec![0.0; 4],
        residual: vec![0.0; 4],
        harmonic_ratio,
        percussive_ratio,
        separation_quality: 0.7,
        is_fallback,
    }
}

#[test]
fn rejects_invalid_config() {
    let mut config = EngineConfig::default();
    config.stability.exit_threshold = config.stability.enter_threshold;
    assert!(DecisionEngine::new(config).is_err());
}

#[test]
fn silence_never_leaves_idle() {
    let mut engine = engine();
    let events = feed(&mut engine, SyntheticProfile::Silence, 5000.0);
    assert!(events.is_empty(), "unexpected events: {:?}", events);
    assert_eq!(engine.state(), DetectorState::Idle);
    assert!(engine.last_decision().is_none());
    assert!(engine.classify_now().is_unknown());
}

#[test]
fn techno_stream_reaches_generating_with_decision() {
    let mut engine = engine();
    let events = feed(&mut engine, SyntheticProfile::Techno, 3000.0);

    let transitions: Vec<(DetectorState, DetectorState)> = events
        .iter()
        .filter_map(|event| match event {
            DecisionEvent::StateChanged { from, to, .. } => Some((*from, *to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        vec![
            (DetectorState::Idle, DetectorState::Ready),
            (DetectorState::Ready, DetectorState::Analyzing),
            (DetectorState::Analyzing, DetectorState::Generating),
        ]
    );

    let decided = decisions(&events);
    assert_eq!(decided.len(), 1);
    let decision = decided[0];
    assert!(
        decision.style.label.starts_with("techno"),
        "label was {}",
        decision.style.label
    );
    assert!(decision.style.confidence > 0.6);
    assert!(decision.metrics.overall_stable);
    assert_eq!(engine.state(), DetectorState::Generating);
    assert_eq!(engine.last_decision(), Some(decision));
}

#[test]
fn generating_holds_until_completed() {
    let mut engine = engine();
    feed(&mut engine, SyntheticProfile::Techno, 3000.0);
    assert_eq!(engine.state(), DetectorState::Generating);

    // More stable input does not produce a second decision
    let more: Vec<DecisionEvent> = (130..200)
        .flat_map(|i| engine.push_frame(SyntheticProfile::Techno.record(i)))
        .collect();
    assert!(decisions(&more).is_empty());
    assert_eq!(engine.state(), DetectorState::Generating);

    let event = engine.complete_generation(4700.0);
    assert_eq!(
        event,
        Some(DecisionEvent::StateChanged {
            from: DetectorState::Generating,
            to: DetectorState::Idle,
            timestamp_ms: 4700.0,
        })
    );
    assert_eq!(engine.state(), DetectorState::Idle);
    assert_eq!(engine.complete_generation(4800.0), None);
}

#[test]
fn out_of_order_records_are_dropped() {
    let mut engine = engine();
    engine.push_frame(SyntheticProfile::Techno.record(10));
    let events = engine.push_frame(SyntheticProfile::Techno.record(3));
    assert!(events.is_empty());
    assert_eq!(engine.aggregator().len(), 1);
    assert_eq!(engine.aggregator().dropped_out_of_order(), 1);
}

#[test]
fn ticks_follow_window_interval() {
    let mut engine = engine();
    // First record ticks immediately and opens the gate
    let first = engine.push_frame(SyntheticProfile::Techno.record(0));
    assert_eq!(first.len(), 1);
    assert!(engine.last_window().is_some());

    // Records inside the interval do not tick
    let window_end = engine.last_window().map(|w| w.end_ms);
    for i in 1..10 {
        assert!(engine.push_frame(SyntheticProfile::Techno.record(i)).is_empty());
    }
    assert_eq!(engine.last_window().map(|w| w.end_ms), window_end);

    // 11 * 23.2 ms >= 250 ms
    engine.push_frame(SyntheticProfile::Techno.record(11));
    assert_eq!(engine.last_window().map(|w| w.frame_count), Some(11));
}

#[test]
fn hpss_ratios_fill_missing_fields() {
    let mut engine = engine();
    assert!(engine.apply_hpss(&hpss_result(0.6, 0.3, false)));

    engine.push_frame(FeatureRecord::new(0.0).with_scalar(ScalarFeature::Rms, 0.5));
    engine.push_frame(
        FeatureRecord::new(23.2)
            .with_scalar(ScalarFeature::Rms, 0.5)
            .with_scalar(ScalarFeature::PercussiveRatio, 0.9),
    );

    let records: Vec<&FeatureRecord> = engine.aggregator().records().collect();
    assert_eq!(records[0].percussive_ratio, Some(0.3));
    assert_eq!(records[0].harmonic_ratio, Some(0.6));
    assert_eq!(records[1].percussive_ratio, Some(0.9));
    assert_eq!(records[1].harmonic_ratio, Some(0.6));
}

#[test]
fn fallback_hpss_results_are_ignored() {
    let mut engine = engine();
    assert!(!engine.apply_hpss(&hpss_result(0.8, 0.2, true)));
    assert!(engine.hpss_summary().is_none());

    engine.push_frame(FeatureRecord::new(0.0).with_scalar(ScalarFeature::Rms, 0.5));
    let record = engine.aggregator().records().next().unwrap();
    assert_eq!(record.percussive_ratio, None);
}

#[test]
fn reset_clears_stream_state() {
    let mut engine = engine();
    engine.apply_hpss(&hpss_result(0.6, 0.3, false));
    feed(&mut engine, SyntheticProfile::Techno, 3000.0);
    assert_eq!(engine.state(), DetectorState::Generating);

    engine.reset();
    assert_eq!(engine.state(), DetectorState::Idle);
    assert!(engine.aggregator().is_empty());
    assert!(engine.last_window().is_none());
    assert!(engine.last_decision().is_none());
    assert!(engine.hpss_summary().is_none());

    // A fresh stream starting at t=0 is accepted again
    let events = engine.push_frame(SyntheticProfile::Techno.record(0));
    assert_eq!(events.len(), 1);
}

#[test]
fn classify_now_does_not_advance_state() {
    let mut engine = engine();
    for i in 0..5 {
        engine.push_frame(SyntheticProfile::Ambient.record(i));
    }
    let before = engine.state();
    let _ = engine.classify_now();
    assert_eq!(engine.state(), before);
}

#[test]
fn decision_event_serializes_with_tag() {
    let event = DecisionEvent::StateChanged {
        from: DetectorState::Idle,
        to: DetectorState::Ready,
        timestamp_ms: 0.0,
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["event"], "state_changed");
    assert_eq!(json["to"], "ready");
}
