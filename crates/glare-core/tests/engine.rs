//! Engine behavior against simulated displays

use glare_core::engine::{ApplyOutcome, EXPLORE_FACTOR, FALLBACK_SAFE_SCALE, MAX_ATTEMPTS};
use glare_core::sim::{AcceptancePolicy, RejectMode, SimulatedBackend, SimulatedDisplay};
use glare_core::{build, CurveSpec, Engine, EngineError, Ramp, TOLERANCE};

fn target() -> Ramp {
    build(&CurveSpec::Power(2.2), 2.2)
}

/// Policy accepting exactly the blends at or below `scale` of `target()`
fn threshold_policy(scale: f64, mode: RejectMode) -> AcceptancePolicy {
    let limit = (f64::from(target().max_deviation()) * scale) as u16;
    AcceptancePolicy::MaxDeviation { limit, mode }
}

fn engine_with(displays: Vec<SimulatedDisplay>) -> (Engine<SimulatedBackend>, SimulatedBackend) {
    let backend = SimulatedBackend::new(displays);
    let mut engine = Engine::new(backend.clone());
    engine.initialize().expect("initialize");
    (engine, backend)
}

#[test]
fn converges_below_silent_threshold() {
    let (mut engine, backend) = engine_with(vec![SimulatedDisplay::new("DP-1")
        .with_policy(threshold_policy(0.6, RejectMode::Ignore))]);

    let outcome = engine.apply_ramp(0, &target()).unwrap();
    let ApplyOutcome::Applied { scale } = outcome else {
        panic!("expected success, got {outcome:?}");
    };
    assert!((0.58..=0.62).contains(&scale), "scale {scale}");

    let info = engine.monitor_info(0).unwrap();
    assert_eq!(info.safe_scale, scale);
    assert!(backend.writes(0).len() <= MAX_ATTEMPTS + 1);

    let expected = Ramp::identity().blend_toward(&target(), scale);
    assert!(backend.active_ramp(0).unwrap().matches(&expected, TOLERANCE));
}

#[test]
fn converges_below_hard_threshold() {
    let (mut engine, backend) = engine_with(vec![SimulatedDisplay::new("DP-1")
        .with_policy(threshold_policy(0.6, RejectMode::Fail))]);

    let outcome = engine.apply_ramp(0, &target()).unwrap();
    let ApplyOutcome::Applied { scale } = outcome else {
        panic!("expected success, got {outcome:?}");
    };
    assert!((0.58..=0.62).contains(&scale), "scale {scale}");
    let expected = Ramp::identity().blend_toward(&target(), scale);
    assert_eq!(backend.active_ramp(0), Some(expected));
}

#[test]
fn reapplies_last_good_after_final_rejection() {
    let (mut engine, backend) = engine_with(vec![SimulatedDisplay::new("DP-1")
        .with_policy(threshold_policy(0.52, RejectMode::Ignore))]);

    let outcome = engine.apply_ramp(0, &target()).unwrap();
    assert_eq!(outcome, ApplyOutcome::Applied { scale: 0.5 });

    // probes: 1.0 x, 0.5 ok, 0.75 x, 0.625 x, 0.5625 x, 0.53125 x, then re-apply 0.5
    let writes = backend.writes(0);
    assert_eq!(writes.len(), MAX_ATTEMPTS + 1);
    let good = Ramp::identity().blend_toward(&target(), 0.5);
    assert_eq!(writes.last(), Some(&good));
    assert_eq!(backend.active_ramp(0), Some(good));
}

#[test]
fn failed_reapply_falls_back_to_identity() {
    // writes 1-6 are the search, 7 re-applies the 0.5 blend and fails
    let (mut engine, backend) = engine_with(vec![SimulatedDisplay::new("DP-1")
        .with_policy(threshold_policy(0.52, RejectMode::Ignore))
        .failing_write(MAX_ATTEMPTS + 1)]);

    let outcome = engine.apply_ramp(0, &target()).unwrap();
    assert_eq!(outcome, ApplyOutcome::Fallback);
    assert_eq!(engine.monitor_info(0).unwrap().safe_scale, FALLBACK_SAFE_SCALE);

    let writes = backend.writes(0);
    assert_eq!(writes.len(), MAX_ATTEMPTS + 2);
    assert_eq!(writes.last(), Some(&Ramp::identity()));
    assert_eq!(backend.active_ramp(0), Some(Ramp::identity()));
}

#[test]
fn total_rejection_falls_back_to_identity() {
    let original = build(&CurveSpec::Power(1.3), 1.3);
    let (mut engine, backend) = engine_with(vec![SimulatedDisplay::new("DP-1")
        .with_ramp(original)
        .with_policy(AcceptancePolicy::RejectAll { hard: false })]);

    assert!(!engine.apply_all(&CurveSpec::Power(2.2), 2.2));
    assert_eq!(backend.writes(0).last(), Some(&Ramp::identity()));
    assert_eq!(engine.monitor_info(0).unwrap().safe_scale, FALLBACK_SAFE_SCALE);
    // nothing unverified is active: the display kept the ramp it had
    assert_eq!(backend.active_ramp(0), Some(original));
}

#[test]
fn total_hard_rejection_reports_fallback() {
    let (mut engine, backend) = engine_with(vec![
        SimulatedDisplay::new("DP-1").with_policy(AcceptancePolicy::RejectAll { hard: true })
    ]);
    let outcome = engine.apply_ramp(0, &target()).unwrap();
    assert_eq!(outcome, ApplyOutcome::Fallback);
    assert_eq!(backend.writes(0).last(), Some(&Ramp::identity()));
}

#[test]
fn displays_do_not_share_search_state() {
    let (mut engine, _backend) = engine_with(vec![
        SimulatedDisplay::new("DP-1").with_policy(AcceptancePolicy::RejectAll { hard: false }),
        SimulatedDisplay::new("DP-2").with_policy(threshold_policy(0.6, RejectMode::Ignore)),
        SimulatedDisplay::new("DP-3"),
    ]);

    let (mut alone, _) = engine_with(vec![
        SimulatedDisplay::new("DP-2").with_policy(threshold_policy(0.6, RejectMode::Ignore))
    ]);
    let expected = alone.apply_ramp(0, &target()).unwrap();

    assert!(!engine.apply_all(&CurveSpec::Power(2.2), 2.2));
    assert_eq!(engine.monitor_info(0).unwrap().safe_scale, FALLBACK_SAFE_SCALE);
    assert_eq!(
        ApplyOutcome::Applied {
            scale: engine.monitor_info(1).unwrap().safe_scale
        },
        expected
    );
    assert_eq!(engine.monitor_info(2).unwrap().safe_scale, 1.0);
}

#[test]
fn next_search_starts_above_learned_scale() {
    let (mut engine, backend) = engine_with(vec![SimulatedDisplay::new("DP-1")
        .with_policy(threshold_policy(0.6, RejectMode::Ignore))]);

    let ApplyOutcome::Applied { scale } = engine.apply_ramp(0, &target()).unwrap() else {
        panic!("expected success");
    };
    let before = backend.writes(0).len();
    engine.apply_ramp(0, &target()).unwrap();

    let first_probe = backend.writes(0)[before];
    let seeded = Ramp::identity().blend_toward(&target(), scale * EXPLORE_FACTOR);
    assert_eq!(first_probe, seeded);
}

#[test]
fn apply_all_succeeds_when_every_display_accepts() {
    let (mut engine, backend) = engine_with(vec![
        SimulatedDisplay::new("DP-1").primary(),
        SimulatedDisplay::new("DP-2"),
    ]);
    assert!(engine.apply_all(&CurveSpec::ShadowLift, 1.0));
    let expected = build(&CurveSpec::ShadowLift, 1.0);
    assert_eq!(backend.active_ramp(0), Some(expected));
    assert_eq!(backend.active_ramp(1), Some(expected));
    assert_eq!(engine.primary_index().unwrap(), 0);
}

#[test]
fn apply_one_touches_only_that_display() {
    let (mut engine, backend) = engine_with(vec![
        SimulatedDisplay::new("DP-1"),
        SimulatedDisplay::new("DP-2"),
    ]);
    assert!(engine.apply_one(1, &CurveSpec::Cinema, 1.0));
    assert!(engine.backend().writes(0).is_empty());
    assert_eq!(backend.writes(1).len(), 1);
    assert!(!engine.apply_one(5, &CurveSpec::Cinema, 1.0));
}

#[test]
fn restore_round_trips_original() {
    let original = build(&CurveSpec::SoftContrast, 1.0);
    let (engine, backend) = engine_with(vec![SimulatedDisplay::new("DP-1").with_ramp(original)]);
    assert!(engine.restore_all());
    assert!(backend.active_ramp(0).unwrap().matches(&original, TOLERANCE));
}

#[test]
fn restore_all_is_idempotent() {
    let original = build(&CurveSpec::Power(0.8), 0.8);
    let (mut engine, backend) = engine_with(vec![
        SimulatedDisplay::new("DP-1").with_ramp(original),
        SimulatedDisplay::new("DP-2"),
    ]);
    assert!(engine.apply_all(&CurveSpec::Cinema, 1.0));

    assert!(engine.restore_all());
    let once = (backend.active_ramp(0), backend.active_ramp(1));
    assert!(engine.restore_all());
    let twice = (backend.active_ramp(0), backend.active_ramp(1));
    assert_eq!(once, twice);
    assert_eq!(once, (Some(original), Some(Ramp::identity())));
}

#[test]
fn restore_skips_display_without_original() {
    let (mut engine, backend) = engine_with(vec![
        SimulatedDisplay::new("DP-1"),
        SimulatedDisplay::new("DP-2").unreadable(),
    ]);
    let info = engine.monitor_info(1).unwrap();
    assert!(!info.has_original);

    // writes go through but can never be verified
    assert!(!engine.apply_one(1, &CurveSpec::Cinema, 1.0));
    assert_eq!(backend.writes(1).last(), Some(&Ramp::identity()));
    assert_eq!(engine.monitor_info(1).unwrap().safe_scale, FALLBACK_SAFE_SCALE);
    let writes = backend.writes(1).len();

    assert!(!engine.restore_all());
    assert_eq!(backend.writes(1).len(), writes);
    assert!(matches!(engine.restore_one(1), Err(EngineError::NoOriginal(1))));
    assert!(engine.restore_one(0).unwrap());
}

#[test]
fn uninitialized_engine() {
    let engine = Engine::new(SimulatedBackend::demo());
    assert_eq!(engine.monitor_count(), 0);
    assert!(engine.restore_all());
    assert!(engine.restore_handle().is_none());
    assert!(matches!(engine.monitor_info(0), Err(EngineError::NotInitialized)));
}

#[test]
fn no_displays_is_an_error() {
    let mut engine = Engine::new(SimulatedBackend::new(Vec::new()));
    assert!(matches!(engine.initialize(), Err(EngineError::NoDisplays)));
    assert!(!engine.is_initialized());
}

#[test]
fn read_gamma_reports_active_curve() {
    let (mut engine, _) = engine_with(vec![SimulatedDisplay::new("DP-1")]);
    assert!((engine.read_gamma(0).unwrap() - 1.0).abs() < 0.01);
    assert!(engine.apply_one(0, &CurveSpec::Power(1.0), 2.0));
    assert!((engine.read_gamma(0).unwrap() - 2.0).abs() < 0.01);
}

#[test]
fn learned_scale_grows_once_display_relaxes() {
    let (mut engine, backend) = engine_with(vec![SimulatedDisplay::new("DP-1")
        .with_policy(threshold_policy(0.6, RejectMode::Ignore))]);

    let ApplyOutcome::Applied { scale } = engine.apply_ramp(0, &target()).unwrap() else {
        panic!("expected success");
    };
    backend.set_policy(0, AcceptancePolicy::AcceptAll);

    // one probe per call, each widening the previous scale
    let before = backend.writes(0).len();
    let outcome = engine.apply_ramp(0, &target()).unwrap();
    assert_eq!(backend.writes(0).len(), before + 1);
    assert_eq!(outcome, ApplyOutcome::Applied { scale: scale * EXPLORE_FACTOR });

    engine.reset_safe_scale(0).unwrap();
    assert_eq!(engine.apply_ramp(0, &target()).unwrap(), ApplyOutcome::Applied { scale: 1.0 });
    assert_eq!(backend.active_ramp(0), Some(target()));
}
