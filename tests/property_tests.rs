//! Property tests for the core state machines and reducers.
//!
//! Runs on host (x86_64) only — proptest is not available for ESP32
//! targets. On ESP32, these tests are compiled out.

#![cfg(not(target_os = "espidf"))]

use campernode::modules::DeviceModule;
use campernode::signal::gate::ReportGate;
use campernode::signal::window::MeasurementWindow;
use proptest::prelude::*;

// ── Debounce invariants ───────────────────────────────────────

use campernode::drivers::button::{ButtonEvent, ButtonState, DebouncedButton};

const SETTLE_MS: u64 = 60;
const HOLD_MS: u64 = 400;
const STEP_MS: u64 = 5;

proptest! {
    /// For any raw input sequence, accepted (debounced) press/release
    /// edges are never closer together than the settle window.
    #[test]
    fn debounced_edges_respect_settle_window(
        raw in proptest::collection::vec(any::<bool>(), 1..400),
    ) {
        let mut button = DebouncedButton::new(SETTLE_MS, HOLD_MS);
        let mut last_edge_ms: Option<u64> = None;
        let mut prev_pressed = false;

        for (i, &level) in raw.iter().enumerate() {
            let now = i as u64 * STEP_MS;
            let _ = button.update(now, level);
            let pressed = button.state() != ButtonState::Idle;
            if pressed != prev_pressed {
                if let Some(last) = last_edge_ms {
                    prop_assert!(
                        now - last >= SETTLE_MS,
                        "edges {last}ms and {now}ms are closer than the settle window"
                    );
                }
                last_edge_ms = Some(now);
                prev_pressed = pressed;
            }
        }
    }

    /// HELD is only reachable after PRESSED has persisted at least the
    /// hold threshold, and a short press can never follow a hold.
    #[test]
    fn held_requires_hold_threshold(
        raw in proptest::collection::vec(any::<bool>(), 1..400),
    ) {
        let mut button = DebouncedButton::new(SETTLE_MS, HOLD_MS);
        let mut pressed_at: Option<u64> = None;

        for (i, &level) in raw.iter().enumerate() {
            let now = i as u64 * STEP_MS;
            let prev_state = button.state();
            let event = button.update(now, level);

            if prev_state == ButtonState::Idle && button.state() == ButtonState::Pressed {
                pressed_at = Some(now);
            }
            if event == Some(ButtonEvent::HoldStart) {
                let since = pressed_at.expect("HELD without a preceding press");
                prop_assert!(
                    now - since >= HOLD_MS,
                    "hold after only {}ms",
                    now - since
                );
            }
            if event == Some(ButtonEvent::ShortPress) {
                let since = pressed_at.expect("release without a preceding press");
                prop_assert!(
                    now - since < HOLD_MS + SETTLE_MS,
                    "short press after a hold-length press"
                );
            }
        }
    }
}

// ── Mode-of-N invariants ──────────────────────────────────────

proptest! {
    /// The mode has maximal frequency, and among equally frequent values
    /// it is always the numerically largest.
    #[test]
    fn mode_is_max_count_with_high_tie(
        samples in proptest::collection::vec(0u8..6, 1..6),
    ) {
        let mut window: MeasurementWindow<u8, 6> = MeasurementWindow::new();
        for &s in &samples {
            window.push(s);
        }
        let mode = window.mode().unwrap();

        let count_of = |v: u8| samples.iter().filter(|&&s| s == v).count();
        let mode_count = count_of(mode);
        for candidate in 0u8..6 {
            let c = count_of(candidate);
            prop_assert!(c <= mode_count, "{candidate} occurs more often than the mode");
            if c == mode_count {
                prop_assert!(candidate <= mode, "tie must resolve to the higher value");
            }
        }
    }
}

// ── Publish gate invariants ───────────────────────────────────

proptest! {
    /// A value is published iff it is the first reading, moved at least
    /// the threshold since the last commit, or a resync was requested.
    #[test]
    fn gate_publishes_iff_first_delta_or_resync(
        ops in proptest::collection::vec((0.0f32..100.0, any::<bool>(), any::<bool>()), 1..50),
    ) {
        const THRESHOLD: f32 = 0.5;
        let mut gate = ReportGate::new(THRESHOLD);
        let mut committed: Option<f32> = None;
        let mut resync_pending = false;

        for (value, request_resync, publish_succeeds) in ops {
            if request_resync {
                gate.request_resync();
                resync_pending = true;
            }

            let expected = resync_pending
                || match committed {
                    None => true,
                    Some(last) => (value - last).abs() >= THRESHOLD,
                };
            prop_assert_eq!(gate.should_publish(value), expected);

            // Fire-and-forget: only a successful publish commits.
            if expected && publish_succeeds {
                gate.commit(value);
                committed = Some(value);
                resync_pending = false;
            }
        }
    }
}

// ── Command robustness ────────────────────────────────────────

proptest! {
    /// Arbitrary bytes thrown at a module's command handler never panic;
    /// they either apply cleanly or come back as a typed error.
    #[test]
    fn fuzzed_command_payloads_never_panic(
        action in "[a-z]{1,8}",
        payload in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        let mut heating = campernode::modules::heating::HeatingModule::new(
            "camper",
            [campernode::config::CircleConfig::default(); 4],
            0.5,
        );
        let _ = heating.handle_command(&action, &payload);

        let mut lights = campernode::modules::lights::LightsModule::new("camper", 60, 400, 800, 3);
        let _ = lights.handle_command(&action, &payload);

        let mut lift = campernode::modules::lift::LiftModule::new("camper", 60, 400, 30_000);
        let _ = lift.handle_command(&action, &payload);
    }
}
