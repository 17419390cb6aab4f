//! §4.3 Stick conditioner. Turns the raw speed-channel pulse width into a
//! filtered, rate- and magnitude-limited command, honoring the startup gate
//! and (in bounded, operational modes) the endpoint guard.

use crate::consts::STICK_UNIT_SCALE;
use crate::diagnostics::{DiagnosticEvent, EventBuf};
use crate::endpoint::{self, GuardInput};
use crate::settings::{Mode, Settings};
use crate::status::{Monitor, SafeMode};

/// Everything the endpoint guard needs that the stick conditioner can't
/// derive on its own — supplied by the caller (`controller.rs`), which knows
/// whether the reference position is the actual encoder reading or, in
/// `Mode::AbsolutePosition`, the previous target.
#[derive(Clone, Copy, Debug)]
pub struct GuardContext {
    pub pos: i32,
    pub signed_speed: i32,
    pub brake_distance: i32,
}

/// Whether this tick's speed-channel reading is a real frame with the stick
/// in neutral -- the only thing the startup gate (`InvalidRc` /
/// `NotNeutralAtStartup`) accepts as grounds to let the mode/endpoint
/// programmer arm. `duty == 0` (no frame) never counts, regardless of how
/// close it lands to `stick_neutral_pos`.
pub fn valid_neutral_frame(duty: u16, settings: &Settings) -> bool {
    duty != 0 && (i32::from(duty) - settings.stick_neutral_pos).abs() <= settings.stick_neutral_range
}

/// Condition one tick's speed-channel reading.
///
/// `duty` is the raw pulse width in microseconds (`0` meaning no valid
/// frame). Returns the filtered stick value in units of 0.1 us, and commits
/// `stick_last_value` before returning, per `spec.md` §4.3 step 11 (or,
/// inside the endpoint guard, per step 10's short-circuit).
#[allow(clippy::too_many_arguments)]
pub fn condition(
    duty: u16,
    settings: &mut Settings,
    safemode: &mut SafeMode,
    stick_last_value: &mut i32,
    stickintegral: &mut i32,
    monitor: &mut Monitor,
    events: &mut EventBuf,
    guard: GuardContext,
) -> i32 {
    let raw = if duty == 0 {
        0
    } else {
        i32::from(duty) - settings.stick_neutral_pos
    };

    // Startup gate (step 2). Only INVALID_RC and NOT_NEUTRAL_AT_STARTUP are
    // gated; once armed (PROGRAMMING/OPERATIONAL) the stick can move freely.
    if matches!(*safemode, SafeMode::InvalidRc | SafeMode::NotNeutralAtStartup)
        && raw.abs() > settings.stick_neutral_range
    {
        if *safemode == SafeMode::InvalidRc {
            events.push(DiagnosticEvent::RcSignalInvalidAtStartup);
            *safemode = SafeMode::NotNeutralAtStartup;
        }
        return 0;
    }

    // Dead-band removal (step 3).
    let deadbanded = if raw > settings.stick_neutral_range {
        raw - settings.stick_neutral_range
    } else if raw < -settings.stick_neutral_range {
        raw + settings.stick_neutral_range
    } else {
        0
    };

    // Step 4: accumulated on the dead-banded reading, used only for its sign
    // by the direction inferencer (§4.7).
    *stickintegral = stickintegral.wrapping_add(deadbanded);

    let mut value = deadbanded * STICK_UNIT_SCALE;

    if settings.mode == Mode::Passthrough {
        *stick_last_value = value;
        return value;
    }

    // Step 7: select the operational or safemode acceleration/speed caps.
    let (max_accel, max_speed) = if *safemode == SafeMode::Operational {
        (settings.stick_max_accel, settings.stick_max_speed)
    } else {
        (
            settings.stick_max_accel_safemode,
            settings.stick_max_speed_safemode,
        )
    };

    // Step 8: acceleration clamp.
    let diff = value - *stick_last_value;
    if diff > max_accel {
        value = *stick_last_value + max_accel;
    } else if diff < -max_accel {
        value = *stick_last_value - max_accel;
    }

    // Step 9: absolute speed clamp.
    let speed_limit = max_speed * STICK_UNIT_SCALE;
    value = value.clamp(-speed_limit, speed_limit);

    // Step 10: endpoint guard, only while armed and in a bounded mode.
    if *safemode == SafeMode::Operational && settings.mode.is_bounded() {
        let outcome = endpoint::guard(
            GuardInput {
                pos: guard.pos,
                signed_speed: guard.signed_speed,
                brake_distance: guard.brake_distance,
                max_accel,
            },
            settings,
            value,
            stick_last_value,
            monitor,
            events,
        );
        if outcome.short_circuit {
            return outcome.value;
        }
        value = outcome.value;
    }

    // Step 11: commit (the guard, when it ran without short-circuiting,
    // leaves this to us).
    *stick_last_value = value;
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::EscDirection;

    fn neutral_guard() -> GuardContext {
        GuardContext {
            pos: 0,
            signed_speed: 0,
            brake_distance: 0,
        }
    }

    #[test]
    fn valid_neutral_frame_requires_a_nonzero_duty_within_range() {
        let settings = Settings::default();
        assert!(!valid_neutral_frame(0, &settings));
        assert!(valid_neutral_frame(settings.stick_neutral_pos as u16, &settings));
        let out_of_range = (settings.stick_neutral_pos + settings.stick_neutral_range + 1) as u16;
        assert!(!valid_neutral_frame(out_of_range, &settings));
    }

    #[test]
    fn no_frame_is_treated_as_neutral() {
        let mut settings = Settings::default();
        let mut safemode = SafeMode::Operational;
        let mut stick_last_value = 0;
        let mut stickintegral = 0;
        let mut monitor = Monitor::Free;
        let mut events = EventBuf::new();
        let value = condition(
            0,
            &mut settings,
            &mut safemode,
            &mut stick_last_value,
            &mut stickintegral,
            &mut monitor,
            &mut events,
            neutral_guard(),
        );
        assert_eq!(value, 0);
    }

    #[test]
    fn startup_gate_latches_on_first_offense_only() {
        let mut settings = Settings::default();
        let mut safemode = SafeMode::InvalidRc;
        let mut stick_last_value = 0;
        let mut stickintegral = 0;
        let mut monitor = Monitor::Free;
        let mut events = EventBuf::new();

        let value = condition(
            1800,
            &mut settings,
            &mut safemode,
            &mut stick_last_value,
            &mut stickintegral,
            &mut monitor,
            &mut events,
            neutral_guard(),
        );
        assert_eq!(value, 0);
        assert_eq!(safemode, SafeMode::NotNeutralAtStartup);
        assert_eq!(events.iter().count(), 1);

        // Second offense: no further diagnostic, state stays latched.
        let mut events2 = EventBuf::new();
        condition(
            1800,
            &mut settings,
            &mut safemode,
            &mut stick_last_value,
            &mut stickintegral,
            &mut monitor,
            &mut events2,
            neutral_guard(),
        );
        assert!(events2.is_empty());
        assert_eq!(safemode, SafeMode::NotNeutralAtStartup);
    }

    #[test]
    fn passthrough_bypasses_all_limiting() {
        let mut settings = Settings::default();
        settings.mode = Mode::Passthrough;
        let mut safemode = SafeMode::Operational;
        let mut stick_last_value = 0;
        let mut stickintegral = 0;
        let mut monitor = Monitor::Free;
        let mut events = EventBuf::new();
        // duty 1500+500=2000, neutral_pos=1500, range=20 -> raw=500,
        // deadbanded=480, value=4800, unclamped by accel/speed limits.
        let value = condition(
            2000,
            &mut settings,
            &mut safemode,
            &mut stick_last_value,
            &mut stickintegral,
            &mut monitor,
            &mut events,
            neutral_guard(),
        );
        assert_eq!(value, 4800);
        assert_eq!(stick_last_value, 4800);
    }

    #[test]
    fn acceleration_clamp_limits_ramp_rate() {
        let mut settings = Settings::default();
        settings.mode = Mode::Limiter;
        settings.stick_max_accel = 10;
        settings.stick_max_speed = 1000;
        let mut safemode = SafeMode::Operational;
        let mut stick_last_value = 0;
        let mut stickintegral = 0;
        let mut monitor = Monitor::Free;
        let mut events = EventBuf::new();
        // raw = 2000-1500 = 500, deadbanded = 480, scaled = 4800 -- far more
        // than one tick's worth of accel, so the clamp should cap it at 10.
        let value = condition(
            2000,
            &mut settings,
            &mut safemode,
            &mut stick_last_value,
            &mut stickintegral,
            &mut monitor,
            &mut events,
            neutral_guard(),
        );
        assert_eq!(value, 10);
    }

    #[test]
    fn speed_clamp_caps_absolute_magnitude() {
        let mut settings = Settings::default();
        settings.mode = Mode::Limiter;
        settings.stick_max_accel = 10_000;
        settings.stick_max_speed = 50;
        let mut safemode = SafeMode::Operational;
        let mut stick_last_value = 0;
        let mut stickintegral = 0;
        let mut monitor = Monitor::Free;
        let mut events = EventBuf::new();
        let value = condition(
            2000,
            &mut settings,
            &mut safemode,
            &mut stick_last_value,
            &mut stickintegral,
            &mut monitor,
            &mut events,
            neutral_guard(),
        );
        assert_eq!(value, 500); // 50 * 10
    }

    #[test]
    fn safemode_pair_applies_outside_operational() {
        let mut settings = Settings::default();
        settings.mode = Mode::Limiter;
        settings.stick_max_accel = 1000;
        settings.stick_max_accel_safemode = 3;
        settings.stick_max_speed_safemode = 1000;
        let mut safemode = SafeMode::Programming;
        let mut stick_last_value = 0;
        let mut stickintegral = 0;
        let mut monitor = Monitor::Free;
        let mut events = EventBuf::new();
        let value = condition(
            2000,
            &mut settings,
            &mut safemode,
            &mut stick_last_value,
            &mut stickintegral,
            &mut monitor,
            &mut events,
            neutral_guard(),
        );
        assert_eq!(value, 3);
    }

    #[test]
    fn operational_bounded_mode_runs_endpoint_guard() {
        let mut settings = Settings::default();
        settings.mode = Mode::Endpoint;
        settings.pos_start = 0;
        settings.pos_end = 1000;
        settings.esc_direction = EscDirection::Positive;
        settings.max_position_error = 50;
        settings.stick_max_accel = 10;
        settings.stick_max_speed = 1000;
        let mut safemode = SafeMode::Operational;
        let mut stick_last_value = 500;
        let mut stickintegral = 0;
        let mut monitor = Monitor::Free;
        let mut events = EventBuf::new();
        // duty chosen so the post-clamp value still commands forward motion;
        // the guard should intervene because pos+brake is already past
        // pos_end + max_position_error.
        let value = condition(
            2000,
            &mut settings,
            &mut safemode,
            &mut stick_last_value,
            &mut stickintegral,
            &mut monitor,
            &mut events,
            GuardContext {
                pos: 950,
                signed_speed: 20,
                brake_distance: 100,
            },
        );
        assert_eq!(value, 0);
        assert_eq!(monitor, Monitor::EmergencyBrake);
    }

    #[test]
    fn non_operational_bounded_mode_skips_endpoint_guard() {
        // Programming mode honors accel/speed caps but not endpoints --
        // otherwise the endpoints could never be moved further out.
        let mut settings = Settings::default();
        settings.mode = Mode::Endpoint;
        settings.pos_start = 0;
        settings.pos_end = 1000;
        settings.esc_direction = EscDirection::Positive;
        settings.max_position_error = 50;
        settings.stick_max_accel_safemode = 10_000;
        settings.stick_max_speed_safemode = 10_000;
        let mut safemode = SafeMode::Programming;
        let mut stick_last_value = 0;
        let mut stickintegral = 0;
        let mut monitor = Monitor::Free;
        let mut events = EventBuf::new();
        let value = condition(
            2000,
            &mut settings,
            &mut safemode,
            &mut stick_last_value,
            &mut stickintegral,
            &mut monitor,
            &mut events,
            GuardContext {
                pos: 950,
                signed_speed: 20,
                brake_distance: 100,
            },
        );
        assert_eq!(value, 4800);
        assert_eq!(monitor, Monitor::Free);
    }
}
