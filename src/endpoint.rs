//! §4.4 Endpoint guard. Overrides the stick-conditioner's output to ramp
//! toward neutral (or force zero) when projected position would overshoot a
//! programmed travel endpoint, and raises the emergency brake on runaway.
//!
//! Invoked from within the stick conditioner's step 10 (`stick.rs`), not as a
//! free-standing pipeline stage — this mirrors the original firmware, where
//! the endpoint check is inline in the stick-cycle function, and keeps the
//! "ramp, then possibly short-circuit to zero" control flow in one place
//! instead of threading a resume/short-circuit flag back out.

use crate::diagnostics::{DiagnosticEvent, EventBuf};
use crate::settings::Settings;
use crate::status::Monitor;

/// Inputs to one evaluation of the endpoint guard.
#[derive(Clone, Copy, Debug)]
pub struct GuardInput {
    /// Reference position: the actual encoder position in `Mode::Endpoint`,
    /// or `pos_target_old` in `Mode::AbsolutePosition` (`spec.md` §4.4).
    pub pos: i32,
    /// Actual signed speed, `pos_current - pos_current_old`. Used for the
    /// emergency-brake direction-of-travel check regardless of which `pos`
    /// reference is in play.
    pub signed_speed: i32,
    /// Conservative stopping distance from the brake estimator.
    pub brake_distance: i32,
    /// Effective per-tick acceleration cap for the current safemode.
    pub max_accel: i32,
}

/// Outcome of one evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GuardOutcome {
    pub value: i32,
    /// If true, the guard already decided the tick's final output and the
    /// stick conditioner must return `value` immediately without running its
    /// own step-11 commit a second time (the guard committed
    /// `stick_last_value` itself, matching `spec.md` §9's requirement that
    /// both endpoints commit symmetrically before their zero-return).
    pub short_circuit: bool,
}

/// Evaluate the endpoint guard for one tick. `value` is the stick value after
/// the acceleration/speed clamp (stick.rs step 9); `stick_last_value` is the
/// carry from the previous tick.
pub fn guard(
    input: GuardInput,
    settings: &mut Settings,
    value: i32,
    stick_last_value: &mut i32,
    monitor: &mut Monitor,
    events: &mut EventBuf,
) -> GuardOutcome {
    // Self-heal: pos_start must never exceed pos_end. A torn read between
    // ticks (settings written concurrently by the configuration path) can
    // transiently violate this even when every committed value passed
    // `Settings::validate`.
    if settings.pos_start > settings.pos_end {
        core::mem::swap(&mut settings.pos_start, &mut settings.pos_end);
    }

    let dir = settings.esc_direction.sign().unwrap_or(0);
    let mut value = value;

    // Upper endpoint.
    if input.pos + input.brake_distance >= settings.pos_end {
        if dir * value > 0 {
            value = *stick_last_value - input.max_accel * dir;
            if value * dir < 0 {
                value = 0;
            }
            *monitor = Monitor::EndpointBrake;
            events.push(DiagnosticEvent::EndpointBrakeEngaged);

            if input.pos >= settings.pos_end {
                *stick_last_value = value;
                events.push(DiagnosticEvent::EndpointOvershootRealized);
                return GuardOutcome {
                    value: 0,
                    short_circuit: true,
                };
            }
        } else {
            *monitor = Monitor::Free;
        }

        if input.pos + input.brake_distance >= settings.pos_end + settings.max_position_error
            && input.signed_speed > 0
        {
            *monitor = Monitor::EmergencyBrake;
            *stick_last_value = value;
            events.push(DiagnosticEvent::EmergencyBrake);
            return GuardOutcome {
                value: 0,
                short_circuit: true,
            };
        }
    }

    // Lower endpoint, symmetric with signs inverted.
    if input.pos - input.brake_distance <= settings.pos_start {
        if dir * value < 0 {
            value = *stick_last_value + input.max_accel * dir;
            if value * dir > 0 {
                value = 0;
            }
            *monitor = Monitor::EndpointBrake;
            events.push(DiagnosticEvent::EndpointBrakeEngaged);

            if input.pos <= settings.pos_start {
                *stick_last_value = value;
                events.push(DiagnosticEvent::EndpointOvershootRealized);
                return GuardOutcome {
                    value: 0,
                    short_circuit: true,
                };
            }
        } else {
            *monitor = Monitor::Free;
        }

        if input.pos - input.brake_distance <= settings.pos_start - settings.max_position_error
            && input.signed_speed < 0
        {
            *monitor = Monitor::EmergencyBrake;
            *stick_last_value = value;
            events.push(DiagnosticEvent::EmergencyBrake);
            return GuardOutcome {
                value: 0,
                short_circuit: true,
            };
        }
    }

    GuardOutcome {
        value,
        short_circuit: false,
    }
}
