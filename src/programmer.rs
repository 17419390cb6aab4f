//! §4.5 Mode/endpoint programmer. Reads the programming-mode switch and the
//! endpoint-set switch and drives the safemode state machine and the
//! programmed travel endpoints.

use crate::consts::SWITCH_THRESHOLD_US;
use crate::diagnostics::{DiagnosticEvent, EndpointSlot, EventBuf};
use crate::settings::Settings;
use crate::status::SafeMode;

/// Carry state this component owns across ticks.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProgrammerState {
    /// `0` until the first endpoint click of a programming session, `1`
    /// after; every click past the first moves the second endpoint.
    pub endpoint_clicks: u8,
    /// Previous tick's endpoint-switch pulse width, for rising-edge
    /// detection. `0` means "no reading yet" and suppresses detection, since
    /// a startup reading of `0` must not look like a falling edge.
    pub last_endpoint_switch: u16,
}

/// Evaluate one tick's programming and endpoint-set switches.
///
/// `pos` is the current encoder position, sampled fresh for any endpoint
/// click this tick. `valid_neutral_frame` is the stick conditioner's verdict
/// on this same tick's speed-channel reading (a real frame, stick in
/// neutral) -- while the controller is still in `InvalidRc` or
/// `NotNeutralAtStartup`, that's the only thing allowed to open the door to
/// `Programming`/`Operational`; an absent or off-center frame leaves it
/// latched, per `spec.md` §8's startup boundary case.
pub fn evaluate(
    programming_switch_duty: u16,
    endpoint_switch_duty: u16,
    pos: i32,
    valid_neutral_frame: bool,
    settings: &mut Settings,
    safemode: &mut SafeMode,
    state: &mut ProgrammerState,
    events: &mut EventBuf,
) {
    let still_latched = matches!(*safemode, SafeMode::InvalidRc | SafeMode::NotNeutralAtStartup);
    if still_latched && !valid_neutral_frame {
        state.last_endpoint_switch = endpoint_switch_duty;
        return;
    }

    if programming_switch_duty > SWITCH_THRESHOLD_US {
        if *safemode != SafeMode::Operational {
            events.push(DiagnosticEvent::EnteredOperational);
        }
        *safemode = SafeMode::Operational;
    } else {
        if *safemode != SafeMode::Programming {
            state.endpoint_clicks = 0;
            events.push(DiagnosticEvent::EnteredProgramming);
        }
        *safemode = SafeMode::Programming;
    }

    let rising_edge = endpoint_switch_duty > SWITCH_THRESHOLD_US
        && state.last_endpoint_switch <= SWITCH_THRESHOLD_US
        && state.last_endpoint_switch != 0;

    if rising_edge && *safemode == SafeMode::Programming {
        if state.endpoint_clicks == 0 {
            settings.pos_start = pos;
            state.endpoint_clicks = 1;
            events.push(DiagnosticEvent::EndpointSet {
                which: EndpointSlot::Start,
                position: pos,
            });
        } else {
            // Every click past the first only ever moves the second
            // endpoint, swapping if it landed before pos_start, so a user
            // can never collapse the range to zero width by re-clicking at
            // the same spot they set pos_start.
            if settings.pos_start < pos {
                settings.pos_end = pos;
            } else {
                settings.pos_end = settings.pos_start;
                settings.pos_start = pos;
            }
            events.push(DiagnosticEvent::EndpointSet {
                which: EndpointSlot::End,
                position: pos,
            });
        }
    }

    state.last_endpoint_switch = endpoint_switch_duty;
}
