//! Structured diagnostic events. The core never formats or emits a string
//! itself — it returns these from `tick()`, and a separate sink (in the
//! firmware binary) formats and rate-limits them. This keeps the 50 Hz path
//! free of I/O, per `spec.md` §5 and §9.

use crate::settings::EscDirection;

/// Which endpoint a programming click just set.
#[derive(Clone, Copy, PartialEq, Eq, Debug, defmt::Format)]
pub enum EndpointSlot {
    Start,
    End,
}

/// One noteworthy condition observed during a tick.
///
/// `PartialEq` only, not `Eq` -- `PositionDivergence`'s `f32` payload isn't
/// `Eq` (NaN), and the diagnostics sink only ever needs `==` to coalesce
/// back-to-back identical events.
#[derive(Clone, Copy, PartialEq, Debug, defmt::Format)]
pub enum DiagnosticEvent {
    /// A valid RC frame arrived, but the stick was outside the dead-band at
    /// startup (`spec.md` §4.3 step 2, §7 "Startup-not-neutral").
    RcSignalInvalidAtStartup,
    /// Transitioned into `SafeMode::Operational`.
    EnteredOperational,
    /// Transitioned into `SafeMode::Programming`.
    EnteredProgramming,
    /// An endpoint was set by a click of the endpoint-set switch.
    EndpointSet { which: EndpointSlot, position: i32 },
    /// Projected position would overshoot an endpoint within the brake
    /// distance; ramping the stick toward neutral.
    EndpointBrakeEngaged,
    /// Actual position is already past an endpoint; forced to zero output.
    EndpointOvershootRealized,
    /// Projected position exceeds an endpoint by `max_position_error` while
    /// still moving outward; forced to zero output.
    EmergencyBrake,
    /// `Mode::AbsolutePosition`'s tracking error exceeded
    /// `max_position_error`; the PID loop and target were reset and output
    /// forced to zero.
    PositionDivergence { error: f32 },
    /// `esc_direction` was `Unknown` and has just been inferred.
    DirectionInferred(EscDirection),
}

/// Fixed-capacity, no-allocation holder for the handful of events a single
/// tick can plausibly emit (at most one per §4.3/§4.5 decision point).
pub const MAX_EVENTS_PER_TICK: usize = 4;

#[derive(Clone, Copy, Debug, Default, defmt::Format)]
pub struct EventBuf {
    events: [Option<DiagnosticEvent>; MAX_EVENTS_PER_TICK],
    len: usize,
}

impl EventBuf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event. Silently drops the event if the buffer is already
    /// full — diagnostics are best-effort and must never make the 50 Hz task
    /// miss its deadline or panic.
    pub fn push(&mut self, event: DiagnosticEvent) {
        if self.len < MAX_EVENTS_PER_TICK {
            self.events[self.len] = Some(event);
            self.len += 1;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = DiagnosticEvent> + '_ {
        self.events[..self.len].iter().filter_map(|e| *e)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
