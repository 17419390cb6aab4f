//! Per-tick mutable status: the arming state machine, and the monitor tag
//! that reports whether an endpoint or emergency brake is currently active.

use crate::trace::TraceRing;

/// Arming state of the controller.
///
/// Transitions: `InvalidRc -> NotNeutralAtStartup -> {Programming, Operational}`,
/// then `Programming <-> Operational` driven each tick by the programming
/// switch. Nothing latches except the startup state (see `spec.md` §7).
#[derive(Clone, Copy, PartialEq, Eq, Debug, defmt::Format)]
pub enum SafeMode {
    /// No valid RC frame has ever been seen.
    InvalidRc,
    /// A valid frame arrived, but the stick was outside the dead-band; the
    /// controller refuses to arm until it sees a valid frame with the stick
    /// in neutral.
    NotNeutralAtStartup,
    /// Endpoint/settings programming mode: reduced accel/speed caps, endpoint
    /// clicks are honored.
    Programming,
    /// Normal operation: full accel/speed caps, endpoints and PID active.
    Operational,
}

impl Default for SafeMode {
    fn default() -> Self {
        SafeMode::InvalidRc
    }
}

/// Per-tick status tag indicating whether an endpoint or emergency brake is
/// active. Reset to `Free` at the top of every tick.
#[derive(Clone, Copy, PartialEq, Eq, Debug, defmt::Format)]
pub enum Monitor {
    Free,
    EndpointBrake,
    EmergencyBrake,
}

impl Default for Monitor {
    fn default() -> Self {
        Monitor::Free
    }
}

impl Monitor {
    /// Whether the warning LED should be lit for this monitor state. Kept
    /// separate from the control logic itself so the firmware binary derives
    /// LED state from the result of a tick instead of threading `LedSink`
    /// through every function that can set `Monitor` (`spec.md` §9).
    pub fn warning_led_on(&self) -> bool {
        !matches!(self, Monitor::Free)
    }
}

/// Trace-ring capacity used by the firmware binary. `spec.md` §4.9 and the
/// original source's `CYCLEMONITOR_SAMPLE_COUNT` agree this is a
/// build-time constant.
pub const TRACE_CAPACITY: usize = 64;

/// Arming state, monitor tag, and diagnostic trace ring for one controller
/// instance.
#[derive(Debug, defmt::Format)]
pub struct ControllerStatus {
    pub safemode: SafeMode,
    pub monitor: Monitor,
    pub trace: TraceRing<TRACE_CAPACITY>,
}

impl Default for ControllerStatus {
    fn default() -> Self {
        Self {
            safemode: SafeMode::default(),
            monitor: Monitor::default(),
            trace: TraceRing::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_free_leaves_the_warning_led_off() {
        assert!(!Monitor::Free.warning_led_on());
        assert!(Monitor::EndpointBrake.warning_led_on());
        assert!(Monitor::EmergencyBrake.warning_led_on());
    }
}
