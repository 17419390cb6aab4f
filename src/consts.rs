//! Constants shared across the control cycle.

/// Control cycle period, in seconds. The control task runs at 50 Hz.
pub const TA: f32 = 0.02;

/// A switch channel is considered "high" (armed / set) above this duty, in microseconds.
pub const SWITCH_THRESHOLD_US: u16 = 1200;

/// Stick values are tracked internally at 0.1 us resolution to keep the
/// acceleration ramp fine-grained; this is the promotion factor from raw
/// microsecond units.
pub const STICK_UNIT_SCALE: i32 = 10;

/// Position, in encoder counts, past which `esc_direction` inference engages.
pub const DIRECTION_INFERENCE_MIN_POS: i32 = 500;
