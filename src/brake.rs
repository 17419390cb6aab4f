//! §4.2 Brake-distance estimator. A conservative, linear-deceleration
//! overestimate of stopping distance, used to decide when the endpoint guard
//! must start ramping the stick down.

/// Estimate stopping distance given the current speed, the last filtered
/// stick value, and the configured per-tick acceleration cap.
///
/// `time_to_stop = |stick / max_accel|` ticks; `brake_distance = speed *
/// time_to_stop / 2`. This overestimates distance when `max_accel` is the
/// maximum allowed per-tick change, so braking decisions engage
/// conservatively (`spec.md` §4.2).
pub fn brake_distance(speed_current: i32, stick_last_value: i32, max_accel: i32) -> i32 {
    debug_assert!(max_accel != 0, "max_accel must be nonzero; validated by Settings::validate");
    let time_to_stop = (stick_last_value / max_accel).abs();
    speed_current * time_to_stop / 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stationary_stick_gives_zero_brake_distance() {
        assert_eq!(brake_distance(50, 0, 10), 0);
    }

    #[test]
    fn matches_manual_worked_example() {
        // speed=20/tick, stick requests +100 (0.1us units), max_accel=10
        // -> time_to_stop = 10 ticks, brake_distance = 20*10/2 = 100.
        assert_eq!(brake_distance(20, 100, 10), 100);
    }

    #[test]
    fn sign_of_stick_does_not_affect_distance() {
        assert_eq!(brake_distance(20, 100, 10), brake_distance(20, -100, 10));
    }
}
