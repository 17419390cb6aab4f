//! §4.8 Output stage, PWM-mapping half. Converts the signed ESC command
//! (filtered stick in non-`AbsolutePosition` modes, or the PID loop's output)
//! into a PWM pulse width for the ESC.

use crate::settings::Settings;

/// Map a signed ESC command to a PWM pulse width, in microseconds.
///
/// Direction is expressed by widening the pulse above `esc_neutral_pos +
/// esc_neutral_range` for a positive command, or narrowing it below
/// `esc_neutral_pos - esc_neutral_range` for a negative one; the dead-band
/// between those two bounds is the ESC's own neutral/idle range.
pub fn map_to_pwm(esc_output: i32, settings: &Settings) -> u16 {
    let pwm = if esc_output > 0 {
        settings.esc_neutral_pos + settings.esc_neutral_range + esc_output / settings.esc_scale
    } else if esc_output < 0 {
        settings.esc_neutral_pos - settings.esc_neutral_range + esc_output / settings.esc_scale
    } else {
        settings.esc_neutral_pos
    };
    pwm.clamp(0, u16::MAX as i32) as u16
}
