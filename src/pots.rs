//! §4.6 Potentiometer ingest. Live-updates `stick_max_accel`/`stick_max_speed`
//! from two auxiliary channels, so the acceleration and speed caps can be
//! tuned from the transmitter without a configuration round-trip.

use crate::settings::Settings;

/// Read the max-acceleration and max-speed potentiometer channels and, when
/// a channel is actively wired (nonzero reading past the stick's own
/// dead-band), update the corresponding cap in `settings`.
///
/// A reading of `0` means the channel isn't wired up and is ignored, same
/// convention as the speed channel's "no valid frame" case.
pub fn ingest(max_accel_duty: u16, max_speed_duty: u16, settings: &mut Settings) {
    let deadband_floor = settings.stick_neutral_pos + settings.stick_neutral_range;

    if max_accel_duty != 0 && i32::from(max_accel_duty) > deadband_floor {
        // (poti - floor) maps roughly 0..700us onto a 0..35 accel range; the
        // factor-of-20 division (10x unit scale, then /2) keeps that sane.
        settings.stick_max_accel =
            1 + (i32::from(max_accel_duty) - deadband_floor) / settings.esc_scale / 2;
    }

    if max_speed_duty != 0 && i32::from(max_speed_duty) > deadband_floor {
        settings.stick_max_speed =
            1 + (i32::from(max_speed_duty) - deadband_floor) * 10 / settings.esc_scale;
    }
}
