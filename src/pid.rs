//! §4.8 Output stage, absolute-position half. Runs a single-axis PID loop
//! between a commanded target position and the actual encoder reading, and
//! owns the target-position carry state.
//!
//! In non-`AbsolutePosition` modes the output stage skips this file entirely
//! and uses the filtered stick value directly — see `output.rs`.

use crate::consts::TA;
use crate::settings::{EscDirection, Settings};

/// One evaluation's PID terms, kept around mainly for diagnostics — the
/// control output is `p + i + d`.
#[derive(Clone, Copy, Debug, Default, defmt::Format)]
pub struct PidState {
    /// Position error this tick (`pos_target - pos_current`).
    pub e: f32,
    pub p: f32,
    pub i: f32,
    pub d: f32,
}

impl PidState {
    pub fn out(&self) -> f32 {
        self.p + self.i + self.d
    }
}

/// Result of one `PositionLoop::step`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PositionLoopOutcome {
    /// Tracking normally; `esc_output` is the signed command in the same
    /// units as a filtered stick value.
    Tracking { esc_output: i32 },
    /// `|e| >= max_position_error`: the platform can't keep up with the
    /// commanded target. The loop has reset itself to the current position;
    /// `error` is the position error that triggered the reset.
    Diverged { error: f32 },
}

/// Carry state for `Mode::AbsolutePosition`: the commanded target and the
/// PID integrator/previous-error terms.
#[derive(Clone, Copy, Debug, Default)]
pub struct PositionLoop {
    pub pos_target: f32,
    pub pos_target_old: f32,
    esum: f32,
    ealt: f32,
    pid: PidState,
}

impl PositionLoop {
    /// Snap the target to the current position and clear the integrator.
    /// Called on divergence, and should be called once by the caller when
    /// first entering `Mode::AbsolutePosition` from any other mode.
    pub fn reset_at(&mut self, pos_current: i32) {
        self.pos_target = pos_current as f32;
        self.pos_target_old = self.pos_target;
        self.esum = 0.0;
        self.ealt = 0.0;
        self.pid = PidState::default();
    }

    pub fn pid_state(&self) -> PidState {
        self.pid
    }

    /// Advance the target by the filtered stick (scaled by
    /// `stick_speed_factor`), clamp it to the travel endpoints while armed,
    /// and run the PID loop against the actual position.
    pub fn step(
        &mut self,
        stick_filtered_value: i32,
        pos_current: i32,
        settings: &Settings,
        operational: bool,
    ) -> PositionLoopOutcome {
        self.pos_target += stick_filtered_value as f32 * settings.stick_speed_factor;

        if operational {
            // The target can never exceed the programmed endpoints, except
            // while still programming them.
            if self.pos_target > settings.pos_end as f32 {
                self.pos_target = settings.pos_end as f32;
            } else if self.pos_target < settings.pos_start as f32 {
                self.pos_target = settings.pos_start as f32;
            }
        }
        self.pos_target_old = self.pos_target;

        let e = self.pos_target - pos_current as f32;
        self.esum += e;

        if e.abs() >= settings.max_position_error as f32 {
            self.reset_at(pos_current);
            return PositionLoopOutcome::Diverged { error: e };
        }

        let p_term = settings.p * e;
        let i_term = settings.i * TA * self.esum;
        let d_term = (settings.d / TA) * (e - self.ealt);
        self.ealt = e;
        self.pid = PidState {
            e,
            p: p_term,
            i: i_term,
            d: d_term,
        };

        let y = self.pid.out();
        let esc_output = if settings.esc_direction == EscDirection::Positive {
            y
        } else {
            -y
        };
        PositionLoopOutcome::Tracking {
            esc_output: esc_output as i32,
        }
    }
}
