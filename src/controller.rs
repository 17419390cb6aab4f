//! Owns all per-tick carry state and runs the control cycle in the fixed
//! dependency order from `spec.md` §2: sampler, brake estimator, stick
//! conditioner (which internally runs the endpoint guard), mode/endpoint
//! programmer, potentiometer ingest, direction inferencer, output stage,
//! trace ring.

use crate::brake::brake_distance;
use crate::diagnostics::{DiagnosticEvent, EventBuf};
use crate::hw::{ChannelSource, Clock, EncoderSource};
use crate::output::map_to_pwm;
use crate::pid::{PositionLoop, PositionLoopOutcome};
use crate::programmer::{self, ProgrammerState};
use crate::sampler::sample;
use crate::settings::{Mode, Settings};
use crate::status::{ControllerStatus, Monitor, SafeMode};
use crate::stick::{self, GuardContext};
use crate::trace::TraceSample;
use crate::{direction, pots};

/// Everything produced by one `Controller::tick`.
#[derive(Clone, Copy, Debug)]
pub struct TickOutcome {
    /// The single PWM pulse width to write to the ESC this tick.
    pub pwm: u16,
    pub events: EventBuf,
}

/// The control core. One instance per cablecam axis; holds every field that
/// must survive between ticks.
#[derive(Debug, Default)]
pub struct Controller {
    pub status: ControllerStatus,
    stick_last_value: i32,
    pos_current_old: i32,
    stickintegral: i32,
    programmer: ProgrammerState,
    position_loop: PositionLoop,
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one 50 Hz control cycle. `settings` is taken by `&mut` because the
    /// core itself writes back `stick_max_accel`, `stick_max_speed`,
    /// `pos_start`, `pos_end`, and `esc_direction` (`spec.md` §6).
    pub fn tick(
        &mut self,
        settings: &mut Settings,
        encoder: &impl EncoderSource,
        channels: &impl ChannelSource,
        clock: &impl Clock,
    ) -> TickOutcome {
        self.status.monitor = Monitor::Free;
        let mut events = EventBuf::new();

        let sampled = sample(encoder.position(), self.pos_current_old);
        let brake_distance = brake_distance(
            sampled.speed_current,
            self.stick_last_value,
            settings.stick_max_accel,
        );

        // In AbsolutePosition mode the endpoint guard and brake estimate
        // reason about the commanded target, not the actual position --
        // the PID loop is responsible for keeping the two converged. Entering
        // the mode does not itself snap pos_target to the current position;
        // if it's stale the PID loop's own divergence branch (pid.rs) surfaces
        // EmergencyBrake/PositionDivergence for as long as it takes to settle,
        // same as the original firmware's resetPosTarget() being reachable
        // only from that branch.
        let is_absolute_position = settings.mode == Mode::AbsolutePosition;

        let guard_pos = if is_absolute_position {
            self.position_loop.pos_target_old as i32
        } else {
            sampled.pos_current
        };

        let speed_duty = channels.duty(settings.rc_channel_speed);
        let valid_neutral_frame = stick::valid_neutral_frame(speed_duty, settings);

        let stick_filtered_value = stick::condition(
            speed_duty,
            settings,
            &mut self.status.safemode,
            &mut self.stick_last_value,
            &mut self.stickintegral,
            &mut self.status.monitor,
            &mut events,
            GuardContext {
                pos: guard_pos,
                signed_speed: sampled.signed_speed,
                brake_distance,
            },
        );

        programmer::evaluate(
            channels.duty(settings.rc_channel_programming),
            channels.duty(settings.rc_channel_endpoint),
            sampled.pos_current,
            valid_neutral_frame,
            settings,
            &mut self.status.safemode,
            &mut self.programmer,
            &mut events,
        );

        pots::ingest(
            channels.duty(settings.rc_channel_max_accel),
            channels.duty(settings.rc_channel_max_speed),
            settings,
        );

        direction::infer(guard_pos, self.stickintegral, settings, &mut events);

        let esc_output = if is_absolute_position {
            let operational = self.status.safemode == SafeMode::Operational;
            match self.position_loop.step(
                stick_filtered_value,
                sampled.pos_current,
                settings,
                operational,
            ) {
                PositionLoopOutcome::Tracking { esc_output } => esc_output,
                PositionLoopOutcome::Diverged { error } => {
                    self.status.monitor = Monitor::EmergencyBrake;
                    events.push(DiagnosticEvent::PositionDivergence { error });
                    0
                }
            }
        } else {
            stick_filtered_value
        };

        let pwm = map_to_pwm(esc_output, settings);

        if sampled.speed_current != 0 || esc_output != 0 {
            self.status.trace.push(TraceSample {
                pos: sampled.pos_current,
                speed: sampled.speed_current,
                stick: stick_filtered_value,
                distance_to_stop: brake_distance,
                esc: pwm,
                tick: clock.monotonic_ms(),
            });
        }

        self.pos_current_old = sampled.pos_current;

        TickOutcome { pwm, events }
    }
}
