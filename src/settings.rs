//! Configuration for the control core. Mutated rarely, by a configuration path
//! external to the core; read every tick.

/// Operating mode for the output stage. Determines which filters and which
/// ESC-command strategy apply.
#[derive(Clone, Copy, PartialEq, Eq, Debug, defmt::Format)]
pub enum Mode {
    /// Stick value passed straight through (scaled to internal units). No
    /// acceleration/speed limiting, no endpoints.
    Passthrough,
    /// Acceleration and speed limiting applied; no endpoints.
    Limiter,
    /// Acceleration/speed limiting, plus endpoint-aware braking.
    Endpoint,
    /// Acceleration/speed limiting, plus an absolute-position PID loop that
    /// tracks a commanded target position.
    AbsolutePosition,
}

impl Mode {
    /// Whether this mode honors programmed travel endpoints at all (the
    /// endpoint guard and the target-position clamp are skipped otherwise).
    pub fn is_bounded(self) -> bool {
        matches!(self, Mode::Endpoint | Mode::AbsolutePosition)
    }
}

/// Sign of the coupling between a positive commanded stick and the resulting
/// change in encoder position. Modeled as a tagged variant rather than a
/// signed integer with a magic zero for "unknown" (`spec.md` design note).
#[derive(Clone, Copy, PartialEq, Eq, Debug, defmt::Format)]
pub enum EscDirection {
    Unknown,
    Positive,
    Negative,
}

impl EscDirection {
    /// +1 / -1 sign multiplier once resolved; `None` while `Unknown`.
    pub fn sign(self) -> Option<i32> {
        match self {
            EscDirection::Unknown => None,
            EscDirection::Positive => Some(1),
            EscDirection::Negative => Some(-1),
        }
    }
}

/// Error returned by [`Settings::validate`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, defmt::Format)]
pub enum SettingsError {
    NeutralRangeNegative,
    MaxAccelNotPositive,
    MaxSpeedNotPositive,
    EscScaleZero,
    EndpointsOutOfOrder,
}

/// Configuration record for one controller instance. Read every tick; the
/// core reads and may itself write `stick_max_accel`, `stick_max_speed`,
/// `pos_start`, `pos_end`, and `esc_direction` (potentiometer ingest,
/// endpoint programming, and direction inference respectively).
#[derive(Clone, Debug, defmt::Format)]
pub struct Settings {
    /// Proportional gain for the absolute-position PID loop.
    pub p: f32,
    /// Integral gain.
    pub i: f32,
    /// Derivative gain.
    pub d: f32,

    /// Pulse-width center of the speed-channel dead-band, in microseconds.
    pub stick_neutral_pos: i32,
    /// Half-width of the dead-band around `stick_neutral_pos`, in microseconds.
    pub stick_neutral_range: i32,

    /// Per-tick acceleration cap while OPERATIONAL, in units of 0.1 us.
    pub stick_max_accel: i32,
    /// Absolute speed cap while OPERATIONAL, in microseconds (not 0.1 us).
    pub stick_max_speed: i32,
    /// Per-tick acceleration cap while not OPERATIONAL.
    pub stick_max_accel_safemode: i32,
    /// Absolute speed cap while not OPERATIONAL.
    pub stick_max_speed_safemode: i32,

    /// PWM pulse-width center of the ESC neutral point, in microseconds.
    pub esc_neutral_pos: i32,
    /// Half-width of the ESC neutral band, in microseconds.
    pub esc_neutral_range: i32,
    /// Divisor mapping internal ESC-output units to a PWM offset.
    pub esc_scale: i32,
    /// Sign of the stick-to-encoder coupling; `Unknown` until inferred.
    pub esc_direction: EscDirection,

    /// Lower travel endpoint, in encoder counts.
    pub pos_start: i32,
    /// Upper travel endpoint, in encoder counts. Invariant: `pos_start <= pos_end`
    /// whenever both have been set.
    pub pos_end: i32,
    /// Tolerance, in encoder counts, before the emergency brake engages.
    pub max_position_error: i32,
    /// Scalar mapping filtered stick to a target-position delta per tick, used
    /// only in `Mode::AbsolutePosition`.
    pub stick_speed_factor: f32,

    pub mode: Mode,

    /// RC channel index carrying the speed stick.
    pub rc_channel_speed: u8,
    /// RC channel index carrying the programming-mode switch.
    pub rc_channel_programming: u8,
    /// RC channel index carrying the endpoint-set switch.
    pub rc_channel_endpoint: u8,
    /// RC channel index carrying the max-acceleration potentiometer.
    pub rc_channel_max_accel: u8,
    /// RC channel index carrying the max-speed potentiometer.
    pub rc_channel_max_speed: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            p: 1.0,
            i: 0.0,
            d: 0.0,

            stick_neutral_pos: 1500,
            stick_neutral_range: 20,

            stick_max_accel: 10,
            stick_max_speed: 100,
            stick_max_accel_safemode: 5,
            stick_max_speed_safemode: 50,

            esc_neutral_pos: 1500,
            esc_neutral_range: 400,
            esc_scale: 20,
            esc_direction: EscDirection::Unknown,

            pos_start: 0,
            pos_end: 0,
            max_position_error: 50,
            stick_speed_factor: 1.0,

            mode: Mode::Passthrough,

            rc_channel_speed: 0,
            rc_channel_programming: 1,
            rc_channel_endpoint: 2,
            rc_channel_max_accel: 3,
            rc_channel_max_speed: 4,
        }
    }
}

impl Settings {
    /// Check the invariants a configuration path must uphold before handing a
    /// new `Settings` value to the core. The core itself still defensively
    /// self-heals an out-of-order `pos_start`/`pos_end` pair at runtime (see
    /// the endpoint guard), since a torn read between ticks can transiently
    /// violate this ordering even when every committed value passed
    /// validation.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.stick_neutral_range < 0 {
            return Err(SettingsError::NeutralRangeNegative);
        }
        if self.stick_max_accel <= 0 || self.stick_max_accel_safemode <= 0 {
            return Err(SettingsError::MaxAccelNotPositive);
        }
        if self.stick_max_speed <= 0 || self.stick_max_speed_safemode <= 0 {
            return Err(SettingsError::MaxSpeedNotPositive);
        }
        if self.esc_scale == 0 {
            return Err(SettingsError::EscScaleZero);
        }
        if self.pos_start > self.pos_end {
            return Err(SettingsError::EndpointsOutOfOrder);
        }
        Ok(())
    }
}
