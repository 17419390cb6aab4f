//! §4.7 Direction inferencer. Once per power-up, estimates the sign of the
//! stick-to-encoder coupling by comparing the accumulated stick integral
//! against how far the platform has actually moved.

use crate::consts::DIRECTION_INFERENCE_MIN_POS;
use crate::diagnostics::{DiagnosticEvent, EventBuf};
use crate::settings::{EscDirection, Settings};

/// Resolve `settings.esc_direction` from `Unknown` once the platform has
/// moved far enough from its startup position for the sign comparison to be
/// meaningful. A no-op once direction is already known, or while `|pos|` is
/// still within the noise floor.
pub fn infer(pos: i32, stickintegral: i32, settings: &mut Settings, events: &mut EventBuf) {
    if settings.esc_direction != EscDirection::Unknown {
        return;
    }
    if pos.abs() <= DIRECTION_INFERENCE_MIN_POS {
        return;
    }

    let same_sign = (stickintegral > 0 && pos > 0) || (stickintegral < 0 && pos < 0);
    settings.esc_direction = if same_sign {
        EscDirection::Positive
    } else {
        EscDirection::Negative
    };
    events.push(DiagnosticEvent::DirectionInferred(settings.esc_direction));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_unknown_near_the_startup_position() {
        let mut settings = Settings::default();
        let mut events = EventBuf::new();
        infer(200, 50, &mut settings, &mut events);
        assert_eq!(settings.esc_direction, EscDirection::Unknown);
        assert!(events.is_empty());
    }

    #[test]
    fn matching_signs_resolve_positive() {
        let mut settings = Settings::default();
        let mut events = EventBuf::new();
        infer(800, 300, &mut settings, &mut events);
        assert_eq!(settings.esc_direction, EscDirection::Positive);
        assert_eq!(
            events.iter().next(),
            Some(DiagnosticEvent::DirectionInferred(EscDirection::Positive))
        );
    }

    #[test]
    fn opposing_signs_resolve_negative() {
        let mut settings = Settings::default();
        let mut events = EventBuf::new();
        infer(800, -300, &mut settings, &mut events);
        assert_eq!(settings.esc_direction, EscDirection::Negative);
    }

    #[test]
    fn already_known_direction_is_never_revisited() {
        let mut settings = Settings::default();
        settings.esc_direction = EscDirection::Negative;
        let mut events = EventBuf::new();
        infer(800, 300, &mut settings, &mut events);
        assert_eq!(settings.esc_direction, EscDirection::Negative);
        assert!(events.is_empty());
    }
}
