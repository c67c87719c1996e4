//! Line codec for SeatLink protocol frames.
//!
//! Wire format:
//! ```text
//! command frame:  <digit>\n            e.g. "0\n" = START, "9\n" = DATA
//! data frame:     <compact JSON>\n     a serialized SeatPayload
//! ```
//! The line terminator is added and stripped by the connection endpoint; the
//! functions here work on the line content only.
//!
//! Command digits:
//!
//! | digit | command            |
//! |-------|--------------------|
//! | 0     | START              |
//! | 1     | STOP               |
//! | 2     | MOTION_ON          |
//! | 3     | MOTION_OFF         |
//! | 4     | REACTIVITY_ERROR   |
//! | 5     | REACTIVITY_SECURE  |
//! | 6     | REACTIVITY_NORMAL  |
//! | 7     | REACTIVITY_HIGH    |
//! | 8     | SECURE_RESET       |
//! | 9     | DATA               |

use thiserror::Error;
use tracing::debug;

use crate::protocol::messages::{Command, SeatPayload};

/// Errors that can occur while decoding or encoding a frame.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The frame was empty.
    #[error("empty frame")]
    EmptyFrame,

    /// The first character of a command frame is not a decimal digit.
    #[error("command frame does not start with a digit: {0:?}")]
    NotADigit(char),

    /// The command value is outside the command table.
    #[error("unknown command value: {0}")]
    UnknownCommand(u8),

    /// A data frame could not be serialized or parsed.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// Encodes a [`Command`] as its single wire digit.
///
/// # Examples
///
/// ```rust
/// use seatlink_core::{encode_command, Command};
///
/// assert_eq!(encode_command(Command::MotionOn), "2");
/// assert_eq!(encode_command(Command::Data), "9");
/// ```
pub fn encode_command(cmd: Command) -> &'static str {
    match cmd {
        Command::Start => "0",
        Command::Stop => "1",
        Command::MotionOn => "2",
        Command::MotionOff => "3",
        Command::ReactivityError => "4",
        Command::ReactivitySecure => "5",
        Command::ReactivityNormal => "6",
        Command::ReactivityHigh => "7",
        Command::SecureReset => "8",
        Command::Data => "9",
    }
}

/// Parses the command carried by a frame, reporting why it is not one.
///
/// Only the first character is significant.
///
/// # Errors
///
/// Returns [`ProtocolError::EmptyFrame`] or [`ProtocolError::NotADigit`].
pub fn parse_command(text: &str) -> Result<Command, ProtocolError> {
    let first = text.chars().next().ok_or(ProtocolError::EmptyFrame)?;
    let digit = first.to_digit(10).ok_or(ProtocolError::NotADigit(first))?;
    // `to_digit(10)` yields 0..=9, which always fits a u8.
    Command::try_from(digit as u8)
}

/// Decodes a command frame.  Anything that is not a command decodes to `None`.
///
/// # Examples
///
/// ```rust
/// use seatlink_core::{decode_command, Command};
///
/// assert_eq!(decode_command("8"), Some(Command::SecureReset));
/// assert_eq!(decode_command("x"), None);
/// assert_eq!(decode_command(""), None);
/// ```
pub fn decode_command(text: &str) -> Option<Command> {
    match parse_command(text) {
        Ok(cmd) => Some(cmd),
        Err(e) => {
            debug!("dropping frame {text:?}: {e}");
            None
        }
    }
}

// ── Data frames ───────────────────────────────────────────────────────────────

/// Serializes a [`SeatPayload`] into a single line of compact JSON.
///
/// Non-finite readings are scrubbed first (see [`SeatPayload::finite`]).
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPayload`] if serialization fails.
pub fn encode_payload(payload: &SeatPayload) -> Result<String, ProtocolError> {
    // JSON has no NaN or infinity; serde_json would write `null`, which no
    // reader accepts as an f32.
    serde_json::to_string(&payload.finite())
        .map_err(|e| ProtocolError::MalformedPayload(e.to_string()))
}

/// Parses a data frame produced by [`encode_payload`].
///
/// # Errors
///
/// Returns [`ProtocolError::EmptyFrame`] for an empty line and
/// [`ProtocolError::MalformedPayload`] for anything that is not a payload.
pub fn decode_payload(text: &str) -> Result<SeatPayload, ProtocolError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ProtocolError::EmptyFrame);
    }
    serde_json::from_str(text).map_err(|e| ProtocolError::MalformedPayload(e.to_string()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::seat::{MotionTargets, Reactivity, SeatState, SeatStatus};

    fn sample_payload() -> SeatPayload {
        SeatPayload {
            seat: SeatState {
                status: SeatStatus::Playing,
                error_code: 0,
                motion_enabled: true,
                reactivity: Reactivity::Normal,
                intensity: 0.75,
                targets: MotionTargets {
                    pitch: 2.5,
                    roll: -1.25,
                    acceleration: 0.5,
                    velocity: 0.25,
                },
            },
            overall_state: "Running".to_string(),
            stream_mode: "Realtime".to_string(),
            weights: vec![12.5, 13.0, 11.75, 12.25],
            hardware_connected: true,
        }
    }

    #[test]
    fn test_encode_command_matches_wire_table() {
        assert_eq!(encode_command(Command::Start), "0");
        assert_eq!(encode_command(Command::MotionOn), "2");
        assert_eq!(encode_command(Command::ReactivityError), "4");
        assert_eq!(encode_command(Command::SecureReset), "8");
        assert_eq!(encode_command(Command::Data), "9");
    }

    #[test]
    fn test_encode_command_agrees_with_discriminant() {
        for cmd in Command::ALL {
            assert_eq!(encode_command(cmd), (cmd as u8).to_string());
        }
    }

    #[test]
    fn test_decode_command_uses_only_first_character() {
        assert_eq!(decode_command("12"), Some(Command::Stop));
        assert_eq!(decode_command("9\r"), Some(Command::Data));
    }

    #[test]
    fn test_decode_command_rejects_non_numeric_input() {
        for input in ["", "a", " 0", "-1", "\n", "٣"] {
            assert_eq!(decode_command(input), None, "input {input:?}");
        }
    }

    #[test]
    fn test_parse_command_reports_reason() {
        assert_eq!(parse_command(""), Err(ProtocolError::EmptyFrame));
        assert_eq!(parse_command("x1"), Err(ProtocolError::NotADigit('x')));
        assert_eq!(parse_command("5"), Ok(Command::ReactivitySecure));
    }

    #[test]
    fn test_encoded_payload_is_a_single_line() {
        let line = encode_payload(&sample_payload()).unwrap();
        assert!(!line.contains('\n'));
        assert!(line.contains("\"status\":\"PLAYING\""));
    }

    #[test]
    fn test_payload_survives_encode_then_decode() {
        let original = sample_payload();
        let line = encode_payload(&original).unwrap();
        assert_eq!(decode_payload(&line).unwrap(), original);
    }

    #[test]
    fn test_decode_payload_rejects_garbage() {
        assert_eq!(decode_payload("   "), Err(ProtocolError::EmptyFrame));
        assert!(matches!(
            decode_payload("{\"status\":"),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_non_finite_readings_still_encode_a_decodable_frame() {
        // Arrange
        let mut payload = sample_payload();
        payload.weights.push(f32::INFINITY);
        payload.seat.targets.velocity = f32::NAN;

        // Act
        let line = encode_payload(&payload).unwrap();
        let decoded = decode_payload(&line).expect("frame must decode");

        // Assert
        assert_eq!(decoded.weights, sample_payload().weights);
        assert_eq!(decoded.seat.targets.velocity, 0.0);
    }
}
