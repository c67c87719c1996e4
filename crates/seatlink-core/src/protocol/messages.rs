//! SeatLink protocol message types.
//!
//! The link carries exactly two kinds of frames, both newline-terminated ASCII:
//!
//! - a **command frame**: one decimal digit identifying a [`Command`];
//! - a **data frame**: one compact JSON [`SeatPayload`], sent only as the
//!   reply to [`Command::Data`].
//!
//! There is no header, sequence number, or acknowledgement.  If the same
//! command arrives twice it is executed twice; the last write wins.

use serde::{Deserialize, Serialize};

use crate::domain::seat::{Reactivity, SeatState, SeatStatus};

// ── Protocol constants ────────────────────────────────────────────────────────

/// Line terminator for every frame.
pub const FRAME_TERMINATOR: char = '\n';

/// Description used for telemetry text fields that could not be read.
pub const UNKNOWN_DESCRIPTION: &str = "unknown";

// ── Command codes ─────────────────────────────────────────────────────────────

/// Every command a controller can issue to a seat.
///
/// The discriminant is the wire digit.  A frame that does not decode to one of
/// these variants is the "no command" case and is represented as `None` by
/// [`crate::protocol::codec::decode_command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Command {
    /// Begin the hardware bring-up sequence.
    Start = 0,
    /// Begin the hardware tear-down sequence.
    Stop = 1,
    MotionOn = 2,
    MotionOff = 3,
    ReactivityError = 4,
    ReactivitySecure = 5,
    ReactivityNormal = 6,
    ReactivityHigh = 7,
    /// Zero all motion targets and fall back to secure reactivity.
    SecureReset = 8,
    /// Request a [`SeatPayload`] snapshot.
    Data = 9,
}

impl Command {
    /// All commands in wire order.
    pub const ALL: [Command; 10] = [
        Command::Start,
        Command::Stop,
        Command::MotionOn,
        Command::MotionOff,
        Command::ReactivityError,
        Command::ReactivitySecure,
        Command::ReactivityNormal,
        Command::ReactivityHigh,
        Command::SecureReset,
        Command::Data,
    ];

    /// The reactivity level selected by this command, if it is a reactivity command.
    pub fn reactivity(self) -> Option<Reactivity> {
        match self {
            Command::ReactivityError => Some(Reactivity::Error),
            Command::ReactivitySecure => Some(Reactivity::Secure),
            Command::ReactivityNormal => Some(Reactivity::Normal),
            Command::ReactivityHigh => Some(Reactivity::High),
            _ => None,
        }
    }

    /// The command that selects `level`.
    pub fn for_reactivity(level: Reactivity) -> Command {
        match level {
            Reactivity::Error => Command::ReactivityError,
            Reactivity::Secure => Command::ReactivitySecure,
            Reactivity::Normal => Command::ReactivityNormal,
            Reactivity::High => Command::ReactivityHigh,
        }
    }

    /// Returns `true` for commands that run a hardware lifecycle sequence.
    pub fn is_lifecycle(self) -> bool {
        matches!(self, Command::Start | Command::Stop)
    }
}

impl TryFrom<u8> for Command {
    type Error = crate::protocol::codec::ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Command::ALL
            .get(usize::from(value))
            .copied()
            .ok_or(crate::protocol::codec::ProtocolError::UnknownCommand(value))
    }
}

// ── Telemetry snapshot ────────────────────────────────────────────────────────

/// DATA reply: the seat state plus the telemetry extras read from the
/// hardware monitor.
///
/// On the wire the [`SeatState`] fields are flattened into the top-level JSON
/// object alongside the extras.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatPayload {
    #[serde(flatten)]
    pub seat: SeatState,
    /// Free-text description of the hardware's overall state.
    pub overall_state: String,
    /// Free-text description of the motion stream mode.
    pub stream_mode: String,
    /// Load-cell weight readings, one per sensor.
    #[serde(default)]
    pub weights: Vec<f32>,
    /// Whether the hardware monitor answered the status request.
    pub hardware_connected: bool,
}

impl SeatPayload {
    /// Builds a payload for `seat` when no telemetry is available.
    pub fn without_telemetry(seat: SeatState) -> Self {
        Self {
            seat,
            overall_state: UNKNOWN_DESCRIPTION.to_string(),
            stream_mode: UNKNOWN_DESCRIPTION.to_string(),
            weights: Vec::new(),
            hardware_connected: false,
        }
    }

    /// Returns a copy that JSON can carry: non-finite weights are dropped and
    /// non-finite seat values become `0.0`.
    pub fn finite(&self) -> Self {
        let or_zero = |v: f32| if v.is_finite() { v } else { 0.0 };
        let mut payload = self.clone();
        payload.weights.retain(|w| w.is_finite());
        let seat = &mut payload.seat;
        seat.intensity = or_zero(seat.intensity);
        seat.targets.pitch = or_zero(seat.targets.pitch);
        seat.targets.roll = or_zero(seat.targets.roll);
        seat.targets.acceleration = or_zero(seat.targets.acceleration);
        seat.targets.velocity = or_zero(seat.targets.velocity);
        payload
    }

    /// Shorthand for `self.seat.status`.
    pub fn status(&self) -> SeatStatus {
        self.seat.status
    }
}
