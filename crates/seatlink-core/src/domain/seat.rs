//! Seat state domain entity.
//!
//! A [`SeatState`] is the controller's view of one motion seat: where the
//! hardware lifecycle currently stands, the last hardware error code, and the
//! motion parameters the seat is being driven with.

use serde::{Deserialize, Serialize};

/// Hardware lifecycle status of a seat.
///
/// The bring-up order is `Unknown → Stopped → Initialising → Playing`; the
/// tear-down order is `Playing → Shutdown → Stopped → Unknown`.  `Error` is
/// entered when a driver call fails unexpectedly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    #[default]
    Unknown,
    Stopped,
    Initialising,
    Playing,
    Shutdown,
    Error,
}

impl SeatStatus {
    /// Returns `true` while the seat hardware is powered and streaming motion.
    pub fn is_playing(self) -> bool {
        matches!(self, SeatStatus::Playing)
    }
}

/// How strongly the seat reacts to incoming motion cues.
///
/// `Secure` is the safe fallback level used after a secure reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reactivity {
    Error,
    #[default]
    Secure,
    Normal,
    High,
}

/// Motion targets the seat is currently being driven towards.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionTargets {
    /// Pitch angle in degrees.
    pub pitch: f32,
    /// Roll angle in degrees.
    pub roll: f32,
    /// Acceleration target.
    pub acceleration: f32,
    /// Velocity target.
    pub velocity: f32,
}

impl MotionTargets {
    /// Targets that hold the seat level and at rest.
    pub const REST: MotionTargets = MotionTargets {
        pitch: 0.0,
        roll: 0.0,
        acceleration: 0.0,
        velocity: 0.0,
    };

    /// Returns `true` when every target is zero.
    pub fn is_at_rest(&self) -> bool {
        *self == Self::REST
    }
}

/// The full controller-side state of one seat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatState {
    pub status: SeatStatus,
    /// Last non-zero hardware error code, or 0.
    pub error_code: i32,
    pub motion_enabled: bool,
    pub reactivity: Reactivity,
    /// Motion intensity in `0.0..=1.0`.
    pub intensity: f32,
    pub targets: MotionTargets,
}

impl Default for SeatState {
    fn default() -> Self {
        Self {
            status: SeatStatus::Unknown,
            error_code: 0,
            motion_enabled: false,
            reactivity: Reactivity::Secure,
            intensity: 1.0,
            targets: MotionTargets::REST,
        }
    }
}

impl SeatState {
    /// Drives every motion target back to zero.
    pub fn zero_targets(&mut self) {
        self.targets = MotionTargets::REST;
    }

    /// Applies a secure reset: targets to rest and reactivity to `Secure`.
    pub fn secure_reset(&mut self) {
        self.zero_targets();
        self.reactivity = Reactivity::Secure;
    }

    /// Sets the intensity, clamped into `0.0..=1.0`.  NaN is treated as 0.
    pub fn set_intensity(&mut self, intensity: f32) {
        self.intensity = if intensity.is_nan() {
            0.0
        } else {
            intensity.clamp(0.0, 1.0)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_seat_state_is_unknown_and_at_rest() {
        let state = SeatState::default();
        assert_eq!(state.status, SeatStatus::Unknown);
        assert_eq!(state.error_code, 0);
        assert!(!state.motion_enabled);
        assert!(state.targets.is_at_rest());
    }

    #[test]
    fn test_secure_reset_zeroes_targets_and_sets_secure_reactivity() {
        // Arrange
        let mut state = SeatState {
            reactivity: Reactivity::High,
            targets: MotionTargets {
                pitch: 12.0,
                roll: -4.5,
                acceleration: 0.3,
                velocity: 1.2,
            },
            ..SeatState::default()
        };

        // Act
        state.secure_reset();

        // Assert
        assert!(state.targets.is_at_rest());
        assert_eq!(state.reactivity, Reactivity::Secure);
    }

    #[test]
    fn test_set_intensity_clamps_out_of_range_values() {
        let mut state = SeatState::default();

        state.set_intensity(1.7);
        assert_eq!(state.intensity, 1.0);

        state.set_intensity(-0.2);
        assert_eq!(state.intensity, 0.0);

        state.set_intensity(f32::NAN);
        assert_eq!(state.intensity, 0.0);
    }

    #[test]
    fn test_only_playing_status_reports_is_playing() {
        assert!(SeatStatus::Playing.is_playing());
        assert!(!SeatStatus::Initialising.is_playing());
        assert!(!SeatStatus::Error.is_playing());
    }

    #[test]
    fn test_status_serializes_in_screaming_snake_case() {
        let json = serde_json::to_string(&SeatStatus::Initialising).unwrap();
        assert_eq!(json, "\"INITIALISING\"");
    }
}
