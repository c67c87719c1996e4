//! Use case: assemble the DATA reply from seat state and hardware telemetry.
//!
//! The hardware exposes a monitoring interface that answers a status request
//! with a structured document.  The node only needs three fields out of it,
//! which it picks through [`MonitoringProtocol`].  When the monitor does not
//! answer, the reply still carries the seat state with the telemetry fields
//! set to "unknown".

use async_trait::async_trait;
use seatlink_core::{SeatPayload, SeatState, UNKNOWN_DESCRIPTION};
use tracing::debug;

/// Telemetry fields the node reads from the status document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldId {
    OverallState,
    StreamMode,
    /// Load-cell readings, one float per sensor.
    Weights,
}

/// Read-only access to the hardware monitor.
#[async_trait]
pub trait MonitoringProtocol: Send + Sync {
    /// Requests a fresh status document.  `None` if the monitor is unreachable.
    async fn request_status(&self) -> Option<String>;

    /// Text description of `field` in `document`.
    fn field_description(&self, document: &str, field: FieldId) -> Option<String>;

    /// Numeric values of `field` in `document`.
    fn field_floats(&self, document: &str, field: FieldId) -> Option<Vec<f32>>;
}

/// Builds the payload for `seat`, enriched with whatever telemetry is available.
///
/// Misread sensors (NaN or infinite values) are scrubbed so the payload
/// always survives the wire.
pub async fn build_payload(seat: SeatState, monitor: &dyn MonitoringProtocol) -> SeatPayload {
    let Some(document) = monitor.request_status().await else {
        debug!("hardware monitor did not answer; sending seat state only");
        return SeatPayload::without_telemetry(seat).finite();
    };

    let describe = |field| {
        monitor
            .field_description(&document, field)
            .unwrap_or_else(|| UNKNOWN_DESCRIPTION.to_string())
    };

    SeatPayload {
        overall_state: describe(FieldId::OverallState),
        stream_mode: describe(FieldId::StreamMode),
        weights: monitor
            .field_floats(&document, FieldId::Weights)
            .unwrap_or_default(),
        hardware_connected: true,
        seat,
    }
    .finite()
}

#[cfg(test)]
mod tests {
    use super::*;
    use seatlink_core::SeatStatus;

    /// Monitor double answering from a fixed document.
    struct FixedMonitor {
        document: Option<&'static str>,
    }

    /// Monitor whose load cells misread.
    struct MisreadingMonitor;

    #[async_trait]
    impl MonitoringProtocol for MisreadingMonitor {
        async fn request_status(&self) -> Option<String> {
            Some(String::new())
        }

        fn field_description(&self, _document: &str, _field: FieldId) -> Option<String> {
            None
        }

        fn field_floats(&self, _document: &str, _field: FieldId) -> Option<Vec<f32>> {
            Some(vec![12.0, f32::NAN, f32::INFINITY])
        }
    }

    #[async_trait]
    impl MonitoringProtocol for FixedMonitor {
        async fn request_status(&self) -> Option<String> {
            self.document.map(str::to_string)
        }

        fn field_description(&self, document: &str, field: FieldId) -> Option<String> {
            match field {
                FieldId::OverallState if document.contains("run") => Some("Running".into()),
                FieldId::StreamMode if document.contains("rt") => Some("Realtime".into()),
                _ => None,
            }
        }

        fn field_floats(&self, document: &str, field: FieldId) -> Option<Vec<f32>> {
            (field == FieldId::Weights && document.contains("w")).then(|| vec![10.0, 11.5])
        }
    }

    fn playing_seat() -> SeatState {
        SeatState {
            status: SeatStatus::Playing,
            ..SeatState::default()
        }
    }

    #[tokio::test]
    async fn test_payload_uses_monitor_fields() {
        let monitor = FixedMonitor {
            document: Some("run rt w"),
        };

        let payload = build_payload(playing_seat(), &monitor).await;

        assert!(payload.hardware_connected);
        assert_eq!(payload.overall_state, "Running");
        assert_eq!(payload.stream_mode, "Realtime");
        assert_eq!(payload.weights, vec![10.0, 11.5]);
        assert_eq!(payload.status(), SeatStatus::Playing);
    }

    #[tokio::test]
    async fn test_missing_fields_fall_back_to_unknown() {
        let monitor = FixedMonitor {
            document: Some("run"),
        };

        let payload = build_payload(playing_seat(), &monitor).await;

        assert!(payload.hardware_connected);
        assert_eq!(payload.stream_mode, UNKNOWN_DESCRIPTION);
        assert!(payload.weights.is_empty());
    }

    #[tokio::test]
    async fn test_non_finite_readings_are_dropped_and_payload_decodes() {
        // Arrange
        let mut seat = playing_seat();
        seat.targets.pitch = f32::NAN;

        // Act
        let payload = build_payload(seat, &MisreadingMonitor).await;
        let line = seatlink_core::encode_payload(&payload).unwrap();

        // Assert
        assert_eq!(payload.weights, vec![12.0]);
        assert_eq!(payload.seat.targets.pitch, 0.0);
        assert_eq!(seatlink_core::decode_payload(&line).unwrap(), payload);
    }

    #[tokio::test]
    async fn test_unreachable_monitor_reports_disconnected_hardware() {
        let monitor = FixedMonitor { document: None };

        let payload = build_payload(playing_seat(), &monitor).await;

        assert!(!payload.hardware_connected);
        assert_eq!(payload.overall_state, UNKNOWN_DESCRIPTION);
        assert_eq!(payload.seat, playing_seat());
    }
}
