//! Simulated hardware monitor.
//!
//! Status documents are flat `key=value` pairs separated by `;`:
//!
//! ```text
//! overall_state=Running;stream_mode=Realtime;weights=12.5,13,11.75,12.25
//! ```

use async_trait::async_trait;

use super::SimulatedRig;
use crate::application::telemetry::{FieldId, MonitoringProtocol};

/// A [`MonitoringProtocol`] that reports the state of a [`SimulatedRig`].
pub struct SimulatedMonitor {
    rig: SimulatedRig,
}

impl SimulatedMonitor {
    pub fn new(rig: SimulatedRig) -> Self {
        Self { rig }
    }
}

fn key(field: FieldId) -> &'static str {
    match field {
        FieldId::OverallState => "overall_state",
        FieldId::StreamMode => "stream_mode",
        FieldId::Weights => "weights",
    }
}

fn lookup(document: &str, field: FieldId) -> Option<&str> {
    let wanted = key(field);
    document
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| k.trim() == wanted)
        .map(|(_, v)| v.trim())
}

#[async_trait]
impl MonitoringProtocol for SimulatedMonitor {
    async fn request_status(&self) -> Option<String> {
        let rig = self.rig.lock();
        if !rig.monitor_online {
            return None;
        }

        let overall = match (rig.initialized, rig.streaming) {
            (_, true) => "Running",
            (true, false) => "Idle",
            (false, false) => "Off",
        };
        let mode = if rig.streaming { "Realtime" } else { "Stopped" };
        let weights = rig
            .weights
            .iter()
            .map(f32::to_string)
            .collect::<Vec<_>>()
            .join(",");

        Some(format!(
            "overall_state={overall};stream_mode={mode};weights={weights}"
        ))
    }

    fn field_description(&self, document: &str, field: FieldId) -> Option<String> {
        lookup(document, field)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn field_floats(&self, document: &str, field: FieldId) -> Option<Vec<f32>> {
        let raw = lookup(document, field)?;
        if raw.is_empty() {
            return Some(Vec::new());
        }
        raw.split(',').map(|v| v.trim().parse().ok()).collect()
    }
}
