//! Hardware adapters.
//!
//! The vendor seat library is not linked into this crate.  The adapters here
//! simulate a seat rig so a node can run end to end (and be tested) without
//! hardware:
//!
//! - **`simulated_driver`** – [`SimulatedSeatDriver`], a [`SeatDriver`] that
//!   moves a simulated rig through its power states, records every call, and
//!   can be told to fail a step.
//! - **`simulated_monitor`** – [`SimulatedMonitor`], a [`MonitoringProtocol`]
//!   that renders the rig as a `key=value;…` status document.
//!
//! Both share one [`SimulatedRig`] so the monitor reports what the driver did.
//!
//! [`SeatDriver`]: crate::application::seat_lifecycle::SeatDriver
//! [`MonitoringProtocol`]: crate::application::telemetry::MonitoringProtocol

pub mod simulated_driver;
pub mod simulated_monitor;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::application::seat_lifecycle::LifecycleStep;

pub use simulated_driver::SimulatedSeatDriver;
pub use simulated_monitor::SimulatedMonitor;

/// How a simulated step should misbehave.
#[derive(Debug, Clone, PartialEq)]
pub enum InjectedFailure {
    /// The step returns this non-zero status code.
    Code(i32),
    /// The step cannot be called at all.
    Fault(String),
}

#[derive(Debug)]
pub(crate) struct RigState {
    pub(crate) initialized: bool,
    pub(crate) open: bool,
    pub(crate) streaming: bool,
    pub(crate) monitor_online: bool,
    pub(crate) weights: Vec<f32>,
    pub(crate) calls: Vec<LifecycleStep>,
    pub(crate) failures: HashMap<LifecycleStep, InjectedFailure>,
}

impl Default for RigState {
    fn default() -> Self {
        Self {
            initialized: false,
            open: false,
            streaming: false,
            monitor_online: true,
            weights: vec![0.0; 4],
            calls: Vec::new(),
            failures: HashMap::new(),
        }
    }
}

/// Shared state of one simulated seat rig.
#[derive(Debug, Clone, Default)]
pub struct SimulatedRig(Arc<Mutex<RigState>>);

impl SimulatedRig {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, RigState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every future call of `step` fail with `failure`.
    pub fn inject_failure(&self, step: LifecycleStep, failure: InjectedFailure) {
        self.lock().failures.insert(step, failure);
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Driver calls made so far, in order.
    pub fn calls(&self) -> Vec<LifecycleStep> {
        self.lock().calls.clone()
    }

    /// Takes the monitoring interface on- or offline.
    pub fn set_monitor_online(&self, online: bool) {
        self.lock().monitor_online = online;
    }

    /// Sets the load-cell readings the monitor reports.
    pub fn set_weights(&self, weights: Vec<f32>) {
        self.lock().weights = weights;
    }

    pub fn is_streaming(&self) -> bool {
        self.lock().streaming
    }
}
