//! Simulated seat driver.

use tracing::trace;

use super::{InjectedFailure, SimulatedRig};
use crate::application::seat_lifecycle::{DriverFault, LifecycleStep, SeatDriver, StaticSeatConfig};

/// A [`SeatDriver`] backed by a [`SimulatedRig`].
///
/// Every call is recorded on the rig.  A call with an injected failure
/// returns it and leaves the rig unchanged; otherwise the rig moves to the
/// state the real hardware would be in and the call returns `0`.
pub struct SimulatedSeatDriver {
    rig: SimulatedRig,
}

impl SimulatedSeatDriver {
    pub fn new(rig: SimulatedRig) -> Self {
        Self { rig }
    }

    fn call(&mut self, step: LifecycleStep) -> Result<i32, DriverFault> {
        let mut rig = self.rig.lock();
        rig.calls.push(step);
        trace!("simulated driver: {step:?}");

        match rig.failures.get(&step) {
            Some(InjectedFailure::Code(code)) => return Ok(*code),
            Some(InjectedFailure::Fault(reason)) => return Err(DriverFault(reason.clone())),
            None => {}
        }

        match step {
            LifecycleStep::Initialize => rig.initialized = true,
            LifecycleStep::Open => rig.open = true,
            LifecycleStep::ApplyStaticConfig => {}
            LifecycleStep::Start => rig.streaming = true,
            LifecycleStep::Stop => rig.streaming = false,
            LifecycleStep::Close => rig.open = false,
            LifecycleStep::Terminate => rig.initialized = false,
        }
        Ok(0)
    }
}

impl SeatDriver for SimulatedSeatDriver {
    fn initialize(&mut self) -> Result<i32, DriverFault> {
        self.call(LifecycleStep::Initialize)
    }

    fn open(&mut self) -> Result<i32, DriverFault> {
        self.call(LifecycleStep::Open)
    }

    fn apply_static_config(&mut self, config: &StaticSeatConfig) -> Result<i32, DriverFault> {
        trace!(
            "simulated driver: limits pitch {}° roll {}°",
            config.max_pitch_deg,
            config.max_roll_deg
        );
        self.call(LifecycleStep::ApplyStaticConfig)
    }

    fn start(&mut self) -> Result<i32, DriverFault> {
        self.call(LifecycleStep::Start)
    }

    fn stop(&mut self) -> Result<i32, DriverFault> {
        self.call(LifecycleStep::Stop)
    }

    fn close(&mut self) -> Result<i32, DriverFault> {
        self.call(LifecycleStep::Close)
    }

    fn terminate(&mut self) -> Result<i32, DriverFault> {
        self.call(LifecycleStep::Terminate)
    }
}
