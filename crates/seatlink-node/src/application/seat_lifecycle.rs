//! Use case: bring the seat hardware up and tear it down.
//!
//! # Sequences (for beginners)
//!
//! The seat hardware is driven through a small vendor API that must be called
//! in a fixed order.  Each call returns an integer status code where `0` means
//! success.  After every call the hardware needs time to settle before the
//! next one, so the use case sleeps for a configured delay between steps.
//!
//! ```text
//! START:  initialize → open → apply static config → start
//!         Unknown    → Stopped → Initialising → Initialising → Playing
//!
//! STOP:   (motion off, targets to zero) → stop → close → terminate
//!         Playing → Shutdown → Stopped → Unknown
//! ```
//!
//! A non-zero code halts the sequence at the status that step reached and the
//! code is kept in [`SeatState::error_code`].  With `debug_bypass` enabled the
//! code is still recorded but the sequence carries on, which lets the
//! controller run against a rig with a missing or misbehaving sensor.
//!
//! The driver is injected through the [`SeatDriver`] trait so the sequencing
//! can be tested without hardware.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use seatlink_core::{Reactivity, SeatState, SeatStatus};
use thiserror::Error;
use tokio::time;
use tracing::{debug, error, info, warn};

// ── Shared seat state ─────────────────────────────────────────────────────────

/// The seat state shared between the lifecycle, command handling, and the
/// telemetry builder.
///
/// Only ever locked for short, synchronous updates; never held across `.await`.
#[derive(Debug, Clone, Default)]
pub struct SharedSeat(Arc<Mutex<SeatState>>);

impl SharedSeat {
    pub fn new(state: SeatState) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    /// Returns a copy of the current state.
    pub fn read(&self) -> SeatState {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Applies `f` to the state under the lock.
    pub fn update<R>(&self, f: impl FnOnce(&mut SeatState) -> R) -> R {
        let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }
}

// ── Driver abstraction ────────────────────────────────────────────────────────

/// The driver call could not be made at all (library missing, device gone).
///
/// This is different from a non-zero status code, which is the hardware
/// answering that it refused the request.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("seat driver fault: {0}")]
pub struct DriverFault(pub String);

/// Static configuration pushed to the hardware during bring-up.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticSeatConfig {
    pub intensity: f32,
    pub reactivity: Reactivity,
    /// Mechanical pitch limit in degrees.
    pub max_pitch_deg: f32,
    /// Mechanical roll limit in degrees.
    pub max_roll_deg: f32,
}

impl Default for StaticSeatConfig {
    fn default() -> Self {
        Self {
            intensity: 1.0,
            reactivity: Reactivity::Secure,
            max_pitch_deg: 15.0,
            max_roll_deg: 15.0,
        }
    }
}

/// Abstraction over the vendor seat API.
///
/// Every call returns the hardware status code (`0` = success).
#[cfg_attr(test, mockall::automock)]
pub trait SeatDriver: Send {
    fn initialize(&mut self) -> Result<i32, DriverFault>;
    fn open(&mut self) -> Result<i32, DriverFault>;
    fn apply_static_config(&mut self, config: &StaticSeatConfig) -> Result<i32, DriverFault>;
    fn start(&mut self) -> Result<i32, DriverFault>;
    fn stop(&mut self) -> Result<i32, DriverFault>;
    fn close(&mut self) -> Result<i32, DriverFault>;
    fn terminate(&mut self) -> Result<i32, DriverFault>;
}

// ── Steps and timings ─────────────────────────────────────────────────────────

/// One driver call in the start or stop sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleStep {
    Initialize,
    Open,
    ApplyStaticConfig,
    Start,
    Stop,
    Close,
    Terminate,
}

impl LifecycleStep {
    /// The seat status once this step has been executed.
    pub fn reached(self) -> SeatStatus {
        match self {
            LifecycleStep::Initialize => SeatStatus::Stopped,
            LifecycleStep::Open | LifecycleStep::ApplyStaticConfig => SeatStatus::Initialising,
            LifecycleStep::Start => SeatStatus::Playing,
            LifecycleStep::Stop => SeatStatus::Shutdown,
            LifecycleStep::Close => SeatStatus::Stopped,
            LifecycleStep::Terminate => SeatStatus::Unknown,
        }
    }
}

/// Settle delays observed after each step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettleTimings {
    pub initialize: Duration,
    pub open: Duration,
    pub apply_config: Duration,
    pub start: Duration,
    pub stop: Duration,
    pub close: Duration,
    pub terminate: Duration,
    /// Wait after disabling motion, before zeroing targets.
    pub motion_disable: Duration,
    /// Wait after zeroing targets, before the first stop call.
    pub targets_zero: Duration,
}

impl Default for SettleTimings {
    fn default() -> Self {
        Self {
            initialize: Duration::from_millis(1000),
            open: Duration::from_millis(1000),
            apply_config: Duration::from_millis(200),
            start: Duration::from_millis(1000),
            stop: Duration::from_millis(1000),
            close: Duration::from_millis(1000),
            terminate: Duration::from_millis(1000),
            motion_disable: Duration::from_millis(500),
            targets_zero: Duration::from_millis(1000),
        }
    }
}

impl SettleTimings {
    /// Every delay set to `delay`.  Useful for simulators and tests.
    pub fn uniform(delay: Duration) -> Self {
        Self {
            initialize: delay,
            open: delay,
            apply_config: delay,
            start: delay,
            stop: delay,
            close: delay,
            terminate: delay,
            motion_disable: delay,
            targets_zero: delay,
        }
    }

    fn after(&self, step: LifecycleStep) -> Duration {
        match step {
            LifecycleStep::Initialize => self.initialize,
            LifecycleStep::Open => self.open,
            LifecycleStep::ApplyStaticConfig => self.apply_config,
            LifecycleStep::Start => self.start,
            LifecycleStep::Stop => self.stop,
            LifecycleStep::Close => self.close,
            LifecycleStep::Terminate => self.terminate,
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Reasons a start or stop sequence did not complete.
#[derive(Debug, Error, PartialEq)]
pub enum LifecycleError {
    /// The hardware answered a step with a non-zero status code.
    #[error("{step:?} returned hardware error code {code}")]
    Hardware { step: LifecycleStep, code: i32 },

    /// The driver could not be called; the seat is now in `Error`.
    #[error("{step:?} failed: {source}")]
    Fault {
        step: LifecycleStep,
        #[source]
        source: DriverFault,
    },

    /// The sequence is not valid from the current status.
    #[error("cannot {action} a seat in status {status:?}")]
    InvalidState {
        action: &'static str,
        status: SeatStatus,
    },
}

// ── Use case ──────────────────────────────────────────────────────────────────

const START_SEQUENCE: [LifecycleStep; 4] = [
    LifecycleStep::Initialize,
    LifecycleStep::Open,
    LifecycleStep::ApplyStaticConfig,
    LifecycleStep::Start,
];

const STOP_SEQUENCE: [LifecycleStep; 3] = [
    LifecycleStep::Stop,
    LifecycleStep::Close,
    LifecycleStep::Terminate,
];

/// Runs the start and stop sequences against a [`SeatDriver`].
///
/// Callers serialise access (`&mut self`); at most one sequence runs at a time.
pub struct SeatLifecycle {
    driver: Box<dyn SeatDriver>,
    seat: SharedSeat,
    static_config: StaticSeatConfig,
    timings: SettleTimings,
    debug_bypass: bool,
}

impl SeatLifecycle {
    pub fn new(
        driver: Box<dyn SeatDriver>,
        seat: SharedSeat,
        static_config: StaticSeatConfig,
        timings: SettleTimings,
        debug_bypass: bool,
    ) -> Self {
        Self {
            driver,
            seat,
            static_config,
            timings,
            debug_bypass,
        }
    }

    pub fn seat(&self) -> &SharedSeat {
        &self.seat
    }

    /// Runs the bring-up sequence.
    ///
    /// Valid from `Unknown`.  A seat that is already `Playing` is left alone.
    ///
    /// # Errors
    ///
    /// See [`LifecycleError`].
    pub async fn start(&mut self) -> Result<(), LifecycleError> {
        match self.seat.read().status {
            SeatStatus::Playing => {
                debug!("start requested but seat is already playing");
                return Ok(());
            }
            SeatStatus::Unknown => {}
            status => {
                return Err(LifecycleError::InvalidState {
                    action: "start",
                    status,
                })
            }
        }

        info!("starting seat");
        self.seat.update(|s| s.error_code = 0);
        for step in START_SEQUENCE {
            self.run_step(step).await?;
        }
        info!("seat is playing");
        Ok(())
    }

    /// Runs the tear-down sequence.
    ///
    /// If motion is enabled it is disabled and the targets zeroed before the
    /// first driver call.  A seat that is already `Unknown` is left alone.
    ///
    /// # Errors
    ///
    /// See [`LifecycleError`].
    pub async fn stop(&mut self) -> Result<(), LifecycleError> {
        if self.seat.read().status == SeatStatus::Unknown {
            debug!("stop requested but seat is not running");
            return Ok(());
        }

        info!("stopping seat");
        self.seat.update(|s| s.error_code = 0);
        self.bring_to_rest().await;
        for step in STOP_SEQUENCE {
            self.run_step(step).await?;
        }
        info!("seat stopped");
        Ok(())
    }

    /// Disables motion and parks the seat.  Nothing to do if motion is off.
    async fn bring_to_rest(&mut self) {
        let was_enabled = self.seat.update(|s| std::mem::replace(&mut s.motion_enabled, false));
        if !was_enabled {
            return;
        }
        debug!("motion disabled ahead of stop");
        time::sleep(self.timings.motion_disable).await;
        self.seat.update(SeatState::zero_targets);
        time::sleep(self.timings.targets_zero).await;
    }

    async fn run_step(&mut self, step: LifecycleStep) -> Result<(), LifecycleError> {
        let result = match step {
            LifecycleStep::Initialize => self.driver.initialize(),
            LifecycleStep::Open => self.driver.open(),
            LifecycleStep::ApplyStaticConfig => self.driver.apply_static_config(&self.static_config),
            LifecycleStep::Start => self.driver.start(),
            LifecycleStep::Stop => self.driver.stop(),
            LifecycleStep::Close => self.driver.close(),
            LifecycleStep::Terminate => self.driver.terminate(),
        };

        let code = match result {
            Ok(code) => code,
            Err(source) => {
                error!("{step:?}: {source}");
                self.seat.update(|s| s.status = SeatStatus::Error);
                return Err(LifecycleError::Fault { step, source });
            }
        };

        self.seat.update(|s| {
            s.status = step.reached();
            if code != 0 {
                s.error_code = code;
            }
        });
        time::sleep(self.timings.after(step)).await;

        if code != 0 {
            if !self.debug_bypass {
                warn!("{step:?} returned error code {code}; halting in {:?}", step.reached());
                return Err(LifecycleError::Hardware { step, code });
            }
            warn!("{step:?} returned error code {code}; continuing (debug bypass)");
        } else {
            debug!("{step:?} ok");
        }

        if step == LifecycleStep::ApplyStaticConfig {
            let config = self.static_config.clone();
            self.seat.update(|s| {
                s.set_intensity(config.intensity);
                s.reactivity = config.reactivity;
            });
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
