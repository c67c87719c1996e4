//! Domain entities for SeatLink.
//!
//! This module contains pure data and rules with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! Clean Architecture organises code into concentric layers.  The innermost
//! layer is called the **domain** (or "entities" layer).  Domain code:
//!
//! - Contains the core business rules of the application.
//! - Has **no** imports from OS APIs, network libraries, hardware drivers, or
//!   UI frameworks.
//! - Can be compiled and tested on any platform without any external setup.
//!
//! Code in outer layers (infrastructure, application, UI) depends on the domain,
//! but the domain never depends on them.

/// Seat status, motion state and reactivity levels.
///
/// See [`seat::SeatState`] for the main type.
pub mod seat;

/// Local/remote session selector.
pub mod session;
