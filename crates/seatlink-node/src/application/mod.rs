//! Application layer use cases for a SeatLink node.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (pure types in `seatlink_core`) and the infrastructure (sockets, files,
//! hardware).
//!
//! Use cases in this layer:
//!
//! - **Orchestrate** domain objects to fulfil an operator goal (e.g. "start
//!   the seat", "drive the peer's seat").
//! - **Depend on abstractions** (traits) rather than concrete implementations:
//!   [`seat_lifecycle::SeatDriver`], [`telemetry::MonitoringProtocol`],
//!   [`session_coordinator::PeerLink`] and [`session_coordinator::InboundLink`].
//! - **Contain no OS calls and no socket or file access**.
//!
//! # Sub-modules
//!
//! - **`seat_lifecycle`** – The start/stop sequences against the seat driver,
//!   including settle delays and error-code handling.
//!
//! - **`session_coordinator`** – Holds the active session and routes every
//!   command either to the local seat or over the peer link.
//!
//! - **`telemetry`** – Builds the DATA reply from seat state and monitor fields.

pub mod seat_lifecycle;
pub mod session_coordinator;
pub mod telemetry;
