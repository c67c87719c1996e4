//! # seatlink-core
//!
//! Shared library for SeatLink containing the command codec, the telemetry
//! payload document, and the seat domain types.
//!
//! This crate is used by every SeatLink node, whether it drives the motion
//! hardware itself or acts as a remote instructor console.  It has zero
//! dependencies on OS APIs, hardware drivers, or network sockets.
//!
//! # Architecture overview (for beginners)
//!
//! SeatLink lets two instances of a motion-seat controller talk to each other
//! over a private TCP link.  One instance sits in the cabin next to the seat
//! hardware; the other is the instructor console.  The console can start and
//! stop the seat, toggle motion, change reactivity, and pull a telemetry
//! snapshot.
//!
//! This crate (`seatlink-core`) is the shared foundation.  It defines:
//!
//! - **`protocol`** – How bytes travel over the network.  A command is a single
//!   ASCII digit followed by a newline; the telemetry snapshot is one line of
//!   compact JSON.
//!
//! - **`domain`** – Pure data with no OS dependencies: the seat's status and
//!   motion state ([`SeatState`]) and the session selector ([`Session`]) that
//!   decides whether commands run locally or are forwarded to the peer.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `seatlink_core::Command` instead of `seatlink_core::protocol::messages::Command`.
pub use domain::seat::{MotionTargets, Reactivity, SeatState, SeatStatus};
pub use domain::session::Session;
pub use protocol::codec::{
    decode_command, decode_payload, encode_command, encode_payload, parse_command, ProtocolError,
};
pub use protocol::messages::{Command, SeatPayload, UNKNOWN_DESCRIPTION};
