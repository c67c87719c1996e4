//! Infrastructure layer for a SeatLink node.
//!
//! Contains the OS-facing adapters: TCP endpoints for the peer link, TOML
//! configuration storage, the simulated seat hardware, and the assembly of a
//! running node.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `seatlink_core`, but MUST NOT be imported by the `application` layer.

pub mod hardware;
pub mod network;
pub mod node;
pub mod storage;
