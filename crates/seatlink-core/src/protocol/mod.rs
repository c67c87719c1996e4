//! Protocol module containing the command set, the telemetry payload, and the
//! line codec.

pub mod codec;
pub mod messages;

pub use codec::{decode_command, decode_payload, encode_command, encode_payload, ProtocolError};
pub use messages::*;
