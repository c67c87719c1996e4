//! Session selector: which seat the controller is currently driving.
//!
//! The UI talks in terms of a numeric *session index*: `-1` means "the seat
//! attached to this machine", `0` means "the seat on the connected peer".
//! Any other index is treated as local so that a bogus value can never cause
//! commands to leave the machine.

use serde::{Deserialize, Serialize};

/// Where commands issued on this node are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Session {
    /// Commands run against the local seat hardware.
    #[default]
    Local,
    /// Commands are forwarded to the peer over the client link.
    Remote,
}

impl Session {
    pub const LOCAL_INDEX: i32 = -1;
    pub const REMOTE_INDEX: i32 = 0;

    /// Maps a session index to a session, coercing unknown indices to `Local`.
    pub fn from_index(index: i32) -> Self {
        match index {
            Self::REMOTE_INDEX => Session::Remote,
            _ => Session::Local,
        }
    }

    /// Returns the numeric index the UI uses for this session.
    pub fn index(self) -> i32 {
        match self {
            Session::Local => Self::LOCAL_INDEX,
            Session::Remote => Self::REMOTE_INDEX,
        }
    }

    pub fn is_remote(self) -> bool {
        self == Session::Remote
    }
}
