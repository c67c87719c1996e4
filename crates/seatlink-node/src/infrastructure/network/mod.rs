//! Network infrastructure: the peer command link.
//!
//! # Sub-modules
//!
//! - **`endpoint`** – [`ConnectionEndpoint`], one line-oriented TCP connection
//!   with serialised reads and writes, generation tracking and a watchdog liveness check.
//!
//! - **`listener`** – [`ListenerEndpoint`], the server role.  Accepts the
//!   peer that wants to drive this node's seat.
//!
//! - **`client`** – [`ClientEndpoint`], the client role.  Connects to the
//!   peer's listener when this node drives the peer's seat, reconnecting
//!   automatically after a loss.
//!
//! Every node runs both roles, so two nodes are linked by two independent
//! TCP connections, one in each direction.

pub mod client;
pub mod endpoint;
pub mod listener;

use std::net::SocketAddr;

use thiserror::Error;
use tokio::sync::watch;

pub use client::{ClientConfig, ClientEndpoint, ClientEvent, ClientState};
pub use endpoint::{ConnectionEndpoint, Generation, LinkState};
pub use listener::{ListenerConfig, ListenerEndpoint, ListenerEvent, ListenerState};

/// Why a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The peer closed the socket or an I/O error occurred.
    Lost,
    /// A newer peer connected and took over the listener.
    Replaced,
}

/// Errors from the network layer.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("failed to bind {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Resolves once `signal` is raised or its sender is dropped.
///
/// The `watch::Ref` yielded by `wait_for` is not `Send`, so it is released
/// here rather than inside a `select!` of a spawned task.
pub(crate) async fn raised(signal: &mut watch::Receiver<bool>) {
    let _ = signal.wait_for(|raised| *raised).await;
}
