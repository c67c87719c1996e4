//! Wires the endpoints, the lifecycle and the coordinator into a running node.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::application::seat_lifecycle::{
    SeatDriver, SeatLifecycle, SettleTimings, SharedSeat, StaticSeatConfig,
};
use crate::application::session_coordinator::{InboundLink, PeerLink, SessionCoordinator};
use crate::application::telemetry::MonitoringProtocol;
use crate::infrastructure::network::{
    ClientEndpoint, ClientEvent, ListenerEndpoint, ListenerEvent,
};
use crate::infrastructure::storage::config::LinkConfig;

/// Everything a node is built from.
pub struct NodeSettings {
    pub link: LinkConfig,
    pub timings: SettleTimings,
    pub seat: StaticSeatConfig,
    pub debug_bypass: bool,
}

/// A running node: listener open, inbound commands being served.
pub struct Node {
    pub coordinator: Arc<SessionCoordinator>,
    pub listener: Arc<ListenerEndpoint>,
    pub client: Arc<ClientEndpoint>,
    /// Address the listener is bound to.
    pub local_addr: SocketAddr,
    event_log: JoinHandle<()>,
}

impl Node {
    /// Builds the node and starts serving peer commands.
    ///
    /// # Errors
    ///
    /// Fails if the listener cannot bind its address.
    pub async fn launch(
        settings: NodeSettings,
        driver: Box<dyn SeatDriver>,
        monitor: Arc<dyn MonitoringProtocol>,
    ) -> io::Result<Self> {
        let (listener, listener_events) = ListenerEndpoint::new(settings.link.listener);
        let (client, client_events) = ClientEndpoint::new(settings.link.client);
        let listener = Arc::new(listener);
        let client = Arc::new(client);

        let lifecycle = SeatLifecycle::new(
            driver,
            SharedSeat::default(),
            settings.seat,
            settings.timings,
            settings.debug_bypass,
        );
        let coordinator = Arc::new(SessionCoordinator::new(
            settings.link.coordinator,
            lifecycle,
            monitor,
            Arc::clone(&client) as Arc<dyn PeerLink>,
            Arc::clone(&listener) as Arc<dyn InboundLink>,
        ));

        let local_addr = coordinator.start_serving().await?;
        let event_log = tokio::spawn(log_link_events(listener_events, client_events));

        Ok(Self {
            coordinator,
            listener,
            client,
            local_addr,
            event_log,
        })
    }

    /// Closes both links and waits for the serving tasks.
    pub async fn shutdown(self) {
        self.coordinator.shutdown().await;
        self.event_log.abort();
        info!("node on {} stopped", self.local_addr);
    }
}

async fn log_link_events(
    mut listener: mpsc::UnboundedReceiver<ListenerEvent>,
    mut client: mpsc::UnboundedReceiver<ClientEvent>,
) {
    loop {
        tokio::select! {
            Some(event) = listener.recv() => match event {
                ListenerEvent::ClientConnected { peer } => info!("inbound peer {peer} connected"),
                ListenerEvent::ClientDisconnected { peer, reason } => {
                    warn!("inbound peer {peer} disconnected ({reason:?})");
                }
            },
            Some(event) = client.recv() => match event {
                ClientEvent::Connected { remote } => info!("outbound link to {remote} up"),
                ClientEvent::Disconnected { remote } => warn!("outbound link to {remote} down"),
            },
            else => break,
        }
    }
}
