//! ListenerEndpoint: accepts the peer's connection on the command port.
//!
//! One supervisor task per open listener owns the accept loop and the
//! watchdog.  Only one peer is served at a time; when a second peer connects
//! the current one is closed and replaced (its `ClientDisconnected` event is
//! emitted before the newcomer's `ClientConnected`).  A peer that disappears
//! is detected by the watchdog or by a failed read/write, after which the
//! listener goes back to waiting for the next peer.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::application::session_coordinator::InboundLink;
use crate::infrastructure::network::endpoint::{ConnectionEndpoint, Generation};
use crate::infrastructure::network::{raised, DisconnectReason, NetworkError};

/// Back-off after a failed `accept` (e.g. out of file descriptors).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerConfig {
    pub bind_addr: SocketAddr,
    /// How often the connected peer's socket is checked for closure.
    pub watchdog_interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Not bound.
    Stopped,
    /// Bound, waiting for a peer.
    Listening,
    /// A peer is connected.
    Connected,
}

/// Events emitted to the application as peers come and go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    ClientConnected {
        peer: SocketAddr,
    },
    ClientDisconnected {
        peer: SocketAddr,
        reason: DisconnectReason,
    },
}

struct Run {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
    local_addr: SocketAddr,
}

/// Server side of the peer link.
pub struct ListenerEndpoint {
    config: ListenerConfig,
    endpoint: Arc<ConnectionEndpoint>,
    state: Arc<watch::Sender<ListenerState>>,
    events: mpsc::UnboundedSender<ListenerEvent>,
    run: Mutex<Option<Run>>,
    local_addr: StdMutex<Option<SocketAddr>>,
}

impl ListenerEndpoint {
    /// Creates a stopped listener and the receiver for its events.
    pub fn new(config: ListenerConfig) -> (Self, mpsc::UnboundedReceiver<ListenerEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ListenerState::Stopped);
        let listener = Self {
            config,
            endpoint: Arc::new(ConnectionEndpoint::new("listener")),
            state: Arc::new(state),
            events,
            run: Mutex::new(None),
            local_addr: StdMutex::new(None),
        };
        (listener, events_rx)
    }

    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    /// Binds the port and starts accepting peers.
    ///
    /// Opening an already open listener returns its address again.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::BindFailed`] if the address cannot be bound.
    pub async fn open_dialog(&self) -> Result<SocketAddr, NetworkError> {
        let mut run = self.run.lock().await;
        if let Some(active) = run.as_ref() {
            if !active.handle.is_finished() {
                return Ok(active.local_addr);
            }
        }

        let addr = self.config.bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| NetworkError::BindFailed { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| NetworkError::BindFailed { addr, source })?;

        let (stop, stop_rx) = watch::channel(false);
        self.state.send_replace(ListenerState::Listening);
        let supervisor = Supervisor {
            endpoint: Arc::clone(&self.endpoint),
            state: Arc::clone(&self.state),
            events: self.events.clone(),
            watchdog_interval: self.config.watchdog_interval,
        };
        let handle = tokio::spawn(supervisor.run(listener, stop_rx));
        *run = Some(Run {
            stop,
            handle,
            local_addr,
        });
        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner) = Some(local_addr);

        info!("listening for peer on {local_addr}");
        Ok(local_addr)
    }

    /// Stops listening and closes the current connection.
    ///
    /// No disconnect event is emitted for a connection closed this way.
    pub async fn close_dialog(&self) {
        let mut run = self.run.lock().await;
        if let Some(active) = run.take() {
            active.stop.send_replace(true);
            if let Err(e) = active.handle.await {
                warn!("listener task ended abnormally: {e}");
            }
            info!("listener on {} closed", active.local_addr);
        }
        self.endpoint.close();
        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.state.send_replace(ListenerState::Stopped);
    }

    /// Waits until a peer is connected.  Returns `false` if the listener is
    /// (or becomes) stopped.
    pub async fn wait_for_peer(&self) -> bool {
        let mut state = self.state.subscribe();
        state
            .wait_for(|s| *s != ListenerState::Listening)
            .await
            .map(|s| *s == ListenerState::Connected)
            .unwrap_or(false)
    }

    pub async fn send_line(&self, message: &str) -> usize {
        self.endpoint.send_line(message).await
    }

    pub async fn read_line(&self, timeout: Duration) -> String {
        self.endpoint.read_line(timeout).await
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl InboundLink for ListenerEndpoint {
    async fn open(&self) -> io::Result<SocketAddr> {
        self.open_dialog().await.map_err(|e| {
            let kind = match &e {
                NetworkError::BindFailed { source, .. } => source.kind(),
            };
            io::Error::new(kind, e)
        })
    }

    async fn wait_for_peer(&self) -> bool {
        ListenerEndpoint::wait_for_peer(self).await
    }

    async fn send_line(&self, line: &str) -> usize {
        ListenerEndpoint::send_line(self, line).await
    }

    async fn read_line(&self, timeout: Duration) -> String {
        ListenerEndpoint::read_line(self, timeout).await
    }

    async fn close(&self) {
        self.close_dialog().await;
    }
}

// ── Supervisor task ───────────────────────────────────────────────────────────

struct Supervisor {
    endpoint: Arc<ConnectionEndpoint>,
    state: Arc<watch::Sender<ListenerState>>,
    events: mpsc::UnboundedSender<ListenerEvent>,
    watchdog_interval: Duration,
}

impl Supervisor {
    async fn run(self, listener: TcpListener, mut stop: watch::Receiver<bool>) {
        let mut active: Option<(Generation, SocketAddr)> = None;
        let mut watchdog = time::interval(self.watchdog_interval);
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut link = self.endpoint.subscribe();

        loop {
            tokio::select! {
                _ = raised(&mut stop) => break,

                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        if let Some((_, previous)) = active.take() {
                            info!("peer {peer} replaces {previous}");
                            self.endpoint.close();
                            self.emit(ListenerEvent::ClientDisconnected {
                                peer: previous,
                                reason: DisconnectReason::Replaced,
                            });
                        }
                        let generation = self.endpoint.attach(stream).await;
                        active = Some((generation, peer));
                        self.state.send_replace(ListenerState::Connected);
                        self.emit(ListenerEvent::ClientConnected { peer });
                        watchdog.reset();
                    }
                    Err(e) => {
                        warn!("accept failed: {e}");
                        time::sleep(ACCEPT_BACKOFF).await;
                    }
                },

                _ = watchdog.tick(), if active.is_some() => {
                    if let Some((generation, _)) = active {
                        self.endpoint.check_alive(generation).await;
                    }
                }

                _ = link.changed() => {}
            }

            if let Some((generation, peer)) = active {
                if !self.endpoint.link_state().is_current(generation) {
                    active = None;
                    self.endpoint.close();
                    self.state.send_replace(ListenerState::Listening);
                    info!("peer {peer} disconnected; waiting for the next one");
                    self.emit(ListenerEvent::ClientDisconnected {
                        peer,
                        reason: DisconnectReason::Lost,
                    });
                }
            }
        }

        self.endpoint.close();
        debug!("listener supervisor stopped");
    }

    fn emit(&self, event: ListenerEvent) {
        if self.events.send(event).is_err() {
            debug!("listener event dropped: no receiver");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
