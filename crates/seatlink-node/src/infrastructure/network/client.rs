//! ClientEndpoint: the connection from this node to the peer's listener.
//!
//! `join_dialog` spawns a supervisor task that keeps trying to connect every
//! `retry_interval` until it succeeds, then watches the connection.  When the
//! connection is lost it emits `Disconnected` and, with `auto_reconnect`,
//! waits `reconnect_delay` before trying again.  `quit_dialog` stops the
//! supervisor and closes the connection without emitting an event.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::application::session_coordinator::PeerLink;
use crate::infrastructure::network::endpoint::{ConnectionEndpoint, Generation};
use crate::infrastructure::network::raised;

/// Failed attempts between two "still trying" log lines.
const RETRY_LOG_EVERY: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// The peer's listener.
    pub remote_addr: SocketAddr,
    /// Pause between connection attempts.
    pub retry_interval: Duration,
    /// How often the connected socket is checked for closure.
    pub watchdog_interval: Duration,
    /// Pause before reconnecting after a lost connection.
    pub reconnect_delay: Duration,
    pub auto_reconnect: bool,
}

impl ClientConfig {
    /// Default timings for connecting to `remote_addr`.
    pub fn new(remote_addr: SocketAddr) -> Self {
        Self {
            remote_addr,
            retry_interval: Duration::from_millis(200),
            watchdog_interval: Duration::from_secs(1),
            reconnect_delay: Duration::from_secs(3),
            auto_reconnect: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Connected { remote: SocketAddr },
    Disconnected { remote: SocketAddr },
}

/// Published by the supervisor.  `connects` counts successful connections so
/// a waiter can tell a fresh connection from one it has already seen.
#[derive(Debug, Clone, Copy)]
struct Progress {
    state: ClientState,
    connects: u64,
}

struct Run {
    quit: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Client side of the peer link.
pub struct ClientEndpoint {
    config: ClientConfig,
    endpoint: Arc<ConnectionEndpoint>,
    progress: Arc<watch::Sender<Progress>>,
    events: mpsc::UnboundedSender<ClientEvent>,
    run: Mutex<Option<Run>>,
}

impl ClientEndpoint {
    pub fn new(config: ClientConfig) -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (progress, _) = watch::channel(Progress {
            state: ClientState::Disconnected,
            connects: 0,
        });
        let client = Self {
            config,
            endpoint: Arc::new(ConnectionEndpoint::new("client")),
            progress: Arc::new(progress),
            events,
            run: Mutex::new(None),
        };
        (client, events_rx)
    }

    pub fn state(&self) -> ClientState {
        self.progress.borrow().state
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.config.remote_addr
    }

    /// Connects to the peer, resolving `true` once connected.
    ///
    /// If a join is already in progress this waits for it instead of starting
    /// a second one.  Resolves `false` if [`quit_dialog`](Self::quit_dialog)
    /// is called first.  There is no built-in timeout; callers bound the wait.
    pub async fn join_dialog(&self) -> bool {
        let mut progress = self.progress.subscribe();
        let (mut quit, seen) = {
            let mut run = self.run.lock().await;
            let current = *progress.borrow_and_update();
            match run.as_ref() {
                Some(active) if !active.handle.is_finished() => {
                    if current.state == ClientState::Connected {
                        return true;
                    }
                    debug!("join already in progress; waiting for it");
                    (active.quit.subscribe(), current.connects)
                }
                _ => {
                    let (quit_tx, quit_rx) = watch::channel(false);
                    self.progress
                        .send_modify(|p| p.state = ClientState::Connecting);
                    let supervisor = Supervisor {
                        config: self.config,
                        endpoint: Arc::clone(&self.endpoint),
                        progress: Arc::clone(&self.progress),
                        events: self.events.clone(),
                    };
                    let handle = tokio::spawn(supervisor.run(quit_rx.clone()));
                    *run = Some(Run {
                        quit: quit_tx,
                        handle,
                    });
                    info!("joining peer at {}", self.config.remote_addr);
                    (quit_rx, current.connects)
                }
            }
        };

        tokio::select! {
            connected = async { progress.wait_for(|p| p.connects > seen).await.is_ok() } => connected,
            _ = raised(&mut quit) => false,
        }
    }

    /// Stops connecting, closes the connection and disables reconnection
    /// until the next [`join_dialog`](Self::join_dialog).
    pub async fn quit_dialog(&self) {
        let mut run = self.run.lock().await;
        if let Some(active) = run.take() {
            active.quit.send_replace(true);
            if let Err(e) = active.handle.await {
                warn!("client task ended abnormally: {e}");
            }
            info!("left peer at {}", self.config.remote_addr);
        }
        self.endpoint.close();
        self.progress
            .send_modify(|p| p.state = ClientState::Disconnected);
    }

    pub async fn send_line(&self, message: &str) -> usize {
        self.endpoint.send_line(message).await
    }

    pub async fn read_line(&self, timeout: Duration) -> String {
        self.endpoint.read_line(timeout).await
    }
}

#[async_trait]
impl PeerLink for ClientEndpoint {
    async fn join(&self) -> bool {
        self.join_dialog().await
    }

    async fn quit(&self) {
        self.quit_dialog().await;
    }

    async fn send_line(&self, line: &str) -> usize {
        ClientEndpoint::send_line(self, line).await
    }

    async fn read_line(&self, timeout: Duration) -> String {
        ClientEndpoint::read_line(self, timeout).await
    }
}

// ── Supervisor task ───────────────────────────────────────────────────────────

struct Supervisor {
    config: ClientConfig,
    endpoint: Arc<ConnectionEndpoint>,
    progress: Arc<watch::Sender<Progress>>,
    events: mpsc::UnboundedSender<ClientEvent>,
}

impl Supervisor {
    async fn run(self, mut quit: watch::Receiver<bool>) {
        let remote = self.config.remote_addr;
        loop {
            self.set_state(ClientState::Connecting);
            let Some(stream) = self.connect(&mut quit).await else {
                break;
            };

            let generation = self.endpoint.attach(stream).await;
            self.progress.send_modify(|p| {
                p.state = ClientState::Connected;
                p.connects += 1;
            });
            info!("connected to peer at {remote}");
            self.emit(ClientEvent::Connected { remote });

            if !self.supervise(generation, &mut quit).await {
                break;
            }

            self.endpoint.close();
            self.set_state(ClientState::Disconnected);
            warn!("lost connection to peer at {remote}");
            self.emit(ClientEvent::Disconnected { remote });

            if !self.config.auto_reconnect {
                break;
            }
            debug!("reconnecting in {:?}", self.config.reconnect_delay);
            tokio::select! {
                _ = raised(&mut quit) => break,
                _ = time::sleep(self.config.reconnect_delay) => {}
            }
        }
        debug!("client supervisor stopped");
    }

    /// Tries to connect until it succeeds or `quit` is signalled.
    async fn connect(&self, quit: &mut watch::Receiver<bool>) -> Option<TcpStream> {
        let remote = self.config.remote_addr;
        let mut attempts: u64 = 0;
        loop {
            tokio::select! {
                _ = raised(quit) => return None,
                connected = TcpStream::connect(remote) => match connected {
                    Ok(stream) => return Some(stream),
                    Err(e) => {
                        attempts += 1;
                        if attempts == 1 || attempts % RETRY_LOG_EVERY == 0 {
                            debug!("connect to {remote} failed (attempt {attempts}): {e}");
                        }
                    }
                },
            }
            tokio::select! {
                _ = raised(quit) => return None,
                _ = time::sleep(self.config.retry_interval) => {}
            }
        }
    }

    /// Watches a live connection.  Returns `true` when it is lost and
    /// `false` when `quit` is signalled.
    async fn supervise(&self, generation: Generation, quit: &mut watch::Receiver<bool>) -> bool {
        let mut watchdog = time::interval(self.config.watchdog_interval);
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);
        watchdog.tick().await;

        loop {
            tokio::select! {
                _ = raised(quit) => return false,
                _ = self.endpoint.lost(generation) => return true,
                _ = watchdog.tick() => {
                    self.endpoint.check_alive(generation).await;
                }
            }
        }
    }

    fn set_state(&self, state: ClientState) {
        self.progress.send_modify(|p| p.state = state);
    }

    fn emit(&self, event: ClientEvent) {
        if self.events.send(event).is_err() {
            debug!("client event dropped: no receiver");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
