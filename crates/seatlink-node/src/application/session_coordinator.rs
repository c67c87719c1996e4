//! Use case: decide who owns the seat and route every command accordingly.
//!
//! # Sessions and authority (for beginners)
//!
//! Each node drives one seat and can also drive the seat of its peer.  The
//! active [`Session`] decides where a command issued on this node goes:
//!
//! - **Local**: the command is executed against the local seat.
//! - **Remote**: the command is encoded as one digit and sent to the peer,
//!   which executes it against *its* local seat.
//!
//! A command that *arrives* from the peer means the peer operator wants to
//! drive this seat.  Before running it, the coordinator takes local authority
//! back: it switches the session to Local and drops its own client link to the
//! peer.  The one exception is DATA, which is a read-only query and is answered
//! without touching the session.
//!
//! # Ordering
//!
//! The authority (session plus lifecycle) lives behind a single async mutex,
//! so a START or STOP sequence runs to completion before any other command
//! touches the seat.  Inbound commands are queued to one worker task in
//! arrival order; DATA queries skip the queue so telemetry keeps flowing
//! while a sequence is running.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use seatlink_core::{
    decode_command, decode_payload, encode_command, encode_payload, Command, SeatPayload, SeatState,
    Session,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use crate::application::seat_lifecycle::{SeatLifecycle, SharedSeat};
use crate::application::telemetry::{build_payload, MonitoringProtocol};

/// Upper bound on buffered lines dropped ahead of one DATA request.
const LATE_REPLY_LIMIT: usize = 8;

// ── Link abstractions ─────────────────────────────────────────────────────────

/// Outbound link to the peer's listener (this node acting as the client).
#[async_trait]
pub trait PeerLink: Send + Sync {
    /// Connects to the peer, resolving once connected.
    ///
    /// Returns `false` if the attempt was abandoned by [`PeerLink::quit`].
    async fn join(&self) -> bool;

    /// Closes the link and stops reconnecting.
    async fn quit(&self);

    /// Sends one line; returns the bytes written, `0` on failure.
    async fn send_line(&self, line: &str) -> usize;

    /// Reads one line; empty on timeout or failure.
    async fn read_line(&self, timeout: Duration) -> String;
}

/// Inbound link from the peer (this node acting as the listener).
#[async_trait]
pub trait InboundLink: Send + Sync {
    /// Starts accepting peers and returns the bound address.
    async fn open(&self) -> io::Result<SocketAddr>;

    /// Waits until a peer is connected.  Returns `false` once the link is closed.
    async fn wait_for_peer(&self) -> bool;

    /// Sends one line; returns the bytes written, `0` on failure.
    async fn send_line(&self, line: &str) -> usize;

    /// Reads one line; empty on timeout or failure.
    async fn read_line(&self, timeout: Duration) -> String;

    /// Stops accepting peers and closes the current connection.
    async fn close(&self);
}

// ── Coordinator ───────────────────────────────────────────────────────────────

/// Timeouts used by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinatorConfig {
    /// How long [`SessionCoordinator::set_session_index`] waits for the peer
    /// link before giving up (the link keeps retrying in the background).
    pub join_timeout: Duration,
    /// How long to wait for a single line, both for DATA replies and inbound reads.
    pub read_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            join_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(1),
        }
    }
}

struct Authority {
    session: Session,
    lifecycle: SeatLifecycle,
}

/// Owns the session, the local seat, and both peer links.
pub struct SessionCoordinator {
    config: CoordinatorConfig,
    authority: tokio::sync::Mutex<Authority>,
    session: watch::Sender<Session>,
    seat: SharedSeat,
    monitor: Arc<dyn MonitoringProtocol>,
    peer: Arc<dyn PeerLink>,
    inbound: Arc<dyn InboundLink>,
    snapshot: Mutex<Option<SeatPayload>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionCoordinator {
    /// Creates a coordinator in the Local session.
    pub fn new(
        config: CoordinatorConfig,
        lifecycle: SeatLifecycle,
        monitor: Arc<dyn MonitoringProtocol>,
        peer: Arc<dyn PeerLink>,
        inbound: Arc<dyn InboundLink>,
    ) -> Self {
        let seat = lifecycle.seat().clone();
        let (session, _) = watch::channel(Session::Local);
        Self {
            config,
            authority: tokio::sync::Mutex::new(Authority {
                session: Session::Local,
                lifecycle,
            }),
            session,
            seat,
            monitor,
            peer,
            inbound,
            snapshot: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// The active session.
    pub fn session(&self) -> Session {
        *self.session.borrow()
    }

    /// Subscribes to session changes (for a UI).
    pub fn watch_session(&self) -> watch::Receiver<Session> {
        self.session.subscribe()
    }

    /// The current local seat state.
    pub fn local_seat(&self) -> SeatState {
        self.seat.read()
    }

    /// The most recently cached snapshot of the active seat.
    ///
    /// `None` means unknown: no DATA reply has been received from the peer,
    /// or the last request went unanswered.
    pub fn snapshot(&self) -> Option<SeatPayload> {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store_snapshot(&self, payload: Option<SeatPayload>) {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = payload;
    }

    // ── Session selection ──────────────────────────────────────────────────

    /// Selects the session by UI index (`-1` local, `0` remote; anything
    /// else is treated as local).
    ///
    /// Selecting the active session again does nothing.  Otherwise the peer
    /// link is closed and, for Remote, re-joined; the join is bounded by
    /// [`CoordinatorConfig::join_timeout`].  The snapshot is refreshed
    /// afterwards.
    pub async fn set_session_index(&self, index: i32) {
        let requested = Session::from_index(index);
        let mut authority = self.authority.lock().await;
        if authority.session == requested {
            debug!("session {requested:?} already active");
            return;
        }
        self.switch_session(&mut authority, requested).await;
        let payload = self.fetch_payload(requested).await;
        self.store_snapshot(payload);
    }

    async fn switch_session(&self, authority: &mut Authority, session: Session) {
        self.peer.quit().await;
        authority.session = session;
        self.session.send_replace(session);
        info!("session switched to {session:?}");

        if session.is_remote() {
            match time::timeout(self.config.join_timeout, self.peer.join()).await {
                Ok(true) => info!("peer link established"),
                Ok(false) => warn!("peer link was abandoned before connecting"),
                Err(_) => warn!(
                    "peer not reachable within {:?}; still retrying in the background",
                    self.config.join_timeout
                ),
            }
        }
    }

    // ── Outbound commands ──────────────────────────────────────────────────

    /// Issues a command from the local operator.
    ///
    /// In the Local session the command runs here (for START/STOP the call
    /// returns once the sequence has finished).  In the Remote session it is
    /// forwarded to the peer; DATA then waits for the reply and caches it.
    ///
    /// Returns `false` if a remote command could not be sent.
    pub async fn send_command(&self, cmd: Command) -> bool {
        let mut authority = self.authority.lock().await;
        if authority.session == Session::Local {
            self.apply_local(&mut authority, cmd).await;
            return true;
        }
        drop(authority);
        self.forward(cmd).await
    }

    /// Sends the command that inverts the active seat's motion flag.
    pub async fn toggle_motion(&self) -> bool {
        let enabled = match self.session() {
            Session::Local => self.seat.read().motion_enabled,
            Session::Remote => self.snapshot().is_some_and(|p| p.seat.motion_enabled),
        };
        let cmd = if enabled {
            Command::MotionOff
        } else {
            Command::MotionOn
        };
        self.send_command(cmd).await
    }

    /// Re-reads the active seat's state into the cache and returns it.
    pub async fn refresh_snapshot(&self) -> Option<SeatPayload> {
        let payload = self.fetch_payload(self.session()).await;
        self.store_snapshot(payload.clone());
        payload
    }

    async fn forward(&self, cmd: Command) -> bool {
        if cmd == Command::Data {
            self.discard_late_replies().await;
        }
        if self.peer.send_line(encode_command(cmd)).await == 0 {
            warn!("could not forward {cmd:?}: peer link is down");
            if cmd == Command::Data {
                self.store_snapshot(None);
            }
            return false;
        }
        debug!("forwarded {cmd:?} to peer");

        if cmd == Command::Data {
            let payload = self.read_peer_payload().await;
            self.store_snapshot(payload);
        }
        true
    }

    async fn fetch_payload(&self, session: Session) -> Option<SeatPayload> {
        match session {
            Session::Local => Some(self.local_payload().await),
            Session::Remote => {
                self.discard_late_replies().await;
                if self.peer.send_line(encode_command(Command::Data)).await == 0 {
                    return None;
                }
                self.read_peer_payload().await
            }
        }
    }

    /// Drops DATA replies that arrived after an earlier request stopped
    /// waiting, so the next read answers the next request.
    async fn discard_late_replies(&self) {
        for _ in 0..LATE_REPLY_LIMIT {
            if self.peer.read_line(Duration::ZERO).await.is_empty() {
                return;
            }
            debug!("discarding late DATA reply");
        }
    }

    async fn read_peer_payload(&self) -> Option<SeatPayload> {
        let line = self.peer.read_line(self.config.read_timeout).await;
        if line.is_empty() {
            debug!("no DATA reply from peer");
            return None;
        }
        match decode_payload(&line) {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!("discarding DATA reply: {e}");
                None
            }
        }
    }

    async fn local_payload(&self) -> SeatPayload {
        build_payload(self.seat.read(), self.monitor.as_ref()).await
    }

    // ── Inbound commands ───────────────────────────────────────────────────

    /// Executes a command received from the peer.
    ///
    /// `None` (a frame that carried no command) is ignored.  DATA is answered
    /// on the inbound link.  Anything else first takes local authority.
    pub async fn execute_inbound(&self, cmd: Option<Command>) {
        let Some(cmd) = cmd else {
            debug!("ignoring inbound frame without a command");
            return;
        };

        if cmd == Command::Data {
            self.reply_with_payload().await;
            return;
        }

        let mut authority = self.authority.lock().await;
        if authority.session != Session::Local {
            info!("peer issued {cmd:?}; taking local authority");
            self.switch_session(&mut authority, Session::Local).await;
        }
        self.apply_local(&mut authority, cmd).await;
    }

    async fn reply_with_payload(&self) {
        let payload = self.local_payload().await;
        match encode_payload(&payload) {
            Ok(line) => {
                if self.inbound.send_line(&line).await == 0 {
                    debug!("DATA reply not delivered");
                }
            }
            Err(e) => warn!("could not encode DATA reply: {e}"),
        }
    }

    async fn apply_local(&self, authority: &mut Authority, cmd: Command) {
        match cmd {
            Command::Start => {
                if let Err(e) = authority.lifecycle.start().await {
                    warn!("seat start did not complete: {e}");
                }
            }
            Command::Stop => {
                if let Err(e) = authority.lifecycle.stop().await {
                    warn!("seat stop did not complete: {e}");
                }
            }
            Command::MotionOn => self.seat.update(|s| s.motion_enabled = true),
            Command::MotionOff => self.seat.update(|s| s.motion_enabled = false),
            Command::ReactivityError
            | Command::ReactivitySecure
            | Command::ReactivityNormal
            | Command::ReactivityHigh => {
                if let Some(level) = cmd.reactivity() {
                    self.seat.update(|s| s.reactivity = level);
                }
            }
            Command::SecureReset => self.seat.update(SeatState::secure_reset),
            Command::Data => {
                let payload = self.local_payload().await;
                self.store_snapshot(Some(payload));
            }
        }
        debug!("applied {cmd:?} locally");
    }

    // ── Serving ────────────────────────────────────────────────────────────

    /// Opens the inbound link and spawns the inbound reader and the command
    /// worker.  Returns the address peers connect to.
    ///
    /// # Errors
    ///
    /// Fails if the inbound link cannot be opened.
    pub async fn start_serving(self: &Arc<Self>) -> io::Result<SocketAddr> {
        let local_addr = self.inbound.open().await?;
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(Arc::clone(self).read_inbound(queue_tx));
        let worker = tokio::spawn(Arc::clone(self).run_worker(queue_rx));
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend([reader, worker]);
        info!("serving peer commands on {local_addr}");
        Ok(local_addr)
    }

    async fn read_inbound(self: Arc<Self>, queue: mpsc::UnboundedSender<Command>) {
        while self.inbound.wait_for_peer().await {
            let line = self.inbound.read_line(self.config.read_timeout).await;
            if line.is_empty() {
                tokio::task::yield_now().await;
                continue;
            }
            match decode_command(&line) {
                None => {}
                Some(Command::Data) => self.reply_with_payload().await,
                Some(cmd) => {
                    debug!("queued inbound {cmd:?}");
                    if queue.send(cmd).is_err() {
                        break;
                    }
                }
            }
        }
        debug!("inbound reader stopped");
    }

    async fn run_worker(self: Arc<Self>, mut queue: mpsc::UnboundedReceiver<Command>) {
        while let Some(cmd) = queue.recv().await {
            self.execute_inbound(Some(cmd)).await;
        }
        debug!("inbound worker stopped");
    }

    /// Closes both links and waits for the serving tasks.
    ///
    /// A sequence already running is allowed to finish.
    pub async fn shutdown(&self) {
        self.inbound.close().await;
        self.peer.quit().await;
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for task in tasks {
            if let Err(e) = task.await {
                warn!("serving task ended abnormally: {e}");
            }
        }
        info!("coordinator shut down");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::seat_lifecycle::{
        DriverFault, SeatDriver, SettleTimings, StaticSeatConfig,
    };
    use crate::application::telemetry::FieldId;
    use seatlink_core::{Reactivity, SeatStatus};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // ── Test doubles ───────────────────────────────────────────────────────

    /// Driver that accepts every call and counts them.
    #[derive(Default)]
    struct CountingDriver {
        calls: Arc<AtomicUsize>,
    }

    impl CountingDriver {
        fn ok(&mut self) -> Result<i32, DriverFault> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }
    }

    impl SeatDriver for CountingDriver {
        fn initialize(&mut self) -> Result<i32, DriverFault> {
            self.ok()
        }
        fn open(&mut self) -> Result<i32, DriverFault> {
            self.ok()
        }
        fn apply_static_config(&mut self, _: &StaticSeatConfig) -> Result<i32, DriverFault> {
            self.ok()
        }
        fn start(&mut self) -> Result<i32, DriverFault> {
            self.ok()
        }
        fn stop(&mut self) -> Result<i32, DriverFault> {
            self.ok()
        }
        fn close(&mut self) -> Result<i32, DriverFault> {
            self.ok()
        }
        fn terminate(&mut self) -> Result<i32, DriverFault> {
            self.ok()
        }
    }

    struct SilentMonitor;

    #[async_trait]
    impl MonitoringProtocol for SilentMonitor {
        async fn request_status(&self) -> Option<String> {
            None
        }
        fn field_description(&self, _: &str, _: FieldId) -> Option<String> {
            None
        }
        fn field_floats(&self, _: &str, _: FieldId) -> Option<Vec<f32>> {
            None
        }
    }

    /// Peer link that records what it was asked to do.
    #[derive(Default)]
    struct RecordingPeer {
        connected: Mutex<bool>,
        joins: AtomicUsize,
        quits: AtomicUsize,
        sent: Mutex<Vec<String>>,
        /// Answers to requests not made yet.
        replies: Mutex<VecDeque<String>>,
        /// Lines already sitting in the receive buffer.
        arrived: Mutex<VecDeque<String>>,
    }

    #[async_trait]
    impl PeerLink for RecordingPeer {
        async fn join(&self) -> bool {
            self.joins.fetch_add(1, Ordering::SeqCst);
            *self.connected.lock().unwrap() = true;
            true
        }
        async fn quit(&self) {
            self.quits.fetch_add(1, Ordering::SeqCst);
            *self.connected.lock().unwrap() = false;
        }
        async fn send_line(&self, line: &str) -> usize {
            if !*self.connected.lock().unwrap() {
                return 0;
            }
            self.sent.lock().unwrap().push(line.to_string());
            line.len() + 1
        }
        async fn read_line(&self, timeout: Duration) -> String {
            if let Some(line) = self.arrived.lock().unwrap().pop_front() {
                return line;
            }
            if timeout.is_zero() {
                return String::new();
            }
            self.replies.lock().unwrap().pop_front().unwrap_or_default()
        }
    }

    #[derive(Default)]
    struct RecordingInbound {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl InboundLink for RecordingInbound {
        async fn open(&self) -> io::Result<SocketAddr> {
            Ok(SocketAddr::from(([127, 0, 0, 1], 0)))
        }
        async fn wait_for_peer(&self) -> bool {
            false
        }
        async fn send_line(&self, line: &str) -> usize {
            self.sent.lock().unwrap().push(line.to_string());
            line.len() + 1
        }
        async fn read_line(&self, _: Duration) -> String {
            String::new()
        }
        async fn close(&self) {}
    }

    struct Fixture {
        coordinator: SessionCoordinator,
        peer: Arc<RecordingPeer>,
        inbound: Arc<RecordingInbound>,
        driver_calls: Arc<AtomicUsize>,
    }

    fn fixture() -> Fixture {
        let driver = CountingDriver::default();
        let driver_calls = Arc::clone(&driver.calls);
        let lifecycle = SeatLifecycle::new(
            Box::new(driver),
            SharedSeat::default(),
            StaticSeatConfig::default(),
            SettleTimings::default(),
            false,
        );
        let peer = Arc::new(RecordingPeer::default());
        let inbound = Arc::new(RecordingInbound::default());
        let coordinator = SessionCoordinator::new(
            CoordinatorConfig::default(),
            lifecycle,
            Arc::new(SilentMonitor),
            Arc::clone(&peer) as Arc<dyn PeerLink>,
            Arc::clone(&inbound) as Arc<dyn InboundLink>,
        );
        Fixture {
            coordinator,
            peer,
            inbound,
            driver_calls,
        }
    }

    // ── Session selection ──────────────────────────────────────────────────

    #[tokio::test]
    async fn test_new_coordinator_starts_local() {
        let f = fixture();
        assert_eq!(f.coordinator.session(), Session::Local);
    }

    #[tokio::test]
    async fn test_select_remote_joins_peer() {
        let f = fixture();

        f.coordinator.set_session_index(0).await;

        assert_eq!(f.coordinator.session(), Session::Remote);
        assert_eq!(f.peer.joins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_selecting_same_session_twice_touches_no_link() {
        // Arrange
        let f = fixture();
        f.coordinator.set_session_index(0).await;
        let quits = f.peer.quits.load(Ordering::SeqCst);
        let sent = f.peer.sent.lock().unwrap().len();

        // Act
        f.coordinator.set_session_index(0).await;

        // Assert
        assert_eq!(f.peer.joins.load(Ordering::SeqCst), 1);
        assert_eq!(f.peer.quits.load(Ordering::SeqCst), quits);
        assert_eq!(f.peer.sent.lock().unwrap().len(), sent);
    }

    #[tokio::test]
    async fn test_unknown_index_selects_local() {
        let f = fixture();
        f.coordinator.set_session_index(0).await;

        f.coordinator.set_session_index(7).await;

        assert_eq!(f.coordinator.session(), Session::Local);
        assert!(!*f.peer.connected.lock().unwrap());
    }

    #[tokio::test]
    async fn test_selecting_remote_refreshes_snapshot_from_peer() {
        // Arrange
        let f = fixture();
        let remote = SeatPayload::without_telemetry(SeatState {
            status: SeatStatus::Playing,
            ..SeatState::default()
        });
        f.peer
            .replies
            .lock()
            .unwrap()
            .push_back(encode_payload(&remote).unwrap());

        // Act
        f.coordinator.set_session_index(0).await;

        // Assert
        assert_eq!(f.peer.sent.lock().unwrap().as_slice(), ["9"]);
        assert_eq!(f.coordinator.snapshot(), Some(remote));
    }

    #[tokio::test]
    async fn test_late_reply_is_discarded_before_next_data_request() {
        // Arrange: a reply to an earlier, timed-out request is still buffered
        let f = fixture();
        f.coordinator.set_session_index(0).await;
        let stale = SeatPayload::without_telemetry(SeatState {
            status: SeatStatus::Stopped,
            ..SeatState::default()
        });
        let fresh = SeatPayload::without_telemetry(SeatState {
            status: SeatStatus::Playing,
            ..SeatState::default()
        });
        f.peer
            .arrived
            .lock()
            .unwrap()
            .push_back(encode_payload(&stale).unwrap());
        f.peer
            .replies
            .lock()
            .unwrap()
            .push_back(encode_payload(&fresh).unwrap());

        // Act
        let sent = f.coordinator.send_command(Command::Data).await;

        // Assert
        assert!(sent);
        assert_eq!(f.coordinator.snapshot(), Some(fresh));
        assert!(f.peer.arrived.lock().unwrap().is_empty());
    }

    // ── Outbound commands ──────────────────────────────────────────────────

    #[tokio::test]
    async fn test_local_commands_update_local_seat() {
        let f = fixture();

        f.coordinator.send_command(Command::MotionOn).await;
        f.coordinator.send_command(Command::ReactivityHigh).await;

        let seat = f.coordinator.local_seat();
        assert!(seat.motion_enabled);
        assert_eq!(seat.reactivity, Reactivity::High);
        assert!(f.peer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_secure_reset_restores_secure_reactivity() {
        let f = fixture();
        f.coordinator.send_command(Command::ReactivityHigh).await;

        f.coordinator.send_command(Command::SecureReset).await;

        assert_eq!(f.coordinator.local_seat().reactivity, Reactivity::Secure);
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_start_runs_lifecycle() {
        let f = fixture();

        let ok = f.coordinator.send_command(Command::Start).await;

        assert!(ok);
        assert_eq!(f.coordinator.local_seat().status, SeatStatus::Playing);
        assert_eq!(f.driver_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_remote_commands_are_forwarded_as_digits() {
        // Arrange
        let f = fixture();
        f.coordinator.set_session_index(0).await;
        f.peer.sent.lock().unwrap().clear();

        // Act
        f.coordinator.send_command(Command::Start).await;
        f.coordinator.send_command(Command::ReactivityNormal).await;

        // Assert: nothing ran locally
        assert_eq!(f.peer.sent.lock().unwrap().as_slice(), ["0", "6"]);
        assert_eq!(f.driver_calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.coordinator.local_seat().status, SeatStatus::Unknown);
    }

    #[tokio::test]
    async fn test_remote_command_fails_when_peer_link_down() {
        let f = fixture();
        f.coordinator.set_session_index(0).await;
        *f.peer.connected.lock().unwrap() = false;

        let ok = f.coordinator.send_command(Command::MotionOn).await;

        assert!(!ok);
    }

    #[tokio::test]
    async fn test_remote_data_without_reply_leaves_snapshot_unknown() {
        let f = fixture();
        f.coordinator.set_session_index(0).await;

        let ok = f.coordinator.send_command(Command::Data).await;

        assert!(ok);
        assert_eq!(f.coordinator.snapshot(), None);
    }

    #[tokio::test]
    async fn test_toggle_motion_inverts_local_flag() {
        let f = fixture();

        f.coordinator.toggle_motion().await;
        assert!(f.coordinator.local_seat().motion_enabled);

        f.coordinator.toggle_motion().await;
        assert!(!f.coordinator.local_seat().motion_enabled);
    }

    #[tokio::test]
    async fn test_toggle_motion_remote_uses_cached_snapshot() {
        // Arrange: the peer reports motion enabled
        let f = fixture();
        let remote = SeatPayload::without_telemetry(SeatState {
            motion_enabled: true,
            ..SeatState::default()
        });
        f.peer
            .replies
            .lock()
            .unwrap()
            .push_back(encode_payload(&remote).unwrap());
        f.coordinator.set_session_index(0).await;
        f.peer.sent.lock().unwrap().clear();

        // Act
        f.coordinator.toggle_motion().await;

        // Assert
        assert_eq!(f.peer.sent.lock().unwrap().as_slice(), ["3"]);
    }

    // ── Inbound commands ───────────────────────────────────────────────────

    #[tokio::test]
    async fn test_inbound_data_replies_without_changing_session() {
        // Arrange
        let f = fixture();
        f.coordinator.set_session_index(0).await;

        // Act
        f.coordinator.execute_inbound(Some(Command::Data)).await;

        // Assert
        assert_eq!(f.coordinator.session(), Session::Remote);
        let sent = f.inbound.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let reply = decode_payload(&sent[0]).unwrap();
        assert_eq!(reply.status(), SeatStatus::Unknown);
        assert!(!reply.hardware_connected);
    }

    #[tokio::test]
    async fn test_inbound_command_takes_local_authority() {
        // Arrange
        let f = fixture();
        f.coordinator.set_session_index(0).await;

        // Act
        f.coordinator.execute_inbound(Some(Command::MotionOn)).await;

        // Assert
        assert_eq!(f.coordinator.session(), Session::Local);
        assert!(!*f.peer.connected.lock().unwrap());
        assert!(f.coordinator.local_seat().motion_enabled);
    }

    #[tokio::test]
    async fn test_inbound_none_is_ignored() {
        let f = fixture();
        f.coordinator.set_session_index(0).await;

        f.coordinator.execute_inbound(None).await;

        assert_eq!(f.coordinator.session(), Session::Remote);
        assert!(f.inbound.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_inbound_command_is_applied_each_time() {
        let f = fixture();

        f.coordinator.execute_inbound(Some(Command::MotionOn)).await;
        f.coordinator.execute_inbound(Some(Command::MotionOff)).await;
        f.coordinator.execute_inbound(Some(Command::MotionOn)).await;

        assert!(f.coordinator.local_seat().motion_enabled);
    }
}
