//! ConnectionEndpoint: the socket primitive shared by the listener and client roles.
//!
//! An endpoint owns at most one TCP connection at a time.  The connection is
//! split into a read half and a write half, each behind its own async mutex,
//! so one read and one write can be in flight together while two reads (or
//! two writes) never race.  A call that finds its half already busy gives up
//! immediately instead of queueing.
//!
//! # Generations
//!
//! Every [`attach`](ConnectionEndpoint::attach) hands out a new
//! [`Generation`].  The current generation and whether it is still alive are
//! published on a `watch` channel ([`LinkState`]).  In-flight reads and writes
//! select on that channel, so closing or replacing the connection cancels them
//! promptly.  The owning listener/client supervisor watches the same channel
//! to learn that a connection was lost.
//!
//! No method here returns an I/O error: failures mark the generation lost and
//! the call returns an empty line or `0` bytes.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio::time;
use tracing::{debug, info, warn};

/// Longest line accepted from a peer, terminator included.  A peer that
/// exceeds it is disconnected.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Identifies one connection attached to an endpoint.
pub type Generation = u64;

/// Published state of the endpoint's current connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkState {
    pub generation: Generation,
    pub connected: bool,
    pub peer: Option<SocketAddr>,
}

impl LinkState {
    /// Returns `true` if `generation` is the live connection.
    pub fn is_current(&self, generation: Generation) -> bool {
        self.connected && self.generation == generation
    }
}

struct ReadSlot {
    generation: Generation,
    half: BufReader<OwnedReadHalf>,
    /// Bytes of a line that has not been terminated yet.
    pending: Vec<u8>,
}

struct WriteSlot {
    generation: Generation,
    half: OwnedWriteHalf,
}

enum ReadOutcome {
    Read(io::Result<usize>),
    TimedOut,
    Cancelled,
}

/// One side of a line-oriented TCP connection.
pub struct ConnectionEndpoint {
    name: &'static str,
    link: watch::Sender<LinkState>,
    reader: Mutex<Option<ReadSlot>>,
    writer: Mutex<Option<WriteSlot>>,
}

impl ConnectionEndpoint {
    /// Creates a disconnected endpoint.  `name` is used in log messages.
    pub fn new(name: &'static str) -> Self {
        let (link, _) = watch::channel(LinkState::default());
        Self {
            name,
            link,
            reader: Mutex::new(None),
            writer: Mutex::new(None),
        }
    }

    /// Snapshot of the current link state.
    pub fn link_state(&self) -> LinkState {
        *self.link.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.link.borrow().connected
    }

    /// Subscribes to link state changes.
    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.link.subscribe()
    }

    /// Adopts `stream` as the endpoint's connection and returns its generation.
    ///
    /// Any previous connection is invalidated; reads and writes still running
    /// against it are cancelled before the new halves are installed.
    pub async fn attach(&self, stream: TcpStream) -> Generation {
        let peer = stream.peer_addr().ok();
        if let Err(e) = stream.set_nodelay(true) {
            debug!("{}: could not disable Nagle: {e}", self.name);
        }
        let (read_half, write_half) = stream.into_split();

        let mut generation = 0;
        self.link.send_modify(|link| {
            link.generation += 1;
            link.connected = true;
            link.peer = peer;
            generation = link.generation;
        });

        *self.reader.lock().await = Some(ReadSlot {
            generation,
            half: BufReader::new(read_half),
            pending: Vec::new(),
        });
        *self.writer.lock().await = Some(WriteSlot {
            generation,
            half: write_half,
        });

        info!(
            "{}: connection {generation} attached (peer {})",
            self.name,
            peer.map_or_else(|| "unknown".to_string(), |p| p.to_string())
        );
        generation
    }

    /// Closes the current connection, if any, and cancels in-flight I/O.
    ///
    /// Returns the generation that was live, or `None` if nothing was connected.
    pub fn close(&self) -> Option<Generation> {
        let mut closed = None;
        self.link.send_modify(|link| {
            if link.connected {
                closed = Some(link.generation);
            }
            link.generation += 1;
            link.connected = false;
            link.peer = None;
        });

        // Halves held by an in-flight call are dropped by that call once it
        // observes the new generation.
        if let Ok(mut reader) = self.reader.try_lock() {
            *reader = None;
        }
        if let Ok(mut writer) = self.writer.try_lock() {
            *writer = None;
        }

        if let Some(generation) = closed {
            debug!("{}: connection {generation} closed", self.name);
        }
        closed
    }

    /// Marks `generation` as lost.  Returns `true` if it was the live connection.
    fn mark_lost(&self, generation: Generation) -> bool {
        self.link.send_if_modified(|link| {
            if link.is_current(generation) {
                link.connected = false;
                true
            } else {
                false
            }
        })
    }

    /// Resolves once `generation` is no longer the live connection.
    pub async fn lost(&self, generation: Generation) {
        // The sender lives as long as `self`, so this only returns once the
        // generation is gone.
        superseded(&mut self.link.subscribe(), generation).await;
    }

    /// Sends `message` followed by a newline.
    ///
    /// Returns the number of bytes written, or `0` when not connected, when
    /// another write is in progress, or when the write fails.  A failed write
    /// marks the connection lost.
    pub async fn send_line(&self, message: &str) -> usize {
        let mut link = self.link.subscribe();
        let Ok(mut guard) = self.writer.try_lock() else {
            debug!("{}: write already in progress; dropping frame", self.name);
            return 0;
        };
        let current = *link.borrow_and_update();
        let writer = match guard.as_mut() {
            Some(slot) if current.is_current(slot.generation) => slot,
            _ => {
                *guard = None;
                return 0;
            }
        };
        let generation = writer.generation;

        let mut frame = String::with_capacity(message.len() + 1);
        frame.push_str(message);
        if !frame.ends_with('\n') {
            frame.push('\n');
        }

        let outcome = tokio::select! {
            res = write_frame(&mut writer.half, frame.as_bytes()) => Some(res),
            _ = superseded(&mut link, generation) => None,
        };

        match outcome {
            Some(Ok(())) => frame.len(),
            Some(Err(e)) => {
                warn!("{}: write on connection {generation} failed: {e}", self.name);
                *guard = None;
                self.mark_lost(generation);
                0
            }
            None => {
                *guard = None;
                0
            }
        }
    }

    /// Reads one line, waiting at most `timeout`.
    ///
    /// Returns the line without its terminator, or an empty string on timeout,
    /// when not connected, when another read is in progress, or when the peer
    /// disconnects.  Bytes of a line interrupted by the timeout are kept and
    /// completed by the next call.
    pub async fn read_line(&self, timeout: Duration) -> String {
        let mut link = self.link.subscribe();
        let Ok(mut guard) = self.reader.try_lock() else {
            debug!("{}: read already in progress", self.name);
            return String::new();
        };
        let current = *link.borrow_and_update();
        let reader = match guard.as_mut() {
            Some(slot) if current.is_current(slot.generation) => slot,
            _ => {
                *guard = None;
                return String::new();
            }
        };
        let generation = reader.generation;

        // `read_until` is cancel safe: a timeout leaves partial bytes in `pending`.
        // `pending` never reaches the cap between calls, so the budget is positive.
        let budget = MAX_LINE_BYTES.saturating_sub(reader.pending.len()) as u64;
        let mut bounded = (&mut reader.half).take(budget);
        let outcome = tokio::select! {
            res = time::timeout(timeout, bounded.read_until(b'\n', &mut reader.pending)) => {
                match res {
                    Ok(read) => ReadOutcome::Read(read),
                    Err(_) => ReadOutcome::TimedOut,
                }
            }
            _ = superseded(&mut link, generation) => ReadOutcome::Cancelled,
        };

        match outcome {
            ReadOutcome::TimedOut => String::new(),
            ReadOutcome::Cancelled => {
                *guard = None;
                String::new()
            }
            ReadOutcome::Read(Ok(0)) => {
                debug!("{}: peer closed connection {generation}", self.name);
                *guard = None;
                self.mark_lost(generation);
                String::new()
            }
            ReadOutcome::Read(Ok(_))
                if reader.pending.len() >= MAX_LINE_BYTES
                    && reader.pending.last() != Some(&b'\n') =>
            {
                warn!(
                    "{}: line on connection {generation} exceeds {MAX_LINE_BYTES} bytes; dropping peer",
                    self.name
                );
                *guard = None;
                self.mark_lost(generation);
                String::new()
            }
            ReadOutcome::Read(Ok(_)) if reader.pending.last() != Some(&b'\n') => {
                // EOF in the middle of a line; the next read reports the loss.
                String::new()
            }
            ReadOutcome::Read(Ok(_)) => {
                let raw = std::mem::take(&mut reader.pending);
                let line = String::from_utf8_lossy(&raw);
                line.trim_end_matches(['\n', '\r']).to_string()
            }
            ReadOutcome::Read(Err(e)) => {
                warn!("{}: read on connection {generation} failed: {e}", self.name);
                *guard = None;
                self.mark_lost(generation);
                String::new()
            }
        }
    }

    /// Watchdog check for `generation`.
    ///
    /// The protocol has no heartbeat, so liveness is inferred from the socket:
    /// a socket that is readable with zero bytes available has been closed by
    /// the peer.  Returns `false` (and marks the connection lost) in that case
    /// or on a socket error.  A read in progress counts as alive; the read
    /// itself reports a closed socket.
    pub async fn check_alive(&self, generation: Generation) -> bool {
        if !self.link.borrow().is_current(generation) {
            return false;
        }
        let Ok(mut guard) = self.reader.try_lock() else {
            return true;
        };
        let Some(reader) = guard.as_mut().filter(|slot| slot.generation == generation) else {
            // Halves not installed yet.
            return true;
        };
        if !reader.half.buffer().is_empty() {
            return true;
        }

        let mut scratch = [0u8; 1];
        let closed = match time::timeout(Duration::ZERO, reader.half.get_mut().peek(&mut scratch))
            .await
        {
            Ok(Ok(0)) => true,
            Ok(Err(e)) => {
                debug!("{}: watchdog socket error on {generation}: {e}", self.name);
                true
            }
            Ok(Ok(_)) | Err(_) => false,
        };

        if closed {
            *guard = None;
            self.mark_lost(generation);
        }
        !closed
    }
}

/// Resolves once `generation` is no longer the live connection on `link`.
async fn superseded(link: &mut watch::Receiver<LinkState>, generation: Generation) {
    let _ = link.wait_for(|l| !l.is_current(generation)).await;
}

async fn write_frame(half: &mut OwnedWriteHalf, bytes: &[u8]) -> io::Result<()> {
    half.write_all(bytes).await?;
    half.flush().await
}

// ── Tests ─────────────────────────────────────────────────────────────────────
