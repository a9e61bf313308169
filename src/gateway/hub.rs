//! Registry of live stream connections.
//!
//! One entry per session id with an open event stream. The entry owns the
//! outbound frame channel and the cancellation token that in-flight work for
//! that connection listens on. Request/response connections live and die
//! inside a single handler and are never tracked here.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::frames::StreamFrame;

/// Outbound frames buffered per connection before sends start dropping.
const FRAME_BUFFER: usize = 64;

/// Per-connection lifecycle. Authentication happens before registration, so
/// an entry is born `Authenticated` and the `Connecting` step never appears
/// in the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Authenticated,
    Active,
    Draining,
}

struct Connection {
    sender: mpsc::Sender<StreamFrame>,
    state: ConnectionState,
    cancel: CancellationToken,
    /// Distinguishes a connection from its replacement after a reconnect.
    generation: u64,
}

pub struct StreamHub {
    connections: DashMap<String, Connection>,
    next_generation: AtomicU64,
}

impl StreamHub {
    pub fn new() -> Self {
        StreamHub {
            connections: DashMap::new(),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Bind a fresh stream connection to `session_id` and hand back its
    /// outbound frame receiver, the token its work should watch, and the
    /// connection's generation stamp.
    ///
    /// A session has at most one live stream; a reconnect for the same id
    /// supersedes the previous connection, which is drained first.
    pub fn register(
        &self,
        session_id: &str,
    ) -> (mpsc::Receiver<StreamFrame>, CancellationToken, u64) {
        if self.connections.contains_key(session_id) {
            log::info!(
                "[STREAM] Session {} reconnected, superseding previous stream",
                session_id
            );
            self.begin_draining(session_id);
            self.connections.remove(session_id);
        }

        let (tx, rx) = mpsc::channel(FRAME_BUFFER);
        let cancel = CancellationToken::new();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        self.connections.insert(
            session_id.to_string(),
            Connection {
                sender: tx,
                state: ConnectionState::Authenticated,
                cancel: cancel.clone(),
                generation,
            },
        );
        log::info!("[STREAM] Session {} connected", session_id);
        (rx, cancel, generation)
    }

    /// Handshake has been queued; the connection now accepts frames and turns.
    pub fn activate(&self, session_id: &str) {
        if let Some(mut conn) = self.connections.get_mut(session_id) {
            if conn.state == ConnectionState::Authenticated {
                conn.state = ConnectionState::Active;
            }
        }
    }

    pub fn state(&self, session_id: &str) -> Option<ConnectionState> {
        self.connections.get(session_id).map(|c| c.state)
    }

    /// True while the connection accepts new turns.
    pub fn is_live(&self, session_id: &str) -> bool {
        matches!(self.state(session_id), Some(ConnectionState::Active))
    }

    /// Token cancelled when this connection goes away.
    pub fn cancellation(&self, session_id: &str) -> Option<CancellationToken> {
        self.connections.get(session_id).map(|c| c.cancel.clone())
    }

    /// Queue a frame for delivery. Returns false when the frame was not
    /// accepted: no such connection, the connection is draining, or its
    /// buffer is full (the frame is dropped rather than blocking the
    /// producer; chunks of one invocation still leave in production order
    /// because each invocation has a single producer).
    pub fn send(&self, session_id: &str, frame: StreamFrame) -> bool {
        let sender = match self.connections.get(session_id) {
            Some(conn) if conn.state == ConnectionState::Active => conn.sender.clone(),
            Some(_) => {
                log::debug!("[STREAM] Dropping frame for draining session {}", session_id);
                return false;
            }
            None => return false,
        };

        match sender.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::warn!(
                    "[STREAM] Frame buffer full for session {}, dropping frame",
                    session_id
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.begin_draining(session_id);
                false
            }
        }
    }

    /// Stop accepting turns and frames for this connection and tell its
    /// in-flight work to wind down. Already-dispatched invocations keep
    /// writing to the session store; their frames just have nowhere to go.
    pub fn begin_draining(&self, session_id: &str) {
        if let Some(mut conn) = self.connections.get_mut(session_id) {
            if conn.state != ConnectionState::Draining {
                log::info!("[STREAM] Session {} draining", session_id);
                conn.state = ConnectionState::Draining;
            }
            conn.cancel.cancel();
        }
    }

    /// Terminal cleanup once the socket is gone: drain, then drop the entry.
    pub fn connection_closed(&self, session_id: &str) {
        self.begin_draining(session_id);
        if self.connections.remove(session_id).is_some() {
            log::info!("[STREAM] Session {} closed", session_id);
        }
    }

    /// `connection_closed`, but only if the live entry still belongs to
    /// `generation`. A superseded stream body dropping late must not tear
    /// down its replacement.
    pub fn connection_closed_if_current(&self, session_id: &str, generation: u64) {
        if let Some((_, conn)) = self
            .connections
            .remove_if(session_id, |_, c| c.generation == generation)
        {
            conn.cancel.cancel();
            log::info!("[STREAM] Session {} closed", session_id);
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for StreamHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_activate_send() {
        let hub = StreamHub::new();
        let (mut rx, _cancel, _gen) = hub.register("s1");

        assert_eq!(hub.state("s1"), Some(ConnectionState::Authenticated));
        // Not live until the handshake is queued.
        assert!(!hub.is_live("s1"));
        assert!(!hub.send(
            "s1",
            StreamFrame::Progress {
                text: "early".to_string()
            }
        ));

        hub.activate("s1");
        assert!(hub.is_live("s1"));
        assert!(hub.send("s1", StreamFrame::Done));
        assert!(matches!(rx.recv().await, Some(StreamFrame::Done)));
    }

    #[tokio::test]
    async fn test_draining_rejects_frames_and_cancels_work() {
        let hub = StreamHub::new();
        let (_rx, cancel, _gen) = hub.register("s1");
        hub.activate("s1");

        hub.begin_draining("s1");
        assert!(cancel.is_cancelled());
        assert!(!hub.is_live("s1"));
        assert!(!hub.send("s1", StreamFrame::Done));

        hub.connection_closed("s1");
        assert!(hub.state("s1").is_none());
        assert!(hub.is_empty());
    }

    #[tokio::test]
    async fn test_send_to_unknown_session() {
        let hub = StreamHub::new();
        assert!(!hub.send("nobody", StreamFrame::Done));
    }

    #[tokio::test]
    async fn test_reconnect_supersedes_previous_stream() {
        let hub = StreamHub::new();
        let (_rx_old, cancel_old, gen_old) = hub.register("s1");
        hub.activate("s1");

        let (mut rx_new, cancel_new, gen_new) = hub.register("s1");
        hub.activate("s1");

        assert!(cancel_old.is_cancelled());
        assert!(!cancel_new.is_cancelled());
        assert_eq!(hub.len(), 1);

        assert!(hub.send("s1", StreamFrame::Done));
        assert!(matches!(rx_new.recv().await, Some(StreamFrame::Done)));

        // The superseded connection closing late leaves the replacement alone.
        hub.connection_closed_if_current("s1", gen_old);
        assert!(hub.is_live("s1"));
        assert!(!cancel_new.is_cancelled());

        hub.connection_closed_if_current("s1", gen_new);
        assert!(hub.state("s1").is_none());
        assert!(cancel_new.is_cancelled());
    }

    #[tokio::test]
    async fn test_dropped_receiver_triggers_draining() {
        let hub = StreamHub::new();
        let (rx, _cancel, _gen) = hub.register("s1");
        hub.activate("s1");
        drop(rx);

        assert!(!hub.send("s1", StreamFrame::Done));
        assert_eq!(hub.state("s1"), Some(ConnectionState::Draining));
    }
}
