//! Per-connection session state and the table that indexes it.
//!
//! A [`ClientSession`] exists from the moment a TCP connection is accepted
//! until it is closed.  It starts nameless; the `HelloBack` message binds it
//! to a screen name from the topology, and only a session in the
//! [`SessionPhase::Ready`] phase takes part in switching and clipboard
//! sharing.

use std::collections::HashMap;
use std::net::SocketAddr;

use edgeshare_core::event::{EventTarget, TimerId};
use edgeshare_core::protocol::{FrameReader, Heartbeat, Message, ProtocolError, MAX_HELLO_LEN};
use edgeshare_core::ClipboardId;
use tracing::trace;
use uuid::Uuid;

use crate::application::events::NewConnection;

/// Error returned by a [`MessageSink`].
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to encode message: {0}")]
    Encode(#[from] ProtocolError),
    #[error("connection is closed")]
    Closed,
}

/// Outbound half of a connection.
///
/// `send` must not block: implementations queue the encoded frame for a
/// writer task.
#[cfg_attr(test, mockall::automock)]
pub trait MessageSink: Send {
    fn send(&mut self, msg: &Message) -> Result<(), SinkError>;
    /// Flushes what was queued and closes the stream.
    fn close(&mut self);
}

/// Handshake progress of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// `Hello` sent, waiting for `HelloBack`.
    AwaitingHello,
    /// Name accepted, `QINF` sent, waiting for `DINF`.
    AwaitingInfo,
    /// Fully connected.
    Ready,
}

pub struct ClientSession {
    pub target: EventTarget,
    pub id: Uuid,
    pub peer: SocketAddr,
    name: Option<String>,
    pub phase: SessionPhase,
    sink: Box<dyn MessageSink>,
    pub reader: FrameReader,
    pub heartbeat: Heartbeat,
    pub heartbeat_timer: Option<TimerId>,
    pub handshake_timer: Option<TimerId>,
    /// Whether the screen holds the current contents of each clipboard.
    clipboard_current: [bool; ClipboardId::COUNT],
}

impl ClientSession {
    /// Wraps an accepted connection.  Until the peer is named, frames are
    /// limited to the size of a hello.
    pub fn new(conn: NewConnection, heartbeat: Heartbeat) -> Self {
        let mut reader = FrameReader::new();
        reader.set_frame_limit(MAX_HELLO_LEN);
        Self {
            target: conn.target,
            id: conn.id,
            peer: conn.peer,
            name: None,
            phase: SessionPhase::AwaitingHello,
            sink: conn.sink,
            reader,
            heartbeat,
            heartbeat_timer: None,
            handshake_timer: None,
            clipboard_current: [false; ClipboardId::COUNT],
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name for logs: the screen name once known, the peer address before.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self.peer.to_string(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.phase == SessionPhase::Ready
    }

    pub fn send(&mut self, msg: &Message) -> Result<(), SinkError> {
        trace!(screen = %self.label(), msg = %msg.name(), "send");
        self.sink.send(msg)
    }

    pub fn close(&mut self) {
        self.sink.close();
    }

    pub fn is_clipboard_current(&self, id: ClipboardId) -> bool {
        self.clipboard_current[id.index()]
    }

    pub fn set_clipboard_current(&mut self, id: ClipboardId, current: bool) {
        self.clipboard_current[id.index()] = current;
    }
}

/// Sessions indexed by event target and by bound screen name.
#[derive(Default)]
pub struct SessionTable {
    sessions: HashMap<EventTarget, ClientSession>,
    names: HashMap<String, EventTarget>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, session: ClientSession) {
        self.sessions.insert(session.target, session);
    }

    pub fn get(&self, target: EventTarget) -> Option<&ClientSession> {
        self.sessions.get(&target)
    }

    pub fn get_mut(&mut self, target: EventTarget) -> Option<&mut ClientSession> {
        self.sessions.get_mut(&target)
    }

    /// Removes a session and releases its name.
    pub fn remove(&mut self, target: EventTarget) -> Option<ClientSession> {
        let session = self.sessions.remove(&target)?;
        if let Some(name) = session.name() {
            if self.names.get(name) == Some(&target) {
                self.names.remove(name);
            }
        }
        Some(session)
    }

    /// Binds `name` to the session at `target`.  Returns `false` if the name
    /// is held by another session or the target is unknown.
    pub fn bind_name(&mut self, target: EventTarget, name: &str) -> bool {
        if self.names.contains_key(name) {
            return false;
        }
        let Some(session) = self.sessions.get_mut(&target) else {
            return false;
        };
        session.name = Some(name.to_string());
        self.names.insert(name.to_string(), target);
        true
    }

    pub fn target_of(&self, name: &str) -> Option<EventTarget> {
        self.names.get(name).copied()
    }

    /// Ready sessions, in no particular order.
    pub fn ready_mut(&mut self) -> impl Iterator<Item = &mut ClientSession> {
        self.sessions.values_mut().filter(|s| s.is_ready())
    }

    pub fn targets(&self) -> Vec<EventTarget> {
        self.sessions.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgeshare_core::EventScheduler;
    use edgeshare_core::protocol::{ProtocolVersion, MAX_FRAME_LEN};

    use crate::application::events::ServerEvent;

    fn session_with(target: EventTarget, sink: Box<dyn MessageSink>) -> ClientSession {
        ClientSession::new(
            NewConnection {
                target,
                id: Uuid::new_v4(),
                peer: "127.0.0.1:40000".parse().unwrap(),
                sink,
            },
            Heartbeat::default(),
        )
    }

    fn quiet_sink() -> Box<dyn MessageSink> {
        let mut sink = MockMessageSink::new();
        sink.expect_send().returning(|_| Ok(()));
        sink.expect_close().returning(|| ());
        Box::new(sink)
    }

    fn targets(n: usize) -> Vec<EventTarget> {
        let sched: EventScheduler<ServerEvent, ()> = EventScheduler::new();
        (0..n).map(|_| sched.new_target()).collect()
    }

    #[test]
    fn test_new_session_limits_frames_to_hello_size() {
        // Arrange
        let t = targets(1);

        // Act
        let mut session = session_with(t[0], quiet_sink());
        session.reader.feed(&((MAX_HELLO_LEN as u32) + 1).to_be_bytes());
        let oversized = session.reader.next_message();

        // Assert
        assert_eq!(session.phase, SessionPhase::AwaitingHello);
        assert!(matches!(oversized, Err(ProtocolError::FrameTooLarge { .. })));
        assert!(MAX_HELLO_LEN < MAX_FRAME_LEN);
        assert_eq!(session.name(), None);
        assert_eq!(session.label(), "127.0.0.1:40000");
    }

    #[test]
    fn test_send_passes_message_to_sink() {
        // Arrange
        let t = targets(1);
        let mut sink = MockMessageSink::new();
        sink.expect_send()
            .withf(|m| *m == Message::Hello(ProtocolVersion::new(1, 3)))
            .times(1)
            .returning(|_| Ok(()));
        let mut session = session_with(t[0], Box::new(sink));

        // Act
        let result = session.send(&Message::Hello(ProtocolVersion::new(1, 3)));

        // Assert
        assert!(result.is_ok());
    }

    #[test]
    fn test_bind_name_rejects_second_holder() {
        // Arrange
        let t = targets(2);
        let mut table = SessionTable::new();
        table.insert(session_with(t[0], quiet_sink()));
        table.insert(session_with(t[1], quiet_sink()));

        // Act
        let first = table.bind_name(t[0], "laptop");
        let second = table.bind_name(t[1], "laptop");

        // Assert
        assert!(first);
        assert!(!second);
        assert_eq!(table.target_of("laptop"), Some(t[0]));
        assert_eq!(table.get(t[1]).and_then(|s| s.name()), None);
    }

    #[test]
    fn test_remove_releases_name() {
        // Arrange
        let t = targets(2);
        let mut table = SessionTable::new();
        table.insert(session_with(t[0], quiet_sink()));
        table.insert(session_with(t[1], quiet_sink()));
        table.bind_name(t[0], "laptop");

        // Act
        let removed = table.remove(t[0]);
        let rebound = table.bind_name(t[1], "laptop");

        // Assert
        assert!(removed.is_some());
        assert!(rebound);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_ready_mut_skips_sessions_in_handshake() {
        // Arrange
        let t = targets(2);
        let mut table = SessionTable::new();
        table.insert(session_with(t[0], quiet_sink()));
        table.insert(session_with(t[1], quiet_sink()));
        if let Some(s) = table.get_mut(t[1]) {
            s.phase = SessionPhase::Ready;
        }

        // Act
        let ready: Vec<EventTarget> = table.ready_mut().map(|s| s.target).collect();

        // Assert
        assert_eq!(ready, vec![t[1]]);
    }

    #[test]
    fn test_clipboard_current_flags_are_per_id() {
        // Arrange
        let t = targets(1);
        let mut session = session_with(t[0], quiet_sink());

        // Act
        session.set_clipboard_current(ClipboardId::Selection, true);

        // Assert
        assert!(session.is_clipboard_current(ClipboardId::Selection));
        assert!(!session.is_clipboard_current(ClipboardId::Clipboard));
    }
}
