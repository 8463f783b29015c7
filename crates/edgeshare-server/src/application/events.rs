//! Events that flow through the server's reactor.
//!
//! Every producer outside the reactor (the listener, the per-connection
//! reader tasks, the input capture thread) turns what it observed into a
//! [`ServerEvent`] and posts it with an [`EventSender`](edgeshare_core::EventSender).
//! The handlers installed by [`ServerCore::install_handlers`] consume them on
//! the reactor task.

use std::fmt;
use std::net::SocketAddr;

use edgeshare_core::event::{EventPayload, EventScheduler, EventTarget, TimerEvent};
use uuid::Uuid;

use crate::application::server_core::ServerCore;
use crate::application::session::MessageSink;
use crate::infrastructure::input_capture::LocalInput;

/// The scheduler type the server runs on.
pub type Scheduler = EventScheduler<ServerEvent, ServerCore>;

/// A freshly accepted connection, handed to the reactor.
pub struct NewConnection {
    /// Target that the connection's `Received` and `Hangup` events use.
    pub target: EventTarget,
    /// Correlation id for logs.
    pub id: Uuid,
    pub peer: SocketAddr,
    /// Outbound half of the connection.
    pub sink: Box<dyn MessageSink>,
}

impl fmt::Debug for NewConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewConnection")
            .field("target", &self.target)
            .field("id", &self.id)
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub enum ServerEvent {
    /// Captured on the primary screen.  Always addressed to `SYSTEM`.
    Input(LocalInput),
    /// A client connected.  Addressed to the new connection's own target,
    /// which the wildcard handler picks up.
    Connected(NewConnection),
    /// Bytes read from a connection, addressed to its target.
    Received(Vec<u8>),
    /// The connection's read side reached EOF or failed.
    Hangup,
    Timer(TimerEvent),
}

/// Handler lookup key for [`ServerEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerEventKind {
    Input,
    Connected,
    Received,
    Hangup,
    Timer,
}

impl EventPayload for ServerEvent {
    type Kind = ServerEventKind;

    fn kind(&self) -> ServerEventKind {
        match self {
            ServerEvent::Input(_) => ServerEventKind::Input,
            ServerEvent::Connected(_) => ServerEventKind::Connected,
            ServerEvent::Received(_) => ServerEventKind::Received,
            ServerEvent::Hangup => ServerEventKind::Hangup,
            ServerEvent::Timer(_) => ServerEventKind::Timer,
        }
    }

    fn from_timer(event: TimerEvent) -> Self {
        ServerEvent::Timer(event)
    }
}
