//! Network infrastructure for the server.
//!
//! # Sub-modules
//!
//! - **`listener`** – Binds the TCP port and accepts screens.  Each accepted
//!   stream is handed straight to `connection`; the listener never touches
//!   server state.
//!
//! - **`connection`** – Splits a stream into a reader task and a writer task.
//!   The reader posts raw bytes to the reactor; the writer drains frames the
//!   reactor queued through a `ChannelSink`.  A `WriterDrain` lets shutdown
//!   wait for those writers to finish.
//!
//! # Threading (for beginners)
//!
//! These tasks run on the tokio runtime, in parallel with the reactor.  They
//! communicate with it only through `EventSender::post` (inbound) and an
//! unbounded channel (outbound), so the reactor's state needs no locks.

pub mod connection;
pub mod listener;

pub use connection::{spawn_connection, ChannelSink, Outbound, WriterDrain, WriterGuard};
pub use listener::{bind, listen_addr, spawn_listener, NetworkError};
