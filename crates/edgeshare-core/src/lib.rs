//! # edgeshare-core
//!
//! Shared library for edgeshare containing the event scheduler, the screen
//! topology, and the wire protocol.
//!
//! It has no dependencies on OS input APIs or network sockets; the server
//! crate supplies those.
//!
//! # Architecture overview (for beginners)
//!
//! edgeshare lets one keyboard and mouse drive several computers ("screens").
//! Pushing the cursor off the edge of one screen makes it appear on the
//! neighbouring one, and the clipboard follows.
//!
//! This crate is the shared foundation.  It defines:
//!
//! - **`event`** – A single-threaded reactor.  Posted events and expiring
//!   timers come out of one ordered stream and are handed to registered
//!   handlers, so the server's state never needs a lock.
//!
//! - **`domain`** – Pure rules with no OS dependencies.  The central piece is
//!   the `ScreenTopology`: which screen sits next to which, and where the
//!   cursor lands when it crosses an edge.
//!
//! - **`protocol`** – How bytes travel over the network.  Messages are
//!   length-prefixed frames that start with a four-letter opcode.

pub mod domain;
pub mod event;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `edgeshare_core::ScreenTopology` instead of the full module path.
pub use domain::clipboard::{ClipboardId, ClipboardTable};
pub use domain::screen::{Corner, CornerMask, Direction, ScreenShape};
pub use domain::topology::{Landing, ScreenTopology, TopologyError};
pub use event::{Event, EventPayload, EventScheduler, EventSender, EventTarget, NextEvent};
pub use protocol::codec::{decode_message, encode_message, ProtocolError};
pub use protocol::messages::Message;
