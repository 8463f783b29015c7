//! Protocol module: the message catalog, the frame codec, and per-connection
//! bookkeeping (enter sequence numbers, heartbeats, motion compression).

pub mod codec;
pub mod heartbeat;
pub mod messages;
pub mod sequence;
pub mod stream;

pub use codec::{decode_message, decode_message_with_limit, encode_message, ProtocolError};
pub use heartbeat::{Heartbeat, HeartbeatAction};
pub use messages::*;
pub use sequence::EnterSequence;
pub use stream::{Decoded, FrameReader};
