//! Incremental frame reader with mouse-motion compression.
//!
//! A TCP read hands over whatever bytes happen to have arrived: half a
//! frame, three frames, or one and a half.  [`FrameReader`] buffers those
//! bytes and hands back complete messages one at a time.
//!
//! # Motion compression
//!
//! A fast mouse can produce hundreds of move messages per second.  When a
//! burst of them is already sitting in the buffer, only the end result
//! matters, so the reader folds consecutive moves into one pending slot:
//!
//! - absolute moves (`DMMV`) keep the latest position;
//! - relative moves (`DMRM`) add their deltas together.
//!
//! The slot is released as soon as the buffer holds no further complete
//! frame, or just before any other message or decode error is handed out,
//! so ordering with respect to clicks and keys is preserved.
//!
//! Motion flows from the controller to screens, so folding pays off in a
//! reader of the controller's outbound stream.  The server's own sessions
//! never receive `DMMV`/`DMRM` from a well-behaved peer and treat one as a
//! protocol violation.

use tracing::trace;

use crate::protocol::codec::{decode_message_with_limit, ProtocolError};
use crate::protocol::messages::{Message, MAX_FRAME_LEN};

/// Outcome of [`FrameReader::next_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A complete message.
    Message(Message),
    /// More bytes are needed before the next message is complete.
    Incomplete,
    /// The peer closed the stream; no further messages will arrive.
    Hangup,
}

/// Buffers inbound bytes and yields decoded messages.
#[derive(Debug)]
pub struct FrameReader {
    buf: Vec<u8>,
    /// Start of the undecoded bytes in `buf`.
    pos: usize,
    eof: bool,
    frame_limit: usize,
    pending_motion: Option<Message>,
    /// A non-motion message decoded while a move was pending.
    held: Option<Message>,
    /// A decode error found while a move was pending.
    failed: Option<ProtocolError>,
    compressed: u64,
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReader {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            pos: 0,
            eof: false,
            frame_limit: MAX_FRAME_LEN,
            pending_motion: None,
            held: None,
            failed: None,
            compressed: 0,
        }
    }

    /// Limits the payload size of subsequent frames.
    pub fn set_frame_limit(&mut self, limit: usize) {
        self.frame_limit = limit;
    }

    /// Appends bytes read from the transport.
    ///
    /// Bytes already decoded are dropped here, once per read, rather than
    /// after every frame.
    pub fn feed(&mut self, bytes: &[u8]) {
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
        self.buf.extend_from_slice(bytes);
    }

    /// Records that the transport reached end of stream.
    pub fn mark_eof(&mut self) {
        self.eof = true;
    }

    /// Bytes buffered but not yet decoded.
    pub fn buffered(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Number of move messages folded into a later one so far.
    pub fn compressed_count(&self) -> u64 {
        self.compressed
    }

    /// Returns the next message, or why there is none.
    ///
    /// # Errors
    ///
    /// Any [`ProtocolError`] other than incomplete data.  A move still
    /// pending when the bad frame is reached is returned first and the error
    /// by the following call.  The connection should be closed afterwards.
    pub fn next_message(&mut self) -> Result<Decoded, ProtocolError> {
        if let Some(msg) = self.held.take() {
            return Ok(Decoded::Message(msg));
        }
        if let Some(err) = self.failed.take() {
            return Err(err);
        }

        loop {
            match decode_message_with_limit(&self.buf[self.pos..], self.frame_limit) {
                Ok((msg, used)) => {
                    self.pos += used;
                    if !is_motion(&msg) {
                        return Ok(match self.pending_motion.take() {
                            Some(motion) => {
                                self.held = Some(msg);
                                Decoded::Message(motion)
                            }
                            None => Decoded::Message(msg),
                        });
                    }
                    if let Some(flushed) = self.fold_motion(msg) {
                        return Ok(Decoded::Message(flushed));
                    }
                }
                Err(ProtocolError::InsufficientData { .. }) => {
                    let fallback = if self.eof {
                        if self.buffered() > 0 {
                            trace!(bytes = self.buffered(), "discarding partial frame at end of stream");
                        }
                        Decoded::Hangup
                    } else {
                        Decoded::Incomplete
                    };
                    return Ok(self.flush_motion_or(fallback));
                }
                Err(e) => {
                    return match self.pending_motion.take() {
                        Some(motion) => {
                            self.failed = Some(e);
                            Ok(Decoded::Message(motion))
                        }
                        None => Err(e),
                    };
                }
            }
        }
    }

    /// Merges `msg` into the pending slot.  Returns the old slot content when
    /// the kind of motion changes.
    fn fold_motion(&mut self, msg: Message) -> Option<Message> {
        let (flushed, pending) = match (self.pending_motion.take(), msg) {
            (None, next) => (None, next),
            (Some(Message::MouseMove { .. }), next @ Message::MouseMove { .. }) => {
                self.compressed += 1;
                (None, next)
            }
            (
                Some(Message::MouseRelMove { dx: ax, dy: ay }),
                Message::MouseRelMove { dx: bx, dy: by },
            ) => {
                self.compressed += 1;
                (
                    None,
                    Message::MouseRelMove {
                        dx: ax.saturating_add(bx),
                        dy: ay.saturating_add(by),
                    },
                )
            }
            (Some(prev), next) => (Some(prev), next),
        };
        self.pending_motion = Some(pending);
        flushed
    }

    fn flush_motion_or(&mut self, fallback: Decoded) -> Decoded {
        match self.pending_motion.take() {
            Some(motion) => Decoded::Message(motion),
            None => fallback,
        }
    }
}

fn is_motion(msg: &Message) -> bool {
    matches!(msg, Message::MouseMove { .. } | Message::MouseRelMove { .. })
}
