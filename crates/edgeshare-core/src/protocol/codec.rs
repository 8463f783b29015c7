//! Binary codec for edgeshare protocol frames.
//!
//! Wire format:
//! ```text
//! [payload_len:4][opcode:4][fields...]
//! [payload_len:4]["Synergy":7][major:2][minor:2]([name_len:4][name:N])
//! ```
//! All multi-byte integers are big-endian.  Strings and clipboard data carry
//! a 4-byte length prefix.

use thiserror::Error;

use crate::domain::clipboard::ClipboardId;
use crate::protocol::messages::{
    Message, Opcode, OptionPair, ProtocolVersion, ScreenInfo, HELLO_TAG, LENGTH_PREFIX_SIZE,
    MAX_FRAME_LEN,
};

/// Errors that can occur during message encoding or decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The byte slice does not yet hold a complete frame.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The payload starts with a four-byte code that is not in the catalog.
    #[error("unknown opcode: {}", String::from_utf8_lossy(.0))]
    UnknownOpcode([u8; 4]),

    /// The length prefix exceeds what the reader accepts.
    #[error("frame of {declared} bytes exceeds limit of {limit}")]
    FrameTooLarge { declared: usize, limit: usize },

    /// The payload could not be parsed (field value out of range, UTF-8 error, etc.).
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The payload holds bytes past the last field of its message.
    #[error("payload length mismatch: {opcode} expects {expected} bytes, frame has {available}")]
    PayloadLengthMismatch {
        opcode: String,
        expected: usize,
        available: usize,
    },
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`Message`] into a complete frame, length prefix included.
///
/// # Errors
///
/// Returns [`ProtocolError::FrameTooLarge`] if the payload would exceed
/// [`MAX_FRAME_LEN`] (only possible with very large clipboard data).
///
/// # Examples
///
/// ```rust
/// use edgeshare_core::protocol::{decode_message, encode_message, Message};
///
/// let msg = Message::MouseMove { x: 5, y: 512 };
/// let bytes = encode_message(&msg).unwrap();
/// assert_eq!(&bytes[4..8], b"DMMV");
/// let (decoded, consumed) = decode_message(&bytes).unwrap();
/// assert_eq!(decoded, msg);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_message(msg: &Message) -> Result<Vec<u8>, ProtocolError> {
    let payload = encode_payload(msg);
    if payload.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            declared: payload.len(),
            limit: MAX_FRAME_LEN,
        });
    }

    let mut buf = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Decodes one frame from the front of `bytes`, accepting payloads up to
/// [`MAX_FRAME_LEN`].
///
/// Returns the message and the number of bytes consumed.
///
/// # Errors
///
/// [`ProtocolError::InsufficientData`] means the frame is not complete yet;
/// every other error is a protocol violation.
pub fn decode_message(bytes: &[u8]) -> Result<(Message, usize), ProtocolError> {
    decode_message_with_limit(bytes, MAX_FRAME_LEN)
}

/// Like [`decode_message`] but rejects payloads longer than `limit`.
///
/// The limit is checked against the length prefix alone, before the payload
/// arrives, so an oversized frame is refused without buffering it.
pub fn decode_message_with_limit(
    bytes: &[u8],
    limit: usize,
) -> Result<(Message, usize), ProtocolError> {
    if bytes.len() < LENGTH_PREFIX_SIZE {
        return Err(ProtocolError::InsufficientData {
            needed: LENGTH_PREFIX_SIZE,
            available: bytes.len(),
        });
    }

    let payload_len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    if payload_len > limit {
        return Err(ProtocolError::FrameTooLarge {
            declared: payload_len,
            limit,
        });
    }

    let total_needed = LENGTH_PREFIX_SIZE + payload_len;
    if bytes.len() < total_needed {
        return Err(ProtocolError::InsufficientData {
            needed: total_needed,
            available: bytes.len(),
        });
    }

    let msg = decode_payload(&bytes[LENGTH_PREFIX_SIZE..total_needed])?;
    Ok((msg, total_needed))
}

// ── Payload encoding ──────────────────────────────────────────────────────────

fn encode_payload(msg: &Message) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(op) = msg.opcode() {
        buf.extend_from_slice(op.code());
    }

    match msg {
        Message::Hello(version) => {
            buf.extend_from_slice(HELLO_TAG);
            write_version(&mut buf, *version);
        }
        Message::HelloBack { version, name } => {
            buf.extend_from_slice(HELLO_TAG);
            write_version(&mut buf, *version);
            write_length_prefixed_bytes(&mut buf, name.as_bytes());
        }
        Message::Enter { x, y, seq, mask } => {
            buf.extend_from_slice(&x.to_be_bytes());
            buf.extend_from_slice(&y.to_be_bytes());
            buf.extend_from_slice(&seq.to_be_bytes());
            buf.extend_from_slice(&mask.to_be_bytes());
        }
        Message::ClipboardGrab { id, seq } => {
            buf.push(*id as u8);
            buf.extend_from_slice(&seq.to_be_bytes());
        }
        Message::ClipboardData { id, seq, data } => {
            buf.push(*id as u8);
            buf.extend_from_slice(&seq.to_be_bytes());
            write_length_prefixed_bytes(&mut buf, data);
        }
        Message::KeyDown { key, mask, button } | Message::KeyUp { key, mask, button } => {
            write_u16s(&mut buf, &[*key, *mask, *button]);
        }
        Message::KeyRepeat {
            key,
            mask,
            count,
            button,
        } => write_u16s(&mut buf, &[*key, *mask, *count, *button]),
        Message::MouseDown(button) | Message::MouseUp(button) => {
            buf.extend_from_slice(&button.to_be_bytes());
        }
        Message::MouseMove { x: a, y: b }
        | Message::MouseRelMove { dx: a, dy: b }
        | Message::MouseWheel {
            x_delta: a,
            y_delta: b,
        } => {
            buf.extend_from_slice(&a.to_be_bytes());
            buf.extend_from_slice(&b.to_be_bytes());
        }
        Message::Screensaver(on) => buf.push(u8::from(*on)),
        Message::SetOptions(pairs) => encode_options(&mut buf, pairs),
        Message::Info(info) => encode_screen_info(&mut buf, info),
        Message::Incompatible(version) => write_version(&mut buf, *version),
        Message::Leave
        | Message::Noop
        | Message::ResetOptions
        | Message::QueryInfo
        | Message::InfoAck
        | Message::Close
        | Message::BadProtocol
        | Message::Busy
        | Message::UnknownClient => {} // opcode only
    }
    buf
}

fn write_version(buf: &mut Vec<u8>, version: ProtocolVersion) {
    buf.extend_from_slice(&version.major.to_be_bytes());
    buf.extend_from_slice(&version.minor.to_be_bytes());
}

fn write_u16s(buf: &mut Vec<u8>, values: &[u16]) {
    for v in values {
        buf.extend_from_slice(&v.to_be_bytes());
    }
}

/// Options travel as a flat list of `u32` words: a word count, then
/// alternating id and value.
fn encode_options(buf: &mut Vec<u8>, pairs: &[OptionPair]) {
    let words = (pairs.len() * 2) as u32;
    buf.extend_from_slice(&words.to_be_bytes());
    for (id, value) in pairs {
        buf.extend_from_slice(&id.to_be_bytes());
        buf.extend_from_slice(&value.to_be_bytes());
    }
}

fn encode_screen_info(buf: &mut Vec<u8>, info: &ScreenInfo) {
    for v in [
        info.x,
        info.y,
        info.width,
        info.height,
        info.jump_zone,
        info.cursor_x,
        info.cursor_y,
    ] {
        buf.extend_from_slice(&v.to_be_bytes());
    }
}

// ── Payload decoding ──────────────────────────────────────────────────────────

fn decode_payload(payload: &[u8]) -> Result<Message, ProtocolError> {
    if payload.starts_with(HELLO_TAG) {
        return decode_hello(payload);
    }

    require_len(payload, 4, "opcode")?;
    let code = [payload[0], payload[1], payload[2], payload[3]];
    let opcode = Opcode::try_from(code).map_err(ProtocolError::UnknownOpcode)?;
    let mut r = PayloadReader::new(&payload[4..]);

    let msg = match opcode {
        Opcode::Enter => Message::Enter {
            x: r.read_i16()?,
            y: r.read_i16()?,
            seq: r.read_u32()?,
            mask: r.read_u16()?,
        },
        Opcode::Leave => Message::Leave,
        Opcode::ClipboardGrab => Message::ClipboardGrab {
            id: r.read_clipboard_id()?,
            seq: r.read_u32()?,
        },
        Opcode::ClipboardData => Message::ClipboardData {
            id: r.read_clipboard_id()?,
            seq: r.read_u32()?,
            data: r.read_length_prefixed_bytes()?.to_vec(),
        },
        Opcode::KeyDown => Message::KeyDown {
            key: r.read_u16()?,
            mask: r.read_u16()?,
            button: r.read_u16()?,
        },
        Opcode::KeyRepeat => Message::KeyRepeat {
            key: r.read_u16()?,
            mask: r.read_u16()?,
            count: r.read_u16()?,
            button: r.read_u16()?,
        },
        Opcode::KeyUp => Message::KeyUp {
            key: r.read_u16()?,
            mask: r.read_u16()?,
            button: r.read_u16()?,
        },
        Opcode::MouseDown => Message::MouseDown(r.read_i8()?),
        Opcode::MouseUp => Message::MouseUp(r.read_i8()?),
        Opcode::MouseMove => Message::MouseMove {
            x: r.read_i16()?,
            y: r.read_i16()?,
        },
        Opcode::MouseRelMove => Message::MouseRelMove {
            dx: r.read_i16()?,
            dy: r.read_i16()?,
        },
        Opcode::MouseWheel => Message::MouseWheel {
            x_delta: r.read_i16()?,
            y_delta: r.read_i16()?,
        },
        Opcode::Screensaver => Message::Screensaver(r.read_i8()? != 0),
        Opcode::Noop => Message::Noop,
        Opcode::ResetOptions => Message::ResetOptions,
        Opcode::SetOptions => Message::SetOptions(decode_options(&mut r)?),
        Opcode::QueryInfo => Message::QueryInfo,
        Opcode::Info => Message::Info(ScreenInfo {
            x: r.read_i16()?,
            y: r.read_i16()?,
            width: r.read_i16()?,
            height: r.read_i16()?,
            jump_zone: r.read_i16()?,
            cursor_x: r.read_i16()?,
            cursor_y: r.read_i16()?,
        }),
        Opcode::InfoAck => Message::InfoAck,
        Opcode::Close => Message::Close,
        Opcode::BadProtocol => Message::BadProtocol,
        Opcode::Busy => Message::Busy,
        Opcode::UnknownClient => Message::UnknownClient,
        Opcode::Incompatible => Message::Incompatible(r.read_version()?),
    };

    r.finish(&opcode.to_string(), payload.len())?;
    Ok(msg)
}

/// `Synergy` + version is a hello; a trailing name makes it a hello-back.
fn decode_hello(payload: &[u8]) -> Result<Message, ProtocolError> {
    let mut r = PayloadReader::new(&payload[HELLO_TAG.len()..]);
    let version = r.read_version()?;
    if r.is_empty() {
        return Ok(Message::Hello(version));
    }

    let name = std::str::from_utf8(r.read_length_prefixed_bytes()?)
        .map_err(|e| ProtocolError::MalformedPayload(format!("invalid UTF-8 in screen name: {e}")))?
        .to_string();
    r.finish("Synergy", payload.len())?;
    Ok(Message::HelloBack { version, name })
}

fn decode_options(r: &mut PayloadReader<'_>) -> Result<Vec<OptionPair>, ProtocolError> {
    let words = r.read_u32()? as usize;
    if words % 2 != 0 {
        return Err(ProtocolError::MalformedPayload(format!(
            "option list has odd word count {words}"
        )));
    }
    // Each word is 4 bytes; refuse counts the payload cannot hold before allocating.
    if words.saturating_mul(4) > r.remaining() {
        return Err(ProtocolError::MalformedPayload(format!(
            "option list of {words} words exceeds payload"
        )));
    }

    let mut pairs = Vec::with_capacity(words / 2);
    for _ in 0..words / 2 {
        let id = r.read_u32()?;
        let value = r.read_u32()? as i32;
        pairs.push((id, value));
    }
    Ok(pairs)
}

// ── Utility helpers ───────────────────────────────────────────────────────────

fn require_len(buf: &[u8], needed: usize, context: &str) -> Result<(), ProtocolError> {
    if buf.len() < needed {
        Err(ProtocolError::MalformedPayload(format!(
            "{context}: need {needed} bytes, got {}",
            buf.len()
        )))
    } else {
        Ok(())
    }
}

/// Writes a 4-byte length prefix followed by the bytes.
fn write_length_prefixed_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    buf.extend_from_slice(bytes);
}

/// Cursor over a payload that reads big-endian fields in order.
struct PayloadReader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> PayloadReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let bytes = self.take_slice(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn take_slice(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        if self.remaining() < len {
            return Err(ProtocolError::MalformedPayload(format!(
                "need {len} bytes at offset {}, got {}",
                self.offset,
                self.remaining()
            )));
        }
        let slice = &self.buf[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn read_i8(&mut self) -> Result<i8, ProtocolError> {
        self.take::<1>().map(i8::from_be_bytes)
    }

    fn read_u16(&mut self) -> Result<u16, ProtocolError> {
        self.take::<2>().map(u16::from_be_bytes)
    }

    fn read_i16(&mut self) -> Result<i16, ProtocolError> {
        self.take::<2>().map(i16::from_be_bytes)
    }

    fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        self.take::<4>().map(u32::from_be_bytes)
    }

    fn read_version(&mut self) -> Result<ProtocolVersion, ProtocolError> {
        Ok(ProtocolVersion::new(self.read_i16()?, self.read_i16()?))
    }

    fn read_clipboard_id(&mut self) -> Result<ClipboardId, ProtocolError> {
        let [raw] = self.take::<1>()?;
        ClipboardId::try_from(raw)
            .map_err(|v| ProtocolError::MalformedPayload(format!("unknown clipboard id: {v}")))
    }

    /// Reads a 4-byte length prefix and then that many bytes.
    fn read_length_prefixed_bytes(&mut self) -> Result<&'a [u8], ProtocolError> {
        let len = self.read_u32()? as usize;
        self.take_slice(len)
    }

    /// Rejects payloads with bytes left over after the last field.
    fn finish(&self, opcode: &str, payload_len: usize) -> Result<(), ProtocolError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::PayloadLengthMismatch {
                opcode: opcode.to_string(),
                expected: payload_len - self.remaining(),
                available: payload_len,
            })
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
