//! The edgeshare wire message catalog.
//!
//! Every message travels inside a frame: a 4-byte big-endian length followed
//! by that many payload bytes.  The payload starts with a 4-byte ASCII opcode
//! (`CINN`, `DMMV`, ...) followed by fixed-width big-endian fields.  The two
//! handshake messages are the exception: their payload starts with the
//! 7-byte tag `Synergy` instead of an opcode.
//!
//! Opcodes are grouped by their first letter:
//!
//! | Prefix | Meaning                                   |
//! |--------|-------------------------------------------|
//! | `C`    | command (enter, leave, grab, noop, ...)   |
//! | `D`    | data (keys, mouse, clipboard, options)    |
//! | `Q`    | query                                     |
//! | `E`    | error, sent just before the sender closes |

use std::fmt;

use crate::domain::clipboard::ClipboardId;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Tag that opens both handshake messages.
pub const HELLO_TAG: &[u8; 7] = b"Synergy";

/// Version this implementation speaks.
pub const PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion { major: 1, minor: 3 };

/// Oldest peer version accepted during the handshake.
pub const MIN_PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion { major: 1, minor: 0 };

/// Default TCP port the server listens on.
pub const DEFAULT_PORT: u16 = 24800;

/// Largest payload accepted before the handshake completes.
pub const MAX_HELLO_LEN: usize = 1024;

/// Largest payload accepted once the handshake has completed.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Size of the frame length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

// ── Version ───────────────────────────────────────────────────────────────────

/// A `major.minor` protocol version.  Ordered by major, then minor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolVersion {
    pub major: i16,
    pub minor: i16,
}

impl ProtocolVersion {
    pub const fn new(major: i16, minor: i16) -> Self {
        Self { major, minor }
    }

    /// `true` unless this version is older than `minimum` (lower major, or
    /// equal major and lower minor).
    pub fn satisfies(self, minimum: ProtocolVersion) -> bool {
        self >= minimum
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

// ── Opcodes ───────────────────────────────────────────────────────────────────

/// Four-character message codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Enter,
    Leave,
    ClipboardGrab,
    ClipboardData,
    KeyDown,
    KeyRepeat,
    KeyUp,
    MouseDown,
    MouseUp,
    MouseMove,
    MouseRelMove,
    MouseWheel,
    Screensaver,
    Noop,
    ResetOptions,
    SetOptions,
    QueryInfo,
    Info,
    InfoAck,
    Close,
    BadProtocol,
    Busy,
    UnknownClient,
    Incompatible,
}

impl Opcode {
    pub const ALL: [Opcode; 24] = [
        Opcode::Enter,
        Opcode::Leave,
        Opcode::ClipboardGrab,
        Opcode::ClipboardData,
        Opcode::KeyDown,
        Opcode::KeyRepeat,
        Opcode::KeyUp,
        Opcode::MouseDown,
        Opcode::MouseUp,
        Opcode::MouseMove,
        Opcode::MouseRelMove,
        Opcode::MouseWheel,
        Opcode::Screensaver,
        Opcode::Noop,
        Opcode::ResetOptions,
        Opcode::SetOptions,
        Opcode::QueryInfo,
        Opcode::Info,
        Opcode::InfoAck,
        Opcode::Close,
        Opcode::BadProtocol,
        Opcode::Busy,
        Opcode::UnknownClient,
        Opcode::Incompatible,
    ];

    pub fn code(self) -> &'static [u8; 4] {
        match self {
            Opcode::Enter => b"CINN",
            Opcode::Leave => b"COUT",
            Opcode::ClipboardGrab => b"CCLP",
            Opcode::ClipboardData => b"DCLP",
            Opcode::KeyDown => b"DKDN",
            Opcode::KeyRepeat => b"DKRP",
            Opcode::KeyUp => b"DKUP",
            Opcode::MouseDown => b"DMDN",
            Opcode::MouseUp => b"DMUP",
            Opcode::MouseMove => b"DMMV",
            Opcode::MouseRelMove => b"DMRM",
            Opcode::MouseWheel => b"DMWM",
            Opcode::Screensaver => b"CSEC",
            Opcode::Noop => b"CNOP",
            Opcode::ResetOptions => b"CROP",
            Opcode::SetOptions => b"DSOP",
            Opcode::QueryInfo => b"QINF",
            Opcode::Info => b"DINF",
            Opcode::InfoAck => b"CIAK",
            Opcode::Close => b"CBYE",
            Opcode::BadProtocol => b"EBAD",
            Opcode::Busy => b"EBSY",
            Opcode::UnknownClient => b"EUNK",
            Opcode::Incompatible => b"EINC",
        }
    }
}

impl TryFrom<[u8; 4]> for Opcode {
    type Error = [u8; 4];

    fn try_from(value: [u8; 4]) -> Result<Self, Self::Error> {
        Opcode::ALL
            .into_iter()
            .find(|op| *op.code() == value)
            .ok_or(value)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.code()))
    }
}

// ── Modifier masks ────────────────────────────────────────────────────────────

/// Modifier bits carried in key messages and in the enter toggle mask.
pub mod modifiers {
    pub const SHIFT: u16 = 0x0001;
    pub const CONTROL: u16 = 0x0002;
    pub const ALT: u16 = 0x0004;
    pub const META: u16 = 0x0008;
    pub const SUPER: u16 = 0x0010;
    pub const ALT_GR: u16 = 0x0020;
    pub const CAPS_LOCK: u16 = 0x1000;
    pub const NUM_LOCK: u16 = 0x2000;
    pub const SCROLL_LOCK: u16 = 0x4000;

    /// Bits that are held down rather than toggled.
    pub const HELD: u16 = SHIFT | CONTROL | ALT | META | SUPER | ALT_GR;

    /// Parses a modifier name as written in configuration files.
    pub fn from_name(name: &str) -> Option<u16> {
        match name.to_ascii_lowercase().as_str() {
            "shift" => Some(SHIFT),
            "ctrl" | "control" => Some(CONTROL),
            "alt" => Some(ALT),
            "meta" => Some(META),
            "super" => Some(SUPER),
            "altgr" => Some(ALT_GR),
            _ => None,
        }
    }
}

// ── Options ───────────────────────────────────────────────────────────────────

/// Option identifiers sent in `DSOP`.  Each is a four-character code packed
/// big-endian into a `u32`.
pub mod options {
    const fn code(c: &[u8; 4]) -> u32 {
        u32::from_be_bytes(*c)
    }

    /// Heartbeat interval in milliseconds.
    pub const HEARTBEAT: u32 = code(b"HART");
    /// Switch delay in milliseconds.
    pub const SWITCH_DELAY: u32 = code(b"SSWT");
    /// Double-tap window in milliseconds.
    pub const SWITCH_TWO_TAP: u32 = code(b"SSTT");
    /// Relative mouse moves while locked (0 or 1).
    pub const RELATIVE_MOUSE_MOVES: u32 = code(b"MDLT");
    /// Dead corner mask.
    pub const SWITCH_CORNERS: u32 = code(b"SSCM");
    /// Dead corner size in pixels.
    pub const SWITCH_CORNER_SIZE: u32 = code(b"SSCS");
    /// Screensaver synchronisation (0 or 1).
    pub const SCREENSAVER_SYNC: u32 = code(b"SSVR");
}

/// An `(option id, value)` pair.
pub type OptionPair = (u32, i32);

// ── Payload structs ───────────────────────────────────────────────────────────

/// Shape and cursor position a screen reports in `DINF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScreenInfo {
    /// Left edge of the screen in its own desktop coordinates.
    pub x: i16,
    /// Top edge of the screen in its own desktop coordinates.
    pub y: i16,
    pub width: i16,
    pub height: i16,
    pub jump_zone: i16,
    pub cursor_x: i16,
    pub cursor_y: i16,
}

impl ScreenInfo {
    /// `true` if the size is positive, the jump zone is not negative, and the
    /// cursor lies on the screen.
    pub fn is_valid(&self) -> bool {
        let (x, y) = (i32::from(self.x), i32::from(self.y));
        let (w, h) = (i32::from(self.width), i32::from(self.height));
        let (cx, cy) = (i32::from(self.cursor_x), i32::from(self.cursor_y));
        w > 0 && h > 0 && self.jump_zone >= 0 && cx >= x && cx < x + w && cy >= y && cy < y + h
    }
}

// ── Message ───────────────────────────────────────────────────────────────────

/// Every message in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Handshake opener sent by the server.
    Hello(ProtocolVersion),
    /// Handshake reply carrying the screen's name.
    HelloBack { version: ProtocolVersion, name: String },

    /// `CINN`: the screen now receives input; the cursor enters at `(x, y)`.
    Enter { x: i16, y: i16, seq: u32, mask: u16 },
    /// `COUT`: the screen no longer receives input.
    Leave,
    /// `CCLP`: the sender grabbed clipboard `id`.
    ClipboardGrab { id: ClipboardId, seq: u32 },
    /// `DCLP`: clipboard contents.
    ClipboardData { id: ClipboardId, seq: u32, data: Vec<u8> },

    /// `DKDN`
    KeyDown { key: u16, mask: u16, button: u16 },
    /// `DKRP`
    KeyRepeat { key: u16, mask: u16, count: u16, button: u16 },
    /// `DKUP`
    KeyUp { key: u16, mask: u16, button: u16 },
    /// `DMDN`
    MouseDown(i8),
    /// `DMUP`
    MouseUp(i8),
    /// `DMMV`: absolute position on the receiving screen.
    MouseMove { x: i16, y: i16 },
    /// `DMRM`: relative motion.
    MouseRelMove { dx: i16, dy: i16 },
    /// `DMWM`
    MouseWheel { x_delta: i16, y_delta: i16 },

    /// `CSEC`: screensaver started (`true`) or stopped.
    Screensaver(bool),
    /// `CNOP`: keep-alive.
    Noop,
    /// `CROP`: reset all options to defaults.
    ResetOptions,
    /// `DSOP`: set options.
    SetOptions(Vec<OptionPair>),
    /// `QINF`: ask the screen for its shape and cursor.
    QueryInfo,
    /// `DINF`: the screen's shape and cursor.
    Info(ScreenInfo),
    /// `CIAK`: `DINF` was processed.
    InfoAck,
    /// `CBYE`: the server is closing the connection.
    Close,

    /// `EBAD`: protocol violation.
    BadProtocol,
    /// `EBSY`: a screen with that name is already connected.
    Busy,
    /// `EUNK`: the screen name is not in the topology.
    UnknownClient,
    /// `EINC`: incompatible protocol version.
    Incompatible(ProtocolVersion),
}

impl Message {
    /// The message's opcode; `None` for the two handshake messages.
    pub fn opcode(&self) -> Option<Opcode> {
        let op = match self {
            Message::Hello(_) | Message::HelloBack { .. } => return None,
            Message::Enter { .. } => Opcode::Enter,
            Message::Leave => Opcode::Leave,
            Message::ClipboardGrab { .. } => Opcode::ClipboardGrab,
            Message::ClipboardData { .. } => Opcode::ClipboardData,
            Message::KeyDown { .. } => Opcode::KeyDown,
            Message::KeyRepeat { .. } => Opcode::KeyRepeat,
            Message::KeyUp { .. } => Opcode::KeyUp,
            Message::MouseDown(_) => Opcode::MouseDown,
            Message::MouseUp(_) => Opcode::MouseUp,
            Message::MouseMove { .. } => Opcode::MouseMove,
            Message::MouseRelMove { .. } => Opcode::MouseRelMove,
            Message::MouseWheel { .. } => Opcode::MouseWheel,
            Message::Screensaver(_) => Opcode::Screensaver,
            Message::Noop => Opcode::Noop,
            Message::ResetOptions => Opcode::ResetOptions,
            Message::SetOptions(_) => Opcode::SetOptions,
            Message::QueryInfo => Opcode::QueryInfo,
            Message::Info(_) => Opcode::Info,
            Message::InfoAck => Opcode::InfoAck,
            Message::Close => Opcode::Close,
            Message::BadProtocol => Opcode::BadProtocol,
            Message::Busy => Opcode::Busy,
            Message::UnknownClient => Opcode::UnknownClient,
            Message::Incompatible(_) => Opcode::Incompatible,
        };
        Some(op)
    }

    /// `true` for the error messages that precede a disconnect.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Message::BadProtocol | Message::Busy | Message::UnknownClient | Message::Incompatible(_)
        )
    }

    /// Short name for logs.
    pub fn name(&self) -> String {
        match self.opcode() {
            Some(op) => op.to_string(),
            None => "Synergy".to_string(),
        }
    }
}
