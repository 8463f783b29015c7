//! Input capture infrastructure for the server.
//!
//! The platform layer (keyboard and mouse hooks, cursor warping, clipboard
//! access) is outside this crate.  It plugs in through two seams:
//!
//! - [`InputSource`] produces [`LocalInput`] events on its own thread.  They
//!   are handed to the reactor with [`forward_input`].
//! - [`PrimaryScreen`] is called *by* the server to act on the local screen:
//!   hide or show the cursor, read and write the local clipboard.
//!
//! # Testability
//!
//! [`mock::MockInputSource`] injects synthetic events and
//! [`mock::FakePrimaryScreen`] records every call, so the server can be tested
//! without any OS hooks.  [`headless`] provides do-nothing implementations for
//! running the server without a local desktop.

use std::sync::mpsc;
use std::thread;

use edgeshare_core::event::{Event, EventSender, EventTarget};
use edgeshare_core::{ClipboardId, Direction};
use tracing::debug;

use crate::application::events::ServerEvent;

pub mod headless;
pub mod mock;

/// An input event captured on the primary screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalInput {
    /// A key was pressed.  `button` is the physical key (scan code).
    KeyDown { key: u16, mask: u16, button: u16 },
    /// A key auto-repeated `count` times.
    KeyRepeat {
        key: u16,
        mask: u16,
        count: u16,
        button: u16,
    },
    /// A key was released.
    KeyUp { key: u16, mask: u16, button: u16 },
    MouseDown(i8),
    MouseUp(i8),
    /// Wheel motion; 120 units per detent.
    Wheel { x_delta: i16, y_delta: i16 },
    /// Absolute cursor position on the primary screen, reported while the
    /// primary screen is active.
    MotionPrimary { x: i32, y: i32 },
    /// Relative motion, reported while a secondary screen is active and the
    /// primary has captured the mouse.
    MotionSecondary { dx: i32, dy: i32 },
    /// The local user copied something.
    ClipboardGrabbed(ClipboardId),
    /// New contents of a local clipboard the primary owns.
    ClipboardChanged { id: ClipboardId, data: Vec<u8> },
    /// The local screensaver started (`true`) or stopped.
    Screensaver(bool),
    /// Hotkey: change the explicit cursor lock.
    LockCursorToScreen(LockMode),
    /// Hotkey: jump to the named screen.
    SwitchToScreen(String),
    /// Hotkey: jump to the neighbor in a direction.
    SwitchInDirection(Direction),
}

/// How a lock hotkey changes the explicit cursor lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Off,
    On,
    Toggle,
}

/// Error type for input capture operations.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to start input capture: {0}")]
    StartFailed(String),
    #[error("capture service has already been stopped")]
    AlreadyStopped,
}

/// Trait abstracting input event production.
///
/// Platform implementations install OS hooks; tests use [`mock::MockInputSource`].
pub trait InputSource: Send {
    /// Starts the input source and returns a receiver for captured events.
    fn start(&self) -> Result<mpsc::Receiver<LocalInput>, CaptureError>;
    /// Stops the input source and releases all OS resources.
    fn stop(&self);
}

/// Actions the server performs on the local (primary) screen.
#[cfg_attr(test, mockall::automock)]
pub trait PrimaryScreen: Send {
    /// Gives the local desktop the input again and shows the cursor at `(x, y)`.
    /// The cursor is left where it is when entering for the screensaver.
    fn enter(&mut self, x: i32, y: i32, for_screensaver: bool);
    /// Captures keyboard and mouse for forwarding.  Returns `false` if the
    /// platform cannot capture, in which case the switch is abandoned.
    fn leave(&mut self) -> bool;
    /// `true` while any key or mouse button is held down locally.
    fn is_input_held(&self) -> bool;
    /// Held modifier bits (see `protocol::messages::modifiers`).
    fn active_modifiers(&self) -> u16;
    /// Toggled modifier bits (caps, num, scroll lock) sent with `CINN`.
    fn toggle_mask(&self) -> u16;
    /// Reads a local clipboard the primary owns.
    fn clipboard(&self, id: ClipboardId) -> Option<Vec<u8>>;
    /// Replaces a local clipboard with data copied on another screen.
    fn set_clipboard(&mut self, id: ClipboardId, data: &[u8]);
    /// Tells the local desktop another screen now owns clipboard `id`.
    fn grab_clipboard(&mut self, id: ClipboardId);
}

/// Moves captured events from the source's channel into the reactor.
///
/// Runs on a dedicated thread because [`mpsc::Receiver::recv`] blocks.  The
/// thread exits when the source stops or the reactor shuts down.
pub fn forward_input(
    rx: mpsc::Receiver<LocalInput>,
    sender: EventSender<ServerEvent>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while let Ok(input) = rx.recv() {
            if sender.is_shut_down() {
                break;
            }
            sender.post(Event::new(EventTarget::SYSTEM, ServerEvent::Input(input)));
        }
        debug!("input forwarding stopped");
    })
}
