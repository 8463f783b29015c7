//! Do-nothing platform adapters for running without a local desktop.
//!
//! The server still accepts clients, completes handshakes and keeps
//! heartbeats going; it just never sees local input, so the cursor stays on
//! the primary screen unless a hotkey event is injected by another source.

use std::sync::{mpsc, Mutex};

use edgeshare_core::ClipboardId;
use tracing::debug;

use super::{CaptureError, InputSource, LocalInput, PrimaryScreen};

/// [`PrimaryScreen`] that logs calls and keeps clipboards in memory.
#[derive(Debug, Default)]
pub struct HeadlessPrimary {
    clipboards: [Option<Vec<u8>>; ClipboardId::COUNT],
}

impl HeadlessPrimary {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PrimaryScreen for HeadlessPrimary {
    fn enter(&mut self, x: i32, y: i32, for_screensaver: bool) {
        debug!(x, y, for_screensaver, "headless primary entered");
    }

    fn leave(&mut self) -> bool {
        debug!("headless primary left");
        true
    }

    fn is_input_held(&self) -> bool {
        false
    }

    fn active_modifiers(&self) -> u16 {
        0
    }

    fn toggle_mask(&self) -> u16 {
        0
    }

    fn clipboard(&self, id: ClipboardId) -> Option<Vec<u8>> {
        self.clipboards[id.index()].clone()
    }

    fn set_clipboard(&mut self, id: ClipboardId, data: &[u8]) {
        self.clipboards[id.index()] = Some(data.to_vec());
    }

    fn grab_clipboard(&mut self, id: ClipboardId) {
        self.clipboards[id.index()] = None;
    }
}

/// [`InputSource`] that never produces events.
///
/// The sender is parked until [`stop`](InputSource::stop) so the receiving
/// side blocks instead of seeing a closed channel.
#[derive(Debug, Default)]
pub struct HeadlessInput {
    parked: Mutex<Option<mpsc::Sender<LocalInput>>>,
}

impl HeadlessInput {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InputSource for HeadlessInput {
    fn start(&self) -> Result<mpsc::Receiver<LocalInput>, CaptureError> {
        let (tx, rx) = mpsc::channel();
        let mut parked = self
            .parked
            .lock()
            .map_err(|_| CaptureError::StartFailed("input state poisoned".into()))?;
        *parked = Some(tx);
        Ok(rx)
    }

    fn stop(&self) {
        if let Ok(mut parked) = self.parked.lock() {
            parked.take();
        }
    }
}
