//! Test doubles for the input capture seams.
//!
//! [`MockInputSource`] lets tests inject synthetic [`LocalInput`]s without OS
//! hooks.  [`FakePrimaryScreen`] records every call the server makes on the
//! local screen and lets tests script what the local desktop reports (held
//! modifiers, clipboard contents).  Clones share state, so a test can keep one
//! handle while the server owns another.

use std::sync::{
    mpsc::{self, Sender},
    Arc, Mutex, MutexGuard,
};

use edgeshare_core::ClipboardId;

use super::{CaptureError, InputSource, LocalInput, PrimaryScreen};

/// A mock implementation of [`InputSource`] that allows tests to inject events.
pub struct MockInputSource {
    sender: Arc<Mutex<Option<Sender<LocalInput>>>>,
}

impl MockInputSource {
    pub fn new() -> Self {
        Self {
            sender: Arc::new(Mutex::new(None)),
        }
    }

    /// Injects a synthetic event, as if captured from hardware.
    ///
    /// Panics if `start()` has not been called or if `stop()` has been called.
    pub fn inject_event(&self, event: LocalInput) {
        let guard = self.sender.lock().expect("lock poisoned");
        if let Some(ref sender) = *guard {
            sender
                .send(event)
                .expect("receiver has been dropped; call start() first");
        } else {
            panic!("MockInputSource::inject_event called before start()");
        }
    }
}

impl Default for MockInputSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for MockInputSource {
    fn start(&self) -> Result<mpsc::Receiver<LocalInput>, CaptureError> {
        let (tx, rx) = mpsc::channel();
        *self.sender.lock().expect("lock poisoned") = Some(tx);
        Ok(rx)
    }

    fn stop(&self) {
        // Drop the sender to close the channel
        *self.sender.lock().expect("lock poisoned") = None;
    }
}

// ── FakePrimaryScreen ─────────────────────────────────────────────────────────

/// One call made on a [`FakePrimaryScreen`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryCall {
    Enter { x: i32, y: i32, for_screensaver: bool },
    Leave,
    SetClipboard { id: ClipboardId, data: Vec<u8> },
    GrabClipboard(ClipboardId),
}

#[derive(Debug, Default)]
struct FakeState {
    calls: Vec<PrimaryCall>,
    refuse_leave: bool,
    input_held: bool,
    modifiers: u16,
    toggles: u16,
    clipboards: [Option<Vec<u8>>; ClipboardId::COUNT],
}

/// Recording [`PrimaryScreen`] for integration tests.
#[derive(Debug, Clone, Default)]
pub struct FakePrimaryScreen {
    state: Arc<Mutex<FakeState>>,
}

impl FakePrimaryScreen {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("lock poisoned")
    }

    /// Every call recorded so far, oldest first.
    pub fn calls(&self) -> Vec<PrimaryCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Makes subsequent `leave` calls fail.
    pub fn refuse_leave(&self, refuse: bool) {
        self.state().refuse_leave = refuse;
    }

    pub fn set_input_held(&self, held: bool) {
        self.state().input_held = held;
    }

    pub fn set_modifiers(&self, mask: u16) {
        self.state().modifiers = mask;
    }

    pub fn set_toggles(&self, mask: u16) {
        self.state().toggles = mask;
    }

    /// Contents the local desktop reports for clipboard `id`.
    pub fn set_local_clipboard(&self, id: ClipboardId, data: &[u8]) {
        self.state().clipboards[id.index()] = Some(data.to_vec());
    }

    pub fn local_clipboard(&self, id: ClipboardId) -> Option<Vec<u8>> {
        self.state().clipboards[id.index()].clone()
    }
}

impl PrimaryScreen for FakePrimaryScreen {
    fn enter(&mut self, x: i32, y: i32, for_screensaver: bool) {
        self.state().calls.push(PrimaryCall::Enter {
            x,
            y,
            for_screensaver,
        });
    }

    fn leave(&mut self) -> bool {
        let mut state = self.state();
        state.calls.push(PrimaryCall::Leave);
        !state.refuse_leave
    }

    fn is_input_held(&self) -> bool {
        self.state().input_held
    }

    fn active_modifiers(&self) -> u16 {
        self.state().modifiers
    }

    fn toggle_mask(&self) -> u16 {
        self.state().toggles
    }

    fn clipboard(&self, id: ClipboardId) -> Option<Vec<u8>> {
        self.local_clipboard(id)
    }

    fn set_clipboard(&mut self, id: ClipboardId, data: &[u8]) {
        let mut state = self.state();
        state.clipboards[id.index()] = Some(data.to_vec());
        state.calls.push(PrimaryCall::SetClipboard {
            id,
            data: data.to_vec(),
        });
    }

    fn grab_clipboard(&mut self, id: ClipboardId) {
        self.state().calls.push(PrimaryCall::GrabClipboard(id));
    }
}
