//! [`ServerCore`]: the state every reactor handler works on.
//!
//! # Responsibilities (for beginners)
//!
//! The core owns the screen topology, the table of client sessions, the
//! clipboard cache and the [`SwitchController`].  It reacts to four kinds of
//! events:
//!
//! - **Local input** from the primary screen: keys, buttons and the wheel are
//!   relayed to the active secondary screen; motion goes to the controller.
//! - **New connections**: a session is created and the handshake starts with
//!   a `Hello`.
//! - **Inbound bytes** from a session: decoded and handled according to the
//!   session's handshake phase.
//! - **Timers**: the switch delay, the handshake timeout and heartbeats.
//!
//! Failures are local to one session.  A failed write or a protocol error
//! closes that session and nothing else; if it was the active screen, the
//! input returns to the primary.

use std::time::Duration;

use edgeshare_core::domain::clipboard::{ClipboardInfo, GrabOutcome, UpdateOutcome};
use edgeshare_core::event::{Event, EventTarget, TimerId};
use edgeshare_core::protocol::{
    options, Decoded, Heartbeat, HeartbeatAction, Message, OptionPair, ScreenInfo,
    MAX_FRAME_LEN, MIN_PROTOCOL_VERSION, PROTOCOL_VERSION,
};
use edgeshare_core::{ClipboardId, ClipboardTable, ScreenShape, ScreenTopology, TopologyError};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::application::events::{NewConnection, Scheduler, ServerEvent, ServerEventKind};
use crate::application::session::{ClientSession, SessionPhase, SessionTable};
use crate::application::switch_controller::{ScreenPort, SwitchContext, SwitchController, SwitchPolicy};
use crate::infrastructure::input_capture::{LocalInput, PrimaryScreen};

/// Error building a [`ServerCore`].
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("primary screen '{0}' is not in the topology")]
    UnknownPrimary(String),
    #[error(transparent)]
    Topology(#[from] TopologyError),
}

/// Runtime settings derived from the configuration.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub policy: SwitchPolicy,
    /// Heartbeat period.  Zero disables heartbeats.
    pub heart_rate: Duration,
    pub beats_until_death: u32,
    /// Time a client has to complete the handshake.  Zero disables the limit.
    pub handshake_timeout: Duration,
    pub screensaver_sync: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            policy: SwitchPolicy::default(),
            heart_rate: Duration::from_secs(3),
            beats_until_death: 3,
            handshake_timeout: Duration::from_secs(30),
            screensaver_sync: true,
        }
    }
}

impl ServerSettings {
    /// The `DSOP` option list sent to `screen` once it is ready.
    pub fn options_for(&self, screen: &str) -> Vec<OptionPair> {
        let corners = self.policy.corners_for(screen);
        vec![
            (options::HEARTBEAT, millis(self.heart_rate)),
            (options::SWITCH_DELAY, millis(self.policy.delay)),
            (options::SWITCH_TWO_TAP, millis(self.policy.two_tap)),
            (options::RELATIVE_MOUSE_MOVES, i32::from(self.policy.relative_moves)),
            (options::SWITCH_CORNERS, i32::from(corners.mask.0)),
            (options::SWITCH_CORNER_SIZE, corners.size),
            (options::SCREENSAVER_SYNC, i32::from(self.screensaver_sync)),
        ]
    }
}

fn millis(d: Duration) -> i32 {
    i32::try_from(d.as_millis()).unwrap_or(i32::MAX)
}

/// Saturates a screen coordinate into the 16-bit wire range.
fn wire_coord(v: i32) -> i16 {
    v.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

// ── ScreenRoster ──────────────────────────────────────────────────────────────

/// Screens, sessions and clipboards: the part of the core the switch
/// controller acts on through [`ScreenPort`].
pub struct ScreenRoster {
    topology: ScreenTopology,
    primary_name: String,
    active: String,
    primary: Box<dyn PrimaryScreen>,
    sessions: SessionTable,
    clipboards: ClipboardTable,
    primary_clipboard_current: [bool; ClipboardId::COUNT],
    /// Sessions whose last write failed; closed after the current handler.
    broken: Vec<EventTarget>,
}

impl ScreenRoster {
    fn send_to(&mut self, target: EventTarget, msg: &Message) {
        let Some(session) = self.sessions.get_mut(target) else {
            return;
        };
        if let Err(err) = session.send(msg) {
            warn!(screen = %session.label(), error = %err, "send failed");
            self.broken.push(target);
        }
    }

    fn send_to_screen(&mut self, screen: &str, msg: &Message) {
        if let Some(target) = self.sessions.target_of(screen) {
            self.send_to(target, msg);
        }
    }

    /// Sends `msg` to every ready session except `except`.
    fn broadcast(&mut self, except: Option<&str>, msg: &Message) {
        for session in self.sessions.ready_mut() {
            if except.is_some() && session.name() == except {
                continue;
            }
            if let Err(err) = session.send(msg) {
                warn!(screen = %session.label(), error = %err, "send failed");
                self.broken.push(session.target);
            }
        }
    }

    /// After `owner` took or changed clipboard `id`, nobody else holds the
    /// current contents.
    fn mark_clipboard_stale(&mut self, id: ClipboardId, owner: &str) {
        for session in self.sessions.ready_mut() {
            let is_owner = session.name() == Some(owner);
            session.set_clipboard_current(id, is_owner);
        }
        self.primary_clipboard_current[id.index()] = owner == self.primary_name;
    }
}

impl ScreenPort for ScreenRoster {
    fn topology(&self) -> &ScreenTopology {
        &self.topology
    }

    fn primary(&self) -> &str {
        &self.primary_name
    }

    fn active(&self) -> &str {
        &self.active
    }

    fn set_active(&mut self, screen: &str) {
        self.active = screen.to_string();
    }

    fn is_input_held(&self) -> bool {
        self.primary.is_input_held()
    }

    fn active_modifiers(&self) -> u16 {
        self.primary.active_modifiers()
    }

    fn toggle_mask(&self) -> u16 {
        self.primary.toggle_mask()
    }

    fn flush_clipboards(&mut self, leaving: &str) {
        // Secondary screens send their own data when they leave.
        if leaving != self.primary_name {
            return;
        }
        let owned: Vec<ClipboardId> = self.clipboards.owned_by(&self.primary_name).collect();
        for id in owned {
            let Some(data) = self.primary.clipboard(id) else {
                continue;
            };
            let seq = self.clipboards.get(id).seq;
            if self.clipboards.update(&self.primary_name, id, seq, data) == UpdateOutcome::Changed {
                let primary = self.primary_name.clone();
                self.mark_clipboard_stale(id, &primary);
            }
        }
    }

    fn leave(&mut self, screen: &str) -> bool {
        if screen == self.primary_name {
            return self.primary.leave();
        }
        self.send_to_screen(screen, &Message::Leave);
        true
    }

    fn enter(&mut self, screen: &str, x: i32, y: i32, seq: u32, mask: u16, for_screensaver: bool) {
        if screen == self.primary_name {
            self.primary.enter(x, y, for_screensaver);
            return;
        }
        let msg = Message::Enter {
            x: wire_coord(x),
            y: wire_coord(y),
            seq,
            mask,
        };
        self.send_to_screen(screen, &msg);
    }

    fn push_clipboards(&mut self, screen: &str) {
        for id in ClipboardId::ALL {
            let info = self.clipboards.get(id);
            if !info.ready || info.owner.as_deref() == Some(screen) {
                continue;
            }
            if screen == self.primary_name {
                if !self.primary_clipboard_current[id.index()] {
                    self.primary.set_clipboard(id, &info.data);
                    self.primary_clipboard_current[id.index()] = true;
                }
                continue;
            }
            let msg = Message::ClipboardData {
                id,
                seq: info.seq,
                data: info.data.clone(),
            };
            let Some(target) = self.sessions.target_of(screen) else {
                continue;
            };
            let current = self
                .sessions
                .get(target)
                .map_or(true, |s| s.is_clipboard_current(id));
            if current {
                continue;
            }
            self.send_to(target, &msg);
            if let Some(session) = self.sessions.get_mut(target) {
                session.set_clipboard_current(id, true);
            }
        }
    }

    fn mouse_move(&mut self, screen: &str, x: i32, y: i32) {
        let msg = Message::MouseMove {
            x: wire_coord(x),
            y: wire_coord(y),
        };
        self.send_to_screen(screen, &msg);
    }

    fn relative_move(&mut self, screen: &str, dx: i32, dy: i32) {
        let msg = Message::MouseRelMove {
            dx: wire_coord(dx),
            dy: wire_coord(dy),
        };
        self.send_to_screen(screen, &msg);
    }
}

// ── ServerCore ────────────────────────────────────────────────────────────────

pub struct ServerCore {
    screens: ScreenRoster,
    switch: SwitchController,
    settings: ServerSettings,
}

fn switch_ctx<'a>(screens: &'a mut ScreenRoster, sched: &'a mut Scheduler) -> SwitchContext<'a> {
    SwitchContext {
        port: screens,
        timers: sched,
        now: Instant::now(),
    }
}

impl ServerCore {
    /// Builds the core with the primary screen connected and active.
    ///
    /// # Errors
    ///
    /// [`CoreError::UnknownPrimary`] if `primary_name` is not in `topology`.
    pub fn new(
        mut topology: ScreenTopology,
        primary_name: &str,
        primary: Box<dyn PrimaryScreen>,
        settings: ServerSettings,
    ) -> Result<Self, CoreError> {
        let Some(shape) = topology.shape(primary_name) else {
            return Err(CoreError::UnknownPrimary(primary_name.to_string()));
        };
        topology.set_connected(primary_name, true)?;

        let mut switch = SwitchController::new(settings.policy.clone(), EventTarget::SYSTEM);
        let (x, y) = shape.center();
        switch.set_position(x, y);

        Ok(Self {
            screens: ScreenRoster {
                topology,
                primary_name: primary_name.to_string(),
                active: primary_name.to_string(),
                primary,
                sessions: SessionTable::new(),
                clipboards: ClipboardTable::new(),
                primary_clipboard_current: [true; ClipboardId::COUNT],
                broken: Vec::new(),
            },
            switch,
            settings,
        })
    }

    /// Registers the process-wide handlers: local input, new connections and
    /// the switch delay timer.
    pub fn install_handlers(sched: &mut Scheduler) {
        sched.set_wildcard_handler(
            ServerEventKind::Input,
            Box::new(|core: &mut ServerCore, sched: &mut Scheduler, ev: Event<ServerEvent>| {
                if let ServerEvent::Input(input) = ev.into_payload() {
                    core.on_local_input(sched, input);
                }
                core.reap(sched);
            }),
        );
        sched.set_wildcard_handler(
            ServerEventKind::Connected,
            Box::new(|core: &mut ServerCore, sched: &mut Scheduler, ev: Event<ServerEvent>| {
                if let ServerEvent::Connected(conn) = ev.into_payload() {
                    core.on_connected(sched, conn);
                }
                core.reap(sched);
            }),
        );
        sched.set_handler(
            ServerEventKind::Timer,
            EventTarget::SYSTEM,
            Box::new(|core: &mut ServerCore, sched: &mut Scheduler, ev: Event<ServerEvent>| {
                if let ServerEvent::Timer(fired) = ev.into_payload() {
                    let mut ctx = switch_ctx(&mut core.screens, sched);
                    core.switch.handle_wait_timeout(&mut ctx, fired.timer);
                }
                core.reap(sched);
            }),
        );
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    pub fn active_screen(&self) -> &str {
        &self.screens.active
    }

    pub fn primary_screen(&self) -> &str {
        &self.screens.primary_name
    }

    /// Sequence number of the most recent `enter`.
    pub fn seq(&self) -> u32 {
        self.switch.seq()
    }

    pub fn is_connected(&self, screen: &str) -> bool {
        self.screens.topology.is_connected(screen)
    }

    pub fn session_count(&self) -> usize {
        self.screens.sessions.len()
    }

    pub fn clipboard(&self, id: ClipboardId) -> &ClipboardInfo {
        self.screens.clipboards.get(id)
    }

    pub fn topology(&self) -> &ScreenTopology {
        &self.screens.topology
    }

    pub fn is_locked(&self) -> bool {
        self.switch.is_locked_explicitly()
    }

    // ── Connections ───────────────────────────────────────────────────────────

    fn on_connected(&mut self, sched: &mut Scheduler, conn: NewConnection) {
        let target = conn.target;
        info!(peer = %conn.peer, id = %conn.id, "client connected");

        let heartbeat = Heartbeat::new(self.settings.heart_rate, self.settings.beats_until_death);
        let mut session = ClientSession::new(conn, heartbeat);

        sched.set_handler(
            ServerEventKind::Received,
            target,
            Box::new(|core: &mut ServerCore, sched: &mut Scheduler, ev: Event<ServerEvent>| {
                let target = ev.target();
                if let ServerEvent::Received(bytes) = ev.into_payload() {
                    core.on_received(sched, target, &bytes);
                }
                core.reap(sched);
            }),
        );
        sched.set_handler(
            ServerEventKind::Hangup,
            target,
            Box::new(|core: &mut ServerCore, sched: &mut Scheduler, ev: Event<ServerEvent>| {
                core.on_hangup(sched, ev.target());
                core.reap(sched);
            }),
        );
        sched.set_handler(
            ServerEventKind::Timer,
            target,
            Box::new(|core: &mut ServerCore, sched: &mut Scheduler, ev: Event<ServerEvent>| {
                let target = ev.target();
                if let ServerEvent::Timer(fired) = ev.into_payload() {
                    core.on_session_timer(sched, target, fired.timer);
                }
                core.reap(sched);
            }),
        );

        if !self.settings.handshake_timeout.is_zero() {
            session.handshake_timer = Some(sched.new_timer(self.settings.handshake_timeout, target, true));
        }
        self.screens.sessions.insert(session);
        self.screens.send_to(target, &Message::Hello(PROTOCOL_VERSION));
    }

    fn on_received(&mut self, sched: &mut Scheduler, target: EventTarget, bytes: &[u8]) {
        let Some(session) = self.screens.sessions.get_mut(target) else {
            return;
        };
        session.heartbeat.record_inbound();
        session.reader.feed(bytes);
        self.drain(sched, target);
    }

    fn on_hangup(&mut self, sched: &mut Scheduler, target: EventTarget) {
        let Some(session) = self.screens.sessions.get_mut(target) else {
            return;
        };
        session.reader.mark_eof();
        self.drain(sched, target);
    }

    /// Handles every complete message buffered for `target`.
    fn drain(&mut self, sched: &mut Scheduler, target: EventTarget) {
        loop {
            let Some(session) = self.screens.sessions.get_mut(target) else {
                return;
            };
            match session.reader.next_message() {
                Ok(Decoded::Message(msg)) => self.on_message(sched, target, msg),
                Ok(Decoded::Incomplete) => return,
                Ok(Decoded::Hangup) => {
                    info!(screen = %session.label(), "client hung up");
                    self.disconnect(sched, target);
                    return;
                }
                Err(err) => {
                    warn!(screen = %session.label(), error = %err, "protocol error");
                    self.reject(sched, target);
                    return;
                }
            }
        }
    }

    fn on_message(&mut self, sched: &mut Scheduler, target: EventTarget, msg: Message) {
        let Some(session) = self.screens.sessions.get(target) else {
            return;
        };
        match session.phase {
            SessionPhase::AwaitingHello => self.on_hello_back(sched, target, msg),
            SessionPhase::AwaitingInfo => self.on_first_info(sched, target, msg),
            SessionPhase::Ready => self.on_ready_message(sched, target, msg),
        }
    }

    fn on_hello_back(&mut self, sched: &mut Scheduler, target: EventTarget, msg: Message) {
        let (version, name) = match msg {
            Message::HelloBack { version, name } => (version, name),
            other => {
                warn!(msg = %other.name(), "expected hello back");
                self.refuse(sched, target, Message::UnknownClient);
                return;
            }
        };
        if !version.satisfies(MIN_PROTOCOL_VERSION) {
            warn!(screen = %name, %version, "incompatible client version");
            self.refuse(sched, target, Message::Incompatible(version));
            return;
        }
        if name == self.screens.primary_name || !self.screens.topology.contains(&name) {
            warn!(screen = %name, "unknown client");
            self.refuse(sched, target, Message::UnknownClient);
            return;
        }
        if self.screens.topology.is_connected(&name) || !self.screens.sessions.bind_name(target, &name) {
            warn!(screen = %name, "duplicate client name");
            self.refuse(sched, target, Message::Busy);
            return;
        }

        if let Some(session) = self.screens.sessions.get_mut(target) {
            session.phase = SessionPhase::AwaitingInfo;
            session.reader.set_frame_limit(MAX_FRAME_LEN);
        }
        info!(screen = %name, %version, "client accepted");
        self.screens.send_to(target, &Message::QueryInfo);
    }

    fn on_first_info(&mut self, sched: &mut Scheduler, target: EventTarget, msg: Message) {
        let info = match msg {
            Message::Info(info) => info,
            Message::Noop => return,
            other => {
                warn!(msg = %other.name(), "expected screen info");
                self.reject(sched, target);
                return;
            }
        };
        let Some(name) = self.session_name(target) else {
            return;
        };
        if !self.apply_info(&name, &info) {
            self.reject(sched, target);
            return;
        }
        if let Err(err) = self.screens.topology.set_connected(&name, true) {
            warn!(screen = %name, error = %err, "cannot mark screen connected");
            self.reject(sched, target);
            return;
        }

        let opts = self.settings.options_for(&name);
        let Some(session) = self.screens.sessions.get_mut(target) else {
            return;
        };
        if let Some(timer) = session.handshake_timer.take() {
            sched.cancel_timer(timer);
        }
        session.phase = SessionPhase::Ready;
        if session.heartbeat.is_enabled() {
            let rate = session.heartbeat.rate();
            session.heartbeat_timer = Some(sched.new_timer(rate, target, false));
        }

        self.screens.send_to(target, &Message::InfoAck);
        self.screens.send_to(target, &Message::ResetOptions);
        self.screens.send_to(target, &Message::SetOptions(opts));
        info!(screen = %name, width = info.width, height = info.height, "screen connected");
    }

    /// Validates a `DINF` and stores the shape.  Returns `false` if invalid.
    fn apply_info(&mut self, name: &str, info: &ScreenInfo) -> bool {
        if !info.is_valid() {
            warn!(screen = name, ?info, "invalid screen info");
            return false;
        }
        let shape = ScreenShape::new(
            i32::from(info.width),
            i32::from(info.height),
            i32::from(info.jump_zone),
        );
        match self.screens.topology.set_shape(name, shape) {
            Ok(()) => true,
            Err(err) => {
                warn!(screen = name, error = %err, "cannot apply screen info");
                false
            }
        }
    }

    fn on_ready_message(&mut self, sched: &mut Scheduler, target: EventTarget, msg: Message) {
        let Some(name) = self.session_name(target) else {
            return;
        };
        match msg {
            Message::Noop => {}
            Message::Info(info) => {
                if !self.apply_info(&name, &info) {
                    self.reject(sched, target);
                    return;
                }
                self.screens.send_to(target, &Message::InfoAck);
                if self.screens.active == name {
                    self.switch
                        .set_position(i32::from(info.cursor_x), i32::from(info.cursor_y));
                }
                debug!(screen = %name, ?info, "screen info changed");
            }
            Message::ClipboardGrab { id, seq } => self.on_clipboard_grab(&name, false, id, seq),
            Message::ClipboardData { id, seq, data } => self.on_clipboard_data(&name, id, seq, data),
            other => {
                warn!(screen = %name, msg = %other.name(), "unexpected message");
                self.reject(sched, target);
            }
        }
    }

    fn session_name(&self, target: EventTarget) -> Option<String> {
        self.screens
            .sessions
            .get(target)
            .and_then(|s| s.name())
            .map(str::to_string)
    }

    /// Answers a protocol violation: `EUNK` during the handshake, `EBAD` after.
    fn reject(&mut self, sched: &mut Scheduler, target: EventTarget) {
        let ready = self
            .screens
            .sessions
            .get(target)
            .map_or(false, |s| s.is_ready());
        let reply = if ready {
            Message::BadProtocol
        } else {
            Message::UnknownClient
        };
        self.refuse(sched, target, reply);
    }

    /// Sends an error message and closes the session.
    fn refuse(&mut self, sched: &mut Scheduler, target: EventTarget, reply: Message) {
        if let Some(session) = self.screens.sessions.get_mut(target) {
            info!(screen = %session.label(), reply = %reply.name(), "refusing client");
            let _ = session.send(&reply);
        }
        self.disconnect(sched, target);
    }

    /// Closes a session: handlers and timers go, and a screen that was
    /// connected is marked disconnected.
    fn disconnect(&mut self, sched: &mut Scheduler, target: EventTarget) {
        sched.remove_handlers_for(target);
        let Some(mut session) = self.screens.sessions.remove(target) else {
            return;
        };
        for timer in [session.heartbeat_timer.take(), session.handshake_timer.take()]
            .into_iter()
            .flatten()
        {
            sched.cancel_timer(timer);
        }
        session.close();
        info!(screen = %session.label(), id = %session.id, "client disconnected");

        if !session.is_ready() {
            return;
        }
        let Some(name) = session.name().map(str::to_string) else {
            return;
        };
        if let Err(err) = self.screens.topology.set_connected(&name, false) {
            debug!(screen = %name, error = %err, "disconnected screen left the topology");
        }
        let mut ctx = switch_ctx(&mut self.screens, sched);
        self.switch.force_to_primary(&mut ctx, &name);
    }

    fn on_session_timer(&mut self, sched: &mut Scheduler, target: EventTarget, timer: TimerId) {
        let Some(session) = self.screens.sessions.get_mut(target) else {
            return;
        };
        if session.handshake_timer == Some(timer) {
            session.handshake_timer = None;
            warn!(screen = %session.label(), "handshake timed out");
            self.disconnect(sched, target);
            return;
        }
        if session.heartbeat_timer != Some(timer) {
            return;
        }
        match session.heartbeat.tick() {
            HeartbeatAction::Alive => {}
            HeartbeatAction::SendNoop => {
                if let Err(err) = session.send(&Message::Noop) {
                    warn!(screen = %session.label(), error = %err, "heartbeat send failed");
                    self.disconnect(sched, target);
                }
            }
            HeartbeatAction::Flatline => {
                warn!(
                    screen = %session.label(),
                    missed = session.heartbeat.missed(),
                    "heartbeat flatline"
                );
                self.disconnect(sched, target);
            }
        }
    }

    /// Closes every session whose write failed during the last handler.
    fn reap(&mut self, sched: &mut Scheduler) {
        while let Some(target) = self.screens.broken.pop() {
            self.disconnect(sched, target);
        }
    }

    // ── Clipboards ────────────────────────────────────────────────────────────

    fn on_clipboard_grab(&mut self, grabber: &str, from_primary: bool, id: ClipboardId, seq: u32) {
        if self.screens.clipboards.grab(grabber, from_primary, id, seq) == GrabOutcome::Stale {
            debug!(screen = grabber, %id, seq, "stale clipboard grab ignored");
            return;
        }
        info!(screen = grabber, %id, seq, "clipboard grabbed");
        self.screens.mark_clipboard_stale(id, grabber);

        let seq = self.screens.clipboards.get(id).seq;
        self.screens
            .broadcast(Some(grabber), &Message::ClipboardGrab { id, seq });
        if !from_primary {
            self.screens.primary.grab_clipboard(id);
        }
    }

    fn on_clipboard_data(&mut self, sender: &str, id: ClipboardId, seq: u32, data: Vec<u8>) {
        match self.screens.clipboards.update(sender, id, seq, data) {
            UpdateOutcome::Changed => {
                debug!(screen = sender, %id, seq, "clipboard changed");
                self.screens.mark_clipboard_stale(id, sender);
                let active = self.screens.active.clone();
                if active != sender {
                    self.screens.push_clipboards(&active);
                }
            }
            outcome => debug!(screen = sender, %id, seq, ?outcome, "clipboard update ignored"),
        }
    }

    // ── Local input ───────────────────────────────────────────────────────────

    fn on_local_input(&mut self, sched: &mut Scheduler, input: LocalInput) {
        match input {
            LocalInput::KeyDown { key, mask, button } => {
                self.relay(&Message::KeyDown { key, mask, button })
            }
            LocalInput::KeyRepeat {
                key,
                mask,
                count,
                button,
            } => self.relay(&Message::KeyRepeat {
                key,
                mask,
                count,
                button,
            }),
            LocalInput::KeyUp { key, mask, button } => {
                self.relay(&Message::KeyUp { key, mask, button })
            }
            LocalInput::MouseDown(button) => self.relay(&Message::MouseDown(button)),
            LocalInput::MouseUp(button) => self.relay(&Message::MouseUp(button)),
            LocalInput::Wheel { x_delta, y_delta } => {
                self.relay(&Message::MouseWheel { x_delta, y_delta })
            }
            LocalInput::MotionPrimary { x, y } => {
                let mut ctx = switch_ctx(&mut self.screens, sched);
                self.switch.on_motion_primary(&mut ctx, x, y);
            }
            LocalInput::MotionSecondary { dx, dy } => {
                let mut ctx = switch_ctx(&mut self.screens, sched);
                self.switch.on_motion_secondary(&mut ctx, dx, dy);
            }
            LocalInput::ClipboardGrabbed(id) => {
                let primary = self.screens.primary_name.clone();
                let seq = self.switch.seq();
                self.on_clipboard_grab(&primary, true, id, seq);
            }
            LocalInput::ClipboardChanged { id, data } => {
                let primary = self.screens.primary_name.clone();
                if self.screens.clipboards.get(id).owner.as_deref() != Some(primary.as_str()) {
                    let seq = self.switch.seq();
                    self.on_clipboard_grab(&primary, true, id, seq);
                }
                let seq = self.screens.clipboards.get(id).seq;
                self.on_clipboard_data(&primary, id, seq, data);
            }
            LocalInput::Screensaver(activated) => {
                if !self.settings.screensaver_sync {
                    return;
                }
                let mut ctx = switch_ctx(&mut self.screens, sched);
                self.switch.on_screensaver(&mut ctx, activated);
                self.screens
                    .broadcast(None, &Message::Screensaver(activated));
            }
            LocalInput::LockCursorToScreen(mode) => self.switch.set_lock(mode),
            LocalInput::SwitchToScreen(screen) => {
                let mut ctx = switch_ctx(&mut self.screens, sched);
                self.switch.jump_to_screen(&mut ctx, &screen);
            }
            LocalInput::SwitchInDirection(direction) => {
                let mut ctx = switch_ctx(&mut self.screens, sched);
                self.switch.jump_in_direction(&mut ctx, direction);
            }
        }
    }

    /// Forwards keyboard and button input to the active secondary screen.
    fn relay(&mut self, msg: &Message) {
        if self.screens.active == self.screens.primary_name {
            return;
        }
        let active = self.screens.active.clone();
        self.screens.send_to_screen(&active, msg);
    }

    // ── Shutdown ──────────────────────────────────────────────────────────────

    /// Sends `CBYE` to every session and closes it.
    pub fn shutdown(&mut self) {
        let targets = self.screens.sessions.targets();
        let count = targets.len();
        for target in targets {
            if let Some(mut session) = self.screens.sessions.remove(target) {
                let _ = session.send(&Message::Close);
                session.close();
                if let Some(name) = session.name() {
                    let _ = self.screens.topology.set_connected(name, false);
                }
            }
        }
        info!(sessions = count, "server shut down");
    }
}
