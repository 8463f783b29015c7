//! The switch controller: decides when the cursor moves to another screen.
//!
//! # How a switch happens (for beginners)
//!
//! Every mouse motion is reported to the controller.  While the cursor is on
//! the primary screen the OS reports absolute positions
//! ([`on_motion_primary`](SwitchController::on_motion_primary)); while a
//! secondary screen is active the primary has captured the mouse and reports
//! deltas, which the controller integrates itself
//! ([`on_motion_secondary`](SwitchController::on_motion_secondary)).
//!
//! When the cursor reaches an edge that has a connected neighbor, the switch
//! still has to pass a series of gates before it is committed:
//!
//! 1. the cursor must not sit in a masked corner;
//! 2. the cursor must not be locked to the screen (explicit lock, or a key
//!    or mouse button held down, e.g. during a drag);
//! 3. the configured modifier keys, if any, must be held;
//! 4. with double-tap enabled, the edge must be hit twice within the window,
//!    leaving the edge in between;
//! 5. with a switch delay, the cursor must keep pointing off-screen until the
//!    delay timer fires.
//!
//! A committed switch sends `leave` to the old screen, advances the enter
//! sequence number and sends `enter` to the new one.  It runs within a single
//! reactor turn, so two switches can never interleave their messages.
//!
//! The controller never talks to sessions or the platform directly.  It acts
//! through the [`ScreenPort`] trait, and starts its delay timer through
//! [`TimerService`], so it is tested with a recording port and a bare timer
//! queue.

use std::collections::HashMap;
use std::time::Duration;

use edgeshare_core::event::{EventTarget, TimerId, TimerService};
use edgeshare_core::protocol::{modifiers, EnterSequence};
use edgeshare_core::{CornerMask, Direction, Landing, ScreenShape, ScreenTopology};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::infrastructure::input_capture::LockMode;

/// Minimum margin the cursor must clear after a first tap to arm the second.
const TWO_TAP_ZONE: i32 = 3;

// ── Policy ────────────────────────────────────────────────────────────────────

/// Corners in which switching is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CornerSettings {
    pub mask: CornerMask,
    /// Side length of each corner square, in pixels.
    pub size: i32,
}

/// Switching rules taken from the configuration.
#[derive(Debug, Clone, Default)]
pub struct SwitchPolicy {
    /// Time the cursor must rest against an edge before switching.  Zero disables.
    pub delay: Duration,
    /// Window for the second tap of a double-tap.  Zero disables.
    pub two_tap: Duration,
    /// Modifier mask that must be held exactly for a switch.  Zero disables.
    pub required_modifiers: u16,
    pub corners: CornerSettings,
    /// Per-screen overrides of [`corners`](Self::corners).
    pub screen_corners: HashMap<String, CornerSettings>,
    /// Forward relative motion while locked to a secondary screen.
    pub relative_moves: bool,
}

impl SwitchPolicy {
    pub fn corners_for(&self, screen: &str) -> CornerSettings {
        self.screen_corners
            .get(screen)
            .copied()
            .unwrap_or(self.corners)
    }
}

// ── Port ──────────────────────────────────────────────────────────────────────

/// Everything the controller needs from the rest of the server.
pub trait ScreenPort {
    fn topology(&self) -> &ScreenTopology;
    fn primary(&self) -> &str;
    fn active(&self) -> &str;
    fn set_active(&mut self, screen: &str);

    /// `true` while a key or mouse button is held on the primary.
    fn is_input_held(&self) -> bool;
    fn active_modifiers(&self) -> u16;
    fn toggle_mask(&self) -> u16;

    /// Pulls pending clipboard contents from a screen that is about to lose
    /// the input.
    fn flush_clipboards(&mut self, leaving: &str);
    /// Returns `false` if the screen refused to give up the input.
    fn leave(&mut self, screen: &str) -> bool;
    fn enter(&mut self, screen: &str, x: i32, y: i32, seq: u32, mask: u16, for_screensaver: bool);
    /// Sends the screen every clipboard it does not hold yet.
    fn push_clipboards(&mut self, screen: &str);

    fn mouse_move(&mut self, screen: &str, x: i32, y: i32);
    fn relative_move(&mut self, screen: &str, dx: i32, dy: i32);
}

/// Borrowed collaborators for one controller call.
pub struct SwitchContext<'a> {
    pub port: &'a mut dyn ScreenPort,
    pub timers: &'a mut dyn TimerService,
    pub now: Instant,
}

// ── State ─────────────────────────────────────────────────────────────────────

/// The edge crossing currently being considered.
#[derive(Debug, Default)]
struct PendingSwitch {
    direction: Option<Direction>,
    screen: Option<String>,
    /// The double-tap gate passed for this crossing.
    tapped: bool,
}

#[derive(Debug)]
struct SwitchWait {
    timer: TimerId,
    landing: Landing,
}

#[derive(Debug, Default)]
struct TwoTap {
    /// A first tap happened.
    engaged: bool,
    /// The cursor left the tap zone after the first tap.
    armed: bool,
    started: Option<Instant>,
}

impl TwoTap {
    fn start(&mut self, now: Instant) {
        self.engaged = true;
        self.armed = false;
        self.started = Some(now);
    }

    fn stop(&mut self) {
        *self = Self::default();
    }

    fn elapsed(&self, now: Instant) -> Duration {
        self.started
            .map_or(Duration::MAX, |s| now.saturating_duration_since(s))
    }
}

#[derive(Debug, Clone)]
struct SaverReturn {
    screen: String,
    x: i32,
    y: i32,
}

/// Decides whether, where and when the input moves to another screen.
#[derive(Debug)]
pub struct SwitchController {
    policy: SwitchPolicy,
    /// Target the delay timer is started on.
    timer_target: EventTarget,
    seq: EnterSequence,
    /// Cursor position on the active screen.
    x: i32,
    y: i32,
    pending: PendingSwitch,
    wait: Option<SwitchWait>,
    tap: TwoTap,
    locked: bool,
    /// Where the cursor was when a hotkey jump last left each screen.
    jump_positions: HashMap<String, (i32, i32)>,
    saver: Option<SaverReturn>,
}

impl SwitchController {
    pub fn new(policy: SwitchPolicy, timer_target: EventTarget) -> Self {
        Self {
            policy,
            timer_target,
            seq: EnterSequence::new(),
            x: 0,
            y: 0,
            pending: PendingSwitch::default(),
            wait: None,
            tap: TwoTap::default(),
            locked: false,
            jump_positions: HashMap::new(),
            saver: None,
        }
    }

    pub fn policy(&self) -> &SwitchPolicy {
        &self.policy
    }

    /// Sequence number of the most recent `enter`.
    pub fn seq(&self) -> u32 {
        self.seq.current()
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    /// Overrides the tracked cursor position, e.g. when the active screen
    /// reports where its cursor really is.
    pub fn set_position(&mut self, x: i32, y: i32) {
        self.x = x;
        self.y = y;
    }

    pub fn is_locked_explicitly(&self) -> bool {
        self.locked
    }

    /// `true` while a delay timer runs or a first tap awaits its second.
    pub fn is_switch_pending(&self) -> bool {
        self.wait.is_some() || self.tap.engaged
    }

    fn is_locked(&self, port: &dyn ScreenPort) -> bool {
        self.locked || port.is_input_held()
    }

    // ── Motion ────────────────────────────────────────────────────────────────

    /// Absolute motion on the primary screen.  Returns `true` if it switched.
    pub fn on_motion_primary(&mut self, ctx: &mut SwitchContext<'_>, x: i32, y: i32) -> bool {
        if ctx.port.active() != ctx.port.primary() {
            return false;
        }
        self.x = x;
        self.y = y;
        let Some(shape) = ctx.port.topology().shape(ctx.port.primary()) else {
            return false;
        };
        match shape.edge_at(x, y) {
            Some(direction) => self.try_switch(ctx, direction, x, y),
            None => {
                self.no_switch(ctx, shape, x, y);
                false
            }
        }
    }

    /// Relative motion while a secondary screen is active.  Returns `true`
    /// if it switched.
    pub fn on_motion_secondary(&mut self, ctx: &mut SwitchContext<'_>, dx: i32, dy: i32) -> bool {
        let active = ctx.port.active().to_string();
        if active == ctx.port.primary() {
            return false;
        }
        if self.policy.relative_moves && self.is_locked(ctx.port) {
            ctx.port.relative_move(&active, dx, dy);
            return false;
        }
        let Some(shape) = ctx.port.topology().shape(&active) else {
            return false;
        };

        let (old_x, old_y) = (self.x, self.y);
        let x = old_x.saturating_add(dx);
        let y = old_y.saturating_add(dy);

        if !self.is_locked(ctx.port) {
            let direction = if x < 0 {
                Some(Direction::Left)
            } else if x >= shape.width {
                Some(Direction::Right)
            } else if y < 0 {
                Some(Direction::Top)
            } else if y >= shape.height {
                Some(Direction::Bottom)
            } else {
                None
            };
            match direction {
                Some(direction) => {
                    if self.try_switch(ctx, direction, x, y) {
                        return true;
                    }
                }
                None if self.left_pending_edge(shape, x, y) => self.no_switch(ctx, shape, x, y),
                None => {}
            }
        }

        // Stay on this screen, pinned to its edges.
        let (x, y) = shape.clamp(x, y);
        self.x = x;
        self.y = y;
        if (x, y) != (old_x, old_y) {
            ctx.port.mouse_move(&active, x, y);
        }
        false
    }

    /// `true` once the cursor is back out of the jump zone of the edge a
    /// pending switch is waiting on.
    fn left_pending_edge(&self, shape: ScreenShape, x: i32, y: i32) -> bool {
        let zone = shape.jump_zone;
        match self.pending.direction {
            Some(Direction::Left) => x >= zone,
            Some(Direction::Right) => x < shape.width - zone,
            Some(Direction::Top) => y >= zone,
            Some(Direction::Bottom) => y < shape.height - zone,
            None => false,
        }
    }

    fn try_switch(&mut self, ctx: &mut SwitchContext<'_>, direction: Direction, x: i32, y: i32) -> bool {
        let active = ctx.port.active().to_string();
        let Some(landing) = ctx.port.topology().neighbor_at(&active, direction, x, y) else {
            self.stop_switch(ctx);
            return false;
        };
        if !self.is_switch_okay(ctx, &active, &landing, direction, x, y) {
            return false;
        }
        self.switch_screen(ctx, &landing.screen, landing.x, landing.y, false)
    }

    fn is_switch_okay(
        &mut self,
        ctx: &mut SwitchContext<'_>,
        active: &str,
        landing: &Landing,
        direction: Direction,
        x: i32,
        y: i32,
    ) -> bool {
        if let Some(shape) = ctx.port.topology().shape(active) {
            let corners = self.policy.corners_for(active);
            if let Some(corner) = shape.corner_at(x, y, corners.size) {
                if corners.mask.contains(corner) {
                    debug!(?corner, "switch refused in locked corner");
                    return false;
                }
            }
        }

        if self.is_locked(ctx.port) {
            debug!("switch refused: locked to screen");
            return false;
        }

        if self.policy.required_modifiers != 0
            && ctx.port.active_modifiers() & modifiers::HELD != self.policy.required_modifiers
        {
            return false;
        }

        let is_new = self.pending.direction != Some(direction)
            || self.pending.screen.as_deref() != Some(landing.screen.as_str());
        if is_new {
            self.stop_wait(ctx);
            self.pending = PendingSwitch {
                direction: Some(direction),
                screen: Some(landing.screen.clone()),
                tapped: false,
            };
        }

        if !self.policy.two_tap.is_zero() && !self.pending.tapped {
            let second_tap = !is_new
                && self.tap.engaged
                && self.tap.armed
                && self.tap.elapsed(ctx.now) <= self.policy.two_tap;
            if !second_tap {
                debug!(%direction, "first tap");
                self.tap.start(ctx.now);
                return false;
            }
            self.tap.stop();
            self.pending.tapped = true;
        }

        if !self.policy.delay.is_zero() {
            if self.wait.is_none() {
                let timer = ctx.timers.new_timer(self.policy.delay, self.timer_target, true);
                debug!(%direction, delay = ?self.policy.delay, "waiting before switch");
                self.wait = Some(SwitchWait {
                    timer,
                    landing: landing.clone(),
                });
            }
            return false;
        }
        true
    }

    /// The cursor is away from every edge.
    fn no_switch(&mut self, ctx: &mut SwitchContext<'_>, shape: ScreenShape, x: i32, y: i32) {
        if self.tap.engaged {
            if self.tap.elapsed(ctx.now) > self.policy.two_tap {
                self.tap.stop();
            } else if !self.tap.armed {
                let zone = shape.jump_zone.max(TWO_TAP_ZONE);
                if x >= zone && x < shape.width - zone && y >= zone && y < shape.height - zone {
                    self.tap.armed = true;
                }
            }
        }
        self.pending.tapped = false;
        self.stop_wait(ctx);
    }

    fn stop_wait(&mut self, ctx: &mut SwitchContext<'_>) {
        if let Some(wait) = self.wait.take() {
            ctx.timers.cancel_timer(wait.timer);
        }
    }

    fn stop_switch(&mut self, ctx: &mut SwitchContext<'_>) {
        self.stop_wait(ctx);
        self.tap.stop();
        self.pending = PendingSwitch::default();
    }

    /// Handles a fired timer.  Returns `true` if it was the delay timer and
    /// the switch was committed.
    pub fn handle_wait_timeout(&mut self, ctx: &mut SwitchContext<'_>, timer: TimerId) -> bool {
        if self.wait.as_ref().map(|w| w.timer) != Some(timer) {
            return false;
        }
        let Some(wait) = self.wait.take() else {
            return false;
        };
        let landing = wait.landing;
        if self.is_locked(ctx.port) || !ctx.port.topology().is_connected(&landing.screen) {
            self.stop_switch(ctx);
            return false;
        }
        self.switch_screen(ctx, &landing.screen, landing.x, landing.y, false)
    }

    // ── Switching ─────────────────────────────────────────────────────────────

    fn switch_screen(
        &mut self,
        ctx: &mut SwitchContext<'_>,
        dst: &str,
        x: i32,
        y: i32,
        for_screensaver: bool,
    ) -> bool {
        self.stop_switch(ctx);
        let src = ctx.port.active().to_string();
        if src == dst {
            return false;
        }

        ctx.port.flush_clipboards(&src);
        if !ctx.port.leave(&src) {
            warn!(screen = %src, "cannot leave screen");
            return false;
        }

        let seq = self.seq.advance();
        ctx.port.set_active(dst);
        self.x = x;
        self.y = y;
        let mask = ctx.port.toggle_mask();
        ctx.port.enter(dst, x, y, seq, mask, for_screensaver);
        ctx.port.push_clipboards(dst);
        info!(from = %src, to = %dst, seq, x, y, "switched screen");
        true
    }

    /// Hotkey jump to a named screen.  Lands where the cursor last left that
    /// screen by a jump, or at its center.
    pub fn jump_to_screen(&mut self, ctx: &mut SwitchContext<'_>, screen: &str) -> bool {
        let Some(shape) = ctx.port.topology().shape(screen) else {
            warn!(screen, "jump to unknown screen");
            return false;
        };
        if !ctx.port.topology().is_connected(screen) {
            debug!(screen, "jump target is not connected");
            return false;
        }
        let active = ctx.port.active().to_string();
        self.jump_positions.insert(active, (self.x, self.y));
        let (x, y) = match self.jump_positions.get(screen) {
            Some(&(x, y)) => shape.clamp(x, y),
            None => shape.center(),
        };
        self.switch_screen(ctx, screen, x, y, false)
    }

    /// Hotkey jump to the connected neighbor in `direction`.
    pub fn jump_in_direction(&mut self, ctx: &mut SwitchContext<'_>, direction: Direction) -> bool {
        let active = ctx.port.active().to_string();
        let Some(neighbor) = ctx
            .port
            .topology()
            .neighbor(&active, direction)
            .map(str::to_string)
        else {
            debug!(%direction, "no neighbor to jump to");
            return false;
        };
        self.jump_to_screen(ctx, &neighbor)
    }

    pub fn set_lock(&mut self, mode: LockMode) {
        self.locked = match mode {
            LockMode::On => true,
            LockMode::Off => false,
            LockMode::Toggle => !self.locked,
        };
        info!(locked = self.locked, "cursor lock changed");
    }

    /// The local screensaver started or stopped.
    ///
    /// On activation the input returns to the primary, remembering where it
    /// was.  On deactivation it goes back there, kept inside the jump zone in
    /// case the screen changed size meanwhile.
    pub fn on_screensaver(&mut self, ctx: &mut SwitchContext<'_>, activated: bool) {
        let primary = ctx.port.primary().to_string();
        if activated {
            let active = ctx.port.active().to_string();
            self.saver = Some(SaverReturn {
                screen: active.clone(),
                x: self.x,
                y: self.y,
            });
            if active != primary {
                self.switch_screen(ctx, &primary, 0, 0, true);
            }
            return;
        }

        let Some(saved) = self.saver.take() else {
            return;
        };
        if saved.screen == primary || !ctx.port.topology().is_connected(&saved.screen) {
            return;
        }
        if let Some(shape) = ctx.port.topology().shape(&saved.screen) {
            let zone = shape.jump_zone;
            let x = saved.x.clamp(zone, (shape.width - zone - 1).max(zone));
            let y = saved.y.clamp(zone, (shape.height - zone - 1).max(zone));
            self.switch_screen(ctx, &saved.screen, x, y, false);
        }
    }

    /// Drops every reference to a screen that disconnected.  If it was
    /// active, the input returns to the center of the primary screen without
    /// a `leave` (there is nobody left to receive it).
    pub fn force_to_primary(&mut self, ctx: &mut SwitchContext<'_>, disconnected: &str) -> bool {
        let waiting_on_it = self.pending.screen.as_deref() == Some(disconnected)
            || self
                .wait
                .as_ref()
                .map_or(false, |w| w.landing.screen == disconnected);
        if waiting_on_it {
            self.stop_switch(ctx);
        }
        if self.saver.as_ref().map_or(false, |s| s.screen == disconnected) {
            self.saver = None;
        }
        self.jump_positions.remove(disconnected);

        if ctx.port.active() != disconnected {
            return false;
        }
        let primary = ctx.port.primary().to_string();
        let (x, y) = ctx
            .port
            .topology()
            .shape(&primary)
            .map_or((0, 0), |s| s.center());
        let seq = self.seq.advance();
        ctx.port.set_active(&primary);
        self.x = x;
        self.y = y;
        let mask = ctx.port.toggle_mask();
        ctx.port.enter(&primary, x, y, seq, mask, false);
        ctx.port.push_clipboards(&primary);
        info!(screen = %disconnected, seq, "active screen disconnected; back on primary");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgeshare_core::event::TimerQueue;
    use edgeshare_core::{Corner, ScreenShape};

    // ── Test doubles ──────────────────────────────────────────────────────────

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum PortCall {
        Flush(String),
        Leave(String),
        Enter {
            screen: String,
            x: i32,
            y: i32,
            seq: u32,
            saver: bool,
        },
        Push(String),
        Move(String, i32, i32),
        RelMove(String, i32, i32),
    }

    struct RecordingPort {
        topology: ScreenTopology,
        primary: String,
        active: String,
        held: bool,
        modifiers: u16,
        refuse_leave: bool,
        calls: Vec<PortCall>,
    }

    impl ScreenPort for RecordingPort {
        fn topology(&self) -> &ScreenTopology {
            &self.topology
        }
        fn primary(&self) -> &str {
            &self.primary
        }
        fn active(&self) -> &str {
            &self.active
        }
        fn set_active(&mut self, screen: &str) {
            self.active = screen.to_string();
        }
        fn is_input_held(&self) -> bool {
            self.held
        }
        fn active_modifiers(&self) -> u16 {
            self.modifiers
        }
        fn toggle_mask(&self) -> u16 {
            0
        }
        fn flush_clipboards(&mut self, leaving: &str) {
            self.calls.push(PortCall::Flush(leaving.into()));
        }
        fn leave(&mut self, screen: &str) -> bool {
            self.calls.push(PortCall::Leave(screen.into()));
            !self.refuse_leave
        }
        fn enter(&mut self, screen: &str, x: i32, y: i32, seq: u32, _mask: u16, saver: bool) {
            self.calls.push(PortCall::Enter {
                screen: screen.into(),
                x,
                y,
                seq,
                saver,
            });
        }
        fn push_clipboards(&mut self, screen: &str) {
            self.calls.push(PortCall::Push(screen.into()));
        }
        fn mouse_move(&mut self, screen: &str, x: i32, y: i32) {
            self.calls.push(PortCall::Move(screen.into(), x, y));
        }
        fn relative_move(&mut self, screen: &str, dx: i32, dy: i32) {
            self.calls.push(PortCall::RelMove(screen.into(), dx, dy));
        }
    }

    #[derive(Default)]
    struct QueueTimers {
        queue: TimerQueue,
    }

    impl TimerService for QueueTimers {
        fn new_timer(&mut self, period: Duration, target: EventTarget, one_shot: bool) -> TimerId {
            self.queue.insert(period, target, one_shot, Duration::ZERO)
        }
        fn cancel_timer(&mut self, id: TimerId) -> bool {
            self.queue.cancel(id)
        }
    }

    struct Harness {
        port: RecordingPort,
        timers: QueueTimers,
        switch: SwitchController,
        t0: Instant,
    }

    impl Harness {
        /// `A` (1920x1080, zone 4, primary) with `B` (1280x1024, zone 1) on
        /// its right and `A` on `B`'s left.  Both connected.
        fn new(policy: SwitchPolicy) -> Self {
            let mut topology = ScreenTopology::new();
            topology.add_screen("A", ScreenShape::new(1920, 1080, 4)).unwrap();
            topology.add_screen("B", ScreenShape::new(1280, 1024, 1)).unwrap();
            topology.link("A", Direction::Right, "B").unwrap();
            topology.link("B", Direction::Left, "A").unwrap();
            topology.set_connected("A", true).unwrap();
            topology.set_connected("B", true).unwrap();
            Self {
                port: RecordingPort {
                    topology,
                    primary: "A".into(),
                    active: "A".into(),
                    held: false,
                    modifiers: 0,
                    refuse_leave: false,
                    calls: Vec::new(),
                },
                timers: QueueTimers::default(),
                switch: SwitchController::new(policy, EventTarget::SYSTEM),
                t0: Instant::now(),
            }
        }

        fn primary_at(&mut self, ms: u64, x: i32, y: i32) -> bool {
            let mut ctx = SwitchContext {
                port: &mut self.port,
                timers: &mut self.timers,
                now: self.t0 + Duration::from_millis(ms),
            };
            self.switch.on_motion_primary(&mut ctx, x, y)
        }

        fn secondary(&mut self, dx: i32, dy: i32) -> bool {
            let mut ctx = SwitchContext {
                port: &mut self.port,
                timers: &mut self.timers,
                now: self.t0,
            };
            self.switch.on_motion_secondary(&mut ctx, dx, dy)
        }

        /// Fires every timer due after `elapsed` and feeds it to the controller.
        fn fire_timers(&mut self, elapsed: Duration) -> bool {
            self.timers.queue.advance(elapsed);
            let mut switched = false;
            while let Some(fired) = self.timers.queue.pop_expired() {
                let mut ctx = SwitchContext {
                    port: &mut self.port,
                    timers: &mut self.timers,
                    now: self.t0 + elapsed,
                };
                switched |= self.switch.handle_wait_timeout(&mut ctx, fired.id);
            }
            switched
        }

        fn with_ctx<R>(&mut self, f: impl FnOnce(&mut SwitchController, &mut SwitchContext<'_>) -> R) -> R {
            let mut ctx = SwitchContext {
                port: &mut self.port,
                timers: &mut self.timers,
                now: self.t0,
            };
            f(&mut self.switch, &mut ctx)
        }
    }

    fn enter(screen: &str, x: i32, y: i32, seq: u32) -> PortCall {
        PortCall::Enter {
            screen: screen.into(),
            x,
            y,
            seq,
            saver: false,
        }
    }

    // ── Edge crossing ─────────────────────────────────────────────────────────

    #[test]
    fn test_right_edge_crossing_leaves_a_and_enters_b_remapped() {
        // Arrange
        let mut h = Harness::new(SwitchPolicy::default());

        // Act
        let switched = h.primary_at(0, 1925, 540);

        // Assert
        assert!(switched);
        assert_eq!(
            h.port.calls,
            vec![
                PortCall::Flush("A".into()),
                PortCall::Leave("A".into()),
                enter("B", 5, 512, 1),
                PortCall::Push("B".into()),
            ]
        );
        assert_eq!(h.port.active, "B");
        assert_eq!(h.switch.position(), (5, 512));
        assert_eq!(h.switch.seq(), 1);
    }

    #[test]
    fn test_motion_away_from_edges_never_switches() {
        // Arrange
        let mut h = Harness::new(SwitchPolicy::default());

        // Act
        let switched = h.primary_at(0, 960, 540);

        // Assert
        assert!(!switched);
        assert!(h.port.calls.is_empty());
    }

    #[test]
    fn test_edge_without_neighbor_does_not_switch() {
        // Arrange
        let mut h = Harness::new(SwitchPolicy::default());

        // Act: A has nothing on its left
        let switched = h.primary_at(0, 1, 540);

        // Assert
        assert!(!switched);
        assert!(h.port.calls.is_empty());
    }

    #[test]
    fn test_disconnected_neighbor_does_not_switch() {
        // Arrange
        let mut h = Harness::new(SwitchPolicy::default());
        h.port.topology.set_connected("B", false).unwrap();

        // Act
        let switched = h.primary_at(0, 1925, 540);

        // Assert
        assert!(!switched);
        assert_eq!(h.port.active, "A");
    }

    #[test]
    fn test_refused_leave_keeps_active_screen() {
        // Arrange
        let mut h = Harness::new(SwitchPolicy::default());
        h.port.refuse_leave = true;

        // Act
        let switched = h.primary_at(0, 1925, 540);

        // Assert
        assert!(!switched);
        assert_eq!(h.port.active, "A");
        assert_eq!(h.switch.seq(), 0);
        assert!(!h.port.calls.iter().any(|c| matches!(c, PortCall::Enter { .. })));
    }

    #[test]
    fn test_primary_motion_is_ignored_while_secondary_active() {
        // Arrange
        let mut h = Harness::new(SwitchPolicy::default());
        h.primary_at(0, 1925, 540);
        h.port.calls.clear();

        // Act
        let switched = h.primary_at(0, 1925, 540);

        // Assert
        assert!(!switched);
        assert!(h.port.calls.is_empty());
    }

    // ── Gates ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_explicit_lock_blocks_switch() {
        // Arrange
        let mut h = Harness::new(SwitchPolicy::default());
        h.switch.set_lock(LockMode::On);

        // Act
        let switched = h.primary_at(0, 1925, 540);

        // Assert
        assert!(!switched);
        assert!(h.switch.is_locked_explicitly());
    }

    #[test]
    fn test_held_button_blocks_switch() {
        // Arrange
        let mut h = Harness::new(SwitchPolicy::default());
        h.port.held = true;

        // Act
        let switched = h.primary_at(0, 1925, 540);

        // Assert
        assert!(!switched);
    }

    #[test]
    fn test_lock_toggle_flips_state() {
        // Arrange
        let mut h = Harness::new(SwitchPolicy::default());

        // Act
        h.switch.set_lock(LockMode::Toggle);
        let first = h.switch.is_locked_explicitly();
        h.switch.set_lock(LockMode::Toggle);

        // Assert
        assert!(first);
        assert!(!h.switch.is_locked_explicitly());
    }

    #[test]
    fn test_required_modifiers_must_match_exactly() {
        // Arrange
        let policy = SwitchPolicy {
            required_modifiers: modifiers::SHIFT | modifiers::CONTROL,
            ..SwitchPolicy::default()
        };
        let mut h = Harness::new(policy);

        // Act
        h.port.modifiers = modifiers::SHIFT;
        let partial = h.primary_at(0, 1925, 540);
        h.port.modifiers = modifiers::SHIFT | modifiers::CONTROL | modifiers::CAPS_LOCK;
        let exact = h.primary_at(0, 1925, 540);

        // Assert: toggles such as caps lock do not count as held modifiers
        assert!(!partial);
        assert!(exact);
    }

    #[test]
    fn test_masked_corner_blocks_switch() {
        // Arrange
        let policy = SwitchPolicy {
            corners: CornerSettings {
                mask: [Corner::TopRight].into_iter().collect(),
                size: 50,
            },
            ..SwitchPolicy::default()
        };
        let mut h = Harness::new(policy);

        // Act
        let in_corner = h.primary_at(0, 1919, 10);
        let mid_edge = h.primary_at(0, 1919, 540);

        // Assert
        assert!(!in_corner);
        assert!(mid_edge);
    }

    #[test]
    fn test_per_screen_corner_override_replaces_global() {
        // Arrange
        let mut policy = SwitchPolicy {
            corners: CornerSettings {
                mask: [Corner::TopRight].into_iter().collect(),
                size: 50,
            },
            ..SwitchPolicy::default()
        };
        policy
            .screen_corners
            .insert("A".into(), CornerSettings::default());
        let mut h = Harness::new(policy);

        // Act
        let switched = h.primary_at(0, 1919, 10);

        // Assert
        assert!(switched);
    }

    #[test]
    fn test_delay_commits_when_timer_fires() {
        // Arrange
        let policy = SwitchPolicy {
            delay: Duration::from_millis(250),
            ..SwitchPolicy::default()
        };
        let mut h = Harness::new(policy);

        // Act
        let immediate = h.primary_at(0, 1919, 540);
        let pending = h.switch.is_switch_pending();
        let fired = h.fire_timers(Duration::from_millis(250));

        // Assert
        assert!(!immediate);
        assert!(pending);
        assert!(fired);
        assert_eq!(h.port.active, "B");
        assert_eq!(h.timers.queue.len(), 0);
    }

    #[test]
    fn test_delay_is_cancelled_when_cursor_retreats() {
        // Arrange
        let policy = SwitchPolicy {
            delay: Duration::from_millis(250),
            ..SwitchPolicy::default()
        };
        let mut h = Harness::new(policy);
        h.primary_at(0, 1919, 540);

        // Act
        h.primary_at(10, 960, 540);
        let fired = h.fire_timers(Duration::from_millis(300));

        // Assert
        assert!(!fired);
        assert!(h.timers.queue.is_empty());
        assert_eq!(h.port.active, "A");
    }

    #[test]
    fn test_repeated_edge_motion_arms_a_single_delay_timer() {
        // Arrange
        let policy = SwitchPolicy {
            delay: Duration::from_millis(250),
            ..SwitchPolicy::default()
        };
        let mut h = Harness::new(policy);

        // Act
        h.primary_at(0, 1919, 540);
        h.primary_at(5, 1919, 541);
        h.primary_at(10, 1919, 542);

        // Assert
        assert_eq!(h.timers.queue.len(), 1);
    }

    #[test]
    fn test_second_crossing_while_switch_pending_yields_one_transition() {
        // Arrange
        let policy = SwitchPolicy {
            delay: Duration::from_millis(250),
            ..SwitchPolicy::default()
        };
        let mut h = Harness::new(policy);

        // Act
        let first = h.primary_at(0, 1925, 540);
        let second = h.primary_at(5, 1930, 600);
        let fired = h.fire_timers(Duration::from_millis(250));
        let after = h.primary_at(300, 1925, 540);

        // Assert
        assert!(!first && !second);
        assert!(fired);
        assert!(!after, "primary motion is ignored once B is active");
        let leaves = h.port.calls.iter().filter(|c| matches!(c, PortCall::Leave(_))).count();
        let enters: Vec<&PortCall> = h
            .port
            .calls
            .iter()
            .filter(|c| matches!(c, PortCall::Enter { .. }))
            .collect();
        assert_eq!(leaves, 1);
        assert_eq!(enters.len(), 1);
        assert!(matches!(enters[0], PortCall::Enter { screen, seq: 1, .. } if screen == "B"));
        assert_eq!(h.port.active, "B");
        assert!(h.timers.queue.is_empty());
    }

    #[test]
    fn test_delay_timeout_while_locked_abandons_switch() {
        // Arrange
        let policy = SwitchPolicy {
            delay: Duration::from_millis(250),
            ..SwitchPolicy::default()
        };
        let mut h = Harness::new(policy);
        h.primary_at(0, 1919, 540);
        h.port.held = true;

        // Act
        let fired = h.fire_timers(Duration::from_millis(250));

        // Assert
        assert!(!fired);
        assert_eq!(h.port.active, "A");
        assert!(!h.switch.is_switch_pending());
    }

    #[test]
    fn test_double_tap_switches_on_second_tap() {
        // Arrange
        let policy = SwitchPolicy {
            two_tap: Duration::from_millis(500),
            ..SwitchPolicy::default()
        };
        let mut h = Harness::new(policy);

        // Act
        let first = h.primary_at(0, 1919, 540);
        h.primary_at(100, 960, 540);
        let second = h.primary_at(200, 1919, 540);

        // Assert
        assert!(!first);
        assert!(second);
        assert_eq!(h.port.active, "B");
    }

    #[test]
    fn test_double_tap_needs_cursor_to_leave_the_edge() {
        // Arrange
        let policy = SwitchPolicy {
            two_tap: Duration::from_millis(500),
            ..SwitchPolicy::default()
        };
        let mut h = Harness::new(policy);

        // Act: two taps without moving away in between
        h.primary_at(0, 1919, 540);
        let second = h.primary_at(100, 1919, 541);

        // Assert
        assert!(!second);
        assert_eq!(h.port.active, "A");
    }

    #[test]
    fn test_slow_second_tap_restarts_double_tap() {
        // Arrange
        let policy = SwitchPolicy {
            two_tap: Duration::from_millis(500),
            ..SwitchPolicy::default()
        };
        let mut h = Harness::new(policy);

        // Act
        h.primary_at(0, 1919, 540);
        h.primary_at(100, 960, 540);
        let late = h.primary_at(700, 1919, 540);

        // Assert
        assert!(!late);
        assert!(h.switch.is_switch_pending());
    }

    #[test]
    fn test_double_tap_then_delay_both_must_pass() {
        // Arrange
        let policy = SwitchPolicy {
            two_tap: Duration::from_millis(500),
            delay: Duration::from_millis(100),
            ..SwitchPolicy::default()
        };
        let mut h = Harness::new(policy);

        // Act
        h.primary_at(0, 1919, 540);
        h.primary_at(50, 960, 540);
        let second_tap = h.primary_at(100, 1919, 540);
        let timers_after_tap = h.timers.queue.len();
        let fired = h.fire_timers(Duration::from_millis(100));

        // Assert
        assert!(!second_tap);
        assert_eq!(timers_after_tap, 1);
        assert!(fired);
        assert_eq!(h.port.active, "B");
    }

    // ── Secondary motion ──────────────────────────────────────────────────────

    #[test]
    fn test_secondary_motion_moves_cursor_on_active_screen() {
        // Arrange
        let mut h = Harness::new(SwitchPolicy::default());
        h.primary_at(0, 1925, 540);
        h.port.calls.clear();

        // Act
        let switched = h.secondary(10, -12);

        // Assert
        assert!(!switched);
        assert_eq!(h.port.calls, vec![PortCall::Move("B".into(), 15, 500)]);
    }

    #[test]
    fn test_secondary_motion_crossing_left_returns_to_primary() {
        // Arrange
        let mut h = Harness::new(SwitchPolicy::default());
        h.primary_at(0, 1925, 540);
        h.port.calls.clear();

        // Act
        let switched = h.secondary(-10, 0);

        // Assert: A has B on its right, so the landing avoids A's jump zone
        assert!(switched);
        assert_eq!(h.port.active, "A");
        assert!(h.port.calls.contains(&enter("A", 1915, 540, 2)));
    }

    #[test]
    fn test_secondary_motion_without_neighbor_is_clamped() {
        // Arrange
        let mut h = Harness::new(SwitchPolicy::default());
        h.primary_at(0, 1925, 540);
        h.port.calls.clear();

        // Act: B has nothing below
        let switched = h.secondary(0, 5000);

        // Assert
        assert!(!switched);
        assert_eq!(h.port.calls, vec![PortCall::Move("B".into(), 5, 1023)]);
    }

    #[test]
    fn test_locked_secondary_is_clamped_instead_of_switching() {
        // Arrange
        let mut h = Harness::new(SwitchPolicy::default());
        h.primary_at(0, 1925, 540);
        h.switch.set_lock(LockMode::On);
        h.port.calls.clear();

        // Act
        let switched = h.secondary(-50, 0);

        // Assert
        assert!(!switched);
        assert_eq!(h.port.calls, vec![PortCall::Move("B".into(), 0, 512)]);
    }

    #[test]
    fn test_relative_moves_forward_deltas_while_locked() {
        // Arrange
        let policy = SwitchPolicy {
            relative_moves: true,
            ..SwitchPolicy::default()
        };
        let mut h = Harness::new(policy);
        h.primary_at(0, 1925, 540);
        h.switch.set_lock(LockMode::On);
        h.port.calls.clear();

        // Act
        h.secondary(3, -4);

        // Assert
        assert_eq!(h.port.calls, vec![PortCall::RelMove("B".into(), 3, -4)]);
    }

    #[test]
    fn test_secondary_motion_ignored_on_primary() {
        // Arrange
        let mut h = Harness::new(SwitchPolicy::default());

        // Act
        let switched = h.secondary(10, 10);

        // Assert
        assert!(!switched);
        assert!(h.port.calls.is_empty());
    }

    // ── Jumps, screensaver, disconnect ────────────────────────────────────────

    #[test]
    fn test_jump_to_screen_lands_at_center_first_time() {
        // Arrange
        let mut h = Harness::new(SwitchPolicy::default());

        // Act
        let switched = h.with_ctx(|s, ctx| s.jump_to_screen(ctx, "B"));

        // Assert
        assert!(switched);
        assert!(h.port.calls.contains(&enter("B", 640, 512, 1)));
    }

    #[test]
    fn test_jump_back_restores_previous_position() {
        // Arrange
        let mut h = Harness::new(SwitchPolicy::default());
        h.primary_at(0, 300, 200);
        h.with_ctx(|s, ctx| s.jump_to_screen(ctx, "B"));
        h.port.calls.clear();

        // Act
        h.with_ctx(|s, ctx| s.jump_in_direction(ctx, Direction::Left));

        // Assert
        assert!(h.port.calls.contains(&enter("A", 300, 200, 2)));
    }

    #[test]
    fn test_jump_to_disconnected_screen_is_refused() {
        // Arrange
        let mut h = Harness::new(SwitchPolicy::default());
        h.port.topology.set_connected("B", false).unwrap();

        // Act
        let switched = h.with_ctx(|s, ctx| s.jump_to_screen(ctx, "B"));

        // Assert
        assert!(!switched);
        assert!(h.port.calls.is_empty());
    }

    #[test]
    fn test_screensaver_returns_to_saved_screen() {
        // Arrange
        let mut h = Harness::new(SwitchPolicy::default());
        h.primary_at(0, 1925, 540);
        h.secondary(-5, 0); // B:(0, 512), inside B's jump zone
        h.port.calls.clear();

        // Act
        h.with_ctx(|s, ctx| s.on_screensaver(ctx, true));
        let on_primary = h.port.active.clone();
        h.with_ctx(|s, ctx| s.on_screensaver(ctx, false));

        // Assert
        assert_eq!(on_primary, "A");
        assert!(h.port.calls.contains(&PortCall::Enter {
            screen: "A".into(),
            x: 0,
            y: 0,
            seq: 2,
            saver: true,
        }));
        assert_eq!(h.port.active, "B");
        let (x, _) = h.switch.position();
        assert!(x >= 1, "landing kept out of the jump zone");
    }

    #[test]
    fn test_disconnect_of_active_screen_forces_primary_center() {
        // Arrange
        let mut h = Harness::new(SwitchPolicy::default());
        h.primary_at(0, 1925, 540);
        h.port.calls.clear();

        // Act
        h.port.topology.set_connected("B", false).unwrap();
        let forced = h.with_ctx(|s, ctx| s.force_to_primary(ctx, "B"));

        // Assert
        assert!(forced);
        assert_eq!(h.port.active, "A");
        assert!(!h.port.calls.iter().any(|c| matches!(c, PortCall::Leave(_))));
        assert!(h.port.calls.contains(&enter("A", 960, 540, 2)));
    }

    #[test]
    fn test_disconnect_cancels_pending_switch_to_that_screen() {
        // Arrange
        let policy = SwitchPolicy {
            delay: Duration::from_millis(250),
            ..SwitchPolicy::default()
        };
        let mut h = Harness::new(policy);
        h.primary_at(0, 1919, 540);

        // Act
        let forced = h.with_ctx(|s, ctx| s.force_to_primary(ctx, "B"));

        // Assert
        assert!(!forced);
        assert!(h.timers.queue.is_empty());
        assert!(!h.switch.is_switch_pending());
    }
}
