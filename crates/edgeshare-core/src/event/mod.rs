//! The event reactor: posted events, countdown timers, and handler dispatch.
//!
//! # What is a reactor? (for beginners)
//!
//! Instead of giving every network connection and every timer its own thread,
//! the server runs one loop that repeatedly asks "what happened next?" and
//! hands the answer to the code registered for it.  Network tasks, the input
//! capture layer, and timers all feed that single loop through an
//! [`EventScheduler`].  Because only one handler ever runs at a time, the
//! handlers can mutate shared server state without any locks.
//!
//! - [`Event`] pairs a payload with an [`EventTarget`] (which object it is for).
//! - [`EventSender`] is the thread-safe way to post events from other tasks.
//! - [`EventScheduler::next_event`] waits for the next event or timer.
//! - [`EventScheduler::dispatch`] finds the handler registered for the event's
//!   `(kind, target)` pair, falling back to a handler registered for any target.

pub mod scheduler;
pub mod timer;

use std::fmt;
use std::hash::Hash;

pub use scheduler::{EventScheduler, EventSender, Handler, NextEvent, TimerService};
pub use timer::{TimerEvent, TimerId, TimerQueue};

/// Opaque handle naming the object an event is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventTarget(u64);

impl EventTarget {
    /// Target for process-wide events (local input, quit, server timers).
    pub const SYSTEM: EventTarget = EventTarget(0);

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target#{}", self.0)
    }
}

/// Implemented by the payload type an application routes through the scheduler.
///
/// The scheduler needs two things from a payload: a cheap `kind` used as the
/// first half of the handler lookup key, and a way to wrap a fired timer.
pub trait EventPayload: Send + 'static {
    type Kind: Copy + Eq + Hash + fmt::Debug;

    fn kind(&self) -> Self::Kind;

    fn from_timer(event: TimerEvent) -> Self;
}

/// One unit of work delivered by the scheduler.
///
/// The event owns its payload.  Handlers receive the event by value and are
/// free to move the payload out.
#[derive(Debug)]
pub struct Event<T> {
    target: EventTarget,
    payload: T,
    immediate: bool,
}

impl<T> Event<T> {
    /// Creates an event for asynchronous (queued) delivery.
    pub fn new(target: EventTarget, payload: T) -> Self {
        Self {
            target,
            payload,
            immediate: false,
        }
    }

    /// Creates an event that [`EventScheduler::post`] dispatches in-line
    /// instead of queueing.
    pub fn immediate(target: EventTarget, payload: T) -> Self {
        Self {
            target,
            payload,
            immediate: true,
        }
    }

    pub fn target(&self) -> EventTarget {
        self.target
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }

    pub fn into_payload(self) -> T {
        self.payload
    }

    pub fn is_immediate(&self) -> bool {
        self.immediate
    }
}

impl<T: EventPayload> Event<T> {
    pub fn kind(&self) -> T::Kind {
        self.payload.kind()
    }
}
