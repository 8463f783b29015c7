//! [`EventScheduler`]: the single-threaded reactor that the server loop drives.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::Instant;
use tracing::{debug, trace};

use super::timer::{TimerEvent, TimerId, TimerQueue};
use super::{Event, EventPayload, EventTarget};

/// A registered event handler.
///
/// Handlers receive the application context, the scheduler itself (so they
/// can start timers, post follow-up events, or add and remove handlers), and
/// the event by value.
pub type Handler<T, C> = Box<dyn FnMut(&mut C, &mut EventScheduler<T, C>, Event<T>)>;

type HandlerKey<K> = (K, Option<EventTarget>);

enum Envelope<T> {
    Event(Event<T>),
    Quit,
}

/// Result of one [`EventScheduler::next_event`] wait.
#[derive(Debug)]
pub enum NextEvent<T> {
    /// A posted event or a fired timer.
    Event(Event<T>),
    /// The caller's timeout elapsed with nothing to deliver.
    Timeout,
    /// Shutdown was requested; the loop should stop.
    Quit,
}

/// Thread-safe handle for posting events into a scheduler.
///
/// Cloned freely and moved into network tasks, the input capture thread, or
/// the signal handler.  Posting never blocks.
pub struct EventSender<T> {
    tx: mpsc::UnboundedSender<Envelope<T>>,
    shutdown: Arc<AtomicBool>,
    next_target: Arc<AtomicU64>,
}

impl<T> Clone for EventSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            shutdown: Arc::clone(&self.shutdown),
            next_target: Arc::clone(&self.next_target),
        }
    }
}

impl<T: Send + 'static> EventSender<T> {
    /// Queues an event for delivery.
    ///
    /// Events posted after shutdown, or after the scheduler has been dropped,
    /// are discarded without error.  Cross-thread posts are always queued,
    /// even when the event is flagged immediate.
    pub fn post(&self, event: Event<T>) {
        if self.is_shut_down() {
            trace!(event_target = %event.target(), "post after shutdown ignored");
            return;
        }
        if self.tx.send(Envelope::Event(event)).is_err() {
            trace!("scheduler gone; event dropped");
        }
    }

    /// Records a shutdown request.  The next [`EventScheduler::next_event`]
    /// returns [`NextEvent::Quit`].
    pub fn quit(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.tx.send(Envelope::Quit);
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Allocates a fresh, never-reused event target.
    pub fn new_target(&self) -> EventTarget {
        EventTarget(self.next_target.fetch_add(1, Ordering::Relaxed))
    }
}

/// Creation and cancellation of countdown timers.
///
/// Implemented by [`EventScheduler`]; components that only need timers (the
/// switch controller, for one) take `&mut dyn TimerService` so they can be
/// tested without a running reactor.
pub trait TimerService {
    fn new_timer(&mut self, period: Duration, target: EventTarget, one_shot: bool) -> TimerId;
    fn cancel_timer(&mut self, id: TimerId) -> bool;
}

struct ActiveDispatch<K> {
    key: HandlerKey<K>,
    retired: bool,
}

/// Ordered delivery of posted events and expiring timers to registered handlers.
///
/// `T` is the application's payload type and `C` the context every handler
/// receives mutably.  The scheduler is not `Sync`: it is owned by the task
/// running the event loop, and other tasks reach it through [`EventSender`].
pub struct EventScheduler<T: EventPayload, C> {
    sender: EventSender<T>,
    receiver: mpsc::UnboundedReceiver<Envelope<T>>,
    timers: TimerQueue,
    last_advance: Instant,
    handlers: HashMap<HandlerKey<T::Kind>, Handler<T, C>>,
    active: Option<ActiveDispatch<T::Kind>>,
}

impl<T: EventPayload, C> Default for EventScheduler<T, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: EventPayload, C> EventScheduler<T, C> {
    pub fn new() -> Self {
        let (tx, receiver) = mpsc::unbounded_channel();
        Self {
            sender: EventSender {
                tx,
                shutdown: Arc::new(AtomicBool::new(false)),
                next_target: Arc::new(AtomicU64::new(1)),
            },
            receiver,
            timers: TimerQueue::new(),
            last_advance: Instant::now(),
            handlers: HashMap::new(),
            active: None,
        }
    }

    /// Returns a thread-safe posting handle.
    pub fn sender(&self) -> EventSender<T> {
        self.sender.clone()
    }

    pub fn new_target(&self) -> EventTarget {
        self.sender.new_target()
    }

    /// Posts an event: immediate events are dispatched before this call
    /// returns, all others are queued behind previously posted events.
    pub fn post(&mut self, ctx: &mut C, event: Event<T>) {
        if event.is_immediate() {
            self.dispatch(ctx, event);
        } else {
            self.sender.post(event);
        }
    }

    pub fn quit(&self) {
        self.sender.quit();
    }

    // ── Handlers ──────────────────────────────────────────────────────────────

    /// Registers `handler` for events of `kind` addressed to `target`,
    /// replacing any previous handler for the same pair.
    pub fn set_handler(&mut self, kind: T::Kind, target: EventTarget, handler: Handler<T, C>) {
        self.handlers.insert((kind, Some(target)), handler);
    }

    /// Registers a fallback handler for events of `kind` whose target has no
    /// handler of its own.
    pub fn set_wildcard_handler(&mut self, kind: T::Kind, handler: Handler<T, C>) {
        self.handlers.insert((kind, None), handler);
    }

    /// Removes every handler registered for `target`.
    pub fn remove_handlers_for(&mut self, target: EventTarget) {
        self.retire(|k| k.1 == Some(target));
        self.handlers.retain(|key, _| key.1 != Some(target));
    }

    /// A handler that is currently running is out of the table; mark it so
    /// it is not put back when it returns.
    fn retire(&mut self, matches: impl Fn(&HandlerKey<T::Kind>) -> bool) {
        if let Some(active) = &mut self.active {
            if matches(&active.key) {
                active.retired = true;
            }
        }
    }

    /// Invokes the handler for the event's `(kind, target)`, falling back to
    /// the wildcard handler for `kind`.  Returns `false` (and drops the event)
    /// when neither exists.
    pub fn dispatch(&mut self, ctx: &mut C, event: Event<T>) -> bool {
        let kind = event.kind();
        let exact = (kind, Some(event.target()));
        let key = if self.handlers.contains_key(&exact) {
            exact
        } else {
            (kind, None)
        };

        let Some(mut handler) = self.handlers.remove(&key) else {
            trace!(?kind, event_target = %event.target(), "no handler; event dropped");
            return false;
        };

        let outer = self.active.replace(ActiveDispatch { key, retired: false });
        handler(ctx, self, event);
        let finished = std::mem::replace(&mut self.active, outer);

        let retired = finished.map_or(false, |a| a.retired);
        if !retired && !self.handlers.contains_key(&key) {
            self.handlers.insert(key, handler);
        }
        true
    }

    // ── Timers ────────────────────────────────────────────────────────────────

    pub fn new_timer(&mut self, period: Duration, target: EventTarget, one_shot: bool) -> TimerId {
        let since = Instant::now().saturating_duration_since(self.last_advance);
        let id = self.timers.insert(period, target, one_shot, since);
        trace!(timer = id.as_u64(), ?period, one_shot, "timer started");
        id
    }

    pub fn cancel_timer(&mut self, id: TimerId) -> bool {
        self.timers.cancel(id)
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    fn advance_timers(&mut self) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.last_advance);
        self.last_advance = now;
        self.timers.advance(elapsed);
    }

    fn expired_timer_event(&mut self) -> Option<Event<T>> {
        self.advance_timers();
        let fired = self.timers.pop_expired()?;
        Some(Event::new(
            fired.target,
            T::from_timer(TimerEvent {
                timer: fired.id,
                count: fired.count,
            }),
        ))
    }

    // ── Waiting ───────────────────────────────────────────────────────────────

    /// Waits until an event is ready, a timer expires, or `timeout` elapses
    /// (`None` waits indefinitely).
    ///
    /// A timer that is already overdue when the call starts is delivered
    /// ahead of queued events; otherwise events come out in post order.
    pub async fn next_event(&mut self, timeout: Option<Duration>) -> NextEvent<T> {
        if self.sender.is_shut_down() {
            return NextEvent::Quit;
        }
        if let Some(event) = self.expired_timer_event() {
            return NextEvent::Event(event);
        }

        let envelope = match self.receiver.try_recv() {
            Ok(envelope) => Some(envelope),
            Err(TryRecvError::Disconnected) => None,
            Err(TryRecvError::Empty) => {
                let wait = match (timeout, self.timers.time_to_next()) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                };
                match wait {
                    Some(wait) => tokio::time::timeout(wait, self.receiver.recv())
                        .await
                        .ok()
                        .flatten(),
                    None => self.receiver.recv().await,
                }
            }
        };

        match envelope {
            Some(Envelope::Event(event)) => NextEvent::Event(event),
            Some(Envelope::Quit) => NextEvent::Quit,
            None => match self.expired_timer_event() {
                Some(event) => NextEvent::Event(event),
                None => NextEvent::Timeout,
            },
        }
    }

    /// Runs the dispatch loop until shutdown is requested.
    pub async fn run(&mut self, ctx: &mut C) {
        loop {
            match self.next_event(None).await {
                NextEvent::Event(event) => {
                    self.dispatch(ctx, event);
                }
                NextEvent::Timeout => {}
                NextEvent::Quit => {
                    debug!("event loop received quit");
                    break;
                }
            }
        }
    }
}

impl<T: EventPayload, C> TimerService for EventScheduler<T, C> {
    fn new_timer(&mut self, period: Duration, target: EventTarget, one_shot: bool) -> TimerId {
        EventScheduler::new_timer(self, period, target, one_shot)
    }

    fn cancel_timer(&mut self, id: TimerId) -> bool {
        EventScheduler::cancel_timer(self, id)
    }
}
