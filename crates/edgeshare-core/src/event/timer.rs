//! Countdown timers owned by the [`EventScheduler`](super::EventScheduler).
//!
//! # How the queue keeps time (for beginners)
//!
//! Each timer stores how much time is *left* before it fires rather than an
//! absolute deadline.  Every time the scheduler wakes up it measures how long
//! it slept and subtracts that amount from **every** timer in one linear pass.
//! Because every timer is decremented by the same amount, the relative order
//! of the queue never changes, so the queue stays sorted without re-heaping.
//!
//! A timer whose remaining time drops to zero or below has expired.  If the
//! scheduler slept through several periods of a repeating timer, the fired
//! event reports how many periods elapsed (the *repeat count*) instead of
//! firing once per missed period.

use std::time::Duration;

use super::EventTarget;

/// Opaque handle identifying one timer.  Returned by `new_timer` and used to
/// cancel the timer or to recognise its fired events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    /// Returns the raw numeric handle (useful for logging).
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Payload carried by a timer-fired event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    /// The timer that fired.
    pub timer: TimerId,
    /// Number of whole periods that elapsed since the timer was last reset.
    /// Always at least 1; greater than 1 when the scheduler missed ticks.
    pub count: u32,
}

/// A timer that has just expired, as popped from the [`TimerQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiredTimer {
    pub id: TimerId,
    pub target: EventTarget,
    pub count: u32,
}

#[derive(Debug)]
struct Timer {
    id: TimerId,
    period_us: i64,
    remaining_us: i64,
    target: EventTarget,
    one_shot: bool,
    /// Insertion order; breaks ties between equal remaining times.
    order: u64,
}

impl Timer {
    fn sort_key(&self) -> (i64, u64) {
        (self.remaining_us, self.order)
    }
}

/// Priority queue of countdown timers ordered by (remaining time, insertion order).
#[derive(Debug, Default)]
pub struct TimerQueue {
    timers: Vec<Timer>,
    next_id: u64,
    next_order: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a timer that fires after `period`.
    ///
    /// `since_last_advance` is the time that has passed since the queue was
    /// last advanced.  The next [`advance`](Self::advance) subtracts that time
    /// from every timer, so it is added back here to keep the new timer from
    /// being charged for time that passed before it existed.
    pub fn insert(
        &mut self,
        period: Duration,
        target: EventTarget,
        one_shot: bool,
        since_last_advance: Duration,
    ) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;

        // A zero period would make the repeat count divide by zero.
        let period_us = duration_to_us(period).max(1);
        let timer = Timer {
            id,
            period_us,
            remaining_us: period_us.saturating_add(duration_to_us(since_last_advance)),
            target,
            one_shot,
            order: 0,
        };
        self.push(timer);
        id
    }

    /// Removes a timer.  Returns `false` if it was not queued (already fired
    /// as a one-shot, or cancelled before).
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.timers.iter().position(|t| t.id == id) {
            Some(index) => {
                self.timers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Subtracts `elapsed` from every queued timer.
    pub fn advance(&mut self, elapsed: Duration) {
        let elapsed_us = duration_to_us(elapsed);
        if elapsed_us == 0 {
            return;
        }
        for timer in &mut self.timers {
            timer.remaining_us = timer.remaining_us.saturating_sub(elapsed_us);
        }
    }

    /// Pops the head timer if it has expired.
    ///
    /// Repeating timers are reset to a full period and re-queued behind any
    /// timer with the same remaining time; one-shot timers are dropped.
    pub fn pop_expired(&mut self) -> Option<FiredTimer> {
        if self.timers.first()?.remaining_us > 0 {
            return None;
        }
        let mut timer = self.timers.remove(0);

        let overdue_us = timer.period_us - timer.remaining_us;
        let count = u32::try_from(overdue_us / timer.period_us).unwrap_or(u32::MAX);
        let fired = FiredTimer {
            id: timer.id,
            target: timer.target,
            count,
        };

        if !timer.one_shot {
            timer.remaining_us = timer.period_us;
            self.push(timer);
        }
        Some(fired)
    }

    /// Time until the head timer expires; zero if it already has.
    pub fn time_to_next(&self) -> Option<Duration> {
        self.timers
            .first()
            .map(|t| Duration::from_micros(t.remaining_us.max(0) as u64))
    }

    /// Returns `true` if the timer is still queued.
    pub fn contains(&self, id: TimerId) -> bool {
        self.timers.iter().any(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    fn push(&mut self, mut timer: Timer) {
        timer.order = self.next_order;
        self.next_order += 1;
        let key = timer.sort_key();
        let index = self.timers.partition_point(|t| t.sort_key() <= key);
        self.timers.insert(index, timer);
    }
}

fn duration_to_us(d: Duration) -> i64 {
    i64::try_from(d.as_micros()).unwrap_or(i64::MAX)
}
