//! Keep-alive bookkeeping for one connection.
//!
//! The owner arms a repeating timer at [`Heartbeat::rate`] and calls
//! [`Heartbeat::tick`] each time it fires.  Any inbound bytes in between
//! count as a sign of life.  A silent period asks for a `CNOP`; too many
//! silent periods in a row mean the peer is gone.

use std::time::Duration;

/// Default interval between liveness checks.
pub const DEFAULT_HEART_RATE: Duration = Duration::from_secs(3);

/// Default number of consecutive silent periods before giving up.
pub const DEFAULT_BEATS_UNTIL_DEATH: u32 = 3;

/// What the owner should do after a heartbeat period ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// The peer spoke during the period.
    Alive,
    /// The peer was silent; send a `CNOP` to provoke traffic.
    SendNoop,
    /// The peer has been silent too long; close the connection.
    Flatline,
}

#[derive(Debug, Clone)]
pub struct Heartbeat {
    rate: Duration,
    beats_until_death: u32,
    missed: u32,
    heard: bool,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new(DEFAULT_HEART_RATE, DEFAULT_BEATS_UNTIL_DEATH)
    }
}

impl Heartbeat {
    /// A zero `rate` disables the heartbeat.  `beats_until_death` is at least 1.
    pub fn new(rate: Duration, beats_until_death: u32) -> Self {
        Self {
            rate,
            beats_until_death: beats_until_death.max(1),
            missed: 0,
            heard: false,
        }
    }

    pub fn rate(&self) -> Duration {
        self.rate
    }

    pub fn is_enabled(&self) -> bool {
        !self.rate.is_zero()
    }

    pub fn missed(&self) -> u32 {
        self.missed
    }

    /// Call whenever bytes arrive from the peer.
    pub fn record_inbound(&mut self) {
        self.heard = true;
    }

    /// Call when a period ends.
    pub fn tick(&mut self) -> HeartbeatAction {
        if std::mem::take(&mut self.heard) {
            self.missed = 0;
            return HeartbeatAction::Alive;
        }
        self.missed += 1;
        if self.missed >= self.beats_until_death {
            HeartbeatAction::Flatline
        } else {
            HeartbeatAction::SendNoop
        }
    }
}
