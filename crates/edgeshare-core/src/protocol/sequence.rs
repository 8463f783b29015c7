//! The enter sequence number.
//!
//! # What is the enter sequence number? (for beginners)
//!
//! Every `CINN` (enter) message carries a number that grows by one with each
//! screen switch.  The screen that receives it remembers the number and
//! attaches it to everything it reports back, such as clipboard grabs.
//!
//! Reports travel over the network, so one can still be in flight when the
//! user has already switched away and back again.  The clipboard table keeps
//! the number each clipboard was last taken under, and a report carrying an
//! older number is discarded.
//!
//! The counter lives inside the switch controller and is only touched from
//! the reactor, so it is a plain integer.

/// A monotonically increasing counter of screen switches.
///
/// The counter starts at 0; the first switch hands out 1.
///
/// # Examples
///
/// ```rust
/// use edgeshare_core::protocol::EnterSequence;
///
/// let mut seq = EnterSequence::new();
/// assert_eq!(seq.advance(), 1);
/// assert_eq!(seq.advance(), 2);
/// assert_eq!(seq.current(), 2);
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EnterSequence {
    value: u32,
}

impl EnterSequence {
    /// Creates a counter whose first [`advance`](Self::advance) returns 1.
    pub fn new() -> Self {
        Self { value: 0 }
    }

    /// Increments the counter and returns the *new* value.
    ///
    /// Wraps from `u32::MAX` to 0 without panicking.
    pub fn advance(&mut self) -> u32 {
        self.value = self.value.wrapping_add(1);
        self.value
    }

    /// Returns the value handed out by the latest switch.
    pub fn current(&self) -> u32 {
        self.value
    }
}
