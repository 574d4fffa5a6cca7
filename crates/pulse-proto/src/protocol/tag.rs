//! Tag allocation for outbound commands.
//!
//! # What is a tag? (for beginners)
//!
//! Every command the client sends carries a 32-bit *tag*.  The server copies
//! the tag into its reply, which is how the client knows which pending
//! request a reply belongs to.  Replies may come back in any order, so the
//! tag is the only thing that ties them together.
//!
//! One value, [`RESERVED_EVENT_TAG`], is never handed out: the server uses it
//! for unsolicited subscription events.
//!
//! The counter itself does not know which tags are still in flight; the
//! client's correlator skips those while holding its lock.

use std::sync::atomic::{AtomicU32, Ordering};

/// Tag the server stamps on subscription events.
pub const RESERVED_EVENT_TAG: u32 = 0xFFFF_FFFF;

/// A thread-safe tag counter that wraps before [`RESERVED_EVENT_TAG`].
///
/// # Examples
///
/// ```rust
/// use pulse_proto::protocol::TagCounter;
///
/// let tags = TagCounter::new();
/// assert_eq!(tags.next(), 0);
/// assert_eq!(tags.next(), 1);
/// ```
#[derive(Debug)]
pub struct TagCounter {
    inner: AtomicU32,
}

impl TagCounter {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Creates a counter whose first tag is `start` (the reserved tag wraps to 0).
    pub fn starting_at(start: u32) -> Self {
        Self {
            inner: AtomicU32::new(start),
        }
    }

    /// Returns the next tag, never [`RESERVED_EVENT_TAG`].
    pub fn next(&self) -> u32 {
        let mut current = self.inner.load(Ordering::Relaxed);
        loop {
            let tag = if current == RESERVED_EVENT_TAG { 0 } else { current };
            let following = if tag + 1 == RESERVED_EVENT_TAG { 0 } else { tag + 1 };
            match self.inner.compare_exchange_weak(
                current,
                following,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return tag,
                Err(actual) => current = actual,
            }
        }
    }

    /// Tag the next call to [`next`](Self::next) will return.
    pub fn current(&self) -> u32 {
        match self.inner.load(Ordering::Relaxed) {
            RESERVED_EVENT_TAG => 0,
            tag => tag,
        }
    }
}

impl Default for TagCounter {
    fn default() -> Self {
        Self::new()
    }
}
