//! Matches replies to the requests that caused them.
//!
//! # How correlation works (for beginners)
//!
//! Each outbound command gets a fresh tag and a slot in the pending map.
//! The slot holds a one-shot channel; the caller awaits the receiving end.
//! When the read loop sees a reply it looks the tag up, takes the slot out of
//! the map and sends the result through the channel.  Because the slot is
//! removed before sending, a tag can only ever be resolved once.
//!
//! Replies are matched by tag alone, so the server may answer in any order.
//!
//! List replies can be split over several packets.  Every packet but the
//! last carries the continuation flag; their values are accumulated in the
//! slot until the final packet arrives.
//!
//! All state sits behind one `std::sync::Mutex`.  The lock is never held
//! across an `.await`.

use std::collections::HashMap;
use std::sync::Mutex;

use pulse_proto::protocol::{Command, DecodeError, ErrorCode, TagCounter, Value, RESERVED_EVENT_TAG};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Ways a pending request can end other than with a reply.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReplyError {
    #[error("server error: {0}")]
    Server(ErrorCode),
    #[error("bad reply: {0}")]
    Decode(DecodeError),
    #[error("request cancelled")]
    Cancelled,
    #[error("request timed out")]
    TimedOut,
    #[error("connection closed before reply")]
    Disconnected,
}

pub type ReplyResult = Result<Vec<Value>, ReplyError>;

enum Accumulator {
    Single,
    List { values: Vec<Value>, fragments: usize },
}

struct Pending {
    command: Command,
    tx: oneshot::Sender<ReplyResult>,
    accumulator: Accumulator,
}

struct State {
    tags: TagCounter,
    pending: HashMap<u32, Pending>,
    closed: bool,
}

/// Pending-tag map plus tag counter, shared by callers and the read loop.
pub struct Correlator {
    state: Mutex<State>,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlator {
    pub fn new() -> Self {
        Self::with_counter(TagCounter::new())
    }

    pub fn with_counter(tags: TagCounter) -> Self {
        Self {
            state: Mutex::new(State {
                tags,
                pending: HashMap::new(),
                closed: false,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A panic elsewhere cannot leave the map half-updated: every
        // operation is a single insert or remove.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Allocates a tag for `command` and registers its slot.
    ///
    /// Tags still pending are skipped, and the reserved event tag is never
    /// returned.
    ///
    /// # Errors
    ///
    /// [`ReplyError::Disconnected`] once [`fail_all`](Self::fail_all) has run.
    pub fn register(&self, command: Command) -> Result<(u32, oneshot::Receiver<ReplyResult>), ReplyError> {
        let mut state = self.lock();
        if state.closed {
            return Err(ReplyError::Disconnected);
        }
        let tag = loop {
            let candidate = state.tags.next();
            if candidate != RESERVED_EVENT_TAG && !state.pending.contains_key(&candidate) {
                break candidate;
            }
        };
        let (tx, rx) = oneshot::channel();
        let accumulator = if command.is_list_request() {
            Accumulator::List {
                values: Vec::new(),
                fragments: 0,
            }
        } else {
            Accumulator::Single
        };
        state.pending.insert(
            tag,
            Pending {
                command,
                tx,
                accumulator,
            },
        );
        Ok((tag, rx))
    }

    /// Delivers reply values for `tag`.
    ///
    /// With `continues` set on a list request the values are buffered and the
    /// request stays pending.  Returns `false` if no request has that tag.
    pub fn complete(&self, tag: u32, values: Vec<Value>, continues: bool) -> bool {
        let mut state = self.lock();
        let Some(pending) = state.pending.get_mut(&tag) else {
            return false;
        };
        if continues {
            if let Accumulator::List {
                values: buffered,
                fragments,
            } = &mut pending.accumulator
            {
                buffered.extend(values);
                *fragments += 1;
                debug!(tag, fragments = *fragments, "buffered list fragment");
                return true;
            }
            warn!(tag, command = ?pending.command, "continuation flag on a non-list reply");
        }
        let Some(pending) = state.pending.remove(&tag) else {
            return false;
        };
        drop(state);
        let result = match pending.accumulator {
            Accumulator::List {
                values: mut buffered,
                ..
            } => {
                buffered.extend(values);
                buffered
            }
            Accumulator::Single => values,
        };
        // The receiver may have given up already; nothing to do then.
        let _ = pending.tx.send(Ok(result));
        true
    }

    /// Resolves `tag` with `error`.  Returns `false` if it was not pending.
    pub fn fail(&self, tag: u32, error: ReplyError) -> bool {
        let pending = self.lock().pending.remove(&tag);
        match pending {
            Some(pending) => {
                let _ = pending.tx.send(Err(error));
                true
            }
            None => false,
        }
    }

    /// Resolves `tag` with [`ReplyError::Cancelled`].
    pub fn cancel(&self, tag: u32) -> bool {
        self.fail(tag, ReplyError::Cancelled)
    }

    /// Resolves `tag` after its deadline passed.
    ///
    /// A list that received fragments but never its final packet resolves
    /// with a truncated-payload decode error; anything else with
    /// [`ReplyError::TimedOut`].
    pub fn expire(&self, tag: u32) -> bool {
        let pending = self.lock().pending.remove(&tag);
        let Some(pending) = pending else {
            return false;
        };
        let error = match pending.accumulator {
            Accumulator::List { fragments, .. } if fragments > 0 => {
                warn!(tag, fragments, "list reply never terminated");
                ReplyError::Decode(DecodeError::TruncatedPayload {
                    needed: 1,
                    available: 0,
                })
            }
            _ => ReplyError::TimedOut,
        };
        let _ = pending.tx.send(Err(error));
        true
    }

    /// Resolves every pending tag with `error` and refuses new registrations.
    ///
    /// Returns how many requests were resolved.
    pub fn fail_all(&self, error: ReplyError) -> usize {
        let drained: Vec<Pending> = {
            let mut state = self.lock();
            state.closed = true;
            state.pending.drain().map(|(_, p)| p).collect()
        };
        let count = drained.len();
        for pending in drained {
            let _ = pending.tx.send(Err(error.clone()));
        }
        count
    }

    pub fn is_pending(&self, tag: u32) -> bool {
        self.lock().pending.contains_key(&tag)
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
