//! The two scheduling capabilities a promise needs from its environment.
//!
//! A host defers one-shot work until the current synchronous execution has
//! finished, and runs repeating polls until they are cancelled. Nothing else
//! about the host is visible to a promise.
use std::rc::Rc;

/// Work deferred to run exactly once, after the current tick.
pub type Task = Box<dyn FnOnce()>;

/// Work run once per tick until its token is cancelled.
pub type Poll = Box<dyn FnMut()>;

/// Shared handle every promise keeps to the host it was built on.
pub type HostRef = Rc<dyn Host>;

/// Identifies a repeating poll registered with [`Host::poll_repeating`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PollToken(u64);

impl PollToken {
    pub const fn new(id: u64) -> Self {
        PollToken(id)
    }

    pub const fn id(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for PollToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "poll#{}", self.0)
    }
}

pub trait Host {
    /// Runs `task` once, after the caller has returned.
    fn defer_once(&self, task: Task);

    /// Runs `poll` repeatedly, starting on a later tick, until cancelled.
    fn poll_repeating(&self, poll: Poll) -> PollToken;

    /// Stops a repeating poll. Cancelling from inside the poll itself is
    /// allowed; cancelling an unknown token does nothing.
    fn cancel_poll(&self, token: PollToken);
}
