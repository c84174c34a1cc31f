//! Settle-once, observe-many promises for a single-threaded host.
//!
//! A [`Promise`] runs its executor on a later tick of the [`Host`] it was built
//! on, settles at most once, and delivers its outcome to every registered
//! observer in registration order, one observer per tick.
//!
//! # Examples
//!
//! ```
//! use promise_ledger::{EventLoop, Promise, State};
//!
//! let event_loop = EventLoop::new();
//! let host = event_loop.handle();
//! let promise = Promise::<u32, String>::new(&host, |producer| {
//!     producer.resolve(20);
//!     Ok(())
//! });
//! let doubled = promise.then(|value| Ok(value * 2));
//! assert_eq!(doubled.state(), State::Pending);
//!
//! event_loop.run().unwrap();
//! assert_eq!(doubled.settled(), Some(Ok(40)));
//! ```
use thiserror::Error;

pub mod combinators;
pub mod consumer;
pub mod event_loop;
pub mod host;
mod ledger;
pub mod promise;
#[cfg(test)]
mod test_utils;

pub use consumer::Consumer;
pub use event_loop::{Config, EventLoop};
pub use host::{Host, HostRef, Poll, PollToken, Task};
pub use promise::{Member, Producer, Promise};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("the event loop ran dry before the awaited promise settled")]
    Stalled,
    #[error("the event loop exceeded its limit of {0} ticks")]
    TickLimit(usize),
}

/// Observable lifecycle of a [`Promise`]. Leaves `Pending` at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Pending,
    Fulfilled,
    Rejected,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Pending => f.write_str("pending"),
            State::Fulfilled => f.write_str("fulfilled"),
            State::Rejected => f.write_str("rejected"),
        }
    }
}
