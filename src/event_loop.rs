//! A single-threaded [`Host`] backed by one FIFO ready queue.
//!
//! One-shot tasks and repeating-poll ticks share the queue, so they run in the
//! order they were issued. After each tick of a poll that is still registered,
//! its next tick goes to the back of the queue.
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::rc::Rc;
use std::task::Context;

use tracing::{debug, trace};

use crate::host::{Host, HostRef, Poll, PollToken, Task};
use crate::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Config {
    /// Upper bound on ticks run by a single [`EventLoop::run`] or
    /// [`EventLoop::block_on`] call. `None` means unbounded.
    pub tick_limit: Option<usize>,
}

impl Config {
    pub fn tick_limit(mut self, limit: usize) -> Self {
        self.tick_limit = Some(limit);
        self
    }
}

enum Entry {
    Once(Task),
    Tick(PollToken),
}

#[derive(Default)]
struct Queue {
    ready: VecDeque<Entry>,
    // A poll is `None` while its own tick is running.
    polls: HashMap<PollToken, Option<Poll>>,
    next_token: u64,
}

#[derive(Default)]
struct Shared {
    queue: RefCell<Queue>,
}

impl Host for Shared {
    fn defer_once(&self, task: Task) {
        self.queue.borrow_mut().ready.push_back(Entry::Once(task));
    }

    fn poll_repeating(&self, poll: Poll) -> PollToken {
        let mut queue = self.queue.borrow_mut();
        let token = PollToken::new(queue.next_token);
        queue.next_token += 1;
        queue.polls.insert(token, Some(poll));
        queue.ready.push_back(Entry::Tick(token));
        trace!(%token, "poll registered");
        token
    }

    fn cancel_poll(&self, token: PollToken) {
        if self.queue.borrow_mut().polls.remove(&token).is_some() {
            trace!(%token, "poll cancelled");
        }
    }
}

/// Drives every promise built on its [`handle`](EventLoop::handle).
///
/// # Examples
///
/// ```
/// use promise_ledger::{EventLoop, Host};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let event_loop = EventLoop::new();
/// let ran = Rc::new(Cell::new(false));
/// let flag = ran.clone();
/// event_loop.handle().defer_once(Box::new(move || flag.set(true)));
/// assert!(!ran.get());
/// assert_eq!(event_loop.run(), Ok(1));
/// assert!(ran.get());
/// ```
#[derive(Default)]
pub struct EventLoop {
    shared: Rc<Shared>,
    config: Config,
}

impl EventLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Config) -> Self {
        EventLoop {
            shared: Rc::default(),
            config,
        }
    }

    pub fn config(&self) -> Config {
        self.config
    }

    /// The host handle promises are constructed against.
    pub fn handle(&self) -> HostRef {
        self.shared.clone()
    }

    pub fn is_idle(&self) -> bool {
        self.shared.queue.borrow().ready.is_empty()
    }

    /// Number of repeating polls that have not been cancelled.
    pub fn active_polls(&self) -> usize {
        self.shared.queue.borrow().polls.len()
    }

    /// Runs the entry at the front of the queue. Returns `false` if the queue
    /// was empty.
    pub fn turn(&self) -> bool {
        // The queue must not stay borrowed while user code runs: tasks defer
        // more work through the same handle.
        let entry = self.shared.queue.borrow_mut().ready.pop_front();
        match entry {
            None => false,
            Some(Entry::Once(task)) => {
                task();
                true
            }
            Some(Entry::Tick(token)) => {
                let poll = self
                    .shared
                    .queue
                    .borrow_mut()
                    .polls
                    .get_mut(&token)
                    .and_then(Option::take);
                if let Some(mut poll) = poll {
                    poll();
                    let mut queue = self.shared.queue.borrow_mut();
                    if let Some(slot) = queue.polls.get_mut(&token) {
                        *slot = Some(poll);
                        queue.ready.push_back(Entry::Tick(token));
                    }
                }
                true
            }
        }
    }

    /// Turns until the queue is empty and returns the number of ticks run.
    pub fn run(&self) -> Result<usize, Error> {
        let mut ticks = 0;
        while !self.is_idle() {
            self.ensure_within_limit(ticks)?;
            self.turn();
            ticks += 1;
        }
        debug!(ticks, "event loop idle");
        Ok(ticks)
    }

    /// Polls `future` between turns until it completes.
    ///
    /// Fails with [`Error::Stalled`] if the queue runs dry first: nothing left
    /// on this loop can make the future progress.
    pub fn block_on<F: Future>(&self, future: F) -> Result<F::Output, Error> {
        futures::pin_mut!(future);
        let mut cx = Context::from_waker(futures::task::noop_waker_ref());
        let mut ticks = 0;
        loop {
            if let std::task::Poll::Ready(output) = future.as_mut().poll(&mut cx) {
                debug!(ticks, "blocked-on future completed");
                return Ok(output);
            }
            self.ensure_within_limit(ticks)?;
            if !self.turn() {
                debug!(ticks, "event loop stalled");
                return Err(Error::Stalled);
            }
            ticks += 1;
        }
    }

    fn ensure_within_limit(&self, ticks: usize) -> Result<(), Error> {
        match self.config.tick_limit {
            Some(limit) if ticks >= limit => Err(Error::TickLimit(limit)),
            _ => Ok(()),
        }
    }
}

impl Drop for EventLoop {
    // Queued tasks and polls own `HostRef`s to `shared`; they are released
    // here or never.
    fn drop(&mut self) {
        let (ready, polls) = {
            let mut queue = self.shared.queue.borrow_mut();
            (std::mem::take(&mut queue.ready), std::mem::take(&mut queue.polls))
        };
        if !ready.is_empty() || !polls.is_empty() {
            debug!(ready = ready.len(), polls = polls.len(), "event loop dropped with work queued");
        }
        drop(ready);
        drop(polls);
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let queue = self.shared.queue.borrow();
        f.debug_struct("EventLoop")
            .field("ready", &queue.ready.len())
            .field("polls", &queue.polls.len())
            .field("config", &self.config)
            .finish()
    }
}
