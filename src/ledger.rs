//! Private settlement state shared by a promise, its producers and the
//! delivery poll.
//!
//! A ledger leaves `Pending` at most once. Once it holds an outcome and has
//! undelivered observers it arms a repeating poll on its host; each tick hands
//! the outcome to one observer, oldest first, and the poll cancels itself when
//! the matching queue is empty. Registering after settlement re-arms it.
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::trace;

use crate::host::{HostRef, PollToken, Task};
use crate::State;

pub(crate) type Observer<A> = Box<dyn FnOnce(A)>;

pub(crate) type LedgerRef<T, E> = Rc<RefCell<Ledger<T, E>>>;

pub(crate) enum Settlement<T, E> {
    Pending,
    Fulfilled(T),
    Rejected(E),
}

pub(crate) struct Ledger<T, E> {
    settlement: Settlement<T, E>,
    on_fulfilled: VecDeque<Observer<T>>,
    on_rejected: VecDeque<Observer<E>>,
    delivery: Option<PollToken>,
}

impl<T, E> Ledger<T, E> {
    pub(crate) fn state(&self) -> State {
        match self.settlement {
            Settlement::Pending => State::Pending,
            Settlement::Fulfilled(_) => State::Fulfilled,
            Settlement::Rejected(_) => State::Rejected,
        }
    }

    /// Observers still waiting on the branch the ledger settled into.
    fn undelivered(&self) -> usize {
        match self.settlement {
            Settlement::Pending => 0,
            Settlement::Fulfilled(_) => self.on_fulfilled.len(),
            Settlement::Rejected(_) => self.on_rejected.len(),
        }
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Ledger<T, E> {
    pub(crate) fn pending() -> LedgerRef<T, E> {
        Rc::new(RefCell::new(Ledger {
            settlement: Settlement::Pending,
            on_fulfilled: VecDeque::new(),
            on_rejected: VecDeque::new(),
            delivery: None,
        }))
    }

    pub(crate) fn outcome(&self) -> Option<Result<T, E>> {
        match &self.settlement {
            Settlement::Pending => None,
            Settlement::Fulfilled(value) => Some(Ok(value.clone())),
            Settlement::Rejected(reason) => Some(Err(reason.clone())),
        }
    }

    /// Moves the ledger out of `Pending`. Returns `false`, changing nothing,
    /// if it had already settled.
    pub(crate) fn settle(this: &LedgerRef<T, E>, host: &HostRef, outcome: Result<T, E>) -> bool {
        // The losing branch's observers are dropped after the borrow ends;
        // their captures may own other ledgers.
        let discarded = {
            let mut guard = this.borrow_mut();
            let ledger = &mut *guard;
            if !matches!(ledger.settlement, Settlement::Pending) {
                trace!(state = %ledger.state(), "settlement ignored");
                return false;
            }
            let discarded = match outcome {
                Ok(value) => {
                    ledger.settlement = Settlement::Fulfilled(value);
                    (VecDeque::new(), std::mem::take(&mut ledger.on_rejected))
                }
                Err(reason) => {
                    ledger.settlement = Settlement::Rejected(reason);
                    (std::mem::take(&mut ledger.on_fulfilled), VecDeque::new())
                }
            };
            trace!(state = %ledger.state(), observers = ledger.undelivered(), "settled");
            if ledger.undelivered() > 0 {
                Self::arm(this, ledger, host);
            }
            discarded
        };
        drop(discarded);
        true
    }

    /// Queues one observer per branch. After settlement only the matching
    /// observer is kept, and it is still delivered on a later tick.
    pub(crate) fn observe(
        this: &LedgerRef<T, E>,
        host: &HostRef,
        on_fulfilled: Observer<T>,
        on_rejected: Observer<E>,
    ) {
        let mut guard = this.borrow_mut();
        let ledger = &mut *guard;
        match ledger.settlement {
            Settlement::Pending => {
                ledger.on_fulfilled.push_back(on_fulfilled);
                ledger.on_rejected.push_back(on_rejected);
                return;
            }
            Settlement::Fulfilled(_) => ledger.on_fulfilled.push_back(on_fulfilled),
            Settlement::Rejected(_) => ledger.on_rejected.push_back(on_rejected),
        }
        Self::arm(this, ledger, host);
    }

    fn arm(this: &LedgerRef<T, E>, ledger: &mut Ledger<T, E>, host: &HostRef) {
        if ledger.delivery.is_some() {
            return;
        }
        let ledger_ref = Rc::clone(this);
        let poll_host = Rc::clone(host);
        let token = host.poll_repeating(Box::new(move || {
            Self::deliver_next(&ledger_ref, &poll_host)
        }));
        trace!(%token, "delivery armed");
        ledger.delivery = Some(token);
    }

    fn deliver_next(this: &LedgerRef<T, E>, host: &HostRef) {
        let delivery: Option<Task> = {
            let mut guard = this.borrow_mut();
            let ledger = &mut *guard;
            match &ledger.settlement {
                Settlement::Pending => return,
                Settlement::Fulfilled(value) => ledger.on_fulfilled.pop_front().map(|observer| {
                    let value = value.clone();
                    Box::new(move || observer(value)) as Task
                }),
                Settlement::Rejected(reason) => ledger.on_rejected.pop_front().map(|observer| {
                    let reason = reason.clone();
                    Box::new(move || observer(reason)) as Task
                }),
            }
        };
        if let Some(deliver) = delivery {
            deliver();
        }

        // The observer may have registered more observers on this ledger.
        let drained = {
            let mut ledger = this.borrow_mut();
            if ledger.undelivered() == 0 {
                ledger.delivery.take()
            } else {
                None
            }
        };
        if let Some(token) = drained {
            trace!(%token, "delivery drained");
            host.cancel_poll(token);
        }
    }
}

#[cfg(test)]
mod tests {
use super::Ledger;
use crate::{EventLoop, State};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn test_first_settlement_wins() {
    crate::test_utils::init_test_logging();
    let event_loop = EventLoop::new();
    let host = event_loop.handle();
    let ledger = Ledger::<u8, &str>::pending();
    assert!(Ledger::settle(&ledger, &host, Ok(1)));
    assert!(!Ledger::settle(&ledger, &host, Ok(2)));
    assert!(!Ledger::settle(&ledger, &host, Err("late")));
    assert_eq!(ledger.borrow().state(), State::Fulfilled);
    assert_eq!(ledger.borrow().outcome(), Some(Ok(1)));
}

#[test]
fn test_one_observer_per_tick_then_poll_cancels() {
    crate::test_utils::init_test_logging();
    let event_loop = EventLoop::new();
    let host = event_loop.handle();
    let ledger = Ledger::<u8, &str>::pending();
    let seen = Rc::new(RefCell::new(vec![]));
    for name in ["a", "b", "c"] {
        let seen = seen.clone();
        Ledger::observe(
            &ledger,
            &host,
            Box::new(move |value| seen.borrow_mut().push((name, value))),
            Box::new(|_| unreachable!("rejection observer on a fulfilled ledger")),
        );
    }
    assert_eq!(event_loop.active_polls(), 0);
    Ledger::settle(&ledger, &host, Ok(9));
    assert_eq!(event_loop.active_polls(), 1);

    assert!(event_loop.turn());
    assert_eq!(*seen.borrow(), vec![("a", 9)]);
    assert!(event_loop.turn());
    assert!(event_loop.turn());
    assert_eq!(*seen.borrow(), vec![("a", 9), ("b", 9), ("c", 9)]);
    assert_eq!(event_loop.active_polls(), 0);
    assert!(event_loop.is_idle());
}

#[test]
fn test_observer_after_settlement_is_deferred() {
    crate::test_utils::init_test_logging();
    let event_loop = EventLoop::new();
    let host = event_loop.handle();
    let ledger = Ledger::<u8, &str>::pending();
    Ledger::settle(&ledger, &host, Err("nope"));
    event_loop.run().unwrap();

    let seen = Rc::new(RefCell::new(None));
    let sink = seen.clone();
    Ledger::observe(
        &ledger,
        &host,
        Box::new(|_| unreachable!("fulfillment observer on a rejected ledger")),
        Box::new(move |reason| *sink.borrow_mut() = Some(reason)),
    );
    assert_eq!(*seen.borrow(), None);
    event_loop.run().unwrap();
    assert_eq!(*seen.borrow(), Some("nope"));
}

#[test]
fn test_pending_ledger_arms_nothing() {
    crate::test_utils::init_test_logging();
    let event_loop = EventLoop::new();
    let host = event_loop.handle();
    let ledger = Ledger::<u8, &str>::pending();
    Ledger::observe(&ledger, &host, Box::new(|_| {}), Box::new(|_| {}));
    assert_eq!(event_loop.run(), Ok(0));
    assert_eq!(ledger.borrow().state(), State::Pending);
}
}
