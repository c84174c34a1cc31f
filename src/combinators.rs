//! Fan-in: one promise built from many.
//!
//! Both combinators subscribe to every member as soon as they are called, so
//! the member whose outcome is delivered first decides the race, whatever its
//! position in the input. Plain values are coerced with [`Promise::coerce`].
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::trace;

use crate::host::HostRef;
use crate::promise::{Member, Producer, Promise};

impl<T: Clone + 'static, E: Clone + 'static> Promise<T, E> {
    /// Settles like the first member to settle: `Some(value)` or its reason.
    ///
    /// With no members it fulfills with `None` on a later tick.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_ledger::{EventLoop, Member, Producer, Promise};
    ///
    /// let event_loop = EventLoop::new();
    /// let host = event_loop.handle();
    /// let (_slow, never) = Producer::<u32, ()>::new(&host);
    /// let raced = Promise::<u32, ()>::race(&host, vec![Member::from(never), Member::Value(42)]);
    /// event_loop.run().unwrap();
    /// assert_eq!(raced.settled(), Some(Ok(Some(42))));
    /// ```
    pub fn race<I, M>(host: &HostRef, members: I) -> Promise<Option<T>, E>
    where
        I: IntoIterator<Item = M>,
        M: Into<Member<T, E>>,
    {
        let (producer, raced) = Producer::new(host);
        let mut count = 0usize;
        for member in members {
            let winner = producer.clone();
            let loser = producer.clone();
            Self::coerce(host, member).observe(
                move |value| {
                    winner.resolve(Some(value));
                },
                move |reason| {
                    loser.reject(reason);
                },
            );
            count += 1;
        }
        if count == 0 {
            host.defer_once(Box::new(move || {
                producer.resolve(None);
            }));
        }
        trace!(members = count, "race subscribed");
        raced
    }

    /// Fulfills with every member's value, in input order, once all of them
    /// have fulfilled. Rejects with the first rejection delivered.
    ///
    /// With no members it fulfills with an empty vector on a later tick.
    pub fn all<I, M>(host: &HostRef, members: I) -> Promise<Vec<T>, E>
    where
        I: IntoIterator<Item = M>,
        M: Into<Member<T, E>>,
    {
        let (producer, joined) = Producer::new(host);
        let members: Vec<Promise<T, E>> = members
            .into_iter()
            .map(|member| Self::coerce(host, member))
            .collect();
        trace!(members = members.len(), "all subscribed");
        if members.is_empty() {
            host.defer_once(Box::new(move || {
                producer.resolve(Vec::new());
            }));
            return joined;
        }

        let results: Rc<RefCell<Vec<Option<T>>>> = Rc::new(RefCell::new(vec![None; members.len()]));
        let remaining = Rc::new(Cell::new(members.len()));
        for (index, member) in members.into_iter().enumerate() {
            let results = Rc::clone(&results);
            let remaining = Rc::clone(&remaining);
            let fulfill = producer.clone();
            let reject = producer.clone();
            member.observe(
                move |value| {
                    results.borrow_mut()[index] = Some(value);
                    remaining.set(remaining.get() - 1);
                    if remaining.get() == 0 {
                        let values = results.borrow_mut().drain(..).flatten().collect();
                        fulfill.resolve(values);
                    }
                },
                move |reason| {
                    reject.reject(reason);
                },
            );
        }
        joined
    }
}
