use std::rc::Rc;

use tracing::trace;

use crate::host::HostRef;
use crate::ledger::{Ledger, LedgerRef};
use crate::{Error, State};

/// A value of type `T` that will exist later, or a reason `E` why it won't.
///
/// Cloning a `Promise` clones the handle, not the computation: every clone
/// observes the same single settlement.
///
/// # Examples
///
/// ```
/// use promise_ledger::{EventLoop, Promise};
///
/// let event_loop = EventLoop::new();
/// let host = event_loop.handle();
/// let recovered = Promise::<i32, String>::reject(&host, "💥".into())
///     .then(|value| Ok(value + 1))
///     .catch(|reason| Ok(reason.len() as i32));
/// event_loop.run().unwrap();
/// assert_eq!(recovered.settled(), Some(Ok(4)));
/// ```
pub struct Promise<T, E> {
    ledger: LedgerRef<T, E>,
    host: HostRef,
}

/// Settles the promise it was created with. The first call to
/// [`resolve`](Producer::resolve) or [`reject`](Producer::reject) on any clone
/// wins; later calls return `false` and change nothing.
pub struct Producer<T, E> {
    ledger: LedgerRef<T, E>,
    host: HostRef,
}

/// Input to [`Promise::coerce`] and the combinators: an existing promise, or a
/// plain value to wrap in a fulfilled one.
pub enum Member<T, E> {
    Promise(Promise<T, E>),
    Value(T),
}

impl<T, E> From<Promise<T, E>> for Member<T, E> {
    fn from(promise: Promise<T, E>) -> Self {
        Member::Promise(promise)
    }
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Promise {
            ledger: Rc::clone(&self.ledger),
            host: Rc::clone(&self.host),
        }
    }
}

impl<T, E> Clone for Producer<T, E> {
    fn clone(&self) -> Self {
        Producer {
            ledger: Rc::clone(&self.ledger),
            host: Rc::clone(&self.host),
        }
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Producer<T, E> {
    /// A pending promise together with the producer that settles it. Unlike
    /// [`Promise::new`] nothing is scheduled until the producer is used.
    pub fn new(host: &HostRef) -> (Self, Promise<T, E>) {
        let ledger = Ledger::pending();
        let producer = Producer {
            ledger: Rc::clone(&ledger),
            host: Rc::clone(host),
        };
        (producer, Promise { ledger, host: Rc::clone(host) })
    }

    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    pub fn reject(&self, reason: E) -> bool {
        self.settle(Err(reason))
    }

    pub fn settle(&self, outcome: Result<T, E>) -> bool {
        Ledger::settle(&self.ledger, &self.host, outcome)
    }

    pub fn state(&self) -> State {
        self.ledger.borrow().state()
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Promise<T, E> {
    /// Schedules `executor` to run on a later tick of `host` and returns
    /// immediately.
    ///
    /// An executor returning `Err(reason)` rejects the promise, unless it
    /// already settled it through the producer.
    pub fn new<X>(host: &HostRef, executor: X) -> Self
    where
        X: FnOnce(Producer<T, E>) -> Result<(), E> + 'static,
    {
        let (producer, promise) = Producer::new(host);
        host.defer_once(Box::new(move || {
            if let Err(reason) = executor(producer.clone()) {
                trace!("executor failed");
                producer.reject(reason);
            }
        }));
        promise
    }

    /// [`Promise::new`] for callers whose executor may be absent.
    pub fn try_new<X>(host: &HostRef, executor: Option<X>) -> Result<Self, Error>
    where
        X: FnOnce(Producer<T, E>) -> Result<(), E> + 'static,
    {
        let executor = executor.ok_or(Error::InvalidArgument("executor is missing"))?;
        Ok(Self::new(host, executor))
    }

    /// A promise that fulfills with `value` on a later tick.
    pub fn resolve(host: &HostRef, value: T) -> Self {
        Self::new(host, move |producer| {
            producer.resolve(value);
            Ok(())
        })
    }

    /// A promise that rejects with `reason` on a later tick.
    pub fn reject(host: &HostRef, reason: E) -> Self {
        Self::new(host, move |producer| {
            producer.reject(reason);
            Ok(())
        })
    }

    /// Returns a member promise as is, and wraps a plain value with
    /// [`Promise::resolve`].
    pub fn coerce(host: &HostRef, member: impl Into<Member<T, E>>) -> Self {
        match member.into() {
            Member::Promise(promise) => promise,
            Member::Value(value) => Self::resolve(host, value),
        }
    }

    pub fn state(&self) -> State {
        self.ledger.borrow().state()
    }

    pub fn is_pending(&self) -> bool {
        self.state() == State::Pending
    }

    /// The outcome, once settled. Settlement may be visible here before its
    /// observers have been delivered.
    pub fn settled(&self) -> Option<Result<T, E>> {
        self.ledger.borrow().outcome()
    }

    pub fn host(&self) -> &HostRef {
        &self.host
    }

    /// Whether both handles share one settlement.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.ledger, &other.ledger)
    }

    /// The registration operation `then` and `catch` are built on.
    ///
    /// The returned promise settles with whatever the matching handler
    /// returns. Without `on_rejected`, a rejection passes through untouched.
    /// Fails with [`Error::InvalidArgument`] if `on_fulfilled` is absent.
    pub fn derive<U, F, R>(
        &self,
        on_fulfilled: Option<F>,
        on_rejected: Option<R>,
    ) -> Result<Promise<U, E>, Error>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<U, E> + 'static,
        R: FnOnce(E) -> Result<U, E> + 'static,
    {
        let on_fulfilled =
            on_fulfilled.ok_or(Error::InvalidArgument("fulfillment handler is missing"))?;
        Ok(self.chain(on_fulfilled, on_rejected))
    }

    pub fn then<U, F>(&self, on_fulfilled: F) -> Promise<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<U, E> + 'static,
    {
        self.chain(on_fulfilled, None::<fn(E) -> Result<U, E>>)
    }

    pub fn then_or_else<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Promise<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<U, E> + 'static,
        R: FnOnce(E) -> Result<U, E> + 'static,
    {
        self.chain(on_fulfilled, Some(on_rejected))
    }

    /// Lets `on_rejected` recover from a rejection. Fulfillment values pass
    /// through unchanged.
    pub fn catch<R>(&self, on_rejected: R) -> Promise<T, E>
    where
        R: FnOnce(E) -> Result<T, E> + 'static,
    {
        self.chain(Ok, Some(on_rejected))
    }

    fn chain<U, F, R>(&self, on_fulfilled: F, on_rejected: Option<R>) -> Promise<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<U, E> + 'static,
        R: FnOnce(E) -> Result<U, E> + 'static,
    {
        let (producer, derived) = Producer::new(self.host());
        let forward = producer.clone();
        self.observe(
            move |value| {
                producer.settle(on_fulfilled(value));
            },
            move |reason| {
                match on_rejected {
                    Some(handler) => forward.settle(handler(reason)),
                    None => forward.reject(reason),
                };
            },
        );
        derived
    }

    /// Registers a pair of observers without deriving a new promise.
    pub(crate) fn observe(
        &self,
        on_fulfilled: impl FnOnce(T) + 'static,
        on_rejected: impl FnOnce(E) + 'static,
    ) {
        Ledger::observe(
            &self.ledger,
            &self.host,
            Box::new(on_fulfilled),
            Box::new(on_rejected),
        );
    }
}

impl<T, E> std::fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Promise")
            .field("state", &self.ledger.borrow().state())
            .finish()
    }
}

impl<T, E> std::fmt::Debug for Producer<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("state", &self.ledger.borrow().state())
            .finish()
    }
}
