use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::promise::Promise;

/// Awaits a [`Promise`] from `async` code. Any number of consumers may be
/// taken from one promise; each yields its own copy of the outcome once.
///
/// Nothing completes unless the promise's event loop keeps turning, so these
/// are normally driven with [`EventLoop::block_on`](crate::EventLoop::block_on).
///
/// # Examples
///
/// ```
/// use promise_ledger::{EventLoop, Promise};
///
/// let event_loop = EventLoop::new();
/// let host = event_loop.handle();
/// let consumer = Promise::<String, ()>::resolve(&host, "🍓".into()).consumer();
/// let received = event_loop.block_on(async { consumer.await }).unwrap();
/// assert_eq!(received, Ok("🍓".to_string()));
/// ```
#[derive(Debug)]
pub struct Consumer<T, E> {
    promise: Rc<RefCell<Inner<T, E>>>,
}

#[derive(Debug)]
struct Inner<T, E> {
    value: Option<Result<T, E>>,
    waker: Vec<Waker>,
}

impl<T: Clone + 'static, E: Clone + 'static> Promise<T, E> {
    pub fn consumer(&self) -> Consumer<T, E> {
        let inner = Rc::new(RefCell::new(Inner {
            value: None,
            waker: vec![],
        }));
        let fulfilled = Rc::clone(&inner);
        let rejected = Rc::clone(&inner);
        self.observe(
            move |value| Inner::complete(&fulfilled, Ok(value)),
            move |reason| Inner::complete(&rejected, Err(reason)),
        );
        Consumer { promise: inner }
    }
}

impl<T, E> Inner<T, E> {
    fn complete(this: &Rc<RefCell<Self>>, outcome: Result<T, E>) {
        let wakers = {
            let mut promise = this.borrow_mut();
            promise.value = Some(outcome);
            std::mem::take(&mut promise.waker)
        };
        for waker in wakers {
            waker.wake()
        }
    }
}

impl<T, E> Future for Consumer<T, E> {
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut promise = self.promise.borrow_mut();
        match promise.value.take() {
            Some(value) => Poll::Ready(value),
            None => {
                if !promise.waker.iter().any(|waker| waker.will_wake(cx.waker())) {
                    promise.waker.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

#[cfg(test)]
mod tests {
use crate::{Error, EventLoop, Producer, Promise};

#[test]
fn test_two_consumers_resolve() {
    crate::test_utils::init_test_logging();
    let event_loop = EventLoop::new();
    let host = event_loop.handle();
    let (op, promise) = Producer::<String, ()>::new(&host);
    let op_a = promise.consumer();
    let op_b = promise.consumer();
    op.resolve(String::from("🍓"));
    let (a, b) = event_loop
        .block_on(async { futures::join!(op_a, op_b) })
        .unwrap();
    assert_eq!(a, Ok("🍓".to_string()));
    assert_eq!(b, Ok("🍓".to_string()));
}

#[test]
fn test_consumer_reject() {
    crate::test_utils::init_test_logging();
    let event_loop = EventLoop::new();
    let host = event_loop.handle();
    let consumer = Promise::<(), String>::reject(&host, "reject!!".into()).consumer();
    assert_eq!(event_loop.block_on(consumer), Ok(Err("reject!!".to_string())));
}

#[test]
fn test_unsettled_consumer_stalls() {
    crate::test_utils::init_test_logging();
    let event_loop = EventLoop::new();
    let (_op, promise) = Producer::<String, ()>::new(&event_loop.handle());
    assert_eq!(event_loop.block_on(promise.consumer()), Err(Error::Stalled));
}
}
