//! Async task bodies
//!
//! Writing a body as an explicit state machine gets tedious for anything with
//! loops. An `AsyncBody` lets an `async` block stand in for it: the block
//! awaits `Suspender::suspend` wherever it wants to give up the CPU, and
//! every `resume()` polls the future exactly once.
//!
//! Nothing here uses real wakers. Readiness is still decided by the wait
//! conditions the scheduler polls, so a no-op waker is enough.

use super::condition::BoxCondition;
use super::task::{BodyError, Step, TaskBody};
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

type Slot = Rc<RefCell<Option<Vec<BoxCondition>>>>;

/// Handle an async body uses to suspend itself
#[derive(Clone)]
pub struct Suspender {
    slot: Slot,
}

impl Suspender {
    /// Suspend until any of `conditions` fires
    pub fn suspend(&self, conditions: Vec<BoxCondition>) -> Suspend {
        Suspend {
            slot: self.slot.clone(),
            conditions: Some(conditions),
        }
    }

    /// Suspend on a single condition
    pub fn wait(&self, condition: BoxCondition) -> Suspend {
        self.suspend(vec![condition])
    }

    /// Give the scheduler a turn without blocking
    pub fn yield_now(&self) -> Suspend {
        self.suspend(Vec::new())
    }
}

/// Future returned by `Suspender::suspend`
///
/// Pending once (handing its conditions to the body), ready on the next poll.
/// Several suspends pending in the same poll (e.g. under `join!`) pool their
/// conditions into one wait set, and all of them resolve on the next resume
/// whichever condition fired.
pub struct Suspend {
    slot: Slot,
    conditions: Option<Vec<BoxCondition>>,
}

impl Future for Suspend {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        match self.conditions.take() {
            Some(conditions) => {
                self.slot
                    .borrow_mut()
                    .get_or_insert_with(Vec::new)
                    .extend(conditions);
                Poll::Pending
            }
            None => Poll::Ready(()),
        }
    }
}

/// A task body driven by a future
pub struct AsyncBody {
    future: Option<Pin<Box<dyn Future<Output = Result<(), BodyError>>>>>,
    slot: Slot,
}

impl AsyncBody {
    /// Build the body from a closure that receives the suspend handle
    pub fn new<F, Fut>(make: F) -> Self
    where
        F: FnOnce(Suspender) -> Fut,
        Fut: Future<Output = Result<(), BodyError>> + 'static,
    {
        let slot: Slot = Rc::new(RefCell::new(None));
        let suspender = Suspender { slot: slot.clone() };
        Self {
            future: Some(Box::pin(make(suspender))),
            slot,
        }
    }
}

impl TaskBody for AsyncBody {
    fn resume(&mut self) -> Result<Step, BodyError> {
        let Some(future) = self.future.as_mut() else {
            return Ok(Step::Complete);
        };

        let mut cx = Context::from_waker(futures::task::noop_waker_ref());
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(result) => {
                self.future = None;
                result.map(|()| Step::Complete)
            }
            // Pending without a suspend call (e.g. some foreign future) is
            // treated as a plain yield.
            Poll::Pending => Ok(Step::Suspend(self.slot.borrow_mut().take().unwrap_or_default())),
        }
    }
}
