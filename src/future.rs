//! Single-assignment futures for in-flight operations.
//!
//! A [`Promise`] is held by whatever completes the operation; the matching [`OperationFuture`]
//! is handed to callers. Exactly one of success, failure, or cancellation is ever recorded.
//! Listeners registered after completion run immediately with the recorded outcome, so a
//! listener attached just after the operation finished is never lost.

use crate::error::Error;
use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};
use std::time::Duration;

/// The successful result of an operation: its response and a description of what was asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completed<T, I> {
    /// The response produced by the operation.
    pub response: T,
    /// Describes the request that produced `response`, for correlating asynchronous results.
    pub info: I,
}

/// How an operation ended.
pub type Outcome<T, I> = Result<Completed<T, I>, Error>;

type Listener<T, I> = Box<dyn FnOnce(&Outcome<T, I>) + Send>;

enum State<T, I> {
    Pending {
        listeners: Vec<Listener<T, I>>,
        wakers: Vec<Waker>,
    },
    Complete(Arc<Outcome<T, I>>),
}

struct Shared<T, I> {
    state: Mutex<State<T, I>>,
    /// Signalled once the outcome is recorded, for threads blocked in a bounded wait.
    completed: Condvar,
}

impl<T, I> Shared<T, I> {
    fn lock(&self) -> MutexGuard<'_, State<T, I>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the outcome if none has been recorded yet. Listeners run before wakers so that
    /// anything a listener publishes is visible to tasks woken afterwards.
    fn complete(&self, outcome: Outcome<T, I>) -> bool {
        let mut state = self.lock();
        let (listeners, wakers) = match &mut *state {
            State::Pending { listeners, wakers } => (mem::take(listeners), mem::take(wakers)),
            State::Complete(_) => return false,
        };
        let outcome = Arc::new(outcome);
        *state = State::Complete(Arc::clone(&outcome));
        drop(state);

        for listener in listeners {
            listener(&outcome);
        }
        self.completed.notify_all();
        for waker in wakers {
            waker.wake();
        }
        true
    }

    fn is_complete(&self) -> bool {
        matches!(*self.lock(), State::Complete(_))
    }
}

/// Something upstream of a future that can be cancelled through it.
pub(crate) trait Cancel: Send + Sync {
    fn cancel(&self) -> bool;
}

impl<T, I> Cancel for Shared<T, I>
where
    T: Send + Sync,
    I: Send + Sync,
{
    fn cancel(&self) -> bool {
        self.complete(Err(Error::Cancelled))
    }
}

/// Create a connected [`Promise`] and [`OperationFuture`].
#[inline]
pub fn promise<T, I>() -> (Promise<T, I>, OperationFuture<T, I>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State::Pending {
            listeners: Vec::new(),
            wakers: Vec::new(),
        }),
        completed: Condvar::new(),
    });
    (
        Promise {
            shared: Arc::clone(&shared),
        },
        OperationFuture {
            shared,
            upstream: None,
        },
    )
}

/// The completing side of an [`OperationFuture`].
pub struct Promise<T, I> {
    shared: Arc<Shared<T, I>>,
}

impl<T, I> Promise<T, I> {
    /// Complete successfully. Returns `false` if an outcome was already recorded.
    #[inline]
    pub fn succeed(&self, response: T, info: I) -> bool {
        self.shared.complete(Ok(Completed { response, info }))
    }

    /// Complete with a failure. Returns `false` if an outcome was already recorded.
    #[inline]
    pub fn fail(&self, error: Error) -> bool {
        self.shared.complete(Err(error))
    }

    /// Record an already-built outcome. Returns `false` if an outcome was already recorded.
    #[inline]
    pub fn complete(&self, outcome: Outcome<T, I>) -> bool {
        self.shared.complete(outcome)
    }

    /// Whether an outcome has been recorded, including cancellation by the caller.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.shared.is_complete()
    }
}

impl<T, I> fmt::Debug for Promise<T, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("complete", &self.is_complete())
            .finish()
    }
}

/// The asynchronous result of an operation.
///
/// Awaiting yields a clone of the recorded outcome, so the future may be awaited through any
/// number of clones. Callers that cannot await can use [`OperationFuture::on_complete`] or
/// [`OperationFuture::wait_timeout`].
pub struct OperationFuture<T, I> {
    shared: Arc<Shared<T, I>>,
    upstream: Option<Arc<dyn Cancel>>,
}

impl<T, I> OperationFuture<T, I> {
    /// Cancel the operation if it has not completed.
    ///
    /// Returns `false` if an outcome was already recorded, in which case nothing changes. If the
    /// future was derived from another one, the cancellation is forwarded upstream first.
    #[inline]
    pub fn cancel(&self) -> bool {
        let forwarded = self.upstream.as_ref().is_some_and(|upstream| upstream.cancel());
        let cancelled = self.shared.complete(Err(Error::Cancelled));
        forwarded || cancelled
    }

    /// Whether an outcome has been recorded.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.shared.is_complete()
    }

    /// Whether the recorded outcome is a cancellation.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        match &*self.shared.lock() {
            State::Complete(outcome) => matches!(**outcome, Err(Error::Cancelled)),
            State::Pending { .. } => false,
        }
    }

    /// Run `listener` once the outcome is known.
    ///
    /// If the future has already completed, `listener` runs immediately on the calling thread.
    /// Otherwise it runs on whichever thread records the outcome.
    pub fn on_complete<F>(&self, listener: F)
    where
        F: FnOnce(&Outcome<T, I>) + Send + 'static,
    {
        let mut state = self.shared.lock();
        let outcome = match &mut *state {
            State::Pending { listeners, .. } => {
                listeners.push(Box::new(listener));
                return;
            }
            State::Complete(outcome) => Arc::clone(outcome),
        };
        drop(state);
        listener(&outcome);
    }

    /// The recorded outcome, if any.
    #[inline]
    pub fn outcome(&self) -> Option<Outcome<T, I>>
    where
        T: Clone,
        I: Clone,
    {
        match &*self.shared.lock() {
            State::Complete(outcome) => Some((**outcome).clone()),
            State::Pending { .. } => None,
        }
    }

    /// Block the current thread until the outcome is known or `timeout` elapses.
    ///
    /// Returns `None` on timeout. Must not be called from within an async task.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Outcome<T, I>>
    where
        T: Clone,
        I: Clone,
    {
        let state = self.shared.lock();
        let (state, _timed_out) = self
            .shared
            .completed
            .wait_timeout_while(state, timeout, |state| {
                matches!(state, State::Pending { .. })
            })
            .unwrap_or_else(PoisonError::into_inner);
        match &*state {
            State::Complete(outcome) => Some((**outcome).clone()),
            State::Pending { .. } => None,
        }
    }

    pub(crate) fn with_upstream(mut self, upstream: Arc<dyn Cancel>) -> Self {
        self.upstream = Some(upstream);
        self
    }

    pub(crate) fn as_cancel(&self) -> Arc<dyn Cancel>
    where
        T: Send + Sync + 'static,
        I: Send + Sync + 'static,
    {
        // An adapted future is cancelled through its own upstream chain.
        match &self.upstream {
            Some(upstream) => Arc::clone(upstream),
            None => Arc::clone(&self.shared) as Arc<dyn Cancel>,
        }
    }
}

impl<T, I> Clone for OperationFuture<T, I> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            upstream: self.upstream.clone(),
        }
    }
}

impl<T, I> Future for OperationFuture<T, I>
where
    T: Clone,
    I: Clone,
{
    type Output = Outcome<T, I>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.lock();
        match &mut *state {
            State::Complete(outcome) => Poll::Ready((**outcome).clone()),
            State::Pending { wakers, .. } => {
                if !wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
                    wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

impl<T, I> fmt::Debug for OperationFuture<T, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.shared.lock() {
            State::Pending { .. } => "pending",
            State::Complete(outcome) => match **outcome {
                Ok(_) => "succeeded",
                Err(Error::Cancelled) => "cancelled",
                Err(_) => "failed",
            },
        };
        f.debug_struct("OperationFuture")
            .field("state", &state)
            .field("adapted", &self.upstream.is_some())
            .finish()
    }
}
