//! The ordered queue through which a streaming operation hands out partial results.
//!
//! The producing side is written to from the thread delivering protocol messages; the consuming
//! [`ResultQueue`] is read by the application. Every queue ends with exactly one terminal marker,
//! either the normal end of the stream or the error that stopped it. Nothing is accepted after
//! the terminal marker.

use crate::error::Error;
use async_stream::stream;
use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use futures::Stream;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

enum Entry<T> {
    Chunk(T),
    End,
    Failed(Error),
}

/// The next thing a consumer observes on a [`ResultQueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery<T> {
    /// A partial result, in the order the protocol messages arrived.
    Chunk(T),
    /// The operation completed and no further chunks will arrive.
    Finished,
    /// The operation failed or was cancelled. Chunks delivered earlier remain valid.
    Failed(Error),
}

/// Create a connected producer and consumer.
pub(crate) fn channel<T>() -> (QueueWriter<T>, ResultQueue<T>) {
    // Unbounded so the delivering thread never blocks on a slow consumer.
    let (tx, rx) = unbounded();
    (
        QueueWriter {
            tx: Mutex::new(Some(tx)),
        },
        ResultQueue { rx, terminal: None },
    )
}

/// The producing side of a [`ResultQueue`].
pub(crate) struct QueueWriter<T> {
    tx: Mutex<Option<Sender<Entry<T>>>>,
}

impl<T> QueueWriter<T> {
    /// Append a chunk. Returns `false` once the queue has been terminated.
    pub(crate) fn push(&self, chunk: T) -> bool {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        match &*tx {
            Some(tx) => tx.send(Entry::Chunk(chunk)).is_ok(),
            None => false,
        }
    }

    /// Append the terminal marker. Only the first call has any effect.
    pub(crate) fn finish(&self, result: Result<(), &Error>) -> bool {
        let Some(tx) = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return false;
        };
        let marker = match result {
            Ok(()) => Entry::End,
            Err(err) => Entry::Failed(err.clone()),
        };
        // The consumer may have gone away; the queue is terminated either way.
        let _res = tx.send(marker);
        true
    }
}

impl<T> fmt::Debug for QueueWriter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some();
        f.debug_struct("QueueWriter").field("open", &open).finish()
    }
}

/// Partial results of a streaming operation, in arrival order.
///
/// Iterating blocks the current thread between chunks and ends after the terminal marker; a
/// failure is yielded once as an `Err` before the iterator ends. Use
/// [`ResultQueue::recv_timeout`] for bounded waits or [`ResultQueue::into_stream`] from async
/// code.
pub struct ResultQueue<T> {
    rx: Receiver<Entry<T>>,
    terminal: Option<Result<(), Error>>,
}

impl<T> ResultQueue<T> {
    /// Block until the next delivery.
    ///
    /// Once the terminal marker has been observed, it is returned again on every call.
    pub fn recv(&mut self) -> Delivery<T> {
        if let Some(terminal) = self.terminal_delivery() {
            return terminal;
        }
        let entry = self.rx.recv().ok();
        self.deliver(entry)
    }

    /// Block until the next delivery or until `timeout` elapses, returning `None` on timeout.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<Delivery<T>> {
        if let Some(terminal) = self.terminal_delivery() {
            return Some(terminal);
        }
        match self.rx.recv_timeout(timeout) {
            Ok(entry) => Some(self.deliver(Some(entry))),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(self.deliver(None)),
        }
    }

    /// Return the next delivery if one is already queued.
    pub fn try_recv(&mut self) -> Option<Delivery<T>> {
        if let Some(terminal) = self.terminal_delivery() {
            return Some(terminal);
        }
        match self.rx.try_recv() {
            Ok(entry) => Some(self.deliver(Some(entry))),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(self.deliver(None)),
        }
    }

    /// Whether the terminal marker has been observed.
    #[inline]
    pub const fn is_terminated(&self) -> bool {
        self.terminal.is_some()
    }

    /// Consume the queue from async code.
    ///
    /// Each wait for the next chunk runs on tokio's blocking pool, so this must be polled within
    /// a tokio runtime.
    pub fn into_stream(self) -> impl Stream<Item = Result<T, Error>> + Send
    where
        T: Send + 'static,
    {
        stream! {
            let mut queue = self;
            loop {
                let joined = tokio::task::spawn_blocking(move || {
                    let next = queue.next();
                    (queue, next)
                })
                .await;
                let next = match joined {
                    Ok((returned, next)) => {
                        queue = returned;
                        next
                    }
                    Err(err) => {
                        yield Err(Error::transport(format!("result consumer failed: {err}")));
                        break;
                    }
                };
                match next {
                    Some(item) => yield item,
                    None => break,
                }
            }
        }
    }

    fn terminal_delivery(&self) -> Option<Delivery<T>> {
        match self.terminal.as_ref()? {
            Ok(()) => Some(Delivery::Finished),
            Err(err) => Some(Delivery::Failed(err.clone())),
        }
    }

    fn deliver(&mut self, entry: Option<Entry<T>>) -> Delivery<T> {
        match entry {
            Some(Entry::Chunk(chunk)) => Delivery::Chunk(chunk),
            Some(Entry::End) => {
                self.terminal = Some(Ok(()));
                Delivery::Finished
            }
            Some(Entry::Failed(err)) => {
                self.terminal = Some(Err(err.clone()));
                Delivery::Failed(err)
            }
            // Every producer is gone without writing a terminal marker.
            None => {
                let err = Error::transport("operation dropped before completing");
                self.terminal = Some(Err(err.clone()));
                Delivery::Failed(err)
            }
        }
    }
}

impl<T> Iterator for ResultQueue<T> {
    type Item = Result<T, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.terminal.is_some() {
            return None;
        }
        match self.recv() {
            Delivery::Chunk(chunk) => Some(Ok(chunk)),
            Delivery::Finished => None,
            Delivery::Failed(err) => Some(Err(err)),
        }
    }
}

impl<T> fmt::Debug for ResultQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultQueue")
            .field("queued", &self.rx.len())
            .field("terminal", &self.terminal)
            .finish()
    }
}
