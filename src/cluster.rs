//! The contract between operations and whatever sends them to the data store.

use crate::future::OperationFuture;
use crate::operation::{StreamingOperation, UnaryOperation, WireOperation};
use std::sync::Arc;

/// Sends operations to nodes and feeds back what they answer.
///
/// An implementation must eventually either deliver response messages to a submitted operation
/// until it stops reporting [`Progress::Continue`](crate::operation::Progress::Continue), or fail
/// it through [`WireOperation::on_failure`]. A connection on which an operation reported
/// [`Progress::Abandon`](crate::operation::Progress::Abandon) must not carry further exchanges.
/// Retries, load balancing, and timeouts beyond those carried by the request are its own
/// business.
pub trait Cluster: Send + Sync {
    /// Submit an operation answered by a single message.
    fn submit(&self, operation: Box<dyn WireOperation>);

    /// Submit an operation answered by several messages. Implementations that need to treat
    /// these differently, such as by keeping a connection reserved until the last message,
    /// override this.
    #[inline]
    fn submit_streaming(&self, operation: Box<dyn WireOperation>) {
        self.submit(operation);
    }

    /// Execute an operation answered by a single message.
    #[inline]
    fn execute<T, I>(&self, operation: UnaryOperation<T, I>) -> OperationFuture<T, I>
    where
        Self: Sized,
    {
        let (wire, future) = operation.into_parts();
        self.submit(wire);
        future
    }

    /// Execute an operation answered by several messages.
    #[inline]
    fn execute_streaming<T, I>(&self, operation: StreamingOperation<T, I>) -> OperationFuture<T, I>
    where
        Self: Sized,
    {
        let (wire, future) = operation.into_parts();
        self.submit_streaming(wire);
        future
    }
}

impl<C> Cluster for Arc<C>
where
    C: Cluster + ?Sized,
{
    #[inline]
    fn submit(&self, operation: Box<dyn WireOperation>) {
        (**self).submit(operation);
    }

    #[inline]
    fn submit_streaming(&self, operation: Box<dyn WireOperation>) {
        (**self).submit_streaming(operation);
    }
}

impl<C> Cluster for &C
where
    C: Cluster + ?Sized,
{
    #[inline]
    fn submit(&self, operation: Box<dyn WireOperation>) {
        (**self).submit(operation);
    }

    #[inline]
    fn submit_streaming(&self, operation: Box<dyn WireOperation>) {
        (**self).submit_streaming(operation);
    }
}
