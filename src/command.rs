//! Client-facing commands executed through core operations.
//!
//! A command knows how to build a core operation and how to map the operation's result onto the
//! types its callers work with. [`GenericCommand`] does the rest: it hands the operation to a
//! [`Cluster`] through the entry point matching its kind and adapts the resulting future.

use crate::adapter::{adapt, CommandFuture};
use crate::cluster::Cluster;
use crate::convert::{Converter, Identity};
use crate::error::{ConversionError, Error};
use crate::future::Outcome;
use crate::operation::Operation;
use crate::queue::{Delivery, ResultQueue};
use crate::tracing_shim::debug;
use futures::{Stream, StreamExt as _};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Builds a fresh core operation each time a command is executed.
///
/// Builders validate their arguments when they are configured, so building never fails.
pub trait BuildOperation: Send + Sync {
    /// The core result of the operation.
    type Response: Send + Sync + 'static;
    /// The core description of what was asked.
    type Info: Send + Sync + 'static;

    /// Build the operation to execute.
    fn build_operation(&self) -> Operation<Self::Response, Self::Info>;
}

/// A command whose result is the core result of its operation mapped through two converters.
pub struct GenericCommand<B, R, I>
where
    B: BuildOperation,
{
    builder: B,
    response_converter: Arc<dyn Converter<B::Response, R>>,
    info_converter: Arc<dyn Converter<B::Info, I>>,
}

impl<B> GenericCommand<B, B::Response, B::Info>
where
    B: BuildOperation,
    B::Response: Clone,
    B::Info: Clone,
{
    /// A command returning the core result and info unchanged.
    #[inline]
    pub fn new(builder: B) -> Self {
        Self::with_converters(builder, Arc::new(Identity), Arc::new(Identity))
    }
}

impl<B, R, I> GenericCommand<B, R, I>
where
    B: BuildOperation,
    R: Send + Sync + 'static,
    I: Send + Sync + 'static,
{
    /// A command mapping the core result and info through the given converters.
    #[inline]
    pub fn with_converters(
        builder: B,
        response_converter: Arc<dyn Converter<B::Response, R>>,
        info_converter: Arc<dyn Converter<B::Info, I>>,
    ) -> Self {
        Self {
            builder,
            response_converter,
            info_converter,
        }
    }

    /// The builder the command's operations are built from.
    #[inline]
    pub const fn builder(&self) -> &B {
        &self.builder
    }

    /// Execute the command, returning a future for its client-typed result.
    ///
    /// Streaming operations are submitted through the cluster's streaming entry point, all others
    /// through the unary one. Cancelling the returned future cancels the operation.
    pub fn execute_async<C>(&self, cluster: &C) -> CommandFuture<R, I>
    where
        C: Cluster,
    {
        let core = match self.builder.build_operation() {
            Operation::Unary(op) => {
                debug!(operation = ?op, "submitting unary operation");
                cluster.execute(op)
            }
            Operation::Streaming(op) => {
                debug!(operation = ?op, "submitting streaming operation");
                cluster.execute_streaming(op)
            }
        };
        adapt(
            &core,
            Arc::clone(&self.response_converter),
            Arc::clone(&self.info_converter),
        )
    }

    /// Execute the command and wait for its result.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub async fn execute<C>(&self, cluster: &C) -> Outcome<R, I>
    where
        C: Cluster,
        R: Clone,
        I: Clone,
    {
        self.execute_async(cluster).await
    }

    /// Execute a command whose operation streams its results.
    ///
    /// Returns the command future along with the partial results, each converted through the
    /// command's response converter as it is consumed. The future completes with the converted
    /// empty aggregate once every partial result has been queued.
    ///
    /// Fails with [`Error::InvalidArgument`] if the operation does not stream its results, in
    /// which case nothing is sent.
    pub fn execute_streaming<C>(
        &self,
        cluster: &C,
    ) -> Result<(CommandFuture<R, I>, ChunkedResults<B::Response, R>), Error>
    where
        C: Cluster,
    {
        let Operation::Streaming(mut op) = self.builder.build_operation() else {
            return Err(Error::invalid_argument(
                "the operation is answered by a single message and cannot stream results",
            ));
        };
        let Some(queue) = op.take_results() else {
            return Err(Error::invalid_argument(
                "the operation buffers its results; enable streaming on its builder",
            ));
        };

        debug!(operation = ?op, "submitting streaming operation");
        let core = cluster.execute_streaming(op);
        let future = adapt(
            &core,
            Arc::clone(&self.response_converter),
            Arc::clone(&self.info_converter),
        );
        let results = ChunkedResults {
            queue,
            converter: Arc::clone(&self.response_converter),
        };
        Ok((future, results))
    }
}

impl<B, R, I> fmt::Debug for GenericCommand<B, R, I>
where
    B: BuildOperation + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericCommand")
            .field("builder", &self.builder)
            .finish_non_exhaustive()
    }
}

/// A read-only view of a [`ResultQueue`] that converts each partial result as it is taken.
///
/// Converting a chunk does not affect the chunks after it: a chunk the converter rejects is
/// reported in its place and the view carries on.
pub struct ChunkedResults<S, D> {
    queue: ResultQueue<S>,
    converter: Arc<dyn Converter<S, D>>,
}

impl<S, D> ChunkedResults<S, D> {
    /// Block until the next delivery.
    pub fn recv(&mut self) -> Delivery<Result<D, ConversionError>> {
        let delivery = self.queue.recv();
        self.convert(delivery)
    }

    /// Block until the next delivery or until `timeout` elapses, returning `None` on timeout.
    pub fn recv_timeout(
        &mut self,
        timeout: Duration,
    ) -> Option<Delivery<Result<D, ConversionError>>> {
        let delivery = self.queue.recv_timeout(timeout)?;
        Some(self.convert(delivery))
    }

    /// Whether the terminal marker has been observed.
    #[inline]
    pub const fn is_terminated(&self) -> bool {
        self.queue.is_terminated()
    }

    /// Consume the view from async code. Must be polled within a tokio runtime.
    pub fn into_stream(self) -> impl Stream<Item = Result<D, Error>> + Send
    where
        S: Send + 'static,
        D: 'static,
    {
        let converter = self.converter;
        self.queue
            .into_stream()
            .map(move |chunk| -> Result<D, Error> { Ok(converter.convert(&chunk?)?) })
    }

    fn convert(&self, delivery: Delivery<S>) -> Delivery<Result<D, ConversionError>> {
        match delivery {
            Delivery::Chunk(chunk) => Delivery::Chunk(self.converter.convert(&chunk)),
            Delivery::Finished => Delivery::Finished,
            Delivery::Failed(error) => Delivery::Failed(error),
        }
    }
}

impl<S, D> Iterator for ChunkedResults<S, D> {
    type Item = Result<D, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk = self.queue.next()?;
        Some(chunk.and_then(|chunk| Ok(self.converter.convert(&chunk)?)))
    }
}

impl<S, D> fmt::Debug for ChunkedResults<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkedResults")
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}
