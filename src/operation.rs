//! Wire operations: one request exchanged for one or more response messages.
//!
//! A concrete operation describes its protocol through [`CoreOperation`] (and
//! [`StreamingCoreOperation`] if its responses arrive in several messages). Wrapping it in an
//! [`Operation`] yields the [`WireOperation`] that a [`Cluster`](crate::cluster::Cluster) drives,
//! together with the [`OperationFuture`] the caller observes.

use crate::codec::{RequestMessage, ResponseMessage};
use crate::error::Error;
use crate::future::{promise, Completed, OperationFuture, Promise};
use crate::queue::{self, QueueWriter, ResultQueue};
use crate::tracing_shim::{debug, trace};
use std::fmt;
use std::mem;
use std::sync::Arc;

/// The protocol behaviour of a concrete operation.
pub trait CoreOperation: Send + 'static {
    /// The decoded form of one response message.
    type Message: prost::Message + Default;
    /// The result the operation produces.
    type Response: Send + Sync + 'static;
    /// Describes what was asked, returned alongside the result.
    type Info: Send + Sync + 'static;

    /// A short name used in logs.
    const NAME: &'static str;
    /// The message code every response message is expected to carry.
    const RESPONSE_CODE: u8;

    /// Build the request. Called exactly once, when the operation is wrapped.
    fn request(&self) -> RequestMessage;

    /// Whether `message` is the last one of the exchange.
    #[inline]
    fn is_done(&self, _message: &Self::Message) -> bool {
        true
    }

    /// Convert every buffered message into the aggregate result.
    ///
    /// When results are streamed, no messages are buffered and this receives an empty vector.
    fn convert(&self, messages: Vec<Self::Message>) -> Result<Self::Response, Error>;

    /// Describe what was asked.
    fn query_info(&self) -> Self::Info;
}

/// An operation whose result may be delivered in pieces as messages arrive.
pub trait StreamingCoreOperation: CoreOperation {
    /// Convert a single message into a partial result.
    fn convert_chunk(&self, message: &Self::Message) -> Result<Self::Response, Error>;

    /// Whether `chunk` carries nothing. Only consulted with [`EmptyChunks::Suppress`].
    #[inline]
    fn is_empty_chunk(&self, _chunk: &Self::Response) -> bool {
        false
    }
}

/// What happens to partial results that carry nothing, such as a final message that only
/// signals completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmptyChunks {
    /// Queue empty chunks like any other.
    #[default]
    Forward,
    /// Leave empty chunks out of the queue.
    Suppress,
}

/// How a streaming operation hands out its result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamMode {
    /// Buffer every message and produce a single aggregate result.
    #[default]
    Buffer,
    /// Push each converted message onto a [`ResultQueue`] as it arrives.
    Stream(EmptyChunks),
}

/// Whether a cluster should keep delivering messages to an operation.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// More messages belonging to this exchange are expected.
    Continue,
    /// The exchange is over and the connection may carry the next one.
    Done,
    /// A message could not be read, so where the exchange ends is unknown. Anything still
    /// arriving on the connection may belong to it, and the connection must not be reused.
    Abandon,
}

/// An operation as seen by a cluster: a request to send and a sink for what comes back.
///
/// Messages for one operation are delivered one at a time, in arrival order.
pub trait WireOperation: Send {
    /// A short name used in logs.
    fn name(&self) -> &'static str;

    /// The request to send.
    fn request(&self) -> &RequestMessage;

    /// Handle the next response message.
    fn on_message(&mut self, message: ResponseMessage) -> Progress;

    /// Fail the operation because the exchange could not continue.
    fn on_failure(&mut self, error: Error);

    /// Whether the operation has an outcome, including cancellation by the caller.
    fn is_finished(&self) -> bool;
}

type ChunkFn<Op> =
    fn(&Op, &<Op as CoreOperation>::Message) -> Result<<Op as CoreOperation>::Response, Error>;
type EmptyFn<Op> = fn(&Op, &<Op as CoreOperation>::Response) -> bool;

struct Streaming<Op: CoreOperation> {
    writer: Arc<QueueWriter<Op::Response>>,
    convert_chunk: ChunkFn<Op>,
    is_empty_chunk: EmptyFn<Op>,
    empty_chunks: EmptyChunks,
}

/// Drives a [`CoreOperation`] through its exchange in either buffering or streaming mode.
struct Exchange<Op: CoreOperation> {
    op: Op,
    request: RequestMessage,
    buffered: Vec<Op::Message>,
    promise: Promise<Op::Response, Op::Info>,
    streaming: Option<Streaming<Op>>,
}

impl<Op> Exchange<Op>
where
    Op: CoreOperation,
{
    fn new(op: Op) -> (Self, OperationFuture<Op::Response, Op::Info>) {
        let (promise, future) = promise();
        let exchange = Self {
            request: op.request(),
            op,
            buffered: Vec::new(),
            promise,
            streaming: None,
        };
        (exchange, future)
    }

    fn fail(&self, error: Error) -> Progress {
        debug!(operation = Op::NAME, %error, "operation failed");
        let _completed = self.promise.fail(error);
        Progress::Done
    }
}

impl<Op> WireOperation for Exchange<Op>
where
    Op: CoreOperation,
{
    fn name(&self) -> &'static str {
        Op::NAME
    }

    fn request(&self) -> &RequestMessage {
        &self.request
    }

    fn on_message(&mut self, message: ResponseMessage) -> Progress {
        let parsed = message.parse::<Op::Message>(Op::RESPONSE_CODE);

        // After cancellation or a failed chunk the rest of the exchange is still read off the
        // connection, but nothing more is delivered.
        if self.promise.is_complete() {
            return match parsed {
                Ok(message) if !self.op.is_done(&message) => Progress::Continue,
                Ok(_) | Err(Error::Server { .. }) => Progress::Done,
                Err(_) => Progress::Abandon,
            };
        }
        trace!(operation = Op::NAME, code = message.code(), "message received");

        let message = match parsed {
            Ok(message) => message,
            // An error response is the last message of its exchange.
            Err(error @ Error::Server { .. }) => return self.fail(error),
            Err(error) => {
                let _progress = self.fail(error);
                return Progress::Abandon;
            }
        };
        let done = self.op.is_done(&message);

        match &self.streaming {
            Some(streaming) => match (streaming.convert_chunk)(&self.op, &message) {
                Ok(chunk) => {
                    let suppressed = streaming.empty_chunks == EmptyChunks::Suppress
                        && (streaming.is_empty_chunk)(&self.op, &chunk);
                    if !suppressed {
                        let _queued = streaming.writer.push(chunk);
                    }
                }
                Err(error) => {
                    let _progress = self.fail(error);
                    return if done {
                        Progress::Done
                    } else {
                        Progress::Continue
                    };
                }
            },
            None => self.buffered.push(message),
        }

        if !done {
            return Progress::Continue;
        }

        let messages = mem::take(&mut self.buffered);
        let outcome = self.op.convert(messages).map(|response| Completed {
            response,
            info: self.op.query_info(),
        });
        debug!(
            operation = Op::NAME,
            succeeded = outcome.is_ok(),
            "operation complete"
        );
        let _completed = self.promise.complete(outcome);
        Progress::Done
    }

    fn on_failure(&mut self, error: Error) {
        let _progress = self.fail(error);
    }

    fn is_finished(&self) -> bool {
        self.promise.is_complete()
    }
}

impl<Op> Drop for Exchange<Op>
where
    Op: CoreOperation,
{
    fn drop(&mut self) {
        if !self.promise.is_complete() {
            let _progress = self.fail(Error::transport("operation dropped before completing"));
        }
    }
}

impl<Op> fmt::Debug for Exchange<Op>
where
    Op: CoreOperation,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange")
            .field("operation", &Op::NAME)
            .field("request", &self.request)
            .field("buffered", &self.buffered.len())
            .field("streaming", &self.streaming.is_some())
            .finish()
    }
}

/// An operation whose response arrives in a single message.
pub struct UnaryOperation<T, I> {
    wire: Box<dyn WireOperation>,
    future: OperationFuture<T, I>,
}

impl<T, I> UnaryOperation<T, I> {
    /// The future completed by this operation.
    #[inline]
    pub fn future(&self) -> OperationFuture<T, I> {
        self.future.clone()
    }

    /// Split into the part a cluster drives and the future the caller observes.
    #[inline]
    pub fn into_parts(self) -> (Box<dyn WireOperation>, OperationFuture<T, I>) {
        (self.wire, self.future)
    }
}

/// An operation whose response may span several messages.
pub struct StreamingOperation<T, I> {
    wire: Box<dyn WireOperation>,
    future: OperationFuture<T, I>,
    results: Option<ResultQueue<T>>,
}

impl<T, I> StreamingOperation<T, I> {
    /// The future completed by this operation.
    ///
    /// When results are streamed it completes with an empty aggregate once the last chunk has
    /// been queued.
    #[inline]
    pub fn future(&self) -> OperationFuture<T, I> {
        self.future.clone()
    }

    /// Whether partial results are pushed onto a queue rather than buffered.
    #[inline]
    pub const fn streams_results(&self) -> bool {
        self.results.is_some()
    }

    /// Take the queue of partial results, if results are streamed and it was not taken yet.
    #[inline]
    pub fn take_results(&mut self) -> Option<ResultQueue<T>> {
        self.results.take()
    }

    /// Split into the part a cluster drives and the future the caller observes.
    #[inline]
    pub fn into_parts(self) -> (Box<dyn WireOperation>, OperationFuture<T, I>) {
        (self.wire, self.future)
    }
}

/// A built operation, ready to be submitted to a cluster.
///
/// Whether an operation is streaming is settled when it is built; clusters are handed each kind
/// through its own entry point.
pub enum Operation<T, I> {
    /// A single request answered by a single message.
    Unary(UnaryOperation<T, I>),
    /// A single request answered by messages up to and including a terminal one.
    Streaming(StreamingOperation<T, I>),
}

impl<T, I> Operation<T, I>
where
    T: Send + Sync + 'static,
    I: Send + Sync + 'static,
{
    /// Wrap an operation answered by a single message.
    pub fn unary<Op>(op: Op) -> Self
    where
        Op: CoreOperation<Response = T, Info = I>,
    {
        let (exchange, future) = Exchange::new(op);
        Self::Unary(UnaryOperation {
            wire: Box::new(exchange),
            future,
        })
    }

    /// Wrap an operation answered by several messages, buffering or streaming them per `mode`.
    pub fn streaming<Op>(op: Op, mode: StreamMode) -> Self
    where
        Op: StreamingCoreOperation<Response = T, Info = I>,
    {
        let (mut exchange, future) = Exchange::new(op);
        let results = match mode {
            StreamMode::Buffer => None,
            StreamMode::Stream(empty_chunks) => {
                let (writer, results) = queue::channel();
                let writer = Arc::new(writer);
                // Whatever ends the operation also ends the queue, so a blocked consumer always
                // wakes up.
                let terminal = Arc::clone(&writer);
                future.on_complete(move |outcome| {
                    let _finished = terminal.finish(outcome.as_ref().map(|_| ()));
                });
                exchange.streaming = Some(Streaming {
                    writer,
                    convert_chunk: Op::convert_chunk,
                    is_empty_chunk: Op::is_empty_chunk,
                    empty_chunks,
                });
                Some(results)
            }
        };
        Self::Streaming(StreamingOperation {
            wire: Box::new(exchange),
            future,
            results,
        })
    }
}

impl<T, I> Operation<T, I> {
    /// The future completed by this operation.
    #[inline]
    pub fn future(&self) -> OperationFuture<T, I> {
        match self {
            Self::Unary(op) => op.future(),
            Self::Streaming(op) => op.future(),
        }
    }

    /// Whether this operation must be submitted through the streaming entry point.
    #[inline]
    pub const fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming(_))
    }
}

impl<T, I> fmt::Debug for UnaryOperation<T, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnaryOperation")
            .field("name", &self.wire.name())
            .field("future", &self.future)
            .finish()
    }
}

impl<T, I> fmt::Debug for StreamingOperation<T, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingOperation")
            .field("name", &self.wire.name())
            .field("future", &self.future)
            .field("results", &self.results)
            .finish()
    }
}

impl<T, I> fmt::Debug for Operation<T, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unary(op) => op.fmt(f),
            Self::Streaming(op) => op.fmt(f),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::proto::kv::RpbListBucketsResp;
    use crate::proto::{code, RpbErrorResp};
    use crate::queue::Delivery;
    use std::time::Duration;

    /// Collects bucket names; done when a message says so.
    struct Names;

    impl CoreOperation for Names {
        type Message = RpbListBucketsResp;
        type Response = Vec<String>;
        type Info = &'static str;

        const NAME: &'static str = "names";
        const RESPONSE_CODE: u8 = code::LIST_BUCKETS_RESP;

        fn request(&self) -> RequestMessage {
            RequestMessage::new(code::LIST_BUCKETS_REQ, &RpbListBucketsResp::default(), None)
        }

        fn is_done(&self, message: &Self::Message) -> bool {
            message.done()
        }

        fn convert(&self, messages: Vec<Self::Message>) -> Result<Self::Response, Error> {
            let mut names = Vec::new();
            for message in &messages {
                names.extend(self.convert_chunk(message)?);
            }
            Ok(names)
        }

        fn query_info(&self) -> Self::Info {
            "names"
        }
    }

    impl StreamingCoreOperation for Names {
        fn convert_chunk(&self, message: &Self::Message) -> Result<Self::Response, Error> {
            message
                .buckets
                .iter()
                .map(|name| {
                    String::from_utf8(name.clone()).map_err(|err| Error::protocol(err.to_string()))
                })
                .collect()
        }

        fn is_empty_chunk(&self, chunk: &Self::Response) -> bool {
            chunk.is_empty()
        }
    }

    fn chunk(names: &[&str], done: bool) -> ResponseMessage {
        ResponseMessage::encode(
            code::LIST_BUCKETS_RESP,
            &RpbListBucketsResp {
                buckets: names.iter().map(|name| name.as_bytes().to_vec()).collect(),
                done: Some(done),
            },
        )
    }

    fn streaming(
        mode: StreamMode,
    ) -> (
        Box<dyn WireOperation>,
        OperationFuture<Vec<String>, &'static str>,
        Option<ResultQueue<Vec<String>>>,
    ) {
        let Operation::Streaming(mut op) = Operation::streaming(Names, mode) else {
            unreachable!("built as a streaming operation");
        };
        let results = op.take_results();
        let (wire, future) = op.into_parts();
        (wire, future, results)
    }

    #[test]
    fn buffering_aggregates_every_message() {
        let (mut wire, future, results) = streaming(StreamMode::Buffer);
        assert!(results.is_none());

        assert_eq!(wire.on_message(chunk(&["b1"], false)), Progress::Continue);
        assert_eq!(wire.on_message(chunk(&["b2", "b3"], false)), Progress::Continue);
        assert!(!future.is_done());
        assert_eq!(wire.on_message(chunk(&[], true)), Progress::Done);

        assert_eq!(
            future.outcome(),
            Some(Ok(Completed {
                response: vec!["b1".to_owned(), "b2".to_owned(), "b3".to_owned()],
                info: "names",
            }))
        );
    }

    #[test]
    fn streaming_preserves_arrival_order() {
        let (mut wire, future, results) = streaming(StreamMode::Stream(EmptyChunks::Suppress));
        let mut results = results.expect("streamed results");

        let batches: Vec<Vec<String>> = (0..5).map(|n| vec![format!("b{n}")]).collect();
        for (n, batch) in batches.iter().enumerate() {
            let names: Vec<&str> = batch.iter().map(String::as_str).collect();
            let progress = wire.on_message(chunk(&names, n == batches.len() - 1));
            assert_eq!(progress == Progress::Done, n == batches.len() - 1);
        }

        for batch in &batches {
            assert_eq!(results.recv(), Delivery::Chunk(batch.clone()));
        }
        assert_eq!(results.recv(), Delivery::Finished);
        // The aggregate still completes, with nothing buffered.
        assert_eq!(future.outcome().map(|o| o.map(|c| c.response)), Some(Ok(vec![])));
    }

    #[test]
    fn empty_final_chunk_is_forwarded_by_default() {
        let (mut wire, _future, results) = streaming(StreamMode::Stream(EmptyChunks::default()));
        let results = results.expect("streamed results");

        let _progress = wire.on_message(chunk(&["b1"], false));
        let _progress = wire.on_message(chunk(&["b2", "b3"], false));
        let _progress = wire.on_message(chunk(&[], true));

        let chunks: Vec<_> = results.collect();
        assert_eq!(
            chunks,
            [
                Ok(vec!["b1".to_owned()]),
                Ok(vec!["b2".to_owned(), "b3".to_owned()]),
                Ok(vec![]),
            ]
        );
    }

    #[test]
    fn empty_final_chunk_can_be_suppressed() {
        let (mut wire, _future, results) = streaming(StreamMode::Stream(EmptyChunks::Suppress));
        let results = results.expect("streamed results");

        let _progress = wire.on_message(chunk(&["b1"], false));
        let _progress = wire.on_message(chunk(&["b2", "b3"], false));
        let _progress = wire.on_message(chunk(&[], true));

        let chunks: Vec<_> = results.collect();
        assert_eq!(
            chunks,
            [
                Ok(vec!["b1".to_owned()]),
                Ok(vec!["b2".to_owned(), "b3".to_owned()]),
            ]
        );
    }

    #[test]
    fn messages_after_completion_are_ignored() {
        let Operation::Unary(op) = Operation::unary(Names) else {
            unreachable!("built as a unary operation");
        };
        let (mut wire, future) = op.into_parts();

        assert_eq!(wire.on_message(chunk(&["only"], false)), Progress::Continue);
        assert_eq!(wire.on_message(chunk(&["last"], true)), Progress::Done);
        assert_eq!(wire.on_message(chunk(&["extra"], true)), Progress::Done);
        wire.on_failure(Error::transport("late"));

        assert!(wire.is_finished());
        assert_eq!(
            future.outcome().map(|o| o.map(|c| c.response)),
            Some(Ok(vec!["only".to_owned(), "last".to_owned()]))
        );
    }

    #[test]
    fn unparsable_message_abandons_the_exchange() {
        let (mut wire, future, results) = streaming(StreamMode::Stream(EmptyChunks::Forward));
        let results = results.expect("streamed results");

        let _progress = wire.on_message(chunk(&["b1"], false));
        let garbage = ResponseMessage::new(code::LIST_BUCKETS_RESP, vec![0xff_u8]);
        let progress = wire.on_message(garbage);
        assert_eq!(progress, Progress::Abandon);

        assert!(matches!(future.outcome(), Some(Err(Error::Protocol(_)))));
        let items: Vec<_> = results.collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], Ok(vec!["b1".to_owned()]));
        assert!(matches!(items[1], Err(Error::Protocol(_))));
    }

    #[test]
    fn unexpected_codes_abandon_the_exchange() {
        let (mut wire, future, _results) = streaming(StreamMode::Buffer);
        let progress = wire.on_message(ResponseMessage::new(code::TS_GET_RESP, Vec::<u8>::new()));
        assert_eq!(progress, Progress::Abandon);
        assert!(matches!(future.outcome(), Some(Err(Error::Protocol(_)))));
    }

    #[test]
    fn rejected_chunks_fail_the_operation_but_drain_the_exchange() {
        let (mut wire, future, results) = streaming(StreamMode::Stream(EmptyChunks::Forward));
        let results = results.expect("streamed results");

        let invalid = ResponseMessage::encode(
            code::LIST_BUCKETS_RESP,
            &RpbListBucketsResp {
                buckets: vec![vec![0xc3, 0x28]],
                done: Some(false),
            },
        );
        assert_eq!(wire.on_message(invalid), Progress::Continue);
        assert!(matches!(future.outcome(), Some(Err(Error::Protocol(_)))));
        assert_eq!(wire.on_message(chunk(&["b2"], false)), Progress::Continue);
        assert_eq!(wire.on_message(chunk(&[], true)), Progress::Done);

        let items: Vec<_> = results.collect();
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(Error::Protocol(_))));
    }

    #[test]
    fn unreadable_messages_after_cancellation_abandon_the_exchange() {
        let (mut wire, future, _results) = streaming(StreamMode::Stream(EmptyChunks::Forward));
        assert!(future.cancel());
        let garbage = ResponseMessage::new(code::LIST_BUCKETS_RESP, vec![0xff_u8]);
        let progress = wire.on_message(garbage);
        assert_eq!(progress, Progress::Abandon);
    }

    #[test]
    fn node_errors_fail_the_operation() {
        let (mut wire, future, _results) = streaming(StreamMode::Buffer);
        let progress = wire.on_message(ResponseMessage::encode(
            code::ERROR_RESP,
            &RpbErrorResp {
                errmsg: b"overloaded".to_vec(),
                errcode: 0,
            },
        ));
        assert_eq!(progress, Progress::Done);
        assert_eq!(
            future.outcome().map(|o| o.map(|c| c.response)),
            Some(Err(Error::Server {
                code: 0,
                message: "overloaded".to_owned()
            }))
        );
    }

    #[test]
    fn transport_failure_reaches_queue_consumers() {
        let (mut wire, future, results) = streaming(StreamMode::Stream(EmptyChunks::Forward));
        let mut results = results.expect("streamed results");

        wire.on_failure(Error::transport("connection reset"));
        assert_eq!(
            results.recv(),
            Delivery::Failed(Error::transport("connection reset"))
        );
        assert!(matches!(future.outcome(), Some(Err(Error::Transport(_)))));
    }

    #[test]
    fn dropping_an_unfinished_operation_fails_it() {
        let (wire, future, results) = streaming(StreamMode::Stream(EmptyChunks::Forward));
        let mut results = results.expect("streamed results");
        drop(wire);

        assert!(matches!(future.outcome(), Some(Err(Error::Transport(_)))));
        assert!(matches!(results.recv(), Delivery::Failed(Error::Transport(_))));
    }

    #[test]
    fn cancellation_wakes_a_blocked_consumer_and_stops_delivery() {
        let (mut wire, future, results) = streaming(StreamMode::Stream(EmptyChunks::Forward));
        let mut results = results.expect("streamed results");

        let _progress = wire.on_message(chunk(&["b1"], false));
        let consumer = std::thread::spawn(move || {
            let first = results.recv_timeout(Duration::from_secs(5));
            let second = results.recv_timeout(Duration::from_secs(5));
            (first, second)
        });
        std::thread::sleep(Duration::from_millis(20));

        assert!(future.cancel());
        assert!(!future.cancel());
        // The remaining messages are drained without reaching the consumer.
        assert_eq!(wire.on_message(chunk(&["b2"], false)), Progress::Continue);
        assert_eq!(wire.on_message(chunk(&["b3"], true)), Progress::Done);
        assert!(wire.is_finished());

        let (first, second) = consumer.join().expect("consumer panicked");
        assert_eq!(first, Some(Delivery::Chunk(vec!["b1".to_owned()])));
        assert_eq!(second, Some(Delivery::Failed(Error::Cancelled)));
    }
}
