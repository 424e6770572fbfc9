//! Listing the buckets of a bucket type.
//!
//! The node answers with one or more messages, the last of which is marked done. Results are
//! either buffered into a single [`Response`] or streamed, one [`Response`] per message.

use super::timeout_millis;
use crate::codec::RequestMessage;
use crate::command::BuildOperation;
use crate::error::Error;
use crate::operation::{CoreOperation, EmptyChunks, Operation, StreamMode, StreamingCoreOperation};
use crate::proto::code;
use crate::proto::kv::{RpbListBucketsReq, RpbListBucketsResp};
use std::time::Duration;

/// The bucket type listed when none is given.
pub const DEFAULT_BUCKET_TYPE: &str = "default";

/// Buckets of a bucket type: all of them, or those carried by one message when streaming.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    /// The bucket type that was listed.
    pub bucket_type: Vec<u8>,
    /// Bucket names, in the order the node sent them.
    pub buckets: Vec<Vec<u8>>,
}

/// Configures a list-buckets operation.
#[derive(Debug, Clone)]
pub struct Builder {
    bucket_type: Option<Vec<u8>>,
    timeout: Option<u32>,
    stream: bool,
    empty_chunks: EmptyChunks,
}

impl Default for Builder {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    /// List the buckets of the default bucket type, buffering the results.
    #[inline]
    pub fn new() -> Self {
        Self {
            bucket_type: None,
            timeout: None,
            stream: false,
            empty_chunks: EmptyChunks::default(),
        }
    }

    /// How long the node may take to answer. Must be at least one millisecond.
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, Error> {
        self.timeout = Some(timeout_millis(timeout)?);
        Ok(self)
    }

    /// List the buckets of `bucket_type`, which must not be empty.
    ///
    /// Without one, the request leaves the bucket type to the node, which lists
    /// [`DEFAULT_BUCKET_TYPE`].
    #[inline]
    pub fn with_bucket_type(mut self, bucket_type: impl Into<Vec<u8>>) -> Result<Self, Error> {
        let bucket_type = bucket_type.into();
        if bucket_type.is_empty() {
            return Err(Error::invalid_argument("bucket type cannot be empty"));
        }
        self.bucket_type = Some(bucket_type);
        Ok(self)
    }

    /// Push results onto a queue as each message arrives rather than buffering them.
    #[inline]
    pub const fn stream_results(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// What to do with messages carrying no buckets when streaming.
    #[inline]
    pub const fn empty_chunks(mut self, empty_chunks: EmptyChunks) -> Self {
        self.empty_chunks = empty_chunks;
        self
    }

    /// Build the operation. Its query info is the bucket type.
    pub fn build(&self) -> Operation<Response, Vec<u8>> {
        let mode = if self.stream {
            StreamMode::Stream(self.empty_chunks)
        } else {
            StreamMode::Buffer
        };
        Operation::streaming(
            ListBuckets {
                requested_type: self.bucket_type.clone(),
                bucket_type: self
                    .bucket_type
                    .clone()
                    .unwrap_or_else(|| DEFAULT_BUCKET_TYPE.as_bytes().to_vec()),
                timeout: self.timeout,
            },
            mode,
        )
    }
}

impl BuildOperation for Builder {
    type Response = Response;
    type Info = Vec<u8>;

    #[inline]
    fn build_operation(&self) -> Operation<Self::Response, Self::Info> {
        self.build()
    }
}

#[derive(Debug)]
struct ListBuckets {
    /// Sent only when given explicitly.
    requested_type: Option<Vec<u8>>,
    bucket_type: Vec<u8>,
    timeout: Option<u32>,
}

impl CoreOperation for ListBuckets {
    type Message = RpbListBucketsResp;
    type Response = Response;
    type Info = Vec<u8>;

    const NAME: &'static str = "list_buckets";
    const RESPONSE_CODE: u8 = code::LIST_BUCKETS_RESP;

    fn request(&self) -> RequestMessage {
        let request = RpbListBucketsReq {
            timeout: self.timeout,
            // The node only ends a listing with a done message when asked to stream it.
            stream: Some(true),
            r#type: self.requested_type.clone(),
        };
        RequestMessage::new(
            code::LIST_BUCKETS_REQ,
            &request,
            self.timeout.map(|millis| Duration::from_millis(millis.into())),
        )
    }

    fn is_done(&self, message: &Self::Message) -> bool {
        message.done()
    }

    fn convert(&self, messages: Vec<Self::Message>) -> Result<Self::Response, Error> {
        Ok(Response {
            bucket_type: self.bucket_type.clone(),
            buckets: messages
                .into_iter()
                .flat_map(|message| message.buckets)
                .collect(),
        })
    }

    fn query_info(&self) -> Self::Info {
        self.bucket_type.clone()
    }
}

impl StreamingCoreOperation for ListBuckets {
    fn convert_chunk(&self, message: &Self::Message) -> Result<Self::Response, Error> {
        Ok(Response {
            bucket_type: self.bucket_type.clone(),
            buckets: message.buckets.clone(),
        })
    }

    fn is_empty_chunk(&self, chunk: &Self::Response) -> bool {
        chunk.buckets.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::codec::ResponseMessage;
    use crate::future::Completed;
    use crate::operation::Progress;
    use crate::queue::Delivery;
    use prost::Message as _;

    fn chunk(names: &[&str], done: bool) -> ResponseMessage {
        ResponseMessage::encode(
            code::LIST_BUCKETS_RESP,
            &RpbListBucketsResp {
                buckets: names.iter().map(|name| name.as_bytes().to_vec()).collect(),
                done: Some(done),
            },
        )
    }

    fn response(bucket_type: &str, buckets: &[&str]) -> Response {
        Response {
            bucket_type: bucket_type.as_bytes().to_vec(),
            buckets: buckets.iter().map(|name| name.as_bytes().to_vec()).collect(),
        }
    }

    #[test]
    fn builder_rejects_bad_arguments() {
        assert!(matches!(
            Builder::new().with_timeout(Duration::ZERO),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            Builder::new().with_bucket_type(""),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn request_carries_type_timeout_and_stream_flag() -> Result<(), Box<dyn std::error::Error>> {
        let Operation::Streaming(op) = Builder::new()
            .with_bucket_type("maps")?
            .with_timeout(Duration::from_millis(1_500))?
            .build()
        else {
            unreachable!("list buckets always streams its messages");
        };
        let (wire, _future) = op.into_parts();
        let request = wire.request();

        assert_eq!(request.code(), code::LIST_BUCKETS_REQ);
        assert_eq!(request.timeout(), Some(Duration::from_millis(1_500)));
        assert_eq!(
            RpbListBucketsReq::decode(request.payload())?,
            RpbListBucketsReq {
                timeout: Some(1_500),
                stream: Some(true),
                r#type: Some(b"maps".to_vec()),
            }
        );
        Ok(())
    }

    #[test]
    fn default_type_is_left_to_the_node() -> Result<(), Box<dyn std::error::Error>> {
        let Operation::Streaming(op) = Builder::new().build() else {
            unreachable!("list buckets always streams its messages");
        };
        let (wire, _future) = op.into_parts();

        let request = RpbListBucketsReq::decode(wire.request().payload())?;
        assert_eq!(request.r#type, None);
        assert_eq!(request.timeout, None);
        assert_eq!(request.stream, Some(true));
        Ok(())
    }

    #[test]
    fn buffered_listing_aggregates_all_messages() {
        let Operation::Streaming(op) = Builder::new().build() else {
            unreachable!("list buckets always streams its messages");
        };
        assert!(!op.streams_results());
        let (mut wire, future) = op.into_parts();

        assert_eq!(wire.on_message(chunk(&["b1"], false)), Progress::Continue);
        assert_eq!(wire.on_message(chunk(&["b2", "b3"], false)), Progress::Continue);
        assert_eq!(wire.on_message(chunk(&[], true)), Progress::Done);

        assert_eq!(
            future.outcome(),
            Some(Ok(Completed {
                response: response("default", &["b1", "b2", "b3"]),
                info: b"default".to_vec(),
            }))
        );
    }

    #[test]
    fn streamed_listing_pushes_one_response_per_message() {
        let Operation::Streaming(mut op) = Builder::new()
            .stream_results(true)
            .empty_chunks(EmptyChunks::Suppress)
            .build()
        else {
            unreachable!("list buckets always streams its messages");
        };
        let mut results = op.take_results().expect("streamed results");
        let (mut wire, future) = op.into_parts();

        let _progress = wire.on_message(chunk(&["b1"], false));
        let _progress = wire.on_message(chunk(&["b2", "b3"], false));
        let _progress = wire.on_message(chunk(&[], true));

        assert_eq!(results.recv(), Delivery::Chunk(response("default", &["b1"])));
        assert_eq!(
            results.recv(),
            Delivery::Chunk(response("default", &["b2", "b3"]))
        );
        assert_eq!(results.recv(), Delivery::Finished);
        assert_eq!(
            future.outcome().map(|outcome| outcome.map(|completed| completed.response)),
            Some(Ok(response("default", &[])))
        );
    }
}
