//! Length-prefixed framing of protocol messages.
//!
//! Each frame is a four-byte big-endian length, followed by a one-byte message code and the
//! encoded message. The length covers the code and the message.

use crate::error::Error;
use crate::proto::{code, RpbErrorResp};
use bytes::{Buf as _, BufMut as _, Bytes, BytesMut};
use futures::{SinkExt as _, StreamExt as _};
use prost::Message;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// The largest frame accepted from or sent to a node.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// A connection carrying length-prefixed frames.
pub type FramedConnection<S> = Framed<S, LengthDelimitedCodec>;

/// Frame `stream` with four-byte big-endian length prefixes of at most [`MAX_FRAME_LEN`].
pub fn framed<S>(stream: S) -> FramedConnection<S>
where
    S: AsyncRead + AsyncWrite,
{
    LengthDelimitedCodec::builder()
        .length_field_length(4)
        .big_endian()
        .max_frame_length(MAX_FRAME_LEN)
        .new_framed(stream)
}

/// An encoded request, built once per operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMessage {
    code: u8,
    payload: Vec<u8>,
    timeout: Option<Duration>,
}

impl RequestMessage {
    /// Encode `message` as a request identified by `code`.
    #[inline]
    pub fn new<M>(code: u8, message: &M, timeout: Option<Duration>) -> Self
    where
        M: Message,
    {
        Self {
            code,
            payload: message.encode_to_vec(),
            timeout,
        }
    }

    /// The message code.
    #[inline]
    pub const fn code(&self) -> u8 {
        self.code
    }

    /// The encoded message.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// How long the exchange may take, if the operation asked for a limit.
    #[inline]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// A single frame received from a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMessage {
    code: u8,
    payload: Bytes,
}

impl ResponseMessage {
    /// A response frame with the given code and encoded payload.
    #[inline]
    pub fn new(code: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            code,
            payload: payload.into(),
        }
    }

    /// Encode `message` as a response identified by `code`.
    #[inline]
    pub fn encode<M>(code: u8, message: &M) -> Self
    where
        M: Message,
    {
        Self::new(code, message.encode_to_vec())
    }

    /// The message code.
    #[inline]
    pub const fn code(&self) -> u8 {
        self.code
    }

    /// The encoded message.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Decode the payload as the message expected for `expected_code`.
    ///
    /// An error response from the node becomes [`Error::Server`]; any other unexpected code or
    /// an undecodable payload becomes [`Error::Protocol`].
    pub fn parse<M>(&self, expected_code: u8) -> Result<M, Error>
    where
        M: Message + Default,
    {
        if self.code == expected_code {
            return Ok(M::decode(self.payload())?);
        }
        if self.code == code::ERROR_RESP {
            let RpbErrorResp { errmsg, errcode } = RpbErrorResp::decode(self.payload())?;
            return Err(Error::Server {
                code: errcode,
                message: String::from_utf8_lossy(&errmsg).into_owned(),
            });
        }
        Err(Error::protocol(format!(
            "expected message code {expected_code}, received {}",
            self.code
        )))
    }
}

/// Write one frame.
pub async fn write_frame<S>(
    connection: &mut FramedConnection<S>,
    code: u8,
    payload: &[u8],
) -> Result<(), Error>
where
    S: AsyncWrite + Unpin,
{
    if payload.len() >= MAX_FRAME_LEN {
        return Err(Error::invalid_argument("message too large to frame"));
    }
    let mut frame = BytesMut::with_capacity(payload.len() + 1);
    frame.put_u8(code);
    frame.put_slice(payload);
    connection.send(frame.freeze()).await?;
    Ok(())
}

/// Read one frame, returning `None` if the stream ends before a new frame starts.
pub async fn read_frame<S>(
    connection: &mut FramedConnection<S>,
) -> Result<Option<ResponseMessage>, Error>
where
    S: AsyncRead + Unpin,
{
    let mut frame = match connection.next().await {
        None => return Ok(None),
        Some(Ok(frame)) => frame,
        // Oversized frames are rejected by the codec as invalid data.
        Some(Err(err)) if err.kind() == io::ErrorKind::InvalidData => {
            return Err(Error::protocol(err.to_string()));
        }
        Some(Err(err)) => return Err(err.into()),
    };
    if frame.is_empty() {
        return Err(Error::protocol("frame without a message code"));
    }
    let code = frame.get_u8();
    Ok(Some(ResponseMessage::new(code, frame.freeze())))
}
