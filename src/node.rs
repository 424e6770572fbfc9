//! A cluster of one node, reached over a single connection.
//!
//! Operations are queued and exchanged one at a time, in submission order, by a task that owns
//! the connection. The connection may be a TCP stream or anything else that reads and writes
//! bytes, such as one end of [`tokio::io::duplex`].

use crate::cluster::Cluster;
use crate::codec::{framed, read_frame, write_frame, FramedConnection};
use crate::config::NodeOptions;
use crate::error::Error;
use crate::operation::{Progress, WireOperation};
use crate::tracing_shim::{debug, debug_span, error, trace, Instrument as _};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time;

/// A [`Cluster`] sending every operation to the same node.
///
/// Dropping the last handle lets queued operations finish, then closes the connection.
#[derive(Debug, Clone)]
pub struct Node {
    tx: UnboundedSender<Box<dyn WireOperation>>,
    options: NodeOptions,
}

impl Node {
    /// Connect to the node at `addr`.
    ///
    /// Must be called within a tokio runtime, which then drives the connection.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub async fn connect<A>(addr: A, options: NodeOptions) -> Result<Self, Error>
    where
        A: ToSocketAddrs,
    {
        let stream = time::timeout(options.connect_timeout(), TcpStream::connect(addr))
            .await
            .map_err(|_| {
                Error::transport(format!(
                    "no connection within {:?}",
                    options.connect_timeout()
                ))
            })??;
        stream.set_nodelay(true)?;
        debug!(peer = ?stream.peer_addr().ok(), "connected to node");
        Ok(Self::from_stream(stream, options))
    }

    /// Exchange operations over an established connection.
    ///
    /// Must be called within a tokio runtime, which then drives the connection.
    pub fn from_stream<S>(stream: S, options: NodeOptions) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let _handle = tokio::spawn(run(stream, rx, options).instrument(debug_span!("node")));
        Self { tx, options }
    }

    /// The options the node was created with.
    #[inline]
    pub const fn options(&self) -> &NodeOptions {
        &self.options
    }
}

impl Cluster for Node {
    fn submit(&self, operation: Box<dyn WireOperation>) {
        trace!(operation = operation.name(), "operation queued");
        if let Err(mpsc::error::SendError(mut operation)) = self.tx.send(operation) {
            operation.on_failure(Error::transport("connection to node is closed"));
        }
    }
}

/// Exchange queued operations until every handle is gone or the connection fails, then fail
/// whatever is still queued.
async fn run<S>(
    stream: S,
    mut rx: UnboundedReceiver<Box<dyn WireOperation>>,
    options: NodeOptions,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut connection = framed(stream);
    let failure = loop {
        let Some(mut operation) = rx.recv().await else {
            break Error::transport("node handle dropped");
        };
        if operation.is_finished() {
            trace!(operation = operation.name(), "skipping operation cancelled before sending");
            continue;
        }

        let timeout = operation
            .request()
            .timeout()
            .unwrap_or_else(|| options.default_operation_timeout());
        let exchanged = time::timeout(timeout, exchange(&mut connection, operation.as_mut())).await;
        match exchanged {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                error!(operation = operation.name(), %err, "connection failed");
                operation.on_failure(err.clone());
                break err;
            }
            Err(_elapsed) => {
                debug!(operation = operation.name(), ?timeout, "operation timed out");
                operation.on_failure(Error::transport(format!(
                    "operation timed out after {timeout:?}"
                )));
                // The rest of its response may still arrive, so the connection is unusable.
                break Error::transport("connection abandoned after an operation timed out");
            }
        }
    };

    rx.close();
    while let Ok(mut operation) = rx.try_recv() {
        operation.on_failure(failure.clone());
    }
}

/// Send the request of `operation` and deliver response frames to it until it is done.
///
/// Fails if the connection cannot carry another exchange afterwards.
async fn exchange<S>(
    connection: &mut FramedConnection<S>,
    operation: &mut dyn WireOperation,
) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = operation.request();
    debug!(
        operation = operation.name(),
        code = request.code(),
        "sending request"
    );
    write_frame(connection, request.code(), request.payload()).await?;

    loop {
        let Some(frame) = read_frame(connection).await? else {
            return Err(Error::transport("connection closed by node"));
        };
        match operation.on_message(frame) {
            Progress::Continue => {}
            Progress::Done => return Ok(()),
            Progress::Abandon => {
                return Err(Error::transport(
                    "connection abandoned after an unreadable response",
                ));
            }
        }
    }
}
