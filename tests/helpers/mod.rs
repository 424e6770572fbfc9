use anyhow::{bail, Context as _, Result};
use prost::Message;
use riak_async::codec::{framed, read_frame, write_frame, FramedConnection};
use riak_async::{Node, NodeOptions};
use tokio::io::DuplexStream;

const DUPLEX_SIZE: usize = 1024;

/// The node end of a connection, answering requests as each test scripts it.
pub(crate) struct FakeNode {
    connection: FramedConnection<DuplexStream>,
}

/// A client connected to a fresh [`FakeNode`].
pub(crate) fn connect() -> (Node, FakeNode) {
    let (client, server) = tokio::io::duplex(DUPLEX_SIZE);
    (
        Node::from_stream(client, NodeOptions::default()),
        FakeNode {
            connection: framed(server),
        },
    )
}

impl FakeNode {
    /// Wait for the next request and decode it, checking its code.
    pub(crate) async fn request<M>(&mut self, code: u8) -> Result<M>
    where
        M: Message + Default,
    {
        let frame = read_frame(&mut self.connection)
            .await?
            .context("client closed the connection")?;
        if frame.code() != code {
            bail!("expected request code {code}, received {}", frame.code());
        }
        Ok(M::decode(frame.payload())?)
    }

    /// Send a response message.
    pub(crate) async fn respond<M>(&mut self, code: u8, message: &M) -> Result<()>
    where
        M: Message,
    {
        self.respond_raw(code, &message.encode_to_vec()).await
    }

    /// Send a response frame with an arbitrary payload.
    pub(crate) async fn respond_raw(&mut self, code: u8, payload: &[u8]) -> Result<()> {
        write_frame(&mut self.connection, code, payload).await?;
        Ok(())
    }
}
