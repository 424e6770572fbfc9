//! Listing buckets, with names returned as text.

use crate::adapter::CommandFuture;
use crate::cluster::Cluster;
use crate::command::{ChunkedResults, GenericCommand};
use crate::convert::{from_fn, Converter};
use crate::error::{ConversionError, Error};
use crate::future::Outcome;
use crate::operations::list_buckets::{Builder, Response};
use std::sync::Arc;

/// Bucket names of a bucket type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buckets {
    /// The bucket type that was listed.
    pub bucket_type: String,
    /// Bucket names, in the order the node sent them.
    pub buckets: Vec<String>,
}

impl IntoIterator for Buckets {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.buckets.into_iter()
    }
}

fn utf8(bytes: &[u8], what: &str) -> Result<String, ConversionError> {
    String::from_utf8(bytes.to_vec())
        .map_err(|err| ConversionError::new(format!("{what} is not UTF-8: {err}")))
}

fn buckets() -> Arc<dyn Converter<Response, Buckets>> {
    Arc::new(from_fn(|response: &Response| {
        Ok(Buckets {
            bucket_type: utf8(&response.bucket_type, "bucket type")?,
            buckets: response
                .buckets
                .iter()
                .map(|bucket| utf8(bucket, "bucket name"))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }))
}

fn bucket_type() -> Arc<dyn Converter<Vec<u8>, String>> {
    Arc::new(from_fn(|bucket_type: &Vec<u8>| utf8(bucket_type, "bucket type")))
}

/// Lists the buckets of a bucket type.
///
/// The query info of the result is the bucket type. Bucket names that are not valid UTF-8 fail
/// the command with [`Error::Conversion`].
#[derive(Debug)]
pub struct ListBuckets {
    command: GenericCommand<Builder, Buckets, String>,
}

impl Default for ListBuckets {
    #[inline]
    fn default() -> Self {
        Self::new(Builder::new())
    }
}

impl ListBuckets {
    /// A command executing operations configured by `builder`.
    #[inline]
    pub fn new(builder: Builder) -> Self {
        Self {
            command: GenericCommand::with_converters(builder, buckets(), bucket_type()),
        }
    }

    /// Execute the command, returning a future for its result.
    #[inline]
    pub fn execute_async<C>(&self, cluster: &C) -> CommandFuture<Buckets, String>
    where
        C: Cluster,
    {
        self.command.execute_async(cluster)
    }

    /// Execute the command and wait for its result.
    #[inline]
    pub async fn execute<C>(&self, cluster: &C) -> Outcome<Buckets, String>
    where
        C: Cluster,
    {
        self.command.execute(cluster).await
    }

    /// Execute the command, receiving bucket names as the node sends them.
    ///
    /// The builder must have been told to stream results.
    #[inline]
    pub fn execute_streaming<C>(
        &self,
        cluster: &C,
    ) -> Result<(CommandFuture<Buckets, String>, ChunkedResults<Response, Buckets>), Error>
    where
        C: Cluster,
    {
        self.command.execute_streaming(cluster)
    }
}
