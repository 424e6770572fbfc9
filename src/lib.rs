//! Asynchronous command execution for a Riak client.
//!
//! A [`GenericCommand`] builds a core [`Operation`], submits it to a [`Cluster`], and returns a
//! [`CommandFuture`] that completes once the operation does, with the core result mapped onto
//! client types by the command's converters. Operations answered by several messages can buffer
//! them into one result or stream them through a [`ResultQueue`] as they arrive.
//!
//! [`Node`] is a cluster of one node over a single connection. The concrete operations in
//! [`operations`] and commands in [`commands`] show how new ones are built.

pub mod adapter;
pub mod cluster;
pub mod codec;
pub mod command;
pub mod commands;
pub mod config;
pub mod convert;
pub mod error;
pub mod future;
pub mod node;
pub mod operation;
pub mod operations;
pub mod proto;
pub mod queue;
pub mod timeseries;
mod tracing_shim;

pub use self::adapter::{adapt, CommandFuture, FutureAdapter};
pub use self::cluster::Cluster;
pub use self::command::{BuildOperation, ChunkedResults, GenericCommand};
pub use self::config::NodeOptions;
pub use self::convert::{Converter, Identity};
pub use self::error::{ConversionError, Error, Result};
pub use self::future::{Completed, OperationFuture, Outcome};
pub use self::node::Node;
pub use self::operation::{EmptyChunks, Operation, StreamMode};
pub use self::queue::{Delivery, ResultQueue};
