//! Command-line interface for the Riak client.

use clap::{Parser, Subcommand};
use riak_async::timeseries::Cell;
use std::convert::Infallible;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(version, propagate_version = true)]
pub(crate) struct Args {
    /// The address of the node to connect to.
    #[arg(short, long, default_value = "127.0.0.1:8087")]
    pub(crate) addr: String,
    /// How long to wait for a connection, in milliseconds.
    #[arg(long, default_value_t = 30_000)]
    pub(crate) connect_timeout: u64,
    /// The operation to perform.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// What operation to perform.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// List the buckets of a bucket type.
    ///
    /// Bucket names are written to stdout, one per line.
    #[clap(alias = "buckets")]
    ListBuckets {
        /// The bucket type to list. The node lists its default type if none is given.
        #[arg(short = 't', long = "type")]
        bucket_type: Option<String>,
        /// Print bucket names as the node sends them rather than once all have arrived.
        #[arg(long)]
        stream: bool,
        /// How long the node may take, in milliseconds.
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Fetch a row of a time-series table by its primary key.
    ///
    /// The cells of the row are written to stdout, separated by tabs. Nothing is written if there
    /// is no such row.
    #[clap(alias = "fetch")]
    TsFetch {
        /// The table to fetch from.
        table: String,
        /// The values of the primary key, in key column order. Values that parse as integers are
        /// sent as integers, all others as text.
        #[clap(required = true, value_parser = parse_cell)]
        key: Vec<Cell>,
        /// How long the node may take, in milliseconds.
        #[arg(long)]
        timeout: Option<u64>,
    },
}

/// Parse a key value as an integer if possible, otherwise as text.
fn parse_cell(value: &str) -> Result<Cell, Infallible> {
    Ok(value
        .parse::<i64>()
        .map_or_else(|_| Cell::from(value), Cell::from))
}
