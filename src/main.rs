//! A command-line client for listing buckets and fetching time-series rows from a Riak node.
//!
//! For usage, run `cargo run --features binary -- --help`. Set `RUST_LOG` to see what the client
//! does.

mod cli;

use crate::cli::{Args, Command};
use clap::Parser as _;
use riak_async::commands::{FetchRow, ListBuckets};
use riak_async::operations::{list_buckets, ts};
use riak_async::{Delivery, Node, NodeOptions};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::Layer;
use tracing_subscriber::prelude::*;

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            Layer::new()
                .with_writer(std::io::stderr)
                .with_filter(EnvFilter::from_default_env()),
        )
        .init();

    let Args {
        addr,
        connect_timeout,
        command,
    } = Args::parse();

    let future = async {
        let options =
            NodeOptions::default().with_connect_timeout(Duration::from_millis(connect_timeout))?;
        let node = Node::connect(addr, options).await?;
        match command {
            Command::ListBuckets {
                bucket_type,
                stream,
                timeout,
            } => list(&node, bucket_type, stream, timeout).await,
            Command::TsFetch {
                table,
                key,
                timeout,
            } => fetch(&node, table, key, timeout).await,
        }
    };

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(future)
}

/// List buckets, writing one name per line to stdout.
#[allow(clippy::print_stdout)]
async fn list(
    node: &Node,
    bucket_type: Option<String>,
    stream: bool,
    timeout: Option<u64>,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut builder = list_buckets::Builder::new().stream_results(stream);
    if let Some(bucket_type) = bucket_type {
        builder = builder.with_bucket_type(bucket_type)?;
    }
    if let Some(timeout) = timeout {
        builder = builder.with_timeout(Duration::from_millis(timeout))?;
    }
    let command = ListBuckets::new(builder);

    if !stream {
        for bucket in command.execute(node).await?.response {
            println!("{bucket}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let (future, mut results) = command.execute_streaming(node)?;
    loop {
        // Waiting on the queue blocks, so it happens off the async workers.
        let (returned, delivery) = tokio::task::spawn_blocking(move || {
            let delivery = results.recv();
            (results, delivery)
        })
        .await?;
        results = returned;

        match delivery {
            Delivery::Chunk(buckets) => {
                for bucket in buckets? {
                    println!("{bucket}");
                }
            }
            Delivery::Finished => break,
            Delivery::Failed(err) => return Err(err.into()),
        }
    }
    let _completed = future.await?;
    Ok(ExitCode::SUCCESS)
}

/// Fetch a row, writing its cells to stdout separated by tabs.
#[allow(clippy::print_stdout)]
async fn fetch(
    node: &Node,
    table: String,
    key: Vec<riak_async::timeseries::Cell>,
    timeout: Option<u64>,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut builder = ts::fetch::Builder::new(table, key)?;
    if let Some(timeout) = timeout {
        builder = builder.with_timeout(Duration::from_millis(timeout))?;
    }

    let Some(row) = FetchRow::new(builder).execute(node).await?.response else {
        return Ok(ExitCode::FAILURE);
    };
    let line = row
        .cells()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\t");

    println!("{line}");
    Ok(ExitCode::SUCCESS)
}
