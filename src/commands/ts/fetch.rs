//! Fetching a single time-series row as a mapping from column names to cells.

use crate::adapter::CommandFuture;
use crate::cluster::Cluster;
use crate::command::GenericCommand;
use crate::convert::{from_fn, Converter, Identity};
use crate::error::ConversionError;
use crate::future::Outcome;
use crate::operations::ts::fetch::Builder;
use crate::timeseries::{Cell, ColumnDescription, QueryResult};
use std::sync::Arc;

/// A fetched row, with each cell paired with the column it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedRow {
    columns: Vec<ColumnDescription>,
    cells: Vec<Cell>,
}

impl FetchedRow {
    /// The cell of the column named `column`, if there is such a column.
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.columns
            .iter()
            .position(|description| description.name == column)
            .and_then(|index| self.cells.get(index))
    }

    /// Each column with its cell, in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&ColumnDescription, &Cell)> + '_ {
        self.columns.iter().zip(&self.cells)
    }

    /// The columns, in order.
    #[inline]
    pub fn columns(&self) -> &[ColumnDescription] {
        &self.columns
    }

    /// The cells, in column order.
    #[inline]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }
}

/// The row of a result expected to hold at most one.
fn single_row() -> Arc<dyn Converter<QueryResult, Option<FetchedRow>>> {
    Arc::new(from_fn(|result: &QueryResult| match result.rows() {
        [] => Ok(None),
        [row] if row.len() == result.columns().len() => Ok(Some(FetchedRow {
            columns: result.columns().to_vec(),
            cells: row.cells().to_vec(),
        })),
        [row] => Err(ConversionError::new(format!(
            "row has {} cells for {} columns",
            row.len(),
            result.columns().len()
        ))),
        rows => Err(ConversionError::new(format!(
            "expected at most one row, received {}",
            rows.len()
        ))),
    }))
}

/// Fetches a single row of a time-series table by its primary key.
///
/// Resolves to `None` when no row has the key. The query info of the result describes the
/// request, such as `SELECT * FROM weather WHERE PRIMARY KEY = { hash1, 1443806600000 }`.
#[derive(Debug)]
pub struct FetchRow {
    command: GenericCommand<Builder, Option<FetchedRow>, String>,
}

impl FetchRow {
    /// A command executing operations configured by `builder`.
    #[inline]
    pub fn new(builder: Builder) -> Self {
        Self {
            command: GenericCommand::with_converters(builder, single_row(), Arc::new(Identity)),
        }
    }

    /// Execute the command, returning a future for its result.
    #[inline]
    pub fn execute_async<C>(&self, cluster: &C) -> CommandFuture<Option<FetchedRow>, String>
    where
        C: Cluster,
    {
        self.command.execute_async(cluster)
    }

    /// Execute the command and wait for its result.
    #[inline]
    pub async fn execute<C>(&self, cluster: &C) -> Outcome<Option<FetchedRow>, String>
    where
        C: Cluster,
    {
        self.command.execute(cluster).await
    }
}
