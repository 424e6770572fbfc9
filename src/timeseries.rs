//! Time-series values as seen by applications, and their protocol representations.

use crate::convert::{convert_each, from_fn};
use crate::error::{ConversionError, Error};
use crate::proto::ts::{TsCell, TsColumnDescription, TsColumnType, TsGetResp, TsRow};
use std::fmt;

/// A single value in a time-series row.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Text or binary data.
    Varchar(Vec<u8>),
    /// A signed integer.
    Sint64(i64),
    /// Milliseconds since the Unix epoch.
    Timestamp(i64),
    /// A boolean.
    Boolean(bool),
    /// A double-precision float.
    Double(f64),
    /// No value.
    Null,
}

impl Cell {
    /// A timestamp cell holding `millis` since the Unix epoch.
    #[inline]
    pub const fn timestamp(millis: i64) -> Self {
        Self::Timestamp(millis)
    }

    /// Whether the cell holds no value.
    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&str> for Cell {
    #[inline]
    fn from(value: &str) -> Self {
        Self::Varchar(value.as_bytes().to_vec())
    }
}

impl From<String> for Cell {
    #[inline]
    fn from(value: String) -> Self {
        Self::Varchar(value.into_bytes())
    }
}

impl From<i64> for Cell {
    #[inline]
    fn from(value: i64) -> Self {
        Self::Sint64(value)
    }
}

impl From<bool> for Cell {
    #[inline]
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<f64> for Cell {
    #[inline]
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Varchar(bytes) => f.write_str(&String::from_utf8_lossy(bytes)),
            Self::Sint64(value) | Self::Timestamp(value) => fmt::Display::fmt(value, f),
            Self::Boolean(value) => fmt::Display::fmt(value, f),
            Self::Double(value) => fmt::Display::fmt(value, f),
            Self::Null => f.write_str("NULL"),
        }
    }
}

impl TryFrom<&TsCell> for Cell {
    type Error = ConversionError;

    /// A protocol cell with no value set is null. One with several values set is rejected.
    fn try_from(cell: &TsCell) -> Result<Self, Self::Error> {
        let TsCell {
            varchar_value,
            sint64_value,
            timestamp_value,
            boolean_value,
            double_value,
        } = cell;
        let mut values = [
            varchar_value.clone().map(Self::Varchar),
            sint64_value.map(Self::Sint64),
            timestamp_value.map(Self::Timestamp),
            boolean_value.map(Self::Boolean),
            double_value.map(Self::Double),
        ]
        .into_iter()
        .flatten();

        match (values.next(), values.next()) {
            (None, _) => Ok(Self::Null),
            (Some(value), None) => Ok(value),
            (Some(_), Some(_)) => Err(ConversionError::new("cell carries more than one value")),
        }
    }
}

impl From<&Cell> for TsCell {
    fn from(cell: &Cell) -> Self {
        let mut pb = Self::default();
        match cell {
            Cell::Varchar(bytes) => pb.varchar_value = Some(bytes.clone()),
            Cell::Sint64(value) => pb.sint64_value = Some(*value),
            Cell::Timestamp(value) => pb.timestamp_value = Some(*value),
            Cell::Boolean(value) => pb.boolean_value = Some(*value),
            Cell::Double(value) => pb.double_value = Some(*value),
            Cell::Null => {}
        }
        pb
    }
}

/// An ordered sequence of cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<Cell>,
}

impl Row {
    /// A row holding `cells` in order.
    #[inline]
    pub fn new<C>(cells: C) -> Self
    where
        C: IntoIterator<Item = Cell>,
    {
        Self {
            cells: cells.into_iter().collect(),
        }
    }

    /// The cells, in column order.
    #[inline]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// The number of cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the row has no cells.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Take ownership of the cells.
    #[inline]
    pub fn into_cells(self) -> Vec<Cell> {
        self.cells
    }

    /// Convert a protocol row, cell by cell.
    fn from_proto(row: TsRow) -> Result<Self, ConversionError> {
        let cells = convert_each(row.cells, from_fn(|cell: &TsCell| Cell::try_from(cell)));
        Ok(Self {
            cells: cells.collect::<Result<Vec<_>, _>>()?,
        })
    }
}

/// The declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// Text or binary data.
    Varchar,
    /// A signed integer.
    Sint64,
    /// A double-precision float.
    Double,
    /// Milliseconds since the Unix epoch.
    Timestamp,
    /// A boolean.
    Boolean,
    /// Binary data.
    Blob,
}

impl From<TsColumnType> for ColumnType {
    fn from(column_type: TsColumnType) -> Self {
        match column_type {
            TsColumnType::Varchar => Self::Varchar,
            TsColumnType::Sint64 => Self::Sint64,
            TsColumnType::Double => Self::Double,
            TsColumnType::Timestamp => Self::Timestamp,
            TsColumnType::Boolean => Self::Boolean,
            TsColumnType::Blob => Self::Blob,
        }
    }
}

/// The name and type of a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnDescription {
    /// The column name.
    pub name: String,
    /// The declared type of the column.
    pub column_type: ColumnType,
}

impl TryFrom<&TsColumnDescription> for ColumnDescription {
    type Error = ConversionError;

    fn try_from(column: &TsColumnDescription) -> Result<Self, Self::Error> {
        let name = String::from_utf8(column.name.clone())
            .map_err(|err| ConversionError::new(format!("column name is not UTF-8: {err}")))?;
        let column_type = TsColumnType::try_from(column.r#type).map_err(|_| {
            ConversionError::new(format!(
                "column {name} has unknown type {}",
                column.r#type
            ))
        })?;
        Ok(Self {
            name,
            column_type: column_type.into(),
        })
    }
}

/// Rows returned by a time-series request, with the columns describing them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    columns: Vec<ColumnDescription>,
    rows: Vec<Row>,
}

impl QueryResult {
    /// A result with the given columns and rows.
    #[inline]
    pub const fn new(columns: Vec<ColumnDescription>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// The columns, in order.
    #[inline]
    pub fn columns(&self) -> &[ColumnDescription] {
        &self.columns
    }

    /// The rows, in the order the node returned them.
    #[inline]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// The number of rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no rows were returned.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Take ownership of the columns and rows.
    #[inline]
    pub fn into_parts(self) -> (Vec<ColumnDescription>, Vec<Row>) {
        (self.columns, self.rows)
    }

    /// Convert a fetch response. Malformed values are a protocol failure.
    pub(crate) fn from_proto(response: TsGetResp) -> Result<Self, Error> {
        let TsGetResp { columns, rows } = response;
        let columns = convert_each(
            columns,
            from_fn(|column: &TsColumnDescription| ColumnDescription::try_from(column)),
        )
        .collect::<Result<Vec<_>, _>>();
        let rows = rows
            .into_iter()
            .map(Row::from_proto)
            .collect::<Result<Vec<_>, _>>();

        match (columns, rows) {
            (Ok(columns), Ok(rows)) => Ok(Self { columns, rows }),
            (Err(err), _) | (_, Err(err)) => Err(Error::protocol(err.message())),
        }
    }
}

/// Protocol cells for `cells`, in order.
pub(crate) fn to_proto_cells(cells: &[Cell]) -> Vec<TsCell> {
    cells.iter().map(TsCell::from).collect()
}
