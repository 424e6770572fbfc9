//! Fetching a single row of a time-series table by its primary key.

use crate::codec::RequestMessage;
use crate::command::BuildOperation;
use crate::error::Error;
use crate::operation::{CoreOperation, Operation};
use crate::operations::timeout_millis;
use crate::proto::code;
use crate::proto::ts::{TsGetReq, TsGetResp};
use crate::timeseries::{to_proto_cells, Cell, QueryResult};
use std::sync::OnceLock;
use std::time::Duration;

/// Configures a fetch operation.
#[derive(Debug, Clone)]
pub struct Builder {
    table: String,
    key: Vec<Cell>,
    timeout: Option<u32>,
}

impl Builder {
    /// Fetch the row of `table` whose primary key consists of `key`, in key column order.
    ///
    /// Neither the table name nor the key may be empty.
    pub fn new<K>(table: impl Into<String>, key: K) -> Result<Self, Error>
    where
        K: IntoIterator<Item = Cell>,
    {
        let table = table.into();
        if table.is_empty() {
            return Err(Error::invalid_argument("table name cannot be empty"));
        }
        let key: Vec<_> = key.into_iter().collect();
        if key.is_empty() {
            return Err(Error::invalid_argument("key values cannot be empty"));
        }
        Ok(Self {
            table,
            key,
            timeout: None,
        })
    }

    /// How long the node may take to answer. Must be at least one millisecond.
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, Error> {
        self.timeout = Some(timeout_millis(timeout)?);
        Ok(self)
    }

    /// The table to fetch from.
    #[inline]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Build the operation. Its query info is a textual rendering of the request.
    pub fn build(&self) -> Operation<QueryResult, String> {
        Operation::unary(Fetch {
            table: self.table.clone(),
            key: self.key.clone(),
            timeout: self.timeout,
            query_info: OnceLock::new(),
        })
    }
}

impl BuildOperation for Builder {
    type Response = QueryResult;
    type Info = String;

    #[inline]
    fn build_operation(&self) -> Operation<Self::Response, Self::Info> {
        self.build()
    }
}

#[derive(Debug)]
struct Fetch {
    table: String,
    key: Vec<Cell>,
    timeout: Option<u32>,
    query_info: OnceLock<String>,
}

impl CoreOperation for Fetch {
    type Message = TsGetResp;
    type Response = QueryResult;
    type Info = String;

    const NAME: &'static str = "ts_fetch";
    const RESPONSE_CODE: u8 = code::TS_GET_RESP;

    fn request(&self) -> RequestMessage {
        let request = TsGetReq {
            table: self.table.as_bytes().to_vec(),
            key: to_proto_cells(&self.key),
            timeout: self.timeout,
        };
        RequestMessage::new(
            code::TS_GET_REQ,
            &request,
            self.timeout.map(|millis| Duration::from_millis(millis.into())),
        )
    }

    fn convert(&self, messages: Vec<Self::Message>) -> Result<Self::Response, Error> {
        let count = messages.len();
        let mut messages = messages.into_iter();
        match (messages.next(), messages.next()) {
            (Some(response), None) => QueryResult::from_proto(response),
            _ => Err(Error::protocol(format!(
                "expected a single fetch response, received {count}"
            ))),
        }
    }

    fn query_info(&self) -> Self::Info {
        self.query_info
            .get_or_init(|| {
                let key = self
                    .key
                    .iter()
                    .map(Cell::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "SELECT * FROM {} WHERE PRIMARY KEY = {{ {key} }}",
                    self.table
                )
            })
            .clone()
    }
}
