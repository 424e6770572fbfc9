//! Protocol buffers messages exchanged with a node, and the codes identifying them on the wire.
//!
//! Only the messages used by the operations in this crate are defined. Field numbers follow the
//! node's published `.proto` definitions.

#![allow(missing_docs, clippy::missing_docs_in_private_items)]

/// One-byte codes preceding every message payload in a frame.
pub mod code {
    pub const ERROR_RESP: u8 = 0;
    pub const LIST_BUCKETS_REQ: u8 = 15;
    pub const LIST_BUCKETS_RESP: u8 = 16;
    pub const TS_GET_REQ: u8 = 92;
    pub const TS_GET_RESP: u8 = 93;
}

/// The response a node sends in place of the expected one when a request fails.
#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbErrorResp {
    #[prost(bytes = "vec", required, tag = "1")]
    pub errmsg: Vec<u8>,
    #[prost(uint32, required, tag = "2")]
    pub errcode: u32,
}

pub mod kv {
    #[derive(Clone, PartialEq, prost::Message)]
    pub struct RpbListBucketsReq {
        #[prost(uint32, optional, tag = "1")]
        pub timeout: Option<u32>,
        #[prost(bool, optional, tag = "2")]
        pub stream: Option<bool>,
        #[prost(bytes = "vec", optional, tag = "3")]
        pub r#type: Option<Vec<u8>>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct RpbListBucketsResp {
        #[prost(bytes = "vec", repeated, tag = "1")]
        pub buckets: Vec<Vec<u8>>,
        #[prost(bool, optional, tag = "2")]
        pub done: Option<bool>,
    }
}

pub mod ts {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum TsColumnType {
        Varchar = 0,
        Sint64 = 1,
        Double = 2,
        Timestamp = 3,
        Boolean = 4,
        Blob = 5,
    }

    /// A single value. At most one field is set; none set means null.
    #[derive(Clone, PartialEq, prost::Message)]
    pub struct TsCell {
        #[prost(bytes = "vec", optional, tag = "1")]
        pub varchar_value: Option<Vec<u8>>,
        #[prost(sint64, optional, tag = "2")]
        pub sint64_value: Option<i64>,
        #[prost(sint64, optional, tag = "3")]
        pub timestamp_value: Option<i64>,
        #[prost(bool, optional, tag = "4")]
        pub boolean_value: Option<bool>,
        #[prost(double, optional, tag = "5")]
        pub double_value: Option<f64>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct TsRow {
        #[prost(message, repeated, tag = "1")]
        pub cells: Vec<TsCell>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct TsColumnDescription {
        #[prost(bytes = "vec", required, tag = "1")]
        pub name: Vec<u8>,
        #[prost(enumeration = "TsColumnType", required, tag = "2")]
        pub r#type: i32,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct TsGetReq {
        #[prost(bytes = "vec", required, tag = "1")]
        pub table: Vec<u8>,
        #[prost(message, repeated, tag = "2")]
        pub key: Vec<TsCell>,
        #[prost(uint32, optional, tag = "3")]
        pub timeout: Option<u32>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct TsGetResp {
        #[prost(message, repeated, tag = "1")]
        pub columns: Vec<TsColumnDescription>,
        #[prost(message, repeated, tag = "2")]
        pub rows: Vec<TsRow>,
    }
}
