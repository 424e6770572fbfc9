//! Commands returning client types, built on [`GenericCommand`](crate::command::GenericCommand).

pub mod list_buckets;
pub mod ts;

pub use self::list_buckets::{Buckets, ListBuckets};
pub use self::ts::fetch::{FetchRow, FetchedRow};
