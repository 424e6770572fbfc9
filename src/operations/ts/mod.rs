//! Time-series operations.

pub mod fetch;
