//! Time-series commands.

pub mod fetch;
