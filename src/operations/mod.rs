//! Core operations, speaking the node's protocol types.

pub mod list_buckets;
pub mod ts;

use crate::error::Error;
use std::time::Duration;

/// The timeout carried in a request, in whole milliseconds.
fn timeout_millis(timeout: Duration) -> Result<u32, Error> {
    match u32::try_from(timeout.as_millis()) {
        Ok(0) => Err(Error::invalid_argument(
            "timeout must be at least one millisecond",
        )),
        Ok(millis) => Ok(millis),
        Err(_) => Err(Error::invalid_argument(format!(
            "timeout of {timeout:?} does not fit in a request"
        ))),
    }
}
