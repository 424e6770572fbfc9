//! Connection options.

use crate::error::Error;
use std::time::Duration;

/// How a [`Node`](crate::node::Node) connects and how long it lets an operation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeOptions {
    connect_timeout: Duration,
    default_operation_timeout: Duration,
}

impl NodeOptions {
    /// The default time allowed to establish a connection.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
    /// The default time allowed for an operation whose request carries no timeout.
    pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(60);

    /// The time allowed to establish a connection. Must be non-zero.
    #[inline]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Result<Self, Error> {
        if timeout.is_zero() {
            return Err(Error::invalid_argument("connect timeout must be non-zero"));
        }
        self.connect_timeout = timeout;
        Ok(self)
    }

    /// The time allowed for an operation whose request carries no timeout of its own. Must be
    /// non-zero.
    #[inline]
    pub fn with_default_operation_timeout(mut self, timeout: Duration) -> Result<Self, Error> {
        if timeout.is_zero() {
            return Err(Error::invalid_argument("operation timeout must be non-zero"));
        }
        self.default_operation_timeout = timeout;
        Ok(self)
    }

    /// The time allowed to establish a connection.
    #[inline]
    pub const fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// The time allowed for an operation whose request carries no timeout of its own.
    #[inline]
    pub const fn default_operation_timeout(&self) -> Duration {
        self.default_operation_timeout
    }
}

impl Default for NodeOptions {
    #[inline]
    fn default() -> Self {
        Self {
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            default_operation_timeout: Self::DEFAULT_OPERATION_TIMEOUT,
        }
    }
}
