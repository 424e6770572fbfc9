//! Errors produced while building, executing, or converting an operation.

/// The failure of a command or one of its operations.
///
/// Every variant except [`Error::InvalidArgument`] is delivered through a future or a result
/// queue. Invalid arguments are reported synchronously by builders, before anything is sent.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A builder was given a value it cannot send.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The connection to the node failed or was closed mid-exchange.
    #[error("transport failure: {0}")]
    Transport(String),
    /// A response message could not be parsed or was not expected.
    #[error("protocol failure: {0}")]
    Protocol(String),
    /// The node answered with an error response.
    #[error("node returned error {code}: {message}")]
    Server {
        /// The error code reported by the node.
        code: u32,
        /// The error message reported by the node.
        message: String,
    },
    /// A converter rejected a value after the exchange itself succeeded.
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    /// The operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub(crate) fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Whether the error came from cancelling the operation.
    #[inline]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<prost::DecodeError> for Error {
    fn from(err: prost::DecodeError) -> Self {
        Self::Protocol(err.to_string())
    }
}

/// A converter could not map a core value onto its client representation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("conversion failure: {message}")]
pub struct ConversionError {
    message: String,
}

impl ConversionError {
    /// Create a conversion error with the given description.
    #[inline]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The description of what could not be converted.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Shorthand for results carrying this crate's [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;
