//! Common error types for network operations

/// A common error type for network operations.
///
/// Transport adapters can use this as their `Read`/`Write`/`Close` error. The
/// protocol clients only care that an operation failed and report it as
/// [`TransportError`](crate::network::application::pubsub::Error::TransportError).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// An operation was attempted on a connection that is not open.
    NotOpen,
    /// An error occurred during a write operation.
    WriteError,
    /// An error occurred during a read operation.
    ReadError,
    /// A connection attempt was refused.
    ConnectionRefused,
    /// A timeout occurred.
    Timeout,
    /// The connection was closed.
    ConnectionClosed,
    /// An invalid address was provided.
    InvalidAddress,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::NotOpen => write!(f, "connection is not open"),
            Error::WriteError => write!(f, "write failed"),
            Error::ReadError => write!(f, "read failed"),
            Error::ConnectionRefused => write!(f, "connection refused"),
            Error::Timeout => write!(f, "operation timed out"),
            Error::ConnectionClosed => write!(f, "connection closed"),
            Error::InvalidAddress => write!(f, "invalid address"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotOpen => defmt::write!(f, "NotOpen"),
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::ReadError => defmt::write!(f, "ReadError"),
            Error::ConnectionRefused => defmt::write!(f, "ConnectionRefused"),
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::ConnectionClosed => defmt::write!(f, "ConnectionClosed"),
            Error::InvalidAddress => defmt::write!(f, "InvalidAddress"),
        }
    }
}
