//! A network abstraction layer for embedded systems
//!
//! This module defines the two collaborators every protocol client is built
//! on: a byte transport (TCP, TLS, UDP, DTLS, a serial radio...) and a
//! countdown timer. Both are expressed as small traits so that the protocol
//! code stays independent of the platform's socket and clock APIs.
//!
//! Reads and writes take an explicit timeout budget in milliseconds. A read
//! that returns `Ok(0)` means the budget elapsed without data; it is not an
//! error.

#![allow(missing_docs)]
#![deny(unsafe_code)]

/// Common error types for network operations
pub mod error;

/// Protocol-specific client implementations
pub mod application;

#[cfg(feature = "std")]
mod time;

#[cfg(feature = "std")]
pub use time::StdTimer;

/// Re-exports of common traits
pub mod prelude {
    pub use super::{Close, Connect, Connection, Read, Timer, Write};
}

// Core synchronous traits
pub trait Read {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Read data from the connection, waiting at most `timeout_ms`.
    ///
    /// Returns `Ok(0)` when no data arrived within the budget.
    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error>;
}

pub trait Write {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Write data to the connection, waiting at most `timeout_ms`.
    fn write(&mut self, buf: &[u8], timeout_ms: u32) -> Result<usize, Self::Error>;
    /// Flush the write buffer
    fn flush(&mut self) -> Result<(), Self::Error>;
}

pub trait Close {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Close the connection
    fn close(&mut self) -> Result<(), Self::Error>;
}

/// A synchronous connection
pub trait Connection: Read + Write + Close {}

/// A synchronous connector (client)
pub trait Connect {
    /// Associated connection type
    type Connection: Connection;
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Open a connection to `host:port`
    fn connect(&mut self, host: &str, port: u16) -> Result<Self::Connection, Self::Error>;
}

/// A countdown timer.
///
/// Sessions clone the timer they are given once per deadline (keepalive,
/// ping response, command timeout, and one per in-flight exchange), so cloning
/// must produce an independent countdown on the same clock.
pub trait Timer: Clone {
    /// (Re)start the countdown with `duration_ms` milliseconds.
    fn start(&mut self, duration_ms: u32);
    /// Whether the countdown has reached zero.
    fn expired(&self) -> bool;
    /// Milliseconds left before expiry, zero once expired.
    fn remaining(&self) -> u32;
}
