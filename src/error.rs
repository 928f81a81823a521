//! Error types for the WebSocket server.
//!
//! This module defines all error conditions that can occur while accepting,
//! handshaking and framing WebSocket connections.

use thiserror::Error;

use crate::connection::ConnectionState;

/// Result type alias for WebSocket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during WebSocket operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Incomplete frame data.
    #[error("Incomplete frame: need {needed} more bytes")]
    IncompleteFrame {
        /// Number of additional bytes needed.
        needed: usize,
    },

    /// Invalid opcode value (does not fit in 4 bits).
    #[error("Invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// Declared 64-bit payload length does not fit in `usize`.
    #[error("Payload too large for platform: {size} bytes (max: {max})")]
    PayloadTooLargeForPlatform {
        /// Declared payload size.
        size: u64,
        /// Maximum addressable size.
        max: u64,
    },

    /// Frame size exceeds configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Actual frame size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Invalid frame structure.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Invalid WebSocket handshake.
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    /// Handshake request exceeds configured maximum.
    #[error("Handshake too large: {size} bytes (max: {max})")]
    HandshakeTooLarge {
        /// Accumulated request size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Invalid UTF-8 in text frame.
    #[error("Invalid UTF-8 in text frame")]
    InvalidUtf8,

    /// Operation requires an open connection.
    #[error("Connection is not open ({0}), cannot send data")]
    NotConnected(ConnectionState),

    /// Port is not a number in `0..=65535`.
    #[error("Port number must be numeric: {0:?}")]
    InvalidPort(String),

    /// Bind address could not be resolved.
    #[error("Invalid bind address: {0}")]
    InvalidAddress(String),

    /// Binding the listening socket failed.
    #[error("Bind to {addr} failed: {reason}")]
    Bind {
        /// Address the server tried to bind.
        addr: String,
        /// Underlying OS error.
        reason: String,
    },

    /// Listening on the bound socket failed.
    #[error("Listen on {addr} failed: {reason}")]
    Listen {
        /// Address the server tried to listen on.
        addr: String,
        /// Underlying OS error.
        reason: String,
    },

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Returns `true` for errors raised by malformed peer input.
    #[must_use]
    pub const fn is_protocol(&self) -> bool {
        matches!(
            self,
            Error::IncompleteFrame { .. }
                | Error::InvalidOpcode(_)
                | Error::PayloadTooLargeForPlatform { .. }
                | Error::FrameTooLarge { .. }
                | Error::InvalidFrame(_)
                | Error::InvalidHandshake(_)
                | Error::HandshakeTooLarge { .. }
                | Error::InvalidUtf8
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}
