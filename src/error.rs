//! Error types for the IRC client library.
//!
//! This module defines error types for message parsing failures,
//! transport-level connection problems, and client operations.

use std::time::Duration;

use thiserror::Error;

/// Convenience type alias for Results using [`ClientError`].
pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// Errors encountered when parsing IRC messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MessageParseError {
    /// Message was empty (or only a line terminator).
    #[error("empty message")]
    EmptyMessage,

    /// Command was invalid or missing.
    #[error("invalid command")]
    InvalidCommand,

    /// The line could not be tokenized at all.
    #[error("parsing failed at position {position}: {context}")]
    ParseContext {
        /// Byte position where parsing failed.
        position: usize,
        /// Description of what was being parsed.
        context: String,
    },
}

/// Errors produced by a [`Transport`](crate::transport::Transport).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The host name could not be resolved to any address.
    #[error("could not resolve {host}: {reason}")]
    Resolve {
        /// Host that failed to resolve.
        host: String,
        /// Resolver failure description.
        reason: String,
    },

    /// The connection attempt did not finish within the timeout.
    #[error("connection to {addr} timed out after {after:?}")]
    Timeout {
        /// Address being connected to.
        addr: String,
        /// Configured timeout.
        after: Duration,
    },

    /// The peer actively refused the connection.
    #[error("connection to {0} refused")]
    Refused(String),

    /// No route to the peer.
    #[error("{0} is unreachable")]
    Unreachable(String),

    /// TLS setup or handshake failed.
    #[error("tls error: {0}")]
    Tls(String),

    /// The transport is not open.
    #[error("transport is not connected")]
    NotConnected,

    /// The peer closed the stream or it was reset.
    #[error("connection closed by peer")]
    Closed,

    /// A line grew past the maximum length without a terminator.
    #[error("line too long: {0} bytes without terminator")]
    LineTooLong(usize),

    /// Any other I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Whether this error means the connection is gone for good.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Closed | Self::NotConnected)
    }
}

/// Errors returned by [`Client`](crate::Client) operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// Establishing or using the transport failed.
    #[error("connection error: {0}")]
    Connection(#[from] TransportError),

    /// The server did not confirm the operation before the deadline.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// Name of the operation that timed out.
        operation: &'static str,
        /// The timeout that elapsed.
        after: Duration,
    },

    /// The server rejected the operation with an error numeric.
    #[error("{operation} rejected by server ({numeric}): {message}")]
    Rejected {
        /// Name of the rejected operation.
        operation: &'static str,
        /// Numeric reply code.
        numeric: u16,
        /// Trailing text of the numeric reply.
        message: String,
    },

    /// The operation is not valid in the current connection state.
    #[error("invalid state for {operation}: {state}")]
    InvalidState {
        /// Name of the attempted operation.
        operation: &'static str,
        /// Connection state at the time of the call.
        state: crate::state::ConnectionState,
    },

    /// A parameter held a CR, LF or NUL and would have split the line.
    #[error("refusing to send {command}: parameter contains a line break or NUL")]
    InvalidInput {
        /// Command that was refused.
        command: String,
    },
}

impl ClientError {
    /// Whether this is a [`ClientError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
