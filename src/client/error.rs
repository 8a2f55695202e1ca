// ABOUTME: SMPP client error types for error handling across all client operations
// ABOUTME: Provides structured error reporting with automatic conversion from underlying I/O and codec errors

use crate::client::state::SessionState;
use crate::codec::CodecError;
use crate::datatypes::CommandStatus;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Error type for SMPP client operations
///
/// Provides structured error handling for all client operations including
/// connection management, protocol operations, and data validation.
#[derive(Debug, Error)]
pub enum SmppError {
    /// I/O error during network operations (connection, read, write)
    #[error("Connection error: {0}")]
    Connection(#[from] io::Error),

    /// A PDU could not be encoded or decoded
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// The SMSC answered the bind with a non-zero command_status
    #[error("Bind rejected: {0:?}")]
    BindFailure(CommandStatus),

    /// No bind_transceiver_resp arrived in time
    #[error("No bind response within {0:?}")]
    BindTimeout(Duration),

    /// SMPP protocol error indicated by command_status field
    #[error("Protocol error: {0:?}")]
    Protocol(CommandStatus),

    /// The SMSC answered a request with generic_nack
    #[error("Request rejected with generic_nack: {0:?}")]
    GenericNack(CommandStatus),

    /// No response within the request timeout
    #[error("Operation timeout")]
    Timeout,

    /// The connection went away while the request was outstanding
    #[error("Connection lost")]
    ConnectionLost,

    /// Client not in correct state for operation
    #[error("Invalid session state: {0:?}")]
    InvalidState(SessionState),

    /// A request with this sequence number is already outstanding
    #[error("Sequence number {0} is already in flight")]
    SequenceCollision(u32),

    /// Unexpected PDU received (wrong response type for request)
    #[error("Unexpected PDU: expected {expected}, got {actual}")]
    UnexpectedPdu { expected: String, actual: String },

    /// Data validation error (invalid configuration, malformed addresses, etc.)
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The correlation store failed
    #[error("Store error: {0}")]
    Store(#[source] crate::Error),
}

/// Result type alias for SMPP operations
pub type SmppResult<T> = Result<T, SmppError>;
