mod macros;

pub mod client;
pub mod codec;
pub mod connection;
pub mod datatypes;

#[cfg(test)]
mod tests;

// Re-export codec types for direct access
pub use codec::{CodecError, Decodable, Encodable, Frame, PduHeader};
pub use connection::{Connection, ConnectionError};

// Re-export the main client API for easy access
pub use client::{
    BindCredentials, EsmeClient, EsmeConfig, SessionState, SmppError, SmppResult, SmsMessage,
};

/// Error returned by application collaborators (processors and stores).
///
/// Their failures are logged by the session and never surface to the SMSC,
/// so a boxed `std::error::Error` is all the session needs. Errors the
/// crate itself produces are typed: see `SmppError`, `CodecError` and
/// `ConnectionError`.
pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// A specialized `Result` type for collaborator operations.
///
/// # Examples
///
/// ```rust
/// use smpp_esme::datatypes::{CommandStatus, DeliverSm};
///
/// async fn handle(pdu: DeliverSm) -> smpp_esme::Result<CommandStatus> {
///     if pdu.short_message.is_empty() {
///         return Err("empty message".into());
///     }
///     Ok(CommandStatus::Ok)
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;
