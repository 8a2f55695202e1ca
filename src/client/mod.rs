// ABOUTME: SMPP ESME client module: session engine, supervisor and collaborator traits
// ABOUTME: Exports the client handle, configuration, error types and the building blocks of a session

//! SMPP ESME Client Module
//!
//! This module implements a long-running SMPP v3.4 transceiver ESME:
//!
//! * **Single-task sessions** - one tokio task per connection owns the state
//!   machine, the pending-request tracker and the keep-alive timer
//! * **Explicit state machine** - `SessionState::on_event` is a pure
//!   transition table; the session performs the resulting effects
//! * **Request correlation** - responses complete oneshot channels keyed by
//!   sequence number, with per-request deadlines
//! * **Pluggable processors** - inbound messages and delivery receipts go to
//!   application traits on their own tasks, and are always acknowledged
//! * **Supervised reconnects** - capped exponential backoff, full re-bind on
//!   every new connection
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use smpp_esme::client::{EsmeClient, EsmeConfig, InMemoryStore, SessionState, SmsMessage};
//! # use smpp_esme::client::{DeliveryReportProcessor, ShortMessageProcessor};
//! # use smpp_esme::datatypes::{CommandStatus, DeliverSm, DeliveryReceipt, SubmitSmResponse};
//! # struct Handler;
//! # impl ShortMessageProcessor for Handler {
//! #     async fn handle_submit_sm_resp(&self, _: SubmitSmResponse, _: Option<String>) -> Result<(), smpp_esme::Error> { Ok(()) }
//! #     async fn handle_deliver_sm(&self, _: DeliverSm) -> Result<CommandStatus, smpp_esme::Error> { Ok(CommandStatus::Ok) }
//! # }
//! # impl DeliveryReportProcessor for Handler {
//! #     async fn handle_delivery_report(&self, _: DeliverSm, _: Option<DeliveryReceipt>) -> Result<CommandStatus, smpp_esme::Error> { Ok(CommandStatus::Ok) }
//! # }
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let handler = Arc::new(Handler);
//! let client = EsmeClient::connect_tcp(
//!     EsmeConfig::new("localhost", 2775),
//!     Arc::clone(&handler),
//!     handler,
//!     Arc::new(InMemoryStore::new()),
//! )?;
//! client.wait_for_state(SessionState::Bound).await?;
//!
//! let message = SmsMessage::new("123456789", "987654321", "Hello!");
//! let response = client.send_sms("app-id-1", &message).await?;
//! println!("submitted as {}", response.message_id);
//!
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod esme;
pub mod keepalive;
pub mod sequence;
pub mod session;
pub mod state;
pub mod store;
pub mod supervisor;
pub mod tracker;
pub mod traits;
pub mod types;

pub use config::EsmeConfig;
pub use dispatcher::{Ack, Dispatcher, Route, route};
pub use error::{SmppError, SmppResult};
pub use esme::EsmeClient;
pub use keepalive::{KeepAliveAction, KeepAliveConfig, KeepAliveManager, KeepAliveStatus};
pub use sequence::SequenceGenerator;
pub use session::{Command, Session, SessionEnd, SessionSummary};
pub use state::{Effect, SessionEvent, SessionState, Transition};
pub use store::InMemoryStore;
pub use supervisor::{Backoff, ReconnectPolicy, Supervisor};
pub use tracker::{OutboundTracker, PendingRequest, Resolution};
pub use traits::{
    Connector, CorrelationStore, DeliveryReportProcessor, ShortMessageProcessor, TcpConnector,
};
pub use types::{BindCredentials, SmsMessage};
