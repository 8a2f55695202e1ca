// ABOUTME: Collaborator traits the ESME session calls into, using return-position impl Future
// ABOUTME: Defines message processors, the sequence-to-message-id store and the transport connector

use crate::datatypes::{CommandStatus, DeliverSm, DeliveryReceipt, SubmitSmResponse};
use std::future::Future;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Application handler for short message traffic
///
/// Calls happen on their own tasks, so a slow handler never holds up the
/// session. The futures must be `Send` for that reason; implementations can
/// still be written as plain `async fn`.
pub trait ShortMessageProcessor: Send + Sync + 'static {
    /// A submit_sm_resp arrived. `message_id` is the application id stored
    /// for the request's sequence number, if the store had one.
    fn handle_submit_sm_resp(
        &self,
        response: SubmitSmResponse,
        message_id: Option<String>,
    ) -> impl Future<Output = Result<(), crate::Error>> + Send;

    /// A mobile-originated deliver_sm arrived. The returned status goes back
    /// in the deliver_sm_resp.
    fn handle_deliver_sm(
        &self,
        pdu: DeliverSm,
    ) -> impl Future<Output = Result<CommandStatus, crate::Error>> + Send;
}

/// Application handler for SMSC delivery receipts
pub trait DeliveryReportProcessor: Send + Sync + 'static {
    /// A deliver_sm carrying a delivery receipt arrived. `receipt` is the
    /// parsed receipt when the text or TLVs could be understood.
    fn handle_delivery_report(
        &self,
        pdu: DeliverSm,
        receipt: Option<DeliveryReceipt>,
    ) -> impl Future<Output = Result<CommandStatus, crate::Error>> + Send;
}

/// Key-value store correlating outbound sequence numbers with application
/// message ids.
///
/// The session never locks around it; implementations bring their own
/// consistency.
pub trait CorrelationStore: Send + Sync + 'static {
    fn put(
        &self,
        sequence_number: u32,
        message_id: String,
    ) -> impl Future<Output = Result<(), crate::Error>> + Send;

    fn get(
        &self,
        sequence_number: u32,
    ) -> impl Future<Output = Result<Option<String>, crate::Error>> + Send;

    /// Removes and returns the entry. Called once a request is finished
    /// with, whether it was answered or not.
    fn remove(
        &self,
        sequence_number: u32,
    ) -> impl Future<Output = Result<Option<String>, crate::Error>> + Send;
}

/// Opens the byte stream a session runs over. Called once per connection
/// attempt.
pub trait Connector: Send + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn connect(&mut self) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Connects to the SMSC over plain TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
}

impl TcpConnector {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&mut self) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(&self.addr).await?;
        // PDUs are small and latency-sensitive
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}
