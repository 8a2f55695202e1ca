// ABOUTME: Client handle for a supervised ESME transceiver
// ABOUTME: Spawns the reconnection supervisor and forwards requests to the live session

use crate::client::config::EsmeConfig;
use crate::client::error::{SmppError, SmppResult};
use crate::client::sequence::SequenceGenerator;
use crate::client::session::Command;
use crate::client::state::SessionState;
use crate::client::supervisor::Supervisor;
use crate::client::tracker::check_status;
use crate::client::traits::{
    Connector, CorrelationStore, DeliveryReportProcessor, ShortMessageProcessor, TcpConnector,
};
use crate::client::types::SmsMessage;
use crate::codec::Frame;
use crate::datatypes::{CommandId, SubmitSm, SubmitSmResponse};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::debug;

// Requests queue here while the session is busy writing
const COMMAND_BUFFER: usize = 64;

/// Handle to an ESME transceiver that stays bound to its SMSC.
///
/// `connect` returns at once; binding happens in the background and is
/// retried according to the reconnect policy. Use `wait_for_state` to wait
/// for BOUND.
///
/// ```rust,no_run
/// use smpp_esme::client::{
///     BindCredentials, EsmeClient, EsmeConfig, InMemoryStore, SessionState, SmsMessage,
/// };
/// # use smpp_esme::client::{DeliveryReportProcessor, ShortMessageProcessor};
/// # use smpp_esme::datatypes::{CommandStatus, DeliverSm, DeliveryReceipt, SubmitSmResponse};
/// # use std::sync::Arc;
/// # struct Handler;
/// # impl ShortMessageProcessor for Handler {
/// #     async fn handle_submit_sm_resp(&self, _: SubmitSmResponse, _: Option<String>) -> Result<(), smpp_esme::Error> { Ok(()) }
/// #     async fn handle_deliver_sm(&self, _: DeliverSm) -> Result<CommandStatus, smpp_esme::Error> { Ok(CommandStatus::Ok) }
/// # }
/// # impl DeliveryReportProcessor for Handler {
/// #     async fn handle_delivery_report(&self, _: DeliverSm, _: Option<DeliveryReceipt>) -> Result<CommandStatus, smpp_esme::Error> { Ok(CommandStatus::Ok) }
/// # }
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = EsmeConfig::new("localhost", 2775)
///     .with_credentials(BindCredentials::transceiver("system_id", "password"));
/// let handler = Arc::new(Handler);
/// let client = EsmeClient::connect_tcp(
///     config,
///     Arc::clone(&handler),
///     handler,
///     Arc::new(InMemoryStore::new()),
/// )?;
///
/// client.wait_for_state(SessionState::Bound).await?;
/// let response = client
///     .send_sms("msg-1", &SmsMessage::new("27831234567", "12345", "Hello!"))
///     .await?;
/// println!("SMSC message id: {}", response.message_id);
///
/// client.disconnect().await?;
/// # Ok(())
/// # }
/// ```
pub struct EsmeClient<K> {
    commands: mpsc::Sender<Command>,
    sequence: Arc<SequenceGenerator>,
    store: Arc<K>,
    state: watch::Receiver<SessionState>,
    request_timeout: Duration,
    supervisor: JoinHandle<()>,
}

impl<K: CorrelationStore> EsmeClient<K> {
    /// Validates `config` and spawns the supervisor on the current tokio
    /// runtime.
    pub fn connect<C, P, D>(
        config: EsmeConfig,
        connector: C,
        sm: Arc<P>,
        dr: Arc<D>,
        store: Arc<K>,
    ) -> SmppResult<Self>
    where
        C: Connector,
        P: ShortMessageProcessor,
        D: DeliveryReportProcessor,
    {
        config.validate()?;

        let config = Arc::new(config);
        let sequence = Arc::new(SequenceGenerator::new());
        let (state_tx, state) = watch::channel(SessionState::Closed);
        let (commands, rx) = mpsc::channel(COMMAND_BUFFER);

        let supervisor = Supervisor::new(
            Arc::clone(&config),
            connector,
            sm,
            dr,
            Arc::clone(&store),
            Arc::clone(&sequence),
            Arc::new(state_tx),
        );
        let supervisor = tokio::spawn(supervisor.run(rx));

        Ok(Self {
            commands,
            sequence,
            store,
            state,
            request_timeout: config.request_timeout,
            supervisor,
        })
    }

    /// `connect` over TCP to `config.host:config.port`.
    pub fn connect_tcp<P, D>(
        config: EsmeConfig,
        sm: Arc<P>,
        dr: Arc<D>,
        store: Arc<K>,
    ) -> SmppResult<Self>
    where
        P: ShortMessageProcessor,
        D: DeliveryReportProcessor,
    {
        let connector = TcpConnector::new(config.address());
        Self::connect(config, connector, sm, dr, store)
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// A receiver that sees every state change from now on.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Waits until the session reaches `target`.
    pub async fn wait_for_state(&self, target: SessionState) -> SmppResult<()> {
        let mut state = self.state.clone();
        state
            .wait_for(|current| *current == target)
            .await
            .map(|_| ())
            .map_err(|_| SmppError::ConnectionLost)
    }

    /// Sends `frame` with a fresh sequence number and waits for a response
    /// of kind `expected`.
    ///
    /// Fails with `InvalidState` unless the session is BOUND, `Timeout` when
    /// no response arrives within `timeout`, and `ConnectionLost` when the
    /// connection goes away first. The response is returned as-is, error
    /// status included.
    pub async fn send_request(
        &self,
        mut frame: Frame,
        expected: CommandId,
        timeout: Duration,
    ) -> SmppResult<Frame> {
        frame.set_sequence_number(self.sequence.next());
        self.request(frame, expected, timeout, None).await
    }

    async fn request(
        &self,
        frame: Frame,
        expected: CommandId,
        timeout: Duration,
        correlation: Option<String>,
    ) -> SmppResult<Frame> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Request {
                frame,
                expected,
                timeout,
                correlation,
                reply,
            })
            .await
            .map_err(|_| SmppError::InvalidState(SessionState::Closed))?;

        response.await.map_err(|_| SmppError::ConnectionLost)?
    }

    /// Submits `pdu`, recording `message_id` against its sequence number so
    /// the short-message processor can correlate the response.
    ///
    /// The correlation is written only once the session has accepted the
    /// sequence number, and is removed again if the request fails. A response
    /// with a non-zero status is returned as `Protocol`.
    pub async fn submit_sm(
        &self,
        message_id: impl Into<String>,
        mut pdu: SubmitSm,
    ) -> SmppResult<SubmitSmResponse> {
        let state = self.state();
        if !state.is_bound() {
            return Err(SmppError::InvalidState(state));
        }

        let sequence_number = self.sequence.next();
        pdu.sequence_number = sequence_number;

        let response = self
            .request(
                Frame::SubmitSm(Box::new(pdu)),
                CommandId::SubmitSmResp,
                self.request_timeout,
                Some(message_id.into()),
            )
            .await;

        let response = match response {
            Ok(frame) => frame,
            // The number belongs to another request; its correlation stays.
            Err(e @ SmppError::SequenceCollision(_)) => return Err(e),
            Err(e) => {
                if let Err(store_error) = self.store.remove(sequence_number).await {
                    debug!(sequence_number, error = %store_error, "correlation cleanup failed");
                }
                return Err(e);
            }
        };

        match response {
            Frame::SubmitSmResp(response) => {
                check_status(response.command_status)?;
                Ok(response)
            }
            other => Err(SmppError::UnexpectedPdu {
                expected: "submit_sm_resp".to_string(),
                actual: format!("{:#010x}", other.command_id()),
            }),
        }
    }

    /// Submits a simple text message.
    pub async fn send_sms(
        &self,
        message_id: impl Into<String>,
        message: &SmsMessage,
    ) -> SmppResult<SubmitSmResponse> {
        self.submit_sm(message_id, SubmitSm::from(message)).await
    }

    /// Unbinds, closes the connection and stops reconnecting.
    pub async fn disconnect(self) -> SmppResult<()> {
        let (reply, done) = oneshot::channel();
        if self.commands.send(Command::Unbind { reply }).await.is_ok() {
            let _ = done.await;
        }
        drop(self.commands);

        self.supervisor
            .await
            .map_err(|e| SmppError::Connection(io::Error::other(e)))
    }
}
