// ABOUTME: One SMPP transceiver session over one connection, driven by a single select loop
// ABOUTME: Owns the state machine, pending requests and keep-alive timer; ends on unbind, failure or disconnect

use crate::client::config::EsmeConfig;
use crate::client::dispatcher::{Ack, Dispatcher, Route, route};
use crate::client::error::SmppError;
use crate::client::keepalive::{KeepAliveAction, KeepAliveManager};
use crate::client::sequence::SequenceGenerator;
use crate::client::state::{Effect, SessionEvent, SessionState};
use crate::client::tracker::{Completion, OutboundTracker, Resolution};
use crate::client::traits::{CorrelationStore, DeliveryReportProcessor, ShortMessageProcessor};
use crate::codec::Frame;
use crate::connection::{Connection, ConnectionError};
use crate::datatypes::{
    CommandId, CommandStatus, DeliverSmResponse, EnquireLink, GenericNack, RESPONSE_BIT, Unbind,
    UnbindResponse,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

/// Requests from the client handle to whichever session is live.
#[derive(Debug)]
pub enum Command {
    /// Send `frame` (already numbered) and complete `reply` with the response.
    /// `correlation` is stored against the sequence number once the request
    /// is registered.
    Request {
        frame: Frame,
        expected: CommandId,
        timeout: Duration,
        correlation: Option<String>,
        reply: Completion,
    },
    /// Unbind and stop; `reply` fires once the connection is closed
    Unbind { reply: oneshot::Sender<()> },
}

/// Why a session ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// The operator unbound; do not reconnect
    Shutdown,
    BindFailed(CommandStatus),
    BindTimeout,
    KeepaliveTimeout,
    PeerUnbind,
    ConnectionClosed,
    Failed(ConnectionError),
}

#[derive(Debug)]
pub struct SessionSummary {
    pub end: SessionEnd,
    /// Whether the session got as far as BOUND
    pub reached_bound: bool,
}

enum Wake {
    Inbound(Result<Option<Frame>, ConnectionError>),
    Ack(Ack),
    Command(Option<Command>),
    BindTimer,
    Keepalive,
    RequestDeadline,
}

pub struct Session<S, P, D, K> {
    connection: Connection<S>,
    state: SessionState,
    state_tx: Arc<watch::Sender<SessionState>>,
    sequence: Arc<SequenceGenerator>,
    tracker: OutboundTracker,
    keepalive: KeepAliveManager,
    dispatcher: Dispatcher<P, D, K>,
    store: Arc<K>,
    acks: mpsc::UnboundedReceiver<Ack>,
    /// deliver_sm PDUs handed to a processor and not yet acknowledged
    unacked: usize,
    config: Arc<EsmeConfig>,

    bind_deadline: Option<Instant>,
    bind_sequence: Option<u32>,
    unbind_sequence: Option<u32>,
    operator_unbind: bool,
    shutdown_reply: Option<oneshot::Sender<()>>,
    commands_closed: bool,
    end: Option<SessionEnd>,
    reached_bound: bool,
}

impl<S, P, D, K> Session<S, P, D, K>
where
    S: AsyncRead + AsyncWrite + Unpin,
    P: ShortMessageProcessor,
    D: DeliveryReportProcessor,
    K: CorrelationStore,
{
    pub fn new(
        stream: S,
        config: Arc<EsmeConfig>,
        sequence: Arc<SequenceGenerator>,
        state_tx: Arc<watch::Sender<SessionState>>,
        sm: Arc<P>,
        dr: Arc<D>,
        store: Arc<K>,
    ) -> Self {
        let (ack_tx, acks) = mpsc::unbounded_channel();
        Self {
            connection: Connection::new(stream),
            state: SessionState::Closed,
            state_tx,
            sequence,
            tracker: OutboundTracker::new(),
            keepalive: KeepAliveManager::new(config.keep_alive.clone()),
            dispatcher: Dispatcher::new(sm, dr, Arc::clone(&store), ack_tx),
            store,
            acks,
            unacked: 0,
            config,
            bind_deadline: None,
            bind_sequence: None,
            unbind_sequence: None,
            operator_unbind: false,
            shutdown_reply: None,
            commands_closed: false,
            end: None,
            reached_bound: false,
        }
    }

    /// Binds, serves traffic until the session ends, then tears down.
    ///
    /// Pending requests never outlive this call: whatever is still waiting
    /// when it returns has been failed with `ConnectionLost`.
    pub async fn run(mut self, commands: &mut mpsc::Receiver<Command>) -> SessionSummary {
        if let Err(e) = self.drive(commands).await {
            warn!(error = %e, state = %self.state, "connection failed");
            if self.end.is_none() {
                self.end = Some(if self.operator_unbind {
                    SessionEnd::Shutdown
                } else {
                    SessionEnd::Failed(e)
                });
            }
        }
        self.teardown().await;

        SessionSummary {
            end: self.end.take().unwrap_or(SessionEnd::ConnectionClosed),
            reached_bound: self.reached_bound,
        }
    }

    async fn drive(&mut self, commands: &mut mpsc::Receiver<Command>) -> Result<(), ConnectionError> {
        self.apply(SessionEvent::Connected).await?;

        while self.end.is_none() {
            let bind_deadline = self.bind_deadline;
            let keepalive_at = self.keepalive.next_wakeup();
            let request_at = self.tracker.next_deadline();
            let accept_commands = !self.commands_closed;

            let wake = tokio::select! {
                biased;
                frame = self.connection.read_frame() => Wake::Inbound(frame),
                Some(ack) = self.acks.recv() => Wake::Ack(ack),
                command = commands.recv(), if accept_commands => Wake::Command(command),
                _ = sleep_until_opt(bind_deadline) => Wake::BindTimer,
                _ = sleep_until_opt(keepalive_at) => Wake::Keepalive,
                _ = sleep_until_opt(request_at) => Wake::RequestDeadline,
            };

            match wake {
                Wake::Inbound(Ok(Some(frame))) => self.on_frame(frame).await?,
                Wake::Inbound(Ok(None)) => {
                    info!(state = %self.state, "connection closed by SMSC");
                    self.end = Some(if self.operator_unbind {
                        SessionEnd::Shutdown
                    } else {
                        SessionEnd::ConnectionClosed
                    });
                }
                Wake::Inbound(Err(e)) if !e.is_fatal() => self.on_malformed(e).await?,
                Wake::Inbound(Err(e)) => return Err(e),
                Wake::Ack(ack) => self.on_ack(ack).await?,
                Wake::Command(Some(command)) => self.on_command(command).await?,
                Wake::Command(None) => {
                    debug!("client handle dropped, unbinding");
                    self.commands_closed = true;
                    self.apply(SessionEvent::UnbindRequested).await?;
                }
                Wake::BindTimer => {
                    warn!(timeout = ?self.config.bind_timeout, "no bind response");
                    self.bind_deadline = None;
                    self.apply(SessionEvent::BindTimedOut).await?;
                }
                Wake::Keepalive => self.on_keepalive_timer().await?,
                Wake::RequestDeadline => self.on_request_deadline().await?,
            }
        }
        Ok(())
    }

    async fn on_frame(&mut self, frame: Frame) -> Result<(), ConnectionError> {
        let sequence_number = frame.sequence_number();
        if frame.is_response() && !matches!(frame, Frame::EnquireLinkResp(_)) {
            self.keepalive.on_inbound_response();
        }

        // A pending request claims its sequence number before any routing.
        if self.tracker.contains(sequence_number) {
            if frame.is_response() {
                if matches!(frame, Frame::EnquireLinkResp(_)) {
                    self.keepalive.on_pong(sequence_number);
                }
                return self.settle(frame).await;
            }
            if matches!(frame, Frame::Unknown { .. }) {
                self.settle(frame.clone()).await?;
            }
        }

        match route(self.state, frame) {
            Route::Bind(resp) => {
                if self.bind_sequence != Some(resp.sequence_number) {
                    warn!(
                        sequence_number = resp.sequence_number,
                        "bind response for a bind we did not send"
                    );
                    return Ok(());
                }
                if resp.command_status.is_ok() {
                    info!(
                        smsc_system_id = %resp.system_id,
                        sc_interface_version = ?resp.sc_interface_version(),
                        "bind accepted"
                    );
                    self.apply(SessionEvent::BindSucceeded).await?;
                } else {
                    warn!(status = ?resp.command_status, "bind rejected");
                    self.apply(SessionEvent::BindRejected(resp.command_status))
                        .await?;
                }
            }

            Route::Resolve(frame) => self.settle(frame).await?,

            Route::Deliver(pdu) => {
                debug!(sequence_number = pdu.sequence_number, "deliver_sm received");
                self.unacked += 1;
                self.dispatcher.deliver_sm(pdu);
            }

            Route::EnquireLinkResponse(sequence_number) => {
                self.keepalive.on_pong(sequence_number);
            }

            Route::PeerUnbind(sequence_number) => {
                info!(sequence_number, "SMSC requested unbind");
                self.apply(SessionEvent::PeerUnbind { sequence_number })
                    .await?;
            }

            Route::GenericNack(nack) => {
                let sequence_number = nack.sequence_number;
                let status = nack.command_status;
                if self.state == SessionState::Open && self.bind_sequence == Some(sequence_number)
                {
                    warn!(?status, "bind answered with generic_nack");
                    self.apply(SessionEvent::BindRejected(status)).await?;
                } else {
                    warn!(sequence_number, ?status, "generic_nack for no pending request");
                }
            }

            Route::Reply(frame) => self.write(&frame).await?,

            Route::Anomaly {
                command_id,
                sequence_number,
                reason,
            } => warn!(
                command_id = format_args!("{:#010x}", command_id),
                sequence_number, reason, "unexpected PDU dropped"
            ),
        }
        Ok(())
    }

    /// Completes the pending request `frame` answers.
    async fn settle(&mut self, frame: Frame) -> Result<(), ConnectionError> {
        let sequence_number = frame.sequence_number();
        let command_id = frame.command_id();
        match self.tracker.resolve(&frame) {
            Resolution::Unmatched => {
                warn!(
                    sequence_number,
                    command_id = format_args!("{:#010x}", command_id),
                    "response for no pending request, dropped"
                );
                return Ok(());
            }
            Resolution::UnexpectedCommand { expected } => warn!(
                sequence_number,
                command_id = format_args!("{:#010x}", command_id),
                ?expected,
                "request failed by a PDU of the wrong kind"
            ),
            Resolution::Resolved => match frame {
                Frame::SubmitSmResp(resp) => self.dispatcher.submit_sm_resp(resp),
                Frame::GenericNack(nack) => warn!(
                    sequence_number,
                    status = ?nack.command_status,
                    "request rejected with generic_nack"
                ),
                _ => {}
            },
        }

        if self.unbind_sequence == Some(sequence_number) {
            self.apply(SessionEvent::UnbindCompleted).await?;
        }
        Ok(())
    }

    async fn on_malformed(&mut self, error: ConnectionError) -> Result<(), ConnectionError> {
        warn!(error = %error, "malformed PDU skipped");
        if let ConnectionError::Malformed {
            command_id,
            sequence_number,
            source,
        } = error
        {
            if command_id & RESPONSE_BIT == 0 {
                let nack = GenericNack::new(source.to_command_status(), sequence_number);
                self.write(&Frame::GenericNack(nack)).await?;
            }
        }
        Ok(())
    }

    async fn on_ack(&mut self, ack: Ack) -> Result<(), ConnectionError> {
        match ack {
            Ack::DeliverSm {
                sequence_number,
                status,
            } => {
                self.unacked = self.unacked.saturating_sub(1);
                let resp = DeliverSmResponse {
                    command_status: status,
                    sequence_number,
                    message_id: String::new(),
                };
                self.write(&Frame::DeliverSmResp(resp)).await
            }
        }
    }

    async fn on_command(&mut self, command: Command) -> Result<(), ConnectionError> {
        match command {
            Command::Request {
                frame,
                expected,
                timeout,
                correlation,
                reply,
            } => {
                if !self.state.is_bound() {
                    let _ = reply.send(Err(SmppError::InvalidState(self.state)));
                    return Ok(());
                }

                let sequence_number = frame.sequence_number();
                let now = Instant::now();
                if self
                    .tracker
                    .register(sequence_number, expected, now, timeout, reply)
                    .is_err()
                {
                    return Ok(());
                }

                if let Some(message_id) = correlation {
                    if let Err(e) = self.store.put(sequence_number, message_id).await {
                        warn!(sequence_number, error = %e, "correlation store write failed");
                        self.tracker.fail(sequence_number, SmppError::Store(e));
                        return Ok(());
                    }
                    debug!(sequence_number, "submit_sm correlation stored");
                }

                match self.connection.write_frame(&frame).await {
                    Ok(()) => {
                        debug!(
                            sequence_number,
                            command_id = format_args!("{:#010x}", frame.command_id()),
                            "request sent"
                        );
                        Ok(())
                    }
                    Err(ConnectionError::Encode(e)) => {
                        self.tracker.fail(sequence_number, SmppError::Codec(e));
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }

            Command::Unbind { reply } => {
                info!(state = %self.state, "unbind requested");
                self.shutdown_reply = Some(reply);
                self.apply(SessionEvent::UnbindRequested).await
            }
        }
    }

    async fn on_keepalive_timer(&mut self) -> Result<(), ConnectionError> {
        let now = Instant::now();
        match self.keepalive.poll(now) {
            KeepAliveAction::Idle => Ok(()),
            KeepAliveAction::SendEnquireLink => {
                let sequence_number = self.sequence.next();
                self.write(&Frame::EnquireLink(EnquireLink::new(sequence_number)))
                    .await?;
                self.keepalive.on_ping_sent(sequence_number, now);
                Ok(())
            }
            KeepAliveAction::Expired => self.apply(SessionEvent::KeepaliveExpired).await,
        }
    }

    async fn on_request_deadline(&mut self) -> Result<(), ConnectionError> {
        for sequence_number in self.tracker.expire(Instant::now()) {
            warn!(sequence_number, "request timed out");
            if self.unbind_sequence == Some(sequence_number) {
                self.apply(SessionEvent::UnbindCompleted).await?;
            }
        }
        Ok(())
    }

    /// Runs one event through the state machine and performs its effects.
    async fn apply(&mut self, event: SessionEvent) -> Result<(), ConnectionError> {
        let transition = self.state.on_event(&event);
        if !transition.accepted {
            debug!(state = %self.state, ?event, "event ignored in this state");
            return Ok(());
        }

        self.set_state(transition.state);
        for effect in transition.effects {
            self.perform(effect, &event).await?;
        }
        Ok(())
    }

    async fn perform(&mut self, effect: Effect, event: &SessionEvent) -> Result<(), ConnectionError> {
        match effect {
            Effect::SendBind => {
                let sequence_number = self.sequence.next();
                let bind = self.config.credentials.to_bind(sequence_number);
                self.bind_sequence = Some(sequence_number);
                debug!(sequence_number, system_id = %bind.system_id, "sending bind_transceiver");
                self.connection
                    .write_frame(&Frame::BindTransceiver(bind))
                    .await?;
            }
            Effect::StartBindTimer => {
                self.bind_deadline = Some(Instant::now() + self.config.bind_timeout);
            }
            Effect::CancelBindTimer => self.bind_deadline = None,
            Effect::StartKeepalive => self.keepalive.start(Instant::now()),
            Effect::StopKeepalive => self.keepalive.stop(),
            Effect::SendUnbind => {
                self.operator_unbind = true;
                let sequence_number = self.sequence.next();
                self.unbind_sequence = Some(sequence_number);
                // Nobody waits on this completion; the session watches the
                // sequence number itself.
                let (reply, _) = oneshot::channel();
                let _ = self.tracker.register(
                    sequence_number,
                    CommandId::UnbindResp,
                    Instant::now(),
                    self.config.request_timeout,
                    reply,
                );
                self.connection
                    .write_frame(&Frame::Unbind(Unbind::new(sequence_number)))
                    .await?;
            }
            Effect::AcknowledgeUnbind(sequence_number) => {
                self.flush_acks().await?;
                self.write(&Frame::UnbindResp(UnbindResponse::new(sequence_number)))
                    .await?;
            }
            Effect::CloseConnection => {
                if self.end.is_none() {
                    self.end = Some(end_for(event));
                }
            }
            Effect::FailPending => {
                let failed = self.tracker.fail_all(|| SmppError::ConnectionLost);
                if failed > 0 {
                    warn!(failed, "pending requests failed, connection lost");
                }
            }
        }
        Ok(())
    }

    /// Writes a frame the session generated itself. An encoding failure is
    /// logged; only a broken connection is an error.
    async fn write(&mut self, frame: &Frame) -> Result<(), ConnectionError> {
        match self.connection.write_frame(frame).await {
            Err(e) if !e.is_fatal() => {
                warn!(error = %e, sequence_number = frame.sequence_number(), "frame not sent");
                Ok(())
            }
            result => result,
        }
    }

    /// Waits for processors still holding a deliver_sm and writes their
    /// acknowledgements, for at most `request_timeout`.
    async fn flush_acks(&mut self) -> Result<(), ConnectionError> {
        if self.unacked == 0 {
            return Ok(());
        }
        debug!(unacked = self.unacked, "waiting for deliver_sm processors");

        let grace = time::sleep(self.config.request_timeout);
        tokio::pin!(grace);
        while self.unacked > 0 {
            tokio::select! {
                biased;
                Some(ack) = self.acks.recv() => self.on_ack(ack).await?,
                _ = &mut grace => {
                    warn!(unacked = self.unacked, "deliver_sm left unacknowledged");
                    self.unacked = 0;
                }
            }
        }
        Ok(())
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state == state {
            return;
        }
        info!(from = %self.state, to = %state, "session state changed");
        self.state = state;
        if state.is_bound() {
            self.reached_bound = true;
        }
        self.state_tx.send_replace(state);
    }

    async fn teardown(&mut self) {
        if self.state != SessionState::Closed {
            if let Err(e) = self.apply(SessionEvent::Disconnected).await {
                debug!(error = %e, "error while closing session");
            }
        }
        self.bind_deadline = None;
        self.keepalive.stop();
        if let Err(e) = self.flush_acks().await {
            debug!(error = %e, "deliver_sm acknowledgements not written");
        }
        self.tracker.fail_all(|| SmppError::ConnectionLost);

        if let Err(e) = self.connection.shutdown().await {
            debug!(error = %e, "error shutting down connection");
        }
        if let Some(reply) = self.shutdown_reply.take() {
            let _ = reply.send(());
        }
        debug!(status = ?self.keepalive.status(), "session closed");
    }
}

fn end_for(event: &SessionEvent) -> SessionEnd {
    match event {
        SessionEvent::BindRejected(status) => SessionEnd::BindFailed(*status),
        SessionEvent::BindTimedOut => SessionEnd::BindTimeout,
        SessionEvent::KeepaliveExpired => SessionEnd::KeepaliveTimeout,
        SessionEvent::PeerUnbind { .. } => SessionEnd::PeerUnbind,
        SessionEvent::Disconnected => SessionEnd::ConnectionClosed,
        SessionEvent::Connected
        | SessionEvent::BindSucceeded
        | SessionEvent::UnbindRequested
        | SessionEvent::UnbindCompleted => SessionEnd::Shutdown,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
