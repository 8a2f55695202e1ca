//! End-to-end tests driving an ESME client against a scripted SMSC

use crate::client::{
    Command, Connector, CorrelationStore, DeliveryReportProcessor, EsmeClient, EsmeConfig,
    InMemoryStore, KeepAliveConfig, ReconnectPolicy, SequenceGenerator, Session, SessionState,
    ShortMessageProcessor, SmppError, SmsMessage,
};
use crate::codec::{Frame, PduHeader};
use crate::connection::Connection;
use crate::datatypes::*;
use bytes::Bytes;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::DuplexStream;
use tokio::sync::{mpsc, oneshot, watch};

#[cfg(test)]
mod integration_tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::time::Instant;

    const RECEIPT_TEXT: &str = "id:abc123 sub:001 dlvrd:001 submit date:2401011200 \
                                done date:2401011201 stat:DELIVRD err:000 text:hello";

    /// Hands the ESME one end of an in-memory pipe per connection attempt
    /// and the test the other.
    struct TestConnector {
        attempts: Arc<AtomicUsize>,
        peers: mpsc::UnboundedSender<DuplexStream>,
    }

    impl Connector for TestConnector {
        type Stream = DuplexStream;

        async fn connect(&mut self) -> io::Result<DuplexStream> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let (esme, smsc) = tokio::io::duplex(64 * 1024);
            self.peers
                .send(smsc)
                .map_err(|_| io::Error::other("test finished"))?;
            Ok(esme)
        }
    }

    #[derive(Debug)]
    enum Seen {
        Deliver(DeliverSm),
        Report(DeliverSm, Option<DeliveryReceipt>),
        SubmitResp(SubmitSmResponse, Option<String>),
    }

    #[derive(Clone, Copy)]
    enum Behaviour {
        Reply(CommandStatus),
        Fail,
        Panic,
    }

    struct Recorder {
        behaviour: Behaviour,
        seen: mpsc::UnboundedSender<Seen>,
    }

    impl Recorder {
        fn outcome(&self) -> Result<CommandStatus, crate::Error> {
            match self.behaviour {
                Behaviour::Reply(status) => Ok(status),
                Behaviour::Fail => Err("processor failed".into()),
                Behaviour::Panic => panic!("processor blew up"),
            }
        }
    }

    impl ShortMessageProcessor for Recorder {
        async fn handle_submit_sm_resp(
            &self,
            response: SubmitSmResponse,
            message_id: Option<String>,
        ) -> Result<(), crate::Error> {
            let _ = self.seen.send(Seen::SubmitResp(response, message_id));
            Ok(())
        }

        async fn handle_deliver_sm(&self, pdu: DeliverSm) -> Result<CommandStatus, crate::Error> {
            let _ = self.seen.send(Seen::Deliver(pdu));
            self.outcome()
        }
    }

    impl DeliveryReportProcessor for Recorder {
        async fn handle_delivery_report(
            &self,
            pdu: DeliverSm,
            receipt: Option<DeliveryReceipt>,
        ) -> Result<CommandStatus, crate::Error> {
            let _ = self.seen.send(Seen::Report(pdu, receipt));
            self.outcome()
        }
    }

    /// The SMSC side of one connection.
    struct Smsc {
        connection: Connection<DuplexStream>,
    }

    impl Smsc {
        fn new(stream: DuplexStream) -> Self {
            Self {
                connection: Connection::new(stream),
            }
        }

        async fn recv(&mut self) -> Frame {
            self.connection
                .read_frame()
                .await
                .unwrap()
                .expect("ESME closed the connection")
        }

        async fn send(&mut self, frame: Frame) {
            self.connection.write_frame(&frame).await.unwrap();
        }

        async fn accept_bind(&mut self) -> BindTransceiver {
            match self.recv().await {
                Frame::BindTransceiver(bind) => {
                    self.send(Frame::BindTransceiverResp(BindTransceiverResponse::new(
                        bind.sequence_number,
                        "SMSC",
                    )))
                    .await;
                    bind
                }
                other => panic!("expected bind_transceiver, got {other:?}"),
            }
        }

        /// Round-trips an enquire_link. Anything the ESME had queued for
        /// this connection before the answer fails the assertion.
        async fn ping(&mut self, sequence_number: u32) {
            self.send(Frame::EnquireLink(EnquireLink::new(sequence_number)))
                .await;
            assert_eq!(
                self.recv().await,
                Frame::EnquireLinkResp(EnquireLinkResponse::new(sequence_number))
            );
        }

        async fn expect_closed(&mut self) {
            let frame = self.connection.read_frame().await.unwrap();
            assert!(frame.is_none(), "expected close, got {frame:?}");
        }
    }

    struct Harness {
        client: EsmeClient<InMemoryStore>,
        store: Arc<InMemoryStore>,
        peers: mpsc::UnboundedReceiver<DuplexStream>,
        attempts: Arc<AtomicUsize>,
        seen: mpsc::UnboundedReceiver<Seen>,
    }

    fn test_config() -> EsmeConfig {
        EsmeConfig::default()
            .with_bind_timeout(Duration::from_secs(5))
            .with_request_timeout(Duration::from_secs(10))
            .with_keep_alive(
                KeepAliveConfig::new(Duration::from_secs(30)).with_timeout(Duration::from_secs(10)),
            )
            .with_reconnect(ReconnectPolicy::default().with_initial_delay(Duration::from_secs(1)))
    }

    impl Harness {
        fn start(behaviour: Behaviour) -> Self {
            let attempts = Arc::new(AtomicUsize::new(0));
            let (peer_tx, peers) = mpsc::unbounded_channel();
            let (seen_tx, seen) = mpsc::unbounded_channel();
            let recorder = Arc::new(Recorder {
                behaviour,
                seen: seen_tx,
            });
            let connector = TestConnector {
                attempts: Arc::clone(&attempts),
                peers: peer_tx,
            };

            let store = Arc::new(InMemoryStore::new());
            let client = EsmeClient::connect(
                test_config(),
                connector,
                Arc::clone(&recorder),
                recorder,
                Arc::clone(&store),
            )
            .unwrap();

            Self {
                client,
                store,
                peers,
                attempts,
                seen,
            }
        }

        async fn next_smsc(&mut self) -> Smsc {
            Smsc::new(self.peers.recv().await.expect("no connection attempt"))
        }

        async fn bound(&mut self) -> Smsc {
            let mut smsc = self.next_smsc().await;
            smsc.accept_bind().await;
            self.client
                .wait_for_state(SessionState::Bound)
                .await
                .unwrap();
            smsc
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }

        /// Collects every state the client reports from now on.
        fn record_states(&self) -> Arc<Mutex<Vec<SessionState>>> {
            let mut rx = self.client.subscribe();
            let states = Arc::new(Mutex::new(Vec::new()));
            let out = Arc::clone(&states);
            tokio::spawn(async move {
                while rx.changed().await.is_ok() {
                    let state = *rx.borrow_and_update();
                    out.lock().unwrap().push(state);
                }
            });
            states
        }
    }

    fn bound_count(states: &Mutex<Vec<SessionState>>) -> usize {
        states
            .lock()
            .unwrap()
            .iter()
            .filter(|state| **state == SessionState::Bound)
            .count()
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    fn deliver_sm(sequence_number: u32, esm_class: u8, text: &'static str) -> Frame {
        Frame::DeliverSm(Box::new(DeliverSm {
            sequence_number,
            source_addr: "27831234567".to_string(),
            destination_addr: "12345".to_string(),
            esm_class,
            short_message: Bytes::from_static(text.as_bytes()),
            ..Default::default()
        }))
    }

    fn message() -> SubmitSm {
        SubmitSm::from(&SmsMessage::new("27831234567", "12345", "hello"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_pdu_is_the_expected_bind() {
        let mut h = Harness::start(Behaviour::Reply(CommandStatus::Ok));
        let mut peer = h.peers.recv().await.unwrap();

        let mut wire = [0u8; 40];
        peer.read_exact(&mut wire).await.unwrap();

        let mut expected = vec![
            0x00, 0x00, 0x00, 0x28, // command_length = 40
            0x00, 0x00, 0x00, 0x09, // bind_transceiver
            0x00, 0x00, 0x00, 0x00, // command_status
            0x00, 0x00, 0x00, 0x00, // sequence_number = 0
        ];
        expected.extend_from_slice(b"system_id\0");
        expected.extend_from_slice(b"password\0");
        expected.extend_from_slice(&[
            0x00, // system_type
            0x34, // interface_version
            0x00, // addr_ton
            0x00, // addr_npi
            0x00, // address_range
        ]);
        assert_eq!(wire.as_slice(), expected.as_slice());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bind_success_reaches_bound_once() {
        let mut h = Harness::start(Behaviour::Reply(CommandStatus::Ok));
        let states = h.record_states();
        let mut smsc = h.next_smsc().await;
        let bind = smsc.accept_bind().await;
        h.client
            .wait_for_state(SessionState::Bound)
            .await
            .unwrap();

        // A repeated bind response is dropped
        smsc.send(Frame::BindTransceiverResp(BindTransceiverResponse::new(
            bind.sequence_number,
            "SMSC",
        )))
        .await;
        smsc.ping(500).await;
        settle().await;

        assert_eq!(h.client.state(), SessionState::Bound);
        assert_eq!(bound_count(&states), 1);
        assert_eq!(h.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bind_rejected_never_binds_and_retries() {
        let mut h = Harness::start(Behaviour::Reply(CommandStatus::Ok));
        let states = h.record_states();

        let mut smsc = h.next_smsc().await;
        let Frame::BindTransceiver(bind) = smsc.recv().await else {
            panic!("expected bind_transceiver");
        };
        smsc.send(Frame::BindTransceiverResp(BindTransceiverResponse::error(
            bind.sequence_number,
            CommandStatus::InvalidPassword,
        )))
        .await;
        smsc.expect_closed().await;

        let mut retry = h.next_smsc().await;
        assert!(matches!(retry.recv().await, Frame::BindTransceiver(_)));
        assert_eq!(h.attempts(), 2);
        assert_eq!(bound_count(&states), 0);

        h.client.disconnect().await.unwrap();
        assert_eq!(bound_count(&states), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bind_timeout_closes_the_connection() {
        let mut h = Harness::start(Behaviour::Reply(CommandStatus::Ok));
        let states = h.record_states();
        let start = Instant::now();

        let mut smsc = h.next_smsc().await;
        assert!(matches!(smsc.recv().await, Frame::BindTransceiver(_)));
        smsc.expect_closed().await;

        assert!(start.elapsed() >= Duration::from_secs(5));
        settle().await;
        assert_eq!(bound_count(&states), 0);
        assert_ne!(h.client.state(), SessionState::Bound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deliver_sm_uses_processor_status() {
        let mut h = Harness::start(Behaviour::Reply(CommandStatus::ThrottlingError));
        let mut smsc = h.bound().await;

        smsc.send(deliver_sm(100, 0x00, "hi there")).await;
        assert_eq!(
            smsc.recv().await,
            Frame::DeliverSmResp(DeliverSmResponse::error(100, CommandStatus::ThrottlingError))
        );

        match h.seen.recv().await.unwrap() {
            Seen::Deliver(pdu) => {
                assert_eq!(pdu.sequence_number, 100);
                assert_eq!(pdu.short_message.as_ref(), b"hi there");
            }
            other => panic!("expected a short message, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deliver_sm_acked_once_when_processor_fails() {
        for behaviour in [Behaviour::Fail, Behaviour::Panic] {
            let mut h = Harness::start(behaviour);
            let mut smsc = h.bound().await;

            smsc.send(deliver_sm(100, 0x00, "hi")).await;
            assert_eq!(
                smsc.recv().await,
                Frame::DeliverSmResp(DeliverSmResponse::new(100, ""))
            );
            // No second deliver_sm_resp sits ahead of the ping answer
            smsc.ping(101).await;
            assert_eq!(h.client.state(), SessionState::Bound);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivery_receipt_goes_to_report_processor() {
        let mut h = Harness::start(Behaviour::Reply(CommandStatus::Ok));
        let mut smsc = h.bound().await;

        smsc.send(deliver_sm(200, 0x04, RECEIPT_TEXT)).await;
        assert_eq!(
            smsc.recv().await,
            Frame::DeliverSmResp(DeliverSmResponse::new(200, ""))
        );

        match h.seen.recv().await.unwrap() {
            Seen::Report(pdu, Some(receipt)) => {
                assert_eq!(pdu.sequence_number, 200);
                assert_eq!(receipt.id, "abc123");
                assert_eq!(receipt.state, MessageState::Delivered);
            }
            other => panic!("expected a delivery report, got {other:?}"),
        }

        smsc.send(deliver_sm(201, 0x00, "plain text")).await;
        assert_eq!(
            smsc.recv().await,
            Frame::DeliverSmResp(DeliverSmResponse::new(201, ""))
        );
        assert!(matches!(h.seen.recv().await.unwrap(), Seen::Deliver(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_sm_resolves_and_drops_duplicate() {
        let mut h = Harness::start(Behaviour::Reply(CommandStatus::Ok));
        let mut smsc = h.bound().await;

        let (result, ()) = tokio::join!(h.client.submit_sm("app-1", message()), async {
            let Frame::SubmitSm(submit) = smsc.recv().await else {
                panic!("expected submit_sm");
            };
            assert_eq!(submit.destination_addr, "27831234567");
            let resp = Frame::SubmitSmResp(SubmitSmResponse::new(submit.sequence_number, "smsc-1"));
            smsc.send(resp.clone()).await;
            smsc.send(resp).await;
        });
        assert_eq!(result.unwrap().message_id, "smsc-1");

        match h.seen.recv().await.unwrap() {
            Seen::SubmitResp(resp, message_id) => {
                assert_eq!(resp.message_id, "smsc-1");
                assert_eq!(message_id.as_deref(), Some("app-1"));
            }
            other => panic!("expected a submit_sm_resp, got {other:?}"),
        }
        assert_eq!(h.store.len().await, 0);

        smsc.ping(300).await;
        settle().await;
        assert!(h.seen.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_resolve_independently() {
        let mut h = Harness::start(Behaviour::Reply(CommandStatus::Ok));
        let mut smsc = h.bound().await;
        let timeout = Duration::from_secs(10);

        let (first, second, ()) = tokio::join!(
            h.client.send_request(
                Frame::SubmitSm(Box::new(message())),
                CommandId::SubmitSmResp,
                timeout
            ),
            h.client.send_request(
                Frame::SubmitSm(Box::new(message())),
                CommandId::SubmitSmResp,
                timeout
            ),
            async {
                let a = smsc.recv().await.sequence_number();
                let b = smsc.recv().await.sequence_number();
                assert_ne!(a, b);
                // Answer out of order
                for sequence_number in [b, a] {
                    smsc.send(Frame::SubmitSmResp(SubmitSmResponse::new(
                        sequence_number,
                        format!("smsc-{sequence_number}"),
                    )))
                    .await;
                }
            }
        );

        let first = first.unwrap();
        let second = second.unwrap();
        assert_ne!(first.sequence_number(), second.sequence_number());
        for response in [first, second] {
            match response {
                Frame::SubmitSmResp(resp) => {
                    assert_eq!(resp.message_id, format!("smsc-{}", resp.sequence_number))
                }
                other => panic!("expected submit_sm_resp, got {other:?}"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_request_times_out() {
        let mut h = Harness::start(Behaviour::Reply(CommandStatus::Ok));
        let mut smsc = h.bound().await;
        let start = Instant::now();

        let mut sequence_number = 0;
        let (result, ()) = tokio::join!(h.client.submit_sm("app-2", message()), async {
            sequence_number = smsc.recv().await.sequence_number();
        });
        assert!(matches!(result, Err(SmppError::Timeout)));
        assert!(start.elapsed() >= Duration::from_secs(10));
        assert_eq!(h.store.len().await, 0);

        // The late answer is dropped and the session carries on
        smsc.send(Frame::SubmitSmResp(SubmitSmResponse::new(sequence_number, "late")))
            .await;
        smsc.ping(400).await;
        assert_eq!(h.client.state(), SessionState::Bound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generic_nack_fails_the_request() {
        let mut h = Harness::start(Behaviour::Reply(CommandStatus::Ok));
        let mut smsc = h.bound().await;

        let (result, ()) = tokio::join!(h.client.submit_sm("app-3", message()), async {
            let sequence_number = smsc.recv().await.sequence_number();
            smsc.send(Frame::GenericNack(GenericNack::new(
                CommandStatus::InvalidCommandLength,
                sequence_number,
            )))
            .await;
        });
        assert!(matches!(
            result,
            Err(SmppError::GenericNack(CommandStatus::InvalidCommandLength))
        ));
        assert_eq!(h.client.state(), SessionState::Bound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_status_is_a_protocol_error() {
        let mut h = Harness::start(Behaviour::Reply(CommandStatus::Ok));
        let mut smsc = h.bound().await;

        let (result, ()) = tokio::join!(h.client.submit_sm("app-4", message()), async {
            let sequence_number = smsc.recv().await.sequence_number();
            smsc.send(Frame::SubmitSmResp(SubmitSmResponse::error(
                sequence_number,
                CommandStatus::ThrottlingError,
            )))
            .await;
        });
        assert!(matches!(
            result,
            Err(SmppError::Protocol(CommandStatus::ThrottlingError))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_before_bound_are_refused() {
        let mut h = Harness::start(Behaviour::Reply(CommandStatus::Ok));
        let mut smsc = h.next_smsc().await;
        assert!(matches!(smsc.recv().await, Frame::BindTransceiver(_)));

        let result = h
            .client
            .send_request(
                Frame::EnquireLink(EnquireLink::new(0)),
                CommandId::EnquireLinkResp,
                Duration::from_secs(1),
            )
            .await;
        assert!(matches!(
            result,
            Err(SmppError::InvalidState(SessionState::Open))
        ));

        let result = h
            .client
            .send_sms("app-5", &SmsMessage::new("27831234567", "12345", "early"))
            .await;
        assert!(matches!(
            result,
            Err(SmppError::InvalidState(SessionState::Open))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_smsc_enquire_link_is_answered() {
        let mut h = Harness::start(Behaviour::Reply(CommandStatus::Ok));
        let mut smsc = h.bound().await;
        smsc.ping(55).await;
        smsc.ping(56).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_answered_keeps_the_session() {
        let mut h = Harness::start(Behaviour::Reply(CommandStatus::Ok));
        let mut smsc = h.bound().await;

        let Frame::EnquireLink(first) = smsc.recv().await else {
            panic!("expected enquire_link");
        };
        smsc.send(Frame::EnquireLinkResp(EnquireLinkResponse::new(
            first.sequence_number,
        )))
        .await;

        let Frame::EnquireLink(second) = smsc.recv().await else {
            panic!("expected enquire_link");
        };
        assert_ne!(first.sequence_number, second.sequence_number);
        assert_eq!(h.client.state(), SessionState::Bound);
        assert_eq!(h.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_timeout_reconnects_once() {
        let mut h = Harness::start(Behaviour::Reply(CommandStatus::Ok));
        let mut smsc = h.bound().await;
        let start = Instant::now();

        assert!(matches!(smsc.recv().await, Frame::EnquireLink(_)));
        smsc.expect_closed().await;
        assert!(start.elapsed() >= Duration::from_secs(40));

        let mut smsc = h.bound().await;
        assert_eq!(h.attempts(), 2);
        smsc.ping(600).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_peer_unbind_is_acknowledged() {
        let mut h = Harness::start(Behaviour::Reply(CommandStatus::Ok));
        let mut smsc = h.bound().await;

        smsc.send(Frame::Unbind(Unbind::new(77))).await;
        assert_eq!(
            smsc.recv().await,
            Frame::UnbindResp(UnbindResponse::new(77))
        );
        smsc.expect_closed().await;

        h.bound().await;
        assert_eq!(h.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_unbinds_and_stops() {
        let mut h = Harness::start(Behaviour::Reply(CommandStatus::Ok));
        let mut smsc = h.bound().await;

        let (result, ()) = tokio::join!(h.client.disconnect(), async {
            let Frame::Unbind(unbind) = smsc.recv().await else {
                panic!("expected unbind");
            };
            smsc.send(Frame::UnbindResp(UnbindResponse::new(unbind.sequence_number)))
                .await;
            smsc.expect_closed().await;
        });
        result.unwrap();

        assert!(h.peers.recv().await.is_none());
        assert_eq!(h.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_pdu_is_nacked_not_fatal() {
        let mut h = Harness::start(Behaviour::Reply(CommandStatus::Ok));
        let mut smsc = h.bound().await;

        smsc.send(Frame::Unknown {
            header: PduHeader::new(CommandId::EnquireLink, CommandStatus::Ok, 7),
            body: Bytes::from_static(&[0xde, 0xad]),
        })
        .await;
        assert_eq!(
            smsc.recv().await,
            Frame::GenericNack(GenericNack::new(CommandStatus::InvalidCommandLength, 7))
        );

        smsc.ping(8).await;
        assert_eq!(h.client.state(), SessionState::Bound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_request_enquire_link_resolves() {
        let mut h = Harness::start(Behaviour::Reply(CommandStatus::Ok));
        let mut smsc = h.bound().await;

        let (result, ()) = tokio::join!(
            h.client.send_request(
                Frame::EnquireLink(EnquireLink::new(0)),
                CommandId::EnquireLinkResp,
                Duration::from_secs(5)
            ),
            async {
                let Frame::EnquireLink(ping) = smsc.recv().await else {
                    panic!("expected enquire_link");
                };
                smsc.send(Frame::EnquireLinkResp(EnquireLinkResponse::new(
                    ping.sequence_number,
                )))
                .await;
            }
        );

        assert!(matches!(result.unwrap(), Frame::EnquireLinkResp(_)));
        assert_eq!(h.client.state(), SessionState::Bound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_request_resolves_opaque_response() {
        let mut h = Harness::start(Behaviour::Reply(CommandStatus::Ok));
        let mut smsc = h.bound().await;

        let query = Frame::Unknown {
            header: PduHeader::new(CommandId::QuerySm, CommandStatus::Ok, 0),
            body: Bytes::from_static(b"smsc-1\0\0\0\0"),
        };
        let (result, ()) = tokio::join!(
            h.client
                .send_request(query, CommandId::QuerySmResp, Duration::from_secs(5)),
            async {
                let request = smsc.recv().await;
                assert_eq!(request.command_id(), CommandId::QuerySm as u32);
                smsc.send(Frame::Unknown {
                    header: PduHeader::new(
                        CommandId::QuerySmResp,
                        CommandStatus::Ok,
                        request.sequence_number(),
                    ),
                    body: Bytes::from_static(b"smsc-1\0\0\x02\0"),
                })
                .await;
            }
        );

        assert_eq!(result.unwrap().command_id(), CommandId::QuerySmResp as u32);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrecognised_response_fails_pending_request() {
        let mut h = Harness::start(Behaviour::Reply(CommandStatus::Ok));
        let mut smsc = h.bound().await;
        let start = Instant::now();

        let (result, ()) = tokio::join!(h.client.submit_sm("app-6", message()), async {
            let sequence_number = smsc.recv().await.sequence_number();
            smsc.send(Frame::Unknown {
                header: PduHeader::new(CommandId::QuerySmResp, CommandStatus::Ok, sequence_number),
                body: Bytes::new(),
            })
            .await;
        });

        match result {
            Err(SmppError::UnexpectedPdu { actual, .. }) => assert_eq!(actual, "0x80000003"),
            other => panic!("expected UnexpectedPdu, got {other:?}"),
        }
        assert!(start.elapsed() < Duration::from_secs(10));
        assert_eq!(h.store.len().await, 0);
        assert_eq!(h.client.state(), SessionState::Bound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deliver_sm_acked_before_unbind_resp() {
        let mut h = Harness::start(Behaviour::Reply(CommandStatus::Ok));
        let mut smsc = h.bound().await;

        smsc.send(deliver_sm(50, 0x00, "last words")).await;
        smsc.send(Frame::Unbind(Unbind::new(51))).await;

        assert_eq!(
            smsc.recv().await,
            Frame::DeliverSmResp(DeliverSmResponse::new(50, ""))
        );
        assert_eq!(
            smsc.recv().await,
            Frame::UnbindResp(UnbindResponse::new(51))
        );
        smsc.expect_closed().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_colliding_sequence_keeps_first_correlation() {
        let (esme, peer) = tokio::io::duplex(64 * 1024);
        let (seen_tx, mut seen) = mpsc::unbounded_channel();
        let recorder = Arc::new(Recorder {
            behaviour: Behaviour::Reply(CommandStatus::Ok),
            seen: seen_tx,
        });
        let store = Arc::new(InMemoryStore::new());
        let sequence = Arc::new(SequenceGenerator::starting_at(u32::MAX));
        let (state_tx, mut state) = watch::channel(SessionState::Closed);

        let session = Session::new(
            esme,
            Arc::new(test_config()),
            Arc::clone(&sequence),
            Arc::new(state_tx),
            Arc::clone(&recorder),
            recorder,
            Arc::clone(&store),
        );
        let (commands, mut rx) = mpsc::channel(8);
        tokio::spawn(async move { session.run(&mut rx).await });

        let mut smsc = Smsc::new(peer);
        assert_eq!(smsc.accept_bind().await.sequence_number, u32::MAX);
        state.wait_for(|s| s.is_bound()).await.unwrap();

        let submit = |sequence_number, id: &str| {
            let (reply, response) = oneshot::channel();
            let command = Command::Request {
                frame: Frame::SubmitSm(Box::new(SubmitSm {
                    sequence_number,
                    ..message()
                })),
                expected: CommandId::SubmitSmResp,
                timeout: Duration::from_secs(10),
                correlation: Some(id.to_string()),
                reply,
            };
            (command, response)
        };

        // The generator has wrapped to 0
        let first_sequence = sequence.next();
        assert_eq!(first_sequence, 0);
        let (command, first) = submit(first_sequence, "first");
        commands.send(command).await.unwrap();
        assert_eq!(smsc.recv().await.sequence_number(), 0);

        // A second full wrap lands on the same, still pending, number
        let (command, second) = submit(first_sequence, "second");
        commands.send(command).await.unwrap();
        assert!(matches!(
            second.await.unwrap(),
            Err(SmppError::SequenceCollision(0))
        ));
        assert_eq!(store.get(0).await.unwrap().as_deref(), Some("first"));

        smsc.send(Frame::SubmitSmResp(SubmitSmResponse::new(0, "smsc-0")))
            .await;
        assert!(first.await.unwrap().is_ok());
        match seen.recv().await.unwrap() {
            Seen::SubmitResp(resp, message_id) => {
                assert_eq!(resp.message_id, "smsc-0");
                assert_eq!(message_id.as_deref(), Some("first"));
            }
            other => panic!("expected a submit_sm_resp, got {other:?}"),
        }
    }
}
