// ABOUTME: Inbound PDU classification and processor invocation for an ESME session
// ABOUTME: Routes each decoded frame by command and runs application processors on their own tasks

use crate::client::state::SessionState;
use crate::client::traits::{CorrelationStore, DeliveryReportProcessor, ShortMessageProcessor};
use crate::codec::Frame;
use crate::datatypes::{
    BindTransceiverResponse, CommandStatus, DeliverSm, DeliverSmResponse, EnquireLinkResponse,
    GenericNack, SubmitSmResponse,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// What the session should do with an inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Feed the bind outcome to the state machine
    Bind(BindTransceiverResponse),
    /// Complete a pending request
    Resolve(Frame),
    /// Hand to a processor and acknowledge
    Deliver(Box<DeliverSm>),
    /// Keep-alive answer
    EnquireLinkResponse(u32),
    /// The SMSC is unbinding
    PeerUnbind(u32),
    GenericNack(GenericNack),
    /// Answer immediately with this frame; nothing else happens
    Reply(Frame),
    /// Log and drop
    Anomaly {
        command_id: u32,
        sequence_number: u32,
        reason: &'static str,
    },
}

fn anomaly(frame: &Frame, reason: &'static str) -> Route {
    Route::Anomaly {
        command_id: frame.command_id(),
        sequence_number: frame.sequence_number(),
        reason,
    }
}

/// Classifies `frame` for a session in `state`.
///
/// Every PDU kind is listed, so adding a `Frame` variant is a compile error
/// here until it is routed.
pub fn route(state: SessionState, frame: Frame) -> Route {
    let sequence_number = frame.sequence_number();
    match frame {
        Frame::BindTransceiverResp(resp) => {
            if state == SessionState::Open {
                Route::Bind(resp)
            } else {
                anomaly(&Frame::BindTransceiverResp(resp), "bind response outside OPEN")
            }
        }

        Frame::SubmitSmResp(_) | Frame::UnbindResp(_) => Route::Resolve(frame),

        Frame::DeliverSm(pdu) => {
            if state.is_bound() {
                Route::Deliver(pdu)
            } else {
                Route::Reply(Frame::DeliverSmResp(DeliverSmResponse::error(
                    sequence_number,
                    CommandStatus::IncorrectBindStatus,
                )))
            }
        }

        Frame::EnquireLink(_) => {
            Route::Reply(Frame::EnquireLinkResp(EnquireLinkResponse::new(sequence_number)))
        }
        Frame::EnquireLinkResp(_) => Route::EnquireLinkResponse(sequence_number),

        Frame::Unbind(_) => {
            if state == SessionState::Closed {
                anomaly(&frame, "unbind on a closed session")
            } else {
                Route::PeerUnbind(sequence_number)
            }
        }

        Frame::GenericNack(nack) => Route::GenericNack(nack),

        // Requests an ESME never accepts from an SMSC
        Frame::BindTransceiver(_) | Frame::SubmitSm(_) => {
            Route::Reply(Frame::GenericNack(GenericNack::invalid_command_id(sequence_number)))
        }

        Frame::DeliverSmResp(_) => anomaly(&frame, "deliver_sm_resp sent to an ESME"),

        Frame::Unknown { header, .. } => {
            if header.is_response() {
                anomaly(&frame, "unsupported response")
            } else {
                Route::Reply(Frame::GenericNack(GenericNack::invalid_command_id(sequence_number)))
            }
        }
    }
}

/// Acknowledgements produced by processor tasks, written by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    DeliverSm {
        sequence_number: u32,
        status: CommandStatus,
    },
}

/// Runs application processors for one session.
///
/// Each call spawns a task, so the session loop keeps reading while a
/// processor waits on its own I/O. Acknowledgements come back over `acks`.
pub struct Dispatcher<P, D, K> {
    sm: Arc<P>,
    dr: Arc<D>,
    store: Arc<K>,
    acks: mpsc::UnboundedSender<Ack>,
}

impl<P, D, K> Dispatcher<P, D, K>
where
    P: ShortMessageProcessor,
    D: DeliveryReportProcessor,
    K: CorrelationStore,
{
    pub fn new(sm: Arc<P>, dr: Arc<D>, store: Arc<K>, acks: mpsc::UnboundedSender<Ack>) -> Self {
        Self {
            sm,
            dr,
            store,
            acks,
        }
    }

    /// Hands a deliver_sm to the delivery-report or short-message processor.
    /// Exactly one `Ack` is sent for it, whatever the processor does.
    pub fn deliver_sm(&self, pdu: Box<DeliverSm>) {
        let sequence_number = pdu.sequence_number;
        let sm = Arc::clone(&self.sm);
        let dr = Arc::clone(&self.dr);
        let acks = self.acks.clone();

        tokio::spawn(async move {
            let is_receipt = pdu.is_delivery_receipt();
            // The inner task turns a processor panic into a JoinError
            let outcome = tokio::spawn(async move {
                if is_receipt {
                    let receipt = pdu.delivery_receipt();
                    dr.handle_delivery_report(*pdu, receipt).await
                } else {
                    sm.handle_deliver_sm(*pdu).await
                }
            })
            .await;

            let status = match outcome {
                Ok(Ok(status)) => status,
                Ok(Err(e)) => {
                    error!(sequence_number, is_receipt, error = %e, "deliver_sm processor failed");
                    CommandStatus::Ok
                }
                Err(e) => {
                    error!(sequence_number, is_receipt, error = %e, "deliver_sm processor panicked");
                    CommandStatus::Ok
                }
            };

            if acks
                .send(Ack::DeliverSm {
                    sequence_number,
                    status,
                })
                .is_err()
            {
                warn!(sequence_number, "session gone before deliver_sm could be acknowledged");
            }
        });
    }

    /// Takes the application id for a resolved submit_sm_resp out of the
    /// store and passes both to the short-message processor.
    pub fn submit_sm_resp(&self, response: SubmitSmResponse) {
        let sm = Arc::clone(&self.sm);
        let store = Arc::clone(&self.store);

        tokio::spawn(async move {
            let sequence_number = response.sequence_number;
            let message_id = match store.remove(sequence_number).await {
                Ok(id) => id,
                Err(e) => {
                    warn!(sequence_number, error = %e, "correlation store lookup failed");
                    None
                }
            };
            if message_id.is_none() {
                debug!(sequence_number, "no message id stored for submit_sm_resp");
            }

            let outcome = tokio::spawn(async move {
                sm.handle_submit_sm_resp(response, message_id).await
            })
            .await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(sequence_number, error = %e, "submit_sm_resp processor failed")
                }
                Err(e) => {
                    error!(sequence_number, error = %e, "submit_sm_resp processor panicked")
                }
            }
        });
    }
}
