// ABOUTME: Outbound request tracking for one SMPP connection
// ABOUTME: Correlates responses to pending requests by sequence number and enforces per-request deadlines

use crate::client::error::{SmppError, SmppResult};
use crate::codec::Frame;
use crate::datatypes::{CommandId, CommandStatus, RESPONSE_BIT};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Completion handle for a request. Receives the response frame, or the
/// error that ended the wait.
pub type Completion = oneshot::Sender<SmppResult<Frame>>;

#[derive(Debug)]
pub struct PendingRequest {
    pub sequence_number: u32,
    /// Response command the request expects
    pub expected: CommandId,
    pub issued_at: Instant,
    pub deadline: Instant,
    completion: Completion,
}

/// Outcome of offering an inbound response to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The response completed a pending request
    Resolved,
    /// Nothing was waiting on that sequence number
    Unmatched,
    /// A request was waiting but for a different response command. The
    /// request was failed with `UnexpectedPdu`.
    UnexpectedCommand { expected: CommandId },
}

/// Pending requests of one connection, keyed by sequence number.
///
/// Owned by the session task, so no locking is involved. A response resolves
/// at most one request: the entry is removed the moment it is completed, so
/// a duplicate response finds nothing.
#[derive(Debug, Default)]
pub struct OutboundTracker {
    pending: HashMap<u32, PendingRequest>,
}

impl OutboundTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a request that was just written to the wire.
    ///
    /// If the sequence number is already in flight the new request is failed
    /// with `SequenceCollision` through its own completion and the existing
    /// one is left alone.
    pub fn register(
        &mut self,
        sequence_number: u32,
        expected: CommandId,
        now: Instant,
        timeout: Duration,
        completion: Completion,
    ) -> SmppResult<()> {
        if self.pending.contains_key(&sequence_number) {
            warn!(sequence_number, "sequence number already in flight");
            let _ = completion.send(Err(SmppError::SequenceCollision(sequence_number)));
            return Err(SmppError::SequenceCollision(sequence_number));
        }

        self.pending.insert(
            sequence_number,
            PendingRequest {
                sequence_number,
                expected,
                issued_at: now,
                deadline: now + timeout,
                completion,
            },
        );
        Ok(())
    }

    /// Completes the request `frame` answers, if any.
    ///
    /// A generic_nack fails the matching request with `GenericNack` whatever
    /// it expected. Any other PDU of the wrong kind on a pending sequence
    /// number fails it with `UnexpectedPdu`.
    pub fn resolve(&mut self, frame: &Frame) -> Resolution {
        let sequence_number = frame.sequence_number();
        let Some(request) = self.pending.remove(&sequence_number) else {
            return Resolution::Unmatched;
        };

        let (outcome, resolution) = match frame {
            Frame::GenericNack(nack) => (
                Err(SmppError::GenericNack(nack.command_status)),
                Resolution::Resolved,
            ),
            _ if frame.command_id() == request.expected as u32 => {
                (Ok(frame.clone()), Resolution::Resolved)
            }
            _ => (
                Err(SmppError::UnexpectedPdu {
                    expected: format!("{:?}", request.expected),
                    actual: format!("{:#010x}", frame.command_id()),
                }),
                Resolution::UnexpectedCommand {
                    expected: request.expected,
                },
            ),
        };

        debug!(
            sequence_number,
            elapsed = ?request.issued_at.elapsed(),
            ?resolution,
            "request completed"
        );
        // The caller may have stopped waiting; that is not an error here.
        let _ = request.completion.send(outcome);
        resolution
    }

    /// Fails one request. Returns false when it was not pending.
    pub fn fail(&mut self, sequence_number: u32, error: SmppError) -> bool {
        match self.pending.remove(&sequence_number) {
            Some(request) => {
                let _ = request.completion.send(Err(error));
                true
            }
            None => false,
        }
    }

    /// Fails every request whose deadline has passed with `Timeout` and
    /// returns their sequence numbers.
    pub fn expire(&mut self, now: Instant) -> Vec<u32> {
        let expired: Vec<u32> = self
            .pending
            .values()
            .filter(|request| request.deadline <= now)
            .map(|request| request.sequence_number)
            .collect();

        for sequence_number in &expired {
            if let Some(request) = self.pending.remove(sequence_number) {
                debug!(sequence_number, expected = ?request.expected, "request timed out");
                let _ = request.completion.send(Err(SmppError::Timeout));
            }
        }
        expired
    }

    /// Fails every pending request, used on teardown. Returns how many there
    /// were.
    pub fn fail_all(&mut self, error: impl Fn() -> SmppError) -> usize {
        let count = self.pending.len();
        for (_, request) in self.pending.drain() {
            let _ = request.completion.send(Err(error()));
        }
        count
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|request| request.deadline).min()
    }

    pub fn contains(&self, sequence_number: u32) -> bool {
        self.pending.contains_key(&sequence_number)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// The response command id for a request command id.
pub fn response_for(request: CommandId) -> Option<CommandId> {
    CommandId::try_from(request as u32 | RESPONSE_BIT).ok()
}

/// Turns a resolved response into a result for the caller: a non-zero
/// command_status becomes `SmppError::Protocol`.
pub fn check_status(status: CommandStatus) -> SmppResult<()> {
    if status.is_ok() {
        Ok(())
    } else {
        Err(SmppError::Protocol(status))
    }
}
