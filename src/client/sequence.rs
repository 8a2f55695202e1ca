// ABOUTME: Sequence number generation for outbound SMPP requests
// ABOUTME: Produces strictly increasing numbers modulo 2^32 starting at zero

use std::sync::atomic::{AtomicU32, Ordering};

/// Hands out sequence numbers for outbound requests.
///
/// Numbers start at 0 and increase by one per call, wrapping from
/// `u32::MAX` back to 0. The generator is shared between the client handle
/// and the session task, so it outlives any single connection; a reconnect
/// keeps counting from where the previous connection stopped.
#[derive(Debug, Default)]
pub struct SequenceGenerator {
    next: AtomicU32,
}

impl SequenceGenerator {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(first: u32) -> Self {
        Self {
            next: AtomicU32::new(first),
        }
    }

    /// Returns the next sequence number.
    pub fn next(&self) -> u32 {
        // fetch_add wraps on overflow
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// The number the next call to `next` will return.
    pub fn peek(&self) -> u32 {
        self.next.load(Ordering::Relaxed)
    }
}
