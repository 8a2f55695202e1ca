// ABOUTME: Reconnection supervisor owning the backoff policy for one ESME client
// ABOUTME: Connects, runs a session to completion and reconnects with capped exponential backoff

use crate::client::config::EsmeConfig;
use crate::client::error::SmppError;
use crate::client::sequence::SequenceGenerator;
use crate::client::session::{Command, Session, SessionEnd};
use crate::client::state::SessionState;
use crate::client::traits::{
    Connector, CorrelationStore, DeliveryReportProcessor, ShortMessageProcessor,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time;
use tracing::{error, info, warn};

/// Exponential backoff with a cap, applied between connection attempts.
///
/// # Example
///
/// ```rust
/// use smpp_esme::client::ReconnectPolicy;
/// use std::time::Duration;
///
/// let policy = ReconnectPolicy::default()
///     .with_initial_delay(Duration::from_millis(500))
///     .with_max_delay(Duration::from_secs(60))
///     .with_max_attempts(10);
/// assert_eq!(policy.factor, 2.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect (default: 1 second)
    pub initial_delay: Duration,
    /// Multiplier applied to each following delay (default: 2.0)
    pub factor: f64,
    /// Upper bound for any single delay (default: 300 seconds)
    pub max_delay: Duration,
    /// Give up after this many consecutive failed attempts (default: never)
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            factor: 2.0,
            max_delay: Duration::from_secs(300),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

/// Backoff state for one supervisor.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: ReconnectPolicy,
    attempts: u32,
    current: Option<Duration>,
}

impl Backoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            current: None,
        }
    }

    /// The delay before the next attempt, or `None` once `max_attempts` is
    /// used up.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max) = self.policy.max_attempts {
            if self.attempts >= max {
                return None;
            }
        }

        let delay = match self.current {
            None => self.policy.initial_delay,
            Some(previous) => {
                Duration::try_from_secs_f64(previous.as_secs_f64() * self.policy.factor)
                    .unwrap_or(self.policy.max_delay)
            }
        }
        .min(self.policy.max_delay);

        self.current = Some(delay);
        self.attempts += 1;
        Some(delay)
    }

    /// Back to the initial delay, after a session made it to BOUND.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.current = None;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Keeps one ESME connected and bound.
///
/// Each session gets a fresh connection, tracker and keep-alive state;
/// nothing but the sequence generator carries over between connections.
pub struct Supervisor<C, P, D, K> {
    config: Arc<EsmeConfig>,
    connector: C,
    sm: Arc<P>,
    dr: Arc<D>,
    store: Arc<K>,
    sequence: Arc<SequenceGenerator>,
    state_tx: Arc<watch::Sender<SessionState>>,
    backoff: Backoff,
}

impl<C, P, D, K> Supervisor<C, P, D, K>
where
    C: Connector,
    P: ShortMessageProcessor,
    D: DeliveryReportProcessor,
    K: CorrelationStore,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<EsmeConfig>,
        connector: C,
        sm: Arc<P>,
        dr: Arc<D>,
        store: Arc<K>,
        sequence: Arc<SequenceGenerator>,
        state_tx: Arc<watch::Sender<SessionState>>,
    ) -> Self {
        let backoff = Backoff::new(config.reconnect.clone());
        Self {
            config,
            connector,
            sm,
            dr,
            store,
            sequence,
            state_tx,
            backoff,
        }
    }

    /// Runs until the operator unbinds, the client handle is dropped, or the
    /// reconnect policy gives up.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let address = self.config.address();
        loop {
            info!(%address, attempt = self.backoff.attempts() + 1, "connecting to SMSC");
            let connect = time::timeout(self.config.bind_timeout, self.connector.connect());

            let stream = match while_disconnected(&mut commands, connect).await {
                None => {
                    info!("stopped while connecting");
                    return;
                }
                Some(Ok(Ok(stream))) => stream,
                Some(Ok(Err(e))) => {
                    warn!(%address, error = %e, "connect failed");
                    if !self.wait_backoff(&mut commands).await {
                        return;
                    }
                    continue;
                }
                Some(Err(_)) => {
                    warn!(%address, timeout = ?self.config.bind_timeout, "connect timed out");
                    if !self.wait_backoff(&mut commands).await {
                        return;
                    }
                    continue;
                }
            };

            let session = Session::new(
                stream,
                Arc::clone(&self.config),
                Arc::clone(&self.sequence),
                Arc::clone(&self.state_tx),
                Arc::clone(&self.sm),
                Arc::clone(&self.dr),
                Arc::clone(&self.store),
            );
            let summary = session.run(&mut commands).await;
            self.state_tx.send_replace(SessionState::Closed);

            if summary.reached_bound {
                self.backoff.reset();
            }
            match summary.end {
                SessionEnd::Shutdown => {
                    info!("session shut down");
                    return;
                }
                end => warn!(?end, "session ended, reconnecting"),
            }

            if !self.wait_backoff(&mut commands).await {
                return;
            }
        }
    }

    /// Sleeps out the next backoff delay. False means stop.
    async fn wait_backoff(&mut self, commands: &mut mpsc::Receiver<Command>) -> bool {
        let Some(delay) = self.backoff.next_delay() else {
            error!(attempts = self.backoff.attempts(), "giving up on reconnecting");
            return false;
        };
        info!(?delay, "waiting before reconnect");
        while_disconnected(commands, time::sleep(delay))
            .await
            .is_some()
    }
}

/// Drives `future` while no session is live, refusing requests in the
/// meantime. Returns `None` if the client asked to stop first.
async fn while_disconnected<F: Future>(
    commands: &mut mpsc::Receiver<Command>,
    future: F,
) -> Option<F::Output> {
    tokio::pin!(future);
    loop {
        tokio::select! {
            biased;
            output = &mut future => return Some(output),
            command = commands.recv() => match command {
                Some(Command::Request { reply, .. }) => {
                    let _ = reply.send(Err(SmppError::InvalidState(SessionState::Closed)));
                }
                Some(Command::Unbind { reply }) => {
                    let _ = reply.send(());
                    return None;
                }
                None => return None,
            },
        }
    }
}
