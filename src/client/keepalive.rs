// ABOUTME: SMPP keep-alive implementation for maintaining long-running client connections
// ABOUTME: Provides periodic enquire_link scheduling with a response deadline that declares the link dead

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Configuration for SMPP keep-alive functionality
///
/// Controls the behavior of periodic enquire_link PDUs sent to maintain
/// session health during long-running connections. The keep-alive mechanism
/// helps detect connection failures and ensures the SMPP session remains active.
///
/// # SMPP Keep-Alive Protocol
///
/// According to SMPP v3.4 specification, enquire_link PDUs should be sent
/// periodically during idle periods to verify the connection is still active.
/// The SMSC should respond with enquire_link_resp within a reasonable time.
///
/// # Example
///
/// ```rust
/// use smpp_esme::client::KeepAliveConfig;
/// use std::time::Duration;
///
/// // Default configuration (55s interval, 10s timeout)
/// let config = KeepAliveConfig::default();
///
/// // Custom configuration
/// let config = KeepAliveConfig::new(Duration::from_secs(60))
///     .with_timeout(Duration::from_secs(15));
///
/// // Disabled keep-alive
/// let config = KeepAliveConfig::disabled();
/// assert!(!config.enabled);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct KeepAliveConfig {
    /// Interval between enquire_link PDUs (default: 55 seconds)
    ///
    /// This determines how often keep-alive pings are sent once the session
    /// is bound. Shorter intervals provide faster failure detection but
    /// generate more network traffic.
    pub interval: Duration,

    /// Timeout for enquire_link responses (default: 10 seconds)
    ///
    /// Maximum time to wait for an enquire_link_resp after sending enquire_link.
    /// If no response is received within this time the connection is
    /// considered dead and is closed.
    pub timeout: Duration,

    /// Whether keep-alive is enabled (default: true)
    ///
    /// When false, no enquire_link PDUs will be sent automatically.
    pub enabled: bool,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(55),
            timeout: Duration::from_secs(10),
            enabled: true,
        }
    }
}

impl KeepAliveConfig {
    /// Create a new keep-alive configuration with custom interval
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Set the timeout for enquire_link responses
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create a disabled keep-alive configuration
    ///
    /// When disabled, no automatic enquire_link PDUs will be sent and the
    /// link is never declared dead by the keep-alive monitor.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

/// Status information about keep-alive state
///
/// Provides visibility into the current health and statistics of the
/// keep-alive mechanism.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeepAliveStatus {
    /// Whether keep-alive is currently running
    ///
    /// True between `start` and `stop` when keep-alive is enabled.
    pub running: bool,

    /// Whether an enquire_link is waiting for its response
    pub outstanding: bool,

    /// Total enquire_link PDUs sent
    pub total_pings: u32,

    /// Total enquire_link_resp PDUs received
    ///
    /// The success rate is `total_pongs / total_pings`.
    pub total_pongs: u32,
}

/// What the session should do after polling the keep-alive timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepAliveAction {
    /// Nothing is due yet
    Idle,
    /// Send an enquire_link and report it with `on_ping_sent`
    SendEnquireLink,
    /// The outstanding enquire_link was not answered in time
    Expired,
}

/// Schedules enquire_link PDUs for one SMPP session
///
/// The manager does not own a timer task. The session asks it for the next
/// instant it needs to wake up at, sleeps until then alongside its other
/// work, and calls `poll`. This keeps all keep-alive state on the session's
/// own task, so tearing the session down also tears down the timer.
///
/// # Integration Pattern
///
/// 1. Session calls `start()` when the bind succeeds
/// 2. Session sleeps until `next_wakeup()` and then calls `poll()`
/// 3. On `SendEnquireLink`, it sends the PDU and calls `on_ping_sent()`
/// 4. On `enquire_link_resp` it calls `on_pong()`; on any other response it
///    calls `on_inbound_response()`
/// 5. On `Expired`, it closes the connection
///
/// # Example
///
/// ```rust
/// use smpp_esme::client::{KeepAliveAction, KeepAliveConfig, KeepAliveManager};
/// use std::time::Duration;
/// use tokio::time::Instant;
///
/// let mut manager = KeepAliveManager::new(KeepAliveConfig::new(Duration::from_secs(30)));
/// let now = Instant::now();
/// manager.start(now);
///
/// let due = manager.next_wakeup().unwrap();
/// assert_eq!(manager.poll(due), KeepAliveAction::SendEnquireLink);
/// manager.on_ping_sent(7, due);
/// assert!(manager.on_pong(7));
/// ```
#[derive(Debug)]
pub struct KeepAliveManager {
    /// Configuration for keep-alive behavior
    config: KeepAliveConfig,

    running: bool,

    /// When the next enquire_link is due
    next_ping: Option<Instant>,

    /// Sequence number and response deadline of the unanswered enquire_link
    outstanding: Option<(u32, Instant)>,

    total_pings: u32,
    total_pongs: u32,
}

impl KeepAliveManager {
    /// Create a new keep-alive manager with the specified configuration
    pub fn new(config: KeepAliveConfig) -> Self {
        Self {
            config,
            running: false,
            next_ping: None,
            outstanding: None,
            total_pings: 0,
            total_pongs: 0,
        }
    }

    /// Begin scheduling enquire_link PDUs, the first one an interval from
    /// `now`. Does nothing when keep-alive is disabled.
    pub fn start(&mut self, now: Instant) {
        if !self.config.enabled {
            debug!("keep-alive disabled");
            return;
        }
        self.running = true;
        self.next_ping = Some(now + self.config.interval);
        self.outstanding = None;
        debug!(interval = ?self.config.interval, timeout = ?self.config.timeout, "keep-alive started");
    }

    /// Stop scheduling and forget any outstanding enquire_link.
    pub fn stop(&mut self) {
        if self.running {
            debug!("keep-alive stopped");
        }
        self.running = false;
        self.next_ping = None;
        self.outstanding = None;
    }

    /// The earliest instant at which `poll` has something to do.
    pub fn next_wakeup(&self) -> Option<Instant> {
        if !self.running {
            return None;
        }
        match (self.next_ping, self.outstanding) {
            (Some(ping), Some((_, deadline))) => Some(ping.min(deadline)),
            (ping, outstanding) => ping.or(outstanding.map(|(_, deadline)| deadline)),
        }
    }

    /// Advance the timer to `now`.
    ///
    /// A new enquire_link is only requested when the previous one has been
    /// answered. An unanswered one past its deadline expires the link.
    pub fn poll(&mut self, now: Instant) -> KeepAliveAction {
        if !self.running {
            return KeepAliveAction::Idle;
        }

        if let Some((sequence_number, deadline)) = self.outstanding {
            if now >= deadline {
                warn!(sequence_number, "enquire_link not answered in time");
                return KeepAliveAction::Expired;
            }
        }

        match self.next_ping {
            Some(due) if now >= due => {
                self.next_ping = Some(now + self.config.interval);
                if self.outstanding.is_none() {
                    KeepAliveAction::SendEnquireLink
                } else {
                    debug!("previous enquire_link still outstanding, skipping");
                    KeepAliveAction::Idle
                }
            }
            _ => KeepAliveAction::Idle,
        }
    }

    /// Record that an enquire_link was sent
    pub fn on_ping_sent(&mut self, sequence_number: u32, now: Instant) {
        self.outstanding = Some((sequence_number, now + self.config.timeout));
        self.total_pings += 1;
        debug!(sequence_number, total = self.total_pings, "enquire_link sent");
    }

    /// Record an enquire_link_resp. Any response proves the link is alive,
    /// so the outstanding deadline is cleared either way; the return value
    /// tells whether it answered the enquire_link we are waiting on.
    pub fn on_pong(&mut self, sequence_number: u32) -> bool {
        let matched = matches!(self.outstanding, Some((seq, _)) if seq == sequence_number);
        self.outstanding = None;
        if matched {
            self.total_pongs += 1;
            debug!(sequence_number, total = self.total_pongs, "enquire_link_resp received");
        } else {
            debug!(sequence_number, "enquire_link_resp for no outstanding enquire_link");
        }
        matched
    }

    /// Record some other response from the SMSC, which also proves liveness.
    pub fn on_inbound_response(&mut self) {
        if self.outstanding.take().is_some() {
            debug!("inbound response cleared enquire_link deadline");
        }
    }

    /// Get current keep-alive status
    pub fn status(&self) -> KeepAliveStatus {
        KeepAliveStatus {
            running: self.running,
            outstanding: self.outstanding.is_some(),
            total_pings: self.total_pings,
            total_pongs: self.total_pongs,
        }
    }
}
