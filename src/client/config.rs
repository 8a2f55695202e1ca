// ABOUTME: Configuration for an ESME transceiver session
// ABOUTME: Collects SMSC address, bind credentials, timers and the reconnect policy with validation

use crate::client::error::{SmppError, SmppResult};
use crate::client::keepalive::KeepAliveConfig;
use crate::client::supervisor::ReconnectPolicy;
use crate::client::types::BindCredentials;
use crate::datatypes::{ADDRESS_RANGE_LEN, PASSWORD_LEN, SYSTEM_ID_LEN, SYSTEM_TYPE_LEN};
use std::time::Duration;

/// Everything an `EsmeClient` needs to connect, bind and stay bound.
///
/// # Example
///
/// ```rust
/// use smpp_esme::client::{BindCredentials, EsmeConfig, KeepAliveConfig};
/// use std::time::Duration;
///
/// let config = EsmeConfig::new("smsc.example.com", 2775)
///     .with_credentials(BindCredentials::transceiver("esme", "secret"))
///     .with_bind_timeout(Duration::from_secs(10))
///     .with_keep_alive(KeepAliveConfig::new(Duration::from_secs(30)));
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EsmeConfig {
    pub host: String,
    pub port: u16,
    pub credentials: BindCredentials,
    /// How long to wait for bind_transceiver_resp. Also bounds the TCP
    /// connect.
    pub bind_timeout: Duration,
    pub keep_alive: KeepAliveConfig,
    /// Default deadline for request/response pairs such as submit_sm
    pub request_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for EsmeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 2775,
            credentials: BindCredentials::transceiver("system_id", "password"),
            bind_timeout: Duration::from_secs(30),
            keep_alive: KeepAliveConfig::default(),
            request_timeout: Duration::from_secs(30),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl EsmeConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_credentials(mut self, credentials: BindCredentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_bind_timeout(mut self, bind_timeout: Duration) -> Self {
        self.bind_timeout = bind_timeout;
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: KeepAliveConfig) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// `host:port`, as handed to the TCP connector.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Rejects configurations that could never bind or never time out.
    pub fn validate(&self) -> SmppResult<()> {
        let credentials = &self.credentials;
        check_len("system_id", &credentials.system_id, SYSTEM_ID_LEN)?;
        check_len("password", &credentials.password, PASSWORD_LEN)?;
        check_len("system_type", &credentials.system_type, SYSTEM_TYPE_LEN)?;
        check_len("address_range", &credentials.address_range, ADDRESS_RANGE_LEN)?;

        if self.bind_timeout.is_zero() {
            return Err(invalid("bind_timeout must be non-zero"));
        }
        if self.request_timeout.is_zero() {
            return Err(invalid("request_timeout must be non-zero"));
        }
        if self.keep_alive.enabled
            && (self.keep_alive.interval.is_zero() || self.keep_alive.timeout.is_zero())
        {
            return Err(invalid("keep-alive interval and timeout must be non-zero"));
        }
        if self.reconnect.factor.is_nan() || self.reconnect.factor < 1.0 {
            return Err(invalid("reconnect factor must be at least 1.0"));
        }
        if self.reconnect.initial_delay > self.reconnect.max_delay {
            return Err(invalid("reconnect initial_delay exceeds max_delay"));
        }
        Ok(())
    }
}

// `max_len` counts the NUL terminator, like the PDU field tables.
fn check_len(field: &str, value: &str, max_len: usize) -> SmppResult<()> {
    if value.len() >= max_len {
        return Err(SmppError::InvalidData(format!(
            "{field} is {} octets, maximum is {}",
            value.len(),
            max_len - 1
        )));
    }
    Ok(())
}

fn invalid(reason: &str) -> SmppError {
    SmppError::InvalidData(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = EsmeConfig::default();
        assert_eq!(config.address(), "127.0.0.1:2775");
        assert_eq!(config.bind_timeout, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn long_password_is_rejected() {
        let config = EsmeConfig::default()
            .with_credentials(BindCredentials::transceiver("esme", "ninechars"));
        assert!(matches!(config.validate(), Err(SmppError::InvalidData(_))));
    }

    #[test]
    fn fifteen_octet_system_id_is_allowed() {
        let config = EsmeConfig::default()
            .with_credentials(BindCredentials::transceiver("a".repeat(15), "pw"));
        assert!(config.validate().is_ok());

        let config = EsmeConfig::default()
            .with_credentials(BindCredentials::transceiver("a".repeat(16), "pw"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_keepalive_timeout_is_rejected() {
        let config = EsmeConfig::default()
            .with_keep_alive(KeepAliveConfig::default().with_timeout(Duration::ZERO));
        assert!(config.validate().is_err());

        let config = EsmeConfig::default().with_keep_alive(KeepAliveConfig {
            timeout: Duration::ZERO,
            ..KeepAliveConfig::disabled()
        });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn shrinking_backoff_is_rejected() {
        let config =
            EsmeConfig::default().with_reconnect(ReconnectPolicy::default().with_factor(0.5));
        assert!(config.validate().is_err());
    }
}
