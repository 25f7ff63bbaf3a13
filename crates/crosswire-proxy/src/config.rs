//! Proxy configuration.

use crate::origin::Origin;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Whether the origin's `Server` header is suppressed by default.
pub const DEFAULT_CLOAK_SERVER_HEADER: bool = true;

/// Per-handler proxy configuration.
///
/// This is the in-process form of the `proxy.reverse "<origin>"` and
/// `proxy.cloak <bool>` directives; the configuration file they live in
/// is parsed elsewhere and deserialized into this.
///
/// Timeouts are per phase and optional; `None` disables the deadline for
/// that phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    origin: Origin,
    cloak_server_header: bool,
    connect_timeout_secs: Option<u64>,
    read_timeout_secs: Option<u64>,
    write_timeout_secs: Option<u64>,
}

impl ProxyConfig {
    /// Creates a configuration for the given origin with cloaking on and
    /// no deadlines.
    #[must_use]
    pub fn new(origin: Origin) -> Self {
        Self {
            origin,
            cloak_server_header: DEFAULT_CLOAK_SERVER_HEADER,
            connect_timeout_secs: None,
            read_timeout_secs: None,
            write_timeout_secs: None,
        }
    }

    /// Creates a configuration from an origin directive string, as in
    /// `proxy.reverse "127.0.0.1:3000"`.
    #[must_use]
    pub fn reverse(origin: &str) -> Self {
        Self::new(Origin::parse(origin))
    }

    /// Enables or disables `Server` header cloaking.
    #[must_use]
    pub fn with_cloak(mut self, enabled: bool) -> Self {
        self.cloak_server_header = enabled;
        self
    }

    /// Sets the connect-phase deadline.
    #[must_use]
    pub fn with_connect_timeout_secs(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = Some(secs);
        self
    }

    /// Sets the read-phase deadline.
    #[must_use]
    pub fn with_read_timeout_secs(mut self, secs: u64) -> Self {
        self.read_timeout_secs = Some(secs);
        self
    }

    /// Sets the write-phase deadline.
    #[must_use]
    pub fn with_write_timeout_secs(mut self, secs: u64) -> Self {
        self.write_timeout_secs = Some(secs);
        self
    }

    /// The configured origin.
    #[must_use]
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Whether the origin's `Server` header is suppressed.
    #[must_use]
    pub fn cloak_server_header(&self) -> bool {
        self.cloak_server_header
    }

    /// Deadline for the connect phase, if configured.
    ///
    /// The connection arms it when the phase begins and disarms it when
    /// the phase completes; a fired deadline terminates the connection.
    #[must_use]
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    /// Deadline for the read phase, if configured.
    #[must_use]
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_secs.map(Duration::from_secs)
    }

    /// Deadline for the write phase, if configured.
    #[must_use]
    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_directive_parses_origin() {
        let config = ProxyConfig::reverse("127.0.0.1:3000");
        assert_eq!(config.origin().to_string(), "127.0.0.1:3000");
        assert!(config.cloak_server_header());
    }

    #[test]
    fn builder_overrides() {
        let config = ProxyConfig::reverse("unix:/run/app.sock")
            .with_cloak(false)
            .with_connect_timeout_secs(5)
            .with_read_timeout_secs(30)
            .with_write_timeout_secs(30);

        assert!(config.origin().is_unix());
        assert!(!config.cloak_server_header());
        assert_eq!(config.connect_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.read_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.write_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn deadlines_default_off() {
        let config = ProxyConfig::reverse("backend");
        assert!(config.connect_timeout().is_none());
        assert!(config.read_timeout().is_none());
        assert!(config.write_timeout().is_none());
    }
}
