//! # Connectivity Probe
//!
//! Best-effort, point-in-time check of remote reachability: a TCP connect
//! to the remote database host with a short timeout.
//!
//! The result is an optimization, never a guarantee. The network can drop
//! between the check and the write that follows it, so every remote call
//! site still handles its own failure; the probe only saves the cost of a
//! doomed connection attempt when the device is clearly offline.

use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;
use url::Url;

use crate::config::{MirrorMode, SyncConfig};
use crate::error::{SyncError, SyncResult};

const DEFAULT_POSTGRES_PORT: u16 = 5432;

/// Point-in-time reachability check of the remote store host.
#[derive(Debug, Clone)]
pub struct ConnectivityProbe {
    target: Option<(String, u16)>,
    timeout: Duration,
    forced_offline: bool,
}

impl ConnectivityProbe {
    /// Builds a probe from the sync configuration.
    ///
    /// With no remote URL, or in `Offline` mode, the probe always reports
    /// unreachable without touching the network.
    pub fn from_config(config: &SyncConfig) -> SyncResult<Self> {
        let forced_offline = config.remote.mode == MirrorMode::Offline;

        let target = match config.remote_url() {
            Some(raw) => {
                let parsed = Url::parse(raw)?;
                let host = parsed
                    .host_str()
                    .ok_or_else(|| {
                        SyncError::InvalidUrl(format!("Remote URL has no host: {raw}"))
                    })?
                    .to_string();
                let port = parsed.port().unwrap_or(DEFAULT_POSTGRES_PORT);
                Some((host, port))
            }
            None => None,
        };

        Ok(ConnectivityProbe {
            target,
            timeout: Duration::from_millis(config.remote.probe_timeout_ms),
            forced_offline,
        })
    }

    /// Probe with an explicit target (tests, diagnostics).
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        ConnectivityProbe {
            target: Some((host.into(), port)),
            timeout,
            forced_offline: false,
        }
    }

    /// Checks reachability right now. Best effort: a `true` can already be
    /// stale by the time the caller acts on it.
    pub async fn is_online(&self) -> bool {
        if self.forced_offline {
            debug!("Probe short-circuited: mirror mode is offline");
            return false;
        }

        let Some((host, port)) = &self.target else {
            debug!("Probe short-circuited: no remote configured");
            return false;
        };

        let attempt = TcpStream::connect((host.as_str(), *port));
        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(host = %host, port, error = %e, "Probe: remote unreachable");
                false
            }
            Err(_) => {
                debug!(host = %host, port, "Probe: timed out");
                false
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;

    #[tokio::test]
    async fn test_offline_mode_short_circuits() {
        let mut config = SyncConfig::default();
        config.remote.url = Some("postgres://pos@db.example.com/ledger".to_string());
        config.remote.mode = MirrorMode::Offline;

        let probe = ConnectivityProbe::from_config(&config).unwrap();
        assert!(!probe.is_online().await);
    }

    #[tokio::test]
    async fn test_missing_url_reports_offline() {
        let probe = ConnectivityProbe::from_config(&SyncConfig::default()).unwrap();
        assert!(!probe.is_online().await);
    }

    #[tokio::test]
    async fn test_unreachable_port_reports_offline() {
        // port 1 on loopback: connection refused immediately
        let probe =
            ConnectivityProbe::new("127.0.0.1", 1, Duration::from_millis(500));
        assert!(!probe.is_online().await);
    }

    #[test]
    fn test_target_parsed_from_url() {
        let mut config = SyncConfig::default();
        config.remote.url = Some("postgres://pos:pw@db.example.com:6432/ledger".to_string());

        let probe = ConnectivityProbe::from_config(&config).unwrap();
        assert_eq!(
            probe.target,
            Some(("db.example.com".to_string(), 6432))
        );
    }
}
