// ── Runtime connection configuration ──
//
// Describes *how* to reach one bridge. Carries the shared secret and
// connection tuning, never touches disk -- the caller constructs a
// `BridgeConfig` and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::error::Error;

/// Configuration for connecting to a single bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Bridge host: IP address or DNS name.
    pub host: String,
    /// WebSocket port. Bridges listen on plain port 80.
    pub port: u16,
    /// Shared secret provisioned out-of-band by the bridge owner; feeds
    /// the salted login hash together with the bridge-assigned device id.
    pub auth_key: SecretString,
    /// Pause between reconnect attempts after a session failure.
    pub reconnect_delay: Duration,
}

impl BridgeConfig {
    pub fn new(host: impl Into<String>, auth_key: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 80,
            auth_key: SecretString::from(auth_key.into()),
            reconnect_delay: Duration::from_secs(5),
        }
    }

    pub(crate) fn url(&self) -> Result<Url, Error> {
        Ok(format!("ws://{}:{}/", self.host, self.port).parse()?)
    }
}
