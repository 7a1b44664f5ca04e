use std::time::Duration;

use url::Url;

use crate::Result;
use crate::error::Error;

/// Path of the gateway's event socket.
pub const DEFAULT_EVENTS_PATH: &str = "/events";

/// Configuration for WebSocket client behavior.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct Config {
    /// Use `wss://` instead of `ws://`
    pub secure: bool,
    /// Path appended to the host when building the socket address
    pub path: String,
    /// Upper bound for [`crate::gateway::Client::ensure_open`].
    /// `None` waits until the connection opens or is torn down.
    pub open_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            secure: false,
            path: DEFAULT_EVENTS_PATH.to_owned(),
            open_timeout: None,
        }
    }
}

impl Config {
    /// Build the socket address for `host`, e.g. `ws://localhost:8080/events`.
    ///
    /// `host` may carry a port but no scheme or path.
    pub fn endpoint(&self, host: &str) -> Result<String> {
        let host = host.trim();
        if host.is_empty() {
            return Err(Error::validation("gateway host must not be empty"));
        }
        if host.contains("://") || host.contains('/') {
            return Err(Error::validation(format!(
                "gateway host `{host}` must not contain a scheme or path"
            )));
        }

        let scheme = if self.secure { "wss" } else { "ws" };
        let path = self.path.trim_start_matches('/');
        let address = format!("{scheme}://{host}/{path}");

        // Validate only; the address is used verbatim so it matches what listeners see.
        Url::parse(&address)?;

        Ok(address)
    }
}
