use crate::error::{PushError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;
use url::Url;

/// Fixed delay between a transport failure and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

const ENV_URL: &str = "EV_PUSH_URL";
const ENV_RECONNECT_DELAY_MS: &str = "EV_PUSH_RECONNECT_DELAY_MS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub url: String, // ws:// or wss:// endpoint of the push feed
    #[serde(
        rename = "reconnect_delay_ms",
        default = "default_reconnect_delay",
        serialize_with = "serialize_millis",
        deserialize_with = "deserialize_millis"
    )]
    pub reconnect_delay: Duration,
}

impl ChannelConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Builds a config from `EV_PUSH_URL` and the optional `EV_PUSH_RECONNECT_DELAY_MS`.
    pub fn from_env() -> Result<Self> {
        let url = std::env::var(ENV_URL)
            .map_err(|_| PushError::ConfigError(format!("{} environment variable not set", ENV_URL)))?;
        let mut config = Self::new(url);
        if let Ok(raw) = std::env::var(ENV_RECONNECT_DELAY_MS) {
            let millis = raw.trim().parse::<u64>().map_err(|e| {
                PushError::ConfigError(format!(
                    "{} must be an integer number of milliseconds, got '{}': {}",
                    ENV_RECONNECT_DELAY_MS, raw, e
                ))
            })?;
            config.reconnect_delay = Duration::from_millis(millis);
        }
        Ok(config)
    }

    /// Parses the endpoint, accepting only WebSocket schemes.
    pub fn endpoint(&self) -> Result<Url> {
        let url = Url::parse(&self.url)?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(PushError::ConfigError(format!(
                "Unsupported URL scheme '{}' for push channel (expected ws or wss)",
                other
            ))),
        }
    }
}

fn default_reconnect_delay() -> Duration {
    DEFAULT_RECONNECT_DELAY
}

fn serialize_millis<S: Serializer>(delay: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(delay.as_millis() as u64)
}

fn deserialize_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}
