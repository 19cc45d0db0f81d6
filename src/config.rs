//! Configuration types for bulk-mailer

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Path of the streaming send endpoint, relative to [`Config::api_base_url`]
pub const SEND_ENDPOINT: &str = "send-emails-stream";

/// Environment variable overriding [`Config::api_base_url`]
pub const ENV_API_URL: &str = "BULK_MAILER_API_URL";

/// Environment variable overriding [`Config::max_attachment_bytes`]
pub const ENV_MAX_ATTACHMENT_BYTES: &str = "BULK_MAILER_MAX_ATTACHMENT_BYTES";

/// Main configuration for [`BulkSender`](crate::BulkSender)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the mail API (default: "http://localhost:5000/api")
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Largest attachment accepted before submission (default: 4.5 MiB)
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: u64,

    /// Smallest allowed delay between messages in seconds (default: 1)
    #[serde(default = "default_min_delay")]
    pub min_delay_secs: u32,

    /// Largest allowed delay between messages in seconds (default: 30)
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: u32,

    /// Delay used by a fresh composer draft (default: 5)
    #[serde(default = "default_delay")]
    pub default_delay_secs: u32,

    /// Subject used by a fresh composer draft
    #[serde(default = "default_subject")]
    pub default_subject: String,

    /// TCP connect timeout for the send request (default: 30s)
    ///
    /// Only the connect phase is bounded. Reading the progress stream has no
    /// timeout of its own since a job may legitimately run for a long time.
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// User-Agent header sent with the request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Capacity of the session event broadcast channel (default: 1024)
    #[serde(default = "default_event_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            max_attachment_bytes: default_max_attachment_bytes(),
            min_delay_secs: default_min_delay(),
            max_delay_secs: default_max_delay(),
            default_delay_secs: default_delay(),
            default_subject: default_subject(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
            event_channel_capacity: default_event_capacity(),
        }
    }
}

impl Config {
    /// Default configuration with environment overrides applied
    ///
    /// Reads [`ENV_API_URL`] and [`ENV_MAX_ATTACHMENT_BYTES`]. Unset variables keep
    /// their defaults; a set but unparseable limit is a configuration error.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var(ENV_API_URL) {
            config.api_base_url = url;
        }

        if let Ok(raw) = std::env::var(ENV_MAX_ATTACHMENT_BYTES) {
            config.max_attachment_bytes = raw.trim().parse().map_err(|e| Error::Config {
                message: format!("invalid {ENV_MAX_ATTACHMENT_BYTES} value {raw:?}: {e}"),
                key: Some("max_attachment_bytes".to_string()),
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the sender cannot work with
    pub fn validate(&self) -> Result<()> {
        self.send_endpoint()?;

        if self.max_attachment_bytes == 0 {
            return Err(Error::Config {
                message: "max_attachment_bytes must be greater than zero".to_string(),
                key: Some("max_attachment_bytes".to_string()),
            });
        }

        if self.min_delay_secs > self.max_delay_secs {
            return Err(Error::Config {
                message: format!(
                    "min_delay_secs ({}) is greater than max_delay_secs ({})",
                    self.min_delay_secs, self.max_delay_secs
                ),
                key: Some("min_delay_secs".to_string()),
            });
        }

        if !(self.min_delay_secs..=self.max_delay_secs).contains(&self.default_delay_secs) {
            return Err(Error::Config {
                message: format!(
                    "default_delay_secs ({}) is outside {}..={}",
                    self.default_delay_secs, self.min_delay_secs, self.max_delay_secs
                ),
                key: Some("default_delay_secs".to_string()),
            });
        }

        if self.event_channel_capacity == 0 {
            return Err(Error::Config {
                message: "event_channel_capacity must be greater than zero".to_string(),
                key: Some("event_channel_capacity".to_string()),
            });
        }

        Ok(())
    }

    /// Full URL of the streaming send endpoint
    pub fn send_endpoint(&self) -> Result<url::Url> {
        let base = self.api_base_url.trim();
        if base.is_empty() {
            return Err(Error::Config {
                message: "api_base_url must not be empty".to_string(),
                key: Some("api_base_url".to_string()),
            });
        }

        // Joining against a base without a trailing slash would replace its last segment
        let base = format!("{}/", base.trim_end_matches('/'));
        url::Url::parse(&base)
            .and_then(|base| base.join(SEND_ENDPOINT))
            .map_err(|e| Error::Config {
                message: format!("invalid api_base_url {:?}: {e}", self.api_base_url),
                key: Some("api_base_url".to_string()),
            })
    }
}

fn default_api_base_url() -> String {
    "http://localhost:5000/api".into()
}

fn default_max_attachment_bytes() -> u64 {
    // 4.5 MiB
    9 * 1024 * 1024 / 2
}

fn default_min_delay() -> u32 {
    1
}

fn default_max_delay() -> u32 {
    30
}

fn default_delay() -> u32 {
    5
}

fn default_subject() -> String {
    "Important Company Update".into()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    concat!("bulk-mailer/", env!("CARGO_PKG_VERSION")).into()
}

fn default_event_capacity() -> usize {
    1024
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
