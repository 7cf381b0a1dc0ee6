//! Session configuration.
//!
//! Devices are usually provisioned with a small JSON document, so the
//! configuration can be read with [`Config::from_json`] as well as built in
//! code. Missing fields take their defaults.
//!
//! ```rust
//! use libmqtt::network::application::pubsub::Config;
//!
//! let config = Config::from_json(r#"{"max_attempts":5,"retry_interval_ms":2000}"#).unwrap();
//! assert_eq!(config.max_attempts, 5);
//! assert_eq!(config.retry_interval_ms, 2000);
//! assert_eq!(config.command_timeout_ms, 30_000);
//! ```

use serde::{Deserialize, Serialize};

use super::Error;

/// Timing and capacity knobs for a client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How long a blocking request (CONNECT) waits for its answer.
    pub command_timeout_ms: u32,
    /// Delay before an unacknowledged packet is retransmitted.
    pub retry_interval_ms: u32,
    /// Total transmissions of one packet, the first one included.
    pub max_attempts: u8,
    /// How long to wait for PINGRESP after a PINGREQ.
    pub ping_timeout_ms: u32,
    /// Runtime bound on simultaneous in-flight exchanges.
    pub max_in_flight: usize,
    /// Runtime bound on registered MQTT-SN topics.
    pub max_topics: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            command_timeout_ms: 30_000,
            retry_interval_ms: 10_000,
            max_attempts: 3,
            ping_timeout_ms: 30_000,
            max_in_flight: 4,
            max_topics: 8,
        }
    }
}

impl Config {
    /// Parse a JSON document. Unknown fields are ignored.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let (config, _): (Config, usize) =
            serde_json_core::from_str(json).map_err(|_| Error::InvalidConfig)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject zero intervals, attempt counts and capacities.
    pub fn validate(&self) -> Result<(), Error> {
        if self.command_timeout_ms == 0
            || self.retry_interval_ms == 0
            || self.max_attempts == 0
            || self.ping_timeout_ms == 0
            || self.max_in_flight == 0
            || self.max_topics == 0
        {
            return Err(Error::InvalidConfig);
        }
        Ok(())
    }
}
