//! Client configuration.
//!
//! `ClientConfig` is plain serde data so a host application can keep it in
//! whatever settings file it already has; missing fields take the defaults.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_CLIENT_NAME: &str = "midisend";
pub const DEFAULT_PORT_NAME: &str = "events-out";
pub const DEFAULT_MAX_EVENTS_PER_PERIOD: usize = 256;

/// Settings for [`Client::open_with`](crate::Client::open_with).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Name the server shows for this client.
    pub name: String,
    /// Name of the MIDI output port.
    pub port_name: String,
    /// Event queue slots. Must be a power of two.
    pub queue_capacity: usize,
    /// Most events the process callback writes in one period.
    pub max_events_per_period: usize,
    /// Fail instead of starting a server when none is running.
    pub no_start_server: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_CLIENT_NAME.to_string(),
            port_name: DEFAULT_PORT_NAME.to_string(),
            queue_capacity: midisend_core::DEFAULT_CAPACITY,
            max_events_per_period: DEFAULT_MAX_EVENTS_PER_PERIOD,
            no_start_server: false,
        }
    }
}

impl ClientConfig {
    /// Defaults with the given client name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder starting from the defaults.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Rejects empty names, a queue capacity that is not a power of two and a
    /// zero period limit.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::InvalidConfig("client name is empty".to_string()));
        }
        if self.port_name.is_empty() {
            return Err(Error::InvalidConfig("port name is empty".to_string()));
        }
        if !self.queue_capacity.is_power_of_two() {
            return Err(Error::InvalidConfig(format!(
                "queue capacity must be a power of two, got {}",
                self.queue_capacity
            )));
        }
        if self.max_events_per_period == 0 {
            return Err(Error::InvalidConfig(
                "max events per period must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Chained setters over a [`ClientConfig`]; `build` validates.
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Client name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Output port name.
    pub fn port_name(mut self, port_name: impl Into<String>) -> Self {
        self.config.port_name = port_name.into();
        self
    }

    /// Event queue slots, a power of two.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Most events written per period.
    pub fn max_events_per_period(mut self, max_events: usize) -> Self {
        self.config.max_events_per_period = max_events;
        self
    }

    /// Fail rather than start a server.
    pub fn no_start_server(mut self, no_start_server: bool) -> Self {
        self.config.no_start_server = no_start_server;
        self
    }

    /// Validates and returns the config.
    pub fn build(self) -> Result<ClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
