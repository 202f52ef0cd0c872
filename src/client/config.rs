use std::time::Duration;

use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Outgoing chunk size announced during connect
    pub chunk_size: usize,

    /// Window acknowledgement / peer bandwidth size
    pub window_ack_size: u32,

    /// Deadline for dialing plus the handshake + command phase
    pub connect_timeout: Duration,

    /// Socket write buffer size
    pub buffer_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            chunk_size: 65536,
            window_ack_size: 2_500_000,
            connect_timeout: Duration::from_secs(15),
            buffer_size: 4096,
        }
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size < 128 {
            return Err(Error::config("Chunk size must be at least 128"));
        }
        if self.chunk_size > 65536 {
            return Err(Error::config("Chunk size must not exceed 65536"));
        }
        if self.buffer_size == 0 {
            return Err(Error::config("Buffer size must be non-zero"));
        }
        Ok(())
    }
}

/// Builder for ClientConfig
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        ClientConfigBuilder {
            config: ClientConfig::default(),
        }
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    pub fn window_ack_size(mut self, size: u32) -> Self {
        self.config.window_ack_size = size;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    pub fn build(self) -> Result<ClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        ClientConfigBuilder::new()
    }
}
