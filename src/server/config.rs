use std::time::Duration;

use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind
    pub host: String,

    /// Port to bind
    pub port: u16,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Outgoing chunk size announced during connect
    pub chunk_size: usize,

    /// Window acknowledgement / peer bandwidth size
    pub window_ack_size: u32,

    /// Deadline for the handshake + command phase
    pub handshake_timeout: Duration,

    /// Socket write buffer size
    pub buffer_size: usize,

    /// Emit the |RtmpSampleAccess notice to players
    pub sample_access: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 1935,
            max_connections: 1000,
            chunk_size: 65536,
            window_ack_size: 2_500_000,
            handshake_timeout: Duration::from_secs(15),
            buffer_size: 4096,
            sample_access: false,
        }
    }
}

impl ServerConfig {
    /// Create config builder
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::config("Invalid port: 0"));
        }
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

/// Builder for ServerConfig
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn new() -> Self {
        ServerConfigBuilder {
            config: ServerConfig::default(),
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.max_connections = max;
        self
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    pub fn window_ack_size(mut self, size: u32) -> Self {
        self.config.window_ack_size = size;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    pub fn sample_access(mut self, enabled: bool) -> Self {
        self.config.sample_access = enabled;
        self
    }

    pub fn build(self) -> Result<ServerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        ServerConfigBuilder::new()
    }
}
