use log::info;
use tokio::net::TcpStream;
use url::Url;

use crate::client::config::ClientConfig;
use crate::connection::{host_with_port, Conn, Prepare, Stage};
use crate::{Error, Result};

/// Dialing side. `publish` and `play` run the full dialogue and hand back
/// a data-phase-ready connection.
pub struct RtmpClient {
    config: ClientConfig,
}

impl RtmpClient {
    pub fn new() -> Self {
        RtmpClient::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        RtmpClient { config }
    }

    /// Open the TCP connection for the URL; the command dialogue has not
    /// run yet
    pub async fn dial(&self, url: &str) -> Result<Conn<TcpStream>> {
        let parsed = Url::parse(url).map_err(|e| Error::config(format!("invalid URL: {}", e)))?;
        match parsed.scheme() {
            "rtmp" => {}
            "rtmps" => {
                // Conn is transport-generic; wrap your own TLS stream and
                // use Conn::new_client directly
                return Err(Error::unsupported(
                    "rtmps needs a TLS transport supplied by the caller",
                ));
            }
            other => return Err(Error::config(format!("unsupported scheme {:?}", other))),
        }

        let addr = host_with_port(&parsed)?;
        let stream = tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::timeout(format!("dialing {} timed out", addr)))?
            .map_err(|e| Error::connection(format!("failed to connect {}: {}", addr, e)))?;
        stream.set_nodelay(true)?;
        info!("connected to {}", addr);

        let mut conn = Conn::new_client(stream, parsed);
        conn.connect_chunk_size = self.config.chunk_size;
        conn.window_ack_size = self.config.window_ack_size;
        Ok(conn)
    }

    /// Dial and run connect/releaseStream/FCPublish/createStream/publish
    pub async fn publish(&self, url: &str) -> Result<Conn<TcpStream>> {
        let mut conn = self.dial(url).await?;
        conn.prepare_timed(
            Stage::CommandDone,
            Prepare::Writing,
            self.config.connect_timeout,
        )
        .await?;
        Ok(conn)
    }

    /// Dial and run connect/createStream/play
    pub async fn play(&self, url: &str) -> Result<Conn<TcpStream>> {
        let mut conn = self.dial(url).await?;
        conn.prepare_timed(
            Stage::CommandDone,
            Prepare::Reading,
            self.config.connect_timeout,
        )
        .await?;
        Ok(conn)
    }
}

impl Default for RtmpClient {
    fn default() -> Self {
        RtmpClient::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bad_scheme_rejected() {
        let client = RtmpClient::new();
        assert!(client.dial("http://host/live/x").await.is_err());
        assert!(client.dial("rtmps://host/live/x").await.is_err());
        assert!(client.dial("not a url").await.is_err());
    }
}
