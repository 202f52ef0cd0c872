use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{error, info, warn};
use tokio::net::{TcpListener, TcpStream};

use crate::connection::{Conn, Prepare, Stage};
use crate::server::config::ServerConfig;
use crate::{Error, Result};

/// TCP accept loop. Each connection gets its own task that performs the
/// handshake and command dialogue under the configured deadline, then
/// hands the prepared connection to the handler.
pub struct RtmpServer {
    config: ServerConfig,
    active: Arc<AtomicUsize>,
}

impl RtmpServer {
    pub fn new(config: ServerConfig) -> Self {
        RtmpServer {
            config,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Active connection count
    pub fn connection_count(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Listen and serve until the listener fails. The handler receives
    /// connections already advanced to the publish/play decision point.
    pub async fn listen<F, Fut>(&self, handler: F) -> Result<()>
    where
        F: Fn(Conn<TcpStream>) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::connection(format!("failed to bind {}: {}", addr, e)))?;
        info!("RTMP server listening on {}", addr);

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("accept failed: {}", e);
                    continue;
                }
            };

            if self.config.max_connections > 0
                && self.active.load(Ordering::Relaxed) >= self.config.max_connections
            {
                warn!("connection limit reached, rejecting {}", peer);
                drop(stream);
                continue;
            }

            if let Err(e) = stream.set_nodelay(true) {
                warn!("failed to set TCP_NODELAY for {}: {}", peer, e);
            }

            self.active.fetch_add(1, Ordering::Relaxed);
            let active = self.active.clone();
            let config = self.config.clone();
            let handler = handler.clone();

            tokio::spawn(async move {
                let mut conn = Conn::new_server_with_buffer(stream, config.buffer_size);
                conn.connect_chunk_size = config.chunk_size;
                conn.window_ack_size = config.window_ack_size;
                conn.sample_access = config.sample_access;

                match conn
                    .prepare_timed(
                        Stage::GotPublishOrPlay,
                        Prepare::Reading,
                        config.handshake_timeout,
                    )
                    .await
                {
                    Ok(()) => handler(conn).await,
                    Err(e) => error!("setup with {} failed: {}", peer, e),
                }

                active.fetch_sub(1, Ordering::Relaxed);
                info!("connection from {} closed", peer);
            });
        }
    }
}
