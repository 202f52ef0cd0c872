// RTMP pub/sub relay server
//
// Accepts any number of publishers and players on the same stream keys:
//
//   ffmpeg -re -i input.mp4 -c copy -f flv rtmp://127.0.0.1/live/demo
//   ffplay rtmp://127.0.0.1/live/demo
//
// Usage:
//   cargo run --example relay_server [bind-port]

use std::sync::Arc;

use log::error;
use rtmpcast::{RelayHub, RtmpServer, ServerConfig};

#[tokio::main]
async fn main() {
    env_logger::init();

    let port = std::env::args()
        .nth(1)
        .and_then(|p| p.parse().ok())
        .unwrap_or(1935);

    let config = ServerConfig::builder()
        .host("0.0.0.0")
        .port(port)
        .sample_access(true)
        .build()
        .expect("server config");

    let hub = Arc::new(RelayHub::new());
    let server = RtmpServer::new(config);

    let result = server
        .listen(move |conn| {
            let hub = hub.clone();
            async move {
                hub.handle_conn(conn).await;
            }
        })
        .await;

    if let Err(e) = result {
        error!("server failed: {}", e);
        std::process::exit(1);
    }
}
