//! URL-based source/sink dispatch: `rtmp:` dials out, `@rtmp:` listens for
//! a single inbound publisher, and `.flv` paths open files. HTTP-backed
//! FLV and `.mp4` belong to external collaborators behind the same packet
//! traits and are reported as unsupported here.

use log::info;
use tokio::net::TcpListener;
use url::Url;

use crate::av::{PacketReader, PacketWriter};
use crate::client::RtmpClient;
use crate::connection::{host_with_port, Conn, Prepare, Stage};
use crate::flv::{FlvReader, FlvWriter};
use crate::{Error, Result};

/// Open a packet source: an RTMP play session, a single-publisher listen
/// socket (`@` prefix), or an FLV file
pub async fn open_read(target: &str) -> Result<Box<dyn PacketReader + Send>> {
    if let Some(rest) = target.strip_prefix('@') {
        return listen_one_publisher(rest).await;
    }
    if target.starts_with("rtmp://") || target.starts_with("rtmps://") {
        let conn = RtmpClient::new().play(target).await?;
        return Ok(Box::new(conn));
    }
    if target.starts_with("http://") || target.starts_with("https://") {
        return Err(Error::unsupported("HTTP-backed FLV sources are external"));
    }
    if target.ends_with(".flv") {
        let file = tokio::fs::File::open(target).await?;
        return Ok(Box::new(FlvReader::new(tokio::io::BufReader::new(file))));
    }
    if target.ends_with(".mp4") {
        return Err(Error::unsupported("the MP4 demuxer is external"));
    }
    Err(Error::unsupported(format!("cannot open {:?} for reading", target)))
}

/// Open a packet sink: an RTMP publish session or an FLV file
pub async fn open_write(target: &str) -> Result<Box<dyn PacketWriter + Send>> {
    if target.starts_with("rtmp://") || target.starts_with("rtmps://") {
        let conn = RtmpClient::new().publish(target).await?;
        return Ok(Box::new(conn));
    }
    if target.ends_with(".flv") {
        let file = tokio::fs::File::create(target).await?;
        return Ok(Box::new(FlvWriter::new(tokio::io::BufWriter::new(file))));
    }
    if target.ends_with(".mp4") {
        return Err(Error::unsupported("the MP4 muxer is external"));
    }
    Err(Error::unsupported(format!("cannot open {:?} for writing", target)))
}

/// Bind the URL's host/port, accept exactly one connection, and require it
/// to publish the URL's stream
async fn listen_one_publisher(target: &str) -> Result<Box<dyn PacketReader + Send>> {
    let url = Url::parse(target).map_err(|e| Error::config(format!("invalid URL: {}", e)))?;
    if url.scheme() != "rtmp" {
        return Err(Error::unsupported("listen mode needs an rtmp URL"));
    }

    let addr = host_with_port(&url)?;
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::connection(format!("failed to bind {}: {}", addr, e)))?;
    info!("waiting for one publisher on {}", addr);

    let (stream, peer) = listener.accept().await?;
    stream.set_nodelay(true)?;
    info!("publisher connected from {}", peer);

    let mut conn = Conn::new_server(stream);
    conn.prepare_timed(
        Stage::GotPublishOrPlay,
        Prepare::Reading,
        std::time::Duration::from_secs(15),
    )
    .await?;
    if !conn.publishing {
        return Err(Error::command("peer asked to play, expected publish"));
    }
    conn.prepare(Stage::CommandDone, Prepare::Reading).await?;
    Ok(Box::new(conn))
}
