// End-to-end tests over real localhost TCP: handshake, connect dialogue,
// and the publish → relay → play path.

mod common;

use std::time::Duration;

use common::*;
use rtmpcast::{
    encode_command, handshake_client, Amf0Value, AmfObject, ChunkReader, ChunkWriter, Command,
    PacketKind, PacketReader, PacketWriter, RtmpClient, RtmpMessage,
};
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;

const TICK: Duration = Duration::from_secs(10);

#[tokio::test]
async fn test_publish_dialogue_completes() {
    let port = spawn_relay_server().await;
    let url = format!("rtmp://127.0.0.1:{}/live/dialogue", port);

    let conn = timeout(TICK, RtmpClient::new().publish(&url))
        .await
        .expect("dialogue timed out")
        .expect("publish dialogue failed");
    assert!(conn.publishing);
    assert_eq!(conn.stream_path(), "/live/dialogue");
}

#[tokio::test]
async fn test_publish_play_relay() {
    let port = spawn_relay_server().await;
    let url = format!("rtmp://127.0.0.1:{}/live/relay", port);

    // publisher: metadata, decoder config, then a GOP per tick
    let pub_url = url.clone();
    let publisher = tokio::spawn(async move {
        let mut conn = RtmpClient::new().publish(&pub_url).await.unwrap();
        conn.write_packet(metadata_packet(320.0)).await.unwrap();
        conn.write_packet(config_packet()).await.unwrap();
        for i in 0u32..50 {
            let keyframe = i % 10 == 0;
            conn.write_packet(video_packet(i * 40, keyframe)).await.unwrap();
            PacketWriter::flush(&mut conn).await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        conn
    });

    // let the publisher establish the stream
    tokio::time::sleep(Duration::from_millis(200)).await;

    let mut sub = timeout(TICK, RtmpClient::new().play(&url))
        .await
        .expect("play dialogue timed out")
        .expect("play dialogue failed");

    // first packets in order: metadata, decoder config, keyframe
    let first = timeout(TICK, sub.read_packet()).await.unwrap().unwrap();
    assert_eq!(first.kind, PacketKind::Metadata);

    let second = timeout(TICK, sub.read_packet()).await.unwrap().unwrap();
    assert_eq!(second.kind, PacketKind::H264DecoderConfig);
    assert_eq!(second.data, test_codec().decoder_config());

    let third = timeout(TICK, sub.read_packet()).await.unwrap().unwrap();
    assert_eq!(third.kind, PacketKind::H264);
    assert!(third.is_keyframe, "first media packet must be a keyframe");

    // stream continues with non-decreasing timestamps
    let mut last_time = third.time;
    for _ in 0..10 {
        let pkt = timeout(TICK, sub.read_packet()).await.unwrap().unwrap();
        assert_eq!(pkt.kind, PacketKind::H264);
        assert!(pkt.time >= last_time);
        last_time = pkt.time;
    }

    publisher.abort();
}

#[tokio::test]
async fn test_two_subscribers_share_stream() {
    let port = spawn_relay_server().await;
    let url = format!("rtmp://127.0.0.1:{}/live/shared", port);

    let pub_url = url.clone();
    let publisher = tokio::spawn(async move {
        let mut conn = RtmpClient::new().publish(&pub_url).await.unwrap();
        conn.write_packet(config_packet()).await.unwrap();
        for i in 0u32..100 {
            conn.write_packet(video_packet(i * 40, i % 5 == 0)).await.unwrap();
            PacketWriter::flush(&mut conn).await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        conn
    });

    tokio::time::sleep(Duration::from_millis(150)).await;

    let mut subs = Vec::new();
    for _ in 0..2 {
        subs.push(
            timeout(TICK, RtmpClient::new().play(&url))
                .await
                .unwrap()
                .unwrap(),
        );
    }

    for sub in &mut subs {
        let first = timeout(TICK, sub.read_packet()).await.unwrap().unwrap();
        assert_eq!(first.kind, PacketKind::H264DecoderConfig);
        let second = timeout(TICK, sub.read_packet()).await.unwrap().unwrap();
        assert!(second.is_keyframe);
    }

    publisher.abort();
}

/// Drive the server with a hand-rolled client and verify the connect
/// replies byte by byte: WindowAckSize(2500000), SetPeerBandwidth
/// (2500000, 2), SetChunkSize(65536), then the `_result` with the FMS
/// properties and the success status.
#[tokio::test]
async fn test_connect_reply_sequence() {
    let port = spawn_relay_server().await;
    let stream = tokio::net::TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let (rd, wr) = tokio::io::split(stream);
    let mut rd = ChunkReader::new(rd);
    let mut wr = ChunkWriter::new(tokio::io::BufWriter::new(wr));

    timeout(TICK, handshake_client(rd.inner_mut(), wr.inner_mut()))
        .await
        .unwrap()
        .unwrap();

    let connect_obj = AmfObject::new()
        .with("app", "live")
        .with("tcUrl", format!("rtmp://127.0.0.1:{}/live", port))
        .with("objectEncoding", 0.0);
    let body = encode_command("connect", 1.0, Some(&connect_obj), std::iter::empty()).unwrap();
    wr.write_message(3, 20, 0, 0, &[], &body).await.unwrap();
    wr.flush().await.unwrap();

    async fn next_message(
        rd: &mut ChunkReader<tokio::io::ReadHalf<tokio::net::TcpStream>>,
    ) -> RtmpMessage {
        timeout(TICK, rd.read_message()).await.unwrap().unwrap()
    }

    // WindowAckSize
    let msg = next_message(&mut rd).await;
    assert_eq!(msg.type_id, 5);
    assert_eq!(msg.data.as_ref(), &2_500_000u32.to_be_bytes());

    // SetPeerBandwidth, dynamic limit
    let msg = next_message(&mut rd).await;
    assert_eq!(msg.type_id, 6);
    assert_eq!(&msg.data[..4], &2_500_000u32.to_be_bytes());
    assert_eq!(msg.data[4], 2);

    // SetChunkSize
    let msg = next_message(&mut rd).await;
    assert_eq!(msg.type_id, 1);
    assert_eq!(msg.data.as_ref(), &65536u32.to_be_bytes());
    rd.set_max_chunk_size(65536);

    // _result with properties and status
    let msg = next_message(&mut rd).await;
    assert_eq!(msg.type_id, 20);
    let cmd = Command::from_message(&msg).unwrap().unwrap();
    assert_eq!(cmd.name, "_result");
    assert_eq!(cmd.transaction_id, 1.0);

    let props = cmd.object.as_ref().expect("fms properties");
    assert_eq!(props.get_string("fmsVer"), Some("LNX 9,0,124,2"));
    assert_eq!(props.get_number("capabilities"), Some(31.0));

    let info = cmd.param_object(0).expect("status object");
    assert_eq!(info.get_string("level"), Some("status"));
    assert_eq!(info.get_string("code"), Some("NetConnection.Connect.Success"));
    assert_eq!(info.get_number("objectEncoding"), Some(0.0));
}

/// A garbage first byte must not hang the server; the connection is
/// rejected during the handshake.
#[tokio::test]
async fn test_garbage_handshake_rejected() {
    let port = spawn_relay_server().await;
    let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", port)).await.unwrap();

    stream.write_all(&[0x47u8; 64]).await.unwrap(); // not 0x03
    stream.flush().await.unwrap();

    // the server closes on us; reading eventually returns 0
    let mut buf = [0u8; 64];
    let n = timeout(TICK, tokio::io::AsyncReadExt::read(&mut stream, &mut buf))
        .await
        .expect("server kept the bad connection open")
        .unwrap_or(0);
    assert_eq!(n, 0);
}

/// Metadata written by the publisher with @setDataFrame arrives at the
/// subscriber as plain onMetaData script data.
#[tokio::test]
async fn test_metadata_travels_across_relay() {
    let port = spawn_relay_server().await;
    let url = format!("rtmp://127.0.0.1:{}/live/meta", port);

    let pub_url = url.clone();
    let publisher = tokio::spawn(async move {
        let mut conn = RtmpClient::new().publish(&pub_url).await.unwrap();
        conn.write_packet(metadata_packet(1280.0)).await.unwrap();
        conn.write_packet(config_packet()).await.unwrap();
        for i in 0u32..50 {
            conn.write_packet(video_packet(i * 40, i % 10 == 0)).await.unwrap();
            PacketWriter::flush(&mut conn).await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        conn
    });

    tokio::time::sleep(Duration::from_millis(200)).await;

    let mut sub = RtmpClient::new().play(&url).await.unwrap();
    let first = timeout(TICK, sub.read_packet()).await.unwrap().unwrap();
    assert_eq!(first.kind, PacketKind::Metadata);

    let values = rtmpcast::parse_amf_values(&first.data, false).unwrap();
    let map = values[0].as_object().expect("metadata map");
    assert_eq!(map.get_number("width"), Some(1280.0));

    publisher.abort();
}

#[tokio::test]
async fn test_amf_values_survive_command_round_trip() {
    // local sanity for the dialogue building blocks used above
    let obj = AmfObject::new()
        .with("app", "live")
        .with("type", "nonprivate")
        .with("supportsGoAway", true);
    let body = encode_command(
        "releaseStream",
        2.0,
        None,
        [&Amf0Value::String("key".into()), &Amf0Value::Object(obj)],
    )
    .unwrap();
    let msg = RtmpMessage::new(20, 0, 0, bytes::Bytes::from(body));
    let cmd = Command::from_message(&msg).unwrap().unwrap();
    assert_eq!(cmd.name, "releaseStream");
    assert_eq!(cmd.param_string(0), Some("key"));
    assert_eq!(
        cmd.param_object(1).unwrap().get_boolean("supportsGoAway"),
        Some(true)
    );
}
