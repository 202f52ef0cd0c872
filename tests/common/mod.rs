// Shared helpers for the integration tests

use std::sync::Arc;

use bytes::Bytes;
use rtmpcast::codec::h264::{join_nalus_avcc, H264Codec};
use rtmpcast::{Packet, PacketKind, RelayHub, RtmpServer, ServerConfig};

/// 320x240 baseline SPS/PPS pair used across the wire tests
pub const SPS: [u8; 25] = [
    0x67, 0x42, 0x00, 0x0A, 0xAC, 0x72, 0x84, 0x44, 0x26, 0x84, 0x00, 0x00, 0x03, 0x00, 0x04,
    0x00, 0x00, 0x03, 0x00, 0xCA, 0x3C, 0x48, 0x96, 0x11, 0x80,
];
pub const PPS: [u8; 7] = [0x68, 0xE8, 0x43, 0x8F, 0x13, 0x21, 0x30];

pub fn test_codec() -> H264Codec {
    let mut codec = H264Codec::new();
    codec.add_parameter_set(&Bytes::copy_from_slice(&SPS));
    codec.add_parameter_set(&Bytes::copy_from_slice(&PPS));
    codec
}

/// A decoder-config packet built from the golden parameter sets
pub fn config_packet() -> Packet {
    Packet::new(PacketKind::H264DecoderConfig, test_codec().decoder_config())
}

/// A minimal H.264 frame packet (single AVCC-framed NAL unit)
pub fn video_packet(time: u32, keyframe: bool) -> Packet {
    let nalu = if keyframe {
        Bytes::from_static(&[0x65, 0x88, 0x84, 0x00])
    } else {
        Bytes::from_static(&[0x41, 0x9A, 0x24, 0x00])
    };
    let mut pkt = Packet::new(PacketKind::H264, join_nalus_avcc([&nalu]));
    pkt.time = time;
    pkt.is_keyframe = keyframe;
    pkt
}

/// An onMetaData packet with the given width
pub fn metadata_packet(width: f64) -> Packet {
    use rtmpcast::{encode_amf0_values, Amf0Value, AmfObject};
    let map = Amf0Value::EcmaArray(
        AmfObject::new()
            .with("width", width)
            .with("height", 240.0)
            .with("videocodecid", 7.0),
    );
    Packet::new(
        PacketKind::Metadata,
        Bytes::from(encode_amf0_values([&map]).unwrap()),
    )
}

/// Grab a free localhost port
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral");
    listener.local_addr().expect("local addr").port()
}

/// Spawn a relay server on a fresh port, returning the port
pub async fn spawn_relay_server() -> u16 {
    let port = free_port();
    let config = ServerConfig::builder()
        .host("127.0.0.1")
        .port(port)
        .build()
        .expect("server config");

    let hub = Arc::new(RelayHub::new());
    let server = RtmpServer::new(config);

    tokio::spawn(async move {
        let _ = server
            .listen(move |conn| {
                let hub = hub.clone();
                async move {
                    hub.handle_conn(conn).await;
                }
            })
            .await;
    });

    // wait for the listener to come up
    for _ in 0..50 {
        if tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
            return port;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    panic!("relay server did not start");
}
