use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::codec::aac::AacCodec;
use crate::codec::h264::H264Codec;
use crate::Result;

/// What a packet carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// H.264 access unit
    H264,
    /// Raw AAC frame
    Aac,
    /// AVCDecoderConfigurationRecord bytes
    H264DecoderConfig,
    /// Bare SPS/PPS NAL units outside a decoder config record
    H264SpsPpsNalu,
    /// AudioSpecificConfig bytes
    AacDecoderConfig,
    /// AMF0-serialized onMetaData map
    Metadata,
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PacketKind::H264 => "H264",
            PacketKind::Aac => "AAC",
            PacketKind::H264DecoderConfig => "H264DecoderConfig",
            PacketKind::H264SpsPpsNalu => "H264SPSPPSNALU",
            PacketKind::AacDecoderConfig => "AACDecoderConfig",
            PacketKind::Metadata => "Metadata",
        };
        f.write_str(s)
    }
}

/// The universal in-process media unit. Codec handles and sideband
/// sequence-header bytes travel by shared reference so cloning a packet is
/// cheap and "already sent this config?" checks stay pointer-sized.
#[derive(Debug, Clone)]
pub struct Packet {
    pub kind: PacketKind,
    pub is_keyframe: bool,
    /// Presentation time in milliseconds
    pub time: u32,
    /// Composition time offset in milliseconds (signed, B-frames)
    pub ctime: i32,
    pub data: Bytes,

    pub h264: Option<Arc<H264Codec>>,
    pub aac: Option<Arc<AacCodec>>,

    /// Cached video sequence header (decoder config record)
    pub v_seq_hdr: Option<Bytes>,
    /// Cached audio sequence header (AudioSpecificConfig)
    pub a_seq_hdr: Option<Bytes>,
    /// Cached metadata (AMF0 map bytes)
    pub metadata: Option<Bytes>,
}

impl Packet {
    pub fn new(kind: PacketKind, data: Bytes) -> Self {
        Packet {
            kind,
            is_keyframe: false,
            time: 0,
            ctime: 0,
            data,
            h264: None,
            aac: None,
            v_seq_hdr: None,
            a_seq_hdr: None,
            metadata: None,
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(
            self.kind,
            PacketKind::H264 | PacketKind::H264DecoderConfig | PacketKind::H264SpsPpsNalu
        )
    }

    pub fn is_audio(&self) -> bool {
        matches!(self.kind, PacketKind::Aac | PacketKind::AacDecoderConfig)
    }

    /// Media frames, as opposed to configuration and metadata
    pub fn is_media(&self) -> bool {
        matches!(self.kind, PacketKind::H264 | PacketKind::Aac)
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if self.is_keyframe {
            f.write_str(" K")?;
        }
        write!(f, " {}ms", self.time)?;
        if self.ctime != 0 {
            write!(f, " {:+}ms", self.ctime)?;
        }
        write!(f, " {}b", self.data.len())
    }
}

/// Source of packets. The boundary shared with the MP4/RTSP collaborators:
/// anything that can hand out packets can feed anything that accepts them.
#[async_trait]
pub trait PacketReader: Send {
    /// Read the next packet. End of stream surfaces as an
    /// `UnexpectedEof` IO error.
    async fn read_packet(&mut self) -> Result<Packet>;
}

/// Sink of packets. Implementations accept any kind ordering but expect
/// non-decreasing per-stream presentation times for media kinds.
#[async_trait]
pub trait PacketWriter: Send {
    async fn write_packet(&mut self, pkt: Packet) -> Result<()>;

    /// Push any buffered writes to the transport. Media writes may
    /// aggregate between flushes.
    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
