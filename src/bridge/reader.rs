use std::sync::Arc;

use bytes::Bytes;
use log::warn;

use crate::amf::{encode_amf0_values, parse_amf_values, Amf0Value};
use crate::av::{Packet, PacketKind};
use crate::codec::aac::AacCodec;
use crate::codec::h264::{self, H264Codec};
use crate::flv::tag::{self, Tag};
use crate::Result;

pub const SET_DATA_FRAME: &str = "@setDataFrame";
pub const ON_META_DATA: &str = "onMetaData";

/// Re-serialize a script payload as the plain AMF0 `onMetaData` map,
/// accepting the publisher's `@setDataFrame` prefix and AMF3 input.
/// Returns `None` when the payload is not an onMetaData announcement.
pub fn metadata_to_amf0(data: &[u8], amf3: bool) -> Option<Bytes> {
    let mut values = match parse_amf_values(data, amf3) {
        Ok(v) => v,
        Err(e) => {
            warn!("dropping malformed script data: {}", e);
            return None;
        }
    };

    if matches!(values.first(), Some(Amf0Value::String(s)) if s == SET_DATA_FRAME) {
        values.remove(0);
    }
    match values.first() {
        Some(Amf0Value::String(s)) if s == ON_META_DATA => {
            values.remove(0);
        }
        _ => return None,
    }
    if values.is_empty() {
        values.push(Amf0Value::EcmaArray(Default::default()));
    }

    match encode_amf0_values(values.iter()) {
        Ok(bytes) => Some(Bytes::from(bytes)),
        Err(e) => {
            warn!("dropping unserializable metadata: {}", e);
            None
        }
    }
}

/// Decodes FLV tags into typed packets, maintaining the current codec
/// handles. Inline SPS/PPS NAL units found in H.264 frames update the codec
/// (replacing it when the fingerprint changes) and are stripped from the
/// forwarded payload.
#[derive(Default)]
pub struct TagToPacket {
    pub h264: Option<Arc<H264Codec>>,
    pub aac: Option<Arc<AacCodec>>,
}

impl TagToPacket {
    pub fn new() -> Self {
        TagToPacket::default()
    }

    /// Convert one tag. `Ok(None)` means the tag carries nothing for the
    /// packet layer (unknown codec, control subtype, foreign metadata) and
    /// the stream continues.
    pub fn packet(&mut self, tag: &Tag) -> Result<Option<Packet>> {
        match tag.tag_type {
            tag::TAG_VIDEO => self.video_packet(tag),
            tag::TAG_AUDIO => self.audio_packet(tag),
            tag::TAG_AMF0 => Ok(self.metadata_packet(tag, false)),
            tag::TAG_AMF3 => Ok(self.metadata_packet(tag, true)),
            _ => Ok(None),
        }
    }

    fn video_packet(&mut self, tag: &Tag) -> Result<Option<Packet>> {
        if tag.video_format != tag::VIDEO_H264 {
            return Ok(None);
        }
        match tag.avc_packet_type {
            tag::AVC_SEQHDR => {
                match H264Codec::from_decoder_config(&tag.data) {
                    Ok(codec) => self.h264 = Some(Arc::new(codec)),
                    Err(e) => {
                        warn!("dropping bad AVC decoder config: {}", e);
                        return Ok(None);
                    }
                }
                let mut pkt = Packet::new(PacketKind::H264DecoderConfig, tag.data.clone());
                pkt.time = tag.time;
                pkt.h264 = self.h264.clone();
                Ok(Some(pkt))
            }
            tag::AVC_NALU => {
                let mut pkt = Packet::new(PacketKind::H264, tag.data.clone());
                pkt.time = tag.time;
                pkt.ctime = tag.ctime;
                pkt.is_keyframe = tag.frame_type == tag::FRAME_KEY;
                self.extract_parameter_sets(&mut pkt);
                pkt.h264 = self.h264.clone();
                Ok(Some(pkt))
            }
            tag::AVC_EOS => Ok(None),
            other => {
                warn!("dropping video tag with unknown AVC packet type {}", other);
                Ok(None)
            }
        }
    }

    /// Pull inline SPS/PPS out of the frame payload, updating the codec
    /// handle when the fingerprint changes
    fn extract_parameter_sets(&mut self, pkt: &mut Packet) {
        let (nalus, layout) = h264::split_nalus(&pkt.data);
        let has_params = nalus
            .iter()
            .any(|n| matches!(h264::nalu_type(n), h264::NALU_SPS | h264::NALU_PPS));
        if !has_params {
            return;
        }

        let mut codec = match &self.h264 {
            Some(old) => (**old).clone(),
            None => H264Codec::new(),
        };
        let mut remaining = Vec::with_capacity(nalus.len());
        for nalu in &nalus {
            match h264::nalu_type(nalu) {
                h264::NALU_SPS | h264::NALU_PPS => codec.add_parameter_set(nalu),
                _ => remaining.push(nalu.clone()),
            }
        }

        let changed = match &self.h264 {
            Some(old) => **old != codec,
            None => true,
        };
        if changed {
            self.h264 = Some(Arc::new(codec));
        }
        pkt.data = h264::join_nalus(remaining.iter(), layout);
    }

    fn audio_packet(&mut self, tag: &Tag) -> Result<Option<Packet>> {
        if tag.sound_format != tag::SOUND_AAC {
            return Ok(None);
        }
        match tag.aac_packet_type {
            tag::AAC_SEQHDR => {
                match AacCodec::from_config_bytes(tag.data.clone()) {
                    Ok(codec) => self.aac = Some(Arc::new(codec)),
                    Err(e) => {
                        warn!("dropping bad AudioSpecificConfig: {}", e);
                        return Ok(None);
                    }
                }
                let mut pkt = Packet::new(PacketKind::AacDecoderConfig, tag.data.clone());
                pkt.time = tag.time;
                pkt.aac = self.aac.clone();
                Ok(Some(pkt))
            }
            tag::AAC_RAW => {
                let mut pkt = Packet::new(PacketKind::Aac, tag.data.clone());
                pkt.time = tag.time;
                pkt.aac = self.aac.clone();
                Ok(Some(pkt))
            }
            other => {
                warn!("dropping audio tag with unknown AAC packet type {}", other);
                Ok(None)
            }
        }
    }

    fn metadata_packet(&mut self, tag: &Tag, amf3: bool) -> Option<Packet> {
        let data = metadata_to_amf0(&tag.data, amf3)?;
        let mut pkt = Packet::new(PacketKind::Metadata, data);
        pkt.time = tag.time;
        Some(pkt)
    }
}
