use std::sync::Arc;

use bytes::Bytes;
use log::warn;

use crate::amf::{encode_amf0_values, Amf0Value};
use crate::av::{Packet, PacketKind};
use crate::bridge::reader::{ON_META_DATA, SET_DATA_FRAME};
use crate::codec::aac::AacCodec;
use crate::codec::h264::H264Codec;
use crate::flv::tag::{self, Tag};
use crate::Result;

/// Encodes packets back into FLV tags, injecting sequence-header tags as
/// needed: a fresh H.264 decoder config whenever the attached codec
/// fingerprint changes, and the AAC config the first time AAC is seen.
#[derive(Default)]
pub struct PacketToTag {
    last_h264: Option<Arc<H264Codec>>,
    aac_config_sent: bool,
    aac: Option<Arc<AacCodec>>,
    /// Emit metadata as `@setDataFrame,"onMetaData",map` (publisher form)
    /// instead of `"onMetaData",map`
    pub set_data_frame: bool,
}

fn aac_tag(aac: Option<&AacCodec>) -> Tag {
    let channels = aac.map(|c| c.config.channel_layout.count()).unwrap_or(1);
    Tag {
        tag_type: tag::TAG_AUDIO,
        sound_format: tag::SOUND_AAC,
        sound_rate: tag::SOUND_44KHZ,
        sound_size: tag::SOUND_16BIT,
        sound_type: if channels == 1 {
            tag::SOUND_MONO
        } else {
            tag::SOUND_STEREO
        },
        ..Tag::default()
    }
}

fn video_config_tag(data: Bytes, time: u32) -> Tag {
    Tag {
        tag_type: tag::TAG_VIDEO,
        frame_type: tag::FRAME_KEY,
        video_format: tag::VIDEO_H264,
        avc_packet_type: tag::AVC_SEQHDR,
        time,
        data,
        ..Tag::default()
    }
}

impl PacketToTag {
    pub fn new() -> Self {
        PacketToTag::default()
    }

    /// Convert one packet into the tag(s) to emit, config injections first
    pub fn tags(&mut self, pkt: &Packet) -> Result<Vec<Tag>> {
        let mut out = Vec::with_capacity(2);
        match pkt.kind {
            PacketKind::H264 | PacketKind::H264SpsPpsNalu => {
                if let Some(codec) = &pkt.h264 {
                    let changed = match &self.last_h264 {
                        Some(last) => last.fingerprint() != codec.fingerprint(),
                        None => true,
                    };
                    if changed && codec.has_parameter_sets() {
                        out.push(video_config_tag(codec.decoder_config(), pkt.time));
                        self.last_h264 = Some(codec.clone());
                    }
                }
                out.push(Tag {
                    tag_type: tag::TAG_VIDEO,
                    frame_type: if pkt.is_keyframe {
                        tag::FRAME_KEY
                    } else {
                        tag::FRAME_INTER
                    },
                    video_format: tag::VIDEO_H264,
                    avc_packet_type: tag::AVC_NALU,
                    time: pkt.time,
                    ctime: pkt.ctime,
                    data: pkt.data.clone(),
                    ..Tag::default()
                });
            }

            PacketKind::H264DecoderConfig => {
                // remember the config so a later H264 packet carrying the
                // same codec handle does not re-inject it
                match H264Codec::from_decoder_config(&pkt.data) {
                    Ok(codec) => self.last_h264 = Some(Arc::new(codec)),
                    Err(e) => warn!("passing through unparseable AVC config: {}", e),
                }
                out.push(video_config_tag(pkt.data.clone(), pkt.time));
            }

            PacketKind::Aac => {
                if let Some(codec) = &pkt.aac {
                    if !self.aac_config_sent {
                        let mut cfg = aac_tag(Some(codec));
                        cfg.aac_packet_type = tag::AAC_SEQHDR;
                        cfg.time = pkt.time;
                        cfg.data = codec.config_bytes.clone();
                        out.push(cfg);
                        self.aac = Some(codec.clone());
                        self.aac_config_sent = true;
                    }
                }
                let mut t = aac_tag(pkt.aac.as_deref().or(self.aac.as_deref()));
                t.aac_packet_type = tag::AAC_RAW;
                t.time = pkt.time;
                t.data = pkt.data.clone();
                out.push(t);
            }

            PacketKind::AacDecoderConfig => {
                match AacCodec::from_config_bytes(pkt.data.clone()) {
                    Ok(codec) => self.aac = Some(Arc::new(codec)),
                    Err(e) => warn!("passing through unparseable AAC config: {}", e),
                }
                let mut t = aac_tag(self.aac.as_deref());
                t.aac_packet_type = tag::AAC_SEQHDR;
                t.time = pkt.time;
                t.data = pkt.data.clone();
                out.push(t);
                self.aac_config_sent = true;
            }

            PacketKind::Metadata => {
                let mut values = Vec::with_capacity(2);
                if self.set_data_frame {
                    values.push(Amf0Value::String(SET_DATA_FRAME.to_string()));
                }
                values.push(Amf0Value::String(ON_META_DATA.to_string()));
                let mut data = encode_amf0_values(values.iter())?;
                data.extend_from_slice(&pkt.data);
                out.push(Tag {
                    tag_type: tag::TAG_AMF0,
                    time: pkt.time,
                    data: Bytes::from(data),
                    ..Tag::default()
                });
            }
        }
        Ok(out)
    }
}
