use bytes::Bytes;

use crate::flv::tag as flvtag;
use crate::protocol::constants::*;
use crate::Result;

/// A fully reassembled RTMP message, independent of the chunk stream it
/// arrived on. Media messages (types 8/9/15/18) map 1:1 to FLV tags.
#[derive(Debug, Clone)]
pub struct RtmpMessage {
    pub type_id: u8,
    pub stream_id: u32,
    /// Absolute timestamp in milliseconds
    pub timestamp: u32,
    pub data: Bytes,
}

impl RtmpMessage {
    pub fn new(type_id: u8, stream_id: u32, timestamp: u32, data: Bytes) -> Self {
        RtmpMessage {
            type_id,
            stream_id,
            timestamp,
            data,
        }
    }

    pub fn is_audio(&self) -> bool {
        self.type_id == MSG_TYPE_AUDIO
    }

    pub fn is_video(&self) -> bool {
        self.type_id == MSG_TYPE_VIDEO
    }

    pub fn is_command(&self) -> bool {
        self.type_id == MSG_TYPE_COMMAND_AMF0 || self.type_id == MSG_TYPE_COMMAND_AMF3
    }

    pub fn is_data(&self) -> bool {
        self.type_id == MSG_TYPE_DATA_AMF0 || self.type_id == MSG_TYPE_DATA_AMF3
    }

    pub fn is_aggregate(&self) -> bool {
        self.type_id == MSG_TYPE_AGGREGATE
    }

    /// Media and script messages that carry FLV tag payloads
    pub fn is_tag(&self) -> bool {
        self.is_audio() || self.is_video() || self.is_data()
    }

    pub fn is_control(&self) -> bool {
        matches!(
            self.type_id,
            MSG_TYPE_SET_CHUNK_SIZE
                | MSG_TYPE_ABORT
                | MSG_TYPE_ACK
                | MSG_TYPE_USER_CONTROL
                | MSG_TYPE_WINDOW_ACK
                | MSG_TYPE_SET_PEER_BW
        )
    }
}

/// Expand an aggregate message (type 22) into its embedded FLV tags, each
/// re-emitted as an independent message with its timestamp rebased to
/// `msg.time + (tag.time - first_tag.time)`
pub fn split_aggregate(msg: &RtmpMessage) -> Result<Vec<RtmpMessage>> {
    let data = &msg.data;
    let mut out = Vec::new();
    let mut off = 0usize;
    let mut first_time: Option<u32> = None;

    while data.len().saturating_sub(off)
        >= flvtag::TAG_HEADER_LENGTH + flvtag::TAG_TRAILER_LENGTH
    {
        let (tag, datalen) =
            flvtag::parse_tag_header(&data[off..off + flvtag::TAG_HEADER_LENGTH])?;
        off += flvtag::TAG_HEADER_LENGTH;
        if data.len() - off < datalen + flvtag::TAG_TRAILER_LENGTH {
            break;
        }
        let body = data.slice(off..off + datalen);
        off += datalen + flvtag::TAG_TRAILER_LENGTH;

        let base = *first_time.get_or_insert(tag.time);
        out.push(RtmpMessage::new(
            tag.tag_type,
            tag.stream_id,
            msg.timestamp.wrapping_add(tag.time.wrapping_sub(base)),
            body,
        ));
    }
    Ok(out)
}
