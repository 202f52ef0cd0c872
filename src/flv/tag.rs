use bytes::Bytes;

use crate::{ByteBuffer, Error, Result};

// Tag types
pub const TAG_AUDIO: u8 = 8;
pub const TAG_VIDEO: u8 = 9;
pub const TAG_AMF3: u8 = 15;
pub const TAG_AMF0: u8 = 18;

// Audio sound formats
pub const SOUND_MP3: u8 = 2;
pub const SOUND_NELLYMOSER_16KHZ_MONO: u8 = 4;
pub const SOUND_NELLYMOSER_8KHZ_MONO: u8 = 5;
pub const SOUND_NELLYMOSER: u8 = 6;
pub const SOUND_ALAW: u8 = 7;
pub const SOUND_MULAW: u8 = 8;
pub const SOUND_AAC: u8 = 10;
pub const SOUND_SPEEX: u8 = 11;

// Audio sound rates
pub const SOUND_5_5KHZ: u8 = 0;
pub const SOUND_11KHZ: u8 = 1;
pub const SOUND_22KHZ: u8 = 2;
pub const SOUND_44KHZ: u8 = 3;

// Audio sample sizes
pub const SOUND_8BIT: u8 = 0;
pub const SOUND_16BIT: u8 = 1;

// Audio channels
pub const SOUND_MONO: u8 = 0;
pub const SOUND_STEREO: u8 = 1;

// AAC packet types
pub const AAC_SEQHDR: u8 = 0;
pub const AAC_RAW: u8 = 1;

// AVC packet types
pub const AVC_SEQHDR: u8 = 0;
pub const AVC_NALU: u8 = 1;
pub const AVC_EOS: u8 = 2;

// Video frame types
pub const FRAME_KEY: u8 = 1;
pub const FRAME_INTER: u8 = 2;

// Video codecs
pub const VIDEO_H264: u8 = 7;
pub const VIDEO_H265: u8 = 12;

// File header flags
pub const FILE_HAS_AUDIO: u8 = 0x4;
pub const FILE_HAS_VIDEO: u8 = 0x1;

pub const TAG_HEADER_LENGTH: usize = 11;
pub const TAG_TRAILER_LENGTH: usize = 4;
pub const FILE_HEADER_LENGTH: usize = 13;

/// Maximum per-type payload header length a tag can need (audio 2, video 5)
pub const MAX_TAG_SUB_HEADER_LENGTH: usize = 5;

/// An FLV tag: the shared grammar of `.flv` files and RTMP media message
/// payloads. The payload sub-header fields (sound/frame/codec bits) are
/// decoded into struct fields; `data` holds the bytes after the sub-header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tag {
    pub tag_type: u8,

    // Audio sub-header
    pub sound_format: u8,
    pub sound_rate: u8,
    pub sound_size: u8,
    pub sound_type: u8,
    /// 0 = AAC sequence header, 1 = raw AAC frame
    pub aac_packet_type: u8,

    // Video sub-header
    pub frame_type: u8,
    pub video_format: u8,
    /// 0 = AVC sequence header, 1 = NALU, 2 = end of sequence
    pub avc_packet_type: u8,

    /// Timestamp in milliseconds (32-bit, extended high byte on the wire)
    pub time: u32,
    /// Composition time offset in milliseconds (signed, B-frames)
    pub ctime: i32,

    pub stream_id: u32,

    pub data: Bytes,
}

impl Tag {
    pub fn is_audio(&self) -> bool {
        self.tag_type == TAG_AUDIO
    }

    pub fn is_video(&self) -> bool {
        self.tag_type == TAG_VIDEO
    }

    pub fn is_script(&self) -> bool {
        self.tag_type == TAG_AMF0 || self.tag_type == TAG_AMF3
    }

    pub fn is_keyframe(&self) -> bool {
        self.is_video() && self.frame_type == FRAME_KEY
    }

    /// Parse the per-type payload sub-header, returning its length
    pub fn parse_sub_header(&mut self, b: &[u8]) -> Result<usize> {
        match self.tag_type {
            TAG_AUDIO => self.parse_audio_header(b),
            TAG_VIDEO => self.parse_video_header(b),
            _ => Ok(0),
        }
    }

    fn parse_audio_header(&mut self, b: &[u8]) -> Result<usize> {
        let head = &b[..b.len().min(MAX_TAG_SUB_HEADER_LENGTH)];
        let mut buf = ByteBuffer::new(head.to_vec());
        let flags = buf.read_u8()?;
        self.sound_format = flags >> 4;
        self.sound_rate = (flags >> 2) & 0x3;
        self.sound_size = (flags >> 1) & 0x1;
        self.sound_type = flags & 0x1;

        if self.sound_format == SOUND_AAC {
            self.aac_packet_type = buf.read_u8()?;
        }
        Ok(buf.position())
    }

    fn parse_video_header(&mut self, b: &[u8]) -> Result<usize> {
        let head = &b[..b.len().min(MAX_TAG_SUB_HEADER_LENGTH)];
        let mut buf = ByteBuffer::new(head.to_vec());
        let flags = buf.read_u8()?;
        self.frame_type = flags >> 4;
        self.video_format = flags & 0xF;

        if self.video_format == VIDEO_H264 || self.video_format == VIDEO_H265 {
            self.avc_packet_type = buf.read_u8()?;
            self.ctime = buf.read_i24_be()?;
        }
        Ok(buf.position())
    }

    /// Serialize the per-type payload sub-header
    pub fn fill_sub_header(&self) -> Vec<u8> {
        let mut buf = ByteBuffer::with_capacity(MAX_TAG_SUB_HEADER_LENGTH);
        match self.tag_type {
            TAG_AUDIO => {
                let flags = self.sound_format << 4
                    | self.sound_rate << 2
                    | self.sound_size << 1
                    | self.sound_type;
                buf.write_u8(flags).unwrap();
                if self.sound_format == SOUND_AAC {
                    buf.write_u8(self.aac_packet_type).unwrap();
                }
            }
            TAG_VIDEO => {
                buf.write_u8(self.frame_type << 4 | self.video_format).unwrap();
                if self.video_format == VIDEO_H264 || self.video_format == VIDEO_H265 {
                    buf.write_u8(self.avc_packet_type).unwrap();
                    buf.write_i24_be(self.ctime).unwrap();
                }
            }
            _ => {}
        }
        buf.into_vec()
    }

    /// Parse a complete tag body (sub-header + data) as carried by an RTMP
    /// media message
    pub fn parse_body(&mut self, body: Bytes) -> Result<()> {
        let n = self.parse_sub_header(&body)?;
        self.data = body.slice(n..);
        Ok(())
    }

    /// Serialize sub-header + data into one buffer
    pub fn body_bytes(&self) -> Vec<u8> {
        let header = self.fill_sub_header();
        let mut out = Vec::with_capacity(header.len() + self.data.len());
        out.extend_from_slice(&header);
        out.extend_from_slice(&self.data);
        out
    }
}

/// Parse the 11-byte tag header. Returns the tag shell and the declared
/// data length.
pub fn parse_tag_header(b: &[u8]) -> Result<(Tag, usize)> {
    if b.len() < TAG_HEADER_LENGTH {
        return Err(Error::protocol("FLV tag header truncated"));
    }
    let mut buf = ByteBuffer::new(b[..TAG_HEADER_LENGTH].to_vec());
    let tag_type = buf.read_u8()?;
    let datalen = buf.read_u24_be()? as usize;
    let ts_low = buf.read_u24_be()?;
    let ts_high = buf.read_u8()?;
    let stream_id = buf.read_u24_be()?;

    let tag = Tag {
        tag_type,
        time: ts_low | (ts_high as u32) << 24,
        stream_id,
        ..Tag::default()
    };
    Ok((tag, datalen))
}

/// Serialize the 11-byte tag header
pub fn fill_tag_header(tag: &Tag, datalen: usize) -> Vec<u8> {
    let mut buf = ByteBuffer::with_capacity(TAG_HEADER_LENGTH);
    buf.write_u8(tag.tag_type).unwrap();
    buf.write_u24_be(datalen as u32).unwrap();
    buf.write_u24_be(tag.time & 0xFF_FFFF).unwrap();
    buf.write_u8((tag.time >> 24) as u8).unwrap();
    buf.write_u24_be(tag.stream_id).unwrap();
    buf.into_vec()
}

/// Serialize the 4-byte tag trailer (total previous tag size)
pub fn fill_tag_trailer(datalen: usize) -> Vec<u8> {
    let mut buf = ByteBuffer::with_capacity(TAG_TRAILER_LENGTH);
    buf.write_u32_be((datalen + TAG_HEADER_LENGTH) as u32).unwrap();
    buf.into_vec()
}

/// Serialize the 9-byte file header plus the 4-byte PreviousTagSize0
pub fn fill_file_header(flags: u8) -> Vec<u8> {
    let mut buf = ByteBuffer::with_capacity(FILE_HEADER_LENGTH);
    // 'FLV', version 1
    buf.write_u32_be(0x464C_5601).unwrap();
    buf.write_u8(flags).unwrap();
    // data offset: size of the header itself
    buf.write_u32_be(9).unwrap();
    // PreviousTagSize0
    buf.write_u32_be(0).unwrap();
    buf.into_vec()
}

/// Parse the file header; returns (flags, bytes to skip after the header)
pub fn parse_file_header(b: &[u8]) -> Result<(u8, usize)> {
    if b.len() < FILE_HEADER_LENGTH {
        return Err(Error::protocol("FLV file header truncated"));
    }
    let mut buf = ByteBuffer::new(b[..FILE_HEADER_LENGTH].to_vec());
    let magic = buf.read_u24_be()?;
    if magic != 0x464C56 {
        return Err(Error::protocol(format!(
            "bad FLV signature 0x{:06x}",
            magic
        )));
    }
    let _version = buf.read_u8()?;
    let flags = buf.read_u8()?;
    let data_offset = buf.read_u32_be()? as i64;
    let skip = data_offset - 9;
    if skip < 0 {
        return Err(Error::protocol(format!(
            "bad FLV data offset {}",
            data_offset
        )));
    }
    Ok((flags, skip as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_header_video_only() {
        // HasVideo=true, HasAudio=false
        let bytes = fill_file_header(FILE_HAS_VIDEO);
        assert_eq!(
            bytes,
            vec![0x46, 0x4C, 0x56, 0x01, 0x01, 0x00, 0x00, 0x00, 0x09, 0x00, 0x00, 0x00, 0x00]
        );

        let (flags, skip) = parse_file_header(&bytes).unwrap();
        assert_eq!(flags, FILE_HAS_VIDEO);
        assert_eq!(skip, 0);
    }

    #[test]
    fn test_file_header_bad_signature() {
        let bytes = [0x4D, 0x50, 0x34, 0x01, 0x05, 0, 0, 0, 9, 0, 0, 0, 0];
        assert!(parse_file_header(&bytes).is_err());
    }

    #[test]
    fn test_tag_header_round_trip() {
        let tag = Tag {
            tag_type: TAG_VIDEO,
            time: 0x0123_4567, // exercises the extended high byte
            stream_id: 0,
            ..Tag::default()
        };
        let header = fill_tag_header(&tag, 100);
        assert_eq!(header.len(), TAG_HEADER_LENGTH);

        let (parsed, datalen) = parse_tag_header(&header).unwrap();
        assert_eq!(parsed.tag_type, TAG_VIDEO);
        assert_eq!(parsed.time, 0x0123_4567);
        assert_eq!(datalen, 100);
    }

    #[test]
    fn test_audio_sub_header_aac() {
        let tag = Tag {
            tag_type: TAG_AUDIO,
            sound_format: SOUND_AAC,
            sound_rate: SOUND_44KHZ,
            sound_size: SOUND_16BIT,
            sound_type: SOUND_STEREO,
            aac_packet_type: AAC_RAW,
            ..Tag::default()
        };
        let bytes = tag.fill_sub_header();
        assert_eq!(bytes, vec![0xAF, 0x01]);

        let mut parsed = Tag {
            tag_type: TAG_AUDIO,
            ..Tag::default()
        };
        let n = parsed.parse_sub_header(&bytes).unwrap();
        assert_eq!(n, 2);
        assert_eq!(parsed.sound_format, SOUND_AAC);
        assert_eq!(parsed.sound_rate, SOUND_44KHZ);
        assert_eq!(parsed.aac_packet_type, AAC_RAW);
    }

    #[test]
    fn test_video_sub_header_h264() {
        let tag = Tag {
            tag_type: TAG_VIDEO,
            frame_type: FRAME_KEY,
            video_format: VIDEO_H264,
            avc_packet_type: AVC_NALU,
            ctime: -40,
            ..Tag::default()
        };
        let bytes = tag.fill_sub_header();
        assert_eq!(bytes.len(), 5);
        assert_eq!(bytes[0], 0x17);
        assert_eq!(bytes[1], AVC_NALU);

        let mut parsed = Tag {
            tag_type: TAG_VIDEO,
            ..Tag::default()
        };
        let n = parsed.parse_sub_header(&bytes).unwrap();
        assert_eq!(n, 5);
        assert_eq!(parsed.frame_type, FRAME_KEY);
        assert_eq!(parsed.video_format, VIDEO_H264);
        assert_eq!(parsed.ctime, -40);
    }

    #[test]
    fn test_body_round_trip() {
        let tag = Tag {
            tag_type: TAG_VIDEO,
            frame_type: FRAME_INTER,
            video_format: VIDEO_H264,
            avc_packet_type: AVC_NALU,
            ctime: 33,
            data: Bytes::from_static(&[0x00, 0x00, 0x00, 0x02, 0x41, 0x9A]),
            ..Tag::default()
        };
        let body = tag.body_bytes();

        let mut parsed = Tag {
            tag_type: TAG_VIDEO,
            ..Tag::default()
        };
        parsed.parse_body(Bytes::from(body)).unwrap();
        assert_eq!(parsed.frame_type, FRAME_INTER);
        assert_eq!(parsed.ctime, 33);
        assert_eq!(parsed.data, tag.data);
    }

    #[test]
    fn test_script_tag_has_no_sub_header() {
        let mut tag = Tag {
            tag_type: TAG_AMF0,
            ..Tag::default()
        };
        tag.parse_body(Bytes::from_static(&[0x02, 0x00, 0x01, b'x'])).unwrap();
        assert_eq!(tag.data.len(), 4);
    }
}
