use std::time::Duration;

use bytes::Bytes;

use crate::{BitReader, BitWriter, Error, Result};

// MPEG-4 audio object types, from the ISO 14496-3 table
pub const AOT_AAC_MAIN: u32 = 1;
pub const AOT_AAC_LC: u32 = 2;
pub const AOT_AAC_SSR: u32 = 3;
pub const AOT_AAC_LTP: u32 = 4;
pub const AOT_SBR: u32 = 5;
pub const AOT_ESCAPE: u32 = 31;

/// Sample-rate index → Hz
pub const SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// Channel position bitmask
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelLayout(pub u16);

pub const CH_FRONT_CENTER: ChannelLayout = ChannelLayout(1 << 0);
pub const CH_FRONT_LEFT: ChannelLayout = ChannelLayout(1 << 1);
pub const CH_FRONT_RIGHT: ChannelLayout = ChannelLayout(1 << 2);
pub const CH_BACK_CENTER: ChannelLayout = ChannelLayout(1 << 3);
pub const CH_BACK_LEFT: ChannelLayout = ChannelLayout(1 << 4);
pub const CH_BACK_RIGHT: ChannelLayout = ChannelLayout(1 << 5);
pub const CH_SIDE_LEFT: ChannelLayout = ChannelLayout(1 << 6);
pub const CH_SIDE_RIGHT: ChannelLayout = ChannelLayout(1 << 7);
pub const CH_LOW_FREQ: ChannelLayout = ChannelLayout(1 << 8);

pub const CH_MONO: ChannelLayout = CH_FRONT_CENTER;
pub const CH_STEREO: ChannelLayout = ChannelLayout(CH_FRONT_LEFT.0 | CH_FRONT_RIGHT.0);

impl ChannelLayout {
    pub const fn union(self, other: ChannelLayout) -> ChannelLayout {
        ChannelLayout(self.0 | other.0)
    }

    /// Number of channel positions set
    pub fn count(self) -> u32 {
        self.0.count_ones()
    }
}

/// Channel configuration index (1..=7) → standard layout
const CHANNEL_CONFIGS: [ChannelLayout; 8] = [
    ChannelLayout(0),
    CH_MONO,
    CH_STEREO,
    CH_STEREO.union(CH_FRONT_CENTER),
    CH_STEREO.union(CH_FRONT_CENTER).union(CH_BACK_CENTER),
    CH_STEREO
        .union(CH_FRONT_CENTER)
        .union(CH_BACK_LEFT)
        .union(CH_BACK_RIGHT),
    CH_STEREO
        .union(CH_FRONT_CENTER)
        .union(CH_BACK_LEFT)
        .union(CH_BACK_RIGHT)
        .union(CH_LOW_FREQ),
    CH_STEREO
        .union(CH_FRONT_CENTER)
        .union(CH_SIDE_LEFT)
        .union(CH_SIDE_RIGHT)
        .union(CH_BACK_LEFT)
        .union(CH_BACK_RIGHT)
        .union(CH_LOW_FREQ),
];

/// The MPEG-4 AudioSpecificConfig fields plus the values derived from the
/// index tables
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Mpeg4AudioConfig {
    pub object_type: u32,
    pub sample_rate_index: u32,
    pub channel_config: u32,
    pub sample_rate: u32,
    pub channel_layout: ChannelLayout,
}

impl Mpeg4AudioConfig {
    pub fn is_valid(&self) -> bool {
        self.object_type > 0
    }

    /// Fill the derived fields from the index tables
    fn complete(&mut self) -> Result<()> {
        if (self.sample_rate_index as usize) < SAMPLE_RATES.len() {
            self.sample_rate = SAMPLE_RATES[self.sample_rate_index as usize];
        } else {
            return Err(Error::codec(format!(
                "invalid sample rate index {}",
                self.sample_rate_index
            )));
        }
        if (self.channel_config as usize) < CHANNEL_CONFIGS.len() {
            self.channel_layout = CHANNEL_CONFIGS[self.channel_config as usize];
        } else {
            return Err(Error::codec(format!(
                "invalid channel config {}",
                self.channel_config
            )));
        }
        Ok(())
    }

    /// Parse an AudioSpecificConfig byte block
    pub fn parse(data: &[u8]) -> Result<Mpeg4AudioConfig> {
        let mut r = BitReader::new(data);
        let bits = |e: std::io::Error| Error::codec(format!("AudioSpecificConfig truncated: {}", e));

        let mut config = Mpeg4AudioConfig::default();
        config.object_type = r.read_bits(5).map_err(bits)?;
        if config.object_type == AOT_ESCAPE {
            config.object_type = 32 + r.read_bits(6).map_err(bits)?;
        }
        config.sample_rate_index = r.read_bits(4).map_err(bits)?;
        if config.sample_rate_index == 0xF {
            // explicit frequency; keep the index sentinel and the value
            config.sample_rate_index = r.read_bits(24).map_err(bits)?;
        }
        config.channel_config = r.read_bits(4).map_err(bits)?;
        config.complete()?;
        Ok(config)
    }

    /// Build the AudioSpecificConfig byte block
    pub fn fill(&self) -> Vec<u8> {
        let mut config = *self;
        let mut w = BitWriter::new();

        if config.object_type >= 32 {
            w.write_bits(AOT_ESCAPE, 5);
            w.write_bits(config.object_type - 32, 6);
        } else {
            w.write_bits(config.object_type, 5);
        }

        if config.sample_rate_index == 0 && config.sample_rate != 0 {
            for (i, &rate) in SAMPLE_RATES.iter().enumerate() {
                if rate == config.sample_rate {
                    config.sample_rate_index = i as u32;
                }
            }
        }
        if config.sample_rate_index >= 0xF {
            w.write_bits(0xF, 4);
            w.write_bits(config.sample_rate_index, 24);
        } else {
            w.write_bits(config.sample_rate_index, 4);
        }

        if config.channel_config == 0 && config.channel_layout.0 != 0 {
            for (i, &layout) in CHANNEL_CONFIGS.iter().enumerate() {
                if layout == config.channel_layout {
                    config.channel_config = i as u32;
                }
            }
        }
        w.write_bits(config.channel_config, 4);

        w.finish()
    }
}

pub const ADTS_HEADER_LENGTH: usize = 7;

/// Parse an ADTS header. Returns the parsed config, the header length
/// (7 or 9 with CRC), the full frame length, and the sample count.
pub fn parse_adts_header(frame: &[u8]) -> Result<(Mpeg4AudioConfig, usize, usize, usize)> {
    if frame.len() < ADTS_HEADER_LENGTH {
        return Err(Error::codec("ADTS header truncated"));
    }
    if frame[0] != 0xFF || frame[1] & 0xF6 != 0xF0 {
        return Err(Error::codec("not an ADTS header"));
    }

    let mut config = Mpeg4AudioConfig {
        object_type: (frame[2] >> 6) as u32 + 1,
        sample_rate_index: (frame[2] >> 2 & 0xF) as u32,
        channel_config: (frame[2] << 2 & 0x4 | frame[3] >> 6 & 0x3) as u32,
        ..Mpeg4AudioConfig::default()
    };
    if config.channel_config == 0 {
        return Err(Error::codec("ADTS channel count invalid"));
    }
    config.complete()?;

    let framelen =
        ((frame[3] & 0x3) as usize) << 11 | (frame[4] as usize) << 3 | (frame[5] >> 5) as usize;
    let samples = ((frame[6] & 0x3) as usize + 1) * 1024;
    let hdrlen = if frame[1] & 0x1 == 0 { 9 } else { 7 };
    if framelen < hdrlen {
        return Err(Error::codec(format!(
            "ADTS frame length {} shorter than header {}",
            framelen, hdrlen
        )));
    }
    Ok((config, hdrlen, framelen, samples))
}

/// Fill a 7-byte ADTS header (no CRC) for a payload of the given length
pub fn fill_adts_header(
    header: &mut [u8; ADTS_HEADER_LENGTH],
    config: &Mpeg4AudioConfig,
    samples: usize,
    payload_len: usize,
) {
    let framelen = payload_len + ADTS_HEADER_LENGTH;

    let mut object_type = config.object_type;
    // HE-AAC signals SBR out of band; ADTS carries the LC core
    if object_type >= AOT_SBR {
        object_type = AOT_AAC_LC;
    }

    header[0] = 0xFF;
    header[1] = 0xF1;
    header[2] = ((object_type - 1) as u8 & 0x3) << 6
        | (config.sample_rate_index as u8 & 0xF) << 2
        | (config.channel_config >> 2) as u8 & 0x1;
    header[3] = (config.channel_config as u8 & 0x3) << 6 | (framelen >> 11) as u8 & 0x3;
    header[4] = (framelen >> 3) as u8;
    header[5] = ((framelen as u8) & 0x7) << 5 | 0x1F;
    header[6] = 0xFC | (samples / 1024 - 1) as u8;
}

/// AAC decoder configuration: the raw AudioSpecificConfig bytes plus the
/// parsed fields. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct AacCodec {
    pub config_bytes: Bytes,
    pub config: Mpeg4AudioConfig,
}

impl AacCodec {
    /// Parse an AudioSpecificConfig block into a codec handle
    pub fn from_config_bytes(b: Bytes) -> Result<AacCodec> {
        if b.is_empty() {
            return Err(Error::codec("empty AudioSpecificConfig"));
        }
        let config = Mpeg4AudioConfig::parse(&b)?;
        Ok(AacCodec {
            config_bytes: b,
            config,
        })
    }

    /// Duration of one AAC frame (1024 samples)
    pub fn packet_duration(&self) -> Duration {
        Duration::from_secs(1024) / self.config.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_lc_44100_stereo() {
        // 00010 0100 0010 ... = LC, index 4 (44100), stereo
        let config = Mpeg4AudioConfig::parse(&[0x12, 0x10]).unwrap();
        assert_eq!(config.object_type, AOT_AAC_LC);
        assert_eq!(config.sample_rate_index, 4);
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.channel_config, 2);
        assert_eq!(config.channel_layout, CH_STEREO);
        assert_eq!(config.channel_layout.count(), 2);
    }

    #[test]
    fn test_config_round_trip() {
        for bytes in [[0x12u8, 0x10], [0x11, 0x90], [0x15, 0x88]] {
            let config = Mpeg4AudioConfig::parse(&bytes).unwrap();
            assert_eq!(config.fill(), bytes.to_vec());
        }
    }

    #[test]
    fn test_config_invalid_sample_rate_index() {
        // index 13 is out of the table
        let err = Mpeg4AudioConfig::parse(&[0x13, 0x50]).unwrap_err();
        assert!(matches!(err, Error::Codec(_)));
    }

    #[test]
    fn test_adts_round_trip() {
        let config = Mpeg4AudioConfig::parse(&[0x12, 0x10]).unwrap();
        let payload_len = 371;

        let mut header = [0u8; ADTS_HEADER_LENGTH];
        fill_adts_header(&mut header, &config, 1024, payload_len);

        let mut frame = header.to_vec();
        frame.resize(payload_len + ADTS_HEADER_LENGTH, 0);

        let (parsed, hdrlen, framelen, samples) = parse_adts_header(&frame).unwrap();
        assert_eq!(hdrlen, 7);
        assert_eq!(framelen, payload_len + 7);
        assert_eq!(samples, 1024);
        assert_eq!(parsed.object_type, AOT_AAC_LC);
        assert_eq!(parsed.sample_rate, 44100);
        assert_eq!(parsed.channel_config, 2);
    }

    #[test]
    fn test_adts_rejects_short_frame_length() {
        let config = Mpeg4AudioConfig::parse(&[0x12, 0x10]).unwrap();
        let mut header = [0u8; ADTS_HEADER_LENGTH];
        fill_adts_header(&mut header, &config, 1024, 0);
        // rewrite frame length to 3, below the header length
        header[3] &= 0xFC;
        header[4] = 0;
        header[5] = (3u8 & 0x7) << 5 | 0x1F;
        assert!(parse_adts_header(&header).is_err());
    }

    #[test]
    fn test_adts_rejects_bad_sync() {
        let frame = [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE];
        assert!(parse_adts_header(&frame).is_err());
    }

    #[test]
    fn test_packet_duration() {
        let codec = AacCodec::from_config_bytes(Bytes::from_static(&[0x12, 0x10])).unwrap();
        let dur = codec.packet_duration();
        // 1024 / 44100 ≈ 23.2ms
        assert!(dur > Duration::from_millis(23) && dur < Duration::from_millis(24));
    }

    #[test]
    fn test_escape_object_type_round_trip() {
        let config = Mpeg4AudioConfig {
            object_type: 34,
            sample_rate_index: 4,
            channel_config: 2,
            ..Mpeg4AudioConfig::default()
        };
        let bytes = config.fill();
        let parsed = Mpeg4AudioConfig::parse(&bytes).unwrap();
        assert_eq!(parsed.object_type, 34);
        assert_eq!(parsed.sample_rate, 44100);
    }
}
