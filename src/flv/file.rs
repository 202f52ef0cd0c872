use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::av::{Packet, PacketReader, PacketWriter};
use crate::bridge::{PacketToTag, TagToPacket};
use crate::flv::tag::{
    self, fill_file_header, fill_tag_header, fill_tag_trailer, parse_file_header,
    parse_tag_header, Tag, FILE_HEADER_LENGTH, TAG_HEADER_LENGTH, TAG_TRAILER_LENGTH,
};
use crate::{Error, Result};

/// FLV muxer over any async byte sink. The file header is written lazily
/// before the first tag so the audio/video presence flags can be set up
/// front.
pub struct FlvWriter<W> {
    w: W,
    pub has_video: bool,
    pub has_audio: bool,
    header_written: bool,
    bridge: PacketToTag,
}

impl<W: AsyncWrite + Unpin + Send> FlvWriter<W> {
    pub fn new(w: W) -> Self {
        FlvWriter {
            w,
            has_video: true,
            has_audio: true,
            header_written: false,
            bridge: PacketToTag::new(),
        }
    }

    pub async fn write_file_header(&mut self) -> Result<()> {
        if self.header_written {
            return Ok(());
        }
        let mut flags = 0u8;
        if self.has_video {
            flags |= tag::FILE_HAS_VIDEO;
        }
        if self.has_audio {
            flags |= tag::FILE_HAS_AUDIO;
        }
        self.w.write_all(&fill_file_header(flags)).await?;
        self.header_written = true;
        Ok(())
    }

    /// Write header, payload, and trailer as one logical write
    pub async fn write_tag(&mut self, t: &Tag) -> Result<()> {
        self.write_file_header().await?;

        let body = t.body_bytes();
        let mut out = Vec::with_capacity(TAG_HEADER_LENGTH + body.len() + TAG_TRAILER_LENGTH);
        out.extend_from_slice(&fill_tag_header(t, body.len()));
        out.extend_from_slice(&body);
        out.extend_from_slice(&fill_tag_trailer(body.len()));
        self.w.write_all(&out).await?;
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.w.flush().await?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.w
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> PacketWriter for FlvWriter<W> {
    async fn write_packet(&mut self, pkt: Packet) -> Result<()> {
        for t in self.bridge.tags(&pkt)? {
            self.write_tag(&t).await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        FlvWriter::flush(self).await
    }
}

/// FLV demuxer over any async byte source
pub struct FlvReader<R> {
    r: R,
    got_header: bool,
    bridge: TagToPacket,
}

impl<R: AsyncRead + Unpin + Send> FlvReader<R> {
    pub fn new(r: R) -> Self {
        FlvReader {
            r,
            got_header: false,
            bridge: TagToPacket::new(),
        }
    }

    pub async fn read_file_header(&mut self) -> Result<()> {
        if self.got_header {
            return Ok(());
        }
        let mut buf = [0u8; FILE_HEADER_LENGTH];
        self.r.read_exact(&mut buf).await?;
        let (_flags, skip) = parse_file_header(&buf)?;
        if skip > 0 {
            // tolerate nonstandard data offsets
            let mut rest = vec![0u8; skip];
            self.r.read_exact(&mut rest).await?;
        }
        self.got_header = true;
        Ok(())
    }

    /// Read one tag: exactly `datalen` payload bytes, trailer discarded
    pub async fn read_tag(&mut self) -> Result<Tag> {
        self.read_file_header().await?;

        let mut header = [0u8; TAG_HEADER_LENGTH];
        self.r.read_exact(&mut header).await?;
        let (mut t, datalen) = parse_tag_header(&header)?;
        check_tag_size(datalen)?;

        let mut data = vec![0u8; datalen];
        self.r.read_exact(&mut data).await?;
        t.parse_body(Bytes::from(data))?;

        let mut trailer = [0u8; TAG_TRAILER_LENGTH];
        self.r.read_exact(&mut trailer).await?;
        Ok(t)
    }

    pub fn into_inner(self) -> R {
        self.r
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> PacketReader for FlvReader<R> {
    async fn read_packet(&mut self) -> Result<Packet> {
        loop {
            let t = self.read_tag().await?;
            if let Some(pkt) = self.bridge.packet(&t)? {
                return Ok(pkt);
            }
        }
    }
}

/// Guard against absurd tag sizes when reading untrusted files
pub fn check_tag_size(datalen: usize) -> Result<()> {
    const MAX_TAG_SIZE: usize = 16 * 1024 * 1024;
    if datalen > MAX_TAG_SIZE {
        return Err(Error::protocol(format!("FLV tag size {} too large", datalen)));
    }
    Ok(())
}
