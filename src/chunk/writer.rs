use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::protocol::{DEFAULT_CHUNK_SIZE, TIMESTAMP_EXTENDED};
use crate::{ByteBuffer, Error, Result};

/// Chunk muxer. Each message goes out as one fmt-0 chunk followed by fmt-3
/// continuations at the negotiated chunk size; the caller supplies an
/// optional header prefix (the FLV tag sub-header) that is chunk-accounted
/// together with the payload.
pub struct ChunkWriter<W> {
    inner: W,
    max_chunk_size: usize,
}

/// Encode the chunk basic header for any of the three csid ranges
pub fn encode_basic_header(fmt: u8, csid: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(3);
    if csid <= 63 {
        out.push(fmt << 6 | csid as u8);
    } else if csid <= 319 {
        out.push(fmt << 6);
        out.push((csid - 64) as u8);
    } else {
        out.push(fmt << 6 | 1);
        out.extend_from_slice(&((csid - 64) as u16).to_be_bytes());
    }
    out
}

impl<W: AsyncWrite + Unpin> ChunkWriter<W> {
    pub fn new(inner: W) -> Self {
        ChunkWriter {
            inner,
            max_chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set the outgoing chunk size. The peer learns about it through the
    /// SetChunkSize control message the connection sends.
    pub fn set_max_chunk_size(&mut self, size: usize) {
        self.max_chunk_size = size;
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Direct access to the transport, for the handshake phase
    pub fn inner_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Write one message as a chunk run
    pub async fn write_message(
        &mut self,
        csid: u32,
        type_id: u8,
        stream_id: u32,
        timestamp: u32,
        prefix: &[u8],
        data: &[u8],
    ) -> Result<()> {
        if prefix.len() > self.max_chunk_size {
            return Err(Error::chunk(format!(
                "header prefix {} exceeds chunk size {}",
                prefix.len(),
                self.max_chunk_size
            )));
        }
        let total = prefix.len() + data.len();

        // fmt-0 chunk header
        let mut head = ByteBuffer::with_capacity(18 + prefix.len());
        head.write_bytes(&encode_basic_header(0, csid))?;
        if timestamp >= TIMESTAMP_EXTENDED {
            head.write_u24_be(TIMESTAMP_EXTENDED)?;
        } else {
            head.write_u24_be(timestamp)?;
        }
        head.write_u24_be(total as u32)?;
        head.write_u8(type_id)?;
        head.write_u32_le(stream_id)?;
        if timestamp >= TIMESTAMP_EXTENDED {
            head.write_u32_be(timestamp)?;
        }
        head.write_bytes(prefix)?;
        self.inner.write_all(head.as_slice()).await?;

        // payload in chunk-size runs; the prefix consumed part of the
        // first chunk's budget
        let mut chunk_left = self.max_chunk_size - prefix.len();
        let mut offset = 0usize;
        let mut first = true;
        while offset < data.len() || (first && data.is_empty()) {
            if !first {
                let mut cont = ByteBuffer::with_capacity(7);
                cont.write_bytes(&encode_basic_header(3, csid))?;
                if timestamp >= TIMESTAMP_EXTENDED {
                    cont.write_u32_be(timestamp)?;
                }
                self.inner.write_all(cont.as_slice()).await?;
            }
            let n = (data.len() - offset).min(chunk_left);
            self.inner.write_all(&data[offset..offset + n]).await?;
            offset += n;
            chunk_left = self.max_chunk_size;
            first = false;
        }

        Ok(())
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.inner.flush().await?;
        Ok(())
    }
}
