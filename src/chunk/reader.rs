use std::collections::{HashMap, VecDeque};

use log::trace;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::chunk::stream::ChunkState;
use crate::protocol::{msg_type_name, RtmpMessage, DEFAULT_CHUNK_SIZE, MAX_CHUNK_STREAMS, TIMESTAMP_EXTENDED};
use crate::{Error, Result};

/// Chunk demuxer. Owns the read half of the connection, the per-csid
/// reassembly states, and the cumulative byte counter the ack window is
/// measured against.
pub struct ChunkReader<R> {
    inner: R,

    /// Bytes peeked off the stream but not yet consumed (the fmt-3
    /// extended-timestamp disambiguation needs a 4-byte lookahead)
    pending: VecDeque<u8>,

    streams: HashMap<u32, ChunkState>,

    /// Negotiated incoming chunk size
    max_chunk_size: usize,

    /// Cumulative bytes consumed, wrapping; the ack watermark
    bytes_read: u32,
}

impl<R: AsyncRead + Unpin> ChunkReader<R> {
    pub fn new(inner: R) -> Self {
        ChunkReader {
            inner,
            pending: VecDeque::new(),
            streams: HashMap::new(),
            max_chunk_size: DEFAULT_CHUNK_SIZE,
            bytes_read: 0,
        }
    }

    /// Set the incoming chunk size (SetChunkSize control message)
    pub fn set_max_chunk_size(&mut self, size: usize) {
        self.max_chunk_size = size;
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Cumulative bytes consumed from the socket
    pub fn bytes_read(&self) -> u32 {
        self.bytes_read
    }

    /// Direct access to the transport, for the handshake phase
    pub fn inner_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read exactly buf.len() bytes, serving peeked bytes first
    async fn read_exact_buf(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut i = 0;
        while i < buf.len() {
            match self.pending.pop_front() {
                Some(b) => {
                    buf[i] = b;
                    i += 1;
                }
                None => break,
            }
        }
        if i < buf.len() {
            self.inner.read_exact(&mut buf[i..]).await?;
        }
        self.bytes_read = self.bytes_read.wrapping_add(buf.len() as u32);
        Ok(())
    }

    /// Look at the next 4 bytes without consuming them
    async fn peek4(&mut self) -> Result<[u8; 4]> {
        while self.pending.len() < 4 {
            let mut b = [0u8; 4];
            let need = 4 - self.pending.len();
            self.inner.read_exact(&mut b[..need]).await?;
            self.pending.extend(&b[..need]);
        }
        let mut out = [0u8; 4];
        for (i, b) in self.pending.iter().take(4).enumerate() {
            out[i] = *b;
        }
        Ok(out)
    }

    async fn read_u8(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.read_exact_buf(&mut b).await?;
        Ok(b[0])
    }

    async fn read_u32_be(&mut self) -> Result<u32> {
        let mut b = [0u8; 4];
        self.read_exact_buf(&mut b).await?;
        Ok(u32::from_be_bytes(b))
    }

    /// Read one chunk off the wire. Returns a message when the chunk
    /// completes one, `None` when more chunks are needed.
    pub async fn read_chunk(&mut self) -> Result<Option<RtmpMessage>> {
        let first = self.read_u8().await?;
        let fmt = first >> 6;
        let csid = match first & 0x3F {
            0 => {
                // 2-byte form
                self.read_u8().await? as u32 + 64
            }
            1 => {
                // 3-byte form
                let mut b = [0u8; 2];
                self.read_exact_buf(&mut b).await?;
                u16::from_be_bytes(b) as u32 + 64
            }
            n => n as u32,
        };

        let is_new = !self.streams.contains_key(&csid);
        if is_new {
            self.streams.insert(csid, ChunkState::new());
            if self.streams.len() > MAX_CHUNK_STREAMS {
                return Err(Error::chunk(format!(
                    "too many chunk streams ({})",
                    self.streams.len()
                )));
            }
        }

        match fmt {
            0 => {
                if self.state(csid).is_assembling() {
                    return Err(Error::chunk("fmt 0 header arrived mid-message"));
                }
                let mut h = [0u8; 11];
                self.read_exact_buf(&mut h).await?;
                let mut timestamp =
                    u32::from_be_bytes([0, h[0], h[1], h[2]]);
                let message_length = u32::from_be_bytes([0, h[3], h[4], h[5]]);
                let type_id = h[6];
                let stream_id = u32::from_le_bytes([h[7], h[8], h[9], h[10]]);

                let has_ext = timestamp == TIMESTAMP_EXTENDED;
                if has_ext {
                    timestamp = self.read_u32_be().await?;
                }

                let state = self.state(csid);
                state.header_type = 0;
                state.message_length = message_length;
                state.type_id = type_id;
                state.stream_id = stream_id;
                state.has_ext_timestamp = has_ext;
                if has_ext {
                    state.ext_timestamp = timestamp;
                }
                state.timestamp = timestamp;
                state.start_message()?;
            }

            1 => {
                if is_new {
                    return Err(Error::chunk("fmt 1 header with no prior chunk state"));
                }
                if self.state(csid).is_assembling() {
                    return Err(Error::chunk("fmt 1 header arrived mid-message"));
                }
                let mut h = [0u8; 7];
                self.read_exact_buf(&mut h).await?;
                let mut delta = u32::from_be_bytes([0, h[0], h[1], h[2]]);
                let message_length = u32::from_be_bytes([0, h[3], h[4], h[5]]);
                let type_id = h[6];

                let has_ext = delta == TIMESTAMP_EXTENDED;
                if has_ext {
                    delta = self.read_u32_be().await?;
                }

                let state = self.state(csid);
                state.header_type = 1;
                state.message_length = message_length;
                state.type_id = type_id;
                state.has_ext_timestamp = has_ext;
                if has_ext {
                    state.ext_timestamp = delta;
                }
                state.timestamp_delta = delta;
                state.timestamp = state.timestamp.wrapping_add(delta);
                state.start_message()?;
            }

            2 => {
                if is_new {
                    return Err(Error::chunk("fmt 2 header with no prior chunk state"));
                }
                if self.state(csid).is_assembling() {
                    return Err(Error::chunk("fmt 2 header arrived mid-message"));
                }
                let mut h = [0u8; 3];
                self.read_exact_buf(&mut h).await?;
                let mut delta = u32::from_be_bytes([0, h[0], h[1], h[2]]);

                let has_ext = delta == TIMESTAMP_EXTENDED;
                if has_ext {
                    delta = self.read_u32_be().await?;
                }

                let state = self.state(csid);
                state.header_type = 2;
                state.has_ext_timestamp = has_ext;
                if has_ext {
                    state.ext_timestamp = delta;
                }
                state.timestamp_delta = delta;
                state.timestamp = state.timestamp.wrapping_add(delta);
                state.start_message()?;
            }

            3 => {
                if is_new {
                    return Err(Error::chunk("fmt 3 header with no prior chunk state"));
                }
                if !self.state(csid).is_assembling() {
                    // a fresh message inheriting every header field
                    let (header_type, has_ext) = {
                        let s = self.state(csid);
                        (s.header_type, s.has_ext_timestamp)
                    };
                    match header_type {
                        0 => {
                            if has_ext {
                                let ts = self.read_u32_be().await?;
                                let state = self.state(csid);
                                state.timestamp = ts;
                                state.ext_timestamp = ts;
                            }
                        }
                        _ => {
                            let delta = if has_ext {
                                self.read_u32_be().await?
                            } else {
                                self.state(csid).timestamp_delta
                            };
                            let state = self.state(csid);
                            state.timestamp = state.timestamp.wrapping_add(delta);
                        }
                    }
                    self.state(csid).start_message()?;
                } else if self.state(csid).has_ext_timestamp {
                    // Adobe-style writers repeat the extended timestamp on
                    // every continuation chunk, FFmpeg-style writers do
                    // not: consume it only when the lookahead matches
                    let ext = self.state(csid).ext_timestamp;
                    let peeked = self.peek4().await?;
                    if u32::from_be_bytes(peeked) == ext {
                        let mut b = [0u8; 4];
                        self.read_exact_buf(&mut b).await?;
                    }
                }
            }

            _ => unreachable!("2-bit fmt"),
        }

        let max_chunk = self.max_chunk_size;
        let size = (self.state(csid).bytes_left as usize).min(max_chunk);
        let mut payload = vec![0u8; size];
        self.read_exact_buf(&mut payload).await?;

        let state = self.state(csid);
        let done = state.add_chunk_data(&payload);
        if let Some(msg) = &done {
            trace!(
                "message type={} sid={} ts={} len={}",
                msg_type_name(msg.type_id),
                msg.stream_id,
                msg.timestamp,
                msg.data.len()
            );
        }
        Ok(done)
    }

    /// Read chunks until a full message is assembled
    pub async fn read_message(&mut self) -> Result<RtmpMessage> {
        loop {
            if let Some(msg) = self.read_chunk().await? {
                return Ok(msg);
            }
        }
    }

    fn state(&mut self, csid: u32) -> &mut ChunkState {
        self.streams.get_mut(&csid).expect("chunk state exists")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::writer::ChunkWriter;
    use crate::protocol::MSG_TYPE_VIDEO;

    async fn encode<F, Fut>(f: F) -> Vec<u8>
    where
        F: FnOnce(ChunkWriter<Vec<u8>>) -> Fut,
        Fut: std::future::Future<Output = ChunkWriter<Vec<u8>>>,
    {
        let writer = ChunkWriter::new(Vec::new());
        let writer = f(writer).await;
        writer.into_inner()
    }

    #[tokio::test]
    async fn test_single_chunk_message() {
        let data = vec![0xAB; 100];
        let wire = {
            let d = data.clone();
            encode(|mut w| async move {
                w.write_message(6, MSG_TYPE_VIDEO, 1, 1000, &[], &d).await.unwrap();
                w.flush().await.unwrap();
                w
            })
            .await
        };

        let mut reader = ChunkReader::new(&wire[..]);
        let msg = reader.read_message().await.unwrap();
        assert_eq!(msg.type_id, MSG_TYPE_VIDEO);
        assert_eq!(msg.stream_id, 1);
        assert_eq!(msg.timestamp, 1000);
        assert_eq!(msg.data.as_ref(), &data[..]);
        assert_eq!(reader.bytes_read() as usize, wire.len());
    }

    #[tokio::test]
    async fn test_multi_chunk_reassembly() {
        // 300 bytes at the default 128-byte chunk size → 3 chunks
        let data: Vec<u8> = (0..300u32).map(|i| i as u8).collect();
        let wire = {
            let d = data.clone();
            encode(|mut w| async move {
                w.write_message(6, MSG_TYPE_VIDEO, 1, 42, &[], &d).await.unwrap();
                w.flush().await.unwrap();
                w
            })
            .await
        };

        let mut reader = ChunkReader::new(&wire[..]);
        // first two chunks do not complete the message
        assert!(reader.read_chunk().await.unwrap().is_none());
        assert!(reader.read_chunk().await.unwrap().is_none());
        let msg = reader.read_chunk().await.unwrap().unwrap();
        assert_eq!(msg.data.as_ref(), &data[..]);
    }

    #[tokio::test]
    async fn test_message_with_header_prefix() {
        let prefix = [0x17, 0x01, 0x00, 0x00, 0x00];
        let body = vec![0x65, 0x88, 0x80];
        let wire = {
            let b = body.clone();
            encode(|mut w| async move {
                w.write_message(6, MSG_TYPE_VIDEO, 1, 0, &prefix, &b).await.unwrap();
                w.flush().await.unwrap();
                w
            })
            .await
        };

        let mut reader = ChunkReader::new(&wire[..]);
        let msg = reader.read_message().await.unwrap();
        assert_eq!(msg.data.len(), prefix.len() + body.len());
        assert_eq!(&msg.data[..5], &prefix[..]);
    }

    #[tokio::test]
    async fn test_extended_timestamp_round_trip() {
        let ts = 0x0100_0000u32; // above the 0xFFFFFF sentinel
        let data = vec![1u8; 200]; // forces a fmt-3 continuation too
        let wire = {
            let d = data.clone();
            encode(|mut w| async move {
                w.write_message(6, MSG_TYPE_VIDEO, 1, ts, &[], &d).await.unwrap();
                w.flush().await.unwrap();
                w
            })
            .await
        };

        let mut reader = ChunkReader::new(&wire[..]);
        let msg = reader.read_message().await.unwrap();
        assert_eq!(msg.timestamp, ts);
        assert_eq!(msg.data.len(), 200);
    }

    #[tokio::test]
    async fn test_ffmpeg_style_continuation_without_repeated_ext() {
        // hand-build: fmt0 header with extended timestamp, 200-byte
        // message, but the continuation chunk does NOT repeat the
        // extended timestamp
        let ts: u32 = 0x0100_0001;
        let mut wire = Vec::new();
        wire.push(0x06); // fmt 0, csid 6
        wire.extend_from_slice(&[0xFF, 0xFF, 0xFF]); // ts sentinel
        wire.extend_from_slice(&[0x00, 0x00, 0xC8]); // length 200
        wire.push(MSG_TYPE_VIDEO);
        wire.extend_from_slice(&1u32.to_le_bytes()); // stream id
        wire.extend_from_slice(&ts.to_be_bytes()); // extended timestamp
        wire.extend_from_slice(&vec![0x11; 128]);
        wire.push(0xC0 | 0x06); // fmt 3 continuation, no ext repeat
        wire.extend_from_slice(&vec![0x22; 72]);

        let mut reader = ChunkReader::new(&wire[..]);
        let msg = reader.read_message().await.unwrap();
        assert_eq!(msg.timestamp, ts);
        assert_eq!(msg.data.len(), 200);
        assert_eq!(msg.data[127], 0x11);
        assert_eq!(msg.data[128], 0x22);
    }

    #[tokio::test]
    async fn test_adobe_style_continuation_with_repeated_ext() {
        // same message, continuation repeats the extended timestamp and
        // the payload happens to continue after it
        let ts: u32 = 0x0100_0001;
        let mut wire = Vec::new();
        wire.push(0x06);
        wire.extend_from_slice(&[0xFF, 0xFF, 0xFF]);
        wire.extend_from_slice(&[0x00, 0x00, 0xC8]);
        wire.push(MSG_TYPE_VIDEO);
        wire.extend_from_slice(&1u32.to_le_bytes());
        wire.extend_from_slice(&ts.to_be_bytes());
        wire.extend_from_slice(&vec![0x11; 128]);
        wire.push(0xC0 | 0x06);
        wire.extend_from_slice(&ts.to_be_bytes()); // Adobe repeats it
        wire.extend_from_slice(&vec![0x22; 72]);

        let mut reader = ChunkReader::new(&wire[..]);
        let msg = reader.read_message().await.unwrap();
        assert_eq!(msg.timestamp, ts);
        assert_eq!(msg.data.len(), 200);
        assert_eq!(msg.data[128], 0x22);
    }

    #[tokio::test]
    async fn test_fmt1_delta_accumulates() {
        let mut wire = Vec::new();
        // fmt0: ts 1000, 1-byte message
        wire.push(0x04); // csid 4
        wire.extend_from_slice(&[0x00, 0x03, 0xE8]);
        wire.extend_from_slice(&[0x00, 0x00, 0x01]);
        wire.push(8);
        wire.extend_from_slice(&1u32.to_le_bytes());
        wire.push(0xAA);
        // fmt1: delta 33, 1-byte message
        wire.push(0x44);
        wire.extend_from_slice(&[0x00, 0x00, 0x21]);
        wire.extend_from_slice(&[0x00, 0x00, 0x01]);
        wire.push(8);
        wire.push(0xBB);
        // fmt2: delta 33 again
        wire.push(0x84);
        wire.extend_from_slice(&[0x00, 0x00, 0x21]);
        wire.push(0xCC);
        // fmt3: fresh message, inherits the delta
        wire.push(0xC4);
        wire.push(0xDD);

        let mut reader = ChunkReader::new(&wire[..]);
        assert_eq!(reader.read_message().await.unwrap().timestamp, 1000);
        assert_eq!(reader.read_message().await.unwrap().timestamp, 1033);
        assert_eq!(reader.read_message().await.unwrap().timestamp, 1066);
        assert_eq!(reader.read_message().await.unwrap().timestamp, 1099);
    }

    #[tokio::test]
    async fn test_fmt1_without_state_rejected() {
        let mut wire = Vec::new();
        wire.push(0x44); // fmt 1, csid 4, but no prior fmt 0
        wire.extend_from_slice(&[0x00, 0x00, 0x21, 0x00, 0x00, 0x01, 0x08]);
        wire.push(0xAA);

        let mut reader = ChunkReader::new(&wire[..]);
        assert!(reader.read_message().await.is_err());
    }

    #[tokio::test]
    async fn test_too_many_chunk_streams_rejected() {
        let mut wire = Vec::new();
        for csid in 2u8..20u8 {
            wire.push(csid & 0x3F); // fmt 0
            wire.extend_from_slice(&[0x00, 0x00, 0x00]);
            wire.extend_from_slice(&[0x00, 0x00, 0x01]);
            wire.push(8);
            wire.extend_from_slice(&1u32.to_le_bytes());
            wire.push(0xAA);
        }

        let mut reader = ChunkReader::new(&wire[..]);
        let mut result = Ok(());
        for _ in 0..18 {
            match reader.read_message().await {
                Ok(_) => {}
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        let err = result.unwrap_err();
        assert!(matches!(err, Error::Chunk(msg) if msg.contains("too many")));
    }

    #[tokio::test]
    async fn test_oversize_message_rejected() {
        let mut wire = Vec::new();
        wire.push(0x04);
        wire.extend_from_slice(&[0x00, 0x00, 0x00]);
        wire.extend_from_slice(&[0xFF, 0xFF, 0xFF]); // ~16 MiB declared
        wire.push(8);
        wire.extend_from_slice(&1u32.to_le_bytes());

        let mut reader = ChunkReader::new(&wire[..]);
        assert!(reader.read_message().await.is_err());
    }

    #[tokio::test]
    async fn test_wide_csid_forms() {
        // 2-byte form: csid 80
        let mut wire = Vec::new();
        wire.push(0x00);
        wire.push(80 - 64);
        wire.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x08]);
        wire.extend_from_slice(&1u32.to_le_bytes());
        wire.push(0xAA);
        // 3-byte form: csid 400
        wire.push(0x01);
        wire.extend_from_slice(&(400u16 - 64).to_be_bytes());
        wire.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x08]);
        wire.extend_from_slice(&1u32.to_le_bytes());
        wire.push(0xBB);

        let mut reader = ChunkReader::new(&wire[..]);
        assert_eq!(reader.read_message().await.unwrap().data[0], 0xAA);
        assert_eq!(reader.read_message().await.unwrap().data[0], 0xBB);
    }
}
