use bytes::Bytes;

use crate::protocol::{RtmpMessage, MAX_MESSAGE_SIZE};
use crate::{Error, Result};

/// Per-chunk-stream-id reassembly state: the last full header fields that
/// fmt 1/2/3 chunks inherit, the extended-timestamp bookkeeping, and the
/// message body being accumulated.
#[derive(Debug, Default)]
pub struct ChunkState {
    /// Header type of the last fmt 0/1/2 header seen
    pub header_type: u8,

    /// Absolute timestamp accumulator (milliseconds)
    pub timestamp: u32,

    /// Last delta carried by a fmt 1/2 header
    pub timestamp_delta: u32,

    /// Whether the last header used the extended timestamp form
    pub has_ext_timestamp: bool,

    /// The extended timestamp value, for the fmt-3 peek-and-match
    pub ext_timestamp: u32,

    pub message_length: u32,
    pub type_id: u8,
    pub stream_id: u32,

    /// Bytes still missing from the current message
    pub bytes_left: u32,

    buffer: Vec<u8>,
}

impl ChunkState {
    pub fn new() -> Self {
        ChunkState::default()
    }

    /// Check if currently assembling a message
    pub fn is_assembling(&self) -> bool {
        self.bytes_left > 0
    }

    /// Begin accumulating a message of the declared length
    pub fn start_message(&mut self) -> Result<()> {
        if self.message_length > MAX_MESSAGE_SIZE {
            return Err(Error::chunk(format!(
                "declared message size {} exceeds the 4 MiB limit",
                self.message_length
            )));
        }
        self.bytes_left = self.message_length;
        self.buffer.clear();
        self.buffer.reserve(self.message_length as usize);
        Ok(())
    }

    /// Append one chunk's worth of payload. Returns the completed message
    /// when the last byte arrives.
    pub fn add_chunk_data(&mut self, data: &[u8]) -> Option<RtmpMessage> {
        self.buffer.extend_from_slice(data);
        self.bytes_left -= data.len() as u32;

        if self.bytes_left > 0 {
            return None;
        }
        let body = std::mem::take(&mut self.buffer);
        Some(RtmpMessage::new(
            self.type_id,
            self.stream_id,
            self.timestamp,
            Bytes::from(body),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assembly_across_chunks() {
        let mut state = ChunkState {
            type_id: 9,
            stream_id: 1,
            timestamp: 40,
            message_length: 5,
            ..ChunkState::default()
        };
        state.start_message().unwrap();
        assert!(state.is_assembling());

        assert!(state.add_chunk_data(&[1, 2, 3]).is_none());
        let msg = state.add_chunk_data(&[4, 5]).unwrap();
        assert_eq!(msg.type_id, 9);
        assert_eq!(msg.timestamp, 40);
        assert_eq!(msg.data.as_ref(), &[1, 2, 3, 4, 5]);
        assert!(!state.is_assembling());
    }

    #[test]
    fn test_oversize_message_rejected() {
        let mut state = ChunkState {
            message_length: MAX_MESSAGE_SIZE + 1,
            ..ChunkState::default()
        };
        assert!(state.start_message().is_err());
    }

    #[test]
    fn test_empty_message_completes_immediately() {
        let mut state = ChunkState::default();
        state.start_message().unwrap();
        let msg = state.add_chunk_data(&[]).unwrap();
        assert!(msg.data.is_empty());
    }
}
