// Message type ids
pub const MSG_TYPE_SET_CHUNK_SIZE: u8 = 1;
pub const MSG_TYPE_ABORT: u8 = 2;
pub const MSG_TYPE_ACK: u8 = 3;
pub const MSG_TYPE_USER_CONTROL: u8 = 4;
pub const MSG_TYPE_WINDOW_ACK: u8 = 5;
pub const MSG_TYPE_SET_PEER_BW: u8 = 6;
pub const MSG_TYPE_AUDIO: u8 = 8;
pub const MSG_TYPE_VIDEO: u8 = 9;
pub const MSG_TYPE_DATA_AMF3: u8 = 15;
pub const MSG_TYPE_COMMAND_AMF3: u8 = 17;
pub const MSG_TYPE_DATA_AMF0: u8 = 18;
pub const MSG_TYPE_COMMAND_AMF0: u8 = 20;
pub const MSG_TYPE_AGGREGATE: u8 = 22;

// User control event types
pub const EVENT_STREAM_BEGIN: u16 = 0;
pub const EVENT_SET_BUFFER_LENGTH: u16 = 3;
pub const EVENT_STREAM_IS_RECORDED: u16 = 4;
pub const EVENT_PING_REQUEST: u16 = 6;
pub const EVENT_PING_RESPONSE: u16 = 7;

// Chunk stream ids used on the write side
pub const CHUNK_STREAM_PROTOCOL: u32 = 2;
pub const CHUNK_STREAM_COMMAND: u32 = 3;
pub const CHUNK_STREAM_AUDIO: u32 = 4;
pub const CHUNK_STREAM_STATUS: u32 = 5;
pub const CHUNK_STREAM_VIDEO: u32 = 6;

// Defaults and limits
pub const DEFAULT_CHUNK_SIZE: usize = 128;
pub const DEFAULT_WINDOW_ACK_SIZE: u32 = 2_500_000;
pub const CONNECT_CHUNK_SIZE: usize = 65536;
pub const MAX_CHUNK_STREAMS: usize = 16;
pub const MAX_MESSAGE_SIZE: u32 = 4 * 1024 * 1024;

/// The 3-byte timestamp sentinel that announces an extended timestamp
pub const TIMESTAMP_EXTENDED: u32 = 0xFF_FFFF;

/// Human-readable message type name for logging
pub fn msg_type_name(type_id: u8) -> &'static str {
    match type_id {
        MSG_TYPE_SET_CHUNK_SIZE => "SetChunkSize",
        MSG_TYPE_ABORT => "Abort",
        MSG_TYPE_ACK => "Ack",
        MSG_TYPE_USER_CONTROL => "UserControl",
        MSG_TYPE_WINDOW_ACK => "WindowAckSize",
        MSG_TYPE_SET_PEER_BW => "SetPeerBandwidth",
        MSG_TYPE_AUDIO => "Audio",
        MSG_TYPE_VIDEO => "Video",
        MSG_TYPE_DATA_AMF3 => "DataAMF3",
        MSG_TYPE_COMMAND_AMF3 => "CommandAMF3",
        MSG_TYPE_DATA_AMF0 => "DataAMF0",
        MSG_TYPE_COMMAND_AMF0 => "CommandAMF0",
        MSG_TYPE_AGGREGATE => "Aggregate",
        _ => "Unknown",
    }
}
