mod utils;
mod amf;
pub mod codec;
mod flv;
mod av;
mod bridge;
mod protocol;
mod chunk;
mod handshake;
mod connection;
mod server;
mod client;
mod relay;
mod open;

// Re-export commonly used types at crate root
pub use amf::*;
pub use av::*;
pub use bridge::*;
pub use chunk::*;
pub use connection::*;
pub use handshake::*;
pub use open::*;
pub use protocol::*;
pub use utils::*;

// FLV exports
pub use flv::{FlvReader, FlvWriter, Tag};
pub use flv::tag;

// Server exports
pub use server::{RtmpServer, ServerConfig, ServerConfigBuilder};

// Client exports
pub use client::{ClientConfig, ClientConfigBuilder, RtmpClient};

// Relay exports
pub use relay::*;
