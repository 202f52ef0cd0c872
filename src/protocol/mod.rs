mod command;
mod constants;
mod message;

pub use command::*;
pub use constants::*;
pub use message::*;
