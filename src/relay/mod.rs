mod gop;
mod hub;
mod seqhdr;

pub use gop::*;
pub use hub::*;
pub use seqhdr::*;
