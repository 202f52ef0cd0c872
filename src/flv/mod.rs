mod file;
pub mod tag;

pub use file::*;
pub use tag::Tag;
