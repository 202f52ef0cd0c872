mod amf3;
mod decoder;
mod encoder;
mod value;

pub use amf3::*;
pub use decoder::*;
pub use encoder::*;
pub use value::*;
