pub mod aac;
pub mod h264;
