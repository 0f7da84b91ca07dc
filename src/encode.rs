//! Hand-off formats for the external video muxer.

pub mod ffmpeg;
pub mod wav;
