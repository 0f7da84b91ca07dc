//! Playback state machine, clocks and batch frame export.

pub mod audio;
pub mod clock;
pub mod controller;
pub mod ease;
pub mod export;
