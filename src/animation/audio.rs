use std::sync::Arc;

use crate::foundation::error::VoisyncResult;

/// Decoded PCM audio, interleaved `f32` samples in `[-1, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            channels,
            samples,
        }
    }

    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / usize::from(self.channels)
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / f64::from(self.sample_rate)
    }
}

/// Audio output device whose clock can drive playback.
pub trait AudioContext {
    /// Device time in seconds.
    fn current_time(&self) -> f64;
    /// Start playing `buffer` immediately.
    fn start(&self, buffer: &AudioBuffer) -> VoisyncResult<Box<dyn AudioSource>>;
}

/// One playing buffer.
pub trait AudioSource {
    /// True once playback reached the end of the buffer.
    fn ended(&self) -> bool;
    /// Fails when the source was already stopped.
    fn stop(&mut self) -> VoisyncResult<()>;
    fn disconnect(&mut self);
}

/// Audio to play in sync with an animation.
#[derive(Clone)]
pub struct AudioTrack {
    pub context: Arc<dyn AudioContext>,
    pub buffer: Arc<AudioBuffer>,
}

impl std::fmt::Debug for AudioTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioTrack")
            .field("sample_rate", &self.buffer.sample_rate)
            .field("channels", &self.buffer.channels)
            .field("duration_secs", &self.buffer.duration_secs())
            .finish()
    }
}
