use std::sync::Arc;

use crate::animation::audio::{AudioContext, AudioSource, AudioTrack};
use crate::animation::clock::{Clock, SystemClock};
use crate::animation::ease::Ease;
use crate::foundation::core::Fps;
use crate::foundation::error::{VoisyncError, VoisyncResult};
use crate::layer::renderer::{LayerRenderer, MouthBlend};
use crate::layer::surface::Surface;
use crate::lipsync::frame::{LipSyncFrame, MouthShape, total_duration};

pub const DEFAULT_TRANSITION_MS: f64 = 80.0;

pub type FrameCallback = Box<dyn FnMut(usize, f64)>;
pub type EndCallback = Box<dyn FnMut()>;

pub struct PlayOptions {
    /// Tick pacing for [`AnimationController::run_blocking`].
    pub fps: Fps,
    /// Upper bound of a mouth cross-fade; also capped at half the incoming frame.
    pub transition_ms: f64,
    pub ease: Ease,
    /// When set, the audio clock drives playback and audio end terminates it.
    pub audio: Option<AudioTrack>,
    /// Fired once per frame boundary with `(frame_index, current_time)`.
    pub on_frame: Option<FrameCallback>,
    /// Fired when playback runs to completion, not on [`AnimationController::stop`].
    pub on_end: Option<EndCallback>,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            fps: Fps::default(),
            transition_ms: DEFAULT_TRANSITION_MS,
            ease: Ease::default(),
            audio: None,
            on_frame: None,
            on_end: None,
        }
    }
}

impl std::fmt::Debug for PlayOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayOptions")
            .field("fps", &self.fps)
            .field("transition_ms", &self.transition_ms)
            .field("ease", &self.ease)
            .field("audio", &self.audio)
            .field("on_frame", &self.on_frame.is_some())
            .field("on_end", &self.on_end.is_some())
            .finish()
    }
}

/// An in-progress cross-fade between two mouth shapes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MouthTransition {
    pub from: MouthShape,
    pub to: MouthShape,
    pub start_time: f64,
    pub duration: f64,
}

impl MouthTransition {
    pub fn progress(&self, now: f64) -> f64 {
        if self.duration <= 0.0 || !self.duration.is_finite() {
            return 1.0;
        }
        ((now - self.start_time) / self.duration).clamp(0.0, 1.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Disposed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickStatus {
    /// Still playing; schedule another tick.
    Running,
    /// Playback completed on this tick.
    Finished,
    /// Not playing; nothing was rendered.
    Inactive,
}

enum TimeBase {
    Wall {
        start: f64,
    },
    Audio {
        context: Arc<dyn AudioContext>,
        start: f64,
        source: Box<dyn AudioSource>,
    },
}

struct Playback {
    base_layers: Vec<String>,
    time_base: TimeBase,
    fps: Fps,
    ease: Ease,
    transition_secs: f64,
    frame_index: Option<usize>,
    last_mouth: Option<MouthShape>,
    transition: Option<MouthTransition>,
    on_frame: Option<FrameCallback>,
    on_end: Option<EndCallback>,
}

impl Playback {
    fn current_time(&self, wall: &dyn Clock) -> f64 {
        match &self.time_base {
            TimeBase::Wall { start } => wall.now_secs() - start,
            TimeBase::Audio { context, start, .. } => context.current_time() - start,
        }
    }

    fn audio_driven(&self) -> bool {
        matches!(self.time_base, TimeBase::Audio { .. })
    }

    fn audio_ended(&self) -> bool {
        match &self.time_base {
            TimeBase::Audio { source, .. } => source.ended(),
            TimeBase::Wall { .. } => false,
        }
    }

    fn enter_frame(&mut self, index: usize, frame: &LipSyncFrame, now: f64) {
        self.frame_index = Some(index);
        if let Some(last) = self.last_mouth
            && last != frame.mouth
        {
            let transition = MouthTransition {
                from: last,
                to: frame.mouth,
                start_time: now,
                duration: self.transition_secs.min(frame.duration * 0.5),
            };
            tracing::debug!(from = %last, to = %frame.mouth, duration = transition.duration, "mouth transition");
            self.transition = Some(transition);
        }
        self.last_mouth = Some(frame.mouth);
        tracing::debug!(index, time = now, mouth = %frame.mouth, "frame boundary");
        if let Some(cb) = self.on_frame.as_mut() {
            cb(index, now);
        }
    }

    /// What to draw in the mouth slot this tick. Ends the transition once it completes.
    fn mouth_blends(&mut self, now: f64, current: Option<MouthShape>) -> Vec<MouthBlend> {
        if let Some(tr) = self.transition {
            let progress = tr.progress(now);
            if progress >= 1.0 {
                self.transition = None;
                return vec![MouthBlend::solid(tr.to)];
            }
            let (out_w, in_w) = self.ease.cross_fade(progress);
            return vec![
                MouthBlend {
                    shape: tr.from,
                    alpha: out_w as f32,
                },
                MouthBlend {
                    shape: tr.to,
                    alpha: in_w as f32,
                },
            ];
        }
        current.map(MouthBlend::solid).into_iter().collect()
    }

    fn release_audio(&mut self) {
        if let TimeBase::Audio { source, .. } = &mut self.time_base {
            if let Err(e) = source.stop() {
                tracing::trace!(error = %e, "audio source already stopped");
            }
            source.disconnect();
        }
    }
}

enum State {
    Idle,
    Playing(Box<Playback>),
    Disposed,
}

/// Drives a [`LayerRenderer`] through one utterance's lip-sync frames.
///
/// The host calls [`tick`](Self::tick) once per display refresh (or uses
/// [`run_blocking`](Self::run_blocking)). Ticks never overlap: each one renders synchronously.
pub struct AnimationController {
    frames: Vec<LipSyncFrame>,
    renderer: LayerRenderer,
    clock: Arc<dyn Clock>,
    state: State,
}

impl AnimationController {
    pub fn new(frames: Vec<LipSyncFrame>, renderer: LayerRenderer) -> VoisyncResult<Self> {
        if frames.is_empty() {
            return Err(VoisyncError::validation(
                "animation controller needs at least one lip-sync frame",
            ));
        }
        Ok(Self {
            frames,
            renderer,
            clock: Arc::new(SystemClock::new()),
            state: State::Idle,
        })
    }

    /// Replace the wall clock used when no audio drives playback.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn frames(&self) -> &[LipSyncFrame] {
        &self.frames
    }

    pub fn renderer(&self) -> &LayerRenderer {
        &self.renderer
    }

    pub fn state(&self) -> PlaybackState {
        match self.state {
            State::Idle => PlaybackState::Idle,
            State::Playing(_) => PlaybackState::Playing,
            State::Disposed => PlaybackState::Disposed,
        }
    }

    /// End time of the last frame.
    pub fn total_duration(&self) -> f64 {
        total_duration(&self.frames)
    }

    /// Index of the frame whose `[time, time + duration)` contains `time`.
    pub fn frame_index_at(&self, time: f64) -> Option<usize> {
        find_frame(&self.frames, time, None)
    }

    pub fn current_frame_index(&self) -> Option<usize> {
        match &self.state {
            State::Playing(pb) => pb.frame_index,
            _ => None,
        }
    }

    pub fn current_transition(&self) -> Option<MouthTransition> {
        match &self.state {
            State::Playing(pb) => pb.transition,
            _ => None,
        }
    }

    /// Start playback and render the first tick.
    ///
    /// Already playing: warns and changes nothing. Disposed: does nothing.
    pub fn play(
        &mut self,
        surface: &mut dyn Surface,
        base_layers: &[impl AsRef<str>],
        options: PlayOptions,
    ) -> VoisyncResult<TickStatus> {
        match self.state {
            State::Playing(_) => {
                tracing::warn!("animation is already playing");
                return Ok(TickStatus::Running);
            }
            State::Disposed => {
                tracing::warn!("play called on a disposed animation controller");
                return Ok(TickStatus::Inactive);
            }
            State::Idle => {}
        }

        let time_base = match options.audio {
            Some(track) => {
                let start = track.context.current_time();
                let source = track.context.start(&track.buffer)?;
                TimeBase::Audio {
                    context: track.context,
                    start,
                    source,
                }
            }
            None => TimeBase::Wall {
                start: self.clock.now_secs(),
            },
        };

        let transition_secs = if options.transition_ms.is_finite() {
            options.transition_ms.max(0.0) / 1000.0
        } else {
            DEFAULT_TRANSITION_MS / 1000.0
        };

        self.state = State::Playing(Box::new(Playback {
            base_layers: base_layers.iter().map(|p| p.as_ref().to_string()).collect(),
            time_base,
            fps: options.fps,
            ease: options.ease,
            transition_secs,
            frame_index: None,
            last_mouth: None,
            transition: None,
            on_frame: options.on_frame,
            on_end: options.on_end,
        }));
        tracing::debug!(
            frames = self.frames.len(),
            total = self.total_duration(),
            "playback started"
        );

        self.tick(surface)
    }

    /// Advance playback to the active clock's current time and render once.
    pub fn tick(&mut self, surface: &mut dyn Surface) -> VoisyncResult<TickStatus> {
        let State::Playing(pb) = &mut self.state else {
            return Ok(TickStatus::Inactive);
        };

        if pb.audio_ended() {
            tracing::debug!("audio ended");
            self.finish();
            return Ok(TickStatus::Finished);
        }

        let now = pb.current_time(self.clock.as_ref());
        let found = find_frame(&self.frames, now, pb.frame_index);
        if let Some(index) = found
            && pb.frame_index != Some(index)
        {
            pb.enter_frame(index, &self.frames[index], now);
        }

        let blends = pb.mouth_blends(now, found.map(|i| self.frames[i].mouth));
        if !blends.is_empty() {
            match self
                .renderer
                .render_with_mouth_shapes(surface, pb.base_layers.as_slice(), &blends)
            {
                Ok(result) if !result.success => {
                    tracing::warn!(errors = ?result.errors, "frame rendered with errors");
                }
                Ok(_) => {}
                Err(e) => {
                    self.stop();
                    return Err(e);
                }
            }
        }

        if now < total_duration(&self.frames) || pb.audio_driven() {
            return Ok(TickStatus::Running);
        }
        self.finish();
        Ok(TickStatus::Finished)
    }

    /// Tick until playback ends, sleeping one frame interval between ticks.
    pub fn run_blocking(&mut self, surface: &mut dyn Surface) -> VoisyncResult<()> {
        loop {
            let interval = match &self.state {
                State::Playing(pb) => pb.fps.frame_duration_secs(),
                _ => return Ok(()),
            };
            match self.tick(surface)? {
                TickStatus::Running => {
                    std::thread::sleep(std::time::Duration::from_secs_f64(interval));
                }
                TickStatus::Finished | TickStatus::Inactive => return Ok(()),
            }
        }
    }

    /// Stop playback without firing the end callback. Idempotent.
    pub fn stop(&mut self) {
        if let State::Playing(mut pb) = std::mem::replace(&mut self.state, State::Idle) {
            pb.release_audio();
            tracing::debug!("playback stopped");
        }
    }

    /// Stop and release frames and audio. The controller does nothing afterwards.
    pub fn dispose(&mut self) {
        self.stop();
        self.frames = Vec::new();
        self.state = State::Disposed;
    }

    fn finish(&mut self) {
        if let State::Playing(mut pb) = std::mem::replace(&mut self.state, State::Idle) {
            pb.release_audio();
            tracing::debug!("playback finished");
            if let Some(cb) = pb.on_end.as_mut() {
                cb();
            }
        }
    }
}

/// Frame containing `time`, scanning forward from `hint` first.
pub(crate) fn find_frame(frames: &[LipSyncFrame], time: f64, hint: Option<usize>) -> Option<usize> {
    if let Some(start) = hint
        && start < frames.len()
        && let Some(offset) = frames[start..].iter().position(|f| f.contains(time))
    {
        return Some(start + offset);
    }
    frames.iter().position(|f| f.contains(time))
}
