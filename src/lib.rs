#![forbid(unsafe_code)]

pub mod animation;
pub mod assets;
pub mod encode;
pub mod foundation;
pub mod layer;
pub mod lipsync;

pub use animation::audio::{AudioBuffer, AudioContext, AudioSource, AudioTrack};
pub use animation::clock::{Clock, ManualClock, SystemClock};
pub use animation::controller::{
    AnimationController, MouthTransition, PlayOptions, PlaybackState, TickStatus,
};
pub use animation::ease::Ease;
pub use animation::export::{CropRect, ExportOptions, ExportedFrame, FrameFormat};
pub use assets::decode::decode_image;
pub use assets::loader::{FsImageLoader, ImageLoader, MemoryImageLoader, load_images};
pub use assets::{ImageCache, LayerImage};
pub use encode::ffmpeg::{FfmpegMuxer, MuxConfig, is_ffmpeg_on_path};
pub use encode::wav::encode_wav;
pub use foundation::core::{Canvas, Fps, letterbox};
pub use foundation::error::{VoisyncError, VoisyncResult};
pub use layer::character::{CharacterConfig, MouthLayerMapping};
pub use layer::manifest::{Bounds, Layer, LayerManifest};
pub use layer::renderer::{
    LayerRenderer, LayerRequest, MouthBlend, RenderError, RenderErrorKind, RenderResult,
};
pub use layer::surface::{DrawContext, DrawError, PixelSurface, Surface};
pub use lipsync::frame::{LipSyncFrame, LipSyncSummary, MouthShape, total_duration};
pub use lipsync::generate::generate_frames;
pub use lipsync::phonetics::{ConsonantClass, classify};
pub use lipsync::query::{AccentPhrase, Mora, SynthesisQuery};
