//! Core library for the Audiogram overlay renderer.
//!
//! The crate turns an audio signal (a decoded file or live capture) into a
//! stream of 1920x1080 frames: analysis nodes produce byte spectra, the
//! smoothing engine stabilizes them, the style renderers paint them, and the
//! compositor stacks the five visual layers. The export module captures those
//! frames into an audio-synced WebM artifact.

pub mod assets;
pub mod compositor;
pub mod config;
pub mod error;
pub mod export;
pub mod playback;
pub mod smoothing;
pub mod source;
pub mod styles;

pub use assets::AssetCache;
pub use compositor::{CanvasHandle, FrameCompositor, RenderLoop, CANVAS_HEIGHT, CANVAS_WIDTH};
pub use config::Settings;
pub use error::{OverlayError, Result};
pub use export::{
    CapabilityReport, ExportJob, ExportOptions, ExportState, FfmpegRecorder, WavDecoder,
};
pub use playback::{AudioSink, BufferPlayback, CpalAudioSink, NullSink};
pub use smoothing::{AudioFrame, SmoothingEngine};
pub use source::{AnalyzerHandle, AudioBuffer, MediaSource, SignalSourceAdapter};
pub use styles::StyleId;
