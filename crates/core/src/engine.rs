// Playback engine seam
// Implementations wrap the platform decoder/renderer. They are only ever
// touched from the confined context, so they do not have to be Send.

use crate::buffer::BufferConfig;
use crate::error::NativeResult;
use crate::render_target::RenderTarget;
use std::path::Path;

/// What the engine learned about media while preparing it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaInfo {
    /// Duration in milliseconds, when the container declares it
    pub duration_ms: Option<u64>,
    /// Number of tracks found in the container
    pub track_count: usize,
}

/// Decode/render engine bound to one render target
pub trait MediaEngine {
    /// Halt playback; play intent is kept
    fn stop(&mut self) -> NativeResult<()>;

    /// Drop loaded media and its buffers
    fn clear_media(&mut self) -> NativeResult<()>;

    /// Load and prepare media from a local path
    fn load(&mut self, path: &Path) -> NativeResult<MediaInfo>;

    /// Set whether playback should run once media is ready
    fn set_play_when_ready(&mut self, play: bool) -> NativeResult<()>;

    /// Set output volume (0.0 - 1.0)
    fn set_volume(&mut self, volume: f32) -> NativeResult<()>;

    /// Release native decoder sessions and buffers
    fn release(&mut self) -> NativeResult<()>;
}

/// Builds engines bound to a render target
pub trait EngineFactory {
    type Engine: MediaEngine;

    fn create(&mut self, target: &RenderTarget, buffer: BufferConfig) -> NativeResult<Self::Engine>;
}
