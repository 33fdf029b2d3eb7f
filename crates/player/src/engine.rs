// Default engine: prepares media by probing its container
//
// There is no decode or render path here; the engine tracks what a platform
// decoder would be told (media, play intent, volume) and validates media the
// same way a real prepare step would reject it.

use reelplay_core::{
    BufferConfig, EngineFactory, MediaEngine, MediaInfo, NativeError, NativeResult, RenderTarget,
    TargetId,
};
use std::path::{Path, PathBuf};

pub struct ProbeEngine {
    target: TargetId,
    buffer: BufferConfig,
    media: Option<(PathBuf, MediaInfo)>,
    play_when_ready: bool,
    volume: f32,
    released: bool,
}

impl ProbeEngine {
    pub fn new(target: TargetId, buffer: BufferConfig) -> Self {
        Self {
            target,
            buffer,
            media: None,
            play_when_ready: false,
            volume: 1.0,
            released: false,
        }
    }

    pub fn target(&self) -> TargetId {
        self.target
    }

    pub fn buffer(&self) -> BufferConfig {
        self.buffer
    }

    pub fn media(&self) -> Option<&Path> {
        self.media.as_ref().map(|(path, _)| path.as_path())
    }

    pub fn play_when_ready(&self) -> bool {
        self.play_when_ready
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    fn ensure_live(&self) -> NativeResult<()> {
        if self.released {
            Err(NativeError::Released("engine"))
        } else {
            Ok(())
        }
    }
}

impl MediaEngine for ProbeEngine {
    fn stop(&mut self) -> NativeResult<()> {
        self.ensure_live()?;
        log::debug!("[engine] target {}: stop", self.target);
        Ok(())
    }

    fn clear_media(&mut self) -> NativeResult<()> {
        self.ensure_live()?;
        self.media = None;
        Ok(())
    }

    fn load(&mut self, path: &Path) -> NativeResult<MediaInfo> {
        self.ensure_live()?;
        let info = reelplay_demux::probe_container(path)?;
        if info.track_count == 0 {
            return Err(NativeError::Unsupported(format!(
                "{} has no tracks",
                path.display()
            )));
        }
        log::info!(
            "[engine] target {}: prepared {} (max buffer {:?})",
            self.target,
            path.display(),
            self.buffer.max_buffer()
        );
        self.media = Some((path.to_path_buf(), info.clone()));
        Ok(info)
    }

    fn set_play_when_ready(&mut self, play: bool) -> NativeResult<()> {
        self.ensure_live()?;
        self.play_when_ready = play;
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> NativeResult<()> {
        self.ensure_live()?;
        if !(0.0..=1.0).contains(&volume) {
            return Err(NativeError::Failed(format!("volume {volume} out of range")));
        }
        self.volume = volume;
        Ok(())
    }

    fn release(&mut self) -> NativeResult<()> {
        self.ensure_live()?;
        self.released = true;
        self.media = None;
        log::debug!("[engine] target {}: released", self.target);
        Ok(())
    }
}

/// Builds a [`ProbeEngine`] per render target
#[derive(Debug, Default)]
pub struct ProbeEngineFactory;

impl EngineFactory for ProbeEngineFactory {
    type Engine = ProbeEngine;

    fn create(&mut self, target: &RenderTarget, buffer: BufferConfig) -> NativeResult<ProbeEngine> {
        if !buffer.is_consistent() {
            return Err(NativeError::Unsupported(format!(
                "inconsistent buffer thresholds: {buffer:?}"
            )));
        }
        Ok(ProbeEngine::new(target.id(), buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelplay_core::{RenderTargetManager, SurfaceRegistry};

    fn engine() -> ProbeEngine {
        let mut registry = SurfaceRegistry::new();
        let target = registry.allocate().unwrap();
        ProbeEngineFactory
            .create(&target, BufferConfig::FIXED)
            .unwrap()
    }

    #[test]
    fn test_factory_binds_target_and_buffer() {
        let engine = engine();
        assert_eq!(engine.target(), TargetId(1));
        assert_eq!(engine.buffer(), BufferConfig::FIXED);
        assert_eq!(engine.volume(), 1.0);
    }

    #[test]
    fn test_factory_rejects_inconsistent_buffer() {
        let mut registry = SurfaceRegistry::new();
        let target = registry.allocate().unwrap();
        let buffer = BufferConfig {
            min_buffer_ms: 20_000,
            ..BufferConfig::FIXED
        };
        assert!(ProbeEngineFactory.create(&target, buffer).is_err());
    }

    #[test]
    fn test_load_rejects_non_media() {
        let mut engine = engine();
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(engine.load(file.path()).is_err());
        assert_eq!(engine.media(), None);
    }

    #[test]
    fn test_released_engine_refuses_calls() {
        let mut engine = engine();
        engine.release().unwrap();
        assert!(matches!(engine.stop(), Err(NativeError::Released("engine"))));
        assert!(engine.release().is_err());
    }

    #[test]
    fn test_volume_range() {
        let mut engine = engine();
        engine.set_volume(0.25).unwrap();
        assert_eq!(engine.volume(), 0.25);
        assert!(engine.set_volume(1.5).is_err());
    }
}
