// Recording fakes for the engine and render-target seams
// Every call lands in a shared trace so tests can assert on side-effect order.

use crate::buffer::BufferConfig;
use crate::engine::{EngineFactory, MediaEngine, MediaInfo};
use crate::error::{NativeError, NativeResult};
use crate::render_target::{RenderTarget, RenderTargetManager, Surface, TargetId};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// Shared, ordered log of side effects
#[derive(Debug, Clone, Default)]
pub struct Trace {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Entries starting with `prefix`, in order
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.matching(prefix).len()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// Failure points a test can arm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    Allocate,
    Create,
    Stop,
    Clear,
    Load,
    /// `load` panics instead of failing
    LoadPanic,
    Play,
    Pause,
    Volume,
    EngineRelease,
    TargetRelease,
    SurfaceRelease,
}

/// Armed faults, shared between the test and the fakes
#[derive(Debug, Clone, Default)]
pub struct Faults {
    armed: Arc<Mutex<HashSet<Fault>>>,
}

impl Faults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&self, fault: Fault) {
        self.armed.lock().insert(fault);
    }

    pub fn disarm(&self, fault: Fault) {
        self.armed.lock().remove(&fault);
    }

    fn is_armed(&self, fault: Fault) -> bool {
        self.armed.lock().contains(&fault)
    }

    fn check(&self, fault: Fault) -> NativeResult<()> {
        if self.is_armed(fault) {
            Err(NativeError::Failed(format!("injected {fault:?} fault")))
        } else {
            Ok(())
        }
    }
}

/// Render target manager issuing ids from 1 upward
pub struct RecordingTargets {
    trace: Trace,
    faults: Faults,
    last_id: i64,
}

impl RecordingTargets {
    pub fn new(trace: Trace, faults: Faults) -> Self {
        Self {
            trace,
            faults,
            last_id: 0,
        }
    }
}

impl RenderTargetManager for RecordingTargets {
    fn allocate(&mut self) -> NativeResult<RenderTarget> {
        self.faults.check(Fault::Allocate)?;
        self.last_id += 1;
        let id = TargetId(self.last_id);
        self.trace.push(format!("target.allocate {id}"));
        let surface = RecordingSurface {
            id,
            trace: self.trace.clone(),
            faults: self.faults.clone(),
        };
        Ok(RenderTarget::new(id, Box::new(surface)))
    }

    fn release(&mut self, target: &RenderTarget) -> NativeResult<()> {
        self.trace.push(format!("target.release {}", target.id()));
        self.faults.check(Fault::TargetRelease)
    }
}

struct RecordingSurface {
    id: TargetId,
    trace: Trace,
    faults: Faults,
}

impl Surface for RecordingSurface {
    fn release(self: Box<Self>) -> NativeResult<()> {
        self.trace.push(format!("surface.release {}", self.id));
        self.faults.check(Fault::SurfaceRelease)
    }
}

/// Factory for [`RecordingEngine`]s
pub struct RecordingEngineFactory {
    trace: Trace,
    faults: Faults,
}

impl RecordingEngineFactory {
    pub fn new(trace: Trace, faults: Faults) -> Self {
        Self { trace, faults }
    }
}

impl EngineFactory for RecordingEngineFactory {
    type Engine = RecordingEngine;

    fn create(&mut self, target: &RenderTarget, buffer: BufferConfig) -> NativeResult<RecordingEngine> {
        self.faults.check(Fault::Create)?;
        self.trace.push(format!(
            "engine.create target={} max_buffer_ms={}",
            target.id(),
            buffer.max_buffer_ms
        ));
        Ok(RecordingEngine {
            trace: self.trace.clone(),
            faults: self.faults.clone(),
        })
    }
}

/// Engine that records calls and loads nothing
pub struct RecordingEngine {
    trace: Trace,
    faults: Faults,
}

impl MediaEngine for RecordingEngine {
    fn stop(&mut self) -> NativeResult<()> {
        self.faults.check(Fault::Stop)?;
        self.trace.push("engine.stop");
        Ok(())
    }

    fn clear_media(&mut self) -> NativeResult<()> {
        self.faults.check(Fault::Clear)?;
        self.trace.push("engine.clear");
        Ok(())
    }

    fn load(&mut self, path: &Path) -> NativeResult<MediaInfo> {
        self.faults.check(Fault::Load)?;
        if self.faults.is_armed(Fault::LoadPanic) {
            panic!("injected load panic for {}", path.display());
        }
        self.trace.push(format!("engine.load {}", path.display()));
        Ok(MediaInfo {
            duration_ms: Some(1_000),
            track_count: 1,
        })
    }

    fn set_play_when_ready(&mut self, play: bool) -> NativeResult<()> {
        let fault = if play { Fault::Play } else { Fault::Pause };
        self.faults.check(fault)?;
        self.trace.push(format!("engine.play_when_ready {play}"));
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> NativeResult<()> {
        self.faults.check(Fault::Volume)?;
        self.trace.push(format!("engine.volume {volume}"));
        Ok(())
    }

    fn release(&mut self) -> NativeResult<()> {
        self.trace.push("engine.release");
        self.faults.check(Fault::EngineRelease)
    }
}
