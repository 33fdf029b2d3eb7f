// Render targets: platform surfaces plus the opaque id handed to the presentation layer

use crate::error::{NativeError, NativeResult};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Opaque identifier the presentation layer binds a display widget to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub i64);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Backing surface resource of a render target.
///
/// `release` consumes the surface, so it can run at most once.
pub trait Surface {
    fn release(self: Box<Self>) -> NativeResult<()>;
}

/// A registered render surface and its identifier
pub struct RenderTarget {
    id: TargetId,
    surface: Box<dyn Surface>,
}

impl RenderTarget {
    pub fn new(id: TargetId, surface: Box<dyn Surface>) -> Self {
        Self { id, surface }
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    /// Give up the identifier and keep only the surface for its final release
    pub fn into_surface(self) -> Box<dyn Surface> {
        self.surface
    }
}

impl fmt::Debug for RenderTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderTarget").field("id", &self.id).finish()
    }
}

/// Allocates and unregisters render targets.
///
/// Lives on the confined context together with the session.
pub trait RenderTargetManager {
    fn allocate(&mut self) -> NativeResult<RenderTarget>;

    /// Unregister the target id. The surface is released separately.
    fn release(&mut self, target: &RenderTarget) -> NativeResult<()>;
}

#[derive(Debug, Default)]
struct RegistryInner {
    last_id: i64,
    registered: HashSet<TargetId>,
    live_surfaces: HashSet<TargetId>,
}

/// Default render target manager.
///
/// Ids are issued from 1 upward and never reused. Clones share the same
/// table, so the presentation side can keep one to look targets up.
#[derive(Debug, Clone, Default)]
pub struct SurfaceRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the id can currently be bound by a display widget
    pub fn is_registered(&self, id: TargetId) -> bool {
        self.inner.lock().registered.contains(&id)
    }

    /// Number of surfaces allocated and not yet released
    pub fn live_surfaces(&self) -> usize {
        self.inner.lock().live_surfaces.len()
    }
}

impl RenderTargetManager for SurfaceRegistry {
    fn allocate(&mut self) -> NativeResult<RenderTarget> {
        let mut inner = self.inner.lock();
        inner.last_id += 1;
        let id = TargetId(inner.last_id);
        inner.registered.insert(id);
        inner.live_surfaces.insert(id);
        drop(inner);

        log::info!("[surface] registered render target {}", id);
        let surface = RegistrySurface {
            id,
            registry: Arc::clone(&self.inner),
        };
        Ok(RenderTarget::new(id, Box::new(surface)))
    }

    fn release(&mut self, target: &RenderTarget) -> NativeResult<()> {
        if self.inner.lock().registered.remove(&target.id()) {
            log::info!("[surface] unregistered render target {}", target.id());
            Ok(())
        } else {
            Err(NativeError::Failed(format!(
                "render target {} is not registered",
                target.id()
            )))
        }
    }
}

struct RegistrySurface {
    id: TargetId,
    registry: Arc<Mutex<RegistryInner>>,
}

impl Surface for RegistrySurface {
    fn release(self: Box<Self>) -> NativeResult<()> {
        if self.registry.lock().live_surfaces.remove(&self.id) {
            log::debug!("[surface] released surface {}", self.id);
            Ok(())
        } else {
            Err(NativeError::Released("surface"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let mut registry = SurfaceRegistry::new();
        let first = registry.allocate().unwrap();
        let second = registry.allocate().unwrap();
        assert_eq!(first.id(), TargetId(1));
        assert_eq!(second.id(), TargetId(2));
        assert_eq!(registry.live_surfaces(), 2);
    }

    #[test]
    fn test_release_unregisters_then_surface_frees() {
        let mut registry = SurfaceRegistry::new();
        let target = registry.allocate().unwrap();
        let id = target.id();

        registry.release(&target).unwrap();
        assert!(!registry.is_registered(id));
        assert_eq!(registry.live_surfaces(), 1);

        target.into_surface().release().unwrap();
        assert_eq!(registry.live_surfaces(), 0);
    }

    #[test]
    fn test_double_unregister_fails() {
        let mut registry = SurfaceRegistry::new();
        let target = registry.allocate().unwrap();
        registry.release(&target).unwrap();
        assert!(registry.release(&target).is_err());
    }

    #[test]
    fn test_ids_not_reused_after_release() {
        let mut registry = SurfaceRegistry::new();
        let target = registry.allocate().unwrap();
        registry.release(&target).unwrap();
        target.into_surface().release().unwrap();

        let next = registry.allocate().unwrap();
        assert_eq!(next.id(), TargetId(2));
    }
}
