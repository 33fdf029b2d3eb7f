// Core types and traits for the reelplay video player

pub mod buffer;
pub mod callback;
pub mod command;
pub mod engine;
pub mod error;
pub mod release;
pub mod render_target;
pub mod session;
pub mod state;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use buffer::BufferConfig;
pub use callback::{EventHub, SessionEvent, SessionObserver};
pub use command::{Command, MediaDimensions, Operation, Reply, SessionSnapshot};
pub use engine::{EngineFactory, MediaEngine, MediaInfo};
pub use error::{ErrorCode, NativeError, NativeResult, PlayerError, Result};
pub use release::{ReleaseFailure, ReleaseReport};
pub use render_target::{RenderTarget, RenderTargetManager, Surface, SurfaceRegistry, TargetId};
pub use session::{PlayerSession, SwitchTicket};
pub use state::SessionState;
