// Playback resource manager: confined dispatcher and command gateway

pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod gateway;

pub use config::PlayerConfig;
pub use dispatcher::{Dispatcher, DispatcherBuilder, Pending};
pub use engine::{ProbeEngine, ProbeEngineFactory};
pub use gateway::{response_to_json, CallError, Gateway, MethodCall, PendingResponse, Response};

pub use reelplay_core::{
    ErrorCode, MediaDimensions, PlayerError, Result, SessionEvent, SessionObserver,
    SessionSnapshot, SessionState, SurfaceRegistry, TargetId,
};
