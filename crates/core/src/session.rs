// Player session: the single engine + render target pair and its lifecycle
//
// Every method here runs on the confined context. Nothing in this file is
// shared across threads; the dispatcher owns the session outright.

use crate::buffer::BufferConfig;
use crate::callback::{EventHub, SessionEvent};
use crate::command::SessionSnapshot;
use crate::engine::{EngineFactory, MediaEngine, MediaInfo};
use crate::error::{NativeError, NativeResult, PlayerError, Result};
use crate::release::ReleaseReport;
use crate::render_target::{RenderTarget, RenderTargetManager, TargetId};
use crate::state::SessionState;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

/// Resources owned while a session is live
struct LiveSession<E> {
    engine: E,
    target: RenderTarget,
    volume: f32,
    play_intent: bool,
    media: Option<PathBuf>,
}

/// Handle for the second half of a media switch.
///
/// Issued by [`PlayerSession::begin_switch`]; only the most recent ticket is
/// honoured by [`PlayerSession::complete_switch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchTicket {
    generation: u64,
    path: PathBuf,
}

/// The player session state machine
pub struct PlayerSession<M, F>
where
    M: RenderTargetManager,
    F: EngineFactory,
{
    targets: M,
    factory: F,
    buffer: BufferConfig,
    state: SessionState,
    live: Option<LiveSession<F::Engine>>,
    /// Bumped by every switch, initialize and dispose
    generation: u64,
    events: EventHub,
}

impl<M, F> PlayerSession<M, F>
where
    M: RenderTargetManager,
    F: EngineFactory,
{
    /// Create an uninitialized session using the fixed buffering policy
    pub fn new(targets: M, factory: F) -> Self {
        Self {
            targets,
            factory,
            buffer: BufferConfig::FIXED,
            state: SessionState::Uninitialized,
            live: None,
            generation: 0,
            events: EventHub::new(),
        }
    }

    pub fn with_events(mut self, events: EventHub) -> Self {
        self.events = events;
        self
    }

    pub fn events_mut(&mut self) -> &mut EventHub {
        &mut self.events
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn target_id(&self) -> Option<TargetId> {
        self.live.as_ref().map(|live| live.target.id())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        match &self.live {
            Some(live) => SessionSnapshot {
                state: self.state,
                target_id: Some(live.target.id()),
                volume: live.volume,
                media: live.media.clone(),
            },
            None => SessionSnapshot {
                state: self.state,
                target_id: None,
                volume: 1.0,
                media: None,
            },
        }
    }

    /// Create the engine and its render target.
    ///
    /// Idempotent: a live session answers with its existing target id and
    /// nothing new is allocated.
    pub fn initialize(&mut self) -> Result<TargetId> {
        if let Some(live) = &self.live {
            log::debug!(
                "[session] initialize: reusing render target {}",
                live.target.id()
            );
            return Ok(live.target.id());
        }

        let target = self
            .targets
            .allocate()
            .map_err(|e| PlayerError::Init(format!("render target allocation failed: {e}")))?;

        let mut engine = match self.factory.create(&target, self.buffer) {
            Ok(engine) => engine,
            Err(err) => {
                let mut report = ReleaseReport::new();
                self.release_target(target, &mut report);
                return Err(PlayerError::Init(format!("engine construction failed: {err}")));
            }
        };

        if let Err(err) = engine.set_volume(1.0) {
            let mut report = ReleaseReport::new();
            report.attempt("engine", || engine.release());
            self.release_target(target, &mut report);
            return Err(PlayerError::Init(format!("initial volume failed: {err}")));
        }

        let id = target.id();
        self.generation += 1;
        self.live = Some(LiveSession {
            engine,
            target,
            volume: 1.0,
            play_intent: false,
            media: None,
        });
        self.transition(SessionState::Ready);
        log::info!("[session] initialized with render target {}", id);
        Ok(id)
    }

    /// First half of a media switch: stop and clear synchronously.
    ///
    /// Any switch still waiting to complete is superseded by the returned
    /// ticket.
    pub fn begin_switch(&mut self, path: &Path) -> Result<SwitchTicket> {
        if !self.state.accepts_transport() {
            return Err(PlayerError::NotInitialized);
        }
        let live = self.live.as_mut().ok_or(PlayerError::NotInitialized)?;

        live.engine
            .stop()
            .map_err(|e| PlayerError::Switch(format!("stop failed: {e}")))?;
        if let Err(err) = live.engine.clear_media() {
            // The engine is already stopped
            self.transition(SessionState::Ready);
            return Err(PlayerError::Switch(format!("clear failed: {err}")));
        }
        let had_media = live.media.take().is_some();

        self.generation += 1;
        if had_media {
            self.events.dispatch(SessionEvent::MediaCleared);
        }
        self.transition(SessionState::Ready);

        log::debug!(
            "[session] switch #{} to {} scheduled",
            self.generation,
            path.display()
        );
        Ok(SwitchTicket {
            generation: self.generation,
            path: path.to_path_buf(),
        })
    }

    /// Second half of a media switch, run after the settling delay.
    ///
    /// Returns `Ok(false)` without touching the engine when the ticket was
    /// superseded.
    pub fn complete_switch(&mut self, ticket: SwitchTicket) -> Result<bool> {
        if !self.state.has_session() {
            return Err(PlayerError::NotInitialized);
        }
        if ticket.generation != self.generation {
            log::info!(
                "[session] switch #{} to {} superseded",
                ticket.generation,
                ticket.path.display()
            );
            return Ok(false);
        }

        match std::fs::metadata(&ticket.path) {
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(PlayerError::FileNotFound(ticket.path.display().to_string()));
            }
            Err(err) => {
                return Err(PlayerError::Switch(format!(
                    "cannot access {}: {err}",
                    ticket.path.display()
                )));
            }
        }

        self.transition(SessionState::Loading);
        let live = self.live.as_mut().ok_or(PlayerError::NotInitialized)?;

        let play_intent = live.play_intent;
        let engine = &mut live.engine;
        let prepare = AssertUnwindSafe(|| -> NativeResult<MediaInfo> {
            let info = engine.load(&ticket.path)?;
            engine.set_play_when_ready(play_intent)?;
            Ok(info)
        });
        let outcome = panic::catch_unwind(prepare).unwrap_or_else(|_| {
            log::error!("[session] engine panicked loading {}", ticket.path.display());
            Err(NativeError::Failed("engine panicked during load".into()))
        });

        match outcome {
            Ok(info) => {
                live.media = Some(ticket.path.clone());
                let next = if live.play_intent {
                    SessionState::Playing
                } else {
                    SessionState::Ready
                };
                log::info!(
                    "[session] loaded {} ({} tracks)",
                    ticket.path.display(),
                    info.track_count
                );
                self.events.dispatch(SessionEvent::MediaLoaded {
                    path: ticket.path,
                    duration_ms: info.duration_ms,
                });
                self.transition(next);
                Ok(true)
            }
            Err(err) => {
                if let Err(clear_err) = live.engine.clear_media() {
                    log::warn!("[session] clear after failed load: {}", clear_err);
                }
                self.transition(SessionState::Ready);
                Err(PlayerError::Switch(format!(
                    "load of {} failed: {err}",
                    ticket.path.display()
                )))
            }
        }
    }

    pub fn play(&mut self) -> Result<()> {
        if !self.state.accepts_transport() {
            return Err(PlayerError::NotInitialized);
        }
        let live = self.live.as_mut().ok_or(PlayerError::NotInitialized)?;
        live.engine
            .set_play_when_ready(true)
            .map_err(|e| PlayerError::Play(e.to_string()))?;
        live.play_intent = true;
        self.transition(SessionState::Playing);
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        if !self.state.accepts_transport() {
            return Err(PlayerError::NotInitialized);
        }
        let live = self.live.as_mut().ok_or(PlayerError::NotInitialized)?;
        live.engine
            .set_play_when_ready(false)
            .map_err(|e| PlayerError::Pause(e.to_string()))?;
        live.play_intent = false;
        self.transition(SessionState::Paused);
        Ok(())
    }

    /// Apply a volume level clamped into [0.0, 1.0]; returns the applied value
    pub fn set_volume(&mut self, level: f64) -> Result<f32> {
        if level.is_nan() {
            return Err(PlayerError::InvalidArgument("level".to_string()));
        }
        let live = self.live.as_mut().ok_or(PlayerError::NotInitialized)?;

        let volume = level.clamp(0.0, 1.0) as f32;
        live.engine
            .set_volume(volume)
            .map_err(|e| PlayerError::Volume(e.to_string()))?;
        live.volume = volume;

        log::debug!("[session] volume {} (requested {})", volume, level);
        self.events.dispatch(SessionEvent::VolumeChanged { volume });
        Ok(volume)
    }

    /// Tear down the engine, the target id and the surface, in that order.
    ///
    /// Each step runs even when an earlier one fails. Without a live session
    /// this is a no-op with a clean report.
    pub fn dispose(&mut self) -> ReleaseReport {
        let mut report = ReleaseReport::new();
        self.generation += 1;

        let Some(live) = self.live.take() else {
            log::debug!("[session] dispose: nothing to release");
            return report;
        };
        self.transition(SessionState::Disposed);

        let LiveSession {
            mut engine, target, ..
        } = live;
        report.attempt("engine", || engine.release());
        drop(engine);
        self.release_target(target, &mut report);

        for failure in report.failures() {
            self.events.dispatch(SessionEvent::ReleaseFailed {
                step: failure.step,
                message: failure.message.clone(),
            });
        }
        self.transition(SessionState::Uninitialized);

        if report.is_clean() {
            log::info!("[session] disposed");
        } else {
            log::warn!(
                "[session] disposed with {} failed release step(s)",
                report.failures().len()
            );
        }
        report
    }

    fn release_target(&mut self, target: RenderTarget, report: &mut ReleaseReport) {
        let targets = &mut self.targets;
        report.attempt("render target", || targets.release(&target));
        let surface = target.into_surface();
        report.attempt("surface", move || surface.release());
    }

    fn transition(&mut self, to: SessionState) {
        let from = self.state;
        if from == to {
            return;
        }
        if !from.can_transition_to(to) {
            log::error!("[session] unexpected transition {} -> {}", from, to);
        }
        self.state = to;
        log::debug!("[session] {} -> {}", from, to);
        self.events.dispatch(SessionEvent::StateChanged {
            old_state: from,
            new_state: to,
        });
    }
}

impl<M, F> Drop for PlayerSession<M, F>
where
    M: RenderTargetManager,
    F: EngineFactory,
{
    fn drop(&mut self) {
        if self.live.is_some() {
            log::warn!("[session] dropped while live, releasing");
            self.dispose();
        }
    }
}
