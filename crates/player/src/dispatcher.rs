// Confinement dispatcher: one thread owns the session, commands arrive over a FIFO queue
//
// The thread runs a current-thread tokio runtime inside a LocalSet. Commands
// execute in arrival order; the second half of a media switch is spawned as a
// local task after the settle delay, so the queue keeps draining meanwhile.

use crate::config::PlayerConfig;
use reelplay_core::{
    Command, EngineFactory, EventHub, MediaDimensions, PlayerError, PlayerSession, RenderTargetManager,
    Reply, Result, SessionObserver, SessionSnapshot, TargetId,
};
use std::cell::RefCell;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinSet, LocalSet};

/// Completion callback for one command; always invoked on the confined context
type ReplyFn = Box<dyn FnOnce(Result<Reply>) + Send>;

struct Envelope {
    command: Command,
    reply: ReplyFn,
}

/// Result of a submitted command.
///
/// Either `.await` it or call [`Pending::wait`] from a thread that is not
/// running an async runtime.
pub struct Pending<T> {
    rx: oneshot::Receiver<Result<Reply>>,
    extract: fn(Reply) -> Result<T>,
}

impl<T> Pending<T> {
    /// Block the calling thread until the command completes.
    ///
    /// Must not be called from the confined context or from inside a tokio
    /// runtime.
    pub fn wait(self) -> Result<T> {
        match self.rx.blocking_recv() {
            Ok(result) => result.and_then(self.extract),
            Err(_) => Err(PlayerError::Closed),
        }
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let extract = self.extract;
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result.and_then(extract)),
            Poll::Ready(Err(_)) => Poll::Ready(Err(PlayerError::Closed)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Configures observers and runtime settings before the thread starts
#[derive(Default)]
pub struct DispatcherBuilder {
    config: PlayerConfig,
    events: EventHub,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: PlayerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.events.add_observer(observer);
        self
    }

    /// Start the confined context.
    ///
    /// The session (and every engine it creates) is built on the new thread
    /// and never leaves it, so only the manager and factory have to be Send.
    pub fn spawn<M, F>(self, targets: M, factory: F) -> Result<Dispatcher>
    where
        M: RenderTargetManager + Send + 'static,
        F: EngineFactory + Send + 'static,
    {
        let DispatcherBuilder { config, events } = self;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| PlayerError::Init(format!("failed to build dispatcher runtime: {e}")))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let settle_delay = config.settle_delay;
        let observers = events.len();

        let thread = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || {
                let session = PlayerSession::new(targets, factory).with_events(events);
                let local = LocalSet::new();
                local.block_on(&runtime, run_queue(session, rx, settle_delay));
                log::info!("[dispatcher] stopped");
            })
            .map_err(|e| PlayerError::Init(format!("failed to spawn dispatcher thread: {e}")))?;

        log::info!(
            "[dispatcher] started on thread '{}' (settle delay {:?}, {} observer(s))",
            config.thread_name,
            settle_delay,
            observers
        );

        Ok(Dispatcher {
            tx: Some(tx),
            thread: Some(thread),
        })
    }
}

/// Handle to the confined context.
///
/// Submitting never blocks. Dropping the handle closes the queue: queued
/// commands still run, then any live session is disposed and the thread is
/// joined.
pub struct Dispatcher {
    tx: Option<mpsc::UnboundedSender<Envelope>>,
    thread: Option<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Spawn with default configuration and no observers
    pub fn spawn<M, F>(targets: M, factory: F) -> Result<Self>
    where
        M: RenderTargetManager + Send + 'static,
        F: EngineFactory + Send + 'static,
    {
        DispatcherBuilder::new().spawn(targets, factory)
    }

    /// Enqueue a command. `reply` runs exactly once, on the confined context,
    /// or immediately with [`PlayerError::Closed`] when the queue is gone.
    pub fn submit<R>(&self, command: Command, reply: R)
    where
        R: FnOnce(Result<Reply>) + Send + 'static,
    {
        let envelope = Envelope {
            command,
            reply: Box::new(reply),
        };
        let Some(tx) = &self.tx else {
            (envelope.reply)(Err(PlayerError::Closed));
            return;
        };
        if let Err(mpsc::error::SendError(envelope)) = tx.send(envelope) {
            log::warn!(
                "[dispatcher] queue closed, rejecting {}",
                envelope.command.operation().method_name()
            );
            (envelope.reply)(Err(PlayerError::Closed));
        }
    }

    fn request<T>(&self, command: Command, extract: fn(Reply) -> Result<T>) -> Pending<T> {
        let (tx, rx) = oneshot::channel();
        self.submit(command, move |result| {
            // Receiver may have been dropped by a caller that stopped waiting
            let _ = tx.send(result);
        });
        Pending { rx, extract }
    }

    pub fn initialize(&self) -> Pending<TargetId> {
        self.request(Command::Initialize, Reply::into_target_id)
    }

    /// Resolves `true` once the new media is loaded, `false` when a later
    /// switch, dispose or initialize superseded this one
    pub fn switch_media(&self, path: impl Into<PathBuf>) -> Pending<bool> {
        self.request(
            Command::SwitchMedia { path: path.into() },
            Reply::into_switched,
        )
    }

    pub fn play(&self) -> Pending<()> {
        self.request(Command::Play, Reply::into_done)
    }

    pub fn pause(&self) -> Pending<()> {
        self.request(Command::Pause, Reply::into_done)
    }

    pub fn set_volume(&self, level: f64) -> Pending<()> {
        self.request(Command::SetVolume { level }, Reply::into_done)
    }

    pub fn media_dimensions(&self, path: impl Into<PathBuf>) -> Pending<MediaDimensions> {
        self.request(
            Command::GetMediaDimensions { path: path.into() },
            Reply::into_dimensions,
        )
    }

    pub fn dispose(&self) -> Pending<()> {
        self.request(Command::Dispose, Reply::into_done)
    }

    pub fn state(&self) -> Pending<SessionSnapshot> {
        self.request(Command::GetState, Reply::into_snapshot)
    }

    /// Whether the queue still accepts commands
    pub fn is_running(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.tx.take();
        let Some(thread) = self.thread.take() else {
            return;
        };
        // Dropped from a reply callback: the loop exits on its own once this
        // frame returns, joining here would deadlock.
        if thread.thread().id() == thread::current().id() {
            log::debug!("[dispatcher] dropped on the confined context, detaching");
            return;
        }
        if thread.join().is_err() {
            log::error!("[dispatcher] thread panicked");
        }
    }
}

type SharedSession<M, F> = Rc<RefCell<PlayerSession<M, F>>>;

async fn run_queue<M, F>(
    session: PlayerSession<M, F>,
    mut rx: mpsc::UnboundedReceiver<Envelope>,
    settle_delay: Duration,
) where
    M: RenderTargetManager + 'static,
    F: EngineFactory + 'static,
{
    let session = Rc::new(RefCell::new(session));
    let mut switches: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            envelope = rx.recv() => match envelope {
                Some(Envelope { command, reply }) => {
                    let operation = command.operation();
                    let mut reply = Some(reply);
                    let run = AssertUnwindSafe(|| {
                        execute(&session, command, &mut reply, settle_delay, &mut switches)
                    });
                    if panic::catch_unwind(run).is_err() {
                        log::error!("[dispatcher] {} panicked", operation.method_name());
                        if let Some(reply) = reply.take() {
                            reply(Err(PlayerError::Panicked(operation.method_name())));
                        }
                    }
                }
                None => break,
            },

            Some(joined) = switches.join_next(), if !switches.is_empty() => {
                if let Err(err) = joined {
                    log::error!("[dispatcher] switch continuation failed: {}", err);
                }
            }
        }
    }

    log::debug!("[dispatcher] queue closed, draining {} switch(es)", switches.len());
    while let Some(joined) = switches.join_next().await {
        if let Err(err) = joined {
            log::error!("[dispatcher] switch continuation failed: {}", err);
        }
    }

    let report = session.borrow_mut().dispose();
    if !report.is_clean() {
        log::warn!(
            "[dispatcher] shutdown dispose had {} failure(s)",
            report.failures().len()
        );
    }
}

/// Run one command. `slot` holds the reply until the command answers, so a
/// panic before that point can still be reported to the caller.
fn execute<M, F>(
    session: &SharedSession<M, F>,
    command: Command,
    slot: &mut Option<ReplyFn>,
    settle_delay: Duration,
    switches: &mut JoinSet<()>,
) where
    M: RenderTargetManager + 'static,
    F: EngineFactory + 'static,
{
    let operation = command.operation();
    log::debug!("[dispatcher] {}", operation.method_name());

    let result = match command {
        Command::Initialize => session.borrow_mut().initialize().map(Reply::Initialized),
        Command::SwitchMedia { path } => {
            let ticket = session.borrow_mut().begin_switch(&path);
            match ticket {
                Ok(ticket) => {
                    let reply = slot.take();
                    let session = Rc::clone(session);
                    switches.spawn_local(async move {
                        tokio::time::sleep(settle_delay).await;
                        let complete =
                            AssertUnwindSafe(|| session.borrow_mut().complete_switch(ticket));
                        let outcome = panic::catch_unwind(complete).unwrap_or_else(|_| {
                            log::error!("[dispatcher] switch continuation panicked");
                            Err(PlayerError::Panicked(operation.method_name()))
                        });
                        if let Some(reply) = reply {
                            reply(outcome.map(Reply::Switched));
                        }
                    });
                    return;
                }
                Err(err) => Err(err),
            }
        }
        Command::Play => session.borrow_mut().play().map(|()| Reply::Done),
        Command::Pause => session.borrow_mut().pause().map(|()| Reply::Done),
        Command::SetVolume { level } => {
            session.borrow_mut().set_volume(level).map(|_| Reply::Done)
        }
        Command::GetMediaDimensions { path } => reelplay_demux::read_dimensions(&path)
            .map(Reply::Dimensions)
            .map_err(|e| PlayerError::Size(format!("{}: {e}", path.display()))),
        Command::Dispose => {
            // Teardown failures are reported through observers, never to the caller
            session.borrow_mut().dispose();
            Ok(Reply::Done)
        }
        Command::GetState => Ok(Reply::State(session.borrow().snapshot())),
    };

    if let Some(reply) = slot.take() {
        reply(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelplay_core::testing::{Faults, RecordingEngineFactory, RecordingTargets, Trace};
    use reelplay_core::SessionState;

    fn dispatcher(settle_delay: Duration) -> (Dispatcher, Trace) {
        let trace = Trace::new();
        let faults = Faults::new();
        let dispatcher = Dispatcher::builder()
            .config(PlayerConfig::default().with_settle_delay(settle_delay))
            .spawn(
                RecordingTargets::new(trace.clone(), faults.clone()),
                RecordingEngineFactory::new(trace.clone(), faults),
            )
            .unwrap();
        (dispatcher, trace)
    }

    #[test]
    fn test_commands_run_in_submission_order() {
        let (dispatcher, trace) = dispatcher(Duration::ZERO);
        let init = dispatcher.initialize();
        let volume = dispatcher.set_volume(0.5);
        let play = dispatcher.play();

        assert_eq!(init.wait(), Ok(TargetId(1)));
        volume.wait().unwrap();
        play.wait().unwrap();
        assert_eq!(
            trace.entries()[3..],
            ["engine.volume 0.5", "engine.play_when_ready true"]
        );
    }

    #[test]
    fn test_queue_drains_during_settle_delay() {
        let (dispatcher, _) = dispatcher(Duration::from_millis(200));
        let clip = tempfile::NamedTempFile::new().unwrap();
        dispatcher.initialize().wait().unwrap();

        let switch = dispatcher.switch_media(clip.path());
        // Answered while the switch is still settling
        let snapshot = dispatcher.state().wait().unwrap();
        assert_eq!(snapshot.state, SessionState::Ready);
        assert_eq!(snapshot.media, None);

        assert_eq!(switch.wait(), Ok(true));
        let snapshot = dispatcher.state().wait().unwrap();
        assert_eq!(snapshot.media.as_deref(), Some(clip.path()));
    }

    #[tokio::test]
    async fn test_pending_is_awaitable() {
        let (dispatcher, _) = dispatcher(Duration::ZERO);
        assert_eq!(dispatcher.initialize().await, Ok(TargetId(1)));
        assert_eq!(dispatcher.play().await, Ok(()));
        dispatcher.dispose().await.unwrap();
        assert_eq!(dispatcher.play().await, Err(PlayerError::NotInitialized));
    }

    #[test]
    fn test_drop_disposes_live_session() {
        let (dispatcher, trace) = dispatcher(Duration::ZERO);
        dispatcher.initialize().wait().unwrap();
        drop(dispatcher);
        assert_eq!(trace.count("engine.release"), 1);
        assert_eq!(trace.count("surface.release 1"), 1);
    }

    #[test]
    fn test_drop_waits_for_pending_switch() {
        let (dispatcher, trace) = dispatcher(Duration::from_millis(20));
        let clip = tempfile::NamedTempFile::new().unwrap();
        dispatcher.initialize().wait().unwrap();
        let switch = dispatcher.switch_media(clip.path());
        drop(dispatcher);

        assert_eq!(switch.wait(), Ok(true));
        let entries = trace.entries();
        let load = entries.iter().position(|e| e.starts_with("engine.load")).unwrap();
        let release = entries.iter().position(|e| e == "engine.release").unwrap();
        assert!(load < release);
    }
}
