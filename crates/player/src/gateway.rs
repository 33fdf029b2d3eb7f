// Command gateway: named method calls in, tagged JSON results out
//
// The only place where internal errors become caller-facing codes.

use crate::config::PlayerConfig;
use crate::dispatcher::{Dispatcher, DispatcherBuilder};
use crate::engine::ProbeEngineFactory;
use reelplay_core::{
    Command, ErrorCode, Operation, PlayerError, Reply, Result, SessionObserver, SurfaceRegistry,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::oneshot;

/// A method invocation from the host
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method: String,
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }

    /// Build a call from a method name and a JSON argument string.
    /// An empty string means no arguments.
    pub fn from_json(method: &str, arguments: &str) -> std::result::Result<Self, CallError> {
        let arguments = if arguments.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(arguments).map_err(|e| {
                CallError::new(
                    ErrorCode::InvalidArgument,
                    format!("arguments are not valid JSON: {e}"),
                )
                .with_details("arguments")
            })?
        };
        Ok(Self::new(method, arguments))
    }
}

/// Caller-facing failure
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{code}: {message}")]
pub struct CallError {
    pub code: ErrorCode,
    pub message: String,
    /// Offending argument, path or method name, when there is one
    pub details: Option<String>,
}

impl CallError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Translate an internal error raised while running `operation`
    pub fn from_player_error(operation: Operation, err: PlayerError) -> Self {
        let code = err.code_or(operation.failure_code());
        let details = match &err {
            PlayerError::InvalidArgument(name) => Some(name.clone()),
            PlayerError::FileNotFound(path) => Some(path.clone()),
            PlayerError::Unimplemented(method) => Some(method.clone()),
            _ => None,
        };
        Self {
            code,
            message: err.to_string(),
            details,
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "code": self.code.as_str(),
            "message": self.message,
            "details": self.details,
        })
    }
}

/// Outcome of one method call
pub type Response = std::result::Result<Value, CallError>;

/// Wire form of a [`Response`]: `{"ok": value}` or `{"error": {...}}`
pub fn response_to_json(response: &Response) -> Value {
    match response {
        Ok(value) => json!({ "ok": value }),
        Err(err) => json!({ "error": err.to_json() }),
    }
}

/// Response that has not arrived yet; await it or [`wait`](Self::wait) on it
pub struct PendingResponse {
    rx: oneshot::Receiver<Response>,
    fallback: ErrorCode,
}

impl PendingResponse {
    fn closed(fallback: ErrorCode) -> CallError {
        CallError::new(fallback, PlayerError::Closed.to_string())
    }

    /// Block until the response arrives. Not for use inside an async runtime.
    pub fn wait(self) -> Response {
        let fallback = self.fallback;
        self.rx.blocking_recv().unwrap_or_else(|_| Err(Self::closed(fallback)))
    }
}

impl Future for PendingResponse {
    type Output = Response;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Response> {
        let fallback = self.fallback;
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(Self::closed(fallback))))
    }
}

/// The command surface exposed to the host
pub struct Gateway {
    dispatcher: Dispatcher,
}

impl Gateway {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Gateway over the default surface registry and probe engine
    pub fn spawn_default(config: PlayerConfig) -> Result<Self> {
        Self::spawn_with_observers(config, Vec::new())
    }

    pub fn spawn_with_observers(
        config: PlayerConfig,
        observers: Vec<Arc<dyn SessionObserver>>,
    ) -> Result<Self> {
        let builder = observers
            .into_iter()
            .fold(DispatcherBuilder::new().config(config), |builder, observer| {
                builder.observer(observer)
            });
        let dispatcher = builder.spawn(SurfaceRegistry::new(), ProbeEngineFactory)?;
        Ok(Self::new(dispatcher))
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Validate and enqueue a call; `respond` runs exactly once.
    ///
    /// Argument errors and unknown methods are answered on the calling
    /// thread; everything else is answered on the confined context.
    pub fn invoke_with<R>(&self, call: MethodCall, respond: R)
    where
        R: FnOnce(Response) + Send + 'static,
    {
        let command = match decode(&call) {
            Ok(command) => command,
            Err(err) => {
                log::debug!("[gateway] rejected {}: {}", call.method, err);
                respond(Err(err));
                return;
            }
        };
        let operation = command.operation();
        self.dispatcher.submit(command, move |result| {
            let response = encode(operation, result);
            if let Err(err) = &response {
                log::info!("[gateway] {} failed: {}", operation.method_name(), err);
            }
            respond(response);
        });
    }

    pub fn invoke(&self, call: MethodCall) -> PendingResponse {
        let fallback = Operation::from_method(&call.method)
            .map(Operation::failure_code)
            .unwrap_or(ErrorCode::Unimplemented);
        let (tx, rx) = oneshot::channel();
        self.invoke_with(call, move |response| {
            let _ = tx.send(response);
        });
        PendingResponse { rx, fallback }
    }
}

#[derive(Deserialize)]
struct PathArguments {
    path: String,
}

#[derive(Deserialize)]
struct VolumeArguments {
    level: f64,
}

fn invalid_argument(name: &str) -> CallError {
    CallError::new(
        ErrorCode::InvalidArgument,
        PlayerError::InvalidArgument(name.to_string()).to_string(),
    )
    .with_details(name)
}

fn parse_arguments<T: DeserializeOwned>(arguments: &Value, name: &str) -> std::result::Result<T, CallError> {
    T::deserialize(arguments).map_err(|e| {
        log::debug!("[gateway] bad `{}` argument: {}", name, e);
        invalid_argument(name)
    })
}

fn path_argument(call: &MethodCall) -> std::result::Result<PathBuf, CallError> {
    let PathArguments { path } = parse_arguments(&call.arguments, "path")?;
    if path.is_empty() {
        return Err(invalid_argument("path"));
    }
    Ok(PathBuf::from(path))
}

fn level_argument(call: &MethodCall) -> std::result::Result<f64, CallError> {
    let VolumeArguments { level } = parse_arguments(&call.arguments, "level")?;
    Ok(level)
}

fn decode(call: &MethodCall) -> std::result::Result<Command, CallError> {
    let operation = Operation::from_method(&call.method).ok_or_else(|| {
        CallError::new(
            ErrorCode::Unimplemented,
            PlayerError::Unimplemented(call.method.clone()).to_string(),
        )
        .with_details(call.method.clone())
    })?;

    let command = match operation {
        Operation::Initialize => Command::Initialize,
        Operation::SwitchMedia => Command::SwitchMedia {
            path: path_argument(call)?,
        },
        Operation::Play => Command::Play,
        Operation::Pause => Command::Pause,
        Operation::SetVolume => Command::SetVolume {
            level: level_argument(call)?,
        },
        Operation::GetMediaDimensions => Command::GetMediaDimensions {
            path: path_argument(call)?,
        },
        Operation::Dispose => Command::Dispose,
        Operation::GetState => Command::GetState,
    };
    Ok(command)
}

fn encode(operation: Operation, result: Result<Reply>) -> Response {
    match result {
        Ok(reply) => Ok(reply_to_json(reply)),
        Err(err) => Err(CallError::from_player_error(operation, err)),
    }
}

fn reply_to_json(reply: Reply) -> Value {
    match reply {
        Reply::Initialized(id) => json!({ "targetId": id.0 }),
        Reply::Switched(applied) => Value::Bool(applied),
        Reply::Done => Value::Null,
        Reply::Dimensions(dimensions) => json!({
            "width": dimensions.width,
            "height": dimensions.height,
        }),
        Reply::State(snapshot) => json!({
            "state": snapshot.state.as_str(),
            "targetId": snapshot.target_id.map(|id| id.0),
            "volume": snapshot.volume,
            "media": snapshot.media.map(|path| path.display().to_string()),
        }),
    }
}
