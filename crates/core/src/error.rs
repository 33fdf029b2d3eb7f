// Error taxonomy for the playback resource manager

use std::fmt;
use thiserror::Error;

/// Player error types
///
/// One variant per caller-facing failure kind, plus the internal cases the
/// dispatcher can produce when it can no longer run a command.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlayerError {
    /// A required argument was missing or had the wrong type
    #[error("invalid argument `{0}`")]
    InvalidArgument(String),

    /// No live session: `initialize` was never called, or `dispose` ran since
    #[error("player is not initialized")]
    NotInitialized,

    /// The media path did not resolve to a file when the switch was applied
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// Allocating the render target or constructing the engine failed
    #[error("initialization failed: {0}")]
    Init(String),

    /// Stopping, clearing or loading media failed during a switch
    #[error("media switch failed: {0}")]
    Switch(String),

    #[error("play failed: {0}")]
    Play(String),

    #[error("pause failed: {0}")]
    Pause(String),

    #[error("volume change failed: {0}")]
    Volume(String),

    /// Intrinsic dimensions could not be read from the file metadata
    #[error("could not read media dimensions: {0}")]
    Size(String),

    #[error("dispose failed: {0}")]
    Dispose(String),

    /// The operation name is not part of the command surface
    #[error("operation `{0}` is not implemented")]
    Unimplemented(String),

    /// The confined context stopped before the command could complete
    #[error("dispatcher is closed")]
    Closed,

    /// A command panicked on the confined context; the context keeps running
    #[error("`{0}` panicked on the dispatcher thread")]
    Panicked(&'static str),

    /// The confined context answered with a reply of the wrong shape
    #[error("unexpected reply to `{0}`")]
    UnexpectedReply(&'static str),
}

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Failure reported by a native collaborator (engine, render target, surface)
#[derive(Debug, Error)]
pub enum NativeError {
    #[error("native failure: {0}")]
    Failed(String),

    #[error("unsupported media: {0}")]
    Unsupported(String),

    #[error("resource already released: {0}")]
    Released(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type NativeResult<T> = std::result::Result<T, NativeError>;

/// Stable caller-facing error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidArgument,
    NotInitialized,
    FileNotFound,
    InitError,
    SwitchError,
    PlayError,
    PauseError,
    VolumeError,
    SizeError,
    DisposeError,
    Unimplemented,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "InvalidArgument",
            ErrorCode::NotInitialized => "NotInitialized",
            ErrorCode::FileNotFound => "FileNotFound",
            ErrorCode::InitError => "InitError",
            ErrorCode::SwitchError => "SwitchError",
            ErrorCode::PlayError => "PlayError",
            ErrorCode::PauseError => "PauseError",
            ErrorCode::VolumeError => "VolumeError",
            ErrorCode::SizeError => "SizeError",
            ErrorCode::DisposeError => "DisposeError",
            ErrorCode::Unimplemented => "Unimplemented",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PlayerError {
    /// Map this error onto a caller-facing code.
    ///
    /// `fallback` is the failure code of the operation that produced the
    /// error; it is used for the internal cases that have no code of their own.
    pub fn code_or(&self, fallback: ErrorCode) -> ErrorCode {
        match self {
            PlayerError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            PlayerError::NotInitialized => ErrorCode::NotInitialized,
            PlayerError::FileNotFound(_) => ErrorCode::FileNotFound,
            PlayerError::Init(_) => ErrorCode::InitError,
            PlayerError::Switch(_) => ErrorCode::SwitchError,
            PlayerError::Play(_) => ErrorCode::PlayError,
            PlayerError::Pause(_) => ErrorCode::PauseError,
            PlayerError::Volume(_) => ErrorCode::VolumeError,
            PlayerError::Size(_) => ErrorCode::SizeError,
            PlayerError::Dispose(_) => ErrorCode::DisposeError,
            PlayerError::Unimplemented(_) => ErrorCode::Unimplemented,
            PlayerError::Closed | PlayerError::Panicked(_) | PlayerError::UnexpectedReply(_) => {
                fallback
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_keep_their_code() {
        let err = PlayerError::FileNotFound("/clips/missing.mp4".into());
        assert_eq!(err.code_or(ErrorCode::SwitchError), ErrorCode::FileNotFound);
        assert_eq!(
            PlayerError::NotInitialized.code_or(ErrorCode::PlayError),
            ErrorCode::NotInitialized
        );
    }

    #[test]
    fn test_closed_takes_operation_code() {
        assert_eq!(
            PlayerError::Closed.code_or(ErrorCode::DisposeError),
            ErrorCode::DisposeError
        );
        assert_eq!(
            PlayerError::Panicked("getMediaDimensions").code_or(ErrorCode::SizeError),
            ErrorCode::SizeError
        );
    }

    #[test]
    fn test_invalid_argument_echoes_name() {
        let err = PlayerError::InvalidArgument("path".into());
        assert_eq!(err.to_string(), "invalid argument `path`");
    }
}
