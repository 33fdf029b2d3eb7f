// Commands submitted to the confined context and the replies they produce

use crate::error::{ErrorCode, PlayerError, Result};
use crate::render_target::TargetId;
use crate::state::SessionState;
use std::path::PathBuf;

/// Operation names of the command surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Initialize,
    SwitchMedia,
    Play,
    Pause,
    SetVolume,
    GetMediaDimensions,
    Dispose,
    GetState,
}

impl Operation {
    pub const ALL: [Operation; 8] = [
        Operation::Initialize,
        Operation::SwitchMedia,
        Operation::Play,
        Operation::Pause,
        Operation::SetVolume,
        Operation::GetMediaDimensions,
        Operation::Dispose,
        Operation::GetState,
    ];

    pub fn method_name(self) -> &'static str {
        match self {
            Operation::Initialize => "initialize",
            Operation::SwitchMedia => "switchMedia",
            Operation::Play => "play",
            Operation::Pause => "pause",
            Operation::SetVolume => "setVolume",
            Operation::GetMediaDimensions => "getMediaDimensions",
            Operation::Dispose => "dispose",
            Operation::GetState => "getState",
        }
    }

    pub fn from_method(name: &str) -> Option<Operation> {
        Operation::ALL
            .into_iter()
            .find(|op| op.method_name() == name)
    }

    /// Code reported when the operation fails for a reason with no code of its own
    pub fn failure_code(self) -> ErrorCode {
        match self {
            Operation::Initialize => ErrorCode::InitError,
            Operation::SwitchMedia => ErrorCode::SwitchError,
            Operation::Play => ErrorCode::PlayError,
            Operation::Pause => ErrorCode::PauseError,
            Operation::SetVolume => ErrorCode::VolumeError,
            Operation::GetMediaDimensions => ErrorCode::SizeError,
            Operation::Dispose | Operation::GetState => ErrorCode::DisposeError,
        }
    }
}

/// A validated request for the confined context
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Initialize,
    SwitchMedia { path: PathBuf },
    Play,
    Pause,
    SetVolume { level: f64 },
    GetMediaDimensions { path: PathBuf },
    Dispose,
    GetState,
}

impl Command {
    pub fn operation(&self) -> Operation {
        match self {
            Command::Initialize => Operation::Initialize,
            Command::SwitchMedia { .. } => Operation::SwitchMedia,
            Command::Play => Operation::Play,
            Command::Pause => Operation::Pause,
            Command::SetVolume { .. } => Operation::SetVolume,
            Command::GetMediaDimensions { .. } => Operation::GetMediaDimensions,
            Command::Dispose => Operation::Dispose,
            Command::GetState => Operation::GetState,
        }
    }
}

/// Intrinsic width/height of a media file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaDimensions {
    pub width: u32,
    pub height: u32,
}

/// Point-in-time view of the session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub target_id: Option<TargetId>,
    /// Effective volume; 1.0 when no session exists
    pub volume: f32,
    pub media: Option<PathBuf>,
}

/// Successful outcome of a command
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Initialized(TargetId),
    /// `false` when a later switch, initialize or dispose superseded this one
    Switched(bool),
    Done,
    Dimensions(MediaDimensions),
    State(SessionSnapshot),
}

impl Reply {
    pub fn into_target_id(self) -> Result<TargetId> {
        match self {
            Reply::Initialized(id) => Ok(id),
            _ => Err(PlayerError::UnexpectedReply("initialize")),
        }
    }

    pub fn into_switched(self) -> Result<bool> {
        match self {
            Reply::Switched(applied) => Ok(applied),
            _ => Err(PlayerError::UnexpectedReply("switchMedia")),
        }
    }

    pub fn into_done(self) -> Result<()> {
        match self {
            Reply::Done => Ok(()),
            _ => Err(PlayerError::UnexpectedReply("command")),
        }
    }

    pub fn into_dimensions(self) -> Result<MediaDimensions> {
        match self {
            Reply::Dimensions(dimensions) => Ok(dimensions),
            _ => Err(PlayerError::UnexpectedReply("getMediaDimensions")),
        }
    }

    pub fn into_snapshot(self) -> Result<SessionSnapshot> {
        match self {
            Reply::State(snapshot) => Ok(snapshot),
            _ => Err(PlayerError::UnexpectedReply("getState")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_names_round_trip() {
        for op in Operation::ALL {
            assert_eq!(Operation::from_method(op.method_name()), Some(op));
        }
        assert_eq!(Operation::from_method("seek"), None);
        assert_eq!(Operation::from_method("Play"), None);
    }

    #[test]
    fn test_failure_codes() {
        assert_eq!(Operation::Play.failure_code(), ErrorCode::PlayError);
        assert_eq!(
            Operation::GetMediaDimensions.failure_code(),
            ErrorCode::SizeError
        );
    }

    #[test]
    fn test_reply_extraction_rejects_wrong_shape() {
        assert_eq!(Reply::Done.into_done(), Ok(()));
        assert!(Reply::Done.into_target_id().is_err());
        assert_eq!(Reply::Switched(true).into_switched(), Ok(true));
    }
}
