// Media metadata readers: container probing and intrinsic video dimensions

mod atoms;
mod container;

pub use atoms::{read_dimensions, read_dimensions_from};
pub use container::{probe_container, Container};

use reelplay_core::NativeError;
use thiserror::Error;

/// Metadata reading errors
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed container: {0}")]
    Malformed(String),

    #[error("no movie box found")]
    NoMovieBox,

    #[error("no video track with dimensions")]
    NoVideoTrack,

    #[error("unsupported container: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, ProbeError>;

impl From<ProbeError> for NativeError {
    fn from(err: ProbeError) -> Self {
        match err {
            ProbeError::Io(io) => NativeError::Io(io),
            other => NativeError::Failed(other.to_string()),
        }
    }
}
