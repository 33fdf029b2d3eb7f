// Container probing using Symphonia

use crate::{ProbeError, Result};
use reelplay_core::MediaInfo;
use std::fs::File;
use std::path::Path;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// An opened media container
pub struct Container {
    format_reader: Box<dyn FormatReader>,
}

impl Container {
    /// Open and probe a local file
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_media_source(Box::new(file), Self::create_hint_from_path(path))
    }

    /// Probe a media source
    pub fn from_media_source(media_source: Box<dyn MediaSource>, hint: Hint) -> Result<Self> {
        let media_source_stream = MediaSourceStream::new(media_source, Default::default());

        let probe_result = symphonia::default::get_probe()
            .format(
                &hint,
                media_source_stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| ProbeError::Unsupported(e.to_string()))?;

        Ok(Self {
            format_reader: probe_result.format,
        })
    }

    /// Create a hint from file extension
    pub fn create_hint_from_path(path: &Path) -> Hint {
        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(extension);
        }
        hint
    }

    pub fn track_count(&self) -> usize {
        self.format_reader.tracks().len()
    }

    /// Longest declared track duration in milliseconds
    pub fn duration_ms(&self) -> Option<u64> {
        self.format_reader
            .tracks()
            .iter()
            .filter_map(|track| {
                let params = &track.codec_params;
                let time = params.time_base?.calc_time(params.n_frames?);
                Some(
                    time.seconds
                        .saturating_mul(1000)
                        .saturating_add((time.frac * 1000.0) as u64),
                )
            })
            .max()
    }

    pub fn media_info(&self) -> MediaInfo {
        MediaInfo {
            duration_ms: self.duration_ms(),
            track_count: self.track_count(),
        }
    }
}

/// Probe a file and summarize it; the reader is dropped before returning
pub fn probe_container(path: &Path) -> Result<MediaInfo> {
    let container = Container::open(path)?;
    let info = container.media_info();
    log::debug!(
        "[container] {}: {} tracks, duration {:?} ms",
        path.display(),
        info.track_count,
        info.duration_ms
    );
    Ok(info)
}
