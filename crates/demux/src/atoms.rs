// ISO base media (MP4/MOV) box walker for intrinsic video dimensions
//
// Only the movie box is read into memory; media data is skipped with seeks,
// so a trailing moov after a large mdat costs one seek, not a full read.

use crate::{ProbeError, Result};
use reelplay_core::MediaDimensions;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Refuse movie boxes larger than this
const MAX_MOVIE_BOX: u64 = 64 * 1024 * 1024;

/// Offset of the 16.16 width field inside a tkhd payload
const TKHD_WIDTH_OFFSET_V0: usize = 76;
const TKHD_WIDTH_OFFSET_V1: usize = 88;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Atom {
    atom_type: [u8; 4],
    header_len: u64,
    /// Total size including the header
    size: u64,
}

/// Parse an in-memory box header at `offset`.
///
/// `size == 1` selects the 64-bit largesize field, `size == 0` extends the box
/// to the end of `data`. Returns None for truncated or overrunning boxes.
fn parse_atom_header(data: &[u8], offset: usize) -> Option<Atom> {
    let header = data.get(offset..offset.checked_add(8)?)?;
    let mut size = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as u64;

    let mut atom_type = [0u8; 4];
    atom_type.copy_from_slice(&header[4..8]);

    let mut header_len = 8;
    if size == 1 {
        let large = data.get(offset.checked_add(8)?..offset.checked_add(16)?)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(large);
        size = u64::from_be_bytes(raw);
        header_len = 16;
    } else if size == 0 {
        size = (data.len() - offset) as u64;
    }

    let end = u64::try_from(offset).ok()?.checked_add(size)?;
    if size < header_len || end > data.len() as u64 {
        return None;
    }

    Some(Atom {
        atom_type,
        header_len,
        size,
    })
}

/// Child boxes of a container payload, with their own payloads.
///
/// Fewer than 8 trailing bytes are treated as padding; a child that cannot be
/// parsed yields one `Malformed` error and ends the walk.
struct ChildAtoms<'a> {
    data: &'a [u8],
    pos: usize,
}

fn child_atoms(data: &[u8]) -> ChildAtoms<'_> {
    ChildAtoms { data, pos: 0 }
}

impl<'a> ChildAtoms<'a> {
    fn payload(&self, atom: &Atom) -> Option<(usize, &'a [u8])> {
        let start = self.pos.checked_add(usize::try_from(atom.header_len).ok()?)?;
        let end = self.pos.checked_add(usize::try_from(atom.size).ok()?)?;
        Some((end, self.data.get(start..end)?))
    }
}

impl<'a> Iterator for ChildAtoms<'a> {
    type Item = Result<(Atom, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.len().saturating_sub(self.pos) < 8 {
            return None;
        }
        let offset = self.pos;
        let parsed = parse_atom_header(self.data, offset)
            .and_then(|atom| self.payload(&atom).map(|(end, payload)| (atom, end, payload)));
        match parsed {
            Some((atom, end, payload)) => {
                self.pos = end;
                Some(Ok((atom, payload)))
            }
            None => {
                self.pos = self.data.len();
                Some(Err(ProbeError::Malformed(format!(
                    "child box at offset {} overruns its parent",
                    offset
                ))))
            }
        }
    }
}

fn fourcc(atom_type: &[u8; 4]) -> String {
    String::from_utf8_lossy(atom_type).into_owned()
}

/// Locate the top-level movie box and return its payload
fn read_movie_box<R: Read + Seek>(reader: &mut R) -> Result<Vec<u8>> {
    let len = reader.seek(SeekFrom::End(0))?;
    let mut pos = 0u64;

    while pos + 8 <= len {
        reader.seek(SeekFrom::Start(pos))?;
        let mut header = [0u8; 16];
        reader.read_exact(&mut header[..8])?;

        let mut size = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as u64;
        let mut atom_type = [0u8; 4];
        atom_type.copy_from_slice(&header[4..8]);

        let mut header_len = 8;
        if size == 1 {
            reader.read_exact(&mut header[8..16])?;
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&header[8..16]);
            size = u64::from_be_bytes(raw);
            header_len = 16;
        } else if size == 0 {
            size = len - pos;
        }

        if size < header_len || pos.saturating_add(size) > len {
            return Err(ProbeError::Malformed(format!(
                "box '{}' at offset {} overruns the file",
                fourcc(&atom_type),
                pos
            )));
        }

        if &atom_type == b"moov" {
            let payload_len = size - header_len;
            if payload_len > MAX_MOVIE_BOX {
                return Err(ProbeError::Malformed(format!(
                    "movie box of {} bytes is too large",
                    payload_len
                )));
            }
            let mut payload = vec![0u8; payload_len as usize];
            reader.read_exact(&mut payload)?;
            return Ok(payload);
        }

        pos += size;
    }

    Err(ProbeError::NoMovieBox)
}

/// Width/height from a track header payload (16.16 fixed point, integer part)
fn track_header_dimensions(tkhd: &[u8]) -> Option<MediaDimensions> {
    let offset = match tkhd.first()? {
        0 => TKHD_WIDTH_OFFSET_V0,
        1 => TKHD_WIDTH_OFFSET_V1,
        version => {
            log::debug!("[atoms] unknown tkhd version {}", version);
            return None;
        }
    };
    let fields = tkhd.get(offset..offset + 8)?;
    let width = u32::from_be_bytes([fields[0], fields[1], fields[2], fields[3]]) >> 16;
    let height = u32::from_be_bytes([fields[4], fields[5], fields[6], fields[7]]) >> 16;
    Some(MediaDimensions { width, height })
}

/// Dimensions of the first track with a non-empty visual size
fn dimensions_from_movie(moov: &[u8]) -> Result<MediaDimensions> {
    for child in child_atoms(moov) {
        let (atom, trak) = child?;
        if &atom.atom_type != b"trak" {
            continue;
        }
        let mut header = None;
        for inner in child_atoms(trak) {
            let (atom, payload) = inner?;
            if &atom.atom_type == b"tkhd" {
                header = Some(payload);
                break;
            }
        }
        let Some(tkhd) = header else {
            continue;
        };
        match track_header_dimensions(tkhd) {
            Some(dimensions) if dimensions.width > 0 && dimensions.height > 0 => {
                return Ok(dimensions);
            }
            _ => {}
        }
    }
    Err(ProbeError::NoVideoTrack)
}

/// Read intrinsic video dimensions from any seekable ISO-BMFF stream
pub fn read_dimensions_from<R: Read + Seek>(reader: &mut R) -> Result<MediaDimensions> {
    let moov = read_movie_box(reader)?;
    dimensions_from_movie(&moov)
}

/// Read intrinsic video dimensions from a file.
///
/// The file handle lives only for the duration of the call.
pub fn read_dimensions(path: &Path) -> Result<MediaDimensions> {
    let mut reader = BufReader::new(File::open(path)?);
    let dimensions = read_dimensions_from(&mut reader)?;
    log::debug!(
        "[atoms] {}: {}x{}",
        path.display(),
        dimensions.width,
        dimensions.height
    );
    Ok(dimensions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn boxed(atom_type: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(payload.len() + 8);
        out.extend_from_slice(&((payload.len() + 8) as u32).to_be_bytes());
        out.extend_from_slice(atom_type);
        out.extend_from_slice(payload);
        out
    }

    fn tkhd(version: u8, width: u32, height: u32) -> Vec<u8> {
        let offset = if version == 0 {
            TKHD_WIDTH_OFFSET_V0
        } else {
            TKHD_WIDTH_OFFSET_V1
        };
        let mut payload = vec![0u8; offset + 8];
        payload[0] = version;
        payload[offset..offset + 4].copy_from_slice(&(width << 16).to_be_bytes());
        payload[offset + 4..offset + 8].copy_from_slice(&(height << 16).to_be_bytes());
        boxed(b"tkhd", &payload)
    }

    fn movie(tracks: &[Vec<u8>]) -> Vec<u8> {
        let mut payload = boxed(b"mvhd", &[0u8; 100]);
        for track in tracks {
            payload.extend(boxed(b"trak", track));
        }
        boxed(b"moov", &payload)
    }

    fn file(parts: &[Vec<u8>]) -> Vec<u8> {
        let mut out = boxed(b"ftyp", b"isom\0\0\0\0isomavc1");
        for part in parts {
            out.extend_from_slice(part);
        }
        out
    }

    #[test]
    fn test_reads_video_track_dimensions() {
        let data = file(&[movie(&[tkhd(0, 1920, 1080)]), boxed(b"mdat", &[0u8; 32])]);
        let dimensions = read_dimensions_from(&mut Cursor::new(data)).unwrap();
        assert_eq!(
            dimensions,
            MediaDimensions {
                width: 1920,
                height: 1080
            }
        );
    }

    #[test]
    fn test_skips_audio_track_and_reads_version_one_header() {
        let data = file(&[movie(&[tkhd(0, 0, 0), tkhd(1, 640, 360)])]);
        let dimensions = read_dimensions_from(&mut Cursor::new(data)).unwrap();
        assert_eq!(
            dimensions,
            MediaDimensions {
                width: 640,
                height: 360
            }
        );
    }

    #[test]
    fn test_movie_box_after_large_media_box() {
        let mut mdat = Vec::new();
        mdat.extend_from_slice(&1u32.to_be_bytes());
        mdat.extend_from_slice(b"mdat");
        mdat.extend_from_slice(&(16u64 + 4096).to_be_bytes());
        mdat.extend_from_slice(&[0u8; 4096]);

        let data = file(&[mdat, movie(&[tkhd(0, 1280, 720)])]);
        let dimensions = read_dimensions_from(&mut Cursor::new(data)).unwrap();
        assert_eq!(dimensions.width, 1280);
        assert_eq!(dimensions.height, 720);
    }

    #[test]
    fn test_audio_only_has_no_video_track() {
        let data = file(&[movie(&[tkhd(0, 0, 0)])]);
        assert!(matches!(
            read_dimensions_from(&mut Cursor::new(data)),
            Err(ProbeError::NoVideoTrack)
        ));
    }

    #[test]
    fn test_missing_movie_box() {
        let data = file(&[boxed(b"mdat", &[0u8; 16])]);
        assert!(matches!(
            read_dimensions_from(&mut Cursor::new(data)),
            Err(ProbeError::NoMovieBox)
        ));
    }

    #[test]
    fn test_truncated_box_is_malformed() {
        let mut data = file(&[movie(&[tkhd(0, 320, 240)])]);
        data.truncate(data.len() - 10);
        assert!(matches!(
            read_dimensions_from(&mut Cursor::new(data)),
            Err(ProbeError::Malformed(_))
        ));
    }

    #[test]
    fn test_oversized_child_box_is_malformed() {
        let mut trak = Vec::new();
        trak.extend_from_slice(&1u32.to_be_bytes());
        trak.extend_from_slice(b"trak");
        trak.extend_from_slice(&u64::MAX.to_be_bytes());
        trak.extend(tkhd(0, 640, 480));

        let mut payload = boxed(b"mvhd", &[0u8; 100]);
        payload.extend(trak);
        let data = file(&[boxed(b"moov", &payload)]);

        assert!(matches!(
            read_dimensions_from(&mut Cursor::new(data)),
            Err(ProbeError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_atom_header_rejects_largesize_overflow() {
        let mut data = Vec::new();
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(b"free");
        data.extend_from_slice(&u64::MAX.to_be_bytes());
        assert_eq!(parse_atom_header(&data, 0), None);
        assert_eq!(parse_atom_header(&data, usize::MAX), None);
    }

    #[test]
    fn test_parse_atom_header_rejects_overrun() {
        let mut data = boxed(b"free", &[0u8; 8]);
        assert!(parse_atom_header(&data, 0).is_some());
        data.truncate(12);
        assert_eq!(parse_atom_header(&data, 0), None);
    }

    #[test]
    fn test_read_dimensions_from_file() {
        let mut clip = tempfile::NamedTempFile::new().unwrap();
        clip.write_all(&file(&[movie(&[tkhd(0, 720, 1280)])])).unwrap();
        clip.flush().unwrap();

        let dimensions = read_dimensions(clip.path()).unwrap();
        assert_eq!(dimensions.width, 720);
        assert_eq!(dimensions.height, 1280);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let missing = std::env::temp_dir().join("reelplay-no-such-clip.mp4");
        assert!(matches!(read_dimensions(&missing), Err(ProbeError::Io(_))));
    }
}
