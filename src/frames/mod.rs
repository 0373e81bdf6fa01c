//! Frame discovery: list a directory, keep the frame files, order them, and
//! check that their ordinals form the sequence `1..=N`.
//!
//! # Ordering
//! Frames are ordered by filename, byte-wise.  That matches numeric order
//! only while every numeric prefix has the same zero-padded width
//! (`0001.ppm … 0999.ppm`).  Mixed widths such as `1.ppm, 2.ppm, 10.ppm`
//! list as `1, 10, 2`; [`validate_sequence`] then rejects the listing with
//! [`SequenceError::OutOfOrder`] rather than reordering it.
//!
//! # Ordinal policy
//! The ordinal is the run of ASCII digits at the start of the filename.
//! Names without one, duplicates, gaps and out-of-order listings are all
//! rejected.  Descriptors are never renumbered.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::error::PackError;

/// Ordinal of the first frame in a sequence.
pub const FIRST_ORDINAL: u64 = 1;
/// Frame file extension used when none is configured.
pub const DEFAULT_EXTENSION: &str = "ppm";

/// One frame file, in output order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameDescriptor {
    pub ordinal: u64,
    pub path:    PathBuf,
}

impl FrameDescriptor {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequenceError {
    #[error("frame file {name:?} has no leading numeric ordinal")]
    MissingOrdinal { name: String },
    #[error("ordinal {ordinal} appears more than once ({name:?})")]
    Duplicate { ordinal: u64, name: String },
    #[error("frame {name:?} with ordinal {ordinal} sits at position {position}; check zero-padding")]
    OutOfOrder { ordinal: u64, position: u64, name: String },
    #[error("frame ordinal {missing} is missing")]
    Gap { missing: u64 },
}

/// Parse the leading decimal digits of `name` as an ordinal.
pub fn parse_ordinal(name: &str) -> Result<u64, SequenceError> {
    let digits_end = name
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(name.len());
    name[..digits_end]
        .parse::<u64>()
        .map_err(|_| SequenceError::MissingOrdinal { name: name.to_owned() })
}

/// List the frame files of `dir` whose names end in `.{extension}`,
/// ordered by filename.
///
/// An empty directory, or one where nothing matches, yields an empty list.
pub fn enumerate_frames(dir: &Path, extension: &str) -> Result<Vec<FrameDescriptor>, PackError> {
    let directory_error = |source| PackError::Directory { path: dir.to_owned(), source };
    let suffix = format!(".{extension}");

    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(directory_error)? {
        let entry = entry.map_err(directory_error)?;
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                warn!(name = ?raw, "skipping non UTF-8 directory entry");
                continue;
            }
        };
        if name.len() > suffix.len() && name.ends_with(&suffix) {
            names.push(name);
        }
    }
    names.sort_unstable();
    debug!(dir = %dir.display(), frames = names.len(), "enumerated frame files");

    names
        .into_iter()
        .map(|name| {
            let ordinal = parse_ordinal(&name)?;
            Ok(FrameDescriptor { ordinal, path: dir.join(name) })
        })
        .collect()
}

/// Check that `frames` carry exactly the ordinals `1..=N`, in order.
pub fn validate_sequence(frames: &[FrameDescriptor]) -> Result<(), SequenceError> {
    for (i, frame) in frames.iter().enumerate() {
        let position = FIRST_ORDINAL + i as u64;
        if frame.ordinal == position {
            continue;
        }
        if let Some(prev) = i.checked_sub(1).map(|p| &frames[p]) {
            if prev.ordinal == frame.ordinal {
                return Err(SequenceError::Duplicate {
                    ordinal: frame.ordinal,
                    name:    frame.file_name(),
                });
            }
        }
        let smaller_follows = frames[i + 1..].iter().any(|f| f.ordinal < frame.ordinal);
        if frame.ordinal < position || smaller_follows {
            return Err(SequenceError::OutOfOrder {
                ordinal: frame.ordinal,
                position,
                name: frame.file_name(),
            });
        }
        return Err(SequenceError::Gap { missing: position });
    }
    Ok(())
}
