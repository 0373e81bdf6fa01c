//! Job-level error type.
//!
//! Every per-frame variant carries the frame ordinal, so a failed job names
//! the frame that broke it.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::codec::CodecError;
use crate::frames::SequenceError;
use crate::io_stream::CommitError;

#[derive(Error, Debug)]
pub enum PackError {
    #[error("cannot list frame directory {}: {source}", .path.display())]
    Directory {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid frame sequence: {0}")]
    Sequence(#[from] SequenceError),

    #[error("frame {ordinal} ({}): read failed: {source}", .path.display())]
    Read {
        ordinal: u64,
        path:    PathBuf,
        #[source]
        source:  io::Error,
    },

    #[error("frame {ordinal} ({}): {size} bytes exceeds the {limit}-byte frame limit", .path.display())]
    FrameTooLarge {
        ordinal: u64,
        path:    PathBuf,
        size:    u64,
        limit:   usize,
    },

    #[error("frame {ordinal}: cannot allocate a {size}-byte working buffer")]
    Allocation { ordinal: u64, size: usize },

    #[error("frame {ordinal}: {source}")]
    Codec {
        ordinal: u64,
        #[source]
        source:  CodecError,
    },

    #[error("frame {ordinal}: commit failed: {source}")]
    Commit {
        ordinal: u64,
        #[source]
        source:  CommitError,
    },

    #[error("ordered writer: {source}")]
    Writer {
        #[source]
        source: CommitError,
    },

    #[error("output {}: {source}", .path.display())]
    Output {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("worker pool: {0}")]
    Pool(String),
}

impl PackError {
    /// Ordinal of the frame this error belongs to, if any.
    pub fn ordinal(&self) -> Option<u64> {
        match self {
            PackError::Read { ordinal, .. }
            | PackError::FrameTooLarge { ordinal, .. }
            | PackError::Allocation { ordinal, .. }
            | PackError::Codec { ordinal, .. }
            | PackError::Commit { ordinal, .. } => Some(*ordinal),
            _ => None,
        }
    }

    /// Short, stable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            PackError::Directory { .. }     => "directory",
            PackError::Sequence(_)          => "sequence",
            PackError::Read { .. }          => "read",
            PackError::FrameTooLarge { .. } => "frame-too-large",
            PackError::Allocation { .. }    => "allocation",
            PackError::Codec { source: CodecError::Overflow { .. }, .. } => "codec-overflow",
            PackError::Codec { source: CodecError::Allocation { .. }, .. } => "allocation",
            PackError::Codec { .. }         => "codec",
            PackError::Commit { .. }        => "commit",
            PackError::Writer { .. }        => "writer",
            PackError::Output { .. }        => "output",
            PackError::Pool(_)              => "pool",
        }
    }

    /// True when this error only reports that another frame failed first.
    pub fn is_secondary(&self) -> bool {
        matches!(self, PackError::Commit { source: CommitError::Aborted { .. }, .. })
    }
}
