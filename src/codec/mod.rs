//! Frame codecs: a one-shot, maximum-effort compression call per frame.
//!
//! # Contract
//! A [`Codec`] turns one raw frame into one compressed payload.  Every call
//! builds its own encoder context, so a single codec value is shared by all
//! worker slots without any locking.
//!
//! Each codec is given an output allowance (`max_output`).  A payload that
//! would not fit fails with [`CodecError::Overflow`] rather than being
//! truncated.
//!
//! # Formats
//! - `zlib`: RFC 1950 stream at level 9.  Records are readable by any zlib
//!   `inflate`.
//! - `zstd`: Zstandard frame at the highest supported level.

use std::io::Write;

use flate2::{Compress, Compression, FlushCompress, Status};
use thiserror::Error;

/// Highest zstd level accepted by libzstd.
pub const ZSTD_MAX_LEVEL: i32 = 22;
/// Highest zlib level.
pub const ZLIB_MAX_LEVEL: u32 = 9;

// ── CodecId ──────────────────────────────────────────────────────────────────

/// Runtime codec discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodecId {
    #[default]
    Zlib,
    Zstd,
}

impl CodecId {
    /// Human-readable name (diagnostics and CLI).
    pub fn name(self) -> &'static str {
        match self {
            CodecId::Zlib => "zlib",
            CodecId::Zstd => "zstd",
        }
    }

    /// Parse from a CLI string.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "zlib" => Some(CodecId::Zlib),
            "zstd" => Some(CodecId::Zstd),
            _      => None,
        }
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("Decompression error: {0}")]
    Decompression(String),
    /// The compressed payload does not fit the allotted output buffer.
    #[error("Compressed output exceeds the {limit}-byte output buffer")]
    Overflow { limit: usize },
    #[error("Cannot allocate a {size}-byte output buffer")]
    Allocation { size: usize },
}

// ── Codec trait ──────────────────────────────────────────────────────────────

pub trait Codec: Send + Sync {
    fn codec_id(&self) -> CodecId;
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
}

/// Worst-case compressed size for `raw_len` input bytes, for either codec.
///
/// Covers zlib's `compressBound` and zstd's `ZSTD_compressBound`, plus the
/// container overhead of both.
pub fn output_bound(raw_len: usize) -> usize {
    raw_len
        .saturating_add(raw_len >> 8)
        .saturating_add(raw_len >> 12)
        .saturating_add(128)
}

// ── Built-in codec implementations ──────────────────────────────────────────

pub struct ZlibCodec {
    max_output: usize,
}

impl ZlibCodec {
    pub fn new(max_output: usize) -> Self {
        Self { max_output }
    }
}

impl Codec for ZlibCodec {
    fn codec_id(&self) -> CodecId { CodecId::Zlib }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        // compress_vec only writes into spare capacity, so the reservation
        // is a hard bound on the output.
        let size = output_bound(data.len()).min(self.max_output);
        let mut out = Vec::new();
        out.try_reserve_exact(size)
            .map_err(|_| CodecError::Allocation { size })?;
        let mut encoder = Compress::new(Compression::new(ZLIB_MAX_LEVEL), true);
        let status = encoder
            .compress_vec(data, &mut out, FlushCompress::Finish)
            .map_err(|e| CodecError::Compression(e.to_string()))?;
        match status {
            Status::StreamEnd => {
                // The block waits for its turn holding this buffer.
                out.shrink_to_fit();
                Ok(out)
            }
            Status::Ok | Status::BufError => Err(CodecError::Overflow { limit: self.max_output }),
        }
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut decoder = flate2::write::ZlibDecoder::new(Vec::new());
        decoder.write_all(data).map_err(|e| CodecError::Decompression(e.to_string()))?;
        decoder.finish().map_err(|e| CodecError::Decompression(e.to_string()))
    }
}

pub struct ZstdCodec {
    max_output: usize,
}

impl ZstdCodec {
    pub fn new(max_output: usize) -> Self {
        Self { max_output }
    }
}

impl Codec for ZstdCodec {
    fn codec_id(&self) -> CodecId { CodecId::Zstd }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let out = zstd::bulk::compress(data, ZSTD_MAX_LEVEL)
            .map_err(|e| CodecError::Compression(e.to_string()))?;
        if out.len() > self.max_output {
            return Err(CodecError::Overflow { limit: self.max_output });
        }
        Ok(out)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        zstd::decode_all(data).map_err(|e| CodecError::Decompression(e.to_string()))
    }
}

// ── Factory ──────────────────────────────────────────────────────────────────

/// Resolve a CodecId to a built-in codec with the given output allowance.
pub fn get_codec(id: CodecId, max_output: usize) -> Box<dyn Codec> {
    match id {
        CodecId::Zlib => Box::new(ZlibCodec::new(max_output)),
        CodecId::Zstd => Box::new(ZstdCodec::new(max_output)),
    }
}
