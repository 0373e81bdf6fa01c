//! On-disk record framing.
//!
//! A `.vzip` stream is a bare concatenation of records, one per frame, in
//! ordinal order:
//!
//! ```text
//! ┌────────────────────┬──────────────────────────────┐
//! │ length: u32 LE     │ payload: `length` bytes       │
//! └────────────────────┴──────────────────────────────┘
//! ```
//!
//! There is no global header, frame count or checksum.  A missing record
//! shifts every later one, so a stream is only valid when it is complete.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::codec::{Codec, CodecError};

/// Size of the length prefix in front of every payload.
pub const RECORD_HEADER_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub length: u32,
}

impl RecordHeader {
    /// Header for a payload of `len` bytes, if it is representable.
    pub fn for_payload(len: usize) -> Option<Self> {
        u32::try_from(len).ok().map(|length| Self { length })
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.length)
    }

    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        Ok(Self { length: reader.read_u32::<LittleEndian>()? })
    }
}

/// A compressed frame waiting for its turn in the output stream.
#[derive(Debug, Clone)]
pub struct CompressedBlock {
    pub ordinal: u64,
    /// Uncompressed size of the frame.
    pub raw_len: usize,
    pub bytes:   Vec<u8>,
}

impl CompressedBlock {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

pub fn encode_block(ordinal: u64, raw: &[u8], codec: &dyn Codec) -> Result<CompressedBlock, CodecError> {
    Ok(CompressedBlock {
        ordinal,
        raw_len: raw.len(),
        bytes:   codec.compress(raw)?,
    })
}
