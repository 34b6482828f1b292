// src/error.rs

use std::io;

/// Errors produced while decoding block files, transactions, or the
/// block index database.
#[derive(Debug)]
pub enum ParseError {
    /// The buffer ended before the declared size could be read.
    Truncated { expected: usize, actual: usize },

    /// A CompactSize or index-db varint could not be decoded.
    MalformedVarint,

    /// A transaction inside a block declared a serialization it does not
    /// have; the rest of that block cannot be re-framed.
    CorruptTransaction { index: usize },

    /// A block index value whose varints do not end on an exact 80-byte
    /// header.
    InvalidIndexRecord,

    /// The index points at a file or position that is not available
    /// (pruned data, unknown txid).
    Missing,

    /// Index cache checksum did not match its payload (CRC32).
    ChecksumMismatch { expected: u32, found: u32 },

    /// Index cache file has the wrong magic, version, or payload encoding.
    InvalidCache,

    /// Underlying filesystem failure.
    Io(io::Error),

    /// Failure reported by the block index database.
    Db(rusty_leveldb::Status),
}

impl core::fmt::Display for ParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Truncated { expected, actual } => {
                write!(f, "Truncated data: need {} bytes, have {}", expected, actual)
            }
            Self::MalformedVarint => write!(f, "Malformed varint"),
            Self::CorruptTransaction { index } => {
                write!(f, "Corrupt transaction at index {}", index)
            }
            Self::InvalidIndexRecord => write!(f, "Invalid block index record"),
            Self::Missing => write!(f, "Block data not available"),
            Self::ChecksumMismatch { expected, found } => write!(
                f,
                "Cache checksum mismatch: expected {:08x}, found {:08x}",
                expected, found
            ),
            Self::InvalidCache => write!(f, "Invalid index cache file"),
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Db(status) => write!(f, "Index database error: {:?}", status),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ParseError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<rusty_leveldb::Status> for ParseError {
    fn from(status: rusty_leveldb::Status) -> Self {
        Self::Db(status)
    }
}
