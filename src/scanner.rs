//! Streaming scanner over the append-only `blk?????.dat` files.
//!
//! Records are concatenated and framed as 4 magic bytes, a 4-byte
//! little-endian payload size, and the payload. Anything outside a frame
//! (zero preallocation, torn writes) is noise to scan past, never an error.

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian};
use memmap2::Mmap;

use crate::block::HEADER_SIZE;
use crate::error::ParseError;

/// Network magic separating block records on mainnet.
pub const BLOCK_MAGIC: [u8; 4] = [0xf9, 0xbe, 0xb4, 0xd9];

/// The `blk*.dat` files under `path`, in lexical order. A path to a single
/// file is returned as-is.
pub fn block_files(path: &Path) -> Result<Vec<PathBuf>, ParseError> {
    if !fs::metadata(path)?.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files: Vec<PathBuf> = fs::read_dir(path)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("blk") && n.ends_with(".dat"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

/// One memory-mapped block file.
///
/// Record slices borrow from the mapping; anything that must outlive the
/// `BlkFile` has to be copied.
pub struct BlkFile {
    path: PathBuf,
    mmap: Mmap,
}

impl BlkFile {
    /// Maps the file read-only.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ParseError> {
        let path = path.into();
        let file = File::open(&path)?;
        // Safety: the mapping is read-only and block files are append-only;
        // Core never rewrites flushed records.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { path, mmap })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Finds the next framed record at or after `offset`.
    /// Returns the payload slice and the offset just past it.
    pub(crate) fn scan_from(&self, mut offset: usize) -> Option<(&[u8], usize)> {
        let data = &self.mmap[..];
        while offset + 4 < data.len() {
            if data[offset..offset + 4] != BLOCK_MAGIC {
                offset += 1;
                continue;
            }
            if offset + 8 > data.len() {
                return None;
            }
            let size = LittleEndian::read_u32(&data[offset + 4..offset + 8]) as usize;
            let start = offset + 8;
            let end = start + size;
            if end > data.len() {
                log::warn!(
                    "{}: record at offset {} declares {} bytes past end of file",
                    self.path.display(),
                    offset,
                    size
                );
                return None;
            }
            return Some((&data[start..end], end));
        }
        None
    }

    /// Iterates the framed record payloads in on-disk order.
    pub fn records(&self) -> Records<'_> {
        Records {
            file: self,
            offset: 0,
        }
    }
}

/// Iterator over the framed payloads of one [`BlkFile`].
pub struct Records<'a> {
    file: &'a BlkFile,
    offset: usize,
}

impl<'a> Iterator for Records<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let (payload, next_offset) = self.file.scan_from(self.offset)?;
        self.offset = next_offset;
        Some(payload)
    }
}

/// Reads the framed block whose payload starts at `data_pos`. The payload
/// size lives in the 4 bytes before it.
pub fn read_block_at(path: &Path, data_pos: u64) -> Result<Vec<u8>, ParseError> {
    if data_pos < 4 {
        return Err(ParseError::Missing);
    }
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(data_pos - 4))?;
    let mut size_buf = [0u8; 4];
    file.read_exact(&mut size_buf)?;
    let size = LittleEndian::read_u32(&size_buf) as usize;
    let mut payload = vec![0u8; size];
    file.read_exact(&mut payload)?;
    Ok(payload)
}

/// Reads only the 80 header bytes of the block at `data_pos`. Enough for
/// chain reconstruction; avoids pulling whole blocks during probing.
pub fn read_header_at(path: &Path, data_pos: u64) -> Result<[u8; HEADER_SIZE], ParseError> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(data_pos))?;
    let mut header = [0u8; HEADER_SIZE];
    file.read_exact(&mut header)?;
    Ok(header)
}
