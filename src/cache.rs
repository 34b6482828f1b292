//! Optional on-disk cache of the sorted block index. Loading a cache must
//! reproduce exactly the record list a fresh decode of the store would
//! produce; anything suspect fails loudly so the caller can re-decode.

use std::fs;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::ParseError;
use crate::index::BlockIndexRecord;

/// Container magic ("BIDX").
const CACHE_MAGIC: [u8; 4] = [0x42, 0x49, 0x44, 0x58];
const CACHE_VERSION: u8 = 1;
/// Magic (4) + version (1) + CRC32 (4).
const CACHE_HEADER_SIZE: usize = 9;

/// Writes the sorted record list to `path`: magic, format version, CRC32 of
/// the payload, borsh-encoded records.
pub fn save_index_cache(path: &Path, records: &[BlockIndexRecord]) -> Result<(), ParseError> {
    let payload = borsh::to_vec(&records)?;
    let mut out = Vec::with_capacity(CACHE_HEADER_SIZE + payload.len());
    out.extend_from_slice(&CACHE_MAGIC);
    out.push(CACHE_VERSION);
    let mut checksum = [0u8; 4];
    LittleEndian::write_u32(&mut checksum, crc32fast::hash(&payload));
    out.extend_from_slice(&checksum);
    out.extend_from_slice(&payload);
    fs::write(path, out)?;
    Ok(())
}

/// Loads a record list previously written by [`save_index_cache`].
pub fn load_index_cache(path: &Path) -> Result<Vec<BlockIndexRecord>, ParseError> {
    let bytes = fs::read(path)?;
    if bytes.len() < CACHE_HEADER_SIZE || bytes[..4] != CACHE_MAGIC || bytes[4] != CACHE_VERSION {
        return Err(ParseError::InvalidCache);
    }
    let expected = LittleEndian::read_u32(&bytes[5..9]);
    let payload = &bytes[CACHE_HEADER_SIZE..];
    let found = crc32fast::hash(payload);
    if found != expected {
        return Err(ParseError::ChecksumMismatch { expected, found });
    }
    borsh::from_slice(payload).map_err(|_| ParseError::InvalidCache)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{decode_block_records, write_index_varint, BLOCK_HAVE_DATA};

    fn sample_records() -> Vec<BlockIndexRecord> {
        let entries = (0u8..5).map(|i| {
            let mut key = vec![b'b'];
            key.extend_from_slice(&[i; 32]);
            let mut value = Vec::new();
            write_index_varint(&mut value, 1);
            write_index_varint(&mut value, u64::from(i)); // height
            write_index_varint(&mut value, BLOCK_HAVE_DATA);
            write_index_varint(&mut value, 2);
            write_index_varint(&mut value, 0);
            write_index_varint(&mut value, 8 + u64::from(i) * 100);
            value.extend_from_slice(&[i; 80]);
            (key, value)
        });
        decode_block_records(entries).unwrap()
    }

    #[test]
    fn round_trip_is_exact() {
        let records = sample_records();
        let file = tempfile::NamedTempFile::new().unwrap();
        save_index_cache(file.path(), &records).unwrap();
        assert_eq!(load_index_cache(file.path()).unwrap(), records);
    }

    #[test]
    fn flipped_payload_byte_fails_checksum() {
        let records = sample_records();
        let file = tempfile::NamedTempFile::new().unwrap();
        save_index_cache(file.path(), &records).unwrap();
        let mut bytes = std::fs::read(file.path()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        std::fs::write(file.path(), bytes).unwrap();
        assert!(matches!(
            load_index_cache(file.path()),
            Err(ParseError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn wrong_magic_is_invalid() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"NOPE\x01\x00\x00\x00\x00").unwrap();
        assert!(matches!(
            load_index_cache(file.path()),
            Err(ParseError::InvalidCache)
        ));
    }
}
