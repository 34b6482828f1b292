//! Decoders for Bitcoin Core's block index database: the `serialize.h`
//! varint (not CompactSize), the per-block and per-transaction index
//! records, and loading them from the LevelDB store.

use std::path::Path;

use borsh::{BorshDeserialize, BorshSerialize};
use rusty_leveldb::{LdbIterator, Options, DB};

use crate::block::{BlockHeader, HEADER_SIZE};
use crate::error::ParseError;
use crate::hashes::hex_reversed;

/// Status bit: block data present in a blk file.
pub const BLOCK_HAVE_DATA: u64 = 8;
/// Status bit: undo data present in a rev file.
pub const BLOCK_HAVE_UNDO: u64 = 16;

/// Key prefix of block index entries.
pub(crate) const BLOCK_KEY_PREFIX: u8 = b'b';
/// Key prefix of transaction index entries.
pub(crate) const TX_KEY_PREFIX: u8 = b't';

/// Decodes Core's `serialize.h` varint from the start of `data`.
///
/// Each byte contributes 7 bits; while the continuation bit is set the
/// accumulator is additionally incremented, making the encoding bijective.
/// Returns `Some((value, bytes_consumed))`, or `None` on buffer underrun or
/// 64-bit overflow.
#[inline]
pub fn read_index_varint(data: &[u8]) -> Option<(u64, usize)> {
    let mut n: u64 = 0;
    for (i, &d) in data.iter().enumerate() {
        if n > (u64::MAX >> 7) {
            return None;
        }
        n = (n << 7) | u64::from(d & 0x7f);
        if d & 0x80 == 0 {
            return Some((n, i + 1));
        }
        n = n.checked_add(1)?;
    }
    None
}

/// Encodes `n` in Core's `serialize.h` varint form and appends to `buf`.
pub fn write_index_varint(buf: &mut Vec<u8>, mut n: u64) {
    let mut tmp = [0u8; 10];
    let mut len = 0usize;
    loop {
        tmp[len] = (n & 0x7f) as u8 | if len > 0 { 0x80 } else { 0x00 };
        if n <= 0x7f {
            break;
        }
        n = (n >> 7) - 1;
        len += 1;
    }
    for i in (0..=len).rev() {
        buf.push(tmp[i]);
    }
}

/// One entry of the block index: where a block lives on disk, plus its
/// header.
///
/// `file`, `data_pos`, and `undo_pos` are `-1` when the corresponding
/// status bit is clear.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct BlockIndexRecord {
    /// Block hash, internal (little-endian) order.
    pub hash: [u8; 32],
    pub height: u64,
    pub status: u64,
    pub n_tx: u64,
    pub file: i64,
    pub data_pos: i64,
    pub undo_pos: i64,
    /// The 80 serialized header bytes that close the record.
    pub header: [u8; HEADER_SIZE],
}

impl BlockIndexRecord {
    /// Decodes a `b'b'`-prefixed `(key, value)` pair from the index store.
    ///
    /// The value is a run of index varints (unused, height, status,
    /// tx-count, then positions gated by the status bits) followed by
    /// exactly 80 header bytes; anything else is `InvalidIndexRecord`.
    pub fn from_kv(key: &[u8], value: &[u8]) -> Result<Self, ParseError> {
        if key.len() != 33 || key[0] != BLOCK_KEY_PREFIX {
            return Err(ParseError::InvalidIndexRecord);
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&key[1..]);

        let mut pos = 0usize;
        let mut next = |pos: &mut usize| -> Result<u64, ParseError> {
            let (v, consumed) =
                read_index_varint(&value[*pos..]).ok_or(ParseError::InvalidIndexRecord)?;
            *pos += consumed;
            Ok(v)
        };

        let _client_version = next(&mut pos)?;
        let height = next(&mut pos)?;
        let status = next(&mut pos)?;
        let n_tx = next(&mut pos)?;

        let file = if status & (BLOCK_HAVE_DATA | BLOCK_HAVE_UNDO) != 0 {
            next(&mut pos)? as i64
        } else {
            -1
        };
        let data_pos = if status & BLOCK_HAVE_DATA != 0 {
            next(&mut pos)? as i64
        } else {
            -1
        };
        let undo_pos = if status & BLOCK_HAVE_UNDO != 0 {
            next(&mut pos)? as i64
        } else {
            -1
        };

        if pos + HEADER_SIZE != value.len() {
            return Err(ParseError::InvalidIndexRecord);
        }
        let mut header = [0u8; HEADER_SIZE];
        header.copy_from_slice(&value[pos..]);

        Ok(Self {
            hash,
            height,
            status,
            n_tx,
            file,
            data_pos,
            undo_pos,
            header,
        })
    }

    /// Block hash as displayed (reversed hex).
    pub fn hash_hex(&self) -> String {
        hex_reversed(&self.hash)
    }

    /// The header carried at the end of the record.
    pub fn header(&self) -> Result<BlockHeader, ParseError> {
        BlockHeader::from_bytes(&self.header)
    }
}

/// One entry of the transaction index: which block file holds the
/// transaction, where the block starts, and where the transaction sits in
/// the block's transaction region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxIndexRecord {
    pub blockfile_no: u64,
    pub file_offset: u64,
    pub block_offset: u64,
}

impl TxIndexRecord {
    /// Decodes a transaction index value: three index varints.
    pub fn from_bytes(value: &[u8]) -> Result<Self, ParseError> {
        let (blockfile_no, consumed) =
            read_index_varint(value).ok_or(ParseError::InvalidIndexRecord)?;
        let mut pos = consumed;
        let (file_offset, consumed) =
            read_index_varint(&value[pos..]).ok_or(ParseError::InvalidIndexRecord)?;
        pos += consumed;
        let (block_offset, _) =
            read_index_varint(&value[pos..]).ok_or(ParseError::InvalidIndexRecord)?;
        Ok(Self {
            blockfile_no,
            file_offset,
            block_offset,
        })
    }
}

/// The lookup key of a transaction index entry: `b't'` plus the reversed
/// txid bytes (display order back to internal order).
pub fn tx_index_key(txid_display_hex: &str) -> Result<Vec<u8>, ParseError> {
    let mut bytes = hex::decode(txid_display_hex).map_err(|_| ParseError::Missing)?;
    if bytes.len() != 32 {
        return Err(ParseError::Missing);
    }
    bytes.reverse();
    let mut key = Vec::with_capacity(33);
    key.push(TX_KEY_PREFIX);
    key.extend_from_slice(&bytes);
    Ok(key)
}

/// Decodes every block record among `(key, value)` pairs, ignoring other
/// key prefixes, and returns them sorted ascending by height. The sort is
/// stable: same-height records keep store order for the fork probe.
pub fn decode_block_records<I>(entries: I) -> Result<Vec<BlockIndexRecord>, ParseError>
where
    I: IntoIterator<Item = (Vec<u8>, Vec<u8>)>,
{
    let mut records = Vec::new();
    for (key, value) in entries {
        if key.first() != Some(&BLOCK_KEY_PREFIX) {
            continue;
        }
        records.push(BlockIndexRecord::from_kv(&key, &value)?);
    }
    records.sort_by_key(|r| r.height);
    Ok(records)
}

/// Opens the LevelDB block index at `path`, decodes all block records, and
/// closes the store. The store is never written to.
pub fn load_block_index(path: &Path) -> Result<Vec<BlockIndexRecord>, ParseError> {
    let mut options = Options::default();
    options.create_if_missing = false;
    let mut db = DB::open(path, options)?;

    let mut entries = Vec::new();
    let mut iter = db.new_iter()?;
    let (mut key, mut value) = (Vec::new(), Vec::new());
    while iter.advance() {
        iter.current(&mut key, &mut value);
        if key.first() == Some(&BLOCK_KEY_PREFIX) {
            entries.push((key.clone(), value.clone()));
        }
    }
    drop(iter);
    drop(db);

    let records = decode_block_records(entries)?;
    log::info!(
        "loaded {} block index records from {}",
        records.len(),
        path.display()
    );
    Ok(records)
}
