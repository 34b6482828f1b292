//! Block header and block decoders. A block owns its payload bytes exactly
//! as framed by the file scanner; transactions are iterated lazily.

use byteorder::{ByteOrder, LittleEndian};

use crate::compact_size::read_compact_size;
use crate::error::ParseError;
use crate::hashes::{double_sha256, hex_reversed};
use crate::transaction::Transaction;

/// Serialized header length.
pub const HEADER_SIZE: usize = 80;

/// The 80-byte block header.
///
/// All six fields are decoded eagerly, as is the block hash (double-SHA256
/// of the raw header).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    raw: [u8; HEADER_SIZE],
    hash: [u8; 32],
    version: i32,
    previous_block_hash: [u8; 32],
    merkle_root: [u8; 32],
    timestamp: u32,
    bits: u32,
    nonce: u32,
}

impl BlockHeader {
    /// Decodes the header from the first 80 bytes of `data`.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < HEADER_SIZE {
            return Err(ParseError::Truncated {
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }
        let mut raw = [0u8; HEADER_SIZE];
        raw.copy_from_slice(&data[..HEADER_SIZE]);

        let mut previous_block_hash = [0u8; 32];
        previous_block_hash.copy_from_slice(&raw[4..36]);
        let mut merkle_root = [0u8; 32];
        merkle_root.copy_from_slice(&raw[36..68]);

        Ok(Self {
            hash: double_sha256(&raw),
            version: LittleEndian::read_i32(&raw[..4]),
            previous_block_hash,
            merkle_root,
            timestamp: LittleEndian::read_u32(&raw[68..72]),
            bits: LittleEndian::read_u32(&raw[72..76]),
            nonce: LittleEndian::read_u32(&raw[76..80]),
            raw,
        })
    }

    pub fn raw(&self) -> &[u8; HEADER_SIZE] {
        &self.raw
    }

    /// Block hash, internal order.
    pub fn hash(&self) -> &[u8; 32] {
        &self.hash
    }

    /// Block hash as displayed (reversed hex).
    pub fn hash_hex(&self) -> String {
        hex_reversed(&self.hash)
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn previous_block_hash(&self) -> &[u8; 32] {
        &self.previous_block_hash
    }

    pub fn previous_block_hash_hex(&self) -> String {
        hex_reversed(&self.previous_block_hash)
    }

    pub fn merkle_root(&self) -> &[u8; 32] {
        &self.merkle_root
    }

    pub fn merkle_root_hex(&self) -> String {
        hex_reversed(&self.merkle_root)
    }

    /// Seconds since the epoch, as carried on the wire.
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Compact difficulty target.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn nonce(&self) -> u32 {
        self.nonce
    }

    /// Floating-point expansion of `bits` relative to the maximum target.
    pub fn difficulty(&self) -> f64 {
        let mut shift = (self.bits >> 24) & 0xff;
        let mut diff = 65535.0 / f64::from(self.bits & 0x00ff_ffff);
        while shift < 29 {
            diff *= 256.0;
            shift += 1;
        }
        while shift > 29 {
            diff /= 256.0;
            shift -= 1;
        }
        diff
    }
}

/// A block: header plus CompactSize-counted transactions.
#[derive(Debug, Clone)]
pub struct Block {
    raw: Vec<u8>,
    header: BlockHeader,
    n_transactions: u64,
    /// First transaction's offset within `raw`.
    txs_offset: usize,
    height: Option<u64>,
    blk_file: Option<String>,
}

impl Block {
    /// Decodes a block from its framed payload bytes. The header and the
    /// transaction count are decoded eagerly; transactions are not.
    pub fn from_bytes(raw: impl Into<Vec<u8>>) -> Result<Self, ParseError> {
        let raw = raw.into();
        let header = BlockHeader::from_bytes(&raw)?;
        let (n_transactions, varint_len) =
            read_compact_size(&raw[HEADER_SIZE..]).ok_or(ParseError::MalformedVarint)?;
        Ok(Self {
            header,
            n_transactions,
            txs_offset: HEADER_SIZE + varint_len,
            height: None,
            blk_file: None,
            raw,
        })
    }

    pub(crate) fn with_height(mut self, height: u64) -> Self {
        self.height = Some(height);
        self
    }

    pub(crate) fn with_blk_file(mut self, blk_file: String) -> Self {
        self.blk_file = Some(blk_file);
        self
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn size(&self) -> usize {
        self.raw.len()
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    /// Block hash, internal order (double-SHA256 of the 80-byte header).
    pub fn hash(&self) -> &[u8; 32] {
        self.header.hash()
    }

    pub fn hash_hex(&self) -> String {
        self.header.hash_hex()
    }

    /// Height attached by the ordered traversal, when known.
    pub fn height(&self) -> Option<u64> {
        self.height
    }

    /// Source file name attached by the unordered traversal, when known.
    pub fn blk_file(&self) -> Option<&str> {
        self.blk_file.as_deref()
    }

    /// Declared transaction count; no transactions are parsed for this.
    pub fn n_transactions(&self) -> u64 {
        self.n_transactions
    }

    /// Iterates the block's transactions in on-wire order.
    pub fn transactions(&self) -> Transactions<'_> {
        Transactions {
            data: &self.raw,
            offset: self.txs_offset,
            remaining: self.n_transactions,
            index: 0,
            poisoned: false,
        }
    }
}

/// Pull-based transaction iterator.
///
/// Transaction boundaries inside a block are not independently framed, so a
/// transaction that fails to parse is surfaced once as
/// [`ParseError::CorruptTransaction`] and ends this block's iteration; the
/// surrounding file and chain traversals keep going with the next block.
pub struct Transactions<'a> {
    data: &'a [u8],
    offset: usize,
    remaining: u64,
    index: usize,
    poisoned: bool,
}

impl Iterator for Transactions<'_> {
    type Item = Result<Transaction, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.poisoned || self.remaining == 0 {
            return None;
        }
        match Transaction::from_bytes(&self.data[self.offset..]) {
            Ok((tx, consumed)) => {
                self.offset += consumed;
                self.remaining -= 1;
                self.index += 1;
                Some(Ok(tx))
            }
            Err(e) => {
                log::warn!(
                    "transaction {} failed to decode ({}); skipping the rest of the block",
                    self.index,
                    e
                );
                self.poisoned = true;
                Some(Err(ParseError::CorruptTransaction { index: self.index }))
            }
        }
    }
}
