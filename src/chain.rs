//! Chain reconstruction over the raw block files and Core's block index:
//! unordered file-order traversal, height-ordered traversal with short-fork
//! pruning, and direct transaction lookup through the transaction index.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rusty_leveldb::{Options, DB};

use crate::block::Block;
use crate::cache::{load_index_cache, save_index_cache};
use crate::error::ParseError;
use crate::index::{load_block_index, tx_index_key, BlockIndexRecord, TxIndexRecord};
use crate::scanner::{block_files, read_block_at, read_header_at, BlkFile};
use crate::transaction::Transaction;

/// Descendant chain length that settles a duplicate-height fork.
const NUM_CONFIRMATIONS: usize = 6;

/// The blockchain contained in a directory of `blk?????.dat` files, plus a
/// memoized copy of Core's sorted block index once one has been loaded.
pub struct Blockchain {
    path: PathBuf,
    index_path: Option<PathBuf>,
    block_index: Option<Vec<BlockIndexRecord>>,
}

impl Blockchain {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            index_path: None,
            block_index: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the block file with the given number.
    fn blk_file_path(&self, file_no: i64) -> PathBuf {
        self.path.join(format!("blk{:05}.dat", file_no))
    }

    /// Iterates blocks as laid out on disk: files in lexical order, records
    /// in file order. No index database is needed; heights are unknown.
    pub fn unordered_blocks(&self) -> Result<UnorderedBlocks, ParseError> {
        Ok(UnorderedBlocks {
            files: block_files(&self.path)?.into_iter().collect(),
            current: None,
        })
    }

    /// The sorted block index for `index`: the in-memory memo, then the
    /// cache file, then a fresh decode of the store (written back to
    /// `cache` when a path was given).
    fn sorted_index(
        &mut self,
        index: &Path,
        cache: Option<&Path>,
    ) -> Result<&[BlockIndexRecord], ParseError> {
        if self.index_path.as_deref() != Some(index) || self.block_index.is_none() {
            let records = match cache {
                Some(cache_path) if cache_path.exists() => match load_index_cache(cache_path) {
                    Ok(records) => {
                        log::info!("using cached block index {}", cache_path.display());
                        records
                    }
                    Err(e) => {
                        log::warn!(
                            "ignoring unreadable index cache {}: {}",
                            cache_path.display(),
                            e
                        );
                        load_block_index(index)?
                    }
                },
                _ => {
                    let records = load_block_index(index)?;
                    if let Some(cache_path) = cache {
                        save_index_cache(cache_path, &records)?;
                        log::info!("wrote block index cache {}", cache_path.display());
                    }
                    records
                }
            };
            self.index_path = Some(index.to_path_buf());
            self.block_index = Some(records);
        }
        Ok(self.block_index.as_deref().unwrap_or(&[]))
    }

    /// Probes forward from a duplicate-height record to decide whether it
    /// belongs to the chain that keeps growing.
    ///
    /// Candidate chains are extended with each subsequent record whose
    /// previous-block hash matches a chain tip; the first chain to reach
    /// [`NUM_CONFIRMATIONS`] decides. A record without block data, or
    /// running out of records before any chain is long enough, leaves the
    /// block unconfirmed.
    fn index_confirmed(&self, records: &[BlockIndexRecord]) -> Result<bool, ParseError> {
        let mut chains: Vec<Vec<[u8; 32]>> = Vec::new();
        let mut first_hash: Option<[u8; 32]> = None;

        for record in records {
            if record.file == -1 || record.data_pos == -1 {
                return Ok(false);
            }
            let header = crate::block::BlockHeader::from_bytes(&read_header_at(
                &self.blk_file_path(record.file),
                record.data_pos as u64,
            )?)?;
            let hash = *header.hash();
            let first = *first_hash.get_or_insert(hash);
            chains.push(vec![hash]);
            for chain in &mut chains {
                if chain.last() == Some(header.previous_block_hash()) {
                    chain.push(hash);
                }
                if chain.len() == NUM_CONFIRMATIONS {
                    return Ok(chain.contains(&first));
                }
            }
        }
        Ok(false)
    }

    /// Removes duplicate-height records that lose the confirmation probe.
    fn prune_orphans(
        &self,
        records: &[BlockIndexRecord],
    ) -> Result<Vec<BlockIndexRecord>, ParseError> {
        let mut orphans: HashSet<[u8; 32]> = HashSet::new();
        let mut last_height: Option<u64> = None;
        for (i, record) in records.iter().enumerate() {
            if last_height == Some(record.height) {
                if self.index_confirmed(&records[i..])? {
                    // The newer duplicate is on the surviving chain; drop
                    // the one before it.
                    orphans.insert(records[i - 1].hash);
                } else {
                    orphans.insert(record.hash);
                }
            }
            last_height = Some(record.height);
        }
        if !orphans.is_empty() {
            log::info!("pruned {} short-fork block(s) from the index", orphans.len());
        }
        Ok(records
            .iter()
            .filter(|r| !orphans.contains(&r.hash))
            .cloned()
            .collect())
    }

    /// Iterates blocks ascending by height, reconciling the index database
    /// with the block files and pruning short forks.
    ///
    /// `start` and `end` address positions in the pruned, sorted index
    /// (`end = None` means its length); `end < start` walks the range in
    /// descending order. `cache` names an optional index cache file.
    pub fn ordered_blocks(
        &mut self,
        index: &Path,
        start: usize,
        end: Option<usize>,
        cache: Option<&Path>,
    ) -> Result<OrderedBlocks, ParseError> {
        let records = self.sorted_index(index, cache)?.to_vec();
        let mut records = self.prune_orphans(&records)?;

        let mut start = start;
        let mut end = end.unwrap_or(records.len());
        if end < start {
            records.reverse();
            let len = records.len();
            (start, end) = (len.saturating_sub(start), len.saturating_sub(end));
        }
        let start = start.min(records.len());
        let end = end.min(records.len());
        let range = if start < end {
            records[start..end].to_vec()
        } else {
            Vec::new()
        };

        Ok(OrderedBlocks {
            blocks_path: self.path.clone(),
            records: range.into_iter().collect(),
            done: false,
        })
    }

    /// Looks a transaction up by its display txid through the transaction
    /// index database, then decodes it straight from the block file.
    pub fn get_transaction(&self, txid: &str, db: &mut DB) -> Result<Transaction, ParseError> {
        let key = tx_index_key(txid)?;
        let value = db.get(&key).ok_or(ParseError::Missing)?;
        let record = TxIndexRecord::from_bytes(&value)?;

        let path = self.blk_file_path(record.blockfile_no as i64);
        let block = read_block_at(&path, record.file_offset)?;

        // block_offset addresses the transaction region, after the header.
        let tx_start = 80usize
            .checked_add(record.block_offset as usize)
            .filter(|&s| s <= block.len())
            .ok_or(ParseError::Missing)?;
        let (transaction, _) = Transaction::from_bytes(&block[tx_start..])?;
        Ok(transaction)
    }
}

/// Opens Core's transaction index (or any of its LevelDB stores) read-only
/// for use with [`Blockchain::get_transaction`].
pub fn open_index_db(path: &Path) -> Result<DB, ParseError> {
    let mut options = Options::default();
    options.create_if_missing = false;
    Ok(DB::open(path, options)?)
}

/// Iterator over blocks in on-disk order. Unreadable files and records are
/// logged and skipped; iteration never aborts on them.
pub struct UnorderedBlocks {
    files: std::collections::VecDeque<PathBuf>,
    current: Option<(BlkFile, usize)>,
}

impl Iterator for UnorderedBlocks {
    type Item = Block;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current.is_none() {
                let path = self.files.pop_front()?;
                match BlkFile::open(&path) {
                    Ok(file) => self.current = Some((file, 0)),
                    Err(e) => {
                        log::warn!("skipping unreadable {}: {}", path.display(), e);
                        continue;
                    }
                }
            }
            let Some((file, offset)) = self.current.as_mut() else {
                continue;
            };
            match file.scan_from(*offset) {
                Some((payload, next_offset)) => {
                    *offset = next_offset;
                    let name = file
                        .path()
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    match Block::from_bytes(payload.to_vec()) {
                        Ok(block) => return Some(block.with_blk_file(name)),
                        Err(e) => {
                            log::warn!("skipping undecodable block in {}: {}", name, e);
                            continue;
                        }
                    }
                }
                None => {
                    self.current = None;
                    continue;
                }
            }
        }
    }
}

/// Iterator over blocks in height order, produced by
/// [`Blockchain::ordered_blocks`]. Stops early at the first record whose
/// block data is unavailable.
pub struct OrderedBlocks {
    blocks_path: PathBuf,
    records: std::collections::VecDeque<BlockIndexRecord>,
    done: bool,
}

impl Iterator for OrderedBlocks {
    type Item = Block;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            let record = self.records.pop_front()?;
            if record.file == -1 || record.data_pos == -1 {
                self.done = true;
                return None;
            }
            let path = self
                .blocks_path
                .join(format!("blk{:05}.dat", record.file));
            let payload = match read_block_at(&path, record.data_pos as u64) {
                Ok(payload) => payload,
                Err(e) => {
                    log::warn!(
                        "skipping unreadable block {} at height {}: {}",
                        record.hash_hex(),
                        record.height,
                        e
                    );
                    continue;
                }
            };
            match Block::from_bytes(payload) {
                Ok(block) => return Some(block.with_height(record.height)),
                Err(e) => {
                    log::warn!(
                        "skipping undecodable block {} at height {}: {}",
                        record.hash_hex(),
                        record.height,
                        e
                    );
                }
            }
        }
    }
}
