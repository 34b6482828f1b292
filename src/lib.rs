//! Deserializer for the block data a Bitcoin Core node leaves on disk: the
//! append-only `blk?????.dat` files and the LevelDB block index. Blocks,
//! transactions, inputs, outputs, and scripts come back as structured
//! values without running a node or touching RPC.
//!
//! Scripts are classified against the standard output templates and their
//! addresses derived; nothing is executed or validated. The store is never
//! written to.
//!
//! ```no_run
//! use blkparse::Blockchain;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), blkparse::ParseError> {
//! let mut chain = Blockchain::new("/data/bitcoin/blocks");
//! for block in chain.ordered_blocks(Path::new("/data/bitcoin/blocks/index"), 0, None, None)? {
//!     for tx in block.transactions().flatten() {
//!         println!("{}", tx.txid_hex());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod block;
pub mod cache;
pub mod chain;
pub mod compact_size;
pub mod error;
pub mod hashes;
pub mod index;
pub mod input;
pub mod output;
pub mod scanner;
pub mod script;
pub mod transaction;

pub use address::{Address, AddressKind};
pub use block::{Block, BlockHeader};
pub use chain::{open_index_db, Blockchain, OrderedBlocks, UnorderedBlocks};
pub use error::ParseError;
pub use index::{BlockIndexRecord, TxIndexRecord, BLOCK_HAVE_DATA, BLOCK_HAVE_UNDO};
pub use input::TxInput;
pub use output::TxOutput;
pub use scanner::{BlkFile, BLOCK_MAGIC};
pub use script::{Script, ScriptKind, ScriptOp};
pub use transaction::Transaction;
