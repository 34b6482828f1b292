//! Shared fixtures: the mainnet genesis block, a wire-format transaction
//! serializer for round-trip properties, and synthetic block-file builders.

#![allow(dead_code)]

use blkparse::compact_size::write_compact_size;
use blkparse::hashes::double_sha256;
use blkparse::scanner::BLOCK_MAGIC;

/// The 80-byte mainnet genesis header.
pub const GENESIS_HEADER_HEX: &str = "0100000000000000000000000000000000000000000000000000000000000000000000003ba3edfd7a7b12b27ac72c\
3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a29ab5f49ffff001d1dac2b7c";

/// The genesis coinbase transaction.
pub const GENESIS_COINBASE_HEX: &str = "01000000010000000000000000000000000000000000000000\
000000000000000000000000ffffffff4d04ffff001d0104455468652054696d65732030332f4a616e2f323030\
39204368616e63656c6c6f72206f6e206272696e6b206f66207365636f6e64206261696c6f757420666f722062\
616e6b73ffffffff0100f2052a01000000434104678afdb0fe5548271967f1a67130b7105cd6a828e03909a679\
62e0ea1f61deb649f6bc3f4cef38c4f35504e51ec112de5c384df7ba0b8d578a4c702b6bf11d5fac00000000";

pub const GENESIS_HASH: &str = "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f";
pub const GENESIS_MERKLE_ROOT: &str =
    "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";

/// Full genesis block: header, tx count 1, coinbase.
pub fn genesis_block_bytes() -> Vec<u8> {
    let mut bytes = hex::decode(GENESIS_HEADER_HEX).unwrap();
    bytes.push(1);
    bytes.extend_from_slice(&hex::decode(GENESIS_COINBASE_HEX).unwrap());
    bytes
}

// ---------------------------------------------------------------------------
// Wire-format transaction serializer (mirror of the decoder, test-side only)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct InputSpec {
    pub prev: [u8; 32],
    pub vout: u32,
    pub script: Vec<u8>,
    pub sequence: u32,
    pub witness: Vec<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct OutputSpec {
    pub value: u64,
    pub script: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct TxSpec {
    pub version: i32,
    pub segwit: bool,
    pub inputs: Vec<InputSpec>,
    pub outputs: Vec<OutputSpec>,
    pub locktime: u32,
}

/// Serializes a transaction exactly as the reference node would.
pub fn encode_tx(spec: &TxSpec) -> Vec<u8> {
    let mut out = spec.version.to_le_bytes().to_vec();
    if spec.segwit {
        out.extend_from_slice(&[0x00, 0x01]);
    }
    write_compact_size(&mut out, spec.inputs.len() as u64);
    for input in &spec.inputs {
        out.extend_from_slice(&input.prev);
        out.extend_from_slice(&input.vout.to_le_bytes());
        write_compact_size(&mut out, input.script.len() as u64);
        out.extend_from_slice(&input.script);
        out.extend_from_slice(&input.sequence.to_le_bytes());
    }
    write_compact_size(&mut out, spec.outputs.len() as u64);
    for output in &spec.outputs {
        out.extend_from_slice(&output.value.to_le_bytes());
        write_compact_size(&mut out, output.script.len() as u64);
        out.extend_from_slice(&output.script);
    }
    if spec.segwit {
        for input in &spec.inputs {
            write_compact_size(&mut out, input.witness.len() as u64);
            for item in &input.witness {
                write_compact_size(&mut out, item.len() as u64);
                out.extend_from_slice(item);
            }
        }
    }
    out.extend_from_slice(&spec.locktime.to_le_bytes());
    out
}

// ---------------------------------------------------------------------------
// Synthetic chain builders
// ---------------------------------------------------------------------------

/// A minimal single-input single-output legacy transaction.
pub fn tiny_tx_bytes(tag: u8) -> Vec<u8> {
    encode_tx(&TxSpec {
        version: 1,
        segwit: false,
        inputs: vec![InputSpec {
            prev: [0u8; 32],
            vout: 0xffff_ffff,
            script: vec![tag],
            sequence: 0xffff_ffff,
            witness: Vec::new(),
        }],
        outputs: vec![OutputSpec {
            value: 50_000,
            script: vec![0x6a],
        }],
        locktime: 0,
    })
}

/// An 80-byte header chained to `prev_hash`, distinguished by `salt`.
pub fn make_header(prev_hash: &[u8; 32], salt: u32) -> [u8; 80] {
    let mut header = [0u8; 80];
    header[..4].copy_from_slice(&1i32.to_le_bytes());
    header[4..36].copy_from_slice(prev_hash);
    header[36..40].copy_from_slice(&salt.to_le_bytes()); // merkle stand-in
    header[68..72].copy_from_slice(&1_231_006_505u32.to_le_bytes());
    header[72..76].copy_from_slice(&0x1d00_ffffu32.to_le_bytes());
    header[76..80].copy_from_slice(&salt.to_le_bytes());
    header
}

/// Block payload: header, tx count 1, one tiny transaction.
pub fn make_block(header: &[u8; 80], tag: u8) -> Vec<u8> {
    let mut payload = header.to_vec();
    payload.push(1);
    payload.extend_from_slice(&tiny_tx_bytes(tag));
    payload
}

pub fn block_hash(payload: &[u8]) -> [u8; 32] {
    double_sha256(&payload[..80])
}

/// Frames payloads into blk-file bytes and reports each payload's
/// `data_pos` (offset of the payload itself).
pub fn build_blk_file(payloads: &[Vec<u8>]) -> (Vec<u8>, Vec<u64>) {
    let mut file = Vec::new();
    let mut positions = Vec::new();
    for payload in payloads {
        file.extend_from_slice(&BLOCK_MAGIC);
        file.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        positions.push(file.len() as u64);
        file.extend_from_slice(payload);
    }
    (file, positions)
}
