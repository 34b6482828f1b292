//! Transaction decoder: legacy and witness serializations, txid/wtxid,
//! virtual size, and the coinbase / RBF / BIP-69 predicates.

use std::cmp::Ordering;
use std::sync::OnceLock;

use byteorder::{ByteOrder, LittleEndian};

use crate::compact_size::read_compact_size;
use crate::error::ParseError;
use crate::hashes::{double_sha256, hex_reversed};
use crate::input::TxInput;
use crate::output::TxOutput;

/// Witness marker + flag bytes that follow the version in a
/// witness-serialized transaction.
const SEGWIT_MARKER: [u8; 2] = [0x00, 0x01];

/// A transaction, decoded from its wire bytes.
///
/// Owns exactly the `size` bytes it declared; the identifying hashes are
/// computed on first access and memoized.
#[derive(Debug, Clone)]
pub struct Transaction {
    raw: Vec<u8>,
    version: i32,
    locktime: u32,
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
    is_segwit: bool,
    /// Offset of the witness section; end of the outputs for legacy
    /// serializations.
    witness_offset: usize,
    txid: OnceLock<[u8; 32]>,
    wtxid: OnceLock<[u8; 32]>,
}

impl Transaction {
    /// Decodes one transaction from the start of `data` and reports the
    /// bytes consumed (equal to the declared size).
    ///
    /// `data` is the remaining buffer, not a pre-sliced guess: the decoder
    /// consumes what the serialization declares and fails with
    /// [`ParseError::Truncated`] if the buffer cannot contain it.
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize), ParseError> {
        let truncated = |expected: usize| ParseError::Truncated {
            expected,
            actual: data.len(),
        };
        if data.len() < 4 {
            return Err(truncated(4));
        }
        let version = LittleEndian::read_i32(&data[..4]);
        let mut offset = 4usize;

        let is_segwit = data.get(offset..offset + 2) == Some(SEGWIT_MARKER.as_slice());
        if is_segwit {
            offset += 2;
        }

        let (n_inputs, varint_len) =
            read_compact_size(&data[offset..]).ok_or(ParseError::MalformedVarint)?;
        offset += varint_len;
        // An input is at least 41 bytes; a count the buffer cannot hold is
        // rejected before any allocation.
        if n_inputs > (data.len() / 41) as u64 + 1 {
            return Err(ParseError::MalformedVarint);
        }
        let mut inputs = Vec::with_capacity(n_inputs as usize);
        for _ in 0..n_inputs {
            let (input, consumed) = TxInput::from_bytes(&data[offset..])?;
            offset += consumed;
            inputs.push(input);
        }

        let (n_outputs, varint_len) =
            read_compact_size(&data[offset..]).ok_or(ParseError::MalformedVarint)?;
        offset += varint_len;
        // An output is at least 9 bytes.
        if n_outputs > (data.len() / 9) as u64 + 1 {
            return Err(ParseError::MalformedVarint);
        }
        let mut outputs = Vec::with_capacity(n_outputs as usize);
        for _ in 0..n_outputs {
            let (output, consumed) = TxOutput::from_bytes(&data[offset..])?;
            offset += consumed;
            outputs.push(output);
        }

        let witness_offset = offset;
        if is_segwit {
            // Exactly one stack per input, in input order.
            for input in &mut inputs {
                let (n_items, varint_len) =
                    read_compact_size(&data[offset..]).ok_or(ParseError::MalformedVarint)?;
                offset += varint_len;
                for _ in 0..n_items {
                    let (item_len, varint_len) =
                        read_compact_size(&data[offset..]).ok_or(ParseError::MalformedVarint)?;
                    offset += varint_len;
                    let end = offset
                        .checked_add(item_len as usize)
                        .ok_or(ParseError::MalformedVarint)?;
                    if data.len() < end {
                        return Err(truncated(end));
                    }
                    input.add_witness(data[offset..end].to_vec());
                    offset = end;
                }
            }
        }

        let size = offset + 4;
        if data.len() < size {
            return Err(truncated(size));
        }
        let locktime = LittleEndian::read_u32(&data[size - 4..size]);

        Ok((
            Self {
                raw: data[..size].to_vec(),
                version,
                locktime,
                inputs,
                outputs,
                is_segwit,
                witness_offset,
                txid: OnceLock::new(),
                wtxid: OnceLock::new(),
            },
            size,
        ))
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Total serialized size in bytes.
    pub fn size(&self) -> usize {
        self.raw.len()
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn locktime(&self) -> u32 {
        self.locktime
    }

    pub fn inputs(&self) -> &[TxInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TxOutput] {
        &self.outputs
    }

    pub fn n_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn n_outputs(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_segwit(&self) -> bool {
        self.is_segwit
    }

    /// Hash of the full serialization, internal order. Equals `txid` for
    /// legacy transactions.
    pub fn wtxid(&self) -> &[u8; 32] {
        self.wtxid.get_or_init(|| double_sha256(&self.raw))
    }

    pub fn wtxid_hex(&self) -> String {
        hex_reversed(self.wtxid())
    }

    /// Hash of the stripped serialization: version, inputs, outputs,
    /// locktime, with marker/flag and witnesses removed.
    pub fn txid(&self) -> &[u8; 32] {
        self.txid.get_or_init(|| {
            if !self.is_segwit {
                return double_sha256(&self.raw);
            }
            let size = self.raw.len();
            let mut stripped =
                Vec::with_capacity(4 + (self.witness_offset - 6) + 4);
            stripped.extend_from_slice(&self.raw[..4]);
            stripped.extend_from_slice(&self.raw[6..self.witness_offset]);
            stripped.extend_from_slice(&self.raw[size - 4..]);
            double_sha256(&stripped)
        })
    }

    pub fn txid_hex(&self) -> String {
        hex_reversed(self.txid())
    }

    /// Bytes occupied by the witness section, zero for legacy
    /// serializations.
    pub fn witness_bytes(&self) -> usize {
        if self.is_segwit {
            self.size() - self.witness_offset - 4
        } else {
            0
        }
    }

    /// Virtual size: weight (stripped size * 3 + total size) divided by 4,
    /// rounded up.
    pub fn vsize(&self) -> usize {
        if !self.is_segwit {
            return self.size();
        }
        let size = self.size();
        let stripped = size - 2 - self.witness_bytes();
        let weight = stripped * 3 + size;
        weight.div_ceil(4)
    }

    /// A coinbase transaction redeems the all-zero txid.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.iter().any(TxInput::is_coinbase)
    }

    /// Whether the transaction opted in to replace-by-fee: any input with a
    /// sequence below 0xFFFFFFFE. Coinbase sequences cannot signal RBF.
    pub fn uses_replace_by_fee(&self) -> bool {
        !self.is_coinbase() && self.inputs.iter().any(|i| i.sequence() < 0xffff_fffe)
    }

    /// Whether inputs and outputs follow the BIP-69 lexicographic ordering.
    pub fn uses_bip69(&self) -> bool {
        if self.inputs.len() == 1 && self.outputs.len() == 1 {
            return true;
        }
        let input_keys: Vec<(String, u32)> = self
            .inputs
            .iter()
            .map(|i| (i.prev_out_txid_hex(), i.prev_out_vout()))
            .collect();
        if !input_keys.windows(2).all(|w| w[0] <= w[1]) {
            return false;
        }
        let output_keys: Vec<(u64, String)> = self
            .outputs
            .iter()
            .map(|o| (o.value(), o.script().to_string()))
            .collect();
        output_keys
            .windows(2)
            .all(|w| w[0].cmp(&w[1]) != Ordering::Greater)
    }
}

/// Two transactions are equal when their serializations are.
impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Transaction {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compact_size::write_compact_size;

    fn minimal_input(prev: u8, vout: u32, sequence: u32) -> Vec<u8> {
        let mut data = vec![prev; 32];
        data.extend_from_slice(&vout.to_le_bytes());
        data.push(0);
        data.extend_from_slice(&sequence.to_le_bytes());
        data
    }

    fn minimal_output(value: u64) -> Vec<u8> {
        let mut data = value.to_le_bytes().to_vec();
        data.push(1);
        data.push(0x6a);
        data
    }

    fn legacy_tx() -> Vec<u8> {
        let mut data = 1i32.to_le_bytes().to_vec();
        write_compact_size(&mut data, 1);
        data.extend_from_slice(&minimal_input(0xaa, 0, 0xffff_ffff));
        write_compact_size(&mut data, 1);
        data.extend_from_slice(&minimal_output(1000));
        data.extend_from_slice(&0u32.to_le_bytes());
        data
    }

    fn segwit_tx() -> Vec<u8> {
        let mut data = 2i32.to_le_bytes().to_vec();
        data.extend_from_slice(&SEGWIT_MARKER);
        write_compact_size(&mut data, 1);
        data.extend_from_slice(&minimal_input(0xbb, 1, 0xffff_fffd));
        write_compact_size(&mut data, 1);
        data.extend_from_slice(&minimal_output(2000));
        // One stack with one 3-byte item.
        write_compact_size(&mut data, 1);
        write_compact_size(&mut data, 3);
        data.extend_from_slice(&[9, 9, 9]);
        data.extend_from_slice(&0u32.to_le_bytes());
        data
    }

    #[test]
    fn legacy_round_trip_and_ids_coincide() {
        let bytes = legacy_tx();
        let (tx, consumed) = Transaction::from_bytes(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(tx.size(), bytes.len());
        assert_eq!(tx.raw(), bytes.as_slice());
        assert!(!tx.is_segwit());
        assert_eq!(tx.txid(), tx.wtxid());
        assert_eq!(tx.vsize(), tx.size());
    }

    #[test]
    fn segwit_ids_differ_and_vsize_shrinks() {
        let bytes = segwit_tx();
        let (tx, consumed) = Transaction::from_bytes(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert!(tx.is_segwit());
        assert_eq!(tx.inputs()[0].witnesses(), &[vec![9u8, 9, 9]]);
        assert_ne!(tx.txid(), tx.wtxid());
        assert!(tx.vsize() < tx.size());
        assert_eq!(tx.witness_bytes(), 5);
    }

    #[test]
    fn stripped_serialization_hashes_to_txid() {
        let bytes = segwit_tx();
        let (tx, _) = Transaction::from_bytes(&bytes).unwrap();
        let witness_offset = bytes.len() - 4 - tx.witness_bytes();
        let mut stripped = bytes[..4].to_vec();
        stripped.extend_from_slice(&bytes[6..witness_offset]);
        stripped.extend_from_slice(&bytes[bytes.len() - 4..]);
        assert_eq!(tx.txid(), &double_sha256(&stripped));
    }

    #[test]
    fn truncated_witness_is_an_error() {
        let mut bytes = segwit_tx();
        bytes.truncate(bytes.len() - 6);
        assert!(matches!(
            Transaction::from_bytes(&bytes),
            Err(ParseError::Truncated { .. })
        ));
    }

    #[test]
    fn rbf_opt_in_by_low_sequence() {
        let (tx, _) = Transaction::from_bytes(&segwit_tx()).unwrap();
        assert!(tx.uses_replace_by_fee());
        let (legacy, _) = Transaction::from_bytes(&legacy_tx()).unwrap();
        assert!(!legacy.uses_replace_by_fee());
    }

    #[test]
    fn single_in_single_out_satisfies_bip69() {
        let (tx, _) = Transaction::from_bytes(&legacy_tx()).unwrap();
        assert!(tx.uses_bip69());
    }

    #[test]
    fn unordered_inputs_violate_bip69() {
        let mut data = 1i32.to_le_bytes().to_vec();
        write_compact_size(&mut data, 2);
        data.extend_from_slice(&minimal_input(0xcc, 0, 0xffff_ffff));
        data.extend_from_slice(&minimal_input(0xbb, 0, 0xffff_ffff));
        write_compact_size(&mut data, 2);
        data.extend_from_slice(&minimal_output(1));
        data.extend_from_slice(&minimal_output(2));
        data.extend_from_slice(&0u32.to_le_bytes());
        let (tx, _) = Transaction::from_bytes(&data).unwrap();
        assert!(!tx.uses_bip69());
    }
}
