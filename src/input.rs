//! One transaction input, decoded from a byte cursor.

use byteorder::{ByteOrder, LittleEndian};

use crate::compact_size::read_compact_size;
use crate::error::ParseError;
use crate::hashes::hex_reversed;
use crate::script::Script;

/// Input portion of a transaction.
///
/// The witness stack starts empty; for witness-serialized transactions it is
/// attached by the transaction decoder once the witness section is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    prev_out_txid: [u8; 32],
    prev_out_vout: u32,
    script: Script,
    sequence: u32,
    witnesses: Vec<Vec<u8>>,
}

impl TxInput {
    /// Decodes one input from the start of `data`.
    /// Layout: prev txid (32) | vout (4 LE) | CompactSize script | sequence (4 LE).
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize), ParseError> {
        if data.len() < 36 {
            return Err(ParseError::Truncated {
                expected: 36,
                actual: data.len(),
            });
        }
        let mut prev_out_txid = [0u8; 32];
        prev_out_txid.copy_from_slice(&data[..32]);
        let prev_out_vout = LittleEndian::read_u32(&data[32..36]);

        let (script_len, varint_len) =
            read_compact_size(&data[36..]).ok_or(ParseError::MalformedVarint)?;
        let script_start = 36 + varint_len;
        let consumed = (script_start + 4)
            .checked_add(script_len as usize)
            .ok_or(ParseError::MalformedVarint)?;
        if data.len() < consumed {
            return Err(ParseError::Truncated {
                expected: consumed,
                actual: data.len(),
            });
        }
        let script = Script::from_bytes(&data[script_start..script_start + script_len as usize]);
        let sequence = LittleEndian::read_u32(&data[consumed - 4..consumed]);

        Ok((
            Self {
                prev_out_txid,
                prev_out_vout,
                script,
                sequence,
                witnesses: Vec::new(),
            },
            consumed,
        ))
    }

    /// Txid of the redeemed output, internal (little-endian) order.
    pub fn prev_out_txid(&self) -> &[u8; 32] {
        &self.prev_out_txid
    }

    /// Txid of the redeemed output as displayed (reversed hex).
    pub fn prev_out_txid_hex(&self) -> String {
        hex_reversed(&self.prev_out_txid)
    }

    /// Index of the redeemed output within its transaction.
    pub fn prev_out_vout(&self) -> u32 {
        self.prev_out_vout
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Witness stack attached to this input, in stack order.
    pub fn witnesses(&self) -> &[Vec<u8>] {
        &self.witnesses
    }

    /// A coinbase input redeems the all-zero txid.
    pub fn is_coinbase(&self) -> bool {
        self.prev_out_txid == [0u8; 32]
    }

    pub(crate) fn add_witness(&mut self, item: Vec<u8>) {
        self.witnesses.push(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_input() -> Vec<u8> {
        let mut data = vec![0xaa; 32]; // prev txid
        data.extend_from_slice(&7u32.to_le_bytes()); // vout
        data.push(2); // script length
        data.extend_from_slice(&[0x51, 0x51]);
        data.extend_from_slice(&0xffff_ffffu32.to_le_bytes());
        data
    }

    #[test]
    fn decodes_fields_and_consumed() {
        let data = sample_input();
        let (input, consumed) = TxInput::from_bytes(&data).unwrap();
        assert_eq!(consumed, data.len());
        assert_eq!(input.prev_out_vout(), 7);
        assert_eq!(input.sequence(), 0xffff_ffff);
        assert_eq!(input.script().raw(), &[0x51, 0x51]);
        assert!(input.witnesses().is_empty());
        assert_eq!(input.prev_out_txid_hex(), "aa".repeat(32));
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut data = sample_input();
        let len = data.len();
        data.extend_from_slice(&[1, 2, 3]);
        let (_, consumed) = TxInput::from_bytes(&data).unwrap();
        assert_eq!(consumed, len);
    }

    #[test]
    fn truncated_script_is_an_error() {
        let mut data = sample_input();
        data.truncate(data.len() - 5);
        assert!(matches!(
            TxInput::from_bytes(&data),
            Err(ParseError::Truncated { .. })
        ));
    }

    #[test]
    fn coinbase_detection() {
        let mut data = vec![0u8; 32];
        data.extend_from_slice(&0xffff_ffffu32.to_le_bytes());
        data.push(0);
        data.extend_from_slice(&[0, 0, 0, 0]);
        let (input, _) = TxInput::from_bytes(&data).unwrap();
        assert!(input.is_coinbase());
    }
}
