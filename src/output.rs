//! One transaction output, decoded from a byte cursor, plus the address
//! derivation for the standard templates.

use byteorder::{ByteOrder, LittleEndian};

use crate::address::{Address, AddressKind};
use crate::compact_size::read_compact_size;
use crate::error::ParseError;
use crate::script::opcodes::decode_small_int;
use crate::script::{Script, ScriptKind, ScriptOp};

/// Output portion of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    value: u64,
    script: Script,
}

impl TxOutput {
    /// Decodes one output from the start of `data`.
    /// Layout: value (8 LE, satoshis) | CompactSize script.
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize), ParseError> {
        if data.len() < 8 {
            return Err(ParseError::Truncated {
                expected: 8,
                actual: data.len(),
            });
        }
        let value = LittleEndian::read_u64(&data[..8]);
        let (script_len, varint_len) =
            read_compact_size(&data[8..]).ok_or(ParseError::MalformedVarint)?;
        let script_start = 8 + varint_len;
        let consumed = script_start
            .checked_add(script_len as usize)
            .ok_or(ParseError::MalformedVarint)?;
        if data.len() < consumed {
            return Err(ParseError::Truncated {
                expected: consumed,
                actual: data.len(),
            });
        }
        let script = Script::from_bytes(&data[script_start..consumed]);
        Ok((Self { value, script }, consumed))
    }

    /// Value in satoshis.
    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    /// Template classification of the output script.
    pub fn script_type(&self) -> ScriptKind {
        self.script.kind()
    }

    /// Addresses mentioned in the output script. Empty for OP_RETURN,
    /// unknown, and invalid scripts.
    pub fn addresses(&self) -> Vec<Address> {
        let ops = self.script.operations();
        let push = |i: usize| match ops.get(i) {
            Some(ScriptOp::Push(data)) => Some(data.as_slice()),
            _ => None,
        };
        match self.script_type() {
            ScriptKind::PubKey => push(0)
                .map(Address::from_public_key)
                .into_iter()
                .collect(),
            ScriptKind::PubKeyHash => push(2)
                .map(|hash| Address::from_hash160(hash, AddressKind::Normal))
                .into_iter()
                .collect(),
            ScriptKind::ScriptHash => push(1)
                .map(|hash| Address::from_hash160(hash, AddressKind::P2sh))
                .into_iter()
                .collect(),
            ScriptKind::Multisig => {
                let m = match ops.first() {
                    Some(ScriptOp::Code(op)) => decode_small_int(*op).unwrap_or(0) as usize,
                    _ => 0,
                };
                ops[1..1 + m]
                    .iter()
                    .filter_map(|op| match op {
                        ScriptOp::Push(key) => Some(Address::from_public_key(key)),
                        ScriptOp::Code(_) => None,
                    })
                    .collect()
            }
            ScriptKind::WitnessV0KeyHash | ScriptKind::WitnessV0ScriptHash => push(1)
                .map(|program| Address::from_witness_program(0, program))
                .into_iter()
                .collect(),
            ScriptKind::OpReturn | ScriptKind::Invalid | ScriptKind::Unknown => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output_with_script(script: &[u8]) -> TxOutput {
        let mut data = 50_000u64.to_le_bytes().to_vec();
        data.push(script.len() as u8);
        data.extend_from_slice(script);
        let (output, consumed) = TxOutput::from_bytes(&data).unwrap();
        assert_eq!(consumed, data.len());
        output
    }

    #[test]
    fn decodes_value_and_script() {
        let output = output_with_script(&[0x6a]);
        assert_eq!(output.value(), 50_000);
        assert_eq!(output.script_type(), ScriptKind::OpReturn);
        assert!(output.addresses().is_empty());
    }

    #[test]
    fn pubkeyhash_output_has_one_address() {
        let mut script = vec![0x76, 0xa9, 0x14];
        script.extend_from_slice(&[0xab; 20]);
        script.extend_from_slice(&[0x88, 0xac]);
        let output = output_with_script(&script);
        let addresses = output.addresses();
        assert_eq!(addresses.len(), 1);
        assert_eq!(addresses[0].hash(), vec![0xab; 20]);
    }

    #[test]
    fn multisig_output_has_one_address_per_required_key() {
        let mut key1 = vec![0x02];
        key1.extend_from_slice(&[0x11; 32]);
        let mut key2 = vec![0x03];
        key2.extend_from_slice(&[0x22; 32]);

        // 1-of-2: addresses come from the M key slots.
        let mut script = vec![0x51, 33];
        script.extend_from_slice(&key1);
        script.push(33);
        script.extend_from_slice(&key2);
        script.extend_from_slice(&[0x52, 0xae]);
        let output = output_with_script(&script);
        assert_eq!(output.script_type(), ScriptKind::Multisig);
        let addresses = output.addresses();
        assert_eq!(addresses.len(), 1);
        assert_eq!(addresses[0].public_key(), Some(key1.as_slice()));
    }

    #[test]
    fn truncated_output_is_an_error() {
        let data = 1u64.to_le_bytes();
        assert!(matches!(
            TxOutput::from_bytes(&data[..4]),
            Err(ParseError::Truncated { .. })
        ));
    }
}
