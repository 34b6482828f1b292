//! Script model: an opcode/operand walk over raw script bytes plus the
//! standard output-template recognizers. Scripts classify and extract only;
//! nothing here evaluates.

pub mod opcodes;

use core::fmt;
use std::sync::OnceLock;

use byteorder::{ByteOrder, LittleEndian};

use crate::script::opcodes::{
    decode_small_int, opcode_name, OP_CHECKMULTISIG, OP_CHECKSIG, OP_DUP, OP_EQUAL,
    OP_EQUALVERIFY, OP_HASH160, OP_PUSHDATA1, OP_PUSHDATA2, OP_PUSHDATA4, OP_RETURN,
};

/// Scripts longer than this are unspendable by standardness.
const MAX_SCRIPT_SIZE: usize = 10_000;

/// One decoded script item: a non-push opcode, or the operand of a push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOp {
    Code(u8),
    Push(Vec<u8>),
}

/// Standard output template a script matches, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    PubKey,
    PubKeyHash,
    ScriptHash,
    Multisig,
    OpReturn,
    WitnessV0KeyHash,
    WitnessV0ScriptHash,
    Invalid,
    Unknown,
}

impl ScriptKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PubKey => "pubkey",
            Self::PubKeyHash => "pubkeyhash",
            Self::ScriptHash => "p2sh",
            Self::Multisig => "multisig",
            Self::OpReturn => "OP_RETURN",
            Self::WitnessV0KeyHash => "p2wpkh",
            Self::WitnessV0ScriptHash => "p2wsh",
            Self::Invalid => "invalid",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns whether the bytes match the public key pattern: 33 bytes with
/// prefix 0x02/0x03 (compressed) or 65 bytes with prefix 0x04. The key is
/// not validated beyond the pattern.
pub fn is_public_key(data: &[u8]) -> bool {
    let uncompressed = data.len() == 65 && data[0] == 4;
    let compressed = data.len() == 33 && (data[0] == 2 || data[0] == 3);
    uncompressed || compressed
}

/// Walks the push/opcode structure of `raw`. `None` if a push runs off the
/// end of the buffer.
fn parse_operations(raw: &[u8]) -> Option<Vec<ScriptOp>> {
    let mut ops = Vec::new();
    let mut i = 0usize;
    while i < raw.len() {
        let b = raw[i];
        i += 1;
        let push_len = match b {
            // Direct push: opcode is the operand length (OP_0 pushes nothing).
            0x00..=0x4b => b as usize,
            OP_PUSHDATA1 => {
                let len = *raw.get(i)? as usize;
                i += 1;
                len
            }
            OP_PUSHDATA2 => {
                if raw.len() < i + 2 {
                    return None;
                }
                let len = LittleEndian::read_u16(&raw[i..i + 2]) as usize;
                i += 2;
                len
            }
            OP_PUSHDATA4 => {
                if raw.len() < i + 4 {
                    return None;
                }
                let len = LittleEndian::read_u32(&raw[i..i + 4]) as usize;
                i += 4;
                len
            }
            _ => {
                ops.push(ScriptOp::Code(b));
                continue;
            }
        };
        if raw.len() < i + push_len {
            return None;
        }
        ops.push(ScriptOp::Push(raw[i..i + push_len].to_vec()));
        i += push_len;
    }
    Some(ops)
}

/// Transaction script contained in an input or output.
///
/// The operations walk is performed on first access and memoized. A script
/// that fails to decode is represented with an empty operations list and
/// `is_valid() == false`; it never aborts the enclosing transaction.
#[derive(Debug, Clone)]
pub struct Script {
    raw: Vec<u8>,
    ops: OnceLock<Option<Vec<ScriptOp>>>,
}

impl Script {
    pub fn from_bytes(raw: impl Into<Vec<u8>>) -> Self {
        Self {
            raw: raw.into(),
            ops: OnceLock::new(),
        }
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    fn decoded(&self) -> &Option<Vec<ScriptOp>> {
        self.ops.get_or_init(|| parse_operations(&self.raw))
    }

    /// Decoded operations; empty when the script is invalid.
    pub fn operations(&self) -> &[ScriptOp] {
        match self.decoded() {
            Some(ops) => ops,
            None => &[],
        }
    }

    pub fn is_valid(&self) -> bool {
        self.decoded().is_some()
    }

    pub fn is_pubkey(&self) -> bool {
        let ops = self.operations();
        ops.len() == 2
            && ops[1] == ScriptOp::Code(OP_CHECKSIG)
            && matches!(&ops[0], ScriptOp::Push(data) if is_public_key(data))
    }

    pub fn is_pubkeyhash(&self) -> bool {
        let ops = self.operations();
        self.raw.len() == 25
            && ops.len() == 5
            && ops[0] == ScriptOp::Code(OP_DUP)
            && ops[1] == ScriptOp::Code(OP_HASH160)
            && matches!(&ops[2], ScriptOp::Push(data) if data.len() == 20)
            && ops[3] == ScriptOp::Code(OP_EQUALVERIFY)
            && ops[4] == ScriptOp::Code(OP_CHECKSIG)
    }

    /// Standard P2SH predicate: HASH160 <20 bytes> EQUAL, 23 raw bytes.
    pub fn is_p2sh(&self) -> bool {
        self.raw.len() == 23
            && self.raw[0] == OP_HASH160
            && self.raw[1] == 0x14
            && self.raw[22] == OP_EQUAL
    }

    /// Witness v0 keyhash: OP_0 <20 bytes>.
    pub fn is_p2wpkh(&self) -> bool {
        self.raw.len() == 22 && self.raw[0] == 0x00 && self.raw[1] == 0x14
    }

    /// Witness v0 scripthash: OP_0 <32 bytes>.
    pub fn is_p2wsh(&self) -> bool {
        self.raw.len() == 34 && self.raw[0] == 0x00 && self.raw[1] == 0x20
    }

    /// Standard unspendability predicate.
    pub fn is_return(&self) -> bool {
        (!self.raw.is_empty() && self.raw[0] == OP_RETURN) || self.raw.len() > MAX_SCRIPT_SIZE
    }

    /// Bare multisig: M <M pubkeys> N OP_CHECKMULTISIG with N >= M.
    pub fn is_multisig(&self) -> bool {
        let ops = self.operations();
        if ops.len() < 4 {
            return false;
        }
        let m = match &ops[0] {
            ScriptOp::Code(op) => match decode_small_int(*op) {
                Some(m) => m as usize,
                None => return false,
            },
            ScriptOp::Push(_) => return false,
        };
        if 1 + m > ops.len() - 2 {
            return false;
        }
        for op in &ops[1..1 + m] {
            match op {
                ScriptOp::Push(data) if is_public_key(data) => {}
                _ => return false,
            }
        }
        let n = match &ops[ops.len() - 2] {
            ScriptOp::Code(op) => match decode_small_int(*op) {
                Some(n) => n as usize,
                None => return false,
            },
            ScriptOp::Push(_) => return false,
        };
        n >= m && ops[ops.len() - 1] == ScriptOp::Code(OP_CHECKMULTISIG)
    }

    /// Template classification; first match wins, in a fixed order.
    pub fn kind(&self) -> ScriptKind {
        if !self.is_valid() {
            ScriptKind::Invalid
        } else if self.is_pubkeyhash() {
            ScriptKind::PubKeyHash
        } else if self.is_pubkey() {
            ScriptKind::PubKey
        } else if self.is_p2sh() {
            ScriptKind::ScriptHash
        } else if self.is_multisig() {
            ScriptKind::Multisig
        } else if self.is_return() {
            ScriptKind::OpReturn
        } else if self.is_p2wpkh() {
            ScriptKind::WitnessV0KeyHash
        } else if self.is_p2wsh() {
            ScriptKind::WitnessV0ScriptHash
        } else {
            ScriptKind::Unknown
        }
    }
}

impl PartialEq for Script {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Script {}

/// The script string form: pushes as hex, opcodes by name, space-joined.
/// Undecodable scripts render as `INVALID_SCRIPT`.
impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ops = match self.decoded() {
            Some(ops) => ops,
            None => return f.write_str("INVALID_SCRIPT"),
        };
        for (i, op) in ops.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match op {
                ScriptOp::Push(data) => f.write_str(&hex::encode(data))?,
                ScriptOp::Code(code) => match opcode_name(*code) {
                    Some(name) => f.write_str(name)?,
                    None => write!(f, "OP_0x{:02x}", code)?,
                },
            }
        }
        Ok(())
    }
}
