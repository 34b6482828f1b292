//! Address derivation from output scripts: base58check for P2PKH/P2SH,
//! bech32 witness v0 for P2WPKH/P2WSH.

use core::fmt;

use bech32::hrp;
use bech32::segwit;

use crate::hashes::hash160;

/// Encoding family an [`Address`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    /// Base58check, version 0x00 (P2PKH, including keys from P2PK and
    /// multisig outputs).
    Normal,
    /// Base58check, version 0x05.
    P2sh,
    /// Bech32, segwit witness program.
    Bech32,
}

const P2PKH_VERSION: u8 = 0x00;
const P2SH_VERSION: u8 = 0x05;

/// A value object for one address mentioned in an output script.
///
/// Carries the hash and/or public key it was derived from; the string form
/// is produced on demand by [`Address::encoded`] / `Display`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    hash: Option<Vec<u8>>,
    public_key: Option<Vec<u8>>,
    segwit_version: Option<u8>,
    kind: AddressKind,
}

impl Address {
    /// Address of a raw public key (P2PK and multisig outputs).
    pub fn from_public_key(public_key: &[u8]) -> Self {
        Self {
            hash: None,
            public_key: Some(public_key.to_vec()),
            segwit_version: None,
            kind: AddressKind::Normal,
        }
    }

    /// Address of a HASH160 digest (P2PKH and P2SH outputs).
    pub fn from_hash160(hash: &[u8], kind: AddressKind) -> Self {
        Self {
            hash: Some(hash.to_vec()),
            public_key: None,
            segwit_version: None,
            kind,
        }
    }

    /// Address of a segwit witness program (P2WPKH and P2WSH outputs).
    pub fn from_witness_program(segwit_version: u8, program: &[u8]) -> Self {
        Self {
            hash: Some(program.to_vec()),
            public_key: None,
            segwit_version: Some(segwit_version),
            kind: AddressKind::Bech32,
        }
    }

    /// The hash behind this address; HASH160 of the public key when only
    /// the key is known.
    pub fn hash(&self) -> Vec<u8> {
        match &self.hash {
            Some(hash) => hash.clone(),
            None => match &self.public_key {
                Some(key) => hash160(key).to_vec(),
                None => Vec::new(),
            },
        }
    }

    pub fn public_key(&self) -> Option<&[u8]> {
        self.public_key.as_deref()
    }

    pub fn segwit_version(&self) -> Option<u8> {
        self.segwit_version
    }

    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    pub fn is_p2sh(&self) -> bool {
        self.kind == AddressKind::P2sh
    }

    /// The encoded string form. Witness programs with an impossible length
    /// yield `None`; base58 forms always encode.
    pub fn encoded(&self) -> Option<String> {
        match self.kind {
            AddressKind::Normal => Some(
                bs58::encode(self.hash())
                    .with_check_version(P2PKH_VERSION)
                    .into_string(),
            ),
            AddressKind::P2sh => Some(
                bs58::encode(self.hash())
                    .with_check_version(P2SH_VERSION)
                    .into_string(),
            ),
            AddressKind::Bech32 => {
                let program = self.hash();
                // Witness v0 programs are 20 (keyhash) or 32 (scripthash) bytes.
                if program.len() != 20 && program.len() != 32 {
                    return None;
                }
                segwit::encode_v0(hrp::BC, &program).ok()
            }
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.encoded() {
            Some(s) => f.write_str(&s),
            None => Err(fmt::Error),
        }
    }
}
