//! Hash primitives shared by the decoders: double-SHA256, HASH160, and the
//! reversed-hex display form used for every hash exposed as a string.

use bitcoin_hashes::{hash160, sha256d};
use bitcoin_hashes::Hash as _;

/// SHA256 applied twice; block hashes, txids, and base58 checksums.
#[inline]
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256d::Hash::hash(data).to_byte_array()
}

/// RIPEMD160 of SHA256; address hashes.
#[inline]
pub fn hash160(data: &[u8]) -> [u8; 20] {
    hash160::Hash::hash(data).to_byte_array()
}

/// Hex of the byte-reversed digest. Hashes are little-endian on disk and
/// big-endian in every human-facing representation.
pub fn hex_reversed(bytes: &[u8]) -> String {
    let mut reversed = bytes.to_vec();
    reversed.reverse();
    hex::encode(reversed)
}

#[cfg(test)]
mod tests {
    use super::{double_sha256, hash160, hex_reversed};

    #[test]
    fn empty_input_double_sha256() {
        // sha256d("") is a fixed vector.
        assert_eq!(
            hex::encode(double_sha256(b"")),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
    }

    #[test]
    fn hash160_of_genesis_pubkey() {
        let pubkey = hex::decode(
            "04678afdb0fe5548271967f1a67130b7105cd6a828e03909a67962e0ea1f61deb6\
             49f6bc3f4cef38c4f35504e51ec112de5c384df7ba0b8d578a4c702b6bf11d5f",
        )
        .unwrap();
        assert_eq!(
            hex::encode(hash160(&pubkey)),
            "62e907b15cbf27d5425399ebf6f0fb50ebb88f18"
        );
    }

    #[test]
    fn display_form_reverses_bytes() {
        assert_eq!(hex_reversed(&[0x01, 0x02, 0xff]), "ff0201");
        assert_eq!(hex_reversed(&[]), "");
    }
}
