//! Hashing and word-conversion helpers.

use primitive_types::{H160, H256, U256};
use rlp::RlpStream;
use sha3::{Digest, Keccak256};

/// keccak-256 of the given bytes.
pub fn keccak256(data: &[u8]) -> H256 {
    H256::from_slice(Keccak256::digest(data).as_slice())
}

/// Hash of the empty byte string, the code hash of every codeless
/// account.
pub fn empty_code_hash() -> H256 {
    keccak256(&[])
}

/// Derive the address of a contract created by `caller` at `nonce`.
pub fn create_address(caller: H160, nonce: u64) -> H160 {
    let mut stream = RlpStream::new_list(2);
    stream.append(&caller);
    stream.append(&nonce);
    let hash = keccak256(&stream.out());
    H160::from_slice(&hash.as_bytes()[12..])
}

/// Convert a word to its 32-byte big-endian form.
pub fn u256_to_h256(value: U256) -> H256 {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    H256(bytes)
}

/// Read a 32-byte value as a word.
pub fn h256_to_u256(value: H256) -> U256 {
    U256::from_big_endian(value.as_bytes())
}

/// Truncate a word to an address (the low 20 bytes).
pub fn u256_to_address(value: U256) -> H160 {
    H160::from_slice(&u256_to_h256(value).as_bytes()[12..])
}

/// Zero-extend an address to a word.
pub fn address_to_u256(address: H160) -> U256 {
    let mut bytes = [0u8; 32];
    bytes[12..].copy_from_slice(address.as_bytes());
    U256::from_big_endian(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn keccak_of_empty() {
        assert_eq!(
            empty_code_hash(),
            H256(hex!(
                "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
            ))
        );
    }

    #[test]
    fn known_create_address() {
        // First contract of 0x6ac7ea33f8831ea9dcc53393aaa88b25a785dbf0.
        let caller = H160(hex!("6ac7ea33f8831ea9dcc53393aaa88b25a785dbf0"));
        assert_eq!(
            create_address(caller, 0),
            H160(hex!("cd234a471b72ba2f1ccf0a70fcaba648a5eecd8d"))
        );
    }

    #[test]
    fn address_word_round_trip() {
        let address = H160::repeat_byte(0xab);
        assert_eq!(u256_to_address(address_to_u256(address)), address);
    }
}
