//! 2048-bit log bloom filter.

use rlp::{Encodable, RlpStream};

use crate::params::Log;
use crate::util::keccak256;

const BLOOM_BYTES: usize = 256;
const BLOOM_BIT_MASK: usize = 0x7ff;

/// A 2048-bit bloom filter summarizing log addresses and topics for
/// fast negative lookup.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct LogsBloom([u8; BLOOM_BYTES]);

impl Default for LogsBloom {
    fn default() -> Self {
        LogsBloom([0u8; BLOOM_BYTES])
    }
}

impl LogsBloom {
    /// Set the three filter bits derived from the keccak-256 hash of
    /// the element.
    pub fn add(&mut self, element: &[u8]) {
        let hash = keccak256(element);
        for chunk in 0..3 {
            let (byte, bit) = Self::bit_position(hash.as_bytes(), chunk);
            self.0[byte] |= bit;
        }
    }

    /// Check whether the element might have been added. A `false`
    /// answer is definitive; `true` can be a false positive.
    pub fn contains(&self, element: &[u8]) -> bool {
        let hash = keccak256(element);
        for chunk in 0..3 {
            let (byte, bit) = Self::bit_position(hash.as_bytes(), chunk);
            if self.0[byte] & bit == 0 {
                return false;
            }
        }
        true
    }

    /// Merge another filter into this one.
    pub fn or(&mut self, other: &LogsBloom) {
        for i in 0..BLOOM_BYTES {
            self.0[i] |= other.0[i];
        }
    }

    /// Whether no bit is set.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|byte| *byte == 0)
    }

    /// The raw 256 filter bytes.
    pub fn as_bytes(&self) -> &[u8; BLOOM_BYTES] {
        &self.0
    }

    /// Filter over an emitted log: its address and every topic.
    pub fn from_log(log: &Log) -> Self {
        let mut bloom = LogsBloom::default();
        bloom.add(log.address.as_bytes());
        for topic in &log.topics {
            bloom.add(topic.as_bytes());
        }
        bloom
    }

    /// Filter over a set of logs, the OR of the per-log filters.
    pub fn from_logs<'a, I: IntoIterator<Item = &'a Log>>(logs: I) -> Self {
        let mut bloom = LogsBloom::default();
        for log in logs {
            bloom.or(&LogsBloom::from_log(log));
        }
        bloom
    }

    /// An 11-bit slice of the hash selects one of the 2048 bits; the
    /// low three bits index within a byte, the rest select the byte
    /// from the end of the filter.
    fn bit_position(hash: &[u8], chunk: usize) -> (usize, u8) {
        let slice =
            (((hash[chunk * 2] as usize) << 8) | hash[chunk * 2 + 1] as usize) & BLOOM_BIT_MASK;
        let byte = BLOOM_BYTES - (slice >> 3) - 1;
        let bit = 1u8 << (slice % 8);
        (byte, bit)
    }
}

impl Encodable for LogsBloom {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.append(&self.0.to_vec());
    }
}

impl std::fmt::Debug for LogsBloom {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "LogsBloom(0x")?;
        for byte in self.0.iter() {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitive_types::{H160, H256};

    #[test]
    fn added_element_is_found() {
        let mut bloom = LogsBloom::default();
        bloom.add(b"hello");
        assert!(bloom.contains(b"hello"));
        assert!(!bloom.contains(b"world"));
    }

    #[test]
    fn or_preserves_membership() {
        let mut a = LogsBloom::default();
        a.add(b"left");
        let mut b = LogsBloom::default();
        b.add(b"right");

        let mut merged = a;
        merged.or(&b);
        assert!(merged.contains(b"left"));
        assert!(merged.contains(b"right"));
    }

    #[test]
    fn log_bloom_covers_address_and_topics(){
        let log = Log {
            address: H160::repeat_byte(0x0f),
            topics: vec![H256::repeat_byte(0xaa), H256::repeat_byte(0xbb)],
            data: vec![1, 2, 3],
        };
        let bloom = LogsBloom::from_log(&log);
        assert!(bloom.contains(log.address.as_bytes()));
        assert!(bloom.contains(log.topics[0].as_bytes()));
        assert!(bloom.contains(log.topics[1].as_bytes()));
        // Data is not part of the filter.
        assert!(!bloom.contains(&log.data));
    }

    #[test]
    fn empty_bloom_is_zero() {
        assert!(LogsBloom::default().is_zero());
    }
}
