//! Parameters used by the VM.

use std::rc::Rc;

use primitive_types::{H160, H256, U256};
use rlp::{Encodable, RlpStream};

/// Block header parameters visible to executing code, plus the
/// recent-block-hash oracle backing the BLOCKHASH opcode.
#[derive(Debug, Clone, Default)]
pub struct HeaderParams {
    /// Beneficiary address that collects gas fees and rewards.
    pub beneficiary: H160,
    /// Block timestamp.
    pub timestamp: u64,
    /// The current block number.
    pub number: U256,
    /// Difficulty of the block.
    pub difficulty: U256,
    /// Total block gas limit.
    pub gas_limit: U256,
    /// Hashes of the most recent blocks, most recent first.
    pub block_hashes: Vec<H256>,
}

impl HeaderParams {
    /// Hash of one of the 256 most recent blocks. Anything outside
    /// `[number - 256, number - 1]` yields zero.
    pub fn block_hash(&self, number: U256) -> H256 {
        if number >= self.number
            || self.number - number > U256::from(256u64)
            || self.number - number - U256::one() >= U256::from(self.block_hashes.len())
        {
            H256::zero()
        } else {
            let index = (self.number - number - U256::one()).as_usize();
            self.block_hashes[index]
        }
    }
}

/// A frame execution context.
#[derive(Debug, Clone)]
pub struct Context {
    /// Address whose storage and identity this frame executes under.
    pub address: H160,
    /// Caller of the frame.
    pub caller: H160,
    /// External transaction sender.
    pub origin: H160,
    /// Code to be executed.
    pub code: Rc<Vec<u8>>,
    /// Call data of the frame.
    pub data: Rc<Vec<u8>>,
    /// Gas available to the frame.
    pub gas_limit: U256,
    /// Gas price of the enclosing transaction.
    pub gas_price: U256,
    /// Value actually transferred into the frame.
    pub value: U256,
    /// Value reported by the CALLVALUE opcode. Differs from `value`
    /// for DELEGATECALL, which transfers nothing.
    pub apparent_value: U256,
}

/// A log entry emitted by the LOG opcodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Log {
    /// Address of the emitting contract.
    pub address: H160,
    /// Up to four indexed topics.
    pub topics: Vec<H256>,
    /// Unindexed payload.
    pub data: Vec<u8>,
}

impl Encodable for Log {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(3);
        s.append(&self.address);
        s.append_list(&self.topics);
        s.append(&self.data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_hash_window() {
        let header = HeaderParams {
            number: U256::from(10u64),
            block_hashes: (1..=10)
                .rev()
                .map(|i| H256::repeat_byte(i as u8))
                .collect(),
            ..Default::default()
        };

        // number - 1 is the first entry.
        assert_eq!(header.block_hash(U256::from(9u64)), H256::repeat_byte(9));
        assert_eq!(header.block_hash(U256::from(1u64)), H256::repeat_byte(1));
        // The current block and anything beyond yields zero.
        assert_eq!(header.block_hash(U256::from(10u64)), H256::zero());
        assert_eq!(header.block_hash(U256::from(11u64)), H256::zero());
    }
}
