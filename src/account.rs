//! The persisted account record.

use primitive_types::{H256, U256};
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};

use crate::trie::empty_trie_root;
use crate::util::empty_code_hash;

/// An account as stored in the world-state trie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Number of transactions sent (or, for a contract, creations
    /// performed) by this account.
    pub nonce: u64,
    /// Balance in wei.
    pub balance: U256,
    /// Root of the account's storage trie.
    pub storage_root: H256,
    /// Hash of the account's code.
    pub code_hash: H256,
}

impl Account {
    /// A fresh account with no history.
    pub fn empty() -> Self {
        Account {
            nonce: 0,
            balance: U256::zero(),
            storage_root: empty_trie_root(),
            code_hash: empty_code_hash(),
        }
    }

    /// Whether the account is indistinguishable from one that never
    /// existed: zero nonce, zero balance, no code.
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance == U256::zero() && self.code_hash == empty_code_hash()
    }

    /// Whether the account carries code.
    pub fn is_contract(&self) -> bool {
        self.code_hash != empty_code_hash()
    }
}

impl Encodable for Account {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(4);
        s.append(&self.nonce);
        s.append(&self.balance);
        s.append(&self.storage_root);
        s.append(&self.code_hash);
    }
}

impl Decodable for Account {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Account {
            nonce: rlp.val_at(0)?,
            balance: rlp.val_at(1)?,
            storage_root: rlp.val_at(2)?,
            code_hash: rlp.val_at(3)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rlp_round_trip() {
        let account = Account {
            nonce: 9,
            balance: U256::from(1_000_000u64),
            storage_root: H256::repeat_byte(0x11),
            code_hash: H256::repeat_byte(0x22),
        };
        let encoded = rlp::encode(&account);
        assert_eq!(rlp::decode::<Account>(&encoded).unwrap(), account);
    }

    #[test]
    fn fresh_account_is_empty() {
        assert!(Account::empty().is_empty());
        assert!(!Account::empty().is_contract());

        let mut funded = Account::empty();
        funded.balance = U256::one();
        assert!(!funded.is_empty());
    }
}
