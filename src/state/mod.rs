//! Journaled world-state store: accounts, code, and contract storage
//! over a backing trie.

mod cache;

pub use self::cache::{AccountCache, CacheEntry};

use std::collections::BTreeMap;
use std::rc::Rc;

use primitive_types::{H160, H256, U256};

use crate::account::Account;
use crate::errors::TrieError;
use crate::trie::{empty_trie_root, Database, Trie};
use crate::util::{empty_code_hash, keccak256, u256_to_h256};

/// Journaled facade over accounts, contract code, and per-account
/// storage. Checkpoints nest with the call-frame structure: every
/// successful call commits one checkpoint, every failed call reverts
/// one.
pub struct StateManager<D: Database> {
    database: D,
    root: H256,
    trie: D::Trie,
    cache: AccountCache,
    storage: BTreeMap<H160, D::Trie>,
    codes: BTreeMap<H256, Rc<Vec<u8>>>,
    depth: usize,
}

impl<D: Database> StateManager<D> {
    /// Open the world state rooted at `root`.
    pub fn new(database: D, root: H256) -> Result<Self, TrieError> {
        let trie = database.create_trie(root)?;
        Ok(StateManager {
            database,
            root,
            trie,
            cache: AccountCache::default(),
            storage: BTreeMap::new(),
            codes: BTreeMap::new(),
            depth: 0,
        })
    }

    /// Open an empty world state.
    pub fn with_empty(database: D) -> Result<Self, TrieError> {
        Self::new(database, empty_trie_root())
    }

    /// The state root as of the last flush.
    pub fn root(&self) -> H256 {
        self.root
    }

    /// The backing trie database.
    pub fn database(&self) -> &D {
        &self.database
    }

    fn entry(&mut self, address: H160) -> Result<&mut CacheEntry, TrieError> {
        let Self { cache, trie, .. } = self;
        cache.get_or_load(address, || match trie.get(address.as_bytes())? {
            Some(bytes) => rlp::decode::<Account>(&bytes)
                .map(Some)
                .map_err(|_| TrieError::new("corrupt account record")),
            None => Ok(None),
        })
    }

    /// Read an account, materializing an empty non-existing record
    /// for an absent address.
    pub fn get_account(&mut self, address: H160) -> Result<Account, TrieError> {
        Ok(self.entry(address)?.account.clone())
    }

    /// Replace an account wholesale.
    pub fn put_account(&mut self, address: H160, account: Account) {
        self.cache.put(address, account);
    }

    /// Whether the account is considered existing.
    pub fn account_exists(&mut self, address: H160) -> Result<bool, TrieError> {
        Ok(self.entry(address)?.exists)
    }

    /// Whether the account is absent or indistinguishable from
    /// absent.
    pub fn account_dead(&mut self, address: H160) -> Result<bool, TrieError> {
        let entry = self.entry(address)?;
        Ok(!entry.exists || entry.account.is_empty())
    }

    /// Balance of an account.
    pub fn get_balance(&mut self, address: H160) -> Result<U256, TrieError> {
        Ok(self.entry(address)?.account.balance)
    }

    /// Set the balance of an account outright.
    pub fn put_balance(&mut self, address: H160, balance: U256) -> Result<(), TrieError> {
        let entry = self.entry(address)?;
        entry.account.balance = balance;
        entry.modified = true;
        entry.exists = true;
        Ok(())
    }

    /// Credit an account. A nonzero credit marks the account
    /// existing.
    pub fn add_balance(&mut self, address: H160, value: U256) -> Result<(), TrieError> {
        if value == U256::zero() {
            return Ok(());
        }
        let entry = self.entry(address)?;
        entry.account.balance = entry.account.balance.saturating_add(value);
        entry.modified = true;
        entry.exists = true;
        Ok(())
    }

    /// Debit an account.
    pub fn sub_balance(&mut self, address: H160, value: U256) -> Result<(), TrieError> {
        if value == U256::zero() {
            return Ok(());
        }
        let entry = self.entry(address)?;
        entry.account.balance = entry.account.balance.saturating_sub(value);
        entry.modified = true;
        Ok(())
    }

    /// Nonce of an account.
    pub fn get_nonce(&mut self, address: H160) -> Result<u64, TrieError> {
        Ok(self.entry(address)?.account.nonce)
    }

    /// Set the nonce of an account.
    pub fn put_nonce(&mut self, address: H160, nonce: u64) -> Result<(), TrieError> {
        let entry = self.entry(address)?;
        entry.account.nonce = nonce;
        entry.modified = true;
        entry.exists = true;
        Ok(())
    }

    /// Increment the nonce of an account.
    pub fn increment_nonce(&mut self, address: H160) -> Result<(), TrieError> {
        let nonce = self.get_nonce(address)?;
        self.put_nonce(address, nonce + 1)
    }

    /// Code of an account. Codeless accounts (and unknown code
    /// hashes) read as empty.
    pub fn get_code(&mut self, address: H160) -> Result<Rc<Vec<u8>>, TrieError> {
        let code_hash = self.entry(address)?.account.code_hash;
        if code_hash == empty_code_hash() {
            return Ok(Rc::new(Vec::new()));
        }
        Ok(self.codes.get(&code_hash).cloned().unwrap_or_default())
    }

    /// Store code for an account, updating its code hash. The code
    /// itself is content-addressed outside the trie.
    pub fn put_code(&mut self, address: H160, code: Vec<u8>) -> Result<(), TrieError> {
        let code_hash = keccak256(&code);
        self.codes.insert(code_hash, Rc::new(code));
        let entry = self.entry(address)?;
        entry.account.code_hash = code_hash;
        entry.modified = true;
        entry.exists = true;
        Ok(())
    }

    fn storage_trie(&mut self, address: H160) -> Result<&mut D::Trie, TrieError> {
        if !self.storage.contains_key(&address) {
            let root = self.entry(address)?.account.storage_root;
            let mut trie = self.database.create_trie(root)?;
            // A trie materialized mid-transaction picks up the live
            // savepoints so its journal mirrors the cache's.
            for _ in 0..self.depth {
                trie.checkpoint();
            }
            self.storage.insert(address, trie);
        }
        Ok(self
            .storage
            .get_mut(&address)
            .expect("storage trie was just inserted"))
    }

    /// Read a storage slot. Absent keys read zero.
    pub fn get_storage(&mut self, address: H160, key: U256) -> Result<U256, TrieError> {
        let hashed = keccak256(u256_to_h256(key).as_bytes());
        let trie = self.storage_trie(address)?;
        match trie.get(hashed.as_bytes())? {
            Some(bytes) => {
                rlp::decode::<U256>(&bytes).map_err(|_| TrieError::new("corrupt storage value"))
            }
            None => Ok(U256::zero()),
        }
    }

    /// Write a storage slot. A zero value deletes the key.
    pub fn put_storage(&mut self, address: H160, key: U256, value: U256) -> Result<(), TrieError> {
        {
            let entry = self.entry(address)?;
            entry.modified = true;
            entry.exists = true;
        }
        let hashed = keccak256(u256_to_h256(key).as_bytes());
        let trie = self.storage_trie(address)?;
        if value == U256::zero() {
            trie.del(hashed.as_bytes())
        } else {
            trie.put(hashed.as_bytes().to_vec(), rlp::encode(&value).to_vec())
        }
    }

    /// Journal an account deletion, applied on flush.
    pub fn delete_account(&mut self, address: H160) {
        self.cache.mark_deleted(address);
    }

    /// Bulk-preload a set of addresses into the cache.
    pub fn warm(&mut self, addresses: &[H160]) -> Result<(), TrieError> {
        for address in addresses {
            self.entry(*address)?;
        }
        Ok(())
    }

    /// Push a savepoint over the cache, the account trie, and every
    /// live storage trie.
    pub fn checkpoint(&mut self) {
        self.cache.checkpoint();
        self.trie.checkpoint();
        for trie in self.storage.values_mut() {
            trie.checkpoint();
        }
        self.depth += 1;
    }

    /// Discard the latest savepoint, keeping the writes made since.
    pub fn commit(&mut self) {
        self.cache.commit();
        self.trie.commit();
        for trie in self.storage.values_mut() {
            trie.commit();
        }
        self.depth -= 1;
    }

    /// Pop the latest savepoint, undoing every write made since.
    pub fn revert(&mut self) {
        self.cache.revert();
        self.trie.revert();
        for trie in self.storage.values_mut() {
            trie.revert();
        }
        self.depth -= 1;
    }

    /// Number of live savepoints.
    pub fn checkpoint_depth(&self) -> usize {
        debug_assert_eq!(self.depth, self.cache.checkpoint_depth());
        self.depth
    }

    /// Serialize every dirty cache entry and storage trie into the
    /// account trie, producing the new state root. Accounts that
    /// never came to exist are discarded rather than written.
    pub fn flush(&mut self) -> Result<H256, TrieError> {
        debug_assert_eq!(self.depth, 0, "flush inside a checkpoint");

        let addresses: Vec<H160> = self.storage.keys().copied().collect();
        for address in addresses {
            if self.cache.deleted(address) {
                continue;
            }
            let storage_root = {
                let Self {
                    database, storage, ..
                } = self;
                let trie = storage.get(&address).expect("address drawn from the map");
                database.commit_trie(trie)
            };
            let entry = self.entry(address)?;
            if entry.account.storage_root != storage_root {
                entry.account.storage_root = storage_root;
                entry.modified = true;
            }
        }

        let mut writes: Vec<(H160, Vec<u8>)> = Vec::new();
        for (address, entry) in self.cache.entries() {
            if !entry.modified || self.cache.deleted(address) {
                continue;
            }
            if !entry.exists && entry.account.is_empty() {
                continue;
            }
            writes.push((address, rlp::encode(&entry.account).to_vec()));
        }
        for (address, bytes) in writes {
            self.trie.put(address.as_bytes().to_vec(), bytes)?;
        }

        let deletions: Vec<H160> = self.cache.deletions().collect();
        for address in deletions {
            self.trie.del(address.as_bytes())?;
            self.storage.remove(&address);
        }

        self.root = self.database.commit_trie(&self.trie);
        self.cache.clear_flushed();
        Ok(self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trie::MemoryDatabase;

    fn addr(n: u8) -> H160 {
        H160::repeat_byte(n)
    }

    fn manager() -> StateManager<MemoryDatabase> {
        StateManager::with_empty(MemoryDatabase::default()).unwrap()
    }

    #[test]
    fn absent_account_is_empty_nonexisting() {
        let mut state = manager();
        assert!(!state.account_exists(addr(1)).unwrap());
        assert!(state.get_account(addr(1)).unwrap().is_empty());
        assert_eq!(state.get_balance(addr(1)).unwrap(), U256::zero());
    }

    #[test]
    fn checkpoint_revert_is_identity() {
        let mut state = manager();
        state.add_balance(addr(1), U256::from(100u64)).unwrap();
        state
            .put_storage(addr(1), U256::one(), U256::from(42u64))
            .unwrap();

        state.checkpoint();
        state.add_balance(addr(1), U256::from(50u64)).unwrap();
        state.put_storage(addr(1), U256::one(), U256::zero()).unwrap();
        state
            .put_storage(addr(1), U256::from(2u64), U256::from(7u64))
            .unwrap();
        state.put_code(addr(1), vec![0x60, 0x00]).unwrap();
        state.revert();

        assert_eq!(state.get_balance(addr(1)).unwrap(), U256::from(100u64));
        assert_eq!(
            state.get_storage(addr(1), U256::one()).unwrap(),
            U256::from(42u64)
        );
        assert_eq!(
            state.get_storage(addr(1), U256::from(2u64)).unwrap(),
            U256::zero()
        );
        assert!(state.get_code(addr(1)).unwrap().is_empty());
    }

    #[test]
    fn nested_checkpoints_compose() {
        let mut state = manager();
        state.add_balance(addr(1), U256::from(1u64)).unwrap();

        state.checkpoint();
        state.checkpoint();
        state.add_balance(addr(1), U256::from(10u64)).unwrap();
        state.revert();
        state.checkpoint();
        state.commit();
        state.commit();

        assert_eq!(state.get_balance(addr(1)).unwrap(), U256::from(1u64));
    }

    #[test]
    fn storage_round_trip_and_zero_delete() {
        let mut state = manager();
        let key = U256::from(0xdeadu64);
        state.put_storage(addr(5), key, U256::from(3u64)).unwrap();
        assert_eq!(state.get_storage(addr(5), key).unwrap(), U256::from(3u64));

        state.put_storage(addr(5), key, U256::zero()).unwrap();
        assert_eq!(state.get_storage(addr(5), key).unwrap(), U256::zero());
    }

    #[test]
    fn flush_round_trips_through_database() {
        let mut state = manager();
        state.add_balance(addr(1), U256::from(1000u64)).unwrap();
        state.put_nonce(addr(1), 3).unwrap();
        state.put_code(addr(1), vec![0x5b]).unwrap();
        state
            .put_storage(addr(1), U256::one(), U256::from(9u64))
            .unwrap();
        let root = state.flush().unwrap();

        // Reopen over the same database at the flushed root.
        let database = state.database.clone();
        let mut reopened = StateManager::new(database, root).unwrap();
        assert_eq!(reopened.get_balance(addr(1)).unwrap(), U256::from(1000u64));
        assert_eq!(reopened.get_nonce(addr(1)).unwrap(), 3);
        assert_eq!(
            reopened.get_storage(addr(1), U256::one()).unwrap(),
            U256::from(9u64)
        );
    }

    #[test]
    fn empty_newborns_are_discarded_on_flush() {
        let mut state = manager();
        // Touched but never written: must not enter the trie.
        state.get_account(addr(9)).unwrap();
        let empty = state.flush().unwrap();
        assert_eq!(empty, empty_trie_root());
    }

    #[test]
    fn deleted_account_leaves_no_trace() {
        let mut state = manager();
        state.add_balance(addr(1), U256::from(5u64)).unwrap();
        state.flush().unwrap();

        state.delete_account(addr(1));
        let root = state.flush().unwrap();
        assert_eq!(root, empty_trie_root());
    }
}
