//! Write-back account cache with a snapshot stack.

use std::collections::{BTreeMap, BTreeSet};

use primitive_types::H160;

use crate::account::Account;
use crate::errors::TrieError;

/// A cached account record.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The account value as currently seen by the VM.
    pub account: Account,
    /// Whether the entry needs write-back on flush.
    pub modified: bool,
    /// Whether the account is considered existing. Entries
    /// materialized for an absent address start out non-existing and
    /// become existing once a write lands on them.
    pub exists: bool,
}

/// Cache of account records keyed by address. `checkpoint` pushes a
/// full snapshot of the map and the pending deletions; `revert`
/// restores it, `commit` discards it.
#[derive(Debug, Default)]
pub struct AccountCache {
    entries: BTreeMap<H160, CacheEntry>,
    deletes: BTreeSet<H160>,
    snapshots: Vec<(BTreeMap<H160, CacheEntry>, BTreeSet<H160>)>,
}

impl AccountCache {
    /// Look up a cached entry.
    pub fn get(&self, address: H160) -> Option<&CacheEntry> {
        self.entries.get(&address)
    }

    /// Return the cached entry, loading it through `load` on a miss.
    /// A load returning `None` materializes an empty, non-existing
    /// account. Loaded entries are not marked modified.
    pub fn get_or_load<F>(&mut self, address: H160, load: F) -> Result<&mut CacheEntry, TrieError>
    where
        F: FnOnce() -> Result<Option<Account>, TrieError>,
    {
        if !self.entries.contains_key(&address) {
            let entry = match load()? {
                Some(account) => CacheEntry {
                    account,
                    modified: false,
                    exists: true,
                },
                None => CacheEntry {
                    account: Account::empty(),
                    modified: false,
                    exists: false,
                },
            };
            self.entries.insert(address, entry);
        }

        Ok(self
            .entries
            .get_mut(&address)
            .expect("entry was just inserted"))
    }

    /// Replace an account, marking it dirty and existing.
    pub fn put(&mut self, address: H160, account: Account) {
        self.entries.insert(
            address,
            CacheEntry {
                account,
                modified: true,
                exists: true,
            },
        );
    }

    /// Journal an account deletion; applied on flush.
    pub fn mark_deleted(&mut self, address: H160) {
        self.deletes.insert(address);
    }

    /// Whether an address has a pending deletion.
    pub fn deleted(&self, address: H160) -> bool {
        self.deletes.contains(&address)
    }

    /// Addresses with pending deletions.
    pub fn deletions(&self) -> impl Iterator<Item = H160> + '_ {
        self.deletes.iter().copied()
    }

    /// All cached entries.
    pub fn entries(&self) -> impl Iterator<Item = (H160, &CacheEntry)> {
        self.entries.iter().map(|(address, entry)| (*address, entry))
    }

    /// All cached entries, mutably.
    pub fn entries_mut(&mut self) -> impl Iterator<Item = (H160, &mut CacheEntry)> {
        self.entries
            .iter_mut()
            .map(|(address, entry)| (*address, entry))
    }

    /// Push a snapshot of the cache.
    pub fn checkpoint(&mut self) {
        self.snapshots.push((self.entries.clone(), self.deletes.clone()));
    }

    /// Discard the latest snapshot, keeping all changes made since.
    pub fn commit(&mut self) {
        self.snapshots.pop().expect("commit without checkpoint");
    }

    /// Pop the latest snapshot, restoring the cache to the state at
    /// the matching checkpoint.
    pub fn revert(&mut self) {
        let (entries, deletes) = self.snapshots.pop().expect("revert without checkpoint");
        self.entries = entries;
        self.deletes = deletes;
    }

    /// Number of live snapshots.
    pub fn checkpoint_depth(&self) -> usize {
        self.snapshots.len()
    }

    /// Reset dirty flags and pending deletions after a flush.
    pub fn clear_flushed(&mut self) {
        for entry in self.entries.values_mut() {
            entry.modified = false;
        }
        for address in std::mem::take(&mut self.deletes) {
            self.entries.remove(&address);
        }
    }
}
