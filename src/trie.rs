//! The world-state trie interface and its in-memory implementation.

use std::collections::BTreeMap;

use primitive_types::H256;
use rlp::RlpStream;

use crate::errors::TrieError;
use crate::util::keccak256;

/// A Merkle-style key-value store with nested checkpoint semantics.
/// The VM only relies on this contract; a real Merkle-Patricia node
/// store slots in behind it.
pub trait Trie {
    /// Read the value stored at a key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, TrieError>;
    /// Insert or replace the value stored at a key.
    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), TrieError>;
    /// Delete a key.
    fn del(&mut self, key: &[u8]) -> Result<(), TrieError>;
    /// The root commitment over the current contents.
    fn root(&self) -> H256;
    /// Push a savepoint.
    fn checkpoint(&mut self);
    /// Discard the latest savepoint, keeping the writes made since.
    fn commit(&mut self);
    /// Pop the latest savepoint, undoing every write made since.
    fn revert(&mut self);
}

/// A factory for tries, keyed by root.
pub trait Database {
    /// The trie type this database hands out.
    type Trie: Trie;

    /// Open the trie rooted at `root`. The empty root always opens an
    /// empty trie.
    fn create_trie(&self, root: H256) -> Result<Self::Trie, TrieError>;
    /// Persist a trie's contents and return its root.
    fn commit_trie(&mut self, trie: &Self::Trie) -> H256;
}

/// Root of a trie with no entries.
pub fn empty_trie_root() -> H256 {
    content_root(&BTreeMap::new())
}

fn content_root(entries: &BTreeMap<Vec<u8>, Vec<u8>>) -> H256 {
    let mut stream = RlpStream::new_list(entries.len());
    for (key, value) in entries {
        stream.begin_list(2);
        stream.append(key);
        stream.append(value);
    }
    keccak256(&stream.out())
}

/// An in-memory trie. Checkpoints are a journal of `(key, previous
/// value)` entries replayed in reverse on revert.
#[derive(Debug, Clone, Default)]
pub struct MemoryTrie {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
    journal: Vec<Vec<(Vec<u8>, Option<Vec<u8>>)>>,
}

impl MemoryTrie {
    fn record(&mut self, key: &[u8]) {
        if let Some(frame) = self.journal.last_mut() {
            frame.push((key.to_vec(), self.entries.get(key).cloned()));
        }
    }
}

impl Trie for MemoryTrie {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, TrieError> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), TrieError> {
        self.record(&key);
        self.entries.insert(key, value);
        Ok(())
    }

    fn del(&mut self, key: &[u8]) -> Result<(), TrieError> {
        self.record(key);
        self.entries.remove(key);
        Ok(())
    }

    fn root(&self) -> H256 {
        content_root(&self.entries)
    }

    fn checkpoint(&mut self) {
        self.journal.push(Vec::new());
    }

    fn commit(&mut self) {
        let frame = self.journal.pop().expect("commit without checkpoint");
        // Writes survive, but an outer savepoint must still be able
        // to undo them.
        if let Some(outer) = self.journal.last_mut() {
            let mut frame = frame;
            outer.append(&mut frame);
        }
    }

    fn revert(&mut self) {
        let frame = self.journal.pop().expect("revert without checkpoint");
        for (key, previous) in frame.into_iter().rev() {
            match previous {
                Some(value) => {
                    self.entries.insert(key, value);
                }
                None => {
                    self.entries.remove(&key);
                }
            }
        }
    }
}

/// An in-memory trie database, content-addressing whole tries by
/// their root.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    snapshots: BTreeMap<H256, BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl Database for MemoryDatabase {
    type Trie = MemoryTrie;

    fn create_trie(&self, root: H256) -> Result<MemoryTrie, TrieError> {
        if root == empty_trie_root() {
            return Ok(MemoryTrie::default());
        }
        match self.snapshots.get(&root) {
            Some(entries) => Ok(MemoryTrie {
                entries: entries.clone(),
                journal: Vec::new(),
            }),
            None => Err(TrieError::new("unknown trie root")),
        }
    }

    fn commit_trie(&mut self, trie: &MemoryTrie) -> H256 {
        let root = trie.root();
        self.snapshots.insert(root, trie.entries.clone());
        root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revert_restores_previous_values() {
        let mut trie = MemoryTrie::default();
        trie.put(b"a".to_vec(), b"1".to_vec()).unwrap();

        trie.checkpoint();
        trie.put(b"a".to_vec(), b"2".to_vec()).unwrap();
        trie.put(b"b".to_vec(), b"3".to_vec()).unwrap();
        trie.del(b"a").unwrap();
        trie.revert();

        assert_eq!(trie.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(trie.get(b"b").unwrap(), None);
    }

    #[test]
    fn commit_keeps_writes_undoable_by_outer_checkpoint() {
        let mut trie = MemoryTrie::default();
        trie.checkpoint();
        trie.checkpoint();
        trie.put(b"x".to_vec(), b"1".to_vec()).unwrap();
        trie.commit();
        assert_eq!(trie.get(b"x").unwrap(), Some(b"1".to_vec()));
        trie.revert();
        assert_eq!(trie.get(b"x").unwrap(), None);
    }

    #[test]
    fn root_tracks_contents() {
        let mut trie = MemoryTrie::default();
        assert_eq!(trie.root(), empty_trie_root());
        let empty = trie.root();

        trie.checkpoint();
        trie.put(b"k".to_vec(), b"v".to_vec()).unwrap();
        let populated = trie.root();
        assert_ne!(empty, populated);

        trie.revert();
        assert_eq!(trie.root(), empty);
    }

    #[test]
    fn database_round_trip() {
        let mut database = MemoryDatabase::default();
        let mut trie = database.create_trie(empty_trie_root()).unwrap();
        trie.put(b"k".to_vec(), b"v".to_vec()).unwrap();
        let root = database.commit_trie(&trie);

        let reopened = database.create_trie(root).unwrap();
        assert_eq!(reopened.get(b"k").unwrap(), Some(b"v".to_vec()));
        assert!(database.create_trie(H256::repeat_byte(1)).is_err());
    }
}
