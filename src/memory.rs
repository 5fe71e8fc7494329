//! VM memory representation.

use std::marker::PhantomData;

use primitive_types::U256;

use crate::errors::InternalError;
use crate::patch::Patch;
use crate::util::u256_to_h256;

/// Represents the linear byte memory of a frame. Reads always
/// succeed; writes can fail when the index cannot be represented.
pub trait Memory {
    /// Check whether a 32-byte write at this index would succeed.
    fn check_write(&self, index: U256) -> Result<(), InternalError>;
    /// Check whether writes over the given index range would succeed.
    fn check_write_range(&self, start: U256, len: U256) -> Result<(), InternalError>;

    /// Write a 32-byte word at the index.
    fn write(&mut self, index: U256, value: U256) -> Result<(), InternalError>;
    /// Write a single byte at the index.
    fn write_raw(&mut self, index: U256, value: u8) -> Result<(), InternalError>;
    /// Read a 32-byte word at the index. Unwritten memory reads zero.
    fn read(&self, index: U256) -> U256;
    /// Read a single byte at the index. Unwritten memory reads zero.
    fn read_raw(&self, index: U256) -> u8;
}

/// A sequential memory over a byte vector, growing on write.
pub struct SeqMemory<P: Patch> {
    memory: Vec<u8>,
    _marker: PhantomData<P>,
}

impl<P: Patch> Default for SeqMemory<P> {
    fn default() -> SeqMemory<P> {
        SeqMemory {
            memory: Vec::new(),
            _marker: PhantomData,
        }
    }
}

impl<P: Patch> SeqMemory<P> {
    /// Length of the touched memory range, in bytes.
    pub fn len(&self) -> usize {
        self.memory.len()
    }

    /// Whether no byte has been written yet.
    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }
}

impl<P: Patch> Memory for SeqMemory<P> {
    fn check_write(&self, index: U256) -> Result<(), InternalError> {
        let end = index.saturating_add(U256::from(32u64));
        if end > U256::from(P::memory_limit()) {
            Err(InternalError::MemoryIndexNotSupported)
        } else {
            Ok(())
        }
    }

    fn check_write_range(&self, start: U256, len: U256) -> Result<(), InternalError> {
        if len == U256::zero() {
            return Ok(());
        }

        if start.saturating_add(len) > U256::from(P::memory_limit()) {
            Err(InternalError::MemoryIndexNotSupported)
        } else {
            self.check_write(start + len - U256::from(1u64))
        }
    }

    fn write(&mut self, index: U256, value: U256) -> Result<(), InternalError> {
        self.check_write(index)?;

        let bytes = u256_to_h256(value);
        for (i, byte) in bytes.as_bytes().iter().enumerate() {
            self.write_raw(index + U256::from(i as u64), *byte)?;
        }
        Ok(())
    }

    fn write_raw(&mut self, index: U256, value: u8) -> Result<(), InternalError> {
        if index >= U256::from(P::memory_limit()) {
            return Err(InternalError::MemoryIndexNotSupported);
        }

        let index = index.as_usize();

        if self.memory.len() <= index {
            self.memory.resize(index + 1, 0u8);
        }

        self.memory[index] = value;
        Ok(())
    }

    fn read(&self, index: U256) -> U256 {
        let mut a = [0u8; 32];

        for (i, byte) in a.iter_mut().enumerate() {
            *byte = self.read_raw(index.saturating_add(U256::from(i as u64)));
        }
        U256::from_big_endian(&a)
    }

    fn read_raw(&self, index: U256) -> u8 {
        if index > U256::from(usize::MAX) {
            return 0u8;
        }

        let index = index.as_usize();

        if self.memory.len() <= index {
            return 0u8;
        }

        self.memory[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::HomesteadPatch;

    #[test]
    fn word_round_trip() {
        let mut memory = SeqMemory::<HomesteadPatch>::default();
        let value = U256::from(0xdeadbeefu64);
        memory.write(U256::from(64u64), value).unwrap();
        assert_eq!(memory.read(U256::from(64u64)), value);
        assert_eq!(memory.len(), 96);
    }

    #[test]
    fn unwritten_reads_zero() {
        let memory = SeqMemory::<HomesteadPatch>::default();
        assert_eq!(memory.read(U256::from(1024u64)), U256::zero());
        assert_eq!(memory.read_raw(U256::MAX), 0);
    }

    #[test]
    fn byte_write() {
        let mut memory = SeqMemory::<HomesteadPatch>::default();
        memory.write_raw(U256::from(31u64), 0xff).unwrap();
        assert_eq!(memory.read(U256::zero()), U256::from(0xffu64));
    }
}
