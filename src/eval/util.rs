//! Eval utilities.

use std::cmp::min;

use primitive_types::U256;

use crate::errors::FrameError;
use crate::memory::Memory;

/// All but a 64th of the gas, the most a child call may receive.
pub fn l64(gas: U256) -> U256 {
    gas - gas / U256::from(64u64)
}

/// Reject memory ranges that wrap the 256-bit address space.
pub fn check_range(start: U256, len: U256) -> Result<(), FrameError> {
    if start.checked_add(len).is_none() {
        Err(FrameError::InvalidRange)
    } else {
        Ok(())
    }
}

/// Floor of the base-2 logarithm; zero maps to zero.
pub fn log2floor(value: U256) -> u64 {
    if value == U256::zero() {
        0
    } else {
        value.bits() as u64 - 1
    }
}

/// Read `[start, start + len)` out of memory into a fresh buffer.
pub fn copy_from_memory<M: Memory>(memory: &M, start: U256, len: U256) -> Vec<u8> {
    let mut result: Vec<u8> = Vec::new();
    let mut i = start;
    while i < start + len {
        result.push(memory.read_raw(i));
        i = i + U256::one();
    }

    result
}

/// Write `values[value_start..]` into memory at `start`, zero-filling
/// to `len` when the source runs out.
pub fn copy_into_memory<M: Memory>(
    memory: &mut M,
    values: &[u8],
    start: U256,
    value_start: U256,
    len: U256,
) {
    let value_len = U256::from(values.len());
    let mut i = start;
    let mut j = value_start;
    while i < start + len {
        if j < value_len {
            memory.write_raw(i, values[j.as_usize()]).unwrap();
            j = j + U256::one();
        } else {
            memory.write_raw(i, 0u8).unwrap();
        }
        i = i + U256::one();
    }
}

/// Write `values` into memory at `start`, stopping at `len` bytes or
/// the end of the source, whichever comes first. Bytes of the target
/// range beyond the source are left untouched.
pub fn copy_into_memory_apply<M: Memory>(memory: &mut M, values: &[u8], start: U256, len: U256) {
    let actual_len = min(len, U256::from(values.len()));
    let mut i = start;
    let mut j = 0;
    while i < start + actual_len {
        memory.write_raw(i, values[j]).unwrap();
        i = i + U256::one();
        j += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::SeqMemory;
    use crate::patch::HomesteadPatch;

    #[test]
    fn l64_is_63_64ths() {
        assert_eq!(l64(U256::from(6400u64)), U256::from(6300u64));
        assert_eq!(l64(U256::from(63u64)), U256::from(63u64));
    }

    #[test]
    fn log2floor_boundaries() {
        assert_eq!(log2floor(U256::zero()), 0);
        assert_eq!(log2floor(U256::one()), 0);
        assert_eq!(log2floor(U256::from(255u64)), 7);
        assert_eq!(log2floor(U256::from(256u64)), 8);
    }

    #[test]
    fn short_source_zero_fills() {
        let mut memory = SeqMemory::<HomesteadPatch>::default();
        memory.write_raw(U256::from(2u64), 0xff).unwrap();
        copy_into_memory(
            &mut memory,
            &[1, 2],
            U256::zero(),
            U256::zero(),
            U256::from(3u64),
        );
        assert_eq!(memory.read_raw(U256::zero()), 1);
        assert_eq!(memory.read_raw(U256::one()), 2);
        assert_eq!(memory.read_raw(U256::from(2u64)), 0);
    }

    #[test]
    fn apply_copy_leaves_tail_untouched() {
        let mut memory = SeqMemory::<HomesteadPatch>::default();
        memory.write_raw(U256::from(2u64), 0xff).unwrap();
        copy_into_memory_apply(&mut memory, &[1, 2], U256::zero(), U256::from(3u64));
        assert_eq!(memory.read_raw(U256::from(2u64)), 0xff);
    }
}
