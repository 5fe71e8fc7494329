//! Memory and storage access instructions.

use primitive_types::U256;

use crate::errors::TrieError;
use crate::memory::Memory;
use crate::state::StateManager;
use crate::trie::Database;

use super::State;

pub fn mload<M: Memory>(state: &mut State<M>) {
    pop!(state, index);
    let value = state.memory.read(index);
    push!(state, value);
}

pub fn mstore<M: Memory>(state: &mut State<M>) {
    pop!(state, index, value);
    state.memory.write(index, value).unwrap();
}

pub fn mstore8<M: Memory>(state: &mut State<M>) {
    pop!(state, index, value);
    state
        .memory
        .write_raw(index, (value.low_u32() & 0xff) as u8)
        .unwrap();
}

pub fn sload<M: Memory, D: Database>(
    state: &mut State<M>,
    handle: &mut StateManager<D>,
) -> Result<(), TrieError> {
    pop!(state, index);
    let value = handle.get_storage(state.context.address, index)?;
    push!(state, value);
    Ok(())
}

pub fn sstore<M: Memory, D: Database>(
    state: &mut State<M>,
    handle: &mut StateManager<D>,
) -> Result<(), TrieError> {
    pop!(state, index, value);
    handle.put_storage(state.context.address, index, value)
}
