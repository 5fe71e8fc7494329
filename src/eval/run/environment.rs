//! Call-data and code environment instructions.

use primitive_types::U256;

use crate::memory::Memory;

use super::super::util::copy_into_memory;
use super::State;

pub fn calldataload<M: Memory>(state: &mut State<M>) {
    pop!(state, index);

    let data = &state.context.data;
    let mut load = [0u8; 32];
    for (i, byte) in load.iter_mut().enumerate() {
        if let Some(position) = index.checked_add(U256::from(i as u64)) {
            if position < U256::from(data.len()) {
                *byte = data[position.as_usize()];
            }
        }
    }

    push!(state, U256::from_big_endian(&load));
}

pub fn calldatacopy<M: Memory>(state: &mut State<M>) {
    pop!(state, memory_index, data_index, len);
    let data = state.context.data.clone();
    copy_into_memory(&mut state.memory, data.as_slice(), memory_index, data_index, len);
}

pub fn codecopy<M: Memory>(state: &mut State<M>) {
    pop!(state, memory_index, code_index, len);
    let code = state.context.code.clone();
    copy_into_memory(&mut state.memory, code.as_slice(), memory_index, code_index, len);
}

pub fn extcodecopy<M: Memory>(state: &mut State<M>, code: &[u8]) {
    pop!(state, memory_index, code_index, len);
    copy_into_memory(&mut state.memory, code, memory_index, code_index, len);
}
