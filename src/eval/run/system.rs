//! System instructions: hashing, logging, calls, creation, and
//! self-destruct.

use std::cmp::min;
use std::rc::Rc;

use primitive_types::U256;

use crate::errors::TrieError;
use crate::memory::Memory;
use crate::params::{Context, Log};
use crate::patch::Patch;
use crate::state::StateManager;
use crate::trie::Database;
use crate::util::{address_to_u256, create_address, h256_to_u256, keccak256, u256_to_address, u256_to_h256};

use super::super::util::{copy_from_memory, l64};
use super::super::{Control, State};

pub fn sha3<M: Memory>(state: &mut State<M>) {
    pop!(state, from, len);
    let data = copy_from_memory(&state.memory, from, len);
    push!(state, h256_to_u256(keccak256(data.as_slice())));
}

pub fn log<M: Memory>(state: &mut State<M>, topic_len: usize) {
    pop!(state, index, len);
    let data = copy_from_memory(&state.memory, index, len);
    let mut topics = Vec::new();
    for _ in 0..topic_len {
        topics.push(u256_to_h256(state.stack.pop().unwrap()));
    }

    state.logs.push(Log {
        address: state.context.address,
        topics,
        data,
    });
}

pub fn suicide<M: Memory, D: Database>(
    state: &mut State<M>,
    handle: &mut StateManager<D>,
) -> Result<(), TrieError> {
    pop!(state, target);
    let beneficiary = u256_to_address(target);
    let address = state.context.address;

    state.suicides.entry(address).or_insert(beneficiary);

    let balance = handle.get_balance(address)?;
    handle.add_balance(beneficiary, balance)?;
    // Re-read so that a self-beneficiary destroys its own funds.
    let balance = handle.get_balance(address)?;
    handle.sub_balance(address, balance)?;
    Ok(())
}

macro_rules! try_callstack_limit {
    ( $state:expr, $patch:tt ) => {
        if $state.depth + 1 >= $patch::callstack_limit() {
            push!($state, U256::zero());
            return Ok(Some(Control::ShortCircuit));
        }
    };
}

macro_rules! try_balance {
    ( $state:expr, $handle:expr, $value:expr ) => {
        if $handle.get_balance($state.context.address)? < $value {
            push!($state, U256::zero());
            return Ok(Some(Control::ShortCircuit));
        }
    };
}

pub fn create<M: Memory, P: Patch, D: Database>(
    state: &mut State<M>,
    handle: &mut StateManager<D>,
    after_gas: U256,
) -> Result<Option<Control>, TrieError> {
    let l64_after_gas = if P::call_create_l64_after_gas() {
        l64(after_gas)
    } else {
        after_gas
    };

    pop!(state, value);
    pop!(state, init_start, init_len);

    try_callstack_limit!(state, P);
    try_balance!(state, handle, value);

    // The creator's nonce rises before the child runs and stays
    // risen even if the creation fails.
    let nonce = handle.get_nonce(state.context.address)?;
    handle.put_nonce(state.context.address, nonce + 1)?;
    let address = create_address(state.context.address, nonce);

    let init = Rc::new(copy_from_memory(&state.memory, init_start, init_len));
    let context = Context {
        address,
        caller: state.context.address,
        origin: state.context.origin,
        code: init,
        data: Rc::new(Vec::new()),
        gas_limit: l64_after_gas,
        gas_price: state.context.gas_price,
        value,
        apparent_value: value,
    };

    push!(state, address_to_u256(address));
    Ok(Some(Control::InvokeCreate(context)))
}

pub fn call<M: Memory, P: Patch, D: Database>(
    state: &mut State<M>,
    handle: &mut StateManager<D>,
    stipend_gas: U256,
    after_gas: U256,
    as_self: bool,
) -> Result<Option<Control>, TrieError> {
    let l64_after_gas = if P::call_create_l64_after_gas() {
        l64(after_gas)
    } else {
        after_gas
    };

    pop!(state, gas, to, value);
    pop!(state, in_start, in_len, out_start, out_len);
    let to = u256_to_address(to);
    let gas_limit = min(gas, l64_after_gas) + stipend_gas;

    try_callstack_limit!(state, P);
    try_balance!(state, handle, value);

    let input = Rc::new(copy_from_memory(&state.memory, in_start, in_len));
    let code = handle.get_code(to)?;
    let mut context = Context {
        address: to,
        caller: state.context.address,
        origin: state.context.origin,
        code,
        data: input,
        gas_limit,
        gas_price: state.context.gas_price,
        value,
        apparent_value: value,
    };
    if as_self {
        context.address = state.context.address;
    }

    push!(state, U256::one());
    Ok(Some(Control::InvokeCall(context, (out_start, out_len))))
}

pub fn delegate_call<M: Memory, P: Patch, D: Database>(
    state: &mut State<M>,
    handle: &mut StateManager<D>,
    after_gas: U256,
) -> Result<Option<Control>, TrieError> {
    let l64_after_gas = if P::call_create_l64_after_gas() {
        l64(after_gas)
    } else {
        after_gas
    };

    pop!(state, gas, to);
    pop!(state, in_start, in_len, out_start, out_len);
    let to = u256_to_address(to);
    let gas_limit = min(gas, l64_after_gas);

    try_callstack_limit!(state, P);

    // Callee code runs in the caller's identity: same address, same
    // caller, same apparent value, and no transfer.
    let input = Rc::new(copy_from_memory(&state.memory, in_start, in_len));
    let code = handle.get_code(to)?;
    let context = Context {
        address: state.context.address,
        caller: state.context.caller,
        origin: state.context.origin,
        code,
        data: input,
        gas_limit,
        gas_price: state.context.gas_price,
        value: U256::zero(),
        apparent_value: state.context.apparent_value,
    };

    push!(state, U256::one());
    Ok(Some(Control::InvokeCall(context, (out_start, out_len))))
}
