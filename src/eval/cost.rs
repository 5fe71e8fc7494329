//! Gas cost calculation.

use std::cmp::max;

use primitive_types::U256;

use crate::errors::TrieError;
use crate::memory::Memory;
use crate::patch::Patch;
use crate::pc::Instruction;
use crate::state::StateManager;
use crate::trie::Database;
use crate::util::u256_to_address;

use super::util::log2floor;
use super::State;

const G_ZERO: u64 = 0;
const G_BASE: u64 = 2;
const G_VERYLOW: u64 = 3;
const G_LOW: u64 = 5;
const G_MID: u64 = 8;
const G_HIGH: u64 = 10;
const G_JUMPDEST: u64 = 1;
const G_SSET: u64 = 20000;
const G_SRESET: u64 = 5000;
const R_SCLEAR: u64 = 15000;
const R_SUICIDE: u64 = 24000;
const G_CREATE: u64 = 32000;
const G_CODEDEPOSIT: u64 = 200;
const G_CALLVALUE: u64 = 9000;
const G_CALLSTIPEND: u64 = 2300;
const G_NEWACCOUNT: u64 = 25000;
const G_EXP: u64 = 10;
const G_MEMORY: u64 = 3;
const G_QUADCOEF: u64 = 512;
const G_LOG: u64 = 375;
const G_LOGDATA: u64 = 8;
const G_LOGTOPIC: u64 = 375;
const G_SHA3: u64 = 30;
const G_SHA3WORD: u64 = 6;
const G_COPY: u64 = 3;
const G_BLOCKHASH: u64 = 20;

fn sstore_cost<M: Memory, D: Database>(
    state: &State<M>,
    handle: &mut StateManager<D>,
) -> Result<U256, TrieError> {
    let index = state.stack.peek(0).unwrap();
    let value = state.stack.peek(1).unwrap();
    let address = state.context.address;

    if value != U256::zero() && handle.get_storage(address, index)? == U256::zero() {
        Ok(G_SSET.into())
    } else {
        Ok(G_SRESET.into())
    }
}

fn call_cost<M: Memory, P: Patch, D: Database>(
    instruction: Instruction,
    state: &State<M>,
    handle: &mut StateManager<D>,
) -> Result<U256, TrieError> {
    Ok(P::gas_call() + xfer_cost(instruction, state) + new_cost(instruction, state, handle)?)
}

fn xfer_cost<M: Memory>(instruction: Instruction, state: &State<M>) -> U256 {
    if instruction == Instruction::CALL || instruction == Instruction::CALLCODE {
        let value = state.stack.peek(2).unwrap();
        if value != U256::zero() {
            return G_CALLVALUE.into();
        }
    }
    U256::zero()
}

fn new_cost<M: Memory, D: Database>(
    instruction: Instruction,
    state: &State<M>,
    handle: &mut StateManager<D>,
) -> Result<U256, TrieError> {
    if instruction == Instruction::CALL {
        let address = u256_to_address(state.stack.peek(1).unwrap());
        let value = state.stack.peek(2).unwrap();
        if value != U256::zero() && handle.account_dead(address)? {
            return Ok(G_NEWACCOUNT.into());
        }
    }
    Ok(U256::zero())
}

fn word_count(len: U256) -> U256 {
    let wordd = len / U256::from(32u64);
    let wordr = len % U256::from(32u64);
    if wordr == U256::zero() {
        wordd
    } else {
        wordd + U256::one()
    }
}

fn memory_expand(current: U256, from: U256, len: U256) -> U256 {
    if len == U256::zero() {
        return current;
    }

    max(current, word_count(from.saturating_add(len)))
}

/// Gas charged when depositing created-contract code.
pub fn code_deposit_gas(len: usize) -> U256 {
    U256::from(G_CODEDEPOSIT) * U256::from(len)
}

/// The flat cost of a CALL-family or CREATE instruction. This is all
/// a frame pays when the invocation short-circuits on depth or
/// balance without a child frame ever existing; the transfer and
/// new-account surcharges apply only to calls that actually enter
/// code.
pub fn invoke_base_cost<P: Patch>(instruction: Instruction) -> U256 {
    match instruction {
        Instruction::CREATE => G_CREATE.into(),
        _ => P::gas_call(),
    }
}

/// Gas owed for a given memory high-water mark, measured in words.
pub fn memory_gas(words: U256) -> U256 {
    U256::from(G_MEMORY)
        .saturating_mul(words)
        .saturating_add(words.saturating_mul(words) / U256::from(G_QUADCOEF))
}

/// New memory high-water mark after the instruction, in words. The
/// mark never decreases; zero-length accesses do not expand.
pub fn memory_cost<M: Memory>(instruction: Instruction, state: &State<M>) -> U256 {
    let stack = &state.stack;

    let current = state.memory_cost;
    match instruction {
        Instruction::SHA3 | Instruction::RETURN | Instruction::LOG(_) => {
            let from = stack.peek(0).unwrap();
            let len = stack.peek(1).unwrap();
            memory_expand(current, from, len)
        }
        Instruction::CODECOPY | Instruction::CALLDATACOPY => {
            let from = stack.peek(0).unwrap();
            let len = stack.peek(2).unwrap();
            memory_expand(current, from, len)
        }
        Instruction::EXTCODECOPY => {
            let from = stack.peek(1).unwrap();
            let len = stack.peek(3).unwrap();
            memory_expand(current, from, len)
        }
        Instruction::MLOAD | Instruction::MSTORE => {
            let from = stack.peek(0).unwrap();
            memory_expand(current, from, U256::from(32u64))
        }
        Instruction::MSTORE8 => {
            let from = stack.peek(0).unwrap();
            memory_expand(current, from, U256::one())
        }
        Instruction::CREATE => {
            let from = stack.peek(1).unwrap();
            let len = stack.peek(2).unwrap();
            memory_expand(current, from, len)
        }
        Instruction::CALL | Instruction::CALLCODE => {
            let in_from = stack.peek(3).unwrap();
            let in_len = stack.peek(4).unwrap();
            let out_from = stack.peek(5).unwrap();
            let out_len = stack.peek(6).unwrap();
            memory_expand(memory_expand(current, in_from, in_len), out_from, out_len)
        }
        Instruction::DELEGATECALL => {
            let in_from = stack.peek(2).unwrap();
            let in_len = stack.peek(3).unwrap();
            let out_from = stack.peek(4).unwrap();
            let out_len = stack.peek(5).unwrap();
            memory_expand(memory_expand(current, in_from, in_len), out_from, out_len)
        }
        _ => current,
    }
}

/// Gas charged for the instruction itself, before memory expansion.
pub fn gas_cost<M: Memory, P: Patch, D: Database>(
    instruction: Instruction,
    state: &State<M>,
    handle: &mut StateManager<D>,
) -> Result<U256, TrieError> {
    Ok(match instruction {
        Instruction::CALL | Instruction::CALLCODE | Instruction::DELEGATECALL => {
            call_cost::<M, P, D>(instruction, state, handle)?
        }
        Instruction::SUICIDE => P::gas_suicide(),
        Instruction::SSTORE => sstore_cost(state, handle)?,

        Instruction::SHA3 => {
            let len = state.stack.peek(1).unwrap();
            U256::from(G_SHA3).saturating_add(U256::from(G_SHA3WORD).saturating_mul(word_count(len)))
        }

        Instruction::LOG(v) => {
            let len = state.stack.peek(1).unwrap();
            U256::from(G_LOG)
                .saturating_add(U256::from(G_LOGDATA).saturating_mul(len))
                .saturating_add(U256::from(G_LOGTOPIC) * U256::from(v))
        }

        Instruction::EXTCODECOPY => {
            let len = state.stack.peek(3).unwrap();
            P::gas_extcode().saturating_add(U256::from(G_COPY).saturating_mul(word_count(len)))
        }

        Instruction::CALLDATACOPY | Instruction::CODECOPY => {
            let len = state.stack.peek(2).unwrap();
            U256::from(G_VERYLOW).saturating_add(U256::from(G_COPY).saturating_mul(word_count(len)))
        }

        Instruction::EXP => {
            let exponent = state.stack.peek(1).unwrap();
            if exponent == U256::zero() {
                U256::from(G_EXP)
            } else {
                U256::from(G_EXP)
                    + P::gas_expbyte() * (U256::one() + U256::from(log2floor(exponent) / 8))
            }
        }

        Instruction::CREATE => G_CREATE.into(),
        Instruction::JUMPDEST => G_JUMPDEST.into(),
        Instruction::SLOAD => P::gas_sload(),

        // W_zero
        Instruction::STOP | Instruction::RETURN => G_ZERO.into(),

        // W_base
        Instruction::ADDRESS
        | Instruction::ORIGIN
        | Instruction::CALLER
        | Instruction::CALLVALUE
        | Instruction::CALLDATASIZE
        | Instruction::CODESIZE
        | Instruction::GASPRICE
        | Instruction::COINBASE
        | Instruction::TIMESTAMP
        | Instruction::NUMBER
        | Instruction::DIFFICULTY
        | Instruction::GASLIMIT
        | Instruction::POP
        | Instruction::PC
        | Instruction::MSIZE
        | Instruction::GAS => G_BASE.into(),

        // W_verylow
        Instruction::ADD
        | Instruction::SUB
        | Instruction::NOT
        | Instruction::LT
        | Instruction::GT
        | Instruction::SLT
        | Instruction::SGT
        | Instruction::EQ
        | Instruction::ISZERO
        | Instruction::AND
        | Instruction::OR
        | Instruction::XOR
        | Instruction::BYTE
        | Instruction::CALLDATALOAD
        | Instruction::MLOAD
        | Instruction::MSTORE
        | Instruction::MSTORE8
        | Instruction::PUSH(_)
        | Instruction::DUP(_)
        | Instruction::SWAP(_) => G_VERYLOW.into(),

        // W_low
        Instruction::MUL
        | Instruction::DIV
        | Instruction::SDIV
        | Instruction::MOD
        | Instruction::SMOD
        | Instruction::SIGNEXTEND => G_LOW.into(),

        // W_mid
        Instruction::ADDMOD | Instruction::MULMOD | Instruction::JUMP => G_MID.into(),

        // W_high
        Instruction::JUMPI => G_HIGH.into(),

        Instruction::EXTCODESIZE => P::gas_extcode(),
        Instruction::BALANCE => P::gas_balance(),
        Instruction::BLOCKHASH => G_BLOCKHASH.into(),
    })
}

/// Stipend granted to the callee (and, transiently, to the caller's
/// budget) when a CALL or CALLCODE transfers nonzero value.
pub fn gas_stipend<M: Memory>(instruction: Instruction, state: &State<M>) -> U256 {
    match instruction {
        Instruction::CALL | Instruction::CALLCODE => {
            let value = state.stack.peek(2).unwrap();

            if value != U256::zero() {
                G_CALLSTIPEND.into()
            } else {
                U256::zero()
            }
        }
        _ => U256::zero(),
    }
}

/// Refund accrued by the instruction: storage clears and
/// self-destructs.
pub fn gas_refund<M: Memory, D: Database>(
    instruction: Instruction,
    state: &State<M>,
    handle: &mut StateManager<D>,
) -> Result<U256, TrieError> {
    match instruction {
        Instruction::SSTORE => {
            let index = state.stack.peek(0).unwrap();
            let value = state.stack.peek(1).unwrap();
            let address = state.context.address;

            if value == U256::zero() && handle.get_storage(address, index)? != U256::zero() {
                Ok(R_SCLEAR.into())
            } else {
                Ok(U256::zero())
            }
        }
        Instruction::SUICIDE => {
            if state.suicides.contains_key(&state.context.address) {
                Ok(U256::zero())
            } else {
                Ok(R_SUICIDE.into())
            }
        }
        _ => Ok(U256::zero()),
    }
}
