//! Instruction running logic.

macro_rules! pop {
    ( $state:expr, $( $x:ident ),* ) => (
        $(
            let $x = $state.stack.pop().unwrap();
        )*
    );
}

macro_rules! push {
    ( $state:expr, $( $x:expr ),* ) => (
        $(
            $state.stack.push($x).unwrap();
        )*
    )
}

mod arithmetic;
mod bitwise;
mod environment;
mod flow;
mod system;

use std::rc::Rc;

use primitive_types::U256;

use crate::errors::TrieError;
use crate::memory::Memory;
use crate::patch::Patch;
use crate::pc::Instruction;
use crate::state::StateManager;
use crate::trie::Database;
use crate::util::{address_to_u256, h256_to_u256, u256_to_address};

use super::util::copy_from_memory;
use super::{Control, Runtime, State};

fn bool_to_u256(value: bool) -> U256 {
    if value {
        U256::one()
    } else {
        U256::zero()
    }
}

/// Run a single instruction against the frame state.
#[allow(clippy::too_many_arguments)]
pub fn run_opcode<M: Memory + Default, P: Patch, D: Database>(
    pc: (Instruction, usize),
    state: &mut State<M>,
    handle: &mut StateManager<D>,
    runtime: &Runtime,
    stipend_gas: U256,
    after_gas: U256,
) -> Result<Option<Control>, TrieError> {
    match pc.0 {
        Instruction::STOP => Ok(Some(Control::Stop)),
        Instruction::ADD => {
            pop!(state, op1, op2);
            push!(state, op1.overflowing_add(op2).0);
            Ok(None)
        }
        Instruction::MUL => {
            pop!(state, op1, op2);
            push!(state, op1.overflowing_mul(op2).0);
            Ok(None)
        }
        Instruction::SUB => {
            pop!(state, op1, op2);
            push!(state, op1.overflowing_sub(op2).0);
            Ok(None)
        }
        Instruction::DIV => {
            pop!(state, op1, op2);
            push!(state, arithmetic::div(op1, op2));
            Ok(None)
        }
        Instruction::SDIV => {
            pop!(state, op1, op2);
            push!(state, arithmetic::sdiv(op1, op2));
            Ok(None)
        }
        Instruction::MOD => {
            pop!(state, op1, op2);
            push!(state, arithmetic::rem(op1, op2));
            Ok(None)
        }
        Instruction::SMOD => {
            pop!(state, op1, op2);
            push!(state, arithmetic::srem(op1, op2));
            Ok(None)
        }
        Instruction::ADDMOD => {
            pop!(state, op1, op2, op3);
            push!(state, arithmetic::addmod(op1, op2, op3));
            Ok(None)
        }
        Instruction::MULMOD => {
            pop!(state, op1, op2, op3);
            push!(state, arithmetic::mulmod(op1, op2, op3));
            Ok(None)
        }
        Instruction::EXP => {
            pop!(state, op1, op2);
            push!(state, arithmetic::exp(op1, op2));
            Ok(None)
        }
        Instruction::SIGNEXTEND => {
            pop!(state, op1, op2);
            push!(state, arithmetic::signextend(op1, op2));
            Ok(None)
        }

        Instruction::LT => {
            pop!(state, op1, op2);
            push!(state, bool_to_u256(op1 < op2));
            Ok(None)
        }
        Instruction::GT => {
            pop!(state, op1, op2);
            push!(state, bool_to_u256(op1 > op2));
            Ok(None)
        }
        Instruction::SLT => {
            pop!(state, op1, op2);
            push!(state, bitwise::slt(op1, op2));
            Ok(None)
        }
        Instruction::SGT => {
            pop!(state, op1, op2);
            push!(state, bitwise::sgt(op1, op2));
            Ok(None)
        }
        Instruction::EQ => {
            pop!(state, op1, op2);
            push!(state, bool_to_u256(op1 == op2));
            Ok(None)
        }
        Instruction::ISZERO => {
            pop!(state, op1);
            push!(state, bool_to_u256(op1 == U256::zero()));
            Ok(None)
        }
        Instruction::AND => {
            pop!(state, op1, op2);
            push!(state, op1 & op2);
            Ok(None)
        }
        Instruction::OR => {
            pop!(state, op1, op2);
            push!(state, op1 | op2);
            Ok(None)
        }
        Instruction::XOR => {
            pop!(state, op1, op2);
            push!(state, op1 ^ op2);
            Ok(None)
        }
        Instruction::NOT => {
            pop!(state, op1);
            push!(state, !op1);
            Ok(None)
        }
        Instruction::BYTE => {
            pop!(state, op1, op2);
            push!(state, bitwise::byte(op1, op2));
            Ok(None)
        }

        Instruction::SHA3 => {
            system::sha3(state);
            Ok(None)
        }

        Instruction::ADDRESS => {
            push!(state, address_to_u256(state.context.address));
            Ok(None)
        }
        Instruction::BALANCE => {
            pop!(state, target);
            let balance = handle.get_balance(u256_to_address(target))?;
            push!(state, balance);
            Ok(None)
        }
        Instruction::ORIGIN => {
            push!(state, address_to_u256(state.context.origin));
            Ok(None)
        }
        Instruction::CALLER => {
            push!(state, address_to_u256(state.context.caller));
            Ok(None)
        }
        Instruction::CALLVALUE => {
            push!(state, state.context.apparent_value);
            Ok(None)
        }
        Instruction::CALLDATALOAD => {
            environment::calldataload(state);
            Ok(None)
        }
        Instruction::CALLDATASIZE => {
            push!(state, U256::from(state.context.data.len()));
            Ok(None)
        }
        Instruction::CALLDATACOPY => {
            environment::calldatacopy(state);
            Ok(None)
        }
        Instruction::CODESIZE => {
            push!(state, U256::from(state.context.code.len()));
            Ok(None)
        }
        Instruction::CODECOPY => {
            environment::codecopy(state);
            Ok(None)
        }
        Instruction::GASPRICE => {
            push!(state, state.context.gas_price);
            Ok(None)
        }
        Instruction::EXTCODESIZE => {
            pop!(state, target);
            let code = handle.get_code(u256_to_address(target))?;
            push!(state, U256::from(code.len()));
            Ok(None)
        }
        Instruction::EXTCODECOPY => {
            pop!(state, target);
            let code = handle.get_code(u256_to_address(target))?;
            environment::extcodecopy(state, &code);
            Ok(None)
        }

        Instruction::BLOCKHASH => {
            pop!(state, number);
            push!(state, h256_to_u256(runtime.block.block_hash(number)));
            Ok(None)
        }
        Instruction::COINBASE => {
            push!(state, address_to_u256(runtime.block.beneficiary));
            Ok(None)
        }
        Instruction::TIMESTAMP => {
            push!(state, U256::from(runtime.block.timestamp));
            Ok(None)
        }
        Instruction::NUMBER => {
            push!(state, runtime.block.number);
            Ok(None)
        }
        Instruction::DIFFICULTY => {
            push!(state, runtime.block.difficulty);
            Ok(None)
        }
        Instruction::GASLIMIT => {
            push!(state, runtime.block.gas_limit);
            Ok(None)
        }

        Instruction::POP => {
            state.stack.pop().unwrap();
            Ok(None)
        }
        Instruction::MLOAD => {
            flow::mload(state);
            Ok(None)
        }
        Instruction::MSTORE => {
            flow::mstore(state);
            Ok(None)
        }
        Instruction::MSTORE8 => {
            flow::mstore8(state);
            Ok(None)
        }
        Instruction::SLOAD => flow::sload(state, handle).map(|_| None),
        Instruction::SSTORE => flow::sstore(state, handle).map(|_| None),
        Instruction::JUMP => {
            pop!(state, dest);
            Ok(Some(Control::Jump(dest)))
        }
        Instruction::JUMPI => {
            pop!(state, dest, value);
            if value != U256::zero() {
                Ok(Some(Control::Jump(dest)))
            } else {
                Ok(None)
            }
        }
        Instruction::PC => {
            push!(state, U256::from(pc.1));
            Ok(None)
        }
        Instruction::MSIZE => {
            push!(state, state.memory_cost * U256::from(32u64));
            Ok(None)
        }
        Instruction::GAS => {
            push!(state, after_gas);
            Ok(None)
        }
        Instruction::JUMPDEST => Ok(None),

        Instruction::PUSH(value) => {
            push!(state, value);
            Ok(None)
        }
        Instruction::DUP(v) => {
            let value = state.stack.peek(v - 1).unwrap();
            push!(state, value);
            Ok(None)
        }
        Instruction::SWAP(v) => {
            let val1 = state.stack.peek(0).unwrap();
            let val2 = state.stack.peek(v).unwrap();
            state.stack.set(0, val2).unwrap();
            state.stack.set(v, val1).unwrap();
            Ok(None)
        }
        Instruction::LOG(v) => {
            system::log(state, v);
            Ok(None)
        }

        Instruction::CREATE => system::create::<M, P, D>(state, handle, after_gas),
        Instruction::CALL => system::call::<M, P, D>(state, handle, stipend_gas, after_gas, false),
        Instruction::CALLCODE => {
            system::call::<M, P, D>(state, handle, stipend_gas, after_gas, true)
        }
        Instruction::DELEGATECALL => system::delegate_call::<M, P, D>(state, handle, after_gas),
        Instruction::RETURN => {
            pop!(state, start, len);
            state.out = Rc::new(copy_from_memory(&state.memory, start, len));
            Ok(Some(Control::Stop))
        }
        Instruction::SUICIDE => {
            system::suicide(state, handle)?;
            Ok(Some(Control::Stop))
        }
    }
}
