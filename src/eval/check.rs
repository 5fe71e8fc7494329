//! Pre-dispatch checks. Everything here runs before any gas is
//! charged or state is mutated.

use primitive_types::U256;

use crate::errors::FrameError;
use crate::memory::Memory;
use crate::pc::Instruction;

use super::util::check_range;
use super::{ControlCheck, State};

/// Check stack arities, memory range operands, and jump targets for
/// an instruction. A failure terminates the frame before dispatch.
pub fn check_opcode<M: Memory>(
    instruction: Instruction,
    state: &State<M>,
) -> Result<Option<ControlCheck>, FrameError> {
    let stack = &state.stack;
    match instruction {
        Instruction::STOP | Instruction::JUMPDEST => Ok(None),

        Instruction::ADD
        | Instruction::MUL
        | Instruction::SUB
        | Instruction::DIV
        | Instruction::SDIV
        | Instruction::MOD
        | Instruction::SMOD
        | Instruction::EXP
        | Instruction::SIGNEXTEND
        | Instruction::LT
        | Instruction::GT
        | Instruction::SLT
        | Instruction::SGT
        | Instruction::EQ
        | Instruction::AND
        | Instruction::OR
        | Instruction::XOR
        | Instruction::BYTE => {
            stack.check_pop_push(2, 1)?;
            Ok(None)
        }

        Instruction::ADDMOD | Instruction::MULMOD => {
            stack.check_pop_push(3, 1)?;
            Ok(None)
        }

        Instruction::ISZERO | Instruction::NOT | Instruction::CALLDATALOAD => {
            stack.check_pop_push(1, 1)?;
            Ok(None)
        }

        Instruction::SHA3 => {
            stack.check_pop_push(2, 1)?;
            check_range(stack.peek(0).unwrap(), stack.peek(1).unwrap())?;
            Ok(None)
        }

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
        | Instruction::PC
        | Instruction::MSIZE
        | Instruction::GAS => {
            stack.check_pop_push(0, 1)?;
            Ok(None)
        }

        Instruction::BALANCE | Instruction::EXTCODESIZE | Instruction::BLOCKHASH => {
            stack.check_pop_push(1, 1)?;
            Ok(None)
        }

        Instruction::CALLDATACOPY | Instruction::CODECOPY => {
            stack.check_pop_push(3, 0)?;
            check_range(stack.peek(0).unwrap(), stack.peek(2).unwrap())?;
            Ok(None)
        }

        Instruction::EXTCODECOPY => {
            stack.check_pop_push(4, 0)?;
            check_range(stack.peek(1).unwrap(), stack.peek(3).unwrap())?;
            Ok(None)
        }

        Instruction::POP => {
            stack.check_pop_push(1, 0)?;
            Ok(None)
        }

        Instruction::MLOAD | Instruction::SLOAD => {
            stack.check_pop_push(1, 1)?;
            Ok(None)
        }

        Instruction::MSTORE | Instruction::MSTORE8 | Instruction::SSTORE => {
            stack.check_pop_push(2, 0)?;
            Ok(None)
        }

        Instruction::JUMP => {
            stack.check_pop_push(1, 0)?;
            Ok(Some(ControlCheck::Jump(stack.peek(0).unwrap())))
        }
        Instruction::JUMPI => {
            stack.check_pop_push(2, 0)?;
            if stack.peek(1).unwrap() != U256::zero() {
                Ok(Some(ControlCheck::Jump(stack.peek(0).unwrap())))
            } else {
                Ok(None)
            }
        }

        Instruction::PUSH(_) => {
            stack.check_pop_push(0, 1)?;
            Ok(None)
        }
        Instruction::DUP(v) => {
            stack.check_pop_push(v, v + 1)?;
            Ok(None)
        }
        Instruction::SWAP(v) => {
            stack.check_pop_push(v + 1, v + 1)?;
            Ok(None)
        }

        Instruction::LOG(v) => {
            stack.check_pop_push(v + 2, 0)?;
            check_range(stack.peek(0).unwrap(), stack.peek(1).unwrap())?;
            Ok(None)
        }

        Instruction::CREATE => {
            stack.check_pop_push(3, 1)?;
            check_range(stack.peek(1).unwrap(), stack.peek(2).unwrap())?;
            Ok(None)
        }
        Instruction::CALL | Instruction::CALLCODE => {
            stack.check_pop_push(7, 1)?;
            check_range(stack.peek(3).unwrap(), stack.peek(4).unwrap())?;
            check_range(stack.peek(5).unwrap(), stack.peek(6).unwrap())?;
            Ok(None)
        }
        Instruction::DELEGATECALL => {
            stack.check_pop_push(6, 1)?;
            check_range(stack.peek(2).unwrap(), stack.peek(3).unwrap())?;
            check_range(stack.peek(4).unwrap(), stack.peek(5).unwrap())?;
            Ok(None)
        }

        Instruction::RETURN => {
            stack.check_pop_push(2, 0)?;
            check_range(stack.peek(0).unwrap(), stack.peek(1).unwrap())?;
            Ok(None)
        }
        Instruction::SUICIDE => {
            stack.check_pop_push(1, 0)?;
            Ok(None)
        }
    }
}

/// Check that the memory writes an instruction performs are
/// representable. Runs after the gas charge, so a huge range is
/// normally rejected as out-of-gas before getting here.
pub fn check_memory_support<M: Memory>(
    instruction: Instruction,
    state: &State<M>,
) -> Result<(), crate::errors::InternalError> {
    let stack = &state.stack;
    match instruction {
        Instruction::MSTORE | Instruction::MSTORE8 | Instruction::MLOAD => {
            state.memory.check_write(stack.peek(0).unwrap())
        }
        Instruction::CALLDATACOPY | Instruction::CODECOPY => state
            .memory
            .check_write_range(stack.peek(0).unwrap(), stack.peek(2).unwrap()),
        Instruction::EXTCODECOPY => state
            .memory
            .check_write_range(stack.peek(1).unwrap(), stack.peek(3).unwrap()),
        Instruction::CALL | Instruction::CALLCODE => state
            .memory
            .check_write_range(stack.peek(5).unwrap(), stack.peek(6).unwrap()),
        Instruction::DELEGATECALL => state
            .memory
            .check_write_range(stack.peek(4).unwrap(), stack.peek(5).unwrap()),
        _ => Ok(()),
    }
}
