//! Program counter and jump-destination analysis.

use std::cmp::min;
use std::marker::PhantomData;

use primitive_types::U256;

use crate::errors::FrameError;
use crate::opcode::Opcode;
use crate::patch::Patch;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[allow(missing_docs)]
/// A decoded instruction. This is the same as `Opcode` except that
/// `PUSH` carries its immediate value.
pub enum Instruction {
    STOP, ADD, MUL, SUB, DIV, SDIV, MOD, SMOD, ADDMOD, MULMOD, EXP,
    SIGNEXTEND, LT, GT, SLT, SGT, EQ, ISZERO, AND, OR, XOR, NOT, BYTE,
    SHA3, ADDRESS, BALANCE, ORIGIN, CALLER, CALLVALUE, CALLDATALOAD,
    CALLDATASIZE, CALLDATACOPY, CODESIZE, CODECOPY, GASPRICE,
    EXTCODESIZE, EXTCODECOPY, BLOCKHASH, COINBASE, TIMESTAMP, NUMBER,
    DIFFICULTY, GASLIMIT, POP, MLOAD, MSTORE, MSTORE8, SLOAD, SSTORE,
    JUMP, JUMPI, PC, MSIZE, GAS, JUMPDEST, CREATE, CALL, CALLCODE,
    RETURN, DELEGATECALL, SUICIDE,

    PUSH(U256),
    DUP(usize),
    SWAP(usize),
    LOG(usize),
}

/// Valid jump destinations of a code byte string: positions holding a
/// `JUMPDEST` byte that are not inside `PUSH` immediate data.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Valids(Vec<bool>);

impl Valids {
    /// Scan the code once and build the valid jump destination map.
    pub fn new(code: &[u8]) -> Self {
        let mut valids: Vec<bool> = Vec::with_capacity(code.len());
        valids.resize(code.len(), false);

        let mut i = 0;
        while i < code.len() {
            let opcode = Opcode(code[i]);
            if opcode == Opcode::JUMPDEST {
                valids[i] = true;
                i += 1;
            } else if let Some(v) = opcode.is_push() {
                i += v + 1;
            } else {
                i += 1;
            }
        }

        Valids(valids)
    }

    /// Returns `true` if the position is a valid jump destination.
    pub fn is_valid(&self, position: usize) -> bool {
        if position >= self.0.len() {
            return false;
        }

        self.0[position]
    }
}

/// Read the big-endian `PUSH` immediate starting at `position`,
/// reading zero for any byte past the end of code.
fn read_push(code: &[u8], position: usize, count: usize) -> U256 {
    let end = min(position + count, code.len());
    let mut val = [0u8; 32];
    if position < end {
        val[(32 - count)..(32 - count + end - position)].copy_from_slice(&code[position..end]);
    }
    U256::from_big_endian(&val)
}

fn decode<P: Patch>(code: &[u8], position: usize) -> Result<Instruction, FrameError> {
    let opcode = Opcode(code[position]);
    if let Some(v) = opcode.is_push() {
        return Ok(Instruction::PUSH(read_push(code, position + 1, v)));
    }
    if opcode >= Opcode::DUP1 && opcode <= Opcode::DUP16 {
        return Ok(Instruction::DUP((opcode.0 - Opcode::DUP1.0) as usize + 1));
    }
    if opcode >= Opcode::SWAP1 && opcode <= Opcode::SWAP16 {
        return Ok(Instruction::SWAP((opcode.0 - Opcode::SWAP1.0) as usize + 1));
    }
    if opcode >= Opcode::LOG0 && opcode <= Opcode::LOG4 {
        return Ok(Instruction::LOG((opcode.0 - Opcode::LOG0.0) as usize));
    }

    Ok(match opcode {
        Opcode::STOP => Instruction::STOP,
        Opcode::ADD => Instruction::ADD,
        Opcode::MUL => Instruction::MUL,
        Opcode::SUB => Instruction::SUB,
        Opcode::DIV => Instruction::DIV,
        Opcode::SDIV => Instruction::SDIV,
        Opcode::MOD => Instruction::MOD,
        Opcode::SMOD => Instruction::SMOD,
        Opcode::ADDMOD => Instruction::ADDMOD,
        Opcode::MULMOD => Instruction::MULMOD,
        Opcode::EXP => Instruction::EXP,
        Opcode::SIGNEXTEND => Instruction::SIGNEXTEND,

        Opcode::LT => Instruction::LT,
        Opcode::GT => Instruction::GT,
        Opcode::SLT => Instruction::SLT,
        Opcode::SGT => Instruction::SGT,
        Opcode::EQ => Instruction::EQ,
        Opcode::ISZERO => Instruction::ISZERO,
        Opcode::AND => Instruction::AND,
        Opcode::OR => Instruction::OR,
        Opcode::XOR => Instruction::XOR,
        Opcode::NOT => Instruction::NOT,
        Opcode::BYTE => Instruction::BYTE,

        Opcode::SHA3 => Instruction::SHA3,

        Opcode::ADDRESS => Instruction::ADDRESS,
        Opcode::BALANCE => Instruction::BALANCE,
        Opcode::ORIGIN => Instruction::ORIGIN,
        Opcode::CALLER => Instruction::CALLER,
        Opcode::CALLVALUE => Instruction::CALLVALUE,
        Opcode::CALLDATALOAD => Instruction::CALLDATALOAD,
        Opcode::CALLDATASIZE => Instruction::CALLDATASIZE,
        Opcode::CALLDATACOPY => Instruction::CALLDATACOPY,
        Opcode::CODESIZE => Instruction::CODESIZE,
        Opcode::CODECOPY => Instruction::CODECOPY,
        Opcode::GASPRICE => Instruction::GASPRICE,
        Opcode::EXTCODESIZE => Instruction::EXTCODESIZE,
        Opcode::EXTCODECOPY => Instruction::EXTCODECOPY,

        Opcode::BLOCKHASH => Instruction::BLOCKHASH,
        Opcode::COINBASE => Instruction::COINBASE,
        Opcode::TIMESTAMP => Instruction::TIMESTAMP,
        Opcode::NUMBER => Instruction::NUMBER,
        Opcode::DIFFICULTY => Instruction::DIFFICULTY,
        Opcode::GASLIMIT => Instruction::GASLIMIT,

        Opcode::POP => Instruction::POP,
        Opcode::MLOAD => Instruction::MLOAD,
        Opcode::MSTORE => Instruction::MSTORE,
        Opcode::MSTORE8 => Instruction::MSTORE8,
        Opcode::SLOAD => Instruction::SLOAD,
        Opcode::SSTORE => Instruction::SSTORE,
        Opcode::JUMP => Instruction::JUMP,
        Opcode::JUMPI => Instruction::JUMPI,
        Opcode::PC => Instruction::PC,
        Opcode::MSIZE => Instruction::MSIZE,
        Opcode::GAS => Instruction::GAS,
        Opcode::JUMPDEST => Instruction::JUMPDEST,

        Opcode::CREATE => Instruction::CREATE,
        Opcode::CALL => Instruction::CALL,
        Opcode::CALLCODE => Instruction::CALLCODE,
        Opcode::RETURN => Instruction::RETURN,
        Opcode::DELEGATECALL => {
            if P::has_delegate_call() {
                Instruction::DELEGATECALL
            } else {
                return Err(FrameError::InvalidOpcode);
            }
        }
        Opcode::SUICIDE => Instruction::SUICIDE,

        _ => return Err(FrameError::InvalidOpcode),
    })
}

/// A read-only view of the program counter.
pub struct PC<'a, P: Patch> {
    position: &'a usize,
    code: &'a [u8],
    valids: &'a Valids,
    _patch: PhantomData<P>,
}

impl<'a, P: Patch> PC<'a, P> {
    /// Create a new program counter view over the given code.
    pub fn new(code: &'a [u8], valids: &'a Valids, position: &'a usize) -> Self {
        Self {
            code,
            valids,
            position,
            _patch: PhantomData,
        }
    }

    /// Current position.
    pub fn position(&self) -> usize {
        *self.position
    }

    /// Returns `true` if the position is a valid jump destination.
    pub fn is_valid(&self, position: usize) -> bool {
        self.valids.is_valid(position)
    }

    /// Whether the program counter has run past the end of code. The
    /// frame stops normally in that case.
    pub fn is_end(&self) -> bool {
        *self.position >= self.code.len()
    }

    /// Peek the instruction under the cursor without advancing.
    pub fn peek(&self) -> Result<Instruction, FrameError> {
        if *self.position >= self.code.len() {
            return Err(FrameError::InvalidOpcode);
        }
        decode::<P>(self.code, *self.position)
    }
}

/// A mutable program counter that can advance and jump.
pub struct PCMut<'a, P: Patch> {
    position: &'a mut usize,
    code: &'a [u8],
    valids: &'a Valids,
    _patch: PhantomData<P>,
}

impl<'a, P: Patch> PCMut<'a, P> {
    /// Create a new mutable program counter over the given code.
    pub fn new(code: &'a [u8], valids: &'a Valids, position: &'a mut usize) -> Self {
        Self {
            code,
            valids,
            position,
            _patch: PhantomData,
        }
    }

    /// Jump to a position in the code. The destination must be a
    /// valid jump destination.
    pub fn jump(&mut self, position: usize) -> Result<(), FrameError> {
        if position >= self.code.len() || !self.valids.is_valid(position) {
            return Err(FrameError::InvalidJump);
        }

        *self.position = position;
        Ok(())
    }

    /// Read the instruction under the cursor and advance past it and
    /// any immediate data.
    pub fn read(&mut self) -> Result<Instruction, FrameError> {
        if *self.position >= self.code.len() {
            return Err(FrameError::InvalidOpcode);
        }
        let result = decode::<P>(self.code, *self.position)?;
        let opcode = Opcode(self.code[*self.position]);
        match opcode.is_push() {
            Some(v) => {
                *self.position = min(*self.position + v + 1, self.code.len());
            }
            None => {
                *self.position += 1;
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::HomesteadPatch;

    #[test]
    fn valids_skip_push_data() {
        // PUSH2 0x5b5b JUMPDEST
        let code = [0x61, 0x5b, 0x5b, 0x5b];
        let valids = Valids::new(&code);
        assert!(!valids.is_valid(1));
        assert!(!valids.is_valid(2));
        assert!(valids.is_valid(3));
        assert!(!valids.is_valid(4));
    }

    #[test]
    fn push_truncated_reads_zero() {
        // PUSH2 with a single remaining byte: high byte read, low byte zero.
        let code = [0x61, 0xff];
        let valids = Valids::new(&code);
        let position = 0;
        let pc = PC::<HomesteadPatch>::new(&code, &valids, &position);
        assert_eq!(
            pc.peek().unwrap(),
            Instruction::PUSH(U256::from(0xff00u64))
        );
    }

    #[test]
    fn read_advances_past_immediates() {
        let code = [0x60, 0x01, 0x60, 0x02, 0x01];
        let valids = Valids::new(&code);
        let mut position = 0;
        let mut pc = PCMut::<HomesteadPatch>::new(&code, &valids, &mut position);
        assert_eq!(pc.read().unwrap(), Instruction::PUSH(U256::one()));
        assert_eq!(pc.read().unwrap(), Instruction::PUSH(U256::from(2u64)));
        assert_eq!(pc.read().unwrap(), Instruction::ADD);
        assert!(PC::<HomesteadPatch>::new(&code, &valids, &position).is_end());
    }
}
