//! Patch of a VM, pinning the hard-fork rules in force.

use primitive_types::U256;

/// Block-range specific VM behavior. All implementations here are
/// zero-sized; the methods are compile-time constants for the fork in
/// question.
pub trait Patch {
    /// Limit of the call stack.
    fn callstack_limit() -> usize;
    /// Maximum size of deployed contract code, if any.
    fn code_deposit_limit() -> Option<usize>;
    /// Maximum size of the memory, in bytes.
    fn memory_limit() -> usize;
    /// Gas paid for EXTCODESIZE and EXTCODECOPY.
    fn gas_extcode() -> U256;
    /// Gas paid for the BALANCE opcode.
    fn gas_balance() -> U256;
    /// Gas paid for the SLOAD opcode.
    fn gas_sload() -> U256;
    /// Gas paid for the SUICIDE opcode.
    fn gas_suicide() -> U256;
    /// Gas paid for the CALL opcode.
    fn gas_call() -> U256;
    /// Gas paid per byte of the EXP exponent.
    fn gas_expbyte() -> U256;
    /// Gas paid on top of the base fee by a contract-creation
    /// transaction.
    fn gas_transaction_create() -> U256;
    /// Whether an out-of-gas code deposit stores empty code instead
    /// of failing the creation.
    fn force_code_deposit() -> bool;
    /// Whether the DELEGATECALL opcode exists.
    fn has_delegate_call() -> bool;
    /// Whether a child call receives at most 63/64 of the remaining
    /// gas.
    fn call_create_l64_after_gas() -> bool;
}

/// The Homestead rules.
#[derive(Debug, Default, Copy, Clone)]
pub struct HomesteadPatch;

#[rustfmt::skip]
impl Patch for HomesteadPatch {
    fn callstack_limit() -> usize { 1024 }
    fn code_deposit_limit() -> Option<usize> { Some(24576) }
    fn memory_limit() -> usize { usize::MAX }
    fn gas_extcode() -> U256 { U256([20, 0, 0, 0]) }
    fn gas_balance() -> U256 { U256([20, 0, 0, 0]) }
    fn gas_sload() -> U256 { U256([50, 0, 0, 0]) }
    fn gas_suicide() -> U256 { U256::zero() }
    fn gas_call() -> U256 { U256([40, 0, 0, 0]) }
    fn gas_expbyte() -> U256 { U256([10, 0, 0, 0]) }
    fn gas_transaction_create() -> U256 { U256([32000, 0, 0, 0]) }
    fn force_code_deposit() -> bool { false }
    fn has_delegate_call() -> bool { true }
    fn call_create_l64_after_gas() -> bool { true }
}

/// The Frontier rules.
#[derive(Debug, Default, Copy, Clone)]
pub struct FrontierPatch;

#[rustfmt::skip]
impl Patch for FrontierPatch {
    fn callstack_limit() -> usize { 1024 }
    fn code_deposit_limit() -> Option<usize> { None }
    fn memory_limit() -> usize { usize::MAX }
    fn gas_extcode() -> U256 { U256([20, 0, 0, 0]) }
    fn gas_balance() -> U256 { U256([20, 0, 0, 0]) }
    fn gas_sload() -> U256 { U256([50, 0, 0, 0]) }
    fn gas_suicide() -> U256 { U256::zero() }
    fn gas_call() -> U256 { U256([40, 0, 0, 0]) }
    fn gas_expbyte() -> U256 { U256([10, 0, 0, 0]) }
    fn gas_transaction_create() -> U256 { U256::zero() }
    fn force_code_deposit() -> bool { true }
    fn has_delegate_call() -> bool { false }
    fn call_create_l64_after_gas() -> bool { false }
}
