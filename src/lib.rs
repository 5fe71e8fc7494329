//! A gas-metered Ethereum Virtual Machine pinned to the Homestead
//! rules, with a journaled world-state store over a pluggable trie.
//!
//! The three layers, from the inside out:
//!
//! - [ContextVM] executes bytecode in a prepared [Context], driving a
//!   stack of frames through CALL-family and CREATE invocations, each
//!   inside its own state checkpoint.
//! - [TransactionVM] applies one [ValidTransaction]: the up-front gas
//!   purchase, the inner call or creation, refunds, and fees.
//! - [BlockVM] applies whole blocks: transactions in order, receipts,
//!   rewards, and header validation.
//!
//! World state lives in a [StateManager] over any [Database] of
//! [Trie]s; [MemoryDatabase] is the in-memory implementation.

#![deny(unused_must_use, unreachable_code, non_shorthand_field_patterns)]

pub mod account;
pub mod block;
pub mod bloom;
pub mod errors;
pub mod eval;
pub mod memory;
pub mod opcode;
pub mod params;
pub mod patch;
pub mod pc;
pub mod stack;
pub mod state;
pub mod transaction;
pub mod trie;
pub mod util;
pub mod vm;

pub use crate::account::Account;
pub use crate::block::{BlockOutcome, BlockParams, BlockVM, OmmerParams, Receipt};
pub use crate::bloom::LogsBloom;
pub use crate::errors::{
    BlockError, FrameError, InternalError, PreExecutionError, TransactionError, TrieError,
};
pub use crate::eval::{GasUsage, Machine, MachineStatus, Runtime, State, StepRecord};
pub use crate::memory::{Memory, SeqMemory};
pub use crate::opcode::Opcode;
pub use crate::params::{Context, HeaderParams, Log};
pub use crate::patch::{FrontierPatch, HomesteadPatch, Patch};
pub use crate::pc::{Instruction, Valids};
pub use crate::stack::Stack;
pub use crate::state::StateManager;
pub use crate::transaction::{TransactionAction, TransactionVM, ValidTransaction};
pub use crate::trie::{empty_trie_root, Database, MemoryDatabase, MemoryTrie, Trie};
pub use crate::util::create_address;
pub use crate::vm::{ContextVM, VMStatus};

/// A [ContextVM] over the default sequential memory.
pub type SeqContextVM<P> = ContextVM<SeqMemory<P>, P>;
/// A [TransactionVM] over the default sequential memory.
pub type SeqTransactionVM<P> = TransactionVM<SeqMemory<P>, P>;
/// A [BlockVM] over the default sequential memory.
pub type SeqBlockVM<P> = BlockVM<SeqMemory<P>, P>;
