//! VM errors

use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Errors local to a single frame. Any of these terminates the frame,
/// consumes its remaining gas and reverts its state checkpoint; the
/// parent frame observes a `0` pushed on its stack and continues.
pub enum FrameError {
    /// Not enough gas to continue execution.
    OutOfGas,
    /// Popped an empty stack.
    StackUnderflow,
    /// Pushed more than 1024 items to the stack.
    StackOverflow,
    /// The byte under the program counter is not a valid opcode.
    InvalidOpcode,
    /// JUMP/JUMPI target is not a valid jump destination.
    InvalidJump,
    /// A memory range operand wraps the 256-bit address space.
    InvalidRange,
    /// Reserved. There are no static call contexts under these rules,
    /// so this error is never raised.
    StaticStateChange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Failure reported by the backing trie or its database.
pub struct TrieError(pub Cow<'static, str>);

impl TrieError {
    pub fn new<M: Into<Cow<'static, str>>>(msg: M) -> Self {
        TrieError(msg.into())
    }
}

impl fmt::Display for TrieError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "trie error: {}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Host-level failures. These are not on-chain errors: they abandon
/// the whole transaction and surface to the caller, who decides
/// whether to retry or drop it.
pub enum InternalError {
    /// The memory index is too large for this implementation to
    /// represent.
    MemoryIndexNotSupported,
    /// The world-state store failed underneath the VM.
    Trie(TrieError),
}

impl From<TrieError> for InternalError {
    fn from(val: TrieError) -> InternalError {
        InternalError::Trie(val)
    }
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InternalError::MemoryIndexNotSupported => write!(f, "memory index not supported"),
            InternalError::Trie(err) => err.fmt(f),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Errors when trying to validate a transaction before execution.
pub enum PreExecutionError {
    /// Nonce of the caller does not equal the transaction nonce.
    InvalidNonce,
    /// Balance of the caller does not cover value plus the gas
    /// purchase.
    InsufficientBalance,
    /// Gas limit is smaller than the intrinsic gas required.
    InsufficientGasLimit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Errors from applying a single transaction.
pub enum TransactionError {
    /// The transaction failed validation and was not executed.
    PreExecution(PreExecutionError),
    /// A host-level failure; the transaction is abandoned.
    Internal(InternalError),
}

impl From<PreExecutionError> for TransactionError {
    fn from(val: PreExecutionError) -> TransactionError {
        TransactionError::PreExecution(val)
    }
}

impl From<InternalError> for TransactionError {
    fn from(val: InternalError) -> TransactionError {
        TransactionError::Internal(val)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Block-level failures.
pub enum BlockError {
    /// The computed state root does not match the header.
    InvalidStateRoot,
    /// The computed receipts root does not match the header.
    InvalidReceiptTrie,
    /// The computed log bloom does not match the header.
    InvalidBloom,
    /// The computed gas usage does not match the header.
    InvalidGasUsed,
    /// A transaction's gas limit does not fit in the block gas limit.
    TxGasLimitExceedsBlock,
    /// A transaction inside the block failed.
    Transaction(usize, TransactionError),
    /// A host-level failure outside any transaction.
    Internal(InternalError),
}

impl From<InternalError> for BlockError {
    fn from(val: InternalError) -> BlockError {
        BlockError::Internal(val)
    }
}

impl fmt::Display for BlockError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BlockError::InvalidStateRoot => write!(f, "invalid stateRoot"),
            BlockError::InvalidReceiptTrie => write!(f, "invalid receiptTrie"),
            BlockError::InvalidBloom => write!(f, "invalid bloom"),
            BlockError::InvalidGasUsed => write!(f, "invalid gasUsed"),
            BlockError::TxGasLimitExceedsBlock => {
                write!(f, "tx has a higher gas limit than the block")
            }
            BlockError::Transaction(index, _) => write!(f, "transaction {} failed", index),
            BlockError::Internal(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for BlockError {}
