//! Block-level execution: sequential transactions, receipts, reward
//! payout, and header validation.

use std::marker::PhantomData;

use log::debug;
use primitive_types::{H160, H256, U256};
use rlp::{Encodable, RlpStream};

use crate::bloom::LogsBloom;
use crate::errors::{BlockError, InternalError};
use crate::memory::Memory;
use crate::params::{HeaderParams, Log};
use crate::patch::Patch;
use crate::state::StateManager;
use crate::transaction::{TransactionVM, ValidTransaction};
use crate::trie::{Database, MemoryTrie, Trie};
use crate::vm::VMStatus;

const BLOCK_REWARD_WEI: u64 = 5_000_000_000_000_000_000;

fn block_reward() -> U256 {
    U256::from(BLOCK_REWARD_WEI)
}

/// An ommer included in a block.
#[derive(Debug, Clone)]
pub struct OmmerParams {
    /// Beneficiary of the ommer.
    pub beneficiary: H160,
    /// Block number the ommer was mined at.
    pub number: U256,
}

/// Everything needed to execute or validate one block.
#[derive(Debug, Clone, Default)]
pub struct BlockParams {
    /// Header parameters of the block.
    pub header: HeaderParams,
    /// Included ommers.
    pub ommers: Vec<OmmerParams>,
    /// Claimed post-state root, checked when validating.
    pub state_root: H256,
    /// Claimed receipts root, checked when validating.
    pub receipts_root: H256,
    /// Claimed log bloom, checked when validating.
    pub logs_bloom: LogsBloom,
    /// Claimed total gas usage, checked when validating.
    pub gas_used: U256,
}

/// A transaction receipt, carrying the intermediate state root as
/// receipts did before the Byzantium fork.
#[derive(Debug, Clone)]
pub struct Receipt {
    /// State root after the transaction.
    pub state_root: H256,
    /// Cumulative gas used in the block up to and including this
    /// transaction.
    pub gas_used: U256,
    /// Bloom over this transaction's logs.
    pub logs_bloom: LogsBloom,
    /// Logs emitted by the transaction.
    pub logs: Vec<Log>,
}

impl Encodable for Receipt {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(4);
        s.append(&self.state_root);
        s.append(&self.gas_used);
        s.append(&self.logs_bloom);
        s.append_list(&self.logs);
    }
}

/// Result of executing a block.
#[derive(Debug)]
pub struct BlockOutcome {
    /// Per-transaction receipts, in order.
    pub receipts: Vec<Receipt>,
    /// OR of all per-transaction blooms.
    pub logs_bloom: LogsBloom,
    /// Total gas used by the block.
    pub gas_used: U256,
    /// State root after transactions and rewards.
    pub state_root: H256,
    /// Root over the receipts.
    pub receipts_root: H256,
}

type BlockHook = Box<dyn Fn(&BlockParams)>;
type OutcomeHook = Box<dyn Fn(&BlockOutcome)>;
type TransactionHook = Box<dyn Fn(usize, &ValidTransaction)>;
type TransactionDoneHook = Box<dyn Fn(usize, &VMStatus, U256)>;

/// A VM applying whole blocks, with lifecycle hooks.
pub struct BlockVM<M, P: Patch> {
    before_block: Vec<BlockHook>,
    after_block: Vec<OutcomeHook>,
    before_transaction: Vec<TransactionHook>,
    after_transaction: Vec<TransactionDoneHook>,
    _marker: PhantomData<(M, P)>,
}

impl<M, P: Patch> Default for BlockVM<M, P> {
    fn default() -> Self {
        BlockVM {
            before_block: Vec::new(),
            after_block: Vec::new(),
            before_transaction: Vec::new(),
            after_transaction: Vec::new(),
            _marker: PhantomData,
        }
    }
}

impl<M: Memory + Default, P: Patch> BlockVM<M, P> {
    /// Create a block VM with no hooks installed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run before any transaction of a block.
    pub fn on_before_block<F: Fn(&BlockParams) + 'static>(&mut self, hook: F) {
        self.before_block.push(Box::new(hook));
    }

    /// Run after rewards and the final flush.
    pub fn on_after_block<F: Fn(&BlockOutcome) + 'static>(&mut self, hook: F) {
        self.after_block.push(Box::new(hook));
    }

    /// Run before each transaction, with its index.
    pub fn on_before_transaction<F: Fn(usize, &ValidTransaction) + 'static>(&mut self, hook: F) {
        self.before_transaction.push(Box::new(hook));
    }

    /// Run after each transaction with its status and gas usage.
    pub fn on_after_transaction<F: Fn(usize, &VMStatus, U256) + 'static>(&mut self, hook: F) {
        self.after_transaction.push(Box::new(hook));
    }

    /// Execute every transaction of the block in order, pay rewards,
    /// and either report the resulting roots (`generate`) or check
    /// them against the claimed header values.
    pub fn fire<D: Database>(
        &self,
        handle: &mut StateManager<D>,
        block: &BlockParams,
        transactions: &[ValidTransaction],
        generate: bool,
    ) -> Result<BlockOutcome, BlockError> {
        for hook in &self.before_block {
            hook(block);
        }

        let mut cumulative_gas = U256::zero();
        let mut logs_bloom = LogsBloom::default();
        let mut receipts = Vec::new();
        let mut receipts_trie = MemoryTrie::default();

        for (index, transaction) in transactions.iter().enumerate() {
            if transaction.gas_limit > block.header.gas_limit - cumulative_gas {
                return Err(BlockError::TxGasLimitExceedsBlock);
            }

            for hook in &self.before_transaction {
                hook(index, transaction);
            }

            let mut vm = TransactionVM::<M, P>::new(transaction.clone(), block.header.clone());
            let status = vm
                .fire(handle)
                .map_err(|err| BlockError::Transaction(index, err))?;

            cumulative_gas = cumulative_gas + vm.used_gas();
            let state_root = handle.flush().map_err(InternalError::from)?;

            let transaction_bloom = LogsBloom::from_logs(vm.logs());
            logs_bloom.or(&transaction_bloom);

            let receipt = Receipt {
                state_root,
                gas_used: cumulative_gas,
                logs_bloom: transaction_bloom,
                logs: vm.logs().to_vec(),
            };
            receipts_trie
                .put(rlp::encode(&index).to_vec(), rlp::encode(&receipt).to_vec())
                .map_err(InternalError::from)?;

            debug!(
                target: "vm",
                "transaction {} done, cumulative gas {}", index, cumulative_gas
            );
            for hook in &self.after_transaction {
                hook(index, &status, vm.used_gas());
            }
            receipts.push(receipt);
        }

        self.apply_rewards(handle, block)?;
        let state_root = handle.flush().map_err(InternalError::from)?;

        let outcome = BlockOutcome {
            receipts,
            logs_bloom,
            gas_used: cumulative_gas,
            state_root,
            receipts_root: receipts_trie.root(),
        };

        if !generate {
            if outcome.state_root != block.state_root {
                return Err(BlockError::InvalidStateRoot);
            }
            if outcome.receipts_root != block.receipts_root {
                return Err(BlockError::InvalidReceiptTrie);
            }
            if outcome.logs_bloom != block.logs_bloom {
                return Err(BlockError::InvalidBloom);
            }
            if outcome.gas_used != block.gas_used {
                return Err(BlockError::InvalidGasUsed);
            }
        }

        for hook in &self.after_block {
            hook(&outcome);
        }
        Ok(outcome)
    }

    /// Pay the miner the base reward plus a nibling bonus per ommer,
    /// and each ommer beneficiary a reward shrinking with distance.
    fn apply_rewards<D: Database>(
        &self,
        handle: &mut StateManager<D>,
        block: &BlockParams,
    ) -> Result<(), BlockError> {
        let reward = block_reward();
        let nibling = reward / U256::from(32u64);

        let miner_reward = reward + nibling * U256::from(block.ommers.len());
        handle
            .add_balance(block.header.beneficiary, miner_reward)
            .map_err(InternalError::from)?;

        for ommer in &block.ommers {
            let distance = block.header.number - ommer.number;
            if distance < U256::from(8u64) {
                let ommer_reward = reward * (U256::from(8u64) - distance) / U256::from(8u64);
                handle
                    .add_balance(ommer.beneficiary, ommer_reward)
                    .map_err(InternalError::from)?;
            }
        }

        Ok(())
    }
}
