//! Transaction-level execution: up-front gas purchase, nonce
//! accounting, the inner call or creation, and fee settlement.

use std::cmp::min;
use std::rc::Rc;

use log::debug;
use primitive_types::{H160, U256};

use crate::errors::{InternalError, PreExecutionError, TransactionError};
use crate::eval::{Runtime, StepRecord};
use crate::memory::Memory;
use crate::params::{Context, HeaderParams, Log};
use crate::patch::Patch;
use crate::state::StateManager;
use crate::trie::Database;
use crate::util::create_address;
use crate::vm::{ContextVM, VMStatus};

const G_TXDATAZERO: u64 = 4;
const G_TXDATANONZERO: u64 = 68;
const G_TRANSACTION: u64 = 21000;

/// What a transaction does: call an existing account or create a new
/// contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionAction {
    /// Message call to the given address.
    Call(H160),
    /// Contract creation; the input is the init code.
    Create,
}

impl TransactionAction {
    /// The address the transaction executes at.
    pub fn address(&self, caller: H160, nonce: u64) -> H160 {
        match self {
            TransactionAction::Call(to) => *to,
            TransactionAction::Create => create_address(caller, nonce),
        }
    }
}

/// A transaction that has passed signature recovery; execution-level
/// validity is checked against the state before it runs.
#[derive(Debug, Clone)]
pub struct ValidTransaction {
    /// Caller of the transaction.
    pub caller: H160,
    /// Gas price in wei per gas.
    pub gas_price: U256,
    /// Gas limit of the transaction.
    pub gas_limit: U256,
    /// Call or creation.
    pub action: TransactionAction,
    /// Value sent with the transaction.
    pub value: U256,
    /// Call data, or init code for a creation.
    pub input: Rc<Vec<u8>>,
    /// Nonce of the transaction.
    pub nonce: u64,
}

impl ValidTransaction {
    /// Gas paid up front, before any code runs: the base transaction
    /// fee, the per-byte data fee, and the creation surcharge.
    pub fn intrinsic_gas<P: Patch>(&self) -> U256 {
        let mut gas = U256::from(G_TRANSACTION);

        if self.action == TransactionAction::Create {
            gas = gas + P::gas_transaction_create();
        }

        for byte in self.input.iter() {
            if *byte == 0 {
                gas = gas + U256::from(G_TXDATAZERO);
            } else {
                gas = gas + U256::from(G_TXDATANONZERO);
            }
        }

        gas
    }

    /// The wei deducted from the caller before execution to pay for
    /// gas, returned pro rata afterwards.
    pub fn preclaimed_value(&self) -> Option<U256> {
        self.gas_limit.checked_mul(self.gas_price)
    }

    /// Check the transaction against the current state: nonce match,
    /// balance coverage, and intrinsic gas fitting the limit.
    pub fn validate<P: Patch, D: Database>(
        &self,
        handle: &mut StateManager<D>,
    ) -> Result<(), TransactionError> {
        let nonce = handle.get_nonce(self.caller).map_err(InternalError::from)?;
        if nonce != self.nonce {
            return Err(PreExecutionError::InvalidNonce.into());
        }

        let total = self
            .preclaimed_value()
            .and_then(|preclaimed| preclaimed.checked_add(self.value))
            .ok_or(PreExecutionError::InsufficientBalance)?;
        let balance = handle
            .get_balance(self.caller)
            .map_err(InternalError::from)?;
        if balance < total {
            return Err(PreExecutionError::InsufficientBalance.into());
        }

        if self.gas_limit < self.intrinsic_gas::<P>() {
            return Err(PreExecutionError::InsufficientGasLimit.into());
        }

        Ok(())
    }
}

/// A VM that applies one transaction against the world state.
pub struct TransactionVM<M, P: Patch> {
    transaction: ValidTransaction,
    runtime: Option<Runtime>,
    vm: Option<ContextVM<M, P>>,
    used_gas: U256,
}

impl<M: Memory + Default, P: Patch> TransactionVM<M, P> {
    /// Create a VM for the given transaction under the given block.
    pub fn new(transaction: ValidTransaction, block: HeaderParams) -> Self {
        TransactionVM {
            transaction,
            runtime: Some(Runtime::new(block)),
            vm: None,
            used_gas: U256::zero(),
        }
    }

    /// Install a per-opcode trace hook. Only effective before `fire`.
    pub fn on_step<F: Fn(&StepRecord) + 'static>(&mut self, hook: F) {
        if let Some(runtime) = self.runtime.as_mut() {
            runtime.step_hooks.push(Box::new(hook));
        }
    }

    /// The transaction this VM applies.
    pub fn transaction(&self) -> &ValidTransaction {
        &self.transaction
    }

    /// Run the transaction to completion. On success the returned
    /// status tells whether the inner execution succeeded or was
    /// reverted; either way fees have been settled. A
    /// [TransactionError] means the state carries no trace of the
    /// transaction beyond pre-validation reads.
    pub fn fire<D: Database>(
        &mut self,
        handle: &mut StateManager<D>,
    ) -> Result<VMStatus, TransactionError> {
        let runtime = self
            .runtime
            .take()
            .expect("transaction was already executed");
        let tx = self.transaction.clone();

        tx.validate::<P, D>(handle)?;

        let beneficiary = runtime.block.beneficiary;
        let address = tx.action.address(tx.caller, tx.nonce);
        let intrinsic = tx.intrinsic_gas::<P>();
        let preclaimed = tx
            .preclaimed_value()
            .expect("validated against overflow above");

        handle
            .warm(&[tx.caller, address, beneficiary])
            .map_err(InternalError::from)?;

        // The nonce bump and the gas purchase precede execution and
        // survive a reverted inner frame.
        handle.increment_nonce(tx.caller).map_err(InternalError::from)?;
        handle
            .sub_balance(tx.caller, preclaimed)
            .map_err(InternalError::from)?;

        let (code, data) = match tx.action {
            TransactionAction::Call(to) => {
                let code = handle.get_code(to).map_err(InternalError::from)?;
                (code, tx.input.clone())
            }
            TransactionAction::Create => (tx.input.clone(), Rc::new(Vec::new())),
        };

        let context = Context {
            address,
            caller: tx.caller,
            origin: tx.caller,
            code,
            data,
            gas_limit: tx.gas_limit - intrinsic,
            gas_price: tx.gas_price,
            value: tx.value,
            apparent_value: tx.value,
        };

        handle.checkpoint();
        let transfer = handle
            .sub_balance(tx.caller, tx.value)
            .and_then(|_| handle.add_balance(address, tx.value));
        if let Err(err) = transfer {
            handle.revert();
            return Err(InternalError::from(err).into());
        }

        let mut vm = ContextVM::<M, P>::with_runtime(context, runtime);
        if let Err(err) = vm.fire(handle) {
            handle.revert();
            self.vm = Some(vm);
            return Err(err.into());
        }

        if tx.action == TransactionAction::Create {
            vm.machine_mut().code_deposit(handle);
        }

        let status = vm.status();
        match status {
            VMStatus::ExitedOk => handle.commit(),
            VMStatus::ExitedErr(_) => handle.revert(),
            VMStatus::ExitedFatal(err) => {
                handle.revert();
                self.vm = Some(vm);
                return Err(InternalError::from(err).into());
            }
            VMStatus::Running => unreachable!("fire drove the VM to completion"),
        }

        // Refunds are capped at half of what was spent and are only
        // worth anything on the successful path.
        let total_used = vm.used_gas().saturating_add(intrinsic);
        let refunded = min(total_used / U256::from(2u64), vm.refunded_gas());
        let real_used = total_used - refunded;

        debug!(
            target: "vm",
            "transaction used {} gas ({} refunded)", real_used, refunded
        );

        handle
            .add_balance(tx.caller, (tx.gas_limit - real_used) * tx.gas_price)
            .map_err(InternalError::from)?;
        handle
            .add_balance(beneficiary, real_used * tx.gas_price)
            .map_err(InternalError::from)?;

        if let VMStatus::ExitedOk = status {
            let suicides: Vec<H160> = vm.suicides().map(|(address, _)| address).collect();
            for address in suicides {
                handle.delete_account(address);
            }
        }

        self.used_gas = real_used;
        self.vm = Some(vm);
        Ok(status)
    }

    /// Gas charged to the caller, after the refund.
    pub fn used_gas(&self) -> U256 {
        self.used_gas
    }

    /// Return data of the top-level frame.
    pub fn out(&self) -> &[u8] {
        self.vm.as_ref().map(|vm| vm.out()).unwrap_or(&[])
    }

    /// Logs emitted by the transaction.
    pub fn logs(&self) -> &[Log] {
        self.vm.as_ref().map(|vm| vm.logs()).unwrap_or(&[])
    }

    /// Status of the inner execution.
    pub fn status(&self) -> VMStatus {
        self.vm
            .as_ref()
            .map(|vm| vm.status())
            .unwrap_or(VMStatus::Running)
    }
}
