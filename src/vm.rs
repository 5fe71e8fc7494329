//! The frame-stack driver: runs one message call or creation to
//! completion, recursing through CALL-family and CREATE invocations.

use log::debug;
use primitive_types::{H160, U256};

use crate::errors::{FrameError, InternalError};
use crate::eval::{Machine, MachineStatus, Runtime};
use crate::memory::Memory;
use crate::params::{Context, HeaderParams, Log};
use crate::patch::Patch;
use crate::state::StateManager;
use crate::trie::Database;

/// Overall status of a VM.
#[derive(Debug, Clone)]
pub enum VMStatus {
    /// The VM is still running.
    Running,
    /// Every frame has exited; the top-level frame succeeded.
    ExitedOk,
    /// Every frame has exited; the top-level frame failed.
    ExitedErr(FrameError),
    /// A host-level failure surfaced; the execution is abandoned.
    ExitedFatal(InternalError),
}

/// A VM executing one context to completion. Sub-frames invoked by
/// the code are pushed onto an internal machine stack; each one runs
/// inside its own state checkpoint, committed on success and
/// reverted on failure. The checkpoint around the top-level frame
/// belongs to the caller; the transaction layer owns it in normal
/// operation.
pub struct ContextVM<M, P: Patch> {
    machines: Vec<Machine<M, P>>,
    runtime: Runtime,
}

impl<M: Memory + Default, P: Patch> ContextVM<M, P> {
    /// Create a new VM over the given context and block.
    pub fn new(context: Context, block: HeaderParams) -> Self {
        Self::with_runtime(context, Runtime::new(block))
    }

    /// Create a new VM with a prepared runtime, keeping any installed
    /// trace hooks.
    pub fn with_runtime(context: Context, runtime: Runtime) -> Self {
        ContextVM {
            machines: vec![Machine::new(context, 0)],
            runtime,
        }
    }

    /// The top-level frame.
    pub fn machine(&self) -> &Machine<M, P> {
        &self.machines[0]
    }

    pub(crate) fn machine_mut(&mut self) -> &mut Machine<M, P> {
        &mut self.machines[0]
    }

    /// Install a per-opcode trace hook.
    pub fn on_step<F: Fn(&crate::eval::StepRecord) + 'static>(&mut self, hook: F) {
        self.runtime.step_hooks.push(Box::new(hook));
    }

    /// Current status, as seen from the top-level frame.
    pub fn status(&self) -> VMStatus {
        match self.machines[0].status() {
            MachineStatus::Running
            | MachineStatus::InvokeCall(_, _)
            | MachineStatus::InvokeCreate(_) => VMStatus::Running,
            MachineStatus::ExitedOk => VMStatus::ExitedOk,
            MachineStatus::ExitedErr(err) => VMStatus::ExitedErr(err),
            MachineStatus::ExitedFatal(err) => VMStatus::ExitedFatal(err),
        }
    }

    /// Run a single step: one instruction of the innermost frame, or
    /// one frame push/pop transition.
    pub fn step<D: Database>(&mut self, handle: &mut StateManager<D>) {
        let status = self
            .machines
            .last()
            .expect("at least one machine is always present")
            .status();

        match status {
            MachineStatus::Running => {
                let runtime = &self.runtime;
                let machine = self.machines.last_mut().expect("checked non-empty above");
                machine.step(handle, runtime);
            }
            MachineStatus::ExitedOk | MachineStatus::ExitedErr(_) | MachineStatus::ExitedFatal(_) => {
                if self.machines.len() <= 1 {
                    return;
                }
                let finished = self.machines.pop().expect("length checked above");
                let parent = self.machines.last_mut().expect("length checked above");
                parent.apply_sub(finished, handle);
            }
            MachineStatus::InvokeCall(context, _) | MachineStatus::InvokeCreate(context) => {
                self.enter_frame(context, handle);
            }
        }
    }

    /// Drive the VM until every frame has exited. A host-level
    /// failure aborts with the error after reverting all live
    /// checkpoints.
    pub fn fire<D: Database>(&mut self, handle: &mut StateManager<D>) -> Result<(), InternalError> {
        loop {
            match self.status() {
                VMStatus::Running => self.step(handle),
                VMStatus::ExitedOk | VMStatus::ExitedErr(_) => return Ok(()),
                VMStatus::ExitedFatal(err) => return Err(err),
            }
        }
    }

    fn enter_frame<D: Database>(&mut self, context: Context, handle: &mut StateManager<D>) {
        debug!(
            target: "vm",
            "entering frame for {:?} at depth {}",
            context.address,
            self.machines.len()
        );

        handle.checkpoint();

        // Debit before credit so that a self-call sees the
        // post-transfer balance.
        let transfer = handle
            .sub_balance(context.caller, context.value)
            .and_then(|_| handle.add_balance(context.address, context.value));
        if let Err(err) = transfer {
            handle.revert();
            let machine = self.machines.last_mut().expect("invoking frame exists");
            machine.set_fatal(err.into());
            return;
        }

        let sub = self
            .machines
            .last()
            .expect("invoking frame exists")
            .derive(context);
        self.machines.push(sub);
    }

    /// Return value of the top-level frame.
    pub fn out(&self) -> &[u8] {
        self.machines[0].state().out.as_slice()
    }

    /// Gas spent by the whole execution, including memory gas.
    pub fn used_gas(&self) -> U256 {
        self.machines[0].state().total_used_gas()
    }

    /// Refund accrued by the whole execution.
    pub fn refunded_gas(&self) -> U256 {
        self.machines[0].state().refunded_gas
    }

    /// Logs emitted on the successful path.
    pub fn logs(&self) -> &[Log] {
        &self.machines[0].state().logs
    }

    /// Contracts scheduled for destruction, with their beneficiaries.
    pub fn suicides(&self) -> impl Iterator<Item = (H160, H160)> + '_ {
        self.machines[0]
            .state()
            .suicides
            .iter()
            .map(|(address, beneficiary)| (*address, *beneficiary))
    }
}
