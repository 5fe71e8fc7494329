//! VM runtime: the per-frame state and the step loop.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::ops::AddAssign;
use std::rc::Rc;

use log::{debug, trace};
use primitive_types::{H160, U256};

use crate::errors::{FrameError, InternalError};
use crate::memory::Memory;
use crate::params::{Context, HeaderParams, Log};
use crate::patch::Patch;
use crate::pc::{Instruction, Valids, PC, PCMut};
use crate::stack::Stack;
use crate::state::StateManager;
use crate::trie::Database;

use self::check::{check_memory_support, check_opcode};
use self::cost::{gas_cost, gas_refund, gas_stipend, invoke_base_cost, memory_cost, memory_gas};
use self::run::run_opcode;

macro_rules! reset_error_hard {
    ($self: expr, $err: expr) => {
        $self.status = MachineStatus::ExitedErr($err);
        $self.state.used_gas = GasUsage::All;
        $self.state.refunded_gas = U256::zero();
        $self.state.logs = Vec::new();
        $self.state.suicides = BTreeMap::new();
        $self.state.out = Rc::new(Vec::new());
    };
}

macro_rules! reset_error_fatal {
    ($self: expr, $err: expr) => {
        $self.status = MachineStatus::ExitedFatal($err);
        $self.state.used_gas = GasUsage::All;
        $self.state.refunded_gas = U256::zero();
        $self.state.logs = Vec::new();
        $self.state.suicides = BTreeMap::new();
        $self.state.out = Rc::new(Vec::new());
    };
}

mod check;
pub mod cost;
mod lifecycle;
mod precompiled;
mod run;
pub mod util;

/// Gas spent by a frame, excluding memory gas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GasUsage {
    /// The frame failed and consumed everything it was given.
    All,
    /// Gas spent so far.
    Some(U256),
}

impl AddAssign<U256> for GasUsage {
    fn add_assign(&mut self, rhs: U256) {
        match self {
            GasUsage::All => (),
            GasUsage::Some(ref mut gas) => {
                *gas = gas.saturating_add(rhs);
            }
        }
    }
}

/// A frame state without the program counter position semantics.
pub struct State<M> {
    /// Memory of this frame.
    pub memory: M,
    /// Word stack of this frame.
    pub stack: Stack,

    /// Execution context.
    pub context: Context,

    /// The current return value.
    pub out: Rc<Vec<u8>>,

    /// Memory high-water mark in words. Monotonically non-decreasing
    /// within the frame; distinct from the memory gas derived from it.
    pub memory_cost: U256,
    /// Gas spent, excluding memory gas.
    pub used_gas: GasUsage,
    /// Refund accrued from storage clears and self-destructs.
    pub refunded_gas: U256,

    /// Logs emitted on the successful path.
    pub logs: Vec<Log>,
    /// Contracts scheduled for destruction, with their beneficiaries.
    pub suicides: BTreeMap<H160, H160>,

    /// Depth of this frame.
    pub depth: usize,

    /// Valid jump destinations of the code.
    pub valids: Valids,
    /// Program counter position.
    pub position: usize,
}

impl<M> State<M> {
    /// Memory gas owed for the current high-water mark.
    pub fn memory_gas(&self) -> U256 {
        memory_gas(self.memory_cost)
    }

    /// Gas still available to this frame.
    pub fn available_gas(&self) -> U256 {
        self.context.gas_limit - self.total_used_gas()
    }

    /// Total gas spent, including memory gas.
    pub fn total_used_gas(&self) -> U256 {
        match self.used_gas {
            GasUsage::All => self.context.gas_limit,
            GasUsage::Some(gas) => self.memory_gas().saturating_add(gas),
        }
    }
}

/// Current status of a frame.
#[derive(Debug, Clone)]
pub enum MachineStatus {
    /// The frame is actively running.
    Running,
    /// The frame has exited successfully.
    ExitedOk,
    /// The frame has exited with an on-chain error.
    ExitedErr(FrameError),
    /// A host-level failure. The transaction is abandoned.
    ExitedFatal(InternalError),
    /// The frame requires execution of a message-call sub-frame. The
    /// second field is the return-data target in memory.
    InvokeCall(Context, (U256, U256)),
    /// The frame requires execution of a contract-creation sub-frame.
    InvokeCreate(Context),
}

/// Outcome of the check phase that needs acting upon.
#[derive(Debug, Clone)]
pub enum ControlCheck {
    Jump(U256),
}

/// Control action yielded by an instruction.
#[derive(Debug, Clone)]
pub enum Control {
    Stop,
    Jump(U256),
    InvokeCall(Context, (U256, U256)),
    InvokeCreate(Context),
    /// A CALL or CREATE failed on the depth limit or the caller's
    /// balance before any child frame existed: a `0` has been pushed
    /// and only the instruction's base cost is charged.
    ShortCircuit,
}

/// One record handed to per-opcode trace hooks.
#[derive(Debug, Clone)]
pub struct StepRecord {
    /// Depth of the executing frame.
    pub depth: usize,
    /// Position of the instruction.
    pub position: usize,
    /// The instruction about to run.
    pub instruction: Instruction,
    /// Gas remaining after the instruction's charge.
    pub gas_left: U256,
}

/// Cross-frame runtime data: the block context and trace hooks.
pub struct Runtime {
    /// Block header parameters.
    pub block: HeaderParams,
    /// Hooks invoked before each instruction.
    pub step_hooks: Vec<Box<dyn Fn(&StepRecord)>>,
}

impl Runtime {
    /// Create a runtime over the given block.
    pub fn new(block: HeaderParams) -> Self {
        Runtime {
            block,
            step_hooks: Vec::new(),
        }
    }
}

/// A single frame with its program counter: state plus status.
pub struct Machine<M, P: Patch> {
    pub(crate) state: State<M>,
    pub(crate) status: MachineStatus,
    _marker: PhantomData<P>,
}

impl<M: Memory + Default, P: Patch> Machine<M, P> {
    /// Create a frame over the given context at the given depth.
    pub fn new(context: Context, depth: usize) -> Self {
        let valids = Valids::new(context.code.as_slice());
        Machine {
            status: MachineStatus::Running,
            state: State {
                memory: M::default(),
                stack: Stack::default(),

                out: Rc::new(Vec::new()),

                memory_cost: U256::zero(),
                used_gas: GasUsage::Some(U256::zero()),
                refunded_gas: U256::zero(),

                logs: Vec::new(),
                suicides: BTreeMap::new(),

                depth,
                position: 0,
                valids,

                context,
            },
            _marker: PhantomData,
        }
    }

    /// The frame state.
    pub fn state(&self) -> &State<M> {
        &self.state
    }

    /// The frame status.
    pub fn status(&self) -> MachineStatus {
        self.status.clone()
    }

    pub(crate) fn set_fatal(&mut self, err: InternalError) {
        reset_error_fatal!(self, err);
    }

    /// Execute one instruction. The result is reflected in the frame
    /// status.
    pub fn step<D: Database>(&mut self, handle: &mut StateManager<D>, runtime: &Runtime) {
        match self.status {
            MachineStatus::Running => (),
            _ => panic!("step on a finished frame"),
        }

        if self.step_precompiled() {
            trace!(target: "vm", "precompiled frame executed");
            return;
        }

        struct Precheck {
            instruction: Instruction,
            position: usize,
            memory_cost: U256,
            gas_cost: U256,
            gas_stipend: U256,
            gas_refund: U256,
            after_gas: U256,
        }

        let precheck = {
            let pc = PC::<P>::new(
                self.state.context.code.as_slice(),
                &self.state.valids,
                &self.state.position,
            );

            if pc.is_end() {
                debug!(target: "vm", "reached end of code, stopping");
                self.status = MachineStatus::ExitedOk;
                return;
            }

            let instruction = match pc.peek() {
                Ok(instruction) => instruction,
                Err(err) => {
                    reset_error_hard!(self, err);
                    return;
                }
            };

            match check_opcode(instruction, &self.state).and_then(|control| match control {
                None => Ok(()),
                Some(ControlCheck::Jump(dest)) => {
                    if dest <= U256::from(usize::MAX) && pc.is_valid(dest.as_usize()) {
                        Ok(())
                    } else {
                        Err(FrameError::InvalidJump)
                    }
                }
            }) {
                Ok(()) => (),
                Err(err) => {
                    reset_error_hard!(self, err);
                    return;
                }
            }

            let used_gas = match self.state.used_gas {
                GasUsage::Some(gas) => gas,
                GasUsage::All => {
                    reset_error_hard!(self, FrameError::OutOfGas);
                    return;
                }
            };

            let position = pc.position();
            let memory_cost = memory_cost(instruction, &self.state);
            let memory_gas = memory_gas(memory_cost);
            let gas_cost = match gas_cost::<M, P, D>(instruction, &self.state, handle) {
                Ok(gas) => gas,
                Err(err) => {
                    reset_error_fatal!(self, err.into());
                    return;
                }
            };
            let gas_stipend = gas_stipend(instruction, &self.state);
            let gas_refund = match gas_refund(instruction, &self.state, handle) {
                Ok(refund) => refund,
                Err(err) => {
                    reset_error_fatal!(self, err.into());
                    return;
                }
            };

            let all_gas_cost = memory_gas.saturating_add(used_gas).saturating_add(gas_cost);
            if self.state.context.gas_limit < all_gas_cost {
                reset_error_hard!(self, FrameError::OutOfGas);
                return;
            }

            if let Err(err) = check_memory_support(instruction, &self.state) {
                reset_error_fatal!(self, err);
                return;
            }

            let after_gas = self.state.context.gas_limit - all_gas_cost;

            Precheck {
                instruction,
                position,
                memory_cost,
                gas_cost,
                gas_stipend,
                gas_refund,
                after_gas,
            }
        };

        trace!(target: "vm", "position:    {}", precheck.position);
        trace!(target: "vm", "gas_cost:    {:x?}", precheck.gas_cost);
        trace!(target: "vm", "gas_stipend: {:x?}", precheck.gas_stipend);
        trace!(target: "vm", "gas_refund:  {:x?}", precheck.gas_refund);
        trace!(target: "vm", "after_gas:   {:x?}", precheck.after_gas);

        for hook in &runtime.step_hooks {
            hook(&StepRecord {
                depth: self.state.depth,
                position: precheck.position,
                instruction: precheck.instruction,
                gas_left: precheck.after_gas,
            });
        }

        let instruction = PCMut::<P>::new(
            self.state.context.code.as_slice(),
            &self.state.valids,
            &mut self.state.position,
        )
        .read()
        .unwrap();

        let result = run_opcode::<M, P, D>(
            (instruction, precheck.position),
            &mut self.state,
            handle,
            runtime,
            precheck.gas_stipend,
            precheck.after_gas,
        );

        // An invocation that never spawned a child frame pays the
        // instruction's base cost, not the transfer and new-account
        // surcharges, and grants no stipend.
        self.state.used_gas += if matches!(result, Ok(Some(Control::ShortCircuit))) {
            invoke_base_cost::<P>(instruction)
        } else {
            precheck.gas_cost - precheck.gas_stipend
        };
        self.state.memory_cost = precheck.memory_cost;
        self.state.refunded_gas = self.state.refunded_gas.saturating_add(precheck.gas_refund);

        debug!(target: "vm", "{:?} at {} => {:?}", instruction, precheck.position, self.status);

        match result {
            Err(err) => {
                reset_error_fatal!(self, err.into());
            }
            Ok(None) => (),
            Ok(Some(Control::Jump(dest))) => {
                // The destination was validated in the check phase.
                PCMut::<P>::new(
                    self.state.context.code.as_slice(),
                    &self.state.valids,
                    &mut self.state.position,
                )
                .jump(dest.as_usize())
                .unwrap();
            }
            Ok(Some(Control::Stop)) => {
                self.status = MachineStatus::ExitedOk;
            }
            Ok(Some(Control::InvokeCall(context, ret))) => {
                self.status = MachineStatus::InvokeCall(context, ret);
            }
            Ok(Some(Control::InvokeCreate(context))) => {
                self.status = MachineStatus::InvokeCreate(context);
            }
            Ok(Some(Control::ShortCircuit)) => (),
        }
    }
}
