//! Frame lifecycle: deriving sub-frames, depositing created code,
//! and folding a finished sub-frame back into its parent.

use std::collections::BTreeMap;
use std::mem::swap;
use std::rc::Rc;

use primitive_types::U256;

use crate::errors::FrameError;
use crate::memory::Memory;
use crate::params::Context;
use crate::patch::Patch;
use crate::pc::Valids;
use crate::stack::Stack;
use crate::state::StateManager;
use crate::trie::Database;

use super::cost::code_deposit_gas;
use super::util::copy_into_memory_apply;
use super::{GasUsage, Machine, MachineStatus, State};

impl<M: Memory + Default, P: Patch> Machine<M, P> {
    /// Derive a sub-frame over the given context, one level deeper.
    /// The parent keeps its own state and decides on the result later.
    pub fn derive(&self, context: Context) -> Self {
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
                suicides: self.state.suicides.clone(),

                depth: self.state.depth + 1,
                position: 0,
                valids,

                context,
            },
            _marker: std::marker::PhantomData,
        }
    }

    /// Deposit the code returned by a finished creation frame,
    /// charging the deposit gas and enforcing the size limit. On
    /// failure the frame flips to an error state consuming all gas.
    pub fn code_deposit<D: Database>(&mut self, handle: &mut StateManager<D>) {
        match self.status {
            MachineStatus::ExitedOk => (),
            MachineStatus::ExitedErr(_) | MachineStatus::ExitedFatal(_) => return,
            _ => panic!("code deposit on a running frame"),
        }

        if let Some(limit) = P::code_deposit_limit() {
            if self.state.out.len() > limit {
                reset_error_hard!(self, FrameError::OutOfGas);
                return;
            }
        }

        let deposit_cost = code_deposit_gas(self.state.out.len());
        if deposit_cost > self.state.available_gas() {
            if !P::force_code_deposit() {
                reset_error_hard!(self, FrameError::OutOfGas);
            } else if let Err(err) = handle.put_code(self.state.context.address, Vec::new()) {
                reset_error_fatal!(self, err.into());
            }
        } else {
            self.state.used_gas += deposit_cost;
            let code = self.state.out.as_ref().clone();
            if let Err(err) = handle.put_code(self.state.context.address, code) {
                reset_error_fatal!(self, err.into());
            }
        }
    }

    /// Fold a finished sub-frame into this frame. The sub-frame must
    /// have been created by `derive` for the call or creation this
    /// frame is currently invoking; its checkpoint is committed on
    /// success and reverted on failure.
    pub fn apply_sub<D: Database>(&mut self, sub: Machine<M, P>, handle: &mut StateManager<D>) {
        let mut status = MachineStatus::Running;
        swap(&mut status, &mut self.status);
        match status {
            MachineStatus::InvokeCreate(_) => {
                self.apply_create(sub, handle);
            }
            MachineStatus::InvokeCall(_, (out_start, out_len)) => {
                self.apply_call(sub, handle, out_start, out_len);
            }
            _ => panic!("apply_sub on a frame that invoked nothing"),
        }
    }

    fn apply_create<D: Database>(&mut self, mut sub: Machine<M, P>, handle: &mut StateManager<D>) {
        sub.code_deposit(handle);

        let sub_total_used_gas = sub.state.total_used_gas();

        self.state.logs.append(&mut sub.state.logs);
        self.state.used_gas += sub_total_used_gas;
        self.state.refunded_gas = self.state.refunded_gas.saturating_add(sub.state.refunded_gas);

        match sub.status {
            MachineStatus::ExitedOk => {
                handle.commit();
                self.state.suicides = sub.state.suicides;
            }
            MachineStatus::ExitedErr(_) => {
                handle.revert();
                self.state.stack.pop().unwrap();
                self.state.stack.push(U256::zero()).unwrap();
            }
            MachineStatus::ExitedFatal(err) => {
                handle.revert();
                reset_error_fatal!(self, err);
            }
            _ => panic!("sub-frame still running"),
        }
    }

    fn apply_call<D: Database>(
        &mut self,
        mut sub: Machine<M, P>,
        handle: &mut StateManager<D>,
        out_start: U256,
        out_len: U256,
    ) {
        let sub_total_used_gas = sub.state.total_used_gas();

        self.state.logs.append(&mut sub.state.logs);
        self.state.used_gas += sub_total_used_gas;
        self.state.refunded_gas = self.state.refunded_gas.saturating_add(sub.state.refunded_gas);

        // A failed sub-frame has no return data, so this writes only
        // what the sub-frame actually produced.
        copy_into_memory_apply(&mut self.state.memory, sub.state.out.as_slice(), out_start, out_len);

        match sub.status {
            MachineStatus::ExitedOk => {
                handle.commit();
                self.state.suicides = sub.state.suicides;
            }
            MachineStatus::ExitedErr(_) => {
                handle.revert();
                self.state.stack.pop().unwrap();
                self.state.stack.push(U256::zero()).unwrap();
            }
            MachineStatus::ExitedFatal(err) => {
                handle.revert();
                reset_error_fatal!(self, err);
            }
            _ => panic!("sub-frame still running"),
        }
    }
}
