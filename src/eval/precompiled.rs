//! The four built-in contracts at addresses 0x01 through 0x04.

use std::cmp::min;

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use primitive_types::{H160, U256};
use ripemd::Ripemd160;
use sha2::Sha256;
use sha3::{Digest, Keccak256};

use crate::errors::FrameError;
use crate::memory::Memory;
use crate::patch::Patch;

use super::{GasUsage, Machine, MachineStatus};

fn precompiled_address(index: u8) -> H160 {
    let mut bytes = [0u8; 20];
    bytes[19] = index;
    H160(bytes)
}

fn words(len: usize) -> U256 {
    let len = U256::from(len);
    let wordd = len / U256::from(32u64);
    let wordr = len % U256::from(32u64);
    if wordr == U256::zero() {
        wordd
    } else {
        wordd + U256::one()
    }
}

fn linear_cost(len: usize, base: u64, word: u64) -> U256 {
    U256::from(base) + U256::from(word) * words(len)
}

impl<M: Memory + Default, P: Patch> Machine<M, P> {
    /// Execute the frame as a built-in contract if its address is
    /// one. Returns `false`, leaving the frame untouched, otherwise.
    pub fn step_precompiled(&mut self) -> bool {
        let address = self.state.context.address;
        if address == precompiled_address(1) {
            self.step_precompiled_ecrec();
            true
        } else if address == precompiled_address(2) {
            self.step_precompiled_sha256();
            true
        } else if address == precompiled_address(3) {
            self.step_precompiled_rip160();
            true
        } else if address == precompiled_address(4) {
            self.step_precompiled_id();
            true
        } else {
            false
        }
    }

    fn charge_precompiled(&mut self, gas: U256) -> bool {
        if gas > self.state.context.gas_limit {
            self.state.used_gas = GasUsage::All;
            self.status = MachineStatus::ExitedErr(FrameError::OutOfGas);
            false
        } else {
            self.state.used_gas = GasUsage::Some(gas);
            true
        }
    }

    fn step_precompiled_id(&mut self) {
        let gas = linear_cost(self.state.context.data.len(), 15, 3);
        if self.charge_precompiled(gas) {
            self.state.out = self.state.context.data.clone();
            self.status = MachineStatus::ExitedOk;
        }
    }

    fn step_precompiled_sha256(&mut self) {
        let gas = linear_cost(self.state.context.data.len(), 60, 12);
        if self.charge_precompiled(gas) {
            let hash = Sha256::digest(self.state.context.data.as_slice());
            self.state.out = std::rc::Rc::new(hash.to_vec());
            self.status = MachineStatus::ExitedOk;
        }
    }

    fn step_precompiled_rip160(&mut self) {
        let gas = linear_cost(self.state.context.data.len(), 600, 120);
        if self.charge_precompiled(gas) {
            let hash = Ripemd160::digest(self.state.context.data.as_slice());
            let mut result = [0u8; 32];
            result[12..].copy_from_slice(&hash);
            self.state.out = std::rc::Rc::new(result.to_vec());
            self.status = MachineStatus::ExitedOk;
        }
    }

    fn step_precompiled_ecrec(&mut self) {
        let gas = linear_cost(self.state.context.data.len(), 3000, 0);
        if self.charge_precompiled(gas) {
            let mut input = [0u8; 128];
            let data = self.state.context.data.as_slice();
            input[..min(data.len(), 128)].copy_from_slice(&data[..min(data.len(), 128)]);

            // An unrecoverable signature is not a fault: the output
            // is simply empty.
            self.state.out = match ecrecover(&input) {
                Some(address) => std::rc::Rc::new(address),
                None => std::rc::Rc::new(Vec::new()),
            };
            self.status = MachineStatus::ExitedOk;
        }
    }
}

fn ecrecover(input: &[u8; 128]) -> Option<Vec<u8>> {
    // v occupies a full word but only 27 and 28 are meaningful.
    if input[32..63] != [0u8; 31] || !(input[63] == 27 || input[63] == 28) {
        return None;
    }

    let mut sig = [0u8; 64];
    sig[0..32].copy_from_slice(&input[64..96]); // r
    sig[32..64].copy_from_slice(&input[96..128]); // s

    let mut recid = input[63] - 27;
    let mut signature = Signature::from_bytes((&sig[..]).into()).ok()?;
    if let Some(normalized) = signature.normalize_s() {
        signature = normalized;
        recid ^= 1;
    }

    let recovery_id = RecoveryId::from_byte(recid)?;
    let pubkey = VerifyingKey::recover_from_prehash(&input[0..32], &signature, recovery_id).ok()?;

    let hash = Keccak256::digest(&pubkey.to_encoded_point(false).as_bytes()[1..]);
    let mut address = hash.to_vec();
    address[0..12].copy_from_slice(&[0u8; 12]);
    Some(address)
}
