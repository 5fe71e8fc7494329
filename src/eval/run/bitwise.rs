//! Comparison and byte-indexing instructions over the signed view.

use primitive_types::U256;

use super::arithmetic::I256;

pub fn slt(op1: U256, op2: U256) -> U256 {
    if I256::from(op1) < I256::from(op2) {
        U256::one()
    } else {
        U256::zero()
    }
}

pub fn sgt(op1: U256, op2: U256) -> U256 {
    if I256::from(op1) > I256::from(op2) {
        U256::one()
    } else {
        U256::zero()
    }
}

pub fn byte(op1: U256, op2: U256) -> U256 {
    if op1 >= U256::from(32u64) {
        U256::zero()
    } else {
        // `byte` indexes little-endian; the opcode counts from the
        // big end.
        U256::from(op2.byte(31 - op1.as_usize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_comparisons() {
        let minus_one = U256::MAX;
        assert_eq!(slt(minus_one, U256::zero()), U256::one());
        assert_eq!(slt(U256::zero(), minus_one), U256::zero());
        assert_eq!(sgt(U256::zero(), minus_one), U256::one());
        assert_eq!(sgt(minus_one, minus_one), U256::zero());
    }

    #[test]
    fn byte_indexing() {
        let value = U256::from_big_endian(&{
            let mut bytes = [0u8; 32];
            bytes[0] = 0xaa;
            bytes[31] = 0xbb;
            bytes
        });
        assert_eq!(byte(U256::zero(), value), U256::from(0xaau64));
        assert_eq!(byte(U256::from(31u64), value), U256::from(0xbbu64));
        assert_eq!(byte(U256::from(32u64), value), U256::zero());
    }
}
