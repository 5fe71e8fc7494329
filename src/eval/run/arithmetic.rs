//! Arithmetic instructions, including the two's-complement views.

use std::cmp::Ordering;
use std::ops::{Div, Rem};

use primitive_types::{U256, U512};

/// Sign of an [I256].
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Sign {
    Plus,
    Minus,
    Zero,
}

/// A 256-bit word reinterpreted as a signed magnitude.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct I256(pub Sign, pub U256);

fn sign_bit_mask() -> U256 {
    U256::MAX >> 1
}

impl I256 {
    /// The zero value.
    pub fn zero() -> I256 {
        I256(Sign::Zero, U256::zero())
    }

    /// The most negative value, `-2^255`.
    pub fn min_value() -> I256 {
        I256(Sign::Minus, (U256::MAX & sign_bit_mask()) + U256::one())
    }
}

impl Ord for I256 {
    fn cmp(&self, other: &I256) -> Ordering {
        match (self.0, other.0) {
            (Sign::Zero, Sign::Zero) => Ordering::Equal,
            (Sign::Zero, Sign::Plus) => Ordering::Less,
            (Sign::Zero, Sign::Minus) => Ordering::Greater,
            (Sign::Minus, Sign::Zero) => Ordering::Less,
            (Sign::Minus, Sign::Plus) => Ordering::Less,
            (Sign::Minus, Sign::Minus) => self.1.cmp(&other.1).reverse(),
            (Sign::Plus, Sign::Minus) => Ordering::Greater,
            (Sign::Plus, Sign::Zero) => Ordering::Greater,
            (Sign::Plus, Sign::Plus) => self.1.cmp(&other.1),
        }
    }
}

impl PartialOrd for I256 {
    fn partial_cmp(&self, other: &I256) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<U256> for I256 {
    fn from(val: U256) -> I256 {
        if val == U256::zero() {
            I256::zero()
        } else if val & sign_bit_mask() == val {
            I256(Sign::Plus, val)
        } else {
            I256(Sign::Minus, !val + U256::one())
        }
    }
}

impl From<I256> for U256 {
    fn from(value: I256) -> U256 {
        match value.0 {
            Sign::Zero => U256::zero(),
            Sign::Plus => value.1,
            Sign::Minus => !value.1 + U256::one(),
        }
    }
}

impl Div for I256 {
    type Output = I256;

    fn div(self, other: I256) -> I256 {
        if other == I256::zero() {
            return I256::zero();
        }

        if self == I256::min_value() && other.1 == U256::one() {
            return I256::min_value();
        }

        let d = (self.1 / other.1) & sign_bit_mask();

        if d == U256::zero() {
            return I256::zero();
        }

        match (self.0, other.0) {
            (Sign::Zero, Sign::Plus)
            | (Sign::Plus, Sign::Zero)
            | (Sign::Zero, Sign::Zero)
            | (Sign::Plus, Sign::Plus)
            | (Sign::Minus, Sign::Minus) => I256(Sign::Plus, d),
            (Sign::Zero, Sign::Minus)
            | (Sign::Plus, Sign::Minus)
            | (Sign::Minus, Sign::Zero)
            | (Sign::Minus, Sign::Plus) => I256(Sign::Minus, d),
        }
    }
}

impl Rem for I256 {
    type Output = I256;

    fn rem(self, other: I256) -> I256 {
        if other == I256::zero() {
            return I256::zero();
        }

        let r = (self.1 % other.1) & sign_bit_mask();

        if r == U256::zero() {
            return I256::zero();
        }

        I256(self.0, r)
    }
}

pub fn div(op1: U256, op2: U256) -> U256 {
    if op2 == U256::zero() {
        U256::zero()
    } else {
        op1 / op2
    }
}

pub fn sdiv(op1: U256, op2: U256) -> U256 {
    (I256::from(op1) / I256::from(op2)).into()
}

pub fn rem(op1: U256, op2: U256) -> U256 {
    if op2 == U256::zero() {
        U256::zero()
    } else {
        op1 % op2
    }
}

pub fn srem(op1: U256, op2: U256) -> U256 {
    (I256::from(op1) % I256::from(op2)).into()
}

pub fn addmod(op1: U256, op2: U256, op3: U256) -> U256 {
    if op3 == U256::zero() {
        U256::zero()
    } else {
        let v = (U512::from(op1) + U512::from(op2)) % U512::from(op3);
        U256::try_from(v).expect("modulus fits a word")
    }
}

pub fn mulmod(op1: U256, op2: U256, op3: U256) -> U256 {
    if op3 == U256::zero() {
        U256::zero()
    } else {
        let v = (U512::from(op1) * U512::from(op2)) % U512::from(op3);
        U256::try_from(v).expect("modulus fits a word")
    }
}

pub fn exp(op1: U256, op2: U256) -> U256 {
    let mut base = op1;
    let mut exponent = op2;
    let mut r = U256::one();

    while exponent != U256::zero() {
        if exponent & U256::one() != U256::zero() {
            r = r.overflowing_mul(base).0;
        }
        exponent = exponent >> 1;
        base = base.overflowing_mul(base).0;
    }

    r
}

pub fn signextend(op1: U256, op2: U256) -> U256 {
    if op1 >= U256::from(31u64) {
        // Extending from the top byte (or beyond) is the identity.
        op2
    } else {
        let t = 8 * op1.as_usize() + 7;
        let mask = (U256::one() << (t + 1)) - U256::one();
        if op2.bit(t) {
            op2 | !mask
        } else {
            op2 & mask
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neg(value: u64) -> U256 {
        U256::from(I256(Sign::Minus, U256::from(value)))
    }

    #[test]
    fn division_by_zero_is_zero() {
        assert_eq!(div(U256::from(7u64), U256::zero()), U256::zero());
        assert_eq!(rem(U256::from(7u64), U256::zero()), U256::zero());
        assert_eq!(sdiv(neg(7), U256::zero()), U256::zero());
        assert_eq!(srem(neg(7), U256::zero()), U256::zero());
    }

    #[test]
    fn signed_division() {
        assert_eq!(sdiv(neg(100), U256::from(2u64)), neg(50));
        assert_eq!(sdiv(neg(100), neg(2)), U256::from(50u64));
        // MIN / -1 wraps to MIN.
        let min: U256 = I256::min_value().into();
        assert_eq!(sdiv(min, neg(1)), min);
    }

    #[test]
    fn signed_remainder_takes_dividend_sign() {
        assert_eq!(srem(neg(8), U256::from(3u64)), neg(2));
        assert_eq!(srem(U256::from(8u64), neg(3)), U256::from(2u64));
    }

    #[test]
    fn modular_ops_use_wide_intermediates() {
        assert_eq!(
            addmod(U256::MAX, U256::MAX, U256::from(5u64)),
            (U256::MAX % U256::from(5u64) * U256::from(2u64)) % U256::from(5u64)
        );
        // 2^256 - 1 is 1 mod 7, so the square is 1 as well.
        assert_eq!(mulmod(U256::MAX, U256::MAX, U256::from(7u64)), U256::one());
        assert_eq!(addmod(U256::one(), U256::one(), U256::zero()), U256::zero());
    }

    #[test]
    fn exp_wraps() {
        assert_eq!(exp(U256::from(2u64), U256::from(10u64)), U256::from(1024u64));
        assert_eq!(exp(U256::from(2u64), U256::from(256u64)), U256::zero());
        assert_eq!(exp(U256::zero(), U256::zero()), U256::one());
    }

    #[test]
    fn signextend_from_byte_zero() {
        assert_eq!(
            signextend(U256::zero(), U256::from(0x80u64)),
            U256::MAX - U256::from(0x7fu64)
        );
        assert_eq!(
            signextend(U256::zero(), U256::from(0x7fu64)),
            U256::from(0x7fu64)
        );
        let value = U256::from(0x1234u64);
        assert_eq!(signextend(U256::from(31u64), value), value);
    }
}
