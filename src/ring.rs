//! Coefficient rings for multiplication schemes.
//!
//! Every coefficient is stored as an exact rational ([`Coeff`]). The [`Ring`]
//! tag decides which values are admissible and how arithmetic is reduced:
//!
//! | ring      | admissible entries | arithmetic        |
//! |-----------|--------------------|-------------------|
//! | `Gf2`     | 0, 1               | modulo 2          |
//! | `Integer` | any integer        | exact             |
//! | `Ternary` | −1, 0, 1           | exact (over ℤ)    |
//! | `Rational`| any rational       | exact             |
//!
//! Ternary is not closed under addition; it restricts the *entries* of a
//! scheme while sums (Brent equations, basis changes) are evaluated over ℤ.

use std::fmt;

use num_rational::Rational64;
use num_traits::{One, Signed, Zero};
use serde::{Deserialize, Serialize};

/// A scheme coefficient.
pub type Coeff = Rational64;

/// The ring a scheme lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ring {
    Gf2,
    Integer,
    Ternary,
    Rational,
}

impl Ring {
    /// Ring characteristic (0 for the characteristic-zero rings)
    pub fn characteristic(self) -> u32 {
        match self {
            Ring::Gf2 => 2,
            _ => 0,
        }
    }

    #[inline]
    pub fn zero() -> Coeff {
        Coeff::zero()
    }

    #[inline]
    pub fn one() -> Coeff {
        Coeff::one()
    }

    /// Whether `value` may appear as an entry of a scheme over this ring
    pub fn admits(self, value: &Coeff) -> bool {
        match self {
            Ring::Gf2 => value.is_zero() || value.is_one(),
            Ring::Integer => value.is_integer(),
            Ring::Ternary => value.is_integer() && value.abs() <= Coeff::one(),
            Ring::Rational => true,
        }
    }

    /// Canonical representative of `value` in this ring.
    ///
    /// Only Gf2 reduces; integral values map to their parity. Non-integral
    /// values never occur in Gf2 arithmetic and are returned unchanged.
    #[inline]
    pub fn reduce(self, value: Coeff) -> Coeff {
        match self {
            Ring::Gf2 if value.is_integer() => Coeff::from_integer(value.to_integer().rem_euclid(2)),
            _ => value,
        }
    }

    /// Embed an integer
    #[inline]
    pub fn from_int(self, value: i64) -> Coeff {
        self.reduce(Coeff::from_integer(value))
    }

    #[inline]
    pub fn add(self, a: Coeff, b: Coeff) -> Coeff {
        self.reduce(a + b)
    }

    #[inline]
    pub fn sub(self, a: Coeff, b: Coeff) -> Coeff {
        self.reduce(a - b)
    }

    #[inline]
    pub fn mul(self, a: Coeff, b: Coeff) -> Coeff {
        self.reduce(a * b)
    }

    #[inline]
    pub fn neg(self, a: Coeff) -> Coeff {
        self.reduce(-a)
    }

    /// Zero test after reduction (so `2` is zero in Gf2)
    #[inline]
    pub fn is_zero(self, value: &Coeff) -> bool {
        self.reduce(*value).is_zero()
    }

    /// Multiplicative inverse, if `value` is a unit of the ring.
    ///
    /// Units: 1 in Gf2, ±1 in ℤ and the ternary ring, every nonzero rational.
    pub fn inverse(self, value: Coeff) -> Option<Coeff> {
        let value = self.reduce(value);
        if value.is_zero() {
            return None;
        }
        match self {
            Ring::Rational => Some(value.recip()),
            _ if value.abs().is_one() => Some(value),
            _ => None,
        }
    }

    /// Whether `value` is an integer (needed for reduction modulo 2)
    pub fn is_integral(value: &Coeff) -> bool {
        value.is_integer()
    }

    /// Name used in records and diagnostics
    pub fn name(self) -> &'static str {
        match self {
            Ring::Gf2 => "Z2",
            Ring::Integer => "Z",
            Ring::Ternary => "ZT",
            Ring::Rational => "Q",
        }
    }
}

impl fmt::Display for Ring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
