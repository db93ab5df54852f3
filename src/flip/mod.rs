//! Bit-packed GF(2) schemes and the flip graph.
//!
//! Each factor row is a single `u128`: bit `x·cols + y` is the coefficient of
//! entry (x, y) of the factor viewed as a matrix, the same flattening the
//! dense [`Scheme`] uses. Over GF(2) a product is a rank-one tensor
//! `u ⊗ v ⊗ w` and the moves in [`moves`] rewrite pairs of such tensors
//! without changing their sum, so every state visited stays a valid scheme.
//!
//! Text format (one scheme):
//!
//! ```text
//! n1 n2 n3 m
//! u_1 ... u_m
//! v_1 ... v_m
//! w_1 ... w_m
//! ```

mod moves;
mod resize;
pub mod search;

pub use search::{Budget, FlipWalk, WalkOutcome, WalkReport};

use std::fmt;
use std::str::FromStr;

use num_traits::{One, Zero};

use crate::error::{ParseError, SchemeError};
use crate::ring::{Coeff, Ring};
use crate::scheme::{Dims, Row, Scheme};

/// Widest factor a mask can hold
pub const MAX_BITS: usize = u128::BITS as usize;

/// A GF(2) scheme with one bitmask per factor row
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BitPackedScheme {
    n: [usize; 3],
    uvw: [Vec<u128>; 3],
}

/// Columns of factor `f` for dimensions `n`, or `None` past 128 bits
fn factor_width(n: [usize; 3], f: usize) -> Option<usize> {
    n[f].checked_mul(n[(f + 1) % 3]).filter(|&bits| bits <= MAX_BITS)
}

/// Mask with the low `bits` bits set
#[inline]
pub(crate) fn full_mask(bits: usize) -> u128 {
    if bits >= MAX_BITS {
        u128::MAX
    } else {
        (1u128 << bits) - 1
    }
}

impl BitPackedScheme {
    /// Build from raw masks, dropping rows with a zero factor and checking the
    /// Brent equations.
    pub fn from_masks(dims: Dims, u: Vec<u128>, v: Vec<u128>, w: Vec<u128>) -> Result<Self, SchemeError> {
        let n = [dims.n1, dims.n2, dims.n3];
        if n.contains(&0) {
            return Err(SchemeError::Shape("positive dimensions"));
        }
        if u.len() != v.len() || v.len() != w.len() {
            return Err(SchemeError::RowCount {
                u: u.len(),
                v: v.len(),
                w: w.len(),
            });
        }

        let mut scheme = Self { n, uvw: [u, v, w] };
        for f in 0..3 {
            let bits = factor_width(n, f)
                .ok_or_else(|| SchemeError::TooWide(n[f].saturating_mul(n[(f + 1) % 3])))?;
            let outside = !full_mask(bits);
            if let Some(mask) = scheme.uvw[f].iter().find(|&&mask| mask & outside != 0) {
                return Err(SchemeError::OutOfRange {
                    index: (MAX_BITS - 1) - mask.leading_zeros() as usize,
                    bound: bits,
                });
            }
        }

        scheme.remove_zeroes();
        scheme.check()?;
        Ok(scheme)
    }

    /// Pack a dense scheme; integral schemes over other rings are reduced
    /// modulo 2 first.
    pub fn from_scheme(scheme: &Scheme) -> Result<Self, SchemeError> {
        let reduced;
        let scheme = if scheme.ring() == Ring::Gf2 {
            scheme
        } else {
            reduced = scheme.to_gf2()?;
            &reduced
        };

        let d = scheme.dims();
        if let Some(bits) = d.lens().into_iter().find(|&bits| bits > MAX_BITS) {
            return Err(SchemeError::TooWide(bits));
        }

        let pack = |rows: &[Row]| -> Vec<u128> {
            rows.iter()
                .map(|row| {
                    row.iter()
                        .enumerate()
                        .filter(|(_, x)| !x.is_zero())
                        .fold(0u128, |mask, (bit, _)| mask | (1u128 << bit))
                })
                .collect()
        };
        Self::from_masks(d, pack(scheme.u()), pack(scheme.v()), pack(scheme.w()))
    }

    /// Schoolbook scheme; fails only when a factor is wider than 128 bits
    pub fn naive(dims: Dims) -> Result<Self, SchemeError> {
        let n = [dims.n1, dims.n2, dims.n3];
        for f in 0..3 {
            factor_width(n, f).ok_or(SchemeError::TooWide(n[f].saturating_mul(n[(f + 1) % 3])))?;
        }
        let mut scheme = Self {
            n,
            uvw: [Vec::new(), Vec::new(), Vec::new()],
        };
        for a in 0..dims.n1 {
            for b in 0..dims.n2 {
                for c in 0..dims.n3 {
                    scheme.push_row([
                        1 << (a * dims.n2 + b),
                        1 << (b * dims.n3 + c),
                        1 << (c * dims.n1 + a),
                    ]);
                }
            }
        }
        scheme.debug_validate();
        Ok(scheme)
    }

    /// Unpack into a dense GF(2) scheme
    pub fn to_scheme(&self) -> Scheme {
        let lens = self.lens();
        let unpack = |f: usize| -> Vec<Row> {
            self.uvw[f]
                .iter()
                .map(|&mask| {
                    (0..lens[f])
                        .map(|bit| if mask >> bit & 1 == 1 { Coeff::one() } else { Coeff::zero() })
                        .collect()
                })
                .collect()
        };
        Scheme::from_parts(self.dims(), Ring::Gf2, unpack(0), unpack(1), unpack(2))
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn dims(&self) -> Dims {
        Dims::new(self.n[0], self.n[1], self.n[2])
    }

    /// Number of multiplications
    pub fn rank(&self) -> usize {
        self.uvw[0].len()
    }

    pub fn u(&self) -> &[u128] {
        &self.uvw[0]
    }

    pub fn v(&self) -> &[u128] {
        &self.uvw[1]
    }

    pub fn w(&self) -> &[u128] {
        &self.uvw[2]
    }

    /// Bit widths of U, V, W
    pub fn lens(&self) -> [usize; 3] {
        [
            self.n[0] * self.n[1],
            self.n[1] * self.n[2],
            self.n[2] * self.n[0],
        ]
    }

    /// Schoolbook rank n1·n2·n3, the ceiling for rank-increasing moves
    pub fn naive_rank(&self) -> usize {
        self.n[0] * self.n[1] * self.n[2]
    }

    // ------------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------------

    /// Recompute every Brent equation.
    ///
    /// For each (i, j) the W masks of the rows with u_i = v_j = 1 are XOR-ed
    /// together and compared with the single expected output bit.
    pub fn check(&self) -> Result<(), SchemeError> {
        let [n1, n2, n3] = self.n;
        let [u, v, w] = &self.uvw;
        let lens = self.lens();

        for i in 0..lens[0] {
            for j in 0..lens[1] {
                let mut acc = 0u128;
                for r in 0..self.rank() {
                    if u[r] >> i & v[r] >> j & 1 == 1 {
                        acc ^= w[r];
                    }
                }
                let (i1, i2) = (i / n2, i % n2);
                let (j1, j2) = (j / n3, j % n3);
                let expected = if i2 == j1 { 1u128 << (j2 * n1 + i1) } else { 0 };
                let diff = acc ^ expected;
                if diff != 0 {
                    return Err(SchemeError::BrentViolation {
                        i,
                        j,
                        k: diff.trailing_zeros() as usize,
                    });
                }
            }
        }
        Ok(())
    }

    /// Panic if the Brent equations do not hold
    pub fn validate(&self) {
        if let Err(e) = self.check() {
            panic!("bit-packed scheme {} (m = {}) is invalid: {e}", self.dims(), self.rank());
        }
    }

    #[inline]
    fn debug_validate(&self) {
        if cfg!(debug_assertions) {
            self.validate();
        }
    }

    // ------------------------------------------------------------------------
    // Row bookkeeping
    // ------------------------------------------------------------------------

    fn push_row(&mut self, row: [u128; 3]) {
        for (factor, mask) in self.uvw.iter_mut().zip(row) {
            factor.push(mask);
        }
    }

    /// Push a row whose values are given in `roles` order
    fn push_permuted(&mut self, roles: [usize; 3], values: [u128; 3]) {
        let mut row = [0; 3];
        for (role, value) in roles.into_iter().zip(values) {
            row[role] = value;
        }
        self.push_row(row);
    }

    fn row(&self, r: usize) -> [u128; 3] {
        [self.uvw[0][r], self.uvw[1][r], self.uvw[2][r]]
    }

    fn remove_row(&mut self, r: usize) {
        for factor in &mut self.uvw {
            factor.swap_remove(r);
        }
    }

    /// Keep rows whose flag is set, preserving order
    fn retain_rows(&mut self, keep: &[bool]) {
        for factor in &mut self.uvw {
            let mut flags = keep.iter();
            factor.retain(|_| flags.next().copied().unwrap_or(false));
        }
    }

    /// Drop rows with any zero factor; returns how many were dropped
    fn remove_zeroes(&mut self) -> usize {
        let before = self.rank();
        let keep: Vec<bool> = (0..before)
            .map(|r| self.row(r).iter().all(|&mask| mask != 0))
            .collect();
        self.retain_rows(&keep);
        before - self.rank()
    }

    /// Common tail of every move
    fn finish_move(&mut self) {
        self.remove_zeroes();
        self.debug_validate();
    }
}

// ============================================================================
// TEXT FORMAT
// ============================================================================

impl fmt::Display for BitPackedScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.n[0], self.n[1], self.n[2], self.rank())?;
        for factor in &self.uvw {
            let line: Vec<String> = factor.iter().map(u128::to_string).collect();
            write!(f, "\n{}", line.join(" "))?;
        }
        Ok(())
    }
}

impl FromStr for BitPackedScheme {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        if tokens.len() < 4 {
            return Err(ParseError::Eof("dimensions and rank"));
        }

        let header: Vec<usize> = tokens[..4]
            .iter()
            .map(|t| t.parse::<usize>().map_err(|_| ParseError::Number(t.to_string())))
            .collect::<Result<_, _>>()?;
        let m = header[3];

        let expected = m
            .checked_mul(3)
            .and_then(|masks| masks.checked_add(4))
            .ok_or(ParseError::Number(tokens[3].to_string()))?;
        if tokens.len() != expected {
            return Err(ParseError::Count {
                expected,
                found: tokens.len(),
            });
        }

        let masks: Vec<u128> = tokens[4..]
            .iter()
            .map(|t| t.parse::<u128>().map_err(|_| ParseError::Number(t.to_string())))
            .collect::<Result<_, _>>()?;
        let (u, rest) = masks.split_at(m);
        let (v, w) = rest.split_at(m);

        let dims = Dims::new(header[0], header[1], header[2]);
        Ok(Self::from_masks(dims, u.to_vec(), v.to_vec(), w.to_vec())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::tests::strassen;

    #[test]
    fn test_strassen_round_trip() {
        let dense = strassen(Ring::Gf2);
        let packed = BitPackedScheme::from_scheme(&dense).unwrap();
        assert_eq!(packed.rank(), 7);
        assert_eq!(packed.u()[0], 0b1001);
        assert_eq!(packed.to_scheme(), dense);
    }

    #[test]
    fn test_integer_scheme_is_reduced() {
        let packed = BitPackedScheme::from_scheme(&strassen(Ring::Integer)).unwrap();
        assert_eq!(packed.to_scheme(), strassen(Ring::Gf2));
    }

    #[test]
    fn test_naive_rectangular() {
        let packed = BitPackedScheme::naive(Dims::new(2, 3, 4)).unwrap();
        assert_eq!(packed.rank(), 24);
        assert_eq!(packed.lens(), [6, 12, 8]);
        assert_eq!(packed.to_scheme(), Scheme::naive(Dims::new(2, 3, 4), Ring::Gf2));
    }

    #[test]
    fn test_too_wide_rejected() {
        assert_eq!(
            BitPackedScheme::naive(Dims::new(12, 11, 1)),
            Err(SchemeError::TooWide(132))
        );
        assert!(BitPackedScheme::naive(Dims::new(8, 16, 1)).is_ok());
    }

    #[test]
    fn test_from_masks_rejects() {
        let dims = Dims::square(1);
        assert!(matches!(
            BitPackedScheme::from_masks(dims, vec![1], vec![1], vec![]),
            Err(SchemeError::RowCount { .. })
        ));
        assert!(matches!(
            BitPackedScheme::from_masks(dims, vec![2], vec![1], vec![1]),
            Err(SchemeError::OutOfRange { index: 1, bound: 1 })
        ));
        assert!(matches!(
            BitPackedScheme::from_masks(dims, vec![1, 1], vec![1, 1], vec![1, 1]),
            Err(SchemeError::BrentViolation { .. })
        ));
        // zero rows are dropped before checking
        let scheme = BitPackedScheme::from_masks(dims, vec![1, 0], vec![1, 1], vec![1, 1]).unwrap();
        assert_eq!(scheme.rank(), 1);
    }

    #[test]
    fn test_text_format() {
        let packed = BitPackedScheme::naive(Dims::square(1)).unwrap();
        assert_eq!(packed.to_string(), "1 1 1 1\n1\n1\n1");

        let strassen = BitPackedScheme::from_scheme(&strassen(Ring::Gf2)).unwrap();
        let parsed: BitPackedScheme = strassen.to_string().parse().unwrap();
        assert_eq!(parsed, strassen);

        assert_eq!("1 1".parse::<BitPackedScheme>(), Err(ParseError::Eof("dimensions and rank")));
        assert_eq!(
            "1 1 1 2\n1 1\n1".parse::<BitPackedScheme>(),
            Err(ParseError::Count { expected: 10, found: 7 })
        );
        assert_eq!(
            "1 1 1 1\nx\n1\n1".parse::<BitPackedScheme>(),
            Err(ParseError::Number("x".to_string()))
        );
    }
}
