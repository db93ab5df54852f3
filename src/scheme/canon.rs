//! Canonical form by randomized fixed-point search.
//!
//! A scheme is canonical when four predicates hold:
//!
//! 1. rows are sorted by U‖V‖W;
//! 2. the per-index keys of the n1 basis (U row i ‖ W column i) and of the n3
//!    basis (V column j ‖ W row j) are non-decreasing;
//! 3. for square schemes, U‖V‖W is no larger than its two cyclic shifts;
//! 4. when n1 = n3, U‖V‖W is no larger than the transposed Vᵀ‖Uᵀ‖Wᵀ.
//!
//! [`Scheme::sort`] applies random basis swaps and cyclic shifts followed by a
//! row sort until they all hold.

use rand::Rng;
use tracing::{debug, warn};

use super::{transpose_rows, Row, Scheme};
use crate::ring::Coeff;

/// Outcome of [`Scheme::sort`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Canonicalization {
    /// All predicates hold after this many iterations (0 = already canonical)
    Converged { iterations: usize },
    /// Cap reached; the scheme is its input with rows sorted
    Exhausted { iterations: usize },
}

impl Canonicalization {
    pub fn is_converged(&self) -> bool {
        matches!(self, Canonicalization::Converged { .. })
    }
}

fn flat(rows: &[Row]) -> impl Iterator<Item = &Coeff> + '_ {
    rows.iter().flatten()
}

impl Scheme {
    /// Whether every canonical-form predicate holds
    pub fn is_canonical(&self) -> bool {
        self.rows_ordered() && self.basis_ordered() && self.cycle_ordered() && self.transpose_ordered()
    }

    /// Rows are non-decreasing in the lexicographic order of U‖V‖W.
    ///
    /// The comparison is non-strict: rows whose U‖V parts agree are ordered
    /// by W alone, and fully equal rows may appear in either order, so a
    /// sorted scheme is a fixed point of `sort_multiplications`.
    fn rows_ordered(&self) -> bool {
        (1..self.rank()).all(|r| self.row_key(r - 1).le(self.row_key(r)))
    }

    fn basis_ordered(&self) -> bool {
        let d = self.dims;
        let m = self.rank();

        let row_keys: Vec<Vec<Coeff>> = (0..d.n1)
            .map(|i| {
                let mut key: Vec<Coeff> = Vec::with_capacity(m * (d.n2 + d.n3));
                for r in 0..m {
                    key.extend_from_slice(&self.u[r][i * d.n2..(i + 1) * d.n2]);
                }
                for r in 0..m {
                    key.extend((0..d.n3).map(|c| self.w[r][c * d.n1 + i]));
                }
                key
            })
            .collect();

        let column_keys: Vec<Vec<Coeff>> = (0..d.n3)
            .map(|j| {
                let mut key: Vec<Coeff> = Vec::with_capacity(m * (d.n2 + d.n1));
                for r in 0..m {
                    key.extend((0..d.n2).map(|b| self.v[r][b * d.n3 + j]));
                }
                for r in 0..m {
                    key.extend_from_slice(&self.w[r][j * d.n1..(j + 1) * d.n1]);
                }
                key
            })
            .collect();

        row_keys.windows(2).all(|pair| pair[0] <= pair[1]) && column_keys.windows(2).all(|pair| pair[0] <= pair[1])
    }

    fn cycle_ordered(&self) -> bool {
        if !self.dims.is_square() {
            return true;
        }
        let uvw = || flat(&self.u).chain(flat(&self.v)).chain(flat(&self.w));
        let wuv = flat(&self.w).chain(flat(&self.u)).chain(flat(&self.v));
        let vwu = flat(&self.v).chain(flat(&self.w)).chain(flat(&self.u));
        uvw().le(wuv) && uvw().le(vwu)
    }

    fn transpose_ordered(&self) -> bool {
        let d = self.dims;
        if d.n1 != d.n3 {
            return true;
        }
        let ut = transpose_rows(&self.u, d.n1, d.n2);
        let vt = transpose_rows(&self.v, d.n2, d.n3);
        let wt = transpose_rows(&self.w, d.n3, d.n1);
        let uvw = flat(&self.u).chain(flat(&self.v)).chain(flat(&self.w));
        uvw.le(flat(&vt).chain(flat(&ut)).chain(flat(&wt)))
    }

    /// Bring the scheme to canonical form.
    ///
    /// Gives up after `max_iterations`, restoring the input with its rows
    /// sorted. A scheme that is already canonical is left untouched.
    pub fn sort<R: Rng + ?Sized>(&mut self, rng: &mut R, max_iterations: usize) -> Canonicalization {
        if self.is_canonical() {
            return Canonicalization::Converged { iterations: 0 };
        }

        let original = self.clone();
        let d = self.dims;

        for iteration in 1..=max_iterations {
            if rng.random_bool(0.5) {
                let i1 = rng.random_range(0..d.n1);
                let i2 = rng.random_range(0..d.n1);
                self.swap_basis_rows(i1, i2);
            }
            if rng.random_bool(0.5) {
                let j1 = rng.random_range(0..d.n3);
                let j2 = rng.random_range(0..d.n3);
                self.swap_basis_columns(j1, j2);
            }
            if d.is_square() && rng.random_bool(0.5) {
                self.cycle_shift();
            }
            self.sort_multiplications();

            if self.is_canonical() {
                debug!(iteration, dims = %d, rank = self.rank(), "canonical form reached");
                return Canonicalization::Converged { iterations: iteration };
            }
        }

        *self = original;
        self.sort_multiplications();
        warn!(max_iterations, dims = %d, rank = self.rank(), "canonicalization exhausted, keeping sorted input");
        Canonicalization::Exhausted {
            iterations: max_iterations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::Ring;
    use crate::scheme::tests::strassen;
    use crate::scheme::Dims;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_sort_converges_and_is_idempotent() {
        for ring in [Ring::Gf2, Ring::Integer] {
            let mut rng = StdRng::seed_from_u64(1);
            let mut s = strassen(ring);
            let outcome = s.sort(&mut rng, 10_000);
            assert!(outcome.is_converged(), "{outcome:?}");
            assert!(s.is_canonical());
            assert!(s.check().is_ok());

            let snapshot = s.clone();
            assert_eq!(s.sort(&mut rng, 10_000), Canonicalization::Converged { iterations: 0 });
            assert_eq!(s, snapshot);
        }
    }

    #[test]
    fn test_sort_keeps_invariants() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut s = strassen(Ring::Integer);
        let f = s.invariant_f();
        let complexity = s.complexity();
        s.sort(&mut rng, 10_000);
        assert_eq!(s.invariant_f(), f);
        assert_eq!(s.complexity(), complexity);
    }

    #[test]
    fn test_exhausted_restores_sorted_input() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut s = strassen(Ring::Integer);
        s.swap_basis_rows(0, 1);
        let mut expected = s.clone();
        expected.sort_multiplications();

        if s.is_canonical() {
            return;
        }
        assert_eq!(s.sort(&mut rng, 0), Canonicalization::Exhausted { iterations: 0 });
        assert_eq!(s, expected);
    }

    #[test]
    fn test_row_order_allows_equal_rows() {
        // a repeated row cancels over GF(2), so the scheme stays valid
        let naive = Scheme::naive(Dims::square(2), Ring::Gf2);
        let repeat = |rows: &[Row]| {
            let mut rows = rows.to_vec();
            rows.push(rows[0].clone());
            rows
        };
        let mut s = Scheme::new(naive.dims(), Ring::Gf2, repeat(naive.u()), repeat(naive.v()), repeat(naive.w())).unwrap();
        s.sort_multiplications();
        assert!(s.rows_ordered());
        assert_eq!(s.row_key(0).collect::<Vec<_>>(), s.row_key(1).collect::<Vec<_>>());

        let sorted = s.clone();
        s.sort_multiplications();
        assert_eq!(s, sorted);

        let last = s.rank() - 1;
        s.u.swap(0, last);
        s.v.swap(0, last);
        s.w.swap(0, last);
        assert!(!s.rows_ordered());
    }

    #[test]
    fn test_naive_gf2_converges() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut s = Scheme::naive(Dims::square(2), Ring::Gf2);
        assert!(s.sort(&mut rng, 10_000).is_converged());
    }
}
