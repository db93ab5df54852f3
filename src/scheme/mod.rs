//! Dense multiplication schemes.
//!
//! A [`Scheme`] multiplies an n1×n2 matrix A by an n2×n3 matrix B with `m`
//! scalar products. Product `r` is
//!
//! ```text
//! M_r = (Σ U[r][a·n2 + b] · A[a][b]) · (Σ V[r][b·n3 + c] · B[b][c])
//! ```
//!
//! and output entry `C[a][c] = Σ_r W[r][c·n1 + a] · M_r`. W is indexed with
//! the output column first, which makes the validity condition (the Brent
//! equations) cyclically symmetric in U, V and W.
//!
//! Every mutating operation leaves the Brent equations satisfied; a scheme
//! that fails them after a mutation is a bug and panics.

pub mod additions;
mod canon;
mod format;
mod invariants;

pub use additions::{AdditionReducer, Reduced, ReductionMode};
pub use canon::Canonicalization;

use std::fmt;

use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::algebra::{self, Matrix};
use crate::error::SchemeError;
use crate::ring::{Coeff, Ring};

/// One row of a factor matrix
pub type Row = Vec<Coeff>;

/// Factor names in role order
pub const FACTOR_NAMES: [char; 3] = ['u', 'v', 'w'];

// ============================================================================
// DIMENSIONS
// ============================================================================

/// Shape of the multiplication: (n1×n2) · (n2×n3).
///
/// Serialized as a single integer when square, `[n1, n2, n3]` otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "DimsRepr", into = "DimsRepr")]
pub struct Dims {
    pub n1: usize,
    pub n2: usize,
    pub n3: usize,
}

impl Dims {
    pub fn new(n1: usize, n2: usize, n3: usize) -> Self {
        Self { n1, n2, n3 }
    }

    pub fn square(n: usize) -> Self {
        Self::new(n, n, n)
    }

    pub fn is_square(&self) -> bool {
        self.n1 == self.n2 && self.n2 == self.n3
    }

    /// Columns of U
    #[inline]
    pub fn u_len(&self) -> usize {
        self.n1 * self.n2
    }

    /// Columns of V
    #[inline]
    pub fn v_len(&self) -> usize {
        self.n2 * self.n3
    }

    /// Columns of W
    #[inline]
    pub fn w_len(&self) -> usize {
        self.n3 * self.n1
    }

    /// Column counts of U, V, W in role order
    pub fn lens(&self) -> [usize; 3] {
        [self.u_len(), self.v_len(), self.w_len()]
    }

    /// `lens` for untrusted dimensions; `None` on overflow
    pub fn checked_lens(&self) -> Option<[usize; 3]> {
        Some([
            self.n1.checked_mul(self.n2)?,
            self.n2.checked_mul(self.n3)?,
            self.n3.checked_mul(self.n1)?,
        ])
    }

    /// Shape of each factor when a row is viewed as a matrix
    pub fn factor_shape(&self, factor: usize) -> (usize, usize) {
        match factor {
            0 => (self.n1, self.n2),
            1 => (self.n2, self.n3),
            _ => (self.n3, self.n1),
        }
    }

    /// Rank of the schoolbook algorithm
    pub fn naive_rank(&self) -> usize {
        self.n1 * self.n2 * self.n3
    }

    pub fn max(&self) -> usize {
        self.n1.max(self.n2).max(self.n3)
    }

    /// Right-hand side of the Brent equation for the flattened triple
    #[inline]
    pub fn target(&self, i: usize, j: usize, k: usize) -> bool {
        let (i1, i2) = (i / self.n2, i % self.n2);
        let (j1, j2) = (j / self.n3, j % self.n3);
        let (k1, k2) = (k / self.n1, k % self.n1);
        i2 == j1 && i1 == k2 && j2 == k1
    }

    /// The dimensions after a cyclic shift of roles
    pub fn rotated(&self) -> Self {
        Self::new(self.n2, self.n3, self.n1)
    }

    /// The dimensions after transposition
    pub fn transposed(&self) -> Self {
        Self::new(self.n3, self.n2, self.n1)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum DimsRepr {
    Square(usize),
    Shape([usize; 3]),
}

impl From<DimsRepr> for Dims {
    fn from(repr: DimsRepr) -> Self {
        match repr {
            DimsRepr::Square(n) => Dims::square(n),
            DimsRepr::Shape([n1, n2, n3]) => Dims::new(n1, n2, n3),
        }
    }
}

impl From<Dims> for DimsRepr {
    fn from(d: Dims) -> Self {
        if d.is_square() {
            DimsRepr::Square(d.n1)
        } else {
            DimsRepr::Shape([d.n1, d.n2, d.n3])
        }
    }
}

impl fmt::Display for Dims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.n1, self.n2, self.n3)
    }
}

// ============================================================================
// SCHEME
// ============================================================================

/// A bilinear multiplication scheme over a [`Ring`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scheme {
    dims: Dims,
    ring: Ring,
    u: Vec<Row>,
    v: Vec<Row>,
    w: Vec<Row>,
}

impl Scheme {
    /// Build a scheme from untrusted factor matrices.
    ///
    /// Checks shapes and ring membership, drops rows where any factor is
    /// zero and verifies every Brent equation.
    pub fn new(dims: Dims, ring: Ring, u: Vec<Row>, v: Vec<Row>, w: Vec<Row>) -> Result<Self, SchemeError> {
        if dims.n1 == 0 || dims.n2 == 0 || dims.n3 == 0 {
            return Err(SchemeError::Shape("positive dimensions"));
        }
        if u.len() != v.len() || v.len() != w.len() {
            return Err(SchemeError::RowCount {
                u: u.len(),
                v: v.len(),
                w: w.len(),
            });
        }

        let lens = dims.checked_lens().ok_or(SchemeError::Shape("dimensions whose products fit a usize"))?;
        for (factor, (rows, expected)) in [&u, &v, &w].into_iter().zip(lens).enumerate() {
            for (row, values) in rows.iter().enumerate() {
                if values.len() != expected {
                    return Err(SchemeError::RowLength {
                        matrix: FACTOR_NAMES[factor],
                        row,
                        got: values.len(),
                        expected,
                    });
                }
                if let Some((column, value)) = values.iter().enumerate().find(|(_, x)| !ring.admits(x)) {
                    return Err(SchemeError::OutsideRing {
                        matrix: FACTOR_NAMES[factor],
                        row,
                        column,
                        value: *value,
                        ring,
                    });
                }
            }
        }

        let mut scheme = Self {
            dims,
            ring,
            u: Vec::with_capacity(u.len()),
            v: Vec::with_capacity(v.len()),
            w: Vec::with_capacity(w.len()),
        };
        let nonzero = |row: &Row| row.iter().any(|x| !ring.is_zero(x));
        for ((ru, rv), rw) in u.into_iter().zip(v).zip(w) {
            if nonzero(&ru) && nonzero(&rv) && nonzero(&rw) {
                scheme.u.push(ru);
                scheme.v.push(rv);
                scheme.w.push(rw);
            }
        }

        scheme.check()?;
        Ok(scheme)
    }

    /// Convenience constructor from integer rows
    pub fn from_integers(
        dims: Dims,
        ring: Ring,
        u: &[Vec<i64>],
        v: &[Vec<i64>],
        w: &[Vec<i64>],
    ) -> Result<Self, SchemeError> {
        let lift = |rows: &[Vec<i64>]| -> Vec<Row> {
            rows.iter()
                .map(|row| row.iter().map(|&x| Coeff::from_integer(x)).collect())
                .collect()
        };
        Self::new(dims, ring, lift(u), lift(v), lift(w))
    }

    /// The schoolbook algorithm: one product per (a, b, c)
    pub fn naive(dims: Dims, ring: Ring) -> Self {
        let unit = |len: usize, at: usize| -> Row {
            let mut row = vec![Coeff::zero(); len];
            row[at] = Coeff::one();
            row
        };

        let mut scheme = Self {
            dims,
            ring,
            u: Vec::new(),
            v: Vec::new(),
            w: Vec::new(),
        };
        for a in 0..dims.n1 {
            for b in 0..dims.n2 {
                for c in 0..dims.n3 {
                    scheme.u.push(unit(dims.u_len(), a * dims.n2 + b));
                    scheme.v.push(unit(dims.v_len(), b * dims.n3 + c));
                    scheme.w.push(unit(dims.w_len(), c * dims.n1 + a));
                }
            }
        }
        scheme.validate();
        scheme
    }

    /// Assemble from rows produced inside the crate; validates.
    pub(crate) fn from_parts(dims: Dims, ring: Ring, u: Vec<Row>, v: Vec<Row>, w: Vec<Row>) -> Self {
        let scheme = Self { dims, ring, u, v, w };
        scheme.validate();
        scheme
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn dims(&self) -> Dims {
        self.dims
    }

    pub fn ring(&self) -> Ring {
        self.ring
    }

    /// Number of multiplications
    pub fn rank(&self) -> usize {
        self.u.len()
    }

    pub fn u(&self) -> &[Row] {
        &self.u
    }

    pub fn v(&self) -> &[Row] {
        &self.v
    }

    pub fn w(&self) -> &[Row] {
        &self.w
    }

    /// Factor by role index (0 = U, 1 = V, 2 = W)
    pub fn factor(&self, factor: usize) -> &[Row] {
        match factor {
            0 => &self.u,
            1 => &self.v,
            _ => &self.w,
        }
    }

    /// Row `row` of `factor` as a matrix
    pub fn factor_matrix(&self, factor: usize, row: usize) -> Matrix {
        let (rows, columns) = self.dims.factor_shape(factor);
        algebra::reshape(&self.factor(factor)[row], rows, columns)
    }

    // ------------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------------

    /// Recompute every Brent equation
    pub fn check(&self) -> Result<(), SchemeError> {
        let d = self.dims;
        let mut products: Vec<(usize, Coeff)> = Vec::with_capacity(self.rank());

        for i in 0..d.u_len() {
            for j in 0..d.v_len() {
                products.clear();
                for r in 0..self.rank() {
                    let p = self.u[r][i] * self.v[r][j];
                    if !p.is_zero() {
                        products.push((r, p));
                    }
                }

                for k in 0..d.w_len() {
                    let sum = products
                        .iter()
                        .fold(Coeff::zero(), |acc, &(r, p)| acc + p * self.w[r][k]);
                    let expected = if d.target(i, j, k) { Coeff::one() } else { Coeff::zero() };
                    if self.ring.reduce(sum) != expected {
                        return Err(SchemeError::BrentViolation { i, j, k });
                    }
                }
            }
        }
        Ok(())
    }

    /// Panic if the Brent equations do not hold
    pub fn validate(&self) {
        if let Err(e) = self.check() {
            panic!("scheme {} (m = {}) is invalid: {e}", self.dims, self.rank());
        }
    }

    /// Re-validation after pure permutations; skipped in release builds
    #[inline]
    fn debug_validate(&self) {
        if cfg!(debug_assertions) {
            self.validate();
        }
    }

    // ------------------------------------------------------------------------
    // Symmetries
    // ------------------------------------------------------------------------

    /// Swap basis vectors `i1` and `i2` of the n1 index space (rows of A and C)
    pub fn swap_basis_rows(&mut self, i1: usize, i2: usize) {
        let d = self.dims;
        assert!(i1 < d.n1 && i2 < d.n1, "basis row out of range");
        if i1 == i2 {
            return;
        }
        let s = swap_index(i1, i2);
        remap(&mut self.u, |x| s(x / d.n2) * d.n2 + x % d.n2);
        remap(&mut self.w, |x| (x / d.n1) * d.n1 + s(x % d.n1));
        self.debug_validate();
    }

    /// Swap basis vectors `j1` and `j2` of the n3 index space (columns of B and C)
    pub fn swap_basis_columns(&mut self, j1: usize, j2: usize) {
        let d = self.dims;
        assert!(j1 < d.n3 && j2 < d.n3, "basis column out of range");
        if j1 == j2 {
            return;
        }
        let s = swap_index(j1, j2);
        remap(&mut self.v, |x| (x / d.n3) * d.n3 + s(x % d.n3));
        remap(&mut self.w, |x| s(x / d.n1) * d.n1 + x % d.n1);
        self.debug_validate();
    }

    /// Swap basis vectors `p1` and `p2` of the inner n2 index space
    pub fn swap_basis_inner(&mut self, p1: usize, p2: usize) {
        let d = self.dims;
        assert!(p1 < d.n2 && p2 < d.n2, "inner basis index out of range");
        if p1 == p2 {
            return;
        }
        let s = swap_index(p1, p2);
        remap(&mut self.u, |x| (x / d.n2) * d.n2 + s(x % d.n2));
        remap(&mut self.v, |x| s(x / d.n3) * d.n3 + x % d.n3);
        self.debug_validate();
    }

    /// (U, V, W) → (V, W, U); dimensions rotate to (n2, n3, n1)
    pub fn cycle_shift(&mut self) {
        let u = std::mem::take(&mut self.u);
        self.u = std::mem::replace(&mut self.v, std::mem::take(&mut self.w));
        self.w = u;
        self.dims = self.dims.rotated();
        self.debug_validate();
    }

    /// (U, V, W) → (Vᵀ, Uᵀ, Wᵀ); dimensions become (n3, n2, n1)
    pub fn transpose(&mut self) {
        let d = self.dims;
        let u = transpose_rows(&self.v, d.n2, d.n3);
        let v = transpose_rows(&self.u, d.n1, d.n2);
        let w = transpose_rows(&self.w, d.n3, d.n1);
        self.u = u;
        self.v = v;
        self.w = w;
        self.dims = d.transposed();
        self.debug_validate();
    }

    /// Change of basis: U → p·U·q⁻¹, V → q·V·r⁻¹, W → r·W·p⁻¹.
    ///
    /// `p`, `q` and `r` are n1×n1, n2×n2 and n3×n3. On error the scheme is
    /// left untouched.
    pub fn sandwiching(&mut self, p: &Matrix, q: &Matrix, r: &Matrix) -> Result<(), SchemeError> {
        let d = self.dims;
        let square = |m: &Matrix, n: usize| m.len() == n && m.iter().all(|row| row.len() == n);
        if !square(p, d.n1) || !square(q, d.n2) || !square(r, d.n3) {
            return Err(SchemeError::Shape("basis matrices of size n1, n2, n3"));
        }

        let inverse = |m: &Matrix, name: char| {
            algebra::inverse(m, self.ring).ok_or_else(|| {
                warn!(matrix = %name, ring = %self.ring, "sandwiching rejected: matrix not invertible");
                SchemeError::NotInvertible(name)
            })
        };
        let p_inv = inverse(p, 'p')?;
        let q_inv = inverse(q, 'q')?;
        let r_inv = inverse(r, 'r')?;

        let ring = self.ring;
        let conjugate = |rows: &[Row], left: &Matrix, right: &Matrix, shape: (usize, usize)| -> Vec<Row> {
            rows.iter()
                .map(|row| {
                    let m = algebra::reshape(row, shape.0, shape.1);
                    algebra::flatten(&algebra::matmul(&algebra::matmul(left, &m, ring), right, ring))
                })
                .collect()
        };
        let u = conjugate(&self.u, p, &q_inv, d.factor_shape(0));
        let v = conjugate(&self.v, q, &r_inv, d.factor_shape(1));
        let w = conjugate(&self.w, r, &p_inv, d.factor_shape(2));

        for (factor, rows) in [&u, &v, &w].into_iter().enumerate() {
            for (row, values) in rows.iter().enumerate() {
                if let Some((column, value)) = values.iter().enumerate().find(|(_, x)| !ring.admits(x)) {
                    warn!(%value, ring = %ring, "sandwiching rejected: entry leaves the ring");
                    return Err(SchemeError::OutsideRing {
                        matrix: FACTOR_NAMES[factor],
                        row,
                        column,
                        value: *value,
                        ring,
                    });
                }
            }
        }

        self.u = u;
        self.v = v;
        self.w = w;
        self.validate();
        Ok(())
    }

    /// Scale row `row` by α, β, γ in the three factors (α·β·γ = 1)
    pub fn scale_multiplication(&mut self, row: usize, alpha: Coeff, beta: Coeff, gamma: Coeff) -> Result<(), SchemeError> {
        if self.ring == Ring::Gf2 {
            return Err(SchemeError::RingUnsupported(self.ring));
        }
        if row >= self.rank() {
            return Err(SchemeError::OutOfRange {
                index: row,
                bound: self.rank(),
            });
        }
        let product = alpha * beta * gamma;
        if !product.is_one() {
            return Err(SchemeError::BadScaling(product));
        }

        let ring = self.ring;
        let scaled: Vec<Row> = [(&self.u[row], alpha), (&self.v[row], beta), (&self.w[row], gamma)]
            .into_iter()
            .map(|(values, factor)| values.iter().map(|x| x * factor).collect())
            .collect();
        for (factor, values) in scaled.iter().enumerate() {
            if let Some((column, value)) = values.iter().enumerate().find(|(_, x)| !ring.admits(x)) {
                return Err(SchemeError::OutsideRing {
                    matrix: FACTOR_NAMES[factor],
                    row,
                    column,
                    value: *value,
                    ring,
                });
            }
        }

        let [u, v, w]: [Row; 3] = scaled
            .try_into()
            .map_err(|_| SchemeError::Shape("three factors"))?;
        self.u[row] = u;
        self.v[row] = v;
        self.w[row] = w;
        self.validate();
        Ok(())
    }

    /// Reduce an integral scheme modulo 2
    pub fn to_gf2(&self) -> Result<Scheme, SchemeError> {
        if self.ring == Ring::Gf2 {
            return Ok(self.clone());
        }
        let reduce = |rows: &[Row]| -> Result<Vec<Row>, SchemeError> {
            rows.iter()
                .map(|row| {
                    row.iter()
                        .map(|x| {
                            if Ring::is_integral(x) {
                                Ok(Ring::Gf2.reduce(*x))
                            } else {
                                Err(SchemeError::NotIntegral(*x))
                            }
                        })
                        .collect()
                })
                .collect()
        };
        let scheme = Scheme::new(self.dims, Ring::Gf2, reduce(&self.u)?, reduce(&self.v)?, reduce(&self.w)?)?;
        debug!(from = self.rank(), to = scheme.rank(), "reduced scheme modulo 2");
        Ok(scheme)
    }

    /// Sort rows by U‖V‖W
    pub fn sort_multiplications(&mut self) {
        let mut order: Vec<usize> = (0..self.rank()).collect();
        order.sort_by(|&a, &b| self.row_key(a).cmp(self.row_key(b)));
        self.permute_rows(&order);
    }

    fn row_key(&self, r: usize) -> impl Iterator<Item = &Coeff> + Clone {
        self.u[r].iter().chain(&self.v[r]).chain(&self.w[r])
    }

    fn permute_rows(&mut self, order: &[usize]) {
        let pick = |rows: &[Row]| order.iter().map(|&r| rows[r].clone()).collect::<Vec<_>>();
        self.u = pick(&self.u);
        self.v = pick(&self.v);
        self.w = pick(&self.w);
    }

    /// Random invertible sandwiching, keeping the lowest-complexity variant.
    ///
    /// Returns the number of improvements found.
    pub fn minimize_complexity<R: rand::Rng + ?Sized>(&mut self, rng: &mut R, iterations: usize) -> usize {
        let d = self.dims;
        let mut best = self.complexity();
        let mut improvements = 0;

        for iteration in 0..iterations {
            let p = algebra::random_invertible(d.n1, self.ring, rng);
            let q = algebra::random_invertible(d.n2, self.ring, rng);
            let r = algebra::random_invertible(d.n3, self.ring, rng);

            let mut candidate = self.clone();
            if candidate.sandwiching(&p, &q, &r).is_err() {
                continue;
            }
            let complexity = candidate.complexity();
            if complexity < best {
                debug!(iteration, from = best, to = complexity, "complexity improved");
                best = complexity;
                *self = candidate;
                improvements += 1;
            }
        }
        improvements
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn swap_index(a: usize, b: usize) -> impl Fn(usize) -> usize {
    move |x| {
        if x == a {
            b
        } else if x == b {
            a
        } else {
            x
        }
    }
}

/// `row[x] ← row[map(x)]` for every row
fn remap(rows: &mut [Row], map: impl Fn(usize) -> usize) {
    for row in rows.iter_mut() {
        let permuted: Row = (0..row.len()).map(|x| row[map(x)]).collect();
        *row = permuted;
    }
}

/// View each row as a `rows × columns` matrix and transpose it
fn transpose_rows(values: &[Row], rows: usize, columns: usize) -> Vec<Row> {
    values
        .iter()
        .map(|row| {
            let mut out = vec![Coeff::zero(); rows * columns];
            for x in 0..rows {
                for y in 0..columns {
                    out[y * rows + x] = row[x * columns + y];
                }
            }
            out
        })
        .collect()
}
