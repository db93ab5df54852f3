//! Small dense linear algebra over the scheme rings.
//!
//! Matrices here are tiny (at most the scheme dimension on a side), so plain
//! `Vec<Vec<Coeff>>` with exact arithmetic is used throughout. Gf2 work is
//! done modulo 2; the characteristic-zero rings eliminate over ℚ and, for ℤ
//! and the ternary ring, check integrality of the result afterwards.

use num_traits::{One, Signed, Zero};
use rand::Rng;

use crate::ring::{Coeff, Ring};

/// Dense row-major matrix
pub type Matrix = Vec<Vec<Coeff>>;

/// The n×n identity
pub fn identity(n: usize) -> Matrix {
    (0..n)
        .map(|i| (0..n).map(|j| if i == j { Coeff::one() } else { Coeff::zero() }).collect())
        .collect()
}

/// Reshape a flat row-major vector into `rows × columns`
pub fn reshape(values: &[Coeff], rows: usize, columns: usize) -> Matrix {
    debug_assert_eq!(values.len(), rows * columns);
    values.chunks(columns).map(|row| row.to_vec()).collect()
}

/// Flatten row-major
pub fn flatten(matrix: &Matrix) -> Vec<Coeff> {
    matrix.iter().flatten().copied().collect()
}

/// Matrix product `a · b`, reduced in `ring`
pub fn matmul(a: &Matrix, b: &Matrix, ring: Ring) -> Matrix {
    let inner = b.len();
    let columns = b.first().map_or(0, Vec::len);
    a.iter()
        .map(|row| {
            debug_assert_eq!(row.len(), inner);
            (0..columns)
                .map(|j| {
                    let sum = (0..inner).fold(Coeff::zero(), |acc, k| acc + row[k] * b[k][j]);
                    ring.reduce(sum)
                })
                .collect()
        })
        .collect()
}

/// The field elimination happens in (Gf2 stays Gf2, everything else is ℚ)
fn field_of(ring: Ring) -> Ring {
    match ring {
        Ring::Gf2 => Ring::Gf2,
        _ => Ring::Rational,
    }
}

/// Row-reduce in place to reduced row echelon form; returns the rank.
fn row_reduce(matrix: &mut Matrix, field: Ring) -> usize {
    let rows = matrix.len();
    let columns = matrix.first().map_or(0, Vec::len);
    for row in matrix.iter_mut() {
        for value in row.iter_mut() {
            *value = field.reduce(*value);
        }
    }

    let mut rank = 0;
    for column in 0..columns {
        if rank == rows {
            break;
        }
        let Some(pivot) = (rank..rows).find(|&r| !matrix[r][column].is_zero()) else {
            continue;
        };
        matrix.swap(rank, pivot);

        let inv = match field.inverse(matrix[rank][column]) {
            Some(inv) => inv,
            None => continue,
        };
        for value in matrix[rank].iter_mut() {
            *value = field.mul(*value, inv);
        }

        for r in 0..rows {
            if r == rank || matrix[r][column].is_zero() {
                continue;
            }
            let factor = matrix[r][column];
            for c in 0..columns {
                let delta = field.mul(factor, matrix[rank][c]);
                matrix[r][c] = field.sub(matrix[r][c], delta);
            }
        }
        rank += 1;
    }
    rank
}

/// Rank over the ring (over ℚ for the characteristic-zero rings)
pub fn rank(matrix: &Matrix, ring: Ring) -> usize {
    let mut work = matrix.clone();
    row_reduce(&mut work, field_of(ring))
}

fn det2(a: Coeff, b: Coeff, c: Coeff, d: Coeff) -> Coeff {
    a * d - b * c
}

/// Determinant, reduced in `ring`.
///
/// Closed forms for 1×1 to 3×3, Gaussian elimination above that.
pub fn determinant(matrix: &Matrix, ring: Ring) -> Coeff {
    let n = matrix.len();
    let m = matrix;
    let value = match n {
        0 => Coeff::one(),
        1 => m[0][0],
        2 => det2(m[0][0], m[0][1], m[1][0], m[1][1]),
        3 => {
            m[0][0] * det2(m[1][1], m[1][2], m[2][1], m[2][2])
                - m[0][1] * det2(m[1][0], m[1][2], m[2][0], m[2][2])
                + m[0][2] * det2(m[1][0], m[1][1], m[2][0], m[2][1])
        }
        _ => return determinant_by_elimination(matrix, ring),
    };
    ring.reduce(value)
}

fn determinant_by_elimination(matrix: &Matrix, ring: Ring) -> Coeff {
    let field = field_of(ring);
    let n = matrix.len();
    let mut work: Matrix = matrix
        .iter()
        .map(|row| row.iter().map(|v| field.reduce(*v)).collect())
        .collect();
    let mut det = Coeff::one();

    for column in 0..n {
        let Some(pivot) = (column..n).find(|&r| !work[r][column].is_zero()) else {
            return Coeff::zero();
        };
        if pivot != column {
            work.swap(pivot, column);
            det = field.neg(det);
        }
        let p = work[column][column];
        det = field.mul(det, p);
        let Some(inv) = field.inverse(p) else {
            return Coeff::zero();
        };
        for r in column + 1..n {
            let factor = field.mul(work[r][column], inv);
            if factor.is_zero() {
                continue;
            }
            for c in column..n {
                let delta = field.mul(factor, work[column][c]);
                work[r][c] = field.sub(work[r][c], delta);
            }
        }
    }
    ring.reduce(det)
}

/// Adjugate for n ≤ 3 (transpose of the cofactor matrix)
fn adjugate_small(m: &Matrix) -> Matrix {
    match m.len() {
        1 => vec![vec![Coeff::one()]],
        2 => vec![vec![m[1][1], -m[0][1]], vec![-m[1][0], m[0][0]]],
        _ => {
            let cofactor = |r: usize, c: usize| {
                let rows: Vec<usize> = (0..3).filter(|&i| i != r).collect();
                let cols: Vec<usize> = (0..3).filter(|&j| j != c).collect();
                let minor = det2(
                    m[rows[0]][cols[0]],
                    m[rows[0]][cols[1]],
                    m[rows[1]][cols[0]],
                    m[rows[1]][cols[1]],
                );
                if (r + c) % 2 == 0 { minor } else { -minor }
            };
            (0..3).map(|i| (0..3).map(|j| cofactor(j, i)).collect()).collect()
        }
    }
}

/// Inverse over the ring, or `None` if the matrix is not invertible there.
///
/// Over ℤ (and the ternary ring) this means the determinant is ±1; the
/// inverse itself may have entries outside {−1, 0, 1}.
pub fn inverse(matrix: &Matrix, ring: Ring) -> Option<Matrix> {
    let n = matrix.len();
    if matrix.iter().any(|row| row.len() != n) {
        return None;
    }

    let result = if (1..=3).contains(&n) {
        let det_inv = ring.inverse(determinant(matrix, ring))?;
        adjugate_small(matrix)
            .into_iter()
            .map(|row| row.into_iter().map(|v| ring.mul(v, det_inv)).collect())
            .collect()
    } else {
        inverse_by_elimination(matrix, field_of(ring))?
    };

    let integral = matches!(ring, Ring::Integer | Ring::Ternary);
    if integral && result.iter().flatten().any(|v: &Coeff| !v.is_integer()) {
        return None;
    }
    Some(result)
}

fn inverse_by_elimination(matrix: &Matrix, field: Ring) -> Option<Matrix> {
    let n = matrix.len();
    let mut augmented: Matrix = matrix
        .iter()
        .zip(identity(n))
        .map(|(row, id)| row.iter().copied().chain(id).collect())
        .collect();

    let rank = row_reduce(&mut augmented, field);
    if rank < n || (0..n).any(|i| augmented[i][i].is_zero()) {
        return None;
    }
    Some(augmented.into_iter().map(|row| row[n..].to_vec()).collect())
}

/// A random invertible n×n matrix over `ring`.
///
/// Built as a product of random elementary row operations (additions with
/// ±1 and swaps) applied to the identity, so the determinant is a unit and
/// the loop always terminates. Additions that would leave an entry outside
/// {-1, 0, 1} are skipped, keeping every entry ternary.
pub fn random_invertible<R: Rng + ?Sized>(n: usize, ring: Ring, rng: &mut R) -> Matrix {
    let mut matrix = identity(n);
    if n < 2 {
        return matrix;
    }

    let bound = Coeff::one();
    let steps = 2 * n * n;
    for _ in 0..steps {
        let a = rng.random_range(0..n);
        let b = rng.random_range(0..n);
        if a == b {
            continue;
        }
        if rng.random_bool(0.25) {
            matrix.swap(a, b);
            continue;
        }
        let sign = if ring == Ring::Gf2 || rng.random_bool(0.5) {
            Coeff::one()
        } else {
            -Coeff::one()
        };
        let row: Vec<Coeff> = (0..n)
            .map(|c| ring.reduce(matrix[a][c] + matrix[b][c] * sign))
            .collect();
        if row.iter().all(|x| x.abs() <= bound) {
            matrix[a] = row;
        }
    }
    matrix
}
