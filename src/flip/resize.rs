//! Moving between shapes: projection drops one basis index, extension adds
//! one with schoolbook products for the new slice.

use rand::Rng;
use tracing::debug;

use super::{BitPackedScheme, factor_width};
use crate::error::SchemeError;
use crate::scheme::Dims;

/// Re-lay a `rows × cols` matrix mask, sending entry (x, y) to `place(x, y)`
/// or dropping it on `None`.
fn relayout(mask: u128, rows: usize, cols: usize, place: impl Fn(usize, usize) -> Option<usize>) -> u128 {
    let mut out = 0;
    for x in 0..rows {
        for y in 0..cols {
            if mask >> (x * cols + y) & 1 == 1 {
                if let Some(bit) = place(x, y) {
                    out |= 1u128 << bit;
                }
            }
        }
    }
    out
}

fn as_array(dims: Dims) -> [usize; 3] {
    [dims.n1, dims.n2, dims.n3]
}

impl BitPackedScheme {
    /// Restrict to the shape with basis index `q` of dimension `p` removed.
    ///
    /// Dimension `p` indexes the rows of factor `p` and the columns of factor
    /// `p + 2 (mod 3)`; both lose that index. Rows left with a zero factor
    /// are dropped.
    pub fn project(&mut self, p: usize, q: usize) -> Result<(), SchemeError> {
        if p >= 3 {
            return Err(SchemeError::OutOfRange { index: p, bound: 3 });
        }
        if q >= self.n[p] {
            return Err(SchemeError::OutOfRange { index: q, bound: self.n[p] });
        }
        if self.n[p] < 2 {
            return Err(SchemeError::Shape("a dimension of at least 2 to project"));
        }

        let row_factor = p;
        let column_factor = (p + 2) % 3;
        let (rows, cols) = (self.n[p], self.n[(p + 1) % 3]);
        for mask in &mut self.uvw[row_factor] {
            *mask = relayout(*mask, rows, cols, |x, y| match x.cmp(&q) {
                std::cmp::Ordering::Less => Some(x * cols + y),
                std::cmp::Ordering::Equal => None,
                std::cmp::Ordering::Greater => Some((x - 1) * cols + y),
            });
        }

        let (rows, cols) = (self.n[column_factor], self.n[p]);
        for mask in &mut self.uvw[column_factor] {
            *mask = relayout(*mask, rows, cols, |x, y| match y.cmp(&q) {
                std::cmp::Ordering::Less => Some(x * (cols - 1) + y),
                std::cmp::Ordering::Equal => None,
                std::cmp::Ordering::Greater => Some(x * (cols - 1) + y - 1),
            });
        }

        self.n[p] -= 1;
        let dropped = self.remove_zeroes();
        debug!(p, q, dims = %self.dims(), rank = self.rank(), dropped, "projected");
        self.debug_validate();
        Ok(())
    }

    /// Grow dimension `p` by one, covering the new slice with schoolbook
    /// products.
    pub fn extend(&mut self, p: usize) -> Result<(), SchemeError> {
        if p >= 3 {
            return Err(SchemeError::OutOfRange { index: p, bound: 3 });
        }
        let mut n = self.n;
        n[p] += 1;
        for f in 0..3 {
            factor_width(n, f).ok_or(SchemeError::TooWide(n[f] * n[(f + 1) % 3]))?;
        }

        // rows of factor p are appended at the end, so only the column
        // factor needs re-laying
        let column_factor = (p + 2) % 3;
        let (rows, cols) = (self.n[column_factor], self.n[p]);
        for mask in &mut self.uvw[column_factor] {
            *mask = relayout(*mask, rows, cols, |x, y| Some(x * (cols + 1) + y));
        }

        let added = self.n[p];
        self.n = n;
        let [n1, n2, n3] = n;
        for a in 0..n1 {
            for b in 0..n2 {
                for c in 0..n3 {
                    if [a, b, c][p] == added {
                        self.push_row([1 << (a * n2 + b), 1 << (b * n3 + c), 1 << (c * n1 + a)]);
                    }
                }
            }
        }

        debug!(p, dims = %self.dims(), rank = self.rank(), "extended");
        self.debug_validate();
        Ok(())
    }

    /// Project a random dimension that stays at or above `min`, then reduce.
    pub fn try_project<R: Rng + ?Sized>(&mut self, min: Dims, rng: &mut R) -> bool {
        let min = as_array(min);
        let fits = self.n.iter().zip(min).all(|(&n, lo)| n >= lo);
        if !fits {
            return false;
        }
        let eligible: Vec<usize> = (0..3).filter(|&p| self.n[p] > min[p].max(1)).collect();
        if eligible.is_empty() {
            return false;
        }

        let p = eligible[rng.random_range(0..eligible.len())];
        let q = rng.random_range(0..self.n[p]);
        if self.project(p, q).is_err() {
            return false;
        }
        self.reduce_all(rng);
        true
    }

    /// Extend a random dimension that stays at or below `max`, then reduce.
    pub fn try_extend<R: Rng + ?Sized>(&mut self, max: Dims, rng: &mut R) -> bool {
        let max = as_array(max);
        let fits = self.n.iter().zip(max).all(|(&n, hi)| n <= hi);
        if !fits {
            return false;
        }
        let eligible: Vec<usize> = (0..3)
            .filter(|&p| {
                let mut n = self.n;
                n[p] += 1;
                n[p] <= max[p] && (0..3).all(|f| factor_width(n, f).is_some())
            })
            .collect();
        if eligible.is_empty() {
            return false;
        }

        let p = eligible[rng.random_range(0..eligible.len())];
        if self.extend(p).is_err() {
            return false;
        }
        self.reduce_all(rng);
        true
    }
}
