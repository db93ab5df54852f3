//! Quantities that do not change under the symmetries used by [`Scheme::sort`]
//! (and, for the rank-based ones, under sandwiching).

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use super::Scheme;
use crate::algebra;

/// Rank triple of one multiplication (U, V, W factors as matrices)
pub type RankTriple = (usize, usize, usize);

const PERMUTATIONS: [[usize; 3]; 6] = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// `x`, `x^3`, or nothing for power 0
fn power(name: &str, power: usize) -> String {
    match power {
        0 => String::new(),
        1 => name.to_string(),
        p => format!("{name}^{p}"),
    }
}

/// Coefficient prefix, omitted when 1
fn count(count: usize) -> String {
    if count == 1 {
        String::new()
    } else {
        count.to_string()
    }
}

fn pick(triple: RankTriple, order: [usize; 3]) -> RankTriple {
    let t = [triple.0, triple.1, triple.2];
    (t[order[0]], t[order[1]], t[order[2]])
}

impl Scheme {
    /// Per-row ranks of the three factor matrices
    pub fn ranks(&self) -> Vec<RankTriple> {
        (0..self.rank())
            .map(|r| {
                let rank_of = |factor| algebra::rank(&self.factor_matrix(factor, r), self.ring);
                (rank_of(0), rank_of(1), rank_of(2))
            })
            .collect()
    }

    /// Polynomial in x, y, z over all role permutations of the rank triples
    pub fn invariant_f(&self) -> String {
        let mut counts: BTreeMap<RankTriple, usize> = BTreeMap::new();
        for triple in self.ranks() {
            for order in PERMUTATIONS {
                *counts.entry(pick(triple, order)).or_default() += 1;
            }
        }

        let mut terms: Vec<(RankTriple, usize)> = counts.into_iter().collect();
        terms.sort_by_key(|&((a, b, c), _)| std::cmp::Reverse((a + b + c, a + b, (a, b, c))));
        terms
            .iter()
            .map(|&((a, b, c), n)| format!("{}{}{}{}", count(n), power("x", a), power("y", b), power("z", c)))
            .collect::<Vec<_>>()
            .join(" + ")
    }

    /// Total rank per factor matrix, as a polynomial in w
    pub fn invariant_g(&self) -> String {
        let ranks = self.ranks();
        let totals = [
            ranks.iter().map(|r| r.0).sum::<usize>(),
            ranks.iter().map(|r| r.1).sum(),
            ranks.iter().map(|r| r.2).sum(),
        ];

        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for total in totals {
            *counts.entry(total).or_default() += 1;
        }
        counts
            .iter()
            .rev()
            .map(|(&rank, &n)| format!("{}{}", count(n), power("w", rank)))
            .collect::<Vec<_>>()
            .join(" + ")
    }

    /// Nonzero trilinear terms grouped by how many index conditions they meet
    pub fn term_counts(&self) -> [usize; 4] {
        let d = self.dims;
        let mut terms = [0usize; 4];

        for r in 0..self.rank() {
            let nonzero = |values: &[crate::ring::Coeff]| -> Vec<usize> {
                (0..values.len()).filter(|&x| !self.ring.is_zero(&values[x])).collect()
            };
            let (us, vs, ws) = (nonzero(&self.u[r]), nonzero(&self.v[r]), nonzero(&self.w[r]));

            for &i in &us {
                for &j in &vs {
                    for &k in &ws {
                        let (i1, i2) = (i / d.n2, i % d.n2);
                        let (j1, j2) = (j / d.n3, j % d.n3);
                        let (k1, k2) = (k / d.n1, k % d.n1);
                        let matched = usize::from(i2 == j1) + usize::from(i1 == k2) + usize::from(j2 == k1);
                        terms[matched] += 1;
                    }
                }
            }
        }
        terms
    }

    /// Polynomial in t of [`Scheme::term_counts`] with the total in brackets
    pub fn invariant_h(&self) -> String {
        let terms = self.term_counts();
        let parts: Vec<String> = (0..4)
            .rev()
            .map(|p| {
                if p == 0 {
                    terms[0].to_string()
                } else {
                    format!("{}{}", count(terms[p]), power("t", p))
                }
            })
            .collect();
        format!("{} ({})", parts.join(" + "), terms.iter().sum::<usize>())
    }

    /// Compact label of the multiset of rank triples.
    ///
    /// Triples are taken in the role order whose sorted flattening is
    /// largest, mapped to letters and run-length encoded (`6ah`). Shapes too
    /// large for 52 letters get a SHA-256 prefix instead.
    pub fn rank_pattern(&self) -> String {
        let ranks = self.ranks();
        let sorted = PERMUTATIONS
            .iter()
            .map(|&order| {
                let mut permuted: Vec<RankTriple> = ranks.iter().map(|&t| pick(t, order)).collect();
                permuted.sort_unstable();
                permuted
            })
            .max()
            .unwrap_or_default();

        let n = self.dims.max();
        if n * n * n > LETTERS.len() {
            let mut hasher = Sha256::new();
            for (a, b, c) in &sorted {
                hasher.update(format!("{a},{b},{c};"));
            }
            let digest = hasher.finalize();
            return digest.iter().take(8).map(|byte| format!("{byte:02x}")).collect();
        }

        let letter = |(a, b, c): RankTriple| LETTERS[((a - 1) * n + (b - 1)) * n + (c - 1)] as char;
        let mut pattern = String::new();
        let mut i = 0;
        while i < sorted.len() {
            let run = sorted[i..].iter().take_while(|&&t| t == sorted[i]).count();
            if run > 1 {
                pattern.push_str(&run.to_string());
            }
            pattern.push(letter(sorted[i]));
            i += run;
        }
        pattern
    }

    /// Total number of nonzero trilinear terms
    pub fn weight(&self) -> usize {
        self.term_counts().iter().sum()
    }

    /// Nonzero entries of U, V and W
    pub fn ones(&self) -> [usize; 3] {
        [0, 1, 2].map(|f| {
            self.factor(f)
                .iter()
                .flatten()
                .filter(|x| !self.ring.is_zero(x))
                .count()
        })
    }

    /// Nonzero entries per column of U, V and W
    pub fn column_ones(&self) -> [Vec<usize>; 3] {
        let lens = self.dims.lens();
        [0, 1, 2].map(|f| {
            (0..lens[f])
                .map(|c| self.factor(f).iter().filter(|row| !self.ring.is_zero(&row[c])).count())
                .collect()
        })
    }

    /// Additions needed by the naive evaluation of the scheme
    pub fn complexity(&self) -> i64 {
        let ones: usize = self.ones().iter().sum();
        ones as i64 - (2 * self.rank() + self.dims.u_len()) as i64
    }
}
