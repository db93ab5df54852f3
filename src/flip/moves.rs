//! Local moves on the flip graph.
//!
//! Rows are rank-one tensors `a ⊗ b ⊗ c`. A move rewrites one or two rows
//! into an equal sum, so the Brent equations never need rechecking outside
//! debug builds. Every move reports the exact rank change:
//!
//! | move       | rank  |
//! |------------|-------|
//! | flip       | m     |
//! | plus/split | m + 1 |
//! | reduce     | m − 1 |
//!
//! Pairs whose rewrite would produce a zero factor are not candidates; those
//! are exactly the pairs [`BitPackedScheme::try_reduce`] and
//! [`BitPackedScheme::cancel_duplicates`] handle.

use indexmap::IndexMap;
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use super::{BitPackedScheme, full_mask};

/// Pairs of row indices grouped by a shared key, in first-seen order
fn pairs_by_key<K: std::hash::Hash + Eq>(keys: impl Iterator<Item = K>) -> Vec<(usize, usize)> {
    let mut groups: IndexMap<K, Vec<usize>> = IndexMap::new();
    for (r, key) in keys.enumerate() {
        groups.entry(key).or_default().push(r);
    }
    let mut pairs = Vec::new();
    for rows in groups.values() {
        for (x, &r1) in rows.iter().enumerate() {
            for &r2 in &rows[x + 1..] {
                pairs.push((r1, r2));
            }
        }
    }
    pairs
}

impl BitPackedScheme {
    // ========================================================================
    // FLIP
    // ========================================================================

    /// Rows sharing factor `shared` and differing in both others
    fn flip_candidates(&self, shared: usize) -> Vec<(usize, usize)> {
        let (j, k) = ((shared + 1) % 3, (shared + 2) % 3);
        pairs_by_key(self.uvw[shared].iter())
            .into_iter()
            .filter(|&(r1, r2)| self.uvw[j][r1] != self.uvw[j][r2] && self.uvw[k][r1] != self.uvw[k][r2])
            .collect()
    }

    /// One random flip.
    ///
    /// For rows `a ⊗ b1 ⊗ c1` and `a ⊗ b2 ⊗ c2` the pair becomes
    /// `a ⊗ (b1 + b2) ⊗ c1` and `a ⊗ b2 ⊗ (c1 + c2)`. The shared factor, the
    /// order of the other two and the direction of the pair are random.
    pub fn try_flip<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        let mut roles = [0, 1, 2];
        roles.shuffle(rng);

        for shared in roles {
            let candidates = self.flip_candidates(shared);
            if candidates.is_empty() {
                continue;
            }

            let (mut r1, mut r2) = candidates[rng.random_range(0..candidates.len())];
            if rng.random_bool(0.5) {
                std::mem::swap(&mut r1, &mut r2);
            }
            let (mut j, mut k) = ((shared + 1) % 3, (shared + 2) % 3);
            if rng.random_bool(0.5) {
                std::mem::swap(&mut j, &mut k);
            }

            self.uvw[j][r1] ^= self.uvw[j][r2];
            self.uvw[k][r2] ^= self.uvw[k][r1];
            debug!(shared, r1, r2, "flip");
            self.finish_move();
            return true;
        }
        false
    }

    // ========================================================================
    // PLUS / SPLIT
    // ========================================================================

    /// Whether a rank-increasing move is allowed
    fn can_grow(&self) -> bool {
        self.rank() < self.naive_rank()
    }

    /// Replace two rows differing in every factor by three rows.
    ///
    /// No-op (returns `false`) at the schoolbook rank or when every pair
    /// shares some factor.
    pub fn try_plus<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        if !self.can_grow() || self.rank() < 2 {
            return false;
        }

        let m = self.rank();
        let candidates: Vec<(usize, usize)> = (0..m)
            .flat_map(|r1| (r1 + 1..m).map(move |r2| (r1, r2)))
            .filter(|&(r1, r2)| (0..3).all(|f| self.uvw[f][r1] != self.uvw[f][r2]))
            .collect();
        if candidates.is_empty() {
            return false;
        }

        let (mut r1, mut r2) = candidates[rng.random_range(0..candidates.len())];
        if rng.random_bool(0.5) {
            std::mem::swap(&mut r1, &mut r2);
        }
        let mut roles = [0, 1, 2];
        roles.shuffle(rng);
        let [i, j, k] = roles;

        let (a1, b1, c1) = (self.uvw[i][r1], self.uvw[j][r1], self.uvw[k][r1]);
        let (a2, b2, c2) = (self.uvw[i][r2], self.uvw[j][r2], self.uvw[k][r2]);
        let (a, b, c) = (a1 ^ a2, b1 ^ b2, c1 ^ c2);

        let variant = rng.random_range(0..3);
        match variant {
            0 => {
                self.uvw[j][r1] = b;
                self.uvw[i][r2] = a;
                self.push_permuted(roles, [a1, b2, c]);
            }
            1 => {
                self.uvw[k][r1] = c;
                self.uvw[j][r2] = b;
                self.push_permuted(roles, [a, b1, c2]);
            }
            _ => {
                self.uvw[i][r1] = a;
                self.uvw[k][r2] = c;
                self.push_permuted(roles, [a2, b, c1]);
            }
        }
        debug!(r1, r2, variant, rank = self.rank(), "plus");
        self.finish_move();
        true
    }

    /// Split one factor of one row into two nonzero summands.
    pub fn try_split<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        if !self.can_grow() || self.rank() == 0 {
            return false;
        }

        let r = rng.random_range(0..self.rank());
        let lens = self.lens();
        let mut roles = [0, 1, 2];
        roles.shuffle(rng);

        for f in roles {
            let mask = full_mask(lens[f]);
            // a one-bit factor has a single nonzero value
            if mask < 2 {
                continue;
            }
            let current = self.uvw[f][r];
            let value = loop {
                let value = rng.random_range(1..=mask);
                if value != current {
                    break value;
                }
            };

            let mut row = self.row(r);
            row[f] = current ^ value;
            self.uvw[f][r] = value;
            self.push_row(row);
            debug!(row = r, factor = f, rank = self.rank(), "split");
            self.finish_move();
            return true;
        }
        false
    }

    /// `count` random plus or split moves; returns how many applied
    pub fn expand<R: Rng + ?Sized>(&mut self, count: usize, rng: &mut R) -> usize {
        let mut applied = 0;
        for _ in 0..count {
            let grew = if rng.random_bool(0.5) {
                self.try_plus(rng)
            } else {
                self.try_split(rng)
            };
            applied += usize::from(grew);
        }
        applied
    }

    // ========================================================================
    // REDUCE
    // ========================================================================

    /// Merge two rows equal in two factors and different in the third.
    pub fn try_reduce<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        let mut candidates: Vec<(usize, usize, usize)> = Vec::new();
        for merged in 0..3 {
            let (i, j) = ((merged + 1) % 3, (merged + 2) % 3);
            let keys = (0..self.rank()).map(|r| (self.uvw[i][r], self.uvw[j][r]));
            candidates.extend(
                pairs_by_key(keys)
                    .into_iter()
                    .filter(|&(r1, r2)| self.uvw[merged][r1] != self.uvw[merged][r2])
                    .map(|(r1, r2)| (merged, r1, r2)),
            );
        }
        if candidates.is_empty() {
            return false;
        }

        let (merged, r1, r2) = candidates[rng.random_range(0..candidates.len())];
        self.uvw[merged][r1] ^= self.uvw[merged][r2];
        self.remove_row(r2);
        debug!(merged, r1, r2, rank = self.rank(), "reduce");
        self.finish_move();
        true
    }

    /// Remove pairs of identical rows (they cancel over GF(2)); returns the
    /// number of pairs removed.
    pub fn cancel_duplicates(&mut self) -> usize {
        let pairs = pairs_by_key((0..self.rank()).map(|r| self.row(r)));
        let mut keep = vec![true; self.rank()];
        let mut removed = 0;
        for (r1, r2) in pairs {
            if keep[r1] && keep[r2] {
                keep[r1] = false;
                keep[r2] = false;
                removed += 1;
            }
        }
        if removed > 0 {
            self.retain_rows(&keep);
            debug!(pairs = removed, rank = self.rank(), "cancelled duplicate rows");
            self.finish_move();
        }
        removed
    }

    /// Reduce until no candidate is left; returns the total rank decrease
    pub fn reduce_all<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        let before = self.rank();
        loop {
            while self.try_reduce(rng) {}
            if self.cancel_duplicates() == 0 {
                break;
            }
        }
        before - self.rank()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::Ring;
    use crate::scheme::Dims;
    use crate::scheme::tests::strassen;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn packed_strassen() -> BitPackedScheme {
        BitPackedScheme::from_scheme(&strassen(Ring::Gf2)).unwrap()
    }

    #[test]
    fn test_flip_keeps_rank() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut scheme = BitPackedScheme::naive(Dims::square(2)).unwrap();
        for _ in 0..200 {
            let flipped = scheme.try_flip(&mut rng);
            assert_eq!(scheme.rank(), 8);
            assert!(scheme.check().is_ok());
            if !flipped {
                break;
            }
        }
    }

    #[test]
    fn test_strassen_has_no_flips() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut scheme = packed_strassen();
        assert!(!scheme.try_flip(&mut rng));
        assert!(!scheme.try_reduce(&mut rng));
        assert_eq!(scheme, packed_strassen());
    }

    #[test]
    fn test_plus_and_split_grow_by_one() {
        let mut rng = StdRng::seed_from_u64(3);
        for seed in 0..20 {
            let mut rng_case = StdRng::seed_from_u64(seed);
            let mut scheme = packed_strassen();
            assert!(scheme.try_plus(&mut rng_case));
            assert_eq!(scheme.rank(), 8);
            assert!(scheme.check().is_ok());

            let mut scheme = packed_strassen();
            assert!(scheme.try_split(&mut rng));
            assert_eq!(scheme.rank(), 8);
            assert!(scheme.check().is_ok());
        }
    }

    #[test]
    fn test_growth_capped_at_naive_rank() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut scheme = BitPackedScheme::naive(Dims::square(2)).unwrap();
        assert!(!scheme.try_plus(&mut rng));
        assert!(!scheme.try_split(&mut rng));
        assert_eq!(scheme.expand(5, &mut rng), 0);

        let mut scheme = packed_strassen();
        assert_eq!(scheme.expand(5, &mut rng), 1);
        assert_eq!(scheme.rank(), 8);
    }

    #[test]
    fn test_split_then_reduce() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut scheme = packed_strassen();
        assert!(scheme.try_split(&mut rng));
        assert!(scheme.try_reduce(&mut rng));
        assert_eq!(scheme.rank(), 7);
        assert!(scheme.check().is_ok());
    }

    #[test]
    fn test_cancel_duplicates() {
        let dims = Dims::square(1);
        let mut scheme = BitPackedScheme::from_masks(dims, vec![1; 3], vec![1; 3], vec![1; 3]).unwrap();
        assert_eq!(scheme.cancel_duplicates(), 1);
        assert_eq!(scheme.rank(), 1);
        assert_eq!(scheme.cancel_duplicates(), 0);
    }
}
