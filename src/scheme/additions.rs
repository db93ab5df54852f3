//! Common-subexpression reduction of a scheme's additions.
//!
//! Evaluating a scheme needs three families of linear forms:
//!
//! - one per product over the entries of A (the rows of U);
//! - one per product over the entries of B (the rows of V);
//! - one per output entry over the products (the columns of W).
//!
//! A linear form with `k` terms costs `k - 1` additions. When a
//! subexpression (or its negation) appears in several forms it is computed
//! once as a fresh variable and substituted everywhere, which is what
//! [`AdditionReducer`] searches for.
//!
//! Candidate subexpressions are enumerated as all term subsets of size
//! `2..=max_size` of every form, so `max_size` bounds the cost of a pass.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use num_traits::{One, Zero};
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Dims, Row, Scheme};
use crate::error::SchemeError;
use crate::flip::BitPackedScheme;
use crate::record::Entry;
use crate::ring::{Coeff, Ring};

/// (variable index, coefficient), kept sorted inside a form
type Term = (usize, Coeff);

/// How subexpressions are picked
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReductionMode {
    /// Always a best-scoring subexpression (ties broken at random)
    Greedy,
    /// Any profitable subexpression, weighted by its score
    Random,
    /// Greedy or random, chosen per attempt
    Hybrid,
}

impl fmt::Display for ReductionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReductionMode::Greedy => "greedy",
            ReductionMode::Random => "random",
            ReductionMode::Hybrid => "hybrid",
        };
        f.write_str(name)
    }
}

impl FromStr for ReductionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "greedy" => Ok(ReductionMode::Greedy),
            "random" => Ok(ReductionMode::Random),
            "hybrid" => Ok(ReductionMode::Hybrid),
            other => Err(format!("unknown reduction mode `{other}` (greedy, random, hybrid)")),
        }
    }
}

/// One term of a persisted linear form
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearTerm {
    pub index: usize,
    pub value: Entry,
}

/// Addition counts before and after reduction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionCount {
    pub naive: usize,
    pub reduced: usize,
}

/// A scheme rewritten with fresh intermediate variables.
///
/// In each family, variable indices below the family's real count (n1·n2
/// for U, n2·n3 for V, m for W) are inputs; index `real + j` is the fresh
/// variable defined by `*_fresh[j]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reduced {
    pub n: Dims,
    pub m: usize,
    pub z2: bool,
    pub ring: Ring,
    pub complexity: AdditionCount,
    pub u_fresh: Vec<Vec<LinearTerm>>,
    pub v_fresh: Vec<Vec<LinearTerm>>,
    pub w_fresh: Vec<Vec<LinearTerm>>,
    pub u: Vec<Vec<LinearTerm>>,
    pub v: Vec<Vec<LinearTerm>>,
    pub w: Vec<Vec<LinearTerm>>,
}

/// Search settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdditionReducer {
    /// Independent attempts per family; the cheapest is kept
    pub max_loops: usize,
    /// Largest subexpression considered
    pub max_size: usize,
}

impl Default for AdditionReducer {
    fn default() -> Self {
        Self {
            max_loops: 50,
            max_size: 10,
        }
    }
}

// ============================================================================
// ONE FAMILY OF LINEAR FORMS
// ============================================================================

/// Forms plus the fresh variables introduced so far
#[derive(Clone)]
struct Forms {
    ring: Ring,
    real: usize,
    forms: Vec<Vec<Term>>,
    fresh: Vec<Vec<Term>>,
}

fn cost(forms: &[Vec<Term>]) -> usize {
    forms.iter().map(|form| form.len().saturating_sub(1)).sum()
}

/// Every `size`-subset of `terms`, in lexicographic order
fn for_each_subset(terms: &[Term], size: usize, visit: &mut impl FnMut(Vec<Term>)) {
    fn walk(terms: &[Term], size: usize, start: usize, current: &mut Vec<Term>, visit: &mut impl FnMut(Vec<Term>)) {
        if current.len() == size {
            visit(current.clone());
            return;
        }
        let needed = size - current.len();
        for i in start..=terms.len() - needed {
            current.push(terms[i]);
            walk(terms, size, i + 1, current, visit);
            current.pop();
        }
    }
    if size <= terms.len() {
        walk(terms, size, 0, &mut Vec::with_capacity(size), visit);
    }
}

fn contains_all(form: &[Term], subset: &[Term]) -> bool {
    subset.iter().all(|term| form.binary_search(term).is_ok())
}

impl Forms {
    fn new(ring: Ring, real: usize, forms: Vec<Vec<Term>>) -> Self {
        Self {
            ring,
            real,
            forms,
            fresh: Vec::new(),
        }
    }

    fn cost(&self) -> usize {
        cost(&self.forms) + cost(&self.fresh)
    }

    /// Score `(len - 1)·(count - 1)` of every subexpression of size `2..=max_size`
    fn scores(&self, max_size: usize) -> IndexMap<Vec<Term>, usize> {
        let mut counts: IndexMap<Vec<Term>, usize> = IndexMap::new();
        for form in self.forms.iter().chain(&self.fresh) {
            for size in 2..=max_size.min(form.len()) {
                for_each_subset(form, size, &mut |subset| *counts.entry(subset).or_default() += 1);
            }
        }
        counts
            .into_iter()
            .map(|(subset, count)| {
                let score = (subset.len() - 1) * (count - 1);
                (subset, score)
            })
            .collect()
    }

    /// Introduce a fresh variable for `subset` and substitute it (or its
    /// negation) wherever it occurs
    fn substitute(&mut self, subset: &[Term]) {
        let ring = self.ring;
        let var = self.real + self.fresh.len();
        let mut negated: Vec<Term> = subset.iter().map(|&(i, c)| (i, ring.neg(c))).collect();
        negated.sort_unstable();

        for form in self.forms.iter_mut().chain(self.fresh.iter_mut()) {
            let coefficient = if contains_all(form, subset) {
                Coeff::one()
            } else if contains_all(form, &negated) {
                ring.neg(Coeff::one())
            } else {
                continue;
            };
            let removed: &[Term] = if coefficient.is_one() { subset } else { &negated };
            form.retain(|term| removed.binary_search(term).is_err());
            // `var` exceeds every index already present
            form.push((var, coefficient));
        }
        self.fresh.push(subset.to_vec());
    }

    fn reduce_greedy<R: Rng + ?Sized>(&mut self, max_size: usize, rng: &mut R) {
        loop {
            let scores = self.scores(max_size);
            let best = scores.values().copied().max().unwrap_or(0);
            if best == 0 {
                return;
            }
            let ties: Vec<&Vec<Term>> = scores
                .iter()
                .filter(|&(_, &score)| score == best)
                .map(|(subset, _)| subset)
                .collect();
            let Some(&subset) = ties.choose(rng) else {
                return;
            };
            let subset = subset.clone();
            self.substitute(&subset);
        }
    }

    fn reduce_random<R: Rng + ?Sized>(&mut self, max_size: usize, rng: &mut R) {
        if max_size < 2 {
            return;
        }
        loop {
            let size = rng.random_range(2..=max_size);
            let profitable: Vec<(Vec<Term>, usize)> = self
                .scores(size)
                .into_iter()
                .filter(|&(_, score)| score > 0)
                .collect();
            let Ok((subset, _)) = profitable.choose_weighted(rng, |&(_, score)| score) else {
                return;
            };
            let subset = subset.clone();
            self.substitute(&subset);
        }
    }

    /// Cheapest of `loops` attempts
    fn reduce<R: Rng + ?Sized>(&self, mode: ReductionMode, loops: usize, max_size: usize, rng: &mut R) -> Forms {
        let max_size = max_size.min(self.real);
        let mut best: Option<Forms> = None;
        for _ in 0..loops.max(1) {
            let greedy = match mode {
                ReductionMode::Greedy => true,
                ReductionMode::Random => false,
                ReductionMode::Hybrid => rng.random_bool(0.5),
            };
            let mut attempt = self.clone();
            if greedy {
                attempt.reduce_greedy(max_size, rng);
            } else {
                attempt.reduce_random(max_size, rng);
            }
            if best.as_ref().is_none_or(|b| attempt.cost() < b.cost()) {
                best = Some(attempt);
            }
        }
        best.unwrap_or_else(|| self.clone())
    }
}

fn to_linear(forms: &[Vec<Term>]) -> Vec<Vec<LinearTerm>> {
    forms
        .iter()
        .map(|form| {
            form.iter()
                .map(|&(index, value)| LinearTerm { index, value: Entry(value) })
                .collect()
        })
        .collect()
}

fn nonzero_terms(values: impl Iterator<Item = Coeff>, ring: Ring) -> Vec<Term> {
    values.enumerate().filter(|(_, c)| !ring.is_zero(c)).collect()
}

// ============================================================================
// REDUCER
// ============================================================================

impl AdditionReducer {
    pub fn new(max_loops: usize, max_size: usize) -> Self {
        Self { max_loops, max_size }
    }

    /// Reduce the additions of U, V and W independently
    pub fn reduce<R: Rng + ?Sized>(&self, scheme: &Scheme, mode: ReductionMode, rng: &mut R) -> Reduced {
        let d = scheme.dims();
        let ring = scheme.ring();
        let m = scheme.rank();

        let rows = |factor: &[Row]| -> Vec<Vec<Term>> {
            factor.iter().map(|row| nonzero_terms(row.iter().copied(), ring)).collect()
        };
        let w_columns: Vec<Vec<Term>> = (0..d.w_len())
            .map(|k| nonzero_terms(scheme.w().iter().map(|row| row[k]), ring))
            .collect();

        let families = [
            Forms::new(ring, d.u_len(), rows(scheme.u())),
            Forms::new(ring, d.v_len(), rows(scheme.v())),
            Forms::new(ring, m, w_columns),
        ];
        let naive = families.iter().map(Forms::cost).sum();
        let [u, v, w] = families.map(|family| family.reduce(mode, self.max_loops, self.max_size, &mut *rng));
        let reduced = u.cost() + v.cost() + w.cost();
        debug!(%mode, naive, reduced, "reduced additions");

        Reduced {
            n: d,
            m,
            z2: ring == Ring::Gf2,
            ring,
            complexity: AdditionCount { naive, reduced },
            u_fresh: to_linear(&u.fresh),
            v_fresh: to_linear(&v.fresh),
            w_fresh: to_linear(&w.fresh),
            u: to_linear(&u.forms),
            v: to_linear(&v.forms),
            w: to_linear(&w.forms),
        }
    }

    /// Reduce, then keep reducing along up to `flips` flip-graph moves,
    /// returning the cheapest result.
    ///
    /// Flips need a GF(2) scheme; other rings are reduced once.
    pub fn reduce_with_flips<R: Rng + ?Sized>(
        &self,
        scheme: &Scheme,
        mode: ReductionMode,
        flips: usize,
        rng: &mut R,
    ) -> Result<Reduced, SchemeError> {
        let mut best = self.reduce(scheme, mode, rng);
        if scheme.ring() != Ring::Gf2 || flips == 0 {
            return Ok(best);
        }

        let mut packed = BitPackedScheme::from_scheme(scheme)?;
        for flip in 0..flips {
            if !packed.try_flip(rng) {
                break;
            }
            let reduced = self.reduce(&packed.to_scheme(), mode, rng);
            if reduced.complexity.reduced < best.complexity.reduced {
                debug!(flip, additions = reduced.complexity.reduced, "fewer additions after flip");
                best = reduced;
            }
        }
        info!(
            naive = best.complexity.naive,
            reduced = best.complexity.reduced,
            "addition reduction finished"
        );
        Ok(best)
    }
}

// ============================================================================
// REBUILDING
// ============================================================================

/// Dense value of every fresh variable of one family over its real inputs
struct Expander<'a> {
    ring: Ring,
    real: usize,
    fresh: &'a [Vec<LinearTerm>],
    memo: Vec<Option<Row>>,
    visiting: Vec<bool>,
}

impl<'a> Expander<'a> {
    fn new(ring: Ring, real: usize, fresh: &'a [Vec<LinearTerm>]) -> Self {
        Self {
            ring,
            real,
            fresh,
            memo: vec![None; fresh.len()],
            visiting: vec![false; fresh.len()],
        }
    }

    fn expand(&mut self, form: &[LinearTerm]) -> Result<Row, SchemeError> {
        let mut dense = vec![Coeff::zero(); self.real];
        for term in form {
            let coefficient = term.value.0;
            if term.index < self.real {
                dense[term.index] = self.ring.add(dense[term.index], coefficient);
                continue;
            }
            let inner = self.fresh_value(term.index)?;
            for (x, value) in dense.iter_mut().zip(inner) {
                *x = self.ring.add(*x, self.ring.mul(coefficient, value));
            }
        }
        Ok(dense)
    }

    fn fresh_value(&mut self, index: usize) -> Result<Row, SchemeError> {
        let j = index - self.real;
        if j >= self.fresh.len() {
            return Err(SchemeError::OutOfRange {
                index,
                bound: self.real + self.fresh.len(),
            });
        }
        if let Some(row) = &self.memo[j] {
            return Ok(row.clone());
        }
        if self.visiting[j] {
            return Err(SchemeError::Shape("fresh variables without cyclic definitions"));
        }
        self.visiting[j] = true;
        let fresh = self.fresh;
        let row = self.expand(&fresh[j])?;
        self.visiting[j] = false;
        self.memo[j] = Some(row.clone());
        Ok(row)
    }
}

impl Reduced {
    /// Substitute every fresh variable back and rebuild the scheme
    pub fn rebuild(&self) -> Result<Scheme, SchemeError> {
        let d = self.n;
        let expand_all = |real: usize, fresh: &[Vec<LinearTerm>], forms: &[Vec<LinearTerm>]| {
            let mut expander = Expander::new(self.ring, real, fresh);
            forms.iter().map(|form| expander.expand(form)).collect::<Result<Vec<Row>, _>>()
        };

        let u = expand_all(d.u_len(), &self.u_fresh, &self.u)?;
        let v = expand_all(d.v_len(), &self.v_fresh, &self.v)?;
        let w_columns = expand_all(self.m, &self.w_fresh, &self.w)?;
        if w_columns.len() != d.w_len() {
            return Err(SchemeError::Shape("one W form per output entry"));
        }
        let w: Vec<Row> = (0..self.m)
            .map(|r| w_columns.iter().map(|column| column[r]).collect())
            .collect();
        Scheme::new(d, self.ring, u, v, w)
    }

    /// `2x2x2_m7_c12_reduced.json`
    pub fn file_name(&self) -> String {
        format!(
            "{}x{}x{}_m{}_c{}_reduced.json",
            self.n.n1, self.n.n2, self.n.n3, self.m, self.complexity.reduced
        )
    }

    /// Fresh variables introduced per family
    pub fn fresh_counts(&self) -> [usize; 3] {
        [self.u_fresh.len(), self.v_fresh.len(), self.w_fresh.len()]
    }
}

/// Count of additions per family of `scheme` before any reduction
pub fn naive_additions(scheme: &Scheme) -> usize {
    let ring = scheme.ring();
    let row_cost = |factor: &[Row]| -> usize {
        factor
            .iter()
            .map(|row| row.iter().filter(|c| !ring.is_zero(c)).count().saturating_sub(1))
            .sum()
    };
    let w_cost: usize = (0..scheme.dims().w_len())
        .map(|k| {
            scheme
                .w()
                .iter()
                .filter(|row| !ring.is_zero(&row[k]))
                .count()
                .saturating_sub(1)
        })
        .sum();
    row_cost(scheme.u()) + row_cost(scheme.v()) + w_cost
}
