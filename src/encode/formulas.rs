//! Primitive CNF formulas: gates, parity, cardinality, lexicographic order.
//!
//! Every function returns clauses and allocates whatever auxiliary variables
//! it needs from the given [`VariableStorage`].

use std::collections::HashMap;

use super::vars::{Clause, Lit, VariableStorage};

// ============================================================================
// GATES
// ============================================================================

/// t ⇔ ∧ inputs
pub fn and_equality(t: Lit, inputs: &[Lit]) -> Vec<Clause> {
    let mut clauses: Vec<Clause> = inputs.iter().map(|&x| vec![-t, x]).collect();
    clauses.push(std::iter::once(t).chain(inputs.iter().map(|&x| -x)).collect());
    clauses
}

/// Two-input AND gates shared across an instance.
///
/// Gates are keyed by the (min, max) input pair so the same product is
/// encoded once; `a ∧ a` is `a` itself.
#[derive(Clone, Debug, Default)]
pub struct AndGates {
    memo: HashMap<(Lit, Lit), Lit>,
}

impl AndGates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Output literal of `a ∧ b`; defining clauses of a new gate go to `clauses`
    pub fn and(&mut self, vars: &mut VariableStorage, clauses: &mut Vec<Clause>, a: Lit, b: Lit) -> Lit {
        if a == b {
            return a;
        }
        let key = (a.min(b), a.max(b));
        if let Some(&t) = self.memo.get(&key) {
            return t;
        }
        let t = vars.fresh();
        clauses.extend(and_equality(t, &[key.0, key.1]));
        self.memo.insert(key, t);
        t
    }

    /// AND over any number of literals (duplicates collapse)
    pub fn and_all(&mut self, vars: &mut VariableStorage, clauses: &mut Vec<Clause>, inputs: &[Lit]) -> Option<Lit> {
        let mut sorted = inputs.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        let (&first, rest) = sorted.split_first()?;
        Some(rest.iter().fold(first, |acc, &x| self.and(vars, clauses, acc, x)))
    }

    /// Number of distinct gates created
    pub fn len(&self) -> usize {
        self.memo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }
}

// ============================================================================
// PARITY
// ============================================================================

/// Split "XOR of `x` is true" into constraints of at most `chunk + 1` literals.
///
/// Each returned list again means "XOR is true". Long inputs are cut after
/// `chunk` literals, the prefix is tied to a fresh carry and the carry
/// continues with the remainder.
pub fn xor_chain(x: &[Lit], vars: &mut VariableStorage, chunk: usize) -> Vec<Vec<Lit>> {
    let chunk = chunk.max(2);
    let mut rest = x.to_vec();
    let mut out = Vec::new();

    while rest.len() > chunk {
        let carry = vars.fresh();
        let tail = rest.split_off(chunk);
        rest.push(-carry);
        out.push(rest);
        rest = std::iter::once(carry).chain(tail).collect();
    }
    out.push(rest);
    out
}

/// Direct CNF of "XOR of `x` is true": every even-parity assignment is
/// excluded by one clause (2^(n-1) clauses).
pub fn xor_clauses(x: &[Lit]) -> Vec<Clause> {
    if x.is_empty() {
        return vec![Vec::new()];
    }
    debug_assert!(x.len() <= 16, "parity over {} literals is too large", x.len());

    let n = x.len();
    (0u32..1 << n)
        .filter(|assignment| assignment.count_ones() % 2 == 0)
        .map(|assignment| {
            (0..n)
                .map(|i| if assignment >> i & 1 == 1 { -x[i] } else { x[i] })
                .collect()
        })
        .collect()
}

// ============================================================================
// CARDINALITY
// ============================================================================

fn contradiction(x: &[Lit]) -> Vec<Clause> {
    match x.first() {
        Some(&x0) => vec![vec![x0], vec![-x0]],
        None => vec![Vec::new()],
    }
}

/// Sequential unary counter.
///
/// Returns the final register `s` (length `min(len, count)`) where
/// `s[k]` ⇔ at least k + 1 of `x` are true.
fn counter(x: &[Lit], count: usize, vars: &mut VariableStorage) -> (Vec<Lit>, Vec<Clause>) {
    let mut clauses = Vec::new();
    let mut prev: Vec<Lit> = Vec::new();

    for (index, &xi) in x.iter().enumerate() {
        let width = (index + 1).min(count);
        let curr: Vec<Lit> = (0..width).map(|_| vars.fresh()).collect();

        for k in 0..width {
            if index == 0 {
                clauses.push(vec![-curr[0], xi]);
                clauses.push(vec![-xi, curr[0]]);
            } else if k == 0 {
                clauses.push(vec![-curr[0], xi, prev[0]]);
                clauses.push(vec![-xi, curr[0]]);
                clauses.push(vec![-prev[0], curr[0]]);
            } else {
                if index == k {
                    clauses.push(vec![-curr[k], xi]);
                    clauses.push(vec![-curr[k], prev[k - 1]]);
                } else {
                    clauses.push(vec![-curr[k], xi, prev[k]]);
                    clauses.push(vec![-curr[k], prev[k - 1], prev[k]]);
                    clauses.push(vec![-prev[k], curr[k]]);
                }
                clauses.push(vec![-xi, -prev[k - 1], curr[k]]);
            }
        }
        prev = curr;
    }
    (prev, clauses)
}

/// At least `k` of `x` are true
pub fn at_least_k(x: &[Lit], k: usize, vars: &mut VariableStorage) -> Vec<Clause> {
    if k == 0 {
        return Vec::new();
    }
    if k > x.len() {
        return contradiction(x);
    }
    if k == x.len() {
        return x.iter().map(|&xi| vec![xi]).collect();
    }
    let (s, mut clauses) = counter(x, k, vars);
    clauses.push(vec![s[k - 1]]);
    clauses
}

/// At most `k` of `x` are true
pub fn at_most_k(x: &[Lit], k: usize, vars: &mut VariableStorage) -> Vec<Clause> {
    if k >= x.len() {
        return Vec::new();
    }
    if k == 0 {
        return x.iter().map(|&xi| vec![-xi]).collect();
    }
    let (s, mut clauses) = counter(x, k + 1, vars);
    clauses.push(vec![-s[k]]);
    clauses
}

/// Between `k1` and `k2` (inclusive) of `x` are true
pub fn between_k(x: &[Lit], k1: usize, k2: usize, vars: &mut VariableStorage) -> Vec<Clause> {
    let k2 = k2.min(x.len());
    if k1 > k2 {
        return contradiction(x);
    }
    if k1 == 0 && k2 == x.len() {
        return Vec::new();
    }

    let (s, mut clauses) = counter(x, k2 + 1, vars);
    if k1 > 0 {
        clauses.push(vec![s[k1 - 1]]);
    }
    if k2 < x.len() {
        clauses.push(vec![-s[k2]]);
    }
    clauses
}

/// Every row has at least `k_row` and every column at least `k_column` true
pub fn at_least_k_matrix(rows: &[Vec<Lit>], k_row: usize, k_column: usize, vars: &mut VariableStorage) -> Vec<Clause> {
    let mut clauses = Vec::new();
    for row in rows {
        clauses.extend(at_least_k(row, k_row, vars));
    }

    let columns = rows.first().map_or(0, Vec::len);
    for c in 0..columns {
        let column: Vec<Lit> = rows.iter().map(|row| row[c]).collect();
        clauses.extend(at_least_k(&column, k_column, vars));
    }
    clauses
}

// ============================================================================
// LEXICOGRAPHIC ORDER
// ============================================================================

/// `a ≤ b` (or `a < b` when `strict`) as bit vectors, most significant first.
///
/// Uses one "equal so far" variable per position.
pub fn lex_order(a: &[Lit], b: &[Lit], vars: &mut VariableStorage, strict: bool) -> Vec<Clause> {
    assert_eq!(a.len(), b.len(), "lex_order needs equal lengths");
    let mut clauses = Vec::new();
    let mut prev: Option<Lit> = None;

    for (&ai, &bi) in a.iter().zip(b) {
        let eq = vars.fresh();
        clauses.push(vec![-eq, -ai, bi]);
        clauses.push(vec![-eq, ai, -bi]);

        match prev {
            None => {
                clauses.push(vec![-ai, bi]);
                clauses.push(vec![-ai, -bi, eq]);
                clauses.push(vec![ai, bi, eq]);
            }
            Some(p) => {
                clauses.push(vec![-p, -ai, bi]);
                clauses.push(vec![-eq, p]);
                clauses.push(vec![-p, -ai, -bi, eq]);
                clauses.push(vec![-p, ai, bi, eq]);
            }
        }
        prev = Some(eq);
    }

    match prev {
        Some(last) if strict => clauses.push(vec![-last]),
        // Two empty vectors are equal
        None if strict => clauses.push(Vec::new()),
        _ => {}
    }
    clauses
}

/// `lex_order` over every consecutive pair
pub fn lex_chain(rows: &[Vec<Lit>], vars: &mut VariableStorage, strict: bool) -> Vec<Clause> {
    rows.windows(2)
        .flat_map(|pair| lex_order(&pair[0], &pair[1], vars, strict))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(clauses: &[Clause], assignment: &dyn Fn(Lit) -> bool) -> bool {
        clauses
            .iter()
            .all(|clause| clause.iter().any(|&lit| if lit > 0 { assignment(lit) } else { !assignment(-lit) }))
    }

    #[test]
    fn test_and_equality() {
        let clauses = and_equality(3, &[1, 2]);
        assert_eq!(clauses, vec![vec![-3, 1], vec![-3, 2], vec![3, -1, -2]]);
        for bits in 0..8u32 {
            let value = |v: Lit| bits >> (v - 1) & 1 == 1;
            let consistent = value(3) == (value(1) && value(2));
            assert_eq!(eval(&clauses, &value), consistent);
        }
    }

    #[test]
    fn test_and_gates_memoized() {
        let mut vars = VariableStorage::new();
        let a = vars.real("a");
        let b = vars.real("b");
        let mut gates = AndGates::new();
        let mut clauses = Vec::new();

        let t = gates.and(&mut vars, &mut clauses, a, b);
        assert_eq!(gates.and(&mut vars, &mut clauses, b, a), t);
        assert_eq!(gates.and(&mut vars, &mut clauses, a, a), a);
        assert_eq!(gates.len(), 1);
        assert_eq!(clauses.len(), 3);
        assert_eq!(gates.and_all(&mut vars, &mut clauses, &[b, a, b]), Some(t));
    }

    #[test]
    fn test_xor_clauses_exhaustive() {
        let x = [1, -2, 3];
        let clauses = xor_clauses(&x);
        assert_eq!(clauses.len(), 4);
        for bits in 0..8u32 {
            let value = |v: Lit| bits >> (v - 1) & 1 == 1;
            let parity = value(1) ^ !value(2) ^ value(3);
            assert_eq!(eval(&clauses, &value), parity);
        }
    }

    #[test]
    fn test_xor_chain_splits() {
        let mut vars = VariableStorage::new();
        let x: Vec<Lit> = (0..10).map(|i| vars.real(&format!("x{i}"))).collect();
        let chain = xor_chain(&x, &mut vars, 4);
        // 10 literals, chunks of 4: [x0..x3,-c1], [c1,x4,x5,x6,-c2], [c2,x7,x8,x9]
        assert_eq!(chain.len(), 3);
        assert!(chain.iter().all(|part| part.len() <= 5));
        assert_eq!(vars.fresh_count(), 2);

        let short = xor_chain(&x[..3], &mut vars, 7);
        assert_eq!(short, vec![x[..3].to_vec()]);
    }

    #[test]
    fn test_cardinality_degenerate_cases() {
        let mut vars = VariableStorage::new();
        let x: Vec<Lit> = (0..3).map(|i| vars.real(&format!("x{i}"))).collect();
        assert!(at_least_k(&x, 0, &mut vars).is_empty());
        assert_eq!(at_least_k(&x, 4, &mut vars), vec![vec![x[0]], vec![-x[0]]]);
        assert_eq!(at_least_k(&x, 3, &mut vars), vec![vec![1], vec![2], vec![3]]);
        assert!(at_most_k(&x, 3, &mut vars).is_empty());
        assert_eq!(at_most_k(&x, 0, &mut vars), vec![vec![-1], vec![-2], vec![-3]]);
        assert!(between_k(&x, 0, 5, &mut vars).is_empty());
        assert_eq!(vars.fresh_count(), 0);
    }

    #[test]
    fn test_lex_order_two_bits() {
        // Only the 2+2 input bits are free; eq variables are forced.
        for strict in [false, true] {
            let mut vars = VariableStorage::new();
            let a = vec![vars.real("a0"), vars.real("a1")];
            let b = vec![vars.real("b0"), vars.real("b1")];
            let clauses = lex_order(&a, &b, &mut vars, strict);
            let total = vars.len();

            for bits in 0..16u32 {
                let av = (bits >> 0 & 1) << 1 | (bits >> 1 & 1);
                let bv = (bits >> 2 & 1) << 1 | (bits >> 3 & 1);
                let expected = if strict { av < bv } else { av <= bv };

                let aux = total - 4;
                let satisfiable = (0..1u32 << aux).any(|extra| {
                    let value = |v: Lit| {
                        let v = v as u32 - 1;
                        if v < 4 { bits >> v & 1 == 1 } else { extra >> (v - 4) & 1 == 1 }
                    };
                    eval(&clauses, &value)
                });
                assert_eq!(satisfiable, expected, "a={av} b={bv} strict={strict}");
            }
        }
    }
}
