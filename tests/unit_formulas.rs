//! Brute-force checks of the primitive encodings


use brentsat::encode::formulas::{
    at_least_k, at_least_k_matrix, at_most_k, between_k, lex_chain, lex_order, xor_chain, xor_clauses,
};
use brentsat::encode::{Lit, VariableStorage};
use generators::{assumptions_from_bits, is_satisfiable};

fn inputs(n: usize) -> (VariableStorage, Vec<Lit>) {
    let mut vars = VariableStorage::new();
    let x = (0..n).map(|i| vars.real(&format!("x{i}"))).collect();
    (vars, x)
}

/// Check `encode` against `expected(popcount)` for every assignment of n inputs
fn check_cardinality(
    n: usize,
    encode: impl Fn(&[Lit], &mut VariableStorage) -> Vec<Vec<Lit>>,
    expected: impl Fn(usize) -> bool,
) {
    let (mut vars, x) = inputs(n);
    let clauses = encode(&x, &mut vars);
    for bits in 0u32..1 << n {
        let assumptions = assumptions_from_bits(&x, bits);
        let count = bits.count_ones() as usize;
        assert_eq!(
            is_satisfiable(&clauses, &assumptions),
            expected(count),
            "n = {n}, bits = {bits:b}"
        );
    }
}

#[test]
fn test_at_least_k_exhaustive() {
    for n in 0..=8 {
        for k in 0..=n + 1 {
            check_cardinality(n, |x, vars| at_least_k(x, k, vars), |count| count >= k);
        }
    }
}

#[test]
fn test_at_most_k_exhaustive() {
    for n in 0..=8 {
        for k in 0..=n + 1 {
            check_cardinality(n, |x, vars| at_most_k(x, k, vars), |count| count <= k);
        }
    }
}

#[test]
fn test_between_k_exhaustive() {
    for n in 0..=6 {
        for k1 in 0..=n + 1 {
            for k2 in 0..=n + 1 {
                check_cardinality(
                    n,
                    |x, vars| between_k(x, k1, k2, vars),
                    |count| k1 <= count && count <= k2,
                );
            }
        }
    }
}

#[test]
fn test_cardinality_ten_inputs() {
    for k in [1, 3, 5, 9] {
        check_cardinality(10, |x, vars| at_least_k(x, k, vars), |count| count >= k);
        check_cardinality(10, |x, vars| at_most_k(x, k, vars), |count| count <= k);
    }
}

#[test]
fn test_at_least_k_matrix() {
    // 2x3 matrix, every row at least 1, every column at least 2
    let (mut vars, x) = inputs(6);
    let rows = vec![x[..3].to_vec(), x[3..].to_vec()];
    let clauses = at_least_k_matrix(&rows, 1, 2, &mut vars);
    for bits in 0u32..1 << 6 {
        let assumptions = assumptions_from_bits(&x, bits);
        assert_eq!(is_satisfiable(&clauses, &assumptions), bits == 0b111111, "bits = {bits:b}");
    }

    let clauses = at_least_k_matrix(&rows, 2, 1, &mut vars);
    for bits in 0u32..1 << 6 {
        let assumptions = assumptions_from_bits(&x, bits);
        let row_ok = |r: u32| (bits >> (3 * r) & 0b111).count_ones() >= 2;
        let column_ok = |c: u32| (bits >> c & 1) | (bits >> (c + 3) & 1) == 1;
        let expected = row_ok(0) && row_ok(1) && (0..3).all(column_ok);
        assert_eq!(is_satisfiable(&clauses, &assumptions), expected, "bits = {bits:b}");
    }
}

/// Compare as bit vectors, first literal most significant
fn lex_value(bits: u32, offset: usize, n: usize) -> u32 {
    (0..n).fold(0, |acc, i| (acc << 1) | (bits >> (offset + i) & 1))
}

#[test]
fn test_lex_order_exhaustive() {
    for n in 0..=6 {
        for strict in [false, true] {
            let (mut vars, x) = inputs(2 * n);
            let (a, b) = x.split_at(n);
            let clauses = lex_order(a, b, &mut vars, strict);
            for bits in 0u32..1 << (2 * n) {
                let assumptions = assumptions_from_bits(&x, bits);
                let (va, vb) = (lex_value(bits, 0, n), lex_value(bits, n, n));
                let expected = if strict { va < vb } else { va <= vb };
                assert_eq!(
                    is_satisfiable(&clauses, &assumptions),
                    expected,
                    "n = {n}, strict = {strict}, a = {va:b}, b = {vb:b}"
                );
            }
        }
    }
}

#[test]
fn test_lex_chain() {
    // three rows of two bits, strictly increasing
    let (mut vars, x) = inputs(6);
    let rows: Vec<Vec<Lit>> = x.chunks(2).map(<[Lit]>::to_vec).collect();
    let clauses = lex_chain(&rows, &mut vars, true);
    for bits in 0u32..1 << 6 {
        let assumptions = assumptions_from_bits(&x, bits);
        let values: Vec<u32> = (0..3).map(|r| lex_value(bits, 2 * r, 2)).collect();
        let expected = values[0] < values[1] && values[1] < values[2];
        assert_eq!(is_satisfiable(&clauses, &assumptions), expected, "bits = {bits:b}");
    }
}

#[test]
fn test_xor_clauses_exhaustive() {
    for n in 1..=6 {
        let (_, x) = inputs(n);
        let clauses = xor_clauses(&x);
        assert_eq!(clauses.len(), 1 << (n - 1));
        for bits in 0u32..1 << n {
            let assumptions = assumptions_from_bits(&x, bits);
            assert_eq!(is_satisfiable(&clauses, &assumptions), bits.count_ones() % 2 == 1);
        }
    }
    assert_eq!(xor_clauses(&[]), vec![Vec::<Lit>::new()]);
}

#[test]
fn test_xor_chain_exhaustive() {
    for n in 1..=9 {
        for chunk in [2, 3, 7] {
            let (mut vars, x) = inputs(n);
            let parts = xor_chain(&x, &mut vars, chunk);
            assert!(parts.iter().all(|part| part.len() <= chunk + 1));
            let clauses: Vec<Vec<Lit>> = parts.iter().flat_map(|part| xor_clauses(part)).collect();
            for bits in 0u32..1 << n {
                let assumptions = assumptions_from_bits(&x, bits);
                assert_eq!(
                    is_satisfiable(&clauses, &assumptions),
                    bits.count_ones() % 2 == 1,
                    "n = {n}, chunk = {chunk}, bits = {bits:b}"
                );
            }
        }
    }
}
