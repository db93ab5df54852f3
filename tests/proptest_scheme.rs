//! Property tests for dense schemes
//!
//! Symmetries, canonical form and serialization over random valid schemes.


use brentsat::flip::BitPackedScheme;
use brentsat::{AdditionReducer, ReductionMode, record};
use generators::{arb_gf2_scheme, arb_integer_strassen};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

// ============================================================================
// Representations
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Generated schemes satisfy the Brent equations
    #[test]
    fn generated_schemes_are_valid(scheme in arb_gf2_scheme(3)) {
        prop_assert!(scheme.check().is_ok());
        prop_assert!(scheme.rank() <= scheme.dims().naive_rank());
    }

    /// Dense and bit-packed forms carry the same scheme
    #[test]
    fn packed_round_trip(scheme in arb_gf2_scheme(3)) {
        let packed = BitPackedScheme::from_scheme(&scheme).unwrap();
        prop_assert_eq!(packed.rank(), scheme.rank());
        prop_assert_eq!(packed.to_scheme(), scheme);
    }

    /// JSON records reload to the same scheme
    #[test]
    fn record_round_trip(scheme in arb_gf2_scheme(3)) {
        let json = record::to_json(&scheme).unwrap();
        prop_assert_eq!(record::from_json(&json).unwrap(), scheme);
    }

    /// Integer schemes reload with their ring and signs
    #[test]
    fn integer_record_round_trip(scheme in arb_integer_strassen()) {
        prop_assert!(scheme.check().is_ok());
        let json = record::to_json(&scheme).unwrap();
        prop_assert_eq!(record::from_json(&json).unwrap(), scheme);
    }
}

// ============================================================================
// Symmetries
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Basis swaps keep validity, weight and complexity
    #[test]
    fn swaps_preserve_invariants(
        scheme in arb_gf2_scheme(3),
        a in any::<prop::sample::Index>(),
        b in any::<prop::sample::Index>(),
        which in 0usize..3,
    ) {
        let d = scheme.dims();
        let mut swapped = scheme.clone();
        match which {
            0 => swapped.swap_basis_rows(a.index(d.n1), b.index(d.n1)),
            1 => swapped.swap_basis_columns(a.index(d.n3), b.index(d.n3)),
            _ => swapped.swap_basis_inner(a.index(d.n2), b.index(d.n2)),
        }
        prop_assert!(swapped.check().is_ok());
        prop_assert_eq!(swapped.weight(), scheme.weight());
        prop_assert_eq!(swapped.complexity(), scheme.complexity());
        prop_assert_eq!(swapped.invariant_f(), scheme.invariant_f());
    }

    /// Three cycle shifts and two transposes are the identity
    #[test]
    fn cycle_and_transpose_orders(scheme in arb_gf2_scheme(3)) {
        let mut cycled = scheme.clone();
        for _ in 0..3 {
            cycled.cycle_shift();
            prop_assert!(cycled.check().is_ok());
        }
        prop_assert_eq!(&cycled, &scheme);

        let mut transposed = scheme.clone();
        transposed.transpose();
        prop_assert!(transposed.check().is_ok());
        prop_assert_eq!(transposed.dims(), scheme.dims().transposed());
        transposed.transpose();
        prop_assert_eq!(&transposed, &scheme);
    }

    /// The per-row rank triples do not depend on the basis
    #[test]
    fn sandwiching_keeps_rank_triples(scheme in arb_integer_strassen()) {
        let mut ranks = scheme.ranks();
        ranks.sort_unstable();
        let mut base = generators::strassen(brentsat::Ring::Integer).ranks();
        base.sort_unstable();
        prop_assert_eq!(ranks, base);
    }
}

// ============================================================================
// Canonical form
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A converged sort yields a canonical scheme that sorts to itself
    #[test]
    fn sort_is_idempotent(scheme in arb_gf2_scheme(2), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut sorted = scheme.clone();
        let outcome = sorted.sort(&mut rng, 2000);
        prop_assert!(sorted.check().is_ok());
        prop_assert_eq!(sorted.rank(), scheme.rank());
        prop_assume!(outcome.is_converged());

        prop_assert!(sorted.is_canonical());
        let again = sorted.clone().sort(&mut rng, 2000);
        prop_assert_eq!(again, brentsat::Canonicalization::Converged { iterations: 0 });
    }

    /// Complexity minimization keeps validity and never increases complexity
    #[test]
    fn minimize_never_worsens(scheme in arb_gf2_scheme(3), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut minimized = scheme.clone();
        minimized.minimize_complexity(&mut rng, 20);
        prop_assert!(minimized.check().is_ok());
        prop_assert!(minimized.complexity() <= scheme.complexity());
        prop_assert_eq!(minimized.rank(), scheme.rank());
    }
}

// ============================================================================
// Addition reduction
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Fresh variables expand back to the scheme they were taken from
    #[test]
    fn reduction_rebuilds_scheme(scheme in arb_gf2_scheme(2), seed in any::<u64>(), greedy in any::<bool>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mode = if greedy { ReductionMode::Greedy } else { ReductionMode::Random };
        let reduced = AdditionReducer::new(2, 4).reduce(&scheme, mode, &mut rng);
        prop_assert!(reduced.complexity.reduced <= reduced.complexity.naive);
        prop_assert_eq!(reduced.rebuild().unwrap(), scheme);
    }

    /// Signed coefficients are shared up to negation and still rebuild
    #[test]
    fn integer_reduction_rebuilds(scheme in arb_integer_strassen(), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let reduced = AdditionReducer::new(3, 3).reduce(&scheme, ReductionMode::Hybrid, &mut rng);
        prop_assert!(reduced.complexity.reduced <= reduced.complexity.naive);
        prop_assert_eq!(reduced.rebuild().unwrap(), scheme);
    }
}
