//! Property tests for the flip graph
//!
//! Every move must keep the Brent equations and change the rank by exactly
//! the documented amount.


use brentsat::flip::{BitPackedScheme, Budget, FlipWalk, WalkOutcome};
use brentsat::Dims;
use generators::{arb_dims, arb_packed_scheme};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

// ============================================================================
// Moves
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// The schoolbook scheme is valid for every shape
    #[test]
    fn naive_is_valid(dims in arb_dims(4)) {
        let naive = BitPackedScheme::naive(dims).unwrap();
        prop_assert!(naive.check().is_ok());
        prop_assert_eq!(naive.rank(), dims.naive_rank());
    }

    /// Flips keep the rank
    #[test]
    fn flip_keeps_rank(scheme in arb_packed_scheme(3), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut moved = scheme.clone();
        if moved.try_flip(&mut rng) {
            prop_assert!(moved.check().is_ok());
            prop_assert_eq!(moved.rank(), scheme.rank());
        } else {
            prop_assert_eq!(&moved, &scheme);
        }
    }

    /// Plus and split add exactly one row, up to the schoolbook rank
    #[test]
    fn growth_adds_one_row(scheme in arb_packed_scheme(3), seed in any::<u64>(), split in any::<bool>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut moved = scheme.clone();
        let grew = if split { moved.try_split(&mut rng) } else { moved.try_plus(&mut rng) };
        if grew {
            prop_assert!(moved.check().is_ok());
            prop_assert_eq!(moved.rank(), scheme.rank() + 1);
            prop_assert!(moved.rank() <= moved.naive_rank());
        } else {
            prop_assert_eq!(&moved, &scheme);
        }
    }

    /// Reduce removes exactly one row
    #[test]
    fn reduce_removes_one_row(scheme in arb_packed_scheme(3), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut moved = scheme.clone();
        // split first so a reduction is usually available
        moved.try_split(&mut rng);
        let before = moved.rank();
        if moved.try_reduce(&mut rng) {
            prop_assert!(moved.check().is_ok());
            prop_assert_eq!(moved.rank(), before - 1);
        }
    }

    /// After `reduce_all` no reduction or duplicate is left
    #[test]
    fn reduce_all_reaches_fixed_point(scheme in arb_packed_scheme(3), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut moved = scheme.clone();
        moved.expand(4, &mut rng);
        let grown = moved.rank();
        let removed = moved.reduce_all(&mut rng);
        prop_assert_eq!(moved.rank(), grown - removed);
        prop_assert!(moved.check().is_ok());
        prop_assert!(!moved.clone().try_reduce(&mut rng));
        prop_assert_eq!(moved.cancel_duplicates(), 0);
    }
}

// ============================================================================
// Resizing
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Projection yields a valid scheme of the smaller shape
    #[test]
    fn project_is_valid(
        scheme in arb_packed_scheme(3),
        p in 0usize..3,
        q in any::<prop::sample::Index>(),
    ) {
        let mut projected = scheme.clone();
        let n = [scheme.dims().n1, scheme.dims().n2, scheme.dims().n3];
        let result = projected.project(p, q.index(n[p]));
        if n[p] < 2 {
            prop_assert!(result.is_err());
            prop_assert_eq!(&projected, &scheme);
        } else {
            prop_assert!(result.is_ok());
            prop_assert!(projected.check().is_ok());
            prop_assert!(projected.rank() <= scheme.rank());
            let mut expected = n;
            expected[p] -= 1;
            prop_assert_eq!(projected.dims(), Dims::new(expected[0], expected[1], expected[2]));
        }
    }

    /// Extension adds the schoolbook products of the new slice
    #[test]
    fn extend_is_valid(scheme in arb_packed_scheme(3), p in 0usize..3) {
        let mut extended = scheme.clone();
        extended.extend(p).unwrap();
        prop_assert!(extended.check().is_ok());
        let n = [scheme.dims().n1, scheme.dims().n2, scheme.dims().n3];
        let slice = n[(p + 1) % 3] * n[(p + 2) % 3];
        prop_assert_eq!(extended.rank(), scheme.rank() + slice);

        // projecting the new slice away again recovers a valid scheme
        extended.project(p, n[p]).unwrap();
        prop_assert!(extended.check().is_ok());
        prop_assert_eq!(extended.dims(), scheme.dims());
    }

    /// Text format round trip
    #[test]
    fn text_round_trip(scheme in arb_packed_scheme(4)) {
        let text = scheme.to_string();
        let parsed: BitPackedScheme = text.parse().unwrap();
        prop_assert_eq!(parsed, scheme);
    }
}

// ============================================================================
// Walks
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// A walk never reports a best rank above its start
    #[test]
    fn walk_best_is_valid(scheme in arb_packed_scheme(3), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let walk = FlipWalk::new(Budget::new(10_000, 200));
        let report = walk.run(&scheme, &mut rng);
        prop_assert!(report.best.check().is_ok());
        prop_assert!(report.best.rank() <= scheme.rank());
        prop_assert_eq!(report.best.dims(), scheme.dims());
        prop_assert!(report.steps <= 200);
        prop_assert_ne!(report.outcome, WalkOutcome::Reached);
    }
}
