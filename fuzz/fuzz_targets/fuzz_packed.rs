//! Fuzz the bit-packed scheme text format
//!
//! Parsing must reject malformed input with an error. Whatever parses is a
//! valid scheme and must survive the flip moves.

#![no_main]

use brentsat::flip::BitPackedScheme;
use libfuzzer_sys::fuzz_target;
use rand::SeedableRng;
use rand::rngs::StdRng;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(mut scheme) = input.parse::<BitPackedScheme>() else {
        return;
    };
    assert!(scheme.check().is_ok());

    let mut rng = StdRng::seed_from_u64(data.len() as u64);
    for _ in 0..16 {
        if !scheme.try_flip(&mut rng) {
            scheme.try_plus(&mut rng);
        }
        scheme.reduce_all(&mut rng);
    }
    assert!(scheme.check().is_ok());
});
