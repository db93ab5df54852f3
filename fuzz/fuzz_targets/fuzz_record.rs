//! Fuzz JSON record loading
//!
//! Small shapes only: checking the Brent equations is polynomial in the
//! dimensions and a fuzzer will happily ask for n = 10^6.

#![no_main]

use brentsat::record::Record;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(record) = serde_json::from_slice::<Record>(data) else {
        return;
    };
    if record.n.max() > 8 {
        return;
    }
    if let Ok(scheme) = record.to_scheme() {
        assert!(scheme.check().is_ok());
        // Any loadable scheme can be written back
        let _ = brentsat::record::to_json(&scheme);
    }
});
