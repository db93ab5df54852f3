//! Fuzz parsing of SAT solver output

#![no_main]

use brentsat::solver::{SolveOutcome, parse_output};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let stdout = String::from_utf8_lossy(data);
    if let SolveOutcome::Satisfiable(model) = parse_output(&stdout, |var| var <= 1000) {
        assert!(model.iter().all(|&lit| lit != 0 && lit.abs() <= 1000));
    }
});
