//! Solver plumbing that does not need a solver binary

use std::fs;

use brentsat::encode::{BrentEncoder, Cnf, EncodingOptions, Layout};
use brentsat::solver::{self, SolveOutcome, SolverConfig};
use brentsat::{Dims, SolverError};
use tempfile::TempDir;

const SAT_OUTPUT: &str = "\
c CryptoMiniSat
c some statistics
s SATISFIABLE
v 1 -2 3 -4
v 5 -6 0
";

#[test]
fn test_parse_keeps_requested_variables() {
    let outcome = solver::parse_output(SAT_OUTPUT, |var| var <= 4);
    assert_eq!(outcome, SolveOutcome::Satisfiable(vec![1, -2, 3, -4]));
    assert!(outcome.is_sat());
}

#[test]
fn test_parse_ignores_garbage_tokens() {
    let stdout = "s SATISFIABLE\nv 1 x -2 99999999999999999999 0\n";
    assert_eq!(
        solver::parse_output(stdout, |_| true),
        SolveOutcome::Satisfiable(vec![1, -2])
    );
}

#[test]
fn test_parse_without_verdict_is_unknown() {
    assert_eq!(solver::parse_output("", |_| true), SolveOutcome::Unknown);
    assert_eq!(solver::parse_output("c interrupted\n", |_| true), SolveOutcome::Unknown);
    assert_eq!(solver::parse_output("s INDETERMINATE\n", |_| true), SolveOutcome::Unknown);
    assert_eq!(solver::parse_output("s UNSATISFIABLE\n", |_| true), SolveOutcome::Unsatisfiable);
}

#[test]
fn test_missing_binary_is_spawn_error() {
    let dir = TempDir::new().unwrap();
    let config = SolverConfig {
        binary: "/nonexistent/brentsat-test-solver".to_string(),
        ..SolverConfig::default()
    };
    let mut cnf = Cnf::new();
    let a = cnf.vars.real("a");
    cnf.add([vec![a]], "unit");

    let result = solver::solve(&config, &cnf, &dir.path().join("unit.cnf"), 1);
    assert!(matches!(result, Err(SolverError::Spawn { .. })));
    // the instance was still written
    assert!(dir.path().join("unit.cnf").exists());
}

#[test]
fn test_write_instance_matches_dimacs() {
    let dir = TempDir::new().unwrap();
    let encoder = BrentEncoder::new(Dims::square(2), 7, Layout::Base, EncodingOptions::default()).unwrap();
    let path = dir.path().join("2x2x2_m7.cnf");
    solver::write_instance(encoder.cnf(), &path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert_eq!(text, encoder.cnf().to_dimacs());
    assert!(text.starts_with("p cnf "));
}

#[test]
fn test_write_instance_into_missing_directory() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing").join("instance.cnf");
    let result = solver::write_instance(&Cnf::new(), &path);
    assert!(matches!(result, Err(SolverError::Instance { .. })));
}

#[test]
fn test_arguments_with_extras() {
    let config = SolverConfig {
        threads: 0,
        max_time: 60,
        random_polarity: true,
        extra_args: vec!["--restart".to_string(), "luby".to_string()],
        ..SolverConfig::default()
    };
    let args = config.arguments(std::path::Path::new("x.cnf"), 5);
    assert_eq!(
        args,
        [
            "--verb", "0", "--maxtime", "60", "-r", "5", "--polar", "rnd", "--threads", "1", "--restart", "luby",
            "x.cnf"
        ]
    );
}
