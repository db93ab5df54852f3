//! External SAT solver invocation.
//!
//! The solver is a black box reading DIMACS (with `x` parity lines) and
//! printing the usual `s ...` / `v ...` lines. Defaults target
//! `cryptominisat5`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::process::Command;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::encode::{Cnf, Lit};
use crate::error::SolverError;

/// How to run the solver
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub binary: String,
    pub threads: usize,
    /// Wall clock budget in seconds (0 = unlimited)
    pub max_time: u64,
    pub random_polarity: bool,
    pub verbosity: u32,
    pub extra_args: Vec<String>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            binary: "cryptominisat5".to_string(),
            threads: 4,
            max_time: 0,
            random_polarity: false,
            verbosity: 0,
            extra_args: Vec::new(),
        }
    }
}

impl SolverConfig {
    /// Command line for one run (binary excluded)
    pub fn arguments(&self, instance: &Path, seed: u64) -> Vec<String> {
        let mut args = vec!["--verb".to_string(), self.verbosity.to_string()];
        if self.max_time > 0 {
            args.extend(["--maxtime".to_string(), self.max_time.to_string()]);
        }
        if seed > 0 {
            args.extend(["-r".to_string(), seed.to_string()]);
        }
        if self.random_polarity {
            args.extend(["--polar".to_string(), "rnd".to_string()]);
        }
        args.extend(["--threads".to_string(), self.threads.max(1).to_string()]);
        args.extend(self.extra_args.iter().cloned());
        args.push(instance.display().to_string());
        args
    }
}

/// Result of one solver run
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SolveOutcome {
    /// Model restricted to the kept variables
    Satisfiable(Vec<Lit>),
    Unsatisfiable,
    /// Timeout or no verdict; worth retrying with another seed
    Unknown,
}

impl SolveOutcome {
    pub fn is_sat(&self) -> bool {
        matches!(self, SolveOutcome::Satisfiable(_))
    }
}

/// Parse solver stdout, keeping literals whose variable passes `keep`
pub fn parse_output(stdout: &str, keep: impl Fn(Lit) -> bool) -> SolveOutcome {
    let status = stdout
        .lines()
        .find_map(|line| line.strip_prefix("s "))
        .map(str::trim);

    match status {
        Some("SATISFIABLE") => {}
        Some("UNSATISFIABLE") => return SolveOutcome::Unsatisfiable,
        _ => return SolveOutcome::Unknown,
    }

    let model = stdout
        .lines()
        .filter_map(|line| line.strip_prefix("v "))
        .flat_map(str::split_whitespace)
        .filter_map(|token| token.parse::<Lit>().ok())
        .filter(|&lit| lit != 0)
        .filter(|&lit| lit.checked_abs().is_some_and(&keep))
        .collect();
    SolveOutcome::Satisfiable(model)
}

/// Run the solver on an instance file
pub fn run(config: &SolverConfig, instance: &Path, seed: u64, keep: impl Fn(Lit) -> bool) -> Result<SolveOutcome, SolverError> {
    let args = config.arguments(instance, seed);
    debug!(binary = %config.binary, ?args, "starting solver");

    let start = Instant::now();
    let output = Command::new(&config.binary)
        .args(&args)
        .output()
        .map_err(|source| SolverError::Spawn {
            binary: config.binary.clone(),
            source,
        })?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let outcome = parse_output(&stdout, keep);

    let verdict = match &outcome {
        SolveOutcome::Satisfiable(_) => "SAT",
        SolveOutcome::Unsatisfiable => "UNSAT",
        SolveOutcome::Unknown => "UNKNOWN",
    };
    info!(seed, elapsed_ms = start.elapsed().as_millis() as u64, verdict, "solver finished");
    Ok(outcome)
}

/// Write `cnf` to `path`
pub fn write_instance(cnf: &Cnf, path: &Path) -> Result<(), SolverError> {
    let to_error = |source| SolverError::Instance {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(to_error)?;
    let mut writer = BufWriter::new(file);
    cnf.write_dimacs(&mut writer).map_err(to_error)?;
    writer.flush().map_err(to_error)
}

/// Write `cnf` to `path` and solve it; the model keeps real variables only
pub fn solve(config: &SolverConfig, cnf: &Cnf, path: &Path, seed: u64) -> Result<SolveOutcome, SolverError> {
    write_instance(cnf, path)?;
    run(config, path, seed, |var| cnf.vars.is_real(var))
}
