//! brentsat - search for fast matrix multiplication schemes
//!
//! Usage: brentsat [-v...] [--config FILE] [--seed N] <COMMAND>
//!
//! Commands:
//!   encode    - Write the SAT instance and variable map for (dims, m)
//!   search    - Solve repeatedly, saving every distinct scheme found
//!   flip      - Lower the rank of a scheme by a flip-graph walk
//!   canon     - Canonicalize a scheme record
//!   minimize  - Lower the addition count by random basis changes
//!   reduce    - Share common subexpressions, searching along flips
//!   show      - Print a scheme and its invariants

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use brentsat::encode::{BrentEncoder, Layout, ParityEncoding};
use brentsat::flip::{BitPackedScheme, FlipWalk};
use brentsat::{Config, Dims, ReductionMode, Scheme, SolveOutcome, record, solver};

#[derive(Parser)]
#[command(name = "brentsat")]
#[command(version)]
#[command(about = "SAT encodings and flip-graph search for matrix multiplication schemes")]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Random seed (overrides the config; 0 draws one)
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

/// The instance to build
#[derive(Args)]
struct Problem {
    /// Dimensions: `n` or `n1xn2xn3`
    #[arg(short = 'n', long, value_parser = parse_dims)]
    dims: Dims,

    /// Number of multiplications
    #[arg(short, long)]
    m: usize,

    /// Cyclic layout `s,t` with m = s + 3t (square only)
    #[arg(long, value_parser = parse_cyclic)]
    cyclic: Option<(usize, usize)>,

    /// Emit native XOR lines instead of CNF parity chains
    #[arg(long)]
    native_xor: bool,

    /// Skip the lexicographic symmetry breaking
    #[arg(long)]
    no_symmetry: bool,

    /// Skip the nonzero-count constraints
    #[arg(long)]
    no_cardinality: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the SAT instance and its variable map
    Encode {
        #[command(flatten)]
        problem: Problem,

        /// Output DIMACS file
        #[arg(short, long)]
        output: PathBuf,

        /// Output variable map (defaults to OUTPUT with a .json extension)
        #[arg(long)]
        map: Option<PathBuf>,
    },
    /// Solve repeatedly, excluding every scheme found
    Search {
        #[command(flatten)]
        problem: Problem,

        /// Directory receiving the records
        #[arg(short, long)]
        output: PathBuf,

        /// Known schemes (record or directory) to exclude and bias toward
        #[arg(long)]
        known: Option<PathBuf>,

        /// Number of schemes to collect
        #[arg(short, long)]
        solutions: Option<usize>,

        /// Where the instance is written for the solver
        #[arg(long)]
        instance: Option<PathBuf>,
    },
    /// Walk the flip graph from a scheme
    Flip {
        /// Input record
        input: PathBuf,

        /// Directory receiving the best scheme
        #[arg(short, long)]
        output: PathBuf,

        /// Stop once this rank is reached
        #[arg(short, long)]
        target: Option<usize>,

        /// Maximum number of flips
        #[arg(long)]
        steps: Option<usize>,

        /// Plus/split moves applied before the walk
        #[arg(long, default_value_t = 0)]
        expand: usize,

        /// Move to this shape first, extending or projecting one dimension at a time
        #[arg(long, value_parser = parse_dims)]
        resize: Option<Dims>,
    },
    /// Canonicalize a record
    Canon {
        input: PathBuf,

        /// Output record (defaults to overwriting the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Lower the addition count by random invertible basis changes
    Minimize {
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long, default_value_t = 1000)]
        iterations: usize,
    },
    /// Share common subexpressions between linear forms
    Reduce {
        input: PathBuf,

        /// Directory receiving the reduced scheme
        #[arg(short, long)]
        output: PathBuf,

        /// greedy, random or hybrid
        #[arg(long, default_value = "hybrid")]
        mode: ReductionMode,

        /// Flips tried after the first reduction (GF(2) only)
        #[arg(long, default_value_t = 100)]
        flips: usize,

        /// Attempts per family
        #[arg(long)]
        loops: Option<usize>,

        /// Largest subexpression considered
        #[arg(long)]
        max_size: Option<usize>,
    },
    /// Print a scheme and its invariants
    Show {
        input: PathBuf,

        /// Print the bit-packed text form instead
        #[arg(long)]
        packed: bool,
    },
}

fn parse_dims(text: &str) -> Result<Dims, String> {
    let parts: Vec<usize> = text
        .split('x')
        .map(|part| part.trim().parse::<usize>().map_err(|e| format!("`{part}`: {e}")))
        .collect::<Result<_, _>>()?;
    let dims = match parts[..] {
        [n] => Dims::square(n),
        [n1, n2, n3] => Dims::new(n1, n2, n3),
        _ => return Err("expected `n` or `n1xn2xn3`".to_string()),
    };
    if dims.n1 == 0 || dims.n2 == 0 || dims.n3 == 0 {
        return Err("dimensions must be positive".to_string());
    }
    Ok(dims)
}

fn parse_cyclic(text: &str) -> Result<(usize, usize), String> {
    let (s, t) = text.split_once(',').ok_or("expected `s,t`")?;
    let s = s.trim().parse().map_err(|e| format!("s: {e}"))?;
    let t = t.trim().parse().map_err(|e| format!("t: {e}"))?;
    Ok((s, t))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let mut config = Config::load_or_default(cli.config.as_deref())?;
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if config.seed == 0 {
        config.seed = rand::rng().random_range(1..u64::MAX);
    }
    info!(seed = config.seed, "starting");
    let mut rng = StdRng::seed_from_u64(config.seed);

    match cli.command {
        Commands::Encode { problem, output, map } => {
            let encoder = build_encoder(&problem, &config)?;
            solver::write_instance(encoder.cnf(), &output)?;
            let map = map.unwrap_or_else(|| output.with_extension("json"));
            let json = serde_json::to_string_pretty(encoder.variable_map())?;
            fs::write(&map, json).with_context(|| format!("writing {}", map.display()))?;
            println!("{}", encoder.cnf().statistics());
            println!("instance: {}", output.display());
            println!("variables: {}", map.display());
        }
        Commands::Search {
            problem,
            output,
            known,
            solutions,
            instance,
        } => {
            if let Some(solutions) = solutions {
                config.search.solutions = solutions;
            }
            let instance = instance
                .unwrap_or_else(|| std::env::temp_dir().join(format!("brentsat_{}.cnf", std::process::id())));
            search(&problem, &config, &output, known.as_deref(), &instance, &mut rng)?;
        }
        Commands::Flip {
            input,
            output,
            target,
            steps,
            expand,
            resize,
        } => {
            let mut walk = config.flip.clone();
            if let Some(steps) = steps {
                walk.budget.steps = steps;
            }
            if target.is_some() {
                walk.target_rank = target;
            }
            let settings = FlipSettings { walk, expand, resize };
            flip(&input, &output, &settings, &config, &mut rng)?;
        }
        Commands::Canon { input, output } => {
            let mut scheme = record::load(&input)?;
            let result = scheme.sort(&mut rng, config.canon.max_iterations);
            if !result.is_converged() {
                warn!(?result, "canonical form not reached");
            }
            let output = output.unwrap_or(input);
            record::save(&scheme, &output)?;
            println!("{result:?}: {}", output.display());
        }
        Commands::Minimize {
            input,
            output,
            iterations,
        } => {
            let mut scheme = record::load(&input)?;
            let before = scheme.complexity();
            let improvements = scheme.minimize_complexity(&mut rng, iterations);
            let output = output.unwrap_or(input);
            record::save(&scheme, &output)?;
            println!(
                "complexity {before} -> {} ({improvements} improvements): {}",
                scheme.complexity(),
                output.display()
            );
        }
        Commands::Reduce {
            input,
            output,
            mode,
            flips,
            loops,
            max_size,
        } => {
            let mut reducer = config.additions.clone();
            if let Some(loops) = loops {
                reducer.max_loops = loops;
            }
            if let Some(max_size) = max_size {
                reducer.max_size = max_size;
            }
            let scheme = record::load(&input)?;
            let reduced = reducer.reduce_with_flips(&scheme, mode, flips, &mut rng)?;

            fs::create_dir_all(&output).with_context(|| format!("creating {}", output.display()))?;
            let path = output.join(reduced.file_name());
            let json = serde_json::to_string_pretty(&reduced)?;
            fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
            let [u, v, w] = reduced.fresh_counts();
            println!(
                "additions {} -> {} (fresh {u}/{v}/{w}): {}",
                reduced.complexity.naive,
                reduced.complexity.reduced,
                path.display()
            );
        }
        Commands::Show { input, packed } => {
            let scheme = record::load(&input)?;
            if packed {
                println!("{}", BitPackedScheme::from_scheme(&scheme)?);
            } else {
                show(&scheme);
            }
        }
    }
    Ok(())
}

fn build_encoder(problem: &Problem, config: &Config) -> Result<BrentEncoder> {
    let mut options = config.encoding.clone();
    if problem.native_xor {
        options.parity = ParityEncoding::Native;
    }
    if problem.no_symmetry {
        options.symmetry_breaking = false;
    }
    if problem.no_cardinality {
        options.cardinality = false;
    }
    let layout = match problem.cyclic {
        Some((s, t)) => Layout::Cyclic { s, t },
        None => Layout::Base,
    };
    Ok(BrentEncoder::new(problem.dims, problem.m, layout, options)?)
}

/// A single record, or every record in a directory
fn load_schemes(path: &Path) -> Result<Vec<Scheme>> {
    if path.is_dir() {
        Ok(record::load_dir(path)?.into_iter().map(|(_, scheme)| scheme).collect())
    } else {
        Ok(vec![record::load(path)?])
    }
}

fn search(
    problem: &Problem,
    config: &Config,
    output: &Path,
    known: Option<&Path>,
    instance: &Path,
    rng: &mut StdRng,
) -> Result<()> {
    fs::create_dir_all(output).with_context(|| format!("creating {}", output.display()))?;
    let mut encoder = build_encoder(problem, config)?;

    let mut pool: Vec<Scheme> = Vec::new();
    if let Some(path) = known {
        for scheme in load_schemes(path)? {
            let scheme = scheme.to_gf2()?;
            match encoder.exclude_scheme(&scheme) {
                Ok(()) => pool.push(scheme),
                Err(e) => warn!(error = %e, "known scheme does not fit the instance"),
            }
        }
        info!(known = pool.len(), "excluded known schemes");
    }

    let settings = &config.search;
    let mut found = 0;
    let mut misses = 0;
    let mut seed = config.seed;

    while found < settings.solutions {
        let biased = !pool.is_empty();
        if biased {
            let bias = bias_scheme(&pool, settings.flips, rng)?;
            encoder.set_probable_scheme(&bias, settings.probabilities, rng)?;
        }

        match solver::solve(&config.solver, encoder.cnf(), instance, seed)? {
            SolveOutcome::Satisfiable(model) => {
                misses = 0;
                encoder.exclude_model(&model);
                let mut scheme = encoder.decode(&model)?;
                if config.canon.enabled {
                    scheme.sort(rng, config.canon.max_iterations);
                }
                found += 1;
                let path = output.join(record::file_name(&scheme, found));
                record::save(&scheme, &path)?;
                info!(found, complexity = scheme.complexity(), path = %path.display(), "scheme found");
                if scheme.rank() == problem.m && encoder.layout() == Layout::Base {
                    pool.push(scheme);
                }
            }
            SolveOutcome::Unsatisfiable if !biased => {
                info!(found, "no further schemes exist");
                break;
            }
            outcome => {
                misses += 1;
                warn!(?outcome, misses, "no scheme this round");
                if misses > settings.retries {
                    break;
                }
            }
        }
        seed = seed.wrapping_add(1);
    }

    println!("{found} scheme(s) written to {}", output.display());
    Ok(())
}

/// Random known scheme, optionally perturbed by flips, rows sorted
fn bias_scheme(pool: &[Scheme], flips: usize, rng: &mut StdRng) -> Result<Scheme> {
    let mut scheme = pool[rng.random_range(0..pool.len())].clone();
    if flips > 0 {
        let mut packed = BitPackedScheme::from_scheme(&scheme)?;
        let rank = packed.rank();
        for _ in 0..rng.random_range(1..=flips) {
            if !packed.try_flip(rng) {
                break;
            }
        }
        // flips may expose reductions; only same-rank schemes fit the instance
        if packed.rank() == rank {
            scheme = packed.to_scheme();
        }
    }
    scheme.sort_multiplications();
    Ok(scheme)
}

struct FlipSettings {
    walk: FlipWalk,
    expand: usize,
    resize: Option<Dims>,
}

/// Extend dimensions below `target`, then project those above it
fn resize(scheme: &mut BitPackedScheme, target: Dims, rng: &mut StdRng) -> Result<()> {
    let current = scheme.dims();
    let upper = Dims::new(
        current.n1.max(target.n1),
        current.n2.max(target.n2),
        current.n3.max(target.n3),
    );
    while scheme.dims() != upper {
        if !scheme.try_extend(upper, rng) {
            bail!("cannot extend {} toward {upper}", scheme.dims());
        }
    }
    while scheme.dims() != target {
        if !scheme.try_project(target, rng) {
            bail!("cannot project {} to {target}", scheme.dims());
        }
    }
    info!(dims = %target, rank = scheme.rank(), "resized start scheme");
    Ok(())
}

fn flip(input: &Path, output: &Path, settings: &FlipSettings, config: &Config, rng: &mut StdRng) -> Result<()> {
    let scheme = record::load(input)?;
    let mut start = BitPackedScheme::from_scheme(&scheme)?;
    if let Some(target) = settings.resize {
        resize(&mut start, target, rng)?;
    }
    if settings.expand > 0 {
        let applied = start.expand(settings.expand, rng);
        info!(applied, rank = start.rank(), "expanded start scheme");
    }

    let report = settings.walk.run(&start, rng);
    let mut best = report.best.to_scheme();
    if config.canon.enabled {
        best.sort(rng, config.canon.max_iterations);
    }

    fs::create_dir_all(output).with_context(|| format!("creating {}", output.display()))?;
    let path = output.join(record::file_name(&best, 0));
    record::save(&best, &path)?;
    println!(
        "{:?} after {} steps: m {} -> {} ({})",
        report.outcome,
        report.steps,
        scheme.rank(),
        best.rank(),
        path.display()
    );
    Ok(())
}

fn show(scheme: &Scheme) {
    println!("{scheme}");
    println!();
    println!("complexity:   {}", scheme.complexity());
    println!("weight:       {}", scheme.weight());
    println!("ones:         {:?}", scheme.ones());
    println!("rank pattern: {}", scheme.rank_pattern());
    println!("invariant f:  {}", scheme.invariant_f());
    println!("invariant g:  {}", scheme.invariant_g());
    println!("invariant h:  {}", scheme.invariant_h());
}
