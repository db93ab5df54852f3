//! Run configuration, loaded from TOML.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) is a valid configuration:
//!
//! ```toml
//! seed = 42
//!
//! [solver]
//! threads = 8
//! max_time = 600
//!
//! [search]
//! solutions = 10
//!
//! [flip.budget]
//! steps = 1000000
//!
//! [additions]
//! max_size = 6
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::encode::EncodingOptions;
use crate::error::ConfigError;
use crate::flip::FlipWalk;
use crate::scheme::AdditionReducer;
use crate::solver::SolverConfig;

/// Top-level configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seed for every random choice (0 = draw one from the OS)
    pub seed: u64,
    pub solver: SolverConfig,
    pub search: SearchConfig,
    pub canon: CanonConfig,
    pub flip: FlipWalk,
    pub encoding: EncodingOptions,
    pub additions: AdditionReducer,
}

/// The solve loop: how many schemes to collect and how hard to try
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Stop after this many distinct schemes
    pub solutions: usize,
    /// Consecutive `Unknown` results tolerated before giving up
    pub retries: usize,
    /// Probability of pre-fixing a U, V, W entry to a known scheme's value
    pub probabilities: [f64; 3],
    /// Flips applied to a known scheme before it is used as a bias
    pub flips: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            solutions: 1,
            retries: 3,
            probabilities: [0.8, 0.8, 0.8],
            flips: 0,
        }
    }
}

/// Canonicalization
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanonConfig {
    pub enabled: bool,
    pub max_iterations: usize,
}

impl Default for CanonConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_iterations: 1_000,
        }
    }
}

impl Config {
    /// Parse TOML text
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&text)?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Load `path` when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
