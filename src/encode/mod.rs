//! SAT encoding of the Brent equations.
//!
//! [`BrentEncoder`] turns "is there a GF(2) scheme of shape `dims` with `m`
//! products?" into a CNF instance. The [`VariableMap`] written next to the
//! instance ties the solver's variables back to scheme entries so a model can
//! be decoded with [`VariableMap::decode`].

pub mod brent;
pub mod cnf;
pub mod formulas;
pub mod vars;

pub use brent::{BrentEncoder, Layout};
pub use cnf::{Cnf, Line, Statistics};
pub use formulas::AndGates;
pub use vars::{Clause, Lit, VariableStorage};

use std::collections::HashSet;

use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};

use crate::error::SchemeError;
use crate::ring::{Coeff, Ring};
use crate::scheme::{Dims, Row, Scheme};

/// How parity constraints reach the solver
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParityEncoding {
    /// Plain clauses (chunked direct encoding)
    Cnf,
    /// `x`-prefixed native XOR lines
    Native,
}

/// Knobs of the Brent encoding
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingOptions {
    pub parity: ParityEncoding,
    /// Literals per parity chunk before a carry is introduced
    pub chunk: usize,
    pub symmetry_breaking: bool,
    pub cardinality: bool,
}

impl Default for EncodingOptions {
    fn default() -> Self {
        Self {
            parity: ParityEncoding::Cnf,
            chunk: 7,
            symmetry_breaking: true,
            cardinality: true,
        }
    }
}

/// Variable ids of the scheme entries, persisted as JSON next to the instance
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm")]
pub enum VariableMap {
    #[serde(rename = "base")]
    Base {
        n: Dims,
        m: usize,
        u: Vec<Vec<Lit>>,
        v: Vec<Vec<Lit>>,
        w: Vec<Vec<Lit>>,
    },
    #[serde(rename = "abcd")]
    Cyclic {
        n: usize,
        m: usize,
        s: usize,
        t: usize,
        a: Vec<Vec<Lit>>,
        b: Vec<Vec<Lit>>,
        c: Vec<Vec<Lit>>,
        d: Vec<Vec<Lit>>,
    },
}

impl VariableMap {
    pub fn dims(&self) -> Dims {
        match self {
            VariableMap::Base { n, .. } => *n,
            VariableMap::Cyclic { n, .. } => Dims::square(*n),
        }
    }

    pub fn rank(&self) -> usize {
        match self {
            VariableMap::Base { m, .. } | VariableMap::Cyclic { m, .. } => *m,
        }
    }

    /// Variable ids of U, V and W, one row per product
    pub fn factors(&self) -> [Vec<Vec<Lit>>; 3] {
        match self {
            VariableMap::Base { u, v, w, .. } => [u.clone(), v.clone(), w.clone()],
            VariableMap::Cyclic { a, b, c, d, .. } => {
                let u = a.iter().chain(b).chain(c).chain(d).cloned().collect();
                let v = a.iter().chain(d).chain(b).chain(c).cloned().collect();
                let w = a.iter().chain(c).chain(d).chain(b).cloned().collect();
                [u, v, w]
            }
        }
    }

    /// Build a GF(2) scheme from a model (signed literals, positive = true)
    pub fn decode(&self, model: &[Lit]) -> Result<Scheme, SchemeError> {
        let truth: HashSet<Lit> = model.iter().copied().filter(|&lit| lit > 0).collect();
        let rows = |ids: &Vec<Vec<Lit>>| -> Vec<Row> {
            ids.iter()
                .map(|row| {
                    row.iter()
                        .map(|id| if truth.contains(id) { Coeff::one() } else { Coeff::zero() })
                        .collect()
                })
                .collect()
        };
        let [u, v, w] = self.factors();
        Scheme::new(self.dims(), Ring::Gf2, rows(&u), rows(&v), rows(&w))
    }

    /// Clause forbidding the given assignment of the mapped variables
    pub fn blocking_clause(&self, model: &[Lit]) -> Clause {
        let truth: HashSet<Lit> = model.iter().copied().filter(|&lit| lit > 0).collect();
        let mut ids: Vec<Lit> = self.factors().into_iter().flatten().flatten().collect();
        ids.sort_unstable();
        ids.dedup();
        ids.into_iter()
            .map(|id| if truth.contains(&id) { -id } else { id })
            .collect()
    }
}
