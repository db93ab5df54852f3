//! Brent equation instances.

use rand::Rng;
use tracing::{debug, info};

use super::cnf::Cnf;
use super::formulas::{self, AndGates};
use super::vars::{Clause, Lit};
use super::{EncodingOptions, ParityEncoding, VariableMap};
use crate::error::SchemeError;
use crate::ring::Ring;
use crate::scheme::{Dims, Scheme};

/// Shape of the unknown scheme
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    /// Independent U, V, W for every product
    Base,
    /// Square only: `s` products of the form (a, a, a) and `t` cyclic
    /// triples (b, d, c), (c, b, d), (d, c, b); m = s + 3t
    Cyclic { s: usize, t: usize },
}

/// Builds the CNF instance for one (dims, m, layout)
#[derive(Clone, Debug)]
pub struct BrentEncoder {
    dims: Dims,
    rank: usize,
    layout: Layout,
    options: EncodingOptions,
    cnf: Cnf,
    gates: AndGates,
    map: VariableMap,
}

fn real_rows(cnf: &mut Cnf, prefix: char, rows: usize, columns: usize) -> Vec<Vec<Lit>> {
    (0..rows)
        .map(|r| (0..columns).map(|i| cnf.vars.real(&format!("{prefix}^{}_{}", r + 1, i + 1))).collect())
        .collect()
}

fn concat(parts: &[&[Vec<Lit>]]) -> Vec<Lit> {
    parts.iter().flat_map(|rows| rows.iter().flatten()).copied().collect()
}

impl BrentEncoder {
    /// Allocate variables and encode every constraint
    pub fn new(dims: Dims, rank: usize, layout: Layout, options: EncodingOptions) -> Result<Self, SchemeError> {
        if dims.n1 == 0 || dims.n2 == 0 || dims.n3 == 0 {
            return Err(SchemeError::Shape("positive dimensions"));
        }

        let mut cnf = Cnf::new();
        let map = match layout {
            Layout::Base => VariableMap::Base {
                n: dims,
                m: rank,
                u: real_rows(&mut cnf, 'u', rank, dims.u_len()),
                v: real_rows(&mut cnf, 'v', rank, dims.v_len()),
                w: real_rows(&mut cnf, 'w', rank, dims.w_len()),
            },
            Layout::Cyclic { s, t } => {
                if !dims.is_square() {
                    return Err(SchemeError::Shape("square dimensions for the cyclic layout"));
                }
                if rank != s + 3 * t {
                    return Err(SchemeError::Shape("m = s + 3t for the cyclic layout"));
                }
                let nn = dims.u_len();
                VariableMap::Cyclic {
                    n: dims.n1,
                    m: rank,
                    s,
                    t,
                    a: real_rows(&mut cnf, 'a', s, nn),
                    b: real_rows(&mut cnf, 'b', t, nn),
                    c: real_rows(&mut cnf, 'c', t, nn),
                    d: real_rows(&mut cnf, 'd', t, nn),
                }
            }
        };

        let mut encoder = Self {
            dims,
            rank,
            layout,
            options,
            cnf,
            gates: AndGates::new(),
            map,
        };

        encoder.encode_equations();
        if encoder.options.cardinality {
            encoder.encode_cardinality();
        }
        if encoder.options.symmetry_breaking {
            encoder.encode_ordering();
        }

        info!(
            dims = %dims,
            m = rank,
            layout = ?layout,
            "encoded brent equations: {}",
            encoder.cnf.statistics()
        );
        Ok(encoder)
    }

    pub fn dims(&self) -> Dims {
        self.dims
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn cnf(&self) -> &Cnf {
        &self.cnf
    }

    pub fn variable_map(&self) -> &VariableMap {
        &self.map
    }

    pub fn gates(&self) -> &AndGates {
        &self.gates
    }

    // ------------------------------------------------------------------------
    // Equations
    // ------------------------------------------------------------------------

    fn encode_equations(&mut self) {
        let d = self.dims;
        let [u, v, w] = self.map.factors();

        for i in 0..d.u_len() {
            for j in 0..d.v_len() {
                for k in 0..d.w_len() {
                    let target = d.target(i, j, k);
                    let mut clauses: Vec<Clause> = Vec::new();
                    let mut terms: Vec<Lit> = Vec::with_capacity(self.rank);

                    for r in 0..self.rank {
                        let inputs = [u[r][i], v[r][j], w[r][k]];
                        if let Some(t) = self.gates.and_all(&mut self.cnf.vars, &mut clauses, &inputs) {
                            terms.push(t);
                        }
                    }

                    if !target {
                        match terms.first_mut() {
                            Some(first) => *first = -*first,
                            // An empty sum is already zero
                            None => {
                                self.cnf.add(clauses, "");
                                continue;
                            }
                        }
                    }

                    self.cnf.add(clauses, &format!("equation {} {} {} = {}", i + 1, j + 1, k + 1, target));
                    self.add_parity(&terms);
                }
            }
        }
        debug!(gates = self.gates.len(), "brent equations encoded");
    }

    /// XOR of `terms` is true
    fn add_parity(&mut self, terms: &[Lit]) {
        for part in formulas::xor_chain(terms, &mut self.cnf.vars, self.options.chunk) {
            match self.options.parity {
                ParityEncoding::Cnf => self.cnf.add(formulas::xor_clauses(&part), ""),
                ParityEncoding::Native => self.cnf.add_xor(part),
            }
        }
    }

    // ------------------------------------------------------------------------
    // Cardinality
    // ------------------------------------------------------------------------

    fn encode_cardinality(&mut self) {
        let d = self.dims;
        match &self.map {
            VariableMap::Base { u, v, w, .. } => {
                let bounds = [(u, 'u', d.n3), (v, 'v', d.n1), (w, 'w', d.n2)];
                for (rows, name, k_column) in bounds {
                    let clauses = formulas::at_least_k_matrix(rows, 1, k_column, &mut self.cnf.vars);
                    self.cnf.add(clauses, &format!("at least {name} (1 in rows, {k_column} in columns)"));
                }
            }
            VariableMap::Cyclic { a, b, c, d: dd, .. } => {
                let rows: Vec<Vec<Lit>> = a.iter().chain(b).chain(c).chain(dd).cloned().collect();
                let clauses = formulas::at_least_k_matrix(&rows, 1, d.n1, &mut self.cnf.vars);
                self.cnf.add(clauses, &format!("at least abcd (1 in rows, {} in columns)", d.n1));
            }
        }
        debug!("cardinality constraints encoded");
    }

    // ------------------------------------------------------------------------
    // Symmetry breaking
    // ------------------------------------------------------------------------

    fn encode_ordering(&mut self) {
        match self.map.clone() {
            VariableMap::Base { u, v, w, .. } => {
                let rows: Vec<Vec<Lit>> = (0..self.rank).map(|r| concat(&[&u[r..=r], &v[r..=r]])).collect();
                let clauses = formulas::lex_chain(&rows, &mut self.cnf.vars, true);
                self.cnf.add(clauses, "multiplications ordering");

                if self.dims.is_square() {
                    let uvw = concat(&[u.as_slice(), v.as_slice(), w.as_slice()]);
                    let wuv = concat(&[w.as_slice(), u.as_slice(), v.as_slice()]);
                    let vwu = concat(&[v.as_slice(), w.as_slice(), u.as_slice()]);
                    let first = formulas::lex_order(&uvw, &wuv, &mut self.cnf.vars, false);
                    self.cnf.add(first, "cycle shift uvw <= wuv");
                    let second = formulas::lex_order(&uvw, &vwu, &mut self.cnf.vars, false);
                    self.cnf.add(second, "cycle shift uvw <= vwu");
                }

                self.encode_basis_ordering(&u, &v, &w);
            }
            VariableMap::Cyclic { a, b, c, d, t, .. } => {
                let clauses = formulas::lex_chain(&a, &mut self.cnf.vars, false);
                self.cnf.add(clauses, "a ordering");

                let triple = |x: &[Vec<Lit>], y: &[Vec<Lit>], z: &[Vec<Lit>], r: usize| concat(&[&x[r..=r], &y[r..=r], &z[r..=r]]);
                let bcd: Vec<Vec<Lit>> = (0..t).map(|r| triple(&b, &c, &d, r)).collect();
                let clauses = formulas::lex_chain(&bcd, &mut self.cnf.vars, false);
                self.cnf.add(clauses, "bcd ordering");

                for r in 0..t {
                    let dbc = triple(&d, &b, &c, r);
                    let cdb = triple(&c, &d, &b, r);
                    let mut clauses = formulas::lex_order(&bcd[r], &dbc, &mut self.cnf.vars, false);
                    clauses.extend(formulas::lex_order(&bcd[r], &cdb, &mut self.cnf.vars, false));
                    self.cnf.add(clauses, &format!("bcd rotation {}", r + 1));
                }
            }
        }
        debug!("symmetry breaking encoded");
    }

    /// Basis rows (U row i ‖ W column i) and columns (V column j ‖ W row j)
    fn encode_basis_ordering(&mut self, u: &[Vec<Lit>], v: &[Vec<Lit>], w: &[Vec<Lit>]) {
        let d = self.dims;

        let rows: Vec<Vec<Lit>> = (0..d.n1)
            .map(|i| {
                let row_u = u.iter().flat_map(|row| row[i * d.n2..(i + 1) * d.n2].iter().copied());
                let column_w = w.iter().flat_map(|row| (0..d.n3).map(move |c| row[c * d.n1 + i]));
                row_u.chain(column_w).collect()
            })
            .collect();

        let columns: Vec<Vec<Lit>> = (0..d.n3)
            .map(|j| {
                let column_v = v.iter().flat_map(|row| (0..d.n2).map(move |b| row[b * d.n3 + j]));
                let row_w = w.iter().flat_map(|row| row[j * d.n1..(j + 1) * d.n1].iter().copied());
                column_v.chain(row_w).collect()
            })
            .collect();

        let clauses = formulas::lex_chain(&rows, &mut self.cnf.vars, false);
        self.cnf.add(clauses, "basis rows ordering");
        let clauses = formulas::lex_chain(&columns, &mut self.cnf.vars, false);
        self.cnf.add(clauses, "basis columns ordering");
    }

    // ------------------------------------------------------------------------
    // Incremental use
    // ------------------------------------------------------------------------

    /// Forbid the model's assignment of the real variables
    pub fn exclude_model(&mut self, model: &[Lit]) {
        let clause = self.map.blocking_clause(model);
        self.cnf.add([clause], "exclude solution");
    }

    fn check_matches(&self, scheme: &Scheme) -> Result<(), SchemeError> {
        if self.layout != Layout::Base || scheme.dims() != self.dims || scheme.rank() != self.rank {
            return Err(SchemeError::Shape("a scheme matching the encoded base layout"));
        }
        if scheme.ring() != Ring::Gf2 {
            return Err(SchemeError::RingUnsupported(scheme.ring()));
        }
        Ok(())
    }

    /// Model literals describing `scheme` in this encoding
    fn scheme_literals(&self, scheme: &Scheme) -> Vec<Lit> {
        let ids = self.map.factors();
        let mut literals = Vec::new();
        for (f, rows) in ids.iter().enumerate() {
            for (r, row) in rows.iter().enumerate() {
                for (x, &id) in row.iter().enumerate() {
                    let set = !Ring::Gf2.is_zero(&scheme.factor(f)[r][x]);
                    literals.push(if set { id } else { -id });
                }
            }
        }
        literals
    }

    /// Forbid exactly this GF(2) scheme (same dims and rank, base layout)
    pub fn exclude_scheme(&mut self, scheme: &Scheme) -> Result<(), SchemeError> {
        self.check_matches(scheme)?;
        let literals = self.scheme_literals(scheme);
        self.exclude_model(&literals);
        Ok(())
    }

    /// Pre-fix each entry to the scheme's value with probability `pu`/`pv`/`pw`.
    ///
    /// Previous biasing is discarded. Returns how many entries were fixed.
    pub fn set_probable_scheme<R: Rng + ?Sized>(
        &mut self,
        scheme: &Scheme,
        probabilities: [f64; 3],
        rng: &mut R,
    ) -> Result<usize, SchemeError> {
        self.check_matches(scheme)?;
        self.cnf.vars.clear_values();

        let ids = self.map.factors();
        let mut fixed = 0;
        for (f, rows) in ids.iter().enumerate() {
            let p = probabilities[f].clamp(0.0, 1.0);
            for (r, row) in rows.iter().enumerate() {
                for (x, &id) in row.iter().enumerate() {
                    if rng.random_bool(p) {
                        self.cnf.vars.set_value(id, !Ring::Gf2.is_zero(&scheme.factor(f)[r][x]));
                        fixed += 1;
                    }
                }
            }
        }
        debug!(fixed, "biased instance toward known scheme");
        Ok(fixed)
    }

    /// Drop all pre-fixed values
    pub fn clear_bias(&mut self) {
        self.cnf.vars.clear_values();
    }

    /// Decode a model (see [`VariableMap::decode`])
    pub fn decode(&self, model: &[Lit]) -> Result<Scheme, SchemeError> {
        self.map.decode(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cyclic_requires_square_and_rank() {
        let options = EncodingOptions::default();
        assert!(BrentEncoder::new(Dims::new(2, 2, 3), 7, Layout::Cyclic { s: 1, t: 2 }, options.clone()).is_err());
        assert!(BrentEncoder::new(Dims::square(2), 8, Layout::Cyclic { s: 1, t: 2 }, options.clone()).is_err());
        assert!(BrentEncoder::new(Dims::square(2), 7, Layout::Cyclic { s: 1, t: 2 }, options).is_ok());
    }

    #[test]
    fn test_real_variables_first() {
        let encoder = BrentEncoder::new(Dims::square(2), 7, Layout::Base, EncodingOptions::default()).unwrap();
        let vars = &encoder.cnf().vars;
        assert_eq!(vars.real_count(), 3 * 7 * 4);
        assert_eq!(vars.real_ids(), (1..=84).collect::<Vec<_>>());
        assert_eq!(vars.name(1), Some("u^1_1"));
        assert!(encoder.cnf().xor_count() == 0);
    }

    #[test]
    fn test_native_parity_lines() {
        let options = EncodingOptions {
            parity: ParityEncoding::Native,
            symmetry_breaking: false,
            cardinality: false,
            ..EncodingOptions::default()
        };
        let encoder = BrentEncoder::new(Dims::square(2), 7, Layout::Base, options).unwrap();
        // 64 equations with 7 terms each fit in one chunk
        assert_eq!(encoder.cnf().xor_count(), 64);
        assert!(encoder.cnf().to_dimacs().lines().any(|line| line.starts_with('x')));
    }

    #[test]
    fn test_exclude_scheme_requires_matching_shape() {
        let mut encoder = BrentEncoder::new(Dims::square(2), 7, Layout::Base, EncodingOptions::default()).unwrap();
        let naive = Scheme::naive(Dims::square(2), Ring::Gf2);
        assert!(encoder.exclude_scheme(&naive).is_err());
    }
}
