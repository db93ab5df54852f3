//! Clause container and DIMACS writer.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};

use super::vars::{Clause, Lit, VariableStorage};

/// One line of the instance, kept in insertion order
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Line {
    Comment(String),
    Clause(Clause),
    /// Native parity constraint: XOR of the literals is true
    Xor(Vec<Lit>),
}

/// A CNF instance together with its variables
#[derive(Clone, Debug, Default)]
pub struct Cnf {
    pub vars: VariableStorage,
    lines: Vec<Line>,
    clauses: usize,
    xors: usize,
}

/// Size summary of an instance
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Statistics {
    pub variables: usize,
    pub real: usize,
    pub fresh: usize,
    pub clauses: usize,
    pub xor_clauses: usize,
    /// clause length → count
    pub lengths: BTreeMap<usize, usize>,
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "variables: {} (real: {}, fresh: {}), clauses: {}, xor: {}",
            self.variables, self.real, self.fresh, self.clauses, self.xor_clauses
        )?;
        for (length, count) in &self.lengths {
            write!(f, ", {length}-literal: {count}")?;
        }
        Ok(())
    }
}

impl Cnf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append clauses under an optional comment
    pub fn add(&mut self, clauses: impl IntoIterator<Item = Clause>, comment: &str) {
        if !comment.is_empty() {
            self.lines.push(Line::Comment(comment.to_string()));
        }
        for clause in clauses {
            self.clauses += 1;
            self.lines.push(Line::Clause(clause));
        }
    }

    /// Append a native XOR line (XOR of `literals` is true)
    pub fn add_xor(&mut self, literals: Vec<Lit>) {
        self.xors += 1;
        self.lines.push(Line::Xor(literals));
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Plain clauses including the pre-fixed unit literals
    pub fn clauses(&self) -> Vec<Clause> {
        self.lines
            .iter()
            .filter_map(|line| match line {
                Line::Clause(clause) => Some(clause.clone()),
                _ => None,
            })
            .chain(self.vars.known_literals().into_iter().map(|lit| vec![lit]))
            .collect()
    }

    pub fn clause_count(&self) -> usize {
        self.clauses + self.vars.known_literals().len()
    }

    pub fn xor_count(&self) -> usize {
        self.xors
    }

    pub fn statistics(&self) -> Statistics {
        let mut lengths = BTreeMap::new();
        for clause in self.clauses() {
            *lengths.entry(clause.len()).or_default() += 1;
        }
        Statistics {
            variables: self.vars.len(),
            real: self.vars.real_count(),
            fresh: self.vars.fresh_count(),
            clauses: self.clause_count(),
            xor_clauses: self.xors,
            lengths,
        }
    }

    /// Write `p cnf V C`, the lines, then pre-fixed values as unit clauses
    pub fn write_dimacs<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "p cnf {} {}", self.vars.len(), self.clause_count() + self.xors)?;
        for line in &self.lines {
            match line {
                Line::Comment(text) => writeln!(out, "c {text}")?,
                Line::Clause(lits) => write_literals(out, "", lits)?,
                Line::Xor(lits) => write_literals(out, "x", lits)?,
            }
        }

        let known = self.vars.known_literals();
        if !known.is_empty() {
            writeln!(out, "c literals")?;
            for lit in known {
                writeln!(out, "{lit} 0")?;
            }
        }
        Ok(())
    }

    pub fn to_dimacs(&self) -> String {
        let mut buffer = Vec::new();
        // Writing into a Vec cannot fail
        let _ = self.write_dimacs(&mut buffer);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

fn write_literals<W: Write>(out: &mut W, prefix: &str, lits: &[Lit]) -> io::Result<()> {
    out.write_all(prefix.as_bytes())?;
    for lit in lits {
        write!(out, "{lit} ")?;
    }
    writeln!(out, "0")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimacs_layout() {
        let mut cnf = Cnf::new();
        let a = cnf.vars.real("a");
        let b = cnf.vars.real("b");
        let c = cnf.vars.fresh();
        cnf.add(vec![vec![a, -b], vec![c]], "first");
        cnf.add_xor(vec![a, b, c]);
        cnf.vars.set_value(b, true);

        let text = cnf.to_dimacs();
        let expected = "p cnf 3 4\nc first\n1 -2 0\n3 0\nx1 2 3 0\nc literals\n2 0\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_statistics() {
        let mut cnf = Cnf::new();
        let a = cnf.vars.real("a");
        let t = cnf.vars.fresh();
        cnf.add(vec![vec![a, t], vec![-a, t], vec![t]], "");
        let stats = cnf.statistics();
        assert_eq!(stats.variables, 2);
        assert_eq!(stats.real, 1);
        assert_eq!(stats.fresh, 1);
        assert_eq!(stats.clauses, 3);
        assert_eq!(stats.lengths.get(&2), Some(&2));
        assert!(cnf.lines().iter().all(|line| !matches!(line, Line::Comment(_))));
    }
}
