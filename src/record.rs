//! Persisted scheme records (JSON).
//!
//! A record stores the factor matrices plus every derived quantity so that
//! collections of schemes can be compared without recomputing. Only `n`,
//! `m`, `z2` and the matrices are needed to load one back; the rest is
//! informational.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::RecordError;
use crate::ring::{Coeff, Ring};
use crate::scheme::{Dims, Row, Scheme};

/// One matrix entry: an integer, or an `"a/b"` string for non-integral values
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EntryRepr", into = "EntryRepr")]
pub struct Entry(pub Coeff);

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum EntryRepr {
    Int(i64),
    Bool(bool),
    Text(String),
}

impl TryFrom<EntryRepr> for Entry {
    type Error = String;

    fn try_from(repr: EntryRepr) -> Result<Self, Self::Error> {
        match repr {
            EntryRepr::Int(x) => Ok(Entry(Coeff::from_integer(x))),
            EntryRepr::Bool(b) => Ok(Entry(Coeff::from_integer(i64::from(b)))),
            EntryRepr::Text(text) => text
                .trim()
                .parse::<Coeff>()
                .map(Entry)
                .map_err(|_| format!("invalid coefficient `{text}`")),
        }
    }
}

impl From<Entry> for EntryRepr {
    fn from(entry: Entry) -> Self {
        if entry.0.is_integer() {
            EntryRepr::Int(entry.0.to_integer())
        } else {
            EntryRepr::Text(entry.0.to_string())
        }
    }
}

/// On-disk form of a scheme
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub n: Dims,
    pub m: usize,
    pub z2: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ring: Option<Ring>,
    #[serde(default)]
    pub multiplications: Vec<String>,
    #[serde(default)]
    pub elements: Vec<String>,
    pub u: Vec<Vec<Entry>>,
    pub v: Vec<Vec<Entry>>,
    pub w: Vec<Vec<Entry>>,
    #[serde(default)]
    pub invariant_f: String,
    #[serde(default)]
    pub invariant_g: String,
    #[serde(default)]
    pub invariant_h: String,
    #[serde(default)]
    pub rank_pattern: String,
    #[serde(default)]
    pub weight: usize,
    #[serde(default)]
    pub complexity: i64,
    #[serde(default)]
    pub ranks: Vec<[usize; 3]>,
    #[serde(default)]
    pub ones: [usize; 3],
}

impl Record {
    pub fn from_scheme(scheme: &Scheme) -> Self {
        let entries = |rows: &[Row]| -> Vec<Vec<Entry>> {
            rows.iter()
                .map(|row| row.iter().copied().map(Entry).collect())
                .collect()
        };

        Record {
            n: scheme.dims(),
            m: scheme.rank(),
            z2: scheme.ring() == Ring::Gf2,
            ring: Some(scheme.ring()),
            multiplications: scheme.multiplications(),
            elements: scheme.elements(),
            u: entries(scheme.u()),
            v: entries(scheme.v()),
            w: entries(scheme.w()),
            invariant_f: scheme.invariant_f(),
            invariant_g: scheme.invariant_g(),
            invariant_h: scheme.invariant_h(),
            rank_pattern: scheme.rank_pattern(),
            weight: scheme.weight(),
            complexity: scheme.complexity(),
            ranks: scheme.ranks().into_iter().map(|(a, b, c)| [a, b, c]).collect(),
            ones: scheme.ones(),
        }
    }

    /// Ring of the stored matrices; older records only carry `z2`
    pub fn ring(&self) -> Ring {
        if let Some(ring) = self.ring {
            return ring;
        }
        if self.z2 {
            return Ring::Gf2;
        }
        let integral = [&self.u, &self.v, &self.w]
            .into_iter()
            .flatten()
            .flatten()
            .all(|entry| entry.0.is_integer());
        if integral {
            Ring::Integer
        } else {
            Ring::Rational
        }
    }

    pub fn to_scheme(&self) -> Result<Scheme, RecordError> {
        if self.u.len() != self.m || self.v.len() != self.m || self.w.len() != self.m {
            return Err(RecordError::Malformed(format!(
                "m = {} but matrices have {}, {}, {} rows",
                self.m,
                self.u.len(),
                self.v.len(),
                self.w.len()
            )));
        }
        let rows = |entries: &[Vec<Entry>]| -> Vec<Row> {
            entries
                .iter()
                .map(|row| row.iter().map(|entry| entry.0).collect())
                .collect()
        };
        Ok(Scheme::new(self.n, self.ring(), rows(&self.u), rows(&self.v), rows(&self.w))?)
    }
}

/// Parse a record from JSON text
pub fn from_json(text: &str) -> Result<Scheme, RecordError> {
    let record: Record = serde_json::from_str(text)?;
    record.to_scheme()
}

/// Render a scheme as pretty JSON
pub fn to_json(scheme: &Scheme) -> Result<String, RecordError> {
    Ok(serde_json::to_string_pretty(&Record::from_scheme(scheme))?)
}

pub fn load(path: &Path) -> Result<Scheme, RecordError> {
    let text = fs::read_to_string(path).map_err(|source| RecordError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    from_json(&text)
}

pub fn save(scheme: &Scheme, path: &Path) -> Result<(), RecordError> {
    let text = to_json(scheme)?;
    fs::write(path, text).map_err(|source| RecordError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), m = scheme.rank(), "saved scheme");
    Ok(())
}

/// Load every `*.json` record in `dir` (sorted by name); bad files are logged and skipped
pub fn load_dir(dir: &Path) -> Result<Vec<(PathBuf, Scheme)>, RecordError> {
    let entries = fs::read_dir(dir).map_err(|source| RecordError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut schemes = Vec::with_capacity(paths.len());
    for path in paths {
        match load(&path) {
            Ok(scheme) => schemes.push((path, scheme)),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping record"),
        }
    }
    Ok(schemes)
}

/// `2x2x2_m7_c18_000001_Z2.json`
pub fn file_name(scheme: &Scheme, index: usize) -> String {
    let d = scheme.dims();
    format!(
        "{}x{}x{}_m{}_c{}_{:06}_{}.json",
        d.n1,
        d.n2,
        d.n3,
        scheme.rank(),
        scheme.complexity(),
        index,
        scheme.ring()
    )
}
