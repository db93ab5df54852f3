//! DIMACS variable allocation.
//!
//! Variables are 1-based. "Real" variables carry a name and correspond to a
//! scheme entry; "fresh" ones are auxiliary (gate outputs, counters, carries).

use indexmap::IndexMap;

/// A signed DIMACS literal (`-v` is the negation of `v`)
pub type Lit = i64;

/// A disjunction of literals
pub type Clause = Vec<Lit>;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Kind {
    Real,
    Fresh,
}

/// Issues variable ids and remembers pre-fixed values
#[derive(Clone, Debug, Default)]
pub struct VariableStorage {
    names: IndexMap<String, Lit>,
    kinds: Vec<Kind>,
    values: IndexMap<Lit, bool>,
    fresh: usize,
}

impl VariableStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the real variable `name`, allocating it on first use
    pub fn real(&mut self, name: &str) -> Lit {
        if let Some(&id) = self.names.get(name) {
            return id;
        }
        self.kinds.push(Kind::Real);
        let id = self.kinds.len() as Lit;
        self.names.insert(name.to_string(), id);
        id
    }

    /// A new auxiliary variable
    pub fn fresh(&mut self) -> Lit {
        self.fresh += 1;
        self.kinds.push(Kind::Fresh);
        self.kinds.len() as Lit
    }

    /// Total number of variables
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn real_count(&self) -> usize {
        self.names.len()
    }

    pub fn fresh_count(&self) -> usize {
        self.fresh
    }

    /// Real variable ids in allocation order
    pub fn real_ids(&self) -> Vec<Lit> {
        self.names.values().copied().collect()
    }

    pub fn is_real(&self, id: Lit) -> bool {
        id > 0 && self.kinds.get(id as usize - 1) == Some(&Kind::Real)
    }

    /// Id of an already allocated real variable
    pub fn id(&self, name: &str) -> Option<Lit> {
        self.names.get(name).copied()
    }

    /// Name of a real variable
    pub fn name(&self, id: Lit) -> Option<&str> {
        self.names
            .iter()
            .find(|&(_, &v)| v == id)
            .map(|(name, _)| name.as_str())
    }

    /// Pre-fix variable `id` (emitted as a unit clause)
    pub fn set_value(&mut self, id: Lit, value: bool) {
        debug_assert!(id > 0 && (id as usize) <= self.len(), "unknown variable {id}");
        self.values.insert(id, value);
    }

    pub fn value(&self, id: Lit) -> Option<bool> {
        self.values.get(&id).copied()
    }

    pub fn clear_values(&mut self) {
        self.values.clear();
    }

    /// Pre-fixed values as signed literals, in the order they were set
    pub fn known_literals(&self) -> Vec<Lit> {
        self.values
            .iter()
            .map(|(&id, &value)| if value { id } else { -id })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_real_reuses_ids() {
        let mut vars = VariableStorage::new();
        let a = vars.real("u^1_1");
        let t = vars.fresh();
        let b = vars.real("u^1_2");
        assert_eq!((a, t, b), (1, 2, 3));
        assert_eq!(vars.real("u^1_1"), a);
        assert_eq!(vars.len(), 3);
        assert_eq!(vars.real_count(), 2);
        assert_eq!(vars.fresh_count(), 1);
        assert_eq!(vars.real_ids(), vec![1, 3]);
        assert!(vars.is_real(3));
        assert!(!vars.is_real(2));
        assert_eq!(vars.name(3), Some("u^1_2"));
    }

    #[test]
    fn test_known_literals() {
        let mut vars = VariableStorage::new();
        let a = vars.real("a");
        let b = vars.real("b");
        vars.set_value(b, false);
        vars.set_value(a, true);
        assert_eq!(vars.known_literals(), vec![-b, a]);
        assert_eq!(vars.value(a), Some(true));
        vars.clear_values();
        assert!(vars.known_literals().is_empty());
    }
}
