//! Type-safe wrapper for model variables.
//!
//! Variables are identified by their index in the model (0-indexed, as in the
//! model files). The wrapper keeps variable ids apart from values, positions
//! and node indices, which are all plain integers as well.
use std::fmt;

/// A variable identifier (0-indexed).
///
/// The cardinality of a variable is not part of its identity: it is carried by
/// the [`Scope`][crate::scope::Scope] the variable appears in.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Var(u32);

impl Var {
    /// Creates a new variable with the given id.
    pub const fn new(id: u32) -> Self {
        Var(id)
    }

    /// Returns the raw variable id as a `u32`.
    pub const fn id(self) -> u32 {
        self.0
    }

    /// Returns the variable id as an index into per-variable tables.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

impl From<u32> for Var {
    fn from(id: u32) -> Self {
        Var(id)
    }
}

impl From<usize> for Var {
    fn from(index: usize) -> Self {
        assert!(index <= u32::MAX as usize, "Variable index {} is too large", index);
        Var(index as u32)
    }
}

impl From<Var> for u32 {
    fn from(var: Var) -> Self {
        var.0
    }
}
