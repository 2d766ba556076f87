//! Recoverable failures of the function algebra.
//!
//! Only conditions caused by bad input are reported here. Violations of the
//! store invariants (child count not matching the cardinality, access to a
//! collected node, reference count underflow) are defects and panic instead.

use thiserror::Error;

use crate::types::Var;

/// Error type for scope, assignment and function operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The same variable was given two different cardinalities.
    #[error("cardinality mismatch for {var}: expected {expected}, found {found}")]
    ScopeMismatch { var: Var, expected: usize, found: usize },

    /// A variable was declared with cardinality zero.
    #[error("variable {0} has zero cardinality")]
    ZeroCardinality(Var),

    /// The variable is not part of the scope (or of the pseudo-tree).
    #[error("variable {0} is not in scope")]
    UnknownVariable(Var),

    /// A value outside of `0..cardinality` was bound to a variable.
    #[error("value {value} is out of range for {var} with cardinality {cardinality}")]
    InvalidValue { var: Var, value: usize, cardinality: usize },

    /// A flat index outside of the state space.
    #[error("index {index} is out of range for {size} states")]
    InvalidIndex { index: usize, size: usize },

    /// A full assignment was required, but the variable is unbound.
    #[error("variable {0} is unassigned")]
    Unassigned(Var),

    /// A flat value table does not match the size of its scope.
    #[error("table has {found} entries, expected {expected}")]
    TableSize { expected: usize, found: usize },

    /// Function values must be finite non-negative numbers.
    #[error("weight {0} is not a finite non-negative number")]
    NegativeWeight(f64),

    /// The elimination order is not a permutation of the model variables.
    #[error("invalid elimination order: {0}")]
    InvalidOrder(String),

    /// Operands live in different stores or follow different pseudo-trees.
    #[error("operands are bound to different stores or pseudo-trees")]
    IncompatibleOperands,
}

pub type Result<T> = std::result::Result<T, Error>;
