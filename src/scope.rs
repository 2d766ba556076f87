//! Ordered, cardinality-typed variable sets.
//!
//! A [`Scope`] maps each of its variables to a cardinality and keeps an explicit
//! ordering of the variables. The ordering defines the mixed-radix layout of
//! flat value tables: the first variable is the most significant digit.
//!
//! Combining two scopes (union, intersection, difference) requires the shared
//! variables to agree on their cardinality.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use num_bigint::BigUint;

use crate::error::{Error, Result};
use crate::types::Var;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    /// Variables with their cardinalities, in scope order.
    vars: Vec<(Var, usize)>,
    /// Position of each variable in `vars`.
    positions: HashMap<Var, usize>,
}

impl Scope {
    /// Create an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scope from `(variable, cardinality)` pairs, in the given order.
    ///
    /// Repeated variables are allowed as long as their cardinalities agree.
    pub fn from_vars(vars: impl IntoIterator<Item = (Var, usize)>) -> Result<Self> {
        let mut scope = Self::new();
        for (var, card) in vars {
            scope.add(var, card)?;
        }
        Ok(scope)
    }

    /// Append a variable to the scope.
    ///
    /// Returns `true` if the variable was not yet in the scope.
    pub fn add(&mut self, var: Var, card: usize) -> Result<bool> {
        if card == 0 {
            return Err(Error::ZeroCardinality(var));
        }
        match self.cardinality(var) {
            Some(expected) if expected != card => Err(Error::ScopeMismatch {
                var,
                expected,
                found: card,
            }),
            Some(_) => Ok(false),
            None => {
                self.positions.insert(var, self.vars.len());
                self.vars.push((var, card));
                Ok(true)
            }
        }
    }

    /// Remove a variable, keeping the relative order of the others.
    ///
    /// Returns `true` if the variable was present.
    pub fn remove(&mut self, var: Var) -> bool {
        let Some(pos) = self.positions.remove(&var) else {
            return false;
        };
        self.vars.remove(pos);
        for (i, &(v, _)) in self.vars.iter().enumerate().skip(pos) {
            self.positions.insert(v, i);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn contains(&self, var: Var) -> bool {
        self.positions.contains_key(&var)
    }

    pub fn cardinality(&self, var: Var) -> Option<usize> {
        self.position(var).map(|i| self.vars[i].1)
    }

    /// Position of the variable in the scope order.
    pub fn position(&self, var: Var) -> Option<usize> {
        self.positions.get(&var).copied()
    }

    /// Variables in scope order.
    pub fn vars(&self) -> impl Iterator<Item = Var> + '_ {
        self.vars.iter().map(|&(v, _)| v)
    }

    /// `(variable, cardinality)` pairs in scope order.
    pub fn iter(
        &self,
    ) -> impl DoubleEndedIterator<Item = (Var, usize)> + ExactSizeIterator + '_ {
        self.vars.iter().copied()
    }

    /// Number of joint states, saturating at `usize::MAX`.
    ///
    /// The empty scope has exactly one state.
    pub fn num_states(&self) -> usize {
        self.vars
            .iter()
            .fold(1usize, |acc, &(_, card)| acc.saturating_mul(card))
    }

    /// Exact number of joint states.
    pub fn state_space(&self) -> BigUint {
        self.vars
            .iter()
            .fold(BigUint::from(1u32), |acc, &(_, card)| acc * BigUint::from(card))
    }

    /// Check that the variables shared with `other` agree on their cardinality.
    pub fn check_compatible(&self, other: &Scope) -> Result<()> {
        for (var, found) in other.iter() {
            if let Some(expected) = self.cardinality(var) {
                if expected != found {
                    return Err(Error::ScopeMismatch {
                        var,
                        expected,
                        found,
                    });
                }
            }
        }
        Ok(())
    }

    /// Variables of `self` (in order) followed by the new variables of `other`.
    pub fn union(&self, other: &Scope) -> Result<Scope> {
        self.check_compatible(other)?;
        let mut result = self.clone();
        for (var, card) in other.iter() {
            result.add(var, card)?;
        }
        Ok(result)
    }

    /// Variables of `self` that are also in `other`, in the order of `self`.
    pub fn intersect(&self, other: &Scope) -> Result<Scope> {
        self.check_compatible(other)?;
        Scope::from_vars(self.iter().filter(|&(v, _)| other.contains(v)))
    }

    /// Variables of `self` that are not in `other`, in the order of `self`.
    pub fn difference(&self, other: &Scope) -> Result<Scope> {
        self.check_compatible(other)?;
        Scope::from_vars(self.iter().filter(|&(v, _)| !other.contains(v)))
    }

    /// The same variables, rearranged into the given order.
    pub fn with_order(&self, order: &[Var]) -> Result<Scope> {
        if order.len() != self.len() {
            return Err(Error::InvalidOrder(format!(
                "expected {} variables, found {}",
                self.len(),
                order.len()
            )));
        }
        let mut result = Scope::new();
        for &var in order {
            let card = self.cardinality(var).ok_or(Error::UnknownVariable(var))?;
            if !result.add(var, card)? {
                return Err(Error::InvalidOrder(format!("{} appears twice", var)));
            }
        }
        Ok(result)
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, (var, card)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}:{}", var, card)?;
        }
        write!(f, "]")
    }
}
