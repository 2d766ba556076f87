//! Value bindings over a scope.
//!
//! An [`Assignment`] binds each variable of its [`Scope`] to a value or leaves it
//! unassigned. It provides the canonical mixed-radix indexing of flat tables
//! (first variable in scope order is the most significant digit) and odometer
//! enumeration of all joint states (last variable changes fastest).

use std::fmt::{Display, Formatter};

use crate::error::{Error, Result};
use crate::scope::Scope;
use crate::types::Var;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    scope: Scope,
    /// Bound values, parallel to the scope order.
    values: Vec<Option<usize>>,
}

impl Assignment {
    /// Create an assignment over `scope` with every variable unassigned.
    pub fn new(scope: Scope) -> Self {
        let values = vec![None; scope.len()];
        Self { scope, values }
    }

    /// Create a complete assignment from values given in scope order.
    pub fn from_values(scope: Scope, values: &[usize]) -> Result<Self> {
        if values.len() != scope.len() {
            return Err(Error::TableSize {
                expected: scope.len(),
                found: values.len(),
            });
        }
        let mut assignment = Self::new(scope);
        for (pos, &value) in values.iter().enumerate() {
            let (var, _) = assignment.entry(pos);
            assignment.set(var, value)?;
        }
        Ok(assignment)
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    fn entry(&self, pos: usize) -> (Var, usize) {
        self.scope
            .iter()
            .nth(pos)
            .unwrap_or_else(|| panic!("Position {} is out of scope", pos))
    }

    /// Bind `var` to `value`.
    pub fn set(&mut self, var: Var, value: usize) -> Result<()> {
        let pos = self.scope.position(var).ok_or(Error::UnknownVariable(var))?;
        let cardinality = self.scope.cardinality(var).unwrap_or(0);
        if value >= cardinality {
            return Err(Error::InvalidValue {
                var,
                value,
                cardinality,
            });
        }
        self.values[pos] = Some(value);
        Ok(())
    }

    /// Remove the binding of `var`, if any.
    pub fn unset(&mut self, var: Var) {
        if let Some(pos) = self.scope.position(var) {
            self.values[pos] = None;
        }
    }

    /// The value bound to `var`, if any.
    pub fn get(&self, var: Var) -> Option<usize> {
        self.scope.position(var).and_then(|pos| self.values[pos])
    }

    /// Bind every variable to zero.
    pub fn reset(&mut self) {
        self.values.fill(Some(0));
    }

    /// Unbind every variable.
    pub fn clear(&mut self) {
        self.values.fill(None);
    }

    pub fn is_complete(&self) -> bool {
        self.values.iter().all(Option::is_some)
    }

    /// Bound `(variable, value)` pairs, in scope order.
    pub fn bindings(&self) -> impl Iterator<Item = (Var, usize)> + '_ {
        self.scope
            .vars()
            .zip(self.values.iter())
            .filter_map(|(var, value)| value.map(|x| (var, x)))
    }

    /// Mixed-radix index of the assignment.
    ///
    /// Returns `None` if any variable is unassigned.
    pub fn index(&self) -> Option<usize> {
        let mut index = 0;
        for ((_, card), value) in self.scope.iter().zip(self.values.iter()) {
            index = index * card + (*value)?;
        }
        Some(index)
    }

    /// Bind all variables according to the mixed-radix `index`.
    pub fn set_index(&mut self, index: usize) -> Result<()> {
        let size = self.scope.num_states();
        if index >= size {
            return Err(Error::InvalidIndex { index, size });
        }
        let cards: Vec<usize> = self.scope.iter().map(|(_, c)| c).collect();
        let mut rest = index;
        for (pos, card) in cards.into_iter().enumerate().rev() {
            self.values[pos] = Some(rest % card);
            rest /= card;
        }
        Ok(())
    }

    /// Advance to the next joint state (the last variable changes fastest).
    ///
    /// Returns `false` when the odometer wraps around to all zeros, or if some
    /// variable is unassigned (in which case nothing changes).
    pub fn iterate(&mut self) -> bool {
        if !self.is_complete() {
            return false;
        }
        let cards: Vec<usize> = self.scope.iter().map(|(_, c)| c).collect();
        for pos in (0..self.values.len()).rev() {
            let next = self.values[pos].map_or(0, |x| x + 1);
            if next < cards[pos] {
                self.values[pos] = Some(next);
                return true;
            }
            self.values[pos] = Some(0);
        }
        false
    }

    /// Project onto `scope`, keeping the bindings of shared variables.
    pub fn restrict(&self, scope: &Scope) -> Result<Assignment> {
        self.scope.check_compatible(scope)?;
        let mut result = Assignment::new(scope.clone());
        for (var, value) in self.bindings() {
            if scope.contains(var) {
                result.set(var, value)?;
            }
        }
        Ok(result)
    }
}

impl Display for Assignment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (var, value)) in self.scope.vars().zip(self.values.iter()).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match value {
                Some(x) => write!(f, "{}={}", var, x)?,
                None => write!(f, "{}=?", var)?,
            }
        }
        write!(f, "}}")
    }
}
