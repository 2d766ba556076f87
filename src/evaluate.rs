//! Queries on partial assignments.
//!
//! Both queries walk the diagram once, memoizing per node. Bound variables
//! select a single branch; unbound ones are summed (or maximized) over. A
//! variable that a reduced path skips contributes its cardinality to the sum,
//! and nothing to the maximum.

use std::collections::HashMap;

use log::debug;

use crate::assignment::Assignment;
use crate::node::AndNode;
use crate::reference::Ref;
use crate::scope::Scope;
use crate::store::Store;
use crate::types::Var;

impl Store {
    /// Sum of the function over every variable of `domain` left unbound by
    /// `assignment`.
    pub fn sum(&self, root: &AndNode, assignment: &Assignment, domain: &Scope) -> f64 {
        debug!("sum(root = {}, assignment = {})", root, assignment);
        let support = self.support(root);
        let skipped: f64 = domain
            .iter()
            .filter(|&(v, _)| assignment.get(v).is_none() && support.binary_search(&v).is_err())
            .map(|(_, card)| card as f64)
            .product();
        let mut memo = HashMap::new();
        skipped * self.sum_and(root, &[], assignment, &mut memo)
    }

    fn sum_and(
        &self,
        and: &AndNode,
        expected: &[Var],
        assignment: &Assignment,
        memo: &mut HashMap<Ref, f64>,
    ) -> f64 {
        if and.is_zero() {
            return 0.0;
        }
        let mut value = and.weight();
        let mut covered = Vec::new();
        for &n in and.nodes() {
            value *= self.sum_node(n, assignment, memo);
            if value == 0.0 {
                return 0.0;
            }
            covered.extend_from_slice(self.node(n).support());
        }
        for &v in expected {
            if assignment.get(v).is_none() && !covered.contains(&v) {
                let card = self
                    .cardinality(v)
                    .unwrap_or_else(|| panic!("No nodes for {} in the store", v));
                value *= card as f64;
            }
        }
        value
    }

    fn sum_node(&self, node: Ref, assignment: &Assignment, memo: &mut HashMap<Ref, f64>) -> f64 {
        if let Some(&v) = memo.get(&node) {
            return v;
        }
        let meta = self.node(node);
        let expected: Vec<Var> = meta
            .support()
            .iter()
            .copied()
            .filter(|&v| v != meta.var())
            .collect();
        let value = match assignment.get(meta.var()) {
            Some(x) => self.sum_and(meta.child(x), &expected, assignment, memo),
            None => meta
                .children()
                .iter()
                .map(|c| self.sum_and(c, &expected, assignment, memo))
                .sum(),
        };
        memo.insert(node, value);
        value
    }

    /// Maximum of the function over every unbound variable.
    pub fn maximum(&self, root: &AndNode, assignment: &Assignment) -> f64 {
        debug!("maximum(root = {}, assignment = {})", root, assignment);
        let mut memo = HashMap::new();
        self.max_and(root, assignment, &mut memo)
    }

    fn max_and(&self, and: &AndNode, assignment: &Assignment, memo: &mut HashMap<Ref, f64>) -> f64 {
        if and.is_zero() {
            return 0.0;
        }
        let mut value = and.weight();
        for &n in and.nodes() {
            value *= self.max_node(n, assignment, memo);
            if value == 0.0 {
                return 0.0;
            }
        }
        value
    }

    fn max_node(&self, node: Ref, assignment: &Assignment, memo: &mut HashMap<Ref, f64>) -> f64 {
        if let Some(&v) = memo.get(&node) {
            return v;
        }
        let meta = self.node(node);
        let value = match assignment.get(meta.var()) {
            Some(x) => self.max_and(meta.child(x), assignment, memo),
            None => meta
                .children()
                .iter()
                .map(|c| self.max_and(c, assignment, memo))
                .fold(0.0, f64::max),
        };
        memo.insert(node, value);
        value
    }
}
