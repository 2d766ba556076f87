//! Store-level elimination and conditioning.
//!
//! Eliminating a variable only touches the part of a diagram that depends on
//! it. At an AND-node at most one MetaNode child can depend on the variable
//! (children have disjoint supports), so the recursion follows a single path
//! until it reaches the nodes branching on the variable, where the branches
//! are combined with the sum or max operator. Wherever the variable is
//! absent from a branch, summing it out multiplies the branch by the
//! cardinality and maximizing leaves it unchanged.

use std::collections::HashMap;

use log::debug;

use crate::apply::Operator;
use crate::cache::OpKey;
use crate::node::AndNode;
use crate::pseudo_tree::PseudoTree;
use crate::reference::Ref;
use crate::store::Store;
use crate::types::Var;

impl Store {
    /// Sum `var` (of cardinality `card`) out of the function rooted at `node`.
    pub fn marginalize(&self, node: Ref, var: Var, card: usize, tree: &PseudoTree) -> AndNode {
        debug!("marginalize(node = {}, var = {})", node, var);
        self.eliminate_and(Operator::Sum, &AndNode::new(1.0, [node]), var, card, tree)
    }

    /// Maximize `var` out of the function rooted at `node`.
    pub fn maximize(&self, node: Ref, var: Var, card: usize, tree: &PseudoTree) -> AndNode {
        debug!("maximize(node = {}, var = {})", node, var);
        self.eliminate_and(Operator::Max, &AndNode::new(1.0, [node]), var, card, tree)
    }

    pub(crate) fn eliminate_and(
        &self,
        op: Operator,
        and: &AndNode,
        var: Var,
        card: usize,
        tree: &PseudoTree,
    ) -> AndNode {
        let nodes = and.nodes();
        let Some(i) = nodes.iter().position(|&n| self.node(n).depends_on(var)) else {
            return match op {
                Operator::Sum => and.scaled(card as f64),
                Operator::Max | Operator::Product => and.clone(),
            };
        };

        let e = self.eliminate_node(op, nodes[i], var, card, tree);
        let others = nodes[..i].iter().chain(&nodes[i + 1..]);
        AndNode::new(
            and.weight() * e.weight(),
            e.children().iter().chain(others).copied(),
        )
    }

    pub(crate) fn eliminate_node(
        &self,
        op: Operator,
        node: Ref,
        var: Var,
        card: usize,
        tree: &PseudoTree,
    ) -> AndNode {
        let key = OpKey::Eliminate(op, node, var);
        if let Some(r) = self.cache_get(&key) {
            debug!("cache: eliminate {} below {} -> {}", var, node, r);
            return r;
        }

        let meta = self.node(node);
        let result = if meta.var() == var {
            meta.children()
                .iter()
                .fold(AndNode::zero(), |acc, c| self.combine(op, &acc, c, tree))
        } else {
            let children = meta
                .children()
                .iter()
                .map(|c| self.eliminate_and(op, c, var, card, tree))
                .collect();
            self.reduce(meta.var(), children)
        };

        self.cache_insert(key, result.clone());
        result
    }

    /// Restrict the function to the given variable values.
    ///
    /// At every node branching on a bound variable only the selected branch is
    /// kept; nodes that do not depend on any bound variable are shared as is.
    pub fn condition(&self, root: &AndNode, values: &HashMap<Var, usize>) -> AndNode {
        debug!("condition(root = {}, values = {:?})", root, values);
        let mut memo = HashMap::new();
        self.condition_and(root, values, &mut memo)
    }

    fn condition_and(
        &self,
        and: &AndNode,
        values: &HashMap<Var, usize>,
        memo: &mut HashMap<Ref, AndNode>,
    ) -> AndNode {
        if and.is_terminal() {
            return and.clone();
        }
        let mut weight = and.weight();
        let mut children = Vec::new();
        for &n in and.nodes() {
            let r = self.condition_node(n, values, memo);
            if r.is_zero() {
                return AndNode::zero();
            }
            weight *= r.weight();
            children.extend_from_slice(r.children());
        }
        AndNode::new(weight, children)
    }

    fn condition_node(
        &self,
        node: Ref,
        values: &HashMap<Var, usize>,
        memo: &mut HashMap<Ref, AndNode>,
    ) -> AndNode {
        if let Some(r) = memo.get(&node) {
            return r.clone();
        }
        let meta = self.node(node);
        let result = if !meta.support().iter().any(|v| values.contains_key(v)) {
            AndNode::new(1.0, [node])
        } else if let Some(&x) = values.get(&meta.var()) {
            assert!(
                x < meta.card(),
                "Value {} is out of range for {}",
                x,
                meta.var()
            );
            self.condition_and(meta.child(x), values, memo)
        } else {
            let children = meta
                .children()
                .iter()
                .map(|c| self.condition_and(c, values, memo))
                .collect();
            self.reduce(meta.var(), children)
        };
        memo.insert(node, result.clone());
        result
    }
}
