//! Per-variable unique table.
//!
//! The store keeps one subtable per variable. Since all nodes in a subtable
//! branch on the same variable, the key is just the ordered list of AND-node
//! children, and the cardinality is checked once per variable.

use std::collections::HashMap;

use crate::node::AndNode;
use crate::reference::Ref;
use crate::types::Var;

/// Unique table for the MetaNodes of a single variable.
#[derive(Debug, Clone)]
pub struct Subtable {
    /// The variable for all nodes in this subtable.
    pub variable: Var,

    /// Cardinality shared by every node of the variable.
    pub cardinality: usize,

    /// Map from the children list to the canonical node.
    nodes: HashMap<Vec<AndNode>, Ref>,
}

impl Subtable {
    pub fn new(variable: Var, cardinality: usize) -> Self {
        Self {
            variable,
            cardinality,
            nodes: HashMap::new(),
        }
    }

    /// Look up a node by its children.
    pub fn find(&self, children: &[AndNode]) -> Option<Ref> {
        self.nodes.get(children).copied()
    }

    pub fn insert(&mut self, children: Vec<AndNode>, node: Ref) {
        assert_eq!(
            children.len(),
            self.cardinality,
            "Node for {} must have {} children",
            self.variable,
            self.cardinality
        );
        self.nodes.insert(children, node);
    }

    /// Remove a node from the subtable.
    ///
    /// Returns the handle if the node was present.
    pub fn remove(&mut self, children: &[AndNode]) -> Option<Ref> {
        self.nodes.remove(children)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over all node handles in this subtable.
    pub fn refs(&self) -> impl Iterator<Item = Ref> + '_ {
        self.nodes.values().copied()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_subtable_basic() {
        let mut st = Subtable::new(Var::new(1), 2);
        let children = vec![AndNode::one(), AndNode::constant(2.0)];
        let node = Ref::new(2, 0);

        assert!(st.find(&children).is_none());

        st.insert(children.clone(), node);
        assert_eq!(st.find(&children), Some(node));
        assert_eq!(st.len(), 1);

        st.remove(&children);
        assert!(st.find(&children).is_none());
        assert!(st.is_empty());
    }

    #[test]
    fn test_subtable_distinguishes_weights() {
        let mut st = Subtable::new(Var::new(0), 2);
        st.insert(vec![AndNode::one(), AndNode::constant(2.0)], Ref::new(2, 0));
        st.insert(vec![AndNode::constant(2.0), AndNode::one()], Ref::new(3, 0));
        assert_eq!(st.len(), 2);
        assert_eq!(
            st.find(&[AndNode::constant(2.0), AndNode::one()]),
            Some(Ref::new(3, 0))
        );
        assert_eq!(st.refs().count(), 2);
    }

    #[test]
    #[should_panic(expected = "must have 3 children")]
    fn test_cardinality_mismatch_panics() {
        let mut st = Subtable::new(Var::new(0), 3);
        st.insert(vec![AndNode::one(), AndNode::one()], Ref::new(2, 0));
    }
}
