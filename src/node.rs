//! Diagram node types.
//!
//! An [`AndNode`] is a weighted conjunction of MetaNodes: its value is the
//! weight times the product of the values of its children. A [`MetaNode`]
//! (OR-node) branches on a single variable and owns one AND-node per value of
//! that variable.
//!
//! AND-nodes are small values embedded in their parent MetaNode; only
//! MetaNodes are hash-consed in the store and addressed through [`Ref`]s.

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

use crate::reference::Ref;
use crate::types::Var;

/// Weighted conjunction of MetaNodes.
///
/// Construction through [`AndNode::new`] keeps the node in normal form:
///
/// - a zero weight or a [`Ref::ZERO`] child yields the canonical zero node
///   `0 * [0]`;
/// - [`Ref::ONE`] children are dropped, and an empty conjunction is `[1]`;
/// - the remaining children are sorted by handle.
///
/// Weights take part in hashing and equality by their exact bit pattern.
#[derive(Debug, Clone)]
pub struct AndNode {
    weight: f64,
    children: Vec<Ref>,
}

impl AndNode {
    pub fn new(weight: f64, children: impl IntoIterator<Item = Ref>) -> Self {
        if weight == 0.0 {
            return Self::zero();
        }
        let mut nodes = Vec::new();
        for child in children {
            if child.is_zero() {
                return Self::zero();
            }
            if !child.is_one() {
                nodes.push(child);
            }
        }
        if nodes.is_empty() {
            nodes.push(Ref::ONE);
        } else {
            nodes.sort_unstable();
        }
        Self {
            weight,
            children: nodes,
        }
    }

    /// The zero function.
    pub fn zero() -> Self {
        Self {
            weight: 0.0,
            children: vec![Ref::ZERO],
        }
    }

    /// The constant one.
    pub fn one() -> Self {
        Self::constant(1.0)
    }

    /// A constant function.
    pub fn constant(weight: f64) -> Self {
        Self::new(weight, [Ref::ONE])
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn children(&self) -> &[Ref] {
        &self.children
    }

    /// Non-terminal children.
    pub fn nodes(&self) -> &[Ref] {
        if self.is_terminal() {
            &[]
        } else {
            &self.children
        }
    }

    pub fn is_zero(&self) -> bool {
        self.children[0].is_zero()
    }

    /// Whether the node is a constant (zero or a weighted one).
    pub fn is_terminal(&self) -> bool {
        self.children.len() == 1 && self.children[0].is_terminal()
    }

    /// The same conjunction with the weight multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        self.with_weight(self.weight * factor)
    }

    /// The same conjunction with a different weight.
    pub fn with_weight(&self, weight: f64) -> Self {
        if self.is_zero() || weight == 0.0 {
            return Self::zero();
        }
        Self {
            weight,
            children: self.children.clone(),
        }
    }
}

impl PartialEq for AndNode {
    fn eq(&self, other: &Self) -> bool {
        self.weight.to_bits() == other.weight.to_bits() && self.children == other.children
    }
}

impl Eq for AndNode {}

impl Hash for AndNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.weight.to_bits().hash(state);
        self.children.hash(state);
    }
}

impl Ord for AndNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.weight
            .to_bits()
            .cmp(&other.weight.to_bits())
            .then_with(|| self.children.cmp(&other.children))
    }
}

impl PartialOrd for AndNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for AndNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}*[", self.weight)?;
        for (i, child) in self.children.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", child)?;
        }
        write!(f, "]")
    }
}

/// OR-node over a single variable.
///
/// The `i`-th child is the sub-function selected when the variable takes the
/// value `i`. The support is the sorted set of variables the node depends on,
/// its own variable included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaNode {
    var: Var,
    children: Vec<AndNode>,
    support: Vec<Var>,
}

impl MetaNode {
    pub(crate) fn new(var: Var, children: Vec<AndNode>, support: Vec<Var>) -> Self {
        Self {
            var,
            children,
            support,
        }
    }

    pub fn var(&self) -> Var {
        self.var
    }

    /// Cardinality of the variable.
    pub fn card(&self) -> usize {
        self.children.len()
    }

    pub fn children(&self) -> &[AndNode] {
        &self.children
    }

    pub fn child(&self, value: usize) -> &AndNode {
        &self.children[value]
    }

    pub fn support(&self) -> &[Var] {
        &self.support
    }

    pub fn depends_on(&self, var: Var) -> bool {
        self.support.binary_search(&var).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_and_node_normal_form() {
        let a = Ref::new(5, 0);
        let b = Ref::new(3, 0);

        let n = AndNode::new(2.0, [a, Ref::ONE, b]);
        assert_eq!(n.children(), &[b, a]);
        assert_eq!(n.weight(), 2.0);
        assert!(!n.is_terminal());

        let z = AndNode::new(2.0, [a, Ref::ZERO]);
        assert!(z.is_zero());
        assert_eq!(z, AndNode::zero());
        assert_eq!(AndNode::new(0.0, [a]), AndNode::zero());

        let c = AndNode::new(3.0, []);
        assert!(c.is_terminal());
        assert_eq!(c.children(), &[Ref::ONE]);
        assert!(c.nodes().is_empty());
        assert_eq!(c, AndNode::constant(3.0));
    }

    #[test]
    fn test_and_node_scaling() {
        let a = Ref::new(4, 1);
        let n = AndNode::new(1.5, [a]);
        assert_eq!(n.scaled(2.0).weight(), 3.0);
        assert_eq!(n.scaled(0.0), AndNode::zero());
        assert_eq!(AndNode::zero().with_weight(4.0), AndNode::zero());
    }

    #[test]
    fn test_weights_compared_by_bits() {
        assert_ne!(AndNode::constant(0.1 + 0.2), AndNode::constant(0.3));
        assert_eq!(AndNode::constant(0.5), AndNode::constant(0.5));
    }

    #[test]
    fn test_display() {
        let n = AndNode::new(0.5, [Ref::new(2, 0)]);
        assert_eq!(n.to_string(), "0.5*[@2]");
        assert_eq!(AndNode::zero().to_string(), "0*[0]");
    }

    #[test]
    fn test_meta_node_support() {
        let m = MetaNode::new(
            Var::new(1),
            vec![AndNode::one(), AndNode::constant(2.0)],
            vec![Var::new(1), Var::new(4)],
        );
        assert_eq!(m.card(), 2);
        assert!(m.depends_on(Var::new(4)));
        assert!(!m.depends_on(Var::new(2)));
        assert_eq!(m.child(1).weight(), 2.0);
    }
}
