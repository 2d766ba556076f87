//! Generic recursive combination of diagrams.
//!
//! Two kinds of combination are supported, both driven by the global variable
//! order of the pseudo-tree:
//!
//! - **Product**: the MetaNode children of the operands are split into
//!   parameter sets. Two children end up in the same set when the embeddable
//!   tree puts their variables on one branch, or when their supports overlap.
//!   Singleton sets are conjoined as they are; larger sets are multiplied
//!   recursively by splitting on their earliest variable. A zero result in any
//!   set makes the whole product zero.
//! - **Sum / Max**: children common to both operands are factored out (the
//!   functions are non-negative, so this is exact for both operators); the
//!   rest is combined by splitting on the earliest root variable.
//!
//! Results of recursive calls are memoized in the store's operation cache.

use std::fmt::{Display, Formatter};
use std::rc::Rc;

use log::debug;

use crate::cache::OpKey;
use crate::embeddable::EmbeddableTree;
use crate::node::{AndNode, MetaNode};
use crate::pseudo_tree::PseudoTree;
use crate::reference::Ref;
use crate::store::Store;
use crate::types::Var;

/// Semiring operator used to combine two functions.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Operator {
    Product,
    Sum,
    Max,
}

impl Operator {
    /// Combine two scalars.
    pub fn fold(self, a: f64, b: f64) -> f64 {
        match self {
            Operator::Product => a * b,
            Operator::Sum => a + b,
            Operator::Max => a.max(b),
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Operator::Product => write!(f, "*"),
            Operator::Sum => write!(f, "+"),
            Operator::Max => write!(f, "max"),
        }
    }
}

/// Whether two sorted variable lists share an element.
pub(crate) fn intersects(a: &[Var], b: &[Var]) -> bool {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => return true,
        }
    }
    false
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

impl Store {
    /// Combine `lhs` with every diagram of `rhs` under `op`, then scale by `weight`.
    ///
    /// For the product, a zero operand short-circuits the whole combination.
    pub fn apply(
        &self,
        lhs: &AndNode,
        rhs: &[AndNode],
        op: Operator,
        tree: &EmbeddableTree<'_>,
        weight: f64,
    ) -> AndNode {
        debug!(
            "apply(lhs = {}, rhs = {} operands, op = {}, weight = {})",
            lhs,
            rhs.len(),
            op,
            weight
        );
        let mut result = lhs.clone();
        for other in rhs {
            result = match op {
                Operator::Product => {
                    if result.is_zero() || other.is_zero() {
                        debug!("apply: zero operand");
                        return AndNode::zero();
                    }
                    self.multiply(&result, other, tree)
                }
                Operator::Sum | Operator::Max => {
                    self.combine(op, &result, other, tree.pseudo_tree())
                }
            };
        }
        result.scaled(weight)
    }

    /// Product of two AND-nodes.
    pub fn multiply(&self, a: &AndNode, b: &AndNode, tree: &EmbeddableTree<'_>) -> AndNode {
        debug!("multiply(a = {}, b = {})", a, b);
        let nodes: Vec<Ref> = a.nodes().iter().chain(b.nodes()).copied().collect();
        self.multiply_all(a.weight() * b.weight(), nodes, tree)
    }

    /// Partition MetaNodes into groups that must be multiplied together.
    pub fn param_sets(&self, nodes: &[Ref], tree: &EmbeddableTree<'_>) -> Vec<Vec<Ref>> {
        let metas: Vec<Rc<MetaNode>> = nodes.iter().map(|&n| self.node(n)).collect();
        let mut parent: Vec<usize> = (0..nodes.len()).collect();
        for i in 0..nodes.len() {
            for j in i + 1..nodes.len() {
                if tree.same_branch(metas[i].var(), metas[j].var())
                    || intersects(metas[i].support(), metas[j].support())
                {
                    let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                    if ri != rj {
                        parent[rj] = ri;
                    }
                }
            }
        }

        let mut groups: Vec<(usize, Vec<Ref>)> = Vec::new();
        for (i, &n) in nodes.iter().enumerate() {
            let root = find(&mut parent, i);
            match groups.iter_mut().find(|(r, _)| *r == root) {
                Some((_, group)) => group.push(n),
                None => groups.push((root, vec![n])),
            }
        }
        groups.into_iter().map(|(_, group)| group).collect()
    }

    fn multiply_all(&self, weight: f64, nodes: Vec<Ref>, tree: &EmbeddableTree<'_>) -> AndNode {
        if weight == 0.0 || nodes.iter().any(|n| n.is_zero()) {
            return AndNode::zero();
        }
        let nodes: Vec<Ref> = nodes.into_iter().filter(|n| !n.is_one()).collect();
        if nodes.len() <= 1 {
            return AndNode::new(weight, nodes);
        }

        let mut weight = weight;
        let mut children = Vec::new();
        for group in self.param_sets(&nodes, tree) {
            if group.len() == 1 {
                children.push(group[0]);
                continue;
            }
            let r = self.multiply_group(group, tree);
            if r.is_zero() {
                debug!("multiply: zero parameter set");
                return AndNode::zero();
            }
            weight *= r.weight();
            children.extend_from_slice(r.nodes());
        }
        AndNode::new(weight, children)
    }

    fn multiply_group(&self, mut members: Vec<Ref>, tree: &EmbeddableTree<'_>) -> AndNode {
        members.sort_unstable();
        let key = OpKey::Product(members.clone());
        if let Some(r) = self.cache_get(&key) {
            debug!("cache: product of {} nodes -> {}", members.len(), r);
            return r;
        }

        let pt = tree.pseudo_tree();
        let metas: Vec<Rc<MetaNode>> = members.iter().map(|&n| self.node(n)).collect();
        let Some(top) = metas.iter().min_by_key(|m| pt.rank(m.var())) else {
            return AndNode::one();
        };
        let (var, card) = (top.var(), top.card());

        let children = (0..card)
            .map(|x| {
                let mut weight = 1.0;
                let mut nodes = Vec::new();
                for (meta, &r) in metas.iter().zip(&members) {
                    if meta.var() == var {
                        let c = meta.child(x);
                        if c.is_zero() {
                            return AndNode::zero();
                        }
                        weight *= c.weight();
                        nodes.extend_from_slice(c.nodes());
                    } else {
                        nodes.push(r);
                    }
                }
                self.multiply_all(weight, nodes, tree)
            })
            .collect();

        let result = self.reduce(var, children);
        self.cache_insert(key, result.clone());
        result
    }

    /// Restrict an AND-node to `var = value`.
    ///
    /// Only a child rooted at `var` is affected; its selected branch is merged
    /// into the conjunction.
    pub fn cofactor(&self, and: &AndNode, var: Var, value: usize) -> AndNode {
        if and.is_terminal() {
            return and.clone();
        }
        let mut weight = and.weight();
        let mut children = Vec::with_capacity(and.nodes().len());
        for &n in and.nodes() {
            let meta = self.node(n);
            if meta.var() == var {
                let c = meta.child(value);
                weight *= c.weight();
                children.extend_from_slice(c.children());
            } else {
                children.push(n);
            }
        }
        AndNode::new(weight, children)
    }

    /// Pointwise sum or maximum of two AND-nodes.
    pub fn combine(&self, op: Operator, a: &AndNode, b: &AndNode, tree: &PseudoTree) -> AndNode {
        assert_ne!(op, Operator::Product, "combine is defined for sum and max");
        if a.is_zero() {
            return b.clone();
        }
        if b.is_zero() {
            return a.clone();
        }
        if a.children() == b.children() {
            return AndNode::new(op.fold(a.weight(), b.weight()), a.children().iter().copied());
        }

        let common: Vec<Ref> = a
            .nodes()
            .iter()
            .copied()
            .filter(|n| b.nodes().binary_search(n).is_ok())
            .collect();
        if !common.is_empty() {
            debug!("combine: {} common factors", common.len());
            let rest = |x: &AndNode| {
                AndNode::new(
                    x.weight(),
                    x.nodes().iter().copied().filter(|n| !common.contains(n)),
                )
            };
            let r = self.combine(op, &rest(a), &rest(b), tree);
            return AndNode::new(r.weight(), r.children().iter().chain(&common).copied());
        }

        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        let key = OpKey::Combine(op, a.clone(), b.clone());
        if let Some(r) = self.cache_get(&key) {
            debug!("cache: {} {} {} -> {}", a, op, b, r);
            return r;
        }

        let top = a
            .nodes()
            .iter()
            .chain(b.nodes())
            .map(|&n| self.node(n))
            .min_by_key(|m| tree.rank(m.var()));
        let Some(top) = top else {
            return AndNode::constant(op.fold(a.weight(), b.weight()));
        };
        let (var, card) = (top.var(), top.card());

        let children = (0..card)
            .map(|x| {
                let ca = self.cofactor(a, var, x);
                let cb = self.cofactor(b, var, x);
                self.combine(op, &ca, &cb, tree)
            })
            .collect();
        let result = self.reduce(var, children);
        self.cache_insert(key, result.clone());
        result
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::graph::Graph;
    use crate::scope::Scope;

    /// Tree rooted at 0 with children 1 and 2.
    fn fork() -> PseudoTree {
        let mut g = Graph::new(3);
        g.add_edge(Var::new(0), Var::new(1));
        g.add_edge(Var::new(0), Var::new(2));
        PseudoTree::new(&g, &[Var::new(1), Var::new(2), Var::new(0)]).unwrap()
    }

    fn binary(vars: &[u32]) -> Scope {
        Scope::from_vars(vars.iter().map(|&v| (Var::new(v), 2))).unwrap()
    }

    fn value(store: &Store, f: &AndNode, bits: &[(u32, usize)]) -> f64 {
        let mut f = f.clone();
        for &(v, x) in bits {
            f = store.cofactor(&f, Var::new(v), x);
        }
        assert!(f.is_terminal(), "{} is not constant", f);
        f.weight()
    }

    #[test]
    fn test_intersects() {
        let a = [Var::new(1), Var::new(4), Var::new(7)];
        assert!(intersects(&a, &[Var::new(4)]));
        assert!(!intersects(&a, &[Var::new(2), Var::new(5)]));
        assert!(!intersects(&a, &[]));
    }

    #[test]
    fn test_product_of_independent_branches() {
        let store = Store::default();
        let tree = fork();
        let f = store.mk_table(&binary(&[1]), &[1.0, 2.0], &tree).unwrap();
        let g = store.mk_table(&binary(&[2]), &[3.0, 4.0], &tree).unwrap();

        let emb = tree.embeddable(&binary(&[1, 2]));
        assert_eq!(store.param_sets(&[f.nodes()[0], g.nodes()[0]], &emb).len(), 2);

        let h = store.apply(&f, &[g], Operator::Product, &emb, 1.0);
        assert_eq!(h.nodes().len(), 2);
        assert_eq!(value(&store, &h, &[(1, 1), (2, 0)]), 6.0);
    }

    #[test]
    fn test_product_on_one_branch() {
        let store = Store::default();
        let tree = fork();
        let f = store.mk_table(&binary(&[0, 1]), &[1.0, 2.0, 3.0, 4.0], &tree).unwrap();
        let g = store.mk_table(&binary(&[0]), &[0.5, 2.0], &tree).unwrap();
        let emb = tree.embeddable(&binary(&[0, 1]));
        let h = store.apply(&f, &[g], Operator::Product, &emb, 2.0);
        for (x0, x1, expected) in [(0, 0, 1.0), (0, 1, 2.0), (1, 0, 12.0), (1, 1, 16.0)] {
            assert_eq!(value(&store, &h, &[(0, x0), (1, x1)]), expected);
        }
    }

    #[test]
    fn test_product_with_zero() {
        let store = Store::default();
        let tree = fork();
        let f = store.mk_table(&binary(&[1]), &[1.0, 2.0], &tree).unwrap();
        let emb = tree.embeddable(&binary(&[1]));
        let h = store.apply(&f, &[AndNode::zero()], Operator::Product, &emb, 1.0);
        assert!(h.is_zero());

        // Disjoint zero patterns multiply to zero everywhere.
        let g = store.mk_table(&binary(&[1]), &[0.0, 5.0], &tree).unwrap();
        let k = store.mk_table(&binary(&[1]), &[5.0, 0.0], &tree).unwrap();
        assert!(store.apply(&g, &[k], Operator::Product, &emb, 1.0).is_zero());
    }

    #[test]
    fn test_sum_and_max() {
        let store = Store::default();
        let tree = fork();
        let f = store.mk_table(&binary(&[0, 1]), &[1.0, 2.0, 3.0, 4.0], &tree).unwrap();
        let g = store.mk_table(&binary(&[1]), &[5.0, 0.0], &tree).unwrap();
        let emb = tree.embeddable(&binary(&[0, 1]));

        let s = store.apply(&f, &[g.clone()], Operator::Sum, &emb, 1.0);
        let m = store.apply(&f, &[g], Operator::Max, &emb, 1.0);
        for (x0, x1, sum, max) in [
            (0, 0, 6.0, 5.0),
            (0, 1, 2.0, 2.0),
            (1, 0, 8.0, 5.0),
            (1, 1, 4.0, 4.0),
        ] {
            assert_eq!(value(&store, &s, &[(0, x0), (1, x1)]), sum);
            assert_eq!(value(&store, &m, &[(0, x0), (1, x1)]), max);
        }
    }

    #[test]
    fn test_combine_factors_common_children() {
        let store = Store::default();
        let tree = fork();
        let f = store.mk_table(&binary(&[1]), &[1.0, 2.0], &tree).unwrap();
        let g = store.mk_table(&binary(&[2]), &[3.0, 4.0], &tree).unwrap();
        let a = AndNode::new(2.0, [f.nodes()[0], g.nodes()[0]]);
        let b = AndNode::new(3.0, [f.nodes()[0], g.nodes()[0]]);
        assert_eq!(
            store.combine(Operator::Sum, &a, &b, &tree),
            AndNode::new(5.0, [f.nodes()[0], g.nodes()[0]])
        );

        let c = AndNode::new(1.0, [f.nodes()[0]]);
        let s = store.combine(Operator::Sum, &a, &c, &tree);
        assert!(s.nodes().contains(&f.nodes()[0]));
        assert_eq!(value(&store, &s, &[(1, 1), (2, 1)]), 2.0 * 2.0 * 4.0 + 2.0);
    }

    #[test]
    fn test_cache_reuse() {
        let store = Store::default();
        let tree = fork();
        let f = store.mk_table(&binary(&[0, 1]), &[1.0, 2.0, 3.0, 4.0], &tree).unwrap();
        let g = store.mk_table(&binary(&[0, 1]), &[4.0, 3.0, 2.0, 1.0], &tree).unwrap();
        let emb = tree.embeddable(&binary(&[0, 1]));
        let h1 = store.apply(&f, &[g.clone()], Operator::Product, &emb, 1.0);
        let hits = store.cache_hits();
        let h2 = store.apply(&g, &[f], Operator::Product, &emb, 1.0);
        assert_eq!(h1, h2);
        assert!(store.cache_hits() > hits);
    }
}
