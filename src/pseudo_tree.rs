//! Pseudo-tree over the model variables.
//!
//! The tree is derived from an elimination order: every variable hangs below
//! the first of its later neighbors in the induced graph to be eliminated
//! (the bucket tree). All later neighbors of a variable are then ancestors of
//! it, so any two variables sharing a function lie on one root-to-leaf path.
//! The later neighbors form the variable's context; the largest context is the
//! induced width of the order.
//!
//! When the induced graph is disconnected (or empty) the components are joined
//! below a synthetic dummy root, which carries no variable.
//!
//! Variables are ranked by their pre-order position. All diagrams built against
//! a tree are ordered by this rank: a MetaNode's variable precedes every
//! variable below it.

use std::collections::BTreeSet;

use log::debug;

use crate::embeddable::EmbeddableTree;
use crate::error::Result;
use crate::graph::Graph;
use crate::scope::Scope;
use crate::types::Var;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PseudoTree {
    order: Vec<Var>,
    parent: Vec<Option<Var>>,
    children: Vec<Vec<Var>>,
    roots: Vec<Var>,
    context: Vec<Vec<Var>>,
    depth: Vec<usize>,
    /// Entry and exit times of the depth-first traversal (shared clock).
    pre: Vec<usize>,
    post: Vec<usize>,
    /// Pre-order position of each variable.
    rank: Vec<usize>,
    preorder: Vec<Var>,
}

impl PseudoTree {
    /// Build the pseudo-tree of `graph` along the elimination `order`.
    ///
    /// The first variable of `order` is eliminated first and ends up deepest.
    pub fn new(graph: &Graph, order: &[Var]) -> Result<Self> {
        debug!(
            "PseudoTree::new(vars = {}, edges = {})",
            graph.num_vars(),
            graph.num_edges()
        );

        let n = graph.num_vars();
        let position = graph.positions(order)?;
        let later = graph.induced_parents(order)?;

        let mut parent = vec![None; n];
        let mut children = vec![Vec::new(); n];
        let mut roots = Vec::new();
        let mut context = vec![Vec::new(); n];
        for v in 0..n {
            let ns: &BTreeSet<usize> = &later[v];
            context[v] = ns.iter().map(|&u| Var::from(u)).collect();
            match ns.iter().copied().min_by_key(|&u| position[u]) {
                Some(p) => {
                    parent[v] = Some(Var::from(p));
                    children[p].push(Var::from(v));
                }
                None => roots.push(Var::from(v)),
            }
        }

        let mut depth = vec![0; n];
        let mut pre = vec![0; n];
        let mut post = vec![0; n];
        let mut rank = vec![0; n];
        let mut preorder = Vec::with_capacity(n);
        let mut clock = 0;
        let mut stack: Vec<(Var, usize)> = Vec::new();

        for &root in &roots {
            pre[root.index()] = clock;
            clock += 1;
            rank[root.index()] = preorder.len();
            preorder.push(root);
            stack.push((root, 0));

            while let Some(top) = stack.last_mut() {
                let (v, next) = *top;
                if next < children[v.index()].len() {
                    top.1 += 1;
                    let c = children[v.index()][next];
                    depth[c.index()] = depth[v.index()] + 1;
                    pre[c.index()] = clock;
                    clock += 1;
                    rank[c.index()] = preorder.len();
                    preorder.push(c);
                    stack.push((c, 0));
                } else {
                    post[v.index()] = clock;
                    clock += 1;
                    stack.pop();
                }
            }
        }

        let tree = Self {
            order: order.to_vec(),
            parent,
            children,
            roots,
            context,
            depth,
            pre,
            post,
            rank,
            preorder,
        };
        debug!(
            "PseudoTree::new: roots = {}, height = {}, induced width = {}",
            tree.roots.len(),
            tree.height(),
            tree.induced_width()
        );
        Ok(tree)
    }

    pub fn num_vars(&self) -> usize {
        self.parent.len()
    }

    pub fn contains(&self, var: Var) -> bool {
        var.index() < self.num_vars()
    }

    /// Pre-order position of the variable.
    pub fn position(&self, var: Var) -> Option<usize> {
        self.rank.get(var.index()).copied()
    }

    /// Pre-order position of a variable known to be in the tree.
    pub(crate) fn rank(&self, var: Var) -> usize {
        match self.rank.get(var.index()) {
            Some(&r) => r,
            None => panic!("{} is not in the pseudo-tree", var),
        }
    }

    /// Parent of the variable; `None` for the top-level variables.
    pub fn parent(&self, var: Var) -> Option<Var> {
        self.parent[var.index()]
    }

    pub fn children(&self, var: Var) -> &[Var] {
        &self.children[var.index()]
    }

    /// Ancestors the variable shares a function with in the induced graph.
    pub fn context(&self, var: Var) -> &[Var] {
        &self.context[var.index()]
    }

    pub fn depth(&self, var: Var) -> usize {
        self.depth[var.index()]
    }

    /// Top-level variables (children of the dummy root, if any).
    pub fn roots(&self) -> &[Var] {
        &self.roots
    }

    /// Whether the top-level variables are joined by a synthetic root.
    pub fn has_dummy_root(&self) -> bool {
        self.roots.len() != 1
    }

    /// Whether `a` is a proper ancestor of `b`.
    pub fn is_ancestor(&self, a: Var, b: Var) -> bool {
        let (a, b) = (a.index(), b.index());
        self.pre[a] < self.pre[b] && self.post[b] < self.post[a]
    }

    /// Whether one of the variables is an ancestor of (or equal to) the other.
    pub fn same_branch(&self, a: Var, b: Var) -> bool {
        a == b || self.is_ancestor(a, b) || self.is_ancestor(b, a)
    }

    /// Size of the largest context.
    pub fn induced_width(&self) -> usize {
        self.context.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Number of variables on the longest root-to-leaf path.
    pub fn height(&self) -> usize {
        self.depth.iter().map(|d| d + 1).max().unwrap_or(0)
    }

    pub fn elimination_order(&self) -> &[Var] {
        &self.order
    }

    /// Variables in depth-first pre-order.
    pub fn preorder(&self) -> &[Var] {
        &self.preorder
    }

    /// Path from `var` up to its top-level ancestor, `var` included.
    pub fn ancestors(&self, var: Var) -> impl Iterator<Item = Var> + '_ {
        std::iter::successors(Some(var), move |&v| self.parent(v))
    }

    /// Minimal subtree connecting the variables of `scope`.
    pub fn embeddable(&self, scope: &Scope) -> EmbeddableTree<'_> {
        EmbeddableTree::new(self, scope.vars())
    }
}
