//! Embeddable trees: the part of a pseudo-tree relevant to one scope.
//!
//! The embeddable tree of a scope keeps every scope variable plus the
//! connectors, i.e. the non-scope variables where two or more branches holding
//! scope variables meet. Chains of irrelevant variables are contracted, so the
//! result is the minimal tree-shaped minor of the pseudo-tree connecting the
//! scope. Ancestry between kept variables is the same as in the pseudo-tree.
//!
//! If the scope variables fall into several top-level branches, the branches
//! are joined below the dummy root and [`EmbeddableTree::root_var`] is `None`.

use std::collections::HashMap;
use std::collections::HashSet;

use crate::pseudo_tree::PseudoTree;
use crate::types::Var;

#[derive(Debug, Clone, Default)]
struct Embedded {
    parent: Option<Var>,
    children: Vec<Var>,
    connector: bool,
    enter: usize,
    exit: usize,
}

/// Traversal frame: a pseudo-tree variable and the embedded roots found so
/// far in its finished child subtrees (the candidate connectors).
struct Frame {
    var: Var,
    next_child: usize,
    branches: Vec<Var>,
}

#[derive(Debug, Clone)]
pub struct EmbeddableTree<'a> {
    tree: &'a PseudoTree,
    nodes: HashMap<Var, Embedded>,
    roots: Vec<Var>,
}

impl<'a> EmbeddableTree<'a> {
    pub fn new(tree: &'a PseudoTree, scope: impl IntoIterator<Item = Var>) -> Self {
        let scope: HashSet<Var> = scope.into_iter().filter(|&v| tree.contains(v)).collect();
        let mut nodes: HashMap<Var, Embedded> = HashMap::new();
        let mut roots = Vec::new();

        for &root in tree.roots() {
            let mut stack = vec![Frame {
                var: root,
                next_child: 0,
                branches: Vec::new(),
            }];

            while let Some(top) = stack.last_mut() {
                let children = tree.children(top.var);
                if top.next_child < children.len() {
                    let child = children[top.next_child];
                    top.next_child += 1;
                    stack.push(Frame {
                        var: child,
                        next_child: 0,
                        branches: Vec::new(),
                    });
                    continue;
                }

                let Some(frame) = stack.pop() else {
                    break;
                };
                let in_scope = scope.contains(&frame.var);
                let frontier = if in_scope || frame.branches.len() >= 2 {
                    for &b in &frame.branches {
                        nodes.entry(b).or_default().parent = Some(frame.var);
                    }
                    let node = nodes.entry(frame.var).or_default();
                    node.children = frame.branches;
                    node.connector = !in_scope;
                    Some(frame.var)
                } else {
                    // At most one branch: pass it up unchanged.
                    frame.branches.into_iter().next()
                };

                match (stack.last_mut(), frontier) {
                    (Some(parent), Some(f)) => parent.branches.push(f),
                    (None, Some(f)) => roots.push(f),
                    (_, None) => {}
                }
            }
        }

        let mut embedded = Self { tree, nodes, roots };
        embedded.number();
        embedded
    }

    /// Assign entry/exit times used for ancestry queries.
    fn number(&mut self) {
        let mut clock = 0;
        let mut stack: Vec<(Var, usize)> = Vec::new();
        for &root in &self.roots {
            if let Some(node) = self.nodes.get_mut(&root) {
                node.enter = clock;
            }
            clock += 1;
            stack.push((root, 0));
            while let Some(top) = stack.last_mut() {
                let (v, next) = *top;
                let child = self.nodes.get(&v).and_then(|n| n.children.get(next).copied());
                match child {
                    Some(c) => {
                        top.1 += 1;
                        if let Some(node) = self.nodes.get_mut(&c) {
                            node.enter = clock;
                        }
                        clock += 1;
                        stack.push((c, 0));
                    }
                    None => {
                        if let Some(node) = self.nodes.get_mut(&v) {
                            node.exit = clock;
                        }
                        clock += 1;
                        stack.pop();
                    }
                }
            }
        }
    }

    pub fn pseudo_tree(&self) -> &'a PseudoTree {
        self.tree
    }

    /// The single top variable, or `None` when the dummy root joins several branches.
    pub fn root_var(&self) -> Option<Var> {
        match self.roots.as_slice() {
            [root] => Some(*root),
            _ => None,
        }
    }

    /// Top-level embedded variables.
    pub fn roots(&self) -> &[Var] {
        &self.roots
    }

    pub fn has_dummy_root(&self) -> bool {
        self.roots.len() > 1
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, var: Var) -> bool {
        self.nodes.contains_key(&var)
    }

    pub fn parent(&self, var: Var) -> Option<Var> {
        self.nodes.get(&var).and_then(|n| n.parent)
    }

    pub fn children(&self, var: Var) -> &[Var] {
        self.nodes.get(&var).map_or(&[], |n| n.children.as_slice())
    }

    /// Whether the variable was kept only to join branches.
    pub fn is_connector(&self, var: Var) -> bool {
        self.nodes.get(&var).map_or(false, |n| n.connector)
    }

    /// Connector variables, in no particular order.
    pub fn connectors(&self) -> impl Iterator<Item = Var> + '_ {
        self.nodes
            .iter()
            .filter(|(_, n)| n.connector)
            .map(|(&v, _)| v)
    }

    /// Whether `a` and `b` lie on one root-to-leaf path of the embedded tree.
    ///
    /// Variables outside the embedded tree are compared in the full pseudo-tree.
    pub fn same_branch(&self, a: Var, b: Var) -> bool {
        match (self.nodes.get(&a), self.nodes.get(&b)) {
            (Some(x), Some(y)) => {
                (x.enter <= y.enter && y.exit <= x.exit) || (y.enter <= x.enter && x.exit <= y.exit)
            }
            _ => self.tree.same_branch(a, b),
        }
    }
}
