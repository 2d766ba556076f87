//! The function algebra.
//!
//! A [`Function`] is a non-negative real function over a [`Scope`] (its
//! domain), represented by a root AND-node in a shared [`Store`] and ordered
//! by a shared [`PseudoTree`]. Functions own a counted reference to the
//! MetaNode children of their root, so their diagrams survive garbage
//! collection for as long as the function (or one of its clones) is alive.
//!
//! Operations mutate the receiver in place:
//!
//! - [`multiply`][Function::multiply] combines two functions along the
//!   embeddable tree of their joint domain;
//! - [`marginalize`][Function::marginalize] and
//!   [`maximize`][Function::maximize] eliminate variables, recursing only into
//!   the root child found at the top of the variable's elimination chain;
//! - [`condition`][Function::condition] fixes variable values.
//!
//! # Examples
//!
//! ```
//! use std::rc::Rc;
//!
//! use aomdd_rs::assignment::Assignment;
//! use aomdd_rs::function::Function;
//! use aomdd_rs::graph::Graph;
//! use aomdd_rs::pseudo_tree::PseudoTree;
//! use aomdd_rs::scope::Scope;
//! use aomdd_rs::store::Store;
//! use aomdd_rs::types::Var;
//!
//! let (a, b) = (Var::new(0), Var::new(1));
//! let scope = Scope::from_vars([(a, 2), (b, 2)])?;
//! let graph = Graph::from_scopes(2, [&scope]);
//! let tree = Rc::new(PseudoTree::new(&graph, &[b, a])?);
//! let store = Rc::new(Store::default());
//!
//! let mut f = Function::from_table(&store, &tree, scope.clone(), &[1.0, 2.0, 3.0, 4.0])?;
//! assert_eq!(f.value(&Assignment::from_values(scope, &[1, 0])?)?, 3.0);
//!
//! f.marginalize(&[b])?;
//! assert_eq!(f.table(), vec![3.0, 7.0]);
//! # Ok::<(), aomdd_rs::error::Error>(())
//! ```

use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt::{Debug, Formatter};
use std::io;
use std::rc::Rc;

use log::debug;

use crate::apply::Operator;
use crate::assignment::Assignment;
use crate::error::{Error, Result};
use crate::node::AndNode;
use crate::pseudo_tree::PseudoTree;
use crate::scope::Scope;
use crate::store::{DiagramSize, Store};
use crate::types::Var;

pub struct Function {
    store: Rc<Store>,
    tree: Rc<PseudoTree>,
    domain: Scope,
    root: AndNode,
}

impl Function {
    fn with_root(store: &Rc<Store>, tree: &Rc<PseudoTree>, domain: Scope, root: AndNode) -> Self {
        store.retain_and(&root);
        Self {
            store: Rc::clone(store),
            tree: Rc::clone(tree),
            domain,
            root,
        }
    }

    /// Build a function from a flat table indexed in `domain` order.
    pub fn from_table(
        store: &Rc<Store>,
        tree: &Rc<PseudoTree>,
        domain: Scope,
        values: &[f64],
    ) -> Result<Self> {
        debug!("Function::from_table(domain = {})", domain);
        for var in domain.vars() {
            if !tree.contains(var) {
                return Err(Error::UnknownVariable(var));
            }
        }
        let root = store.mk_table(&domain, values, tree)?;
        Ok(Self::with_root(store, tree, domain, root))
    }

    /// A constant function over the empty domain.
    pub fn constant(store: &Rc<Store>, tree: &Rc<PseudoTree>, value: f64) -> Result<Self> {
        if !(value >= 0.0) || value.is_infinite() {
            return Err(Error::NegativeWeight(value));
        }
        Ok(Self::with_root(store, tree, Scope::new(), AndNode::constant(value)))
    }

    fn set_root(&mut self, root: AndNode) {
        self.store.retain_and(&root);
        self.store.release_and(&self.root);
        self.root = root;
    }

    pub fn domain(&self) -> &Scope {
        &self.domain
    }

    pub fn root(&self) -> &AndNode {
        &self.root
    }

    /// Global scalar weight of the root conjunction.
    pub fn weight(&self) -> f64 {
        self.root.weight()
    }

    pub fn is_zero(&self) -> bool {
        self.root.is_zero()
    }

    pub fn store(&self) -> &Rc<Store> {
        &self.store
    }

    pub fn tree(&self) -> &Rc<PseudoTree> {
        &self.tree
    }

    fn check_compatible(&self, other: &Function) -> Result<()> {
        if Rc::ptr_eq(&self.store, &other.store) && Rc::ptr_eq(&self.tree, &other.tree) {
            Ok(())
        } else {
            Err(Error::IncompatibleOperands)
        }
    }

    /// Multiply by `other`; the domain becomes the union of both domains.
    pub fn multiply(&mut self, other: &Function) -> Result<()> {
        debug!("multiply(lhs = {}, rhs = {})", self.domain, other.domain);
        self.check_compatible(other)?;
        let domain = self.domain.union(&other.domain)?;

        let root = if self.is_zero() || other.is_zero() {
            debug!("multiply: zero operand");
            AndNode::zero()
        } else if other.root.is_terminal() {
            self.root.scaled(other.weight())
        } else if self.root.is_terminal() {
            other.root.scaled(self.weight())
        } else {
            let tree = self.tree.embeddable(&domain);
            self.store.apply(
                &self.root,
                std::slice::from_ref(&other.root),
                Operator::Product,
                &tree,
                1.0,
            )
        };

        self.set_root(root);
        self.domain = domain;
        Ok(())
    }

    /// Non-mutating [`multiply`][Function::multiply].
    pub fn product(&self, other: &Function) -> Result<Function> {
        let mut result = self.clone();
        result.multiply(other)?;
        Ok(result)
    }

    /// Sum the given variables out. Variables outside the domain are ignored.
    pub fn marginalize(&mut self, vars: &[Var]) -> Result<()> {
        debug!("marginalize(domain = {}, vars = {:?})", self.domain, vars);
        self.eliminate(Operator::Sum, vars)
    }

    /// Maximize the given variables out. Variables outside the domain are ignored.
    pub fn maximize(&mut self, vars: &[Var]) -> Result<()> {
        debug!("maximize(domain = {}, vars = {:?})", self.domain, vars);
        self.eliminate(Operator::Max, vars)
    }

    fn eliminate(&mut self, op: Operator, vars: &[Var]) -> Result<()> {
        let mut elim: Vec<(Var, usize)> = vars
            .iter()
            .filter_map(|&v| self.domain.cardinality(v).map(|card| (v, card)))
            .collect();
        // Deepest variables first.
        elim.sort_by_key(|&(v, _)| std::cmp::Reverse(self.tree.rank(v)));
        elim.dedup();

        let mut root = self.root.clone();
        for &(var, card) in &elim {
            root = self.eliminate_var(op, &root, var, card);
        }
        self.set_root(root);
        for (var, _) in elim {
            self.domain.remove(var);
        }
        Ok(())
    }

    fn eliminate_var(&self, op: Operator, root: &AndNode, var: Var, card: usize) -> AndNode {
        let nodes = root.nodes();
        let top = self.elimination_chain_of(root, var).last().copied();
        let relevant = top
            .and_then(|top| {
                nodes
                    .iter()
                    .position(|&n| self.store.var(n) == top && self.store.node(n).depends_on(var))
            })
            .or_else(|| {
                nodes
                    .iter()
                    .position(|&n| self.store.node(n).depends_on(var))
            });

        let Some(i) = relevant else {
            debug!("eliminate: {} does not occur in the diagram", var);
            return match op {
                Operator::Sum => root.scaled(card as f64),
                Operator::Max | Operator::Product => root.clone(),
            };
        };

        let e = self.store.eliminate_node(op, nodes[i], var, card, &self.tree);
        let others = nodes[..i].iter().chain(&nodes[i + 1..]);
        AndNode::new(
            root.weight() * e.weight(),
            e.children().iter().chain(others).copied(),
        )
    }

    /// Path of domain variables from `var` up to the root variable of the
    /// top-level child that depends on it.
    ///
    /// Empty if no top-level child on the pseudo-tree path depends on `var`.
    pub fn elimination_chain(&self, var: Var) -> Vec<Var> {
        self.elimination_chain_of(&self.root, var)
    }

    fn elimination_chain_of(&self, root: &AndNode, var: Var) -> Vec<Var> {
        if !self.tree.contains(var) {
            return Vec::new();
        }
        let tops: HashMap<Var, bool> = root
            .nodes()
            .iter()
            .map(|&n| {
                let meta = self.store.node(n);
                (meta.var(), meta.depends_on(var))
            })
            .collect();

        let mut chain = Vec::new();
        for v in self.tree.ancestors(var) {
            if !self.domain.contains(v) {
                continue;
            }
            chain.push(v);
            if tops.get(&v).copied().unwrap_or(false) {
                return chain;
            }
        }
        Vec::new()
    }

    /// Fix the values of the variables bound by `assignment`.
    ///
    /// Bound variables are removed from the domain; bindings of variables
    /// outside the domain are ignored.
    pub fn condition(&mut self, assignment: &Assignment) -> Result<()> {
        debug!("condition(domain = {}, assignment = {})", self.domain, assignment);
        self.domain.check_compatible(assignment.scope())?;

        let values: HashMap<Var, usize> = assignment
            .bindings()
            .filter(|&(v, _)| self.domain.contains(v))
            .collect();
        if values.is_empty() {
            return Ok(());
        }

        // Top-level children reached by the chains of the conditioned variables.
        let mut relevant = HashSet::new();
        for &var in values.keys() {
            if let Some(&top) = self.elimination_chain(var).last() {
                relevant.insert(top);
            }
        }

        let mut touched = Vec::new();
        let mut untouched = Vec::new();
        for &n in self.root.nodes() {
            let meta = self.store.node(n);
            if relevant.contains(&meta.var()) || meta.support().iter().any(|v| values.contains_key(v)) {
                touched.push(n);
            } else {
                untouched.push(n);
            }
        }

        let conditioned = self
            .store
            .condition(&AndNode::new(self.root.weight(), touched), &values);
        let root = AndNode::new(
            conditioned.weight(),
            conditioned.children().iter().chain(&untouched).copied(),
        );
        self.set_root(root);
        for var in values.keys() {
            self.domain.remove(*var);
        }
        Ok(())
    }

    /// Sum over the domain variables left unbound by `assignment`.
    pub fn sum(&self, assignment: &Assignment) -> Result<f64> {
        self.domain.check_compatible(assignment.scope())?;
        Ok(self.store.sum(&self.root, assignment, &self.domain))
    }

    /// Maximum over the domain variables left unbound by `assignment`.
    pub fn maximum(&self, assignment: &Assignment) -> Result<f64> {
        self.domain.check_compatible(assignment.scope())?;
        Ok(self.store.maximum(&self.root, assignment))
    }

    /// Value at an assignment binding every domain variable.
    pub fn value(&self, assignment: &Assignment) -> Result<f64> {
        if let Some(var) = self.domain.vars().find(|&v| assignment.get(v).is_none()) {
            return Err(Error::Unassigned(var));
        }
        self.sum(assignment)
    }

    /// Scale the function to sum to one.
    ///
    /// Returns the normalization constant. A function summing to zero is left
    /// unchanged.
    pub fn normalize(&mut self) -> f64 {
        let z = self
            .store
            .sum(&self.root, &Assignment::default(), &self.domain);
        debug!("normalize: Z = {}", z);
        if z != 0.0 {
            let root = self.root.scaled(1.0 / z);
            self.set_root(root);
        }
        z
    }

    pub fn size(&self) -> DiagramSize {
        self.store.size(&self.root)
    }

    /// Approximate memory used by the diagram, in bytes.
    pub fn mem_usage(&self) -> usize {
        self.store.mem_usage(&self.root)
    }

    /// Values of all joint states of the domain, in domain order.
    pub fn table(&self) -> Vec<f64> {
        let mut assignment = Assignment::new(self.domain.clone());
        assignment.reset();
        let mut values = Vec::with_capacity(self.domain.num_states());
        loop {
            values.push(self.store.sum(&self.root, &assignment, &self.domain));
            if !assignment.iterate() {
                break;
            }
        }
        values
    }

    pub fn to_bracket_string(&self) -> String {
        self.store.to_bracket_string(&self.root)
    }

    /// Write a debug dump of the domain and the diagram.
    pub fn save<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        writeln!(writer, "domain {}", self.domain)?;
        self.store.write_diagram(&self.root, writer)
    }
}

impl Clone for Function {
    fn clone(&self) -> Self {
        Self::with_root(&self.store, &self.tree, self.domain.clone(), self.root.clone())
    }
}

impl Drop for Function {
    fn drop(&mut self) {
        self.store.release_and(&self.root);
    }
}

impl Debug for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Function")
            .field("domain", &self.domain)
            .field("root", &self.root)
            .finish()
    }
}
