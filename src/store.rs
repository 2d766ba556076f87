//! Canonicalizing node store.
//!
//! The [`Store`] owns every MetaNode. Nodes live in an arena of slots and are
//! addressed by generation-checked [`Ref`] handles; slots 0 and 1 hold the two
//! terminals. A per-variable unique table guarantees that no two live nodes
//! have the same variable and the same children (hash-consing), so equal
//! handles mean equal sub-functions.
//!
//! # Reference counting
//!
//! The reference count of a node is the number of AND-node edges pointing to
//! it from live nodes, plus the number of external [`retain`][Store::retain]s.
//! A freshly created node starts at zero. Nothing is freed on decrement:
//! [`collect_garbage`][Store::collect_garbage] sweeps all nodes whose count is
//! zero in one batch, cascading to their children, and purges the operation
//! cache. Callers must therefore retain every root they still need before
//! collecting.

use std::cell::RefCell;
use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

use log::debug;

use crate::cache::{CacheStats, OpKey, OperationCache};
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::node::{AndNode, MetaNode};
use crate::pseudo_tree::PseudoTree;
use crate::reference::Ref;
use crate::scope::Scope;
use crate::subtable::Subtable;
use crate::types::Var;

struct Slot {
    node: Option<Rc<MetaNode>>,
    generation: u32,
    ref_count: u32,
}

impl Slot {
    fn terminal() -> Self {
        Self {
            node: None,
            generation: 0,
            ref_count: 0,
        }
    }
}

/// Node and edge counts of a diagram.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct DiagramSize {
    /// Non-terminal MetaNodes.
    pub meta_nodes: usize,
    /// AND-nodes, the root conjunction included.
    pub and_nodes: usize,
    /// Edges from AND-nodes to non-terminal MetaNodes.
    pub edges: usize,
}

pub struct Store {
    config: StoreConfig,
    slots: RefCell<Vec<Slot>>,
    free: RefCell<Vec<u32>>,
    subtables: RefCell<HashMap<Var, Subtable>>,
    cache: RefCell<OperationCache>,
}

impl Store {
    pub fn new(config: StoreConfig) -> Self {
        let mut slots = Vec::with_capacity(config.node_capacity.max(2));
        slots.push(Slot::terminal());
        slots.push(Slot::terminal());
        Self {
            slots: RefCell::new(slots),
            free: RefCell::new(Vec::new()),
            subtables: RefCell::new(HashMap::new()),
            cache: RefCell::new(OperationCache::new(config.cache_bits)),
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

impl Default for Store {
    fn default() -> Self {
        Store::new(StoreConfig::default())
    }
}

impl Debug for Store {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let stats = self.cache_stats();
        f.debug_struct("Store")
            .field("capacity", &self.slots.borrow().len())
            .field("nodes", &self.num_nodes())
            .field("variables", &self.subtables.borrow().len())
            .field("cache_size", &stats.entries)
            .field("cache_hits", &stats.hits())
            .field("cache_misses", &stats.misses())
            .finish()
    }
}

impl Store {
    /// Number of live non-terminal nodes.
    pub fn num_nodes(&self) -> usize {
        self.subtables.borrow().values().map(Subtable::len).sum()
    }

    /// Number of live nodes branching on `var`.
    pub fn num_nodes_of(&self, var: Var) -> usize {
        self.subtables.borrow().get(&var).map_or(0, Subtable::len)
    }

    pub fn cache_hits(&self) -> usize {
        self.cache_stats().hits()
    }

    pub fn cache_misses(&self) -> usize {
        self.cache_stats().misses()
    }

    /// Operation cache statistics, split by operation.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.borrow().stats()
    }

    /// Cardinality of a variable that has nodes in this store.
    pub fn cardinality(&self, var: Var) -> Option<usize> {
        self.subtables.borrow().get(&var).map(|st| st.cardinality)
    }

    /// Whether the handle still refers to a live node.
    pub fn is_live(&self, node: Ref) -> bool {
        if node.is_terminal() {
            return true;
        }
        let slots = self.slots.borrow();
        slots
            .get(node.index())
            .map_or(false, |s| s.node.is_some() && s.generation == node.generation())
    }

    fn check(&self, slots: &[Slot], node: Ref) {
        let live = slots
            .get(node.index())
            .map_or(false, |s| s.node.is_some() && s.generation == node.generation());
        if !live {
            panic!("node {} was garbage collected", node);
        }
    }

    /// Access a non-terminal node.
    pub fn node(&self, node: Ref) -> Rc<MetaNode> {
        assert!(!node.is_terminal(), "Terminal {} has no content", node);
        let slots = self.slots.borrow();
        self.check(&slots, node);
        match &slots[node.index()].node {
            Some(n) => Rc::clone(n),
            None => unreachable!(),
        }
    }

    pub fn var(&self, node: Ref) -> Var {
        self.node(node).var()
    }

    pub fn ref_count(&self, node: Ref) -> u32 {
        if node.is_terminal() {
            return 0;
        }
        let slots = self.slots.borrow();
        self.check(&slots, node);
        slots[node.index()].ref_count
    }

    /// Increment the reference count of a node.
    pub fn retain(&self, node: Ref) {
        if node.is_terminal() {
            return;
        }
        let mut slots = self.slots.borrow_mut();
        self.check(&slots, node);
        slots[node.index()].ref_count += 1;
    }

    /// Decrement the reference count of a node.
    ///
    /// The node stays in the store until the next garbage collection.
    pub fn release(&self, node: Ref) {
        if node.is_terminal() {
            return;
        }
        let mut slots = self.slots.borrow_mut();
        self.check(&slots, node);
        let slot = &mut slots[node.index()];
        assert!(slot.ref_count > 0, "Reference count underflow for {}", node);
        slot.ref_count -= 1;
    }

    /// Retain every MetaNode child of an AND-node.
    pub fn retain_and(&self, and: &AndNode) {
        for &n in and.nodes() {
            self.retain(n);
        }
    }

    pub fn release_and(&self, and: &AndNode) {
        for &n in and.nodes() {
            self.release(n);
        }
    }

    fn alloc(&self, node: MetaNode) -> Ref {
        let node = Rc::new(node);
        let mut slots = self.slots.borrow_mut();
        match self.free.borrow_mut().pop() {
            Some(i) => {
                let slot = &mut slots[i as usize];
                slot.node = Some(node);
                slot.ref_count = 0;
                Ref::new(i, slot.generation)
            }
            None => {
                let i = slots.len();
                assert!(i < u32::MAX as usize, "Node arena is full");
                slots.push(Slot {
                    node: Some(node),
                    generation: 0,
                    ref_count: 0,
                });
                Ref::new(i as u32, 0)
            }
        }
    }

    /// Sorted union of `var` and the supports of the children.
    fn support_of(&self, var: Var, children: &[AndNode]) -> Vec<Var> {
        let mut support = vec![var];
        for child in children {
            for &n in child.nodes() {
                support.extend_from_slice(self.node(n).support());
            }
        }
        support.sort_unstable();
        support.dedup();
        support
    }

    /// Sorted set of variables an AND-node depends on.
    pub fn support(&self, and: &AndNode) -> Vec<Var> {
        let mut support = Vec::new();
        for &n in and.nodes() {
            support.extend_from_slice(self.node(n).support());
        }
        support.sort_unstable();
        support.dedup();
        support
    }

    /// Return the canonical node branching on `var` with the given children.
    ///
    /// The `i`-th child is selected by the value `i`. The node is created if
    /// absent; the reference count of the returned node is left unchanged,
    /// while every child gains one reference from the new node.
    ///
    /// # Panics
    ///
    /// Panics if the number of children differs from the cardinality of
    /// earlier nodes of `var`, or if a child depends on `var` itself.
    pub fn mk_node(&self, var: Var, children: Vec<AndNode>) -> Ref {
        debug!("mk_node(var = {}, children = {})", var, children.len());
        assert!(!children.is_empty(), "Node for {} has no children", var);

        {
            let mut subtables = self.subtables.borrow_mut();
            let subtable = subtables
                .entry(var)
                .or_insert_with(|| Subtable::new(var, children.len()));
            assert_eq!(
                subtable.cardinality,
                children.len(),
                "Node for {} must have {} children",
                var,
                subtable.cardinality
            );
            if let Some(node) = subtable.find(&children) {
                debug!("mk_node: found {}", node);
                return node;
            }
        }

        let support = self.support_of(var, &children);
        assert!(
            children
                .iter()
                .flat_map(|c| c.nodes())
                .all(|&n| !self.node(n).depends_on(var)),
            "Children of a node for {} depend on it",
            var
        );
        for child in &children {
            self.retain_and(child);
        }
        let node = self.alloc(MetaNode::new(var, children.clone(), support));
        if let Some(subtable) = self.subtables.borrow_mut().get_mut(&var) {
            subtable.insert(children, node);
        }
        debug!("mk_node: created {}", node);
        node
    }

    /// Build a node branching on `var`, collapsing it if it is redundant.
    ///
    /// If all children are identical, the shared child is returned instead,
    /// weight included.
    pub fn reduce(&self, var: Var, children: Vec<AndNode>) -> AndNode {
        if children.windows(2).all(|w| w[0] == w[1]) {
            debug!("reduce: {} is redundant", var);
            return children[0].clone();
        }
        AndNode::new(1.0, [self.mk_node(var, children)])
    }

    /// Build a diagram from a flat value table.
    ///
    /// The table is indexed in scope order (first variable most significant).
    /// The diagram branches on the variables in pseudo-tree pre-order and is
    /// fully reduced on construction.
    pub fn mk_table(&self, scope: &Scope, values: &[f64], tree: &PseudoTree) -> Result<AndNode> {
        debug!("mk_table(scope = {}, values = {})", scope, values.len());

        let expected = scope.num_states();
        if values.len() != expected {
            return Err(Error::TableSize {
                expected,
                found: values.len(),
            });
        }
        if let Some(&w) = values.iter().find(|&&w| !(w >= 0.0) || w.is_infinite()) {
            return Err(Error::NegativeWeight(w));
        }
        for var in scope.vars() {
            if !tree.contains(var) {
                return Err(Error::UnknownVariable(var));
            }
            if let Some(expected) = self.cardinality(var) {
                let found = scope.cardinality(var).unwrap_or(0);
                if expected != found {
                    return Err(Error::ScopeMismatch {
                        var,
                        expected,
                        found,
                    });
                }
            }
        }

        // Stride of each variable in the flat table.
        let mut strides = vec![0; scope.len()];
        let mut stride = 1;
        for (pos, (_, card)) in scope.iter().enumerate().rev() {
            strides[pos] = stride;
            stride *= card;
        }

        let mut order: Vec<(Var, usize, usize)> = scope
            .iter()
            .enumerate()
            .map(|(pos, (var, card))| (var, card, strides[pos]))
            .collect();
        order.sort_by_key(|&(var, _, _)| tree.rank(var));

        Ok(self.build_table(&order, values, 0))
    }

    fn build_table(&self, order: &[(Var, usize, usize)], values: &[f64], offset: usize) -> AndNode {
        match order.split_first() {
            None => AndNode::constant(values[offset]),
            Some((&(var, card, stride), rest)) => {
                let children = (0..card)
                    .map(|x| self.build_table(rest, values, offset + x * stride))
                    .collect();
                self.reduce(var, children)
            }
        }
    }

    /// Collapse redundant nodes bottom-up.
    ///
    /// Returns the reduced diagram as an AND-node carrying the weights pulled
    /// out of collapsed nodes.
    pub fn full_reduce(&self, node: Ref) -> AndNode {
        debug!("full_reduce(node = {})", node);
        let mut memo = HashMap::new();
        self.full_reduce_node(node, &mut memo)
    }

    /// Collapse redundant nodes below every child of an AND-node.
    pub fn full_reduce_and(&self, and: &AndNode) -> AndNode {
        let mut memo = HashMap::new();
        self.full_reduce_and_(and, &mut memo)
    }

    fn full_reduce_and_(&self, and: &AndNode, memo: &mut HashMap<Ref, AndNode>) -> AndNode {
        if and.is_terminal() {
            return and.clone();
        }
        let mut weight = and.weight();
        let mut children = Vec::new();
        for &n in and.nodes() {
            let r = self.full_reduce_node(n, memo);
            weight *= r.weight();
            children.extend_from_slice(r.children());
        }
        AndNode::new(weight, children)
    }

    fn full_reduce_node(&self, node: Ref, memo: &mut HashMap<Ref, AndNode>) -> AndNode {
        if node.is_terminal() {
            return AndNode::new(1.0, [node]);
        }
        if let Some(r) = memo.get(&node) {
            return r.clone();
        }
        let meta = self.node(node);
        let children = meta
            .children()
            .iter()
            .map(|c| self.full_reduce_and_(c, memo))
            .collect();
        let result = self.reduce(meta.var(), children);
        memo.insert(node, result.clone());
        result
    }

    /// All non-terminal nodes reachable from `roots`.
    pub fn descendants(&self, roots: impl IntoIterator<Item = Ref>) -> HashSet<Ref> {
        let mut visited = HashSet::new();
        let mut stack: Vec<Ref> = roots.into_iter().filter(|r| !r.is_terminal()).collect();
        while let Some(node) = stack.pop() {
            if visited.insert(node) {
                for child in self.node(node).children() {
                    stack.extend(child.nodes().iter().copied());
                }
            }
        }
        visited
    }

    /// Node and edge counts of the diagram below `root`.
    pub fn size(&self, root: &AndNode) -> DiagramSize {
        let nodes = self.descendants(root.nodes().iter().copied());
        let mut size = DiagramSize {
            meta_nodes: nodes.len(),
            and_nodes: 1,
            edges: root.nodes().len(),
        };
        for &n in &nodes {
            let meta = self.node(n);
            size.and_nodes += meta.card();
            size.edges += meta.children().iter().map(|c| c.nodes().len()).sum::<usize>();
        }
        size
    }

    /// Approximate heap usage of the diagram below `root`, in bytes.
    pub fn mem_usage(&self, root: &AndNode) -> usize {
        let size = self.size(root);
        size.meta_nodes * (std::mem::size_of::<Slot>() + std::mem::size_of::<MetaNode>())
            + size.and_nodes * std::mem::size_of::<AndNode>()
            + size.edges * std::mem::size_of::<Ref>()
    }

    pub(crate) fn cache_get(&self, key: &OpKey) -> Option<AndNode> {
        self.cache.borrow_mut().get(key)
    }

    pub(crate) fn cache_insert(&self, key: OpKey, value: AndNode) {
        self.cache.borrow_mut().insert(key, value);
    }

    /// Drop all memoized operation results.
    pub fn purge_cache(&self) {
        debug!("purge_cache()");
        self.cache.borrow_mut().clear();
    }

    /// Free every node whose reference count is zero.
    ///
    /// Freed nodes release their children, which may free them in turn. The
    /// operation cache is purged first. Returns the number of freed nodes.
    pub fn collect_garbage(&self) -> usize {
        debug!("Collecting garbage...");
        self.purge_cache();

        let mut worklist: Vec<u32> = {
            let slots = self.slots.borrow();
            (2..slots.len())
                .filter(|&i| slots[i].node.is_some() && slots[i].ref_count == 0)
                .map(|i| i as u32)
                .collect()
        };

        let mut freed = 0;
        while let Some(i) = worklist.pop() {
            let node = {
                let mut slots = self.slots.borrow_mut();
                let slot = &mut slots[i as usize];
                match slot.node.take() {
                    Some(node) => {
                        slot.generation = slot.generation.wrapping_add(1);
                        node
                    }
                    None => continue,
                }
            };
            self.free.borrow_mut().push(i);
            if let Some(st) = self.subtables.borrow_mut().get_mut(&node.var()) {
                st.remove(node.children());
            }
            freed += 1;

            let mut slots = self.slots.borrow_mut();
            for child in node.children() {
                for &n in child.nodes() {
                    let slot = &mut slots[n.index()];
                    assert!(slot.ref_count > 0, "Reference count underflow for {}", n);
                    slot.ref_count -= 1;
                    if slot.ref_count == 0 {
                        worklist.push(n.index() as u32);
                    }
                }
            }
        }

        debug!("Freed {} nodes, {} alive", freed, self.num_nodes());
        freed
    }
}
