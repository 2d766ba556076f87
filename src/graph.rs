//! Primal (moral) graph of a model.
//!
//! Two variables are adjacent iff they appear together in the scope of some
//! function. Eliminating variables along an order adds fill edges between the
//! later neighbors of each eliminated variable; the result is the induced
//! (triangulated) graph the pseudo-tree is built from.

use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::scope::Scope;
use crate::types::Var;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    adjacency: Vec<BTreeSet<usize>>,
}

impl Graph {
    /// Create a graph over `num_vars` isolated variables.
    pub fn new(num_vars: usize) -> Self {
        Self {
            adjacency: vec![BTreeSet::new(); num_vars],
        }
    }

    /// Build the primal graph of a set of function scopes.
    pub fn from_scopes<'a>(num_vars: usize, scopes: impl IntoIterator<Item = &'a Scope>) -> Self {
        let mut graph = Self::new(num_vars);
        for scope in scopes {
            let vars: Vec<Var> = scope.vars().collect();
            graph.add_clique(&vars);
        }
        graph
    }

    pub fn num_vars(&self) -> usize {
        self.adjacency.len()
    }

    pub fn num_edges(&self) -> usize {
        self.adjacency.iter().map(|ns| ns.len()).sum::<usize>() / 2
    }

    fn ensure(&mut self, var: Var) {
        if var.index() >= self.adjacency.len() {
            self.adjacency.resize(var.index() + 1, BTreeSet::new());
        }
    }

    pub fn add_edge(&mut self, a: Var, b: Var) {
        self.ensure(a);
        self.ensure(b);
        if a != b {
            self.adjacency[a.index()].insert(b.index());
            self.adjacency[b.index()].insert(a.index());
        }
    }

    /// Connect every pair of the given variables.
    pub fn add_clique(&mut self, vars: &[Var]) {
        for &v in vars {
            self.ensure(v);
        }
        for (i, &a) in vars.iter().enumerate() {
            for &b in &vars[i + 1..] {
                self.add_edge(a, b);
            }
        }
    }

    pub fn has_edge(&self, a: Var, b: Var) -> bool {
        self.adjacency
            .get(a.index())
            .map_or(false, |ns| ns.contains(&b.index()))
    }

    pub fn neighbors(&self, var: Var) -> impl Iterator<Item = Var> + '_ {
        self.adjacency[var.index()].iter().map(|&u| Var::from(u))
    }

    /// Positions of the variables in `order`, validating that it is a permutation.
    pub(crate) fn positions(&self, order: &[Var]) -> Result<Vec<usize>> {
        let n = self.num_vars();
        if order.len() != n {
            return Err(Error::InvalidOrder(format!(
                "expected {} variables, found {}",
                n,
                order.len()
            )));
        }
        let mut position = vec![usize::MAX; n];
        for (i, &var) in order.iter().enumerate() {
            if var.index() >= n {
                return Err(Error::InvalidOrder(format!("{} is not a model variable", var)));
            }
            if position[var.index()] != usize::MAX {
                return Err(Error::InvalidOrder(format!("{} appears twice", var)));
            }
            position[var.index()] = i;
        }
        Ok(position)
    }

    /// Triangulate along `order` (first element is eliminated first).
    ///
    /// Returns, for every variable, its neighbors in the induced graph that are
    /// eliminated later.
    pub fn induced_parents(&self, order: &[Var]) -> Result<Vec<BTreeSet<usize>>> {
        let position = self.positions(order)?;
        let mut adjacency = self.adjacency.clone();
        let mut later = vec![BTreeSet::new(); self.num_vars()];
        for &var in order {
            let v = var.index();
            let ns: Vec<usize> = adjacency[v]
                .iter()
                .copied()
                .filter(|&u| position[u] > position[v])
                .collect();
            for (i, &a) in ns.iter().enumerate() {
                for &b in &ns[i + 1..] {
                    adjacency[a].insert(b);
                    adjacency[b].insert(a);
                }
            }
            later[v] = ns.into_iter().collect();
        }
        Ok(later)
    }

    /// Induced width of `order`: the largest number of later neighbors.
    pub fn induced_width(&self, order: &[Var]) -> Result<usize> {
        let later = self.induced_parents(order)?;
        Ok(later.iter().map(|ns| ns.len()).max().unwrap_or(0))
    }

    /// Greedy min-fill elimination order.
    ///
    /// Ties are broken by the smaller degree, then by the smaller variable id.
    pub fn min_fill_order(&self) -> Vec<Var> {
        let n = self.num_vars();
        let mut adjacency = self.adjacency.clone();
        let mut alive = vec![true; n];
        let mut order = Vec::with_capacity(n);

        for _ in 0..n {
            let best = (0..n)
                .filter(|&v| alive[v])
                .min_by_key(|&v| (fill_in(&adjacency, v), adjacency[v].len(), v));
            let Some(v) = best else {
                break;
            };
            let ns: Vec<usize> = adjacency[v].iter().copied().collect();
            for (i, &a) in ns.iter().enumerate() {
                for &b in &ns[i + 1..] {
                    adjacency[a].insert(b);
                    adjacency[b].insert(a);
                }
            }
            for &u in &ns {
                adjacency[u].remove(&v);
            }
            adjacency[v].clear();
            alive[v] = false;
            order.push(Var::from(v));
        }

        order
    }
}

/// Number of missing edges among the neighbors of `v`.
fn fill_in(adjacency: &[BTreeSet<usize>], v: usize) -> usize {
    let ns: Vec<usize> = adjacency[v].iter().copied().collect();
    let mut count = 0;
    for (i, &a) in ns.iter().enumerate() {
        for &b in &ns[i + 1..] {
            if !adjacency[a].contains(&b) {
                count += 1;
            }
        }
    }
    count
}
