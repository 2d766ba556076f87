//! Bucket elimination over decision diagrams.
//!
//! Every function of the model is placed into the bucket of its domain
//! variable that comes first in the elimination order. Buckets are processed
//! in order: the functions of a bucket are multiplied, the bucket variable is
//! summed (or maximized) out, and the resulting message is placed into the
//! bucket of its own first variable. Messages over the empty domain are
//! folded into a scalar, which is the answer once all buckets are done.
//!
//! With an i-bound the driver runs mini-bucket elimination: the functions of
//! a bucket are greedily partitioned into mini-buckets whose joint domain has
//! at most `i_bound + 1` variables, and each mini-bucket is eliminated on its
//! own. The result is then an upper bound on the exact value.

use std::rc::Rc;

use log::{debug, info};

use crate::assignment::Assignment;
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::function::Function;
use crate::graph::Graph;
use crate::pseudo_tree::PseudoTree;
use crate::scope::Scope;
use crate::store::Store;
use crate::types::Var;

/// Inference task.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Task {
    /// Sum of the product of all factors over all assignments.
    PartitionFunction,
    /// Maximum of the product of all factors (value of the MPE).
    MaxProduct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketConfig {
    /// Mini-bucket size limit; `None` runs exact elimination.
    pub i_bound: Option<usize>,
    /// Collect garbage after every bucket (default: true).
    pub collect_garbage: bool,
    pub store: StoreConfig,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            i_bound: None,
            collect_garbage: true,
            store: StoreConfig::default(),
        }
    }
}

/// A factor given as a flat table in scope order.
#[derive(Debug, Clone, PartialEq)]
pub struct Factor {
    pub scope: Scope,
    pub values: Vec<f64>,
}

/// A discrete graphical model: variables `0..n` and a list of factors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    domain: Scope,
    factors: Vec<Factor>,
}

impl Model {
    /// Create a model over variables `0..cards.len()` with the given cardinalities.
    pub fn new(cards: &[usize]) -> Result<Self> {
        let domain = Scope::from_vars(cards.iter().enumerate().map(|(i, &c)| (Var::from(i), c)))?;
        Ok(Self {
            domain,
            factors: Vec::new(),
        })
    }

    pub fn num_vars(&self) -> usize {
        self.domain.len()
    }

    pub fn domain(&self) -> &Scope {
        &self.domain
    }

    pub fn factors(&self) -> &[Factor] {
        &self.factors
    }

    pub fn add_factor(&mut self, scope: Scope, values: Vec<f64>) -> Result<()> {
        for var in scope.vars() {
            if !self.domain.contains(var) {
                return Err(Error::UnknownVariable(var));
            }
        }
        self.domain.check_compatible(&scope)?;
        if values.len() != scope.num_states() {
            return Err(Error::TableSize {
                expected: scope.num_states(),
                found: values.len(),
            });
        }
        if let Some(&w) = values.iter().find(|&&w| !(w >= 0.0) || w.is_infinite()) {
            return Err(Error::NegativeWeight(w));
        }
        self.factors.push(Factor { scope, values });
        Ok(())
    }

    /// Primal graph of the model.
    pub fn graph(&self) -> Graph {
        Graph::from_scopes(self.num_vars(), self.factors.iter().map(|f| &f.scope))
    }

    /// Product of all factor values at a full assignment.
    ///
    /// Computed from the flat tables, without building any diagram.
    pub fn value(&self, assignment: &Assignment) -> Result<f64> {
        self.domain.check_compatible(assignment.scope())?;
        let mut value = 1.0;
        for factor in &self.factors {
            let mut index = 0;
            for (var, card) in factor.scope.iter() {
                let x = assignment.get(var).ok_or(Error::Unassigned(var))?;
                index = index * card + x;
            }
            value *= factor.values[index];
        }
        Ok(value)
    }
}

/// Outcome of a bucket elimination run.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Partition function or MPE value (an upper bound with mini-buckets).
    pub value: f64,
    /// Induced width of the elimination order.
    pub induced_width: usize,
    /// Largest number of live diagram nodes after any bucket.
    pub peak_nodes: usize,
    /// Number of non-empty buckets processed.
    pub buckets: usize,
    /// Number of mini-buckets eliminated.
    pub mini_buckets: usize,
}

pub struct BucketElimination {
    config: BucketConfig,
}

impl BucketElimination {
    pub fn new(config: BucketConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BucketConfig {
        &self.config
    }

    /// Run the elimination along `order` (first variable eliminated first).
    pub fn solve(&self, model: &Model, order: &[Var], task: Task) -> Result<Solution> {
        let graph = model.graph();
        let tree = Rc::new(PseudoTree::new(&graph, order)?);
        let store = Rc::new(Store::new(self.config.store.clone()));
        info!(
            "Solving {:?} over {} variables and {} factors: induced width {}, pseudo-tree height {}",
            task,
            model.num_vars(),
            model.factors().len(),
            tree.induced_width(),
            tree.height()
        );

        let mut position = vec![0; model.num_vars()];
        for (i, &v) in order.iter().enumerate() {
            position[v.index()] = i;
        }

        let mut buckets: Vec<Vec<Function>> = (0..order.len()).map(|_| Vec::new()).collect();
        let mut scalar = 1.0;
        for factor in model.factors() {
            let f = Function::from_table(&store, &tree, factor.scope.clone(), &factor.values)?;
            place(f, &position, &mut buckets, &mut scalar)?;
        }

        let mut solution = Solution {
            value: 0.0,
            induced_width: tree.induced_width(),
            peak_nodes: store.num_nodes(),
            buckets: 0,
            mini_buckets: 0,
        };

        for (i, &var) in order.iter().enumerate() {
            let functions = std::mem::take(&mut buckets[i]);
            if functions.is_empty() {
                // No remaining function mentions `var`: summing it out scales by its domain size.
                if task == Task::PartitionFunction {
                    let card = model
                        .domain()
                        .cardinality(var)
                        .ok_or(Error::UnknownVariable(var))?;
                    scalar *= card as f64;
                }
                continue;
            }
            let groups = partition(functions, self.config.i_bound)?;
            debug!("bucket {}: {} mini-buckets", var, groups.len());
            solution.buckets += 1;
            solution.mini_buckets += groups.len();

            for group in groups {
                let mut iter = group.into_iter();
                let Some(mut message) = iter.next() else {
                    continue;
                };
                for f in iter {
                    message.multiply(&f)?;
                }
                match task {
                    Task::PartitionFunction => message.marginalize(&[var])?,
                    Task::MaxProduct => message.maximize(&[var])?,
                }
                place(message, &position, &mut buckets, &mut scalar)?;
            }

            let nodes = store.num_nodes();
            solution.peak_nodes = solution.peak_nodes.max(nodes);
            if self.config.collect_garbage {
                let freed = store.collect_garbage();
                info!("bucket {}: {} nodes, {} freed", var, nodes, freed);
            } else {
                info!("bucket {}: {} nodes", var, nodes);
            }
        }

        solution.value = scalar;
        info!("Solution: {}", solution.value);
        Ok(solution)
    }
}

/// Put a function into the bucket of its first variable, or fold a constant
/// into the scalar.
fn place(
    f: Function,
    position: &[usize],
    buckets: &mut [Vec<Function>],
    scalar: &mut f64,
) -> Result<()> {
    match f.domain().vars().map(|v| position[v.index()]).min() {
        Some(i) => buckets[i].push(f),
        None => *scalar *= f.sum(&Assignment::default())?,
    }
    Ok(())
}

/// Greedy mini-bucket partitioning, largest domains first.
fn partition(mut functions: Vec<Function>, i_bound: Option<usize>) -> Result<Vec<Vec<Function>>> {
    let Some(i_bound) = i_bound else {
        return Ok(vec![functions]);
    };
    functions.sort_by_key(|f| std::cmp::Reverse(f.domain().len()));

    let mut groups: Vec<(Scope, Vec<Function>)> = Vec::new();
    for f in functions {
        let mut target = None;
        for (i, (scope, _)) in groups.iter().enumerate() {
            if scope.union(f.domain())?.len() <= i_bound + 1 {
                target = Some(i);
                break;
            }
        }
        match target {
            Some(i) => {
                let (scope, group) = &mut groups[i];
                *scope = scope.union(f.domain())?;
                group.push(f);
            }
            None => groups.push((f.domain().clone(), vec![f])),
        }
    }
    Ok(groups.into_iter().map(|(_, group)| group).collect())
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn binary(vars: &[u32]) -> Scope {
        Scope::from_vars(vars.iter().map(|&v| (Var::new(v), 2))).unwrap()
    }

    /// Chain 0 - 1 - 2 with pairwise factors and a unary factor on 0.
    fn chain_model() -> Model {
        let mut model = Model::new(&[2, 2, 2]).unwrap();
        model.add_factor(binary(&[0]), vec![0.4, 0.6]).unwrap();
        model
            .add_factor(binary(&[0, 1]), vec![0.9, 0.1, 0.2, 0.8])
            .unwrap();
        model
            .add_factor(binary(&[1, 2]), vec![0.7, 0.3, 0.5, 0.5])
            .unwrap();
        model
    }

    fn brute_force(model: &Model, task: Task) -> f64 {
        let mut a = Assignment::new(model.domain().clone());
        a.reset();
        let mut result: f64 = 0.0;
        loop {
            let v = model.value(&a).unwrap();
            result = match task {
                Task::PartitionFunction => result + v,
                Task::MaxProduct => result.max(v),
            };
            if !a.iterate() {
                break;
            }
        }
        result
    }

    #[test]
    fn test_add_factor_errors() {
        let mut model = Model::new(&[2, 3]).unwrap();
        assert_eq!(
            model.add_factor(binary(&[0]), vec![1.0]),
            Err(Error::TableSize { expected: 2, found: 1 })
        );
        assert_eq!(
            model.add_factor(binary(&[5]), vec![1.0, 1.0]),
            Err(Error::UnknownVariable(Var::new(5)))
        );
        assert!(matches!(
            model.add_factor(binary(&[1]), vec![1.0, 1.0]),
            Err(Error::ScopeMismatch { .. })
        ));
        assert_eq!(
            model.add_factor(binary(&[0]), vec![1.0, f64::INFINITY]),
            Err(Error::NegativeWeight(f64::INFINITY))
        );
        assert!(model.factors().is_empty());
    }

    #[test]
    fn test_model_value() {
        let model = chain_model();
        let a = Assignment::from_values(model.domain().clone(), &[1, 1, 0]).unwrap();
        assert_eq!(model.value(&a).unwrap(), 0.6 * 0.8 * 0.5);
        let partial = Assignment::new(model.domain().clone());
        assert!(matches!(model.value(&partial), Err(Error::Unassigned(_))));
    }

    #[test]
    fn test_exact_partition_function() {
        let model = chain_model();
        let solver = BucketElimination::new(BucketConfig::default());
        let order = [2, 1, 0].map(Var::new);
        let solution = solver.solve(&model, &order, Task::PartitionFunction).unwrap();
        let expected = brute_force(&model, Task::PartitionFunction);
        assert!((solution.value - expected).abs() < 1e-12);
        assert_eq!(solution.induced_width, 1);
        assert_eq!(solution.buckets, 3);
        assert!(solution.peak_nodes > 0);
    }

    #[test]
    fn test_variable_without_factors() {
        // x1 appears in no factor, so its bucket stays empty.
        let mut model = Model::new(&[2, 3]).unwrap();
        model.add_factor(binary(&[0]), vec![1.0, 2.0]).unwrap();
        let order = [0, 1].map(Var::new);
        let solver = BucketElimination::new(BucketConfig::default());

        let z = solver.solve(&model, &order, Task::PartitionFunction).unwrap();
        assert_eq!(z.value, 9.0);
        assert_eq!(z.value, brute_force(&model, Task::PartitionFunction));
        assert_eq!(z.buckets, 1);

        let mpe = solver.solve(&model, &order, Task::MaxProduct).unwrap();
        assert_eq!(mpe.value, 2.0);

        // Same model, isolated variable eliminated first.
        let z = solver.solve(&model, &[1, 0].map(Var::new), Task::PartitionFunction).unwrap();
        assert_eq!(z.value, 9.0);
    }

    #[test]
    fn test_exact_max_product() {
        let model = chain_model();
        let solver = BucketElimination::new(BucketConfig {
            collect_garbage: false,
            ..BucketConfig::default()
        });
        let order = [0, 1, 2].map(Var::new);
        let solution = solver.solve(&model, &order, Task::MaxProduct).unwrap();
        let expected = brute_force(&model, Task::MaxProduct);
        assert!((solution.value - expected).abs() < 1e-12);
    }

    #[test]
    fn test_mini_buckets_bound() {
        // Triangle 0 - 1 - 2 plus 2 - 3: eliminating 0 first needs a bucket of width 2.
        let mut model = Model::new(&[2, 2, 2, 2]).unwrap();
        model.add_factor(binary(&[0, 1]), vec![1.0, 2.0, 3.0, 1.0]).unwrap();
        model.add_factor(binary(&[0, 2]), vec![2.0, 1.0, 1.0, 3.0]).unwrap();
        model.add_factor(binary(&[1, 2]), vec![1.0, 1.0, 2.0, 1.0]).unwrap();
        model.add_factor(binary(&[2, 3]), vec![1.0, 4.0, 2.0, 1.0]).unwrap();
        let order = [0, 1, 2, 3].map(Var::new);

        for task in [Task::PartitionFunction, Task::MaxProduct] {
            let exact = brute_force(&model, task);
            let solver = BucketElimination::new(BucketConfig {
                i_bound: Some(1),
                ..BucketConfig::default()
            });
            let bound = solver.solve(&model, &order, task).unwrap();
            assert!(bound.value >= exact - 1e-9);
            assert!(bound.mini_buckets > bound.buckets);

            let solver = BucketElimination::new(BucketConfig {
                i_bound: Some(10),
                ..BucketConfig::default()
            });
            let solution = solver.solve(&model, &order, task).unwrap();
            assert!((solution.value - exact).abs() < 1e-9);
        }
    }

    #[test]
    fn test_invalid_order() {
        let model = chain_model();
        let solver = BucketElimination::new(BucketConfig::default());
        let err = solver
            .solve(&model, &[Var::new(0), Var::new(1)], Task::PartitionFunction)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOrder(_)));
    }
}
