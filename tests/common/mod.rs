#![allow(dead_code)]

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use aomdd_rs::assignment::Assignment;
use aomdd_rs::bucket::Model;
use aomdd_rs::scope::Scope;
use aomdd_rs::types::Var;

pub fn seeded(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// `k` distinct values from `0..n`, in random order.
pub fn pick(rng: &mut ChaCha8Rng, n: usize, k: usize) -> Vec<usize> {
    let mut items: Vec<usize> = (0..n).collect();
    items.shuffle(rng);
    items.truncate(k);
    items
}

/// Random model with small integer weights, so that every sum and product
/// computed on it is exact in `f64`.
pub fn random_model(rng: &mut ChaCha8Rng, num_vars: usize, num_factors: usize, max_arity: usize) -> Model {
    let cards: Vec<usize> = (0..num_vars).map(|_| rng.random_range(2..4)).collect();
    let mut model = Model::new(&cards).unwrap();
    for _ in 0..num_factors {
        let arity = rng.random_range(1..=max_arity.min(num_vars));
        let vars = pick(rng, num_vars, arity);
        let scope = Scope::from_vars(vars.iter().map(|&v| (Var::from(v), cards[v]))).unwrap();
        let values = random_table(rng, scope.num_states());
        model.add_factor(scope, values).unwrap();
    }
    model
}

/// Weights in `{0, 1, 2, 3}`, zero with lower probability.
pub fn random_table(rng: &mut ChaCha8Rng, size: usize) -> Vec<f64> {
    (0..size)
        .map(|_| match rng.random_range(0..8) {
            0 => 0.0,
            1..=3 => 1.0,
            4..=6 => 2.0,
            _ => 3.0,
        })
        .collect()
}

/// Value of the flat table `values` over `scope` at `assignment`.
pub fn table_value(scope: &Scope, values: &[f64], assignment: &Assignment) -> f64 {
    let index = assignment.restrict(scope).unwrap().index().unwrap();
    values[index]
}

/// Eliminate every variable of `domain` missing from `keep` by brute force.
///
/// `f` is evaluated at every joint state of `domain`; the result is indexed in
/// `keep` order.
pub fn brute_force(domain: &Scope, keep: &Scope, max: bool, f: impl Fn(&Assignment) -> f64) -> Vec<f64> {
    let mut result = vec![0.0f64; keep.num_states()];
    let mut assignment = Assignment::new(domain.clone());
    assignment.reset();
    loop {
        let value = f(&assignment);
        let i = assignment.restrict(keep).unwrap().index().unwrap();
        result[i] = if max { result[i].max(value) } else { result[i] + value };
        if !assignment.iterate() {
            break;
        }
    }
    result
}

pub fn assert_close(actual: f64, expected: f64) {
    let tolerance = 1e-9 * expected.abs().max(1.0);
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {}, got {}",
        expected,
        actual
    );
}
