mod common;

use std::rc::Rc;

use rand::prelude::*;
use test_log::test;

use aomdd_rs::assignment::Assignment;
use aomdd_rs::bucket::Model;
use aomdd_rs::function::Function;
use aomdd_rs::node::AndNode;
use aomdd_rs::pseudo_tree::PseudoTree;
use aomdd_rs::scope::Scope;
use aomdd_rs::store::Store;
use aomdd_rs::types::Var;

use common::*;

struct Compiled {
    model: Model,
    store: Rc<Store>,
    tree: Rc<PseudoTree>,
    functions: Vec<Function>,
}

fn compile(model: Model, order: &[Var]) -> Compiled {
    let tree = Rc::new(PseudoTree::new(&model.graph(), order).unwrap());
    let store = Rc::new(Store::default());
    let functions = model
        .factors()
        .iter()
        .map(|f| Function::from_table(&store, &tree, f.scope.clone(), &f.values).unwrap())
        .collect();
    Compiled {
        model,
        store,
        tree,
        functions,
    }
}

fn random_compiled(seed: u64) -> Compiled {
    let mut rng = seeded(seed);
    let num_vars = rng.random_range(4..7);
    let model = random_model(&mut rng, num_vars, num_vars + 1, 3);
    let order = model.graph().min_fill_order();
    compile(model, &order)
}

/// Product of all factors of the model at an assignment covering their scopes.
fn model_value(model: &Model, a: &Assignment) -> f64 {
    model
        .factors()
        .iter()
        .map(|f| table_value(&f.scope, &f.values, a))
        .product()
}

fn product_of(c: &Compiled) -> Function {
    let mut iter = c.functions.iter();
    let mut result = iter.next().unwrap().clone();
    for f in iter {
        result.multiply(f).unwrap();
    }
    result
}

fn binary(vars: &[u32]) -> Scope {
    Scope::from_vars(vars.iter().map(|&v| (Var::new(v), 2))).unwrap()
}

/// Binary variables `0..n` coupled by a single factor, eliminated last to first.
fn clique(n: u32) -> Compiled {
    let mut model = Model::new(&vec![2; n as usize]).unwrap();
    let vars: Vec<u32> = (0..n).collect();
    model.add_factor(binary(&vars), vec![1.0; 1 << n]).unwrap();
    let order: Vec<Var> = (0..n).rev().map(Var::new).collect();
    compile(model, &order)
}

#[test]
fn test_table_is_canonical_across_scope_orders() {
    let mut model = Model::new(&[2, 3]).unwrap();
    let xy = Scope::from_vars([(Var::new(0), 2), (Var::new(1), 3)]).unwrap();
    model.add_factor(xy.clone(), vec![1.0; 6]).unwrap();
    let c = compile(model, &[Var::new(1), Var::new(0)]);

    let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    let f = c.store.mk_table(&xy, &values, &c.tree).unwrap();
    let nodes = c.store.num_nodes();

    // Same function, scope listed the other way round.
    let yx = Scope::from_vars([(Var::new(1), 3), (Var::new(0), 2)]).unwrap();
    let transposed = [1.0, 4.0, 2.0, 5.0, 3.0, 6.0];
    let g = c.store.mk_table(&yx, &transposed, &c.tree).unwrap();

    assert_eq!(f, g);
    assert_eq!(c.store.num_nodes(), nodes);
}

#[test]
fn test_shared_subfunctions_are_shared_nodes() {
    let c = clique(2);
    // Both rows of the table are the same function of x1.
    let f = c
        .store
        .mk_table(&binary(&[0, 1]), &[1.0, 2.0, 1.0, 2.0], &c.tree)
        .unwrap();
    let g = c.store.mk_table(&binary(&[1]), &[1.0, 2.0], &c.tree).unwrap();
    assert_eq!(f, g);
    assert_eq!(c.store.num_nodes(), 1);
}

#[test]
fn test_redundant_nodes_collapse() {
    let store = Store::default();
    let leaf = store.mk_node(Var::new(1), vec![AndNode::constant(1.0), AndNode::constant(2.0)]);
    let child = AndNode::new(3.0, [leaf]);
    let top = store.mk_node(Var::new(0), vec![child.clone(), child.clone()]);
    assert_eq!(store.full_reduce(top), child);
    assert_eq!(store.reduce(Var::new(0), vec![child.clone(), child.clone()]), child);
}

#[test]
fn test_index_is_a_bijection() {
    let scope = Scope::from_vars([(Var::new(4), 2), (Var::new(1), 3), (Var::new(7), 2)]).unwrap();
    let mut a = Assignment::new(scope.clone());
    assert_eq!(a.index(), None);
    a.reset();
    let mut seen = vec![false; scope.num_states()];
    for expected in 0..scope.num_states() {
        let i = a.index().unwrap();
        assert_eq!(i, expected);
        seen[i] = true;

        let mut b = Assignment::new(scope.clone());
        b.set_index(i).unwrap();
        assert_eq!(b, a);

        let more = a.iterate();
        assert_eq!(more, expected + 1 < scope.num_states());
    }
    assert!(seen.into_iter().all(|s| s));
    assert_eq!(a.index(), Some(0));
}

#[test]
fn test_concrete_table_value() {
    let c = clique(3);
    let table = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8];
    let f = Function::from_table(&c.store, &c.tree, binary(&[0, 1, 2]), &table).unwrap();
    let a = Assignment::from_values(binary(&[0, 1, 2]), &[1, 0, 1]).unwrap();
    assert_eq!(f.value(&a).unwrap(), 0.6);
}

#[test]
fn test_multiply_matches_brute_force() {
    for seed in 0..20 {
        let c = random_compiled(seed);
        let p = product_of(&c);
        let domain = p.domain().clone();
        let expected = brute_force(&domain, &domain, false, |a| model_value(&c.model, a));
        assert_eq!(p.table(), expected, "seed {}", seed);
    }
}

#[test]
fn test_multiply_is_commutative() {
    for seed in 0..10 {
        let c = random_compiled(seed);
        let forward = product_of(&c);
        let mut backward = c.functions.last().unwrap().clone();
        for f in c.functions.iter().rev().skip(1) {
            backward.multiply(f).unwrap();
        }
        let expected = brute_force(backward.domain(), backward.domain(), false, |a| {
            model_value(&c.model, a)
        });
        assert_eq!(backward.table(), expected, "seed {}", seed);
        assert_eq!(forward.sum(&Assignment::default()), backward.sum(&Assignment::default()));
    }
}

#[test]
fn test_marginalize_matches_brute_force() {
    for seed in 0..20 {
        let c = random_compiled(seed);
        let p = product_of(&c);
        let domain = p.domain().clone();
        let mut rng = seeded(seed + 100);
        let vars: Vec<Var> = domain.vars().collect();
        let k = rng.random_range(0..=vars.len());
        let elim: Vec<Var> = pick(&mut rng, vars.len(), k).into_iter().map(|i| vars[i]).collect();

        let mut m = p.clone();
        m.marginalize(&elim).unwrap();
        for &v in &elim {
            assert!(!m.domain().contains(v));
        }
        let expected = brute_force(&domain, m.domain(), false, |a| model_value(&c.model, a));
        let actual = m.table();
        assert_eq!(actual.len(), expected.len());
        for (x, y) in actual.into_iter().zip(expected) {
            assert_close(x, y);
        }
    }
}

#[test]
fn test_maximize_matches_brute_force() {
    for seed in 0..20 {
        let c = random_compiled(seed);
        let p = product_of(&c);
        let domain = p.domain().clone();
        let mut rng = seeded(seed + 200);
        let vars: Vec<Var> = domain.vars().collect();
        let k = rng.random_range(1..=vars.len());
        let elim: Vec<Var> = pick(&mut rng, vars.len(), k).into_iter().map(|i| vars[i]).collect();

        let mut m = p.clone();
        m.maximize(&elim).unwrap();
        let expected = brute_force(&domain, m.domain(), true, |a| model_value(&c.model, a));
        assert_eq!(m.table(), expected, "seed {}", seed);
    }
}

#[test]
fn test_sum_and_maximum_at_partial_assignments() {
    for seed in 0..10 {
        let c = random_compiled(seed);
        let p = product_of(&c);
        let domain = p.domain().clone();
        let mut rng = seeded(seed + 300);

        let mut evidence = Assignment::new(domain.clone());
        for (var, card) in domain.iter() {
            if rng.random_bool(0.5) {
                evidence.set(var, rng.random_range(0..card)).unwrap();
            }
        }
        let consistent = |a: &Assignment| evidence.bindings().all(|(v, x)| a.get(v) == Some(x));
        let empty = Scope::new();

        let sum = brute_force(&domain, &empty, false, |a| {
            if consistent(a) {
                model_value(&c.model, a)
            } else {
                0.0
            }
        });
        let max = brute_force(&domain, &empty, true, |a| {
            if consistent(a) {
                model_value(&c.model, a)
            } else {
                0.0
            }
        });
        assert_eq!(p.sum(&evidence).unwrap(), sum[0], "seed {}", seed);
        assert_eq!(p.maximum(&evidence).unwrap(), max[0], "seed {}", seed);
    }
}

#[test]
fn test_condition_matches_brute_force() {
    for seed in 0..20 {
        let c = random_compiled(seed);
        let p = product_of(&c);
        let domain = p.domain().clone();
        let mut rng = seeded(seed + 400);

        let mut evidence = Assignment::new(domain.clone());
        let vars: Vec<(Var, usize)> = domain.iter().collect();
        let k = rng.random_range(1..=2);
        for i in pick(&mut rng, vars.len(), k) {
            let (var, card) = vars[i];
            evidence.set(var, rng.random_range(0..card)).unwrap();
        }

        let mut conditioned = p.clone();
        conditioned.condition(&evidence).unwrap();
        for (var, _) in evidence.bindings() {
            assert!(!conditioned.domain().contains(var));
        }

        let expected = brute_force(&domain, conditioned.domain(), false, |a| {
            if evidence.bindings().all(|(v, x)| a.get(v) == Some(x)) {
                model_value(&c.model, a)
            } else {
                0.0
            }
        });
        assert_eq!(conditioned.table(), expected, "seed {}", seed);
    }
}

#[test]
fn test_condition_keeps_other_values() {
    let c = clique(3);
    let table = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
    let mut f = Function::from_table(&c.store, &c.tree, binary(&[0, 1, 2]), &table).unwrap();
    let mut a = Assignment::new(binary(&[1]));
    a.set(Var::new(1), 0).unwrap();
    f.condition(&a).unwrap();
    assert_eq!(f.table(), vec![table[0], table[1], table[4], table[5]]);
}

#[test]
fn test_normalize_sums_to_one() {
    for seed in 0..5 {
        let c = random_compiled(seed);
        let mut p = product_of(&c);
        let z = p.normalize();
        if z == 0.0 {
            assert!(p.table().iter().all(|&x| x == 0.0));
            continue;
        }
        assert_close(p.table().iter().sum(), 1.0);
        assert_close(p.sum(&Assignment::default()).unwrap(), 1.0);
    }
}

#[test]
fn test_garbage_collection_frees_everything() {
    let c = random_compiled(7);
    let nodes = c.store.num_nodes();
    assert!(nodes > 0);
    {
        let mut p = product_of(&c);
        p.marginalize(&[Var::new(0)]).unwrap();
        c.store.collect_garbage();
        assert!(c.store.num_nodes() >= p.size().meta_nodes);
    }

    let Compiled { store, functions, .. } = c;
    drop(functions);
    store.collect_garbage();
    assert_eq!(store.num_nodes(), 0);
}
