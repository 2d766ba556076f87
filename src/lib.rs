//! # aomdd-rs: AND/OR Multi-Valued Decision Diagrams in Rust
//!
//! **`aomdd-rs`** compiles the functions of a discrete graphical model into
//! AND/OR multi-valued decision diagrams and performs exact (and mini-bucket
//! approximate) inference on them by bucket elimination.
//!
//! ## What is an AOMDD?
//!
//! An AOMDD represents a non-negative function over discrete variables as a
//! DAG of two kinds of nodes:
//!
//! - **MetaNodes** (OR-nodes) branch on a variable, with one child per value;
//! - **AND-nodes** are weighted conjunctions of independent sub-functions.
//!
//! The AND decomposition follows a [pseudo-tree][crate::pseudo_tree::PseudoTree]
//! of the model, so variables in different branches of the tree never have to
//! be enumerated jointly. Like BDDs, diagrams are **canonical** for a fixed
//! tree: structurally equal nodes are shared through hash-consing.
//!
//! ## Key Features
//!
//! - **Store-Centric Architecture**: All nodes live in a [`Store`][crate::store::Store]
//!   that hash-conses them, memoizes operations and collects garbage in batches.
//! - **Safe Handles**: Nodes are addressed by generation-checked [`Ref`][crate::reference::Ref]s;
//!   a handle to a collected node is detected instead of aliasing a new one.
//! - **Function Algebra**: [`Function`][crate::function::Function] supports multiply,
//!   sum-out, max-out, conditioning, normalization and evaluation at partial assignments.
//! - **Bucket Elimination**: [`BucketElimination`][crate::bucket::BucketElimination]
//!   computes the partition function or the MPE value, exactly or with mini-buckets.
//!
//! ## Basic Usage
//!
//! ```rust
//! use std::rc::Rc;
//!
//! use aomdd_rs::function::Function;
//! use aomdd_rs::graph::Graph;
//! use aomdd_rs::pseudo_tree::PseudoTree;
//! use aomdd_rs::scope::Scope;
//! use aomdd_rs::store::Store;
//! use aomdd_rs::types::Var;
//!
//! let (x, y, z) = (Var::new(0), Var::new(1), Var::new(2));
//! let fxy = Scope::from_vars([(x, 2), (y, 2)])?;
//! let fyz = Scope::from_vars([(y, 2), (z, 2)])?;
//!
//! // 1. Build the pseudo-tree from an elimination order
//! let graph = Graph::from_scopes(3, [&fxy, &fyz]);
//! let tree = Rc::new(PseudoTree::new(&graph, &[z, x, y])?);
//!
//! // 2. Compile the functions into one shared store
//! let store = Rc::new(Store::default());
//! let mut f = Function::from_table(&store, &tree, fxy, &[1.0, 2.0, 3.0, 4.0])?;
//! let g = Function::from_table(&store, &tree, fyz, &[1.0, 0.0, 0.5, 0.5])?;
//!
//! // 3. Multiply and sum everything out
//! f.multiply(&g)?;
//! f.marginalize(&[x, y, z])?;
//! assert_eq!(f.table(), vec![10.0]);
//! # Ok::<(), aomdd_rs::error::Error>(())
//! ```
//!
//! ## Core Components
//!
//! - **[`store`]**: The canonicalizing node store and garbage collector.
//! - **[`apply`]**: Generic recursive combination (product, sum, max).
//! - **[`function`]**: The function algebra.
//! - **[`pseudo_tree`]** and **[`embeddable`]**: Trees guiding the recursion.
//! - **[`bucket`]**: Bucket elimination drivers.

pub mod apply;
pub mod assignment;
pub mod bucket;
pub mod cache;
pub mod config;
pub mod dump;
pub mod eliminate;
pub mod embeddable;
pub mod error;
pub mod evaluate;
pub mod function;
pub mod graph;
pub mod node;
pub mod pseudo_tree;
pub mod reference;
pub mod scope;
pub mod store;
pub mod subtable;
pub mod types;
