//! Operation cache (computed table).
//!
//! Memoizes the results of recursive diagram operations, keyed by the
//! operation and the handles of its operands. Entries are never evicted one
//! by one: the store clears the whole table whenever handles could become
//! stale (garbage collection, explicit purge).

use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use crate::apply::Operator;
use crate::node::AndNode;
use crate::reference::Ref;
use crate::types::Var;

/// Key of a memoized operation.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum OpKey {
    /// Product of a parameter set (sorted handles, weights factored out).
    Product(Vec<Ref>),
    /// Sum or max of two AND-nodes, operands ordered.
    Combine(Operator, AndNode, AndNode),
    /// Elimination of a variable below a node.
    Eliminate(Operator, Ref, Var),
}

impl OpKey {
    fn kind(&self) -> usize {
        match self {
            OpKey::Product(_) => 0,
            OpKey::Combine(..) => 1,
            OpKey::Eliminate(..) => 2,
        }
    }
}

/// Hit and miss counters of one kind of operation.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Counters {
    pub hits: usize,
    pub misses: usize,
}

impl Counters {
    /// Fraction of lookups that were hits (zero if there were none).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Cache statistics, split by operation.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub product: Counters,
    pub combine: Counters,
    pub eliminate: Counters,
}

impl CacheStats {
    pub fn hits(&self) -> usize {
        self.product.hits + self.combine.hits + self.eliminate.hits
    }

    pub fn misses(&self) -> usize {
        self.product.misses + self.combine.misses + self.eliminate.misses
    }
}

impl Display for CacheStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} entries, product {}/{}, combine {}/{}, eliminate {}/{} (hits/misses)",
            self.entries,
            self.product.hits,
            self.product.misses,
            self.combine.hits,
            self.combine.misses,
            self.eliminate.hits,
            self.eliminate.misses
        )
    }
}

#[derive(Debug)]
pub struct OperationCache {
    map: HashMap<OpKey, AndNode>,
    counters: [Counters; 3],
}

impl Default for OperationCache {
    fn default() -> Self {
        Self::new(14)
    }
}

impl OperationCache {
    /// Create a cache with room for `2^bits` entries before the first resize.
    pub fn new(bits: usize) -> Self {
        assert!(bits <= 31, "Bits should be in the range 0..=31");
        Self {
            map: HashMap::with_capacity(1 << bits),
            counters: [Counters::default(); 3],
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.map.len(),
            product: self.counters[0],
            combine: self.counters[1],
            eliminate: self.counters[2],
        }
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Look up a result, counting the hit or miss.
    pub fn get(&mut self, key: &OpKey) -> Option<AndNode> {
        let counters = &mut self.counters[key.kind()];
        match self.map.get(key) {
            Some(r) => {
                counters.hits += 1;
                Some(r.clone())
            }
            None => {
                counters.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: OpKey, result: AndNode) {
        self.map.insert(key, result);
    }
}
