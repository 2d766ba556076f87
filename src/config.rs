//! Store configuration.

/// Configuration options for a [`Store`][crate::store::Store].
///
/// Use `StoreConfig::default()` for standard settings.
///
/// # Examples
///
/// ```
/// use aomdd_rs::config::StoreConfig;
/// use aomdd_rs::store::Store;
///
/// let config = StoreConfig {
///     cache_bits: 16,
///     ..StoreConfig::default()
/// };
/// let store = Store::new(config);
/// assert_eq!(store.num_nodes(), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Initial capacity of the operation cache, in bits (default: 14).
    pub cache_bits: usize,
    /// Number of node slots to pre-allocate in the arena (default: 1024).
    pub node_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_bits: 14,
            node_capacity: 1 << 10,
        }
    }
}
