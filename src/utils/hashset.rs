//! The hash-set used for bookkeeping during tree validation.

/// Hashset using [`hashbrown::HashSet`] with its default hasher.
pub type HashSet<K> = hashbrown::hash_set::HashSet<K>;
