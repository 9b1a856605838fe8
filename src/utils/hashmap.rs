//! The hash-map used for mapping leaf identifiers to tree nodes.

/// Hashmap using [`hashbrown::HashMap`] with its default hasher.
pub type HashMap<K, V> = hashbrown::hash_map::HashMap<K, V>;
