use hashbrown::HashMap;

/// Multi-valued lookup index from a key to record ids.
pub type VecIndex<K, V> = HashMap<K, Vec<V>>;
