//! Secondary maps: hanging extra data off existing entities.

use crate::iter::Iter;
use crate::keys::Keys;
use crate::EntityRef;
use core::marker::PhantomData;
use core::ops::{Index, IndexMut};

/// Side storage for entities allocated by a [`PrimaryMap`](crate::PrimaryMap).
///
/// Where a primary map owns the entities themselves, a `SecondaryMap`
/// associates extra data with them: per-block analysis state, per-instruction
/// annotations, and so on. Entity indexes are dense, so the storage is a
/// plain vector indexed by [`EntityRef::index`].
///
/// Every key is treated as present from the start: reading an entry that was
/// never written yields the map's default value, and writing to a key beyond
/// the end of the vector grows it on demand. A map therefore never has to be
/// kept in lockstep with the primary map it shadows, and a freshly created
/// one is already a valid (all-default) result for any program.
#[derive(Clone)]
pub struct SecondaryMap<K, V>
where
    K: EntityRef,
    V: Clone,
{
    storage: Vec<V>,
    default: V,
    marker: PhantomData<K>,
}

impl<K, V> SecondaryMap<K, V>
where
    K: EntityRef,
    V: Clone + Default,
{
    /// An empty map; every key reads as `V::default()`.
    pub fn new() -> Self {
        Self::with_default(V::default())
    }
}

impl<K, V> SecondaryMap<K, V>
where
    K: EntityRef,
    V: Clone,
{
    /// An empty map with an explicit default value for unwritten keys.
    pub fn with_default(default: V) -> Self {
        Self {
            storage: Vec::new(),
            default,
            marker: PhantomData,
        }
    }

    /// The materialized entry for `k`, if any write ever reached it.
    ///
    /// Prefer indexing; this is only interesting when "written" must be told
    /// apart from "still the default".
    pub fn get(&self, k: K) -> Option<&V> {
        self.storage.get(k.index())
    }

    /// Number of materialized entries. This says nothing about how many
    /// entities exist; it only reflects the highest key written so far.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Is the backing storage empty?
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Drop every entry, returning all keys to the default value.
    pub fn clear(&mut self) {
        self.storage.clear()
    }

    /// Grow the backing storage to cover `n` entries, filling with the
    /// default value.
    pub fn resize(&mut self, n: usize) {
        if n > self.storage.len() {
            self.storage.resize(n, self.default.clone());
        }
    }

    /// Keys of the materialized entries, in index order.
    pub fn keys(&self) -> Keys<K> {
        Keys::with_len(self.storage.len())
    }

    /// Key-value pairs of the materialized entries, in index order.
    pub fn iter(&self) -> Iter<K, V> {
        Iter::new(self.storage.iter())
    }
}

impl<K, V> Default for SecondaryMap<K, V>
where
    K: EntityRef,
    V: Clone + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Read access never fails: unwritten keys borrow the shared default.
impl<K, V> Index<K> for SecondaryMap<K, V>
where
    K: EntityRef,
    V: Clone,
{
    type Output = V;

    fn index(&self, k: K) -> &V {
        self.storage.get(k.index()).unwrap_or(&self.default)
    }
}

/// Write access materializes the entry, growing the storage as needed.
impl<K, V> IndexMut<K> for SecondaryMap<K, V>
where
    K: EntityRef,
    V: Clone,
{
    fn index_mut(&mut self, k: K) -> &mut V {
        let i = k.index();
        if i >= self.storage.len() {
            self.resize(i + 1);
        }
        &mut self.storage[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct Ent(u32);

    impl EntityRef for Ent {
        fn new(i: usize) -> Self {
            Ent(i as u32)
        }
        fn index(self) -> usize {
            self.0 as usize
        }
    }

    #[test]
    fn unwritten_keys_read_as_default() {
        let m: SecondaryMap<Ent, u32> = SecondaryMap::new();
        assert!(m.is_empty());
        assert_eq!(m[Ent(7)], 0);
        // Reading never materializes anything.
        assert_eq!(m.get(Ent(7)), None);
        assert_eq!(m.len(), 0);
    }

    #[test]
    fn writes_grow_the_storage() {
        let mut m = SecondaryMap::new();
        m[Ent(2)] = 30;
        assert_eq!(m.len(), 3);
        assert_eq!(m[Ent(0)], 0);
        assert_eq!(m[Ent(2)], 30);
        assert_eq!(m.get(Ent(1)), Some(&0));

        m[Ent(0)] = 10;
        let pairs: Vec<(Ent, u32)> = m.iter().map(|(k, &v)| (k, v)).collect();
        assert_eq!(pairs, vec![(Ent(0), 10), (Ent(1), 0), (Ent(2), 30)]);
        let keys: Vec<Ent> = m.keys().collect();
        assert_eq!(keys, vec![Ent(0), Ent(1), Ent(2)]);
    }

    #[test]
    fn explicit_default_and_clear() {
        let mut m = SecondaryMap::with_default(-1);
        m[Ent(1)] = 17;
        assert_eq!(m[Ent(0)], -1);
        assert_eq!(m[Ent(1)], 17);
        assert_eq!(m[Ent(5)], -1);

        m.clear();
        assert_eq!(m[Ent(1)], -1);
        assert!(m.is_empty());
    }
}
