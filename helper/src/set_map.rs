// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use std::{
    collections::{btree_map, BTreeMap, BTreeSet},
    fmt::Display,
};

/// KeyType -> { CellType } data structure
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct SetMap<KeyType, CellType>
where
    KeyType: Ord,
    CellType: Ord,
{
    map: BTreeMap<KeyType, BTreeSet<CellType>>,
}

impl<KeyType, CellType> Default for SetMap<KeyType, CellType>
where
    KeyType: Ord,
    CellType: Ord,
{
    fn default() -> Self {
        SetMap::new()
    }
}

impl<KeyType, CellType> Display for SetMap<KeyType, CellType>
where
    KeyType: Ord + Display,
    CellType: Ord + Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (k, set) in self.map.iter() {
            writeln!(f, "{}", k)?;
            for v in set.iter() {
                writeln!(f, "\t->{}", v)?;
            }
        }
        Ok(())
    }
}

impl<KeyType, CellType> SetMap<KeyType, CellType>
where
    KeyType: Ord,
    CellType: Ord,
{
    pub fn new() -> SetMap<KeyType, CellType> {
        SetMap {
            map: BTreeMap::new(),
        }
    }

    pub fn get<'a>(&'a self, id: &KeyType) -> Option<&'a BTreeSet<CellType>> {
        self.map.get(id)
    }

    /// Inserts [val] into the set of [id].
    /// Returns true if the value was not present before.
    pub fn insert(&mut self, id: KeyType, val: CellType) -> bool {
        self.map.entry(id).or_default().insert(val)
    }

    pub fn extend(&mut self, id: KeyType, set: BTreeSet<CellType>) {
        self.map.entry(id).or_default().extend(set);
    }

    pub fn len_of(&self, id: &KeyType) -> usize {
        self.map.get(id).map_or(0, |s| s.len())
    }

    pub fn contains(&self, id: &KeyType, val: &CellType) -> bool {
        self.map.get(id).is_some_and(|s| s.contains(val))
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn keys(&self) -> btree_map::Keys<'_, KeyType, BTreeSet<CellType>> {
        self.map.keys()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, KeyType, BTreeSet<CellType>> {
        self.map.iter()
    }
}

impl<KeyType, CellType> SetMap<KeyType, CellType>
where
    KeyType: Ord + Clone,
    CellType: Ord + Clone,
{
    /// Unites every set of [other] into this map.
    pub fn merge(&mut self, other: &SetMap<KeyType, CellType>) {
        for (k, set) in other.map.iter() {
            self.map
                .entry(k.clone())
                .or_default()
                .extend(set.iter().cloned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SetMap;

    #[test]
    fn test_insert_merge() {
        let mut a: SetMap<u64, u64> = SetMap::new();
        assert!(a.insert(1, 10));
        assert!(!a.insert(1, 10));
        a.insert(1, 11);
        let mut b: SetMap<u64, u64> = SetMap::new();
        b.insert(1, 12);
        b.insert(2, 20);
        a.merge(&b);
        assert_eq!(a.len_of(&1), 3);
        assert!(a.contains(&2, &20));
        assert_eq!(a.len_of(&3), 0);
    }
}
