// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::DataPath;
use left_right::Absorb;
use std::collections::BTreeMap;

/// The published contents of a [`DataStore`](crate::DataStore).
///
/// Values live at arbitrary paths. Intermediate paths need not hold a value.
#[derive(Clone, Debug)]
pub struct DataTree<V>(BTreeMap<DataPath, V>);

impl<V> Default for DataTree<V> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<V> DataTree<V> {
    #[must_use]
    pub fn get(&self, path: &DataPath) -> Option<&V> {
        self.0.get(path)
    }
    /// Iterate over the values at `prefix` and below it, in path order
    pub fn scan<'a>(&'a self, prefix: &'a DataPath) -> impl Iterator<Item = (&'a DataPath, &'a V)> {
        self.0
            .range(prefix..)
            .take_while(move |(path, _)| prefix.is_prefix_of(path))
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    fn put(&mut self, path: DataPath, value: V) {
        self.0.insert(path, value);
    }
    fn delete(&mut self, path: &DataPath) {
        let doomed: Vec<DataPath> = self.scan(path).map(|(p, _)| p.clone()).collect();
        for p in doomed {
            self.0.remove(&p);
        }
    }
}

pub(crate) enum TreeChange<V> {
    Put(DataPath, V),
    /// Remove a path and everything below it
    Delete(DataPath),
}

impl<V: Clone> Absorb<TreeChange<V>> for DataTree<V> {
    fn absorb_first(&mut self, change: &mut TreeChange<V>, _: &Self) {
        match change {
            TreeChange::Put(path, value) => self.put(path.clone(), value.clone()),
            TreeChange::Delete(path) => self.delete(path),
        }
    }
    fn drop_first(self: Box<Self>) {}
    fn sync_with(&mut self, first: &Self) {
        *self = first.clone();
    }
}

#[cfg(test)]
mod test {
    use super::{DataTree, TreeChange};
    use crate::DataPath;
    use left_right::Absorb;

    #[test]
    fn subtree_delete() {
        let mut tree = DataTree::default();
        let other = DataTree::default();
        for p in [["a", "1"], ["a", "2"], ["b", "1"]] {
            tree.absorb_first(&mut TreeChange::Put(DataPath::new(p), 0u8), &other);
        }
        tree.absorb_first(&mut TreeChange::Put(DataPath::new(["a"]), 1), &other);
        assert_eq!(tree.scan(&DataPath::new(["a"])).count(), 3);

        tree.absorb_first(&mut TreeChange::Delete(DataPath::new(["a"])), &other);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get(&DataPath::new(["b", "1"])), Some(&0));
    }
}
