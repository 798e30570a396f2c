// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::store::TreeWriter;
use crate::tree::{DataTree, TreeChange};
use crate::{DataPath, StoreError, StoreResult};
use left_right::ReadGuard;
use parking_lot::MutexGuard;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug)]
enum Staged<V> {
    Put(V),
    /// The subtree is gone
    Delete,
    /// The subtree is gone and a new value was put at its root
    Reset(V),
}

/// A write transaction over a [`DataStore`](crate::DataStore).
///
/// Reads see the committed tree overlaid with the changes staged so far.
/// Nothing is visible to other readers until [`Transaction::commit`]. Dropping
/// an uncommitted transaction aborts it.
pub struct Transaction<'s, V: Clone> {
    id: u64,
    writer: MutexGuard<'s, TreeWriter<V>>,
    staged: BTreeMap<DataPath, Staged<V>>,
}

impl<'s, V: Clone> Transaction<'s, V> {
    pub(crate) fn new(id: u64, writer: MutexGuard<'s, TreeWriter<V>>) -> Self {
        Self {
            id,
            writer,
            staged: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of staged changes
    #[must_use]
    pub fn pending(&self) -> usize {
        self.staged.len()
    }

    fn base(&self) -> StoreResult<ReadGuard<'_, DataTree<V>>> {
        self.writer.enter().ok_or(StoreError::Unavailable)
    }

    // a committed value at `path` is hidden by a staged change at the path or above it
    fn hides_base(&self, path: &DataPath) -> bool {
        self.staged.contains_key(path)
            || path.ancestors().any(|a| {
                matches!(
                    self.staged.get(&a),
                    Some(Staged::Delete | Staged::Reset(_))
                )
            })
    }

    /// Read the value at `path`
    ///
    /// # Errors
    ///
    /// Fails if the committed tree can't be read.
    pub fn read(&self, path: &DataPath) -> StoreResult<Option<V>> {
        match self.staged.get(path) {
            Some(Staged::Put(v) | Staged::Reset(v)) => return Ok(Some(v.clone())),
            Some(Staged::Delete) => return Ok(None),
            None => {}
        }
        if self.hides_base(path) {
            return Ok(None);
        }
        Ok(self.base()?.get(path).cloned())
    }

    /// Read every value at `prefix` and below, in path order
    ///
    /// # Errors
    ///
    /// Fails if the committed tree can't be read.
    pub fn scan(&self, prefix: &DataPath) -> StoreResult<Vec<(DataPath, V)>> {
        let mut found = BTreeMap::new();
        {
            let base = self.base()?;
            for (path, value) in base.scan(prefix) {
                if !self.hides_base(path) {
                    found.insert(path.clone(), value.clone());
                }
            }
        }
        let staged = self
            .staged
            .range(prefix..)
            .take_while(|(path, _)| prefix.is_prefix_of(path));
        for (path, change) in staged {
            if let Staged::Put(v) | Staged::Reset(v) = change {
                found.insert(path.clone(), v.clone());
            }
        }
        Ok(found.into_iter().collect())
    }

    /// Tell if there is any value at `prefix` or below it
    ///
    /// # Errors
    ///
    /// Fails if the committed tree can't be read.
    pub fn exists(&self, prefix: &DataPath) -> StoreResult<bool> {
        Ok(!self.scan(prefix)?.is_empty())
    }

    /// Store `value` at `path`. Missing ancestors are implicit.
    ///
    /// # Errors
    ///
    /// The root path can't hold a value.
    pub fn put(&mut self, path: DataPath, value: V) -> StoreResult<()> {
        if path.is_root() {
            return Err(StoreError::RootPath);
        }
        let change = match self.staged.get(&path) {
            Some(Staged::Delete | Staged::Reset(_)) => Staged::Reset(value),
            Some(Staged::Put(_)) | None => Staged::Put(value),
        };
        self.staged.insert(path, change);
        Ok(())
    }

    /// Remove the value at `path` and everything below it. Removing a missing path is a no-op.
    pub fn delete(&mut self, path: &DataPath) {
        let below: Vec<DataPath> = self
            .staged
            .range(path..)
            .take_while(|(p, _)| path.is_prefix_of(p))
            .map(|(p, _)| p.clone())
            .collect();
        for p in below {
            self.staged.remove(&p);
        }
        self.staged.insert(path.clone(), Staged::Delete);
    }

    /// Publish all staged changes at once.
    ///
    /// # Errors
    ///
    /// Currently infallible, reserved for store implementations that validate on commit.
    pub fn commit(mut self) -> StoreResult<usize> {
        let staged = std::mem::take(&mut self.staged);
        let count = staged.len();
        // path order applies a subtree delete before the puts staged below it
        for (path, change) in staged {
            match change {
                Staged::Put(v) => {
                    self.writer.append(TreeChange::Put(path, v));
                }
                Staged::Delete => {
                    self.writer.append(TreeChange::Delete(path));
                }
                Staged::Reset(v) => {
                    self.writer.append(TreeChange::Delete(path.clone()));
                    self.writer.append(TreeChange::Put(path, v));
                }
            }
        }
        self.writer.publish();
        debug!("Committed transaction {} with {count} changes", self.id);
        Ok(count)
    }
}

impl<V: Clone> Drop for Transaction<'_, V> {
    fn drop(&mut self) {
        if !self.staged.is_empty() {
            debug!(
                "Aborted transaction {}: {} staged changes discarded",
                self.id,
                self.staged.len()
            );
        }
    }
}

#[cfg(test)]
mod test {
    use crate::{DataPath, DataStore, StoreError};
    use pretty_assertions::assert_eq;

    fn p(components: &[&str]) -> DataPath {
        DataPath::new(components.iter().copied())
    }

    #[test]
    fn commit_publishes_changes() {
        let store = DataStore::new();
        let reader = store.reader();
        let mut tx = store.begin();
        tx.put(p(&["a", "1"]), 1).unwrap();
        tx.put(p(&["a", "2"]), 2).unwrap();
        assert_eq!(tx.read(&p(&["a", "1"])), Ok(Some(1)));
        assert_eq!(reader.read(&p(&["a", "1"])), Ok(None));
        assert_eq!(tx.commit(), Ok(2));
        assert_eq!(reader.read(&p(&["a", "1"])), Ok(Some(1)));
        assert_eq!(reader.len(), Ok(2));
    }

    #[test]
    fn drop_aborts() {
        let store = DataStore::new();
        {
            let mut tx = store.begin();
            tx.put(p(&["x"]), 1).unwrap();
        }
        assert_eq!(store.reader().read(&p(&["x"])), Ok(None));
        assert_eq!(store.begin().read(&p(&["x"])), Ok(None));
    }

    #[test]
    fn root_holds_no_value() {
        let store = DataStore::new();
        let mut tx = store.begin();
        assert_eq!(tx.put(DataPath::root(), 1), Err(StoreError::RootPath));
    }

    #[test]
    fn overlay_subtree_delete_then_put() {
        let store = DataStore::new();
        let mut tx = store.begin();
        tx.put(p(&["t", "b"]), 1).unwrap();
        tx.put(p(&["t", "b", "if", "i1"]), 2).unwrap();
        tx.put(p(&["t", "c"]), 3).unwrap();
        tx.commit().unwrap();

        let mut tx = store.begin();
        tx.delete(&p(&["t", "b"]));
        assert_eq!(tx.read(&p(&["t", "b", "if", "i1"])), Ok(None));
        assert_eq!(tx.scan(&p(&["t"])), Ok(vec![(p(&["t", "c"]), 3)]));

        // re-create the bridge: the old interface stays gone
        tx.put(p(&["t", "b"]), 10).unwrap();
        tx.put(p(&["t", "b", "if", "i2"]), 20).unwrap();
        assert_eq!(tx.read(&p(&["t", "b", "if", "i1"])), Ok(None));
        assert_eq!(
            tx.scan(&p(&["t", "b"])),
            Ok(vec![(p(&["t", "b"]), 10), (p(&["t", "b", "if", "i2"]), 20)])
        );
        tx.commit().unwrap();

        let reader = store.reader();
        assert_eq!(
            reader.scan(&p(&["t"])),
            Ok(vec![
                (p(&["t", "b"]), 10),
                (p(&["t", "b", "if", "i2"]), 20),
                (p(&["t", "c"]), 3)
            ])
        );
    }

    #[test]
    fn delete_drops_staged_descendants() {
        let store = DataStore::new();
        let mut tx = store.begin();
        tx.put(p(&["t", "b", "x"]), 1).unwrap();
        tx.delete(&p(&["t"]));
        assert!(!tx.exists(&p(&["t"])).unwrap());
        assert_eq!(tx.pending(), 1);
        tx.commit().unwrap();
        assert_eq!(store.reader().len(), Ok(0));
    }
}
