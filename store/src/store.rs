// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::tree::{DataTree, TreeChange};
use crate::txn::Transaction;
use crate::{DataPath, StoreError, StoreResult};
use left_right::{ReadHandle, ReadHandleFactory, WriteHandle};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

pub(crate) type TreeWriter<V> = WriteHandle<DataTree<V>, TreeChange<V>>;

/// A transactional tree of values of type `V`.
///
/// At most one [`Transaction`] is open at a time: [`DataStore::begin`] blocks until
/// the previous one is committed or dropped.
pub struct DataStore<V: Clone> {
    writer: Mutex<TreeWriter<V>>,
    factory: ReadHandleFactory<DataTree<V>>,
    txn_ids: AtomicU64,
}

impl<V: Clone> Default for DataStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> DataStore<V> {
    #[must_use]
    pub fn new() -> Self {
        let (writer, reader) = left_right::new_from_empty(DataTree::default());
        Self {
            writer: Mutex::new(writer),
            factory: reader.factory(),
            txn_ids: AtomicU64::new(1),
        }
    }

    /// Open a write transaction.
    pub fn begin(&self) -> Transaction<'_, V> {
        let id = self.txn_ids.fetch_add(1, Ordering::Relaxed);
        let writer = self.writer.lock();
        trace!("Opened transaction {id}");
        Transaction::new(id, writer)
    }

    /// Get a reader of the committed contents. Readers may be sent to other threads.
    #[must_use]
    pub fn reader(&self) -> StoreReader<V> {
        StoreReader(self.factory.handle())
    }
}

/// Read access to the last committed state of a [`DataStore`].
pub struct StoreReader<V>(ReadHandle<DataTree<V>>);

impl<V: Clone> StoreReader<V> {
    /// Read the value at `path`
    ///
    /// # Errors
    ///
    /// Fails if the store has been dropped.
    pub fn read(&self, path: &DataPath) -> StoreResult<Option<V>> {
        let tree = self.0.enter().ok_or(StoreError::Unavailable)?;
        Ok(tree.get(path).cloned())
    }

    /// Read every value at `prefix` and below, in path order
    ///
    /// # Errors
    ///
    /// Fails if the store has been dropped.
    pub fn scan(&self, prefix: &DataPath) -> StoreResult<Vec<(DataPath, V)>> {
        let tree = self.0.enter().ok_or(StoreError::Unavailable)?;
        Ok(tree
            .scan(prefix)
            .map(|(p, v)| (p.clone(), v.clone()))
            .collect())
    }

    /// Number of values in the store
    ///
    /// # Errors
    ///
    /// Fails if the store has been dropped.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.0.enter().ok_or(StoreError::Unavailable)?.len())
    }

    /// Tell if the store holds no value
    ///
    /// # Errors
    ///
    /// Fails if the store has been dropped.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}
