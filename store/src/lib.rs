// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! An in-memory hierarchical key-value tree with atomic, serialized write transactions.
//!
//! Writers stage their changes in a [`Transaction`] overlay and publish them at once on
//! [`Transaction::commit`]. Dropping a transaction discards its changes. Readers never
//! block writers: they observe the last published tree through [`left_right`].

#![deny(clippy::all, clippy::pedantic)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod path;
mod store;
mod tree;
mod txn;

pub use path::DataPath;
pub use store::{DataStore, StoreReader};
pub use tree::DataTree;
pub use txn::Transaction;

use tracectl::trace_target;
trace_target!("vtn-store", LevelFilter::INFO, &["vtn"]);

/// Errors returned by the store
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store is not readable")]
    Unavailable,
    #[error("Can't store a value at the root path")]
    RootPath,
}

pub type StoreResult<T> = Result<T, StoreError>;
