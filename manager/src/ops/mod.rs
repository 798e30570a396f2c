// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The operations on the virtual networks, each run in a transaction context

pub mod inventory;
pub mod macmap;
pub mod mactable;
pub mod portmap;
pub mod vlanmap;
pub mod vnode;

use crate::errors::{VtnError, VtnResult};
use std::collections::BTreeSet;
use std::fmt::Display;

/// Reject a request listing the same item twice
pub(crate) fn check_duplicates<'a, T>(items: impl IntoIterator<Item = &'a T>, what: &str) -> VtnResult<()>
where
    T: Ord + Display + 'a,
{
    let mut seen = BTreeSet::new();
    for item in items {
        if !seen.insert(item) {
            return Err(VtnError::invalid(format!("duplicate {what} {item}")));
        }
    }
    Ok(())
}
