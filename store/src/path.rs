// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::fmt::Display;

/// Location of a value in a [`DataTree`](crate::DataTree).
///
/// Paths order lexicographically by component, so a path sorts right before
/// all of its descendants and those form a contiguous range.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataPath(Vec<String>);

impl DataPath {
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }
    #[must_use]
    pub fn new<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(components.into_iter().map(Into::into).collect())
    }
    #[must_use]
    pub fn child(&self, component: impl Into<String>) -> Self {
        let mut path = self.clone();
        path.0.push(component.into());
        path
    }
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, head) = self.0.split_last()?;
        Some(Self(head.to_vec()))
    }
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }
    #[must_use]
    pub fn components(&self) -> &[String] {
        &self.0
    }
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
    /// Tell if `other` is this path or lies below it
    #[must_use]
    pub fn is_prefix_of(&self, other: &DataPath) -> bool {
        other.0.starts_with(&self.0)
    }
    /// Proper ancestors of this path, from the root down
    pub fn ancestors(&self) -> impl Iterator<Item = DataPath> + '_ {
        (0..self.0.len()).map(|len| Self(self.0[..len].to_vec()))
    }
}

impl Display for DataPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for component in &self.0 {
            write!(f, "/{component}")?;
        }
        Ok(())
    }
}
