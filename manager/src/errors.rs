// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Errors returned by the VTN operations

use store::StoreError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum VtnError {
    /// The target of an operation does not exist
    #[error("{0} does not exist")]
    NotFound(String),
    /// A key is owned by an incompatible owner
    #[error("{0}")]
    Conflict(String),
    /// Malformed or duplicate input, detected before any change
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// The stored data breaks an invariant
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Store failure: {0}")]
    Store(#[from] StoreError),
}

impl VtnError {
    pub(crate) fn invalid(what: impl std::fmt::Display) -> Self {
        VtnError::InvalidArgument(what.to_string())
    }
}

pub type VtnResult<T> = Result<T, VtnError>;
