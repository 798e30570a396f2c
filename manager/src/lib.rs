// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Mapping engine of the virtual tenant networks.
//!
//! Tenants hold virtual bridges and virtual terminals, which hold virtual interfaces.
//! Physical traffic, identified by switch port, VLAN and MAC address, is mapped onto
//! them by port mappings, VLAN mappings and MAC mappings. This crate keeps the
//! mapping records exclusive, learns and ages the hosts seen on the virtual bridges
//! and purges the learned hosts and the flows that a new or removed mapping makes stale.
//!
//! Every operation is a [`TxTask`](task::TxTask) run by the [`VtnManager`] in one store
//! transaction. Flow removals and probe packets produced by a task are only handed out
//! once its transaction has been committed.

#![deny(
    unsafe_code,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod errors;
pub mod flow;
pub mod ident;
mod inventory;
pub mod mactable;
pub mod manager;
pub mod mapping;
pub mod model;
pub mod ops;
pub mod packet;
mod state;
pub mod task;
pub mod txn;

pub use config::{ConfigError, VtnConfig, VtnConfigBuilder}; // re-export
pub use errors::{VtnError, VtnResult}; // re-export
pub use ident::{InterfaceId, MacMapId, VirtualNodeKind, VlanMapId, VnodeId, VnodeName, VtnIdent}; // re-export
pub use manager::VtnManager; // re-export

use tracectl::trace_target;
trace_target!("vtn", LevelFilter::INFO, &["vtn"]);
