// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![forbid(unsafe_code)]
#![deny(missing_docs, clippy::all, clippy::pedantic)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

//! Value types for the physical side of the virtual network: MAC addresses, VLAN ids,
//! switches and switch ports, and the composite keys used by the mapping tables.

pub mod arp;
pub mod keys;
pub mod mac;
pub mod sal;
pub mod vlan;

// re-exports
pub use arp::{ArpProbe, ArpProbeError};
pub use keys::{KeyParseError, MacVlan, NodeVlan, PortVlan};
pub use mac::{HostMacError, Mac, MacFromStringError};
pub use sal::{SalNode, SalParseError, SalPort};
pub use vlan::{InvalidVlanId, VlanId};
