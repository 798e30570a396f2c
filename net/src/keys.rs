// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Composite keys of the mapping tables.
//!
//! Each key has a stable string form (`<what>@<vlan>`) used as the key of the
//! persisted mapping records.

use crate::mac::{Mac, MacFromStringError};
use crate::sal::{SalNode, SalParseError, SalPort};
use crate::vlan::{InvalidVlanId, VlanId};
use std::fmt::Display;
use std::str::FromStr;

const ANY_NODE: &str = "ANY";

/// Errors produced when parsing a mapping key
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum KeyParseError {
    /// No `@<vlan>` suffix
    #[error("missing vlan in key '{0}'")]
    MissingVlan(String),
    /// Bad VLAN id
    #[error(transparent)]
    Vlan(#[from] InvalidVlanId),
    /// Bad switch or port
    #[error(transparent)]
    Sal(#[from] SalParseError),
    /// Bad MAC address
    #[error(transparent)]
    Mac(#[from] MacFromStringError),
}

fn split_vlan(s: &str) -> Result<(&str, VlanId), KeyParseError> {
    let (head, vlan) = s
        .rsplit_once('@')
        .ok_or_else(|| KeyParseError::MissingVlan(s.to_string()))?;
    Ok((head, vlan.parse()?))
}

/// A switch port and a VLAN on it.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct PortVlan {
    /// The switch port
    pub port: SalPort,
    /// The VLAN
    pub vlan: VlanId,
}

impl PortVlan {
    /// Build a [`PortVlan`]
    #[must_use]
    pub const fn new(port: SalPort, vlan: VlanId) -> Self {
        Self { port, vlan }
    }
    /// The (specific) node/VLAN pair that covers this port/VLAN pair
    #[must_use]
    pub const fn node_vlan(&self) -> NodeVlan {
        NodeVlan::new(Some(self.port.node()), self.vlan)
    }
}

impl Display for PortVlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.port, self.vlan)
    }
}

impl FromStr for PortVlan {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (port, vlan) = split_vlan(s)?;
        Ok(PortVlan::new(port.parse()?, vlan))
    }
}

/// A switch (or any switch) and a VLAN.
///
/// A `None` node is the wildcard: the VLAN on every switch.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct NodeVlan {
    /// The switch, `None` for any switch
    pub node: Option<SalNode>,
    /// The VLAN
    pub vlan: VlanId,
}

impl NodeVlan {
    /// Build a [`NodeVlan`]
    #[must_use]
    pub const fn new(node: Option<SalNode>, vlan: VlanId) -> Self {
        Self { node, vlan }
    }
    /// The wildcard pair for `vlan`
    #[must_use]
    pub const fn any(vlan: VlanId) -> Self {
        Self { node: None, vlan }
    }
    /// Returns true iff this pair matches the VLAN on every switch
    #[must_use]
    pub const fn is_wildcard(&self) -> bool {
        self.node.is_none()
    }
    /// Returns true iff this pair covers the given port/VLAN pair
    #[must_use]
    pub fn covers(&self, pv: &PortVlan) -> bool {
        self.vlan == pv.vlan && self.node.is_none_or(|node| node == pv.port.node())
    }
}

impl Display for NodeVlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.node {
            Some(node) => write!(f, "{node}@{}", self.vlan),
            None => write!(f, "{ANY_NODE}@{}", self.vlan),
        }
    }
}

impl FromStr for NodeVlan {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (node, vlan) = split_vlan(s)?;
        if node == ANY_NODE {
            Ok(NodeVlan::any(vlan))
        } else {
            Ok(NodeVlan::new(Some(node.parse()?), vlan))
        }
    }
}

/// A host address on a VLAN.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct MacVlan {
    /// The host MAC address, [`Mac::ZERO`] for any host
    pub mac: Mac,
    /// The VLAN
    pub vlan: VlanId,
}

impl MacVlan {
    /// Build a [`MacVlan`]
    #[must_use]
    pub const fn new(mac: Mac, vlan: VlanId) -> Self {
        Self { mac, vlan }
    }
    /// The pair matching every host on `vlan`
    #[must_use]
    pub const fn any(vlan: VlanId) -> Self {
        Self {
            mac: Mac::ZERO,
            vlan,
        }
    }
    /// Returns true iff this pair matches every host on its VLAN
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.mac.is_zero()
    }
    /// Returns true iff this pair selects `host`
    #[must_use]
    pub fn matches(&self, host: &MacVlan) -> bool {
        self.vlan == host.vlan && (self.is_wildcard() || self.mac == host.mac)
    }
}

impl Display for MacVlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.mac, self.vlan)
    }
}

impl FromStr for MacVlan {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (mac, vlan) = split_vlan(s)?;
        Ok(MacVlan::new(mac.parse()?, vlan))
    }
}
