// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Records kept in the store

use net::{Mac, MacVlan, NodeVlan, PortVlan, SalPort, VlanId};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::net::IpAddr;

/// Operational state of virtual nodes and interfaces
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum VnodeState {
    #[default]
    Unknown,
    Down,
    Up,
}

impl Display for VnodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VnodeState::Unknown => write!(f, "UNKNOWN"),
            VnodeState::Down => write!(f, "DOWN"),
            VnodeState::Up => write!(f, "UP"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tenant {
    pub desc: Option<String>,
}

/// A virtual bridge or terminal. The kind is part of its identifier.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VirtualNode {
    pub desc: Option<String>,
    pub state: VnodeState,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VInterface {
    pub enabled: bool,
    pub desc: Option<String>,
    /// The configured port mapping
    pub port_map: Option<PortVlan>,
    /// The port mapping in effect, set once it could be registered
    pub mapped: Option<PortVlan>,
    pub state: VnodeState,
}

impl Default for VInterface {
    fn default() -> Self {
        Self {
            enabled: true,
            desc: None,
            port_map: None,
            mapped: None,
            state: VnodeState::Unknown,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VlanMap {
    pub node_vlan: NodeVlan,
}

/// Access lists of a MAC mapping.
///
/// A host allowed by an exact entry is mapped. A host matched by a wildcard
/// entry ([`Mac::ZERO`]) is mapped unless denied.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MacMapConfig {
    pub allowed: BTreeSet<MacVlan>,
    pub denied: BTreeSet<MacVlan>,
}

impl MacMapConfig {
    #[must_use]
    pub fn admits(&self, host: &MacVlan) -> bool {
        if self.allowed.contains(host) {
            return true;
        }
        self.allowed.contains(&MacVlan::any(host.vlan)) && !self.denied.contains(host)
    }
}

/// Hosts currently mapped by a MAC mapping, and the port each one was seen on
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MacMapStatus {
    pub active: BTreeMap<MacVlan, SalPort>,
}

impl MacMapStatus {
    /// Tell if some active host uses `pv`
    #[must_use]
    pub fn uses(&self, pv: &PortVlan) -> bool {
        self.active
            .iter()
            .any(|(host, port)| host.vlan == pv.vlan && *port == pv.port)
    }
}

/// A host learned in the MAC address table of a virtual bridge
#[derive(Clone, Debug, PartialEq)]
pub struct MacTableEntry {
    pub mac: Mac,
    pub vlan: VlanId,
    pub port: SalPort,
    pub ips: BTreeSet<IpAddr>,
    /// Set when traffic is seen, cleared by the aging sweep
    pub used: bool,
    /// String form of the identifier of the mapping that mapped the host
    pub owner: String,
}

impl MacTableEntry {
    #[must_use]
    pub fn port_vlan(&self) -> PortVlan {
        PortVlan::new(self.port, self.vlan)
    }
    #[must_use]
    pub fn host(&self) -> MacVlan {
        MacVlan::new(self.mac, self.vlan)
    }
}

/// Owner of a port, VLAN or MAC mapping key
#[derive(Clone, Debug, PartialEq)]
pub struct MappingRecord {
    pub owner: String,
}

/// Inventory record of a physical switch port
#[derive(Clone, Debug, PartialEq)]
pub struct SwitchPort {
    pub enabled: bool,
}

/// Any record kept in the store
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Tenant(Tenant),
    Vnode(VirtualNode),
    Interface(VInterface),
    VlanMap(VlanMap),
    MacMap(MacMapConfig),
    MacMapStatus(MacMapStatus),
    MacEntry(MacTableEntry),
    Mapping(MappingRecord),
    SwitchPort(SwitchPort),
}

/// Typed access to the [`Node`] variants
pub trait StoreRecord: Sized + Into<Node> {
    const KIND: &'static str;
    fn from_node(node: Node) -> Option<Self>;
}

macro_rules! store_record {
    ($ty:ident, $variant:ident, $kind:literal) => {
        impl From<$ty> for Node {
            fn from(value: $ty) -> Self {
                Node::$variant(value)
            }
        }
        impl StoreRecord for $ty {
            const KIND: &'static str = $kind;
            fn from_node(node: Node) -> Option<Self> {
                match node {
                    Node::$variant(record) => Some(record),
                    _ => None,
                }
            }
        }
    };
}
store_record!(Tenant, Tenant, "tenant");
store_record!(VirtualNode, Vnode, "virtual node");
store_record!(VInterface, Interface, "virtual interface");
store_record!(VlanMap, VlanMap, "VLAN mapping");
store_record!(MacMapConfig, MacMap, "MAC mapping");
store_record!(MacMapStatus, MacMapStatus, "MAC mapping status");
store_record!(MacTableEntry, MacEntry, "MAC table entry");
store_record!(MappingRecord, Mapping, "mapping record");
store_record!(SwitchPort, SwitchPort, "switch port");

#[cfg(test)]
mod test {
    use super::{MacMapConfig, MacMapStatus};
    use net::{Mac, MacVlan, PortVlan, SalNode, VlanId};

    fn host(last: u8, vlan: u16) -> MacVlan {
        MacVlan::new(Mac([0, 0, 0, 0, 0, last]), VlanId::new(vlan).unwrap())
    }

    #[test]
    fn acl_admission() {
        let mut config = MacMapConfig::default();
        config.allowed.insert(host(1, 5));
        assert!(config.admits(&host(1, 5)));
        assert!(!config.admits(&host(2, 5)));

        config.allowed.insert(MacVlan::any(VlanId::new(5).unwrap()));
        config.denied.insert(host(3, 5));
        assert!(config.admits(&host(2, 5)));
        assert!(!config.admits(&host(3, 5)));
        assert!(!config.admits(&host(2, 6)));
    }

    #[test]
    fn status_port_use() {
        let port = SalNode::new(1).port(1).unwrap();
        let mut status = MacMapStatus::default();
        status.active.insert(host(1, 5), port);
        assert!(status.uses(&PortVlan::new(port, VlanId::new(5).unwrap())));
        assert!(!status.uses(&PortVlan::new(port, VlanId::new(6).unwrap())));
    }
}
