// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Identifiers of the virtual elements and of the mappings.
//!
//! Every identifier has a string form (e.g. `vbridge-if:tenant/bridge/if`) which is what
//! mapping records and learned hosts keep as their owner, and a [`DataPath`] where the
//! element is stored.

use crate::errors::{VtnError, VtnResult};
use crate::model::StoreRecord;
use crate::txn::TxContext;
use net::NodeVlan;
use std::fmt::Display;
use std::str::FromStr;
use store::DataPath;

pub const MAX_NAME_LEN: usize = 31;

pub(crate) const VTNS: &str = "vtns";
pub(crate) const VINTERFACE: &str = "vinterface";
pub(crate) const VLANMAP: &str = "vlanmap";
pub(crate) const MACMAP: &str = "macmap";
pub(crate) const MAC_TABLE: &str = "mac-table";
const MACMAP_CONFIG: &str = "config";
const MACMAP_STATUS: &str = "status";

/// Name of a tenant, virtual node or virtual interface.
///
/// 1 to 31 characters out of `[A-Za-z0-9_]`, the first one alphanumeric.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VnodeName(String);

impl VnodeName {
    pub fn new(name: impl Into<String>) -> VtnResult<Self> {
        let name = name.into();
        let valid = (1..=MAX_NAME_LEN).contains(&name.len())
            && name.starts_with(|c: char| c.is_ascii_alphanumeric())
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if valid {
            Ok(VnodeName(name))
        } else {
            Err(VtnError::invalid(format!("bad name '{name}'")))
        }
    }
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for VnodeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for VnodeName {
    type Err = VtnError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VnodeName::new(s)
    }
}

/// The kinds of virtual nodes. Only bridges learn hosts and hold VLAN or MAC mappings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VirtualNodeKind {
    Bridge,
    Terminal,
}

impl VirtualNodeKind {
    fn container(self) -> &'static str {
        match self {
            VirtualNodeKind::Bridge => "vbridge",
            VirtualNodeKind::Terminal => "vterminal",
        }
    }
    fn from_container(s: &str) -> Option<Self> {
        match s {
            "vbridge" => Some(VirtualNodeKind::Bridge),
            "vterminal" => Some(VirtualNodeKind::Terminal),
            _ => None,
        }
    }
    fn if_scheme(self) -> &'static str {
        match self {
            VirtualNodeKind::Bridge => "vbridge-if",
            VirtualNodeKind::Terminal => "vterminal-if",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TenantId(pub VnodeName);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VnodeId {
    pub tenant: VnodeName,
    pub kind: VirtualNodeKind,
    pub name: VnodeName,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterfaceId {
    pub vnode: VnodeId,
    pub name: VnodeName,
}

/// A VLAN mapping, identified by the bridge and the mapped node/VLAN pair
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VlanMapId {
    pub bridge: VnodeId,
    pub node_vlan: NodeVlan,
}

/// The MAC mapping of a bridge (a bridge has at most one)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacMapId {
    pub bridge: VnodeId,
}

/// Any identifier, as found in the owner of a mapping record or of a learned host.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VtnIdent {
    Tenant(TenantId),
    Vnode(VnodeId),
    Interface(InterfaceId),
    VlanMap(VlanMapId),
    MacMap(MacMapId),
}

fn tenant_path(tenant: &VnodeName) -> DataPath {
    DataPath::new([VTNS, tenant.as_str()])
}

impl TenantId {
    pub fn new(name: &str) -> VtnResult<Self> {
        Ok(TenantId(VnodeName::new(name)?))
    }
    #[must_use]
    pub fn data_path(&self) -> DataPath {
        tenant_path(&self.0)
    }
}

impl VnodeId {
    #[must_use]
    pub fn new(tenant: VnodeName, kind: VirtualNodeKind, name: VnodeName) -> Self {
        Self { tenant, kind, name }
    }
    pub fn bridge(tenant: &str, name: &str) -> VtnResult<Self> {
        Ok(Self::new(
            VnodeName::new(tenant)?,
            VirtualNodeKind::Bridge,
            VnodeName::new(name)?,
        ))
    }
    pub fn terminal(tenant: &str, name: &str) -> VtnResult<Self> {
        Ok(Self::new(
            VnodeName::new(tenant)?,
            VirtualNodeKind::Terminal,
            VnodeName::new(name)?,
        ))
    }
    #[must_use]
    pub fn is_bridge(&self) -> bool {
        self.kind == VirtualNodeKind::Bridge
    }
    /// Fail unless this is a bridge
    pub fn check_bridge(&self) -> VtnResult<()> {
        if self.is_bridge() {
            Ok(())
        } else {
            Err(VtnError::invalid(format!("{self} is not a virtual bridge")))
        }
    }
    #[must_use]
    pub fn interface(&self, name: VnodeName) -> InterfaceId {
        InterfaceId {
            vnode: self.clone(),
            name,
        }
    }
    #[must_use]
    pub fn data_path(&self) -> DataPath {
        tenant_path(&self.tenant)
            .child(self.kind.container())
            .child(self.name.as_str())
    }
    /// The identifier of the virtual node stored at `path`, if any
    #[must_use]
    pub fn from_data_path(path: &DataPath) -> Option<Self> {
        match path.components() {
            [vtns, tenant, container, name] if vtns == VTNS => Some(Self {
                tenant: VnodeName::new(tenant.as_str()).ok()?,
                kind: VirtualNodeKind::from_container(container)?,
                name: VnodeName::new(name.as_str()).ok()?,
            }),
            _ => None,
        }
    }
    #[must_use]
    pub fn mac_table_path(&self) -> DataPath {
        self.data_path().child(MAC_TABLE)
    }
    #[must_use]
    pub fn mac_map(&self) -> MacMapId {
        MacMapId {
            bridge: self.clone(),
        }
    }
}

impl InterfaceId {
    #[must_use]
    pub fn data_path(&self) -> DataPath {
        self.vnode
            .data_path()
            .child(VINTERFACE)
            .child(self.name.as_str())
    }
    /// The identifier of the interface stored at `path`, if any
    #[must_use]
    pub fn from_data_path(path: &DataPath) -> Option<Self> {
        let (vnode, rest) = path.components().split_at_checked(4)?;
        match rest {
            [container, name] if container == VINTERFACE => Some(Self {
                vnode: VnodeId::from_data_path(&DataPath::new(vnode.iter().map(String::as_str)))?,
                name: VnodeName::new(name.as_str()).ok()?,
            }),
            _ => None,
        }
    }
}

fn parse_map_key(key: &str) -> VtnResult<NodeVlan> {
    key.parse::<NodeVlan>()
        .map_err(|e| VtnError::invalid(format!("bad VLAN map id '{key}': {e}")))
}

impl VlanMapId {
    pub fn new(bridge: VnodeId, node_vlan: NodeVlan) -> VtnResult<Self> {
        bridge.check_bridge()?;
        Ok(Self { bridge, node_vlan })
    }
    /// The id of this map within its bridge, `openflow:<dpid>@<vlan>` or `ANY@<vlan>`
    #[must_use]
    pub fn map_key(&self) -> String {
        self.node_vlan.to_string()
    }
    #[must_use]
    pub fn data_path(&self) -> DataPath {
        self.bridge.data_path().child(VLANMAP).child(self.map_key())
    }
}

impl MacMapId {
    /// Where the access lists are stored
    #[must_use]
    pub fn data_path(&self) -> DataPath {
        self.bridge.data_path().child(MACMAP).child(MACMAP_CONFIG)
    }
    #[must_use]
    pub fn status_path(&self) -> DataPath {
        self.bridge.data_path().child(MACMAP).child(MACMAP_STATUS)
    }
}

impl VtnIdent {
    #[must_use]
    pub fn tenant(&self) -> &VnodeName {
        match self {
            VtnIdent::Tenant(t) => &t.0,
            VtnIdent::Vnode(v) => &v.tenant,
            VtnIdent::Interface(i) => &i.vnode.tenant,
            VtnIdent::VlanMap(m) => &m.bridge.tenant,
            VtnIdent::MacMap(m) => &m.bridge.tenant,
        }
    }

    /// The virtual node this identifier is or belongs to, none for a tenant
    #[must_use]
    pub fn vnode(&self) -> Option<&VnodeId> {
        match self {
            VtnIdent::Tenant(_) => None,
            VtnIdent::Vnode(v) => Some(v),
            VtnIdent::Interface(i) => Some(&i.vnode),
            VtnIdent::VlanMap(m) => Some(&m.bridge),
            VtnIdent::MacMap(m) => Some(&m.bridge),
        }
    }

    #[must_use]
    pub fn data_path(&self) -> DataPath {
        match self {
            VtnIdent::Tenant(t) => t.data_path(),
            VtnIdent::Vnode(v) => v.data_path(),
            VtnIdent::Interface(i) => i.data_path(),
            VtnIdent::VlanMap(m) => m.data_path(),
            VtnIdent::MacMap(m) => m.data_path(),
        }
    }

    /// Tell if `other` is this identifier or lies below it.
    ///
    /// A tenant contains everything in it. A virtual node contains its interfaces
    /// and its mappings.
    #[must_use]
    pub fn contains(&self, other: &VtnIdent) -> bool {
        match self {
            VtnIdent::Tenant(t) => other.tenant() == &t.0,
            VtnIdent::Vnode(v) => other.vnode() == Some(v),
            _ => self == other,
        }
    }

    /// Read the record of the element at this identifier
    pub fn read<R: StoreRecord>(&self, ctx: &TxContext<'_>) -> VtnResult<Option<R>> {
        ctx.read(&self.data_path())
    }

    /// Read the record of the element at this identifier, which must exist
    pub fn fetch<R: StoreRecord>(&self, ctx: &TxContext<'_>) -> VtnResult<R> {
        self.read(ctx)?.ok_or_else(|| VtnError::NotFound(self.to_string()))
    }
}

impl Display for VtnIdent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VtnIdent::Tenant(t) => write!(f, "vtn:{}", t.0),
            VtnIdent::Vnode(v) => write!(f, "{}:{}/{}", v.kind.container(), v.tenant, v.name),
            VtnIdent::Interface(i) => write!(
                f,
                "{}:{}/{}/{}",
                i.vnode.kind.if_scheme(),
                i.vnode.tenant,
                i.vnode.name,
                i.name
            ),
            VtnIdent::VlanMap(m) => write!(
                f,
                "{VLANMAP}:{}/{}/{}",
                m.bridge.tenant,
                m.bridge.name,
                m.map_key()
            ),
            VtnIdent::MacMap(m) => write!(f, "{MACMAP}:{}/{}", m.bridge.tenant, m.bridge.name),
        }
    }
}

impl FromStr for VtnIdent {
    type Err = VtnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || VtnError::invalid(format!("bad identifier '{s}'"));
        let (scheme, rest) = s.split_once(':').ok_or_else(bad)?;
        let parts: Vec<&str> = rest.split('/').collect();
        let vnode = |kind: VirtualNodeKind| -> VtnResult<VnodeId> {
            Ok(VnodeId::new(
                VnodeName::new(parts[0])?,
                kind,
                VnodeName::new(parts[1])?,
            ))
        };
        let ident = match (scheme, parts.len()) {
            ("vtn", 1) => VtnIdent::Tenant(TenantId(VnodeName::new(parts[0])?)),
            ("vbridge", 2) => VtnIdent::Vnode(vnode(VirtualNodeKind::Bridge)?),
            ("vterminal", 2) => VtnIdent::Vnode(vnode(VirtualNodeKind::Terminal)?),
            ("vbridge-if", 3) => VtnIdent::Interface(
                vnode(VirtualNodeKind::Bridge)?.interface(VnodeName::new(parts[2])?),
            ),
            ("vterminal-if", 3) => VtnIdent::Interface(
                vnode(VirtualNodeKind::Terminal)?.interface(VnodeName::new(parts[2])?),
            ),
            (VLANMAP, 3) => VtnIdent::VlanMap(VlanMapId {
                bridge: vnode(VirtualNodeKind::Bridge)?,
                node_vlan: parse_map_key(parts[2])?,
            }),
            (MACMAP, 2) => VtnIdent::MacMap(vnode(VirtualNodeKind::Bridge)?.mac_map()),
            _ => return Err(bad()),
        };
        Ok(ident)
    }
}

macro_rules! ident_variant {
    ($ty:ident, $variant:ident) => {
        impl From<$ty> for VtnIdent {
            fn from(value: $ty) -> Self {
                VtnIdent::$variant(value)
            }
        }
        impl Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                VtnIdent::from(self.clone()).fmt(f)
            }
        }
    };
}
ident_variant!(TenantId, Tenant);
ident_variant!(VnodeId, Vnode);
ident_variant!(InterfaceId, Interface);
ident_variant!(VlanMapId, VlanMap);
ident_variant!(MacMapId, MacMap);

#[cfg(test)]
mod test {
    use super::{InterfaceId, TenantId, VlanMapId, VnodeId, VnodeName, VtnIdent};
    use crate::errors::VtnError;
    use net::{NodeVlan, SalNode, VlanId};
    use pretty_assertions::assert_eq;

    fn name(s: &str) -> VnodeName {
        VnodeName::new(s).unwrap()
    }

    #[test]
    fn names() {
        assert!(VnodeName::new("a").is_ok());
        assert!(VnodeName::new("vtn_1").is_ok());
        assert!(VnodeName::new("x".repeat(31)).is_ok());
        let long = "x".repeat(32);
        for bad in ["", "_a", "a-b", "a/b", "é", long.as_str()] {
            assert!(matches!(
                VnodeName::new(bad),
                Err(VtnError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn string_forms_parse_back() {
        let bridge = VnodeId::bridge("t1", "b1").unwrap();
        let terminal = VnodeId::terminal("t1", "term").unwrap();
        let node_vlan = NodeVlan::new(Some(SalNode::new(1)), VlanId::new(5).unwrap());
        let idents = [
            (VtnIdent::Tenant(TenantId(name("t1"))), "vtn:t1"),
            (VtnIdent::Vnode(bridge.clone()), "vbridge:t1/b1"),
            (VtnIdent::Vnode(terminal.clone()), "vterminal:t1/term"),
            (bridge.interface(name("if1")).into(), "vbridge-if:t1/b1/if1"),
            (terminal.interface(name("if1")).into(), "vterminal-if:t1/term/if1"),
            (
                VlanMapId::new(bridge.clone(), node_vlan).unwrap().into(),
                "vlanmap:t1/b1/openflow:1@5",
            ),
            (
                VlanMapId::new(bridge.clone(), NodeVlan::any(VlanId::UNTAGGED))
                    .unwrap()
                    .into(),
                "vlanmap:t1/b1/ANY@0",
            ),
            (bridge.mac_map().into(), "macmap:t1/b1"),
        ];
        for (ident, string) in idents {
            assert_eq!(ident.to_string(), string);
            assert_eq!(string.parse::<VtnIdent>(), Ok(ident));
        }
    }

    #[test]
    fn bad_identifiers() {
        for bad in [
            "vtn",
            "vtn:",
            "vtn:a/b",
            "vbridge:t1",
            "vlanmap:t1/b1/openflow:1",
            "vlanmap:t1/b1/ANY@4096",
            "vlanmap:t1/b1/ANY.5",
            "bridge:t1/b1",
        ] {
            assert!(bad.parse::<VtnIdent>().is_err(), "{bad}");
        }
    }

    #[test]
    fn containment() {
        let bridge = VnodeId::bridge("t1", "b1").unwrap();
        let other = VnodeId::bridge("t1", "b2").unwrap();
        let tenant = VtnIdent::Tenant(TenantId(name("t1")));
        let iface: VtnIdent = bridge.interface(name("i")).into();
        let macmap: VtnIdent = bridge.mac_map().into();
        let vbridge = VtnIdent::Vnode(bridge.clone());

        assert!(tenant.contains(&iface));
        assert!(tenant.contains(&VtnIdent::Vnode(other.clone())));
        assert!(vbridge.contains(&vbridge));
        assert!(vbridge.contains(&iface));
        assert!(vbridge.contains(&macmap));
        assert!(!VtnIdent::Vnode(other).contains(&iface));
        assert!(!iface.contains(&vbridge));
        assert!(!VtnIdent::Tenant(TenantId(name("t2"))).contains(&iface));
    }

    #[test]
    fn data_paths() {
        let bridge = VnodeId::bridge("t1", "b1").unwrap();
        let iface = bridge.interface(name("i1"));
        assert_eq!(iface.data_path().to_string(), "/vtns/t1/vbridge/b1/vinterface/i1");
        assert_eq!(InterfaceId::from_data_path(&iface.data_path()), Some(iface));
        assert_eq!(VnodeId::from_data_path(&bridge.data_path()), Some(bridge.clone()));
        assert_eq!(VnodeId::from_data_path(&bridge.mac_table_path()), None);
        assert_eq!(
            bridge.mac_map().status_path().to_string(),
            "/vtns/t1/vbridge/b1/macmap/status"
        );
        let terminal = VnodeId::terminal("t1", "x").unwrap();
        assert!(VlanMapId::new(terminal, NodeVlan::any(VlanId::UNTAGGED)).is_err());
    }
}
