// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Removal of learned hosts

use super::{ScanScope, entry_path, scan};
use crate::errors::VtnResult;
use crate::ident::{VnodeId, VtnIdent};
use crate::mapping::macmap;
use crate::model::MacTableEntry;
use crate::txn::TxContext;
use net::{Mac, NodeVlan, PortVlan, SalNode, SalPort};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Selects the learned hosts to remove
pub trait MacEntryFilter {
    fn accept(&self, bridge: &VnodeId, entry: &MacTableEntry) -> bool;
}

impl<F> MacEntryFilter for F
where
    F: Fn(&VnodeId, &MacTableEntry) -> bool,
{
    fn accept(&self, bridge: &VnodeId, entry: &MacTableEntry) -> bool {
        self(bridge, entry)
    }
}

/// Hosts seen on exactly this port and VLAN
pub struct PortVlanFilter(pub PortVlan);

impl MacEntryFilter for PortVlanFilter {
    fn accept(&self, _: &VnodeId, entry: &MacTableEntry) -> bool {
        entry.port_vlan() == self.0
    }
}

/// Hosts seen on a VLAN of a switch (of any switch for a wildcard), except on the
/// excluded ports and switches.
///
/// Hosts mapped by a MAC mapping are never accepted: a VLAN mapping cannot take
/// them over.
pub struct NodeVlanFilter {
    pub node_vlan: NodeVlan,
    pub excluded_ports: BTreeSet<SalPort>,
    pub excluded_nodes: BTreeSet<SalNode>,
}

impl MacEntryFilter for NodeVlanFilter {
    fn accept(&self, _: &VnodeId, entry: &MacTableEntry) -> bool {
        self.node_vlan.covers(&entry.port_vlan())
            && !self.excluded_ports.contains(&entry.port)
            && !self.excluded_nodes.contains(&entry.port.node())
            && !matches!(entry.owner.parse::<VtnIdent>(), Ok(VtnIdent::MacMap(_)))
    }
}

/// Hosts mapped by a virtual element or by anything below it
pub struct OwnerFilter(pub VtnIdent);

impl MacEntryFilter for OwnerFilter {
    fn accept(&self, _: &VnodeId, entry: &MacTableEntry) -> bool {
        match entry.owner.parse::<VtnIdent>() {
            Ok(owner) => self.0.contains(&owner),
            Err(e) => {
                warn!("Learned host {} has a bad owner: {e}", entry.mac);
                false
            }
        }
    }
}

/// Remove the host with address `mac` from the table of `bridge`, if learned.
///
/// A host mapped by a MAC mapping is no longer active in it.
pub fn remove_entry(
    ctx: &mut TxContext<'_>,
    bridge: &VnodeId,
    mac: &Mac,
) -> VtnResult<Option<MacTableEntry>> {
    let path = entry_path(bridge, mac);
    let Some(entry) = ctx.read::<MacTableEntry>(&path)? else {
        return Ok(None);
    };
    ctx.delete(&path);
    debug!("{bridge}: removed host {mac} on {}", entry.port_vlan());
    if let Ok(VtnIdent::MacMap(owner)) = entry.owner.parse::<VtnIdent>() {
        macmap::inactivate_host(ctx, &owner, &entry.host())?;
    }
    Ok(Some(entry))
}

/// Remove every host in `scope` accepted by `filter`
pub fn remove_filtered(
    ctx: &mut TxContext<'_>,
    scope: ScanScope<'_>,
    filter: &impl MacEntryFilter,
) -> VtnResult<usize> {
    let mut removed = 0;
    scan(ctx, scope, |ctx, bridge, entry| {
        if filter.accept(bridge, &entry) {
            remove_entry(ctx, bridge, &entry.mac)?;
            removed += 1;
        }
        Ok(())
    })?;
    Ok(removed)
}
