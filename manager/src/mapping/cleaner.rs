// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Purge of the caches made stale by a superseded or removed mapping.
//!
//! Registrations collect what they supersede in a [`MapCleanup`], per tenant, and
//! purge everything in one pass once the new records are written.

use super::{port_records, vlan_records};
use crate::errors::VtnResult;
use crate::flow::FlowRemovalSpec;
use crate::ident::{VnodeName, VtnIdent};
use crate::mactable::ScanScope;
use crate::mactable::remove::{NodeVlanFilter, OwnerFilter, PortVlanFilter, remove_filtered};
use crate::txn::TxContext;
use net::{NodeVlan, PortVlan, SalNode, SalPort};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Default)]
struct TenantCleanup {
    ports: BTreeSet<PortVlan>,
    nodes: BTreeSet<NodeVlan>,
}

/// Port and VLAN mappings superseded in a transaction, by tenant
#[derive(Debug, Default)]
pub struct MapCleanup {
    tenants: BTreeMap<VnodeName, TenantCleanup>,
}

impl MapCleanup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The hosts and flows of `tenant` on `pv` are stale
    pub fn add_port(&mut self, tenant: &VnodeName, pv: PortVlan) {
        self.tenants
            .entry(tenant.clone())
            .or_default()
            .ports
            .insert(pv);
    }

    /// The hosts and flows of `tenant` on `nv` are stale
    pub fn add_vlan(&mut self, tenant: &VnodeName, nv: NodeVlan) {
        self.tenants
            .entry(tenant.clone())
            .or_default()
            .nodes
            .insert(nv);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }

    /// Purge everything collected
    pub fn clean_up(self, ctx: &mut TxContext<'_>) -> VtnResult<()> {
        for (tenant, cleanup) in self.tenants {
            for pv in cleanup.ports {
                purge_port(ctx, &tenant, pv)?;
            }
            for nv in cleanup.nodes {
                purge_vlan(ctx, &tenant, nv)?;
            }
        }
        Ok(())
    }
}

fn purge_port(ctx: &mut TxContext<'_>, tenant: &VnodeName, pv: PortVlan) -> VtnResult<()> {
    let removed = remove_filtered(ctx, ScanScope::Tenant(tenant), &PortVlanFilter(pv))?;
    debug!("{tenant}: purged {removed} hosts on {pv}");
    ctx.remove_flows(FlowRemovalSpec::EdgePort {
        tenant: tenant.clone(),
        port: pv.port,
        vlan: pv.vlan,
    });
    Ok(())
}

// Ports of a VLAN mapping that a port mapping takes away from it.
fn port_mapped_ports(ctx: &TxContext<'_>, nv: &NodeVlan) -> VtnResult<BTreeSet<SalPort>> {
    Ok(port_records(ctx)?
        .into_iter()
        .filter(|(pv, owner)| matches!(owner, VtnIdent::Interface(_)) && nv.covers(pv))
        .map(|(pv, _)| pv.port)
        .collect())
}

// Nodes of a wildcard VLAN mapping that a specific VLAN mapping takes away from it.
fn vlan_mapped_nodes(ctx: &TxContext<'_>, nv: &NodeVlan) -> VtnResult<BTreeSet<SalNode>> {
    if !nv.is_wildcard() {
        return Ok(BTreeSet::new());
    }
    Ok(vlan_records(ctx)?
        .into_iter()
        .filter_map(|(other, _)| other.node.filter(|_| other.vlan == nv.vlan))
        .collect())
}

fn purge_vlan(ctx: &mut TxContext<'_>, tenant: &VnodeName, nv: NodeVlan) -> VtnResult<()> {
    let filter = NodeVlanFilter {
        node_vlan: nv,
        excluded_ports: port_mapped_ports(ctx, &nv)?,
        excluded_nodes: vlan_mapped_nodes(ctx, &nv)?,
    };
    let removed = remove_filtered(ctx, ScanScope::Tenant(tenant), &filter)?;
    debug!("{tenant}: purged {removed} hosts on {nv}");
    ctx.remove_flows(FlowRemovalSpec::EdgeNode {
        tenant: tenant.clone(),
        node: nv.node,
        excluded: filter.excluded_ports,
        vlan: nv.vlan,
    });
    Ok(())
}

/// Purge of the caches of a virtual element being destroyed, whatever maps it
pub struct VNodeMapCleaner {
    ident: VtnIdent,
}

impl VNodeMapCleaner {
    #[must_use]
    pub fn new(ident: VtnIdent) -> Self {
        Self { ident }
    }

    /// Remove the hosts mapped by the element or by anything below it, and queue
    /// the removal of its flows
    pub fn purge(&self, ctx: &mut TxContext<'_>) -> VtnResult<usize> {
        let filter = OwnerFilter(self.ident.clone());
        let removed = match &self.ident {
            VtnIdent::Tenant(tenant) => remove_filtered(ctx, ScanScope::Tenant(&tenant.0), &filter)?,
            other => match other.vnode() {
                Some(vnode) if vnode.is_bridge() => {
                    remove_filtered(ctx, ScanScope::Bridge(vnode), &filter)?
                }
                // terminals learn no hosts
                _ => 0,
            },
        };
        debug!("{}: purged {removed} hosts", self.ident);
        let spec = match &self.ident {
            VtnIdent::Tenant(tenant) => FlowRemovalSpec::Tenant(tenant.0.clone()),
            other => FlowRemovalSpec::VirtualNode(other.clone()),
        };
        ctx.remove_flows(spec);
        Ok(removed)
    }
}
