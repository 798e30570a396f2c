// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Lifecycle of tenants, virtual nodes and virtual interfaces.
//!
//! Removing an element unregisters every mapping below it, purges the hosts and flows
//! it mapped and deletes its subtree.

use super::macmap::remove_mac_map;
use crate::errors::{VtnError, VtnResult};
use crate::ident::{InterfaceId, TenantId, VINTERFACE, VLANMAP, VirtualNodeKind, VlanMapId, VnodeId, VtnIdent};
use crate::mapping::cleaner::VNodeMapCleaner;
use crate::mapping::port::unregister_port_map;
use crate::mapping::vlan::unregister_vlan_map;
use crate::model::{Tenant, VInterface, VirtualNode, VlanMap};
use crate::task::VtnUpdateType;
use crate::txn::TxContext;
use tracing::info;

fn check_absent(ctx: &TxContext<'_>, ident: &VtnIdent) -> VtnResult<()> {
    if ctx.exists(&ident.data_path())? {
        Err(VtnError::Conflict(format!("{ident} already exists")))
    } else {
        Ok(())
    }
}

pub fn create_tenant(ctx: &mut TxContext<'_>, id: &TenantId, desc: Option<String>) -> VtnResult<()> {
    check_absent(ctx, &id.clone().into())?;
    ctx.put(id.data_path(), Tenant { desc })?;
    info!("Created {id}");
    Ok(())
}

pub fn remove_tenant(ctx: &mut TxContext<'_>, id: &TenantId) -> VtnResult<()> {
    let ident = VtnIdent::from(id.clone());
    ident.fetch::<Tenant>(ctx)?;
    // tenant/kind/name
    let vnodes = ctx.scan::<VirtualNode>(&id.data_path(), 4)?;
    for (path, _) in vnodes {
        if let Some(vnode) = VnodeId::from_data_path(&path) {
            release_vnode_mappings(ctx, &vnode)?;
        }
    }
    VNodeMapCleaner::new(ident).purge(ctx)?;
    ctx.delete(&id.data_path());
    info!("Removed {id}");
    Ok(())
}

pub fn create_vnode(ctx: &mut TxContext<'_>, id: &VnodeId, desc: Option<String>) -> VtnResult<()> {
    VtnIdent::Tenant(TenantId(id.tenant.clone())).fetch::<Tenant>(ctx)?;
    check_absent(ctx, &id.clone().into())?;
    ctx.put(
        id.data_path(),
        VirtualNode {
            desc,
            ..VirtualNode::default()
        },
    )?;
    ctx.refresh_state(id);
    info!("Created {id}");
    Ok(())
}

// Unregister the mappings of a virtual node, leaving the purge to a VNodeMapCleaner.
fn release_vnode_mappings(ctx: &mut TxContext<'_>, id: &VnodeId) -> VtnResult<()> {
    for (path, iface) in ctx.children::<VInterface>(&id.data_path().child(VINTERFACE))? {
        if let (Some(pv), Some(iface_id)) = (iface.mapped, InterfaceId::from_data_path(&path)) {
            unregister_port_map(ctx, &iface_id, pv, false)?;
        }
    }
    if id.is_bridge() {
        for (_, map) in ctx.children::<VlanMap>(&id.data_path().child(VLANMAP))? {
            unregister_vlan_map(ctx, &VlanMapId::new(id.clone(), map.node_vlan)?, false)?;
        }
        remove_mac_map(ctx, id)?;
    }
    Ok(())
}

pub fn remove_vnode(ctx: &mut TxContext<'_>, id: &VnodeId) -> VtnResult<()> {
    let ident = VtnIdent::from(id.clone());
    ident.fetch::<VirtualNode>(ctx)?;
    release_vnode_mappings(ctx, id)?;
    VNodeMapCleaner::new(ident).purge(ctx)?;
    ctx.delete(&id.data_path());
    info!("Removed {id}");
    Ok(())
}

/// Create a virtual interface. A virtual terminal holds at most one.
pub fn create_interface(
    ctx: &mut TxContext<'_>,
    id: &InterfaceId,
    enabled: bool,
    desc: Option<String>,
) -> VtnResult<()> {
    VtnIdent::from(id.vnode.clone()).fetch::<VirtualNode>(ctx)?;
    check_absent(ctx, &id.clone().into())?;
    if id.vnode.kind == VirtualNodeKind::Terminal {
        let others = ctx.children::<VInterface>(&id.vnode.data_path().child(VINTERFACE))?;
        if !others.is_empty() {
            return Err(VtnError::invalid(format!(
                "{} already has an interface",
                id.vnode
            )));
        }
    }
    ctx.put(
        id.data_path(),
        VInterface {
            enabled,
            desc,
            ..VInterface::default()
        },
    )?;
    ctx.refresh_state(&id.vnode);
    info!("Created {id}");
    Ok(())
}

pub fn remove_interface(ctx: &mut TxContext<'_>, id: &InterfaceId) -> VtnResult<()> {
    let ident = VtnIdent::from(id.clone());
    let iface: VInterface = ident.fetch(ctx)?;
    if let Some(pv) = iface.mapped {
        unregister_port_map(ctx, id, pv, false)?;
    }
    VNodeMapCleaner::new(ident).purge(ctx)?;
    ctx.delete(&id.data_path());
    ctx.refresh_state(&id.vnode);
    info!("Removed {id}");
    Ok(())
}

/// Enable or disable an interface. The hosts learned through a disabled interface
/// are removed.
pub fn set_interface_enabled(
    ctx: &mut TxContext<'_>,
    id: &InterfaceId,
    enabled: bool,
) -> VtnResult<Option<VtnUpdateType>> {
    let ident = VtnIdent::from(id.clone());
    let mut iface: VInterface = ident.fetch(ctx)?;
    if iface.enabled == enabled {
        return Ok(None);
    }
    iface.enabled = enabled;
    ctx.put(id.data_path(), iface)?;
    if !enabled {
        VNodeMapCleaner::new(ident).purge(ctx)?;
    }
    ctx.refresh_state(&id.vnode);
    info!("{id}: {}", if enabled { "enabled" } else { "disabled" });
    Ok(Some(VtnUpdateType::Changed))
}
