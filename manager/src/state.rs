// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Operational state of virtual nodes and interfaces

use crate::errors::VtnResult;
use crate::ident::{VINTERFACE, VLANMAP, VnodeId};
use crate::inventory;
use crate::model::{VInterface, VirtualNode, VlanMap, VnodeState};
use crate::txn::TxContext;
use tracing::info;

/// Up if enabled and mapped to a present, enabled port. Unknown without a port mapping.
pub(crate) fn interface_state(ctx: &TxContext<'_>, iface: &VInterface) -> VtnResult<VnodeState> {
    if !iface.enabled {
        return Ok(VnodeState::Down);
    }
    if iface.port_map.is_none() {
        return Ok(VnodeState::Unknown);
    }
    match iface.mapped {
        Some(pv) if inventory::is_port_up(ctx, &pv.port)? => Ok(VnodeState::Up),
        _ => Ok(VnodeState::Down),
    }
}

fn combine(states: impl IntoIterator<Item = VnodeState>) -> VnodeState {
    let mut up = false;
    for state in states {
        match state {
            VnodeState::Down => return VnodeState::Down,
            VnodeState::Up => up = true,
            VnodeState::Unknown => {}
        }
    }
    if up { VnodeState::Up } else { VnodeState::Unknown }
}

fn refresh_vnode(ctx: &mut TxContext<'_>, id: &VnodeId) -> VtnResult<()> {
    let Some(mut vnode) = ctx.read::<VirtualNode>(&id.data_path())? else {
        return Ok(());
    };
    let mut states = Vec::new();
    for (path, mut iface) in ctx.children::<VInterface>(&id.data_path().child(VINTERFACE))? {
        let state = interface_state(ctx, &iface)?;
        if state != iface.state {
            info!("{path}: state {} -> {state}", iface.state);
            iface.state = state;
            ctx.put(path, iface)?;
        }
        states.push(state);
    }
    if id.is_bridge() {
        let vlan_maps = ctx.children::<VlanMap>(&id.data_path().child(VLANMAP))?;
        states.extend(vlan_maps.iter().map(|_| VnodeState::Up));
        if let Some(status) = ctx.mac_map_status(id)? {
            states.push(if status.active.is_empty() {
                VnodeState::Down
            } else {
                VnodeState::Up
            });
        }
    }
    let state = combine(states);
    if state != vnode.state {
        info!("{id}: state {} -> {state}", vnode.state);
        vnode.state = state;
        ctx.put(id.data_path(), vnode)?;
    }
    Ok(())
}

/// Pre-submit hook recomputing the states of the virtual nodes touched by the transaction
pub(crate) fn refresh_vnode_states(ctx: &mut TxContext<'_>) -> VtnResult<()> {
    for id in ctx.take_state_refresh() {
        refresh_vnode(ctx, &id)?;
    }
    Ok(())
}
