// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Batches of VLAN mappings of a virtual bridge

use super::check_duplicates;
use crate::errors::VtnResult;
use crate::flow::FlowRemovalSpec;
use crate::ident::{VlanMapId, VnodeId, VtnIdent};
use crate::mapping::vlan::{register_vlan_map, unregister_vlan_map};
use crate::model::{VirtualNode, VlanMap};
use crate::task::{CompositeTxTask, VtnUpdateType};
use net::NodeVlan;

/// Add VLAN mappings to `bridge`, in order. A mapping the bridge already has is left
/// as is.
pub fn add_vlan_maps(
    bridge: VnodeId,
    maps: Vec<NodeVlan>,
    purge: bool,
) -> VtnResult<CompositeTxTask<'static, NodeVlan, VtnUpdateType>> {
    bridge.check_bridge()?;
    check_duplicates(&maps, "VLAN mapping")?;
    let started = bridge.clone();
    let step_bridge = bridge.clone();
    Ok(CompositeTxTask::new("add-vlan-maps", maps, move |ctx, nv: &NodeVlan| {
        let id = VlanMapId::new(step_bridge.clone(), *nv)?;
        if ctx.exists(&id.data_path())? {
            return Ok(None);
        }
        register_vlan_map(ctx, &id, purge)?;
        ctx.put(id.data_path(), VlanMap { node_vlan: *nv })?;
        Ok(Some(VtnUpdateType::Created))
    })
    .on_started(move |ctx| {
        VtnIdent::from(started.clone()).fetch::<VirtualNode>(ctx)?;
        Ok(())
    })
    .on_completed(move |ctx, _| {
        ctx.refresh_state(&bridge);
        Ok(())
    }))
}

/// Remove VLAN mappings from `bridge`, in order. Absent mappings are skipped.
///
/// Once committed, the flows of the removed mappings are removed.
pub fn remove_vlan_maps(
    bridge: VnodeId,
    maps: Vec<NodeVlan>,
    purge: bool,
) -> VtnResult<CompositeTxTask<'static, NodeVlan, VtnUpdateType>> {
    bridge.check_bridge()?;
    check_duplicates(&maps, "VLAN mapping")?;
    let started = bridge.clone();
    let step_bridge = bridge.clone();
    let flow_bridge = bridge.clone();
    Ok(CompositeTxTask::new("remove-vlan-maps", maps, move |ctx, nv: &NodeVlan| {
        let id = VlanMapId::new(step_bridge.clone(), *nv)?;
        if !ctx.exists(&id.data_path())? {
            return Ok(None);
        }
        unregister_vlan_map(ctx, &id, purge)?;
        ctx.delete(&id.data_path());
        Ok(Some(VtnUpdateType::Removed))
    })
    .on_started(move |ctx| {
        VtnIdent::from(started.clone()).fetch::<VirtualNode>(ctx)?;
        Ok(())
    })
    .on_completed(move |ctx, _| {
        ctx.refresh_state(&bridge);
        Ok(())
    })
    .remove_flows_on_success(move |maps, results| {
        maps.iter()
            .zip(results)
            .filter(|(_, result)| result.is_some())
            .filter_map(|(nv, _)| VlanMapId::new(flow_bridge.clone(), *nv).ok())
            .map(|id| FlowRemovalSpec::VirtualNode(id.into()))
            .collect()
    }))
}
