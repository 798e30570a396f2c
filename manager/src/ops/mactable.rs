// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Operations on the MAC address tables

use super::check_duplicates;
use crate::errors::{VtnError, VtnResult};
use crate::flow::FlowRemovalSpec;
use crate::ident::{VnodeId, VtnIdent};
use crate::mactable::remove::{remove_entry, remove_filtered};
use crate::mactable::ScanScope;
use crate::model::{MacTableEntry, VirtualNode};
use crate::task::{CompositeTxTask, VtnUpdateType};
use crate::txn::TxContext;
use net::Mac;
use tracing::info;

/// Remove learned hosts from the table of `bridge`, one result per address, in order.
///
/// Once committed, the flows of the removed hosts are removed.
pub fn remove_mac_entries(
    bridge: VnodeId,
    macs: Vec<Mac>,
) -> VtnResult<CompositeTxTask<'static, Mac, VtnUpdateType>> {
    bridge.check_bridge()?;
    if macs.iter().any(Mac::is_zero) {
        return Err(VtnError::invalid("zero MAC address"));
    }
    check_duplicates(&macs, "MAC address")?;
    let started = bridge.clone();
    let flow_bridge = bridge.clone();
    Ok(CompositeTxTask::new("remove-mac-entries", macs, move |ctx, mac: &Mac| {
        Ok(remove_entry(ctx, &bridge, mac)?.map(|_| VtnUpdateType::Removed))
    })
    .on_started(move |ctx| {
        VtnIdent::from(started.clone()).fetch::<VirtualNode>(ctx)?;
        Ok(())
    })
    .remove_flows_on_success(move |macs, results| {
        macs.iter()
            .zip(results)
            .filter(|(_, result)| result.is_some())
            .map(|(mac, _)| FlowRemovalSpec::Host {
                bridge: flow_bridge.clone(),
                mac: *mac,
            })
            .collect()
    }))
}

/// Remove every learned host of `bridge`, and the flows of the bridge
pub fn clear_mac_table(ctx: &mut TxContext<'_>, bridge: &VnodeId) -> VtnResult<usize> {
    bridge.check_bridge()?;
    VtnIdent::from(bridge.clone()).fetch::<VirtualNode>(ctx)?;
    let removed = remove_filtered(ctx, ScanScope::Bridge(bridge), &|_: &VnodeId, _: &MacTableEntry| true)?;
    if removed > 0 {
        ctx.remove_flows(FlowRemovalSpec::VirtualNode(bridge.clone().into()));
    }
    info!("{bridge}: cleared {removed} hosts");
    Ok(removed)
}
