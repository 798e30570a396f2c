// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Switch port inventory updates.
//!
//! Pending port mappings take effect when their port appears. When a port goes away,
//! every mapping on it is released and the hosts seen on it are removed.

use crate::errors::{VtnError, VtnResult};
use crate::flow::FlowRemovalSpec;
use crate::ident::{InterfaceId, VTNS, VnodeId, VtnIdent};
use crate::inventory::port_path;
use crate::mactable::ScanScope;
use crate::mactable::remove::{remove_entry, remove_filtered};
use crate::mapping::macmap::inactivate_port_vlan;
use crate::mapping::port::{register_port_map, unregister_port_map};
use crate::mapping::port_records;
use crate::model::{MacTableEntry, SwitchPort, VInterface};
use crate::txn::TxContext;
use net::SalPort;
use store::DataPath;
use tracing::{info, warn};

// Interfaces configured to map `port`, and their record.
fn interfaces_on(ctx: &TxContext<'_>, port: &SalPort) -> VtnResult<Vec<(InterfaceId, VInterface)>> {
    // vtns/tenant/kind/name/vinterface/name
    let depth = 6;
    Ok(ctx
        .scan::<VInterface>(&DataPath::new([VTNS]), depth)?
        .into_iter()
        .filter(|(_, iface)| iface.port_map.is_some_and(|pv| pv.port == *port))
        .filter_map(|(path, iface)| InterfaceId::from_data_path(&path).map(|id| (id, iface)))
        .collect())
}

/// Record a switch port, registering the port mappings waiting for it
pub fn put_switch_port(ctx: &mut TxContext<'_>, port: SalPort, enabled: bool) -> VtnResult<()> {
    ctx.put(port_path(&port), SwitchPort { enabled })?;
    for (id, iface) in interfaces_on(ctx, &port)? {
        if let (Some(pv), None) = (iface.port_map, iface.mapped) {
            match register_port_map(ctx, &id, pv, true) {
                Ok(()) => info!("{id}: port map {pv} in effect"),
                Err(VtnError::Conflict(e)) => warn!("{id}: port map {pv} stays pending: {e}"),
                Err(e) => return Err(e),
            }
        }
        ctx.refresh_state(&id.vnode);
    }
    Ok(())
}

/// Forget a switch port
pub fn remove_switch_port(ctx: &mut TxContext<'_>, port: SalPort) -> VtnResult<()> {
    for (id, iface) in interfaces_on(ctx, &port)? {
        if let Some(pv) = iface.mapped {
            unregister_port_map(ctx, &id, pv, true)?;
        }
        ctx.refresh_state(&id.vnode);
    }
    for (pv, owner) in port_records(ctx)? {
        if pv.port != port {
            continue;
        }
        if let VtnIdent::MacMap(macmap) = owner {
            for host in inactivate_port_vlan(ctx, &macmap, &pv, true)? {
                remove_entry(ctx, &macmap.bridge, &host.mac)?;
            }
            ctx.remove_flows(FlowRemovalSpec::EdgePort {
                tenant: macmap.bridge.tenant.clone(),
                port,
                vlan: pv.vlan,
            });
        }
    }
    let removed = remove_filtered(ctx, ScanScope::All, &|_: &VnodeId, entry: &MacTableEntry| {
        entry.port == port
    })?;
    ctx.delete(&port_path(&port));
    info!("Removed switch port {port}, {removed} hosts on it");
    Ok(())
}
