// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Port-map configuration of virtual interfaces.
//!
//! A configured port mapping takes effect once its switch port is known to the
//! inventory. Until then it stays pending.

use crate::errors::VtnResult;
use crate::ident::{InterfaceId, VtnIdent};
use crate::inventory;
use crate::mapping::port::{register_port_map, unregister_port_map};
use crate::model::VInterface;
use crate::task::VtnUpdateType;
use crate::txn::TxContext;
use net::PortVlan;
use tracing::{debug, info};

/// Configure the port mapping of `iface` to `pv`
pub fn set_port_map(
    ctx: &mut TxContext<'_>,
    iface: &InterfaceId,
    pv: PortVlan,
    purge: bool,
) -> VtnResult<Option<VtnUpdateType>> {
    let ident = VtnIdent::from(iface.clone());
    let mut record: VInterface = ident.fetch(ctx)?;
    if record.port_map == Some(pv) {
        return Ok(None);
    }
    let update = if record.port_map.is_some() {
        VtnUpdateType::Changed
    } else {
        VtnUpdateType::Created
    };
    if let Some(old) = record.mapped {
        unregister_port_map(ctx, iface, old, purge)?;
        record = ident.fetch(ctx)?;
    }
    record.port_map = Some(pv);
    ctx.put(iface.data_path(), record)?;

    if inventory::port(ctx, &pv.port)?.is_some() {
        register_port_map(ctx, iface, pv, purge)?;
    } else {
        debug!("{iface}: port map {pv} pending, {} is not present", pv.port);
    }
    ctx.refresh_state(&iface.vnode);
    info!("{iface}: port map {pv} {update}");
    Ok(Some(update))
}

/// Remove the port mapping of `iface`
pub fn remove_port_map(
    ctx: &mut TxContext<'_>,
    iface: &InterfaceId,
    purge: bool,
) -> VtnResult<Option<VtnUpdateType>> {
    let ident = VtnIdent::from(iface.clone());
    let record: VInterface = ident.fetch(ctx)?;
    let Some(pv) = record.port_map else {
        return Ok(None);
    };
    if let Some(mapped) = record.mapped {
        unregister_port_map(ctx, iface, mapped, purge)?;
    }
    let mut record: VInterface = ident.fetch(ctx)?;
    record.port_map = None;
    ctx.put(iface.data_path(), record)?;
    ctx.refresh_state(&iface.vnode);
    info!("{iface}: port map {pv} removed");
    Ok(Some(VtnUpdateType::Removed))
}
