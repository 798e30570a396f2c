// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Mapping of incoming traffic to the virtual network.
//!
//! Traffic from a host is mapped, in order of precedence, by the port mapping of its
//! port and VLAN, by the MAC mapping that admits the host, by the VLAN mapping of its
//! switch, then by the wildcard VLAN mapping of its VLAN.

use super::{macmap, port_record_path, read_owner, vlan_record_path};
use crate::errors::{VtnError, VtnResult};
use crate::ident::{InterfaceId, VnodeId, VtnIdent};
use crate::mactable;
use crate::model::VInterface;
use crate::txn::TxContext;
use net::{Mac, MacVlan, NodeVlan, PortVlan, SalPort, VlanId};
use std::net::IpAddr;
use tracing::{debug, trace};

/// Resolve the virtual element that maps `host` seen on `port`.
///
/// A host admitted by a MAC mapping is activated in it.
pub fn resolve(ctx: &mut TxContext<'_>, port: SalPort, host: &MacVlan) -> VtnResult<Option<VtnIdent>> {
    let pv = PortVlan::new(port, host.vlan);
    if let Some(owner @ VtnIdent::Interface(_)) = read_owner(ctx, &port_record_path(&pv))? {
        return Ok(Some(owner));
    }
    if let Some(macmap) = macmap::find_acl_owner(ctx, host)? {
        if macmap::activate_host(ctx, &macmap, host, port)? {
            return Ok(Some(macmap.into()));
        }
        return Ok(None);
    }
    for nv in [
        NodeVlan::new(Some(port.node()), host.vlan),
        NodeVlan::any(host.vlan),
    ] {
        if let Some(owner) = read_owner(ctx, &vlan_record_path(&nv))? {
            return Ok(Some(owner));
        }
    }
    Ok(None)
}

// The bridge where a host mapped by `owner` is learned, none if it is not learned.
fn learning_bridge(ctx: &TxContext<'_>, owner: &VtnIdent) -> VtnResult<Option<VnodeId>> {
    match owner {
        VtnIdent::Interface(iface) => {
            let Some(record) = ctx.read::<VInterface>(&iface.data_path())? else {
                return Ok(None);
            };
            if record.enabled && iface.vnode.is_bridge() {
                Ok(Some(iface.vnode.clone()))
            } else {
                Ok(None)
            }
        }
        VtnIdent::VlanMap(map) => Ok(Some(map.bridge.clone())),
        VtnIdent::MacMap(map) => Ok(Some(map.bridge.clone())),
        other => Err(VtnError::Internal(format!("traffic mapped by {other}"))),
    }
}

/// Learn traffic from `mac` on `port` and `vlan`, with source address `ip`.
///
/// Returns the element that maps the traffic, if any.
pub fn learn(
    ctx: &mut TxContext<'_>,
    port: SalPort,
    vlan: VlanId,
    mac: Mac,
    ip: Option<IpAddr>,
) -> VtnResult<Option<VtnIdent>> {
    mac.valid_host()
        .map_err(|e| VtnError::invalid(format!("bad source address: {e}")))?;
    let host = MacVlan::new(mac, vlan);
    let Some(owner) = resolve(ctx, port, &host)? else {
        trace!("No mapping for {host} on {port}");
        return Ok(None);
    };
    if let Some(bridge) = learning_bridge(ctx, &owner)? {
        mactable::learn(ctx, &bridge, mac, PortVlan::new(port, vlan), ip, &owner)?;
    } else {
        debug!("{owner}: not learning {host} on {port}");
    }
    Ok(Some(owner))
}

/// The interface that maps `pv`, if any
pub fn port_map_owner(ctx: &TxContext<'_>, pv: &PortVlan) -> VtnResult<Option<InterfaceId>> {
    match read_owner(ctx, &port_record_path(pv))? {
        Some(VtnIdent::Interface(iface)) => Ok(Some(iface)),
        _ => Ok(None),
    }
}
