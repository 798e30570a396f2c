// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! VLAN mappings: a VLAN on a switch, or on every switch, mapped to a virtual bridge

use super::cleaner::MapCleanup;
use super::{read_owner, release, vlan_record_path, write_owner};
use crate::errors::{VtnError, VtnResult};
use crate::ident::{VlanMapId, VtnIdent};
use crate::txn::TxContext;
use net::NodeVlan;
use tracing::debug;

/// Register the VLAN mapping `id`.
///
/// Fails with `Conflict` if anything maps the same node (or wildcard) and VLAN. A
/// mapping for a specific node takes that node over from a wildcard mapping of the
/// same VLAN: with `purge`, the hosts and flows of the wildcard mapping on that node
/// are removed.
pub fn register_vlan_map(ctx: &mut TxContext<'_>, id: &VlanMapId, purge: bool) -> VtnResult<()> {
    let nv = id.node_vlan;
    let record = vlan_record_path(&nv);
    if let Some(owner) = read_owner(ctx, &record)? {
        return Err(VtnError::Conflict(format!("{nv} is already mapped by {owner}")));
    }
    write_owner(ctx, record, &id.clone().into())?;
    debug!("{id}: mapped {nv}");

    let mut cleanup = MapCleanup::new();
    if purge
        && !nv.is_wildcard()
        && let Some(wildcard) = read_owner(ctx, &vlan_record_path(&NodeVlan::any(nv.vlan)))?
    {
        cleanup.add_vlan(wildcard.tenant(), nv);
    }
    cleanup.clean_up(ctx)
}

/// Unregister the VLAN mapping `id`.
///
/// With `purge`, the hosts and flows it mapped are removed.
pub fn unregister_vlan_map(ctx: &mut TxContext<'_>, id: &VlanMapId, purge: bool) -> VtnResult<()> {
    let nv = id.node_vlan;
    if release(ctx, &vlan_record_path(&nv), &VtnIdent::from(id.clone()))? {
        debug!("{id}: unmapped {nv}");
    }
    if purge {
        let mut cleanup = MapCleanup::new();
        cleanup.add_vlan(&id.bridge.tenant, nv);
        cleanup.clean_up(ctx)?;
    }
    Ok(())
}
