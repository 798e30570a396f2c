// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! MAC mapping configuration of virtual bridges

use crate::errors::{VtnError, VtnResult};
use crate::flow::FlowRemovalSpec;
use crate::ident::{MacMapId, VnodeId, VtnIdent};
use crate::mactable::remove::remove_entry;
use crate::mapping::cleaner::VNodeMapCleaner;
use crate::mapping::macmap::{
    claim_acl, displaced_hosts, inactivate_host, release_acl, stale_hosts,
};
use crate::model::{MacMapConfig, VirtualNode};
use crate::task::VtnUpdateType;
use crate::txn::TxContext;
use net::MacVlan;
use tracing::info;

/// Reject an access list with a multicast address, a wildcard in the deny list, or
/// a host both allowed and denied
pub fn validate_acl(config: &MacMapConfig) -> VtnResult<()> {
    for host in config.allowed.iter().chain(&config.denied) {
        if host.mac.is_multicast() {
            return Err(VtnError::invalid(format!("multicast address {host}")));
        }
    }
    if let Some(host) = config.denied.iter().find(|host| host.is_wildcard()) {
        return Err(VtnError::invalid(format!("wildcard {host} in the deny list")));
    }
    if let Some(host) = config.allowed.intersection(&config.denied).next() {
        return Err(VtnError::invalid(format!("{host} is both allowed and denied")));
    }
    Ok(())
}

// Drop a host from a mapping: its learned entry, its status, its flows.
fn evict_host(ctx: &mut TxContext<'_>, id: &MacMapId, host: &MacVlan) -> VtnResult<()> {
    remove_entry(ctx, &id.bridge, &host.mac)?;
    inactivate_host(ctx, id, host)?;
    ctx.remove_flows(FlowRemovalSpec::Host {
        bridge: id.bridge.clone(),
        mac: host.mac,
    });
    Ok(())
}

/// Configure the MAC mapping of `bridge`
pub fn set_mac_map(
    ctx: &mut TxContext<'_>,
    bridge: &VnodeId,
    config: MacMapConfig,
) -> VtnResult<Option<VtnUpdateType>> {
    bridge.check_bridge()?;
    validate_acl(&config)?;
    VtnIdent::from(bridge.clone()).fetch::<VirtualNode>(ctx)?;
    let id = bridge.mac_map();
    let old: Option<MacMapConfig> = ctx.read(&id.data_path())?;
    if old.as_ref() == Some(&config) {
        return Ok(None);
    }

    let previous = old.as_ref().map(|old| old.allowed.clone()).unwrap_or_default();
    release_acl(ctx, &id, previous.difference(&config.allowed))?;
    claim_acl(ctx, &id, &config.allowed)?;
    let added: Vec<MacVlan> = config.allowed.difference(&previous).copied().collect();
    for (other, host) in displaced_hosts(ctx, &id, added)? {
        info!("{host} moves from {other} to {id}");
        evict_host(ctx, &other, &host)?;
    }

    ctx.put(id.data_path(), config.clone())?;
    let update = if old.is_some() {
        for host in stale_hosts(ctx, &id, &config)? {
            evict_host(ctx, &id, &host)?;
        }
        VtnUpdateType::Changed
    } else {
        ctx.create_mac_map_status(&id);
        VtnUpdateType::Created
    };
    ctx.refresh_state(bridge);
    info!("{id} {update}");
    Ok(Some(update))
}

/// Remove the MAC mapping of `bridge`, its hosts and their flows
pub fn remove_mac_map(ctx: &mut TxContext<'_>, bridge: &VnodeId) -> VtnResult<Option<VtnUpdateType>> {
    bridge.check_bridge()?;
    let id = bridge.mac_map();
    let Some(config) = ctx.read::<MacMapConfig>(&id.data_path())? else {
        return Ok(None);
    };
    VNodeMapCleaner::new(id.clone().into()).purge(ctx)?;
    // hosts active without a learned entry
    let active: Vec<MacVlan> = ctx
        .mac_map_status(bridge)?
        .map(|status| status.active.keys().copied().collect())
        .unwrap_or_default();
    for host in active {
        inactivate_host(ctx, &id, &host)?;
    }
    release_acl(ctx, &id, &config.allowed)?;
    ctx.delete(&id.data_path());
    ctx.drop_mac_map_status(&id);
    ctx.refresh_state(bridge);
    info!("{id} removed");
    Ok(Some(VtnUpdateType::Removed))
}
