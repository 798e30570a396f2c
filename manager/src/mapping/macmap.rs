// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! MAC mappings: ACL ownership and host activation.
//!
//! The allowed keys of a MAC mapping are claimed in the MAC mapping table. A host
//! admitted by a mapping becomes active when seen on a port, which claims the port
//! mapping record of that port and VLAN for the mapping. A port mapping always takes
//! precedence: it inactivates the hosts of the MAC mapping on its port and VLAN.

use super::{mac_record_path, port_record_path, read_owner, release, write_owner};
use crate::errors::{VtnError, VtnResult};
use crate::ident::{MacMapId, VtnIdent};
use crate::model::MacMapConfig;
use crate::txn::TxContext;
use net::{MacVlan, PortVlan, SalPort};
use std::collections::BTreeSet;
use tracing::debug;

/// Claim the allowed keys of a MAC mapping
pub(crate) fn claim_acl<'a>(
    ctx: &mut TxContext<'_>,
    id: &MacMapId,
    allowed: impl IntoIterator<Item = &'a MacVlan>,
) -> VtnResult<()> {
    let me = VtnIdent::from(id.clone());
    for key in allowed {
        let path = mac_record_path(key);
        match read_owner(ctx, &path)? {
            Some(owner) if owner == me => {}
            Some(owner) => {
                return Err(VtnError::Conflict(format!(
                    "{key} is already mapped by {owner}"
                )));
            }
            None => write_owner(ctx, path, &me)?,
        }
    }
    Ok(())
}

/// Give up allowed keys of a MAC mapping
pub(crate) fn release_acl<'a>(
    ctx: &mut TxContext<'_>,
    id: &MacMapId,
    allowed: impl IntoIterator<Item = &'a MacVlan>,
) -> VtnResult<()> {
    let me = VtnIdent::from(id.clone());
    for key in allowed {
        release(ctx, &mac_record_path(key), &me)?;
    }
    Ok(())
}

fn as_mac_map(owner: VtnIdent) -> VtnResult<MacMapId> {
    match owner {
        VtnIdent::MacMap(id) => Ok(id),
        other => Err(VtnError::Internal(format!(
            "MAC mapping key owned by {other}"
        ))),
    }
}

/// The MAC mapping that admits `host`, if any.
///
/// An exact allow entry wins over a wildcard one. A wildcard entry does not admit a
/// host denied by its mapping.
pub(crate) fn find_acl_owner(ctx: &TxContext<'_>, host: &MacVlan) -> VtnResult<Option<MacMapId>> {
    if let Some(owner) = read_owner(ctx, &mac_record_path(host))? {
        return as_mac_map(owner).map(Some);
    }
    let Some(owner) = read_owner(ctx, &mac_record_path(&MacVlan::any(host.vlan)))? else {
        return Ok(None);
    };
    let id = as_mac_map(owner)?;
    let config: MacMapConfig = ctx.fetch(&id.data_path(), &id)?;
    if config.denied.contains(host) {
        Ok(None)
    } else {
        Ok(Some(id))
    }
}

// Release the port record of `pv` once no active host of the mapping uses it.
fn release_unused_port(ctx: &mut TxContext<'_>, id: &MacMapId, pv: &PortVlan) -> VtnResult<()> {
    let used = ctx
        .mac_map_status(&id.bridge)?
        .is_some_and(|status| status.uses(pv));
    if !used {
        release(ctx, &port_record_path(pv), &id.clone().into())?;
    }
    Ok(())
}

/// Activate `host`, seen on `port`, in the MAC mapping `id`.
///
/// Returns false if the port and VLAN of the host are mapped by something else.
pub(crate) fn activate_host(
    ctx: &mut TxContext<'_>,
    id: &MacMapId,
    host: &MacVlan,
    port: SalPort,
) -> VtnResult<bool> {
    let pv = PortVlan::new(port, host.vlan);
    let me = VtnIdent::from(id.clone());
    let record = port_record_path(&pv);
    match read_owner(ctx, &record)? {
        None => write_owner(ctx, record, &me)?,
        Some(owner) if owner == me => {}
        Some(owner) => {
            debug!("{id}: can't activate {host}, {pv} is mapped by {owner}");
            return Ok(false);
        }
    }

    let (previous, was_idle) = ctx
        .update_mac_map_status(&id.bridge, |status| {
            let was_idle = status.active.is_empty();
            (status.active.insert(*host, port), was_idle)
        })?
        .ok_or_else(|| VtnError::Internal(format!("{id} has no status")))?;
    match previous {
        Some(old) if old != port => {
            debug!("{id}: host {host} moved from {old} to {port}");
            release_unused_port(ctx, id, &PortVlan::new(old, host.vlan))?;
        }
        Some(_) => {}
        None => debug!("{id}: activated host {host} on {port}"),
    }
    if was_idle {
        ctx.refresh_state(&id.bridge);
    }
    Ok(true)
}

/// Inactivate `host` in the MAC mapping `id`, returning the port it was active on
pub(crate) fn inactivate_host(
    ctx: &mut TxContext<'_>,
    id: &MacMapId,
    host: &MacVlan,
) -> VtnResult<Option<SalPort>> {
    let removed = ctx
        .update_mac_map_status(&id.bridge, |status| {
            status
                .active
                .remove(host)
                .map(|port| (port, status.active.is_empty()))
        })?
        .flatten();
    let Some((port, idle)) = removed else {
        return Ok(None);
    };
    debug!("{id}: inactivated host {host} on {port}");
    release_unused_port(ctx, id, &PortVlan::new(port, host.vlan))?;
    if idle {
        ctx.refresh_state(&id.bridge);
    }
    Ok(Some(port))
}

/// Inactivate every host of the MAC mapping `id` active on `pv`.
///
/// With `release_record`, the port record owned by the mapping is deleted. Otherwise the
/// caller is about to take the record over.
pub(crate) fn inactivate_port_vlan(
    ctx: &mut TxContext<'_>,
    id: &MacMapId,
    pv: &PortVlan,
    release_record: bool,
) -> VtnResult<Vec<MacVlan>> {
    let (hosts, idle) = ctx
        .update_mac_map_status(&id.bridge, |status| {
            let hosts: Vec<MacVlan> = status
                .active
                .iter()
                .filter(|(host, port)| host.vlan == pv.vlan && **port == pv.port)
                .map(|(host, _)| *host)
                .collect();
            for host in &hosts {
                status.active.remove(host);
            }
            (hosts, status.active.is_empty())
        })?
        .unwrap_or_default();
    if hosts.is_empty() {
        return Ok(hosts);
    }
    debug!("{id}: inactivated {} hosts on {pv}", hosts.len());
    if release_record {
        release(ctx, &port_record_path(pv), &id.clone().into())?;
    }
    if idle {
        ctx.refresh_state(&id.bridge);
    }
    Ok(hosts)
}

/// The active hosts of `id` that `config` no longer maps to it
pub(crate) fn stale_hosts(
    ctx: &mut TxContext<'_>,
    id: &MacMapId,
    config: &MacMapConfig,
) -> VtnResult<BTreeSet<MacVlan>> {
    let active: Vec<MacVlan> = ctx
        .mac_map_status(&id.bridge)?
        .map(|status| status.active.keys().copied().collect())
        .unwrap_or_default();
    let mut stale = BTreeSet::new();
    for host in active {
        if !config.admits(&host) || find_acl_owner(ctx, &host)?.as_ref() != Some(id) {
            stale.insert(host);
        }
    }
    Ok(stale)
}

/// Hosts active in another mapping through a wildcard entry, that the exact entries
/// `added` to `id` take over
pub(crate) fn displaced_hosts(
    ctx: &mut TxContext<'_>,
    id: &MacMapId,
    added: impl IntoIterator<Item = MacVlan>,
) -> VtnResult<Vec<(MacMapId, MacVlan)>> {
    let mut displaced = Vec::new();
    for host in added.into_iter().filter(|host| !host.is_wildcard()) {
        let Some(owner) = read_owner(ctx, &mac_record_path(&MacVlan::any(host.vlan)))? else {
            continue;
        };
        let other = as_mac_map(owner)?;
        if &other == id {
            continue;
        }
        let active = ctx
            .mac_map_status(&other.bridge)?
            .is_some_and(|status| status.active.contains_key(&host));
        if active {
            displaced.push((other, host));
        }
    }
    Ok(displaced)
}

#[cfg(test)]
mod test {
    use super::{activate_host, claim_acl, find_acl_owner, inactivate_host, inactivate_port_vlan};
    use crate::config::VtnConfig;
    use crate::errors::VtnError;
    use crate::ident::{MacMapId, VnodeId, VtnIdent};
    use crate::mapping::{port_record_path, read_owner};
    use crate::model::{MacMapConfig, Node, VirtualNode};
    use crate::txn::TxContext;
    use net::{Mac, MacVlan, PortVlan, SalNode, SalPort, VlanId};
    use std::collections::BTreeSet;
    use store::DataStore;

    fn host(last: u8, vlan: u16) -> MacVlan {
        MacVlan::new(Mac([2, 0, 0, 0, 0, last]), VlanId::new(vlan).unwrap())
    }

    fn port(n: u32) -> SalPort {
        SalNode::new(1).port(n).unwrap()
    }

    fn mac_map(ctx: &mut TxContext<'_>, bridge: &str, config: MacMapConfig) -> MacMapId {
        let id = VnodeId::bridge("t1", bridge).unwrap().mac_map();
        ctx.put(id.bridge.data_path(), VirtualNode::default()).unwrap();
        claim_acl(ctx, &id, &config.allowed).unwrap();
        ctx.put(id.data_path(), config).unwrap();
        ctx.create_mac_map_status(&id);
        id
    }

    #[test]
    fn acl_ownership() {
        let store = DataStore::<Node>::new();
        let config = VtnConfig::default();
        let mut ctx = TxContext::new(store.begin(), &config);
        let h1 = host(1, 5);
        let h2 = host(2, 5);
        let m1 = mac_map(
            &mut ctx,
            "b1",
            MacMapConfig {
                allowed: BTreeSet::from([h1]),
                denied: BTreeSet::new(),
            },
        );
        let m2 = mac_map(
            &mut ctx,
            "b2",
            MacMapConfig {
                allowed: BTreeSet::from([MacVlan::any(h1.vlan)]),
                denied: BTreeSet::from([h2]),
            },
        );
        assert!(matches!(
            claim_acl(&mut ctx, &m2, &[h1]),
            Err(VtnError::Conflict(_))
        ));
        assert_eq!(find_acl_owner(&ctx, &h1), Ok(Some(m1)));
        assert_eq!(find_acl_owner(&ctx, &h2), Ok(None));
        assert_eq!(find_acl_owner(&ctx, &host(3, 5)), Ok(Some(m2)));
        assert_eq!(find_acl_owner(&ctx, &host(3, 6)), Ok(None));
    }

    #[test]
    fn activation_claims_and_releases_port_records() {
        let store = DataStore::<Node>::new();
        let config = VtnConfig::default();
        let mut ctx = TxContext::new(store.begin(), &config);
        let h1 = host(1, 5);
        let h2 = host(2, 5);
        let id = mac_map(
            &mut ctx,
            "b1",
            MacMapConfig {
                allowed: BTreeSet::from([MacVlan::any(h1.vlan)]),
                denied: BTreeSet::new(),
            },
        );
        let me = VtnIdent::from(id.clone());
        let pv1 = PortVlan::new(port(1), h1.vlan);
        let pv2 = PortVlan::new(port(2), h1.vlan);

        assert_eq!(activate_host(&mut ctx, &id, &h1, port(1)), Ok(true));
        assert_eq!(activate_host(&mut ctx, &id, &h2, port(1)), Ok(true));
        assert_eq!(read_owner(&ctx, &port_record_path(&pv1)), Ok(Some(me.clone())));

        // h1 moves, h2 still holds the record of port 1
        assert_eq!(activate_host(&mut ctx, &id, &h1, port(2)), Ok(true));
        assert_eq!(read_owner(&ctx, &port_record_path(&pv1)), Ok(Some(me.clone())));
        assert_eq!(read_owner(&ctx, &port_record_path(&pv2)), Ok(Some(me)));

        assert_eq!(inactivate_host(&mut ctx, &id, &h2), Ok(Some(port(1))));
        assert_eq!(read_owner(&ctx, &port_record_path(&pv1)), Ok(None));
        assert_eq!(inactivate_host(&mut ctx, &id, &h2), Ok(None));

        assert_eq!(inactivate_port_vlan(&mut ctx, &id, &pv2, true), Ok(vec![h1]));
        assert_eq!(read_owner(&ctx, &port_record_path(&pv2)), Ok(None));
        assert!(ctx.mac_map_status(&id.bridge).unwrap().unwrap().active.is_empty());
    }

    #[test]
    fn no_activation_on_a_port_mapped_port() {
        let store = DataStore::<Node>::new();
        let config = VtnConfig::default();
        let mut ctx = TxContext::new(store.begin(), &config);
        let h1 = host(1, 5);
        let id = mac_map(
            &mut ctx,
            "b1",
            MacMapConfig {
                allowed: BTreeSet::from([h1]),
                denied: BTreeSet::new(),
            },
        );
        let iface = id.bridge.interface("if1".parse().unwrap());
        let pv = PortVlan::new(port(1), h1.vlan);
        crate::mapping::write_owner(&mut ctx, port_record_path(&pv), &iface.into()).unwrap();
        assert_eq!(activate_host(&mut ctx, &id, &h1, port(1)), Ok(false));
        assert!(ctx.mac_map_status(&id.bridge).unwrap().unwrap().active.is_empty());
    }
}
