// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! MAC address tables of the virtual bridges: traversal, learning, aging and removal

pub mod aging;
pub mod remove;

use crate::errors::VtnResult;
use crate::ident::{VTNS, VirtualNodeKind, VnodeId, VnodeName, VtnIdent};
use crate::model::{MacTableEntry, VirtualNode};
use crate::txn::TxContext;
use net::{Mac, PortVlan};
use std::net::IpAddr;
use store::DataPath;
use tracing::debug;

use tracectl::trace_target;
trace_target!("mactable", LevelFilter::INFO, &["vtn"]);

/// Which MAC address tables a scan visits
#[derive(Clone, Copy, Debug)]
pub enum ScanScope<'a> {
    All,
    Tenant(&'a VnodeName),
    Bridge(&'a VnodeId),
}

fn bridges_in(ctx: &TxContext<'_>, scope: ScanScope<'_>) -> VtnResult<Vec<VnodeId>> {
    let prefix = match scope {
        ScanScope::Bridge(bridge) => return Ok(vec![bridge.clone()]),
        ScanScope::Tenant(tenant) => DataPath::new([VTNS, tenant.as_str()]),
        ScanScope::All => DataPath::new([VTNS]),
    };
    // tenant/kind/name
    let depth = 4;
    Ok(ctx
        .scan::<VirtualNode>(&prefix, depth)?
        .into_iter()
        .filter_map(|(path, _)| VnodeId::from_data_path(&path))
        .filter(|id| id.kind == VirtualNodeKind::Bridge)
        .collect())
}

pub(crate) fn entry_path(bridge: &VnodeId, mac: &Mac) -> DataPath {
    bridge.mac_table_path().child(mac.to_string())
}

/// Visit every learned host in `scope`, bridge by bridge, in MAC address order.
///
/// The entries of a bridge are read before they are visited, so `found` may update or
/// delete them. Missing tenants, bridges or tables hold no entries.
pub fn scan<'s, F>(ctx: &mut TxContext<'s>, scope: ScanScope<'_>, mut found: F) -> VtnResult<usize>
where
    F: FnMut(&mut TxContext<'s>, &VnodeId, MacTableEntry) -> VtnResult<()>,
{
    let mut visited = 0;
    for bridge in bridges_in(ctx, scope)? {
        let entries = ctx.children::<MacTableEntry>(&bridge.mac_table_path())?;
        for (_, entry) in entries {
            found(ctx, &bridge, entry)?;
            visited += 1;
        }
    }
    Ok(visited)
}

/// Record traffic from a host in the MAC address table of `bridge`
pub(crate) fn learn(
    ctx: &mut TxContext<'_>,
    bridge: &VnodeId,
    host: Mac,
    pv: PortVlan,
    ip: Option<IpAddr>,
    owner: &VtnIdent,
) -> VtnResult<()> {
    let path = entry_path(bridge, &host);
    let entry = match ctx.read::<MacTableEntry>(&path)? {
        Some(mut entry) if entry.port_vlan() == pv => {
            entry.used = true;
            entry.owner = owner.to_string();
            entry.ips.extend(ip);
            entry
        }
        previous => {
            if let Some(previous) = previous {
                debug!("{bridge}: host {host} moved from {} to {pv}", previous.port_vlan());
            } else {
                debug!("{bridge}: learned host {host} on {pv}");
            }
            MacTableEntry {
                mac: host,
                vlan: pv.vlan,
                port: pv.port,
                ips: ip.into_iter().collect(),
                used: true,
                owner: owner.to_string(),
            }
        }
    };
    ctx.put(path, entry)
}
