// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! MAC table aging.
//!
//! A pass clears the `used` flag of the hosts seen since the previous pass and removes
//! the hosts that were not. An idle host thus stays in its table for at least one full
//! aging interval.

use super::remove::remove_entry;
use super::{ScanScope, entry_path, scan};
use crate::errors::VtnResult;
use crate::ident::VnodeId;
use crate::model::MacTableEntry;
use crate::packet::OutPacket;
use crate::txn::TxContext;
use net::ArpProbe;
use std::net::IpAddr;
use tracing::{debug, warn};

/// Outcome of an aging pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AgingStats {
    /// Hosts kept for another interval
    pub refreshed: usize,
    /// Hosts removed
    pub aged_out: usize,
    /// ARP probes queued
    pub probes: usize,
    /// Hosts that could not be processed
    pub failures: usize,
}

// Probe every IPv4 address of a host still in use.
fn probe_host(ctx: &mut TxContext<'_>, entry: &MacTableEntry, stats: &mut AgingStats) {
    let source = ctx.config().controller_mac;
    for ip in &entry.ips {
        let IpAddr::V4(target_ip) = ip else {
            continue;
        };
        let probe = ArpProbe {
            source,
            target: entry.mac,
            target_ip: *target_ip,
            vlan: entry.vlan,
        };
        match probe.to_frame() {
            Ok(frame) => {
                ctx.transmit(OutPacket {
                    port: entry.port,
                    frame,
                });
                stats.probes += 1;
            }
            Err(e) => {
                warn!("Can't probe {target_ip} at {}: {e}", entry.mac);
                stats.failures += 1;
            }
        }
    }
}

fn age_entry(
    ctx: &mut TxContext<'_>,
    bridge: &VnodeId,
    mut entry: MacTableEntry,
    stats: &mut AgingStats,
) -> VtnResult<()> {
    if entry.used {
        entry.used = false;
        if ctx.config().host_tracking {
            probe_host(ctx, &entry, stats);
        }
        ctx.put(entry_path(bridge, &entry.mac), entry)?;
        stats.refreshed += 1;
    } else {
        debug!("{bridge}: host {} on {} aged out", entry.mac, entry.port_vlan());
        remove_entry(ctx, bridge, &entry.mac)?;
        stats.aged_out += 1;
    }
    Ok(())
}

/// Run one aging pass over every MAC address table
pub fn age_mac_tables(ctx: &mut TxContext<'_>) -> VtnResult<AgingStats> {
    let mut stats = AgingStats::default();
    scan(ctx, ScanScope::All, |ctx, bridge, entry| {
        let mac = entry.mac;
        if let Err(e) = age_entry(ctx, bridge, entry, &mut stats) {
            warn!("{bridge}: failed to age host {mac}: {e}");
            stats.failures += 1;
        }
        Ok(())
    })?;
    Ok(stats)
}

#[cfg(test)]
mod test {
    use super::{AgingStats, age_mac_tables};
    use crate::config::{VtnConfig, VtnConfigBuilder};
    use crate::ident::{VnodeId, VtnIdent};
    use crate::mactable::{entry_path, learn};
    use crate::model::{MacTableEntry, Node, VirtualNode};
    use crate::txn::TxContext;
    use net::{Mac, PortVlan, SalNode, VlanId};
    use store::DataStore;

    fn setup(config: &VtnConfig, store: &DataStore<Node>) -> (VnodeId, Mac) {
        let bridge = VnodeId::bridge("t1", "b1").unwrap();
        let mac = Mac([2, 0, 0, 0, 0, 1]);
        let pv = PortVlan::new(SalNode::new(1).port(1).unwrap(), VlanId::new(5).unwrap());
        let mut ctx = TxContext::new(store.begin(), config);
        ctx.put(bridge.data_path(), VirtualNode::default()).unwrap();
        let owner = VtnIdent::Vnode(bridge.clone());
        learn(&mut ctx, &bridge, mac, pv, Some("10.0.0.1".parse().unwrap()), &owner).unwrap();
        learn(&mut ctx, &bridge, mac, pv, Some("2001:db8::1".parse().unwrap()), &owner).unwrap();
        ctx.commit().unwrap();
        (bridge, mac)
    }

    fn age(config: &VtnConfig, store: &DataStore<Node>) -> (AgingStats, usize) {
        let mut ctx = TxContext::new(store.begin(), config);
        let stats = age_mac_tables(&mut ctx).unwrap();
        let effects = ctx.commit().unwrap();
        (stats, effects.packets.len())
    }

    #[test]
    fn two_phase_aging() {
        let config = VtnConfig::default();
        let store = DataStore::new();
        let (bridge, mac) = setup(&config, &store);

        // first pass: kept, flag cleared, one probe for the IPv4 address
        let (stats, packets) = age(&config, &store);
        assert_eq!(
            stats,
            AgingStats {
                refreshed: 1,
                probes: 1,
                ..AgingStats::default()
            }
        );
        assert_eq!(packets, 1);
        let mut ctx = TxContext::new(store.begin(), &config);
        let entry: MacTableEntry = ctx.read(&entry_path(&bridge, &mac)).unwrap().unwrap();
        assert!(!entry.used);
        drop(ctx);

        // second pass: gone
        let (stats, packets) = age(&config, &store);
        assert_eq!(stats.aged_out, 1);
        assert_eq!(packets, 0);
        ctx = TxContext::new(store.begin(), &config);
        assert_eq!(ctx.read::<MacTableEntry>(&entry_path(&bridge, &mac)), Ok(None));
    }

    #[test]
    fn no_probes_without_host_tracking() {
        let config = VtnConfigBuilder::default()
            .host_tracking(false)
            .build()
            .unwrap();
        let store = DataStore::new();
        setup(&config, &store);
        let (stats, packets) = age(&config, &store);
        assert_eq!(stats.refreshed, 1);
        assert_eq!(stats.probes, 0);
        assert_eq!(packets, 0);
    }

    #[test]
    fn aborted_pass_sends_nothing() {
        let config = VtnConfig::default();
        let store = DataStore::new();
        let (bridge, mac) = setup(&config, &store);
        {
            let mut ctx = TxContext::new(store.begin(), &config);
            age_mac_tables(&mut ctx).unwrap();
        }
        let ctx = TxContext::new(store.begin(), &config);
        let entry: MacTableEntry = ctx.read(&entry_path(&bridge, &mac)).unwrap().unwrap();
        assert!(entry.used);
    }
}
