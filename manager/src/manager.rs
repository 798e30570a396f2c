// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The VTN manager: runs every operation as a task in its own transaction and hands
//! the side effects of committed transactions to the flow remover and packet sender.

use crate::config::{ConfigError, VtnConfig};
use crate::errors::{VtnError, VtnResult};
use crate::flow::FlowRemover;
use crate::ident::{InterfaceId, TenantId, VnodeId, VtnIdent};
use crate::mactable::aging::{AgingStats, age_mac_tables};
use crate::mapping::resolve;
use crate::model::{MacMapConfig, MacTableEntry, Node, StoreRecord, VirtualNode, VnodeState};
use crate::ops;
use crate::packet::PacketSender;
use crate::task::{FnTask, TxTask, VtnUpdateType};
use crate::txn::{TxContext, TxEffects};
use net::{Mac, NodeVlan, PortVlan, SalPort, VlanId};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use store::{DataStore, StoreReader};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub struct VtnManager {
    store: DataStore<Node>,
    config: VtnConfig,
    flow_remover: Arc<dyn FlowRemover>,
    packet_sender: Arc<dyn PacketSender>,
}

impl VtnManager {
    pub fn new(
        config: VtnConfig,
        flow_remover: Arc<dyn FlowRemover>,
        packet_sender: Arc<dyn PacketSender>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        info!("Starting VTN manager with {config}");
        Ok(Self {
            store: DataStore::new(),
            config,
            flow_remover,
            packet_sender,
        })
    }

    #[must_use]
    pub fn config(&self) -> &VtnConfig {
        &self.config
    }

    /// A reader of the committed state
    #[must_use]
    pub fn reader(&self) -> StoreReader<Node> {
        self.store.reader()
    }

    /// Read the committed record of a virtual element
    pub fn read<R: StoreRecord>(&self, ident: &VtnIdent) -> VtnResult<Option<R>> {
        let path = ident.data_path();
        match self.store.reader().read(&path)? {
            None => Ok(None),
            Some(node) => R::from_node(node)
                .map(Some)
                .ok_or_else(|| VtnError::Internal(format!("{path} is not a {}", R::KIND))),
        }
    }

    fn dispatch(&self, effects: TxEffects) {
        if !effects.flow_removals.is_empty() {
            let handle = self.flow_remover.remove_flows(effects.flow_removals);
            debug!("Submitted flow removal {}", handle.0);
        }
        for packet in effects.packets {
            self.packet_sender.transmit(packet);
        }
    }

    /// Run `task` in a transaction. The transaction is committed if the task succeeds,
    /// and discarded with its side effects otherwise.
    pub fn run<T: TxTask>(&self, mut task: T) -> VtnResult<T::Output> {
        let mut ctx = TxContext::new(self.store.begin(), &self.config);
        let output = match task.execute(&mut ctx) {
            Ok(output) => output,
            Err(e) => {
                debug!("{} failed: {e}", task.name());
                return Err(e);
            }
        };
        let effects = ctx.commit()?;
        self.dispatch(effects);
        task.on_success(self.flow_remover.as_ref(), &output);
        Ok(output)
    }

    fn transact<T>(
        &self,
        name: &'static str,
        run: impl FnMut(&mut TxContext<'_>) -> VtnResult<T>,
    ) -> VtnResult<T> {
        self.run(FnTask::new(name, run))
    }

    pub fn create_tenant(&self, tenant: &TenantId, desc: Option<String>) -> VtnResult<()> {
        self.transact("create-tenant", |ctx| {
            ops::vnode::create_tenant(ctx, tenant, desc.clone())
        })
    }

    pub fn remove_tenant(&self, tenant: &TenantId) -> VtnResult<()> {
        self.transact("remove-tenant", |ctx| ops::vnode::remove_tenant(ctx, tenant))
    }

    pub fn create_vnode(&self, vnode: &VnodeId, desc: Option<String>) -> VtnResult<()> {
        self.transact("create-vnode", |ctx| {
            ops::vnode::create_vnode(ctx, vnode, desc.clone())
        })
    }

    pub fn remove_vnode(&self, vnode: &VnodeId) -> VtnResult<()> {
        self.transact("remove-vnode", |ctx| ops::vnode::remove_vnode(ctx, vnode))
    }

    pub fn create_interface(&self, iface: &InterfaceId, enabled: bool) -> VtnResult<()> {
        self.transact("create-interface", |ctx| {
            ops::vnode::create_interface(ctx, iface, enabled, None)
        })
    }

    pub fn remove_interface(&self, iface: &InterfaceId) -> VtnResult<()> {
        self.transact("remove-interface", |ctx| {
            ops::vnode::remove_interface(ctx, iface)
        })
    }

    pub fn set_interface_enabled(
        &self,
        iface: &InterfaceId,
        enabled: bool,
    ) -> VtnResult<Option<VtnUpdateType>> {
        self.transact("set-interface-enabled", |ctx| {
            ops::vnode::set_interface_enabled(ctx, iface, enabled)
        })
    }

    pub fn set_port_map(
        &self,
        iface: &InterfaceId,
        pv: PortVlan,
        purge: bool,
    ) -> VtnResult<Option<VtnUpdateType>> {
        self.transact("set-port-map", |ctx| {
            ops::portmap::set_port_map(ctx, iface, pv, purge)
        })
    }

    pub fn remove_port_map(
        &self,
        iface: &InterfaceId,
        purge: bool,
    ) -> VtnResult<Option<VtnUpdateType>> {
        self.transact("remove-port-map", |ctx| {
            ops::portmap::remove_port_map(ctx, iface, purge)
        })
    }

    /// Add VLAN mappings to a bridge. One result per mapping, in order.
    pub fn add_vlan_maps(
        &self,
        bridge: &VnodeId,
        maps: Vec<NodeVlan>,
        purge: bool,
    ) -> VtnResult<Vec<Option<VtnUpdateType>>> {
        self.run(ops::vlanmap::add_vlan_maps(bridge.clone(), maps, purge)?)
    }

    /// Remove VLAN mappings from a bridge. One result per mapping, in order.
    pub fn remove_vlan_maps(
        &self,
        bridge: &VnodeId,
        maps: Vec<NodeVlan>,
        purge: bool,
    ) -> VtnResult<Vec<Option<VtnUpdateType>>> {
        self.run(ops::vlanmap::remove_vlan_maps(bridge.clone(), maps, purge)?)
    }

    pub fn set_mac_map(
        &self,
        bridge: &VnodeId,
        config: &MacMapConfig,
    ) -> VtnResult<Option<VtnUpdateType>> {
        self.transact("set-mac-map", |ctx| {
            ops::macmap::set_mac_map(ctx, bridge, config.clone())
        })
    }

    pub fn remove_mac_map(&self, bridge: &VnodeId) -> VtnResult<Option<VtnUpdateType>> {
        self.transact("remove-mac-map", |ctx| {
            ops::macmap::remove_mac_map(ctx, bridge)
        })
    }

    /// Learn traffic from a host. Returns the element that maps it, if any.
    pub fn learn(
        &self,
        port: SalPort,
        vlan: VlanId,
        mac: Mac,
        ip: Option<IpAddr>,
    ) -> VtnResult<Option<VtnIdent>> {
        self.transact("learn", |ctx| resolve::learn(ctx, port, vlan, mac, ip))
    }

    /// The learned hosts of `bridge`, in MAC address order
    pub fn mac_entries(&self, bridge: &VnodeId) -> VtnResult<Vec<MacTableEntry>> {
        bridge.check_bridge()?;
        let ident = VtnIdent::from(bridge.clone());
        self.read::<VirtualNode>(&ident)?
            .ok_or_else(|| VtnError::NotFound(ident.to_string()))?;
        let entries = self.store.reader().scan(&bridge.mac_table_path())?;
        Ok(entries
            .into_iter()
            .filter_map(|(_, node)| MacTableEntry::from_node(node))
            .collect())
    }

    /// Remove learned hosts from a bridge. One result per address, in order.
    pub fn remove_mac_entries(
        &self,
        bridge: &VnodeId,
        macs: Vec<Mac>,
    ) -> VtnResult<Vec<Option<VtnUpdateType>>> {
        self.run(ops::mactable::remove_mac_entries(bridge.clone(), macs)?)
    }

    pub fn clear_mac_table(&self, bridge: &VnodeId) -> VtnResult<usize> {
        self.transact("clear-mac-table", |ctx| {
            ops::mactable::clear_mac_table(ctx, bridge)
        })
    }

    /// Run one aging pass over every MAC address table
    pub fn age_mac_tables(&self) -> VtnResult<AgingStats> {
        let stats = self.transact("age-mac-tables", age_mac_tables)?;
        debug!("MAC table aging: {stats:?}");
        Ok(stats)
    }

    pub fn put_switch_port(&self, port: SalPort, enabled: bool) -> VtnResult<()> {
        self.transact("put-switch-port", |ctx| {
            ops::inventory::put_switch_port(ctx, port, enabled)
        })
    }

    pub fn remove_switch_port(&self, port: SalPort) -> VtnResult<()> {
        self.transact("remove-switch-port", |ctx| {
            ops::inventory::remove_switch_port(ctx, port)
        })
    }

    /// The committed state of a virtual node
    pub fn vnode_state(&self, vnode: &VnodeId) -> VtnResult<VnodeState> {
        let ident = VtnIdent::from(vnode.clone());
        let record: VirtualNode = self
            .read(&ident)?
            .ok_or_else(|| VtnError::NotFound(ident.to_string()))?;
        Ok(record.state)
    }

    #[tracing::instrument(level = "info", skip(self))]
    async fn age_periodically(self: Arc<Self>, period: Duration) {
        let mut ticks = tokio::time::interval(period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticks.tick().await;
        loop {
            ticks.tick().await;
            if let Err(e) = self.age_mac_tables() {
                warn!("MAC table aging failed: {e}");
            }
        }
    }

    /// Spawn a task running an aging pass every configured aging interval
    pub fn spawn_mac_aging(self: &Arc<Self>) -> JoinHandle<()> {
        let period = Duration::from_secs(u64::from(self.config.age_interval));
        info!("MAC table aging every {}s", period.as_secs());
        tokio::spawn(Arc::clone(self).age_periodically(period))
    }
}

#[cfg(test)]
mod test {
    use super::VtnManager;
    use crate::config::VtnConfigBuilder;
    use crate::errors::VtnError;
    use crate::flow::FlowRemovalQueue;
    use crate::ident::{TenantId, VnodeId};
    use crate::packet::PacketQueue;
    use net::{Mac, NodeVlan, SalNode, VlanId};
    use std::sync::Arc;
    use std::time::Duration;
    use tracing_test::traced_test;

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn periodic_aging() {
        let config = VtnConfigBuilder::default().age_interval(10).build().unwrap();
        let (flows, _flow_rx) = FlowRemovalQueue::new();
        let (packets, mut packet_rx) = PacketQueue::new();
        let manager =
            Arc::new(VtnManager::new(config, Arc::new(flows), Arc::new(packets)).unwrap());

        let bridge = VnodeId::bridge("t1", "b1").unwrap();
        let vlan = VlanId::new(5).unwrap();
        let port = SalNode::new(1).port(1).unwrap();
        let mac = Mac([2, 0, 0, 0, 0, 1]);
        manager.create_tenant(&TenantId::new("t1").unwrap(), None).unwrap();
        manager.create_vnode(&bridge, None).unwrap();
        manager
            .add_vlan_maps(&bridge, vec![NodeVlan::any(vlan)], false)
            .unwrap();
        manager
            .learn(port, vlan, mac, Some("10.0.0.1".parse().unwrap()))
            .unwrap();

        let aging = manager.spawn_mac_aging();

        // one pass: the host is kept and sent an ARP request
        tokio::time::sleep(Duration::from_secs(15)).await;
        let entries = manager.mac_entries(&bridge).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].used);
        assert_eq!(packet_rx.try_recv().map(|packet| packet.port), Ok(port));

        // idle for a full interval
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(manager.mac_entries(&bridge).unwrap().is_empty());
        assert!(packet_rx.try_recv().is_err());

        aging.abort();
        assert!(logs_contain("MAC table aging every 10s"));
    }

    #[test]
    fn mac_entries_while_writing() {
        let (flows, _flow_rx) = FlowRemovalQueue::new();
        let (packets, _packet_rx) = PacketQueue::new();
        let manager = VtnManager::new(
            VtnConfigBuilder::default().build().unwrap(),
            Arc::new(flows),
            Arc::new(packets),
        )
        .unwrap();

        let bridge = VnodeId::bridge("t1", "b1").unwrap();
        let vlan = VlanId::new(5).unwrap();
        manager.create_tenant(&TenantId::new("t1").unwrap(), None).unwrap();
        manager.create_vnode(&bridge, None).unwrap();
        manager
            .add_vlan_maps(&bridge, vec![NodeVlan::any(vlan)], false)
            .unwrap();
        for last in [3, 1, 2] {
            let port = SalNode::new(1).port(u32::from(last)).unwrap();
            manager.learn(port, vlan, Mac([2, 0, 0, 0, 0, last]), None).unwrap();
        }

        // reads don't wait for the writer
        let txn = manager.store.begin();
        let macs: Vec<_> = manager
            .mac_entries(&bridge)
            .unwrap()
            .into_iter()
            .map(|entry| entry.mac)
            .collect();
        assert_eq!(
            macs,
            [1, 2, 3].map(|last| Mac([2, 0, 0, 0, 0, last])).to_vec()
        );
        assert!(matches!(
            manager.mac_entries(&VnodeId::bridge("t1", "b2").unwrap()),
            Err(VtnError::NotFound(_))
        ));
        assert!(matches!(
            manager.mac_entries(&VnodeId::terminal("t1", "b1").unwrap()),
            Err(VtnError::InvalidArgument(_))
        ));
        drop(txn);
    }
}
