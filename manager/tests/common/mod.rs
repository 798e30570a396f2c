// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![allow(dead_code)]

use net::{Mac, MacVlan, PortVlan, SalNode, SalPort, VlanId};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use vtn_manager::flow::{FlowRemovalJob, FlowRemovalQueue, FlowRemovalSpec};
use vtn_manager::ident::TenantId;
use vtn_manager::model::{MacMapStatus, Node};
use vtn_manager::packet::{OutPacket, PacketQueue};
use vtn_manager::{InterfaceId, VnodeId, VnodeName, VtnConfig, VtnManager};

/// A manager wired to queues that the test drains
pub struct Fabric {
    pub manager: Arc<VtnManager>,
    flows: UnboundedReceiver<FlowRemovalJob>,
    packets: UnboundedReceiver<OutPacket>,
}

impl Fabric {
    pub fn new() -> Self {
        Self::with_config(VtnConfig::default())
    }

    pub fn with_config(config: VtnConfig) -> Self {
        let (flow_queue, flows) = FlowRemovalQueue::new();
        let (packet_queue, packets) = PacketQueue::new();
        let manager = VtnManager::new(config, Arc::new(flow_queue), Arc::new(packet_queue))
            .unwrap_or_else(|e| panic!("bad configuration: {e}"));
        Self {
            manager: Arc::new(manager),
            flows,
            packets,
        }
    }

    pub fn tenant(&self, name: &str) -> TenantId {
        let tenant = TenantId::new(name).unwrap();
        self.manager.create_tenant(&tenant, None).unwrap();
        tenant
    }

    pub fn bridge(&self, tenant: &str, name: &str) -> VnodeId {
        let bridge = VnodeId::bridge(tenant, name).unwrap();
        self.manager.create_vnode(&bridge, None).unwrap();
        bridge
    }

    pub fn interface(&self, vnode: &VnodeId, name: &str) -> InterfaceId {
        let iface = vnode.interface(VnodeName::new(name).unwrap());
        self.manager.create_interface(&iface, true).unwrap();
        iface
    }

    /// Every flow removal submitted since the last call, in submission order
    pub fn flow_removals(&mut self) -> Vec<FlowRemovalSpec> {
        let mut specs = Vec::new();
        while let Ok(job) = self.flows.try_recv() {
            specs.extend(job.specs);
        }
        specs
    }

    /// Every packet sent since the last call
    pub fn packets(&mut self) -> Vec<OutPacket> {
        let mut packets = Vec::new();
        while let Ok(packet) = self.packets.try_recv() {
            packets.push(packet);
        }
        packets
    }

    /// The committed status of the MAC mapping of `bridge`
    pub fn mac_map_status(&self, bridge: &VnodeId) -> Option<MacMapStatus> {
        match self.manager.reader().read(&bridge.mac_map().status_path()).unwrap() {
            Some(Node::MacMapStatus(status)) => Some(status),
            None => None,
            Some(other) => panic!("not a MAC mapping status: {other:?}"),
        }
    }

    /// The MAC addresses learned by `bridge`
    pub fn learned(&self, bridge: &VnodeId) -> Vec<Mac> {
        self.manager
            .mac_entries(bridge)
            .unwrap()
            .into_iter()
            .map(|entry| entry.mac)
            .collect()
    }
}

pub fn port(dpid: u64, number: u32) -> SalPort {
    SalNode::new(dpid).port(number).unwrap()
}

pub fn vlan(vid: u16) -> VlanId {
    VlanId::new(vid).unwrap()
}

pub fn port_vlan(dpid: u64, number: u32, vid: u16) -> PortVlan {
    PortVlan::new(port(dpid, number), vlan(vid))
}

/// A locally administered unicast address
pub fn mac(last: u8) -> Mac {
    Mac([0x02, 0, 0, 0, 0, last])
}

pub fn host(last: u8, vid: u16) -> MacVlan {
    MacVlan::new(mac(last), vlan(vid))
}
