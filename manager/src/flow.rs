// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Requests to remove the flow entries made stale by mapping changes

use crate::ident::{VnodeId, VnodeName, VtnIdent};
use net::{Mac, SalNode, SalPort, VlanId};
use std::collections::BTreeSet;
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// The flows to remove
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlowRemovalSpec {
    /// Every flow of a tenant
    Tenant(VnodeName),
    /// Every flow that goes through a virtual element
    VirtualNode(VtnIdent),
    /// The flows of a tenant that enter or leave through a port, on a VLAN
    EdgePort {
        tenant: VnodeName,
        port: SalPort,
        vlan: VlanId,
    },
    /// The flows of a tenant on a VLAN at the edge of a switch (any switch if `None`),
    /// except those on the excluded ports
    EdgeNode {
        tenant: VnodeName,
        node: Option<SalNode>,
        excluded: BTreeSet<SalPort>,
        vlan: VlanId,
    },
    /// The flows of a host of a virtual bridge
    Host { bridge: VnodeId, mac: Mac },
}

impl Display for FlowRemovalSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowRemovalSpec::Tenant(tenant) => write!(f, "tenant {tenant}"),
            FlowRemovalSpec::VirtualNode(ident) => write!(f, "{ident}"),
            FlowRemovalSpec::EdgePort { tenant, port, vlan } => {
                write!(f, "tenant {tenant} edge port {port} vlan {vlan}")
            }
            FlowRemovalSpec::EdgeNode {
                tenant,
                node,
                excluded,
                vlan,
            } => {
                match node {
                    Some(node) => write!(f, "tenant {tenant} edge node {node} vlan {vlan}")?,
                    None => write!(f, "tenant {tenant} edge vlan {vlan}")?,
                }
                if !excluded.is_empty() {
                    write!(f, " except {} ports", excluded.len())?;
                }
                Ok(())
            }
            FlowRemovalSpec::Host { bridge, mac } => write!(f, "{bridge} host {mac}"),
        }
    }
}

/// Handle of a submitted flow removal
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowRemovalHandle(pub u64);

/// Something that removes flows in the background
pub trait FlowRemover: Send + Sync {
    fn remove_flows(&self, specs: Vec<FlowRemovalSpec>) -> FlowRemovalHandle;
}

#[derive(Debug)]
pub struct FlowRemovalJob {
    pub handle: FlowRemovalHandle,
    pub specs: Vec<FlowRemovalSpec>,
}

/// A [`FlowRemover`] that hands the removals over a channel to whatever drives the switches
pub struct FlowRemovalQueue {
    tx: mpsc::UnboundedSender<FlowRemovalJob>,
    seqn: AtomicU64,
}

impl FlowRemovalQueue {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FlowRemovalJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = Self {
            tx,
            seqn: AtomicU64::new(1),
        };
        (queue, rx)
    }
}

impl FlowRemover for FlowRemovalQueue {
    fn remove_flows(&self, specs: Vec<FlowRemovalSpec>) -> FlowRemovalHandle {
        let handle = FlowRemovalHandle(self.seqn.fetch_add(1, Ordering::Relaxed));
        for spec in &specs {
            debug!("Flow removal {}: {spec}", handle.0);
        }
        if self.tx.send(FlowRemovalJob { handle, specs }).is_err() {
            warn!("Flow removal queue is closed: job {} dropped", handle.0);
        }
        handle
    }
}
