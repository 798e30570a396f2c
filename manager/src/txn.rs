// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The context of one VTN transaction.
//!
//! A [`TxContext`] wraps a store transaction together with the caches and the side
//! effects of the operation running in it. Before the store transaction is committed,
//! the pre-submit hooks flush the caches in a fixed order. Side effects are returned by
//! [`TxContext::commit`] and are lost if the context is dropped instead.

use crate::config::VtnConfig;
use crate::errors::{VtnError, VtnResult};
use crate::flow::FlowRemovalSpec;
use crate::ident::{MacMapId, VnodeId};
use crate::model::{MacMapStatus, Node, StoreRecord};
use crate::packet::OutPacket;
use crate::state;
use std::collections::{BTreeMap, BTreeSet};
use store::{DataPath, Transaction};
use tracing::debug;

struct CachedStatus {
    /// `None` if the MAC mapping does not exist (or is being removed)
    status: Option<MacMapStatus>,
    dirty: bool,
}

/// What a committed transaction leaves to do
#[derive(Debug, Default)]
pub struct TxEffects {
    pub flow_removals: Vec<FlowRemovalSpec>,
    pub packets: Vec<OutPacket>,
}

type PreSubmitHook = fn(&mut TxContext<'_>) -> VtnResult<()>;

/// Run in order right before commit: statuses first, since node states depend on them.
const PRE_SUBMIT: [PreSubmitHook; 2] = [flush_mac_map_status, state::refresh_vnode_states];

pub struct TxContext<'s> {
    tx: Transaction<'s, Node>,
    config: &'s VtnConfig,
    mac_map_status: BTreeMap<VnodeId, CachedStatus>,
    state_refresh: BTreeSet<VnodeId>,
    flow_removals: Vec<FlowRemovalSpec>,
    packets: Vec<OutPacket>,
}

impl<'s> TxContext<'s> {
    #[must_use]
    pub fn new(tx: Transaction<'s, Node>, config: &'s VtnConfig) -> Self {
        Self {
            tx,
            config,
            mac_map_status: BTreeMap::new(),
            state_refresh: BTreeSet::new(),
            flow_removals: Vec::new(),
            packets: Vec::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &VtnConfig {
        self.config
    }

    /// Read the record at `path`, which must be an `R` if present
    pub fn read<R: StoreRecord>(&self, path: &DataPath) -> VtnResult<Option<R>> {
        match self.tx.read(path)? {
            None => Ok(None),
            Some(node) => R::from_node(node)
                .map(Some)
                .ok_or_else(|| VtnError::Internal(format!("{path} is not a {}", R::KIND))),
        }
    }

    /// Read the record at `path`, failing with `NotFound` if absent
    pub fn fetch<R: StoreRecord>(&self, path: &DataPath, what: impl ToString) -> VtnResult<R> {
        self.read(path)?
            .ok_or_else(|| VtnError::NotFound(what.to_string()))
    }

    /// The `R` records right below `prefix`. Records of other kinds are skipped.
    pub fn children<R: StoreRecord>(&self, prefix: &DataPath) -> VtnResult<Vec<(DataPath, R)>> {
        self.scan(prefix, prefix.depth() + 1)
    }

    /// The `R` records below `prefix` at the given depth. Records of other kinds are skipped.
    pub fn scan<R: StoreRecord>(
        &self,
        prefix: &DataPath,
        depth: usize,
    ) -> VtnResult<Vec<(DataPath, R)>> {
        Ok(self
            .tx
            .scan(prefix)?
            .into_iter()
            .filter(|(path, _)| path.depth() == depth)
            .filter_map(|(path, node)| R::from_node(node).map(|r| (path, r)))
            .collect())
    }

    pub fn exists(&self, path: &DataPath) -> VtnResult<bool> {
        Ok(self.tx.read(path)?.is_some())
    }

    pub fn put(&mut self, path: DataPath, record: impl Into<Node>) -> VtnResult<()> {
        Ok(self.tx.put(path, record.into())?)
    }

    /// Delete the record at `path` and everything below it
    pub fn delete(&mut self, path: &DataPath) {
        self.tx.delete(path);
    }

    fn cached_status(&mut self, bridge: &VnodeId) -> VtnResult<&mut CachedStatus> {
        if !self.mac_map_status.contains_key(bridge) {
            // no status without a MAC mapping
            let status = if self.exists(&bridge.mac_map().data_path())? {
                Some(
                    self.read(&bridge.mac_map().status_path())?
                        .unwrap_or_default(),
                )
            } else {
                None
            };
            self.mac_map_status.insert(
                bridge.clone(),
                CachedStatus {
                    status,
                    dirty: false,
                },
            );
        }
        self.mac_map_status
            .get_mut(bridge)
            .ok_or_else(|| VtnError::Internal(format!("no cached status for {bridge}")))
    }

    /// The status of the MAC mapping of `bridge`, if it has one
    pub fn mac_map_status(&mut self, bridge: &VnodeId) -> VtnResult<Option<&MacMapStatus>> {
        Ok(self.cached_status(bridge)?.status.as_ref())
    }

    /// Update the status of the MAC mapping of `bridge`, if it has one.
    /// The status is written once, before commit.
    pub fn update_mac_map_status<T>(
        &mut self,
        bridge: &VnodeId,
        update: impl FnOnce(&mut MacMapStatus) -> T,
    ) -> VtnResult<Option<T>> {
        let cached = self.cached_status(bridge)?;
        let Some(status) = cached.status.as_mut() else {
            return Ok(None);
        };
        cached.dirty = true;
        Ok(Some(update(status)))
    }

    /// Start an empty status for a new MAC mapping
    pub(crate) fn create_mac_map_status(&mut self, id: &MacMapId) {
        self.mac_map_status.insert(
            id.bridge.clone(),
            CachedStatus {
                status: Some(MacMapStatus::default()),
                dirty: true,
            },
        );
    }

    /// Forget the status of a removed MAC mapping
    pub(crate) fn drop_mac_map_status(&mut self, id: &MacMapId) {
        self.mac_map_status.insert(
            id.bridge.clone(),
            CachedStatus {
                status: None,
                dirty: true,
            },
        );
    }

    /// Recompute the state of `vnode` and of its interfaces before commit
    pub fn refresh_state(&mut self, vnode: &VnodeId) {
        self.state_refresh.insert(vnode.clone());
    }

    pub(crate) fn take_state_refresh(&mut self) -> BTreeSet<VnodeId> {
        std::mem::take(&mut self.state_refresh)
    }

    /// Queue a flow removal, submitted after commit
    pub fn remove_flows(&mut self, spec: FlowRemovalSpec) {
        if !self.flow_removals.contains(&spec) {
            self.flow_removals.push(spec);
        }
    }

    /// Queue a packet, sent after commit
    pub fn transmit(&mut self, packet: OutPacket) {
        self.packets.push(packet);
    }

    /// Run the pre-submit hooks and commit the store transaction
    pub fn commit(mut self) -> VtnResult<TxEffects> {
        for hook in PRE_SUBMIT {
            hook(&mut self)?;
        }
        let TxContext {
            tx,
            flow_removals,
            packets,
            ..
        } = self;
        let id = tx.id();
        let changes = tx.commit()?;
        debug!(
            "Transaction {id} committed: {changes} changes, {} flow removals, {} packets",
            flow_removals.len(),
            packets.len()
        );
        Ok(TxEffects {
            flow_removals,
            packets,
        })
    }
}

fn flush_mac_map_status(ctx: &mut TxContext<'_>) -> VtnResult<()> {
    let cache = std::mem::take(&mut ctx.mac_map_status);
    for (bridge, cached) in cache.into_iter().filter(|(_, c)| c.dirty) {
        let path = bridge.mac_map().status_path();
        match cached.status {
            Some(status) if ctx.exists(&bridge.data_path())? => ctx.put(path, status)?,
            _ => ctx.delete(&path),
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::TxContext;
    use crate::config::VtnConfig;
    use crate::flow::FlowRemovalSpec;
    use crate::ident::VnodeId;
    use crate::model::{MacMapConfig, MacMapStatus, Node, VirtualNode};
    use net::{Mac, MacVlan, SalNode, VlanId};
    use store::DataStore;

    #[test]
    fn status_is_written_once_at_commit() {
        let store = DataStore::<Node>::new();
        let config = VtnConfig::default();
        let bridge = VnodeId::bridge("t1", "b1").unwrap();
        let host = MacVlan::new(Mac([0, 0, 0, 0, 0, 1]), VlanId::new(5).unwrap());
        let port = SalNode::new(1).port(1).unwrap();

        let mut ctx = TxContext::new(store.begin(), &config);
        ctx.put(bridge.data_path(), VirtualNode::default()).unwrap();
        ctx.put(bridge.mac_map().data_path(), MacMapConfig::default())
            .unwrap();
        ctx.create_mac_map_status(&bridge.mac_map());
        let added = ctx
            .update_mac_map_status(&bridge, |status| status.active.insert(host, port))
            .unwrap();
        assert_eq!(added, Some(None));
        // not written yet
        assert_eq!(
            ctx.read::<MacMapStatus>(&bridge.mac_map().status_path()),
            Ok(None)
        );
        ctx.commit().unwrap();

        let status = store
            .reader()
            .read(&bridge.mac_map().status_path())
            .unwrap();
        let Some(Node::MacMapStatus(status)) = status else {
            panic!("no status");
        };
        assert_eq!(status.active.get(&host), Some(&port));
    }

    #[test]
    fn no_status_without_mac_map() {
        let store = DataStore::<Node>::new();
        let config = VtnConfig::default();
        let bridge = VnodeId::bridge("t1", "b1").unwrap();
        let mut ctx = TxContext::new(store.begin(), &config);
        assert_eq!(ctx.mac_map_status(&bridge), Ok(None));
        assert_eq!(ctx.update_mac_map_status(&bridge, |_| ()), Ok(None));
    }

    #[test]
    fn dropped_context_discards_effects() {
        let store = DataStore::<Node>::new();
        let config = VtnConfig::default();
        let tenant = VnodeId::bridge("t1", "b1").unwrap().tenant;
        {
            let mut ctx = TxContext::new(store.begin(), &config);
            ctx.remove_flows(FlowRemovalSpec::Tenant(tenant.clone()));
        }
        let mut ctx = TxContext::new(store.begin(), &config);
        ctx.remove_flows(FlowRemovalSpec::Tenant(tenant.clone()));
        ctx.remove_flows(FlowRemovalSpec::Tenant(tenant.clone()));
        let effects = ctx.commit().unwrap();
        assert_eq!(effects.flow_removals, vec![FlowRemovalSpec::Tenant(tenant)]);
    }

    #[test]
    fn wrong_record_kind_is_internal() {
        let store = DataStore::<Node>::new();
        let config = VtnConfig::default();
        let bridge = VnodeId::bridge("t1", "b1").unwrap();
        let mut ctx = TxContext::new(store.begin(), &config);
        ctx.put(bridge.data_path(), MacMapStatus::default()).unwrap();
        assert!(matches!(
            ctx.read::<VirtualNode>(&bridge.data_path()),
            Err(crate::VtnError::Internal(_))
        ));
    }
}
