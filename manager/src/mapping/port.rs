// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Port mappings: a port and VLAN mapped to one virtual interface, exclusively

use super::cleaner::MapCleanup;
use super::{macmap, port_record_path, read_owner, release, vlan_record_path, write_owner};
use crate::errors::{VtnError, VtnResult};
use crate::ident::{InterfaceId, VtnIdent};
use crate::model::VInterface;
use crate::txn::TxContext;
use net::{NodeVlan, PortVlan};
use tracing::{debug, info};

// The VLAN mapping that covered `pv` until now, for the specific node first.
fn covering_vlan_map(ctx: &TxContext<'_>, pv: &PortVlan) -> VtnResult<Option<VtnIdent>> {
    let specific = NodeVlan::new(Some(pv.port.node()), pv.vlan);
    if let Some(owner) = read_owner(ctx, &vlan_record_path(&specific))? {
        return Ok(Some(owner));
    }
    read_owner(ctx, &vlan_record_path(&NodeVlan::any(pv.vlan)))
}

fn set_mapped(ctx: &mut TxContext<'_>, iface: &InterfaceId, pv: Option<PortVlan>) -> VtnResult<()> {
    let path = iface.data_path();
    let mut record: VInterface = ctx.fetch(&path, iface)?;
    if record.mapped != pv {
        record.mapped = pv;
        ctx.put(path, record)?;
    }
    ctx.refresh_state(&iface.vnode);
    Ok(())
}

/// Map `pv` to the interface `iface`.
///
/// Fails with `Conflict` if another interface maps `pv`. Takes `pv` over from a MAC
/// mapping. With `purge`, the hosts and flows of the mappings that covered `pv` until
/// now are removed.
pub fn register_port_map(
    ctx: &mut TxContext<'_>,
    iface: &InterfaceId,
    pv: PortVlan,
    purge: bool,
) -> VtnResult<()> {
    let me = VtnIdent::from(iface.clone());
    let record = port_record_path(&pv);
    let mut cleanup = MapCleanup::new();
    match read_owner(ctx, &record)? {
        None => {}
        Some(owner) if owner == me => {
            debug!("{pv} is already mapped to {iface}");
            return Ok(());
        }
        Some(VtnIdent::Interface(other)) => {
            return Err(VtnError::Conflict(format!(
                "{pv} is already mapped to another interface {other}"
            )));
        }
        Some(VtnIdent::MacMap(macmap)) => {
            let hosts = macmap::inactivate_port_vlan(ctx, &macmap, &pv, false)?;
            info!(
                "{iface}: took {pv} over from {macmap}, {} hosts inactivated",
                hosts.len()
            );
            if purge {
                cleanup.add_port(&macmap.bridge.tenant, pv);
            }
        }
        Some(other) => {
            return Err(VtnError::Internal(format!(
                "{pv} is owned by unexpected {other}"
            )));
        }
    }

    write_owner(ctx, record, &me)?;
    set_mapped(ctx, iface, Some(pv))?;
    debug!("{iface}: mapped {pv}");

    if purge && let Some(vlan_map) = covering_vlan_map(ctx, &pv)? {
        cleanup.add_port(vlan_map.tenant(), pv);
    }
    cleanup.clean_up(ctx)
}

/// Unmap `pv` from the interface `iface`, if it maps it.
///
/// With `purge`, the hosts and flows of the interface on `pv` are removed.
pub fn unregister_port_map(
    ctx: &mut TxContext<'_>,
    iface: &InterfaceId,
    pv: PortVlan,
    purge: bool,
) -> VtnResult<()> {
    let me = VtnIdent::from(iface.clone());
    if release(ctx, &port_record_path(&pv), &me)? {
        debug!("{iface}: unmapped {pv}");
    }
    if ctx.exists(&iface.data_path())? {
        set_mapped(ctx, iface, None)?;
    }
    if purge {
        let mut cleanup = MapCleanup::new();
        cleanup.add_port(&iface.vnode.tenant, pv);
        cleanup.clean_up(ctx)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::{register_port_map, unregister_port_map};
    use crate::config::VtnConfig;
    use crate::errors::VtnError;
    use crate::flow::FlowRemovalSpec;
    use crate::ident::{InterfaceId, VnodeId, VnodeName, VtnIdent};
    use crate::mapping::{port_record_path, read_owner};
    use crate::model::{Node, VInterface, VirtualNode};
    use crate::txn::TxContext;
    use net::{PortVlan, SalNode, VlanId};
    use store::DataStore;

    fn interface(ctx: &mut TxContext<'_>, bridge: &str, name: &str) -> InterfaceId {
        let bridge = VnodeId::bridge("t1", bridge).unwrap();
        ctx.put(bridge.data_path(), VirtualNode::default()).unwrap();
        let iface = bridge.interface(VnodeName::new(name).unwrap());
        ctx.put(iface.data_path(), VInterface::default()).unwrap();
        iface
    }

    #[test]
    fn port_maps_are_exclusive() {
        let store = DataStore::<Node>::new();
        let config = VtnConfig::default();
        let mut ctx = TxContext::new(store.begin(), &config);
        let if1 = interface(&mut ctx, "b1", "if1");
        let if2 = interface(&mut ctx, "b2", "if1");
        let pv = PortVlan::new(SalNode::new(1).port(1).unwrap(), VlanId::new(5).unwrap());

        register_port_map(&mut ctx, &if1, pv, true).unwrap();
        // idempotent for the owner
        register_port_map(&mut ctx, &if1, pv, true).unwrap();
        assert!(matches!(
            register_port_map(&mut ctx, &if2, pv, true),
            Err(VtnError::Conflict(_))
        ));
        let record = port_record_path(&pv);
        assert_eq!(read_owner(&ctx, &record), Ok(Some(VtnIdent::from(if1.clone()))));
        let mapped: VInterface = ctx.read(&if1.data_path()).unwrap().unwrap();
        assert_eq!(mapped.mapped, Some(pv));

        // not the owner: nothing to release
        unregister_port_map(&mut ctx, &if2, pv, false).unwrap();
        assert!(read_owner(&ctx, &record).unwrap().is_some());

        unregister_port_map(&mut ctx, &if1, pv, true).unwrap();
        assert_eq!(read_owner(&ctx, &record), Ok(None));
        register_port_map(&mut ctx, &if2, pv, false).unwrap();

        let effects = ctx.commit().unwrap();
        assert_eq!(
            effects.flow_removals,
            vec![FlowRemovalSpec::EdgePort {
                tenant: if1.vnode.tenant.clone(),
                port: pv.port,
                vlan: pv.vlan,
            }]
        );
    }

    #[test]
    fn unexpected_owner_is_internal() {
        let store = DataStore::<Node>::new();
        let config = VtnConfig::default();
        let mut ctx = TxContext::new(store.begin(), &config);
        let iface = interface(&mut ctx, "b1", "if1");
        let pv = PortVlan::new(SalNode::new(1).port(1).unwrap(), VlanId::UNTAGGED);
        let owner = VtnIdent::Vnode(iface.vnode.clone());
        crate::mapping::write_owner(&mut ctx, port_record_path(&pv), &owner).unwrap();
        assert!(matches!(
            register_port_map(&mut ctx, &iface, pv, false),
            Err(VtnError::Internal(_))
        ));
    }
}
