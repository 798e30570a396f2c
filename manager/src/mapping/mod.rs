// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The mapping registry.
//!
//! Mapping records associate a physical key to the identifier of its owner:
//!
//! * a port/VLAN pair to the interface that port-maps it, or to the MAC mapping
//!   that has active hosts on it,
//! * a node/VLAN pair (node may be any) to the VLAN mapping that maps it,
//! * a MAC/VLAN pair (MAC may be any) to the MAC mapping that allows it.
//!
//! There is at most one record per key.

pub mod cleaner;
pub mod macmap;
pub mod port;
pub mod resolve;
pub mod vlan;

use crate::errors::{VtnError, VtnResult};
use crate::ident::VtnIdent;
use crate::model::MappingRecord;
use crate::txn::TxContext;
use net::{MacVlan, NodeVlan, PortVlan};
use std::fmt::Display;
use std::str::FromStr;
use store::DataPath;

use tracectl::trace_target;
trace_target!("vtn-mapping", LevelFilter::INFO, &["vtn"]);

const MAPPINGS: &str = "vtn-mappings";
const PORT: &str = "port";
const VLAN: &str = "vlan";
const MAC: &str = "mac";

fn record_path(table: &str, key: &impl Display) -> DataPath {
    DataPath::new([MAPPINGS.to_string(), table.to_string(), key.to_string()])
}

pub(crate) fn port_record_path(pv: &PortVlan) -> DataPath {
    record_path(PORT, pv)
}

pub(crate) fn vlan_record_path(nv: &NodeVlan) -> DataPath {
    record_path(VLAN, nv)
}

pub(crate) fn mac_record_path(mv: &MacVlan) -> DataPath {
    record_path(MAC, mv)
}

fn parse_owner(path: &DataPath, owner: &str) -> VtnResult<VtnIdent> {
    owner
        .parse()
        .map_err(|_| VtnError::Internal(format!("mapping record {path} has a bad owner '{owner}'")))
}

/// The owner of the mapping record at `path`, if any
pub(crate) fn read_owner(ctx: &TxContext<'_>, path: &DataPath) -> VtnResult<Option<VtnIdent>> {
    ctx.read::<MappingRecord>(path)?
        .map(|record| parse_owner(path, &record.owner))
        .transpose()
}

pub(crate) fn write_owner(
    ctx: &mut TxContext<'_>,
    path: DataPath,
    owner: &VtnIdent,
) -> VtnResult<()> {
    ctx.put(
        path,
        MappingRecord {
            owner: owner.to_string(),
        },
    )
}

/// Delete the record at `path` if `owner` owns it
pub(crate) fn release(ctx: &mut TxContext<'_>, path: &DataPath, owner: &VtnIdent) -> VtnResult<bool> {
    if read_owner(ctx, path)?.as_ref() == Some(owner) {
        ctx.delete(path);
        Ok(true)
    } else {
        Ok(false)
    }
}

fn records<K: FromStr>(ctx: &TxContext<'_>, table: &str) -> VtnResult<Vec<(K, VtnIdent)>> {
    let prefix = DataPath::new([MAPPINGS, table]);
    ctx.children::<MappingRecord>(&prefix)?
        .into_iter()
        .map(|(path, record)| {
            let key = path
                .last()
                .and_then(|key| key.parse().ok())
                .ok_or_else(|| VtnError::Internal(format!("bad mapping record key {path}")))?;
            Ok((key, parse_owner(&path, &record.owner)?))
        })
        .collect()
}

/// Every port mapping record
pub(crate) fn port_records(ctx: &TxContext<'_>) -> VtnResult<Vec<(PortVlan, VtnIdent)>> {
    records(ctx, PORT)
}

/// Every VLAN mapping record
pub(crate) fn vlan_records(ctx: &TxContext<'_>) -> VtnResult<Vec<(NodeVlan, VtnIdent)>> {
    records(ctx, VLAN)
}
