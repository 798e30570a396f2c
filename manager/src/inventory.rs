// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Switch ports known to the controller

use crate::errors::VtnResult;
use crate::model::SwitchPort;
use crate::txn::TxContext;
use net::SalPort;
use store::DataPath;

const INVENTORY: &str = "inventory";

pub(crate) fn port_path(port: &SalPort) -> DataPath {
    DataPath::new([INVENTORY.to_string(), port.to_string()])
}

pub(crate) fn port(ctx: &TxContext<'_>, port: &SalPort) -> VtnResult<Option<SwitchPort>> {
    ctx.read(&port_path(port))
}

pub(crate) fn is_port_up(ctx: &TxContext<'_>, port: &SalPort) -> VtnResult<bool> {
    Ok(self::port(ctx, port)?.is_some_and(|p| p.enabled))
}
