// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Physical switches and switch ports, named the way the inventory names them
//! (`openflow:<dpid>` and `openflow:<dpid>:<port>`).

use std::fmt::Display;
use std::str::FromStr;

const PREFIX: &str = "openflow:";

/// Errors produced when parsing a switch or port identifier
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SalParseError {
    /// The identifier lacks the `openflow:` prefix
    #[error("'{0}' is not an openflow identifier")]
    NotOpenflow(String),
    /// The identifier has the wrong number of components
    #[error("malformed switch identifier '{0}'")]
    Malformed(String),
    /// Port number zero is reserved
    #[error("invalid port number in '{0}'")]
    InvalidPort(String),
}

/// A physical switch, identified by its datapath id.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct SalNode(u64);

impl SalNode {
    /// Build a [`SalNode`] from a datapath id
    #[must_use]
    pub const fn new(dpid: u64) -> Self {
        SalNode(dpid)
    }
    /// The datapath id of the switch
    #[must_use]
    pub const fn dpid(self) -> u64 {
        self.0
    }
    /// A port of this switch
    ///
    /// # Errors
    ///
    /// Port number zero is reserved.
    pub fn port(self, number: u32) -> Result<SalPort, SalParseError> {
        SalPort::new(self, number)
    }
}

impl Display for SalNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{PREFIX}{}", self.0)
    }
}

impl FromStr for SalNode {
    type Err = SalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(PREFIX)
            .ok_or_else(|| SalParseError::NotOpenflow(s.to_string()))?;
        let dpid = rest
            .parse::<u64>()
            .map_err(|_| SalParseError::Malformed(s.to_string()))?;
        Ok(SalNode(dpid))
    }
}

impl TryFrom<String> for SalNode {
    type Error = SalParseError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SalNode> for String {
    fn from(value: SalNode) -> Self {
        value.to_string()
    }
}

/// A physical switch port.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct SalPort {
    node: SalNode,
    number: u32,
}

impl SalPort {
    /// Build a [`SalPort`]
    ///
    /// # Errors
    ///
    /// Port number zero is reserved.
    pub fn new(node: SalNode, number: u32) -> Result<Self, SalParseError> {
        if number == 0 {
            return Err(SalParseError::InvalidPort(format!("{node}:{number}")));
        }
        Ok(SalPort { node, number })
    }
    /// The switch this port belongs to
    #[must_use]
    pub const fn node(&self) -> SalNode {
        self.node
    }
    /// The port number within the switch
    #[must_use]
    pub const fn number(&self) -> u32 {
        self.number
    }
}

impl Display for SalPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.node, self.number)
    }
}

impl FromStr for SalPort {
    type Err = SalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (node, number) = s
            .rsplit_once(':')
            .ok_or_else(|| SalParseError::Malformed(s.to_string()))?;
        let node: SalNode = node.parse()?;
        let number = number
            .parse::<u32>()
            .map_err(|_| SalParseError::Malformed(s.to_string()))?;
        SalPort::new(node, number)
    }
}

impl TryFrom<String> for SalPort {
    type Error = SalParseError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SalPort> for String {
    fn from(value: SalPort) -> Self {
        value.to_string()
    }
}
